//! Let hoisting: every `__let` and `__assert` inserted by runtime-check
//! insertion (or earlier passes) is moved to a statement position.
//!
//! Within one statement the wrappers bubble up through unconditionally
//! evaluated positions; at statement level they unwrap into variable
//! declarations and assert statements. Conditionally evaluated positions
//! (branch arms, short-circuit right operands, loop conditions) cannot
//! hoist past their guard, so those forms are restructured instead: guarded
//! boolean operands become conditional expressions, conditionals carrying
//! checks become statement `if`s, and loop conditions re-evaluate through a
//! fresh boolean variable.

use crate::error::Result;
use crate::transforms::{Ctx, Transform};
use crate::types::ast::*;
use crate::types::{Ident, Loc, Spanned};
use crate::value::Value;
use crate::visitor::{Action, Visitor, visit_decl, walk_stmt};

/// The let hoisting pass.
pub struct LetHoisting;

impl Transform for LetHoisting {
  fn name(&self) -> &'static str { "let-hoisting" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut v = HoistVisitor { ctx };
    Ok(decls.into_iter().map(|d| visit_decl(&mut v, d)).collect())
  }
}

/// One wrapper stripped off an expression.
enum Lift {
  Let(Ident, Type, Expr),
  Assert(Expr),
}

impl Lift {
  fn into_stmt(self, span: Loc) -> Stmt {
    match self {
      Lift::Let(x, ty, init) => StmtKind::VarDecl {
        constant: true,
        item: DeclItem::Var(x, Some(ty)),
        init,
      }.at(span),
      Lift::Assert(c) => StmtKind::Assert(c).at(span),
    }
  }
}

/// Remove the outer `__let`/`__assert` wrappers, recording them in order.
fn strip(e: Expr, lifted: &mut Vec<Lift>) -> Expr {
  match e.k {
    ExprKind::Let(x, ty, init, body) => {
      lifted.push(Lift::Let(x, *ty, *init));
      strip(*body, lifted)
    }
    ExprKind::Assert(c, body) => {
      lifted.push(Lift::Assert(*c));
      strip(*body, lifted)
    }
    k => Spanned { span: e.span, k },
  }
}

fn rewrap(mut e: Expr, lifted: Vec<Lift>) -> Expr {
  for l in lifted.into_iter().rev() {
    e = match l {
      Lift::Let(x, ty, init) =>
        ExprKind::Let(x, Box::new(ty), Box::new(init), Box::new(e)).synth(),
      Lift::Assert(c) => ExprKind::Assert(Box::new(c), Box::new(e)).synth(),
    };
  }
  e
}

/// Whether any `__let`/`__assert` remains anywhere inside.
fn contains_checks(e: &Expr) -> bool {
  struct Scan(bool);
  impl Visitor for Scan {
    fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
      if matches!(e.k, ExprKind::Let(..) | ExprKind::Assert(..)) {
        self.0 = true;
        return Action::SkipChildren
      }
      Action::DoChildren
    }
  }
  let mut s = Scan(false);
  let _ = crate::visitor::visit_expr(&mut s, e.clone());
  s.0
}

struct HoistVisitor<'a, 'b> {
  ctx: &'a mut Ctx<'b>,
}

impl Visitor for HoistVisitor<'_, '_> {
  fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
    Action::ChangeDoChildrenPost(e.clone())
  }

  /// Bubble wrappers out of unconditionally evaluated child positions.
  fn post_expr(&mut self, e: Expr) -> Expr {
    let Spanned { span, k } = e;
    let mut lifted = vec![];
    let k = match k {
      ExprKind::TApply(f, params, args, throws) => {
        let args = args.into_iter().map(|a| strip(a, &mut lifted)).collect();
        ExprKind::TApply(f, params, args, throws)
      }
      ExprKind::Tuple(es) => ExprKind::Tuple(
        es.into_iter().map(|a| strip(a, &mut lifted)).collect()),
      ExprKind::Concat(ws, es) => ExprKind::Concat(
        ws,
        es.into_iter().map(|a| strip(a, &mut lifted)).collect()),
      ExprKind::Record(name, params, fields) => ExprKind::Record(
        name, params,
        fields.into_iter().map(|(f, a)| (f, strip(a, &mut lifted))).collect()),
      ExprKind::Field(a, f) => ExprKind::Field(Box::new(strip(*a, &mut lifted)), f),
      ExprKind::Index(a, i) => {
        let a = strip(*a, &mut lifted);
        let i = strip(*i, &mut lifted);
        ExprKind::Index(Box::new(a), Box::new(i))
      }
      // A short-circuit operand that still carries checks becomes a
      // conditional, which the statement layer knows how to restructure.
      ExprKind::Binop(op @ (Binop::BoolAnd | Binop::BoolOr | Binop::Implies), a, b)
        if contains_checks(&b) => {
        let a = strip(*a, &mut lifted);
        let fls = ExprKind::Lit(Value::Bool(false)).synth();
        let tru = ExprKind::Lit(Value::Bool(true)).synth();
        match op {
          Binop::BoolAnd => ExprKind::If(vec![(a, *b)], Box::new(fls)),
          Binop::BoolOr => ExprKind::If(vec![(a, tru)], Box::new(*b)),
          Binop::Implies => ExprKind::If(vec![(a, *b)], Box::new(tru)),
          _ => unreachable!(),
        }
      }
      ExprKind::Binop(op, a, b) => {
        let a = strip(*a, &mut lifted);
        let b = strip(*b, &mut lifted);
        ExprKind::Binop(op, Box::new(a), Box::new(b))
      }
      ExprKind::Unop(op, a) => ExprKind::Unop(op, Box::new(strip(*a, &mut lifted))),
      // Conditional arms keep their wrappers; the first condition is
      // unconditional and may release its own.
      ExprKind::If(mut arms, els) => {
        if let Some((c, _)) = arms.first_mut() {
          let c2 = strip(c.clone(), &mut lifted);
          *c = c2;
        }
        ExprKind::If(arms, els)
      }
      k => k,
    };
    rewrap(Spanned { span, k }, lifted)
  }

  fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
    let span = s.span;
    let s = walk_stmt(self, s.clone());
    let mut before: Vec<Lift> = vec![];
    let out = match s.k {
      StmtKind::VarDecl { constant, item, init } => {
        let init = strip(init, &mut before);
        let mut out: Vec<Stmt> = before.into_iter().map(|l| l.into_stmt(span)).collect();
        let needs_split = contains_checks(&init) &&
          matches!((&item, &init.k), (DeclItem::Var(_, Some(_)), ExprKind::If(..)));
        if needs_split {
          // A conditional initialiser still carrying checks splits into a
          // declaration plus a statement `if`.
          let DeclItem::Var(x, Some(ty)) = item else { unreachable!() };
          let ExprKind::If(arms, els) = init.k else { unreachable!() };
          out.push(StmtKind::VarDeclsNoInit(ty, vec![x]).at(span));
          out.push(self.if_assign(span, LExprKind::Var(x).at(span), arms, *els));
          return Action::Change(visit_stmts_nested(self, out))
        }
        out.push(StmtKind::VarDecl { constant, item, init }.at(span));
        out
      }
      StmtKind::Assign(lhs, rhs) => {
        let rhs = strip(rhs, &mut before);
        let mut out: Vec<Stmt> = before.into_iter().map(|l| l.into_stmt(span)).collect();
        if contains_checks(&rhs) && matches!(rhs.k, ExprKind::If(..)) {
          let ExprKind::If(arms, els) = rhs.k else { unreachable!() };
          out.push(self.if_assign(span, lhs, arms, *els));
          return Action::Change(visit_stmts_nested(self, out))
        }
        out.push(StmtKind::Assign(lhs, rhs).at(span));
        out
      }
      StmtKind::Return(Some(e)) => {
        let e = strip(e, &mut before);
        let mut out: Vec<Stmt> = before.into_iter().map(|l| l.into_stmt(span)).collect();
        if contains_checks(&e) && matches!(e.k, ExprKind::If(..)) {
          let ExprKind::If(arms, els) = e.k else { unreachable!() };
          let arms = arms.into_iter().map(|(c, t)| {
            (c, vec![StmtKind::Return(Some(t)).at(span)])
          }).collect();
          let els = vec![StmtKind::Return(Some(*els)).at(span)];
          out.push(StmtKind::If(arms, els).at(span));
          return Action::Change(visit_stmts_nested(self, out))
        }
        out.push(StmtKind::Return(Some(e)).at(span));
        out
      }
      StmtKind::TCall(f, params, args, throws) => {
        let args = args.into_iter().map(|a| strip(a, &mut before)).collect();
        let mut out: Vec<Stmt> = before.into_iter().map(|l| l.into_stmt(span)).collect();
        out.push(StmtKind::TCall(f, params, args, throws).at(span));
        out
      }
      StmtKind::Assert(e) => {
        let e = strip(e, &mut before);
        let mut out: Vec<Stmt> = before.into_iter().map(|l| l.into_stmt(span)).collect();
        out.push(StmtKind::Assert(e).at(span));
        out
      }
      StmtKind::Throw(e) => {
        let e = strip(e, &mut before);
        let mut out: Vec<Stmt> = before.into_iter().map(|l| l.into_stmt(span)).collect();
        out.push(StmtKind::Throw(e).at(span));
        out
      }
      StmtKind::If(mut arms, els) => {
        // Only the first condition is evaluated unconditionally.
        if let Some((c, _)) = arms.first_mut() {
          *c = strip(c.clone(), &mut before);
        }
        let mut out: Vec<Stmt> = before.into_iter().map(|l| l.into_stmt(span)).collect();
        out.push(StmtKind::If(arms, els).at(span));
        out
      }
      StmtKind::For { var: v, from, dir, to, body } => {
        let from = strip(from, &mut before);
        let to = strip(to, &mut before);
        let mut out: Vec<Stmt> = before.into_iter().map(|l| l.into_stmt(span)).collect();
        out.push(StmtKind::For { var: v, from, dir, to, body }.at(span));
        out
      }
      StmtKind::While(c, body) if contains_checks(&c) => {
        return Action::Change(self.lower_loop_cond(span, c, body, true))
      }
      StmtKind::Repeat(body, c) if contains_checks(&c) => {
        return Action::Change(self.lower_loop_cond(span, c, body, false))
      }
      k => vec![Spanned { span, k }],
    };
    Action::Change(out)
  }
}

/// Re-run the hoist on freshly generated statements so nested structure
/// settles in one pass.
fn visit_stmts_nested(v: &mut HoistVisitor<'_, '_>, ss: Vec<Stmt>) -> Vec<Stmt> {
  crate::visitor::visit_stmts(v, ss)
}

impl HoistVisitor<'_, '_> {
  /// `lhs = if c then a …` as a statement `if` assigning per branch.
  fn if_assign(
    &mut self, span: Loc, lhs: LExpr, arms: Vec<(Expr, Expr)>, els: Expr,
  ) -> Stmt {
    let arms = arms.into_iter().map(|(c, t)| {
      (c, vec![StmtKind::Assign(lhs.clone(), t).at(span)])
    }).collect();
    let els = vec![StmtKind::Assign(lhs, els).at(span)];
    StmtKind::If(arms, els).at(span)
  }

  /// A loop whose condition carries checks re-evaluates it through a
  /// fresh boolean variable; the check statements run on every iteration.
  fn lower_loop_cond(
    &mut self, span: Loc, c: Expr, mut body: Vec<Stmt>, pre_test: bool,
  ) -> Vec<Stmt> {
    let flag = self.ctx.fresh("__w");
    let boolean = Type::named(Ident::from_str("boolean"));
    let mut lifted = vec![];
    let cond = strip(c, &mut lifted);
    let eval: Vec<Stmt> = lifted.iter().map(|l| match l {
      Lift::Let(x, ty, init) => StmtKind::VarDecl {
        constant: true,
        item: DeclItem::Var(*x, Some(ty.clone())),
        init: init.clone(),
      }.at(span),
      Lift::Assert(c) => StmtKind::Assert(c.clone()).at(span),
    }).collect();
    let assign_flag = StmtKind::Assign(
      LExprKind::Var(flag).at(span), cond.clone()).at(span);
    let mut out = vec![StmtKind::VarDeclsNoInit(boolean, vec![flag]).at(span)];
    if pre_test {
      out.extend(eval.clone());
      out.push(assign_flag.clone());
      body.extend(eval);
      body.push(assign_flag);
      out.push(StmtKind::While(var(flag), body).at(span));
    } else {
      body.extend(eval);
      body.push(assign_flag);
      out.push(StmtKind::Repeat(body, var(flag)).at(span));
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::{assert_idempotent, run_one, typecheck};
  use crate::transforms::{Ctx, Transform};
  use crate::types::NameSupply;

  /// A division inside a conditional branch: the typechecker wraps its
  /// checks in the branch expression, and hoisting must not move them out.
  #[test]
  fn branch_checks_become_statement_if() {
    let (_, ds) = run_one(&mut LetHoisting,
      "func F(x : integer, y : integer) => integer\nbegin\n  \
       return if y == 0 then 0 else x DIVRM y;\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::If(arms, els) = &body.last().expect("stmt").k else {
      panic!("conditional not restructured: {body:#?}")
    };
    assert_eq!(arms.len(), 1);
    // The else branch carries the divisor assert before its return.
    assert!(matches!(&els[0].k, StmtKind::Assert(_)), "{els:#?}");
    assert!(matches!(&els.last().expect("stmt").k, StmtKind::Return(_)));
  }

  #[test]
  fn while_condition_checks_rerun_each_iteration() {
    let (_, ds) = run_one(&mut LetHoisting,
      "func F(x : integer, d : integer) => integer\nbegin\n  var n : integer = x;\n  \
       while n DIVRM d > 0 do\n    n = n DIVRM d;\n  end\n  return n;\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let w = body.iter().find_map(|s| match &s.k {
      StmtKind::While(c, body) => Some((c, body)),
      _ => None,
    }).expect("while survives");
    assert!(matches!(&w.0.k, ExprKind::Var(_)), "condition via flag: {}", w.0);
    // The loop body re-evaluates the condition into the flag.
    assert!(w.1.iter().any(|s| matches!(&s.k, StmtKind::Assign(lhs, _)
      if matches!(&lhs.k, LExprKind::Var(v) if v.name.as_str() == "__w"))),
      "{:#?}", w.1);
  }

  #[test]
  fn plain_statements_unwrap_in_place() {
    // Manufacture a statement with a wrapped expression directly.
    let (mut env, _) = typecheck("func F() => integer\nbegin\n  return 0;\nend");
    let t = Ident::with_tag(crate::symbol::intern("__t"), 1);
    let wrapped = ExprKind::Let(
      t,
      Box::new(Type::integer()),
      Box::new(lit_int(5)),
      Box::new(ExprKind::Assert(
        Box::new(ExprKind::Lit(Value::Bool(true)).synth()),
        Box::new(var(t)),
      ).synth()),
    ).synth();
    let decl = DeclKind::FunDefn(
      FunSig {
        name: Ident::from_str("G"),
        kind: FuncKind::Function,
        args: vec![],
        rty: Some(Type::integer()),
        throws: ThrowsTag::NoThrow,
      },
      vec![StmtKind::Return(Some(wrapped)).synth()],
    ).synth();
    let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
    let out = LetHoisting.run(&mut ctx, vec![decl]).expect("runs");
    let DeclKind::FunDefn(_, body) = &out[0].k else { panic!() };
    assert_eq!(body.len(), 3, "{body:#?}");
    assert!(matches!(&body[0].k, StmtKind::VarDecl { .. }));
    assert!(matches!(&body[1].k, StmtKind::Assert(_)));
    assert!(matches!(&body[2].k, StmtKind::Return(_)));
  }

  #[test]
  fn hoisting_is_idempotent() {
    assert_idempotent(&mut LetHoisting,
      "func F(x : integer, y : integer) => integer\nbegin\n  \
       return if y == 0 then 0 else x DIVRM y;\nend");
  }
}
