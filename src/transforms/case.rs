//! Case lowering: `case` over an integer or bitvector discriminant becomes
//! an `if/elsif` chain of equality tests; an omitted `otherwise` becomes a
//! call to the unmatched-case error primitive.

use crate::error::Result;
use crate::transforms::{Ctx, Transform, apply, bin};
use crate::types::ast::*;
use crate::types::{Ident, Spanned};
use crate::value::Value;
use crate::visitor::{Action, Visitor, visit_decl, walk_stmt};

/// The case lowering pass.
pub struct CaseLowering;

impl Transform for CaseLowering {
  fn name(&self) -> &'static str { "case-lowering" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut v = CaseVisitor { ctx };
    Ok(decls.into_iter().map(|d| visit_decl(&mut v, d)).collect())
  }
}

struct CaseVisitor<'a, 'b> {
  ctx: &'a mut Ctx<'b>,
}

impl Visitor for CaseVisitor<'_, '_> {
  fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
    if !matches!(s.k, StmtKind::Case(..)) { return Action::DoChildren }
    let s = walk_stmt(self, s.clone());
    let Spanned { span, k } = s;
    let StmtKind::Case(e, alts, default) = k else { unreachable!() };
    // Bind the discriminant once; the typechecker usually has already.
    let mut out = vec![];
    let discr = match &e.k {
      ExprKind::Var(x) => var(*x),
      ExprKind::Lit(_) => e.clone(),
      _ => {
        let t = self.ctx.fresh("__d");
        out.push(StmtKind::VarDecl {
          constant: true,
          item: DeclItem::Var(t, None),
          init: e,
        }.at(span));
        var(t)
      }
    };
    let mut arms = vec![];
    for a in alts {
      let mut test: Option<Expr> = None;
      for p in a.pats {
        let t = self.pattern_test(&discr, p);
        test = Some(match test {
          None => t,
          Some(prev) => bin(Binop::BoolOr, prev, t),
        });
      }
      let mut test = test.unwrap_or_else(|| ExprKind::Lit(Value::Bool(true)).synth());
      if let Some(g) = a.guard {
        test = bin(Binop::BoolAnd, test, g);
      }
      arms.push((test, a.body));
    }
    let els = default.unwrap_or_else(|| vec![
      StmtKind::TCall(
        Ident::from_str("asl_error_unmatched_case"),
        vec![],
        vec![ExprKind::Lit(Value::String("unmatched case".into())).synth()],
        ThrowsTag::AlwaysThrow,
      ).at(span),
    ]);
    out.push(StmtKind::If(arms, els).at(span));
    Action::Change(out)
  }
}

impl CaseVisitor<'_, '_> {
  fn pattern_test(&mut self, discr: &Expr, p: Pattern) -> Expr {
    match p {
      Pattern::Lit(v) => {
        let (op, params) = match &v {
          Value::Bits(b) => ("eq_bits", vec![lit_int(i64::from(b.width))]),
          Value::Bool(_) => ("eq_bool", vec![]),
          _ => ("eq_int", vec![]),
        };
        apply(op, params, vec![discr.clone(), ExprKind::Lit(v).synth()])
      }
      Pattern::Const(x) => {
        // Enumeration members compare with their enumeration's equality.
        let op = match self.ctx.env.globals.get(&x.name) {
          Some(crate::types::entity::Entity::EnumMember(ety, _)) => {
            let name = format!("eq_enum_{ety}");
            return apply_enum_eq(&name, discr.clone(), var(x))
          }
          _ => "eq_int",
        };
        apply(op, vec![], vec![discr.clone(), var(x)])
      }
      Pattern::Wildcard => ExprKind::Lit(Value::Bool(true)).synth(),
      Pattern::Tuple(_) => {
        // Tuples were eliminated earlier; any remaining tuple pattern is
        // over an unlowered value and keeps a conservative no-match.
        ExprKind::Lit(Value::Bool(false)).synth()
      }
      Pattern::Set(ps) => {
        let mut out: Option<Expr> = None;
        for p in ps {
          let t = self.pattern_test(discr, p);
          out = Some(match out {
            None => t,
            Some(prev) => bin(Binop::BoolOr, prev, t),
          });
        }
        out.unwrap_or_else(|| ExprKind::Lit(Value::Bool(false)).synth())
      }
      Pattern::Expr(e) => apply("eq_int", vec![], vec![discr.clone(), *e]),
      Pattern::Range(lo, hi) => bin(
        Binop::BoolAnd,
        apply("le_int", vec![], vec![lo, discr.clone()]),
        apply("le_int", vec![], vec![discr.clone(), hi]),
      ),
      Pattern::Mask(m) => {
        let w = lit_int(i64::from(m.width));
        apply("in_mask", vec![w],
          vec![discr.clone(), ExprKind::Lit(Value::Mask(m)).synth()])
      }
    }
  }
}

fn apply_enum_eq(name: &str, a: Expr, b: Expr) -> Expr {
  apply(name, vec![], vec![a, b])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::{assert_idempotent, run_one};

  #[test]
  fn integer_case_becomes_if_chain() {
    let (_, ds) = run_one(&mut CaseLowering,
      "func F(x : integer) => integer\nbegin\n  case x of\n    \
       when 0 => return 10;\n    when 1..5 => return 20;\n    \
       otherwise => return 30;\n  end\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::If(arms, els) = &body.last().expect("stmt").k else {
      panic!("not lowered: {body:#?}")
    };
    assert_eq!(arms.len(), 2);
    assert!(arms[0].0.to_string().contains("eq_int"));
    assert!(arms[1].0.to_string().contains("le_int"));
    assert!(!els.is_empty());
  }

  #[test]
  fn missing_default_calls_error_primitive() {
    let (_, ds) = run_one(&mut CaseLowering,
      "func F(x : bits(4))\nbegin\n  case x of\n    \
       when '0000' => return;\n  end\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::If(arms, els) = &body.last().expect("stmt").k else { panic!() };
    assert!(arms[0].0.to_string().contains("eq_bits"));
    assert!(matches!(&els[0].k,
      StmtKind::TCall(f, ..) if f.name.as_str() == "asl_error_unmatched_case"));
  }

  #[test]
  fn guards_conjoin_with_the_test() {
    let (_, ds) = run_one(&mut CaseLowering,
      "func F(x : integer) => integer\nbegin\n  case x of\n    \
       when 1..9 where x != 5 => return 1;\n    otherwise => return 0;\n  end\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::If(arms, _) = &body.last().expect("stmt").k else { panic!() };
    assert!(matches!(&arms[0].0.k, ExprKind::Binop(Binop::BoolAnd, ..)), "{}", arms[0].0);
  }

  #[test]
  fn case_lowering_is_idempotent() {
    assert_idempotent(&mut CaseLowering,
      "func F(x : integer) => integer\nbegin\n  case x of\n    \
       when 0 => return 1;\n    otherwise => return 0;\n  end\nend");
  }
}
