//! Integer-bounds lowering: every value whose declared type is a
//! constrained `integer {…}` is represented as the smallest two's-complement
//! `sintN` that can hold its interval, including the sign bit.
//!
//! Declared types (bindings, formal parameters, record fields, return
//! types) are rewritten to `__sint(N)`; arithmetic between equal-width
//! bounded values lowers to the `_sintN` primitives with an explicit width
//! parameter; width changes insert `resize_sintN`, and crossings to and
//! from unbounded integers insert `cvt_int_sintN`/`cvt_sintN_int`.
//! Unconstrained integers keep the arbitrary-precision representation.

use hashbrown::HashMap;
use num::BigInt;
use crate::consteval::{NoConsts, fold_int};
use crate::error::Result;
use crate::symbol::Symbol;
use crate::transforms::{Ctx, Transform, apply};
use crate::types::ast::*;
use crate::types::entity::TypeTc;
use crate::types::{Ident, Spanned};
use crate::value::{SInt, Value};

/// The integer-bounds lowering pass.
pub struct IntBoundsLowering;

impl Transform for IntBoundsLowering {
  fn name(&self) -> &'static str { "int-bounds-lowering" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut pass = Bounds {
      fields: HashMap::new(),
      globals: HashMap::new(),
      vars: HashMap::new(),
      funs: HashMap::new(),
      rty: Repr::Other,
    };
    // First rewrite every declared type, so call sites and field accesses
    // can consult the lowered signatures.
    let decls: Vec<Decl> = decls.into_iter().map(|d| pass.lower_decl_types(ctx, d)).collect();
    // Then rewrite the bodies.
    Ok(decls.into_iter().map(|d| pass.lower_decl_body(d)).collect())
  }
}

/// The representation of an integer-valued expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Repr {
  /// Arbitrary-precision integer.
  Int,
  /// Bounded `sintN` of this width.
  S(u32),
  /// Not an integer (bits, boolean, record, …).
  Other,
}

/// The smallest width whose two's-complement window holds `[lo, hi]`.
fn width_for(lo: &BigInt, hi: &BigInt) -> u32 {
  let mut n = 1_u32;
  while !(SInt::fits(n, lo) && SInt::fits(n, hi)) { n += 1 }
  n
}

/// The folded interval of a constraint set.
fn interval(cs: &[Constraint]) -> Option<(BigInt, BigInt)> {
  let f = |e: &Expr| fold_int(e, &NoConsts);
  let mut lo: Option<BigInt> = None;
  let mut hi: Option<BigInt> = None;
  for c in cs {
    let (l, h) = match c {
      Constraint::Single(e) => {
        let n = f(e)?;
        (n.clone(), n)
      }
      Constraint::Range(a, b) => (f(a)?, f(b)?),
    };
    lo = Some(match lo { None => l.clone(), Some(x) => x.min(l) });
    hi = Some(match hi { None => h.clone(), Some(x) => x.max(h) });
  }
  Some((lo?, hi?))
}

/// `__sint(n)`.
fn sint_ty(n: u32) -> Type {
  Type::Constructor(Ident::from_str("__sint"), vec![lit_int(i64::from(n))])
}

fn repr_of_ty(ty: &Type) -> Repr {
  match ty {
    Type::Integer(_) => Repr::Int,
    Type::Constructor(name, args) if name.name.as_str() == "__sint" => {
      match args.first().and_then(|e| fold_int(e, &NoConsts)) {
        Some(n) => Repr::S(u32::try_from(&n).unwrap_or(64)),
        None => Repr::Int,
      }
    }
    _ => Repr::Other,
  }
}

/// Rewrite one declared type, bounding constrained integers.
fn lower_ty(ty: Type) -> Type {
  match ty {
    Type::Integer(Some(cs)) => match interval(&cs) {
      Some((lo, hi)) => sint_ty(width_for(&lo, &hi)),
      None => Type::Integer(Some(cs)),
    },
    Type::Tuple(ts) => Type::Tuple(ts.into_iter().map(lower_ty).collect()),
    Type::Array(ix, ety) => Type::Array(ix, Box::new(lower_ty(*ety))),
    ty => ty,
  }
}

struct Bounds {
  /// Field name to representation, across all records. A name bound to
  /// conflicting widths degrades to the unbounded representation.
  fields: HashMap<Symbol, Repr>,
  /// Global variable representations.
  globals: HashMap<Ident, Repr>,
  /// In-scope variable representations for the function being lowered.
  vars: HashMap<Ident, Repr>,
  /// Lowered signatures: argument and return representations.
  funs: HashMap<Ident, (Vec<Repr>, Repr)>,
  /// The current function's return representation.
  rty: Repr,
}

impl Bounds {
  fn note_field(&mut self, f: Ident, r: Repr) {
    match self.fields.get(&f.name) {
      None => { self.fields.insert(f.name, r); }
      Some(prev) if *prev == r => {}
      Some(_) => { self.fields.insert(f.name, Repr::Int); }
    }
  }

  fn lower_decl_types(&mut self, ctx: &mut Ctx<'_>, d: Decl) -> Decl {
    let Spanned { span, k } = d;
    let k = match k {
      DeclKind::Record(name, params, fields) => {
        let fields: Vec<(Ident, Type)> = fields.into_iter().map(|(f, ty)| {
          let ty = lower_ty(ty);
          self.note_field(f, repr_of_ty(&ty));
          (f, ty)
        }).collect();
        ctx.env.types.insert(name.name, Spanned::new(span, TypeTc::Record {
          params: params.clone(),
          fields: fields.clone(),
        }));
        DeclKind::Record(name, params, fields)
      }
      DeclKind::Exception(name, fields) => {
        let fields: Vec<(Ident, Type)> = fields.into_iter().map(|(f, ty)| {
          let ty = lower_ty(ty);
          self.note_field(f, repr_of_ty(&ty));
          (f, ty)
        }).collect();
        ctx.env.types.insert(name.name,
          Spanned::new(span, TypeTc::Exception(fields.clone())));
        DeclKind::Exception(name, fields)
      }
      DeclKind::FunDefn(mut sig, body) => {
        self.lower_sig(&mut sig);
        DeclKind::FunDefn(sig, body)
      }
      DeclKind::FunType(mut sig) => {
        self.lower_sig(&mut sig);
        DeclKind::FunType(sig)
      }
      DeclKind::BuiltinFunc(mut sig) => {
        self.lower_sig(&mut sig);
        DeclKind::BuiltinFunc(sig)
      }
      DeclKind::Var(ty, name) => {
        let ty = lower_ty(ty);
        self.globals.insert(name, repr_of_ty(&ty));
        DeclKind::Var(ty, name)
      }
      DeclKind::Const(ty, name, e) => {
        // Constants keep their exact value; their type stays unbounded so
        // folding and emission print them directly.
        self.globals.insert(name, Repr::Int);
        DeclKind::Const(ty, name, e)
      }
      DeclKind::Config(ty, name, e) => {
        let ty = lower_ty(ty);
        self.globals.insert(name, repr_of_ty(&ty));
        DeclKind::Config(ty, name, e)
      }
      k => k,
    };
    Spanned { span, k }
  }

  fn lower_sig(&mut self, sig: &mut FunSig) {
    let mut args = Vec::with_capacity(sig.args.len());
    for a in &mut sig.args {
      let ty = lower_ty(std::mem::replace(&mut a.ty, Type::integer()));
      args.push(repr_of_ty(&ty));
      a.ty = ty;
    }
    let rty = match sig.rty.take() {
      Some(t) => {
        let t = lower_ty(t);
        let r = repr_of_ty(&t);
        sig.rty = Some(t);
        r
      }
      None => Repr::Other,
    };
    self.funs.insert(sig.name, (args, rty));
  }

  fn lower_decl_body(&mut self, d: Decl) -> Decl {
    let Spanned { span, k } = d;
    let k = match k {
      DeclKind::FunDefn(sig, body) => {
        self.vars = self.globals.clone();
        for a in &sig.args {
          self.vars.insert(a.name, repr_of_ty(&a.ty));
        }
        self.rty = sig.rty.as_ref().map_or(Repr::Other, repr_of_ty);
        let body = self.lower_stmts(body);
        DeclKind::FunDefn(sig, body)
      }
      k => k,
    };
    Spanned { span, k }
  }

  // ---------------------------------------------------------- coercions

  /// Bring `e` to the target representation.
  fn coerce(&self, e: Expr, from: Repr, to: Repr) -> Expr {
    match (from, to) {
      (Repr::S(m), Repr::S(n)) if m != n =>
        apply("resize_sintN", vec![lit_int(i64::from(m)), lit_int(i64::from(n))], vec![e]),
      (Repr::Int, Repr::S(n)) => {
        // A literal converts at compile time.
        if let ExprKind::Lit(Value::Int(v)) = &e.k {
          if SInt::fits(n, v) {
            return ExprKind::Lit(Value::SInt(SInt::wrap(n, v.clone()))).at(e.span)
          }
        }
        apply("cvt_int_sintN", vec![lit_int(i64::from(n))], vec![e])
      }
      (Repr::S(m), Repr::Int) =>
        apply("cvt_sintN_int", vec![lit_int(i64::from(m))], vec![e]),
      _ => e,
    }
  }

  // -------------------------------------------------------- expressions

  fn lower_expr(&mut self, e: Expr) -> (Expr, Repr) {
    let Spanned { span, k } = e;
    match k {
      ExprKind::Lit(Value::Int(n)) =>
        (ExprKind::Lit(Value::Int(n)).at(span), Repr::Int),
      ExprKind::Lit(Value::SInt(s)) => {
        let w = s.width;
        (ExprKind::Lit(Value::SInt(s)).at(span), Repr::S(w))
      }
      k @ ExprKind::Lit(_) => (Spanned { span, k }, Repr::Other),
      ExprKind::Var(x) => {
        let r = self.vars.get(&x).copied().unwrap_or(Repr::Other);
        (ExprKind::Var(x).at(span), r)
      }
      ExprKind::Field(b, f) => {
        let (b, _) = self.lower_expr(*b);
        let r = self.fields.get(&f.name).copied().unwrap_or(Repr::Other);
        (ExprKind::Field(Box::new(b), f).at(span), r)
      }
      ExprKind::TApply(f, params, args, throws) =>
        self.lower_call(span, f, params, args, throws),
      ExprKind::If(arms, els) => {
        let mut lowered = vec![];
        let mut reprs = vec![];
        for (c, t) in arms {
          let (c, _) = self.lower_expr(c);
          let (t, r) = self.lower_expr(t);
          reprs.push(r);
          lowered.push((c, t));
        }
        let (els, er) = self.lower_expr(*els);
        reprs.push(er);
        // Branches unify on the widest bounded width, or fall back to int.
        let target = reprs.iter().copied().reduce(|a, b| match (a, b) {
          (Repr::S(m), Repr::S(n)) => Repr::S(m.max(n)),
          (Repr::Int, Repr::S(_)) | (Repr::S(_), Repr::Int) => Repr::Int,
          (Repr::Int, Repr::Int) => Repr::Int,
          _ => Repr::Other,
        }).unwrap_or(Repr::Other);
        let arms: Vec<(Expr, Expr)> = lowered.into_iter().zip(&reprs)
          .map(|((c, t), r)| (c, self.coerce(t, *r, target)))
          .collect();
        let els = self.coerce(els, *reprs.last().expect("nonempty"), target);
        (ExprKind::If(arms, Box::new(els)).at(span), target)
      }
      ExprKind::Binop(op, a, b) => {
        let (a, _) = self.lower_expr(*a);
        let (b, _) = self.lower_expr(*b);
        (ExprKind::Binop(op, Box::new(a), Box::new(b)).at(span), Repr::Other)
      }
      ExprKind::Unop(op, a) => {
        let (a, _) = self.lower_expr(*a);
        (ExprKind::Unop(op, Box::new(a)).at(span), Repr::Other)
      }
      ExprKind::Record(name, params, fields) => {
        let fields = fields.into_iter().map(|(f, e)| {
          let (e, r) = self.lower_expr(e);
          let want = self.fields.get(&f.name).copied().unwrap_or(Repr::Other);
          (f, self.coerce(e, r, want))
        }).collect();
        (ExprKind::Record(name, params, fields).at(span), Repr::Other)
      }
      ExprKind::Tuple(es) => {
        let es = es.into_iter().map(|e| self.lower_expr(e).0).collect();
        (ExprKind::Tuple(es).at(span), Repr::Other)
      }
      ExprKind::Concat(ws, es) => {
        let es = es.into_iter().map(|e| self.lower_expr(e).0).collect();
        (ExprKind::Concat(ws, es).at(span), Repr::Other)
      }
      ExprKind::Index(a, i) => {
        let (a, _) = self.lower_expr(*a);
        let (i, ir) = self.lower_expr(*i);
        let i = self.coerce(i, ir, Repr::Int);
        (ExprKind::Index(Box::new(a), Box::new(i)).at(span), Repr::Other)
      }
      ExprKind::Let(x, ty, init, body) => {
        let ty = lower_ty(*ty);
        let r = repr_of_ty(&ty);
        let (init, ir) = self.lower_expr(*init);
        let init = self.coerce(init, ir, r);
        self.vars.insert(x, r);
        let (body, br) = self.lower_expr(*body);
        (ExprKind::Let(x, Box::new(ty), Box::new(init), Box::new(body)).at(span), br)
      }
      ExprKind::Assert(c, body) => {
        let (c, _) = self.lower_expr(*c);
        let (body, r) = self.lower_expr(*body);
        (ExprKind::Assert(Box::new(c), Box::new(body)).at(span), r)
      }
      // Remaining forms carry no integer representation of their own.
      k => (Spanned { span, k }, Repr::Other),
    }
  }

  /// Integer primitives between bounded operands lower to `_sintN`
  /// operations; everything else coerces its arguments to the callee's
  /// expectations.
  fn lower_call(
    &mut self, span: crate::types::Loc, f: Ident, params: Vec<Expr>,
    args: Vec<Expr>, throws: ThrowsTag,
  ) -> (Expr, Repr) {
    let lowered: Vec<(Expr, Repr)> =
      args.into_iter().map(|a| self.lower_expr(a)).collect();

    // Bounded arithmetic: every operand bounded or a literal.
    if let Some((op, kind)) = sint_op(f.name.as_str()) {
      let widths: Vec<Option<u32>> = lowered.iter().map(|(e, r)| match r {
        Repr::S(w) => Some(*w),
        Repr::Int => match &e.k {
          ExprKind::Lit(Value::Int(v)) => Some(width_for(v, v)),
          _ => None,
        },
        Repr::Other => None,
      }).collect();
      if widths.iter().all(Option::is_some) && !widths.is_empty() {
        let ws: Vec<u32> = widths.into_iter().map(|w| w.expect("checked")).collect();
        let w = result_width(kind, &ws);
        let args: Vec<Expr> = lowered.into_iter()
          .map(|(e, r)| self.coerce(e, r, Repr::S(w)))
          .collect();
        let name = format!("{op}_sintN");
        let out = ExprKind::TApply(
          Ident::from_str(&name),
          vec![lit_int(i64::from(w))],
          args,
          throws,
        ).at(span);
        let repr = if kind == OpKind::Cmp { Repr::Other } else { Repr::S(w) };
        return (out, repr)
      }
    }

    // Known signature: coerce arguments to the lowered formals.
    if let Some((arg_reprs, rty)) = self.funs.get(&f).cloned() {
      let args: Vec<Expr> = lowered.into_iter().zip(
        arg_reprs.into_iter().chain(std::iter::repeat(Repr::Other)))
        .map(|((e, r), want)| self.coerce(e, r, want))
        .collect();
      return (ExprKind::TApply(f, params, args, throws).at(span), rty)
    }

    // A primitive with unbounded-integer arguments.
    let args: Vec<Expr> = lowered.into_iter()
      .map(|(e, r)| self.coerce(e, r, Repr::Int))
      .collect();
    let repr = if returns_integer(f.name.as_str()) { Repr::Int } else { Repr::Other };
    (ExprKind::TApply(f, params, args, throws).at(span), repr)
  }

  // --------------------------------------------------------- statements

  fn lower_stmts(&mut self, ss: Vec<Stmt>) -> Vec<Stmt> {
    ss.into_iter().map(|s| self.lower_stmt(s)).collect()
  }

  fn lower_stmt(&mut self, s: Stmt) -> Stmt {
    let Spanned { span, k } = s;
    let k = match k {
      StmtKind::VarDeclsNoInit(ty, names) => {
        let ty = lower_ty(ty);
        let r = repr_of_ty(&ty);
        for &x in &names { self.vars.insert(x, r); }
        StmtKind::VarDeclsNoInit(ty, names)
      }
      StmtKind::VarDecl { constant, item, init } => {
        let (item, want) = match item {
          DeclItem::Var(x, Some(ty)) => {
            let ty = lower_ty(ty);
            let r = repr_of_ty(&ty);
            self.vars.insert(x, r);
            (DeclItem::Var(x, Some(ty)), r)
          }
          DeclItem::Var(x, None) => {
            let r = Repr::Other;
            self.vars.insert(x, r);
            (DeclItem::Var(x, None), r)
          }
          item => (item, Repr::Other),
        };
        let (init, r) = self.lower_expr(init);
        let init = self.coerce(init, r, want);
        StmtKind::VarDecl { constant, item, init }
      }
      StmtKind::Assign(lhs, rhs) => {
        let want = self.lexpr_repr(&lhs);
        let (rhs, r) = self.lower_expr(rhs);
        let rhs = self.coerce(rhs, r, want);
        StmtKind::Assign(self.lower_lexpr(lhs), rhs)
      }
      StmtKind::TCall(f, params, args, throws) => {
        let (e, _) = self.lower_call(span, f, params, args, throws);
        let ExprKind::TApply(f, params, args, throws) = e.k else {
          unreachable!("calls lower to calls")
        };
        StmtKind::TCall(f, params, args, throws)
      }
      StmtKind::Return(Some(e)) => {
        let (e, r) = self.lower_expr(e);
        let e = self.coerce(e, r, self.rty);
        StmtKind::Return(Some(e))
      }
      StmtKind::Return(None) => StmtKind::Return(None),
      StmtKind::Assert(e) => StmtKind::Assert(self.lower_expr(e).0),
      StmtKind::Throw(e) => StmtKind::Throw(self.lower_expr(e).0),
      StmtKind::Try { body, catchers, otherwise } => StmtKind::Try {
        body: self.lower_stmts(body),
        catchers: catchers.into_iter().map(|c| Catcher {
          name: c.name,
          ty: c.ty,
          body: self.lower_stmts(c.body),
          span: c.span,
        }).collect(),
        otherwise: otherwise.map(|ss| self.lower_stmts(ss)),
      },
      StmtKind::If(arms, els) => StmtKind::If(
        arms.into_iter().map(|(c, ss)| {
          (self.lower_expr(c).0, self.lower_stmts(ss))
        }).collect(),
        self.lower_stmts(els),
      ),
      StmtKind::Case(e, alts, default) => StmtKind::Case(
        self.lower_expr(e).0,
        alts.into_iter().map(|a| Alt {
          pats: a.pats,
          guard: a.guard.map(|g| self.lower_expr(g).0),
          body: self.lower_stmts(a.body),
          span: a.span,
        }).collect(),
        default.map(|ss| self.lower_stmts(ss)),
      ),
      StmtKind::For { var: v, from, dir, to, body } => {
        // Loop counters stay unbounded; their arithmetic is loop control.
        self.vars.insert(v, Repr::Int);
        let (from, fr) = self.lower_expr(from);
        let from = self.coerce(from, fr, Repr::Int);
        let (to, tr) = self.lower_expr(to);
        let to = self.coerce(to, tr, Repr::Int);
        StmtKind::For { var: v, from, dir, to, body: self.lower_stmts(body) }
      }
      StmtKind::While(c, body) =>
        StmtKind::While(self.lower_expr(c).0, self.lower_stmts(body)),
      StmtKind::Repeat(body, c) =>
        StmtKind::Repeat(self.lower_stmts(body), self.lower_expr(c).0),
      k @ StmtKind::Call(..) => k,
    };
    Spanned { span, k }
  }

  fn lexpr_repr(&self, e: &LExpr) -> Repr {
    match &e.k {
      LExprKind::Var(x) => self.vars.get(x).copied().unwrap_or(Repr::Other),
      LExprKind::Field(_, f) => self.fields.get(&f.name).copied().unwrap_or(Repr::Other),
      _ => Repr::Other,
    }
  }

  fn lower_lexpr(&mut self, e: LExpr) -> LExpr {
    let Spanned { span, k } = e;
    let k = match k {
      LExprKind::Index(a, i) => {
        let (i, r) = self.lower_expr(*i);
        let i = self.coerce(i, r, Repr::Int);
        LExprKind::Index(Box::new(self.lower_lexpr(*a)), Box::new(i))
      }
      LExprKind::Field(b, f) => LExprKind::Field(Box::new(self.lower_lexpr(*b)), f),
      k => k,
    };
    Spanned { span, k }
  }
}

/// The operation classes whose result widths differ.
#[derive(Copy, Clone, PartialEq, Eq)]
enum OpKind {
  AddSub,
  Mul,
  Neg,
  MinMax,
  Div,
  Cmp,
}

fn sint_op(name: &str) -> Option<(&'static str, OpKind)> {
  Some(match name {
    "add_int" => ("add", OpKind::AddSub),
    "sub_int" => ("sub", OpKind::AddSub),
    "mul_int" => ("mul", OpKind::Mul),
    "neg_int" => ("neg", OpKind::Neg),
    "min_int" => ("min", OpKind::MinMax),
    "max_int" => ("max", OpKind::MinMax),
    "exact_div_int" => ("exact_div", OpKind::Div),
    "fdiv_int" => ("fdiv", OpKind::Div),
    "frem_int" => ("frem", OpKind::Div),
    "zdiv_int" => ("zdiv", OpKind::Div),
    "zrem_int" => ("zrem", OpKind::Div),
    "align_int" => ("align", OpKind::Div),
    "eq_int" => ("eq", OpKind::Cmp),
    "ne_int" => ("ne", OpKind::Cmp),
    "lt_int" => ("lt", OpKind::Cmp),
    "le_int" => ("le", OpKind::Cmp),
    "gt_int" => ("gt", OpKind::Cmp),
    "ge_int" => ("ge", OpKind::Cmp),
    _ => return None,
  })
}

/// The width that safely represents the operation's result.
fn result_width(kind: OpKind, ws: &[u32]) -> u32 {
  let max = ws.iter().copied().max().unwrap_or(1);
  match kind {
    OpKind::AddSub => max + 1,
    OpKind::Mul => ws.iter().sum::<u32>().max(1),
    OpKind::Neg => max + 1,
    OpKind::MinMax | OpKind::Div | OpKind::Cmp => max,
  }
}

fn returns_integer(name: &str) -> bool {
  matches!(name,
    "add_int" | "sub_int" | "mul_int" | "exact_div_int" | "fdiv_int" | "frem_int" |
    "zdiv_int" | "zrem_int" | "neg_int" | "pow_int" | "shl_int" | "shr_int" |
    "align_int" | "mod_pow2_int" | "pow2_int" | "min_int" | "max_int" |
    "cvt_bits_uint" | "cvt_bits_sint" | "UInt" | "SInt" | "Min" | "Max" | "Abs")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::run_one;

  #[test]
  fn width_for_includes_sign_bit() {
    let w = |lo: i64, hi: i64| width_for(&BigInt::from(lo), &BigInt::from(hi));
    assert_eq!(w(0, 0), 1);
    assert_eq!(w(0, 1), 2);
    assert_eq!(w(-1, 0), 1);
    assert_eq!(w(0, 127), 8);
    assert_eq!(w(0, 128), 9);
    assert_eq!(w(-128, 127), 8);
    assert_eq!(w(0, 31), 6);
  }

  #[test]
  fn constrained_parameters_become_sint() {
    let (_, ds) = run_one(&mut IntBoundsLowering,
      "func F(n : integer {0..31}) => integer {0..31}\nbegin\n  return n;\nend");
    let DeclKind::FunDefn(sig, _) = &ds[0].k else { panic!() };
    assert!(matches!(&sig.args[0].ty,
      Type::Constructor(n, _) if n.name.as_str() == "__sint"), "{:?}", sig.args[0].ty);
    assert!(matches!(&sig.rty, Some(Type::Constructor(..))));
  }

  #[test]
  fn bounded_arithmetic_uses_sint_ops() {
    let (_, ds) = run_one(&mut IntBoundsLowering,
      "func F(a : integer {0..7}, b : integer {0..7}) => integer\n\
       begin\n  return a + b;\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    assert!(e.to_string().contains("add_sintN"), "{e}");
    // The bounded sum converts back to integer at the return boundary.
    assert!(e.to_string().contains("cvt_sintN_int"), "{e}");
  }

  #[test]
  fn resize_inserted_between_widths() {
    let (_, ds) = run_one(&mut IntBoundsLowering,
      "func F(a : integer {0..7})\nbegin\n  \
       var b : integer {0..1000} = a;\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::VarDecl { init, .. } = &body[0].k else { panic!("{body:#?}") };
    assert!(init.to_string().contains("resize_sintN"), "{init}");
  }

  #[test]
  fn unconstrained_integers_stay_unbounded() {
    let (_, ds) = run_one(&mut IntBoundsLowering,
      "func F(x : integer, y : integer) => integer\nbegin\n  return x + y;\nend");
    let DeclKind::FunDefn(sig, body) = &ds[0].k else { panic!() };
    assert!(matches!(sig.args[0].ty, Type::Integer(None)));
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    assert!(e.to_string().contains("add_int"), "{e}");
  }
}
