//! Desugaring: collapse the surface-only forms the typechecker left in
//! place into canonical slice, record, and boolean operations.
//!
//! After this pass there are no `with`-changes and no `IN` expressions;
//! functional updates are explicit record rebuilds or `set_slice` calls,
//! and pattern membership is ordinary boolean arithmetic.

use crate::error::Result;
use crate::transforms::{Ctx, Transform, add_e, apply, bin, mul_e, sub_e};
use crate::types::ast::*;
use crate::types::entity::TypeTc;
use crate::types::{Ident, Spanned};
use crate::value::Value;
use crate::visitor::{Action, Visitor, visit_decl};

/// The desugaring pass.
pub struct Desugar;

impl Transform for Desugar {
  fn name(&self) -> &'static str { "desugar" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut v = DesugarVisitor { ctx };
    Ok(decls.into_iter().map(|d| visit_decl(&mut v, d)).collect())
  }
}

struct DesugarVisitor<'a, 'b> {
  ctx: &'a mut Ctx<'b>,
}

impl Visitor for DesugarVisitor<'_, '_> {
  fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
    match &e.k {
      ExprKind::WithChanges(..) | ExprKind::In(..) =>
        Action::ChangeDoChildrenPost(e.clone()),
      _ => Action::DoChildren,
    }
  }

  fn post_expr(&mut self, e: Expr) -> Expr {
    let Spanned { span, k } = e;
    match k {
      ExprKind::WithChanges(base, changes) => {
        // Slice changes were resolved during checking; only record-field
        // rebuilds remain.
        let mut out = *base;
        for (c, v) in changes {
          out = match c {
            Change::Field(f) => update_field(self.ctx, out, f, v),
            Change::Slices(_) => out,
          };
        }
        Spanned { span, k: out.k }
      }
      ExprKind::In(e, p) => pattern_test(*e, *p).at(span),
      k => Spanned { span, k },
    }
  }
}

/// `e with { f = v }` on a record rebuilds the record with one field
/// replaced; on a register it is a slice update on the named field.
fn update_field(ctx: &mut Ctx<'_>, base: Expr, f: Ident, v: Expr) -> Expr {
  // A register-field update arrives as Slices on the read side already
  // (the typechecker resolved the field), so only records reach here.
  let record = record_of(ctx, &base);
  match record {
    Some((name, params, fields)) => {
      let fields = fields.iter().map(|(fname, _)| {
        let val = if fname.name == f.name {
          v.clone()
        } else {
          ExprKind::Field(Box::new(base.clone()), *fname).synth()
        };
        (*fname, val)
      }).collect();
      ExprKind::Record(name, params, fields).synth()
    }
    None => ExprKind::Field(Box::new(base), f).synth(),
  }
}

fn record_of(ctx: &mut Ctx<'_>, e: &Expr) -> Option<(Ident, Vec<Expr>, Vec<(Ident, Type)>)> {
  if let ExprKind::Record(name, params, _) = &e.k {
    if let Some(Spanned { k: TypeTc::Record { fields, .. }, .. }) =
      ctx.env.types.get(&name.name)
    {
      return Some((*name, params.clone(), fields.clone()))
    }
  }
  // Anything else would need type information that the typechecker has
  // already folded into Slices for registers; record-typed variables keep
  // their `with` until the field list is identifiable.
  None
}

/// The `(lo, width)` view of any slice form.
pub(crate) fn slice_lo_wd(s: &Slice) -> (Expr, Expr) {
  match s {
    Slice::Single(i) => (i.clone(), lit_int(1)),
    Slice::HiLo(hi, lo) => (
      lo.clone(),
      add_e(sub_e(hi.clone(), lo.clone()), lit_int(1)),
    ),
    Slice::LoWd(lo, w) => (lo.clone(), w.clone()),
    Slice::HiWd(hi, w) => (
      sub_e(add_e(hi.clone(), lit_int(1)), w.clone()),
      w.clone(),
    ),
    Slice::Element(i, w) => (mul_e(i.clone(), w.clone()), w.clone()),
  }
}

/// Lower `e IN pattern` to boolean arithmetic.
fn pattern_test(e: Expr, p: Pattern) -> ExprKind {
  match p {
    Pattern::Lit(v) => {
      let op = match &v {
        Value::Bits(_) => "eq_bits",
        Value::Bool(_) => "eq_bool",
        _ => "eq_int",
      };
      let params = match &v {
        Value::Bits(b) => vec![lit_int(i64::from(b.width))],
        _ => vec![],
      };
      apply(op, params, vec![e, ExprKind::Lit(v).synth()]).k
    }
    Pattern::Const(x) => apply("eq_int", vec![], vec![e, var(x)]).k,
    Pattern::Wildcard => ExprKind::Lit(Value::Bool(true)),
    Pattern::Tuple(ps) => {
      // Componentwise conjunction over a tuple value.
      let mut out = ExprKind::Lit(Value::Bool(true)).synth();
      for (i, p) in ps.into_iter().enumerate() {
        let field = Ident::from_str(&format!("r{i}"));
        let part = pattern_test(
          ExprKind::Field(Box::new(e.clone()), field).synth(), p).synth();
        out = bin(Binop::BoolAnd, out, part);
      }
      out.k
    }
    Pattern::Set(ps) => {
      let mut out: Option<Expr> = None;
      for p in ps {
        let t = pattern_test(e.clone(), p).synth();
        out = Some(match out {
          None => t,
          Some(prev) => bin(Binop::BoolOr, prev, t),
        });
      }
      out.map_or(ExprKind::Lit(Value::Bool(false)), |e| e.k)
    }
    Pattern::Expr(rhs) => apply("eq_int", vec![], vec![e, *rhs]).k,
    Pattern::Range(lo, hi) => bin(
      Binop::BoolAnd,
      apply("le_int", vec![], vec![lo, e.clone()]),
      apply("le_int", vec![], vec![e, hi]),
    ).k,
    Pattern::Mask(m) => {
      let w = lit_int(i64::from(m.width));
      apply("in_mask", vec![w], vec![e, ExprKind::Lit(Value::Mask(m)).synth()]).k
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::{assert_idempotent, run_one};

  #[test]
  fn with_field_rebuilds_record() {
    let (_, ds) = run_one(&mut Desugar,
      "record Pair { lo : bits(4), hi : bits(4) }\n\
       func F() => Pair\nbegin\n  \
       return Pair{ lo = '0000', hi = '1111' } with { lo = '1010' };\nend");
    let DeclKind::FunDefn(_, body) = &ds[1].k else { panic!() };
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    let ExprKind::Record(_, _, fields) = &e.k else { panic!("not rebuilt: {e}") };
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].1.to_string(), "4'xa");
  }

  #[test]
  fn with_slices_becomes_set_slice() {
    let (_, ds) = run_one(&mut Desugar,
      "func F(x : bits(8)) => bits(8)\nbegin\n  \
       return x with { [3:0] = '1111' };\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    assert!(e.to_string().contains("set_slice"), "{e}");
  }

  #[test]
  fn in_set_becomes_disjunction() {
    let (_, ds) = run_one(&mut Desugar,
      "func F(x : integer) => boolean\nbegin\n  return x IN {1, 2};\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    assert!(matches!(&e.k, ExprKind::Binop(Binop::BoolOr, ..)), "{e}");
  }

  #[test]
  fn in_mask_becomes_mask_test() {
    let (_, ds) = run_one(&mut Desugar,
      "func F(x : bits(4)) => boolean\nbegin\n  return x IN '10xx';\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    assert!(e.to_string().contains("in_mask"), "{e}");
  }

  #[test]
  fn desugar_is_idempotent() {
    assert_idempotent(&mut Desugar,
      "func F(x : bits(8), y : integer) => boolean\nbegin\n  \
       return y IN {1, 2} && x IN '1xxx xxxx';\nend");
  }
}
