//! Bittuple lowering: multi-part bitvector assignments `[hi, …, lo] = e`
//! become a binding of the right-hand side followed by one slice-extracting
//! assignment per part, highest part first.

use crate::error::{Error, Result};
use crate::transforms::slices::lower_slice_assign;
use crate::transforms::{Ctx, Transform, add_e, apply, sub_e};
use crate::types::ast::*;
use crate::visitor::{Action, Visitor, visit_decl, visit_expr, walk_stmt};

/// The bittuple lowering pass.
pub struct BitTupleLowering;

impl Transform for BitTupleLowering {
  fn name(&self) -> &'static str { "bittuple-lowering" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut v = BitTupleVisitor { ctx, failed: None };
    let out = decls.into_iter().map(|d| visit_decl(&mut v, d)).collect();
    match v.failed.take() {
      Some(e) => Err(e),
      None => Ok(out),
    }
  }
}

struct BitTupleVisitor<'a, 'b> {
  ctx: &'a mut Ctx<'b>,
  failed: Option<Error>,
}

impl Visitor for BitTupleVisitor<'_, '_> {
  fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
    if self.failed.is_some() { return Action::SkipChildren }
    let StmtKind::Assign(lhs, _) = &s.k else { return Action::DoChildren };
    if !matches!(lhs.k, LExprKind::BitTuple(..)) { return Action::DoChildren }
    let StmtKind::Assign(lhs, rhs) = s.k.clone() else { unreachable!() };
    let span = lhs.span;
    let LExprKind::BitTuple(widths, parts) = lhs.k else { unreachable!() };
    let rhs = visit_expr(self, rhs);
    let total = widths.iter().skip(1).fold(
      widths.first().cloned().unwrap_or_else(|| lit_int(0)),
      |acc, w| add_e(acc, w.clone()),
    );
    let mut out = vec![];
    let tmp = match &rhs.k {
      ExprKind::Var(x) => *x,
      _ => {
        let t = self.ctx.fresh("__v");
        out.push(StmtKind::VarDecl {
          constant: true,
          item: DeclItem::Var(t, Some(Type::bits(total.clone()))),
          init: rhs,
        }.at(span));
        t
      }
    };
    // Parts are listed highest first; offsets count from the low end.
    let mut offset = total.clone();
    let mut failed = None;
    for (part, w) in parts.into_iter().zip(widths) {
      offset = sub_e(offset, w.clone());
      let value = apply("get_slice", vec![total.clone(), w.clone()],
        vec![var(tmp), offset.clone(), w]);
      // Register-field parts are slice lvalues and lower like any other
      // slice assignment; plain parts assign directly.
      match part.k {
        LExprKind::Slices(base, ss, ty) => {
          match lower_slice_assign(self.ctx, span, *base, &ss, ty.as_deref(), value) {
            Ok(mut ss) => out.append(&mut ss),
            Err(e) => { failed = Some(e); break }
          }
        }
        k => out.push(walk_stmt(self, StmtKind::Assign(k.at(span), value).at(span))),
      }
    }
    if let Some(e) = failed {
      self.failed = Some(e);
      return Action::Change(vec![])
    }
    Action::Change(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::{assert_idempotent, run_one};

  #[test]
  fn bittuple_assignment_splits_per_part() {
    let (_, ds) = run_one(&mut BitTupleLowering,
      "func F(x : bits(8)) => bits(8)\nbegin\n  \
       var hi : bits(4);\n  var lo : bits(4);\n  [hi, lo] = x;\n  \
       return lo ++ hi;\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let assigns: Vec<_> = body.iter().filter(|s| {
      matches!(&s.k, StmtKind::Assign(lhs, _) if matches!(lhs.k, LExprKind::Var(_)))
    }).collect();
    assert_eq!(assigns.len(), 2, "{body:#?}");
  }

  #[test]
  fn complex_rhs_is_bound_once() {
    let (_, ds) = run_one(&mut BitTupleLowering,
      "func G() => bits(8)\nbegin\n  return Zeros(8);\nend\n\
       func F()\nbegin\n  var hi : bits(4);\n  var lo : bits(4);\n  \
       [hi, lo] = G();\nend");
    let DeclKind::FunDefn(_, body) = &ds[1].k else { panic!() };
    let decls = body.iter().filter(|s| {
      matches!(&s.k, StmtKind::VarDecl { init, .. } if init.to_string().contains("G"))
    }).count();
    assert_eq!(decls, 1, "the call is evaluated exactly once: {body:#?}");
  }

  #[test]
  fn bittuple_lowering_is_idempotent() {
    assert_idempotent(&mut BitTupleLowering,
      "func F(x : bits(8))\nbegin\n  var hi : bits(4);\n  var lo : bits(4);\n  \
       [hi, lo] = x;\nend");
  }
}
