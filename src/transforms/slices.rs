//! Bitslice lowering: every slice form is first normalised to the single
//! `lo +: w` shape, then reads become `get_slice` calls and slice
//! assignments become `set_slice` read-modify-writes.
//!
//! Multi-slice reads turn into concatenations; multi-slice lvalues are
//! split into one assignment per slice, consuming the right-hand side from
//! the high end down. Integer bases are sliced through shift-and-truncate.

use crate::error::{Error, Result};
use crate::transforms::{Ctx, Transform, add_e, apply, lexpr_read};
use crate::transforms::desugar::slice_lo_wd;
use crate::types::ast::*;
use crate::types::Spanned;
use crate::visitor::{Action, Visitor, visit_decl, visit_expr, visit_lexpr};

/// The slice lowering pass.
pub struct SliceLowering;

impl Transform for SliceLowering {
  fn name(&self) -> &'static str { "bitslice-lowering" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut v = SliceVisitor { ctx, failed: None };
    let out = decls.into_iter().map(|d| visit_decl(&mut v, d)).collect();
    match v.failed.take() {
      Some(e) => Err(e),
      None => Ok(out),
    }
  }
}

struct SliceVisitor<'a, 'b> {
  ctx: &'a mut Ctx<'b>,
  failed: Option<Error>,
}

/// The width expression of a typed slice base, if it is a bitvector.
fn base_width(ty: Option<&Type>) -> Option<Expr> {
  match ty {
    Some(Type::Bits(w, _)) => Some((**w).clone()),
    _ => None,
  }
}

impl Visitor for SliceVisitor<'_, '_> {
  fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
    match &e.k {
      ExprKind::Slices(..) => Action::ChangeDoChildrenPost(e.clone()),
      _ => Action::DoChildren,
    }
  }

  fn post_expr(&mut self, e: Expr) -> Expr {
    let Spanned { span, k } = e;
    let ExprKind::Slices(base, ss, ty) = k else { return Spanned { span, k } };
    let mut parts: Vec<Expr> = Vec::with_capacity(ss.len());
    let mut widths: Vec<Expr> = Vec::with_capacity(ss.len());
    for s in &ss {
      let (lo, w) = slice_lo_wd(s);
      let part = match base_width(ty.as_deref()) {
        Some(n) => apply("get_slice", vec![n, w.clone()],
          vec![(*base).clone(), lo, w.clone()]),
        // An integer base: shift down and truncate.
        None => apply("cvt_int_bits", vec![],
          vec![
            apply("shr_int", vec![], vec![(*base).clone(), lo]),
            w.clone(),
          ]),
      };
      widths.push(w);
      parts.push(part);
    }
    match parts.len() {
      1 => {
        let part = parts.into_iter().next().expect("one part");
        Spanned { span, k: part.k }
      }
      _ => Spanned { span, k: ExprKind::Concat(widths, parts) },
    }
  }

  fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
    if self.failed.is_some() { return Action::SkipChildren }
    let StmtKind::Assign(lhs, _) = &s.k else { return Action::DoChildren };
    if !matches!(lhs.k, LExprKind::Slices(..)) { return Action::DoChildren }
    let StmtKind::Assign(lhs, rhs) = s.k.clone() else { unreachable!() };
    // Lower the right-hand side and the inner slice expressions first.
    let rhs = visit_expr(self, rhs);
    let Spanned { span, k } = lhs;
    let LExprKind::Slices(base, ss, ty) = k else { unreachable!() };
    let base = visit_lexpr(self, *base);
    let ss = ss.into_iter().map(|s| {
      let (lo, w) = slice_lo_wd(&s);
      Slice::LoWd(visit_expr(self, lo), visit_expr(self, w))
    }).collect::<Vec<_>>();
    match lower_slice_assign(self.ctx, span, base, &ss, ty.as_deref(), rhs) {
      Ok(out) => Action::Change(out),
      Err(e) => {
        self.failed = Some(e);
        Action::Change(vec![])
      }
    }
  }
}

/// Lower `base[slices] = rhs` into `set_slice` read-modify-writes. The
/// slice expressions and the right-hand side must already be lowered.
pub(crate) fn lower_slice_assign(
  ctx: &mut Ctx<'_>, span: crate::types::Loc, base: LExpr, ss: &[Slice],
  ty: Option<&Type>, rhs: Expr,
) -> Result<Vec<Stmt>> {
  let Some(read) = lexpr_read(&base) else {
    return Err(Error::Unimplemented(span, "slice assignment to this location".into()))
  };
  let Some(n) = base_width(ty) else {
    return Err(Error::Unimplemented(span, "slice assignment to a non-bitvector".into()))
  };
  let normalized: Vec<(Expr, Expr)> = ss.iter().map(slice_lo_wd).collect();
  if normalized.is_empty() {
    return Err(Error::Unimplemented(span, "empty slice list".into()))
  }
  // Bind the value once, then write each slice from the high end down.
  let mut out = vec![];
  let (tmp, init) = match &rhs.k {
    ExprKind::Var(x) => (*x, None),
    _ => (ctx.fresh("__v"), Some(rhs)),
  };
  let total = normalized.iter().skip(1).fold(
    normalized[0].1.clone(),
    |acc, (_, w)| add_e(acc, w.clone()),
  );
  if let Some(init) = init {
    out.push(StmtKind::VarDecl {
      constant: true,
      item: DeclItem::Var(tmp, Some(Type::bits(total.clone()))),
      init,
    }.at(span));
  }
  if let [(lo, w)] = &normalized[..] {
    let updated = apply("set_slice", vec![n, w.clone()],
      vec![read, lo.clone(), w.clone(), var(tmp)]);
    out.push(StmtKind::Assign(base, updated).at(span));
    return Ok(out)
  }
  let mut consumed = lit_int(0);
  for (lo, w) in normalized.into_iter().rev() {
    let part = apply("get_slice", vec![total.clone(), w.clone()],
      vec![var(tmp), consumed.clone(), w.clone()]);
    consumed = add_e(consumed, w.clone());
    let updated = apply("set_slice", vec![n.clone(), w.clone()],
      vec![read.clone(), lo, w, part]);
    out.push(StmtKind::Assign(base.clone(), updated).at(span));
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::{assert_idempotent, run_one};

  fn lowered(src: &str) -> Vec<Decl> {
    run_one(&mut SliceLowering, src).1
  }

  #[test]
  fn read_forms_become_get_slice() {
    let ds = lowered(
      "func F(x : bits(8)) => bits(4)\nbegin\n  return x[7:4];\nend\n\
       func G(x : bits(8)) => bits(4)\nbegin\n  return x[4 +: 4];\nend\n\
       func H(x : bits(8)) => bits(4)\nbegin\n  return x[7 -: 4];\nend\n\
       func E(x : bits(16), i : integer {0..1}) => bits(8)\nbegin\n  \
       return x[i *: 8];\nend",
    );
    for d in &ds {
      let DeclKind::FunDefn(_, body) = &d.k else { continue };
      let ret = body.iter().rev().find_map(|s| match &s.k {
        StmtKind::Return(Some(e)) => Some(e),
        _ => None,
      }).expect("return");
      assert!(ret.to_string().contains("get_slice"), "{ret}");
    }
  }

  #[test]
  fn multi_slice_read_concatenates() {
    let ds = lowered(
      "func F(x : bits(8)) => bits(2)\nbegin\n  return x[7, 0];\nend",
    );
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    assert!(matches!(&e.k, ExprKind::Concat(ws, ps) if ws.len() == 2 && ps.len() == 2), "{e}");
  }

  #[test]
  fn slice_assignment_becomes_set_slice() {
    let ds = lowered(
      "func F()\nbegin\n  var x : bits(8);\n  x[3:0] = '1111';\nend",
    );
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let assign = body.iter().find_map(|s| match &s.k {
      StmtKind::Assign(lhs, rhs) if matches!(lhs.k, LExprKind::Var(_)) => Some(rhs),
      _ => None,
    }).expect("lowered assignment");
    assert!(assign.to_string().contains("set_slice"), "{assign}");
  }

  #[test]
  fn zero_width_slice_survives() {
    // A zero-width slice still evaluates its base for effects.
    let ds = lowered(
      "func F(x : bits(8), i : integer {0..8}) => bits(0)\nbegin\n  \
       return x[i +: 0];\nend",
    );
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let ret = body.iter().rev().find_map(|s| match &s.k {
      StmtKind::Return(Some(e)) => Some(e),
      _ => None,
    }).expect("return");
    assert!(ret.to_string().contains("get_slice"), "{ret}");
  }

  #[test]
  fn slice_lowering_is_idempotent() {
    assert_idempotent(&mut SliceLowering,
      "func F(x : bits(8)) => bits(4)\nbegin\n  return x[7:4];\nend");
  }
}
