//! Getter/setter inlining: every remaining `read-write` and `write` lvalue
//! becomes plain calls to the resolved accessor functions.
//!
//! Reads through getters were already resolved to calls by the
//! typechecker; this pass finishes the writing side. A plain assignment
//! through a setter is a single call; a compound update (a field or slice
//! of a getter-backed location) reads through the getter into a
//! temporary, updates it, and writes it back.

use crate::error::{Error, Result};
use crate::transforms::{Ctx, Transform};
use crate::types::ast::*;
use crate::types::Spanned;
use crate::visitor::{Action, Visitor, visit_decl, visit_expr};

/// The getter/setter inlining pass.
pub struct GetterSetterInlining;

impl Transform for GetterSetterInlining {
  fn name(&self) -> &'static str { "getter-setter-inlining" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut v = GetSetVisitor { ctx, failed: None };
    let out = decls.into_iter().map(|d| visit_decl(&mut v, d)).collect();
    match v.failed.take() {
      Some(e) => Err(e),
      None => Ok(out),
    }
  }
}

struct GetSetVisitor<'a, 'b> {
  ctx: &'a mut Ctx<'b>,
  failed: Option<Error>,
}

impl Visitor for GetSetVisitor<'_, '_> {
  fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
    if self.failed.is_some() { return Action::SkipChildren }
    let StmtKind::Assign(lhs, _) = &s.k else { return Action::DoChildren };
    if !lexpr_uses_accessor(lhs) { return Action::DoChildren }
    let StmtKind::Assign(lhs, rhs) = s.k.clone() else { unreachable!() };
    let span = s.span;
    let rhs = visit_expr(self, rhs);
    match self.lower(span, lhs, rhs) {
      Ok(out) => Action::Change(out),
      Err(e) => {
        self.failed = Some(e);
        Action::Change(vec![])
      }
    }
  }
}

fn lexpr_uses_accessor(e: &LExpr) -> bool {
  match &e.k {
    LExprKind::ReadWrite(..) | LExprKind::Write(..) => true,
    LExprKind::Field(b, _) | LExprKind::Fields(b, _) | LExprKind::Index(b, _) |
    LExprKind::Slices(b, ..) => lexpr_uses_accessor(b),
    LExprKind::Tuple(es) => es.iter().any(lexpr_uses_accessor),
    LExprKind::BitTuple(_, es) => es.iter().any(lexpr_uses_accessor),
    LExprKind::Wildcard | LExprKind::Var(_) => false,
  }
}

impl GetSetVisitor<'_, '_> {
  fn lower(&mut self, span: crate::types::Loc, lhs: LExpr, rhs: Expr) -> Result<Vec<Stmt>> {
    match lhs.k {
      // Direct assignment through the setter.
      LExprKind::Write(setter, params, mut args) => {
        args.push(rhs);
        Ok(vec![StmtKind::TCall(setter, params, args, ThrowsTag::NoThrow).at(span)])
      }
      LExprKind::ReadWrite(_, setter, params) => {
        Ok(vec![StmtKind::TCall(setter, params, vec![rhs], ThrowsTag::NoThrow).at(span)])
      }
      // A compound update: read, modify a temporary, write back.
      LExprKind::Field(base, f) if lexpr_uses_accessor(&base) => {
        let (mut out, tmp, writeback) = self.open_accessor(span, *base)?;
        out.push(StmtKind::Assign(
          LExprKind::Field(Box::new(LExprKind::Var(tmp).at(span)), f).at(span),
          rhs,
        ).at(span));
        out.push(writeback);
        Ok(out)
      }
      LExprKind::Index(base, i) if lexpr_uses_accessor(&base) => {
        let (mut out, tmp, writeback) = self.open_accessor(span, *base)?;
        out.push(StmtKind::Assign(
          LExprKind::Index(Box::new(LExprKind::Var(tmp).at(span)), i).at(span),
          rhs,
        ).at(span));
        out.push(writeback);
        Ok(out)
      }
      k => Err(Error::Unimplemented(span,
        format!("assignment through accessor in `{k:?}`"))),
    }
  }

  /// Read a getter-backed location into a fresh temporary and produce the
  /// statement that writes it back through the setter.
  fn open_accessor(
    &mut self, span: crate::types::Loc, base: LExpr,
  ) -> Result<(Vec<Stmt>, crate::types::Ident, Stmt)> {
    let Spanned { k, .. } = base;
    let LExprKind::ReadWrite(getter, setter, params) = k else {
      return Err(Error::Unimplemented(span, "nested accessor update".into()))
    };
    let tmp = self.ctx.fresh("__g");
    let read = ExprKind::TApply(getter, params.clone(), vec![], ThrowsTag::NoThrow).synth();
    let decl = StmtKind::VarDecl {
      constant: false,
      item: DeclItem::Var(tmp, None),
      init: read,
    }.at(span);
    let writeback =
      StmtKind::TCall(setter, params, vec![var(tmp)], ThrowsTag::NoThrow).at(span);
    Ok((vec![decl], tmp, writeback))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::{assert_idempotent, run_one};

  const ACCESSORS: &str =
    "var bits(8) _r;\n\
     getter R => bits(8)\nbegin\n  return _r;\nend\n\
     setter R = v : bits(8)\nbegin\n  _r = v;\nend\n";

  #[test]
  fn plain_assignment_becomes_setter_call() {
    let (_, ds) = run_one(&mut GetterSetterInlining,
      &format!("{ACCESSORS}func F()\nbegin\n  R = Zeros(8);\nend"));
    let body = ds.iter().find_map(|d| match &d.k {
      DeclKind::FunDefn(sig, body) if sig.name.name.as_str() == "F" => Some(body),
      _ => None,
    }).expect("defn");
    assert!(matches!(&body[0].k,
      StmtKind::TCall(f, ..) if f.name.as_str().ends_with(".write")), "{body:#?}");
  }

  #[test]
  fn inlining_is_idempotent() {
    assert_idempotent(&mut GetterSetterInlining,
      &format!("{ACCESSORS}func F()\nbegin\n  R = Zeros(8);\nend"));
  }
}
