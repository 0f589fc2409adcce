//! Constant propagation: globally declared constants are inlined into
//! expressions and constant subexpressions are folded, leaving literals
//! wherever the program's value is fixed at compile time.
//!
//! Folding preserves observable failure: a division whose divisor is a
//! literal zero stays in the tree for its runtime check to catch.

use num::BigInt;
use crate::consteval::{ConstSource, fold};
use crate::error::Result;
use crate::transforms::{Ctx, Transform};
use crate::types::ast::*;
use crate::types::entity::{Entity, GlobalEnv};
use crate::types::Ident;
use crate::value::Value;
use crate::visitor::{Action, Visitor, visit_decl};

/// The constant propagation pass.
pub struct ConstPropagation;

impl Transform for ConstPropagation {
  fn name(&self) -> &'static str { "constant-propagation" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut v = PropVisitor { env: ctx.env };
    Ok(decls.into_iter().map(|d| visit_decl(&mut v, d)).collect())
  }
}

struct PropVisitor<'a> {
  env: &'a GlobalEnv,
}

struct EnvConsts<'a>(&'a GlobalEnv);

impl ConstSource for EnvConsts<'_> {
  fn lookup(&self, name: Ident) -> Option<Value> {
    if name.tag != 0 { return None }
    if let Some(Entity::EnumMember(_, idx)) = self.0.globals.get(&name.name) {
      return Some(Value::Int(BigInt::from(*idx)))
    }
    let e = self.0.consts.get(&name.name)?;
    fold(e, &EnvConsts(self.0))
  }
}

impl Visitor for PropVisitor<'_> {
  fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
    // Enumeration member references stay symbolic; the emitter prints
    // their names.
    if let ExprKind::Var(x) = &e.k {
      if matches!(self.env.globals.get(&x.name), Some(Entity::EnumMember(..))) {
        return Action::SkipChildren
      }
    }
    match fold(e, &EnvConsts(self.env)) {
      Some(v) => Action::Change(ExprKind::Lit(v).at(e.span)),
      None => Action::DoChildren,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::{assert_idempotent, run_one};

  #[test]
  fn global_constants_inline_and_fold() {
    let (_, ds) = run_one(&mut ConstPropagation,
      "constant integer N = 8;\n\
       func F() => integer\nbegin\n  return N * 2 + 1;\nend");
    let DeclKind::FunDefn(_, body) = &ds[1].k else { panic!() };
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    assert_eq!(e.to_string(), "17");
  }

  #[test]
  fn zero_divisor_survives_folding() {
    let (_, ds) = run_one(&mut ConstPropagation,
      "func F() => integer\nbegin\n  return 1 QUOT 0;\nend");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    let ret = body.iter().rev().find_map(|s| match &s.k {
      StmtKind::Return(Some(e)) => Some(e),
      _ => None,
    }).expect("return");
    assert!(ret.to_string().contains("zdiv_int"), "{ret}");
  }

  #[test]
  fn propagation_is_idempotent() {
    assert_idempotent(&mut ConstPropagation,
      "constant integer N = 4;\n\
       func F(x : bits(4)) => boolean\nbegin\n  return UInt(x) < 2 ^ N;\nend");
  }
}
