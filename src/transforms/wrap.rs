//! Global wrapping: the optional final pass that routes every global
//! variable access through a named thread-local pointer, so several
//! simulator instances can share one compiled image.

use hashbrown::HashSet;
use crate::error::Result;
use crate::symbol::Symbol;
use crate::transforms::{Ctx, Transform};
use crate::types::ast::*;
use crate::types::entity::Entity;
use crate::types::Ident;
use crate::visitor::{Action, Visitor, visit_decl};

/// The global wrapping pass.
pub struct GlobalWrapping {
  /// The thread-local pointer every access indirects through.
  pub ptr: Symbol,
}

impl Transform for GlobalWrapping {
  fn name(&self) -> &'static str { "global-wrapping" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let globals: HashSet<Symbol> = ctx.env.globals.iter()
      .filter(|(_, e)| matches!(e, Entity::Var(_)))
      .map(|(s, _)| *s)
      .collect();
    let mut v = WrapVisitor { ptr: Ident::new(self.ptr), globals };
    Ok(decls.into_iter().map(|d| visit_decl(&mut v, d)).collect())
  }
}

struct WrapVisitor {
  ptr: Ident,
  globals: HashSet<Symbol>,
}

impl WrapVisitor {
  fn is_global(&self, x: Ident) -> bool {
    x.tag == 0 && self.globals.contains(&x.name)
  }
}

impl Visitor for WrapVisitor {
  fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
    if let ExprKind::Var(x) = &e.k {
      if self.is_global(*x) {
        return Action::Change(
          ExprKind::Field(Box::new(var(self.ptr)), *x).at(e.span))
      }
    }
    Action::DoChildren
  }

  fn visit_lexpr(&mut self, e: &LExpr) -> Action<LExpr> {
    if let LExprKind::Var(x) = &e.k {
      if self.is_global(*x) {
        return Action::Change(
          LExprKind::Field(Box::new(LExprKind::Var(self.ptr).at(e.span)), *x).at(e.span))
      }
    }
    Action::DoChildren
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::intern;
  use crate::transforms::testutil::typecheck;
  use crate::types::NameSupply;

  #[test]
  fn global_accesses_route_through_the_pointer() {
    let (mut env, decls) = typecheck(
      "var integer g;\n\
       func F() => integer\nbegin\n  g = g + 1;\n  return g;\nend");
    let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
    let ds = GlobalWrapping { ptr: intern("__state") }
      .run(&mut ctx, decls).expect("runs");
    let DeclKind::FunDefn(_, body) = &ds[1].k else { panic!() };
    let StmtKind::Assign(lhs, rhs) = &body[0].k else { panic!() };
    assert!(matches!(&lhs.k, LExprKind::Field(b, _)
      if matches!(&b.k, LExprKind::Var(p) if p.name.as_str() == "__state")), "{lhs:?}");
    assert!(rhs.to_string().contains("__state"), "{rhs}");
  }

  #[test]
  fn locals_and_constants_stay_direct() {
    let (mut env, decls) = typecheck(
      "constant integer N = 2;\n\
       func F(x : integer) => integer\nbegin\n  return x + N;\nend");
    let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
    let ds = GlobalWrapping { ptr: intern("__state") }
      .run(&mut ctx, decls).expect("runs");
    let DeclKind::FunDefn(_, body) = &ds[1].k else { panic!() };
    assert!(!format!("{:?}", body[0]).contains("__state"), "constants are not wrapped");
  }
}
