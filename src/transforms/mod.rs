//! The staged rewrite pipeline from typed AST to monomorphic AST.
//!
//! Passes run in a fixed registered order; each assumes its predecessors
//! have run and is idempotent on its own output. The pipeline takes the
//! typechecker's output (resolved calls, typed slices) and leaves an AST
//! the C emitter can translate directly: no surface sugar, no tuples, no
//! `case`, no getters/setters, no polymorphic widths, and every constrained
//! integer carried in a bounded representation.

pub mod desugar;
pub mod slices;
pub mod bittuple;
pub mod tuples;
pub mod case;
pub mod getset;
pub mod constprop;
pub mod hoist;
pub mod mono;
pub mod bounds;
pub mod wrap;

use crate::error::Result;
use crate::symbol::Symbol;
use crate::types::ast::*;
use crate::types::entity::GlobalEnv;
use crate::types::{Ident, NameSupply};

/// Shared state a pass may use: the global environment and a supply of
/// fresh temporaries. The environment may only be mutated by the pass
/// currently running.
pub struct Ctx<'a> {
  /// The session environment, extended by passes that synthesize
  /// declarations (tuple records, monomorphic clones).
  pub env: &'a mut GlobalEnv,
  /// Temporaries for statements the passes introduce.
  pub supply: NameSupply,
}

impl Ctx<'_> {
  /// A fresh temporary identifier.
  pub fn fresh(&mut self, prefix: &str) -> Ident { self.supply.fresh(prefix) }
}

/// One registered rewrite over the whole declaration list.
pub trait Transform {
  /// The pass name, for tracing and failure messages.
  fn name(&self) -> &'static str;
  /// Rewrite the program.
  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>>;
}

/// Options selecting the optional tail passes.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
  /// Route global accesses through this thread-local pointer name.
  pub thread_local_pointer: Option<Symbol>,
}

/// The registered pipeline, in its fixed order.
#[must_use] pub fn registry(config: &PipelineConfig) -> Vec<Box<dyn Transform>> {
  let mut passes: Vec<Box<dyn Transform>> = vec![
    Box::new(desugar::Desugar),
    Box::new(slices::SliceLowering),
    Box::new(bittuple::BitTupleLowering),
    Box::new(tuples::TupleElimination),
    Box::new(case::CaseLowering),
    Box::new(getset::GetterSetterInlining),
    Box::new(constprop::ConstPropagation),
    Box::new(hoist::LetHoisting),
    Box::new(mono::Monomorphize),
    Box::new(bounds::IntBoundsLowering),
  ];
  if let Some(ptr) = config.thread_local_pointer {
    passes.push(Box::new(wrap::GlobalWrapping { ptr }));
  }
  passes
}

/// Run the whole pipeline over a typechecked program.
pub fn run_pipeline(
  env: &mut GlobalEnv, config: &PipelineConfig, mut decls: Vec<Decl>,
) -> Result<Vec<Decl>> {
  let mut ctx = Ctx { env, supply: NameSupply::new() };
  for mut pass in registry(config) {
    tracing::debug!(pass = pass.name(), "transform");
    decls = pass.run(&mut ctx, decls)?;
  }
  Ok(decls)
}

// Expression-building helpers shared by the passes. Short-circuit booleans
// keep their operator form; generated arithmetic uses the resolved integer
// primitives so it folds and emits like checked source code.

pub(crate) fn bin(op: Binop, a: Expr, b: Expr) -> Expr {
  ExprKind::Binop(op, Box::new(a), Box::new(b)).synth()
}

pub(crate) fn apply(name: &str, params: Vec<Expr>, args: Vec<Expr>) -> Expr {
  ExprKind::TApply(Ident::from_str(name), params, args, ThrowsTag::NoThrow).synth()
}

pub(crate) fn add_e(a: Expr, b: Expr) -> Expr { apply("add_int", vec![], vec![a, b]) }
pub(crate) fn sub_e(a: Expr, b: Expr) -> Expr { apply("sub_int", vec![], vec![a, b]) }
pub(crate) fn mul_e(a: Expr, b: Expr) -> Expr { apply("mul_int", vec![], vec![a, b]) }

/// Read an lvalue back as an expression, for read-modify-write rewrites.
/// Getter-backed locations read through their getter.
pub(crate) fn lexpr_read(e: &LExpr) -> Option<Expr> {
  Some(match &e.k {
    LExprKind::Var(x) => ExprKind::Var(*x).at(e.span),
    LExprKind::Field(b, f) => ExprKind::Field(Box::new(lexpr_read(b)?), *f).at(e.span),
    LExprKind::Index(a, i) =>
      ExprKind::Index(Box::new(lexpr_read(a)?), i.clone()).at(e.span),
    LExprKind::Slices(b, ss, ty) =>
      ExprKind::Slices(Box::new(lexpr_read(b)?), ss.clone(), ty.clone()).at(e.span),
    LExprKind::ReadWrite(getter, _, params) =>
      ExprKind::TApply(*getter, params.clone(), vec![], ThrowsTag::NoThrow).at(e.span),
    LExprKind::Wildcard | LExprKind::Fields(..) | LExprKind::Tuple(_) |
    LExprKind::BitTuple(..) | LExprKind::Write(..) => return None,
  })
}

#[cfg(test)]
pub(crate) mod testutil {
  use super::*;
  use crate::infer::{CheckConfig, TypeChecker};
  use crate::lexer::lex;
  use crate::parser::parse;

  /// Lex, parse, and typecheck a program against a fresh prelude.
  pub fn typecheck(src: &str) -> (GlobalEnv, Vec<Decl>) {
    let ts = lex("test.asl", src).expect("lexes");
    let r = parse(&ts);
    assert!(r.errors.is_empty(), "parse errors: {:?}", r.errors);
    let mut env = GlobalEnv::with_prelude();
    let decls = {
      let mut tc = TypeChecker::new(&mut env, CheckConfig {
        max_errors: 1,
        ..CheckConfig::default()
      });
      tc.check_program(r.decls).expect("typechecks")
    };
    (env, decls)
  }

  /// Run a single pass over a typechecked program.
  pub fn run_one(pass: &mut dyn Transform, src: &str) -> (GlobalEnv, Vec<Decl>) {
    let (mut env, decls) = typecheck(src);
    let decls = {
      let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
      pass.run(&mut ctx, decls).expect("pass runs")
    };
    (env, decls)
  }

  /// A pass rerun on its own output must be structurally stable.
  pub fn assert_idempotent(pass: &mut dyn Transform, src: &str) {
    let (mut env, decls) = typecheck(src);
    let once = {
      let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
      pass.run(&mut ctx, decls).expect("first run")
    };
    let twice = {
      let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
      pass.run(&mut ctx, once.clone()).expect("second run")
    };
    assert_eq!(once, twice, "pass must be idempotent");
  }
}
