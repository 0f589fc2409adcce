//! Monomorphization: every call whose width parameters are known integer
//! literals is redirected to a clone of the callee specialised to those
//! widths. The clone's name carries a stable suffix derived from the
//! concrete widths, plus a fresh disambiguation tag.
//!
//! Specialisation cascades: each new clone is itself scanned for
//! polymorphic calls. Termination holds because each distinct
//! `(callee, width-tuple)` pair is cloned at most once. A polymorphic call
//! reachable from monomorphic code whose parameters do not reduce to
//! literals is an error naming that call, since nothing downstream can
//! represent it.

use hashbrown::HashMap;
use num::BigInt;
use crate::consteval::{NoConsts, fold_int};
use crate::error::{Error, Result};
use crate::infer::{subst_expr, subst_ty};
use crate::transforms::{Ctx, Transform};
use crate::types::ast::*;
use crate::types::entity::FunType;
use crate::types::{Ident, Spanned};
use crate::visitor::{Action, Visitor, visit_decl};

/// The monomorphization pass.
pub struct Monomorphize;

impl Transform for Monomorphize {
  fn name(&self) -> &'static str { "monomorphization" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    // Definitions of width-polymorphic functions, by tagged name. These are
    // templates: they are cloned per width tuple and dropped from the
    // output.
    let mut templates: HashMap<Ident, Decl> = HashMap::new();
    let mut kept: Vec<Decl> = vec![];
    for d in decls {
      let poly = match &d.k {
        DeclKind::FunDefn(sig, _) => ctx.env.fun_by_ident(sig.name)
          .is_some_and(|ft| !ft.params.is_empty()),
        DeclKind::FunType(sig) => ctx.env.fun_by_ident(sig.name)
          .is_some_and(|ft| !ft.params.is_empty()),
        _ => false,
      };
      if poly {
        if let DeclKind::FunDefn(sig, _) = &d.k {
          templates.insert(sig.name, d.clone());
        }
        // Polymorphic prototypes and templates have no monomorphic
        // counterpart; their clones are appended below.
      } else {
        kept.push(d);
      }
    }

    let mut mono = Mono {
      ctx,
      templates,
      cache: HashMap::new(),
      queue: vec![],
      failed: None,
    };
    let mut out: Vec<Decl> = kept.into_iter()
      .map(|d| visit_decl(&mut mono, d))
      .collect();
    // Cascade: newly created clones are scanned in turn.
    while let Some(d) = mono.queue.pop() {
      let d = visit_decl(&mut mono, d);
      out.push(d);
    }
    match mono.failed.take() {
      Some(e) => Err(e),
      None => Ok(out),
    }
  }
}

struct Mono<'a, 'b> {
  ctx: &'a mut Ctx<'b>,
  templates: HashMap<Ident, Decl>,
  cache: HashMap<(Ident, Vec<BigInt>), Ident>,
  queue: Vec<Decl>,
  failed: Option<Error>,
}

impl Mono<'_, '_> {
  /// The specialised name for a width tuple: stable suffix, fresh tag.
  fn specialise(&mut self, f: Ident, widths: Vec<BigInt>) -> Result<Ident> {
    if let Some(&name) = self.cache.get(&(f, widths.clone())) {
      return Ok(name)
    }
    let template = self.templates.get(&f)
      .cloned()
      .ok_or_else(|| Error::Internal(format!("no definition to specialise for `{f}`")))?;
    let Spanned { span, k: DeclKind::FunDefn(sig, body) } = template else {
      return Err(Error::Internal("template is not a definition".into()))
    };
    let ft = self.ctx.env.fun_by_ident(f)
      .cloned()
      .ok_or_else(|| Error::Internal(format!("unregistered function `{f}`")))?;
    let suffix: String = widths.iter()
      .map(|w| if w.sign() == num::bigint::Sign::Minus {
        format!("m{}", w.magnitude())
      } else {
        w.to_string()
      })
      .collect::<Vec<_>>()
      .join("_");
    let base = crate::symbol::intern(&format!("{}__{}", f.name, suffix));
    let name = self.ctx.env.tags.fresh_tag(base);
    self.cache.insert((f, widths.clone()), name);

    // Substitute the parameters by their literal widths throughout.
    let map: HashMap<Ident, Expr> = ft.params.iter()
      .zip(&widths)
      .map(|(p, w)| (Ident::new(p.name), lit_int(w.clone())))
      .collect();
    let args: Vec<FormalArg> = sig.args.iter().map(|a| FormalArg {
      name: a.name,
      ty: subst_ty(&a.ty, &map),
      default: a.default.as_ref().map(|d| subst_expr(d, &map)),
    }).collect();
    let rty = sig.rty.as_ref().map(|t| subst_ty(t, &map));
    let body: Vec<Stmt> = {
      struct Subst<'m>(&'m HashMap<Ident, Expr>);
      impl Visitor for Subst<'_> {
        fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
          if let ExprKind::Var(x) = &e.k {
            if let Some(r) = self.0.get(x) {
              return Action::Change(r.clone())
            }
          }
          Action::DoChildren
        }
      }
      crate::visitor::visit_stmts(&mut Subst(&map), body)
    };
    let new_sig = FunSig {
      name,
      kind: sig.kind,
      args: args.clone(),
      rty: rty.clone(),
      throws: sig.throws,
    };
    // Register the monomorphic funtype so later passes can look it up.
    let new_ft = FunType {
      name,
      kind: ft.kind,
      params: vec![],
      args: args.iter().map(|a| (a.name, a.ty.clone())).collect(),
      defaults: args.iter().map(|a| a.default.clone()).collect(),
      rty,
      throws: ft.throws,
      loc: span,
    };
    let map_ref = if new_ft.kind == FuncKind::Setter {
      &mut self.ctx.env.setters
    } else {
      &mut self.ctx.env.funs
    };
    map_ref.entry(name.name).or_default().push(new_ft);
    self.queue.push(DeclKind::FunDefn(new_sig, body).at(span));
    Ok(name)
  }

  fn rewrite_call(
    &mut self, span: crate::types::Loc, f: Ident, params: Vec<Expr>, args: Vec<Expr>,
    throws: ThrowsTag,
  ) -> Result<(Ident, Vec<Expr>, Vec<Expr>, ThrowsTag)> {
    if params.is_empty() || !self.templates.contains_key(&f) {
      return Ok((f, params, args, throws))
    }
    let mut widths = Vec::with_capacity(params.len());
    for p in &params {
      match fold_int(p, &NoConsts) {
        Some(n) => widths.push(n),
        None => return Err(Error::Unimplemented(span,
          format!("call to `{f}` whose width parameter `{p}` is not a constant"))),
      }
    }
    let name = self.specialise(f, widths)?;
    Ok((name, vec![], args, throws))
  }
}

impl Visitor for Mono<'_, '_> {
  fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
    if self.failed.is_some() { return Action::SkipChildren }
    if matches!(e.k, ExprKind::TApply(..)) {
      return Action::ChangeDoChildrenPost(e.clone())
    }
    Action::DoChildren
  }

  fn post_expr(&mut self, e: Expr) -> Expr {
    let Spanned { span, k } = e;
    let ExprKind::TApply(f, params, args, throws) = k else {
      return Spanned { span, k }
    };
    match self.rewrite_call(span, f, params, args, throws) {
      Ok((f, params, args, throws)) =>
        ExprKind::TApply(f, params, args, throws).at(span),
      Err(err) => {
        if self.failed.is_none() { self.failed = Some(err) }
        ExprKind::TApply(f, vec![], vec![], throws).at(span)
      }
    }
  }

  fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
    if self.failed.is_some() { return Action::SkipChildren }
    if let StmtKind::TCall(f, params, args, throws) = &s.k {
      // Arguments first, then the call itself.
      let args: Vec<Expr> = args.iter()
        .map(|a| crate::visitor::visit_expr(self, a.clone()))
        .collect();
      match self.rewrite_call(s.span, *f, params.clone(), args, *throws) {
        Ok((f, params, args, throws)) =>
          return Action::Change(vec![StmtKind::TCall(f, params, args, throws).at(s.span)]),
        Err(err) => {
          if self.failed.is_none() { self.failed = Some(err) }
          return Action::Change(vec![])
        }
      }
    }
    Action::DoChildren
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::constprop::ConstPropagation;
  use crate::transforms::testutil::typecheck;
  use crate::types::NameSupply;

  const POLY: &str =
    "func Parity(x : bits(N), N : integer) => bits(1)\n\
     begin\n  return x[0 +: 1];\nend\n\
     func Use(a : bits(8), b : bits(16)) => bits(1)\n\
     begin\n  return Parity(a, 8) XOR Parity(b, 16);\nend";

  fn run_mono(src: &str) -> Vec<Decl> {
    let (mut env, decls) = typecheck(src);
    let decls = {
      let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
      let decls = ConstPropagation.run(&mut ctx, decls).expect("constprop");
      Monomorphize.run(&mut ctx, decls).expect("mono")
    };
    decls
  }

  #[test]
  fn calls_redirect_to_width_clones() {
    let ds = run_mono(POLY);
    // The polymorphic template is gone; two clones exist.
    assert!(!ds.iter().any(|d| matches!(&d.k,
      DeclKind::FunDefn(sig, _) if sig.name.name.as_str() == "Parity")));
    let clones: Vec<&FunSig> = ds.iter().filter_map(|d| match &d.k {
      DeclKind::FunDefn(sig, _) if sig.name.name.as_str().starts_with("Parity__") =>
        Some(sig),
      _ => None,
    }).collect();
    assert_eq!(clones.len(), 2, "{ds:#?}");
    let use_body = ds.iter().find_map(|d| match &d.k {
      DeclKind::FunDefn(sig, body) if sig.name.name.as_str() == "Use" => Some(body),
      _ => None,
    }).expect("caller kept");
    let ret = use_body.iter().rev().find_map(|s| match &s.k {
      StmtKind::Return(Some(e)) => Some(e.to_string()),
      _ => None,
    }).expect("return");
    assert!(ret.contains("Parity__8") && ret.contains("Parity__16"), "{ret}");
  }

  #[test]
  fn same_width_tuple_clones_once() {
    let ds = run_mono(
      "func Id(x : bits(N), N : integer) => bits(N)\nbegin\n  return x;\nend\n\
       func Use(a : bits(8), b : bits(8)) => bits(8)\nbegin\n  \
       return Id(a, 8) AND Id(b, 8);\nend");
    let clones = ds.iter().filter(|d| matches!(&d.k,
      DeclKind::FunDefn(sig, _) if sig.name.name.as_str() == "Id__8")).count();
    assert_eq!(clones, 1, "{ds:#?}");
  }

  #[test]
  fn symbolic_width_in_monomorphic_context_is_an_error() {
    let (mut env, decls) = typecheck(
      "func MakeZ(n : integer) => bits(n)\nbegin\n  return Zeros(n);\nend\n\
       func Use(w : integer)\nbegin\n  - = MakeZ(w);\nend");
    let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
    let err = Monomorphize.run(&mut ctx, decls).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("MakeZ"), "names the untreated call: {msg}");
  }

  #[test]
  fn mono_is_idempotent_on_its_output() {
    let ds = run_mono(POLY);
    let (mut env, _) = typecheck(POLY);
    let mut ctx = Ctx { env: &mut env, supply: NameSupply::new() };
    let again = Monomorphize.run(&mut ctx, ds.clone()).expect("second run");
    assert_eq!(ds, again);
  }
}
