//! Tuple elimination: functions returning tuples return generated record
//! types instead, and tuple-shaped bindings become per-component accesses
//! through a fresh temporary.
//!
//! The generated record for a function `F` is `__Return_F` with fields
//! `r0, r1, …` in tuple order, so the rewrite is deterministic and the
//! emitted code diffs cleanly across runs. Tuple-valued conditional
//! expressions become `if`/`else` statements that assign each component
//! separately.

use crate::error::{Error, Result};
use crate::transforms::{Ctx, Transform};
use crate::types::ast::*;
use crate::types::entity::TypeTc;
use crate::types::{Ident, Loc, Spanned};
use crate::visitor::{Action, Visitor, visit_decl, visit_stmts};

/// The tuple elimination pass.
pub struct TupleElimination;

impl Transform for TupleElimination {
  fn name(&self) -> &'static str { "tuple-elimination" }

  fn run(&mut self, ctx: &mut Ctx<'_>, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    // First give every tuple-returning function its record type and adjust
    // returns, so call-site rewrites can rely on record-valued calls.
    let mut records: Vec<Decl> = vec![];
    let mut retype = |ctx: &mut Ctx<'_>, span, sig: &mut FunSig, records: &mut Vec<Decl>| {
      if let Some(Type::Tuple(tys)) = &sig.rty {
        let rec = make_return_record(ctx, span, sig.name, tys, records);
        sig.rty = Some(Type::named(rec));
        update_env_rty(ctx, sig, rec);
        Some(rec)
      } else {
        None
      }
    };
    let mut decls: Vec<Decl> = decls.into_iter().map(|d| {
      let Spanned { span, k } = d;
      let k = match k {
        DeclKind::FunDefn(mut sig, body) => {
          match retype(ctx, span, &mut sig, &mut records) {
            Some(rec) => {
              let body = rewrite_returns(rec, body);
              DeclKind::FunDefn(sig, body)
            }
            None => DeclKind::FunDefn(sig, body),
          }
        }
        DeclKind::FunType(mut sig) => {
          retype(ctx, span, &mut sig, &mut records);
          DeclKind::FunType(sig)
        }
        DeclKind::BuiltinFunc(mut sig) => {
          retype(ctx, span, &mut sig, &mut records);
          DeclKind::BuiltinFunc(sig)
        }
        k => k,
      };
      Spanned { span, k }
    }).collect();

    // Then rewrite tuple-shaped bindings and assignments.
    let mut v = BindVisitor { ctx, failed: None };
    decls = decls.into_iter().map(|d| visit_decl(&mut v, d)).collect();
    if let Some(e) = v.failed.take() { return Err(e) }

    records.extend(decls);
    Ok(records)
  }
}

/// Field names `r0, r1, …`.
fn field_name(i: usize) -> Ident { Ident::from_str(&format!("r{i}")) }

fn make_return_record(
  ctx: &mut Ctx<'_>, span: Loc, fun: Ident, tys: &[Type], records: &mut Vec<Decl>,
) -> Ident {
  let name = Ident::from_str(&format!("__Return_{fun}"));
  if !ctx.env.types.contains_key(&name.name) {
    let fields: Vec<(Ident, Type)> = tys.iter().enumerate()
      .map(|(i, t)| (field_name(i), t.clone()))
      .collect();
    ctx.env.types.insert(name.name, Spanned::new(span, TypeTc::Record {
      params: vec![],
      fields: fields.clone(),
    }));
    records.push(DeclKind::Record(name, vec![], fields).at(span));
  }
  name
}

/// Point the environment's funtype at the record so later passes agree.
fn update_env_rty(ctx: &mut Ctx<'_>, sig: &FunSig, rec: Ident) {
  let map = if sig.kind == FuncKind::Setter { &mut ctx.env.setters } else { &mut ctx.env.funs };
  if let Some(fts) = map.get_mut(&sig.name.name) {
    for ft in fts {
      if ft.name == sig.name {
        ft.rty = Some(Type::named(rec));
      }
    }
  }
}

fn rewrite_returns(rec: Ident, body: Vec<Stmt>) -> Vec<Stmt> {
  struct Returns {
    rec: Ident,
  }
  impl Visitor for Returns {
    fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
      if let StmtKind::Return(Some(Spanned { k: ExprKind::Tuple(es), span })) = &s.k {
        let fields = es.iter().enumerate()
          .map(|(i, e)| (field_name(i), e.clone()))
          .collect();
        let e = ExprKind::Record(self.rec, vec![], fields).at(*span);
        return Action::Change(vec![StmtKind::Return(Some(e)).at(s.span)])
      }
      Action::DoChildren
    }
  }
  visit_stmts(&mut Returns { rec }, body)
}

struct BindVisitor<'a, 'b> {
  ctx: &'a mut Ctx<'b>,
  failed: Option<Error>,
}

impl Visitor for BindVisitor<'_, '_> {
  fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
    if self.failed.is_some() { return Action::SkipChildren }
    match &s.k {
      StmtKind::VarDecl { item: DeclItem::Tuple(_), .. } => {
        let StmtKind::VarDecl { constant, item, init } = s.k.clone() else { unreachable!() };
        let DeclItem::Tuple(items) = item else { unreachable!() };
        match self.lower_bind(s.span, constant, items, init) {
          Ok(out) => {
            let out = visit_stmts(self, out);
            Action::Change(out)
          }
          Err(e) => {
            self.failed = Some(e);
            Action::Change(vec![])
          }
        }
      }
      StmtKind::Assign(Spanned { k: LExprKind::Tuple(_), .. }, _) => {
        let StmtKind::Assign(lhs, rhs) = s.k.clone() else { unreachable!() };
        let LExprKind::Tuple(parts) = lhs.k else { unreachable!() };
        match self.lower_assign(s.span, parts, rhs) {
          Ok(out) => {
            let out = visit_stmts(self, out);
            Action::Change(out)
          }
          Err(e) => {
            self.failed = Some(e);
            Action::Change(vec![])
          }
        }
      }
      _ => Action::DoChildren,
    }
  }
}

impl BindVisitor<'_, '_> {
  /// `let (x, y) = init;` with the components of `init` distributed.
  fn lower_bind(
    &mut self, span: Loc, constant: bool, items: Vec<DeclItem>, init: Expr,
  ) -> Result<Vec<Stmt>> {
    match init.k {
      // A literal tuple binds componentwise.
      ExprKind::Tuple(es) => {
        if es.len() != items.len() {
          return Err(Error::Internal("tuple arity changed after checking".into()))
        }
        Ok(items.into_iter().zip(es).map(|(item, e)| {
          StmtKind::VarDecl { constant, item, init: e }.at(span)
        }).collect())
      }
      // A conditional distributes into a statement `if`.
      ExprKind::If(arms, els) => {
        let mut out = vec![];
        let mut names = vec![];
        for item in &items {
          let DeclItem::Var(x, Some(ty)) = item else {
            return Err(Error::Unimplemented(span, "untyped tuple component".into()))
          };
          out.push(StmtKind::VarDeclsNoInit(ty.clone(), vec![*x]).at(span));
          names.push(LExprKind::Var(*x).at(span));
        }
        let mk_branch = |v: &mut Self, e: Expr| -> Result<Vec<Stmt>> {
          v.lower_assign(span, names.clone(), e)
        };
        let mut if_arms = vec![];
        for (c, t) in arms {
          if_arms.push((c, mk_branch(self, t)?));
        }
        let els = mk_branch(self, *els)?;
        out.push(StmtKind::If(if_arms, els).at(span));
        Ok(out)
      }
      // Anything else is record-valued after the return rewrite: bind a
      // temporary and project the fields.
      k => {
        let tmp = self.ctx.fresh("__r");
        let mut out = vec![StmtKind::VarDecl {
          constant: true,
          item: DeclItem::Var(tmp, None),
          init: Spanned::new(init.span, k),
        }.at(span)];
        for (i, item) in items.into_iter().enumerate() {
          let e = ExprKind::Field(Box::new(var(tmp)), field_name(i)).synth();
          out.push(StmtKind::VarDecl { constant, item, init: e }.at(span));
        }
        Ok(out)
      }
    }
  }

  /// `(a, b) = rhs;` with the components of `rhs` distributed.
  fn lower_assign(&mut self, span: Loc, parts: Vec<LExpr>, rhs: Expr) -> Result<Vec<Stmt>> {
    match rhs.k {
      ExprKind::Tuple(es) => {
        if es.len() != parts.len() {
          return Err(Error::Internal("tuple arity changed after checking".into()))
        }
        Ok(parts.into_iter().zip(es).map(|(p, e)| {
          StmtKind::Assign(p, e).at(span)
        }).collect())
      }
      ExprKind::If(arms, els) => {
        let mut if_arms = vec![];
        for (c, t) in arms {
          if_arms.push((c, self.lower_assign(span, parts.clone(), t)?));
        }
        let els = self.lower_assign(span, parts, *els)?;
        Ok(vec![StmtKind::If(if_arms, els).at(span)])
      }
      k => {
        let tmp = self.ctx.fresh("__r");
        let mut out = vec![StmtKind::VarDecl {
          constant: true,
          item: DeclItem::Var(tmp, None),
          init: Spanned::new(rhs.span, k),
        }.at(span)];
        for (i, p) in parts.into_iter().enumerate() {
          let e = ExprKind::Field(Box::new(var(tmp)), field_name(i)).synth();
          out.push(StmtKind::Assign(p, e).at(span));
        }
        Ok(out)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transforms::testutil::{assert_idempotent, run_one};

  const DIVMOD: &str =
    "func DivMod(x : integer, y : integer {1..1000}) => (integer, integer)\n\
     begin\n  return (x DIVRM y, x MOD y);\nend\n\
     func Use(x : integer) => integer\nbegin\n  \
     let (q, r) = DivMod(x, 3);\n  return q + r;\nend";

  #[test]
  fn tuple_return_becomes_record() {
    let (env, ds) = run_one(&mut TupleElimination, DIVMOD);
    // A record declaration was generated and registered.
    let rec = ds.iter().find_map(|d| match &d.k {
      DeclKind::Record(name, _, fields) if name.name.as_str().starts_with("__Return_") =>
        Some((name, fields)),
      _ => None,
    }).expect("generated record");
    assert_eq!(rec.1.len(), 2);
    assert_eq!(rec.1[0].0, Ident::from_str("r0"));
    assert!(env.types.contains_key(&rec.0.name));
    // The definition now returns the record.
    let defn = ds.iter().find_map(|d| match &d.k {
      DeclKind::FunDefn(sig, body) if sig.name.name.as_str() == "DivMod" =>
        Some((sig, body)),
      _ => None,
    }).expect("defn");
    assert!(matches!(&defn.0.rty, Some(Type::Constructor(n, _))
      if n.name.as_str().starts_with("__Return_")));
    let StmtKind::Return(Some(e)) = &defn.1.last().expect("stmt").k else { panic!() };
    assert!(matches!(&e.k, ExprKind::Record(..)), "{e}");
  }

  #[test]
  fn call_site_projects_through_temporary() {
    let (_, ds) = run_one(&mut TupleElimination, DIVMOD);
    let body = ds.iter().find_map(|d| match &d.k {
      DeclKind::FunDefn(sig, body) if sig.name.name.as_str() == "Use" => Some(body),
      _ => None,
    }).expect("defn");
    // One temporary binding plus two projections.
    let projections = body.iter().filter(|s| {
      matches!(&s.k, StmtKind::VarDecl { init, .. }
        if matches!(&init.k, ExprKind::Field(..)))
    }).count();
    assert_eq!(projections, 2, "{body:#?}");
  }

  #[test]
  fn tuple_elimination_is_idempotent() {
    assert_idempotent(&mut TupleElimination, DIVMOD);
  }
}
