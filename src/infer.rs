//! The typechecker.
//!
//! Bidirectional checking over the parsed AST: [`TypeChecker::tc_expr`]
//! infers a type while rewriting the expression to its resolved form (calls
//! carry a concrete overload tag, synthesized type-level parameters, and a
//! throws tag; slices carry the underlying type), [`TypeChecker::check_expr`]
//! additionally verifies subtype satisfaction against an expected type, and
//! [`TypeChecker::tc_stmt`] may expand one statement into several when
//! runtime checks need fresh bindings and assertions.
//!
//! Width and constraint obligations that survive constant folding are
//! decided by the shared SMT session under the current scope assumptions.

use hashbrown::HashSet;
use if_chain::if_chain;
use num::BigInt;
use smallvec::SmallVec;
use crate::consteval::{self, ConstSource, fold, fold_int};
use crate::error::{Error, Result};
use crate::smt::Solver;
use crate::symbol::{Symbol, intern};
use crate::types::ast::*;
use crate::types::entity::{Entity, FunType, GlobalEnv, TypeTc, VarInfo};
use crate::types::{Ident, Loc, NameSupply, Spanned};
use crate::value::Value;

/// Typechecker knobs, taken from the session configuration.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct CheckConfig {
  /// Whether to insert runtime bounds/division assertions.
  pub runtime_checks: bool,
  /// Diagnostics to recover from before giving up.
  pub max_errors: usize,
  /// Soft SMT time limit per query.
  pub smt_timeout_ms: Option<u64>,
}

impl Default for CheckConfig {
  fn default() -> Self {
    CheckConfig { runtime_checks: true, max_errors: 10, smt_timeout_ms: Some(5000) }
  }
}

/// One lexical scope: a persistent snapshot of everything visible, plus the
/// names this scope itself declared (for same-scope conflict checks) and
/// the assumption level to restore on exit. Keyed by the full tagged
/// identifier so generated temporaries never collide with each other.
#[derive(Debug)]
struct Scope {
  vars: im::HashMap<Ident, VarInfo>,
  /// Values of immutable bindings whose initialisers fold, so width
  /// equalities close without a solver round trip.
  consts: im::HashMap<Ident, Value>,
  owned: HashSet<Ident>,
  assum_mark: usize,
}

/// The typechecker state for one session.
#[derive(Debug)]
pub struct TypeChecker<'a> {
  /// The global environment, extended as declarations check.
  pub env: &'a mut GlobalEnv,
  config: CheckConfig,
  solver: Solver,
  scopes: Vec<Scope>,
  /// Boolean facts known in the current scope, for entailment.
  assumptions: Vec<Expr>,
  /// Fresh temporaries for inserted checks; reset per function body.
  supply: NameSupply,
  /// Bindings inserted by runtime checks, lifted to statement level.
  pending_lets: Vec<(Ident, Type, Expr)>,
  /// Assertions inserted by runtime checks, lifted to statement level.
  pending_checks: Vec<Expr>,
  /// The return type of the function being checked.
  rty: Option<Type>,
  /// Diagnostics recovered so far.
  pub errors: Vec<Error>,
}

/// Resolves global constants, and optionally the local immutable bindings
/// of the scope being checked, for folding and entailment.
struct Consts<'a> {
  env: &'a GlobalEnv,
  locals: Option<&'a im::HashMap<Ident, Value>>,
}

impl<'a> Consts<'a> {
  fn global(env: &'a GlobalEnv) -> Self { Consts { env, locals: None } }
}

impl ConstSource for Consts<'_> {
  fn lookup(&self, name: Ident) -> Option<Value> {
    if let Some(v) = self.locals.and_then(|m| m.get(&name)) {
      return Some(v.clone())
    }
    if name.tag != 0 { return None }
    if let Some(Entity::EnumMember(_, idx)) = self.env.globals.get(&name.name) {
      return Some(Value::Int(BigInt::from(*idx)))
    }
    let e = self.env.consts.get(&name.name)?;
    fold(e, &Consts::global(self.env))
  }
}

impl<'a> TypeChecker<'a> {
  /// A checker over `env` with the given configuration.
  pub fn new(env: &'a mut GlobalEnv, config: CheckConfig) -> Self {
    let solver = Solver::new(config.smt_timeout_ms);
    TypeChecker {
      env,
      config,
      solver,
      scopes: vec![],
      assumptions: vec![],
      supply: NameSupply::new(),
      pending_lets: vec![],
      pending_checks: vec![],
      rty: None,
      errors: vec![],
    }
  }

  /// Typecheck a whole program, recovering from up to the configured number
  /// of diagnostics. Returns the rewritten declarations and the recovered
  /// diagnostics; an `Err` means the limit was exceeded.
  pub fn check_program(&mut self, decls: Vec<Decl>) -> Result<Vec<Decl>> {
    let mut out = vec![];
    for d in decls {
      match self.tc_declaration(d) {
        Ok(mut ds) => {
          // Nothing should survive a declaration; a leftover means a
          // type-level check could not be attached anywhere useful.
          if !self.pending_checks.is_empty() || !self.pending_lets.is_empty() {
            tracing::warn!("dropping unattached checks from a declaration");
            self.pending_checks.clear();
            self.pending_lets.clear();
          }
          out.append(&mut ds)
        }
        Err(e) => {
          if self.errors.len() + 1 >= self.config.max_errors {
            return Err(e)
          }
          tracing::debug!("recovered: {e}");
          self.errors.push(e);
        }
      }
    }
    Ok(out)
  }

  // ------------------------------------------------------------- scopes

  fn push_scope(&mut self) {
    let (vars, consts) = self.scopes.last()
      .map(|s| (s.vars.clone(), s.consts.clone()))
      .unwrap_or_default();
    self.scopes.push(Scope {
      vars, consts, owned: HashSet::new(), assum_mark: self.assumptions.len(),
    });
  }

  /// The constant source for the current scope.
  fn consts(&self) -> Consts<'_> {
    Consts { env: self.env, locals: self.scopes.last().map(|s| &s.consts) }
  }

  fn pop_scope(&mut self) {
    let s = self.scopes.pop().expect("scope underflow");
    self.assumptions.truncate(s.assum_mark);
  }

  fn declare_local(&mut self, vi: VarInfo) -> Result<()> {
    let scope = self.scopes.last_mut().expect("no open scope");
    if !scope.owned.insert(vi.name) {
      return Err(Error::Type(vi.loc, format!("`{}` is already defined in this scope", vi.name)))
    }
    scope.vars.insert(vi.name, vi);
    Ok(())
  }

  fn lookup_local(&self, name: Ident) -> Option<&VarInfo> {
    self.scopes.last().and_then(|s| s.vars.get(&name))
  }

  fn assume(&mut self, e: Expr) {
    self.assumptions.push(e)
  }

  fn entails(&mut self, goal: &Expr) -> Result<bool> {
    let consts = Consts {
      env: self.env,
      locals: self.scopes.last().map(|s| &s.consts),
    };
    self.solver.entails(&self.assumptions, goal, &consts)
  }

  fn entails_eq(&mut self, a: &Expr, b: &Expr) -> Result<bool> {
    let consts = Consts {
      env: self.env,
      locals: self.scopes.last().map(|s| &s.consts),
    };
    self.solver.entails_eq(&self.assumptions, a, b, &consts)
  }

  // -------------------------------------------------------------- types

  /// Typecheck a surface type: resolve abbreviations, check constructor
  /// arities, and typecheck the embedded expressions.
  pub fn tc_type(&mut self, loc: Loc, ty: Type) -> Result<Type> {
    Ok(match ty {
      Type::Integer(None) => Type::Integer(None),
      Type::Integer(Some(cs)) => {
        let cs = cs.into_iter().map(|c| self.tc_constraint(c)).collect::<Result<_>>()?;
        Type::Integer(Some(cs))
      }
      Type::Bits(w, fields) => {
        let w = self.check_expr(&Type::integer(), *w)?;
        Type::Bits(Box::new(w), fields)
      }
      Type::Constructor(name, args) => {
        let args = args.into_iter()
          .map(|e| self.check_expr(&Type::integer(), e))
          .collect::<Result<Vec<_>>>()?;
        let Some(tc) = self.env.types.get(&name.name).map(|s| s.k.clone()) else {
          return Err(Error::UnknownObject(loc, "type", name))
        };
        match tc {
          TypeTc::Abbrev { params, ty } => {
            if params.len() != args.len() {
              return Err(Error::DoesNotMatch(loc, "type arguments",
                params.len().to_string(), args.len().to_string()))
            }
            let map = params.into_iter().zip(args).collect();
            let ty = subst_ty(&ty, &map);
            self.tc_type(loc, ty)?
          }
          TypeTc::Record { params, .. } => {
            if params.len() != args.len() {
              return Err(Error::DoesNotMatch(loc,
                "type parameters", params.len().to_string(), args.len().to_string()))
            }
            Type::Constructor(name, args)
          }
          TypeTc::ForwardDeclared => Type::Forward(name),
          _ => Type::Constructor(name, args),
        }
      }
      Type::Forward(name) => Type::Forward(name),
      Type::OfExpr(e) => {
        let (_, t) = self.tc_expr(*e)?;
        t
      }
      Type::Array(ix, ety) => {
        let ix = match *ix {
          IxType::Int(e) => {
            // A lone name may be an enumeration used as an index domain.
            if_chain! {
              if let ExprKind::Var(x) = &e.k;
              if x.tag == 0;
              if matches!(self.env.types.get(&x.name),
                Some(Spanned { k: TypeTc::Enum(_), .. }));
              then { IxType::Enum(*x) }
              else { IxType::Int(self.check_expr(&Type::integer(), e)?) }
            }
          }
          ix @ IxType::Enum(_) => ix,
        };
        Type::Array(Box::new(ix), Box::new(self.tc_type(loc, *ety)?))
      }
      Type::Tuple(tys) => Type::Tuple(
        tys.into_iter().map(|t| self.tc_type(loc, t)).collect::<Result<_>>()?,
      ),
    })
  }

  fn tc_constraint(&mut self, c: Constraint) -> Result<Constraint> {
    Ok(match c {
      Constraint::Single(e) => Constraint::Single(self.check_expr(&Type::integer(), e)?),
      Constraint::Range(lo, hi) => Constraint::Range(
        self.check_expr(&Type::integer(), lo)?,
        self.check_expr(&Type::integer(), hi)?,
      ),
    })
  }

  /// Structural compatibility, ignoring the dependent parts. Used to filter
  /// overload candidates before parameters are synthesized.
  fn compat(&self, actual: &Type, formal: &Type) -> bool {
    match (actual, formal) {
      (Type::Integer(_), Type::Integer(_)) => true,
      (Type::Bits(..), Type::Bits(..)) => true,
      (Type::Constructor(a, _) | Type::Forward(a), Type::Constructor(b, _) | Type::Forward(b)) =>
        a.name == b.name,
      (Type::Array(_, a), Type::Array(_, b)) => self.compat(a, b),
      (Type::Tuple(a), Type::Tuple(b)) =>
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.compat(x, y)),
      // A mask literal is acceptable wherever equal-width bits are.
      (Type::Constructor(a, _), Type::Bits(..)) if a.name == intern("__mask") => true,
      _ => false,
    }
  }

  /// Subtype satisfaction: structural equality with provably equal
  /// widths/indices, and constraint-set inclusion on the left.
  fn satisfies(&mut self, actual: &Type, expected: &Type) -> Result<bool> {
    match (actual, expected) {
      (Type::Integer(_), Type::Integer(None)) => Ok(true),
      (Type::Integer(None), Type::Integer(Some(_))) => Ok(false),
      (Type::Integer(Some(cs_l)), Type::Integer(Some(cs_r))) => {
        // Fully folded constraint sets decide by interval containment.
        if let Some(decided) = self.constraint_subset_folded(cs_l, cs_r) {
          return Ok(decided)
        }
        let x = self.fresh_var("__c");
        let lhs = membership(&var(x), cs_l);
        let rhs = membership(&var(x), cs_r);
        let goal = ExprKind::Binop(Binop::Implies, Box::new(lhs), Box::new(rhs)).synth();
        self.entails(&goal)
      }
      (Type::Bits(w1, _), Type::Bits(w2, _)) => self.entails_eq(w1, w2),
      // A non-parameterised expected constructor accepts any instantiation
      // of the same name (e.g. a mask of any width where `__mask` is due).
      (Type::Constructor(a, _), Type::Constructor(b, ys))
        if a.name == b.name && ys.is_empty() => Ok(true),
      (Type::Constructor(a, xs), Type::Constructor(b, ys)) => {
        if a.name != b.name || xs.len() != ys.len() { return Ok(false) }
        for (x, y) in xs.iter().zip(ys) {
          if !self.entails_eq(x, y)? { return Ok(false) }
        }
        Ok(true)
      }
      (Type::Forward(a), Type::Forward(b)) => Ok(a.name == b.name),
      (Type::Forward(a), Type::Constructor(b, ys)) |
      (Type::Constructor(a, ys), Type::Forward(b)) =>
        Ok(a.name == b.name && ys.is_empty()),
      (Type::Array(ix1, t1), Type::Array(ix2, t2)) => {
        let ix_ok = match (&**ix1, &**ix2) {
          (IxType::Enum(a), IxType::Enum(b)) => a.name == b.name,
          (IxType::Int(a), IxType::Int(b)) => self.entails_eq(a, b)?,
          _ => false,
        };
        Ok(ix_ok && self.satisfies(t1, t2)?)
      }
      (Type::Tuple(a), Type::Tuple(b)) => {
        if a.len() != b.len() { return Ok(false) }
        for (x, y) in a.iter().zip(b) {
          if !self.satisfies(x, y)? { return Ok(false) }
        }
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  /// Decide constraint-set inclusion when every endpoint folds to a
  /// literal; `None` when some endpoint is symbolic or no single range
  /// covers a left-hand range.
  fn constraint_subset_folded(&self, cs_l: &[Constraint], cs_r: &[Constraint]) -> Option<bool> {
    let consts = Consts {
      env: self.env,
      locals: self.scopes.last().map(|s| &s.consts),
    };
    let fold_c = |c: &Constraint| -> Option<(BigInt, BigInt)> {
      match c {
        Constraint::Single(e) => {
          let n = fold_int(e, &consts)?;
          Some((n.clone(), n))
        }
        Constraint::Range(lo, hi) => Some((fold_int(lo, &consts)?, fold_int(hi, &consts)?)),
      }
    };
    let rs: Vec<(BigInt, BigInt)> = cs_r.iter().map(&fold_c).collect::<Option<_>>()?;
    for c in cs_l {
      let (lo, hi) = fold_c(c)?;
      if !rs.iter().any(|(rlo, rhi)| *rlo <= lo && hi <= *rhi) {
        // Coverage by the union of several ranges goes to the solver.
        if rs.iter().any(|(rlo, rhi)| !(hi < *rlo || *rhi < lo)) { return None }
        return Some(false)
      }
    }
    Some(true)
  }

  /// The least common type of two branch results. Constrained integers
  /// join by constraint-set union; everything else must agree one way or
  /// the other.
  fn join(&mut self, loc: Loc, a: Type, b: Type) -> Result<Type> {
    match (a, b) {
      (Type::Integer(Some(mut x)), Type::Integer(Some(y))) => {
        for c in y {
          if !x.contains(&c) { x.push(c) }
        }
        Ok(Type::Integer(Some(x)))
      }
      (Type::Integer(_), Type::Integer(_)) => Ok(Type::Integer(None)),
      (a, b) => {
        if self.satisfies(&a, &b)? { return Ok(b) }
        if self.satisfies(&b, &a)? { return Ok(a) }
        Err(Error::DoesNotMatch(loc, "branch type", a.to_string(), b.to_string()))
      }
    }
  }

  fn require_satisfies(&mut self, loc: Loc, actual: &Type, expected: &Type) -> Result<()> {
    if self.satisfies(actual, expected)? {
      Ok(())
    } else {
      Err(Error::DoesNotMatch(loc, "type", expected.to_string(), actual.to_string()))
    }
  }

  // -------------------------------------------------------- expressions

  fn fresh_var(&mut self, prefix: &str) -> Ident { self.supply.fresh(prefix) }

  /// Bind `e` to a fresh temporary unless it is already safe to replicate.
  /// The temporary is in scope immediately; its declaration statement is
  /// flushed with the enclosing statement.
  fn stabilise(&mut self, e: Expr, ty: &Type) -> Expr {
    match &e.k {
      ExprKind::Lit(_) | ExprKind::Var(_) => e,
      _ => {
        let t = self.fresh_var("__t");
        if !self.scopes.is_empty() {
          let _ = self.declare_local(VarInfo {
            name: t,
            loc: e.span,
            ty: ty.clone(),
            is_local: true,
            is_constant: true,
          });
        }
        self.pending_lets.push((t, ty.clone(), e));
        var(t)
      }
    }
  }

  /// Typecheck a subexpression whose evaluation is conditional: runtime
  /// checks and bindings raised inside it wrap the expression itself (as
  /// `__let`/`__assert` forms) instead of hoisting to statement level,
  /// where they would run unconditionally.
  fn guarded(
    &mut self, f: impl FnOnce(&mut Self) -> Result<(Expr, Type)>,
  ) -> Result<(Expr, Type)> {
    let mark_lets = self.pending_lets.len();
    let mark_checks = self.pending_checks.len();
    let (mut e, t) = f(self)?;
    for c in self.pending_checks.split_off(mark_checks) {
      e = ExprKind::Assert(Box::new(c), Box::new(e)).synth();
    }
    for (x, ty, init) in self.pending_lets.split_off(mark_lets).into_iter().rev() {
      e = ExprKind::Let(x, Box::new(ty), Box::new(init), Box::new(e)).synth();
    }
    Ok((e, t))
  }

  fn runtime_check(&mut self, cond: Expr) {
    if self.config.runtime_checks {
      // Skip checks that are already provable.
      if let Ok(true) = self.entails(&cond.clone()) { return }
      self.pending_checks.push(cond);
    }
  }

  /// Typecheck and rewrite an expression, returning its inferred type.
  pub fn tc_expr(&mut self, e: Expr) -> Result<(Expr, Type)> {
    let Spanned { span, k } = e;
    match k {
      ExprKind::Lit(v) => {
        let ty = self.lit_type(&v);
        Ok((ExprKind::Lit(v).at(span), ty))
      }
      ExprKind::Var(x) => self.tc_var(span, x),
      ExprKind::Field(e, f) => self.tc_field(span, *e, f),
      ExprKind::Fields(e, fs) => self.tc_fields(span, *e, fs),
      ExprKind::Index(a, i) => self.tc_index(span, *a, *i),
      ExprKind::Slices(e, ss, _) => self.tc_slices(span, *e, ss),
      ExprKind::Record(name, params, fields) => self.tc_record(span, name, params, fields),
      ExprKind::WithChanges(e, changes) => self.tc_with(span, *e, changes),
      ExprKind::If(arms, els) => {
        let boolean = Type::named(Ident::from_str("boolean"));
        let mut out = Vec::with_capacity(arms.len());
        let mut arm_tys = vec![];
        for (c, t) in arms {
          let c = self.check_expr(&boolean, c)?;
          let (t, ty) = self.guarded(|tc| tc.tc_expr(t))?;
          arm_tys.push(ty);
          out.push((c, t));
        }
        let (els, ety) = self.guarded(|tc| tc.tc_expr(*els))?;
        let mut ty = ety;
        for t in arm_tys { ty = self.join(span, t, ty)? }
        Ok((ExprKind::If(out, Box::new(els)).at(span), ty))
      }
      ExprKind::Let(x, ty, e1, e2) => {
        let ty = self.tc_type(span, *ty)?;
        let e1 = self.check_expr(&ty, *e1)?;
        self.push_scope();
        self.declare_local(VarInfo {
          name: x, loc: span, ty: ty.clone(), is_local: true, is_constant: true,
        })?;
        let r = self.tc_expr(*e2);
        self.pop_scope();
        let (e2, rty) = r?;
        Ok((ExprKind::Let(x, Box::new(ty), Box::new(e1), Box::new(e2)).at(span), rty))
      }
      ExprKind::Assert(c, e) => {
        let boolean = Type::named(Ident::from_str("boolean"));
        let c = self.check_expr(&boolean, *c)?;
        let (e, ty) = self.tc_expr(*e)?;
        Ok((ExprKind::Assert(Box::new(c), Box::new(e)).at(span), ty))
      }
      ExprKind::Call(name, args) => self.tc_call(span, name, args, false),
      ExprKind::TApply(name, params, args, throws) => {
        // Already resolved; occurs when transforms re-check generated code.
        let ft = self.env.fun_by_ident(name)
          .ok_or(Error::UnknownObject(span, "function", name))?;
        let rty = ft.rty.clone().unwrap_or(Type::Tuple(vec![]));
        Ok((ExprKind::TApply(name, params, args, throws).at(span), rty))
      }
      ExprKind::Tuple(es) => {
        let mut out = Vec::with_capacity(es.len());
        let mut tys = Vec::with_capacity(es.len());
        for e in es {
          let (e, t) = self.tc_expr(e)?;
          out.push(e);
          tys.push(t);
        }
        Ok((ExprKind::Tuple(out).at(span), Type::Tuple(tys)))
      }
      ExprKind::Concat(_, es) => {
        let mut out = Vec::with_capacity(es.len());
        let mut widths = Vec::with_capacity(es.len());
        for e in es {
          let (e, t) = self.tc_expr(e)?;
          widths.push(self.width_of(e.span, &t)?);
          out.push(e);
        }
        let total = sum_exprs(&widths);
        Ok((ExprKind::Concat(widths, out).at(span), Type::bits(total)))
      }
      ExprKind::Unop(op, a) => {
        let (a, aty) = self.tc_expr(*a)?;
        let cands: Vec<Ident> = self.env.op1_candidates(op).to_vec();
        self.resolve_overload(span, &format!("{op}"), &cands, vec![(None, a, aty)])
      }
      ExprKind::Binop(op, a, b) => {
        // The short-circuit forms keep their shape so evaluation order
        // stays explicit all the way to emission; their right operand is
        // conditionally evaluated.
        if matches!(op, Binop::BoolAnd | Binop::BoolOr | Binop::Implies) {
          let boolean = Type::named(Ident::from_str("boolean"));
          let (a, aty) = self.tc_expr(*a)?;
          self.require_satisfies(a.span, &aty, &boolean)?;
          let (b, bty) = self.guarded(|tc| tc.tc_expr(*b))?;
          self.require_satisfies(b.span, &bty, &boolean)?;
          return Ok((ExprKind::Binop(op, Box::new(a), Box::new(b)).at(span), boolean))
        }
        let (a, aty) = self.tc_expr(*a)?;
        let (b, bty) = self.tc_expr(*b)?;
        let cands: Vec<Ident> = self.env.op2_candidates(op).to_vec();
        self.resolve_binop(span, op, cands, a, aty, b, bty)
      }
      ExprKind::AsConstraint(e, cs) => {
        let (e, ty) = self.tc_expr(*e)?;
        self.require_satisfies(span, &ty, &Type::integer())?;
        let cs = cs.into_iter().map(|c| self.tc_constraint(c)).collect::<Result<Vec<_>>>()?;
        let e = self.stabilise(e, &Type::integer());
        self.runtime_check(membership(&e, &cs));
        Ok((e, Type::Integer(Some(cs))))
      }
      ExprKind::AsType(e, ty) => {
        let ty = self.tc_type(span, *ty)?;
        let (e, ety) = self.tc_expr(*e)?;
        if self.satisfies(&ety, &ty)? {
          return Ok((e, ty))
        }
        // Allowed where a runtime check can bridge the gap: an integer
        // narrowed to a constrained integer.
        if_chain! {
          if let Type::Integer(Some(cs)) = &ty;
          if matches!(ety, Type::Integer(_));
          then {
            let e = self.stabilise(e, &Type::integer());
            self.runtime_check(membership(&e, cs));
            return Ok((e, ty.clone()))
          }
        }
        Err(Error::DoesNotMatch(span, "type", ty.to_string(), ety.to_string()))
      }
      ExprKind::ArrayInit(es) => {
        let mut out = Vec::with_capacity(es.len());
        let mut ty = None;
        for e in es {
          let (e, t) = self.tc_expr(e)?;
          if let Some(prev) = &ty { self.require_satisfies(e.span, &t, prev)? }
          else { ty = Some(t) }
          out.push(e);
        }
        let ety = ty.ok_or(Error::Type(span, "empty array initialiser".into()))?;
        let n = lit_int(out.len() as i64);
        Ok((ExprKind::ArrayInit(out).at(span),
          Type::Array(Box::new(IxType::Int(n)), Box::new(ety))))
      }
      ExprKind::Unknown(ty) => {
        let ty = self.tc_type(span, *ty)?;
        Ok((ExprKind::Unknown(Box::new(ty.clone())).at(span), ty))
      }
      ExprKind::In(e, p) => {
        let (e, ty) = self.tc_expr(*e)?;
        let p = self.tc_pattern(span, *p, &ty)?;
        let boolean = Type::named(Ident::from_str("boolean"));
        Ok((ExprKind::In(Box::new(e), Box::new(p)).at(span), boolean))
      }
    }
  }

  /// Typecheck against an expected type, verifying satisfaction.
  pub fn check_expr(&mut self, expected: &Type, e: Expr) -> Result<Expr> {
    let span = e.span;
    let (e, ty) = self.tc_expr(e)?;
    if self.satisfies(&ty, expected)? {
      return Ok(e)
    }
    // A plain integer flowing into a constrained slot becomes a runtime
    // membership check rather than a static rejection.
    if_chain! {
      if let Type::Integer(Some(cs)) = expected;
      if matches!(ty, Type::Integer(_));
      then {
        let e = self.stabilise(e, &Type::integer());
        self.runtime_check(membership(&e, cs));
        return Ok(e)
      }
    }
    Err(Error::DoesNotMatch(span, "type", expected.to_string(), ty.to_string()))
  }

  fn lit_type(&self, v: &Value) -> Type {
    match v {
      Value::Int(n) => Type::Integer(Some(vec![
        Constraint::Single(ExprKind::Lit(Value::Int(n.clone())).synth()),
      ])),
      Value::SInt(s) => Type::Constructor(
        Ident::from_str("__sint"), vec![lit_int(i64::from(s.width))]),
      Value::Bits(b) => Type::bits(lit_int(i64::from(b.width))),
      Value::Mask(m) => Type::Constructor(
        Ident::from_str("__mask"), vec![lit_int(i64::from(m.width))]),
      Value::Bool(_) => Type::named(Ident::from_str("boolean")),
      Value::String(_) => Type::named(Ident::from_str("string")),
      Value::Tuple(_) | Value::Array(_) | Value::Record(_) =>
        Type::Tuple(vec![]),
      Value::Enum(e, _) => Type::named(*e),
    }
  }

  fn tc_var(&mut self, span: Loc, x: Ident) -> Result<(Expr, Type)> {
    if let Some(vi) = self.lookup_local(x) {
      return Ok((ExprKind::Var(vi.name).at(span), vi.ty.clone()))
    }
    match self.env.globals.get(&x.name) {
      Some(Entity::Var(vi) | Entity::Const(vi, _)) =>
        return Ok((ExprKind::Var(vi.name).at(span), vi.ty.clone())),
      Some(Entity::EnumMember(ety, _)) =>
        return Ok((ExprKind::Var(x).at(span), Type::named(*ety))),
      None => {}
    }
    // A bare name can be a parameterless getter.
    let getter = x.suffixed(FuncKind::Getter.suffix());
    if !self.env.funs_of(getter.name).is_empty() {
      return self.tc_call(span, getter, vec![], false)
    }
    Err(Error::UnknownObject(span, "variable", x))
  }

  fn record_fields(&self, loc: Loc, name: Ident) -> Result<(Vec<Ident>, Vec<(Ident, Type)>)> {
    match self.env.types.get(&name.name) {
      Some(Spanned { k: TypeTc::Record { params, fields }, .. }) =>
        Ok((params.clone(), fields.clone())),
      Some(Spanned { k: TypeTc::Exception(fields), .. }) => Ok((vec![], fields.clone())),
      Some(_) => Err(Error::IsNotA(loc, name, "record type")),
      None => Err(Error::UnknownObject(loc, "type", name)),
    }
  }

  fn tc_field(&mut self, span: Loc, e: Expr, f: Ident) -> Result<(Expr, Type)> {
    let (e, ty) = self.tc_expr(e)?;
    let record_like = match &ty {
      Type::Constructor(name, args) => Some((*name, args.clone())),
      Type::Forward(name) => Some((*name, vec![])),
      _ => None,
    };
    if let Some((name, args)) = record_like {
      let (params, fields) = self.record_fields(span, name)?;
      let fty = fields.iter().find(|(n, _)| n.name == f.name)
        .map(|(_, t)| t.clone())
        .ok_or(Error::UnknownObject(span, "field", f))?;
      let map = params.into_iter().zip(args).collect();
      return Ok((ExprKind::Field(Box::new(e), f).at(span), subst_ty(&fty, &map)))
    }
    match &ty {
      Type::Bits(_, fields) => {
        let rf = fields.iter().find(|rf| rf.name.name == f.name)
          .ok_or(Error::UnknownObject(span, "register field", f))?;
        let (widths, _) = self.slice_widths(&rf.slices)?;
        let total = sum_exprs(&widths);
        let ss = rf.slices.clone();
        let base = Box::new(ty.clone());
        Ok((ExprKind::Slices(Box::new(e), ss, Some(base)).at(span), Type::bits(total)))
      }
      _ => Err(Error::IsNotA(span, f, "field of this type")),
    }
  }

  fn tc_fields(&mut self, span: Loc, e: Expr, fs: Vec<Ident>) -> Result<(Expr, Type)> {
    // The concatenation of the named fields, highest first.
    let mut parts = vec![];
    let mut widths = vec![];
    for f in &fs {
      let (part, ty) = self.tc_field(span, e.clone(), *f)?;
      widths.push(self.width_of(span, &ty)?);
      parts.push(part);
    }
    let total = sum_exprs(&widths);
    Ok((ExprKind::Concat(widths, parts).at(span), Type::bits(total)))
  }

  fn width_of(&mut self, loc: Loc, ty: &Type) -> Result<Expr> {
    match ty {
      Type::Bits(w, _) => Ok((**w).clone()),
      _ => Err(Error::DoesNotMatch(loc, "type", "bits(-)".into(), ty.to_string())),
    }
  }

  fn tc_index(&mut self, span: Loc, a: Expr, i: Expr) -> Result<(Expr, Type)> {
    // An array-form getter looks like an index on a non-variable name.
    if_chain! {
      if let ExprKind::Var(x) = &a.k;
      if self.lookup_local(*x).is_none();
      if !self.env.globals.contains_key(&x.name);
      let getter = x.suffixed(FuncKind::Getter.suffix());
      if !self.env.funs_of(getter.name).is_empty();
      then {
        return self.tc_call(span, getter, vec![(None, i)], false)
      }
    }
    let (a, aty) = self.tc_expr(a)?;
    match &aty {
      Type::Array(ix, ety) => {
        let i = match &**ix {
          IxType::Enum(ename) => self.check_expr(&Type::named(*ename), i)?,
          IxType::Int(n) => {
            let i = self.check_expr(&Type::integer(), i)?;
            let i = self.stabilise(i, &Type::integer());
            self.runtime_check(in_range(&i, &lit_int(0), n));
            i
          }
        };
        Ok((ExprKind::Index(Box::new(a), Box::new(i)).at(span), (**ety).clone()))
      }
      // A single subscript on a bitvector is a one-bit slice.
      Type::Bits(..) => {
        let Spanned { span: aspan, k } = a;
        self.tc_slices(span, Spanned::new(aspan, k), vec![Slice::Single(i)])
      }
      _ => Err(Error::DoesNotMatch(span, "indexable type",
        "array or bits(-)".into(), aty.to_string())),
    }
  }

  /// The widths of a slice list, plus per-slice (offset, width) pairs in
  /// canonical `lo +: w` form for the runtime checks.
  fn slice_widths(&mut self, ss: &[Slice]) -> Result<(Vec<Expr>, Vec<(Expr, Expr)>)> {
    let mut widths = vec![];
    let mut lows = vec![];
    for s in ss {
      let (lo, w) = match s {
        Slice::Single(i) => (i.clone(), lit_int(1)),
        Slice::HiLo(hi, lo) => (lo.clone(), width_expr(hi, lo)),
        Slice::LoWd(lo, w) => (lo.clone(), w.clone()),
        Slice::HiWd(hi, w) => (sub_expr(add_expr(hi.clone(), lit_int(1)), w.clone()), w.clone()),
        Slice::Element(i, w) => (mul_expr(i.clone(), w.clone()), w.clone()),
      };
      widths.push(w.clone());
      lows.push((lo, w));
    }
    Ok((widths, lows))
  }

  fn tc_slices(&mut self, span: Loc, e: Expr, ss: Vec<Slice>) -> Result<(Expr, Type)> {
    let (e, ety) = self.tc_expr(e)?;
    let ss = ss.into_iter().map(|s| self.tc_slice(s)).collect::<Result<Vec<_>>>()?;
    let (widths, lows) = self.slice_widths(&ss)?;
    match &ety {
      Type::Bits(n, _) => {
        let n = (**n).clone();
        for (lo, w) in &lows {
          self.runtime_check(slice_in_bounds(lo, w, &n));
        }
      }
      Type::Integer(_) => {
        for (lo, _) in &lows {
          self.runtime_check(le_expr(lit_int(0), lo.clone()));
        }
      }
      _ => return Err(Error::DoesNotMatch(span, "sliceable type",
        "bits(-) or integer".into(), ety.to_string())),
    }
    let total = sum_exprs(&widths);
    Ok((
      ExprKind::Slices(Box::new(e), ss, Some(Box::new(ety))).at(span),
      Type::bits(total),
    ))
  }

  fn tc_slice(&mut self, s: Slice) -> Result<Slice> {
    let int = Type::integer();
    Ok(match s {
      Slice::Single(i) => Slice::Single(self.check_expr(&int, i)?),
      Slice::HiLo(hi, lo) =>
        Slice::HiLo(self.check_expr(&int, hi)?, self.check_expr(&int, lo)?),
      Slice::LoWd(lo, w) =>
        Slice::LoWd(self.check_expr(&int, lo)?, self.check_expr(&int, w)?),
      Slice::HiWd(hi, w) =>
        Slice::HiWd(self.check_expr(&int, hi)?, self.check_expr(&int, w)?),
      Slice::Element(i, w) =>
        Slice::Element(self.check_expr(&int, i)?, self.check_expr(&int, w)?),
    })
  }

  fn tc_record(
    &mut self, span: Loc, name: Ident, params: Vec<Expr>, fields: Vec<(Ident, Expr)>,
  ) -> Result<(Expr, Type)> {
    let (fparams, ftys) = self.record_fields(span, name)?;
    if fparams.len() != params.len() {
      return Err(Error::DoesNotMatch(span, "type parameters",
        fparams.len().to_string(), params.len().to_string()))
    }
    let params = params.into_iter()
      .map(|e| self.check_expr(&Type::integer(), e))
      .collect::<Result<Vec<_>>>()?;
    // Field sets must be exactly the declared fields, in declaration order.
    let declared: Vec<Symbol> = ftys.iter().map(|(f, _)| f.name).collect();
    let given: Vec<Symbol> = fields.iter().map(|(f, _)| f.name).collect();
    if declared != given {
      return Err(Error::DoesNotMatch(span, "record fields",
        declared.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
        given.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")))
    }
    let map: hashbrown::HashMap<Ident, Expr> =
      fparams.iter().copied().zip(params.iter().cloned()).collect();
    let mut out = Vec::with_capacity(fields.len());
    for ((f, e), (_, fty)) in fields.into_iter().zip(&ftys) {
      let fty = subst_ty(fty, &map);
      let fty = self.tc_type(span, fty)?;
      out.push((f, self.check_expr(&fty, e)?));
    }
    Ok((
      ExprKind::Record(name, params.clone(), out).at(span),
      Type::Constructor(name, params),
    ))
  }

  /// Functional update. Field changes stay as a `with` node for the
  /// desugaring pass (which rebuilds the record); slice changes resolve
  /// here, where the base width is known, into `set_slice` applications.
  fn tc_with(
    &mut self, span: Loc, e: Expr, changes: Vec<(Change, Expr)>,
  ) -> Result<(Expr, Type)> {
    let (e, ty) = self.tc_expr(e)?;
    let mut fields = vec![];
    let mut slice_updates = vec![];
    for (c, v) in changes {
      match c {
        Change::Field(f) => {
          let (_, fty) = self.tc_field(span, e.clone(), f)?;
          fields.push((Change::Field(f), self.check_expr(&fty, v)?));
        }
        Change::Slices(ss) => {
          let ss = ss.into_iter()
            .map(|s| self.tc_slice(s)).collect::<Result<Vec<_>>>()?;
          let (widths, lows) = self.slice_widths(&ss)?;
          let Type::Bits(n, _) = &ty else {
            return Err(Error::DoesNotMatch(span, "slice update base",
              "bits(-)".into(), ty.to_string()))
          };
          let n = (**n).clone();
          for (lo, w) in &lows { self.runtime_check(slice_in_bounds(lo, w, &n)) }
          let total = sum_exprs(&widths);
          let v = self.check_expr(&Type::bits(total.clone()), v)?;
          slice_updates.push((n, total, lows, v));
        }
      }
    }
    let mut out = if fields.is_empty() {
      e
    } else {
      ExprKind::WithChanges(Box::new(e), fields).at(span)
    };
    for (n, total, mut lows, v) in slice_updates {
      if let [_] = &lows[..] {
        let (lo, w) = lows.pop().expect("one slice");
        out = ExprKind::TApply(
          Ident::from_str("set_slice"),
          vec![n, w.clone()],
          vec![out, lo, w, v],
          ThrowsTag::NoThrow,
        ).at(span);
        continue
      }
      // Written high to low; the value is consumed from its low end.
      let v = self.stabilise(v, &Type::bits(total.clone()));
      let mut consumed = lit_int(0);
      for (lo, w) in lows.into_iter().rev() {
        let part = ExprKind::TApply(
          Ident::from_str("get_slice"),
          vec![total.clone(), w.clone()],
          vec![v.clone(), consumed.clone(), w.clone()],
          ThrowsTag::NoThrow,
        ).synth();
        consumed = add_expr(consumed, w.clone());
        out = ExprKind::TApply(
          Ident::from_str("set_slice"),
          vec![n.clone(), w.clone()],
          vec![out, lo, w, part],
          ThrowsTag::NoThrow,
        ).at(span);
      }
    }
    Ok((out, ty))
  }

  fn tc_pattern(&mut self, loc: Loc, p: Pattern, ty: &Type) -> Result<Pattern> {
    Ok(match p {
      Pattern::Lit(v) => {
        let pty = self.lit_type(&v);
        if !self.compat(&pty, ty) && !self.compat(ty, &pty) {
          return Err(Error::DoesNotMatch(loc, "pattern type",
            ty.to_string(), pty.to_string()))
        }
        Pattern::Lit(v)
      }
      Pattern::Const(x) => {
        // A named constant or enumeration member.
        if self.lookup_local(x).is_none() && !self.env.globals.contains_key(&x.name) {
          return Err(Error::UnknownObject(loc, "constant", x))
        }
        Pattern::Const(x)
      }
      Pattern::Wildcard => Pattern::Wildcard,
      Pattern::Tuple(ps) => {
        let Type::Tuple(tys) = ty else {
          return Err(Error::DoesNotMatch(loc, "pattern type",
            ty.to_string(), "tuple".into()))
        };
        if ps.len() != tys.len() {
          return Err(Error::DoesNotMatch(loc, "tuple arity",
            tys.len().to_string(), ps.len().to_string()))
        }
        Pattern::Tuple(
          ps.into_iter().zip(tys.clone()).map(|(p, t)| self.tc_pattern(loc, p, &t))
            .collect::<Result<_>>()?,
        )
      }
      Pattern::Set(ps) => Pattern::Set(
        ps.into_iter().map(|p| self.tc_pattern(loc, p, ty)).collect::<Result<_>>()?,
      ),
      Pattern::Expr(e) => Pattern::Expr(Box::new(self.check_expr(ty, *e)?)),
      Pattern::Range(lo, hi) => Pattern::Range(
        self.check_expr(&Type::integer(), lo)?,
        self.check_expr(&Type::integer(), hi)?,
      ),
      Pattern::Mask(m) => {
        let mty = Type::bits(lit_int(i64::from(m.width)));
        self.require_satisfies(loc, ty, &mty)?;
        Pattern::Mask(m)
      }
    })
  }

  // ------------------------------------------------------------- calls

  fn tc_call(
    &mut self, span: Loc, name: Ident, args: Vec<CallArg>, as_setter: bool,
  ) -> Result<(Expr, Type)> {
    let mut triples = Vec::with_capacity(args.len());
    let mut seen_named = false;
    for (n, e) in args {
      if n.is_some() { seen_named = true }
      else if seen_named {
        return Err(Error::Type(e.span,
          "positional argument after named argument".into()))
      }
      let (e, t) = self.tc_expr(e)?;
      triples.push((n, e, t));
    }
    let cands: Vec<Ident> = if as_setter {
      self.env.setters_of(name.name).iter().map(|ft| ft.name).collect()
    } else {
      self.env.funs_of(name.name).iter().map(|ft| ft.name).collect()
    };
    if cands.is_empty() {
      return Err(Error::UnknownObject(span, "function", name))
    }
    self.resolve_overload(span, name.name.as_str(), &cands, triples)
  }

  /// Binary operator resolution with the same machinery as calls.
  fn resolve_binop(
    &mut self, span: Loc, op: Binop, cands: Vec<Ident>,
    a: Expr, aty: Type, b: Expr, bty: Type,
  ) -> Result<(Expr, Type)> {
    if cands.is_empty() {
      return Err(Error::Type(span, format!("operator `{op}` has no candidates")))
    }
    self.resolve_overload(span, &format!("{op}"), &cands,
      vec![(None, a, aty), (None, b, bty)])
  }

  /// Expand candidate names (tagged overloads or root names from the
  /// operator tables) into their environment funtypes.
  fn candidate_funtypes(&self, cands: &[Ident]) -> Vec<FunType> {
    let mut out = vec![];
    for &cand in cands {
      if cand.tag != 0 {
        if let Some(ft) = self.env.fun_by_ident(cand) { out.push(ft.clone()) }
      } else {
        out.extend(self.env.funs_of(cand.name).iter().cloned());
        out.extend(self.env.setters_of(cand.name).iter().cloned());
      }
    }
    out
  }

  /// The common overload resolution path for calls and operators.
  fn resolve_overload(
    &mut self, span: Loc, what: &str, cands: &[Ident],
    args: Vec<(Option<Ident>, Expr, Type)>,
  ) -> Result<(Expr, Type)> {
    struct Match {
      ft: FunType,
      // Per formal: the bound expression, and its inferred type when it
      // was supplied (defaults have not been typechecked yet).
      bound: Vec<(Expr, Option<Type>)>,
    }
    let mut matches: SmallVec<[Match; 2]> = SmallVec::new();
    'cands: for ft in self.candidate_funtypes(cands) {
      // Bind positional left to right, then named, then defaults.
      let mut bound: Vec<Option<(Expr, Option<Type>)>> = vec![None; ft.args.len()];
      let mut next = 0_usize;
      for (n, e, t) in &args {
        let slot = match n {
          None => {
            let i = next;
            next += 1;
            i
          }
          Some(n) => {
            match ft.args.iter().position(|(an, _)| an.name == n.name) {
              Some(i) => i,
              None => continue 'cands,
            }
          }
        };
        if slot >= ft.args.len() || bound[slot].is_some() { continue 'cands }
        bound[slot] = Some((e.clone(), Some(t.clone())));
      }
      for i in 0..bound.len() {
        if bound[i].is_none() {
          match &ft.defaults[i] {
            Some(d) => {
              let already: Vec<Option<Expr>> =
                bound.iter().map(|b| b.as_ref().map(|(e, _)| e.clone())).collect();
              bound[i] = Some((substitute_defaults(d, &ft, &already), None));
            }
            None => continue 'cands,
          }
        }
      }
      // Structural compatibility of the supplied arguments.
      for (i, b) in bound.iter().enumerate() {
        if let Some((_, Some(t))) = b {
          if !self.compat(t, &ft.args[i].1) { continue 'cands }
        }
      }
      matches.push(Match {
        ft,
        bound: bound.into_iter().map(|b| b.expect("all bound")).collect(),
      });
    }
    match matches.len() {
      0 => return Err(Error::DoesNotMatch(span, "call", what.to_owned(),
        format!("no candidate matches the {} argument(s)", args.len()))),
      1 => {}
      _ => return Err(Error::Ambiguous(span, Ident::from_str(what),
        matches.iter().map(|m| m.ft.name).collect())),
    }
    let Match { ft, bound } = matches.into_iter().next().expect("one match");
    self.finish_call(span, ft, bound)
  }

  /// Parameter synthesis, argument checking, and construction of the
  /// resolved call node.
  fn finish_call(
    &mut self, span: Loc, ft: FunType, bound: Vec<(Expr, Option<Type>)>,
  ) -> Result<(Expr, Type)> {
    // Typecheck the default-filled slots, then stabilise arguments that
    // parameter synthesis may need to reference more than once.
    let mut arg_tys = Vec::with_capacity(bound.len());
    let mut args = Vec::with_capacity(bound.len());
    for (i, (e, t)) in bound.into_iter().enumerate() {
      let (e, t) = match t {
        Some(t) => (e, t),
        None => self.tc_expr(e)?,
      };
      let e = if ft.params.iter().any(|p| p.name == ft.args[i].0.name) {
        self.stabilise(e, &t)
      } else {
        e
      };
      args.push(e);
      arg_tys.push(t);
    }
    let mut bound = args;
    // Synthesize each parameter from the actual argument shapes.
    let mut param_map: hashbrown::HashMap<Ident, Expr> = hashbrown::HashMap::new();
    for p in &ft.params {
      let mut found = None;
      for (i, (aname, aty)) in ft.args.iter().enumerate() {
        // An integer formal that is itself the parameter.
        if aname.name == p.name && matches!(aty, Type::Integer(_)) {
          found = Some(bound[i].clone());
          break
        }
        if let Some(e) = synthesize(p, aty, &arg_tys[i]) {
          found = Some(e);
          break
        }
      }
      let Some(e) = found else {
        return Err(Error::Type(span,
          format!("cannot infer parameter `{p}` of `{}`", ft.name)))
      };
      param_map.insert(Ident::new(p.name), e);
    }
    // Dependent formal types and return types may also reference integer
    // formals by name; those resolve to the bound argument expressions.
    let mut full_map = param_map.clone();
    for ((aname, aty), e) in ft.args.iter().zip(&bound) {
      if matches!(aty, Type::Integer(_)) {
        full_map.entry(Ident::new(aname.name)).or_insert_with(|| e.clone());
      }
    }
    // Check arguments against the instantiated formal types.
    for (i, ((_, aty), actual_ty)) in ft.args.iter().zip(&arg_tys).enumerate() {
      let want = subst_ty(aty, &full_map);
      let want = self.tc_type(span, want)?;
      if !self.satisfies(actual_ty, &want)? {
        if_chain! {
          if let Type::Integer(Some(cs)) = &want;
          if matches!(actual_ty, Type::Integer(_));
          then {
            let e = std::mem::replace(&mut bound[i], lit_int(0));
            let e = self.stabilise(e, &Type::integer());
            self.runtime_check(membership(&e, cs));
            bound[i] = e;
          }
          else {
            return Err(Error::DoesNotMatch(span, "argument",
              want.to_string(), actual_ty.to_string()))
          }
        }
      }
    }
    // Division checks for the primitive division operators.
    self.division_checks(&ft, &mut bound);
    let params: Vec<Expr> =
      ft.params.iter().map(|p| param_map[&Ident::new(p.name)].clone()).collect();
    let rty = match &ft.rty {
      Some(t) => {
        let t = subst_ty(t, &full_map);
        let t = self.tc_type(span, t)?;
        self.refine_result(&ft, &arg_tys, t)
      }
      None => Type::Tuple(vec![]),
    };
    Ok((ExprKind::TApply(ft.name, params, bound, ft.throws).at(span), rty))
  }

  fn division_checks(&mut self, ft: &FunType, args: &mut [Expr]) {
    let name = ft.name.name.as_str();
    if !matches!(name,
      "exact_div_int" | "fdiv_int" | "frem_int" | "zdiv_int" | "zrem_int") {
      return
    }
    if args.len() != 2 { return }
    // The operands appear in both the call and its checks, so they must be
    // safe to replicate.
    let b = std::mem::replace(&mut args[1], lit_int(0));
    let b = self.stabilise(b, &Type::integer());
    args[1] = b.clone();
    self.runtime_check(ne_expr(b.clone(), lit_int(0)));
    if name == "exact_div_int" {
      // DIV is only defined when the divisor divides the dividend.
      let a = std::mem::replace(&mut args[0], lit_int(0));
      let a = self.stabilise(a, &Type::integer());
      args[0] = a.clone();
      let rem = prim("frem_int", a, b);
      self.runtime_check(eq_expr(rem, lit_int(0)));
    }
  }

  /// Constraint-range propagation: when every integer operand carries a
  /// constraint set with foldable bounds, the primitive arithmetic results
  /// are refined to an interval.
  fn refine_result(&mut self, ft: &FunType, arg_tys: &[Type], rty: Type) -> Type {
    if !matches!(rty, Type::Integer(None)) { return rty }
    let consts = Consts {
      env: self.env,
      locals: self.scopes.last().map(|s| &s.consts),
    };
    let mut ivals = Vec::with_capacity(arg_tys.len());
    for t in arg_tys {
      let Type::Integer(Some(cs)) = t else { return rty };
      let Some(iv) = interval_of(cs, &consts) else { return rty };
      ivals.push(iv);
    }
    let out = match (ft.name.name.as_str(), &ivals[..]) {
      ("add_int", [a, b]) => Some((&a.0 + &b.0, &a.1 + &b.1)),
      ("sub_int", [a, b]) => Some((&a.0 - &b.1, &a.1 - &b.0)),
      ("neg_int", [a]) => Some((-&a.1, -&a.0)),
      ("mul_int", [a, b]) => {
        let corners = [&a.0 * &b.0, &a.0 * &b.1, &a.1 * &b.0, &a.1 * &b.1];
        Some((
          corners.iter().min().expect("nonempty").clone(),
          corners.iter().max().expect("nonempty").clone(),
        ))
      }
      ("min_int", [a, b]) => Some((a.0.clone().min(b.0.clone()), a.1.clone().min(b.1.clone()))),
      ("max_int", [a, b]) => Some((a.0.clone().max(b.0.clone()), a.1.clone().max(b.1.clone()))),
      ("exact_div_int", [a, b]) if b.0 > BigInt::from(0) => {
        let corners = [
          num::Integer::div_floor(&a.0, &b.0), num::Integer::div_floor(&a.0, &b.1),
          num::Integer::div_floor(&a.1, &b.0), num::Integer::div_floor(&a.1, &b.1),
        ];
        Some((
          corners.iter().min().expect("nonempty").clone(),
          corners.iter().max().expect("nonempty").clone(),
        ))
      }
      ("pow_int", [a, b]) if a.0 >= BigInt::from(0) && b.0 >= BigInt::from(0) => {
        let lo = pow_clamped(&a.0, &b.0);
        let hi = pow_clamped(&a.1, &b.1);
        match (lo, hi) { (Some(lo), Some(hi)) => Some((lo, hi)), _ => None }
      }
      _ => None,
    };
    match out {
      Some((lo, hi)) => Type::Integer(Some(vec![Constraint::Range(
        ExprKind::Lit(Value::Int(lo)).synth(),
        ExprKind::Lit(Value::Int(hi)).synth(),
      )])),
      None => rty,
    }
  }

  // --------------------------------------------------------- statements

  /// Typecheck one statement; the result includes any lifted bindings and
  /// assertions produced by runtime checks inside it.
  pub fn tc_stmt(&mut self, s: Stmt) -> Result<Vec<Stmt>> {
    // Nested statements flush their own checks; save the enclosing
    // statement's pending lists around this one.
    let outer_lets = std::mem::take(&mut self.pending_lets);
    let outer_checks = std::mem::take(&mut self.pending_checks);
    let span = s.span;
    let core = self.tc_stmt_inner(s);
    let lets = std::mem::replace(&mut self.pending_lets, outer_lets);
    let checks = std::mem::replace(&mut self.pending_checks, outer_checks);
    let core = core?;
    let mut out = Vec::with_capacity(lets.len() + checks.len() + 1);
    for (x, ty, e) in lets {
      // Already in scope via `stabilise`; this is just the statement.
      out.push(StmtKind::VarDecl {
        constant: true,
        item: DeclItem::Var(x, Some(ty)),
        init: e,
      }.at(span));
    }
    for c in checks {
      self.assume(c.clone());
      out.push(StmtKind::Assert(c).at(span));
    }
    out.extend(core);
    Ok(out)
  }

  fn tc_stmts(&mut self, ss: Vec<Stmt>) -> Result<Vec<Stmt>> {
    self.push_scope();
    let mut out = Vec::with_capacity(ss.len());
    let mut err = None;
    for s in ss {
      match self.tc_stmt(s) {
        Ok(mut ss) => out.append(&mut ss),
        Err(e) => { err = Some(e); break }
      }
    }
    self.pop_scope();
    match err { Some(e) => Err(e), None => Ok(out) }
  }

  fn tc_stmt_inner(&mut self, s: Stmt) -> Result<Vec<Stmt>> {
    let Spanned { span, k } = s;
    let boolean = Type::named(Ident::from_str("boolean"));
    Ok(match k {
      StmtKind::VarDeclsNoInit(ty, names) => {
        let ty = self.tc_type(span, ty)?;
        for &x in &names {
          self.declare_local(VarInfo {
            name: x, loc: span, ty: ty.clone(), is_local: true, is_constant: false,
          })?;
        }
        vec![StmtKind::VarDeclsNoInit(ty, names).at(span)]
      }
      StmtKind::VarDecl { constant, item, init } => {
        let (item, init) = self.tc_decl_item(span, item, init, constant)?;
        vec![StmtKind::VarDecl { constant, item, init }.at(span)]
      }
      StmtKind::Assign(lhs, rhs) => self.tc_assign(span, lhs, rhs)?,
      StmtKind::Call(name, args) => {
        let (e, _) = self.tc_call(span, name, args, false)?;
        let ExprKind::TApply(f, params, args, throws) = e.k else {
          return Err(Error::Internal("call resolution produced a non-call".into()))
        };
        vec![StmtKind::TCall(f, params, args, throws).at(span)]
      }
      StmtKind::TCall(f, params, args, throws) =>
        vec![StmtKind::TCall(f, params, args, throws).at(span)],
      StmtKind::Return(e) => {
        let rty = self.rty.clone();
        match (e, rty) {
          (None, None) => vec![StmtKind::Return(None).at(span)],
          (Some(e), Some(t)) => {
            let e = self.check_expr(&t, e)?;
            vec![StmtKind::Return(Some(e)).at(span)]
          }
          (None, Some(t)) => return Err(Error::DoesNotMatch(span,
            "return", t.to_string(), "no value".into())),
          (Some(e), None) => return Err(Error::DoesNotMatch(span,
            "return", "no value".into(), format!("{e}"))),
        }
      }
      StmtKind::Assert(e) => {
        let e = self.check_expr(&boolean, e)?;
        self.assume(e.clone());
        vec![StmtKind::Assert(e).at(span)]
      }
      StmtKind::Throw(e) => {
        let (e, ty) = self.tc_expr(e)?;
        match &ty {
          Type::Constructor(name, _) | Type::Forward(name)
            if matches!(self.env.types.get(&name.name),
              Some(Spanned { k: TypeTc::Exception(_), .. })) => {}
          _ => return Err(Error::IsNotA(span,
            Ident::from_str(&ty.to_string()), "exception type")),
        }
        vec![StmtKind::Throw(e).at(span)]
      }
      StmtKind::Try { body, catchers, otherwise } => {
        let body = self.tc_stmts(body)?;
        let mut out = Vec::with_capacity(catchers.len());
        for c in catchers {
          let Some(Spanned { k: TypeTc::Exception(_), .. }) =
            self.env.types.get(&c.ty.name)
          else {
            return Err(Error::IsNotA(c.span, c.ty, "exception type"))
          };
          self.push_scope();
          self.declare_local(VarInfo {
            name: c.name,
            loc: c.span,
            ty: Type::named(c.ty),
            is_local: true,
            is_constant: true,
          })?;
          let r = self.tc_stmts_open(c.body);
          self.pop_scope();
          out.push(Catcher { name: c.name, ty: c.ty, body: r?, span: c.span });
        }
        let otherwise = otherwise.map(|ss| self.tc_stmts(ss)).transpose()?;
        vec![StmtKind::Try { body, catchers: out, otherwise }.at(span)]
      }
      StmtKind::If(arms, els) => {
        let mut out = Vec::with_capacity(arms.len());
        for (c, ss) in arms {
          let c = self.check_expr(&boolean, c)?;
          // The branch may rely on its condition.
          self.push_scope();
          self.assume(c.clone());
          let r = self.tc_stmts_open(ss);
          self.pop_scope();
          out.push((c, r?));
        }
        let els = self.tc_stmts(els)?;
        vec![StmtKind::If(out, els).at(span)]
      }
      StmtKind::Case(e, alts, default) => {
        let (e, ty) = self.tc_expr(e)?;
        let e2 = self.stabilise(e, &ty);
        let mut out = Vec::with_capacity(alts.len());
        for a in alts {
          let pats = a.pats.into_iter()
            .map(|p| self.tc_pattern(a.span, p, &ty))
            .collect::<Result<Vec<_>>>()?;
          self.push_scope();
          let guard = a.guard.map(|g| {
            let (g, gty) = self.guarded(|tc| tc.tc_expr(g))?;
            self.require_satisfies(g.span, &gty, &boolean)?;
            Ok::<_, Error>(g)
          }).transpose();
          let body = guard.and_then(|guard| {
            let body = self.tc_stmts_open(a.body)?;
            Ok(Alt { pats, guard, body, span: a.span })
          });
          self.pop_scope();
          out.push(body?);
        }
        let default = default.map(|ss| self.tc_stmts(ss)).transpose()?;
        vec![StmtKind::Case(e2, out, default).at(span)]
      }
      StmtKind::For { var: v, from, dir, to, body } => {
        let from = self.check_expr(&Type::integer(), from)?;
        let to = self.check_expr(&Type::integer(), to)?;
        // The loop variable gets the subrange type when both bounds are
        // immutable under the current scope.
        let (lo, hi) = match dir {
          Direction::Up => (&from, &to),
          Direction::Down => (&to, &from),
        };
        let vty = if self.is_immutable(lo) && self.is_immutable(hi) {
          Type::Integer(Some(vec![Constraint::Range(lo.clone(), hi.clone())]))
        } else {
          Type::integer()
        };
        self.push_scope();
        self.declare_local(VarInfo {
          name: v, loc: span, ty: vty, is_local: true, is_constant: false,
        })?;
        self.assume(in_closed_range(&var(v), lo, hi));
        let r = self.tc_stmts_open(body);
        self.pop_scope();
        vec![StmtKind::For { var: v, from, dir, to, body: r? }.at(span)]
      }
      StmtKind::While(c, body) => {
        // The condition re-evaluates per iteration; its checks stay inside.
        let (c, cty) = self.guarded(|tc| tc.tc_expr(c))?;
        self.require_satisfies(c.span, &cty, &boolean)?;
        let body = self.tc_stmts(body)?;
        vec![StmtKind::While(c, body).at(span)]
      }
      StmtKind::Repeat(body, c) => {
        let body = self.tc_stmts(body)?;
        let (c, cty) = self.guarded(|tc| tc.tc_expr(c))?;
        self.require_satisfies(c.span, &cty, &boolean)?;
        vec![StmtKind::Repeat(body, c).at(span)]
      }
    })
  }

  /// Statements in an already-pushed scope.
  fn tc_stmts_open(&mut self, ss: Vec<Stmt>) -> Result<Vec<Stmt>> {
    let mut out = Vec::with_capacity(ss.len());
    for s in ss { out.append(&mut self.tc_stmt(s)?) }
    Ok(out)
  }

  fn tc_decl_item(
    &mut self, span: Loc, item: DeclItem, init: Expr, constant: bool,
  ) -> Result<(DeclItem, Expr)> {
    match item {
      DeclItem::Var(x, Some(ty)) => {
        let ty = self.tc_type(span, ty)?;
        let init = self.check_expr(&ty, init)?;
        self.bind_var(span, x, ty.clone(), constant, &init)?;
        Ok((DeclItem::Var(x, Some(ty)), init))
      }
      DeclItem::Var(x, None) => {
        let (init, ty) = self.tc_expr(init)?;
        self.bind_var(span, x, ty.clone(), constant, &init)?;
        Ok((DeclItem::Var(x, Some(ty)), init))
      }
      DeclItem::Tuple(items) => {
        let (init, ty) = self.tc_expr(init)?;
        let Type::Tuple(tys) = &ty else {
          return Err(Error::DoesNotMatch(span, "initialiser",
            "tuple".into(), ty.to_string()))
        };
        if tys.len() != items.len() {
          return Err(Error::DoesNotMatch(span, "tuple arity",
            items.len().to_string(), tys.len().to_string()))
        }
        let mut out = Vec::with_capacity(items.len());
        for (item, t) in items.into_iter().zip(tys) {
          match item {
            DeclItem::Var(x, want) => {
              let t = match want {
                Some(w) => {
                  let w = self.tc_type(span, w)?;
                  self.require_satisfies(span, t, &w)?;
                  w
                }
                None => t.clone(),
              };
              self.declare_local(VarInfo {
                name: x, loc: span, ty: t.clone(), is_local: true, is_constant: constant,
              })?;
              out.push(DeclItem::Var(x, Some(t)));
            }
            DeclItem::Tuple(_) => return Err(Error::Unimplemented(span,
              "nested tuple declarations".into())),
          }
        }
        Ok((DeclItem::Tuple(out), init))
      }
    }
  }

  fn bind_var(
    &mut self, loc: Loc, x: Ident, ty: Type, constant: bool, init: &Expr,
  ) -> Result<()> {
    self.declare_local(VarInfo {
      name: x, loc, ty: ty.clone(), is_local: true, is_constant: constant,
    })?;
    // An immutable integer binding becomes an algebraic fact, and a known
    // value when the initialiser folds.
    if constant && matches!(ty, Type::Integer(_)) && self.is_immutable(init) {
      self.assume(eq_expr(var(x), init.clone()));
      let v = fold(init, &self.consts());
      if let Some(v) = v {
        self.scopes.last_mut().expect("open scope").consts.insert(x, v);
      }
    }
    Ok(())
  }

  /// Whether an expression's value cannot change between uses: all free
  /// variables are immutable bindings.
  fn is_immutable(&self, e: &Expr) -> bool {
    let mut ok = true;
    let mut stack = vec![e];
    while let Some(e) = stack.pop() {
      match &e.k {
        ExprKind::Var(x) => {
          let known = self.lookup_local(*x).map(|vi| vi.is_constant)
            .or_else(|| match self.env.globals.get(&x.name) {
              Some(Entity::Const(..) | Entity::EnumMember(..)) => Some(true),
              Some(Entity::Var(_)) => Some(false),
              None => None,
            });
          if known != Some(true) { ok = false }
        }
        ExprKind::Lit(_) => {}
        ExprKind::Binop(_, a, b) => { stack.push(&**a); stack.push(&**b) }
        ExprKind::Unop(_, a) => stack.push(&**a),
        ExprKind::TApply(_, params, args, _) => {
          stack.extend(params.iter());
          stack.extend(args.iter());
        }
        _ => ok = false,
      }
      if !ok { return false }
    }
    ok
  }

  fn tc_assign(&mut self, span: Loc, lhs: LExpr, rhs: Expr) -> Result<Vec<Stmt>> {
    let (lhs, lty) = self.tc_lexpr(lhs)?;
    match lty {
      Some(t) => {
        let rhs = self.check_expr(&t, rhs)?;
        Ok(vec![StmtKind::Assign(lhs, rhs).at(span)])
      }
      None => {
        // Wildcard or other type-free sink: evaluate for effect only.
        let (rhs, _) = self.tc_expr(rhs)?;
        Ok(vec![StmtKind::Assign(lhs, rhs).at(span)])
      }
    }
  }

  /// Typecheck an lvalue, returning the type the right-hand side must have
  /// (none for wildcards).
  fn tc_lexpr(&mut self, e: LExpr) -> Result<(LExpr, Option<Type>)> {
    let Spanned { span, k } = e;
    match k {
      LExprKind::Wildcard => Ok((LExprKind::Wildcard.at(span), None)),
      LExprKind::Var(x) => {
        if let Some(vi) = self.lookup_local(x) {
          if vi.is_constant {
            return Err(Error::Type(span, format!("cannot assign to constant `{x}`")))
          }
          return Ok((LExprKind::Var(vi.name).at(span), Some(vi.ty.clone())))
        }
        match self.env.globals.get(&x.name) {
          Some(Entity::Var(vi)) =>
            return Ok((LExprKind::Var(vi.name).at(span), Some(vi.ty.clone()))),
          Some(Entity::Const(..) | Entity::EnumMember(..)) =>
            return Err(Error::Type(span, format!("cannot assign to constant `{x}`"))),
          None => {}
        }
        self.resolve_setter_var(span, x)
      }
      LExprKind::Index(a, i) => {
        // Array-form setter when the base is not a variable.
        if_chain! {
          if let LExprKind::Var(x) = &a.k;
          if self.lookup_local(*x).is_none();
          if !self.env.globals.contains_key(&x.name);
          then {
            return self.resolve_setter_call(span, *x, vec![*i])
          }
        }
        let (a, aty) = self.tc_lexpr(*a)?;
        let Some(aty) = aty else {
          return Err(Error::Type(span, "cannot index a wildcard".into()))
        };
        match aty {
          Type::Array(ix, ety) => {
            let i = match &*ix {
              IxType::Enum(ename) => self.check_expr(&Type::named(*ename), *i)?,
              IxType::Int(n) => {
                let i = self.check_expr(&Type::integer(), *i)?;
                let i = self.stabilise(i, &Type::integer());
                self.runtime_check(in_range(&i, &lit_int(0), n));
                i
              }
            };
            Ok((LExprKind::Index(Box::new(a), Box::new(i)).at(span), Some(*ety)))
          }
          ty @ Type::Bits(..) => {
            let i = self.check_expr(&Type::integer(), *i)?;
            let ss = vec![Slice::Single(i)];
            let (_, lows) = self.slice_widths(&ss)?;
            if let Type::Bits(n, _) = &ty {
              for (lo, w) in &lows { self.runtime_check(slice_in_bounds(lo, w, n)) }
            }
            Ok((
              LExprKind::Slices(Box::new(a), ss, Some(Box::new(ty))).at(span),
              Some(Type::bits(lit_int(1))),
            ))
          }
          t => Err(Error::DoesNotMatch(span, "assignable index base",
            "array or bits(-)".into(), t.to_string())),
        }
      }
      LExprKind::Slices(e, ss, _) => {
        let (e, ety) = self.tc_lexpr(*e)?;
        let Some(ety) = ety else {
          return Err(Error::Type(span, "cannot slice a wildcard".into()))
        };
        let ss = ss.into_iter().map(|s| self.tc_slice(s)).collect::<Result<Vec<_>>>()?;
        let (widths, lows) = self.slice_widths(&ss)?;
        if let Type::Bits(n, _) = &ety {
          let n = (**n).clone();
          for (lo, w) in &lows { self.runtime_check(slice_in_bounds(lo, w, &n)) }
        }
        let total = sum_exprs(&widths);
        Ok((
          LExprKind::Slices(Box::new(e), ss, Some(Box::new(ety))).at(span),
          Some(Type::bits(total)),
        ))
      }
      LExprKind::Field(e, f) => {
        let (e, ety) = self.tc_lexpr(*e)?;
        let Some(ety) = ety else {
          return Err(Error::Type(span, "cannot project a wildcard".into()))
        };
        match &ety {
          Type::Bits(_, fields) => {
            let rf = fields.iter().find(|rf| rf.name.name == f.name)
              .ok_or(Error::UnknownObject(span, "register field", f))?;
            let ss = rf.slices.clone();
            let (widths, lows) = self.slice_widths(&ss)?;
            if let Type::Bits(n, _) = &ety {
              for (lo, w) in &lows { self.runtime_check(slice_in_bounds(lo, w, n)) }
            }
            let total = sum_exprs(&widths);
            Ok((
              LExprKind::Slices(Box::new(e), ss, Some(Box::new(ety.clone()))).at(span),
              Some(Type::bits(total)),
            ))
          }
          Type::Constructor(name, args) => {
            let (params, fields) = self.record_fields(span, *name)?;
            let fty = fields.iter().find(|(n, _)| n.name == f.name)
              .map(|(_, t)| t.clone())
              .ok_or(Error::UnknownObject(span, "field", f))?;
            let map = params.into_iter().zip(args.iter().cloned()).collect();
            Ok((LExprKind::Field(Box::new(e), f).at(span), Some(subst_ty(&fty, &map))))
          }
          t => Err(Error::DoesNotMatch(span, "assignable field base",
            "record or register".into(), t.to_string())),
        }
      }
      LExprKind::Fields(e, fs) => {
        // Split into per-field widths; the value is distributed by the
        // bittuple lowering pass.
        let (e, _) = self.tc_lexpr(*e)?;
        let mut widths = vec![];
        let mut parts = vec![];
        for f in fs {
          let (p, t) = self.tc_lexpr(LExprKind::Field(Box::new(e.clone()), f).at(span))?;
          let t = t.expect("field lvalues are typed");
          widths.push(self.width_of(span, &t)?);
          parts.push(p);
        }
        let total = sum_exprs(&widths);
        Ok((
          LExprKind::BitTuple(widths, parts).at(span),
          Some(Type::bits(total)),
        ))
      }
      LExprKind::Tuple(es) => {
        let mut out = Vec::with_capacity(es.len());
        let mut tys = Vec::with_capacity(es.len());
        for e in es {
          let (e, t) = self.tc_lexpr(e)?;
          out.push(e);
          tys.push(t.unwrap_or(Type::Tuple(vec![])));
        }
        Ok((LExprKind::Tuple(out).at(span), Some(Type::Tuple(tys))))
      }
      LExprKind::BitTuple(_, es) => {
        let mut out = Vec::with_capacity(es.len());
        let mut widths = Vec::with_capacity(es.len());
        for e in es {
          let (e, t) = self.tc_lexpr(e)?;
          let t = t.ok_or(Error::Type(span, "wildcard in bitvector pattern".into()))?;
          widths.push(self.width_of(span, &t)?);
          out.push(e);
        }
        let total = sum_exprs(&widths);
        Ok((
          LExprKind::BitTuple(widths, out).at(span),
          Some(Type::bits(total)),
        ))
      }
      LExprKind::ReadWrite(..) | LExprKind::Write(..) =>
        Err(Error::Internal("resolved lvalue before typechecking".into())),
    }
  }

  /// A bare-name lvalue backed by a setter. Compound updates also need the
  /// matching getter, so a lone setter or lone getter is a hard error.
  fn resolve_setter_var(&mut self, span: Loc, x: Ident) -> Result<(LExpr, Option<Type>)> {
    let setter = x.suffixed(FuncKind::Setter.suffix());
    let getter = x.suffixed(FuncKind::Getter.suffix());
    let have_getter = !self.env.funs_of(getter.name).is_empty();
    let setters = self.env.setters_of(setter.name);
    if setters.is_empty() {
      if have_getter {
        return Err(Error::IsNotA(span, x, "assignable location (no setter)"))
      }
      return Err(Error::UnknownObject(span, "variable", x))
    }
    if !have_getter {
      return Err(Error::IsNotA(span, x, "readable location (setter without getter)"))
    }
    let sts: Vec<FunType> = setters.iter()
      .filter(|ft| ft.args.len() == 1)
      .cloned().collect();
    let [ft] = &sts[..] else {
      return Err(Error::Ambiguous(span, x, sts.iter().map(|ft| ft.name).collect()))
    };
    let gts: Vec<Ident> = self.env.funs_of(getter.name).iter()
      .filter(|g| g.args.is_empty())
      .map(|g| g.name).collect();
    let vty = ft.args[0].1.clone();
    let vty = self.tc_type(span, vty)?;
    match gts[..] {
      [g] => Ok((LExprKind::ReadWrite(g, ft.name, vec![]).at(span), Some(vty))),
      _ => Ok((LExprKind::Write(ft.name, vec![], vec![]).at(span), Some(vty))),
    }
  }

  fn resolve_setter_call(
    &mut self, span: Loc, x: Ident, ixs: Vec<Expr>,
  ) -> Result<(LExpr, Option<Type>)> {
    let setter = x.suffixed(FuncKind::Setter.suffix());
    if self.env.setters_of(setter.name).is_empty() {
      return Err(Error::UnknownObject(span, "variable", x))
    }
    let n_ix = ixs.len();
    let cands: Vec<Ident> = self.env.setters_of(setter.name).iter()
      .filter(|ft| ft.args.len() == n_ix + 1)
      .map(|ft| ft.name).collect();
    let [cand] = &cands[..] else {
      return Err(Error::Ambiguous(span, x, cands))
    };
    let ft = self.env.fun_by_ident(*cand).expect("candidate exists").clone();
    let vty = ft.args.last().expect("setter value formal").1.clone();
    let mut args = Vec::with_capacity(n_ix);
    for (i, e) in ixs.into_iter().enumerate() {
      let want = self.tc_type(span, ft.args[i].1.clone())?;
      args.push(self.check_expr(&want, e)?);
    }
    // Parameters synthesized once the value's type is known are limited to
    // the index arguments here; widths come from the declared value type.
    let vty = self.tc_type(span, vty)?;
    Ok((LExprKind::Write(ft.name, vec![], args).at(span), Some(vty)))
  }

  // ------------------------------------------------------- declarations

  /// Typecheck a declaration, extending the global environment. One input
  /// declaration may expand into several outputs.
  pub fn tc_declaration(&mut self, d: Decl) -> Result<Vec<Decl>> {
    let Spanned { span, k } = d;
    match k {
      DeclKind::BuiltinType(name) => {
        self.define_type(span, name, TypeTc::Builtin)?;
        Ok(vec![DeclKind::BuiltinType(name).at(span)])
      }
      DeclKind::Forward(name) => {
        if !self.env.types.contains_key(&name.name) {
          self.define_type(span, name, TypeTc::ForwardDeclared)?;
        }
        Ok(vec![DeclKind::Forward(name).at(span)])
      }
      DeclKind::Record(name, params, fields) => {
        let fields = self.tc_field_list(span, &params, fields)?;
        self.define_type(span, name, TypeTc::Record { params: params.clone(), fields: fields.clone() })?;
        Ok(vec![DeclKind::Record(name, params, fields).at(span)])
      }
      DeclKind::Exception(name, fields) => {
        let fields = self.tc_field_list(span, &[], fields)?;
        self.define_type(span, name, TypeTc::Exception(fields.clone()))?;
        Ok(vec![DeclKind::Exception(name, fields).at(span)])
      }
      DeclKind::TypeAbbrev(name, params, ty) => {
        self.define_type(span, name,
          TypeTc::Abbrev { params: params.clone(), ty: ty.clone() })?;
        Ok(vec![DeclKind::TypeAbbrev(name, params, ty).at(span)])
      }
      DeclKind::Enum(name, members) => self.tc_enum(span, name, members),
      DeclKind::BuiltinFunc(sig) => {
        let (ft, _) = self.register_sig(span, &sig)?;
        let mut sig = sig;
        sig.name = ft;
        Ok(vec![DeclKind::BuiltinFunc(sig).at(span)])
      }
      DeclKind::FunType(sig) => {
        let (ft, _) = self.register_sig(span, &sig)?;
        let mut sig = sig;
        sig.name = ft;
        Ok(vec![DeclKind::FunType(sig).at(span)])
      }
      DeclKind::FunDefn(sig, body) => self.tc_fun_defn(span, sig, body),
      DeclKind::Operator1(op, fs) => {
        self.env.add_op1(op, fs.iter().copied());
        Ok(vec![DeclKind::Operator1(op, fs).at(span)])
      }
      DeclKind::Operator2(op, fs) => {
        self.env.add_op2(op, fs.iter().copied());
        Ok(vec![DeclKind::Operator2(op, fs).at(span)])
      }
      DeclKind::Const(ty, name, e) => {
        let ty = self.tc_type(span, ty)?;
        let e = self.tc_global_init(&ty, e)?;
        let e = consteval::fold_rewrite(e, &Consts::global(self.env));
        self.define_global(span, name, ty.clone(), true, Some(e.clone()))?;
        Ok(vec![DeclKind::Const(ty, name, e).at(span)])
      }
      DeclKind::Config(ty, name, e) => {
        let ty = self.tc_type(span, ty)?;
        let e = self.tc_global_init(&ty, e)?;
        // Overridable, so its value is not a foldable constant; only its
        // type participates in checking.
        self.define_global(span, name, ty.clone(), false, None)?;
        Ok(vec![DeclKind::Config(ty, name, e).at(span)])
      }
      DeclKind::Var(ty, name) => {
        let ty = self.tc_type(span, ty)?;
        self.define_global(span, name, ty.clone(), false, None)?;
        Ok(vec![DeclKind::Var(ty, name).at(span)])
      }
    }
  }

  /// A global initialiser checks in its own scope; any runtime checks it
  /// raises wrap the expression itself since there is no statement to
  /// hoist them into.
  fn tc_global_init(&mut self, ty: &Type, e: Expr) -> Result<Expr> {
    self.push_scope();
    let r = self.guarded(|tc| {
      let e = tc.check_expr(ty, e)?;
      Ok((e, ty.clone()))
    });
    self.pop_scope();
    Ok(r?.0)
  }

  fn define_type(&mut self, span: Loc, name: Ident, tc: TypeTc) -> Result<()> {
    let replaceable = matches!(
      self.env.types.get(&name.name),
      None | Some(Spanned { k: TypeTc::ForwardDeclared, .. }),
    );
    if !replaceable && !matches!(tc, TypeTc::ForwardDeclared) {
      return Err(Error::Type(span, format!("type `{name}` is already defined")))
    }
    self.env.types.insert(name.name, Spanned::new(span, tc));
    Ok(())
  }

  fn define_global(
    &mut self, span: Loc, name: Ident, ty: Type, constant: bool, value: Option<Expr>,
  ) -> Result<()> {
    if self.env.globals.contains_key(&name.name) {
      return Err(Error::Type(span, format!("global `{name}` is already defined")))
    }
    let vi = VarInfo { name, loc: span, ty, is_local: false, is_constant: constant };
    match value {
      Some(e) => {
        self.env.consts.insert(name.name, e.clone());
        self.env.globals.insert(name.name, Entity::Const(vi, e));
      }
      None => {
        self.env.globals.insert(name.name, Entity::Var(vi));
      }
    }
    Ok(())
  }

  fn tc_field_list(
    &mut self, span: Loc, params: &[Ident], fields: Vec<(Ident, Type)>,
  ) -> Result<Vec<(Ident, Type)>> {
    self.push_scope();
    for &p in params {
      self.declare_local(VarInfo {
        name: p, loc: span, ty: Type::integer(), is_local: true, is_constant: true,
      })?;
    }
    let mut seen = HashSet::new();
    let r = fields.into_iter().map(|(f, ty)| {
      if !seen.insert(f.name) {
        return Err(Error::Type(span, format!("duplicate field `{f}`")))
      }
      Ok((f, self.tc_type(span, ty)?))
    }).collect();
    self.pop_scope();
    r
  }

  fn tc_enum(&mut self, span: Loc, name: Ident, members: Vec<Ident>) -> Result<Vec<Decl>> {
    self.define_type(span, name, TypeTc::Enum(members.clone()))?;
    for (i, &m) in members.iter().enumerate() {
      if self.env.globals.contains_key(&m.name) {
        return Err(Error::Type(span, format!("enumeration member `{m}` is already defined")))
      }
      self.env.globals.insert(m.name, Entity::EnumMember(name, i));
    }
    // Each enumeration brings its own equality pair into the operator table.
    let ety = Type::named(name);
    let mut mk = |prefix: &str| {
      let ft = FunType {
        name: Ident::new(intern(&format!("{prefix}_enum_{name}"))),
        kind: FuncKind::Function,
        params: vec![],
        args: vec![(Ident::from_str("x"), ety.clone()), (Ident::from_str("y"), ety.clone())],
        defaults: vec![None, None],
        rty: Some(Type::named(Ident::from_str("boolean"))),
        throws: ThrowsTag::NoThrow,
        loc: span,
      };
      self.env.add_fun(ft)
    };
    let eq = mk("eq");
    let ne = mk("ne");
    self.env.add_op2(Binop::Eq, [Ident::new(eq.name)]);
    self.env.add_op2(Binop::Ne, [Ident::new(ne.name)]);
    Ok(vec![DeclKind::Enum(name, members).at(span)])
  }

  /// Build and register the environment funtype for a signature. Returns
  /// the tagged name and the funtype.
  fn register_sig(&mut self, span: Loc, sig: &FunSig) -> Result<(Ident, FunType)> {
    // Reuse the prototype's tag if a structurally identical signature was
    // declared ahead of the definition.
    let existing = {
      let map = if sig.kind == FuncKind::Setter {
        self.env.setters_of(sig.name.name)
      } else {
        self.env.funs_of(sig.name.name)
      };
      map.iter().find(|ft| {
        ft.args.len() == sig.args.len() &&
          ft.args.iter().zip(&sig.args).all(|((_, t1), a)| t1 == &a.ty)
      }).cloned()
    };
    if let Some(ft) = existing {
      return Ok((ft.name, ft))
    }
    let params = derive_params(sig);
    let ft = FunType {
      name: sig.name,
      kind: sig.kind,
      params,
      args: sig.args.iter().map(|a| (a.name, a.ty.clone())).collect(),
      defaults: sig.args.iter().map(|a| a.default.clone()).collect(),
      rty: sig.rty.clone(),
      throws: sig.throws,
      loc: span,
    };
    let name = self.env.add_fun(ft.clone());
    let mut ft = ft;
    ft.name = name;
    Ok((name, ft))
  }

  fn tc_fun_defn(&mut self, span: Loc, sig: FunSig, body: Vec<Stmt>) -> Result<Vec<Decl>> {
    let (name, ft) = self.register_sig(span, &sig)?;
    self.supply.reset();
    self.push_scope();
    let r = (|| {
      for a in &sig.args {
        let ty = self.tc_type(span, a.ty.clone())?;
        self.declare_local(VarInfo {
          name: a.name,
          loc: span,
          // Formals that act as width parameters are immutable.
          is_constant: ft.params.iter().any(|p| p.name == a.name.name),
          ty,
          is_local: true,
        })?;
      }
      let rty = match &sig.rty {
        Some(t) => Some(self.tc_type(span, t.clone())?),
        None => None,
      };
      self.rty = rty.clone();
      let body = self.tc_stmts_open(body)?;
      Ok::<_, Error>((rty, body))
    })();
    self.pop_scope();
    self.rty = None;
    let (rty, body) = r?;
    let sig = FunSig {
      name,
      kind: sig.kind,
      args: sig.args,
      rty: rty.or(sig.rty),
      throws: sig.throws,
    };
    Ok(vec![DeclKind::FunDefn(sig, body).at(span)])
  }
}

// --------------------------------------------------------------- helpers

/// Parameters of a signature: names that occur in type-level expression
/// positions and are either integer-typed formals or free in the signature.
fn derive_params(sig: &FunSig) -> Vec<Ident> {
  let mut typevars: Vec<Symbol> = vec![];
  let mut seen = HashSet::new();
  let mut scan_expr = |e: &Expr, typevars: &mut Vec<Symbol>| {
    let mut stack = vec![e];
    while let Some(e) = stack.pop() {
      match &e.k {
        ExprKind::Var(x) => {
          if seen.insert(x.name) { typevars.push(x.name) }
        }
        ExprKind::Binop(_, a, b) => { stack.push(&**a); stack.push(&**b) }
        ExprKind::Unop(_, a) => stack.push(&**a),
        _ => {}
      }
    }
  };
  let mut scan_ty = |t: &Type, typevars: &mut Vec<Symbol>| {
    let mut stack = vec![t];
    while let Some(t) = stack.pop() {
      match t {
        Type::Bits(w, _) => scan_expr(w, typevars),
        Type::Constructor(_, args) => for a in args { scan_expr(a, typevars) },
        Type::Array(ix, ety) => {
          if let IxType::Int(n) = &**ix { scan_expr(n, typevars) }
          stack.push(ety.as_ref());
        }
        Type::Tuple(ts) => stack.extend(ts.iter()),
        _ => {}
      }
    }
  };
  for a in &sig.args { scan_ty(&a.ty, &mut typevars) }
  if let Some(rty) = &sig.rty { scan_ty(rty, &mut typevars) }
  typevars.into_iter().filter(|&v| {
    match sig.args.iter().find(|a| a.name.name == v) {
      // An integer formal used at type level is a parameter.
      Some(a) => matches!(a.ty, Type::Integer(_)),
      // A free name is an implicit parameter.
      None => true,
    }
  }).map(Ident::new).collect()
}

/// Match a formal type against an actual type, extracting the expression
/// bound to parameter `p` if it occurs.
fn synthesize(p: &Ident, formal: &Type, actual: &Type) -> Option<Expr> {
  match (formal, actual) {
    (Type::Bits(w, _), Type::Bits(aw, _)) => match_param(p, w, aw),
    (Type::Constructor(_, fs), Type::Constructor(_, asx)) => {
      for (f, a) in fs.iter().zip(asx) {
        if let Some(e) = match_param_expr(p, f, a) { return Some(e) }
      }
      None
    }
    (Type::Array(fix, fty), Type::Array(aix, aty)) => {
      if_chain! {
        if let (IxType::Int(f), IxType::Int(a)) = (&**fix, &**aix);
        if let Some(e) = match_param_expr(p, f, a);
        then { return Some(e) }
      }
      synthesize(p, fty, aty)
    }
    (Type::Tuple(fs), Type::Tuple(asx)) => {
      for (f, a) in fs.iter().zip(asx) {
        if let Some(e) = synthesize(p, f, a) { return Some(e) }
      }
      None
    }
    _ => None,
  }
}

fn match_param(p: &Ident, formal: &Expr, actual: &Expr) -> Option<Expr> {
  match_param_expr(p, formal, actual)
}

fn match_param_expr(p: &Ident, formal: &Expr, actual: &Expr) -> Option<Expr> {
  match &formal.k {
    ExprKind::Var(x) if x.name == p.name => Some(actual.clone()),
    _ => None,
  }
}

/// Substitute default expressions' references to earlier formals with the
/// already-bound arguments.
fn substitute_defaults(d: &Expr, ft: &FunType, bound: &[Option<Expr>]) -> Expr {
  let map: hashbrown::HashMap<Ident, Expr> = ft.args.iter().zip(bound)
    .filter_map(|((n, _), b)| b.clone().map(|e| (*n, e)))
    .collect();
  subst_expr(d, &map)
}

/// Substitute identifiers by expressions throughout an expression.
pub fn subst_expr(e: &Expr, map: &hashbrown::HashMap<Ident, Expr>) -> Expr {
  struct Subst<'a>(&'a hashbrown::HashMap<Ident, Expr>);
  impl crate::visitor::Visitor for Subst<'_> {
    fn visit_expr(&mut self, e: &Expr) -> crate::visitor::Action<Expr> {
      if let ExprKind::Var(x) = &e.k {
        if let Some(r) = self.0.get(x) {
          return crate::visitor::Action::Change(r.clone())
        }
      }
      crate::visitor::Action::DoChildren
    }
  }
  crate::visitor::visit_expr(&mut Subst(map), e.clone())
}

/// Substitute identifiers by expressions throughout a type.
pub fn subst_ty(ty: &Type, map: &hashbrown::HashMap<Ident, Expr>) -> Type {
  struct Subst<'a>(&'a hashbrown::HashMap<Ident, Expr>);
  impl crate::visitor::Visitor for Subst<'_> {
    fn visit_expr(&mut self, e: &Expr) -> crate::visitor::Action<Expr> {
      if let ExprKind::Var(x) = &e.k {
        if let Some(r) = self.0.get(x) {
          return crate::visitor::Action::Change(r.clone())
        }
      }
      crate::visitor::Action::DoChildren
    }
  }
  crate::visitor::visit_ty(&mut Subst(map), ty.clone())
}

fn bin(op: Binop, a: Expr, b: Expr) -> Expr {
  ExprKind::Binop(op, Box::new(a), Box::new(b)).synth()
}

/// Generated check expressions use the resolved integer primitives
/// directly, the same form source-level arithmetic takes after checking,
/// so they fold, translate to the solver, and emit without another pass.
fn prim(name: &str, a: Expr, b: Expr) -> Expr {
  ExprKind::TApply(Ident::from_str(name), vec![], vec![a, b], ThrowsTag::NoThrow).synth()
}

fn add_expr(a: Expr, b: Expr) -> Expr { prim("add_int", a, b) }
fn sub_expr(a: Expr, b: Expr) -> Expr { prim("sub_int", a, b) }
fn mul_expr(a: Expr, b: Expr) -> Expr { prim("mul_int", a, b) }
fn eq_expr(a: Expr, b: Expr) -> Expr { prim("eq_int", a, b) }
fn ne_expr(a: Expr, b: Expr) -> Expr { prim("ne_int", a, b) }
fn le_expr(a: Expr, b: Expr) -> Expr { prim("le_int", a, b) }
fn lt_expr(a: Expr, b: Expr) -> Expr { prim("lt_int", a, b) }
fn and_expr(a: Expr, b: Expr) -> Expr { bin(Binop::BoolAnd, a, b) }

/// `hi - lo + 1`, the width of a `hi:lo` slice.
fn width_expr(hi: &Expr, lo: &Expr) -> Expr {
  add_expr(sub_expr(hi.clone(), lo.clone()), lit_int(1))
}

/// `0 <= i && i < n`.
fn in_range(i: &Expr, lo: &Expr, n: &Expr) -> Expr {
  and_expr(le_expr(lo.clone(), i.clone()), lt_expr(i.clone(), n.clone()))
}

/// `lo <= v && v <= hi`.
fn in_closed_range(v: &Expr, lo: &Expr, hi: &Expr) -> Expr {
  and_expr(le_expr(lo.clone(), v.clone()), le_expr(v.clone(), hi.clone()))
}

/// `0 <= lo && lo + w <= n`, the slice bounds obligation.
fn slice_in_bounds(lo: &Expr, w: &Expr, n: &Expr) -> Expr {
  and_expr(
    le_expr(lit_int(0), lo.clone()),
    le_expr(add_expr(lo.clone(), w.clone()), n.clone()),
  )
}

/// Membership of `e` in a constraint set, as a boolean expression.
fn membership(e: &Expr, cs: &[Constraint]) -> Expr {
  let mut out: Option<Expr> = None;
  for c in cs {
    let test = match c {
      Constraint::Single(v) => eq_expr(e.clone(), v.clone()),
      Constraint::Range(lo, hi) => in_closed_range(e, lo, hi),
    };
    out = Some(match out {
      None => test,
      Some(prev) => bin(Binop::BoolOr, prev, test),
    });
  }
  out.unwrap_or_else(|| ExprKind::Lit(Value::Bool(true)).synth())
}

/// The sum of a list of width expressions.
fn sum_exprs(es: &[Expr]) -> Expr {
  let mut out: Option<Expr> = None;
  for e in es {
    out = Some(match out {
      None => e.clone(),
      Some(prev) => add_expr(prev, e.clone()),
    });
  }
  out.unwrap_or_else(|| lit_int(0))
}

/// The tight `[lo, hi]` of a constraint set whose bounds all fold.
fn interval_of(cs: &[Constraint], consts: &impl ConstSource) -> Option<(BigInt, BigInt)> {
  let mut lo: Option<BigInt> = None;
  let mut hi: Option<BigInt> = None;
  for c in cs {
    let (l, h) = match c {
      Constraint::Single(e) => {
        let n = fold_int(e, consts)?;
        (n.clone(), n)
      }
      Constraint::Range(a, b) => (fold_int(a, consts)?, fold_int(b, consts)?),
    };
    lo = Some(match lo { None => l.clone(), Some(x) => x.min(l) });
    hi = Some(match hi { None => h.clone(), Some(x) => x.max(h) });
  }
  Some((lo?, hi?))
}

fn pow_clamped(base: &BigInt, exp: &BigInt) -> Option<BigInt> {
  use num::ToPrimitive;
  let e = exp.to_usize()?;
  if e > 4096 { return None }
  Some(num::pow::pow(base.clone(), e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;
  use crate::parser::parse;

  fn check(src: &str) -> Result<Vec<Decl>> {
    let ts = lex("test.asl", src).expect("lexes");
    let r = parse(&ts);
    assert!(r.errors.is_empty(), "parse errors: {:?}", r.errors);
    let mut env = GlobalEnv::with_prelude();
    let mut tc = TypeChecker::new(&mut env, CheckConfig {
      max_errors: 1,
      ..CheckConfig::default()
    });
    tc.check_program(r.decls)
  }

  #[test]
  fn resolves_operators_to_primitives() {
    let ds = check(
      "func Test(x : bits(4), y : bits(4)) => bits(4)\nbegin\n  return x OR y;\nend",
    ).expect("typechecks");
    let DeclKind::FunDefn(sig, body) = &ds[0].k else { panic!() };
    assert_ne!(sig.name.tag, 0, "definitions get tagged names");
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!("{body:?}") };
    let ExprKind::TApply(f, params, args, _) = &e.k else { panic!("unresolved: {e}") };
    assert_eq!(f.name, intern("or_bits"));
    assert_eq!(params.len(), 1, "width parameter synthesized");
    assert_eq!(args.len(), 2);
  }

  #[test]
  fn integer_comparison_and_for_loop() {
    check(
      "func Test(x : integer, y : integer) => boolean\nbegin\n  return x >= y;\nend\n\
       func Sum() => integer\nbegin\n  var s : integer = 0;\n  \
       for i = 3 downto 0 do\n    s = s + i;\n  end\n  return s;\nend",
    ).expect("typechecks");
  }

  #[test]
  fn unknown_variable_is_reported() {
    let e = check("func F() => integer\nbegin\n  return missing;\nend").unwrap_err();
    assert!(matches!(e, Error::UnknownObject(_, "variable", _)), "{e}");
  }

  #[test]
  fn record_parameter_arity_is_enforced() {
    let e = check(
      "record R(N) { x : bits(N) }\n\
       func S4(r : R(4)) => boolean\nbegin\n  return TRUE;\nend\n\
       func Use() => boolean\nbegin\n  return S4(R{ x = '1111' });\nend",
    ).unwrap_err();
    assert!(matches!(e, Error::DoesNotMatch(..)), "{e}");
  }

  #[test]
  fn width_equality_of_mutable_copy_is_rejected() {
    // The width of a mutable variable is not provably the parameter.
    let e = check(
      "func F(a : integer, src : bits(a)) => boolean\nbegin\n  \
       var b : integer = a;\n  return Zeros(a) == Zeros(b);\nend",
    ).unwrap_err();
    assert!(matches!(e, Error::DoesNotMatch(..) | Error::Type(..)), "{e}");
  }

  #[test]
  fn let_bound_width_copy_is_accepted_when_foldable() {
    check(
      "func F() => boolean\nbegin\n  let a = 8;\n  let b = a;\n  \
       return Zeros(a) == Zeros(b);\nend",
    ).expect("constant widths fold to equal values");
  }

  #[test]
  fn named_arguments_bind_and_defaults_fill() {
    let ds = check(
      "func G(x : integer, w : integer = 4) => integer\nbegin\n  return w;\nend\n\
       func Use() => integer\nbegin\n  return G(x = 1);\nend",
    ).expect("typechecks");
    let DeclKind::FunDefn(_, body) = &ds[1].k else { panic!() };
    let StmtKind::Return(Some(e)) = &body[0].k else { panic!() };
    let ExprKind::TApply(_, _, args, _) = &e.k else { panic!("unresolved") };
    assert_eq!(args.len(), 2, "default filled in");
  }

  #[test]
  fn positional_after_named_is_rejected() {
    let e = check(
      "func G(x : integer, w : integer) => integer\nbegin\n  return w;\nend\n\
       func Use() => integer\nbegin\n  return G(x = 1, 2);\nend",
    ).unwrap_err();
    assert!(e.to_string().contains("positional argument after named"), "{e}");
  }

  #[test]
  fn division_inserts_runtime_checks() {
    let ds = check(
      "func F(x : integer, y : integer) => integer\nbegin\n  return x DIVRM y;\nend",
    ).expect("typechecks");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    assert!(body.len() >= 2, "an assert precedes the return: {body:?}");
    assert!(matches!(&body[0].k, StmtKind::Assert(_)));
  }

  #[test]
  fn slice_bounds_check_inserted_for_symbolic_index() {
    let ds = check(
      "func F(x : bits(8), i : integer) => bits(1)\nbegin\n  return x[i];\nend",
    ).expect("typechecks");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    assert!(matches!(&body[0].k, StmtKind::Assert(_)), "{body:?}");
  }

  #[test]
  fn literal_slices_check_statically() {
    let ds = check(
      "func F(x : bits(8)) => bits(4)\nbegin\n  return x[7:4];\nend",
    ).expect("typechecks");
    let DeclKind::FunDefn(_, body) = &ds[0].k else { panic!() };
    assert_eq!(body.len(), 1, "no runtime check needed: {body:?}");
  }

  #[test]
  fn getters_and_setters_resolve() {
    let ds = check(
      "var bits(32) _pc;\n\
       getter PC => bits(32)\nbegin\n  return _pc;\nend\n\
       setter PC = v : bits(32)\nbegin\n  _pc = v;\nend\n\
       func Step()\nbegin\n  PC = PC + '00000000 00000000 00000000 00000100';\nend",
    ).expect("typechecks");
    let DeclKind::FunDefn(_, body) = &ds[3].k else { panic!() };
    let StmtKind::Assign(lhs, _) = &body[0].k else { panic!("{body:?}") };
    assert!(matches!(&lhs.k, LExprKind::ReadWrite(..) | LExprKind::Write(..)), "{lhs:?}");
  }

  #[test]
  fn enumerations_get_equality() {
    check(
      "enumeration Mode { User, Kernel }\n\
       func IsUser(m : Mode) => boolean\nbegin\n  return m == User;\nend",
    ).expect("typechecks");
  }

  #[test]
  fn exceptions_typecheck_in_try() {
    check(
      "exception Fault { addr : bits(32) }\n\
       func F?()\nbegin\n  \
       throw Fault{ addr = Zeros(32) };\nend\n\
       func G()\nbegin\n  try\n    F();\n  catch\n    \
       when e : Fault => - = e.addr;\n  end\nend",
    ).expect("typechecks");
  }

  #[test]
  fn constrained_argument_inserts_membership_check() {
    let ds = check(
      "func F(n : integer {0..31}) => integer\nbegin\n  return n;\nend\n\
       func Use(i : integer) => integer\nbegin\n  return F(i);\nend",
    ).expect("typechecks");
    let DeclKind::FunDefn(_, body) = &ds[1].k else { panic!() };
    assert!(matches!(&body[0].k, StmtKind::Assert(_)),
      "membership assert inserted: {body:?}");
  }

  #[test]
  fn literal_argument_satisfies_constraint_statically() {
    let ds = check(
      "func F(n : integer {0..31}) => integer\nbegin\n  return n;\nend\n\
       func Use() => integer\nbegin\n  return F(7);\nend",
    ).expect("typechecks");
    let DeclKind::FunDefn(_, body) = &ds[1].k else { panic!() };
    assert_eq!(body.len(), 1, "no check needed: {body:?}");
  }

  #[test]
  fn range_propagation_through_addition() {
    let mut env = GlobalEnv::with_prelude();
    let mut tc = TypeChecker::new(&mut env, CheckConfig::default());
    tc.push_scope();
    tc.declare_local(VarInfo {
      name: Ident::from_str("a"),
      loc: Loc::Unknown,
      ty: Type::Integer(Some(vec![Constraint::Range(lit_int(0), lit_int(3))])),
      is_local: true,
      is_constant: false,
    }).expect("declare");
    tc.declare_local(VarInfo {
      name: Ident::from_str("b"),
      loc: Loc::Unknown,
      ty: Type::Integer(Some(vec![Constraint::Range(lit_int(1), lit_int(4))])),
      is_local: true,
      is_constant: false,
    }).expect("declare");
    let e = bin(Binop::Add, var(Ident::from_str("a")), var(Ident::from_str("b")));
    let (_, ty) = tc.tc_expr(e).expect("typechecks");
    let Type::Integer(Some(cs)) = ty else { panic!("not refined: {ty}") };
    let (lo, hi) = interval_of(&cs, &crate::consteval::NoConsts).expect("folds");
    assert_eq!((lo, hi), (BigInt::from(1), BigInt::from(7)));
  }

  #[test]
  fn duplicate_definitions_in_scope_are_rejected() {
    let e = check(
      "func F() => integer\nbegin\n  let x = 1;\n  let x = 2;\n  return x;\nend",
    ).unwrap_err();
    assert!(e.to_string().contains("already defined"), "{e}");
  }
}
