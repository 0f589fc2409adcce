//! Entailment checking through an external SMT solver.
//!
//! The typechecker needs to decide goals of the form
//! `∀ vars. assumptions ⇒ goal` over integers: width equalities, constraint
//! membership, bounds of inserted checks. The fast path constant-folds both
//! sides and compares structurally; everything else is translated to
//! SMT-LIB2 and sent to a `z3` child process, asserting the assumptions and
//! the negated goal and reading `unsat` as "the implication holds".
//!
//! The translation is deliberately partial: any expression form outside the
//! supported set becomes a fresh uninterpreted constant keyed by its
//! structure, so equal subterms stay equal and reflexivity still closes
//! goals the theory cannot.

use std::fmt::Write as _;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use num::BigInt;
use crate::consteval::{ConstSource, fold};
use crate::error::{Error, Result};
use crate::types::ast::*;
use crate::types::{Ident, Loc};
use crate::value::Value;

/// A session with the external solver. One session is shared across a
/// whole typechecking pass to amortise process startup.
pub struct Solver {
  proc: Option<SolverProc>,
  /// Soft per-query time limit, if configured.
  timeout_ms: Option<u64>,
  /// Queries answered so far, for logging.
  queries: u64,
}

struct SolverProc {
  child: Child,
  stdin: std::process::ChildStdin,
  stdout: BufReader<std::process::ChildStdout>,
}

impl std::fmt::Debug for Solver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Solver")
      .field("available", &self.proc.is_some())
      .field("timeout_ms", &self.timeout_ms)
      .field("queries", &self.queries)
      .finish()
  }
}

impl Solver {
  /// Start a solver session. If the solver binary is unavailable the
  /// session degrades to the constant-folding fast path only, which makes
  /// every non-trivial goal unprovable rather than unusable.
  #[must_use] pub fn new(timeout_ms: Option<u64>) -> Self {
    let proc = Command::new("z3")
      .arg("-in")
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .spawn()
      .ok()
      .and_then(|mut child| {
        let stdin = child.stdin.take()?;
        let stdout = BufReader::new(child.stdout.take()?);
        Some(SolverProc { child, stdin, stdout })
      });
    if proc.is_none() {
      tracing::warn!("z3 not found; entailment limited to constant folding");
    }
    let mut this = Solver { proc, timeout_ms, queries: 0 };
    if let Some(ms) = timeout_ms {
      let _ = this.raw_send(&format!("(set-option :timeout {ms})"));
    }
    this
  }

  /// Decide `∀. assumptions ⇒ goal`. `Ok(false)` means unprovable (which
  /// includes solver timeouts and `unknown` answers).
  pub fn entails(
    &mut self, assumptions: &[Expr], goal: &Expr, consts: &impl ConstSource,
  ) -> Result<bool> {
    if let Some(Value::Bool(b)) = fold(goal, consts) {
      return Ok(b)
    }
    // Syntactic equality of folded sides decides most width goals.
    if let ExprKind::Binop(Binop::Eq, a, b) = &goal.k {
      if folded_eq(a, b, consts) { return Ok(true) }
    }
    if let ExprKind::TApply(name, _, args, _) = &goal.k {
      if name.name.as_str() == "eq_int" && args.len() == 2 && folded_eq(&args[0], &args[1], consts) {
        return Ok(true)
      }
    }
    self.query(assumptions, goal, consts)
  }

  /// Decide that two integer expressions are provably equal.
  pub fn entails_eq(
    &mut self, assumptions: &[Expr], a: &Expr, b: &Expr, consts: &impl ConstSource,
  ) -> Result<bool> {
    if folded_eq(a, b, consts) { return Ok(true) }
    let goal = ExprKind::Binop(Binop::Eq, Box::new(a.clone()), Box::new(b.clone())).synth();
    self.query(assumptions, &goal, consts)
  }

  fn query(
    &mut self, assumptions: &[Expr], goal: &Expr, consts: &impl ConstSource,
  ) -> Result<bool> {
    if self.proc.is_none() { return Ok(false) }
    self.queries += 1;
    let mut tr = Translator::new(consts);
    let mut body = String::new();
    for a in assumptions {
      let t = tr.tr_bool(a);
      let _ = writeln!(body, "(assert {t})");
    }
    let g = tr.tr_bool(goal);
    let _ = writeln!(body, "(assert (not {g}))");
    let script = format!("(push 1)\n{}{}(check-sat)\n(pop 1)", tr.decls, body);
    tracing::debug!(query = self.queries, "smt: {script}");
    let answer = self.raw_query(&script)?;
    tracing::debug!(query = self.queries, %answer, "smt answer");
    Ok(answer == "unsat")
  }

  fn raw_send(&mut self, line: &str) -> Result<()> {
    if let Some(p) = &mut self.proc {
      writeln!(p.stdin, "{line}")
        .map_err(|e| Error::Internal(format!("smt solver pipe: {e}")))?;
    }
    Ok(())
  }

  fn raw_query(&mut self, script: &str) -> Result<String> {
    let Some(p) = &mut self.proc else { return Ok("unknown".into()) };
    writeln!(p.stdin, "{script}")
      .and_then(|()| p.stdin.flush())
      .map_err(|e| Error::Internal(format!("smt solver pipe: {e}")))?;
    let mut line = String::new();
    loop {
      line.clear();
      let n = p.stdout.read_line(&mut line)
        .map_err(|e| Error::Internal(format!("smt solver pipe: {e}")))?;
      if n == 0 { return Ok("unknown".into()) }
      let line = line.trim();
      // Error output (e.g. from a malformed declaration) is logged and
      // treated as an unknown answer.
      if line.starts_with("(error") {
        tracing::warn!("smt error: {line}");
        return Ok("unknown".into())
      }
      if !line.is_empty() {
        return Ok(line.to_owned())
      }
    }
  }

  /// The diagnostic for a goal the solver could not establish.
  #[must_use] pub fn unprovable(loc: Loc, goal: impl std::fmt::Display) -> Error {
    Error::Type(loc, format!("cannot prove `{goal}` under current assumptions"))
  }
}

impl Drop for Solver {
  fn drop(&mut self) {
    if let Some(p) = &mut self.proc {
      let _ = writeln!(p.stdin, "(exit)");
      let _ = p.child.wait();
    }
  }
}

fn folded_eq(a: &Expr, b: &Expr, consts: &impl ConstSource) -> bool {
  match (fold(a, consts), fold(b, consts)) {
    (Some(x), Some(y)) => x == y,
    _ => a == b,
  }
}

struct Translator<'a, C> {
  consts: &'a C,
  decls: String,
  declared: HashSet<String>,
  /// Unsupported subterms, keyed by their printed structure so that equal
  /// subterms share an uninterpreted constant.
  uninterp: HashMap<String, String>,
}

impl<C: ConstSource> Translator<'_, C> {
  fn new(consts: &C) -> Translator<'_, C> {
    Translator { consts, decls: String::new(), declared: HashSet::new(), uninterp: HashMap::new() }
  }

  fn declare(&mut self, name: &str, sort: &str) {
    if self.declared.insert(name.to_owned()) {
      let _ = writeln!(self.decls, "(declare-fun {name} () {sort})");
    }
  }

  fn var_name(x: Ident) -> String {
    if x.tag == 0 { format!("v!{}", x.name) } else { format!("v!{}!{}", x.name, x.tag) }
  }

  fn fresh_uninterp(&mut self, e: &Expr, sort: &str) -> String {
    let key = format!("{sort}:{e}");
    if let Some(name) = self.uninterp.get(&key) { return name.clone() }
    let name = format!("u!{}", self.uninterp.len());
    self.declare(&name, sort);
    self.uninterp.insert(key, name.clone());
    name
  }

  fn tr_int(&mut self, e: &Expr) -> String {
    if let Some(Value::Int(n)) = fold(e, self.consts) {
      return sexp_int(&n)
    }
    match &e.k {
      ExprKind::Lit(Value::Int(n)) => sexp_int(n),
      ExprKind::Var(x) => {
        let name = Self::var_name(*x);
        self.declare(&name, "Int");
        name
      }
      ExprKind::Unop(Unop::Negate, a) => format!("(- {})", self.tr_int(a)),
      ExprKind::Binop(op, a, b) => self.tr_int_binop(*op, a, b)
        .unwrap_or_else(|| self.fresh_uninterp(e, "Int")),
      ExprKind::TApply(name, _, args, _) =>
        self.tr_int_prim(name.name.as_str(), args)
          .unwrap_or_else(|| self.fresh_uninterp(e, "Int")),
      _ => self.fresh_uninterp(e, "Int"),
    }
  }

  fn tr_int_binop(&mut self, op: Binop, a: &Expr, b: &Expr) -> Option<String> {
    let f = match op {
      Binop::Add => "+",
      Binop::Sub => "-",
      Binop::Mul => "*",
      _ => return self.tr_int_special(op_prim_name(op)?, a, b),
    };
    Some(format!("({f} {} {})", self.tr_int(a), self.tr_int(b)))
  }

  fn tr_int_prim(&mut self, name: &str, args: &[Expr]) -> Option<String> {
    match (name, args) {
      ("add_int", [a, b]) => Some(format!("(+ {} {})", self.tr_int(a), self.tr_int(b))),
      ("sub_int", [a, b]) => Some(format!("(- {} {})", self.tr_int(a), self.tr_int(b))),
      ("mul_int", [a, b]) => Some(format!("(* {} {})", self.tr_int(a), self.tr_int(b))),
      ("neg_int", [a]) => Some(format!("(- {})", self.tr_int(a))),
      (name, [a, b]) => self.tr_int_special(name, a, b),
      ("pow2_int", [a]) => self.tr_pow2(a),
      _ => None,
    }
  }

  /// The less common integer operations, shared between the operator and
  /// resolved-call spellings.
  fn tr_int_special(&mut self, name: &str, a: &Expr, b: &Expr) -> Option<String> {
    match name {
      // Exact division: sound given the runtime divisibility assert that
      // the typechecker injects next to every `DIV`.
      "exact_div_int" => Some(format!("(div {} {})", self.tr_int(a), self.tr_int(b))),
      "fdiv_int" => Some(format!("(div {} {})", self.tr_int(a), self.tr_int(b))),
      "frem_int" => Some(format!("(mod {} {})", self.tr_int(a), self.tr_int(b))),
      "min_int" => {
        let (x, y) = (self.tr_int(a), self.tr_int(b));
        Some(format!("(ite (<= {x} {y}) {x} {y})"))
      }
      "max_int" => {
        let (x, y) = (self.tr_int(a), self.tr_int(b));
        Some(format!("(ite (<= {x} {y}) {y} {x})"))
      }
      // Shifts become exponentiation; only literal amounts stay linear.
      "shl_int" => {
        let p = self.tr_pow2(b)?;
        Some(format!("(* {} {p})", self.tr_int(a)))
      }
      "shr_int" => {
        let p = self.tr_pow2(b)?;
        Some(format!("(div {} {p})", self.tr_int(a)))
      }
      _ => None,
    }
  }

  fn tr_pow2(&mut self, e: &Expr) -> Option<String> {
    let n = crate::consteval::fold_int(e, self.consts)?;
    let p = value_pow2(&n)?;
    Some(sexp_int(&p))
  }

  fn tr_bool(&mut self, e: &Expr) -> String {
    if let Some(Value::Bool(b)) = fold(e, self.consts) {
      return if b { "true".into() } else { "false".into() }
    }
    match &e.k {
      ExprKind::Unop(Unop::BoolNot, a) => format!("(not {})", self.tr_bool(a)),
      ExprKind::Binop(op, a, b) => {
        match op {
          Binop::BoolAnd => format!("(and {} {})", self.tr_bool(a), self.tr_bool(b)),
          Binop::BoolOr => format!("(or {} {})", self.tr_bool(a), self.tr_bool(b)),
          Binop::Implies => format!("(=> {} {})", self.tr_bool(a), self.tr_bool(b)),
          Binop::Iff => format!("(= {} {})", self.tr_bool(a), self.tr_bool(b)),
          Binop::Eq => format!("(= {} {})", self.tr_int(a), self.tr_int(b)),
          Binop::Ne => format!("(distinct {} {})", self.tr_int(a), self.tr_int(b)),
          Binop::Lt => format!("(< {} {})", self.tr_int(a), self.tr_int(b)),
          Binop::Le => format!("(<= {} {})", self.tr_int(a), self.tr_int(b)),
          Binop::Gt => format!("(> {} {})", self.tr_int(a), self.tr_int(b)),
          Binop::Ge => format!("(>= {} {})", self.tr_int(a), self.tr_int(b)),
          _ => self.bool_fallback(e),
        }
      }
      ExprKind::TApply(name, _, args, _) => match (name.name.as_str(), &args[..]) {
        ("eq_int", [a, b]) => format!("(= {} {})", self.tr_int(a), self.tr_int(b)),
        ("ne_int", [a, b]) => format!("(distinct {} {})", self.tr_int(a), self.tr_int(b)),
        ("lt_int", [a, b]) => format!("(< {} {})", self.tr_int(a), self.tr_int(b)),
        ("le_int", [a, b]) => format!("(<= {} {})", self.tr_int(a), self.tr_int(b)),
        ("gt_int", [a, b]) => format!("(> {} {})", self.tr_int(a), self.tr_int(b)),
        ("ge_int", [a, b]) => format!("(>= {} {})", self.tr_int(a), self.tr_int(b)),
        ("not_bool", [a]) => format!("(not {})", self.tr_bool(a)),
        ("and_bool", [a, b]) => format!("(and {} {})", self.tr_bool(a), self.tr_bool(b)),
        ("or_bool", [a, b]) => format!("(or {} {})", self.tr_bool(a), self.tr_bool(b)),
        ("implies_bool", [a, b]) => format!("(=> {} {})", self.tr_bool(a), self.tr_bool(b)),
        ("iff_bool", [a, b]) => format!("(= {} {})", self.tr_bool(a), self.tr_bool(b)),
        _ => self.bool_fallback(e),
      },
      ExprKind::Var(x) => {
        let name = format!("b!{}", Self::var_name(*x));
        self.declare(&name, "Bool");
        name
      }
      _ => self.bool_fallback(e),
    }
  }

  fn bool_fallback(&mut self, e: &Expr) -> String {
    self.fresh_uninterp(e, "Bool")
  }
}

fn op_prim_name(op: Binop) -> Option<&'static str> {
  Some(match op {
    Binop::Div => "exact_div_int",
    Binop::Divrm => "fdiv_int",
    Binop::Mod => "frem_int",
    Binop::ShiftL => "shl_int",
    Binop::ShiftR => "shr_int",
    _ => return None,
  })
}

fn sexp_int(n: &BigInt) -> String {
  if n.sign() == num::bigint::Sign::Minus {
    format!("(- {})", n.magnitude())
  } else {
    n.to_string()
  }
}

fn value_pow2(n: &BigInt) -> Option<BigInt> {
  crate::value::shl(&BigInt::from(1), n)
}

/// Conjoin a list of boolean expressions for use as one scope assumption.
#[must_use] pub fn conjoin(es: &[Expr]) -> Option<Expr> {
  es.iter().cloned().tree_reduce(|a, b| {
    ExprKind::Binop(Binop::BoolAnd, Box::new(a), Box::new(b)).synth()
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::consteval::NoConsts;
  use crate::types::Ident;

  fn eq(a: Expr, b: Expr) -> Expr {
    ExprKind::Binop(Binop::Eq, Box::new(a), Box::new(b)).synth()
  }
  fn le(a: Expr, b: Expr) -> Expr {
    ExprKind::Binop(Binop::Le, Box::new(a), Box::new(b)).synth()
  }
  fn add(a: Expr, b: Expr) -> Expr {
    ExprKind::Binop(Binop::Add, Box::new(a), Box::new(b)).synth()
  }

  #[test]
  fn constant_fold_fast_path_needs_no_solver() {
    let mut s = Solver { proc: None, timeout_ms: None, queries: 0 };
    let goal = eq(add(lit_int(2), lit_int(2)), lit_int(4));
    assert_eq!(s.entails(&[], &goal, &NoConsts), Ok(true));
    // Reflexivity through syntactic equality, even with free variables.
    let n = var(Ident::from_str("N"));
    let goal = eq(add(n.clone(), lit_int(1)), add(n.clone(), lit_int(1)));
    assert_eq!(s.entails(&[], &goal, &NoConsts), Ok(true));
    // Without a solver, a genuine implication is unprovable, not an error.
    let goal = le(n.clone(), add(n, lit_int(1)));
    assert_eq!(s.entails(&[], &goal, &NoConsts), Ok(false));
  }

  #[test]
  fn translation_shares_uninterpreted_subterms() {
    let mut tr = Translator::new(&NoConsts);
    // An unsupported form: a slice expression.
    let x = var(Ident::from_str("x"));
    let s1 = ExprKind::Slices(Box::new(x.clone()), vec![Slice::Single(lit_int(0))], None).synth();
    let s2 = ExprKind::Slices(Box::new(x), vec![Slice::Single(lit_int(0))], None).synth();
    let a = tr.tr_int(&s1);
    let b = tr.tr_int(&s2);
    assert_eq!(a, b, "structurally equal subterms share one symbol");
  }

  #[test]
  fn shifts_with_literal_amounts_become_multiplication() {
    let mut tr = Translator::new(&NoConsts);
    let n = var(Ident::from_str("N"));
    let e = ExprKind::Binop(Binop::ShiftL, Box::new(n), Box::new(lit_int(3))).synth();
    assert_eq!(tr.tr_int(&e), "(* v!N 8)");
  }

  // Exercises the external process; run only where z3 is installed.
  #[test]
  #[ignore = "requires z3 on PATH"]
  fn solver_decides_bound_implications() {
    let mut s = Solver::new(Some(2000));
    let n = var(Ident::from_str("N"));
    let assume = le(lit_int(0), n.clone());
    let goal = le(lit_int(0), add(n, lit_int(1)));
    assert_eq!(s.entails(&[assume], &goal, &NoConsts), Ok(true));
  }
}
