//! Evaluation-order policing, run before typechecking.
//!
//! An expression may contain at most one *effectful* call among unsequenced
//! sibling subexpressions, so that its value never depends on the order the
//! siblings are evaluated in. A call is effectful if the callee (by root
//! name, since overloads are not yet resolved) assigns to a global variable,
//! touches RAM, or transitively calls something that does. Sequenced forms
//! (`&&`, `||`, conditional expressions, inserted lets) are exempt because
//! their order is defined.

use bitflags::bitflags;
use hashbrown::{HashMap, HashSet};
use crate::error::{Error, Result};
use crate::symbol::{Symbol, intern};
use crate::types::ast::*;

bitflags! {
  /// What a function body does to session-global state.
  #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
  pub struct Effects: u8 {
    /// Assigns to a global variable.
    const WRITES_GLOBAL = 1;
    /// Uses a RAM primitive.
    const RAM = 1 << 1;
  }
}

impl Effects {
  /// Whether these effects make sibling evaluation order observable.
  #[must_use] pub fn is_effectful(self) -> bool { !self.is_empty() }
}

/// The RAM primitives, which are effectful by definition.
fn ram_primitives() -> [Symbol; 3] {
  [intern("__RAM_init"), intern("__RAM_read"), intern("__RAM_write")]
}

/// Per-root-name effect classification for a set of declarations.
#[derive(Debug, Default)]
pub struct EffectInfo {
  effects: HashMap<Symbol, Effects>,
}

impl EffectInfo {
  /// Compute effects for every function by fixpoint over the call graph.
  #[must_use] pub fn compute(decls: &[Decl]) -> Self {
    let globals: HashSet<Symbol> = decls.iter().filter_map(|d| match &d.k {
      DeclKind::Var(_, name) => Some(name.name),
      _ => None,
    }).collect();

    let mut effects: HashMap<Symbol, Effects> = HashMap::new();
    for p in ram_primitives() { effects.insert(p, Effects::RAM); }

    // Setters exist to assign through; treat every setter as a global write.
    let bodies: Vec<(Symbol, &FunSig, &[Stmt])> = decls.iter().filter_map(|d| match &d.k {
      DeclKind::FunDefn(sig, body) => Some((sig.name.name, sig, &body[..])),
      _ => None,
    }).collect();
    for (name, sig, _) in &bodies {
      if sig.kind == FuncKind::Setter {
        effects.entry(*name).or_default().insert(Effects::WRITES_GLOBAL);
      }
    }

    loop {
      let mut changed = false;
      for (name, sig, body) in &bodies {
        let mut locals: HashSet<Symbol> = sig.args.iter().map(|a| a.name.name).collect();
        let mut eff = effects.get(name).copied().unwrap_or_default();
        for s in *body { eff |= body_effects(s, &globals, &mut locals, &effects) }
        if effects.get(name).copied().unwrap_or_default() != eff {
          effects.insert(*name, eff);
          changed = true;
        }
      }
      if !changed { return EffectInfo { effects } }
    }
  }

  /// Whether a call to this root name is effectful.
  #[must_use] pub fn is_effectful(&self, name: Symbol) -> bool {
    self.effects.get(&name).copied().unwrap_or_default().is_effectful()
  }
}

fn lexpr_root(e: &LExpr) -> Option<Symbol> {
  match &e.k {
    LExprKind::Var(x) => Some(x.name),
    LExprKind::Field(e, _) | LExprKind::Fields(e, _) | LExprKind::Index(e, _) |
    LExprKind::Slices(e, ..) => lexpr_root(e),
    _ => None,
  }
}

fn call_effects(name: Symbol, known: &HashMap<Symbol, Effects>) -> Effects {
  known.get(&name).copied().unwrap_or_default()
}

fn expr_calls(e: &Expr, known: &HashMap<Symbol, Effects>) -> Effects {
  let mut eff = Effects::default();
  let mut stack = vec![e];
  while let Some(e) = stack.pop() {
    match &e.k {
      ExprKind::Call(name, args) => {
        eff |= call_effects(name.name, known);
        stack.extend(args.iter().map(|(_, e)| e));
      }
      ExprKind::TApply(name, params, args, _) => {
        eff |= call_effects(name.name, known);
        stack.extend(params);
        stack.extend(args);
      }
      ExprKind::Var(x) => eff |= call_effects(x.name, known),
      _ => each_child(e, |c| stack.push(c)),
    }
  }
  eff
}

/// Apply `f` to every direct child expression of `e`.
fn each_child<'a>(e: &'a Expr, mut f: impl FnMut(&'a Expr)) {
  match &e.k {
    ExprKind::Lit(_) | ExprKind::Var(_) => {}
    ExprKind::Field(e, _) | ExprKind::Fields(e, _) => f(e),
    ExprKind::Index(a, i) => { f(a); f(i) }
    ExprKind::Slices(e, ss, _) => {
      f(e);
      for s in ss { each_slice_child(s, &mut f) }
    }
    ExprKind::Record(_, params, fields) => {
      params.iter().for_each(&mut f);
      fields.iter().for_each(|(_, e)| f(e));
    }
    ExprKind::WithChanges(e, changes) => {
      f(e);
      for (c, v) in changes {
        if let Change::Slices(ss) = c {
          for s in ss { each_slice_child(s, &mut f) }
        }
        f(v)
      }
    }
    ExprKind::If(arms, els) => {
      for (c, t) in arms { f(c); f(t) }
      f(els)
    }
    ExprKind::Let(_, _, e1, e2) | ExprKind::Assert(e1, e2) => { f(e1); f(e2) }
    ExprKind::Call(_, args) => args.iter().for_each(|(_, e)| f(e)),
    ExprKind::TApply(_, params, args, _) => {
      params.iter().for_each(&mut f);
      args.iter().for_each(&mut f);
    }
    ExprKind::Tuple(es) | ExprKind::ArrayInit(es) => es.iter().for_each(f),
    ExprKind::Concat(ws, es) => {
      ws.iter().for_each(&mut f);
      es.iter().for_each(&mut f);
    }
    ExprKind::Unop(_, e) => f(e),
    ExprKind::Binop(_, a, b) => { f(a); f(b) }
    ExprKind::AsConstraint(e, cs) => {
      f(e);
      for c in cs {
        match c {
          Constraint::Single(e) => f(e),
          Constraint::Range(lo, hi) => { f(lo); f(hi) }
        }
      }
    }
    ExprKind::AsType(e, _) => f(e),
    ExprKind::Unknown(_) => {}
    ExprKind::In(e, p) => { f(e); each_pattern_child(p, &mut f) }
  }
}

fn each_slice_child<'a>(s: &'a Slice, f: &mut impl FnMut(&'a Expr)) {
  match s {
    Slice::Single(e) => f(e),
    Slice::HiLo(a, b) | Slice::LoWd(a, b) | Slice::HiWd(a, b) | Slice::Element(a, b) => {
      f(a); f(b)
    }
  }
}

fn each_pattern_child<'a>(p: &'a Pattern, f: &mut impl FnMut(&'a Expr)) {
  match p {
    Pattern::Lit(_) | Pattern::Const(_) | Pattern::Wildcard | Pattern::Mask(_) => {}
    Pattern::Tuple(ps) | Pattern::Set(ps) =>
      for p in ps { each_pattern_child(p, f) },
    Pattern::Expr(e) => f(e),
    Pattern::Range(lo, hi) => { f(lo); f(hi) }
  }
}

fn body_effects(
  s: &Stmt, globals: &HashSet<Symbol>, locals: &mut HashSet<Symbol>,
  known: &HashMap<Symbol, Effects>,
) -> Effects {
  let mut eff = Effects::default();
  let mut on_stmts = |ss: &[Stmt], locals: &mut HashSet<Symbol>| {
    let mut e = Effects::default();
    for s in ss { e |= body_effects(s, globals, locals, known) }
    e
  };
  match &s.k {
    StmtKind::VarDeclsNoInit(_, names) => {
      for n in names { locals.insert(n.name); }
    }
    StmtKind::VarDecl { item, init, .. } => {
      eff |= expr_calls(init, known);
      declare_item(item, locals);
    }
    StmtKind::Assign(lhs, rhs) => {
      eff |= expr_calls(rhs, known);
      if let Some(root) = lexpr_root(lhs) {
        if !locals.contains(&root) && globals.contains(&root) {
          eff |= Effects::WRITES_GLOBAL
        }
      }
      if let LExprKind::Write(name, ..) | LExprKind::ReadWrite(_, name, _) = &lhs.k {
        eff |= call_effects(name.name, known)
      }
    }
    StmtKind::Call(name, args) => {
      eff |= call_effects(name.name, known);
      for (_, e) in args { eff |= expr_calls(e, known) }
    }
    StmtKind::TCall(name, params, args, _) => {
      eff |= call_effects(name.name, known);
      for e in params.iter().chain(args) { eff |= expr_calls(e, known) }
    }
    StmtKind::Return(e) => {
      if let Some(e) = e { eff |= expr_calls(e, known) }
    }
    StmtKind::Assert(e) | StmtKind::Throw(e) => eff |= expr_calls(e, known),
    StmtKind::Try { body, catchers, otherwise } => {
      eff |= on_stmts(body, locals);
      for c in catchers {
        locals.insert(c.name.name);
        eff |= on_stmts(&c.body, locals);
      }
      if let Some(ss) = otherwise { eff |= on_stmts(ss, locals) }
    }
    StmtKind::If(arms, els) => {
      for (c, ss) in arms {
        eff |= expr_calls(c, known);
        eff |= on_stmts(ss, locals);
      }
      eff |= on_stmts(els, locals);
    }
    StmtKind::Case(e, alts, default) => {
      eff |= expr_calls(e, known);
      for a in alts {
        if let Some(g) = &a.guard { eff |= expr_calls(g, known) }
        eff |= on_stmts(&a.body, locals);
      }
      if let Some(ss) = default { eff |= on_stmts(ss, locals) }
    }
    StmtKind::For { var, from, to, body, .. } => {
      eff |= expr_calls(from, known) | expr_calls(to, known);
      locals.insert(var.name);
      eff |= on_stmts(body, locals);
    }
    StmtKind::While(c, body) => {
      eff |= expr_calls(c, known);
      eff |= on_stmts(body, locals);
    }
    StmtKind::Repeat(body, c) => {
      eff |= on_stmts(body, locals);
      eff |= expr_calls(c, known);
    }
  }
  eff
}

fn declare_item(item: &DeclItem, locals: &mut HashSet<Symbol>) {
  match item {
    DeclItem::Var(name, _) => { locals.insert(name.name); }
    DeclItem::Tuple(items) => for i in items { declare_item(i, locals) },
  }
}

/// Check every expression in the program for order-dependent siblings.
pub fn check_evaluation_order(decls: &[Decl], info: &EffectInfo) -> Result<()> {
  let mut ck = Checker { info };
  for d in decls {
    if let DeclKind::FunDefn(_, body) = &d.k {
      for s in body { ck.check_stmt(s)? }
    }
  }
  Ok(())
}

struct Checker<'a> {
  info: &'a EffectInfo,
}

impl Checker<'_> {
  /// Returns whether `e` contains an effectful call, erroring if two
  /// unsequenced siblings both do.
  fn check_expr(&mut self, e: &Expr) -> Result<bool> {
    // Sequenced forms have a defined order, so their children may each be
    // effectful without making the result order dependent.
    let sequenced = matches!(
      &e.k,
      ExprKind::Binop(Binop::BoolAnd | Binop::BoolOr | Binop::Implies, ..) |
        ExprKind::If(..) | ExprKind::Let(..) | ExprKind::Assert(..),
    );
    let own = match &e.k {
      ExprKind::Call(name, _) | ExprKind::TApply(name, ..) =>
        self.info.is_effectful(name.name),
      // A bare variable can be a parameterless getter.
      ExprKind::Var(x) => self.info.is_effectful(x.name),
      _ => false,
    };
    let mut effectful_children = 0_u32;
    let mut err = None;
    let mut any = own;
    each_child(e, |c| {
      if err.is_some() { return }
      match self.check_expr(c) {
        Ok(true) => {
          effectful_children += 1;
          any = true;
        }
        Ok(false) => {}
        Err(e) => err = Some(e),
      }
    });
    if let Some(e) = err { return Err(e) }
    // A node's own effect happens after its children, so only sibling
    // subexpressions can race each other.
    if !sequenced && effectful_children > 1 {
      return Err(Error::Type(
        e.span,
        format!("evaluation order of `{e}` is observable: \
                 more than one side-effecting subexpression"),
      ))
    }
    Ok(any)
  }

  fn check_stmt(&mut self, s: &Stmt) -> Result<()> {
    let mut result = Ok(());
    let mut on_expr = |ck: &mut Self, e: &Expr| {
      if result.is_ok() { result = ck.check_expr(e).map(|_| ()) }
    };
    match &s.k {
      StmtKind::VarDeclsNoInit(..) => {}
      StmtKind::VarDecl { init, .. } => on_expr(self, init),
      StmtKind::Assign(_, rhs) => on_expr(self, rhs),
      StmtKind::Call(_, args) => for (_, e) in args { on_expr(self, e) },
      StmtKind::TCall(_, params, args, _) =>
        for e in params.iter().chain(args) { on_expr(self, e) },
      StmtKind::Return(e) => if let Some(e) = e { on_expr(self, e) },
      StmtKind::Assert(e) | StmtKind::Throw(e) => on_expr(self, e),
      StmtKind::Try { body, catchers, otherwise } => {
        for s in body { self.check_stmt(s)? }
        for c in catchers { for s in &c.body { self.check_stmt(s)? } }
        if let Some(ss) = otherwise { for s in ss { self.check_stmt(s)? } }
      }
      StmtKind::If(arms, els) => {
        for (c, ss) in arms {
          on_expr(self, c);
          for s in ss { self.check_stmt(s)? }
        }
        for s in els { self.check_stmt(s)? }
      }
      StmtKind::Case(e, alts, default) => {
        on_expr(self, e);
        for a in alts {
          if let Some(g) = &a.guard { on_expr(self, g) }
          for s in &a.body { self.check_stmt(s)? }
        }
        if let Some(ss) = default { for s in ss { self.check_stmt(s)? } }
      }
      StmtKind::For { from, to, body, .. } => {
        on_expr(self, from);
        on_expr(self, to);
        for s in body { self.check_stmt(s)? }
      }
      StmtKind::While(c, body) => {
        on_expr(self, c);
        for s in body { self.check_stmt(s)? }
      }
      StmtKind::Repeat(body, c) => {
        for s in body { self.check_stmt(s)? }
        on_expr(self, c);
      }
    }
    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;
  use crate::parser::parse;

  fn decls(src: &str) -> Vec<Decl> {
    let ts = lex("test.asl", src).expect("lexes");
    let r = parse(&ts);
    assert!(r.errors.is_empty(), "{:?}", r.errors);
    r.decls
  }

  const MUTATOR: &str = "var integer g;\n\
    func WX() => integer\nbegin\n  g = g + 1;\n  return g;\nend\n";

  #[test]
  fn sibling_effectful_calls_rejected() {
    let ds = decls(&format!(
      "{MUTATOR}func Use() => integer\nbegin\n  return WX() + WX();\nend"
    ));
    let info = EffectInfo::compute(&ds);
    assert!(info.is_effectful(intern("WX")));
    let err = check_evaluation_order(&ds, &info).unwrap_err();
    assert!(matches!(err, Error::Type(..)), "{err}");
    assert!(err.to_string().contains("evaluation order"));
  }

  #[test]
  fn single_effectful_call_allowed() {
    let ds = decls(&format!(
      "{MUTATOR}func Use() => integer\nbegin\n  return WX() + 1;\nend"
    ));
    let info = EffectInfo::compute(&ds);
    check_evaluation_order(&ds, &info).expect("one effectful sibling is fine");
  }

  #[test]
  fn effects_propagate_through_calls() {
    let ds = decls(&format!(
      "{MUTATOR}func Indirect() => integer\nbegin\n  return WX();\nend\n\
       func Use() => integer\nbegin\n  return Indirect() + Indirect();\nend"
    ));
    let info = EffectInfo::compute(&ds);
    assert!(info.is_effectful(intern("Indirect")));
    assert!(check_evaluation_order(&ds, &info).is_err());
  }

  #[test]
  fn local_shadow_is_not_a_global_write() {
    let ds = decls(
      "var integer g;\n\
       func F() => integer\nbegin\n  var g : integer = 0;\n  g = 1;\n  return g;\nend\n\
       func Use() => integer\nbegin\n  return F() + F();\nend",
    );
    let info = EffectInfo::compute(&ds);
    assert!(!info.is_effectful(intern("F")));
    check_evaluation_order(&ds, &info).expect("writes only a local");
  }

  #[test]
  fn short_circuit_operators_are_sequenced() {
    let ds = decls(&format!(
      "{MUTATOR}func B() => boolean\nbegin\n  - = WX();\n  return TRUE;\nend\n\
       func Use() => boolean\nbegin\n  return B() && B();\nend"
    ));
    let info = EffectInfo::compute(&ds);
    check_evaluation_order(&ds, &info).expect("&& has a defined order");
  }

  #[test]
  fn ram_primitives_are_effectful() {
    let info = EffectInfo::default();
    let info2 = EffectInfo::compute(&[]);
    assert!(!info.is_effectful(intern("__RAM_write")));
    assert!(info2.is_effectful(intern("__RAM_write")));
  }
}
