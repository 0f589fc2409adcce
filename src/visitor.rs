//! The rewriting visitor: a per-node action plus generic walkers.
//!
//! A pass implements [`Visitor`] and overrides the `visit_*` hooks it cares
//! about. Traversal is pre-order: the hook runs first and its [`Action`]
//! decides whether the walker recurses into children and whether the
//! matching `post_*` hook runs afterwards. Walkers take nodes by value and
//! return the rewritten node, so passes allocate only where they change
//! something structurally.

use crate::types::ast::*;
use crate::types::{Ident, Spanned};

/// What to do at a node.
pub enum Action<T> {
  /// Replace the node and do not visit children.
  Change(T),
  /// Keep the node and visit children.
  DoChildren,
  /// Keep the node and do not visit children.
  SkipChildren,
  /// Replace the node, visit the replacement's children, then run the
  /// matching `post_*` hook on the result.
  ChangeDoChildrenPost(T),
}

/// A rewriting pass over the AST.
#[allow(unused_variables)]
pub trait Visitor: Sized {
  /// Whether walkers descend into types (and the expressions inside them)
  /// reached from expression position. Passes that only rewrite value-level
  /// code turn this off to avoid touching type-level constraints.
  fn visit_tys_in_expr(&self) -> bool { true }

  /// Hook for expressions.
  fn visit_expr(&mut self, e: &Expr) -> Action<Expr> { Action::DoChildren }
  /// Post hook for expressions, run for [`Action::ChangeDoChildrenPost`].
  fn post_expr(&mut self, e: Expr) -> Expr { e }

  /// Hook for lvalues.
  fn visit_lexpr(&mut self, e: &LExpr) -> Action<LExpr> { Action::DoChildren }
  /// Post hook for lvalues.
  fn post_lexpr(&mut self, e: LExpr) -> LExpr { e }

  /// Hook for types.
  fn visit_ty(&mut self, ty: &Type) -> Action<Type> { Action::DoChildren }
  /// Post hook for types.
  fn post_ty(&mut self, ty: Type) -> Type { ty }

  /// Hook for patterns.
  fn visit_pattern(&mut self, p: &Pattern) -> Action<Pattern> { Action::DoChildren }

  /// Hook for statements. A statement may be replaced by any number of
  /// statements, which is how lowering passes split compound forms.
  fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> { Action::DoChildren }
  /// Post hook for statements.
  fn post_stmts(&mut self, ss: Vec<Stmt>) -> Vec<Stmt> { ss }

  /// Hook for every identifier in binding or reference position.
  fn visit_var(&mut self, v: Ident) -> Ident { v }
}

/// Visit one expression, honouring the visitor's action.
pub fn visit_expr<V: Visitor>(v: &mut V, e: Expr) -> Expr {
  match v.visit_expr(&e) {
    Action::Change(e2) => e2,
    Action::SkipChildren => e,
    Action::DoChildren => walk_expr(v, e),
    Action::ChangeDoChildrenPost(e2) => {
      let e3 = walk_expr(v, e2);
      v.post_expr(e3)
    }
  }
}

/// Visit the children of an expression.
pub fn walk_expr<V: Visitor>(v: &mut V, e: Expr) -> Expr {
  let Spanned { span, k } = e;
  let k = match k {
    k @ ExprKind::Lit(_) => k,
    ExprKind::Var(x) => ExprKind::Var(v.visit_var(x)),
    ExprKind::Field(e, f) => ExprKind::Field(visit_boxed(v, e), f),
    ExprKind::Fields(e, fs) => ExprKind::Fields(visit_boxed(v, e), fs),
    ExprKind::Index(a, i) => ExprKind::Index(visit_boxed(v, a), visit_boxed(v, i)),
    ExprKind::Slices(e, ss, ty) => ExprKind::Slices(
      visit_boxed(v, e),
      ss.into_iter().map(|s| visit_slice(v, s)).collect(),
      ty.map(|t| if v.visit_tys_in_expr() { Box::new(visit_ty(v, *t)) } else { t }),
    ),
    ExprKind::Record(name, params, fields) => ExprKind::Record(
      v.visit_var(name),
      params.into_iter().map(|e| visit_expr(v, e)).collect(),
      fields.into_iter().map(|(f, e)| (f, visit_expr(v, e))).collect(),
    ),
    ExprKind::WithChanges(e, changes) => ExprKind::WithChanges(
      visit_boxed(v, e),
      changes.into_iter().map(|(c, e)| (visit_change(v, c), visit_expr(v, e))).collect(),
    ),
    ExprKind::If(arms, els) => ExprKind::If(
      arms.into_iter().map(|(c, t)| (visit_expr(v, c), visit_expr(v, t))).collect(),
      visit_boxed(v, els),
    ),
    ExprKind::Let(x, ty, e1, e2) => ExprKind::Let(
      v.visit_var(x),
      if v.visit_tys_in_expr() { Box::new(visit_ty(v, *ty)) } else { ty },
      visit_boxed(v, e1),
      visit_boxed(v, e2),
    ),
    ExprKind::Assert(c, e) => ExprKind::Assert(visit_boxed(v, c), visit_boxed(v, e)),
    ExprKind::Call(name, args) => ExprKind::Call(
      v.visit_var(name),
      args.into_iter().map(|(n, e)| (n, visit_expr(v, e))).collect(),
    ),
    ExprKind::TApply(name, params, args, throws) => ExprKind::TApply(
      v.visit_var(name),
      params.into_iter().map(|e| visit_expr(v, e)).collect(),
      args.into_iter().map(|e| visit_expr(v, e)).collect(),
      throws,
    ),
    ExprKind::Tuple(es) => ExprKind::Tuple(es.into_iter().map(|e| visit_expr(v, e)).collect()),
    ExprKind::Concat(ws, es) => ExprKind::Concat(
      ws.into_iter().map(|e| visit_expr(v, e)).collect(),
      es.into_iter().map(|e| visit_expr(v, e)).collect(),
    ),
    ExprKind::Unop(op, e) => ExprKind::Unop(op, visit_boxed(v, e)),
    ExprKind::Binop(op, a, b) => ExprKind::Binop(op, visit_boxed(v, a), visit_boxed(v, b)),
    ExprKind::AsConstraint(e, cs) => ExprKind::AsConstraint(
      visit_boxed(v, e),
      cs.into_iter().map(|c| visit_constraint(v, c)).collect(),
    ),
    ExprKind::AsType(e, ty) => ExprKind::AsType(
      visit_boxed(v, e),
      if v.visit_tys_in_expr() { Box::new(visit_ty(v, *ty)) } else { ty },
    ),
    ExprKind::ArrayInit(es) =>
      ExprKind::ArrayInit(es.into_iter().map(|e| visit_expr(v, e)).collect()),
    ExprKind::Unknown(ty) => ExprKind::Unknown(
      if v.visit_tys_in_expr() { Box::new(visit_ty(v, *ty)) } else { ty },
    ),
    ExprKind::In(e, p) => ExprKind::In(visit_boxed(v, e), Box::new(visit_pattern(v, *p))),
  };
  Spanned { span, k }
}

fn visit_boxed<V: Visitor>(v: &mut V, e: Box<Expr>) -> Box<Expr> {
  Box::new(visit_expr(v, *e))
}

/// Visit one slice selector.
pub fn visit_slice<V: Visitor>(v: &mut V, s: Slice) -> Slice {
  match s {
    Slice::Single(e) => Slice::Single(visit_expr(v, e)),
    Slice::HiLo(hi, lo) => Slice::HiLo(visit_expr(v, hi), visit_expr(v, lo)),
    Slice::LoWd(lo, w) => Slice::LoWd(visit_expr(v, lo), visit_expr(v, w)),
    Slice::HiWd(hi, w) => Slice::HiWd(visit_expr(v, hi), visit_expr(v, w)),
    Slice::Element(i, w) => Slice::Element(visit_expr(v, i), visit_expr(v, w)),
  }
}

fn visit_change<V: Visitor>(v: &mut V, c: Change) -> Change {
  match c {
    Change::Field(f) => Change::Field(f),
    Change::Slices(ss) => Change::Slices(ss.into_iter().map(|s| visit_slice(v, s)).collect()),
  }
}

/// Visit one constraint range.
pub fn visit_constraint<V: Visitor>(v: &mut V, c: Constraint) -> Constraint {
  match c {
    Constraint::Single(e) => Constraint::Single(visit_expr(v, e)),
    Constraint::Range(lo, hi) => Constraint::Range(visit_expr(v, lo), visit_expr(v, hi)),
  }
}

/// Visit one type, honouring the visitor's action.
pub fn visit_ty<V: Visitor>(v: &mut V, ty: Type) -> Type {
  match v.visit_ty(&ty) {
    Action::Change(t2) => t2,
    Action::SkipChildren => ty,
    Action::DoChildren => walk_ty(v, ty),
    Action::ChangeDoChildrenPost(t2) => {
      let t3 = walk_ty(v, t2);
      v.post_ty(t3)
    }
  }
}

/// Visit the children of a type.
pub fn walk_ty<V: Visitor>(v: &mut V, ty: Type) -> Type {
  match ty {
    Type::Integer(cs) => Type::Integer(
      cs.map(|cs| cs.into_iter().map(|c| visit_constraint(v, c)).collect()),
    ),
    Type::Bits(w, fields) => Type::Bits(
      Box::new(visit_expr(v, *w)),
      fields.into_iter().map(|f| RegField {
        slices: f.slices.into_iter().map(|s| visit_slice(v, s)).collect(),
        name: f.name,
      }).collect(),
    ),
    Type::Constructor(name, args) => Type::Constructor(
      v.visit_var(name),
      args.into_iter().map(|e| visit_expr(v, e)).collect(),
    ),
    Type::Forward(name) => Type::Forward(v.visit_var(name)),
    Type::OfExpr(e) => Type::OfExpr(Box::new(visit_expr(v, *e))),
    Type::Array(ix, ety) => Type::Array(
      Box::new(match *ix {
        IxType::Enum(name) => IxType::Enum(v.visit_var(name)),
        IxType::Int(n) => IxType::Int(visit_expr(v, n)),
      }),
      Box::new(visit_ty(v, *ety)),
    ),
    Type::Tuple(tys) => Type::Tuple(tys.into_iter().map(|t| visit_ty(v, t)).collect()),
  }
}

/// Visit one lvalue, honouring the visitor's action.
pub fn visit_lexpr<V: Visitor>(v: &mut V, e: LExpr) -> LExpr {
  match v.visit_lexpr(&e) {
    Action::Change(e2) => e2,
    Action::SkipChildren => e,
    Action::DoChildren => walk_lexpr(v, e),
    Action::ChangeDoChildrenPost(e2) => {
      let e3 = walk_lexpr(v, e2);
      v.post_lexpr(e3)
    }
  }
}

/// Visit the children of an lvalue.
pub fn walk_lexpr<V: Visitor>(v: &mut V, e: LExpr) -> LExpr {
  let Spanned { span, k } = e;
  let k = match k {
    LExprKind::Wildcard => LExprKind::Wildcard,
    LExprKind::Var(x) => LExprKind::Var(v.visit_var(x)),
    LExprKind::Field(e, f) => LExprKind::Field(Box::new(visit_lexpr(v, *e)), f),
    LExprKind::Fields(e, fs) => LExprKind::Fields(Box::new(visit_lexpr(v, *e)), fs),
    LExprKind::Index(a, i) =>
      LExprKind::Index(Box::new(visit_lexpr(v, *a)), Box::new(visit_expr(v, *i))),
    LExprKind::Slices(e, ss, ty) => LExprKind::Slices(
      Box::new(visit_lexpr(v, *e)),
      ss.into_iter().map(|s| visit_slice(v, s)).collect(),
      ty.map(|t| if v.visit_tys_in_expr() { Box::new(visit_ty(v, *t)) } else { t }),
    ),
    LExprKind::Tuple(es) =>
      LExprKind::Tuple(es.into_iter().map(|e| visit_lexpr(v, e)).collect()),
    LExprKind::BitTuple(ws, es) => LExprKind::BitTuple(
      ws.into_iter().map(|e| visit_expr(v, e)).collect(),
      es.into_iter().map(|e| visit_lexpr(v, e)).collect(),
    ),
    LExprKind::ReadWrite(getter, setter, params) => LExprKind::ReadWrite(
      v.visit_var(getter), v.visit_var(setter),
      params.into_iter().map(|e| visit_expr(v, e)).collect(),
    ),
    LExprKind::Write(name, params, args) => LExprKind::Write(
      v.visit_var(name),
      params.into_iter().map(|e| visit_expr(v, e)).collect(),
      args.into_iter().map(|e| visit_expr(v, e)).collect(),
    ),
  };
  Spanned { span, k }
}

/// Visit one pattern, honouring the visitor's action.
pub fn visit_pattern<V: Visitor>(v: &mut V, p: Pattern) -> Pattern {
  match v.visit_pattern(&p) {
    Action::Change(p2) => p2,
    Action::SkipChildren => p,
    Action::DoChildren | Action::ChangeDoChildrenPost(_) => walk_pattern(v, p),
  }
}

fn walk_pattern<V: Visitor>(v: &mut V, p: Pattern) -> Pattern {
  match p {
    p @ (Pattern::Lit(_) | Pattern::Wildcard | Pattern::Mask(_)) => p,
    Pattern::Const(x) => Pattern::Const(v.visit_var(x)),
    Pattern::Tuple(ps) => Pattern::Tuple(ps.into_iter().map(|p| visit_pattern(v, p)).collect()),
    Pattern::Set(ps) => Pattern::Set(ps.into_iter().map(|p| visit_pattern(v, p)).collect()),
    Pattern::Expr(e) => Pattern::Expr(Box::new(visit_expr(v, *e))),
    Pattern::Range(lo, hi) => Pattern::Range(visit_expr(v, lo), visit_expr(v, hi)),
  }
}

/// Visit a statement list, flattening one-to-many statement rewrites.
pub fn visit_stmts<V: Visitor>(v: &mut V, ss: Vec<Stmt>) -> Vec<Stmt> {
  let mut out = Vec::with_capacity(ss.len());
  for s in ss {
    match v.visit_stmt(&s) {
      Action::Change(ss2) => out.extend(ss2),
      Action::SkipChildren => out.push(s),
      Action::DoChildren => out.push(walk_stmt(v, s)),
      Action::ChangeDoChildrenPost(ss2) => {
        let ss3 = ss2.into_iter().map(|s| walk_stmt(v, s)).collect();
        out.extend(v.post_stmts(ss3))
      }
    }
  }
  out
}

fn visit_decl_item<V: Visitor>(v: &mut V, item: DeclItem) -> DeclItem {
  match item {
    DeclItem::Var(x, ty) =>
      DeclItem::Var(v.visit_var(x), ty.map(|t| visit_ty(v, t))),
    DeclItem::Tuple(items) =>
      DeclItem::Tuple(items.into_iter().map(|i| visit_decl_item(v, i)).collect()),
  }
}

/// Visit the children of a statement.
pub fn walk_stmt<V: Visitor>(v: &mut V, s: Stmt) -> Stmt {
  let Spanned { span, k } = s;
  let k = match k {
    StmtKind::VarDeclsNoInit(ty, names) => StmtKind::VarDeclsNoInit(
      visit_ty(v, ty),
      names.into_iter().map(|x| v.visit_var(x)).collect(),
    ),
    StmtKind::VarDecl { constant, item, init } => StmtKind::VarDecl {
      constant,
      item: visit_decl_item(v, item),
      init: visit_expr(v, init),
    },
    StmtKind::Assign(lhs, rhs) => {
      // Evaluation order in the source is right-hand side first.
      let rhs = visit_expr(v, rhs);
      StmtKind::Assign(visit_lexpr(v, lhs), rhs)
    }
    StmtKind::Call(name, args) => StmtKind::Call(
      v.visit_var(name),
      args.into_iter().map(|(n, e)| (n, visit_expr(v, e))).collect(),
    ),
    StmtKind::TCall(name, params, args, throws) => StmtKind::TCall(
      v.visit_var(name),
      params.into_iter().map(|e| visit_expr(v, e)).collect(),
      args.into_iter().map(|e| visit_expr(v, e)).collect(),
      throws,
    ),
    StmtKind::Return(e) => StmtKind::Return(e.map(|e| visit_expr(v, e))),
    StmtKind::Assert(e) => StmtKind::Assert(visit_expr(v, e)),
    StmtKind::Throw(e) => StmtKind::Throw(visit_expr(v, e)),
    StmtKind::Try { body, catchers, otherwise } => StmtKind::Try {
      body: visit_stmts(v, body),
      catchers: catchers.into_iter().map(|c| Catcher {
        name: v.visit_var(c.name),
        ty: c.ty,
        body: visit_stmts(v, c.body),
        span: c.span,
      }).collect(),
      otherwise: otherwise.map(|ss| visit_stmts(v, ss)),
    },
    StmtKind::If(arms, els) => StmtKind::If(
      arms.into_iter().map(|(c, ss)| (visit_expr(v, c), visit_stmts(v, ss))).collect(),
      visit_stmts(v, els),
    ),
    StmtKind::Case(e, alts, default) => StmtKind::Case(
      visit_expr(v, e),
      alts.into_iter().map(|a| Alt {
        pats: a.pats.into_iter().map(|p| visit_pattern(v, p)).collect(),
        guard: a.guard.map(|g| visit_expr(v, g)),
        body: visit_stmts(v, a.body),
        span: a.span,
      }).collect(),
      default.map(|ss| visit_stmts(v, ss)),
    ),
    StmtKind::For { var, from, dir, to, body } => StmtKind::For {
      var: v.visit_var(var),
      from: visit_expr(v, from),
      dir,
      to: visit_expr(v, to),
      body: visit_stmts(v, body),
    },
    StmtKind::While(c, body) => StmtKind::While(visit_expr(v, c), visit_stmts(v, body)),
    StmtKind::Repeat(body, c) => StmtKind::Repeat(visit_stmts(v, body), visit_expr(v, c)),
  };
  Spanned { span, k }
}

/// Visit one declaration.
pub fn visit_decl<V: Visitor>(v: &mut V, d: Decl) -> Decl {
  let Spanned { span, k } = d;
  let k = match k {
    k @ (DeclKind::BuiltinType(_) | DeclKind::Forward(_) | DeclKind::Enum(..) |
         DeclKind::Operator1(..) | DeclKind::Operator2(..)) => k,
    DeclKind::Record(name, params, fields) => DeclKind::Record(
      name, params,
      fields.into_iter().map(|(f, ty)| (f, visit_ty(v, ty))).collect(),
    ),
    DeclKind::Exception(name, fields) => DeclKind::Exception(
      name,
      fields.into_iter().map(|(f, ty)| (f, visit_ty(v, ty))).collect(),
    ),
    DeclKind::TypeAbbrev(name, params, ty) =>
      DeclKind::TypeAbbrev(name, params, visit_ty(v, ty)),
    DeclKind::BuiltinFunc(sig) => DeclKind::BuiltinFunc(visit_sig(v, sig)),
    DeclKind::FunType(sig) => DeclKind::FunType(visit_sig(v, sig)),
    DeclKind::FunDefn(sig, body) =>
      DeclKind::FunDefn(visit_sig(v, sig), visit_stmts(v, body)),
    DeclKind::Const(ty, name, e) =>
      DeclKind::Const(visit_ty(v, ty), name, visit_expr(v, e)),
    DeclKind::Config(ty, name, e) =>
      DeclKind::Config(visit_ty(v, ty), name, visit_expr(v, e)),
    DeclKind::Var(ty, name) => DeclKind::Var(visit_ty(v, ty), name),
  };
  Spanned { span, k }
}

fn visit_sig<V: Visitor>(v: &mut V, sig: FunSig) -> FunSig {
  FunSig {
    name: sig.name,
    kind: sig.kind,
    args: sig.args.into_iter().map(|a| FormalArg {
      name: v.visit_var(a.name),
      ty: visit_ty(v, a.ty),
      default: a.default.map(|e| visit_expr(v, e)),
    }).collect(),
    rty: sig.rty.map(|t| visit_ty(v, t)),
    throws: sig.throws,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Ident;
  use num::BigInt;
  use crate::value::Value;

  /// Renames every variable `x` to `y`, skipping type-level expressions.
  struct Rename {
    from: Ident,
    to: Ident,
    tys: bool,
  }
  impl Visitor for Rename {
    fn visit_tys_in_expr(&self) -> bool { self.tys }
    fn visit_var(&mut self, v: Ident) -> Ident {
      if v == self.from { self.to } else { v }
    }
  }

  #[test]
  fn rename_reaches_nested_expressions() {
    let x = Ident::from_str("x");
    let y = Ident::from_str("y");
    let e = ExprKind::Binop(Binop::Add, Box::new(var(x)), Box::new(lit_int(1))).synth();
    let mut v = Rename { from: x, to: y, tys: true };
    let e2 = visit_expr(&mut v, e);
    assert_eq!(e2.to_string(), "(y + 1)");
  }

  #[test]
  fn type_level_short_circuit() {
    let n = Ident::from_str("N");
    let m = Ident::from_str("M");
    // x as bits(N)
    let e = ExprKind::AsType(
      Box::new(var(Ident::from_str("x"))),
      Box::new(Type::bits(var(n))),
    ).synth();
    let mut v = Rename { from: n, to: m, tys: false };
    let e2 = visit_expr(&mut v, e.clone());
    assert_eq!(e2, e, "type-level occurrence untouched when tys are skipped");
    let mut v = Rename { from: n, to: m, tys: true };
    let e3 = visit_expr(&mut v, e);
    assert_eq!(e3.to_string(), "(x as bits(M))");
  }

  /// Replaces integer literals with 0 and counts post hooks.
  struct ZeroLits {
    posts: usize,
  }
  impl Visitor for ZeroLits {
    fn visit_expr(&mut self, e: &Expr) -> Action<Expr> {
      match e.k {
        ExprKind::Lit(_) => Action::Change(lit_int(0)),
        _ => Action::ChangeDoChildrenPost(e.clone()),
      }
    }
    fn post_expr(&mut self, e: Expr) -> Expr {
      self.posts += 1;
      e
    }
  }

  #[test]
  fn post_hook_runs_after_children() {
    let e = ExprKind::Binop(
      Binop::Add,
      Box::new(lit_int(1)),
      Box::new(ExprKind::Lit(Value::Int(BigInt::from(2))).synth()),
    ).synth();
    let mut v = ZeroLits { posts: 0 };
    let e2 = visit_expr(&mut v, e);
    assert_eq!(e2.to_string(), "(0 + 0)");
    assert_eq!(v.posts, 1, "only the binop node requested a post hook");
  }

  #[test]
  fn stmt_visitors_can_split_statements() {
    struct SplitAsserts;
    impl Visitor for SplitAsserts {
      fn visit_stmt(&mut self, s: &Stmt) -> Action<Vec<Stmt>> {
        if let StmtKind::Assert(e) = &s.k {
          if let ExprKind::Binop(Binop::BoolAnd, a, b) = &e.k {
            return Action::Change(vec![
              StmtKind::Assert((**a).clone()).at(s.span),
              StmtKind::Assert((**b).clone()).at(s.span),
            ])
          }
        }
        Action::DoChildren
      }
    }
    let c = ExprKind::Binop(
      Binop::BoolAnd,
      Box::new(var(Ident::from_str("a"))),
      Box::new(var(Ident::from_str("b"))),
    ).synth();
    let ss = vec![Spanned::new(crate::types::Loc::Unknown, StmtKind::Assert(c))];
    let out = visit_stmts(&mut SplitAsserts, ss);
    assert_eq!(out.len(), 2);
  }
}
