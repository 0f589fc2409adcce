//! The abstract syntax tree: types, expressions, lvalues, patterns,
//! statements, and declarations.
//!
//! The parser produces trees containing unresolved calls ([`ExprKind::Call`],
//! [`ExprKind::Unop`], [`ExprKind::Binop`]); the typechecker rewrites these
//! into resolved applications ([`ExprKind::TApply`]) carrying the callee's
//! disambiguation tag, the synthesized type-level parameters, and the
//! throws tag. Transform passes then rewrite the typed tree in place.

use std::fmt;
use crate::types::{Ident, Loc, Spanned};
use crate::value::{Mask, Value};

/// An expression with its source location.
pub type Expr = Spanned<ExprKind>;
/// An lvalue with its source location.
pub type LExpr = Spanned<LExprKind>;
/// A statement with its source location.
pub type Stmt = Spanned<StmtKind>;
/// A declaration with its source location.
pub type Decl = Spanned<DeclKind>;

/// A constraint range refining an `integer` type: a single admitted value
/// or a closed interval.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
  /// Exactly this value.
  Single(Expr),
  /// Any value in `[lo, hi]`.
  Range(Expr, Expr),
}

/// A named slice set attached to a `bits(N)` type, enabling field access
/// syntax on registers. A field may cover several discontiguous slices,
/// concatenated high to low.
#[derive(Clone, Debug, PartialEq)]
pub struct RegField {
  /// The slices making up the field, highest first.
  pub slices: Vec<Slice>,
  /// The field name.
  pub name: Ident,
}

/// The index domain of an array type.
#[derive(Clone, Debug, PartialEq)]
pub enum IxType {
  /// Indexed by the members of an enumeration.
  Enum(Ident),
  /// Indexed by `0 .. size-1`.
  Int(Expr),
}

/// A type.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
  /// `integer`, optionally refined by a union of constraint ranges.
  Integer(Option<Vec<Constraint>>),
  /// `bits(N)`, with optional register fields.
  Bits(Box<Expr>, Vec<RegField>),
  /// A named type constructor applied to type-level expression arguments.
  /// A plain named type is a constructor with no arguments.
  Constructor(Ident, Vec<Expr>),
  /// A type declared but not yet defined at this point in the program.
  Forward(Ident),
  /// The type of an expression, `typeof(e)`.
  OfExpr(Box<Expr>),
  /// An array with an index domain and element type.
  Array(Box<IxType>, Box<Type>),
  /// A tuple of types.
  Tuple(Vec<Type>),
}

impl Type {
  /// The unconstrained `integer` type.
  #[must_use] pub fn integer() -> Self { Type::Integer(None) }
  /// `bits(w)` with no register fields.
  #[must_use] pub fn bits(width: Expr) -> Self { Type::Bits(Box::new(width), vec![]) }
  /// A named type with no arguments.
  #[must_use] pub fn named(name: Ident) -> Self { Type::Constructor(name, vec![]) }
}

/// One bitslice selector.
#[derive(Clone, Debug, PartialEq)]
pub enum Slice {
  /// `[i]`: the single bit at index `i`.
  Single(Expr),
  /// `[hi : lo]`: bits `hi` down to `lo` inclusive.
  HiLo(Expr, Expr),
  /// `[lo +: w]`: `w` bits starting at `lo`. The canonical form after
  /// slice normalization.
  LoWd(Expr, Expr),
  /// `[hi -: w]`: `w` bits ending at `hi`.
  HiWd(Expr, Expr),
  /// `[i *: w]`: element `i` of a vector of `w`-bit elements.
  Element(Expr, Expr),
}

/// A single update inside a `with` expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
  /// Replace a record or register field.
  Field(Ident),
  /// Replace the selected slices.
  Slices(Vec<Slice>),
}

/// Unary operators, before resolution against the operator table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Unop {
  /// Arithmetic negation `-`.
  Negate,
  /// Boolean `!`.
  BoolNot,
  /// Bitwise `NOT`.
  BitsNot,
}

/// Binary operators, before resolution against the operator table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Binop {
  /// `==`
  Eq,
  /// `!=`
  Ne,
  /// `>`
  Gt,
  /// `>=`
  Ge,
  /// `<`
  Lt,
  /// `<=`
  Le,
  /// `+`
  Add,
  /// `-`
  Sub,
  /// `*`
  Mul,
  /// Exact division `DIV`.
  Div,
  /// Floor division `DIVRM`.
  Divrm,
  /// Floor remainder `MOD`.
  Mod,
  /// Truncating division `QUOT`.
  Quot,
  /// Truncating remainder `REM`.
  Rem,
  /// Exponentiation `^`.
  Pow,
  /// Short-circuit boolean `&&`.
  BoolAnd,
  /// Short-circuit boolean `||`.
  BoolOr,
  /// Boolean implication `-->`.
  Implies,
  /// Boolean equivalence `<->`.
  Iff,
  /// Bitwise `AND`.
  BitAnd,
  /// Bitwise `OR`.
  BitOr,
  /// Bitwise `XOR`.
  Eor,
  /// Left shift `<<`.
  ShiftL,
  /// Right shift `>>`.
  ShiftR,
  /// Concatenation `++`.
  Append,
}

/// The exception discipline of a function or call: carried as a marker on
/// definitions (`F`, `F?`, `F!`) and mirrored onto every resolved call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ThrowsTag {
  /// The call never raises an exception.
  #[default]
  NoThrow,
  /// The call may raise.
  MayThrow,
  /// The call always raises; control does not return.
  AlwaysThrow,
}

/// An argument at an unresolved call site: optionally named.
pub type CallArg = (Option<Ident>, Expr);

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
  /// A literal value.
  Lit(Value),
  /// A variable (or enumeration member, or getter) reference.
  Var(Ident),
  /// Field access `e.f` on a record or register.
  Field(Box<Expr>, Ident),
  /// Multi-field selection `e.[f1, f2, …]`: the concatenation of the fields.
  Fields(Box<Expr>, Vec<Ident>),
  /// Array subscript `a[i]`.
  Index(Box<Expr>, Box<Expr>),
  /// Bitslice `e[slices]`. After typechecking the type of `e` is attached
  /// so later passes know the underlying width.
  Slices(Box<Expr>, Vec<Slice>, Option<Box<Type>>),
  /// Record construction `R(tyargs){f1 = v1, …}`.
  Record(Ident, Vec<Expr>, Vec<(Ident, Expr)>),
  /// Functional update `e with { changes }`.
  WithChanges(Box<Expr>, Vec<(Change, Expr)>),
  /// Conditional chain `if c1 then e1 elsif … else e`.
  If(Vec<(Expr, Expr)>, Box<Expr>),
  /// `__let v : t = e1 __in e2`, produced by runtime-check insertion.
  Let(Ident, Box<Type>, Box<Expr>, Box<Expr>),
  /// `__assert c __in e`, produced by runtime-check insertion.
  Assert(Box<Expr>, Box<Expr>),
  /// An unresolved call with positional and named arguments.
  Call(Ident, Vec<CallArg>),
  /// A resolved call: callee with tag, synthesized type-level parameters,
  /// argument expressions, and the callee's throws tag.
  TApply(Ident, Vec<Expr>, Vec<Expr>, ThrowsTag),
  /// A tuple.
  Tuple(Vec<Expr>),
  /// Bitvector concatenation, with per-element widths filled in by the
  /// typechecker.
  Concat(Vec<Expr>, Vec<Expr>),
  /// An unresolved unary application.
  Unop(Unop, Box<Expr>),
  /// An unresolved binary application.
  Binop(Binop, Box<Expr>, Box<Expr>),
  /// `e as {constraints}`: assert-and-refine to a constrained integer.
  AsConstraint(Box<Expr>, Vec<Constraint>),
  /// `e as T`: assert-and-refine to a type.
  AsType(Box<Expr>, Box<Type>),
  /// Array initialisation from element values.
  ArrayInit(Vec<Expr>),
  /// `UNKNOWN : T`: an arbitrary value of the type.
  Unknown(Box<Type>),
  /// `e IN pattern`.
  In(Box<Expr>, Box<Pattern>),
}

impl ExprKind {
  /// Wrap in a span.
  #[must_use] pub fn at(self, span: Loc) -> Expr { Spanned::new(span, self) }
  /// Wrap with no location, for generated code.
  #[must_use] pub fn synth(self) -> Expr { Spanned::new(Loc::Unknown, self) }
}

/// Integer literal helper used pervasively by the transforms.
#[must_use] pub fn lit_int(n: impl Into<num::BigInt>) -> Expr {
  ExprKind::Lit(Value::Int(n.into())).synth()
}

/// Variable reference helper.
#[must_use] pub fn var(id: Ident) -> Expr { ExprKind::Var(id).synth() }

/// An lvalue.
#[derive(Clone, Debug, PartialEq)]
pub enum LExprKind {
  /// Discard the assigned value, `-`.
  Wildcard,
  /// A variable.
  Var(Ident),
  /// Field update `e.f`.
  Field(Box<LExpr>, Ident),
  /// Multi-field update `e.[f1, …]`, splitting the value across fields.
  Fields(Box<LExpr>, Vec<Ident>),
  /// Array element update `a[i]`.
  Index(Box<LExpr>, Box<Expr>),
  /// Slice update `e[slices]`, with the underlying type after typechecking.
  Slices(Box<LExpr>, Vec<Slice>, Option<Box<Type>>),
  /// Tuple of lvalues `(l1, …) = e`.
  Tuple(Vec<LExpr>),
  /// Multi-part bitvector lvalue `[hi, …, lo] = e`, with per-part widths
  /// filled in by the typechecker.
  BitTuple(Vec<Expr>, Vec<LExpr>),
  /// A variable which is read via a getter and written via a setter; both
  /// resolved names are recorded.
  ReadWrite(Ident, Ident, Vec<Expr>),
  /// A setter call performed by assignment, with its resolved arguments.
  Write(Ident, Vec<Expr>, Vec<Expr>),
}

impl LExprKind {
  /// Wrap in a span.
  #[must_use] pub fn at(self, span: Loc) -> LExpr { Spanned::new(span, self) }
}

/// A pattern, as used by `case` alternatives and `IN` expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
  /// A literal value.
  Lit(Value),
  /// A named constant or enumeration member.
  Const(Ident),
  /// `-`: matches anything.
  Wildcard,
  /// A tuple of patterns.
  Tuple(Vec<Pattern>),
  /// `{p1, p2, …}`: matches if any element matches.
  Set(Vec<Pattern>),
  /// A single evaluated expression compared for equality.
  Expr(Box<Expr>),
  /// `lo .. hi`: an inclusive integer range.
  Range(Expr, Expr),
  /// A bitmask.
  Mask(Mask),
}

/// The shape of a local variable declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum DeclItem {
  /// A single variable, with an optional explicit type.
  Var(Ident, Option<Type>),
  /// A tuple of declared names, `(x, y) = e`.
  Tuple(Vec<DeclItem>),
}

/// One alternative of a `case` statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Alt {
  /// Patterns tried in order; the alternative fires if any matches.
  pub pats: Vec<Pattern>,
  /// Optional `where` guard.
  pub guard: Option<Expr>,
  /// The body.
  pub body: Vec<Stmt>,
  /// Source location of the alternative.
  pub span: Loc,
}

/// One `catch` arm of a `try` statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Catcher {
  /// The variable the exception payload is bound to.
  pub name: Ident,
  /// The exception record type this arm handles.
  pub ty: Ident,
  /// The handler body.
  pub body: Vec<Stmt>,
  /// Source location of the arm.
  pub span: Loc,
}

/// Loop direction for `for` statements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
  /// `for v = lo to hi`
  Up,
  /// `for v = hi downto lo`
  Down,
}

/// A statement.
#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
  /// Uninitialised variable declarations `var x, y : T;`.
  VarDeclsNoInit(Type, Vec<Ident>),
  /// An initialised declaration, `let`/`var`/`constant`, possibly of tuple
  /// shape.
  VarDecl {
    /// Whether the binding is immutable (`let`/`constant`).
    constant: bool,
    /// The declared name(s).
    item: DeclItem,
    /// The initialiser.
    init: Expr,
  },
  /// An assignment.
  Assign(LExpr, Expr),
  /// An unresolved procedure call.
  Call(Ident, Vec<CallArg>),
  /// A resolved procedure call: tag, parameters, arguments, throws tag.
  TCall(Ident, Vec<Expr>, Vec<Expr>, ThrowsTag),
  /// `return e;` or `return;`.
  Return(Option<Expr>),
  /// A (possibly inserted) runtime assertion.
  Assert(Expr),
  /// `throw e;` where `e` constructs an exception record.
  Throw(Expr),
  /// `try … catch` with typed arms and an optional `otherwise`.
  Try {
    /// The protected body.
    body: Vec<Stmt>,
    /// The catch arms, tried in order.
    catchers: Vec<Catcher>,
    /// The `otherwise` arm.
    otherwise: Option<Vec<Stmt>>,
  },
  /// Structured `if/elsif/else`.
  If(Vec<(Expr, Vec<Stmt>)>, Vec<Stmt>),
  /// `case e of` with typed alternatives and optional `otherwise`.
  Case(Expr, Vec<Alt>, Option<Vec<Stmt>>),
  /// A counted loop with a declared loop variable.
  For {
    /// The loop variable, scoped to the body.
    var: Ident,
    /// The starting bound.
    from: Expr,
    /// Whether the loop counts up or down.
    dir: Direction,
    /// The final bound, inclusive.
    to: Expr,
    /// The body.
    body: Vec<Stmt>,
  },
  /// `while c do … end`.
  While(Expr, Vec<Stmt>),
  /// `repeat … until c;`.
  Repeat(Vec<Stmt>, Expr),
}

impl StmtKind {
  /// Wrap in a span.
  #[must_use] pub fn at(self, span: Loc) -> Stmt { Spanned::new(span, self) }
  /// Wrap with no location, for generated code.
  #[must_use] pub fn synth(self) -> Stmt { Spanned::new(Loc::Unknown, self) }
}

/// The role of a function-like declaration. Getters and setters live in
/// separate namespaces from plain functions; the role also selects the
/// name suffix used to keep those namespaces apart.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FuncKind {
  /// An ordinary function or procedure.
  #[default]
  Function,
  /// A getter: `v` or `v[args]` on the reading side.
  Getter,
  /// A setter: `v = e` or `v[args] = e` on the writing side. The value
  /// being assigned is the final formal argument.
  Setter,
}

impl FuncKind {
  /// The name suffix that keeps this role's namespace apart.
  #[must_use] pub fn suffix(self) -> &'static str {
    match self {
      FuncKind::Function => "",
      FuncKind::Getter => ".read",
      FuncKind::Setter => ".write",
    }
  }
}

/// A formal argument of a function-like declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct FormalArg {
  /// The argument name.
  pub name: Ident,
  /// The declared type.
  pub ty: Type,
  /// The default value, which may reference earlier formals.
  pub default: Option<Expr>,
}

/// The signature of a function-like declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct FunSig {
  /// The (possibly tagged, possibly suffixed) name.
  pub name: Ident,
  /// Function, getter, or setter.
  pub kind: FuncKind,
  /// The formal arguments in declaration order.
  pub args: Vec<FormalArg>,
  /// The return type; `None` for procedures.
  pub rty: Option<Type>,
  /// The declared exception discipline.
  pub throws: ThrowsTag,
}

/// A declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum DeclKind {
  /// `__builtin type T;`
  BuiltinType(Ident),
  /// A forward type declaration.
  Forward(Ident),
  /// `record R(params) { fields }`.
  Record(Ident, Vec<Ident>, Vec<(Ident, Type)>),
  /// `exception E { fields }`: a record usable with `throw`.
  Exception(Ident, Vec<(Ident, Type)>),
  /// A parameterised type abbreviation.
  TypeAbbrev(Ident, Vec<Ident>, Type),
  /// An enumeration with its members.
  Enum(Ident, Vec<Ident>),
  /// `__builtin func F(...)`: known to the emitter's runtime.
  BuiltinFunc(FunSig),
  /// A function prototype.
  FunType(FunSig),
  /// A function definition.
  FunDefn(FunSig, Vec<Stmt>),
  /// Register unary operator candidates.
  Operator1(Unop, Vec<Ident>),
  /// Register binary operator candidates.
  Operator2(Binop, Vec<Ident>),
  /// A global constant.
  Const(Type, Ident, Expr),
  /// A configurable constant, overridable by the session configuration.
  Config(Type, Ident, Expr),
  /// A global variable.
  Var(Type, Ident),
}

impl DeclKind {
  /// Wrap in a span.
  #[must_use] pub fn at(self, span: Loc) -> Decl { Spanned::new(span, self) }
  /// Wrap with no location, for generated code.
  #[must_use] pub fn synth(self) -> Decl { Spanned::new(Loc::Unknown, self) }

  /// The name introduced by this declaration, where there is a single one.
  #[must_use] pub fn name(&self) -> Option<Ident> {
    match self {
      DeclKind::BuiltinType(name) | DeclKind::Forward(name) |
      DeclKind::Record(name, ..) | DeclKind::Exception(name, _) |
      DeclKind::TypeAbbrev(name, ..) | DeclKind::Enum(name, _) => Some(*name),
      DeclKind::BuiltinFunc(sig) | DeclKind::FunType(sig) | DeclKind::FunDefn(sig, _) =>
        Some(sig.name),
      DeclKind::Const(_, name, _) | DeclKind::Config(_, name, _) |
      DeclKind::Var(_, name) => Some(*name),
      DeclKind::Operator1(..) | DeclKind::Operator2(..) => None,
    }
  }
}

impl fmt::Display for Unop {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Unop::Negate => "-",
      Unop::BoolNot => "!",
      Unop::BitsNot => "NOT",
    })
  }
}

impl fmt::Display for Binop {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Binop::Eq => "==", Binop::Ne => "!=",
      Binop::Gt => ">", Binop::Ge => ">=", Binop::Lt => "<", Binop::Le => "<=",
      Binop::Add => "+", Binop::Sub => "-", Binop::Mul => "*",
      Binop::Div => "DIV", Binop::Divrm => "DIVRM", Binop::Mod => "MOD",
      Binop::Quot => "QUOT", Binop::Rem => "REM", Binop::Pow => "^",
      Binop::BoolAnd => "&&", Binop::BoolOr => "||",
      Binop::Implies => "-->", Binop::Iff => "<->",
      Binop::BitAnd => "AND", Binop::BitOr => "OR", Binop::Eor => "XOR",
      Binop::ShiftL => "<<", Binop::ShiftR => ">>",
      Binop::Append => "++",
    })
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Type::Integer(None) => write!(f, "integer"),
      Type::Integer(Some(cs)) => {
        write!(f, "integer {{")?;
        for (i, c) in cs.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          match c {
            Constraint::Single(e) => write!(f, "{e}")?,
            Constraint::Range(lo, hi) => write!(f, "[{lo}, {hi}]")?,
          }
        }
        write!(f, "}}")
      }
      Type::Bits(w, _) => write!(f, "bits({w})"),
      Type::Constructor(name, args) if args.is_empty() => write!(f, "{name}"),
      Type::Constructor(name, args) => {
        write!(f, "{name}(")?;
        for (i, a) in args.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{a}")?
        }
        write!(f, ")")
      }
      Type::Forward(name) => write!(f, "{name}"),
      Type::OfExpr(e) => write!(f, "typeof({e})"),
      Type::Array(ix, ety) => match &**ix {
        IxType::Enum(name) => write!(f, "array [{name}] of {ety}"),
        IxType::Int(n) => write!(f, "array [{n}] of {ety}"),
      },
      Type::Tuple(tys) => {
        write!(f, "(")?;
        for (i, t) in tys.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{t}")?
        }
        write!(f, ")")
      }
    }
  }
}

impl fmt::Display for Spanned<ExprKind> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.k {
      ExprKind::Lit(v) => write!(f, "{v}"),
      ExprKind::Var(x) => write!(f, "{x}"),
      ExprKind::Field(e, x) => write!(f, "{e}.{x}"),
      ExprKind::Fields(e, xs) => {
        write!(f, "{e}.[")?;
        for (i, x) in xs.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{x}")?
        }
        write!(f, "]")
      }
      ExprKind::Index(a, i) => write!(f, "{a}[{i}]"),
      ExprKind::Slices(e, ss, _) => {
        write!(f, "{e}[")?;
        for (i, s) in ss.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          match s {
            Slice::Single(e) => write!(f, "{e}")?,
            Slice::HiLo(hi, lo) => write!(f, "{hi}:{lo}")?,
            Slice::LoWd(lo, w) => write!(f, "{lo} +: {w}")?,
            Slice::HiWd(hi, w) => write!(f, "{hi} -: {w}")?,
            Slice::Element(i2, w) => write!(f, "{i2} *: {w}")?,
          }
        }
        write!(f, "]")
      }
      ExprKind::Record(name, _, fields) => {
        write!(f, "{name}{{")?;
        for (i, (x, e)) in fields.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{x} = {e}")?
        }
        write!(f, "}}")
      }
      ExprKind::WithChanges(e, _) => write!(f, "({e} with ...)"),
      ExprKind::If(arms, els) => {
        for (i, (c, t)) in arms.iter().enumerate() {
          write!(f, "{} {c} then {t} ", if i == 0 { "if" } else { "elsif" })?
        }
        write!(f, "else {els}")
      }
      ExprKind::Let(x, _, e1, e2) => write!(f, "__let {x} = {e1} __in {e2}"),
      ExprKind::Assert(c, e) => write!(f, "__assert {c} __in {e}"),
      ExprKind::Call(name, args) => {
        write!(f, "{name}(")?;
        for (i, (n, e)) in args.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          match n { Some(n) => write!(f, "{n} = {e}")?, None => write!(f, "{e}")? }
        }
        write!(f, ")")
      }
      ExprKind::TApply(name, params, args, _) => {
        write!(f, "{name}{{")?;
        for (i, p) in params.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{p}")?
        }
        write!(f, "}}(")?;
        for (i, a) in args.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{a}")?
        }
        write!(f, ")")
      }
      ExprKind::Tuple(es) => {
        write!(f, "(")?;
        for (i, e) in es.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{e}")?
        }
        write!(f, ")")
      }
      ExprKind::Concat(_, es) => {
        for (i, e) in es.iter().enumerate() {
          if i > 0 { write!(f, " : ")? }
          write!(f, "{e}")?
        }
        Ok(())
      }
      ExprKind::Unop(op, e) => write!(f, "{op} {e}"),
      ExprKind::Binop(op, a, b) => write!(f, "({a} {op} {b})"),
      ExprKind::AsConstraint(e, _) => write!(f, "({e} as ...)"),
      ExprKind::AsType(e, t) => write!(f, "({e} as {t})"),
      ExprKind::ArrayInit(_) => write!(f, "__array_init"),
      ExprKind::Unknown(t) => write!(f, "UNKNOWN : {t}"),
      ExprKind::In(e, _) => write!(f, "({e} IN ...)"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Ident;

  #[test]
  fn display_round_trips_common_forms() {
    let x = var(Ident::from_str("x"));
    let w = lit_int(4);
    let e = ExprKind::Binop(Binop::Add, Box::new(x.clone()), Box::new(w)).synth();
    assert_eq!(e.to_string(), "(x + 4)");
    let t = Type::bits(lit_int(8));
    assert_eq!(t.to_string(), "bits(8)");
    let c = Type::Integer(Some(vec![
      Constraint::Range(lit_int(0), lit_int(31)),
      Constraint::Single(lit_int(64)),
    ]));
    assert_eq!(c.to_string(), "integer {[0, 31], 64}");
  }

  #[test]
  fn func_kind_suffixes_are_distinct() {
    let base = Ident::from_str("PC");
    let g = base.suffixed(FuncKind::Getter.suffix());
    let s = base.suffixed(FuncKind::Setter.suffix());
    assert_ne!(g, s);
    assert_ne!(g, base);
  }
}
