//! The global environment: processed and typechecked previous declarations,
//! in addition to the builtin types and primitive functions every
//! specification can rely on without a source prelude.

use hashbrown::HashMap;
use crate::symbol::{Symbol, init_dense_symbol_map, intern};
use crate::types::ast::{
  Binop, Expr, FuncKind, ThrowsTag, Type, Unop, lit_int, var,
};
use crate::types::{Ident, Loc, NameSupply, Spanned};

macro_rules! make_prims {
  {$($(#[$attr0:meta])* enum $name:ident {
    $($(#[$attr:meta])* $x:ident: $e:expr,)*
  })* } => {
    $(
      $(#[$attr0])*
      #[derive(Debug, PartialEq, Eq, Copy, Clone)]
      pub enum $name { $($(#[$attr])* $x),* }

      impl $name {
        /// Evaluate a function on all elements of the type, with their names.
        pub fn scan(mut f: impl FnMut(Self, &'static str)) {
          $(f($name::$x, $e);)*
        }
        /// Convert a string into this type.
        #[allow(clippy::should_implement_trait)]
        #[must_use] pub fn from_str(s: &str) -> Option<Self> {
          match s {
            $($e => Some(Self::$x),)*
            _ => None
          }
        }

        /// Look up by interned symbol.
        #[must_use] pub fn from_symbol(s: Symbol) -> Option<Self> {
          use std::sync::LazyLock;
          static SYMBOL_MAP: LazyLock<Box<[Option<$name>]>> = LazyLock::new(|| {
            let mut kvs = vec![];
            $name::scan(|p, s| kvs.push((intern(s), p)));
            init_dense_symbol_map(&kvs)
          });
          SYMBOL_MAP.get(s.into_usize()).copied().flatten()
        }

        /// The name of this primitive.
        #[must_use] pub fn as_str(self) -> &'static str {
          match self { $($name::$x => $e),* }
        }
      }
    )*
  }
}

make_prims! {
  /// The builtin types.
  enum PrimType {
    /// Unbounded signed integers, optionally refined by constraint ranges.
    Integer: "integer",
    /// The two-valued truth type.
    Boolean: "boolean",
    /// Bitvectors, `bits(N)`.
    Bits: "bits",
    /// Bounded signed integers; only produced by integer-bounds lowering.
    SIntN: "__sint",
    /// String literals; no runtime manipulation beyond printing.
    StringTy: "string",
    /// Real literals, accepted syntactically only.
    Real: "real",
    /// Masks with don't-care positions, from mask literals.
    MaskTy: "__mask",
    /// Byte-addressed memory, `__RAM(A)` with an address width.
    Ram: "__RAM",
  }

  /// The primitive functions the emitter's runtime provides directly.
  /// Operator syntax resolves to these through the operator tables.
  enum PrimFn {
    /// `x + y` on integers.
    AddInt: "add_int",
    /// `x - y` on integers.
    SubInt: "sub_int",
    /// `x * y` on integers.
    MulInt: "mul_int",
    /// Exact division `DIV`; the divisor must divide the dividend.
    ExactDivInt: "exact_div_int",
    /// Floor division `DIVRM`.
    FdivInt: "fdiv_int",
    /// Floor remainder `MOD`.
    FremInt: "frem_int",
    /// Truncating division `QUOT`.
    ZdivInt: "zdiv_int",
    /// Truncating remainder `REM`.
    ZremInt: "zrem_int",
    /// Unary negation on integers.
    NegInt: "neg_int",
    /// `x ^ y` with a non-negative exponent.
    PowInt: "pow_int",
    /// `x << y`, i.e. `x * 2^y`.
    ShlInt: "shl_int",
    /// `x >> y`, i.e. floor division by `2^y`.
    ShrInt: "shr_int",
    /// Round down to a multiple of `2^y`.
    AlignInt: "align_int",
    /// `x MOD 2^y`.
    ModPow2Int: "mod_pow2_int",
    /// Whether the argument is a power of two.
    IsPow2Int: "is_pow2_int",
    /// `2^x`.
    Pow2Int: "pow2_int",
    /// The smaller of two integers.
    MinInt: "min_int",
    /// The larger of two integers.
    MaxInt: "max_int",
    /// `==` on integers.
    EqInt: "eq_int",
    /// `!=` on integers.
    NeInt: "ne_int",
    /// `<` on integers.
    LtInt: "lt_int",
    /// `<=` on integers.
    LeInt: "le_int",
    /// `>` on integers.
    GtInt: "gt_int",
    /// `>=` on integers.
    GeInt: "ge_int",
    /// `==` on booleans.
    EqBool: "eq_bool",
    /// `!=` on booleans.
    NeBool: "ne_bool",
    /// Boolean negation.
    NotBool: "not_bool",
    /// Conjunction; surface `&&` keeps its evaluation order.
    AndBool: "and_bool",
    /// Disjunction; surface `||` keeps its evaluation order.
    OrBool: "or_bool",
    /// Boolean implication.
    ImpliesBool: "implies_bool",
    /// Boolean equivalence.
    IffBool: "iff_bool",
    /// Modular addition on equal-width bitvectors.
    AddBits: "add_bits",
    /// Modular subtraction on equal-width bitvectors.
    SubBits: "sub_bits",
    /// Bitwise conjunction.
    AndBits: "and_bits",
    /// Bitwise disjunction.
    OrBits: "or_bits",
    /// Bitwise exclusive or.
    EorBits: "eor_bits",
    /// Bitwise complement.
    NotBits: "not_bits",
    /// Logical shift left by an integer amount.
    LslBits: "lsl_bits",
    /// Logical shift right.
    LsrBits: "lsr_bits",
    /// Arithmetic shift right.
    AsrBits: "asr_bits",
    /// Concatenation; the result width is the sum of the operand widths.
    AppendBits: "append_bits",
    /// `n` copies of the operand, concatenated.
    ReplicateBits: "replicate_bits",
    /// The all-zero vector of a given width.
    ZerosBits: "zeros_bits",
    /// The all-one vector of a given width.
    OnesBits: "ones_bits",
    /// `==` on equal-width bitvectors.
    EqBits: "eq_bits",
    /// `!=` on equal-width bitvectors.
    NeBits: "ne_bits",
    /// Mask membership, `x IN '1x0'`.
    InMask: "in_mask",
    /// Negated mask membership.
    NotinMask: "notin_mask",
    /// The unsigned integer value of a bitvector.
    CvtBitsUInt: "cvt_bits_uint",
    /// The two's-complement signed value of a bitvector.
    CvtBitsSInt: "cvt_bits_sint",
    /// The low `n` bits of an integer.
    CvtIntBits: "cvt_int_bits",
    /// `w` bits of `x` starting at bit `lo`.
    GetSlice: "get_slice",
    /// `x` with `w` bits starting at `lo` replaced by `r`.
    SetSlice: "set_slice",
    /// `==` on string literals.
    EqStr: "eq_str",
    /// `!=` on string literals.
    NeStr: "ne_str",
    /// Fill memory with a repeated byte.
    RamInit: "__RAM_init",
    /// Read `N` bytes from memory.
    RamRead: "__RAM_read",
    /// Write `N` bytes to memory.
    RamWrite: "__RAM_write",
    /// Print a string literal.
    PrintStr: "print_str",
    /// Print a character.
    PrintChar: "print_char",
    /// Print an integer in decimal.
    PrintIntDec: "print_int_dec",
    /// Print an integer in hex.
    PrintIntHex: "print_int_hex",
    /// Print a bitvector in hex with its width tag.
    PrintBitsHex: "print_bits_hex",
    /// Print a newline.
    Println: "println",
    /// Reached when a `case` without a default matches nothing.
    ErrorUnmatchedCase: "asl_error_unmatched_case",
    /// Reached when an inserted runtime check fails.
    AssertionFailure: "asl_assertion_failure",
  }
}

/// The checking status of a named type.
#[derive(Clone, Debug)]
pub enum TypeTc {
  /// Declared builtin; its structure is known to the emitter.
  Builtin,
  /// Forward declared and not yet defined.
  ForwardDeclared,
  /// A record with parameters and fields.
  Record {
    /// The type parameters.
    params: Vec<Ident>,
    /// The fields, in declaration order.
    fields: Vec<(Ident, Type)>,
  },
  /// An exception record; usable with `throw` and `catch`.
  Exception(Vec<(Ident, Type)>),
  /// A parameterised abbreviation for another type.
  Abbrev {
    /// The type parameters.
    params: Vec<Ident>,
    /// The expansion.
    ty: Type,
  },
  /// An enumeration with its members in declaration order.
  Enum(Vec<Ident>),
}

/// The type of a function, getter, or setter, as stored in the environment.
#[derive(Clone, Debug)]
pub struct FunType {
  /// The tagged name distinguishing this overload.
  pub name: Ident,
  /// Function, getter, or setter.
  pub kind: FuncKind,
  /// Type-level parameters, synthesized at every call site from the actual
  /// argument types.
  pub params: Vec<Ident>,
  /// Formal names and types, in order.
  pub args: Vec<(Ident, Type)>,
  /// Per-formal default expressions.
  pub defaults: Vec<Option<Expr>>,
  /// The return type; `None` for procedures.
  pub rty: Option<Type>,
  /// The declared exception discipline.
  pub throws: ThrowsTag,
  /// Where it was declared.
  pub loc: Loc,
}

/// What is known about a variable in scope.
#[derive(Clone, Debug)]
pub struct VarInfo {
  /// The variable's name.
  pub name: Ident,
  /// Where it was declared.
  pub loc: Loc,
  /// Its declared or inferred type.
  pub ty: Type,
  /// Whether it is function-local.
  pub is_local: bool,
  /// Whether it is immutable; immutable variables participate in scope
  /// constraints for entailment checking.
  pub is_constant: bool,
}

/// A name's meaning at expression level.
#[derive(Clone, Debug)]
pub enum Entity {
  /// A global or local variable.
  Var(VarInfo),
  /// A global constant with a known value expression.
  Const(VarInfo, Expr),
  /// A member of an enumeration, with the enumeration name and the
  /// member's index.
  EnumMember(Ident, usize),
}

impl Entity {
  /// The variable information, for the variable-like entities.
  #[must_use] pub fn var_info(&self) -> Option<&VarInfo> {
    match self {
      Entity::Var(vi) | Entity::Const(vi, _) => Some(vi),
      Entity::EnumMember(..) => None,
    }
  }
}

/// The session-global environment, extended by each typechecked declaration
/// and never mutated afterwards.
#[derive(Debug, Default)]
pub struct GlobalEnv {
  /// Named types.
  pub types: HashMap<Symbol, Spanned<TypeTc>>,
  /// Functions and getters, keyed by root name (getter names carry their
  /// namespace suffix), each with its overload candidates.
  pub funs: HashMap<Symbol, Vec<FunType>>,
  /// Setters, a separate namespace keyed by suffixed root name.
  pub setters: HashMap<Symbol, Vec<FunType>>,
  /// Unary operator candidates.
  pub operators1: HashMap<Unop, Vec<Ident>>,
  /// Binary operator candidates.
  pub operators2: HashMap<Binop, Vec<Ident>>,
  /// Global variables, constants, and enumeration members.
  pub globals: HashMap<Symbol, Entity>,
  /// Constant initialiser expressions, for folding and entailment.
  pub consts: HashMap<Symbol, Expr>,
  /// The session tag supply; every resolved overload and every cloned
  /// declaration takes a fresh tag from here.
  pub tags: NameSupply,
}

impl GlobalEnv {
  /// An environment seeded with the builtin types, primitive functions,
  /// and operator tables.
  #[must_use] pub fn with_prelude() -> Self {
    let mut env = GlobalEnv::default();
    PrimType::scan(|_, s| {
      env.types.insert(intern(s), Spanned::new(Loc::Unknown, TypeTc::Builtin));
    });
    prelude_funs(&mut env);
    prelude_operators(&mut env);
    env
  }

  /// Register a function overload, tagging its name. Returns the tagged
  /// name now stored in the environment.
  pub fn add_fun(&mut self, mut ft: FunType) -> Ident {
    if ft.name.tag == 0 { ft.name = self.tags.fresh_tag(ft.name.name) }
    let name = ft.name;
    let map = if ft.kind == FuncKind::Setter { &mut self.setters } else { &mut self.funs };
    map.entry(name.name).or_default().push(ft);
    name
  }

  /// The overload candidates for a root name (functions and getters).
  #[must_use] pub fn funs_of(&self, name: Symbol) -> &[FunType] {
    self.funs.get(&name).map_or(&[], Vec::as_slice)
  }

  /// The setter candidates for a suffixed root name.
  #[must_use] pub fn setters_of(&self, name: Symbol) -> &[FunType] {
    self.setters.get(&name).map_or(&[], Vec::as_slice)
  }

  /// Find a specific overload by its tagged name, in either namespace.
  #[must_use] pub fn fun_by_ident(&self, name: Ident) -> Option<&FunType> {
    self.funs_of(name.name).iter()
      .chain(self.setters_of(name.name))
      .find(|ft| ft.name == name)
  }

  /// The candidates registered for a unary operator.
  #[must_use] pub fn op1_candidates(&self, op: Unop) -> &[Ident] {
    self.operators1.get(&op).map_or(&[], Vec::as_slice)
  }

  /// The candidates registered for a binary operator.
  #[must_use] pub fn op2_candidates(&self, op: Binop) -> &[Ident] {
    self.operators2.get(&op).map_or(&[], Vec::as_slice)
  }

  /// Append unary operator candidates.
  pub fn add_op1(&mut self, op: Unop, fs: impl IntoIterator<Item = Ident>) {
    self.operators1.entry(op).or_default().extend(fs)
  }

  /// Append binary operator candidates.
  pub fn add_op2(&mut self, op: Binop, fs: impl IntoIterator<Item = Ident>) {
    self.operators2.entry(op).or_default().extend(fs)
  }
}

fn ident(s: &str) -> Ident { Ident::from_str(s) }

/// Register one width-polymorphic builtin function.
fn builtin(
  env: &mut GlobalEnv, name: &str, params: &[&str],
  args: &[(&str, Type)], rty: Option<Type>,
) {
  let ft = FunType {
    name: ident(name),
    kind: FuncKind::Function,
    params: params.iter().map(|p| ident(p)).collect(),
    args: args.iter().map(|(n, t)| (ident(n), t.clone())).collect(),
    defaults: vec![None; args.len()],
    rty,
    throws: ThrowsTag::NoThrow,
    loc: Loc::Unknown,
  };
  env.add_fun(ft);
}

fn int() -> Type { Type::integer() }
fn boolean() -> Type { Type::named(ident("boolean")) }
fn string() -> Type { Type::named(ident("string")) }
fn bits_of(name: &str) -> Type { Type::bits(var(ident(name))) }

fn add_expr(a: Expr, b: Expr) -> Expr {
  crate::types::ast::ExprKind::Binop(Binop::Add, Box::new(a), Box::new(b)).synth()
}

fn mul_expr(a: Expr, b: Expr) -> Expr {
  crate::types::ast::ExprKind::Binop(Binop::Mul, Box::new(a), Box::new(b)).synth()
}

fn prelude_funs(env: &mut GlobalEnv) {
  let b = boolean();

  // integer arithmetic
  for name in ["add_int", "sub_int", "mul_int", "exact_div_int", "fdiv_int",
               "frem_int", "zdiv_int", "zrem_int", "shl_int", "shr_int",
               "align_int", "mod_pow2_int", "pow_int", "min_int", "max_int"] {
    builtin(env, name, &[], &[("x", int()), ("y", int())], Some(int()));
  }
  builtin(env, "neg_int", &[], &[("x", int())], Some(int()));
  builtin(env, "pow2_int", &[], &[("x", int())], Some(int()));
  builtin(env, "is_pow2_int", &[], &[("x", int())], Some(b.clone()));
  for name in ["eq_int", "ne_int", "lt_int", "le_int", "gt_int", "ge_int"] {
    builtin(env, name, &[], &[("x", int()), ("y", int())], Some(b.clone()));
  }

  // booleans
  builtin(env, "not_bool", &[], &[("x", b.clone())], Some(b.clone()));
  for name in ["eq_bool", "ne_bool", "and_bool", "or_bool", "implies_bool", "iff_bool"] {
    builtin(env, name, &[], &[("x", b.clone()), ("y", b.clone())], Some(b.clone()));
  }

  // width-homogeneous bitvector operations
  for name in ["add_bits", "sub_bits", "and_bits", "or_bits", "eor_bits"] {
    builtin(env, name, &["N"],
      &[("x", bits_of("N")), ("y", bits_of("N"))], Some(bits_of("N")));
  }
  builtin(env, "not_bits", &["N"], &[("x", bits_of("N"))], Some(bits_of("N")));
  for name in ["lsl_bits", "lsr_bits", "asr_bits"] {
    builtin(env, name, &["N"],
      &[("x", bits_of("N")), ("d", int())], Some(bits_of("N")));
  }
  for name in ["eq_bits", "ne_bits"] {
    builtin(env, name, &["N"],
      &[("x", bits_of("N")), ("y", bits_of("N"))], Some(b.clone()));
  }
  builtin(env, "append_bits", &["N", "M"],
    &[("x", bits_of("N")), ("y", bits_of("M"))],
    Some(Type::bits(add_expr(var(ident("N")), var(ident("M"))))));
  builtin(env, "replicate_bits", &["N"],
    &[("x", bits_of("N")), ("n", int())],
    Some(Type::bits(mul_expr(var(ident("N")), var(ident("n"))))));
  builtin(env, "in_mask", &["N"],
    &[("x", bits_of("N")), ("m", Type::named(ident("__mask")))], Some(b.clone()));
  builtin(env, "notin_mask", &["N"],
    &[("x", bits_of("N")), ("m", Type::named(ident("__mask")))], Some(b.clone()));
  builtin(env, "zeros_bits", &[], &[("n", int())], Some(Type::bits(var(ident("n")))));
  builtin(env, "ones_bits", &[], &[("n", int())], Some(Type::bits(var(ident("n")))));
  builtin(env, "cvt_bits_uint", &["N"], &[("x", bits_of("N"))], Some(int()));
  builtin(env, "cvt_bits_sint", &["N"], &[("x", bits_of("N"))], Some(int()));
  builtin(env, "cvt_int_bits", &[],
    &[("x", int()), ("n", int())], Some(Type::bits(var(ident("n")))));
  builtin(env, "get_slice", &["N", "w"],
    &[("x", bits_of("N")), ("lo", int()), ("w", int())],
    Some(Type::bits(var(ident("w")))));
  builtin(env, "set_slice", &["N", "W"],
    &[("x", bits_of("N")), ("lo", int()), ("w", int()), ("r", bits_of("W"))],
    Some(bits_of("N")));

  // surface-named wrappers from the implicit prelude
  builtin(env, "Zeros", &[], &[("n", int())], Some(Type::bits(var(ident("n")))));
  builtin(env, "Ones", &[], &[("n", int())], Some(Type::bits(var(ident("n")))));
  builtin(env, "IsZero", &["N"], &[("x", bits_of("N"))], Some(b.clone()));
  builtin(env, "IsOnes", &["N"], &[("x", bits_of("N"))], Some(b.clone()));
  builtin(env, "ZeroExtend", &["M"],
    &[("x", bits_of("M")), ("n", int())], Some(Type::bits(var(ident("n")))));
  builtin(env, "SignExtend", &["M"],
    &[("x", bits_of("M")), ("n", int())], Some(Type::bits(var(ident("n")))));
  builtin(env, "Replicate", &["M"],
    &[("x", bits_of("M")), ("n", int())],
    Some(Type::bits(mul_expr(var(ident("M")), var(ident("n"))))));
  builtin(env, "UInt", &["N"], &[("x", bits_of("N"))], Some(int()));
  builtin(env, "SInt", &["N"], &[("x", bits_of("N"))], Some(int()));
  builtin(env, "Min", &[], &[("a", int()), ("b", int())], Some(int()));
  builtin(env, "Max", &[], &[("a", int()), ("b", int())], Some(int()));
  builtin(env, "Abs", &[], &[("x", int())], Some(int()));

  // strings: literals and printing only
  builtin(env, "eq_str", &[], &[("x", string()), ("y", string())], Some(b.clone()));
  builtin(env, "ne_str", &[], &[("x", string()), ("y", string())], Some(b));
  builtin(env, "print_str", &[], &[("s", string())], None);
  builtin(env, "print_char", &[], &[("c", int())], None);
  builtin(env, "print_int_dec", &[], &[("x", int())], None);
  builtin(env, "print_int_hex", &[], &[("x", int())], None);
  builtin(env, "print_bits_hex", &["N"], &[("x", bits_of("N"))], None);
  builtin(env, "println", &[], &[], None);

  // memory
  let ram = |a: &str| Type::Constructor(ident("__RAM"), vec![var(ident(a))]);
  builtin(env, "__RAM_init", &["A"],
    &[("mem", ram("A")), ("v", Type::bits(lit_int(8)))], None);
  builtin(env, "__RAM_read", &["A"],
    &[("mem", ram("A")), ("address", bits_of("A")), ("n", int())],
    Some(Type::bits(mul_expr(lit_int(8), var(ident("n"))))));
  builtin(env, "__RAM_write", &["A", "N"],
    &[("mem", ram("A")), ("address", bits_of("A")), ("n", int()),
      ("v", Type::bits(mul_expr(lit_int(8), var(ident("n")))))],
    None);

  // failure sinks used by lowering
  let mut fail = |name: &str| {
    let ft = FunType {
      name: ident(name),
      kind: FuncKind::Function,
      params: vec![],
      args: vec![(ident("s"), string())],
      defaults: vec![None],
      rty: None,
      throws: ThrowsTag::AlwaysThrow,
      loc: Loc::Unknown,
    };
    env.add_fun(ft);
  };
  fail("asl_error_unmatched_case");
  fail("asl_assertion_failure");
}

fn prelude_operators(env: &mut GlobalEnv) {
  let ids = |names: &[&str]| names.iter().map(|n| ident(n)).collect::<Vec<_>>();
  env.add_op1(Unop::Negate, ids(&["neg_int"]));
  env.add_op1(Unop::BoolNot, ids(&["not_bool"]));
  env.add_op1(Unop::BitsNot, ids(&["not_bits"]));

  env.add_op2(Binop::Add, ids(&["add_int", "add_bits"]));
  env.add_op2(Binop::Sub, ids(&["sub_int", "sub_bits"]));
  env.add_op2(Binop::Mul, ids(&["mul_int"]));
  env.add_op2(Binop::Div, ids(&["exact_div_int"]));
  env.add_op2(Binop::Divrm, ids(&["fdiv_int"]));
  env.add_op2(Binop::Mod, ids(&["frem_int"]));
  env.add_op2(Binop::Quot, ids(&["zdiv_int"]));
  env.add_op2(Binop::Rem, ids(&["zrem_int"]));
  env.add_op2(Binop::Pow, ids(&["pow_int"]));
  env.add_op2(Binop::Eq, ids(&["eq_int", "eq_bits", "eq_bool", "eq_str"]));
  env.add_op2(Binop::Ne, ids(&["ne_int", "ne_bits", "ne_bool", "ne_str"]));
  env.add_op2(Binop::Lt, ids(&["lt_int"]));
  env.add_op2(Binop::Le, ids(&["le_int"]));
  env.add_op2(Binop::Gt, ids(&["gt_int"]));
  env.add_op2(Binop::Ge, ids(&["ge_int"]));
  env.add_op2(Binop::BoolAnd, ids(&["and_bool"]));
  env.add_op2(Binop::BoolOr, ids(&["or_bool"]));
  env.add_op2(Binop::Implies, ids(&["implies_bool"]));
  env.add_op2(Binop::Iff, ids(&["iff_bool"]));
  env.add_op2(Binop::BitAnd, ids(&["and_bits"]));
  env.add_op2(Binop::BitOr, ids(&["or_bits"]));
  env.add_op2(Binop::Eor, ids(&["eor_bits"]));
  env.add_op2(Binop::ShiftL, ids(&["shl_int", "lsl_bits"]));
  env.add_op2(Binop::ShiftR, ids(&["shr_int", "lsr_bits"]));
  env.add_op2(Binop::Append, ids(&["append_bits"]));
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prelude_has_the_primitive_table() {
    let env = GlobalEnv::with_prelude();
    assert!(env.types.contains_key(&intern("integer")));
    assert!(env.types.contains_key(&intern("__RAM")));
    assert!(!env.funs_of(intern("and_bits")).is_empty());
    assert!(!env.op2_candidates(Binop::Eq).is_empty());
    assert_eq!(PrimFn::from_symbol(intern("add_int")), Some(PrimFn::AddInt));
    assert_eq!(PrimType::from_str("bits"), Some(PrimType::Bits));
  }

  #[test]
  fn overloads_get_distinct_tags() {
    let mut env = GlobalEnv::default();
    let mk = || FunType {
      name: Ident::from_str("F"),
      kind: FuncKind::Function,
      params: vec![],
      args: vec![],
      defaults: vec![],
      rty: None,
      throws: ThrowsTag::NoThrow,
      loc: Loc::Unknown,
    };
    let a = env.add_fun(mk());
    let b = env.add_fun(mk());
    assert_ne!(a, b);
    assert!(a.eq_root(b));
    assert_eq!(env.funs_of(intern("F")).len(), 2);
    assert!(env.fun_by_ident(a).is_some());
  }

  #[test]
  fn setters_are_a_separate_namespace() {
    let mut env = GlobalEnv::default();
    let mut mk = |kind: FuncKind| FunType {
      name: Ident::from_str("PC").suffixed(kind.suffix()),
      kind,
      params: vec![],
      args: vec![],
      defaults: vec![],
      rty: None,
      throws: ThrowsTag::NoThrow,
      loc: Loc::Unknown,
    };
    let g = env.add_fun(mk(FuncKind::Getter));
    let s = env.add_fun(mk(FuncKind::Setter));
    assert!(env.funs_of(g.name).iter().any(|ft| ft.name == g));
    assert!(env.setters_of(s.name).iter().any(|ft| ft.name == s));
    assert!(env.funs_of(s.name).is_empty());
  }
}
