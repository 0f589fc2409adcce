//! The backend runtime abstraction: one capability set of primitive
//! emitters that every runtime variant provides.
//!
//! The emitter holds a `Box<dyn Runtime>` selected at construction time.
//! Switching variants changes only the [`Runtime::file_header`] prelude and
//! the text each capability produces; the emitter's traversal is identical
//! for all three. Capability methods take already-rendered C operand text
//! and explicit widths (after monomorphization every width is a literal)
//! and return C expression text.

pub mod fallback;
pub mod c23;
pub mod ac;

use num::BigInt;
use serde::Deserialize;
use crate::value::{Bits, SInt};

/// Arithmetic on unbounded or bounded integers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntOp {
  /// `+`
  Add,
  /// `-`
  Sub,
  /// `*`
  Mul,
  /// Exact division; the divisor divides the dividend.
  ExactDiv,
  /// Floor division.
  Fdiv,
  /// Floor remainder.
  Frem,
  /// Truncating division.
  Zdiv,
  /// Truncating remainder.
  Zrem,
  /// `x * 2^y`
  Shl,
  /// Floor division by `2^y`.
  Shr,
  /// Round down to a multiple of `2^y`.
  Align,
  /// `x mod 2^y`
  ModPow2,
  /// `x ^ y` with non-negative exponent.
  Pow,
  /// Smaller of two.
  Min,
  /// Larger of two.
  Max,
}

impl IntOp {
  /// The suffix used in runtime helper names.
  #[must_use] pub fn tag(self) -> &'static str {
    match self {
      IntOp::Add => "add", IntOp::Sub => "sub", IntOp::Mul => "mul",
      IntOp::ExactDiv => "exact_div", IntOp::Fdiv => "fdiv", IntOp::Frem => "frem",
      IntOp::Zdiv => "zdiv", IntOp::Zrem => "zrem",
      IntOp::Shl => "shl", IntOp::Shr => "shr",
      IntOp::Align => "align", IntOp::ModPow2 => "mod_pow2", IntOp::Pow => "pow",
      IntOp::Min => "min", IntOp::Max => "max",
    }
  }
}

/// Comparisons.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
  /// `==`
  Eq,
  /// `!=`
  Ne,
  /// `<`
  Lt,
  /// `<=`
  Le,
  /// `>`
  Gt,
  /// `>=`
  Ge,
}

impl CmpOp {
  /// The C spelling.
  #[must_use] pub fn c(self) -> &'static str {
    match self {
      CmpOp::Eq => "==", CmpOp::Ne => "!=",
      CmpOp::Lt => "<", CmpOp::Le => "<=", CmpOp::Gt => ">", CmpOp::Ge => ">=",
    }
  }

  /// The suffix used in runtime helper names.
  #[must_use] pub fn tag(self) -> &'static str {
    match self {
      CmpOp::Eq => "eq", CmpOp::Ne => "ne",
      CmpOp::Lt => "lt", CmpOp::Le => "le", CmpOp::Gt => "gt", CmpOp::Ge => "ge",
    }
  }
}

/// Width-homogeneous bitvector operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BitsOp {
  /// Modular addition.
  Add,
  /// Modular subtraction.
  Sub,
  /// `&`
  And,
  /// `|`
  Or,
  /// `^`
  Eor,
}

impl BitsOp {
  /// The suffix used in runtime helper names.
  #[must_use] pub fn tag(self) -> &'static str {
    match self {
      BitsOp::Add => "add", BitsOp::Sub => "sub",
      BitsOp::And => "and", BitsOp::Or => "or", BitsOp::Eor => "eor",
    }
  }
}

/// Bitvector shifts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShiftOp {
  /// Logical left.
  Lsl,
  /// Logical right.
  Lsr,
  /// Arithmetic right.
  Asr,
}

impl ShiftOp {
  /// The suffix used in runtime helper names.
  #[must_use] pub fn tag(self) -> &'static str {
    match self {
      ShiftOp::Lsl => "lsl", ShiftOp::Lsr => "lsr", ShiftOp::Asr => "asr",
    }
  }
}

/// The capability set every backend variant provides. Operands are
/// rendered C expressions; results are C expressions.
pub trait Runtime {
  /// The variant's name, as selected on the command line.
  fn name(&self) -> &'static str;
  /// The prelude placed at the top of every generated header.
  fn file_header(&self) -> String;

  // -- type printers

  /// The C type of an unbounded integer.
  fn ty_int(&self) -> String;
  /// The C type of a bounded integer of width `n`.
  fn ty_sint(&self, n: u32) -> String;
  /// The C type of a bitvector of width `n`.
  fn ty_bits(&self, n: u32) -> String;
  /// The C type of a RAM handle.
  fn ty_ram(&self) -> String;

  // -- literal printers

  /// An unbounded integer literal.
  fn lit_int(&self, v: &BigInt) -> String;
  /// A bounded integer literal.
  fn lit_sint(&self, v: &SInt) -> String;
  /// A bitvector literal.
  fn lit_bits(&self, v: &Bits) -> String;

  // -- unbounded integer arithmetic

  /// A binary operation on unbounded integers.
  fn int_binop(&self, op: IntOp, a: &str, b: &str) -> String;
  /// Negation of an unbounded integer.
  fn int_neg(&self, a: &str) -> String;
  /// `2^a`.
  fn int_pow2(&self, a: &str) -> String;
  /// Whether `a` is a power of two.
  fn int_is_pow2(&self, a: &str) -> String;
  /// A comparison of unbounded integers.
  fn int_cmp(&self, op: CmpOp, a: &str, b: &str) -> String;

  // -- bounded integer arithmetic, with an explicit width

  /// A binary operation on `sintN`.
  fn sint_binop(&self, op: IntOp, n: u32, a: &str, b: &str) -> String;
  /// Negation on `sintN`.
  fn sint_neg(&self, n: u32, a: &str) -> String;
  /// A comparison on `sintN`.
  fn sint_cmp(&self, op: CmpOp, n: u32, a: &str, b: &str) -> String;
  /// Change width `m` to width `n`.
  fn sint_resize(&self, m: u32, n: u32, a: &str) -> String;
  /// Unbounded to bounded.
  fn cvt_int_sint(&self, n: u32, a: &str) -> String;
  /// Bounded to unbounded.
  fn cvt_sint_int(&self, n: u32, a: &str) -> String;

  // -- bitvector arithmetic, with an explicit width

  /// A width-homogeneous binary operation.
  fn bits_binop(&self, op: BitsOp, n: u32, a: &str, b: &str) -> String;
  /// Complement within the width.
  fn bits_not(&self, n: u32, a: &str) -> String;
  /// A shift by an integer amount.
  fn bits_shift(&self, op: ShiftOp, n: u32, a: &str, d: &str) -> String;
  /// Equality at a width.
  fn bits_cmp(&self, op: CmpOp, n: u32, a: &str, b: &str) -> String;
  /// The all-zero vector.
  fn bits_zeros(&self, n: u32) -> String;
  /// The all-one vector.
  fn bits_ones(&self, n: u32) -> String;
  /// Zero-extend from `m` to `n`.
  fn bits_zero_extend(&self, m: u32, n: u32, a: &str) -> String;
  /// Sign-extend from `m` to `n`.
  fn bits_sign_extend(&self, m: u32, n: u32, a: &str) -> String;
  /// Concatenate an `m`-bit high part with an `n`-bit low part.
  fn bits_concat(&self, m: u32, n: u32, a: &str, b: &str) -> String;
  /// `count` copies of an `m`-bit vector.
  fn bits_replicate(&self, m: u32, count: u32, a: &str) -> String;
  /// Match under a mask with the given care bits.
  fn bits_in_mask(&self, n: u32, a: &str, bits: &BigInt, care: &BigInt) -> String;

  // -- conversions between bits, int, and sintN

  /// The unsigned value of a bitvector.
  fn cvt_bits_uint(&self, n: u32, a: &str) -> String;
  /// The two's-complement value of a bitvector.
  fn cvt_bits_sint(&self, n: u32, a: &str) -> String;
  /// The low `n` bits of an unbounded integer.
  fn cvt_int_bits(&self, n: u32, a: &str) -> String;

  // -- slices

  /// `w` bits of an `n`-bit vector starting at `lo`.
  fn get_slice(&self, n: u32, w: u32, x: &str, lo: &str) -> String;
  /// `x` with `w` bits at `lo` replaced by `v`.
  fn set_slice(&self, n: u32, w: u32, x: &str, lo: &str, v: &str) -> String;

  // -- memory

  /// Fill memory with a repeated byte.
  fn ram_init(&self, a: u32, ram: &str, v: &str) -> String;
  /// Read `n` bytes.
  fn ram_read(&self, a: u32, n: u32, ram: &str, addr: &str) -> String;
  /// Write `n` bytes.
  fn ram_write(&self, a: u32, n: u32, ram: &str, addr: &str, v: &str) -> String;

  // -- printing

  /// Print a string expression.
  fn print_str(&self, s: &str) -> String;
  /// Print a character.
  fn print_char(&self, c: &str) -> String;
  /// Print an integer in decimal.
  fn print_int_dec(&self, a: &str) -> String;
  /// Print an integer in hex.
  fn print_int_hex(&self, a: &str) -> String;
  /// Print a bitvector in hex with its width tag.
  fn print_bits_hex(&self, n: u32, a: &str) -> String;

  // -- FFI helpers

  /// Convert a runtime integer to a plain C `int64_t`.
  fn ffi_int_to_c(&self, a: &str) -> String;
  /// Convert a plain C `int64_t` to the runtime integer representation.
  fn ffi_c_to_int(&self, a: &str) -> String;
}

/// The selectable backend variants.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  /// Portable runtime staying within 64-bit C arithmetic.
  #[default]
  Fallback,
  /// C23 `_BitInt` arbitrary-width arithmetic.
  C23,
  /// Calls into an external large-integer library.
  Ac,
}

/// Construct the runtime for a variant.
#[must_use] pub fn runtime(b: Backend) -> Box<dyn Runtime> {
  match b {
    Backend::Fallback => Box::new(fallback::FallbackRuntime),
    Backend::C23 => Box::new(c23::C23Runtime),
    Backend::Ac => Box::new(ac::AcRuntime),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn variants_are_interchangeable() {
    for b in [Backend::Fallback, Backend::C23, Backend::Ac] {
      let rt = runtime(b);
      // Every variant renders the whole capability set.
      assert!(!rt.file_header().is_empty());
      assert!(!rt.ty_bits(129).is_empty());
      let add = rt.int_binop(IntOp::Add, "a", "b");
      assert!(add.contains('a') && add.contains('b'), "{add}");
      let sl = rt.get_slice(64, 8, "x", "4");
      assert!(sl.contains('x'), "{sl}");
    }
  }

  #[test]
  fn round_trip_shapes() {
    // resize n -> n is the identity in every variant.
    for b in [Backend::Fallback, Backend::C23, Backend::Ac] {
      let rt = runtime(b);
      assert_eq!(rt.sint_resize(8, 8, "x"), "x");
    }
  }
}
