//! Primitive values: unbounded integers, width-bounded integers, bitvectors,
//! masks, strings, and the aggregate shapes built from them.
//!
//! These carry the exact arithmetic used by constant folding and by the
//! emitter's literal printers. All integer payloads are arbitrary precision
//! ([`BigInt`]/[`BigUint`]); bounded operations wrap into the two's-complement
//! window of their width.

use std::fmt;
use num::{BigInt, BigUint, One, Signed, Zero};
use num::bigint::Sign;
use crate::types::Ident;

/// A bitvector: a width and a non-negative payload less than `2^width`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Bits {
  /// The width in bits. Zero-width vectors are legal.
  pub width: u32,
  /// The payload, maintained `< 2^width`.
  pub bits: BigUint,
}

/// A bitmask: a width, the cared-about bit values, and a care mask of the
/// same width. Bits outside the care mask are zero in `bits`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Mask {
  /// The width in bits.
  pub width: u32,
  /// The expected values of the cared-about bits.
  pub bits: BigUint,
  /// Which bits are compared; `0` bits match anything.
  pub care: BigUint,
}

/// A bounded signed integer `sintN`: a width and a value within the
/// two's-complement window `[-2^(N-1), 2^(N-1))`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SInt {
  /// The width in bits, at least 1.
  pub width: u32,
  /// The value, maintained within the window.
  pub val: BigInt,
}

/// A runtime value, as used by constant folding and literal emission.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  /// An unbounded signed integer.
  Int(BigInt),
  /// A bounded signed integer of a declared width.
  SInt(SInt),
  /// A bitvector.
  Bits(Bits),
  /// A bitmask with a care set.
  Mask(Mask),
  /// A boolean.
  Bool(bool),
  /// A string literal.
  String(Box<str>),
  /// A tuple of values.
  Tuple(Vec<Value>),
  /// An array of values.
  Array(Vec<Value>),
  /// A record: field name to value, in declaration order.
  Record(Vec<(Ident, Value)>),
  /// A member of an enumeration, with its declared index.
  Enum(Ident, usize),
}

/// `2^w` as an unsigned bignum.
#[must_use] pub fn pow2u(w: u32) -> BigUint { BigUint::one() << w }

/// `2^w` as a signed bignum.
#[must_use] pub fn pow2(w: u32) -> BigInt { BigInt::one() << w }

/// Floor division, the `DIVRM` operator. `None` on zero divisor.
#[must_use] pub fn fdiv(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  if b.is_zero() { return None }
  Some(num::Integer::div_floor(a, b))
}

/// Floor remainder, the `MOD` operator. `None` on zero divisor.
#[must_use] pub fn frem(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  if b.is_zero() { return None }
  Some(num::Integer::mod_floor(a, b))
}

/// Truncating division, the `QUOT` operator. `None` on zero divisor.
#[must_use] pub fn zdiv(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  if b.is_zero() { return None }
  Some(a / b)
}

/// Truncating remainder, the `REM` operator. `None` on zero divisor.
#[must_use] pub fn zrem(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  if b.is_zero() { return None }
  Some(a % b)
}

/// Exact division, the `DIV` operator: defined only when `b` divides `a`.
#[must_use] pub fn exact_div(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  if b.is_zero() || !(a % b).is_zero() { return None }
  Some(a / b)
}

/// Left shift by a non-negative amount. `None` on negative shift.
#[must_use] pub fn shl(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  let sh = u32::try_from(b).ok()?;
  Some(a << sh)
}

/// Arithmetic right shift by a non-negative amount. `None` on negative shift.
#[must_use] pub fn shr(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  let sh = u32::try_from(b).ok()?;
  Some(num::Integer::div_floor(a, &(BigInt::one() << sh)))
}

/// Whether `a` is a power of two.
#[must_use] pub fn is_pow2(a: &BigInt) -> bool {
  a.is_positive() && {
    let m = a.magnitude();
    (m & (m - BigUint::one())).is_zero()
  }
}

/// Round `a` down to a multiple of `2^b`, the `align` primitive.
/// `None` on negative `b`.
#[must_use] pub fn align(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  let sh = u32::try_from(b).ok()?;
  Some(num::Integer::div_floor(a, &pow2(sh)) << sh)
}

/// `a mod 2^b`. `None` on negative `b`.
#[must_use] pub fn mod_pow2(a: &BigInt, b: &BigInt) -> Option<BigInt> {
  let sh = u32::try_from(b).ok()?;
  Some(num::Integer::mod_floor(a, &pow2(sh)))
}

impl SInt {
  /// Construct, wrapping `val` into the two's-complement window of `width`.
  #[must_use] pub fn wrap(width: u32, val: BigInt) -> Self {
    debug_assert!(width >= 1, "sintN width must be at least 1");
    let half = pow2(width - 1);
    let val = num::Integer::mod_floor(&(val + &half), &pow2(width)) - half;
    SInt { width, val }
  }

  /// Whether `val` fits in `width` bits without wrapping.
  #[must_use] pub fn fits(width: u32, val: &BigInt) -> bool {
    let half = pow2(width - 1);
    *val >= -&half && *val < half
  }

  /// Wrapping addition.
  #[must_use] pub fn add(&self, other: &SInt) -> SInt {
    debug_assert_eq!(self.width, other.width);
    SInt::wrap(self.width, &self.val + &other.val)
  }
  /// Wrapping subtraction.
  #[must_use] pub fn sub(&self, other: &SInt) -> SInt {
    debug_assert_eq!(self.width, other.width);
    SInt::wrap(self.width, &self.val - &other.val)
  }
  /// Wrapping negation.
  #[must_use] pub fn neg(&self) -> SInt { SInt::wrap(self.width, -&self.val) }
  /// Wrapping multiplication.
  #[must_use] pub fn mul(&self, other: &SInt) -> SInt {
    debug_assert_eq!(self.width, other.width);
    SInt::wrap(self.width, &self.val * &other.val)
  }
  /// Wrapping left shift.
  #[must_use] pub fn shl(&self, sh: &BigInt) -> Option<SInt> {
    Some(SInt::wrap(self.width, shl(&self.val, sh)?))
  }
  /// Arithmetic right shift.
  #[must_use] pub fn shr(&self, sh: &BigInt) -> Option<SInt> {
    Some(SInt::wrap(self.width, shr(&self.val, sh)?))
  }
  /// Truncating division.
  #[must_use] pub fn zdiv(&self, other: &SInt) -> Option<SInt> {
    Some(SInt::wrap(self.width, zdiv(&self.val, &other.val)?))
  }
  /// Truncating remainder.
  #[must_use] pub fn zrem(&self, other: &SInt) -> Option<SInt> {
    Some(SInt::wrap(self.width, zrem(&self.val, &other.val)?))
  }
  /// Floor division.
  #[must_use] pub fn fdiv(&self, other: &SInt) -> Option<SInt> {
    Some(SInt::wrap(self.width, fdiv(&self.val, &other.val)?))
  }
  /// Floor remainder.
  #[must_use] pub fn frem(&self, other: &SInt) -> Option<SInt> {
    Some(SInt::wrap(self.width, frem(&self.val, &other.val)?))
  }
  /// Round down to a multiple of `2^other`.
  #[must_use] pub fn align(&self, other: &SInt) -> Option<SInt> {
    Some(SInt::wrap(self.width, align(&self.val, &other.val)?))
  }
  /// Change width, wrapping if narrowing.
  #[must_use] pub fn resize(&self, width: u32) -> SInt { SInt::wrap(width, self.val.clone()) }
}

impl Bits {
  /// A zero bitvector of the given width.
  #[must_use] pub fn zeros(width: u32) -> Self { Bits { width, bits: BigUint::zero() } }

  /// An all-ones bitvector of the given width.
  #[must_use] pub fn ones(width: u32) -> Self {
    Bits { width, bits: pow2u(width) - BigUint::one() }
  }

  /// Construct from an unsigned payload, truncating to `width`.
  #[must_use] pub fn of_uint(width: u32, bits: BigUint) -> Self {
    Bits { width, bits: bits % pow2u(width) }
  }

  /// Construct from a signed integer, two's-complement truncating to `width`.
  #[must_use] pub fn of_int(width: u32, val: &BigInt) -> Self {
    let m = pow2(width);
    let v = num::Integer::mod_floor(val, &m);
    Bits { width, bits: v.to_biguint().expect("mod_floor of positive modulus") }
  }

  /// The payload as an unsigned integer (`UInt`).
  #[must_use] pub fn to_uint(&self) -> BigInt { BigInt::from_biguint(Sign::Plus, self.bits.clone()) }

  /// The payload as a signed two's-complement integer (`SInt`).
  #[must_use] pub fn to_sint(&self) -> BigInt {
    if self.width > 0 && self.bit(self.width - 1) {
      self.to_uint() - pow2(self.width)
    } else {
      self.to_uint()
    }
  }

  /// The value of bit `i`.
  #[must_use] pub fn bit(&self, i: u32) -> bool { self.bits.bit(u64::from(i)) }

  /// Bitwise and. Widths must agree.
  #[must_use] pub fn and(&self, other: &Bits) -> Bits {
    debug_assert_eq!(self.width, other.width);
    Bits { width: self.width, bits: &self.bits & &other.bits }
  }
  /// Bitwise or. Widths must agree.
  #[must_use] pub fn or(&self, other: &Bits) -> Bits {
    debug_assert_eq!(self.width, other.width);
    Bits { width: self.width, bits: &self.bits | &other.bits }
  }
  /// Bitwise xor. Widths must agree.
  #[must_use] pub fn xor(&self, other: &Bits) -> Bits {
    debug_assert_eq!(self.width, other.width);
    Bits { width: self.width, bits: &self.bits ^ &other.bits }
  }
  /// Bitwise complement within the width.
  #[must_use] pub fn not(&self) -> Bits {
    Bits { width: self.width, bits: Bits::ones(self.width).bits ^ &self.bits }
  }
  /// Modular addition within the width.
  #[must_use] pub fn add(&self, other: &Bits) -> Bits {
    debug_assert_eq!(self.width, other.width);
    Bits::of_uint(self.width, &self.bits + &other.bits)
  }
  /// Modular subtraction within the width.
  #[must_use] pub fn sub(&self, other: &Bits) -> Bits {
    debug_assert_eq!(self.width, other.width);
    Bits::of_int(self.width, &(self.to_uint() - other.to_uint()))
  }
  /// Left shift, dropping bits shifted past the width.
  #[must_use] pub fn shl(&self, sh: u32) -> Bits {
    Bits::of_uint(self.width, &self.bits << sh)
  }
  /// Logical right shift.
  #[must_use] pub fn lsr(&self, sh: u32) -> Bits {
    Bits { width: self.width, bits: &self.bits >> sh }
  }
  /// Arithmetic right shift (sign bit replicates).
  #[must_use] pub fn asr(&self, sh: u32) -> Bits {
    Bits::of_int(self.width, &shr(&self.to_sint(), &BigInt::from(sh)).expect("non-negative shift"))
  }
  /// Zero-extend to `width >= self.width`.
  #[must_use] pub fn zero_extend(&self, width: u32) -> Bits {
    debug_assert!(width >= self.width);
    Bits { width, bits: self.bits.clone() }
  }
  /// Sign-extend to `width >= self.width`.
  #[must_use] pub fn sign_extend(&self, width: u32) -> Bits {
    debug_assert!(width >= self.width);
    Bits::of_int(width, &self.to_sint())
  }
  /// Concatenate, with `self` in the high bits.
  #[must_use] pub fn concat(&self, low: &Bits) -> Bits {
    Bits { width: self.width + low.width, bits: (&self.bits << low.width) | &low.bits }
  }
  /// Repeat `self` `n` times.
  #[must_use] pub fn replicate(&self, n: u32) -> Bits {
    let mut acc = Bits::zeros(0);
    for _ in 0..n { acc = acc.concat(self) }
    acc
  }
  /// Extract `width` bits starting at bit `lo`. The caller has already
  /// checked `lo + width <= self.width`; a zero width yields `bits(0)`.
  #[must_use] pub fn slice(&self, lo: u32, width: u32) -> Bits {
    Bits::of_uint(width, &self.bits >> lo)
  }
  /// Overwrite `width` bits starting at `lo` with `field`.
  #[must_use] pub fn set_slice(&self, lo: u32, field: &Bits) -> Bits {
    let keep = Bits::ones(field.width).bits << lo;
    let cleared = &self.bits & (Bits::ones(self.width).bits ^ keep);
    Bits { width: self.width, bits: cleared | (&field.bits << lo) }
  }
  /// Match against a mask: cared-about bits must equal the mask's bits.
  #[must_use] pub fn in_mask(&self, mask: &Mask) -> bool {
    debug_assert_eq!(self.width, mask.width);
    &self.bits & &mask.care == mask.bits
  }
}

impl fmt::Display for Bits {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}'x{}", self.width, self.bits.to_str_radix(16))
  }
}

impl fmt::Display for SInt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "i{}'d{}", self.width, self.val)
  }
}

impl Value {
  /// The unbounded integer payload, if this is an integer value.
  #[must_use] pub fn as_int(&self) -> Option<&BigInt> {
    match self { Value::Int(n) => Some(n), _ => None }
  }

  /// The bitvector payload, if this is a bits value.
  #[must_use] pub fn as_bits(&self) -> Option<&Bits> {
    match self { Value::Bits(b) => Some(b), _ => None }
  }

  /// The boolean payload, if this is a boolean.
  #[must_use] pub fn as_bool(&self) -> Option<bool> {
    match self { Value::Bool(b) => Some(*b), _ => None }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Int(n) => write!(f, "{n}"),
      Value::SInt(n) => write!(f, "{n}"),
      Value::Bits(b) => write!(f, "{b}"),
      Value::Mask(m) => {
        write!(f, "'")?;
        for i in (0..m.width).rev() {
          if m.care.bit(u64::from(i)) {
            write!(f, "{}", if m.bits.bit(u64::from(i)) { '1' } else { '0' })?
          } else {
            write!(f, "x")?
          }
        }
        write!(f, "'")
      }
      Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
      Value::String(s) => write!(f, "{s:?}"),
      Value::Tuple(vs) => {
        write!(f, "(")?;
        for (i, v) in vs.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{v}")?
        }
        write!(f, ")")
      }
      Value::Array(vs) => write!(f, "<array of {}>", vs.len()),
      Value::Record(fs) => {
        write!(f, "{{")?;
        for (i, (name, v)) in fs.iter().enumerate() {
          if i > 0 { write!(f, ", ")? }
          write!(f, "{name} = {v}")?
        }
        write!(f, "}}")
      }
      Value::Enum(name, _) => write!(f, "{name}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn int(n: i64) -> BigInt { BigInt::from(n) }

  #[test]
  fn division_flavours_disagree_on_negatives() {
    assert_eq!(fdiv(&int(-7), &int(2)), Some(int(-4)));
    assert_eq!(zdiv(&int(-7), &int(2)), Some(int(-3)));
    assert_eq!(frem(&int(-7), &int(2)), Some(int(1)));
    assert_eq!(zrem(&int(-7), &int(2)), Some(int(-1)));
    assert_eq!(fdiv(&int(7), &int(0)), None);
  }

  #[test]
  fn exact_div_requires_divisibility() {
    assert_eq!(exact_div(&int(12), &int(4)), Some(int(3)));
    assert_eq!(exact_div(&int(12), &int(5)), None);
  }

  #[test]
  fn pow2_predicates() {
    assert!(is_pow2(&int(8)));
    assert!(!is_pow2(&int(12)));
    assert!(!is_pow2(&int(0)));
    assert!(!is_pow2(&int(-4)));
    assert_eq!(align(&int(12), &int(2)), Some(int(12)));
    assert_eq!(align(&int(13), &int(2)), Some(int(12)));
    assert_eq!(mod_pow2(&int(13), &int(2)), Some(int(1)));
  }

  #[test]
  fn sint_wraps_into_window() {
    let x = SInt::wrap(8, int(200));
    assert_eq!(x.val, int(-56));
    assert_eq!(SInt::wrap(8, int(-129)).val, int(127));
    assert!(SInt::fits(8, &int(127)));
    assert!(!SInt::fits(8, &int(128)));
  }

  #[test]
  fn sint_align_and_zrem_follow_runtime() {
    // asl_align_sintN(i8'd12, i8'd2) = i8'd12; (i8'd16, i8'd2) = i8'd16
    let a = SInt::wrap(8, int(12));
    assert_eq!(a.align(&SInt::wrap(8, int(2))).map(|x| x.val), Some(int(12)));
    let b = SInt::wrap(8, int(16));
    assert_eq!(b.align(&SInt::wrap(8, int(2))).map(|x| x.val), Some(int(16)));
    // asl_zrem_sintN(-i8'd5, i8'd3) = -i8'd2
    let c = SInt::wrap(8, int(-5));
    assert_eq!(c.zrem(&SInt::wrap(8, int(3))).map(|x| x.val), Some(int(-2)));
  }

  #[test]
  fn bits_logic_and_widths() {
    let x = Bits::of_uint(4, BigUint::from(0b1100_u32));
    let y = Bits::of_uint(4, BigUint::from(0b1010_u32));
    assert_eq!(x.or(&y).bits, BigUint::from(0b1110_u32));
    assert_eq!(x.and(&y).bits, BigUint::from(0b1000_u32));
    assert_eq!(x.xor(&y).bits, BigUint::from(0b0110_u32));
    assert_eq!(x.not().bits, BigUint::from(0b0011_u32));
    assert_eq!(x.concat(&y).width, 8);
    assert_eq!(x.concat(&y).bits, BigUint::from(0b1100_1010_u32));
  }

  #[test]
  fn bits_extension_and_signedness() {
    let x = Bits::of_uint(4, BigUint::from(0b1100_u32));
    assert_eq!(x.to_uint(), int(12));
    assert_eq!(x.to_sint(), int(-4));
    assert_eq!(x.sign_extend(8).bits, BigUint::from(0b1111_1100_u32));
    assert_eq!(x.zero_extend(8).bits, BigUint::from(0b0000_1100_u32));
    assert_eq!(x.asr(1).bits, BigUint::from(0b1110_u32));
    assert_eq!(x.lsr(1).bits, BigUint::from(0b0110_u32));
  }

  #[test]
  fn slice_round_trip() {
    let v = Bits::of_uint(8, BigUint::from(0xA5_u32));
    let r = Bits::of_uint(4, BigUint::from(0x3_u32));
    assert_eq!(v.set_slice(2, &r).slice(2, 4), r);
    // zero-width slice is legal and empty
    assert_eq!(v.slice(3, 0), Bits::zeros(0));
  }

  #[test]
  fn mask_matching() {
    // '10xx': care = 1100, bits = 1000
    let m = Mask {
      width: 4,
      bits: BigUint::from(0b1000_u32),
      care: BigUint::from(0b1100_u32),
    };
    assert!(Bits::of_uint(4, BigUint::from(0b1011_u32)).in_mask(&m));
    assert!(!Bits::of_uint(4, BigUint::from(0b1111_u32)).in_mask(&m));
    assert_eq!(Value::Mask(m).to_string(), "'10xx'");
  }

  #[test]
  fn replicate_concatenates_copies() {
    let x = Bits::of_uint(2, BigUint::from(0b10_u32));
    let r = x.replicate(3);
    assert_eq!(r.width, 6);
    assert_eq!(r.bits, BigUint::from(0b10_10_10_u32));
  }
}
