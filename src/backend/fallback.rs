//! The portable runtime variant. Generated code never exceeds 64-bit C
//! arithmetic: values up to 64 bits use plain `uint64_t`/`int64_t`, wider
//! values use a limb-array type, and every operation goes through an
//! `ASL_*` helper from the prelude that splits wide work across limbs.

use num::BigInt;
use crate::value::{Bits, SInt};
use super::{BitsOp, CmpOp, IntOp, Runtime, ShiftOp};

/// The portable fallback runtime.
pub struct FallbackRuntime;

/// Limbs needed to hold `n` bits.
fn limbs(n: u32) -> u32 { n.div_ceil(64).max(1) }

fn wide(n: u32) -> bool { n > 64 }

impl Runtime for FallbackRuntime {
  fn name(&self) -> &'static str { "fallback" }

  fn file_header(&self) -> String {
    "#include <stdbool.h>\n\
     #include <stdint.h>\n\
     #include \"asl_runtime_fallback.h\"\n".to_owned()
  }

  fn ty_int(&self) -> String { "ASL_int_t".to_owned() }

  fn ty_sint(&self, n: u32) -> String {
    if wide(n) { format!("ASL_wide_t /* sint{n} */") } else { "int64_t".to_owned() }
  }

  fn ty_bits(&self, n: u32) -> String {
    if wide(n) {
      format!("ASL_bits{}_t", limbs(n) * 64)
    } else {
      "uint64_t".to_owned()
    }
  }

  fn ty_ram(&self) -> String { "ASL_ram_t".to_owned() }

  fn lit_int(&self, v: &BigInt) -> String {
    format!("ASL_int_lit({v})")
  }

  fn lit_sint(&self, v: &SInt) -> String {
    if wide(v.width) {
      format!("ASL_wide_lit(\"{}\")", v.val)
    } else {
      format!("INT64_C({})", v.val)
    }
  }

  fn lit_bits(&self, v: &Bits) -> String {
    if wide(v.width) {
      // Wide literals build from 64-bit chunks, low limb first.
      let mut chunks = vec![];
      let mut rest = v.bits.clone();
      for _ in 0..limbs(v.width) {
        let low: u64 = (&rest & num::BigUint::from(u64::MAX)).try_into().expect("masked");
        chunks.push(format!("UINT64_C({low:#x})"));
        rest >>= 64u32;
      }
      format!("ASL_bits_lit{}({})", limbs(v.width) * 64, chunks.join(", "))
    } else {
      format!("UINT64_C({:#x})", v.bits)
    }
  }

  fn int_binop(&self, op: IntOp, a: &str, b: &str) -> String {
    format!("ASL_{}_int({a}, {b})", op.tag())
  }

  fn int_neg(&self, a: &str) -> String { format!("ASL_neg_int({a})") }
  fn int_pow2(&self, a: &str) -> String { format!("ASL_pow2_int({a})") }
  fn int_is_pow2(&self, a: &str) -> String { format!("ASL_is_pow2_int({a})") }

  fn int_cmp(&self, op: CmpOp, a: &str, b: &str) -> String {
    format!("ASL_{}_int({a}, {b})", op.tag())
  }

  fn sint_binop(&self, op: IntOp, n: u32, a: &str, b: &str) -> String {
    format!("ASL_{}_sint{}({n}, {a}, {b})", op.tag(), if wide(n) { "_w" } else { "" })
  }

  fn sint_neg(&self, n: u32, a: &str) -> String {
    format!("ASL_neg_sint{}({n}, {a})", if wide(n) { "_w" } else { "" })
  }

  fn sint_cmp(&self, op: CmpOp, n: u32, a: &str, b: &str) -> String {
    if wide(n) {
      format!("ASL_{}_sint_w({n}, {a}, {b})", op.tag())
    } else {
      format!("({a} {} {b})", op.c())
    }
  }

  fn sint_resize(&self, m: u32, n: u32, a: &str) -> String {
    if m == n { return a.to_owned() }
    match (wide(m), wide(n)) {
      (false, false) => format!("ASL_resize_sint({m}, {n}, {a})"),
      _ => format!("ASL_resize_sint_w({m}, {n}, {a})"),
    }
  }

  fn cvt_int_sint(&self, n: u32, a: &str) -> String {
    format!("ASL_cvt_int_sint({n}, {a})")
  }

  fn cvt_sint_int(&self, n: u32, a: &str) -> String {
    format!("ASL_cvt_sint_int({n}, {a})")
  }

  fn bits_binop(&self, op: BitsOp, n: u32, a: &str, b: &str) -> String {
    if wide(n) {
      format!("ASL_{}_bits_w({n}, {a}, {b})", op.tag())
    } else {
      match op {
        BitsOp::And => format!("({a} & {b})"),
        BitsOp::Or => format!("({a} | {b})"),
        BitsOp::Eor => format!("({a} ^ {b})"),
        BitsOp::Add => format!("ASL_mask{n}({a} + {b})"),
        BitsOp::Sub => format!("ASL_mask{n}({a} - {b})"),
      }
    }
  }

  fn bits_not(&self, n: u32, a: &str) -> String {
    if wide(n) {
      format!("ASL_not_bits_w({n}, {a})")
    } else {
      format!("ASL_mask{n}(~{a})")
    }
  }

  fn bits_shift(&self, op: ShiftOp, n: u32, a: &str, d: &str) -> String {
    format!("ASL_{}_bits{}({n}, {a}, {d})", op.tag(), if wide(n) { "_w" } else { "" })
  }

  fn bits_cmp(&self, op: CmpOp, n: u32, a: &str, b: &str) -> String {
    if wide(n) {
      format!("ASL_{}_bits_w({n}, {a}, {b})", op.tag())
    } else {
      format!("({a} {} {b})", op.c())
    }
  }

  fn bits_zeros(&self, n: u32) -> String {
    if wide(n) { format!("ASL_zeros_bits_w({n})") } else { "UINT64_C(0)".to_owned() }
  }

  fn bits_ones(&self, n: u32) -> String {
    if wide(n) { format!("ASL_ones_bits_w({n})") } else { format!("ASL_mask{n}(~UINT64_C(0))") }
  }

  fn bits_zero_extend(&self, m: u32, n: u32, a: &str) -> String {
    if m == n { return a.to_owned() }
    match (wide(m), wide(n)) {
      (false, false) => a.to_owned(),
      _ => format!("ASL_zero_extend_bits_w({m}, {n}, {a})"),
    }
  }

  fn bits_sign_extend(&self, m: u32, n: u32, a: &str) -> String {
    if m == n { return a.to_owned() }
    format!("ASL_sign_extend_bits{}({m}, {n}, {a})",
      if wide(m) || wide(n) { "_w" } else { "" })
  }

  fn bits_concat(&self, m: u32, n: u32, a: &str, b: &str) -> String {
    if wide(m + n) {
      format!("ASL_append_bits_w({m}, {n}, {a}, {b})")
    } else {
      format!("(({a} << {n}) | {b})")
    }
  }

  fn bits_replicate(&self, m: u32, count: u32, a: &str) -> String {
    format!("ASL_replicate_bits{}({m}, {count}, {a})",
      if wide(m * count) { "_w" } else { "" })
  }

  fn bits_in_mask(&self, n: u32, a: &str, bits: &BigInt, care: &BigInt) -> String {
    if wide(n) {
      format!("ASL_in_mask_w({n}, {a}, \"{bits:x}\", \"{care:x}\")")
    } else {
      format!("(({a} & UINT64_C({care:#x})) == UINT64_C({bits:#x}))")
    }
  }

  fn cvt_bits_uint(&self, n: u32, a: &str) -> String {
    format!("ASL_cvt_bits_uint{}({n}, {a})", if wide(n) { "_w" } else { "" })
  }

  fn cvt_bits_sint(&self, n: u32, a: &str) -> String {
    format!("ASL_cvt_bits_sint{}({n}, {a})", if wide(n) { "_w" } else { "" })
  }

  fn cvt_int_bits(&self, n: u32, a: &str) -> String {
    format!("ASL_cvt_int_bits{}({n}, {a})", if wide(n) { "_w" } else { "" })
  }

  fn get_slice(&self, n: u32, w: u32, x: &str, lo: &str) -> String {
    if wide(n) || wide(w) {
      format!("ASL_get_slice_w({n}, {w}, {x}, {lo})")
    } else if w == 0 {
      format!("ASL_zero_width({x})")
    } else {
      format!("ASL_mask{w}({x} >> {lo})")
    }
  }

  fn set_slice(&self, n: u32, w: u32, x: &str, lo: &str, v: &str) -> String {
    if wide(n) || wide(w) {
      format!("ASL_set_slice_w({n}, {w}, {x}, {lo}, {v})")
    } else {
      format!("ASL_set_slice({n}, {w}, {x}, {lo}, {v})")
    }
  }

  fn ram_init(&self, a: u32, ram: &str, v: &str) -> String {
    format!("ASL_ram_init({a}, {ram}, {v})")
  }

  fn ram_read(&self, a: u32, n: u32, ram: &str, addr: &str) -> String {
    format!("ASL_ram_read({a}, {n}, {ram}, {addr})")
  }

  fn ram_write(&self, a: u32, n: u32, ram: &str, addr: &str, v: &str) -> String {
    format!("ASL_ram_write({a}, {n}, {ram}, {addr}, {v})")
  }

  fn print_str(&self, s: &str) -> String { format!("ASL_print_str({s})") }
  fn print_char(&self, c: &str) -> String { format!("ASL_print_char({c})") }
  fn print_int_dec(&self, a: &str) -> String { format!("ASL_print_int_dec({a})") }
  fn print_int_hex(&self, a: &str) -> String { format!("ASL_print_int_hex({a})") }

  fn print_bits_hex(&self, n: u32, a: &str) -> String {
    format!("ASL_print_bits_hex({n}, {a})")
  }

  fn ffi_int_to_c(&self, a: &str) -> String { format!("ASL_int_to_c({a})") }
  fn ffi_c_to_int(&self, a: &str) -> String { format!("ASL_int_from_c({a})") }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn narrow_bits_use_plain_c_operators() {
    let rt = FallbackRuntime;
    assert_eq!(rt.bits_binop(BitsOp::And, 8, "a", "b"), "(a & b)");
    assert_eq!(rt.bits_cmp(CmpOp::Eq, 8, "a", "b"), "(a == b)");
    assert_eq!(rt.get_slice(8, 4, "x", "2"), "ASL_mask4(x >> 2)");
  }

  #[test]
  fn wide_bits_go_through_limb_helpers() {
    let rt = FallbackRuntime;
    assert!(rt.bits_binop(BitsOp::And, 128, "a", "b").contains("_w"));
    assert!(rt.ty_bits(128).contains("128"));
    assert_eq!(limbs(65), 2);
    assert_eq!(limbs(64), 1);
  }

  #[test]
  fn wide_literal_splits_into_limbs() {
    let rt = FallbackRuntime;
    let v = Bits {
      width: 96,
      bits: num::BigUint::parse_bytes(b"112233445566778899aabbcc", 16).expect("hex"),
    };
    let s = rt.lit_bits(&v);
    assert!(s.starts_with("ASL_bits_lit128("), "{s}");
    assert!(s.contains("0x5566778899aabbcc"), "{s}");
  }
}
