//! The large-integer runtime variant: every integer and wide bitvector is a
//! handle into an external arbitrary-precision library, and all arithmetic
//! emits calls into that library's wrappers. Narrow bitvectors still ride
//! in machine words; the crossover matches the library's small-value
//! optimisation.

use num::BigInt;
use crate::value::{Bits, SInt};
use super::{BitsOp, CmpOp, IntOp, Runtime, ShiftOp};

/// The large-integer library runtime.
pub struct AcRuntime;

fn wide(n: u32) -> bool { n > 64 }

impl Runtime for AcRuntime {
  fn name(&self) -> &'static str { "ac" }

  fn file_header(&self) -> String {
    "#include <stdbool.h>\n\
     #include <stdint.h>\n\
     #include \"asl_runtime_ac.h\"\n".to_owned()
  }

  fn ty_int(&self) -> String { "ASL_ac_int_t".to_owned() }

  fn ty_sint(&self, n: u32) -> String {
    if wide(n) { "ASL_ac_int_t".to_owned() } else { "int64_t".to_owned() }
  }

  fn ty_bits(&self, n: u32) -> String {
    if wide(n) { "ASL_ac_bits_t".to_owned() } else { "uint64_t".to_owned() }
  }

  fn ty_ram(&self) -> String { "ASL_ram_t".to_owned() }

  fn lit_int(&self, v: &BigInt) -> String {
    format!("ASL_ac_int_lit(\"{v}\")")
  }

  fn lit_sint(&self, v: &SInt) -> String {
    if wide(v.width) {
      format!("ASL_ac_int_lit(\"{}\")", v.val)
    } else {
      format!("INT64_C({})", v.val)
    }
  }

  fn lit_bits(&self, v: &Bits) -> String {
    if wide(v.width) {
      format!("ASL_ac_bits_lit({}, \"{:x}\")", v.width, v.bits)
    } else {
      format!("UINT64_C({:#x})", v.bits)
    }
  }

  fn int_binop(&self, op: IntOp, a: &str, b: &str) -> String {
    format!("ASL_ac_{}({a}, {b})", op.tag())
  }

  fn int_neg(&self, a: &str) -> String { format!("ASL_ac_neg({a})") }
  fn int_pow2(&self, a: &str) -> String { format!("ASL_ac_pow2({a})") }
  fn int_is_pow2(&self, a: &str) -> String { format!("ASL_ac_is_pow2({a})") }

  fn int_cmp(&self, op: CmpOp, a: &str, b: &str) -> String {
    format!("(ASL_ac_cmp({a}, {b}) {} 0)", op.c())
  }

  fn sint_binop(&self, op: IntOp, n: u32, a: &str, b: &str) -> String {
    if wide(n) {
      format!("ASL_ac_{}_sized({n}, {a}, {b})", op.tag())
    } else {
      format!("ASL_{}_sint64({n}, {a}, {b})", op.tag())
    }
  }

  fn sint_neg(&self, n: u32, a: &str) -> String {
    if wide(n) { format!("ASL_ac_neg_sized({n}, {a})") } else { format!("(-{a})") }
  }

  fn sint_cmp(&self, op: CmpOp, n: u32, a: &str, b: &str) -> String {
    if wide(n) {
      format!("(ASL_ac_cmp({a}, {b}) {} 0)", op.c())
    } else {
      format!("({a} {} {b})", op.c())
    }
  }

  fn sint_resize(&self, m: u32, n: u32, a: &str) -> String {
    if m == n { return a.to_owned() }
    match (wide(m), wide(n)) {
      (false, false) => format!("ASL_resize_sint64({m}, {n}, {a})"),
      (false, true) => format!("ASL_ac_from_i64({a})"),
      (true, false) => format!("ASL_ac_to_i64({a})"),
      (true, true) => format!("ASL_ac_resize({n}, {a})"),
    }
  }

  fn cvt_int_sint(&self, n: u32, a: &str) -> String {
    if wide(n) { format!("ASL_ac_resize({n}, {a})") } else { format!("ASL_ac_to_i64({a})") }
  }

  fn cvt_sint_int(&self, n: u32, a: &str) -> String {
    if wide(n) { a.to_owned() } else { format!("ASL_ac_from_i64({a})") }
  }

  fn bits_binop(&self, op: BitsOp, n: u32, a: &str, b: &str) -> String {
    if wide(n) {
      format!("ASL_ac_{}_bits({n}, {a}, {b})", op.tag())
    } else {
      match op {
        BitsOp::And => format!("({a} & {b})"),
        BitsOp::Or => format!("({a} | {b})"),
        BitsOp::Eor => format!("({a} ^ {b})"),
        BitsOp::Add | BitsOp::Sub =>
          format!("ASL_{}_bits64({n}, {a}, {b})", op.tag()),
      }
    }
  }

  fn bits_not(&self, n: u32, a: &str) -> String {
    if wide(n) {
      format!("ASL_ac_not_bits({n}, {a})")
    } else {
      format!("ASL_mask64({n}, ~{a})")
    }
  }

  fn bits_shift(&self, op: ShiftOp, n: u32, a: &str, d: &str) -> String {
    if wide(n) {
      format!("ASL_ac_{}_bits({n}, {a}, {d})", op.tag())
    } else {
      format!("ASL_{}_bits64({n}, {a}, {d})", op.tag())
    }
  }

  fn bits_cmp(&self, op: CmpOp, n: u32, a: &str, b: &str) -> String {
    if wide(n) {
      format!("(ASL_ac_cmp_bits({a}, {b}) {} 0)", op.c())
    } else {
      format!("({a} {} {b})", op.c())
    }
  }

  fn bits_zeros(&self, n: u32) -> String {
    if wide(n) { format!("ASL_ac_zeros({n})") } else { "UINT64_C(0)".to_owned() }
  }

  fn bits_ones(&self, n: u32) -> String {
    if wide(n) { format!("ASL_ac_ones({n})") } else { format!("ASL_mask64({n}, ~UINT64_C(0))") }
  }

  fn bits_zero_extend(&self, m: u32, n: u32, a: &str) -> String {
    match (wide(m), wide(n)) {
      _ if m == n => a.to_owned(),
      (false, false) => a.to_owned(),
      (false, true) => format!("ASL_ac_bits_from_u64({n}, {a})"),
      _ => format!("ASL_ac_zero_extend({m}, {n}, {a})"),
    }
  }

  fn bits_sign_extend(&self, m: u32, n: u32, a: &str) -> String {
    if m == n { return a.to_owned() }
    if wide(m) || wide(n) {
      format!("ASL_ac_sign_extend({m}, {n}, {a})")
    } else {
      format!("ASL_sign_extend_bits64({m}, {n}, {a})")
    }
  }

  fn bits_concat(&self, m: u32, n: u32, a: &str, b: &str) -> String {
    if wide(m + n) {
      format!("ASL_ac_append({m}, {n}, {a}, {b})")
    } else {
      format!("(({a} << {n}) | {b})")
    }
  }

  fn bits_replicate(&self, m: u32, count: u32, a: &str) -> String {
    format!("ASL_ac_replicate({m}, {count}, {a})")
  }

  fn bits_in_mask(&self, n: u32, a: &str, bits: &BigInt, care: &BigInt) -> String {
    if wide(n) {
      format!("ASL_ac_in_mask({n}, {a}, \"{bits:x}\", \"{care:x}\")")
    } else {
      format!("(({a} & UINT64_C({care:#x})) == UINT64_C({bits:#x}))")
    }
  }

  fn cvt_bits_uint(&self, n: u32, a: &str) -> String {
    if wide(n) {
      format!("ASL_ac_bits_to_int({n}, {a})")
    } else {
      format!("ASL_ac_from_u64({a})")
    }
  }

  fn cvt_bits_sint(&self, n: u32, a: &str) -> String {
    format!("ASL_ac_bits_to_sint({n}, {a})")
  }

  fn cvt_int_bits(&self, n: u32, a: &str) -> String {
    if wide(n) {
      format!("ASL_ac_int_to_bits({n}, {a})")
    } else {
      format!("ASL_mask64({n}, ASL_ac_to_u64({a}))")
    }
  }

  fn get_slice(&self, n: u32, w: u32, x: &str, lo: &str) -> String {
    if wide(n) || wide(w) {
      format!("ASL_ac_get_slice({n}, {w}, {x}, {lo})")
    } else {
      format!("ASL_mask64({w}, {x} >> {lo})")
    }
  }

  fn set_slice(&self, n: u32, w: u32, x: &str, lo: &str, v: &str) -> String {
    if wide(n) || wide(w) {
      format!("ASL_ac_set_slice({n}, {w}, {x}, {lo}, {v})")
    } else {
      format!("ASL_set_slice64({n}, {w}, {x}, {lo}, {v})")
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
  fn print_int_dec(&self, a: &str) -> String { format!("ASL_ac_print_dec({a})") }
  fn print_int_hex(&self, a: &str) -> String { format!("ASL_ac_print_hex({a})") }

  fn print_bits_hex(&self, n: u32, a: &str) -> String {
    if wide(n) {
      format!("ASL_ac_print_bits_hex({n}, {a})")
    } else {
      format!("ASL_print_bits_hex64({n}, {a})")
    }
  }

  fn ffi_int_to_c(&self, a: &str) -> String { format!("ASL_ac_to_i64({a})") }
  fn ffi_c_to_int(&self, a: &str) -> String { format!("ASL_ac_from_i64({a})") }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn integers_live_in_the_library() {
    let rt = AcRuntime;
    assert_eq!(rt.ty_int(), "ASL_ac_int_t");
    assert!(rt.int_binop(IntOp::Fdiv, "a", "b").starts_with("ASL_ac_fdiv"));
    assert!(rt.lit_int(&BigInt::from(-5)).contains("\"-5\""));
  }

  #[test]
  fn narrow_bits_stay_in_machine_words() {
    let rt = AcRuntime;
    assert_eq!(rt.ty_bits(32), "uint64_t");
    assert_eq!(rt.bits_binop(BitsOp::Or, 32, "a", "b"), "(a | b)");
    assert_eq!(rt.ty_bits(80), "ASL_ac_bits_t");
  }
}
