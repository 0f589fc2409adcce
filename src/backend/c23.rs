//! The C23 runtime variant: `_BitInt(N)` carries every width directly and
//! the C compiler provides the arbitrary-width arithmetic, so most
//! capabilities render as plain operators with casts.

use num::BigInt;
use crate::value::{Bits, SInt};
use super::{BitsOp, CmpOp, IntOp, Runtime, ShiftOp};

/// The C23 `_BitInt` runtime.
pub struct C23Runtime;

/// `_BitInt` widths must be at least 2 for signed and 1 for unsigned.
fn sbits(n: u32) -> u32 { n.max(2) }

impl C23Runtime {
  fn ubits(n: u32) -> String {
    format!("unsigned _BitInt({})", n.max(1))
  }
}

impl Runtime for C23Runtime {
  fn name(&self) -> &'static str { "c23" }

  fn file_header(&self) -> String {
    "#include <stdbool.h>\n\
     #include <stdint.h>\n\
     #include \"asl_runtime_c23.h\"\n".to_owned()
  }

  // The unbounded integer degrades to the widest fixed size the variant
  // supports; specifications needing more use the large-integer variant.
  fn ty_int(&self) -> String { "_BitInt(128)".to_owned() }

  fn ty_sint(&self, n: u32) -> String { format!("_BitInt({})", sbits(n)) }
  fn ty_bits(&self, n: u32) -> String { Self::ubits(n) }
  fn ty_ram(&self) -> String { "ASL_ram_t".to_owned() }

  fn lit_int(&self, v: &BigInt) -> String { format!("((_BitInt(128)){v}wb)") }

  fn lit_sint(&self, v: &SInt) -> String {
    format!("((_BitInt({})){}wb)", sbits(v.width), v.val)
  }

  fn lit_bits(&self, v: &Bits) -> String {
    format!("(({}){:#x}uwb)", Self::ubits(v.width), v.bits)
  }

  fn int_binop(&self, op: IntOp, a: &str, b: &str) -> String {
    match op {
      IntOp::Add => format!("({a} + {b})"),
      IntOp::Sub => format!("({a} - {b})"),
      IntOp::Mul => format!("({a} * {b})"),
      // C division truncates; the floor flavours need the helper.
      IntOp::Zdiv | IntOp::ExactDiv => format!("({a} / {b})"),
      IntOp::Zrem => format!("({a} % {b})"),
      _ => format!("ASL_{}_int({a}, {b})", op.tag()),
    }
  }

  fn int_neg(&self, a: &str) -> String { format!("(-{a})") }
  fn int_pow2(&self, a: &str) -> String { format!("(((_BitInt(128))1) << {a})") }
  fn int_is_pow2(&self, a: &str) -> String { format!("ASL_is_pow2_int({a})") }

  fn int_cmp(&self, op: CmpOp, a: &str, b: &str) -> String {
    format!("({a} {} {b})", op.c())
  }

  fn sint_binop(&self, op: IntOp, n: u32, a: &str, b: &str) -> String {
    let n = sbits(n);
    match op {
      IntOp::Add => format!("((_BitInt({n}))({a} + {b}))"),
      IntOp::Sub => format!("((_BitInt({n}))({a} - {b}))"),
      IntOp::Mul => format!("((_BitInt({n}))({a} * {b}))"),
      IntOp::Zdiv | IntOp::ExactDiv => format!("({a} / {b})"),
      IntOp::Zrem => format!("({a} % {b})"),
      _ => format!("ASL_{}_sintN({n}, {a}, {b})", op.tag()),
    }
  }

  fn sint_neg(&self, n: u32, a: &str) -> String {
    format!("((_BitInt({}))(-{a}))", sbits(n))
  }

  fn sint_cmp(&self, op: CmpOp, _n: u32, a: &str, b: &str) -> String {
    format!("({a} {} {b})", op.c())
  }

  fn sint_resize(&self, m: u32, n: u32, a: &str) -> String {
    if m == n { return a.to_owned() }
    format!("((_BitInt({})){a})", sbits(n))
  }

  fn cvt_int_sint(&self, n: u32, a: &str) -> String {
    format!("((_BitInt({})){a})", sbits(n))
  }

  fn cvt_sint_int(&self, _n: u32, a: &str) -> String {
    format!("((_BitInt(128)){a})")
  }

  fn bits_binop(&self, op: BitsOp, n: u32, a: &str, b: &str) -> String {
    let c = match op {
      BitsOp::Add => "+",
      BitsOp::Sub => "-",
      BitsOp::And => "&",
      BitsOp::Or => "|",
      BitsOp::Eor => "^",
    };
    format!("(({})({a} {c} {b}))", Self::ubits(n))
  }

  fn bits_not(&self, n: u32, a: &str) -> String {
    format!("(({})~{a})", Self::ubits(n))
  }

  fn bits_shift(&self, op: ShiftOp, n: u32, a: &str, d: &str) -> String {
    match op {
      ShiftOp::Lsl => format!("(({})({a} << {d}))", Self::ubits(n)),
      ShiftOp::Lsr => format!("({a} >> {d})"),
      ShiftOp::Asr => format!("(({})(((_BitInt({})){a}) >> {d}))", Self::ubits(n), sbits(n)),
    }
  }

  fn bits_cmp(&self, op: CmpOp, _n: u32, a: &str, b: &str) -> String {
    format!("({a} {} {b})", op.c())
  }

  fn bits_zeros(&self, n: u32) -> String { format!("(({})0uwb)", Self::ubits(n)) }

  fn bits_ones(&self, n: u32) -> String {
    format!("(({})~(({})0uwb))", Self::ubits(n), Self::ubits(n))
  }

  fn bits_zero_extend(&self, _m: u32, n: u32, a: &str) -> String {
    format!("(({}){a})", Self::ubits(n))
  }

  fn bits_sign_extend(&self, m: u32, n: u32, a: &str) -> String {
    format!("(({})((_BitInt({}))((_BitInt({})){a})))", Self::ubits(n), sbits(n), sbits(m))
  }

  fn bits_concat(&self, m: u32, n: u32, a: &str, b: &str) -> String {
    let t = Self::ubits(m + n);
    format!("(((({t}){a}) << {n}) | (({t}){b}))")
  }

  fn bits_replicate(&self, m: u32, count: u32, a: &str) -> String {
    format!("ASL_replicate_bits({m}, {count}, {a})")
  }

  fn bits_in_mask(&self, n: u32, a: &str, bits: &BigInt, care: &BigInt) -> String {
    let t = Self::ubits(n);
    format!("(({a} & (({t}){care:#x}uwb)) == (({t}){bits:#x}uwb))")
  }

  fn cvt_bits_uint(&self, _n: u32, a: &str) -> String {
    format!("((_BitInt(128)){a})")
  }

  fn cvt_bits_sint(&self, n: u32, a: &str) -> String {
    format!("((_BitInt(128))((_BitInt({})){a}))", sbits(n))
  }

  fn cvt_int_bits(&self, n: u32, a: &str) -> String {
    format!("(({}){a})", Self::ubits(n))
  }

  fn get_slice(&self, _n: u32, w: u32, x: &str, lo: &str) -> String {
    format!("(({})({x} >> {lo}))", Self::ubits(w))
  }

  fn set_slice(&self, n: u32, w: u32, x: &str, lo: &str, v: &str) -> String {
    let tn = Self::ubits(n);
    let tw = Self::ubits(w);
    format!(
      "(({x} & ~((({tn})(~(({tw})0uwb))) << {lo})) | ((({tn}){v}) << {lo}))"
    )
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
    format!("ASL_print_bits_hex({n}, (unsigned _BitInt(128)){a})")
  }

  fn ffi_int_to_c(&self, a: &str) -> String { format!("((int64_t){a})") }
  fn ffi_c_to_int(&self, a: &str) -> String { format!("((_BitInt(128)){a})") }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bitint_types_carry_the_width() {
    let rt = C23Runtime;
    assert_eq!(rt.ty_bits(17), "unsigned _BitInt(17)");
    assert_eq!(rt.ty_sint(8), "_BitInt(8)");
    // Signed _BitInt needs at least two bits.
    assert_eq!(rt.ty_sint(1), "_BitInt(2)");
  }

  #[test]
  fn arithmetic_defers_to_the_compiler() {
    let rt = C23Runtime;
    assert_eq!(rt.int_binop(IntOp::Add, "a", "b"), "(a + b)");
    assert_eq!(rt.bits_binop(BitsOp::Eor, 8, "a", "b"),
      "((unsigned _BitInt(8))(a ^ b))");
  }
}
