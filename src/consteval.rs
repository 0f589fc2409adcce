//! Constant folding over expression trees.
//!
//! Folding reduces literal-composed subtrees as far as possible while
//! preserving observable failure: division by zero, negative shifts, and
//! inexact `DIV` fold to nothing and stay in the tree for the runtime
//! checks to catch. Works both before resolution (on [`ExprKind::Binop`]
//! and [`ExprKind::Unop`]) and after (on [`ExprKind::TApply`] of the
//! primitive functions).

use num::{BigInt, Signed, ToPrimitive};
use crate::types::ast::*;
use crate::types::Ident;
use crate::types::entity::PrimFn;
use crate::value::{self, Bits, Value};

/// A source of values for named constants.
pub trait ConstSource {
  /// The value of a named constant, if known.
  fn lookup(&self, name: Ident) -> Option<Value>;
}

/// A source that resolves nothing; folding is then purely structural.
pub struct NoConsts;

impl ConstSource for NoConsts {
  fn lookup(&self, _: Ident) -> Option<Value> { None }
}

impl<F: Fn(Ident) -> Option<Value>> ConstSource for F {
  fn lookup(&self, name: Ident) -> Option<Value> { self(name) }
}

/// Fold an expression to a value, if it is constant.
pub fn fold(e: &Expr, consts: &impl ConstSource) -> Option<Value> {
  match &e.k {
    ExprKind::Lit(v) => Some(v.clone()),
    ExprKind::Var(x) => consts.lookup(*x),
    ExprKind::Unop(op, a) => fold_unop(*op, &fold(a, consts)?),
    ExprKind::Binop(op, a, b) => fold_binop(*op, &fold(a, consts)?, &fold(b, consts)?),
    ExprKind::If(arms, els) => {
      for (c, t) in arms {
        match fold(c, consts)? {
          Value::Bool(true) => return fold(t, consts),
          Value::Bool(false) => {}
          _ => return None,
        }
      }
      fold(els, consts)
    }
    ExprKind::Tuple(es) => {
      let vs = es.iter().map(|e| fold(e, consts)).collect::<Option<Vec<_>>>()?;
      Some(Value::Tuple(vs))
    }
    ExprKind::TApply(name, params, args, _) => {
      let f = PrimFn::from_symbol(name.name)?;
      let params = params.iter().map(|e| fold(e, consts)).collect::<Option<Vec<_>>>()?;
      let args = args.iter().map(|e| fold(e, consts)).collect::<Option<Vec<_>>>()?;
      fold_prim(f, &params, &args)
    }
    _ => None,
  }
}

/// Fold to an unbounded integer.
pub fn fold_int(e: &Expr, consts: &impl ConstSource) -> Option<BigInt> {
  match fold(e, consts)? {
    Value::Int(n) => Some(n),
    _ => None,
  }
}

/// Fold to a `u32` width.
pub fn fold_width(e: &Expr, consts: &impl ConstSource) -> Option<u32> {
  fold_int(e, consts)?.to_u32()
}

fn fold_unop(op: Unop, a: &Value) -> Option<Value> {
  Some(match (op, a) {
    (Unop::Negate, Value::Int(n)) => Value::Int(-n),
    (Unop::BoolNot, Value::Bool(b)) => Value::Bool(!b),
    (Unop::BitsNot, Value::Bits(b)) => Value::Bits(b.not()),
    _ => return None,
  })
}

fn fold_binop(op: Binop, a: &Value, b: &Value) -> Option<Value> {
  use Binop::*;
  if let (Value::Int(x), Value::Int(y)) = (a, b) {
    return Some(match op {
      Add => Value::Int(x + y),
      Sub => Value::Int(x - y),
      Mul => Value::Int(x * y),
      Div => Value::Int(value::exact_div(x, y)?),
      Divrm => Value::Int(value::fdiv(x, y)?),
      Mod => Value::Int(value::frem(x, y)?),
      Quot => Value::Int(value::zdiv(x, y)?),
      Rem => Value::Int(value::zrem(x, y)?),
      Pow => {
        if y.is_negative() { return None }
        Value::Int(num::pow::pow(x.clone(), y.to_usize()?))
      }
      ShiftL => Value::Int(value::shl(x, y)?),
      ShiftR => Value::Int(value::shr(x, y)?),
      Eq => Value::Bool(x == y),
      Ne => Value::Bool(x != y),
      Lt => Value::Bool(x < y),
      Le => Value::Bool(x <= y),
      Gt => Value::Bool(x > y),
      Ge => Value::Bool(x >= y),
      _ => return None,
    })
  }
  if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
    return Some(match op {
      BoolAnd => Value::Bool(*x && *y),
      BoolOr => Value::Bool(*x || *y),
      Implies => Value::Bool(!*x || *y),
      Iff | Eq => Value::Bool(x == y),
      Ne => Value::Bool(x != y),
      _ => return None,
    })
  }
  if let (Value::Bits(x), Value::Bits(y)) = (a, b) {
    if x.width != y.width && !matches!(op, Append) { return None }
    return Some(match op {
      Add => Value::Bits(x.add(y)),
      Sub => Value::Bits(x.sub(y)),
      BitAnd => Value::Bits(x.and(y)),
      BitOr => Value::Bits(x.or(y)),
      Eor => Value::Bits(x.xor(y)),
      Append => Value::Bits(x.concat(y)),
      Eq => Value::Bool(x == y),
      Ne => Value::Bool(x != y),
      _ => return None,
    })
  }
  if let (Value::Bits(x), Value::Int(y)) = (a, b) {
    let sh = y.to_u32()?;
    return Some(match op {
      ShiftL => Value::Bits(x.shl(sh)),
      ShiftR => Value::Bits(x.lsr(sh)),
      _ => return None,
    })
  }
  None
}

fn ints2(args: &[Value]) -> Option<(&BigInt, &BigInt)> {
  match args {
    [Value::Int(x), Value::Int(y)] => Some((x, y)),
    _ => None,
  }
}

fn fold_prim(f: PrimFn, params: &[Value], args: &[Value]) -> Option<Value> {
  use PrimFn::*;
  match f {
    AddInt | SubInt | MulInt | ExactDivInt | FdivInt | FremInt | ZdivInt |
    ZremInt | ShlInt | ShrInt | PowInt | EqInt | NeInt | LtInt | LeInt |
    GtInt | GeInt | MinInt | MaxInt | AlignInt | ModPow2Int => {
      let (x, y) = ints2(args)?;
      Some(match f {
        AddInt => Value::Int(x + y),
        SubInt => Value::Int(x - y),
        MulInt => Value::Int(x * y),
        ExactDivInt => Value::Int(value::exact_div(x, y)?),
        FdivInt => Value::Int(value::fdiv(x, y)?),
        FremInt => Value::Int(value::frem(x, y)?),
        ZdivInt => Value::Int(value::zdiv(x, y)?),
        ZremInt => Value::Int(value::zrem(x, y)?),
        ShlInt => Value::Int(value::shl(x, y)?),
        ShrInt => Value::Int(value::shr(x, y)?),
        PowInt => {
          if y.is_negative() { return None }
          Value::Int(num::pow::pow(x.clone(), y.to_usize()?))
        }
        AlignInt => Value::Int(value::align(x, y)?),
        ModPow2Int => Value::Int(value::mod_pow2(x, y)?),
        MinInt => Value::Int(x.min(y).clone()),
        MaxInt => Value::Int(x.max(y).clone()),
        EqInt => Value::Bool(x == y),
        NeInt => Value::Bool(x != y),
        LtInt => Value::Bool(x < y),
        LeInt => Value::Bool(x <= y),
        GtInt => Value::Bool(x > y),
        GeInt => Value::Bool(x >= y),
        _ => unreachable!(),
      })
    }
    NegInt => match args {
      [Value::Int(x)] => Some(Value::Int(-x)),
      _ => None,
    },
    Pow2Int => match args {
      [Value::Int(x)] => Some(Value::Int(value::shl(&BigInt::from(1), x)?)),
      _ => None,
    },
    IsPow2Int => match args {
      [Value::Int(x)] => Some(Value::Bool(value::is_pow2(x))),
      _ => None,
    },
    NotBool => match args {
      [Value::Bool(x)] => Some(Value::Bool(!x)),
      _ => None,
    },
    EqBool | NeBool | AndBool | OrBool | ImpliesBool | IffBool => match args {
      [Value::Bool(x), Value::Bool(y)] => Some(Value::Bool(match f {
        EqBool | IffBool => x == y,
        NeBool => x != y,
        AndBool => *x && *y,
        OrBool => *x || *y,
        ImpliesBool => !*x || *y,
        _ => unreachable!(),
      })),
      _ => None,
    },
    AddBits | SubBits | AndBits | OrBits | EorBits | EqBits | NeBits | AppendBits =>
      match args {
        [Value::Bits(x), Value::Bits(y)] => Some(match f {
          AddBits => Value::Bits(x.add(y)),
          SubBits => Value::Bits(x.sub(y)),
          AndBits => Value::Bits(x.and(y)),
          OrBits => Value::Bits(x.or(y)),
          EorBits => Value::Bits(x.xor(y)),
          AppendBits => Value::Bits(x.concat(y)),
          EqBits => Value::Bool(x == y),
          NeBits => Value::Bool(x != y),
          _ => unreachable!(),
        }),
        _ => None,
      },
    NotBits => match args {
      [Value::Bits(x)] => Some(Value::Bits(x.not())),
      _ => None,
    },
    LslBits | LsrBits | AsrBits => match args {
      [Value::Bits(x), Value::Int(d)] => {
        let d = d.to_u32()?;
        Some(Value::Bits(match f {
          LslBits => x.shl(d),
          LsrBits => x.lsr(d),
          AsrBits => x.asr(d),
          _ => unreachable!(),
        }))
      }
      _ => None,
    },
    ReplicateBits => match args {
      [Value::Bits(x), Value::Int(n)] => Some(Value::Bits(x.replicate(n.to_u32()?))),
      _ => None,
    },
    ZerosBits => match args {
      [Value::Int(n)] => Some(Value::Bits(Bits::zeros(n.to_u32()?))),
      _ => None,
    },
    OnesBits => match args {
      [Value::Int(n)] => Some(Value::Bits(Bits::ones(n.to_u32()?))),
      _ => None,
    },
    InMask | NotinMask => match args {
      [Value::Bits(x), Value::Mask(m)] if x.width == m.width => {
        let hit = x.in_mask(m);
        Some(Value::Bool(if f == InMask { hit } else { !hit }))
      }
      _ => None,
    },
    CvtBitsUInt => match args {
      [Value::Bits(x)] => Some(Value::Int(x.to_uint())),
      _ => None,
    },
    CvtBitsSInt => match args {
      [Value::Bits(x)] => Some(Value::Int(x.to_sint())),
      _ => None,
    },
    CvtIntBits => match args {
      [Value::Int(x), Value::Int(n)] => Some(Value::Bits(Bits::of_int(n.to_u32()?, x))),
      _ => None,
    },
    GetSlice => match args {
      [Value::Bits(x), Value::Int(lo), Value::Int(w)] => {
        let (lo, w) = (lo.to_u32()?, w.to_u32()?);
        (lo + w <= x.width).then(|| Value::Bits(x.slice(lo, w)))
      }
      _ => None,
    },
    SetSlice => match args {
      [Value::Bits(x), Value::Int(lo), Value::Int(w), Value::Bits(r)] => {
        let (lo, w) = (lo.to_u32()?, w.to_u32()?);
        (r.width == w && lo + w <= x.width).then(|| Value::Bits(x.set_slice(lo, r)))
      }
      _ => None,
    },
    EqStr | NeStr => match args {
      [Value::String(x), Value::String(y)] =>
        Some(Value::Bool((x == y) == (f == EqStr))),
      _ => None,
    },
    // `Zeros{..}` style wrappers have their width as a parameter.
    _ => {
      let _ = params;
      None
    }
  }
}

/// Rewrite an expression, replacing every foldable subtree by its literal.
pub struct Folder<'a, C: ConstSource> {
  /// The constant source consulted for variable references.
  pub consts: &'a C,
}

impl<C: ConstSource> crate::visitor::Visitor for Folder<'_, C> {
  fn visit_expr(&mut self, e: &Expr) -> crate::visitor::Action<Expr> {
    match fold(e, self.consts) {
      Some(v) => crate::visitor::Action::Change(ExprKind::Lit(v).at(e.span)),
      None => crate::visitor::Action::DoChildren,
    }
  }
}

/// Fold every foldable subtree of `e`, in place of the original nodes.
pub fn fold_rewrite(e: Expr, consts: &impl ConstSource) -> Expr {
  crate::visitor::visit_expr(&mut Folder { consts }, e)
}

#[cfg(test)]
mod tests {
  use super::*;
  use num::BigUint;

  fn b(op: Binop, a: Expr, b: Expr) -> Expr {
    ExprKind::Binop(op, Box::new(a), Box::new(b)).synth()
  }

  #[test]
  fn arithmetic_folds() {
    let e = b(Binop::Add, lit_int(2), b(Binop::Mul, lit_int(3), lit_int(4)));
    assert_eq!(fold(&e, &NoConsts), Some(Value::Int(14.into())));
  }

  #[test]
  fn division_by_zero_stays_unfolded() {
    let e = b(Binop::Divrm, lit_int(1), lit_int(0));
    assert_eq!(fold(&e, &NoConsts), None);
    let rewritten = fold_rewrite(e.clone(), &NoConsts);
    assert_eq!(rewritten, e, "the failing division must survive folding");
  }

  #[test]
  fn inexact_div_stays_unfolded() {
    assert_eq!(fold(&b(Binop::Div, lit_int(7), lit_int(2)), &NoConsts), None);
    assert_eq!(
      fold(&b(Binop::Div, lit_int(8), lit_int(2)), &NoConsts),
      Some(Value::Int(4.into()))
    );
  }

  #[test]
  fn constants_resolve_through_the_source() {
    let n = Ident::from_str("N");
    let src = move |x: Ident| (x == n).then(|| Value::Int(8.into()));
    let e = b(Binop::Add, var(n), lit_int(1));
    assert_eq!(fold(&e, &src), Some(Value::Int(9.into())));
  }

  #[test]
  fn prim_applications_fold() {
    let x = ExprKind::Lit(Value::Bits(Bits { width: 4, bits: BigUint::from(0b1100_u32) }))
      .synth();
    let y = ExprKind::Lit(Value::Bits(Bits { width: 4, bits: BigUint::from(0b1010_u32) }))
      .synth();
    let e = ExprKind::TApply(
      Ident::from_str("or_bits"),
      vec![lit_int(4)],
      vec![x, y],
      ThrowsTag::NoThrow,
    ).synth();
    assert_eq!(
      fold(&e, &NoConsts),
      Some(Value::Bits(Bits { width: 4, bits: BigUint::from(0b1110_u32) }))
    );
  }

  #[test]
  fn conditional_folds_through_true_arm() {
    let e = ExprKind::If(
      vec![(ExprKind::Lit(Value::Bool(false)).synth(), lit_int(1)),
           (ExprKind::Lit(Value::Bool(true)).synth(), lit_int(2))],
      Box::new(lit_int(3)),
    ).synth();
    assert_eq!(fold(&e, &NoConsts), Some(Value::Int(2.into())));
  }
}
