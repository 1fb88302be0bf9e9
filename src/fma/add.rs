//! The aligner/adder: two unpacked values in, their signed sum out.

use super::Unpacked;
use crate::round::RoundMode;

/// Align and add two unpacked values.
///
/// The smaller-exponent operand is shifted right to the larger exponent (shift
/// clamped to 62 so a pathological gap cannot become an undefined shift), and the
/// significands are added as signed 64-bit integers. Bits shifted out are folded
/// into the returned sticky, together with the incoming per-operand stickies.
///
/// Special cases: any NaN, or two infinities of opposite sign, give NaN; a single
/// infinity wins; the sign of an all-zero sum follows the IEEE rule for the
/// rounding direction (only round-toward-−∞ produces −0 from mixed signs).
pub fn fp_add(
  a: Unpacked,
  a_sticky: bool,
  b: Unpacked,
  b_sticky: bool,
  round_mode: RoundMode,
) -> (Unpacked, bool) {
  if a.is_nan || b.is_nan || (a.is_inf && b.is_inf && a.is_neg != b.is_neg) {
    return (Unpacked::NAN, false);
  }
  if a.is_inf || b.is_inf {
    return (Unpacked::inf(if a.is_inf { a.is_neg } else { b.is_neg }), false);
  }
  if a.is_zero && b.is_zero {
    let is_neg = if round_mode == RoundMode::TowardNeg {
      a.is_neg || b.is_neg
    } else {
      a.is_neg && b.is_neg
    };
    return (
      Unpacked { exp: 0, sig: 0, is_zero: true, is_inf: false, is_nan: false, is_neg },
      false,
    );
  }
  if a.is_zero {
    return (Unpacked { is_zero: false, ..b }, false);
  }
  if b.is_zero {
    return (Unpacked { is_zero: false, ..a }, false);
  }

  let max_exp = a.exp.max(b.exp);
  let a_diff = (max_exp - a.exp).min(62) as u32;
  let a_shifted = a.sig >> a_diff;
  let sticky_a = a_sticky || a.sig != a_shifted << a_diff;
  let b_diff = (max_exp - b.exp).min(62) as u32;
  let b_shifted = b.sig >> b_diff;
  let sticky_b = b_sticky || b.sig != b_shifted << b_diff;

  let sig = a_shifted.wrapping_add(b_shifted);
  let (is_zero, is_neg) = if sig == 0 {
    let is_neg = if round_mode == RoundMode::TowardNeg {
      a.is_neg || b.is_neg
    } else {
      a.is_neg && b.is_neg
    };
    (true, is_neg)
  } else {
    (false, sig < 0)
  };

  (
    Unpacked { exp: max_exp, sig, is_zero, is_inf: false, is_nan: false, is_neg },
    sticky_a || sticky_b,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fma::{MultFlags, fp_mult};

  fn unpack(x: u32) -> Unpacked {
    let fmt = crate::format::FpFormat::FP32;
    fp_mult(
      x,
      crate::unit::UNIT_FP32,
      fmt.is_zero(x),
      false,
      fmt.is_denormal(x),
      false,
      &MultFlags { flush_denorm: false, ..MultFlags::default() },
    )
  }

  const NE: RoundMode = RoundMode::NearestEven;
  const NINF: RoundMode = RoundMode::TowardNeg;

  #[test]
  fn sign_of_zero_law() {
    // (+0) + (−0) is −0 only under round-toward-−∞.
    let (r, _) = fp_add(unpack(0x0000_0000), false, unpack(0x8000_0000), false, NINF);
    assert!(r.is_zero && r.is_neg);
    let (r, _) = fp_add(unpack(0x0000_0000), false, unpack(0x8000_0000), false, NE);
    assert!(r.is_zero && !r.is_neg);
    // (−0) + (−0) is −0 under every mode.
    let (r, _) = fp_add(unpack(0x8000_0000), false, unpack(0x8000_0000), false, NE);
    assert!(r.is_zero && r.is_neg);
  }

  #[test]
  fn cancellation_uses_the_zero_sign_rule() {
    // x + (−x) cancels exactly: the result is zero with the mode's zero sign.
    let x = unpack(3.5f32.to_bits());
    let y = unpack((-3.5f32).to_bits());
    let (r, sticky) = fp_add(x, false, y, false, NE);
    assert!(r.is_zero && !r.is_neg && !sticky);
    let (r, _) = fp_add(x, false, y, false, NINF);
    assert!(r.is_zero && r.is_neg);
  }

  #[test]
  fn alignment_tracks_sticky() {
    // 2^40 + (1 + 2^-23): the small operand's low mantissa bits are shifted out.
    let big = unpack(2.0f32.powi(40).to_bits());
    let one_eps = unpack(0x3F80_0001);
    let (r, sticky) = fp_add(big, false, one_eps, false, NE);
    assert!(sticky);
    assert_eq!(r.exp, big.exp);
    // The surviving part of the small operand is its top bits.
    assert_eq!(r.sig, big.sig + (one_eps.sig >> 40));
  }

  #[test]
  fn infinities() {
    let pinf = Unpacked::inf(false);
    let ninf = Unpacked::inf(true);
    let x = unpack(1.0f32.to_bits());
    assert!(fp_add(pinf, false, x, false, NE).0.is_inf);
    assert!(fp_add(x, false, ninf, false, NE).0.is_neg);
    assert!(fp_add(pinf, false, ninf, false, NE).0.is_nan);
    assert!(fp_add(Unpacked::NAN, false, x, false, NE).0.is_nan);
  }

  #[test]
  fn zero_passthrough() {
    let x = unpack(42.0f32.to_bits());
    let z = Unpacked::zero_product(true);
    let (r, sticky) = fp_add(z, false, x, false, NE);
    assert_eq!((r.exp, r.sig, r.is_neg), (x.exp, x.sig, x.is_neg));
    assert!(!sticky);
    let (r, _) = fp_add(x, false, z, false, NE);
    assert_eq!((r.exp, r.sig), (x.exp, x.sig));
  }

  #[test]
  fn negative_sum_is_flagged() {
    let x = unpack(1.0f32.to_bits());
    let y = unpack((-2.0f32).to_bits());
    let (r, _) = fp_add(x, false, y, false, NE);
    assert!(r.is_neg && r.sig < 0);
  }
}
