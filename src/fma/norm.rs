//! The normaliser: an unpacked sum in, a rounded packed fp32 word out.

use super::Unpacked;
use crate::bits::{ibs, lsbs, lzd64, sbs};
use crate::nan::DEFAULT_NAN_FP32;
use crate::round::{RoundMode, round_up};

/// Normalise and round an unpacked value into a packed fp32 word.
///
/// `k` is the accumulator width: the significand's leading one is aligned to bit
/// `21 + k`, and guard/round-sticky are extracted at the 24-bit output boundary
/// below it. Only the four directed modes are legal here; the stochastic and
/// half-away modes never reach the accumulator in the hardware, and passing one is
/// a caller bug.
///
/// `denorm_promote_fix` selects between the two hardware generations' off-by-one
/// behaviours at the point where a denormal result's rounding carry promotes it to
/// normal: the fixed behaviour re-anchors the leading-one index when the exponent
/// lands on 0 and checks the carry at bit 23 there, the original checks bit 24
/// unconditionally. Both are bit-exact targets, selectable, and neither is
/// "correct".
///
/// `flush_denorm` replaces an underflowed result with signed zero, or with the
/// minimum normal when the rounding direction points at the result's own sign.
pub fn fp_convert(
  sum: Unpacked,
  sticky: bool,
  mode: RoundMode,
  k: u32,
  denorm_promote_fix: bool,
  flush_denorm: bool,
) -> u32 {
  assert!(
    matches!(
      mode,
      RoundMode::NearestEven | RoundMode::TowardZero | RoundMode::TowardPos | RoundMode::TowardNeg
    ),
    "the accumulator only rounds in the four directed modes, got {mode:?}",
  );

  // Fold the sticky below the lsb, take the magnitude, and drop the sticky again:
  // for a negative significand this borrows one ulp, which is exactly what the
  // two's-complement-to-sign-magnitude conversion owes the discarded bits.
  let mut sig = (((sum.sig as u64) << 1) as i64) | sticky as i64;
  if sig < 0 {
    sig = sig.wrapping_neg();
  }
  let sig = (sig as u64) >> 1;

  if sum.is_nan {
    return DEFAULT_NAN_FP32;
  }
  if sum.is_inf {
    return if sum.is_neg { 0xFF80_0000 } else { 0x7F80_0000 };
  }
  if sum.is_zero || sig == 0 {
    // All cancelled; the sticky and the mode pick between signed zero and the
    // unit-value escape codes.
    return if sticky && sum.is_neg && mode == RoundMode::TowardNeg {
      0xBF80_0000
    } else if sticky && !sum.is_neg && mode == RoundMode::TowardPos {
      0x3F80_0000
    } else if sum.is_neg {
      0x8000_0000
    } else {
      0
    };
  }

  // Normalise: align the leading one to bit 21 + k and move the exponent by the
  // distance travelled (the +1 re-anchors the exponent reference one bit up).
  let mut leading = lzd64(sig) as i64;
  let highest_bit = 21 + k as i64;
  let mut exp = sum.exp + 1;
  exp += (leading - highest_bit) as i32;

  if denorm_promote_fix && exp == 0 {
    leading += 1;
  }

  let guard = leading >= 24 && lsbs(sig, (leading - 24) as u64, (leading - 24) as u64) != 0;
  let round_sticky =
    leading >= 25 && (lsbs(sig, (leading - 25) as u64, 0) != 0 || sticky);
  let mut man = if leading >= 23 {
    lsbs(sig, leading as u64, (leading - 23) as u64) as u32
  } else {
    (lsbs(sig, leading as u64, 0) as u32) << (23 - leading)
  };

  man += round_up(mode, guard, round_sticky, sbs(man, 0, 0) == 1, sum.is_neg, 0, 0) as u32;

  if denorm_promote_fix {
    if (exp > 0 && sbs(man, 24, 24) == 1) || (exp == 0 && sbs(man, 23, 23) == 1) {
      exp += 1;
    }
  } else if sbs(man, 24, 24) == 1 {
    exp += 1;
  }

  if exp > 254 {
    if sum.is_neg { 0xFF80_0000 } else { 0x7F80_0000 }
  } else if exp < 1 {
    if flush_denorm {
      if sum.is_neg {
        if mode == RoundMode::TowardNeg { 0x8080_0000 } else { 0x8000_0000 }
      } else if mode == RoundMode::TowardPos {
        0x0080_0000
      } else {
        0
      }
    } else {
      // Denormal result: the mantissa was already rounded at the normal position;
      // shift it into place and pack with exponent 0.
      let shift = (1 - exp).min(31) as u32;
      man >>= shift;
      let mut out = 0;
      out = ibs(out, 31, 31, sum.is_neg as u32);
      out = ibs(out, 30, 23, 0);
      ibs(out, 22, 0, man)
    }
  } else {
    let mut out = 0;
    out = ibs(out, 31, 31, sum.is_neg as u32);
    out = ibs(out, 30, 23, exp as u32);
    ibs(out, 22, 0, man)
  }
}
