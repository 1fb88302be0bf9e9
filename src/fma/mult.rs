//! The lane multiplier: fp32-encoded operands in, unpacked 2.46 product out.

use super::Unpacked;
use crate::bits::{libs, sbs};
use crate::format::{is_inf_fp32, is_nan_fp32};

/// Behaviour flags of the lane multiplier.
///
/// The emulation flags model a hardware multiplier that computes wide products by
/// summing partial products of operand slices: each partial lane sees only a slice
/// of each mantissa, and the implicit leading one is injected only for the slices
/// that carry it, per a fixed table indexed by the lane's position in its group
/// (`emul_part`). Two table generations exist; `gen3` selects the eight-partial
/// variant used for full fp32 emulation.
#[derive(Clone, Copy, Debug, Default)]
pub struct MultFlags {
  /// An emulation decomposition is active for this lane.
  pub emul: bool,
  /// Index of this lane within its decomposition group.
  pub emul_part: u32,
  /// Pre-shift both operands to a common artificial minimum exponent (field 113,
  /// i.e. bias-15 alignment) before multiplying. Used for the fp8/fp16 input
  /// paths.
  pub denormalize_bias15: bool,
  /// The lane belongs to an fp16/tf32-style four-partial decomposition.
  pub fp16_emul: bool,
  /// Second-generation partial tables and group sizes.
  pub gen3: bool,
  /// Treat denormal operands as zero.
  pub flush_denorm: bool,
}

/// Multiply two fp32-encoded operands into an unpacked product.
///
/// The zero/denormal status of each operand is passed in rather than recomputed:
/// the tree forces it to be uniform across decomposition groups, so it may
/// disagree with the raw bit pattern.
pub fn fp_mult(
  a: u32,
  b: u32,
  a_is_zero: bool,
  b_is_zero: bool,
  a_is_dnorm: bool,
  b_is_dnorm: bool,
  f: &MultFlags,
) -> Unpacked {
  if is_nan_fp32(a) || is_nan_fp32(b) || (is_inf_fp32(a) && b_is_zero) || (is_inf_fp32(b) && a_is_zero)
  {
    return Unpacked::NAN;
  }
  if is_inf_fp32(a) || is_inf_fp32(b) {
    return Unpacked::inf((a ^ b) >> 31 == 1);
  }
  if a_is_zero || b_is_zero || (a_is_dnorm && f.flush_denorm) || (b_is_dnorm && f.flush_denorm) {
    return Unpacked::zero_product((a ^ b) >> 31 == 1);
  }

  let is_neg = (a ^ b) >> 31 == 1;
  let mut a_exp = sbs(a, 30, 23) as i32;
  let mut b_exp = sbs(b, 30, 23) as i32;
  let mut denorm_shift_a = 0u32;
  let mut denorm_shift_b = 0u32;
  if f.denormalize_bias15 {
    // fp8/fp16 inputs: re-denormalise below the bias-15 minimum so the multiplier
    // sees the same operand alignment the narrow input port produces.
    if a_exp < 113 {
      denorm_shift_a = (113 - a_exp) as u32;
      a_exp = 113;
    }
    if b_exp < 113 {
      denorm_shift_b = (113 - b_exp) as u32;
      b_exp = 113;
    }
  }

  let (mut a_leading_1, mut b_leading_1);
  if f.fp16_emul || f.emul {
    if f.gen3 && !f.fp16_emul {
      a_leading_1 = !f.emul || matches!(f.emul_part, 5 | 6 | 7);
      b_leading_1 = !f.emul || matches!(f.emul_part, 1 | 4 | 7);
    } else {
      a_leading_1 = !f.emul || matches!(f.emul_part, 2 | 3);
      b_leading_1 = !f.emul || matches!(f.emul_part, 1 | 3);
    }
    if !f.flush_denorm {
      if a_exp == 0 {
        a_leading_1 = false;
      }
      if b_exp == 0 {
        b_leading_1 = false;
      }
    }
  } else if !f.flush_denorm {
    a_leading_1 = a_exp != 0;
    b_leading_1 = b_exp != 0;
  } else {
    a_leading_1 = true;
    b_leading_1 = true;
  }

  if !f.flush_denorm {
    if a_exp == 0 && a_is_dnorm {
      a_exp = 1;
    }
    if b_exp == 0 && b_is_dnorm {
      b_exp = 1;
    }
  }

  let exp = a_exp + b_exp - 127;

  let mut a_sig = libs(sbs(a, 22, 0) as u64, 23, 23, a_leading_1 as u64) as i64;
  let mut b_sig = libs(sbs(b, 22, 0) as u64, 23, 23, b_leading_1 as u64) as i64;
  if f.denormalize_bias15 {
    a_sig >>= denorm_shift_a.min(63);
    b_sig >>= denorm_shift_b.min(63);
  }

  Unpacked { exp, sig: a_sig * b_sig, is_zero: false, is_inf: false, is_nan: false, is_neg }
}
