//! tf32 / fp19 ↔ fp32, and the variable-mantissa fp18x narrowing.
//!
//! fp19 is a 19-bit format (1 sign, 8 exponent, 10 mantissa). [`fp32_to_fp19`]
//! returns the right-aligned 19-bit encoding; [`fp32_to_tf32`] returns the same
//! value stored left-shifted into a 32-bit word (i.e. an fp32 pattern with the low
//! 13 mantissa bits clear), which is the form the multiply-add tree consumes.

use super::{NarrowOpts, narrow};
use crate::format::{FpFormat, InfNanMode, is_inf_fp32};
use crate::round::RoundMode;

/// Narrow an fp32 value to fp19, right-aligned in the low 19 bits.
pub fn fp32_to_fp19(
  input: u32,
  mode: RoundMode,
  lfsr: u32,
  clip: bool,
  clip_inf_input: bool,
) -> u32 {
  narrow(input, &FpFormat::TF32, mode, lfsr, NarrowOpts::mode_aware(clip, clip_inf_input, false)).0
}

/// Narrow an fp32 value to tf32: the fp19 encoding stored left-shifted by 13, so
/// the result reads as an fp32 bit pattern with a 10-bit mantissa.
pub fn fp32_to_tf32(
  input: u32,
  mode: RoundMode,
  lfsr: u32,
  clip: bool,
  clip_inf_input: bool,
) -> u32 {
  fp32_to_fp19(input, mode, lfsr, clip, clip_inf_input) << 13
}

/// Widen a (left-aligned) tf32 value to fp32: drop the unused low bits.
#[inline]
pub fn tf32_to_fp32(input: u32, clip: bool) -> u32 {
  let mut out = input & 0xFFFF_E000;
  if clip && is_inf_fp32(out) {
    out -= 1; // ±max_normal
  }
  out
}

/// Narrow an fp32 value to an e8 format with a caller-chosen mantissa width
/// (1 ..= 10 bits), right-aligned in the low `9 + man_width` bits.
pub fn fp32_to_fp18x(
  input: u32,
  mode: RoundMode,
  lfsr: u32,
  clip: bool,
  clip_inf_input: bool,
  man_width: u32,
) -> u32 {
  assert!((1 ..= 10).contains(&man_width), "fp18x mantissa width {man_width} out of range");
  let fmt = FpFormat { man_width, ..FpFormat::TF32 };
  narrow(input, &fmt, mode, lfsr, NarrowOpts::mode_aware(clip, clip_inf_input, false)).0
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::nan::DEFAULT_NAN_FP19;

  const NE: RoundMode = RoundMode::NearestEven;

  #[test]
  fn fp19_known_values() {
    // 0_01111111_0000000000, right-aligned.
    assert_eq!(fp32_to_fp19(1.0f32.to_bits(), NE, 0, false, true), 0x1FC00);
    assert_eq!(fp32_to_tf32(1.0f32.to_bits(), NE, 0, false, true), 0x3F80_0000);
    assert_eq!(fp32_to_tf32((-2.0f32).to_bits(), NE, 0, false, true), 0xC000_0000);
    assert_eq!(fp32_to_fp19(f32::NAN.to_bits(), NE, 0, false, true), DEFAULT_NAN_FP19);
  }

  #[test]
  fn tf32_is_fp32_truncated_to_10_mantissa_bits() {
    for bits in [0x3F80_0000u32, 0x3F80_1FFF, 0x4049_0FDB, 0xC049_0FDB, 0x0000_0001] {
      let out = fp32_to_tf32(bits, RoundMode::TowardZero, 0, false, true);
      assert_eq!(out & 0x1FFF, 0);
      assert_eq!(out & 0xFFFF_E000, bits & 0xFFFF_E000);
    }
  }

  #[test]
  fn tf32_roundtrips_through_fp32() {
    for bits in [0x3F80_0000u32, 0x4049_0000, 0x8000_2000, 0x7F80_0000] {
      let t = fp32_to_tf32(bits, NE, 0, false, true);
      assert_eq!(fp32_to_tf32(tf32_to_fp32(t, false), NE, 0, false, true), t);
    }
  }

  #[test]
  fn tf32_clip() {
    assert_eq!(tf32_to_fp32(0x7F80_0000, true), 0x7F7F_FFFF);
    assert_eq!(tf32_to_fp32(0x7F80_0000, false), 0x7F80_0000);
  }

  #[test]
  fn fp18x_mantissa_width() {
    // man_width 9: 1.0 encodes as 0_01111111_000000000.
    assert_eq!(fp32_to_fp18x(1.0f32.to_bits(), NE, 0, false, true, 9), 0x7F << 9);
    // Rounding happens at the chosen width: 1 + 2^-10 at width 9 is a tie to even.
    let just_above_one = 0x3F80_2000u32;
    assert_eq!(fp32_to_fp18x(just_above_one, NE, 0, false, true, 9), 0x7F << 9);
    assert_eq!(fp32_to_fp18x(just_above_one, RoundMode::TowardPos, 0, false, true, 9), (0x7F << 9) | 1);
  }

  #[test]
  #[should_panic(expected = "out of range")]
  fn fp18x_rejects_zero_width() {
    let _ = fp32_to_fp18x(0, NE, 0, false, true, 0);
  }
}
