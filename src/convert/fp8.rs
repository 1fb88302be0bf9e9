//! fp8 ↔ fp32/fp19/fp16, with a run-time descriptor.
//!
//! The fp8 formats take their exponent/mantissa split, bias, and infinity/NaN
//! policy at run time (build descriptors with [`FpFormat::fp8`]). Unlike the
//! bf16/fp16/tf32 unit, the fp8 converter overflows to the policy's top code under
//! every rounding mode; only `clip` substitutes max-normal.

use super::{Exceptions, NarrowOpts, OverflowRule, narrow, widen};
use crate::format::FpFormat;
use crate::nan::DEFAULT_NAN_FP19;
use crate::round::RoundMode;

fn check_fp8(fmt: &FpFormat) {
  assert!(fmt.total_bits() == 8 && !fmt.unsigned, "not an fp8 descriptor: {fmt:?}");
}

/// Widen an fp8 value to fp32 (exact).
pub fn fp8_to_fp32(input: u8, fmt: &FpFormat, clip: bool) -> u32 {
  check_fp8(fmt);
  widen(input as u32, fmt, clip, true)
}

/// Widen an fp8 value to tf32 (left-aligned fp19). Identical to the fp32 widening
/// except that NaN produces the fp19 default NaN and clipping lands on the fp19
/// maximum normal.
pub fn fp8_to_fp19(input: u8, fmt: &FpFormat, clip: bool) -> u32 {
  check_fp8(fmt);
  let wide = widen(input as u32, fmt, false, true);
  if fmt.is_nan(input as u32) {
    return DEFAULT_NAN_FP19 << 13;
  }
  let mut v19 = wide >> 13;
  if clip && (v19 & 0x3FFFF) == 0x3FC00 {
    // ±∞ in fp19 terms: back off one code to ±max_normal.
    v19 -= 1;
  }
  v19 << 13
}

/// Widen an fp8 value to fp16. Exact whenever the value fits fp16's range (it does
/// for the hardware's bias choices); out-of-range magnitudes saturate like the
/// fp16 conversion does under nearest-even.
pub fn fp8_to_fp16(input: u8, fmt: &FpFormat, clip: bool) -> u16 {
  check_fp8(fmt);
  let wide = widen(input as u32, fmt, false, true);
  super::fp16::fp32_to_fp16(wide, RoundMode::NearestEven, 0, clip, false, true)
}

/// Narrow an fp32 value to fp8.
///
/// Returns the packed result and the inf/NaN/overflow exception flags the hardware
/// surfaces to the caller.
pub fn fp32_to_fp8(
  input: u32,
  fmt: &FpFormat,
  mode: RoundMode,
  lfsr: u32,
  ftz_out: bool,
  clip: bool,
  clip_inf_input: bool,
  stochastic_ftz: bool,
) -> (u8, Exceptions) {
  check_fp8(fmt);
  let opts = NarrowOpts {
    clip,
    clip_inf_input,
    ftz_out,
    stochastic_ftz,
    overflow: OverflowRule::AlwaysTop,
  };
  let (out, exc) = narrow(input, fmt, mode, lfsr, opts);
  (out as u8, exc)
}

/// Narrow an fp16 value to fp8 e4m3 with bias 15. Single overall rounding: the
/// fp16 widening is exact.
pub fn fp16_to_fp8_143_bias15(
  input: u16,
  mode: RoundMode,
  lfsr: u32,
  clip: bool,
  ftz_out: bool,
  clip_inf_input: bool,
) -> (u8, Exceptions) {
  let fmt = FpFormat::fp8(4, 3, 15, crate::format::InfNanMode::IeeeLike);
  let wide = super::fp16::fp16_to_fp32(input, false);
  fp32_to_fp8(wide, &fmt, mode, lfsr, ftz_out, clip, clip_inf_input, false)
}

/// Narrow an fp16 value to fp8 e5m2 with bias 15.
pub fn fp16_to_fp8_152(
  input: u16,
  mode: RoundMode,
  lfsr: u32,
  clip: bool,
  ftz_out: bool,
  clip_inf_input: bool,
) -> (u8, Exceptions) {
  let fmt = FpFormat::fp8(5, 2, 15, crate::format::InfNanMode::IeeeLike);
  let wide = super::fp16::fp16_to_fp32(input, false);
  fp32_to_fp8(wide, &fmt, mode, lfsr, ftz_out, clip, clip_inf_input, false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::convert::test_oracle::rational_of;
  use crate::format::InfNanMode;

  const NE: RoundMode = RoundMode::NearestEven;
  const RZ: RoundMode = RoundMode::TowardZero;

  fn e4m3() -> FpFormat {
    FpFormat::fp8(4, 3, 7, InfNanMode::IeeeLike)
  }

  fn e5m2() -> FpFormat {
    FpFormat::fp8(5, 2, 15, InfNanMode::IeeeLike)
  }

  /// Widening is exact for every pattern, split, and a spread of biases.
  #[test]
  fn widen_is_exact_all_patterns() {
    for (ew, mw) in [(2, 5), (3, 4), (4, 3), (5, 2)] {
      for bias in [1, 7, 15, 31] {
        let fmt = FpFormat::fp8(ew, mw, bias, InfNanMode::IeeeLike);
        for bits in 0 ..= u8::MAX {
          if fmt.is_nan(bits as u32) || fmt.is_inf(bits as u32) {
            continue;
          }
          assert_eq!(
            rational_of(bits as u32, &fmt),
            rational_of(fp8_to_fp32(bits, &fmt, false), &FpFormat::FP32),
            "e{ew}m{mw} bias {bias}, {bits:#04x}",
          );
        }
      }
    }
  }

  #[test]
  fn roundtrip_exhaustive() {
    for fmt in [e4m3(), e5m2(), FpFormat::fp8(4, 3, 7, InfNanMode::Collapsed)] {
      for bits in 0 ..= u8::MAX {
        if fmt.is_nan(bits as u32) {
          continue;
        }
        let wide = fp8_to_fp32(bits, &fmt, false);
        let (back, _) = fp32_to_fp8(wide, &fmt, NE, 0, false, false, true, false);
        assert_eq!(back, bits, "{:?} {bits:#04x}", fmt);
      }
    }
  }

  /// A finite fp32 whose unbiased exponent exceeds the target's maximum converts
  /// to the fp8 infinity under every rounding mode, including round-toward-zero.
  #[test]
  fn overflow_to_infinity_under_rz() {
    // 256.1 overflows e4m3 bias 15, whose largest finite value is 1.875 × 2^-1.
    let fmt = FpFormat::fp8(4, 3, 15, InfNanMode::IeeeLike);
    let (out, exc) = fp32_to_fp8(256.1f32.to_bits(), &fmt, RZ, 0, false, false, true, false);
    assert_eq!(out, fmt.inf_bits(false) as u8);
    assert!(exc.overflow && exc.inf && !exc.nan);

    // Same with a value above e5m2 bias 15's max (57344).
    let (out, exc) = fp32_to_fp8(1.0e6f32.to_bits(), &e5m2(), RZ, 0, false, false, true, false);
    assert_eq!(out, 0x7C);
    assert!(exc.overflow && exc.inf);

    // The clip flag opts back into saturation.
    let (out, _) = fp32_to_fp8(1.0e6f32.to_bits(), &e5m2(), RZ, 0, false, true, true, false);
    assert_eq!(out, 0x7B); // +max normal
  }

  #[test]
  fn collapsed_policy_overflow_and_specials() {
    let fmt = FpFormat::fp8(4, 3, 7, InfNanMode::Collapsed);
    // Overflow produces the NaN code; there is no infinity.
    let (out, exc) = fp32_to_fp8(1.0e6f32.to_bits(), &fmt, NE, 0, false, false, true, false);
    assert_eq!(out, 0x7F);
    assert!(exc.overflow);
    // 448 = 1.75 × 2^8 is the max normal (0x7E) and must not round onto the NaN
    // code.
    let (out, exc) = fp32_to_fp8(448.0f32.to_bits(), &fmt, NE, 0, false, false, true, false);
    assert_eq!(out, 0x7E);
    assert!(!exc.overflow);
    // 464 is the midpoint between 448 and the would-be 480 code: overflow.
    let (out, exc) = fp32_to_fp8(464.1f32.to_bits(), &fmt, NE, 0, false, false, true, false);
    assert_eq!(out, 0x7F);
    assert!(exc.overflow);
    // ∞ input maps to the NaN code too, with the inf flag.
    let (out, exc) = fp32_to_fp8(f32::INFINITY.to_bits(), &fmt, NE, 0, false, false, true, false);
    assert_eq!(out, 0x7F);
    assert!(exc.inf && !exc.overflow);
  }

  #[test]
  fn no_inf_nan_policy_saturates() {
    let fmt = FpFormat::fp8(4, 3, 7, InfNanMode::NoInfNan);
    // All-ones is the max normal: 1.875 × 2^8 = 480.
    assert_eq!(rational_of(0x7F, &fmt), rational_of(480.0f32.to_bits(), &FpFormat::FP32));
    let (out, exc) = fp32_to_fp8(1.0e6f32.to_bits(), &fmt, NE, 0, false, false, true, false);
    assert_eq!(out, 0x7F);
    assert!(exc.overflow && !exc.inf);
    let (out, exc) = fp32_to_fp8(f32::NAN.to_bits(), &fmt, NE, 0, false, false, true, false);
    assert_eq!(out, 0x7F);
    assert!(exc.nan);
  }

  #[test]
  fn exceptions_for_nan_and_inf() {
    let (out, exc) = fp32_to_fp8(f32::NAN.to_bits(), &e4m3(), NE, 0, false, false, true, false);
    assert_eq!(out, 0x7F);
    assert_eq!(exc, Exceptions { nan: true, inf: false, overflow: false });
    let (out, exc) =
      fp32_to_fp8(f32::NEG_INFINITY.to_bits(), &e4m3(), NE, 0, false, false, true, false);
    assert_eq!(out, 0xF8);
    assert_eq!(exc, Exceptions { nan: false, inf: true, overflow: false });
  }

  #[test]
  fn stochastic_ftz_only_flushes_stochastic_modes() {
    // 2^-8 is an exact e4m3 (bias 7) denormal. Under a deterministic mode the
    // stochastic-only flush leaves it alone…
    let denorm = 2.0f32.powi(-8).to_bits();
    let (out, _) = fp32_to_fp8(denorm, &e4m3(), NE, 1, false, false, true, true);
    assert_eq!(out, 0x02);
    // …under stochastic rounding it flushes to signed zero.
    let (out, _) = fp32_to_fp8(denorm, &e4m3(), RoundMode::Stochastic, 1, false, false, true, true);
    assert_eq!(out, 0x00);
    let (out, _) = fp32_to_fp8(
      denorm | 0x8000_0000,
      &e4m3(),
      RoundMode::Stochastic,
      1,
      false,
      false,
      true,
      true,
    );
    assert_eq!(out, 0x80);
  }

  #[test]
  fn fp16_to_fp8_paths() {
    // fp16 1.0 → e4m3 bias 15: 1.0 has unbiased exponent 0, above bias-15's max
    // finite exponent (-1): overflows to ∞.
    let (out, exc) = fp16_to_fp8_143_bias15(0x3C00, RZ, 0, false, false, true);
    assert_eq!(out, 0x78);
    assert!(exc.overflow);
    // fp16 0.25 = 1.0 × 2^-2 → e4m3 bias 15: exponent field -2 + 15 = 13.
    let (out, exc) = fp16_to_fp8_143_bias15(0x3400, NE, 0, false, false, true);
    assert_eq!(out, 13 << 3);
    assert!(!exc.overflow);
    // fp16 1.0 → e5m2 bias 15 is exactly representable.
    let (out, _) = fp16_to_fp8_152(0x3C00, NE, 0, false, false, true);
    assert_eq!(out, 15 << 2);
  }

  #[test]
  fn fp8_to_fp19_nan_and_clip() {
    let fmt = e5m2();
    assert_eq!(fp8_to_fp19(0x7F, &fmt, false), DEFAULT_NAN_FP19 << 13);
    // ∞ widens to fp19 ∞; with clip it lands on the fp19 max normal.
    assert_eq!(fp8_to_fp19(0x7C, &fmt, false), 0x7F80_0000);
    assert_eq!(fp8_to_fp19(0x7C, &fmt, true), 0x7F7F_E000);
    // Finite values match the fp32 widening.
    assert_eq!(fp8_to_fp19(0x3C, &fmt, false), fp8_to_fp32(0x3C, &fmt, false));
  }

  #[test]
  fn fp8_to_fp16_exact() {
    let fmt = e4m3();
    for bits in 0 ..= u8::MAX {
      if fmt.is_nan(bits as u32) || fmt.is_inf(bits as u32) {
        continue;
      }
      let via16 = fp8_to_fp16(bits, &fmt, false);
      assert_eq!(
        rational_of(via16 as u32, &FpFormat::FP16),
        rational_of(bits as u32, &fmt),
        "{bits:#04x}",
      );
    }
  }
}
