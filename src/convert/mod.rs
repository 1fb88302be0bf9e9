//! Bit-exact conversions between fp32 and the narrower/alternate formats.
//!
//! Both directions share one engine parameterised by the [`FpFormat`] descriptor:
//! [`widen`] renormalises a narrow value into fp32 (always exact in value, with NaN
//! payloads deliberately collapsed to the canonical quiet NaN), and [`narrow`]
//! rounds an fp32 value into the target format, with guard/round/sticky extraction,
//! stochastic rounding from an external random word, overflow and underflow per the
//! format's infinity/NaN policy, and the clip / output-flush post-steps.
//!
//! The per-format entry points in the submodules are thin wrappers supplying the
//! descriptor and the overflow rule of the hardware unit they model.

use crate::bits::{lzd, sbs};
use crate::format::{FpFormat, InfNanMode, is_inf_fp32, is_denorm_fp32, is_nan_fp32, is_zero_fp32};
use crate::nan::DEFAULT_NAN_FP32;
use crate::round::{RoundMode, round_up};

pub mod bf16;
pub mod fp16;
pub mod tf32;
pub mod fp8;
pub mod cfp16;

/// Exception flags surfaced by the fp8/cfp16 conversions. Booleans only; nothing is
/// ever thrown or returned as an error.
#[derive(Clone, Copy, Debug, Default)]
#[derive(PartialEq, Eq)]
pub struct Exceptions {
  /// The input was ±∞, or the result overflowed to ∞.
  pub inf: bool,
  /// The input was NaN.
  pub nan: bool,
  /// The finite input exceeded the target's finite range.
  pub overflow: bool,
}

/// How exponent overflow of a finite input resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OverflowRule {
  /// Round-toward-zero, and rounding toward the side opposite the value's sign,
  /// saturate at the maximum finite magnitude; every other mode produces the
  /// policy's top code. The bf16/fp16/tf32 unit behaves this way.
  ModeAware,
  /// Every rounding mode produces the policy's top code (∞, the all-ones maximum,
  /// or NaN, depending on the policy); only the `clip` post-step can substitute
  /// max-normal. The fp8/cfp16 unit behaves this way.
  AlwaysTop,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct NarrowOpts {
  /// Substitute max-normal for a result that lands on ∞.
  pub clip: bool,
  /// Apply `clip` to genuinely infinite inputs as well.
  pub clip_inf_input: bool,
  /// Flush a denormal result to signed zero (or to min-normal where the rounding
  /// direction demands it).
  pub ftz_out: bool,
  /// As `ftz_out`, but only under the stochastic rounding modes.
  pub stochastic_ftz: bool,
  pub overflow: OverflowRule,
}

impl NarrowOpts {
  pub(crate) fn mode_aware(clip: bool, clip_inf_input: bool, ftz_out: bool) -> Self {
    Self { clip, clip_inf_input, ftz_out, stochastic_ftz: false, overflow: OverflowRule::ModeAware }
  }
}

/// The top code produced for NaN inputs, ∞ inputs, and (under
/// [`OverflowRule::AlwaysTop`]) overflow, per policy.
fn top_code(fmt: &FpFormat, neg: bool, exc: &mut Exceptions) -> u32 {
  match fmt.inf_nan {
    InfNanMode::IeeeLike => {
      exc.inf = true;
      fmt.inf_bits(neg)
    }
    InfNanMode::NoInfNan => fmt.max_normal_bits(neg),
    InfNanMode::Collapsed => fmt.default_nan(),
  }
}

/// Convert a narrow-format value to fp32. Exact in value; NaNs collapse to the
/// canonical positive quiet NaN regardless of payload; denormals renormalise.
///
/// The optional clip replaces an infinite *result* with the largest finite fp32
/// (by subtracting 1 from the bit pattern), applied when the input was finite or
/// when `clip_inf_input` also covers genuine infinities.
pub(crate) fn widen(bits: u32, fmt: &FpFormat, clip: bool, clip_inf_input: bool) -> u32 {
  let neg = fmt.is_negative(bits);
  let mut input_finite = true;
  let mut out = if fmt.is_zero(bits) {
    (neg as u32) << 31
  } else if fmt.is_nan(bits) {
    input_finite = false;
    DEFAULT_NAN_FP32
  } else if fmt.is_inf(bits) {
    input_finite = false;
    ((neg as u32) << 31) | 0x7F80_0000
  } else {
    let mut man = fmt.man_field(bits);
    let mut unbiased = fmt.exp_field(bits) as i32 - fmt.bias;
    if fmt.exp_field(bits) == 0 {
      // Denormal: left-shift until the leading one reaches the implicit-bit
      // position (man_width), adjusting the exponent to compensate.
      let shift = fmt.man_width as i32 - lzd(man) as i32;
      man = (man << shift) & fmt.man_all_ones();
      unbiased = 1 - fmt.bias - shift;
    }
    let out_exp = unbiased + 127;
    if out_exp >= 255 {
      // The exponent rebias runs past the top of fp32's range (tiny-bias formats).
      ((neg as u32) << 31) | 0x7F80_0000
    } else if out_exp < 1 {
      // ...or below the bottom (large-bias formats): an fp32 denormal.
      let sig = (man << (23 - fmt.man_width)) | (1 << 23);
      ((neg as u32) << 31) | (sig >> (1 - out_exp).min(31) as u32)
    } else {
      ((neg as u32) << 31) | ((out_exp as u32) << 23) | (man << (23 - fmt.man_width))
    }
  };
  if clip && is_inf_fp32(out) && (input_finite || clip_inf_input) {
    out -= 1; // ±max_normal
  }
  out
}

/// Convert an fp32 value to the narrow format described by `fmt`.
///
/// `lfsr` is the external pseudo-random word consumed by the stochastic modes.
pub(crate) fn narrow(
  input: u32,
  fmt: &FpFormat,
  mode: RoundMode,
  lfsr: u32,
  opts: NarrowOpts,
) -> (u32, Exceptions) {
  debug_assert!(!fmt.unsigned, "narrowing targets a signed layout");
  let mut exc = Exceptions::default();
  let neg = input >> 31 == 1;

  if is_nan_fp32(input) {
    exc.nan = true;
    let out = match fmt.inf_nan {
      InfNanMode::IeeeLike | InfNanMode::Collapsed => fmt.default_nan(),
      InfNanMode::NoInfNan => fmt.max_normal_bits(false),
    };
    return (out, exc);
  }
  if is_zero_fp32(input) {
    return (fmt.sign_bits(neg), exc);
  }
  if is_inf_fp32(input) {
    let mut out = top_code(fmt, neg, &mut exc);
    exc.inf = true;
    if opts.clip && opts.clip_inf_input && fmt.is_inf(out) {
      out = fmt.max_normal_bits(neg);
    }
    return (out, exc);
  }

  // Finite and non-zero: the 24-bit significand with the leading one at bit 23,
  // and the unbiased exponent.
  let exp_field = sbs(input, 30, 23) as i32;
  let man = sbs(input, 22, 0);
  let (sig, unbiased) = if exp_field == 0 {
    let p = lzd(man) as i32;
    (((man << (23 - p)) as u64), p - 149)
  } else {
    ((man | (1 << 23)) as u64, exp_field - 127)
  };

  // Position of the result's ulp within `sig`: normal results keep `man_width`
  // fraction bits; a result in the target's denormal range loses one more bit per
  // exponent step below the minimum normal exponent. Deep underflow clamps the
  // shift so that everything lands in the sticky.
  let min_normal_exp = 1 - fmt.bias;
  let denormal_result = unbiased < min_normal_exp;
  let shift = (23 - fmt.man_width as i32)
    + if denormal_result { min_normal_exp - unbiased } else { 0 };
  let shift = shift.clamp(0, 40) as u32;

  let kept = (sig >> shift.min(63)) as u32;
  let guard = shift >= 1 && (sig >> (shift - 1)) & 1 == 1;
  let lower = shift >= 2 && sig & ((1u64 << (shift - 1)) - 1) != 0;
  // The discarded bits (guard included), left-aligned in a 32-bit word: the value
  // compared against the stochastic threshold.
  let discarded = if shift == 0 {
    0
  } else {
    let dropped = sig & ((1u64 << shift) - 1);
    if shift >= 32 { (dropped >> (shift - 32)) as u32 } else { (dropped << (32 - shift)) as u32 }
  };

  // Mode 7: stochastic, except denormal results round nearest-even.
  let mode_eff = if mode == RoundMode::StochasticRneDenorm && denormal_result {
    RoundMode::NearestEven
  } else {
    mode
  };
  let kept = kept + round_up(mode_eff, guard, lower, kept & 1 == 1, neg, lfsr, discarded) as u32;

  let mut out = if denormal_result {
    // `kept` has at most `man_width` bits; rounding up to `1 << man_width` is
    // exactly the promotion to the minimum normal.
    fmt.pack(neg, kept >> fmt.man_width, kept & fmt.man_all_ones())
  } else {
    let mut e = unbiased + fmt.bias;
    let mut kept = kept;
    if kept >> (fmt.man_width + 1) != 0 {
      // Mantissa carry: 1.11…1 rounded up to 10.00…0.
      kept >>= 1;
      e += 1;
    }
    // Under the collapsed policy the all-ones code is NaN, so the exponent range
    // effectively ends one mantissa step earlier.
    let overflowed = e > fmt.max_finite_exp_field() as i32
      || (fmt.inf_nan == InfNanMode::Collapsed
        && e == fmt.max_finite_exp_field() as i32
        && kept & fmt.man_all_ones() == fmt.man_all_ones());
    if overflowed {
      exc.overflow = true;
      match opts.overflow {
        OverflowRule::AlwaysTop => top_code(fmt, neg, &mut exc),
        OverflowRule::ModeAware => {
          let to_max = mode == RoundMode::TowardZero
            || (mode == RoundMode::TowardPos && neg)
            || (mode == RoundMode::TowardNeg && !neg);
          if to_max { fmt.max_normal_bits(neg) } else { top_code(fmt, neg, &mut exc) }
        }
      }
    } else {
      fmt.pack(neg, e as u32, kept & fmt.man_all_ones())
    }
  };

  if opts.clip && fmt.is_inf(out) {
    out = fmt.max_normal_bits(neg);
  }
  if (opts.ftz_out || (opts.stochastic_ftz && mode.is_stochastic())) && fmt.is_denormal(out) {
    // Flushing must not round a value against the directed mode: toward the
    // result's own sign the flush lands on min-normal instead of zero.
    out = if !neg && mode == RoundMode::TowardPos {
      fmt.min_normal_bits(false)
    } else if neg && mode == RoundMode::TowardNeg {
      fmt.min_normal_bits(true)
    } else {
      fmt.sign_bits(neg)
    };
  }
  (out, exc)
}

/// fp32 → fp32 "conversion": NaN canonicalisation, optional clip of ∞ to
/// max-normal, optional flush of denormals to signed zero. Finite normal values
/// pass through unchanged.
pub fn fp32_to_fp32(input: u32, clip: bool, ftz_out: bool, clip_inf_input: bool) -> u32 {
  if is_nan_fp32(input) {
    DEFAULT_NAN_FP32
  } else if is_inf_fp32(input) && clip && clip_inf_input {
    input - 1
  } else if is_denorm_fp32(input) && ftz_out {
    input & 0x8000_0000
  } else {
    input
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fp32_to_fp32_cases() {
    // NaN payloads collapse.
    assert_eq!(fp32_to_fp32(0xFFC0_0001, false, false, true), DEFAULT_NAN_FP32);
    assert_eq!(fp32_to_fp32(0x7F80_0001, true, true, true), DEFAULT_NAN_FP32);
    // Clip pulls ∞ down to max-normal.
    assert_eq!(fp32_to_fp32(0x7F80_0000, true, false, true), 0x7F7F_FFFF);
    assert_eq!(fp32_to_fp32(0xFF80_0000, true, false, true), 0xFF7F_FFFF);
    assert_eq!(fp32_to_fp32(0x7F80_0000, true, false, false), 0x7F80_0000);
    // Output flush.
    assert_eq!(fp32_to_fp32(0x8000_0001, false, true, true), 0x8000_0000);
    assert_eq!(fp32_to_fp32(0x0070_0000, false, true, true), 0x0000_0000);
    // Normal values pass through.
    assert_eq!(fp32_to_fp32(0x3F80_0000, true, true, true), 0x3F80_0000);
  }
}
