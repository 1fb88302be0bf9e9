//! bf16 ↔ fp32.

use super::{NarrowOpts, narrow};
use crate::format::{FpFormat, is_inf_fp32};
use crate::round::RoundMode;

/// Widen a bf16 value to fp32. bf16 is the top half of fp32, so this is a shift;
/// `clip` pulls an infinite result down to ±max-normal.
#[inline]
pub fn bf16_to_fp32(input: u16, clip: bool) -> u32 {
  let mut out = (input as u32) << 16;
  if clip && is_inf_fp32(out) {
    out -= 1; // ±max_normal
  }
  out
}

/// Narrow an fp32 value to bf16.
///
/// `lfsr` drives the stochastic modes; `clip` substitutes max-normal for a result
/// that lands on ∞ (`clip_inf_input` extends that to infinite inputs); `ftz_out`
/// flushes denormal results.
pub fn fp32_to_bf16(
  input: u32,
  mode: RoundMode,
  lfsr: u32,
  clip: bool,
  ftz_out: bool,
  clip_inf_input: bool,
) -> u16 {
  narrow(input, &FpFormat::BF16, mode, lfsr, NarrowOpts::mode_aware(clip, clip_inf_input, ftz_out)).0
    as u16
}
