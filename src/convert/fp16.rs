//! fp16 ↔ fp32.

use super::{NarrowOpts, narrow, widen};
use crate::format::FpFormat;
use crate::round::RoundMode;

/// Widen an fp16 value to fp32 (exact; denormals renormalise, NaN payloads
/// collapse).
#[inline]
pub fn fp16_to_fp32(input: u16, clip: bool) -> u32 {
  widen(input as u32, &FpFormat::FP16, clip, true)
}

/// Narrow an fp32 value to fp16.
pub fn fp32_to_fp16(
  input: u32,
  mode: RoundMode,
  lfsr: u32,
  clip: bool,
  ftz_out: bool,
  clip_inf_input: bool,
) -> u16 {
  narrow(input, &FpFormat::FP16, mode, lfsr, NarrowOpts::mode_aware(clip, clip_inf_input, ftz_out)).0
    as u16
}
