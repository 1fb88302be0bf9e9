//! cfp16 ↔ fp32: the configurable 16-bit format.
//!
//! cfp16 takes any exponent/mantissa split, any bias, and a signed or unsigned
//! interpretation (build descriptors with [`FpFormat::cfp16`]). The unsigned
//! flavour affects decoding only: the sign-bit position is handed to the exponent
//! and no negative values exist. Narrowing always targets the signed layout, like
//! the hardware's store path.

use super::{Exceptions, NarrowOpts, OverflowRule, narrow, widen};
use crate::format::FpFormat;
use crate::round::RoundMode;

fn check_cfp16(fmt: &FpFormat) {
  assert!(fmt.total_bits() == 16, "not a cfp16 descriptor: {fmt:?}");
}

/// Widen a cfp16 value to fp32 (exact).
pub fn cfp16_to_fp32(input: u16, fmt: &FpFormat, clip: bool) -> u32 {
  check_cfp16(fmt);
  widen(input as u32, fmt, clip, true)
}

/// Narrow an fp32 value to cfp16. Overflow behaves like the fp8 unit: the policy's
/// top code under every rounding mode, with `clip` substituting max-normal.
pub fn fp32_to_cfp16(
  input: u32,
  fmt: &FpFormat,
  mode: RoundMode,
  lfsr: u32,
  ftz_out: bool,
  clip: bool,
  clip_inf_input: bool,
) -> (u16, Exceptions) {
  check_cfp16(fmt);
  assert!(!fmt.unsigned, "fp32_to_cfp16 encodes the signed layout");
  let opts = NarrowOpts {
    clip,
    clip_inf_input,
    ftz_out,
    stochastic_ftz: false,
    overflow: OverflowRule::AlwaysTop,
  };
  let (out, exc) = narrow(input, fmt, mode, lfsr, opts);
  (out as u16, exc)
}
