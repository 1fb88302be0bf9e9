//! Re-export some internals for benchmarking purposes; available with feature = "bench".

use crate::fma::{MultFlags, Unpacked, fp_convert, fp_mult};
use crate::round::RoundMode;

/// The lane multiplier on plain fp32 operands.
pub fn bench_fp_mult(a: u32, b: u32) -> Unpacked {
  let fmt = crate::format::FpFormat::FP32;
  fp_mult(
    a,
    b,
    fmt.is_zero(a),
    fmt.is_zero(b),
    fmt.is_denormal(a),
    fmt.is_denormal(b),
    &MultFlags { flush_denorm: true, ..MultFlags::default() },
  )
}

/// The normaliser at accumulator width K.
pub fn bench_fp_convert(u: Unpacked, k: u32) -> u32 {
  fp_convert(u, false, RoundMode::NearestEven, k, false, true)
}
