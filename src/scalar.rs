//! Scalar fused multiply-add primitives.
//!
//! Every primitive runs on the fixed-point kernel with the rounding mode as an
//! explicit argument: one `fp_mult` per product, `fp_add` alignment, one
//! `fp_convert` at the end. Narrow operands widen exactly first; narrow results
//! re-narrow with the caller's rounding mode.

use crate::convert;
use crate::fma::{MultFlags, fp_add, fp_convert, fp_mult};
use crate::format::{FpFormat, is_denorm_fp32, is_zero_fp32};
use crate::round::RoundMode;
use crate::unit::UNIT_FP32;

/// Unpack a packed fp32 word for the adder by multiplying it with 1.0.
fn unpack(x: u32, flush_denorm: bool) -> crate::fma::Unpacked {
  fp_mult(
    x,
    UNIT_FP32,
    is_zero_fp32(x),
    false,
    is_denorm_fp32(x),
    false,
    &MultFlags { flush_denorm, ..MultFlags::default() },
  )
}

/// `a × b + c` in fp32, one rounding.
pub fn fma_fp32(a: u32, b: u32, c: u32, mode: RoundMode, flush_denorm: bool) -> u32 {
  let f = MultFlags { flush_denorm, ..MultFlags::default() };
  let p = fp_mult(
    a,
    b,
    is_zero_fp32(a),
    is_zero_fp32(b),
    is_denorm_fp32(a),
    is_denorm_fp32(b),
    &f,
  );
  let (s, sticky) = fp_add(p, false, unpack(c, flush_denorm), false, mode);
  fp_convert(s, sticky, mode, 26, false, flush_denorm)
}

/// `a × b + c` in fp32 with denormals kept.
pub fn fma_fp32_no_flush(a: u32, b: u32, c: u32, mode: RoundMode) -> u32 {
  fma_fp32(a, b, c, mode, false)
}

/// `a + b` in fp32 (routed through the multiplier as `a × 1.0 + b`).
pub fn add_fp32(a: u32, b: u32, mode: RoundMode, flush_denorm: bool) -> u32 {
  fma_fp32(a, UNIT_FP32, b, mode, flush_denorm)
}

/// `(a + b) + (c + d)` in fp32: the hardware's pairwise four-input adder, each
/// stage rounded.
pub fn add_fp32_4(a: u32, b: u32, c: u32, d: u32, mode: RoundMode) -> u32 {
  add_fp32(add_fp32(a, b, mode, false), add_fp32(c, d, mode, false), mode, false)
}

/// bf16 `a × b + c`, bf16 result.
pub fn fma_bfp16(a: u16, b: u16, c: u16, mode: RoundMode, flush_denorm: bool) -> u16 {
  let r = fma_fp32(
    convert::bf16::bf16_to_fp32(a, false),
    convert::bf16::bf16_to_fp32(b, false),
    convert::bf16::bf16_to_fp32(c, false),
    mode,
    flush_denorm,
  );
  convert::bf16::fp32_to_bf16(r, mode, 0, false, flush_denorm, true)
}

/// bf16 `a × b` accumulated into fp32.
pub fn fma_bfp16_fp32(a: u16, b: u16, c: u32, mode: RoundMode, flush_denorm: bool) -> u32 {
  fma_fp32(
    convert::bf16::bf16_to_fp32(a, false),
    convert::bf16::bf16_to_fp32(b, false),
    c,
    mode,
    flush_denorm,
  )
}

/// bf16 `a + b`, bf16 result.
pub fn add_bf16(a: u16, b: u16, mode: RoundMode) -> u16 {
  fma_bfp16(a, 0x3F80, b, mode, true)
}

/// fp16 `a × b` accumulated into fp32. `fp16_ftz_in` flushes denormal fp16
/// operands before they reach the multiplier.
pub fn fma_fp16_fp32(
  a: u16,
  b: u16,
  c: u32,
  mode: RoundMode,
  fp16_ftz_in: bool,
  fp32_flush_denorm: bool,
) -> u32 {
  let flush16 = |x: u16| if fp16_ftz_in && FpFormat::FP16.is_denormal(x as u32) { x & 0x8000 } else { x };
  fma_fp32(
    convert::fp16::fp16_to_fp32(flush16(a), false),
    convert::fp16::fp16_to_fp32(flush16(b), false),
    c,
    mode,
    fp32_flush_denorm,
  )
}

/// fp16 `a × b + c`, fp16 result. `fp16_ftz_out` flushes a denormal fp16 result.
pub fn fma_fp16_fp16(
  a: u16,
  b: u16,
  c: u16,
  mode: RoundMode,
  fp16_ftz_in: bool,
  fp16_ftz_out: bool,
) -> u16 {
  let r = fma_fp16_fp32(a, b, convert::fp16::fp16_to_fp32(c, false), mode, fp16_ftz_in, false);
  convert::fp16::fp32_to_fp16(r, mode, 0, false, fp16_ftz_out, true)
}

/// fp8 `a × b` accumulated into fp32.
pub fn fma_fp8_fp32(
  a: u8,
  b: u8,
  c: u32,
  mode: RoundMode,
  fmt: &FpFormat,
  fp8_ftz_in: bool,
  fp32_flush_denorm: bool,
) -> u32 {
  let flush8 = |x: u8| if fp8_ftz_in && fmt.is_denormal(x as u32) { x & 0x80 } else { x };
  fma_fp32(
    convert::fp8::fp8_to_fp32(flush8(a), fmt, false),
    convert::fp8::fp8_to_fp32(flush8(b), fmt, false),
    c,
    mode,
    fp32_flush_denorm,
  )
}

/// Two fp8 products accumulated into fp32 with a single rounding:
/// `a0·b0 + a1·b1 + c`.
pub fn fma_2xfp8_fp32(
  a0: u8,
  b0: u8,
  a1: u8,
  b1: u8,
  c: u32,
  mode: RoundMode,
  fmt: &FpFormat,
) -> u32 {
  let f = MultFlags::default();
  let widen = |x: u8| convert::fp8::fp8_to_fp32(x, fmt, false);
  let lane = |a: u8, b: u8| {
    let (a, b) = (widen(a), widen(b));
    fp_mult(a, b, is_zero_fp32(a), is_zero_fp32(b), is_denorm_fp32(a), is_denorm_fp32(b), &f)
  };
  let (s, sticky) = fp_add(lane(a0, b0), false, lane(a1, b1), false, mode);
  let (s, sticky2) = fp_add(s, sticky, unpack(c, false), false, mode);
  fp_convert(s, sticky2, mode, 26, false, false)
}
