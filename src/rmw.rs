//! Element-wise read-modify-write reduction operators.
//!
//! The store path can combine an incoming element with the value already in
//! memory: saturating add/sub/min/max (and add-clamped-at-zero) over the typed
//! element held in the low bits of a 32-bit container. Integers saturate at their
//! type bounds; float flavours widen to fp32, run through the scalar kernel, and
//! re-narrow with the caller's rounding mode.

use crate::convert;
use crate::format::FpFormat;
use crate::round::RoundMode;
use crate::scalar;

/// The reduction operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RmwOp {
  Add,
  Sub,
  Min,
  Max,
  /// Add, then clamp negative results to the type's zero.
  MaxZeroAdd,
}

/// The element type held in the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RmwDtype {
  Int8,
  Int16,
  Int32,
  Uint8,
  Uint16,
  Uint32,
  Bf16,
  Fp32,
  Fp16,
  /// fp8 e5m2 with bias 15 (the store path's fixed fp8 flavour).
  Fp8,
}

impl RmwDtype {
  fn fp_format(self) -> Option<FpFormat> {
    match self {
      Self::Bf16 => Some(FpFormat::BF16),
      Self::Fp32 => Some(FpFormat::FP32),
      Self::Fp16 => Some(FpFormat::FP16),
      Self::Fp8 => Some(FpFormat::fp8(5, 2, 15, crate::format::InfNanMode::IeeeLike)),
      _ => None,
    }
  }
}

fn widen_elem(x: u32, dtype: RmwDtype) -> u32 {
  match dtype {
    RmwDtype::Bf16 => convert::bf16::bf16_to_fp32(x as u16, false),
    RmwDtype::Fp16 => convert::fp16::fp16_to_fp32(x as u16, false),
    RmwDtype::Fp8 => {
      convert::fp8::fp8_to_fp32(x as u8, &RmwDtype::Fp8.fp_format().unwrap(), false)
    }
    RmwDtype::Fp32 => x,
    _ => unreachable!(),
  }
}

fn narrow_elem(x: u32, dtype: RmwDtype, mode: RoundMode, clip: bool, clip_inf_input: bool) -> u32 {
  match dtype {
    RmwDtype::Bf16 => {
      convert::bf16::fp32_to_bf16(x, mode, 0, clip, false, clip_inf_input) as u32
    }
    RmwDtype::Fp16 => {
      convert::fp16::fp32_to_fp16(x, mode, 0, clip, false, clip_inf_input) as u32
    }
    RmwDtype::Fp8 => {
      convert::fp8::fp32_to_fp8(
        x,
        &RmwDtype::Fp8.fp_format().unwrap(),
        mode,
        0,
        false,
        clip,
        clip_inf_input,
        false,
      )
      .0 as u32
    }
    RmwDtype::Fp32 => convert::fp32_to_fp32(x, clip, false, clip_inf_input),
    _ => unreachable!(),
  }
}

/// Combine `src1` (the value in memory) with `src2` (the incoming element).
///
/// `suppress_nans` makes min/max prefer the non-NaN operand instead of producing
/// the canonical NaN.
pub fn execute_rmw(
  src1: u32,
  src2: u32,
  op: RmwOp,
  dtype: RmwDtype,
  mode: RoundMode,
  clip_fp: bool,
  clip_fp_inf_input: bool,
  suppress_nans: bool,
) -> u32 {
  match dtype {
    RmwDtype::Int8 | RmwDtype::Int16 | RmwDtype::Int32 => {
      let (a, b) = (sign_extend(src1, dtype), sign_extend(src2, dtype));
      let r = match op {
        RmwOp::Add => a.saturating_add(b),
        RmwOp::Sub => a.saturating_sub(b),
        RmwOp::Min => a.min(b),
        RmwOp::Max => a.max(b),
        RmwOp::MaxZeroAdd => a.saturating_add(b).max(0),
      };
      saturate_signed(r, dtype)
    }
    RmwDtype::Uint8 | RmwDtype::Uint16 | RmwDtype::Uint32 => {
      let (a, b) = (zero_extend(src1, dtype), zero_extend(src2, dtype));
      let r = match op {
        RmwOp::Add | RmwOp::MaxZeroAdd => a.saturating_add(b),
        RmwOp::Sub => a.saturating_sub(b),
        RmwOp::Min => a.min(b),
        RmwOp::Max => a.max(b),
      };
      saturate_unsigned(r, dtype)
    }
    _ => {
      let a = widen_elem(src1, dtype);
      let b = widen_elem(src2, dtype);
      let r = match op {
        RmwOp::Add | RmwOp::Sub | RmwOp::MaxZeroAdd => {
          let b = if op == RmwOp::Sub { b ^ 0x8000_0000 } else { b };
          let mut sum = scalar::add_fp32(a, b, mode, false);
          if op == RmwOp::MaxZeroAdd && !crate::format::is_nan_fp32(sum) && sum >> 31 == 1 {
            sum = 0; // clamp below at +0 (a -0 sum collapses too)
          }
          sum
        }
        RmwOp::Min | RmwOp::Max => float_min_max(a, b, op == RmwOp::Max, suppress_nans),
      };
      narrow_elem(r, dtype, mode, clip_fp, clip_fp_inf_input)
    }
  }
}

/// Apply an operator element-wise over packed 32-bit containers: `dst[i]` becomes
/// `dst[i] ⋅ src[i]`.
pub fn execute_rmw_slice(
  dst: &mut [u32],
  src: &[u32],
  op: RmwOp,
  dtype: RmwDtype,
  mode: RoundMode,
  clip_fp: bool,
  clip_fp_inf_input: bool,
  suppress_nans: bool,
) {
  assert!(dst.len() == src.len(), "element counts must match");
  for (d, &s) in dst.iter_mut().zip(src) {
    *d = execute_rmw(*d, s, op, dtype, mode, clip_fp, clip_fp_inf_input, suppress_nans);
  }
}

/// fp32 min/max on bit patterns. NaN loses to a number under `suppress_nans`,
/// otherwise poisons the result; −0 orders below +0.
fn float_min_max(a: u32, b: u32, want_max: bool, suppress_nans: bool) -> u32 {
  use crate::format::is_nan_fp32;
  match (is_nan_fp32(a), is_nan_fp32(b)) {
    (true, true) => crate::nan::DEFAULT_NAN_FP32,
    (true, false) => if suppress_nans { b } else { crate::nan::DEFAULT_NAN_FP32 },
    (false, true) => if suppress_nans { a } else { crate::nan::DEFAULT_NAN_FP32 },
    (false, false) => {
      // Total order via sign-magnitude keys: negative patterns reverse.
      let key = |x: u32| if x >> 31 == 1 { !x } else { x | 0x8000_0000 };
      if (key(a) > key(b)) == want_max { a } else { b }
    }
  }
}

fn sign_extend(x: u32, dtype: RmwDtype) -> i32 {
  match dtype {
    RmwDtype::Int8 => x as u8 as i8 as i32,
    RmwDtype::Int16 => x as u16 as i16 as i32,
    _ => x as i32,
  }
}

fn zero_extend(x: u32, dtype: RmwDtype) -> u32 {
  match dtype {
    RmwDtype::Uint8 => x & 0xFF,
    RmwDtype::Uint16 => x & 0xFFFF,
    _ => x,
  }
}

fn saturate_signed(r: i32, dtype: RmwDtype) -> u32 {
  let r = match dtype {
    RmwDtype::Int8 => r.clamp(i8::MIN as i32, i8::MAX as i32) & 0xFF,
    RmwDtype::Int16 => r.clamp(i16::MIN as i32, i16::MAX as i32) & 0xFFFF,
    _ => r,
  };
  r as u32
}

fn saturate_unsigned(r: u32, dtype: RmwDtype) -> u32 {
  match dtype {
    RmwDtype::Uint8 => r.min(u8::MAX as u32),
    RmwDtype::Uint16 => r.min(u16::MAX as u32),
    _ => r,
  }
}
