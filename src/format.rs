//! Floating-point format descriptors and raw-bit-pattern predicates.
//!
//! A [`FpFormat`] describes an encoding: exponent width, mantissa width, exponent
//! bias, the infinity/NaN policy, and whether the format carries a sign bit. The
//! four fixed formats the unit operates on natively (fp32, bf16, fp16, tf32) have
//! `const` descriptors; fp8 and cfp16 take theirs at run time, with any
//! exponent/mantissa split and any bias.
//!
//! All predicates operate directly on the packed bit pattern, held in the low bits
//! of a `u32`.

use crate::bits::sbs;

/// The infinity/NaN policy of an encoding.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq, Hash)]
pub enum InfNanMode {
  /// IEEE-style: an all-ones exponent encodes ∞ (zero mantissa) or NaN (non-zero
  /// mantissa).
  IeeeLike,
  /// No ∞ and no NaN are representable; the all-ones exponent patterns are ordinary
  /// values, and the all-ones pattern is the format's maximum normal.
  NoInfNan,
  /// The single all-ones code (per sign) is NaN; there is no ∞, and the code just
  /// below NaN is the maximum normal.
  Collapsed,
}

impl InfNanMode {
  /// Decode the wire encoding of the policy field (0, 1, 2).
  pub fn from_code(code: u8) -> Self {
    match code {
      0 => Self::IeeeLike,
      1 => Self::NoInfNan,
      2 => Self::Collapsed,
      _ => panic!("invalid infinity/NaN policy code {code}"),
    }
  }
}

/// A floating-point format descriptor.
///
/// Invariant: `exp_width + man_width + (1 if signed)` equals the total bit width of
/// the encoding, and the encoding fits in a `u32` container.
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq, Hash)]
pub struct FpFormat {
  /// Width of the exponent field in bits.
  pub exp_width: u32,
  /// Width of the mantissa field in bits.
  pub man_width: u32,
  /// Exponent bias: a field value `e` of a normal number encodes exponent
  /// `e - bias`.
  pub bias: i32,
  /// Infinity/NaN policy.
  pub inf_nan: InfNanMode,
  /// If set, the format has no sign bit and only encodes non-negative values.
  pub unsigned: bool,
}

impl FpFormat {
  /// IEEE single precision.
  pub const FP32: Self =
    Self { exp_width: 8, man_width: 23, bias: 127, inf_nan: InfNanMode::IeeeLike, unsigned: false };

  /// bfloat16: fp32 with the low 16 mantissa bits dropped.
  pub const BF16: Self =
    Self { exp_width: 8, man_width: 7, bias: 127, inf_nan: InfNanMode::IeeeLike, unsigned: false };

  /// IEEE half precision.
  pub const FP16: Self =
    Self { exp_width: 5, man_width: 10, bias: 15, inf_nan: InfNanMode::IeeeLike, unsigned: false };

  /// tf32 / fp19: 1 + 8 + 10 bits. The descriptor describes the right-aligned
  /// 19-bit value; the left-shifted-by-13 storage convention is handled by the
  /// conversion entry points.
  pub const TF32: Self =
    Self { exp_width: 8, man_width: 10, bias: 127, inf_nan: InfNanMode::IeeeLike, unsigned: false };

  /// An 8-bit float with the given exponent/mantissa split and bias.
  pub fn fp8(exp_width: u32, man_width: u32, bias: i32, inf_nan: InfNanMode) -> Self {
    assert!(
      exp_width >= 1 && man_width >= 1 && exp_width + man_width == 7,
      "fp8 requires 1 sign + exp_width + man_width = 8 bits, got e{exp_width}m{man_width}",
    );
    Self { exp_width, man_width, bias, inf_nan, unsigned: false }
  }

  /// A configurable 16-bit float with the given split, bias, and signedness.
  pub fn cfp16(exp_width: u32, man_width: u32, bias: i32, unsigned: bool, inf_nan: InfNanMode) -> Self {
    let sign_bits = if unsigned { 0 } else { 1 };
    assert!(
      exp_width >= 1 && man_width >= 1 && sign_bits + exp_width + man_width == 16,
      "cfp16 requires {sign_bits} sign + exp_width + man_width = 16 bits, got e{exp_width}m{man_width}",
    );
    Self { exp_width, man_width, bias, inf_nan, unsigned }
  }

  /// Total width of the encoding in bits.
  #[inline]
  pub const fn total_bits(&self) -> u32 {
    self.exp_width + self.man_width + if self.unsigned { 0 } else { 1 }
  }

  /// All-ones exponent field value.
  #[inline]
  pub(crate) const fn exp_all_ones(&self) -> u32 {
    (1 << self.exp_width) - 1
  }

  /// All-ones mantissa field value.
  #[inline]
  pub(crate) const fn man_all_ones(&self) -> u32 {
    (1 << self.man_width) - 1
  }

  /// The largest exponent field value of a finite number.
  #[inline]
  pub(crate) const fn max_finite_exp_field(&self) -> u32 {
    match self.inf_nan {
      InfNanMode::IeeeLike => self.exp_all_ones() - 1,
      InfNanMode::NoInfNan | InfNanMode::Collapsed => self.exp_all_ones(),
    }
  }

  #[inline]
  pub(crate) const fn exp_field(&self, bits: u32) -> u32 {
    sbs(bits, self.man_width + self.exp_width - 1, self.man_width)
  }

  #[inline]
  pub(crate) const fn man_field(&self, bits: u32) -> u32 {
    sbs(bits, self.man_width - 1, 0)
  }

  /// Zero: all-zero exponent and mantissa; the sign bit is free, so signed zero
  /// exists.
  #[inline]
  pub fn is_zero(&self, bits: u32) -> bool {
    self.exp_field(bits) == 0 && self.man_field(bits) == 0
  }

  /// Denormal: all-zero exponent and non-zero mantissa. Zero is not denormal.
  #[inline]
  pub fn is_denormal(&self, bits: u32) -> bool {
    self.exp_field(bits) == 0 && self.man_field(bits) != 0
  }

  /// Infinity. Only representable under [`InfNanMode::IeeeLike`]; under the other
  /// policies the same bit patterns encode finite values.
  #[inline]
  pub fn is_inf(&self, bits: u32) -> bool {
    match self.inf_nan {
      InfNanMode::IeeeLike => self.exp_field(bits) == self.exp_all_ones() && self.man_field(bits) == 0,
      InfNanMode::NoInfNan | InfNanMode::Collapsed => false,
    }
  }

  /// NaN.
  #[inline]
  pub fn is_nan(&self, bits: u32) -> bool {
    match self.inf_nan {
      InfNanMode::IeeeLike => {
        self.exp_field(bits) == self.exp_all_ones() && self.man_field(bits) != 0
      }
      InfNanMode::NoInfNan => false,
      InfNanMode::Collapsed => {
        self.exp_field(bits) == self.exp_all_ones() && self.man_field(bits) == self.man_all_ones()
      }
    }
  }

  /// Sign of the value; always false for unsigned formats.
  #[inline]
  pub fn is_negative(&self, bits: u32) -> bool {
    if self.unsigned {
      false
    } else {
      let pos = self.exp_width + self.man_width;
      sbs(bits, pos, pos) != 0
    }
  }

  /// The sign bit alone, in place.
  #[inline]
  pub(crate) fn sign_bits(&self, neg: bool) -> u32 {
    if self.unsigned || !neg { 0 } else { 1 << (self.exp_width + self.man_width) }
  }

  /// Pack (sign, exponent field, mantissa field).
  #[inline]
  pub(crate) fn pack(&self, neg: bool, exp_field: u32, man_field: u32) -> u32 {
    debug_assert!(exp_field <= self.exp_all_ones() && man_field <= self.man_all_ones());
    self.sign_bits(neg) | (exp_field << self.man_width) | man_field
  }

  /// The canonical NaN pattern of the format: positive sign, all payload bits set.
  /// For [`InfNanMode::NoInfNan`] (which has no NaN) this is the maximum normal.
  #[inline]
  pub fn default_nan(&self) -> u32 {
    self.pack(false, self.exp_all_ones(), self.man_all_ones())
  }

  /// The ∞ pattern with the given sign (meaningful for [`InfNanMode::IeeeLike`]).
  #[inline]
  pub fn inf_bits(&self, neg: bool) -> u32 {
    self.pack(neg, self.exp_all_ones(), 0)
  }

  /// The largest finite magnitude, with the given sign.
  #[inline]
  pub fn max_normal_bits(&self, neg: bool) -> u32 {
    match self.inf_nan {
      InfNanMode::IeeeLike => self.pack(neg, self.exp_all_ones() - 1, self.man_all_ones()),
      InfNanMode::NoInfNan => self.pack(neg, self.exp_all_ones(), self.man_all_ones()),
      InfNanMode::Collapsed => self.pack(neg, self.exp_all_ones(), self.man_all_ones() - 1),
    }
  }

  /// The smallest normal magnitude, with the given sign.
  #[inline]
  pub fn min_normal_bits(&self, neg: bool) -> u32 {
    self.pack(neg, 1, 0)
  }

  /// The smallest denormal magnitude, with the given sign.
  #[inline]
  pub fn min_denormal_bits(&self, neg: bool) -> u32 {
    self.pack(neg, 0, 1)
  }
}

// Fixed fp32 predicates, used directly on the multiply-add hot path.

/// fp32 NaN.
#[inline]
pub fn is_nan_fp32(x: u32) -> bool {
  sbs(x, 30, 23) == 0xFF && sbs(x, 22, 0) != 0
}

/// fp32 ∞.
#[inline]
pub fn is_inf_fp32(x: u32) -> bool {
  sbs(x, 30, 23) == 0xFF && sbs(x, 22, 0) == 0
}

/// fp32 denormal (zero excluded).
#[inline]
pub fn is_denorm_fp32(x: u32) -> bool {
  sbs(x, 30, 23) == 0x00 && sbs(x, 22, 0) != 0
}

/// fp32 zero of either sign.
#[inline]
pub fn is_zero_fp32(x: u32) -> bool {
  sbs(x, 30, 23) == 0x00 && sbs(x, 22, 0) == 0
}
