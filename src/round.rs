//! Rounding modes and the shared round-up decision.
//!
//! Every format conversion and the tree's final normalisation funnel their rounding
//! through [`round_up`], so its truth table is the single highest-value correctness
//! target in the crate (a bug here propagates to every format).

/// A hardware rounding mode.
///
/// The discriminants are the wire encoding of the mode field; code 5 is the
/// reserved "default" marker resolved by the caller and must never reach this
/// crate ([`RoundMode::from_code`] panics on it).
#[derive(Clone, Copy, Debug)]
#[derive(PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RoundMode {
  /// Round to nearest, ties to even.
  NearestEven = 0,
  /// Round toward zero (truncate).
  TowardZero = 1,
  /// Round toward +∞.
  TowardPos = 2,
  /// Round toward −∞.
  TowardNeg = 3,
  /// Stochastic rounding: round up iff the discarded bits, left-aligned, are ≥ an
  /// externally supplied pseudo-random threshold.
  Stochastic = 4,
  /// Round half away from zero.
  HalfAwayZero = 6,
  /// Stochastic rounding, except results in the target's denormal range round
  /// nearest-even.
  StochasticRneDenorm = 7,
}

impl RoundMode {
  /// Decode a wire rounding-mode code.
  ///
  /// Panics on code 5 (reserved) and on codes above 7: an invalid mode silently
  /// treated as some other mode would defeat the whole point of a bit-exact model.
  pub fn from_code(code: u8) -> Self {
    match code {
      0 => Self::NearestEven,
      1 => Self::TowardZero,
      2 => Self::TowardPos,
      3 => Self::TowardNeg,
      4 => Self::Stochastic,
      6 => Self::HalfAwayZero,
      7 => Self::StochasticRneDenorm,
      5 => panic!("rounding-mode code 5 is reserved and must be resolved by the caller"),
      _ => panic!("invalid rounding-mode code {code}"),
    }
  }

  /// The wire encoding of this mode.
  #[inline]
  pub const fn code(self) -> u8 {
    self as u8
  }

  /// Whether this is one of the two stochastic modes.
  #[inline]
  pub const fn is_stochastic(self) -> bool {
    matches!(self, Self::Stochastic | Self::StochasticRneDenorm)
  }
}

/// Decide whether a truncated value must be incremented by one unit in the last
/// place.
///
///   - `guard` is the first discarded bit (weight ½ ulp).
///   - `round_sticky` is the OR of every discarded bit below the guard.
///   - `lsb_odd` is the least significant *kept* bit.
///   - `is_neg` is the sign of the value being rounded.
///   - `lfsr` and `discarded` drive the stochastic modes: `discarded` is the full
///     discarded bit string aligned to the left of a 32-bit word, and the value
///     rounds up iff it is ≥ the `lfsr` threshold.
///
/// [`RoundMode::StochasticRneDenorm`] decides like plain stochastic here; the
/// nearest-even substitution for denormal results is made by the conversion that
/// knows where the result lands, before calling this.
#[inline]
pub fn round_up(
  mode: RoundMode,
  guard: bool,
  round_sticky: bool,
  lsb_odd: bool,
  is_neg: bool,
  lfsr: u32,
  discarded: u32,
) -> bool {
  match mode {
    RoundMode::NearestEven => (guard && round_sticky) || (guard && !round_sticky && lsb_odd),
    RoundMode::TowardZero => false,
    RoundMode::TowardPos => (guard || round_sticky) && !is_neg,
    RoundMode::TowardNeg => (guard || round_sticky) && is_neg,
    RoundMode::HalfAwayZero => guard,
    RoundMode::Stochastic | RoundMode::StochasticRneDenorm => discarded >= lfsr,
  }
}
