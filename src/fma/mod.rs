//! The fixed-point multiply-accumulate kernel and the N-lane tree engine.
//!
//! This module and its submodules model the arithmetic unit's internal pipeline:
//!
//!   - [`fp_mult`] multiplies two fp32-encoded lane operands into an [`Unpacked`]
//!     product (wide significand in 2.46 fixed point, tree-local biased exponent).
//!   - [`fp_add`] aligns and adds two unpacked values as signed 64-bit integers,
//!     tracking shifted-out bits as a sticky.
//!   - [`fp_convert`] normalises an unpacked value at the accumulator width K and
//!     rounds it into a packed fp32 word.
//!   - [`mul_add_tree`] is the generic N-lane dot-product-plus-accumulate engine,
//!     configured by a [`TreeConfig`]; the named entry points of the hardware are
//!     thin constant-configuration wrappers in [`presets`].
//!   - [`double`] recomputes the same dot product by an independent method (host
//!     double-precision products, exact windowed accumulation, one explicit
//!     rounding) and must agree with the tree bit for bit.

mod add;
mod mult;
mod norm;
mod tree;

pub mod double;
pub mod presets;

pub use add::fp_add;
pub use mult::{MultFlags, fp_mult};
pub use norm::fp_convert;
pub use tree::{CPlacement, MAX_LANES, TreeConfig, mul_add_tree};

/// An unpacked value flowing between the kernel stages: a tree-local biased
/// exponent, a wide signed significand, and the special-value flags.
///
/// Lifetime is a single call chain; nothing here persists.
#[derive(Clone, Copy, Debug, Default)]
#[derive(PartialEq, Eq)]
pub struct Unpacked {
  /// Biased exponent (fp32 bias convention; `0xFF` marks NaN/∞ and `-127` a
  /// forced-zero product).
  pub exp: i32,
  /// Signed significand. Products are 2.46 fixed point; sums may occupy the full
  /// width.
  pub sig: i64,
  pub is_zero: bool,
  pub is_inf: bool,
  pub is_nan: bool,
  pub is_neg: bool,
}

impl Unpacked {
  /// The NaN marker value the kernel stages produce and recognise.
  pub(crate) const NAN: Self =
    Self { exp: 0xFF, sig: -1, is_zero: false, is_inf: false, is_nan: true, is_neg: false };

  pub(crate) const fn inf(is_neg: bool) -> Self {
    Self { exp: 0xFF, sig: 0, is_zero: false, is_inf: true, is_nan: false, is_neg }
  }

  /// A zero product: the exponent is forced to the smallest value so a zero lane
  /// never wins the tree's maximum-exponent race.
  pub(crate) const fn zero_product(is_neg: bool) -> Self {
    Self { exp: -127, sig: 0, is_zero: true, is_inf: false, is_nan: false, is_neg }
  }
}
