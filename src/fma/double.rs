//! The double-precision cross-check path.
//!
//! An independent recomputation of [`mul_add_tree`](super::mul_add_tree) used to
//! validate the fixed-point engine bit for bit: lane products come from the host's
//! IEEE double multiplier (exact for every operand the unit can form, including
//! the emulation partial operands), the accumulation is an exact windowed sum with
//! positive and negative partial sums kept apart, and a single explicit software
//! rounding produces the packed fp32 result. The accumulator window is anchored by
//! the largest-magnitude product, which is what makes the double path land on the
//! same bits as the hardware's alignment instead of drifting by double rounding.
//!
//! Exact-cancellation corners that the engine resolves inside its 62-bit alignment
//! clamp (a cancellation that leaves only bits beyond the clamp) are outside this
//! path's validated envelope, as they were for the original double recomputation.

use super::tree::{CPlacement, TreeConfig, group_uniform};
use crate::bits::ibs;
use crate::format::{is_denorm_fp32, is_inf_fp32, is_nan_fp32, is_zero_fp32};
use crate::nan::DEFAULT_NAN_FP32;
use crate::round::{RoundMode, round_up};

const MAX_LANES: usize = super::tree::MAX_LANES;

/// 2^e as an f64, for exponents in the normal range.
#[inline]
fn exp2i(e: i32) -> f64 {
  debug_assert!((-1022 ..= 1023).contains(&e));
  f64::from_bits(((e + 1023) as u64) << 52)
}

/// An exact value `m × 2^w` with the special-value flags of the kernel.
#[derive(Clone, Copy, Debug, Default)]
struct DVal {
  m: i128,
  w: i32,
  is_zero: bool,
  is_inf: bool,
  is_nan: bool,
  is_neg: bool,
}

impl DVal {
  const NAN: Self =
    Self { m: 0, w: 0, is_zero: false, is_inf: false, is_nan: true, is_neg: false };

  const fn inf(is_neg: bool) -> Self {
    Self { m: 0, w: 0, is_zero: false, is_inf: true, is_nan: false, is_neg }
  }

  const fn zero(is_neg: bool) -> Self {
    Self { m: 0, w: 0, is_zero: true, is_inf: false, is_nan: false, is_neg }
  }

  /// Decompose a packed fp32 word. `flush` zeroes denormals, like the kernel's
  /// unpack-through-the-multiplier does.
  fn of_fp32(x: u32, flush: bool) -> Self {
    let neg = x >> 31 == 1;
    if is_nan_fp32(x) {
      Self::NAN
    } else if is_inf_fp32(x) {
      Self::inf(neg)
    } else if is_zero_fp32(x) || (is_denorm_fp32(x) && flush) {
      Self::zero(neg)
    } else {
      let exp = (x >> 23 & 0xFF) as i32;
      let man = (x & 0x7F_FFFF) as i128;
      let (sig, unbiased) =
        if exp == 0 { (man, -126) } else { (man | (1 << 23), exp - 127) };
      Self {
        m: if neg { -sig } else { sig },
        w: unbiased - 23,
        is_zero: false,
        is_inf: false,
        is_nan: false,
        is_neg: neg,
      }
    }
  }
}

/// The effective multiplier-input significand and exponent field of one operand:
/// the same conditioning the lane multiplier applies (emulation leading-one
/// tables, bias-15 re-denormalisation, denormal exponent fix-up), derived here
/// from first principles so the product itself can go through the host FPU.
fn operand_sig_exp(
  x: u32,
  x_is_dnorm: bool,
  leading_one_from_table: bool,
  cfg_bias15: bool,
  flush: bool,
) -> (i64, i32) {
  let mut exp = (x >> 23 & 0xFF) as i32;
  let mut denorm_shift = 0u32;
  if cfg_bias15 && exp < 113 {
    denorm_shift = (113 - exp) as u32;
    exp = 113;
  }
  let mut leading_one = leading_one_from_table;
  if !flush && exp == 0 {
    leading_one = false;
  }
  if !flush && exp == 0 && x_is_dnorm {
    exp = 1;
  }
  let sig = ((x & 0x7F_FFFF) as i64 | ((leading_one as i64) << 23)) >> denorm_shift.min(63);
  (sig, exp)
}

/// One lane's product: flags per the kernel's rules, the tree-local biased
/// exponent, and the exact product magnitude formed on the host double multiplier.
fn lane_product(
  a: u32,
  b: u32,
  a_is_zero: bool,
  b_is_zero: bool,
  a_is_dnorm: bool,
  b_is_dnorm: bool,
  emul: bool,
  part: u32,
  bias15: bool,
  fp16_emul: bool,
  gen3: bool,
  flush: bool,
) -> (DVal, f64) {
  if is_nan_fp32(a) || is_nan_fp32(b) || (is_inf_fp32(a) && b_is_zero) || (is_inf_fp32(b) && a_is_zero)
  {
    return (DVal { w: 0xFF, ..DVal::NAN }, 0.0);
  }
  if is_inf_fp32(a) || is_inf_fp32(b) {
    return (DVal { w: 0xFF, ..DVal::inf((a ^ b) >> 31 == 1) }, 0.0);
  }
  if a_is_zero || b_is_zero || (a_is_dnorm && flush) || (b_is_dnorm && flush) {
    return (DVal { w: -127, ..DVal::zero((a ^ b) >> 31 == 1) }, 0.0);
  }

  let (a_l1, b_l1) = if fp16_emul || emul {
    if gen3 && !fp16_emul {
      (!emul || matches!(part, 5 | 6 | 7), !emul || matches!(part, 1 | 4 | 7))
    } else {
      (!emul || matches!(part, 2 | 3), !emul || matches!(part, 1 | 3))
    }
  } else {
    (true, true)
  };
  let (a_sig, a_exp) = operand_sig_exp(a, a_is_dnorm, a_l1, bias15, flush);
  let (b_sig, b_exp) = operand_sig_exp(b, b_is_dnorm, b_l1, bias15, flush);

  // The product magnitudes are non-negative by construction (signs live in the
  // flags), and exact: at most 48 significand bits.
  let av = a_sig as f64 * exp2i(a_exp - 150);
  let bv = b_sig as f64 * exp2i(b_exp - 150);
  let p = av * bv;

  let val = DVal {
    m: 0,
    w: a_exp + b_exp - 127, // the lane's biased exponent, for the window race
    is_zero: false,
    is_inf: false,
    is_nan: false,
    is_neg: (a ^ b) >> 31 == 1,
  };
  (val, p)
}

/// `trunc(p / 2^w)` for a non-negative exact double `p`, by bit surgery.
fn window_int(p: f64, w: i32) -> i128 {
  if p == 0.0 {
    return 0;
  }
  let bits = p.to_bits();
  let e = (bits >> 52 & 0x7FF) as i32 - 1023;
  debug_assert!(e > -1023, "products never reach the double denormal range");
  let m53 = (bits & ((1 << 52) - 1) | (1 << 52)) as i128;
  let shift = e - 52 - w;
  if shift >= 0 { m53 << shift.min(70) } else { m53 >> (-shift).min(127) }
}

/// Exact aligned addition of two numeric values, with the tail of the smaller
/// operand folded into a sticky once the gap exceeds the exact budget.
fn add_aligned(a: DVal, b: DVal, mode: RoundMode) -> (DVal, bool) {
  if a.is_nan || b.is_nan || (a.is_inf && b.is_inf && a.is_neg != b.is_neg) {
    return (DVal::NAN, false);
  }
  if a.is_inf || b.is_inf {
    return (DVal::inf(if a.is_inf { a.is_neg } else { b.is_neg }), false);
  }
  if a.is_zero && b.is_zero {
    let neg = if mode == RoundMode::TowardNeg { a.is_neg || b.is_neg } else { a.is_neg && b.is_neg };
    return (DVal::zero(neg), false);
  }
  if a.is_zero {
    return (b, false);
  }
  if b.is_zero {
    return (a, false);
  }

  let (hi, lo) = if a.w >= b.w { (a, b) } else { (b, a) };
  let gap = (hi.w - lo.w) as u32;
  // Keep up to 70 bits of the gap exactly (the operands hold < 56 significant
  // bits, so this fits i128 with room to spare); deeper bits of the small operand
  // become the sticky.
  let keep = gap.min(70);
  let drop = (gap - keep).min(127);
  let lo_shifted = lo.m >> drop;
  let sticky = lo.m != lo_shifted << drop;
  let m = (hi.m << keep) + lo_shifted;
  let w = hi.w - keep as i32;

  if m == 0 {
    let neg = if mode == RoundMode::TowardNeg { a.is_neg || b.is_neg } else { a.is_neg && b.is_neg };
    return (DVal { w, ..DVal::zero(neg) }, sticky);
  }
  (
    DVal { m, w, is_zero: false, is_inf: false, is_nan: false, is_neg: m < 0 },
    sticky,
  )
}

/// Round an exact value `m × 2^w` (with flags and a sticky) into a packed fp32
/// word. This performs, in one explicit step, the final rounding decision the
/// original path forced onto the host FPU: given the exact sum it decides
/// bit-for-bit whether the eventual fp32 truncation rounds up, down, or toward
/// zero.
fn pack_window(
  m: i128,
  w: i32,
  is_zero: bool,
  is_inf: bool,
  is_nan: bool,
  is_neg: bool,
  sticky: bool,
  mode: RoundMode,
  denorm_promote_fix: bool,
  flush_denorm: bool,
) -> u32 {
  if is_nan {
    return DEFAULT_NAN_FP32;
  }
  if is_inf {
    return if is_neg { 0xFF80_0000 } else { 0x7F80_0000 };
  }
  // The sticky borrows one ulp from a negative magnitude (the two's-complement
  // fold of the engine's normaliser).
  let mut mag = m.unsigned_abs();
  if m < 0 && sticky {
    mag -= 1;
  }
  if is_zero || mag == 0 {
    return if sticky && is_neg && mode == RoundMode::TowardNeg {
      0xBF80_0000
    } else if sticky && !is_neg && mode == RoundMode::TowardPos {
      0x3F80_0000
    } else if is_neg {
      0x8000_0000
    } else {
      0
    };
  }

  let lz = 127 - mag.leading_zeros() as i32;
  let mut exp = lz + w + 127;
  let l_used = if denorm_promote_fix && exp == 0 { lz + 1 } else { lz };

  let guard = l_used >= 24 && (mag >> (l_used - 24)) & 1 == 1;
  let round_sticky =
    l_used >= 25 && ((mag & ((1u128 << (l_used - 24)) - 1)) != 0 || sticky);
  let mut man = if l_used >= 23 {
    ((mag >> (l_used - 23)) & 0xFF_FFFF) as u32
  } else {
    (mag as u32) << (23 - l_used)
  };
  man += round_up(mode, guard, round_sticky, man & 1 == 1, is_neg, 0, 0) as u32;

  if denorm_promote_fix {
    if (exp > 0 && man >> 24 & 1 == 1) || (exp == 0 && man >> 23 & 1 == 1) {
      exp += 1;
    }
  } else if man >> 24 & 1 == 1 {
    exp += 1;
  }

  if exp > 254 {
    if is_neg { 0xFF80_0000 } else { 0x7F80_0000 }
  } else if exp < 1 {
    if flush_denorm {
      if is_neg {
        if mode == RoundMode::TowardNeg { 0x8080_0000 } else { 0x8000_0000 }
      } else if mode == RoundMode::TowardPos {
        0x0080_0000
      } else {
        0
      }
    } else {
      let shift = (1 - exp).min(31) as u32;
      man >>= shift;
      let mut out = 0;
      out = ibs(out, 31, 31, is_neg as u32);
      ibs(out, 22, 0, man)
    }
  } else {
    let mut out = 0;
    out = ibs(out, 31, 31, is_neg as u32);
    out = ibs(out, 30, 23, exp as u32);
    ibs(out, 22, 0, man)
  }
}

/// Recompute [`mul_add_tree`](super::mul_add_tree) through the double-precision
/// path. Must agree bit-for-bit with the fixed-point engine for every supported
/// configuration.
pub fn mul_add_tree_double_check(a: &[u32], b: &[u32], c: u32, cfg: &TreeConfig) -> u32 {
  let n = a.len();
  assert!(n == b.len(), "lane arrays must have equal length");
  assert!(n >= 1 && n <= MAX_LANES, "lane count {n} out of range");

  let mut a: [u32; MAX_LANES] = core::array::from_fn(|i| if i < n { a[i] } else { 0 });
  let mut b: [u32; MAX_LANES] = core::array::from_fn(|i| if i < n { b[i] } else { 0 });
  let mut c = c;

  if cfg.flush_denorm {
    for i in 0 .. n {
      if is_denorm_fp32(a[i]) {
        a[i] = ibs(a[i], 30, 0, 0);
      }
      if is_denorm_fp32(b[i]) {
        b[i] = ibs(b[i], 30, 0, 0);
      }
    }
    if is_denorm_fp32(c) {
      c = ibs(c, 30, 0, 0);
    }
  }

  let mut a_zero = [false; MAX_LANES];
  let mut b_zero = [false; MAX_LANES];
  let mut a_dnorm = [false; MAX_LANES];
  let mut b_dnorm = [false; MAX_LANES];
  for i in 0 .. n {
    a_zero[i] = is_zero_fp32(a[i]);
    b_zero[i] = is_zero_fp32(b[i]);
    a_dnorm[i] = is_denorm_fp32(a[i]);
    b_dnorm[i] = is_denorm_fp32(b[i]);
  }
  if cfg.gen3 && cfg.fp16_emul {
    group_uniform(&mut a_zero, &mut a_dnorm, n, 4);
    group_uniform(&mut b_zero, &mut b_dnorm, n, 4);
  }
  if cfg.gen3 && cfg.fp32_emul && !cfg.fp16_emul {
    group_uniform(&mut a_zero, &mut a_dnorm, n, 8);
    group_uniform(&mut b_zero, &mut b_dnorm, n, 8);
  }

  // Lane products on the host multiplier, and the anchor: the largest lane
  // exponent fixes the accumulator window.
  let in_tree = cfg.c_placement == CPlacement::InTree;
  let group_len = if cfg.gen3 && !cfg.fp16_emul { 8 } else { 4 };
  let mut lanes = [DVal::default(); MAX_LANES];
  let mut mags = [0.0f64; MAX_LANES];
  let mut max_exp = i32::MIN;
  for i in 0 .. n {
    let is_acc = in_tree && n % 2 == 1 && i == n - 1;
    let (val, mag) = lane_product(
      a[i],
      b[i],
      a_zero[i],
      b_zero[i],
      a_dnorm[i],
      b_dnorm[i],
      (cfg.fp32_emul || cfg.fp16_emul) && !is_acc,
      (i % group_len) as u32,
      cfg.denorm_bias15 && !is_acc,
      cfg.fp16_emul && !is_acc,
      cfg.gen3,
      cfg.flush_denorm,
    );
    lanes[i] = val;
    mags[i] = mag;
    max_exp = max_exp.max(val.w);
  }
  if in_tree {
    max_exp = max_exp.max(-5);
  }

  // Windowed accumulation: positive and negative partial sums kept apart, each
  // lane magnitude-truncated at the window's granularity.
  let window = max_exp - 147 - cfg.k as i32;
  let mut pos_sum: i128 = 0;
  let mut neg_sum: i128 = 0;
  let mut sum_is_inf = false;
  let mut sum_is_nan = false;
  let mut sum_is_neg = false;
  let mut plus_inf = false;
  let mut minus_inf = false;
  let mut all_neg = true;
  for i in 0 .. n {
    let exp_diff = max_exp - lanes[i].w;
    let q = if exp_diff > cfg.k as i32 + 22 { 0 } else { window_int(mags[i], window) };
    if lanes[i].is_neg {
      neg_sum -= q;
    } else {
      pos_sum += q;
    }
    all_neg &= lanes[i].is_neg;
    sum_is_inf |= lanes[i].is_inf;
    sum_is_nan |= lanes[i].is_nan;
    sum_is_neg = if sum_is_nan {
      false
    } else if lanes[i].is_inf {
      lanes[i].is_neg
    } else {
      sum_is_neg
    };
    plus_inf |= lanes[i].is_inf && !lanes[i].is_neg;
    minus_inf |= lanes[i].is_inf && lanes[i].is_neg;
  }
  let total = pos_sum + neg_sum;
  sum_is_nan |= plus_inf && minus_inf;
  sum_is_inf &= !sum_is_nan;
  let sum_is_zero = total == 0 && !sum_is_inf && !sum_is_nan;
  if !sum_is_nan && !sum_is_inf {
    sum_is_neg = (sum_is_zero && all_neg) || total < 0;
  }
  let sum_val = DVal {
    m: total,
    w: window,
    is_zero: sum_is_zero,
    is_inf: sum_is_inf,
    is_nan: sum_is_nan,
    is_neg: sum_is_neg,
  };

  let mut result = match cfg.c_placement {
    CPlacement::AfterNorm | CPlacement::InTree => {
      let converted = pack_window(
        sum_val.m,
        sum_val.w,
        sum_val.is_zero,
        sum_val.is_inf,
        sum_val.is_nan,
        sum_val.is_neg,
        false,
        RoundMode::TowardZero,
        cfg.denorm_promote_fix,
        cfg.flush_denorm,
      );
      if in_tree {
        if converted == 0x8000_0000 { 0 } else { converted }
      } else {
        // The scalar FMA against C, at value level: exact aligned add, one
        // rounding.
        let rt = DVal::of_fp32(converted, cfg.flush_denorm);
        let cu = DVal::of_fp32(c, cfg.flush_denorm);
        let (s, sticky) = add_aligned(rt, cu, cfg.round);
        pack_window(
          s.m,
          s.w,
          s.is_zero,
          s.is_inf,
          s.is_nan,
          s.is_neg,
          sticky,
          cfg.round,
          false,
          cfg.flush_denorm,
        )
      }
    }
    CPlacement::BeforeNorm => {
      assert!(cfg.k <= 26, "the before-norm path only exists for K <= 26");
      // C passes through the multiplier's (26 − K)-bit truncation before joining.
      let mut cu = DVal::of_fp32(c, cfg.flush_denorm);
      if !cu.is_zero && !cu.is_inf && !cu.is_nan {
        let trunc = (26 - cfg.k).min(26);
        let mag = (cu.m.unsigned_abs() << 23) >> trunc;
        cu.m = if cu.is_neg { -(mag as i128) } else { mag as i128 };
        cu.w = cu.w - 23 + trunc as i32;
      }
      let (s, sticky) = add_aligned(sum_val, cu, cfg.round);
      pack_window(
        s.m,
        s.w,
        s.is_zero,
        s.is_inf,
        s.is_nan,
        s.is_neg,
        sticky,
        cfg.round,
        cfg.denorm_promote_fix,
        cfg.flush_denorm,
      )
    }
  };

  if !in_tree && total < 0 && is_zero_fp32(c) && is_zero_fp32(result) {
    result = ibs(result, 31, 31, 1);
  }

  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use super::super::tree::mul_add_tree;
  use crate::unit::UNIT_FP32;
  use proptest::prelude::*;

  const NE: RoundMode = RoundMode::NearestEven;

  fn plain(k: u32, round: RoundMode, c: CPlacement, flush: bool) -> TreeConfig {
    TreeConfig::plain(k, round, c, flush)
  }

  #[test]
  fn agrees_on_simple_vectors() {
    let a: Vec<u32> = [1.0f32, 2.0, -3.5, 0.25].iter().map(|x| x.to_bits()).collect();
    let b: Vec<u32> = [1.5f32, -0.5, 2.0, 8.0].iter().map(|x| x.to_bits()).collect();
    for k in [4, 12, 26] {
      for p in [CPlacement::AfterNorm, CPlacement::BeforeNorm] {
        for c in [0u32, 1.0f32.to_bits(), (-2.25f32).to_bits()] {
          let cfg = plain(k, NE, p, true);
          assert_eq!(
            mul_add_tree(&a, &b, c, &cfg),
            mul_add_tree_double_check(&a, &b, c, &cfg),
            "K={k} {p:?} c={c:#x}",
          );
        }
      }
    }
  }

  /// A bf16-valued lane generator: realistic operands for the narrow-input trees.
  fn bf16_lane() -> impl Strategy<Value = u32> {
    any::<u16>().prop_map(|x| crate::convert::bf16::bf16_to_fp32(x, false))
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(
      if cfg!(debug_assertions) { 2_000 } else { 20_000 }
    ))]

    /// The defining contract of this module: for N ∈ {2,4,8,16}, K ∈ {4,12,26},
    /// random bf16-sourced lanes and every C placement, the two paths agree bit
    /// for bit.
    #[test]
    fn cross_validation(
      lanes in prop::collection::vec((bf16_lane(), bf16_lane()), 16),
      c in bf16_lane(),
      k in prop::sample::select(vec![4u32, 12, 26]),
      n in prop::sample::select(vec![2usize, 4, 8, 16]),
      mode in prop::sample::select(vec![0u8, 1, 2, 3]),
      placement in prop::sample::select(vec![0u8, 1, 2]),
      flush in any::<bool>(),
    ) {
      let a: Vec<u32> = lanes[.. n].iter().map(|&(x, _)| x).collect();
      let b: Vec<u32> = lanes[.. n].iter().map(|&(_, y)| y).collect();
      let (a, b, c, placement) = match placement {
        0 => (a, b, c, CPlacement::AfterNorm),
        1 => (a, b, c, CPlacement::BeforeNorm),
        _ => {
          // In-tree: C rides as an extra lane and the count becomes odd.
          let mut a = a;
          let mut b = b;
          a.push(c);
          b.push(UNIT_FP32);
          (a, b, 0, CPlacement::InTree)
        }
      };
      let round = if placement == CPlacement::InTree {
        RoundMode::TowardZero
      } else {
        RoundMode::from_code(mode)
      };
      let cfg = plain(k, round, placement, flush);
      prop_assert_eq!(
        mul_add_tree(&a, &b, c, &cfg),
        mul_add_tree_double_check(&a, &b, c, &cfg),
        "n={} k={} {:?} {:?} flush={}", n, k, round, placement, flush,
      );
    }

    /// Special values (NaN, ±∞, ±0, denormals) thrown in at random positions.
    #[test]
    fn cross_validation_specials(
      mut lanes in prop::collection::vec((bf16_lane(), bf16_lane()), 8),
      idx in 0usize..8,
      special in prop::sample::select(vec![
        0x7FC0_0000u32, 0x7F80_0000, 0xFF80_0000, 0x8000_0000, 0x0000_0001, 0x0040_0000,
      ]),
      on_a in any::<bool>(),
      k in prop::sample::select(vec![4u32, 26]),
      flush in any::<bool>(),
    ) {
      if on_a { lanes[idx].0 = special } else { lanes[idx].1 = special }
      let a: Vec<u32> = lanes.iter().map(|&(x, _)| x).collect();
      let b: Vec<u32> = lanes.iter().map(|&(_, y)| y).collect();
      for placement in [CPlacement::AfterNorm, CPlacement::BeforeNorm] {
        let cfg = plain(k, NE, placement, flush);
        prop_assert_eq!(
          mul_add_tree(&a, &b, 0, &cfg),
          mul_add_tree_double_check(&a, &b, 0, &cfg),
          "{:?}", placement,
        );
      }
    }

    /// The emulation decompositions agree too.
    #[test]
    fn cross_validation_fp32_emul(a0: u32, b0: u32, c: u32, k in prop::sample::select(vec![4u32, 26])) {
      prop_assume!(!is_nan_fp32(a0) && !is_nan_fp32(b0) && !is_nan_fp32(c));
      prop_assert_eq!(
        super::super::presets::tree_fp32_emul_n1_add_c_in_tree_no_ftz(a0, b0, c, k),
        super::super::presets::tree_fp32_emul_n1_add_c_in_tree_no_ftz_dp(a0, b0, c, k),
      );
    }
  }

  #[test]
  fn named_dp_twins_agree() {
    let a = [0x3FC0u16, 0x4000, 0xBF80, 0x3F00, 0x4040, 0x0001, 0x8000, 0x7F80];
    let b = [0x3F80u16; 8];
    for c in [0u32, 1.0f32.to_bits(), 0x8000_0000] {
      assert_eq!(
        super::super::presets::tree_bf16_n8_k4_add_c_in_tree_no_ftz(&a, &b, c),
        super::super::presets::tree_bf16_n8_k4_add_c_in_tree_no_ftz_dp(&a, &b, c),
      );
      assert_eq!(
        super::super::presets::tree_bf16_n8_k26_add_c_in_tree_no_ftz(&a, &b, c),
        super::super::presets::tree_bf16_n8_k26_add_c_in_tree_no_ftz_dp(&a, &b, c),
      );
    }
  }
}
