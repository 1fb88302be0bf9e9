use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use soft_fma::convert::bf16::{bf16_to_fp32, fp32_to_bf16};
use soft_fma::fma::presets::{
  tree_bf16_n8_k4_add_c_in_tree_no_ftz, tree_bf16_n8_k4_add_c_in_tree_no_ftz_dp,
};
use soft_fma::RoundMode;

// Establish a baseline by comparing with a single fpu fma

fn baseline_fpu_fma_f32(c: &mut Criterion) {
  c.bench_function("baseline_fpu_fma_f32", |b| {
    b.iter(|| black_box(3.14f32).mul_add(black_box(69.420), black_box(-1.5)));
  });
}

// Time one narrowing conversion

const NUMS_32: [u32; 4] = [
  0x3FC9_0FDB, // π/2
  0x0012_3456, // a denormal
  0xC2C8_0001, // -100.00000something: a sticky-dependent rounding
  0x7F7F_FFFF, // max normal
];

fn narrow_bf16(c: &mut Criterion) {
  let mut g = c.benchmark_group("fp32_to_bf16");
  for num in NUMS_32 {
    g.throughput(Throughput::Elements(1));
    g.bench_with_input(BenchmarkId::from_parameter(format_args!("{num:#010x}")), &num, |b, &num| {
      b.iter(|| fp32_to_bf16(black_box(num), RoundMode::NearestEven, 0, false, false, true));
    });
  }
  g.finish();
}

// Time an 8-lane bf16 tree, fixed-point engine vs the double-precision cross-check

fn lanes() -> ([u16; 8], [u16; 8], u32) {
  let a = [0x3FC0, 0x4000, 0xBF80, 0x3F00, 0x4040, 0x3F80, 0xC000, 0x3E80];
  let b = [0x3F80, 0x3FC0, 0x4000, 0xBF80, 0x3F00, 0x4040, 0x3F80, 0xC000];
  (a, b, bf16_to_fp32(0x3FA0, false))
}

fn tree_bf16(c: &mut Criterion) {
  let (a, b, acc) = lanes();
  let mut g = c.benchmark_group("tree_bf16_n8_k4");
  g.throughput(Throughput::Elements(8));
  g.bench_function("fixed_point", |bench| {
    bench.iter(|| tree_bf16_n8_k4_add_c_in_tree_no_ftz(black_box(&a), black_box(&b), black_box(acc)));
  });
  g.bench_function("double_check", |bench| {
    bench
      .iter(|| tree_bf16_n8_k4_add_c_in_tree_no_ftz_dp(black_box(&a), black_box(&b), black_box(acc)));
  });
  g.finish();
}

criterion_group!(baseline_fpu, baseline_fpu_fma_f32);

criterion_group!(convert, narrow_bf16);

criterion_group!(tree, tree_bf16);

criterion_main!(baseline_fpu, convert, tree);
