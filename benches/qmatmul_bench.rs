//! Kernel and layer benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qmatmul::codec::pack_values;
use qmatmul::pipeline::{ConvParams, LayerContext};
use qmatmul::{
    conv2d, BitPair, BitWidth, FloatTensor, KernelTable, PackedMatrix, PackedTensor, ScratchArena,
    ScratchConfig, Strategy,
};

const M: usize = 16;
const N: usize = 128;
const K: usize = 512;

fn packed(rows: usize, bits: BitWidth, seed: usize) -> Vec<u8> {
    let values: Vec<i32> = (0..rows * K)
        .map(|i| ((i * 31 + seed) % 17) as i32 - 8)
        .collect();
    pack_values(&values, bits)
}

// =============================================================================
// Benchmark: kernels, one group per bit-width pair
// =============================================================================

fn bench_kernels(c: &mut Criterion) {
    let pairs = [
        BitPair::new(BitWidth::B8, BitWidth::B8),
        BitPair::new(BitWidth::B8, BitWidth::B2),
        BitPair::new(BitWidth::B4, BitWidth::B4),
        BitPair::new(BitWidth::B1, BitWidth::B1),
    ];

    for pair in pairs {
        let x = packed(M, pair.act, 3);
        let w = packed(N, pair.weight, 11);
        let xm = PackedMatrix::dense(&x, pair.act, M, K).unwrap();
        let wm = PackedMatrix::dense(&w, pair.weight, N, K).unwrap();
        let mut out = vec![0i32; M * N];

        let mut group = c.benchmark_group(format!("kernel_{pair}"));
        group.throughput(Throughput::Elements((2 * M * N * K) as u64));
        for strategy in Strategy::ALL {
            let table = KernelTable::for_strategy(strategy);
            let cell = table.get(pair);
            group.bench_with_input(BenchmarkId::new(strategy.name(), cell.backend), &cell, |b, cell| {
                b.iter(|| cell.run(black_box(&mut out), black_box(&xm), black_box(&wm)))
            });
        }
        group.finish();
    }
}

// =============================================================================
// Benchmark: blocked conv2d
// =============================================================================

fn bench_conv2d(c: &mut Criterion) {
    let (ic, oc, hw, k) = (16, 32, 16, 3);
    let x = FloatTensor::from_fn(&[1, ic, hw, hw], |i| ((i % 23) as f32 - 11.0) / 7.0).unwrap();
    let wv: Vec<i32> = (0..oc * ic * k * k).map(|i| (i % 3) as i32 - 1).collect();
    let w = PackedTensor::from_values(&[oc, ic, k, k], BitWidth::B2, &wv, 0.05).unwrap();
    let bias = vec![0.1f32; oc];
    let params = ConvParams::new(1, 1);
    let bits = BitPair::new(BitWidth::B8, BitWidth::B2);

    let mut group = c.benchmark_group("conv2d_16x16");
    for strategy in [Strategy::Reference, Strategy::Unroll, Strategy::Lut] {
        let table = KernelTable::for_strategy(strategy);
        let mut arena = ScratchArena::new(&ScratchConfig::default());
        let mut out = FloatTensor::zeros(&[1, oc, hw, hw]).unwrap();

        group.bench_function(strategy.name(), |b| {
            b.iter(|| {
                let mut ctx = LayerContext::new(&table, &mut arena);
                conv2d(&mut ctx, &mut out, black_box(&x), &w, Some(bias.as_slice()), bits, &params, 32).unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_kernels, bench_conv2d);
criterion_main!(benches);
