//! Benchmark runner for quantized kernel strategies.
//!
//! Runs one linear layer for every bit-width pair under every selected
//! strategy, checks each result against the reference strategy and prints
//! a summary table.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use qmatmul::arena::ScratchArena;
use qmatmul::threaded::linear_parallel;
use qmatmul::{
    quantize_tensor, BitPair, BitWidth, Engine, EngineConfig, FailFast, FloatTensor, KernelTable,
    PackedTensor, Strategy,
};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "qmatmul", about = "Benchmark quantized matmul kernel strategies")]
struct Args {
    /// Engine config (JSON); QMATMUL_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Strategies to compare, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    strategies: Vec<Strategy>,

    #[arg(long, default_value_t = 16)]
    batch: usize,

    #[arg(long, default_value_t = 512)]
    in_features: usize,

    #[arg(long, default_value_t = 256)]
    out_features: usize,

    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Worker threads for the multi-threaded run (1 disables it)
    #[arg(long, default_value_t = 4)]
    threads: usize,
}

struct Layer {
    x: FloatTensor,
    weights: Vec<PackedTensor>,
    bias: Vec<f32>,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref()).or_abort("config");
    let strategies = if args.strategies.is_empty() {
        Strategy::ALL.to_vec()
    } else {
        args.strategies.clone()
    };

    println!("=== Quantized MatMul Benchmark ===\n");
    println!(
        "Layer: batch={} in={} out={}  alignment={}  AVX2={}\n",
        args.batch,
        args.in_features,
        args.out_features,
        config.alignment,
        qmatmul::kernels::avx2::available()
    );

    let layer = build_layer(&args, config.alignment);
    let mut engine = Engine::new(config.clone()).or_abort("engine");

    // Reference outputs, one per pair
    engine.select_strategy(Strategy::Reference);
    let expected: Vec<FloatTensor> = BitPair::all()
        .map(|pair| run_linear(&mut engine, &layer, pair, args.out_features))
        .collect();

    let mut columns: Vec<(String, Vec<f64>)> = Vec::new();
    let mut mismatches = 0;

    for &strategy in &strategies {
        engine.select_strategy(strategy);
        println!("Strategy: {strategy}");
        println!("{}", "-".repeat(50));

        let mut times = Vec::new();
        for (idx, pair) in BitPair::all().enumerate() {
            let (time_ms, gops) = bench(&args, || {
                run_linear(&mut engine, &layer, pair, args.out_features);
            });
            let actual = run_linear(&mut engine, &layer, pair, args.out_features);
            let ok = actual == expected[idx];
            if !ok {
                mismatches += 1;
                error!(%strategy, %pair, "output differs from reference");
            }
            println!(
                "{:>8} ({:9}) {:8.3} ms  {:6.2} GOPS  {}",
                pair.to_string(),
                engine.table().get(pair).backend,
                time_ms,
                gops,
                if ok { "ok" } else { "MISMATCH" }
            );
            times.push(time_ms);
        }
        println!();
        columns.push((strategy.to_string(), times));
    }

    if args.threads > 1 {
        let table = KernelTable::for_strategy(Strategy::Unroll);
        let mut arenas: Vec<ScratchArena> =
            (0..args.threads).map(|_| ScratchArena::new(&config.scratch)).collect();
        let mut times = Vec::new();
        for (idx, pair) in BitPair::all().enumerate() {
            let w = weight_for(&layer, pair.weight);
            let mut out = FloatTensor::zeros(&[args.batch, args.out_features]).or_abort("output");
            let (time_ms, _) = bench(&args, || {
                let bias = Some(layer.bias.as_slice());
                linear_parallel(&table, &mut arenas, &mut out, &layer.x, w, bias, pair, config.alignment)
                    .or_abort("linear_parallel");
            });
            if out != expected[idx] {
                mismatches += 1;
                error!(%pair, "multi-threaded output differs from reference");
            }
            times.push(time_ms);
        }
        columns.push((format!("unroll MT{}", args.threads), times));
    }

    print_summary_table(&columns);

    if mismatches > 0 {
        error!(mismatches, "benchmark found mismatching outputs");
        std::process::exit(1);
    }
    info!("all outputs match the reference");
}

fn build_layer(args: &Args, alignment: usize) -> Layer {
    let (b, k, n) = (args.batch, args.in_features, args.out_features);
    let x = FloatTensor::from_fn(&[b, k], |i| ((i % 100) as f32 - 50.0) / 25.0).or_abort("activations");
    let wf = FloatTensor::from_fn(&[n, k], |i| ((i * 7 % 61) as f32 - 30.0) / 30.0).or_abort("weights");
    let weights = BitWidth::ALL
        .iter()
        .map(|&bits| quantize_tensor(&wf, bits, alignment).or_abort("weight quantization"))
        .collect();
    let bias = (0..n).map(|j| (j % 5) as f32 * 0.1).collect();
    Layer { x, weights, bias }
}

fn weight_for(layer: &Layer, bits: BitWidth) -> &PackedTensor {
    &layer.weights[bits.log2()]
}

fn run_linear(engine: &mut Engine, layer: &Layer, pair: BitPair, out_features: usize) -> FloatTensor {
    let batch = layer.x.shape().rows();
    let mut out = FloatTensor::zeros(&[batch, out_features]).or_abort("output");
    engine
        .linear(&mut out, &layer.x, weight_for(layer, pair.weight), Some(layer.bias.as_slice()), pair)
        .or_abort("linear");
    out
}

/// Average time in ms and integer GOPS over `args.iterations` runs after a
/// warmup.
fn bench<F: FnMut()>(args: &Args, mut f: F) -> (f64, f64) {
    // Warmup
    f();

    let iterations = args.iterations.max(1);
    let mut total = 0.0;
    for _ in 0..iterations {
        let start = Instant::now();
        f();
        total += start.elapsed().as_secs_f64();
    }

    let avg = total / iterations as f64;
    let ops = 2.0 * (args.batch * args.in_features * args.out_features) as f64;
    (avg * 1000.0, ops / avg / 1e9)
}

fn print_summary_table(columns: &[(String, Vec<f64>)]) {
    let width = 12 + 14 * columns.len();
    println!("\n{}", "=".repeat(width));
    println!("SUMMARY (ms per call)");
    println!("{}", "=".repeat(width));

    print!("\n{:<10}", "Pair");
    for (name, _) in columns {
        print!(" {:>13}", name);
    }
    println!();
    println!("{}", "-".repeat(width));

    for (idx, pair) in BitPair::all().enumerate() {
        print!("{:<10}", pair.to_string());
        for (_, times) in columns {
            print!(" {:>13.3}", times[idx]);
        }
        println!();
    }

    println!("{}", "=".repeat(width));
    println!("\nLower is better. Every column is checked against the reference strategy.\n");
}
