//! Multi-threaded quantized linear layer.

use std::thread;

use tracing::debug;

use crate::arena::ScratchArena;
use crate::codec::BitPair;
use crate::error::{QnnError, QnnResult};
use crate::pipeline::linear::{check_linear, check_linear_output, linear_request, linear_rows};
use crate::pipeline::LayerContext;
use crate::runtime::KernelTable;
use crate::tensor::{FloatTensor, PackedTensor};

/// Batch rows a worker should get at minimum.
const MIN_ROWS_PER_THREAD: usize = 4;

/// [`crate::pipeline::linear`] with the batch split across threads.
///
/// Each worker quantizes its own rows into its own arena, so results are
/// identical to the single-threaded call. Every worker's reservation is
/// checked before any thread starts.
///
/// # Arguments
///
/// * `arenas` - One arena per potential worker; the thread count never
///   exceeds `arenas.len()`
#[allow(clippy::too_many_arguments)]
pub fn linear_parallel(
    table: &KernelTable,
    arenas: &mut [ScratchArena],
    out: &mut FloatTensor,
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    alignment: usize,
) -> QnnResult<()> {
    if arenas.is_empty() {
        return Err(QnnError::InvalidParameter("linear_parallel needs at least one arena".into()));
    }
    check_linear(x, w, bias, bits, alignment)?;

    let (batch, k, n) = (x.shape().rows(), w.row_len(), w.rows());
    check_linear_output("linear_parallel", out, x, n)?;

    let threads = if k == 0 || n == 0 {
        1
    } else {
        choose_thread_count(batch, n, k, arenas.len())
    };

    if threads == 1 {
        let mut ctx = LayerContext::new(table, &mut arenas[0]);
        return linear_rows(&mut ctx, out.data_mut(), x.data(), batch, w, bias, bits, alignment);
    }

    let rows_per_thread = batch.div_ceil(threads);
    let request = linear_request(rows_per_thread, k, n, bits, alignment);
    for arena in arenas.iter().take(threads) {
        arena.check(&request)?;
    }
    debug!(batch, threads, rows_per_thread, pair = %bits, "linear_parallel");

    thread::scope(|s| {
        let handles: Vec<_> = out
            .data_mut()
            .chunks_mut(rows_per_thread * n)
            .zip(x.data().chunks(rows_per_thread * k))
            .zip(arenas.iter_mut())
            .map(|((out_rows, x_rows), arena)| {
                s.spawn(move || {
                    let rows = x_rows.len() / k;
                    let mut ctx = LayerContext::new(table, arena);
                    linear_rows(&mut ctx, out_rows, x_rows, rows, w, bias, bits, alignment)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect::<QnnResult<Vec<()>>>()
    })?;
    Ok(())
}

/// Threads worth using for a `m × n × k` layer, capped by `max_threads`.
pub fn choose_thread_count(m: usize, n: usize, k: usize, max_threads: usize) -> usize {
    let ops = 2.0 * (m * n * k) as f64;

    const SINGLE_THREAD_THRESHOLD: f64 = 2_000_000.0;
    const TWO_THREAD_THRESHOLD: f64 = 8_000_000.0;

    let optimal_threads = if ops < SINGLE_THREAD_THRESHOLD {
        1
    } else if ops < TWO_THREAD_THRESHOLD {
        2
    } else {
        max_threads
    };

    let threads_by_rows = (m / MIN_ROWS_PER_THREAD).max(1);

    optimal_threads.min(threads_by_rows).min(max_threads).max(1)
}
