use tracing::debug;

use super::{accumulate, check_alignment, check_bias, LayerContext};
use crate::arena::{ArenaSlices, ScratchRequest};
use crate::codec::BitPair;
use crate::error::{QnnError, QnnResult};
use crate::quant::{aligned_len, quantize_rows_into};
use crate::tensor::{FloatTensor, PackedMatrix, PackedTensor};

/// Quantized fully-connected layer: `out = bias + dequant(X_q · W_qᵀ)`.
///
/// `x` is `[batch, in_features]` (a rank-1 `x` is a batch of one), `w` is
/// `[out_features, in_features]` packed at `bits.weight`, and `out` must have
/// `batch` rows of `out_features`. Activations are quantized per row at
/// `bits.act`, with the reduction dimension padded to `alignment`.
#[allow(clippy::too_many_arguments)]
pub fn linear(
    ctx: &mut LayerContext<'_>,
    out: &mut FloatTensor,
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    alignment: usize,
) -> QnnResult<()> {
    let batch = x.shape().rows();
    let in_features = x.shape().row_len();
    check_linear(x, w, bias, bits, alignment)?;

    let out_features = w.rows();
    check_linear_output("linear", out, x, out_features)?;

    debug!(batch, in_features, out_features, pair = %bits, "linear");
    linear_rows(ctx, out.data_mut(), x.data(), batch, w, bias, bits, alignment)
}

/// Shape, bit-width and parameter checks shared with the threaded path.
pub(crate) fn check_linear(
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    alignment: usize,
) -> QnnResult<()> {
    check_alignment(alignment)?;
    if w.bits() != bits.weight {
        return Err(QnnError::BitWidthMismatch {
            requested: bits.weight,
            actual: w.bits(),
        });
    }
    w.shape().expect_rank("linear", 2)?;
    let in_features = x.shape().row_len();
    if w.row_len() != in_features {
        return Err(QnnError::shape("linear", &[w.rows(), in_features], w.dims()));
    }
    check_bias("linear", bias, w.rows())
}

/// Output dims for `x` through `out_features` features: `[out_features]` for
/// a rank-1 `x`, `[rows, out_features]` otherwise.
pub(crate) fn linear_output_dims(x: &FloatTensor, out_features: usize) -> Vec<usize> {
    if x.dims().len() == 1 {
        vec![out_features]
    } else {
        vec![x.shape().rows(), out_features]
    }
}

pub(crate) fn check_linear_output(
    op: &'static str,
    out: &FloatTensor,
    x: &FloatTensor,
    out_features: usize,
) -> QnnResult<()> {
    let expected = linear_output_dims(x, out_features);
    if out.dims() != expected.as_slice() {
        return Err(QnnError::shape(op, &expected, out.dims()));
    }
    Ok(())
}

/// Scratch needed to run `batch` rows through [`linear_rows`].
pub(crate) fn linear_request(
    batch: usize,
    in_features: usize,
    out_features: usize,
    bits: BitPair,
    alignment: usize,
) -> ScratchRequest {
    let stride = aligned_len(in_features, alignment);
    ScratchRequest {
        packed_bytes: bits.act.packed_len(batch * stride),
        rows: batch,
        accumulators: batch * out_features,
        ..ScratchRequest::default()
    }
}

/// Core of [`linear`] on raw row-major slices. `x` holds `batch` rows of
/// `w.row_len()` floats and `out` holds `batch` rows of `w.rows()`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn linear_rows(
    ctx: &mut LayerContext<'_>,
    out: &mut [f32],
    x: &[f32],
    batch: usize,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    alignment: usize,
) -> QnnResult<()> {
    let (k, n) = (w.row_len(), w.rows());
    let stride = aligned_len(k, alignment);

    let ArenaSlices {
        packed,
        scales,
        accumulators,
        ..
    } = ctx.arena.reserve(&linear_request(batch, k, n, bits, alignment))?;

    quantize_rows_into(x, batch, k, bits.act, packed, stride, scales)?;
    let xm = PackedMatrix::new(packed, bits.act, batch, k, stride, 0)?;

    match bias {
        Some(b) if n > 0 => out.chunks_exact_mut(n).for_each(|row| row.copy_from_slice(b)),
        _ => out.fill(0.0),
    }

    ctx.table.get(bits).run(accumulators, &xm, &w.matrix());
    accumulate(out, accumulators, scales, n, |j| w.row_scale(j), |i, j| i * n + j);
    Ok(())
}
