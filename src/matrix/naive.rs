//! Unblocked reference layers.
//!
//! Same arithmetic as the pipeline, but with one heap-allocated im2col per
//! (batch, group) covering every output position, no arena and always the
//! reference kernel. Activation scales are per row, so splitting rows into
//! blocks cannot change any value: the pipeline must match these exactly.

use crate::codec::{BitPair, BitWidth};
use crate::error::{QnnError, QnnResult};
use crate::kernels::reference;
use crate::pipeline::conv::seed_output;
use crate::pipeline::linear::linear_output_dims;
use crate::pipeline::{ConvGeometry, ConvParams};
use crate::quant::quantize_rows_into;
use crate::tensor::{FloatTensor, PackedMatrix, PackedTensor};

/// Quantize `rows × cols` floats densely and run the reference kernel.
/// Returns the accumulators and the per-row activation scales.
fn quantized_product(
    src: &[f32],
    rows: usize,
    cols: usize,
    act: BitWidth,
    w: &PackedMatrix<'_>,
) -> QnnResult<(Vec<i32>, Vec<f32>)> {
    let mut packed = vec![0u8; act.packed_len(rows * cols)];
    let mut scales = vec![0.0f32; rows];
    quantize_rows_into(src, rows, cols, act, &mut packed, cols, &mut scales)?;

    let xm = PackedMatrix::dense(&packed, act, rows, cols)?;
    let mut acc = vec![0i32; rows * w.rows()];
    reference::matmul(&mut acc, &xm, w);
    Ok((acc, scales))
}

pub fn naive_linear(
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
) -> QnnResult<FloatTensor> {
    let (batch, k) = (x.shape().rows(), x.shape().row_len());
    let n = w.rows();
    if w.row_len() != k {
        return Err(QnnError::shape("naive_linear", &[n, k], w.dims()));
    }

    let (acc, scales) = quantized_product(x.data(), batch, k, bits.act, &w.matrix())?;

    let mut out = vec![0.0f32; batch * n];
    for i in 0..batch {
        for j in 0..n {
            let b = bias.map_or(0.0, |b| b[j]);
            out[i * n + j] = b + acc[i * n + j] as f32 * (w.row_scale(j) * scales[i]);
        }
    }
    FloatTensor::new(&linear_output_dims(x, n), out)
}

fn naive_conv(
    geom: &ConvGeometry,
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
) -> QnnResult<Vec<f32>> {
    let red = geom.reduction();
    let ocg = geom.group_out();
    let positions = geom.positions();

    let mut out = vec![0.0f32; geom.output_len()];
    seed_output(geom, &mut out, bias);

    for n in 0..geom.batch {
        for g in 0..geom.groups {
            let mut cols = vec![0.0f32; positions * red];
            geom.gather(x.data(), n, g, 0, positions, &mut cols);

            let wm = w.matrix().sub_rows(g * ocg, ocg)?;
            let (acc, scales) = quantized_product(&cols, positions, red, bits.act, &wm)?;

            for p in 0..positions {
                for j in 0..ocg {
                    let o = acc[p * ocg + j];
                    out[geom.output_index(n, g * ocg + j, p)] +=
                        o as f32 * (w.row_scale(g * ocg + j) * scales[p]);
                }
            }
        }
    }
    Ok(out)
}

pub fn naive_conv1d(
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    params: &ConvParams,
) -> QnnResult<FloatTensor> {
    let geom = ConvGeometry::conv1d(x.dims(), w.dims(), params)?;
    let out = naive_conv(&geom, x, w, bias, bits)?;
    FloatTensor::new(&geom.conv1d_output_dims(), out)
}

pub fn naive_conv2d(
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    params: &ConvParams,
) -> QnnResult<FloatTensor> {
    let geom = ConvGeometry::conv2d(x.dims(), w.dims(), params)?;
    let out = naive_conv(&geom, x, w, bias, bits)?;
    FloatTensor::new(&geom.conv2d_output_dims(), out)
}
