//! Absmax row quantization and dequantization.

use tracing::debug;

use crate::codec::{self, BitWidth};
use crate::error::{QnnError, QnnResult};
use crate::tensor::{FloatTensor, PackedTensor};

/// Largest absolute value in `x` (0 for an empty slice).
pub fn absmax(x: &[f32]) -> f32 {
    x.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()))
}

/// Mean absolute value of `x` (0 for an empty slice).
pub fn absmean(x: &[f32]) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().map(|v| v.abs()).sum::<f32>() / x.len() as f32
}

/// `n` rounded up to a multiple of `alignment`.
pub fn aligned_len(n: usize, alignment: usize) -> usize {
    n.div_ceil(alignment.max(1)) * alignment.max(1)
}

/// Quantization factor and dequantization step for a set of values.
///
/// For 2, 4 and 8 bits the factor is `(2^(bits-1) - 1) / absmax` and the
/// step is its reciprocal. 1-bit binarises by sign, so the step is the mean
/// absolute value instead. A degenerate input yields `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub factor: f32,
    pub step: f32,
}

impl QuantParams {
    pub fn for_values(x: &[f32], bits: BitWidth) -> QuantParams {
        match bits {
            BitWidth::B1 => {
                let step = absmean(x);
                QuantParams {
                    factor: if step > 0.0 { 1.0 / step } else { 0.0 },
                    step,
                }
            }
            _ => {
                let m = absmax(x);
                if m > 0.0 {
                    let factor = bits.quant_max() as f32 / m;
                    QuantParams {
                        factor,
                        step: 1.0 / factor,
                    }
                } else {
                    QuantParams {
                        factor: 0.0,
                        step: 0.0,
                    }
                }
            }
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.step == 0.0
    }

    /// Code for one value: scale, round half away from zero, clamp, encode.
    #[inline]
    pub fn code(&self, x: f32, bits: BitWidth) -> u8 {
        match bits {
            BitWidth::B1 => codec::encode(if x > 0.0 { 1 } else { -1 }, bits),
            _ => {
                let q = (x * self.factor)
                    .round()
                    .clamp(bits.min_value() as f32, bits.max_value() as f32);
                codec::encode(q as i32, bits)
            }
        }
    }
}

/// Quantize one row into `dst`, starting at element `start`.
///
/// Writes `padded_len` elements: the row's codes, then zero codes up to the
/// padded length. Returns the row's dequantization step.
pub fn quantize_row_into(
    row: &[f32],
    bits: BitWidth,
    dst: &mut [u8],
    start: usize,
    padded_len: usize,
) -> QnnResult<f32> {
    if padded_len < row.len() {
        return Err(QnnError::InvalidParameter(format!(
            "padded length {padded_len} shorter than row length {}",
            row.len()
        )));
    }
    let required = bits.packed_len(start + padded_len);
    if dst.len() < required {
        return Err(QnnError::BufferTooSmall {
            required,
            actual: dst.len(),
        });
    }

    let params = QuantParams::for_values(row, bits);
    if params.is_degenerate() && !row.is_empty() {
        debug!(len = row.len(), %bits, "degenerate row (zero magnitude), step is 0");
    }

    for (i, &x) in row.iter().enumerate() {
        codec::set_code(dst, start + i, bits, params.code(x, bits));
    }
    for i in row.len()..padded_len {
        codec::set_code(dst, start + i, bits, 0);
    }
    Ok(params.step)
}

/// Quantize a single row into a fresh buffer. Returns `(codes, step)`.
pub fn quantize_row(row: &[f32], bits: BitWidth) -> (Vec<u8>, f32) {
    let mut data = vec![0u8; bits.packed_len(row.len())];
    let params = QuantParams::for_values(row, bits);
    for (i, &x) in row.iter().enumerate() {
        codec::set_code(&mut data, i, bits, params.code(x, bits));
    }
    (data, params.step)
}

/// Quantize `rows` contiguous rows of `cols` floats, one step per row.
///
/// Row `r` lands at element `r * stride` of `dst`; `scales[r]` receives its
/// step.
pub fn quantize_rows_into(
    src: &[f32],
    rows: usize,
    cols: usize,
    bits: BitWidth,
    dst: &mut [u8],
    stride: usize,
    scales: &mut [f32],
) -> QnnResult<()> {
    if src.len() < rows * cols {
        return Err(QnnError::shape("quantize_rows", &[rows * cols], &[src.len()]));
    }
    if scales.len() < rows {
        return Err(QnnError::shape("quantize_rows", &[rows], &[scales.len()]));
    }
    for (r, scale) in scales.iter_mut().take(rows).enumerate() {
        let row = &src[r * cols..(r + 1) * cols];
        *scale = quantize_row_into(row, bits, dst, r * stride, stride)?;
    }
    Ok(())
}

/// Quantize every leading-axis row of `x` with its own scale.
///
/// Rows are padded with zero codes up to a multiple of `alignment`.
pub fn quantize_tensor(x: &FloatTensor, bits: BitWidth, alignment: usize) -> QnnResult<PackedTensor> {
    let shape = *x.shape();
    let rows = shape.rows();
    let cols = shape.row_len();
    let stride = aligned_len(cols, alignment);

    let mut data = vec![0u8; bits.packed_len(rows * stride)];
    let mut scales = vec![0.0f32; rows];
    quantize_rows_into(x.data(), rows, cols, bits, &mut data, stride, &mut scales)?;

    PackedTensor::with_layout(shape, bits, data, scales, stride)
}

/// Quantize `x` with one scale for the whole tensor, the form weight
/// loaders usually ship.
pub fn quantize_per_tensor(x: &FloatTensor, bits: BitWidth) -> QnnResult<PackedTensor> {
    let params = QuantParams::for_values(x.data(), bits);
    if params.is_degenerate() {
        debug!(dims = ?x.dims(), %bits, "degenerate tensor (zero magnitude), step is 0");
    }
    let mut data = vec![0u8; bits.packed_len(x.data().len())];
    for (i, &v) in x.data().iter().enumerate() {
        codec::set_code(&mut data, i, bits, params.code(v, bits));
    }
    PackedTensor::new(x.dims(), bits, data, params.step)
}

/// Real value of a single code.
#[inline]
pub fn dequantize(code: u8, bits: BitWidth, scale: f32) -> f32 {
    codec::decode(code, bits) as f32 * scale
}

/// Expand a packed tensor back to floats (padding dropped).
pub fn dequantize_tensor(p: &PackedTensor) -> QnnResult<FloatTensor> {
    let cols = p.row_len();
    let mut out = Vec::with_capacity(p.rows() * cols);
    for r in 0..p.rows() {
        let scale = p.row_scale(r);
        out.extend((0..cols).map(|c| p.value(r, c) as f32 * scale));
    }
    FloatTensor::new(p.dims(), out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_bit_uses_127_over_absmax() {
        let p = QuantParams::for_values(&[0.5, -2.0, 1.0], BitWidth::B8);
        assert_eq!(p.factor, 63.5);
        assert_eq!(p.code(-2.0, BitWidth::B8), (-127i8) as u8);
        assert_eq!(p.code(1.0, BitWidth::B8), 64);
    }

    #[test]
    fn one_bit_zero_is_negative() {
        let (codes, step) = quantize_row(&[1.0, 0.0, -3.0, 2.0], BitWidth::B1);
        assert_eq!(codes, vec![0b0110]);
        assert_eq!(step, 1.5);
    }

    #[test]
    fn degenerate_row_has_zero_step() {
        let (codes, step) = quantize_row(&[0.0; 5], BitWidth::B4);
        assert_eq!(step, 0.0);
        assert_eq!(codes, vec![0, 0, 0]);
    }

    #[test]
    fn padding_is_zeroed() {
        let mut dst = [0xFFu8; 2];
        let step = quantize_row_into(&[1.0, -1.0], BitWidth::B4, &mut dst, 0, 4).unwrap();
        assert_eq!(step, 1.0 / 7.0);
        assert_eq!(dst, [0x97, 0x00]);
    }
}
