use super::{PackedMatrix, Shape};
use crate::codec::{self, BitWidth};
use crate::error::{QnnError, QnnResult};

/// Bit-packed tensor with dequantization scales.
///
/// Rows are the leading axis; each row holds `shape.row_len()` elements and
/// starts `row_stride` elements after the previous one (`row_stride` exceeds
/// the row length only when rows were padded for alignment).
///
/// `scales` holds one entry for the whole tensor, one per row, or one per
/// equal group of consecutive rows. A scale is the dequantization step:
/// `real ≈ decode(code) * scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedTensor {
    shape: Shape,
    bits: BitWidth,
    data: Vec<u8>,
    scales: Vec<f32>,
    row_stride: usize,
}

impl PackedTensor {
    /// Unpadded tensor with a single scale, as produced by a weight loader.
    pub fn new(dims: &[usize], bits: BitWidth, data: Vec<u8>, scale: f32) -> QnnResult<Self> {
        let shape = Shape::new(dims)?;
        let stride = shape.row_len();
        Self::with_layout(shape, bits, data, vec![scale], stride)
    }

    /// Full constructor: explicit scales and row stride.
    pub fn with_layout(
        shape: Shape,
        bits: BitWidth,
        data: Vec<u8>,
        scales: Vec<f32>,
        row_stride: usize,
    ) -> QnnResult<Self> {
        let rows = shape.rows();
        if row_stride < shape.row_len() {
            return Err(QnnError::InvalidParameter(format!(
                "row stride {row_stride} shorter than row length {}",
                shape.row_len()
            )));
        }
        if scales.is_empty() || rows % scales.len() != 0 {
            return Err(QnnError::InvalidParameter(format!(
                "{} scales cannot be spread over {rows} rows",
                scales.len()
            )));
        }
        let required = bits.packed_len(rows * row_stride);
        if data.len() < required {
            return Err(QnnError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }
        Ok(PackedTensor {
            shape,
            bits,
            data,
            scales,
            row_stride,
        })
    }

    /// Pack already-quantized integer values (saturating) with one scale.
    pub fn from_values(dims: &[usize], bits: BitWidth, values: &[i32], scale: f32) -> QnnResult<Self> {
        let shape = Shape::new(dims)?;
        if values.len() != shape.numel() {
            return Err(QnnError::shape("PackedTensor::from_values", &[shape.numel()], &[values.len()]));
        }
        Self::new(dims, bits, codec::pack_values(values, bits), scale)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn bits(&self) -> BitWidth {
        self.bits
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    pub fn row_len(&self) -> usize {
        self.shape.row_len()
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    /// The first (for per-tensor tensors, the only) scale.
    pub fn scale(&self) -> f32 {
        self.scales[0]
    }

    /// Scale that applies to leading-axis row `row`.
    #[inline]
    pub fn row_scale(&self, row: usize) -> f32 {
        let per = self.rows() / self.scales.len();
        self.scales[row / per]
    }

    /// Decoded value at (`row`, `col`) of the flattened 2-D layout.
    pub fn value(&self, row: usize, col: usize) -> i8 {
        codec::get_value(&self.data, row * self.row_stride + col, self.bits)
    }

    /// Whole tensor as a `rows × row_len` matrix view.
    pub fn matrix(&self) -> PackedMatrix<'_> {
        PackedMatrix::new(
            &self.data,
            self.bits,
            self.rows(),
            self.row_len(),
            self.row_stride,
            0,
        )
        .unwrap_or_else(|_| unreachable!("extent validated at construction"))
    }
}
