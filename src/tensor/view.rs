//! Bounds-checked 2-D view over packed bytes.
//!
//! Kernels never compute byte offsets themselves; they go through
//! `PackedMatrix`, which validates the extent once at construction.

use crate::codec::{self, BitWidth};
use crate::error::{QnnError, QnnResult};

/// `rows × cols` packed elements. Row `r` starts at element
/// `offset + r * stride`; elements between `cols` and `stride` are padding and
/// are never read by a kernel.
#[derive(Debug, Clone, Copy)]
pub struct PackedMatrix<'a> {
    data: &'a [u8],
    bits: BitWidth,
    rows: usize,
    cols: usize,
    stride: usize,
    offset: usize,
}

impl<'a> PackedMatrix<'a> {
    pub fn new(
        data: &'a [u8],
        bits: BitWidth,
        rows: usize,
        cols: usize,
        stride: usize,
        offset: usize,
    ) -> QnnResult<Self> {
        if stride < cols {
            return Err(QnnError::InvalidParameter(format!(
                "row stride {stride} shorter than row length {cols}"
            )));
        }
        let end = if rows == 0 {
            offset
        } else {
            offset + (rows - 1) * stride + cols
        };
        let required = bits.packed_len(end);
        if data.len() < required {
            return Err(QnnError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }
        Ok(PackedMatrix {
            data,
            bits,
            rows,
            cols,
            stride,
            offset,
        })
    }

    /// Unpadded rows starting at element 0.
    pub fn dense(data: &'a [u8], bits: BitWidth, rows: usize, cols: usize) -> QnnResult<Self> {
        Self::new(data, bits, rows, cols, cols, 0)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn bits(&self) -> BitWidth {
        self.bits
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Element index of the first element of row `r`.
    #[inline]
    pub fn row_start(&self, r: usize) -> usize {
        debug_assert!(r < self.rows);
        self.offset + r * self.stride
    }

    #[inline]
    pub fn code(&self, r: usize, k: usize) -> u8 {
        debug_assert!(k < self.cols);
        codec::get_code(self.data, self.row_start(r) + k, self.bits)
    }

    #[inline]
    pub fn value(&self, r: usize, k: usize) -> i32 {
        codec::decode(self.code(r, k), self.bits) as i32
    }

    /// Decode `dst.len()` elements of row `r` starting at column `k0`.
    pub fn unpack_row(&self, r: usize, k0: usize, dst: &mut [i8]) {
        debug_assert!(k0 + dst.len() <= self.cols);
        codec::unpack_into(self.data, self.bits, self.row_start(r) + k0, dst);
    }

    /// Raw bytes of row `r` when it starts on a byte boundary.
    pub fn aligned_row(&self, r: usize) -> Option<&'a [u8]> {
        let bit = self.row_start(r) * self.bits.bits();
        if bit % 8 != 0 {
            return None;
        }
        let start = bit / 8;
        Some(&self.data[start..start + self.bits.packed_len(self.cols)])
    }

    /// True when every row starts on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        let b = self.bits.bits();
        (self.offset * b) % 8 == 0 && (self.stride * b) % 8 == 0
    }

    /// View of rows `start..start + count`.
    pub fn sub_rows(&self, start: usize, count: usize) -> QnnResult<PackedMatrix<'a>> {
        if start + count > self.rows {
            return Err(QnnError::shape(
                "PackedMatrix::sub_rows",
                &[self.rows],
                &[start + count],
            ));
        }
        Ok(PackedMatrix {
            rows: count,
            offset: self.offset + start * self.stride,
            ..*self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_is_checked() {
        let data = [0u8; 3];
        // 2 rows × 10 cols of 1-bit, stride 12: needs 22 bits = 3 bytes
        assert!(PackedMatrix::new(&data, BitWidth::B1, 2, 10, 12, 0).is_ok());
        assert_eq!(
            PackedMatrix::new(&data, BitWidth::B1, 2, 10, 12, 3).unwrap_err(),
            QnnError::BufferTooSmall {
                required: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn aligned_rows_only_on_byte_boundaries() {
        let data = [0u8; 4];
        let m = PackedMatrix::new(&data, BitWidth::B2, 2, 6, 6, 0).unwrap();
        assert!(m.aligned_row(0).is_some());
        assert!(m.aligned_row(1).is_none());
        assert!(!m.is_byte_aligned());
    }
}
