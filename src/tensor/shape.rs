//! Rank 1-4 shapes with row-major offset computation.

use crate::error::{QnnError, QnnResult};

pub const MAX_RANK: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: [usize; MAX_RANK],
    rank: usize,
}

impl Shape {
    pub fn new(dims: &[usize]) -> QnnResult<Shape> {
        if dims.is_empty() || dims.len() > MAX_RANK {
            return Err(QnnError::InvalidRank(dims.len()));
        }
        let mut d = [1usize; MAX_RANK];
        d[..dims.len()].copy_from_slice(dims);
        Ok(Shape {
            dims: d,
            rank: dims.len(),
        })
    }

    /// Rank-4 shape; never fails.
    pub const fn rank4(dims: [usize; MAX_RANK]) -> Shape {
        Shape { dims, rank: MAX_RANK }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims[..self.rank]
    }

    pub fn numel(&self) -> usize {
        self.dims().iter().product()
    }

    /// Number of leading-axis rows. A rank-1 shape is a single row.
    pub fn rows(&self) -> usize {
        if self.rank == 1 { 1 } else { self.dims[0] }
    }

    /// Elements per leading-axis row (product of the trailing axes).
    pub fn row_len(&self) -> usize {
        if self.rank == 1 {
            self.dims[0]
        } else {
            self.dims[1..self.rank].iter().product()
        }
    }

    /// Row-major strides, one per axis.
    pub fn strides(&self) -> [usize; MAX_RANK] {
        let mut strides = [0usize; MAX_RANK];
        let mut acc = 1;
        for axis in (0..self.rank).rev() {
            strides[axis] = acc;
            acc *= self.dims[axis];
        }
        strides
    }

    /// Flat offset of a full multi-index.
    pub fn offset(&self, index: &[usize]) -> usize {
        debug_assert_eq!(index.len(), self.rank, "index rank");
        let strides = self.strides();
        index
            .iter()
            .zip(self.dims())
            .zip(strides.iter())
            .map(|((&i, &d), &s)| {
                debug_assert!(i < d, "index {i} out of bounds for axis of size {d}");
                i * s
            })
            .sum()
    }

    pub(crate) fn expect_rank(&self, op: &'static str, rank: usize) -> QnnResult<()> {
        if self.rank != rank {
            return Err(QnnError::InvalidParameter(format!(
                "[{op}] expected a rank-{rank} tensor, got shape {:?}",
                self.dims()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_bounds() {
        assert_eq!(Shape::new(&[]), Err(QnnError::InvalidRank(0)));
        assert_eq!(Shape::new(&[1, 2, 3, 4, 5]), Err(QnnError::InvalidRank(5)));
    }

    #[test]
    fn offsets_are_row_major() {
        let s = Shape::new(&[2, 3, 4, 5]).unwrap();
        assert_eq!(s.strides(), [60, 20, 5, 1]);
        assert_eq!(s.offset(&[1, 2, 3, 4]), 60 + 40 + 15 + 4);
        assert_eq!(s.rows(), 2);
        assert_eq!(s.row_len(), 60);
    }

    #[test]
    fn rank4_matches_checked_constructor() {
        assert_eq!(Shape::rank4([2, 3, 4, 5]), Shape::new(&[2, 3, 4, 5]).unwrap());
    }

    #[test]
    fn rank_one_is_a_single_row() {
        let s = Shape::new(&[7]).unwrap();
        assert_eq!(s.rows(), 1);
        assert_eq!(s.row_len(), 7);
    }
}
