//! Decode-based reference kernel.

use super::{check_operands, KernelBackend, KernelFn};
use crate::codec::BitPair;
use crate::tensor::PackedMatrix;

/// Element-wise accumulation for any bit-width pair.
///
/// Slow on purpose: every element goes through `decode`, so this is the
/// baseline the other backends are compared against.
pub fn matmul(out: &mut [i32], x: &PackedMatrix<'_>, w: &PackedMatrix<'_>) {
    check_operands(out, x, w);
    let n = w.rows();

    for i in 0..x.rows() {
        for j in 0..n {
            let mut acc = 0i32;
            for k in 0..x.cols() {
                acc += x.value(i, k) * w.value(j, k);
            }
            out[i * n + j] = acc;
        }
    }
}

pub struct ReferenceBackend;

impl KernelBackend for ReferenceBackend {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn kernel(&self, _pair: BitPair) -> Option<KernelFn> {
        Some(matmul)
    }
}
