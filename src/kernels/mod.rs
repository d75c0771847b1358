//! Mixed-precision integer matmul kernels.
//!
//! Every kernel computes `O[i, j] = Σ_k decode(X[i, k]) · decode(W[j, k])`
//! for a packed activation matrix `X` (`batch × k`) and a packed weight matrix
//! `W` (`out × k`), overwriting `out[i * W.rows() + j]`. The sum runs over the
//! logical columns only; row padding is never read.
//!
//! Available backends:
//! - `reference`: element-wise decode, all 16 bit-width pairs. Defines
//!   correctness for everything else.
//! - `unrolled`: stack-tile unpacking with a 4-way unrolled dot product for
//!   all 16 pairs; 1×1 uses XNOR-popcount over 32-bit words.
//! - `lut`: T-MAC style table lookup for 1, 2 and 4-bit weights.
//! - `avx2`: widening multiply-add for 8-bit × 8-bit (x86_64 with AVX2).

pub mod avx2;
pub mod lut;
pub mod reference;
pub mod unrolled;

use crate::codec::BitPair;
use crate::tensor::PackedMatrix;

/// Kernel entry point. Operand bit-widths travel with the views.
pub type KernelFn = fn(&mut [i32], &PackedMatrix<'_>, &PackedMatrix<'_>);

/// A family of kernel implementations.
///
/// `kernel` returns `None` for pairs the backend does not accelerate; the
/// runtime table then falls back to the reference kernel for that cell.
pub trait KernelBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn kernel(&self, pair: BitPair) -> Option<KernelFn>;
}

/// Operand checks shared by every kernel.
///
/// The pipeline validates shapes before it calls a kernel, so tripping one of
/// these is a bug in the caller.
#[inline]
pub(crate) fn check_operands(out: &[i32], x: &PackedMatrix<'_>, w: &PackedMatrix<'_>) {
    assert_eq!(
        x.cols(),
        w.cols(),
        "reduction length: activations have {}, weights have {}",
        x.cols(),
        w.cols()
    );
    assert!(
        out.len() >= x.rows() * w.rows(),
        "output: expected {}x{}={} elements, got {}",
        x.rows(),
        w.rows(),
        x.rows() * w.rows(),
        out.len()
    );
}
