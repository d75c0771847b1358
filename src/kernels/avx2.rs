//! AVX2 kernel for 8-bit activations × 8-bit weights.
//!
//! 8-bit codes are plain two's complement bytes, so rows feed the vector
//! unit without any decoding: 16 bytes are sign-extended to `i16`, then
//! `vpmaddwd` multiplies and pairwise-adds into eight `i32` lanes.

use super::{check_operands, reference, KernelBackend, KernelFn};
use crate::codec::{BitPair, BitWidth};
use crate::tensor::PackedMatrix;

/// True when the AVX2 path can run on this CPU.
pub fn available() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}

/// 8×8 kernel. Falls back to the reference kernel when AVX2 is missing.
pub fn matmul_8x8(out: &mut [i32], x: &PackedMatrix<'_>, w: &PackedMatrix<'_>) {
    check_operands(out, x, w);
    assert!(
        x.bits() == BitWidth::B8 && w.bits() == BitWidth::B8,
        "8x8 kernel on {}x{} operands",
        x.bits(),
        w.bits()
    );

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            let (n, k) = (w.rows(), x.cols());
            for i in 0..x.rows() {
                let xs = x.row_start(i);
                let xr = &x.data()[xs..xs + k];
                for j in 0..n {
                    let ws = w.row_start(j);
                    let wr = &w.data()[ws..ws + k];
                    // SAFETY: AVX2 detected above; both rows hold k bytes
                    out[i * n + j] = unsafe { dot_i8_avx2(xr, wr) };
                }
            }
            return;
        }
    }

    reference::matmul(out, x, w);
}

/// Dot product of two `i8` rows stored as bytes.
///
/// # Safety
///
/// Caller must ensure:
/// - CPU supports AVX2 (checked via `#[target_feature]`)
/// - `a` and `b` have the same length
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn dot_i8_avx2(a: &[u8], b: &[u8]) -> i32 {
    use std::arch::x86_64::*;

    let n = a.len().min(b.len());
    let mut acc = _mm256_setzero_si256();

    let mut k = 0;
    while k + 16 <= n {
        let va = _mm256_cvtepi8_epi16(_mm_loadu_si128(a.as_ptr().add(k) as *const __m128i));
        let vb = _mm256_cvtepi8_epi16(_mm_loadu_si128(b.as_ptr().add(k) as *const __m128i));
        acc = _mm256_add_epi32(acc, _mm256_madd_epi16(va, vb));
        k += 16;
    }

    // Horizontal sum of the eight lanes
    let s = _mm_add_epi32(_mm256_castsi256_si128(acc), _mm256_extracti128_si256(acc, 1));
    let s = _mm_add_epi32(s, _mm_shuffle_epi32(s, 0b01_00_11_10));
    let s = _mm_add_epi32(s, _mm_shuffle_epi32(s, 0b10_11_00_01));
    let mut total = _mm_cvtsi128_si32(s);

    while k < n {
        total += a[k] as i8 as i32 * b[k] as i8 as i32;
        k += 1;
    }
    total
}

pub struct Avx2Backend;

impl KernelBackend for Avx2Backend {
    fn name(&self) -> &'static str {
        "simd"
    }

    fn kernel(&self, pair: BitPair) -> Option<KernelFn> {
        let is_8x8 = pair.act == BitWidth::B8 && pair.weight == BitWidth::B8;
        (is_8x8 && available()).then_some(matmul_8x8 as KernelFn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pack_values;

    #[test]
    fn test_8x8_matches_reference() {
        if !available() {
            println!("Skipping - AVX2 not available");
            return;
        }

        let k = 45;
        let xv: Vec<i32> = (0..3 * k).map(|i| (i * 37 % 256) as i32 - 128).collect();
        let wv: Vec<i32> = (0..5 * k).map(|i| (i * 91 % 256) as i32 - 128).collect();
        let x = pack_values(&xv, BitWidth::B8);
        let w = pack_values(&wv, BitWidth::B8);
        let xm = PackedMatrix::dense(&x, BitWidth::B8, 3, k).unwrap();
        let wm = PackedMatrix::dense(&w, BitWidth::B8, 5, k).unwrap();

        let mut expected = [0i32; 15];
        let mut actual = [0i32; 15];
        reference::matmul(&mut expected, &xm, &wm);
        matmul_8x8(&mut actual, &xm, &wm);
        assert_eq!(expected, actual);
    }
}
