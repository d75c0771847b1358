//! Tiled, unrolled kernels for every bit-width pair.
//!
//! Packed rows are decoded into fixed stack tiles (`MR` activation rows by
//! `KC` columns, plus one weight row) so the inner dot product runs over
//! plain `i8` slices. Each weight row is unpacked once per activation panel
//! and reused for all `MR` rows of that panel.
//!
//! The 1-bit × 1-bit pair skips decoding entirely: for ±1 values the dot
//! product of a 32-element word is `2·popcount(!(x ^ w)) − 32`.

use super::{check_operands, KernelBackend, KernelFn};
use crate::codec::{get_value, read_stream_word, BitPair, BitWidth};
use crate::tensor::PackedMatrix;

/// Columns per tile.
const KC: usize = 256;
/// Activation rows per panel.
const MR: usize = 4;

/// Tiled kernel for any pair.
pub fn matmul(out: &mut [i32], x: &PackedMatrix<'_>, w: &PackedMatrix<'_>) {
    check_operands(out, x, w);
    let (m, n, k) = (x.rows(), w.rows(), x.cols());
    out[..m * n].fill(0);

    let mut x_panel = [[0i8; KC]; MR];
    let mut w_tile = [0i8; KC];

    for k0 in (0..k).step_by(KC) {
        let kc = KC.min(k - k0);

        for i0 in (0..m).step_by(MR) {
            let mr = MR.min(m - i0);
            for (r, tile) in x_panel.iter_mut().take(mr).enumerate() {
                x.unpack_row(i0 + r, k0, &mut tile[..kc]);
            }

            for j in 0..n {
                w.unpack_row(j, k0, &mut w_tile[..kc]);
                for (r, tile) in x_panel.iter().take(mr).enumerate() {
                    out[(i0 + r) * n + j] += dot_i8(&tile[..kc], &w_tile[..kc]);
                }
            }
        }
    }
}

/// 4-way unrolled `i8` dot product.
#[inline]
pub fn dot_i8(a: &[i8], b: &[i8]) -> i32 {
    debug_assert_eq!(a.len(), b.len());
    let (mut s0, mut s1, mut s2, mut s3) = (0i32, 0i32, 0i32, 0i32);

    let a4 = a.chunks_exact(4);
    let b4 = b.chunks_exact(4);
    let (a_tail, b_tail) = (a4.remainder(), b4.remainder());
    for (pa, pb) in a4.zip(b4) {
        s0 += pa[0] as i32 * pb[0] as i32;
        s1 += pa[1] as i32 * pb[1] as i32;
        s2 += pa[2] as i32 * pb[2] as i32;
        s3 += pa[3] as i32 * pb[3] as i32;
    }
    for (&va, &vb) in a_tail.iter().zip(b_tail) {
        s0 += va as i32 * vb as i32;
    }

    s0 + s1 + s2 + s3
}

/// XNOR-popcount kernel for 1-bit activations and 1-bit weights.
pub fn matmul_binary(out: &mut [i32], x: &PackedMatrix<'_>, w: &PackedMatrix<'_>) {
    check_operands(out, x, w);
    assert!(
        x.bits() == BitWidth::B1 && w.bits() == BitWidth::B1,
        "binary kernel on {}x{} operands",
        x.bits(),
        w.bits()
    );
    let n = w.rows();

    for i in 0..x.rows() {
        for j in 0..n {
            out[i * n + j] = xnor_dot(x.data(), x.row_start(i), w.data(), w.row_start(j), x.cols());
        }
    }
}

/// ±1 dot product of `len` 1-bit elements starting at stream bits `x_start`
/// and `w_start`.
///
/// Whole 32-bit words use XNOR-popcount; the remaining `len % 32` elements
/// are decoded and multiplied one at a time.
pub fn xnor_dot(x: &[u8], x_start: usize, w: &[u8], w_start: usize, len: usize) -> i32 {
    let words = len / 32;
    let mut acc = 0i32;

    for t in 0..words {
        let xw = read_stream_word(x, x_start + t * 32);
        let ww = read_stream_word(w, w_start + t * 32);
        acc += 2 * (!(xw ^ ww)).count_ones() as i32 - 32;
    }

    for e in words * 32..len {
        let xv = get_value(x, x_start + e, BitWidth::B1) as i32;
        let wv = get_value(w, w_start + e, BitWidth::B1) as i32;
        acc += xv * wv;
    }
    acc
}

pub struct UnrolledBackend;

impl KernelBackend for UnrolledBackend {
    fn name(&self) -> &'static str {
        "unroll"
    }

    fn kernel(&self, pair: BitPair) -> Option<KernelFn> {
        if pair.act == BitWidth::B1 && pair.weight == BitWidth::B1 {
            Some(matmul_binary)
        } else {
            Some(matmul)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pack_values;

    #[test]
    fn dot_handles_tail() {
        let a: Vec<i8> = (1..=7).collect();
        let b = [1i8, -1, 1, -1, 1, -1, 1];
        assert_eq!(dot_i8(&a, &b), 1 - 2 + 3 - 4 + 5 - 6 + 7);
    }

    #[test]
    fn full_mismatch_word_is_minus_32() {
        let x = [0u8; 4];
        let w = [0xFFu8; 4];
        assert_eq!(xnor_dot(&x, 0, &w, 0, 32), -32);
        assert_eq!(xnor_dot(&x, 0, &x, 0, 32), 32);
    }

    #[test]
    fn tiled_matches_reference_across_tile_edges() {
        let k = KC + 37;
        let xv: Vec<i32> = (0..6 * k).map(|i| (i % 15) as i32 - 7).collect();
        let wv: Vec<i32> = (0..3 * k).map(|i| (i % 4) as i32 - 2).collect();
        let x = pack_values(&xv, BitWidth::B4);
        let w = pack_values(&wv, BitWidth::B2);
        let xm = PackedMatrix::dense(&x, BitWidth::B4, 6, k).unwrap();
        let wm = PackedMatrix::dense(&w, BitWidth::B2, 3, k).unwrap();

        let mut expected = vec![0i32; 18];
        let mut actual = vec![-1i32; 18];
        super::super::reference::matmul(&mut expected, &xm, &wm);
        matmul(&mut actual, &xm, &wm);
        assert_eq!(expected, actual);
    }
}
