//! Table-lookup kernels for low-bit weights (T-MAC style).
//!
//! A nibble of packed weights holds `G = 4 / wbits` codes. For every group
//! of `G` consecutive activations we precompute all 16 possible partial sums
//! `Σ_g a[g] · decode(code_g)`; the dot product against a weight row then
//! becomes one table lookup per nibble. Tables are built once per activation
//! row and tile, then shared by every output feature.
//!
//! 8-bit weights have no nibble form, so the backend leaves those cells to
//! the reference kernel.

use super::{check_operands, KernelBackend, KernelFn};
use crate::codec::{decode, read_bits, BitPair, BitWidth};
use crate::tensor::PackedMatrix;

/// Activations per tile.
const KC: usize = 256;

pub fn matmul(out: &mut [i32], x: &PackedMatrix<'_>, w: &PackedMatrix<'_>) {
    check_operands(out, x, w);
    let wbits = w.bits();
    assert!(wbits != BitWidth::B8, "lookup kernel needs weights below 8 bits");

    let (m, n, k) = (x.rows(), w.rows(), x.cols());
    let group = 4 / wbits.bits();
    out[..m * n].fill(0);

    let mut acts = [0i8; KC];
    let mut tables = [[0i32; 16]; KC];

    for i in 0..m {
        for k0 in (0..k).step_by(KC) {
            let kc = KC.min(k - k0);
            x.unpack_row(i, k0, &mut acts[..kc]);
            let groups = kc.div_ceil(group);
            build_tables(&acts[..kc], wbits, &mut tables[..groups]);

            for j in 0..n {
                let base = (w.row_start(j) + k0) * wbits.bits();
                let mut acc = 0i32;
                for (g, table) in tables[..groups].iter().enumerate() {
                    // a short last group reads neighbouring codes, but their
                    // table weight is a zero activation
                    let nibble = read_bits(w.data(), base + g * 4, 4);
                    acc += table[nibble as usize];
                }
                out[i * n + j] += acc;
            }
        }
    }
}

/// Fill `tables[g][nibble]` with the partial sum of activation group `g`
/// against the weight codes packed in `nibble`. Missing activations in the
/// last group count as zero.
fn build_tables(acts: &[i8], wbits: BitWidth, tables: &mut [[i32; 16]]) {
    let group = 4 / wbits.bits();
    let shift = wbits.bits();

    for (g, table) in tables.iter_mut().enumerate() {
        let mut a = [0i32; 4];
        for (t, slot) in a.iter_mut().take(group).enumerate() {
            if let Some(&v) = acts.get(g * group + t) {
                *slot = v as i32;
            }
        }
        for (nibble, entry) in table.iter_mut().enumerate() {
            let mut sum = 0i32;
            for (t, &av) in a.iter().take(group).enumerate() {
                let code = ((nibble >> (t * shift)) as u8) & wbits.mask();
                sum += av * decode(code, wbits) as i32;
            }
            *entry = sum;
        }
    }
}

pub struct LutBackend;

impl KernelBackend for LutBackend {
    fn name(&self) -> &'static str {
        "lut"
    }

    fn kernel(&self, pair: BitPair) -> Option<KernelFn> {
        match pair.weight {
            BitWidth::B8 => None,
            _ => Some(matmul),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pack_values;

    #[test]
    fn two_bit_table_uses_sign_table() {
        let mut tables = [[0i32; 16]; 1];
        build_tables(&[3, 5], BitWidth::B2, &mut tables);
        // codes (0, 0) decode to (+1, +1)
        assert_eq!(tables[0][0b0000], 8);
        // codes (2, 1) decode to (-2, 0)
        assert_eq!(tables[0][0b0110], -6);
        // codes (3, 3) decode to (-1, -1)
        assert_eq!(tables[0][0b1111], -8);
    }

    #[test]
    fn odd_length_unaligned_rows() {
        let k = 13;
        let xv: Vec<i32> = (0..2 * k).map(|i| (i % 9) as i32 - 4).collect();
        let wv: Vec<i32> = (0..3 * 16).map(|i| if i % 3 == 0 { 1 } else { -1 }).collect();
        let x = pack_values(&xv, BitWidth::B8);
        let w = pack_values(&wv, BitWidth::B1);
        let xm = PackedMatrix::dense(&x, BitWidth::B8, 2, k).unwrap();
        // stride 16 with a 3-element offset: rows start mid-byte
        let wm = PackedMatrix::new(&w, BitWidth::B1, 2, k, 16, 3).unwrap();

        let mut expected = [0i32; 4];
        let mut actual = [0i32; 4];
        crate::kernels::reference::matmul(&mut expected, &xm, &wm);
        matmul(&mut actual, &xm, &wm);
        assert_eq!(expected, actual);
    }
}
