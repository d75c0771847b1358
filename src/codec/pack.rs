//! Element addressing inside packed buffers.
//!
//! A packed buffer is a little-endian bitstream: element `e` occupies stream
//! bits `[e * bits, (e + 1) * bits)`, so element `k` of a byte-group sits at
//! bit `k * bits` of byte `e / (8 / bits)`.

use super::{decode, encode, BitWidth};

/// Byte index and bit offset of element `index`.
pub const fn offset_of(index: usize, bits: BitWidth) -> (usize, u32) {
    let per = bits.per_byte();
    (index / per, ((index % per) * bits.bits()) as u32)
}

#[inline]
pub fn get_code(data: &[u8], index: usize, bits: BitWidth) -> u8 {
    let (byte, shift) = offset_of(index, bits);
    (data[byte] >> shift) & bits.mask()
}

#[inline]
pub fn set_code(data: &mut [u8], index: usize, bits: BitWidth, code: u8) {
    let (byte, shift) = offset_of(index, bits);
    let mask = bits.mask() << shift;
    data[byte] = (data[byte] & !mask) | ((code & bits.mask()) << shift);
}

#[inline]
pub fn get_value(data: &[u8], index: usize, bits: BitWidth) -> i8 {
    decode(get_code(data, index, bits), bits)
}

/// Pack `values` (saturating) into a fresh buffer.
pub fn pack_values(values: &[i32], bits: BitWidth) -> Vec<u8> {
    let mut data = vec![0u8; bits.packed_len(values.len())];
    for (i, &v) in values.iter().enumerate() {
        set_code(&mut data, i, bits, encode(v, bits));
    }
    data
}

pub fn unpack_values(data: &[u8], bits: BitWidth, len: usize) -> Vec<i8> {
    let mut out = vec![0i8; len];
    unpack_into(data, bits, 0, &mut out);
    out
}

/// Decode `dst.len()` consecutive elements starting at element `start`.
///
/// Whole bytes go through the precomputed byte tables; only the unaligned
/// head and tail are decoded one element at a time.
pub fn unpack_into(data: &[u8], bits: BitWidth, start: usize, dst: &mut [i8]) {
    let per = bits.per_byte();
    let n = dst.len();
    let mut i = 0;

    while i < n && (start + i) % per != 0 {
        dst[i] = get_value(data, start + i, bits);
        i += 1;
    }

    let table = byte_table(bits);
    let mut byte = (start + i) / per;
    while i + per <= n {
        dst[i..i + per].copy_from_slice(&table[data[byte] as usize][..per]);
        i += per;
        byte += 1;
    }

    while i < n {
        dst[i] = get_value(data, start + i, bits);
        i += 1;
    }
}

/// Read `nbits` (at most 24) stream bits starting at `bit_pos`.
/// Bytes past the end of `data` read as zero.
#[inline]
pub fn read_bits(data: &[u8], bit_pos: usize, nbits: u32) -> u32 {
    debug_assert!(nbits <= 24);
    let byte = bit_pos / 8;
    let shift = (bit_pos % 8) as u32;
    let mut word = 0u32;
    for t in 0..4 {
        if let Some(&b) = data.get(byte + t) {
            word |= (b as u32) << (8 * t);
        }
    }
    (word >> shift) & ((1u32 << nbits) - 1)
}

/// Little-endian 32-bit word at `byte`; bytes past the end read as zero.
#[inline]
pub fn read_word32(data: &[u8], byte: usize) -> u32 {
    match data.get(byte..byte + 4) {
        Some(w) => u32::from_le_bytes([w[0], w[1], w[2], w[3]]),
        None => {
            let mut buf = [0u8; 4];
            for (t, slot) in buf.iter_mut().enumerate() {
                if let Some(&b) = data.get(byte + t) {
                    *slot = b;
                }
            }
            u32::from_le_bytes(buf)
        }
    }
}

/// 32 stream bits starting at any `bit_pos`; bytes past the end read as zero.
#[inline]
pub fn read_stream_word(data: &[u8], bit_pos: usize) -> u32 {
    let byte = bit_pos / 8;
    let shift = bit_pos % 8;
    if shift == 0 {
        return read_word32(data, byte);
    }
    let low = read_word32(data, byte) as u64;
    let high = data.get(byte + 4).copied().unwrap_or(0) as u64;
    ((low | (high << 32)) >> shift) as u32
}

/// Decoded values of every element in a byte, indexed by the byte.
/// Only the first `bits.per_byte()` entries of a row are meaningful.
pub fn byte_table(bits: BitWidth) -> &'static [[i8; 8]; 256] {
    &BYTE_TABLES[bits.log2()]
}

static BYTE_TABLES: [[[i8; 8]; 256]; 4] = [
    build_byte_table(BitWidth::B1),
    build_byte_table(BitWidth::B2),
    build_byte_table(BitWidth::B4),
    build_byte_table(BitWidth::B8),
];

const fn build_byte_table(bits: BitWidth) -> [[i8; 8]; 256] {
    let mut table = [[0i8; 8]; 256];
    let per = bits.per_byte();
    let mut byte = 0;
    while byte < 256 {
        let mut k = 0;
        while k < per {
            let code = ((byte >> (k * bits.bits())) as u8) & bits.mask();
            table[byte][k] = decode(code, bits);
            k += 1;
        }
        byte += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_group_rule() {
        assert_eq!(offset_of(0, BitWidth::B1), (0, 0));
        assert_eq!(offset_of(9, BitWidth::B1), (1, 1));
        assert_eq!(offset_of(5, BitWidth::B2), (1, 2));
        assert_eq!(offset_of(3, BitWidth::B4), (1, 4));
        assert_eq!(offset_of(3, BitWidth::B8), (3, 0));
    }

    #[test]
    fn set_code_leaves_neighbours_alone() {
        let mut data = [0xFFu8; 2];
        set_code(&mut data, 5, BitWidth::B2, 0b01);
        assert_eq!(data, [0xFF, 0b1111_0111]);
    }

    #[test]
    fn read_bits_spans_bytes() {
        let data = [0b1010_0000, 0b0000_0111];
        assert_eq!(read_bits(&data, 5, 6), 0b11_1101);
        assert_eq!(read_bits(&data, 12, 8), 0);
    }

    #[test]
    fn stream_word_at_odd_offset() {
        let data = [0xF0u8, 0xFF, 0xFF, 0xFF, 0x0F];
        assert_eq!(read_stream_word(&data, 4), u32::MAX);
        assert_eq!(read_stream_word(&data, 0), 0xFFFF_FFF0);
        assert_eq!(read_stream_word(&data, 16), 0x000F_FFFF);
    }

    #[test]
    fn unaligned_unpack_matches_elementwise() {
        let data: Vec<u8> = (0..16u8).map(|b| b.wrapping_mul(37)).collect();
        for bits in BitWidth::ALL {
            let total = data.len() * bits.per_byte();
            for start in 0..5 {
                let mut out = vec![0i8; total - start - 1];
                unpack_into(&data, bits, start, &mut out);
                for (i, &v) in out.iter().enumerate() {
                    assert_eq!(v, get_value(&data, start + i, bits), "{bits} start {start} elem {i}");
                }
            }
        }
    }
}
