//! Code <-> signed value mapping for each bit-width.
//!
//! 4 and 8 bits are plain two's complement. 1 bit is a sign bit
//! (0 → +1, 1 → −1). 2 bits use the fixed table {0: +1, 1: 0, 2: −2, 3: −1};
//! externally packed weights depend on this exact table.

use super::BitWidth;

const TWO_BIT: [i8; 4] = [1, 0, -2, -1];

/// Decode the low `bits` bits of `code`. Higher bits are ignored.
pub const fn decode(code: u8, bits: BitWidth) -> i8 {
    match bits {
        BitWidth::B1 => {
            if code & 1 == 0 {
                1
            } else {
                -1
            }
        }
        BitWidth::B2 => TWO_BIT[(code & 0b11) as usize],
        // sign-extend the low nibble
        BitWidth::B4 => ((code << 4) as i8) >> 4,
        BitWidth::B8 => code as i8,
    }
}

/// Encode `value`, saturating to the representable range.
///
/// For 1 bit every non-positive value maps to −1.
pub const fn encode(value: i32, bits: BitWidth) -> u8 {
    match bits {
        BitWidth::B1 => {
            if value > 0 {
                0
            } else {
                1
            }
        }
        BitWidth::B2 => match clamp(value, -2, 1) {
            1 => 0,
            0 => 1,
            -2 => 2,
            _ => 3,
        },
        BitWidth::B4 => (clamp(value, -8, 7) as u8) & 0x0F,
        BitWidth::B8 => clamp(value, -128, 127) as i8 as u8,
    }
}

const fn clamp(v: i32, lo: i32, hi: i32) -> i32 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}
