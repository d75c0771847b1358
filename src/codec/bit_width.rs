//! The four supported element widths.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QnnError;

/// Number of bits per packed element.
///
/// The only way to build one from a raw integer is `TryFrom<u8>`, so a
/// width outside {1, 2, 4, 8} cannot reach a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BitWidth {
    B1,
    B2,
    B4,
    B8,
}

impl BitWidth {
    pub const ALL: [BitWidth; 4] = [BitWidth::B1, BitWidth::B2, BitWidth::B4, BitWidth::B8];

    pub const fn bits(self) -> usize {
        match self {
            BitWidth::B1 => 1,
            BitWidth::B2 => 2,
            BitWidth::B4 => 4,
            BitWidth::B8 => 8,
        }
    }

    /// Row/column index into the 4×4 kernel table.
    pub const fn log2(self) -> usize {
        match self {
            BitWidth::B1 => 0,
            BitWidth::B2 => 1,
            BitWidth::B4 => 2,
            BitWidth::B8 => 3,
        }
    }

    pub const fn from_log2(log2: usize) -> Option<BitWidth> {
        match log2 {
            0 => Some(BitWidth::B1),
            1 => Some(BitWidth::B2),
            2 => Some(BitWidth::B4),
            3 => Some(BitWidth::B8),
            _ => None,
        }
    }

    /// Elements stored in one byte.
    pub const fn per_byte(self) -> usize {
        8 / self.bits()
    }

    pub const fn mask(self) -> u8 {
        match self {
            BitWidth::B1 => 0x01,
            BitWidth::B2 => 0x03,
            BitWidth::B4 => 0x0F,
            BitWidth::B8 => 0xFF,
        }
    }

    /// Smallest decodable value.
    pub const fn min_value(self) -> i32 {
        match self {
            BitWidth::B1 => -1,
            BitWidth::B2 => -2,
            BitWidth::B4 => -8,
            BitWidth::B8 => -128,
        }
    }

    /// Largest decodable value.
    pub const fn max_value(self) -> i32 {
        match self {
            BitWidth::B1 => 1,
            BitWidth::B2 => 1,
            BitWidth::B4 => 7,
            BitWidth::B8 => 127,
        }
    }

    /// `2^(bits-1) - 1`, the largest magnitude the absmax quantizer maps to.
    /// Zero for 1-bit, which binarises by sign instead.
    pub const fn quant_max(self) -> i32 {
        (1 << (self.bits() - 1)) - 1
    }

    /// Bytes needed to hold `n` packed elements.
    pub const fn packed_len(self, n: usize) -> usize {
        (n * self.bits()).div_ceil(8)
    }

    /// Every value `decode` can produce, ascending.
    pub fn representable(self) -> impl Iterator<Item = i32> {
        (self.min_value()..=self.max_value()).filter(move |&v| self != BitWidth::B1 || v != 0)
    }
}

impl TryFrom<u8> for BitWidth {
    type Error = QnnError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(BitWidth::B1),
            2 => Ok(BitWidth::B2),
            4 => Ok(BitWidth::B4),
            8 => Ok(BitWidth::B8),
            other => Err(QnnError::UnsupportedBitWidth(other as u32)),
        }
    }
}

impl From<BitWidth> for u8 {
    fn from(bits: BitWidth) -> u8 {
        bits.bits() as u8
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Key of one cell of the kernel table: (activation bits, weight bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitPair {
    pub act: BitWidth,
    pub weight: BitWidth,
}

impl BitPair {
    pub const fn new(act: BitWidth, weight: BitWidth) -> Self {
        BitPair { act, weight }
    }

    /// All 16 pairs, activation-major.
    pub fn all() -> impl Iterator<Item = BitPair> {
        BitWidth::ALL
            .into_iter()
            .flat_map(|act| BitWidth::ALL.into_iter().map(move |weight| BitPair { act, weight }))
    }

    pub const fn index(self) -> (usize, usize) {
        (self.act.log2(), self.weight.log2())
    }
}

impl fmt::Display for BitPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}xW{}", self.act.bits(), self.weight.bits())
    }
}
