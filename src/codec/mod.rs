//! Bit-pack codec: sub-byte sign encodings and packed element addressing.
//!
//! Everything here is pure. The layout is bit-exact with externally packed
//! weights, so changes to `sign` or `pack` break interoperability.

pub mod bit_width;
pub mod pack;
pub mod sign;

pub use bit_width::{BitPair, BitWidth};
pub use pack::{
    byte_table, get_code, get_value, offset_of, pack_values, read_bits, read_stream_word, read_word32,
    set_code, unpack_into, unpack_values,
};
pub use sign::{decode, encode};
