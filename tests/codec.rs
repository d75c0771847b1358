use proptest::prelude::*;
use qmatmul::codec::{get_code, pack_values, unpack_values};
use qmatmul::{decode, encode, offset_of, BitWidth, QnnError};

fn any_width() -> impl Strategy<Value = BitWidth> {
    prop::sample::select(BitWidth::ALL.to_vec())
}

// ============================================================
// Sign tables
// ============================================================

#[test]
fn test_round_trip_every_representable_value() {
    for bits in BitWidth::ALL {
        for v in bits.representable() {
            assert_eq!(decode(encode(v, bits), bits) as i32, v, "{bits}: value {v}");
        }
    }
}

#[test]
fn test_two_bit_table_is_exact() {
    let decoded: Vec<i8> = (0..4).map(|c| decode(c, BitWidth::B2)).collect();
    assert_eq!(decoded, vec![1, 0, -2, -1]);
}

#[test]
fn test_representable_ranges() {
    let ranges: Vec<Vec<i32>> = BitWidth::ALL.iter().map(|b| b.representable().collect()).collect();
    assert_eq!(ranges[0], vec![-1, 1]);
    assert_eq!(ranges[1], vec![-2, -1, 0, 1]);
    assert_eq!(ranges[2], (-8..=7).collect::<Vec<_>>());
    assert_eq!(ranges[3].len(), 256);
}

#[test]
fn test_width_from_integer() {
    assert_eq!(BitWidth::try_from(4u8), Ok(BitWidth::B4));
    assert_eq!(BitWidth::try_from(3u8), Err(QnnError::UnsupportedBitWidth(3)));
    assert_eq!(serde_json::from_str::<BitWidth>("2").unwrap(), BitWidth::B2);
    assert!(serde_json::from_str::<BitWidth>("16").is_err());
    assert_eq!(serde_json::to_string(&BitWidth::B8).unwrap(), "8");
}

// ============================================================
// Packing
// ============================================================

#[test]
fn test_group_layout_matches_byte_rule() {
    // 2-bit values +1, 0, -2, -1 are codes 0, 1, 2, 3 at bits 0, 2, 4, 6
    let packed = pack_values(&[1, 0, -2, -1], BitWidth::B2);
    assert_eq!(packed, vec![0b11_10_01_00]);

    // 4-bit: element 0 in the low nibble
    let packed = pack_values(&[-1, 3, 7], BitWidth::B4);
    assert_eq!(packed, vec![0x3F, 0x07]);
}

#[test]
fn test_tail_element_counts() {
    for bits in BitWidth::ALL {
        let per = bits.per_byte();
        for n in [1, per + 1, 3 * per - 1, 13] {
            let allowed: Vec<i32> = bits.representable().collect();
            let values: Vec<i32> = (0..n).map(|i| allowed[(i * 5) % allowed.len()]).collect();
            let packed = pack_values(&values, bits);
            assert_eq!(packed.len(), bits.packed_len(n), "{bits} n={n}");
            let back: Vec<i32> = unpack_values(&packed, bits, n).into_iter().map(i32::from).collect();
            assert_eq!(back, values, "{bits} n={n}");
        }
    }
}

proptest! {
    #[test]
    fn pack_then_decode_by_offset(bits in any_width(), seeds in prop::collection::vec(any::<u16>(), 1..200)) {
        let allowed: Vec<i32> = bits.representable().collect();
        let values: Vec<i32> = seeds.iter().map(|&s| allowed[s as usize % allowed.len()]).collect();
        let packed = pack_values(&values, bits);

        for (i, &v) in values.iter().enumerate() {
            let (byte, shift) = offset_of(i, bits);
            let code = (packed[byte] >> shift) & bits.mask();
            prop_assert_eq!(code, get_code(&packed, i, bits));
            prop_assert_eq!(decode(code, bits) as i32, v);
        }
    }

    #[test]
    fn encode_saturates(bits in any_width(), v in -1000i32..1000) {
        let d = decode(encode(v, bits), bits) as i32;
        match bits {
            BitWidth::B1 => prop_assert_eq!(d, if v > 0 { 1 } else { -1 }),
            _ => prop_assert_eq!(d, v.clamp(bits.min_value(), bits.max_value())),
        }
    }
}
