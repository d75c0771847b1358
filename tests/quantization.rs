use proptest::prelude::*;
use qmatmul::codec::get_code;
use qmatmul::quant::{absmax, quantize_row_into, quantize_per_tensor};
use qmatmul::{decode, dequantize, dequantize_tensor, quantize_row, quantize_tensor, BitWidth, FloatTensor, QnnError};

fn multi_bit_width() -> impl Strategy<Value = BitWidth> {
    prop::sample::select(vec![BitWidth::B2, BitWidth::B4, BitWidth::B8])
}

// ============================================================
// Error bound
// ============================================================

proptest! {
    #[test]
    fn dequantized_within_half_step(
        bits in multi_bit_width(),
        values in prop::collection::vec(-100.0f32..100.0, 1..64),
    ) {
        prop_assume!(absmax(&values) > 0.0);
        let (codes, step) = quantize_row(&values, bits);
        prop_assert!(step > 0.0);

        let bound = step * 0.5 + step * 1e-4 + 1e-6;
        for (i, &x) in values.iter().enumerate() {
            let d = dequantize(get_code(&codes, i, bits), bits, step);
            prop_assert!((d - x).abs() <= bound, "{bits}: x={x} d={d} step={step}");
        }
    }

    #[test]
    fn binary_codes_follow_sign(values in prop::collection::vec(-10.0f32..10.0, 1..64)) {
        let (codes, _) = quantize_row(&values, BitWidth::B1);
        for (i, &x) in values.iter().enumerate() {
            let expected = if x > 0.0 { 0 } else { 1 };
            prop_assert_eq!(get_code(&codes, i, BitWidth::B1), expected);
        }
    }
}

// ============================================================
// Concrete rows
// ============================================================

#[test]
fn test_absmax_step_per_width() {
    let row = [2.0f32, -1.0, 0.5, -2.0];
    let expectations = [(BitWidth::B2, 2.0f32), (BitWidth::B4, 2.0 / 7.0), (BitWidth::B8, 2.0 / 127.0)];
    for (bits, expected) in expectations {
        let (_, step) = quantize_row(&row, bits);
        assert!((step - expected).abs() < 1e-6, "{bits}: step {step}, expected {expected}");
    }
}

#[test]
fn test_zero_row_is_degenerate() {
    for bits in BitWidth::ALL {
        let (codes, step) = quantize_row(&[0.0; 10], bits);
        assert_eq!(step, 0.0, "{bits}");
        // zero is -1 at one bit, and 2-bit zero is code 1, not code 0
        let expected = if bits == BitWidth::B1 { -1 } else { 0 };
        for i in 0..10 {
            let code = get_code(&codes, i, bits);
            assert_eq!(decode(code, bits), expected, "{bits}: element {i}");
            assert_eq!(dequantize(code, bits, step), 0.0, "{bits}");
        }
    }
}

#[test]
fn test_two_bit_zero_row_bytes() {
    let (codes, _) = quantize_row(&[0.0; 8], BitWidth::B2);
    assert_eq!(codes, vec![0b0101_0101, 0b0101_0101]);
}

#[test]
fn test_padded_row_into_offset() {
    // 4-bit row written at element 3 of a shared buffer, padded to 8
    let mut dst = vec![0xFFu8; 6];
    let step = quantize_row_into(&[7.0, -7.0, 3.5], BitWidth::B4, &mut dst, 3, 8).unwrap();
    assert_eq!(step, 1.0);

    let codes: Vec<u8> = (3..11).map(|i| get_code(&dst, i, BitWidth::B4)).collect();
    assert_eq!(codes, vec![0x7, 0x9, 0x4, 0, 0, 0, 0, 0]);
    // Untouched neighbours keep their bits
    assert_eq!(get_code(&dst, 2, BitWidth::B4), 0xF);
    assert_eq!(get_code(&dst, 11, BitWidth::B4), 0xF);
}

#[test]
fn test_row_into_rejects_short_buffer() {
    let mut dst = vec![0u8; 1];
    let err = quantize_row_into(&[1.0; 4], BitWidth::B8, &mut dst, 0, 4).unwrap_err();
    assert_eq!(err, QnnError::BufferTooSmall { required: 4, actual: 1 });

    let err = quantize_row_into(&[1.0; 4], BitWidth::B8, &mut dst, 0, 2).unwrap_err();
    assert!(matches!(err, QnnError::InvalidParameter(_)));
}

// ============================================================
// Tensors
// ============================================================

#[test]
fn test_tensor_rows_get_their_own_scale() {
    let x = FloatTensor::new(&[2, 3], vec![1.0, -2.0, 0.5, 10.0, 5.0, -10.0]).unwrap();
    let p = quantize_tensor(&x, BitWidth::B8, 32).unwrap();

    assert_eq!(p.scales().len(), 2);
    assert_eq!(p.row_stride(), 32);
    assert!((p.row_scale(0) - 2.0 / 127.0).abs() < 1e-7);
    assert!((p.row_scale(1) - 10.0 / 127.0).abs() < 1e-7);
    assert_eq!(p.value(1, 2), -127);

    let back = dequantize_tensor(&p).unwrap();
    assert_eq!(back.dims(), &[2, 3]);
    for (a, b) in back.data().iter().zip(x.data()) {
        assert!((a - b).abs() <= 10.0 / 127.0 * 0.5 + 1e-5);
    }
}

#[test]
fn test_per_tensor_scale() {
    let x = FloatTensor::new(&[2, 2], vec![1.0, -4.0, 2.0, 0.0]).unwrap();
    let p = quantize_per_tensor(&x, BitWidth::B4).unwrap();
    assert_eq!(p.scales().len(), 1);
    assert!((p.scale() - 4.0 / 7.0).abs() < 1e-7);
    assert_eq!(p.value(0, 1), -7);
    assert_eq!(p.value(1, 1), 0);
}
