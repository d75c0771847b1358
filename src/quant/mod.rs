//! Float ↔ packed conversion.
//!
//! Every row gets its own absmax-derived step; 1-bit rows binarise by sign
//! with the mean absolute value as the step.

pub mod quantizer;

pub use quantizer::{
    absmax, absmean, aligned_len, dequantize, dequantize_tensor, quantize_per_tensor,
    quantize_row, quantize_row_into, quantize_rows_into, quantize_tensor, QuantParams,
};
