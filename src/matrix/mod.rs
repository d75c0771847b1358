//! Unblocked reference layers.
//!
//! These provide the correctness baseline that the blocked pipeline is
//! compared against.

pub mod naive;

pub use naive::{naive_conv1d, naive_conv2d, naive_linear};
