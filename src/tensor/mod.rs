//! Tensor containers: float tensors, bit-packed tensors and packed views.

pub mod float;
pub mod packed;
pub mod shape;
pub mod view;

pub use float::FloatTensor;
pub use packed::PackedTensor;
pub use shape::{Shape, MAX_RANK};
pub use view::PackedMatrix;
