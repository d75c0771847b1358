//! Sub-byte quantized layers in Rust: 1, 2, 4 and 8-bit packed tensors,
//! a 16-way mixed-precision integer matmul, and blocked linear/conv layers
//! that run inside fixed scratch memory.
//!
//! ## Usage
//!
//! ```
//! use qmatmul::{BitPair, BitWidth, Engine, EngineConfig, FloatTensor, PackedTensor};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//!
//! // 2 output features over 8 inputs, 8-bit weights with step 1.0
//! let w = PackedTensor::from_values(
//!     &[2, 8],
//!     BitWidth::B8,
//!     &[1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1, -1],
//!     1.0,
//! )
//! .unwrap();
//! let x = FloatTensor::new(&[1, 8], vec![1.0; 8]).unwrap();
//! let mut out = FloatTensor::zeros(&[1, 2]).unwrap();
//!
//! let bits = BitPair::new(BitWidth::B8, BitWidth::B8);
//! engine.linear(&mut out, &x, &w, None, bits).unwrap();
//! assert_eq!(out.data(), &[8.0, -8.0]);
//! ```
//!
//! Kernel strategies are chosen once, by value or by name:
//!
//! ```
//! use qmatmul::{Engine, EngineConfig, Strategy};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.select_strategy_by_name("lut").unwrap();
//! assert_eq!(engine.strategy(), Strategy::Lut);
//! ```
//!
//! ## What's inside
//!
//! - Bit-exact packing with per-width sign tables (`codec`)
//! - Per-row absmax quantization (`quant`)
//! - Reference, unrolled/XNOR-popcount, lookup-table and AVX2 kernels
//!   (`kernels`), picked per bit-width pair by a `runtime::KernelTable`
//! - Blocked linear, conv1d and conv2d with bounded scratch (`pipeline`)
//! - Multi-threaded linear with one arena per worker (`threaded`)

pub mod arena;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod kernels;
pub mod matrix;
pub mod pipeline;
pub mod quant;
pub mod runtime;
pub mod tensor;
pub mod threaded;

pub use arena::{ArenaRegion, ScratchArena, ScratchRequest};
pub use codec::{decode, encode, offset_of, BitPair, BitWidth};
pub use config::{EngineConfig, ScratchConfig};
pub use engine::Engine;
pub use error::{FailFast, QnnError, QnnResult};
pub use pipeline::{conv1d, conv2d, linear, ConvParams, LayerContext, Layout};
pub use quant::{dequantize, dequantize_tensor, quantize_row, quantize_tensor};
pub use runtime::{KernelDescriptor, KernelTable, Strategy};
pub use tensor::{FloatTensor, PackedMatrix, PackedTensor, Shape};
pub use threaded::linear_parallel;
