//! Quantized layer calls: linear, conv1d and conv2d.
//!
//! Every call follows the same sequence. It validates shapes and reserves
//! scratch for the largest block. It seeds the float output with bias, then
//! per block it quantizes activations into the arena, runs the dispatched
//! kernel and accumulates `O · weight_scale · act_scale` into the output.
//! Validation and the reservation happen before the output is touched.
//!
//! Available operations:
//! - `linear`: whole batch in one block
//! - `conv1d`: `Blocking::conv1d_len` output positions per block
//! - `conv2d`: `Blocking::conv2d_rows` output rows per block

pub mod conv;
pub mod conv1d;
pub mod conv2d;
pub mod im2col;
pub mod linear;

pub use conv::{ConvParams, Layout};
pub use conv1d::conv1d;
pub use conv2d::conv2d;
pub use im2col::ConvGeometry;
pub use linear::linear;

use crate::arena::ScratchArena;
use crate::config::EngineConfig;
use crate::error::{QnnError, QnnResult};
use crate::runtime::KernelTable;

/// Block sizes for the convolution loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blocking {
    pub conv1d_len: usize,
    pub conv2d_rows: usize,
}

impl Default for Blocking {
    fn default() -> Self {
        Self {
            conv1d_len: 4,
            conv2d_rows: 2,
        }
    }
}

impl From<&EngineConfig> for Blocking {
    fn from(config: &EngineConfig) -> Self {
        Self {
            conv1d_len: config.conv1d_block_len,
            conv2d_rows: config.conv2d_block_rows,
        }
    }
}

/// What a layer call needs besides its tensors.
pub struct LayerContext<'a> {
    pub table: &'a KernelTable,
    pub arena: &'a mut ScratchArena,
    pub blocking: Blocking,
}

impl<'a> LayerContext<'a> {
    pub fn new(table: &'a KernelTable, arena: &'a mut ScratchArena) -> Self {
        Self {
            table,
            arena,
            blocking: Blocking::default(),
        }
    }

    pub fn with_blocking(mut self, blocking: Blocking) -> Self {
        self.blocking = blocking;
        self
    }
}

pub(crate) fn check_alignment(alignment: usize) -> QnnResult<()> {
    if alignment == 0 {
        return Err(QnnError::InvalidParameter("alignment must be positive".into()));
    }
    Ok(())
}

pub(crate) fn check_bias(op: &'static str, bias: Option<&[f32]>, channels: usize) -> QnnResult<()> {
    match bias {
        Some(b) if b.len() != channels => Err(QnnError::shape(op, &[channels], &[b.len()])),
        _ => Ok(()),
    }
}

/// `out[index(r, c)] += acc[r * cols + c] · (weight_scale(c) · act_scales[r])`
/// for every row of the block.
#[inline]
pub(crate) fn accumulate<S, I>(
    out: &mut [f32],
    acc: &[i32],
    act_scales: &[f32],
    cols: usize,
    weight_scale: S,
    index: I,
) where
    S: Fn(usize) -> f32,
    I: Fn(usize, usize) -> usize,
{
    for (r, &a_scale) in act_scales.iter().enumerate() {
        let row = &acc[r * cols..(r + 1) * cols];
        for (c, &o) in row.iter().enumerate() {
            out[index(r, c)] += o as f32 * (weight_scale(c) * a_scale);
        }
    }
}
