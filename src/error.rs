//! Error type shared by every layer of the crate.
//!
//! All of these are precondition violations. The pipeline checks them before
//! it writes a single output element, so an `Err` never leaves a half-written
//! output tensor behind.

use std::fmt;

use thiserror::Error;

use crate::arena::ArenaRegion;
use crate::codec::BitWidth;

pub type QnnResult<T> = Result<T, QnnError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QnnError {
    #[error("[{op}] shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("[{op}] {channels} channels not divisible by {groups} groups")]
    GroupDivisibility {
        op: &'static str,
        channels: usize,
        groups: usize,
    },

    #[error("unsupported bit-width {0} (expected 1, 2, 4 or 8)")]
    UnsupportedBitWidth(u32),

    #[error("bit-width mismatch: requested {requested}, tensor holds {actual}")]
    BitWidthMismatch {
        requested: BitWidth,
        actual: BitWidth,
    },

    #[error("scratch overflow in {region} region: need {required}, capacity {capacity}")]
    ScratchOverflow {
        region: ArenaRegion,
        required: usize,
        capacity: usize,
    },

    #[error("packed buffer too small: need {required} bytes, have {actual}")]
    BufferTooSmall { required: usize, actual: usize },

    #[error("invalid rank {0}: tensors have 1 to 4 dimensions")]
    InvalidRank(usize),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown kernel strategy `{0}`")]
    UnknownStrategy(String),

    #[error("config error: {0}")]
    Config(String),
}

impl QnnError {
    pub(crate) fn shape(op: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        QnnError::ShapeMismatch {
            op,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

/// Fail-fast handling for callers that run on targets without a recovery
/// path: log the error, print it to stderr and terminate the process.
pub trait FailFast<T> {
    fn or_abort(self, context: &str) -> T;
}

impl<T, E: fmt::Display> FailFast<T> for Result<T, E> {
    fn or_abort(self, context: &str) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(%context, error = %e, "fatal");
                eprintln!("[{context}] {e}");
                std::process::exit(1);
            }
        }
    }
}
