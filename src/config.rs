//! Engine configuration.
//!
//! Resolution order: built-in defaults, an optional JSON file, then
//! `QMATMUL_*` environment overrides. Everything is fixed once the engine is
//! built; nothing here is consulted during a layer call.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QnnError, QnnResult};
use crate::runtime::Strategy;

pub const ENV_STRATEGY: &str = "QMATMUL_STRATEGY";
pub const ENV_ALIGNMENT: &str = "QMATMUL_ALIGNMENT";
pub const ENV_SCRATCH_BYTES: &str = "QMATMUL_SCRATCH_BYTES";

/// Capacities of the four scratch regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Packed activation bytes, including weight staging for grouped slices.
    pub packed_bytes: usize,
    /// Activation rows per block (one scale each).
    pub max_rows: usize,
    /// im2col column buffer, in floats.
    pub column_floats: usize,
    /// int32 accumulator block, in elements.
    pub accumulators: usize,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            packed_bytes: 64 * 1024,
            max_rows: 1024,
            column_floats: 64 * 1024,
            accumulators: 16 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Kernel strategy installed in the runtime table.
    pub strategy: Strategy,

    /// Reduction dimension is padded to a multiple of this before quantization.
    pub alignment: usize,

    pub scratch: ScratchConfig,

    /// Output rows per block in conv2d.
    pub conv2d_block_rows: usize,

    /// Output positions per block in conv1d.
    pub conv1d_block_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Reference,
            alignment: 32,
            scratch: ScratchConfig::default(),
            conv2d_block_rows: 2,
            conv1d_block_len: 4,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> QnnResult<Self> {
        serde_json::from_str(text).map_err(|e| QnnError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> QnnResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| QnnError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> QnnResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| QnnError::Config(e.to_string()))
    }

    /// Defaults or `path`, then process environment, then validation.
    pub fn load(path: Option<&Path>) -> QnnResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QMATMUL_*` overrides from `lookup` (the process environment
    /// in [`EngineConfig::load`]).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> QnnResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_STRATEGY) {
            self.strategy = v.parse()?;
        }
        if let Some(v) = lookup(ENV_ALIGNMENT) {
            self.alignment = parse_usize(ENV_ALIGNMENT, &v)?;
        }
        if let Some(v) = lookup(ENV_SCRATCH_BYTES) {
            self.scratch.packed_bytes = parse_usize(ENV_SCRATCH_BYTES, &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> QnnResult<()> {
        let checks = [
            ("alignment", self.alignment),
            ("scratch.packed_bytes", self.scratch.packed_bytes),
            ("scratch.max_rows", self.scratch.max_rows),
            ("scratch.column_floats", self.scratch.column_floats),
            ("scratch.accumulators", self.scratch.accumulators),
            ("conv2d_block_rows", self.conv2d_block_rows),
            ("conv1d_block_len", self.conv1d_block_len),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(QnnError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

fn parse_usize(key: &str, value: &str) -> QnnResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| QnnError::Config(format!("{key}: `{value}` is not a non-negative integer")))
}
