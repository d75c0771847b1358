//! Kernel strategy selection.
//!
//! A [`KernelTable`] maps every (activation bits, weight bits) pair to one
//! kernel. It is built once for a [`Strategy`] and then only read: the
//! pipeline receives it by reference instead of consulting global state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{BitPair, BitWidth};
use crate::error::QnnError;
use crate::kernels::avx2::Avx2Backend;
use crate::kernels::lut::LutBackend;
use crate::kernels::reference::{self, ReferenceBackend};
use crate::kernels::unrolled::UnrolledBackend;
use crate::kernels::{KernelBackend, KernelFn};
use crate::tensor::PackedMatrix;

/// Which backend the table prefers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Reference,
    Unroll,
    Lut,
    Simd,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [Strategy::Reference, Strategy::Unroll, Strategy::Lut, Strategy::Simd];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Reference => "reference",
            Strategy::Unroll => "unroll",
            Strategy::Lut => "lut",
            Strategy::Simd => "simd",
        }
    }

    pub fn backend(self) -> &'static dyn KernelBackend {
        match self {
            Strategy::Reference => &ReferenceBackend,
            Strategy::Unroll => &UnrolledBackend,
            Strategy::Lut => &LutBackend,
            Strategy::Simd => &Avx2Backend,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = QnnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" | "ref" | "baseline" | "default" => Ok(Strategy::Reference),
            "unroll" | "unrolled" => Ok(Strategy::Unroll),
            "lut" | "tmac" => Ok(Strategy::Lut),
            "simd" | "avx2" => Ok(Strategy::Simd),
            _ => Err(QnnError::UnknownStrategy(s.to_string())),
        }
    }
}

/// One cell of the table: the kernel and the backend it came from.
#[derive(Debug, Clone, Copy)]
pub struct KernelDescriptor {
    pub pair: BitPair,
    pub backend: &'static str,
    pub kernel: KernelFn,
}

impl KernelDescriptor {
    #[inline]
    pub fn run(&self, out: &mut [i32], x: &PackedMatrix<'_>, w: &PackedMatrix<'_>) {
        (self.kernel)(out, x, w)
    }

    pub fn is_fallback(&self) -> bool {
        self.backend == ReferenceBackend.name()
    }
}

/// 4×4 grid of kernels indexed by `BitPair`. Never has an empty cell.
#[derive(Debug, Clone)]
pub struct KernelTable {
    strategy: Strategy,
    cells: [[KernelDescriptor; 4]; 4],
}

impl KernelTable {
    /// Build the table for `strategy`: each cell takes the strategy's kernel
    /// when it has one, otherwise the reference kernel.
    pub fn for_strategy(strategy: Strategy) -> Self {
        let backend = strategy.backend();
        let cells = std::array::from_fn(|a| {
            std::array::from_fn(|w| {
                let pair = BitPair::new(log2_width(a), log2_width(w));
                match backend.kernel(pair) {
                    Some(kernel) => KernelDescriptor {
                        pair,
                        backend: backend.name(),
                        kernel,
                    },
                    None => KernelDescriptor {
                        pair,
                        backend: ReferenceBackend.name(),
                        kernel: reference::matmul as KernelFn,
                    },
                }
            })
        });

        let table = KernelTable { strategy, cells };
        for d in table.descriptors() {
            debug!(pair = %d.pair, backend = d.backend, "kernel cell");
        }
        info!(
            %strategy,
            accelerated = table.accelerated_count(),
            fallback = 16 - table.accelerated_count(),
            "kernel table built"
        );
        table
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[inline]
    pub fn get(&self, pair: BitPair) -> &KernelDescriptor {
        let (a, w) = pair.index();
        &self.cells[a][w]
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &KernelDescriptor> {
        self.cells.iter().flatten()
    }

    /// Cells served by something other than the reference kernel. Always 0
    /// for the reference strategy.
    pub fn accelerated_count(&self) -> usize {
        if self.strategy == Strategy::Reference {
            return 0;
        }
        self.descriptors().filter(|d| !d.is_fallback()).count()
    }
}

impl Default for KernelTable {
    fn default() -> Self {
        Self::for_strategy(Strategy::Reference)
    }
}

fn log2_width(log2: usize) -> BitWidth {
    BitWidth::from_log2(log2).unwrap_or_else(|| unreachable!("table index {log2} out of range"))
}
