//! One handle bundling configuration, kernel table and scratch arena.

use tracing::info;

use crate::arena::ScratchArena;
use crate::codec::{BitPair, BitWidth};
use crate::config::EngineConfig;
use crate::error::QnnResult;
use crate::pipeline::{self, Blocking, ConvParams, LayerContext};
use crate::quant;
use crate::runtime::{KernelTable, Strategy};
use crate::tensor::{FloatTensor, PackedTensor};

/// Single-threaded inference engine.
///
/// Owns exactly one arena, so an `Engine` serves one caller at a time; give
/// each thread its own engine (or use [`crate::threaded`]).
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    table: KernelTable,
    arena: ScratchArena,
}

impl Engine {
    pub fn new(config: EngineConfig) -> QnnResult<Self> {
        config.validate()?;
        let table = KernelTable::for_strategy(config.strategy);
        let arena = ScratchArena::new(&config.scratch);
        info!(
            strategy = %config.strategy,
            alignment = config.alignment,
            scratch_bytes = config.scratch.packed_bytes,
            "engine ready"
        );
        Ok(Self { config, table, arena })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self) -> &KernelTable {
        &self.table
    }

    pub fn strategy(&self) -> Strategy {
        self.table.strategy()
    }

    /// Rebuild the kernel table. Must not race with layer calls, which the
    /// `&mut self` receiver already guarantees.
    pub fn select_strategy(&mut self, strategy: Strategy) {
        self.config.strategy = strategy;
        self.table = KernelTable::for_strategy(strategy);
    }

    /// [`Engine::select_strategy`] by name.
    pub fn select_strategy_by_name(&mut self, name: &str) -> QnnResult<()> {
        self.select_strategy(name.parse()?);
        Ok(())
    }

    /// Per-row quantization padded to the configured alignment.
    pub fn quantize(&self, x: &FloatTensor, bits: BitWidth) -> QnnResult<PackedTensor> {
        quant::quantize_tensor(x, bits, self.config.alignment)
    }

    pub fn dequantize(&self, p: &PackedTensor) -> QnnResult<FloatTensor> {
        quant::dequantize_tensor(p)
    }

    fn context(&mut self) -> LayerContext<'_> {
        LayerContext::new(&self.table, &mut self.arena).with_blocking(Blocking::from(&self.config))
    }

    pub fn linear(
        &mut self,
        out: &mut FloatTensor,
        x: &FloatTensor,
        w: &PackedTensor,
        bias: Option<&[f32]>,
        bits: BitPair,
    ) -> QnnResult<()> {
        let alignment = self.config.alignment;
        pipeline::linear(&mut self.context(), out, x, w, bias, bits, alignment)
    }

    pub fn conv1d(
        &mut self,
        out: &mut FloatTensor,
        x: &FloatTensor,
        w: &PackedTensor,
        bias: Option<&[f32]>,
        bits: BitPair,
        params: &ConvParams,
    ) -> QnnResult<()> {
        let alignment = self.config.alignment;
        pipeline::conv1d(&mut self.context(), out, x, w, bias, bits, params, alignment)
    }

    pub fn conv2d(
        &mut self,
        out: &mut FloatTensor,
        x: &FloatTensor,
        w: &PackedTensor,
        bias: Option<&[f32]>,
        bits: BitPair,
        params: &ConvParams,
    ) -> QnnResult<()> {
        let alignment = self.config.alignment;
        pipeline::conv2d(&mut self.context(), out, x, w, bias, bits, params, alignment)
    }
}
