//! Fixed-capacity scratch memory for one layer call at a time.
//!
//! All four regions are allocated once in [`ScratchArena::new`] and never
//! grow. A call states what it needs up front with a [`ScratchRequest`];
//! [`ScratchArena::reserve`] either hands back disjoint slices covering the
//! whole request or fails with `ScratchOverflow` without touching anything.
//!
//! An arena is not shared: concurrent callers each own one.

use std::fmt;

use crate::config::ScratchConfig;
use crate::error::{QnnError, QnnResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArenaRegion {
    Packed,
    Scales,
    Columns,
    Accumulators,
}

impl fmt::Display for ArenaRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArenaRegion::Packed => "packed",
            ArenaRegion::Scales => "scales",
            ArenaRegion::Columns => "columns",
            ArenaRegion::Accumulators => "accumulators",
        };
        f.write_str(name)
    }
}

/// Sizes one block needs from each region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScratchRequest {
    /// Packed activation bytes.
    pub packed_bytes: usize,
    /// Weight staging bytes, carved from the packed region after the
    /// activations.
    pub staging_bytes: usize,
    /// Activation rows (one scale each).
    pub rows: usize,
    /// Float column buffer length.
    pub column_floats: usize,
    /// int32 accumulator length.
    pub accumulators: usize,
}

/// Disjoint views handed out by [`ScratchArena::reserve`]. Each slice has
/// exactly the requested length; `packed` and `staging` start zeroed.
pub struct ArenaSlices<'a> {
    pub packed: &'a mut [u8],
    pub staging: &'a mut [u8],
    pub scales: &'a mut [f32],
    pub columns: &'a mut [f32],
    pub accumulators: &'a mut [i32],
}

#[derive(Debug, Clone)]
pub struct ScratchArena {
    packed: Vec<u8>,
    scales: Vec<f32>,
    columns: Vec<f32>,
    accumulators: Vec<i32>,
}

impl ScratchArena {
    pub fn new(config: &ScratchConfig) -> Self {
        Self {
            packed: vec![0; config.packed_bytes],
            scales: vec![0.0; config.max_rows],
            columns: vec![0.0; config.column_floats],
            accumulators: vec![0; config.accumulators],
        }
    }

    pub fn capacity(&self, region: ArenaRegion) -> usize {
        match region {
            ArenaRegion::Packed => self.packed.len(),
            ArenaRegion::Scales => self.scales.len(),
            ArenaRegion::Columns => self.columns.len(),
            ArenaRegion::Accumulators => self.accumulators.len(),
        }
    }

    /// Check `request` against every region without handing anything out.
    pub fn check(&self, request: &ScratchRequest) -> QnnResult<()> {
        let needs = [
            (ArenaRegion::Packed, request.packed_bytes + request.staging_bytes),
            (ArenaRegion::Scales, request.rows),
            (ArenaRegion::Columns, request.column_floats),
            (ArenaRegion::Accumulators, request.accumulators),
        ];
        for (region, required) in needs {
            let capacity = self.capacity(region);
            if required > capacity {
                return Err(QnnError::ScratchOverflow {
                    region,
                    required,
                    capacity,
                });
            }
        }
        Ok(())
    }

    pub fn reserve(&mut self, request: &ScratchRequest) -> QnnResult<ArenaSlices<'_>> {
        self.check(request)?;

        let packed_total = request.packed_bytes + request.staging_bytes;
        let (packed, staging) = self.packed[..packed_total].split_at_mut(request.packed_bytes);
        packed.fill(0);
        staging.fill(0);

        Ok(ArenaSlices {
            packed,
            staging,
            scales: &mut self.scales[..request.rows],
            columns: &mut self.columns[..request.column_floats],
            accumulators: &mut self.accumulators[..request.accumulators],
        })
    }
}
