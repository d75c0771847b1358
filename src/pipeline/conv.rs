//! Parameters and the blocked driver shared by conv1d and conv2d.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::im2col::ConvGeometry;
use super::{accumulate, check_alignment, check_bias, LayerContext};
use crate::arena::{ArenaSlices, ScratchRequest};
use crate::codec::{self, BitPair};
use crate::error::{QnnError, QnnResult};
use crate::quant::{aligned_len, quantize_rows_into};
use crate::tensor::{PackedMatrix, PackedTensor};

/// Memory order of activations, outputs and weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// NCL / NCHW activations, `[OC, IC/g, K…]` weights.
    #[default]
    ChannelsFirst,
    /// NLC / NHWC activations, `[OC, K…, IC/g]` weights.
    ChannelsLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvParams {
    pub stride: usize,
    pub padding: usize,
    pub dilation: usize,
    pub groups: usize,
    pub layout: Layout,
}

impl Default for ConvParams {
    fn default() -> Self {
        Self {
            stride: 1,
            padding: 0,
            dilation: 1,
            groups: 1,
            layout: Layout::ChannelsFirst,
        }
    }
}

impl ConvParams {
    pub fn new(stride: usize, padding: usize) -> Self {
        Self {
            stride,
            padding,
            ..Self::default()
        }
    }

    pub fn dilation(mut self, dilation: usize) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub(crate) fn check(&self, op: &'static str, in_channels: usize, out_channels: usize) -> QnnResult<()> {
        if self.groups == 0 {
            return Err(QnnError::InvalidParameter(format!("[{op}] groups must be positive")));
        }
        if in_channels % self.groups != 0 {
            return Err(QnnError::GroupDivisibility {
                op,
                channels: in_channels,
                groups: self.groups,
            });
        }
        if out_channels % self.groups != 0 {
            return Err(QnnError::GroupDivisibility {
                op,
                channels: out_channels,
                groups: self.groups,
            });
        }
        Ok(())
    }
}

/// Checks that do not depend on the spatial rank.
pub(crate) fn check_layer(
    op: &'static str,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    alignment: usize,
    out_channels: usize,
) -> QnnResult<()> {
    check_alignment(alignment)?;
    if w.bits() != bits.weight {
        return Err(QnnError::BitWidthMismatch {
            requested: bits.weight,
            actual: w.bits(),
        });
    }
    check_bias(op, bias, out_channels)
}

/// Output positions per block for `geom`, never more than exist.
fn clamp_block(geom: &ConvGeometry, block: usize) -> usize {
    block.clamp(1, geom.positions().max(1))
}

/// Whether any group's weight rows start off a byte boundary.
fn needs_staging(geom: &ConvGeometry, w: &PackedTensor) -> QnnResult<bool> {
    if geom.groups == 1 {
        return Ok(false);
    }
    let wm = w.matrix();
    for g in 0..geom.groups {
        if !wm.sub_rows(g * geom.group_out(), geom.group_out())?.is_byte_aligned() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Row stride of the staged weight block: whole bytes per row.
fn staging_stride(geom: &ConvGeometry, bits: BitPair) -> usize {
    aligned_len(geom.reduction(), bits.weight.per_byte())
}

/// Scratch one block of `block` positions needs.
pub(crate) fn conv_request(
    geom: &ConvGeometry,
    w: &PackedTensor,
    bits: BitPair,
    alignment: usize,
    block: usize,
) -> QnnResult<ScratchRequest> {
    let red = geom.reduction();
    let block = clamp_block(geom, block);
    let staging_bytes = if needs_staging(geom, w)? {
        bits.weight.packed_len(geom.group_out() * staging_stride(geom, bits))
    } else {
        0
    };
    Ok(ScratchRequest {
        packed_bytes: bits.act.packed_len(block * aligned_len(red, alignment)),
        staging_bytes,
        rows: block,
        column_floats: block * red,
        accumulators: block * geom.group_out(),
    })
}

/// Copy a weight group into `staging` with byte-aligned rows.
fn stage_weights(src: &PackedMatrix<'_>, staging: &mut [u8], stride: usize) {
    let bits = src.bits();
    for r in 0..src.rows() {
        for k in 0..src.cols() {
            codec::set_code(staging, r * stride + k, bits, src.code(r, k));
        }
    }
}

/// Blocked convolution over a validated geometry.
///
/// `out` and `x` are the flat buffers described by `geom`; `w` holds
/// `geom.out_channels` rows of `geom.reduction()` codes.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_blocked(
    op: &'static str,
    ctx: &mut LayerContext<'_>,
    geom: &ConvGeometry,
    out: &mut [f32],
    x: &[f32],
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    alignment: usize,
    block: usize,
) -> QnnResult<()> {
    let red = geom.reduction();
    let a_stride = aligned_len(red, alignment);
    let ocg = geom.group_out();
    let positions = geom.positions();
    let block = clamp_block(geom, block);
    let request = conv_request(geom, w, bits, alignment, block)?;
    let staged = request.staging_bytes > 0;
    let s_stride = staging_stride(geom, bits);

    let ArenaSlices {
        packed,
        staging,
        scales,
        columns,
        accumulators,
    } = ctx.arena.reserve(&request)?;

    debug!(
        op,
        batch = geom.batch,
        groups = geom.groups,
        positions,
        reduction = red,
        pair = %bits,
        blocks = positions.div_ceil(block),
        staged,
        "conv layer"
    );

    seed_output(geom, out, bias);
    let kernel = ctx.table.get(bits);

    for g in 0..geom.groups {
        let group_rows = w.matrix().sub_rows(g * ocg, ocg)?;
        let wm = if staged && !group_rows.is_byte_aligned() {
            stage_weights(&group_rows, staging, s_stride);
            PackedMatrix::new(staging, bits.weight, ocg, red, s_stride, 0)?
        } else {
            group_rows
        };

        for n in 0..geom.batch {
            for p0 in (0..positions).step_by(block) {
                let count = block.min(positions - p0);
                trace!(op, group = g, n, p0, count, "block");

                let cols = &mut columns[..count * red];
                geom.gather(x, n, g, p0, count, cols);
                quantize_rows_into(cols, count, red, bits.act, packed, a_stride, &mut scales[..count])?;

                let xm = PackedMatrix::new(packed, bits.act, count, red, a_stride, 0)?;
                let acc = &mut accumulators[..count * ocg];
                kernel.run(acc, &xm, &wm);

                accumulate(
                    out,
                    acc,
                    &scales[..count],
                    ocg,
                    |j| w.row_scale(g * ocg + j),
                    |r, j| geom.output_index(n, g * ocg + j, p0 + r),
                );
            }
        }
    }
    Ok(())
}

/// Set every output element to its channel's bias (or 0).
pub(crate) fn seed_output(geom: &ConvGeometry, out: &mut [f32], bias: Option<&[f32]>) {
    let Some(bias) = bias else {
        out.fill(0.0);
        return;
    };
    for n in 0..geom.batch {
        for (oc, &b) in bias.iter().enumerate() {
            for pos in 0..geom.positions() {
                out[geom.output_index(n, oc, pos)] = b;
            }
        }
    }
}
