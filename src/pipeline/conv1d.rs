use super::conv::{check_layer, run_blocked, ConvParams, Layout};
use super::im2col::{output_size, ConvGeometry};
use super::LayerContext;
use crate::codec::BitPair;
use crate::error::{QnnError, QnnResult};
use crate::tensor::{FloatTensor, PackedTensor};

const OP: &str = "conv1d";

impl ConvGeometry {
    /// Geometry of a 1-D convolution.
    ///
    /// Channels-first: `x` is `[N, C, L]`, `w` is `[OC, C/g, K]`.
    /// Channels-last: `x` is `[N, L, C]`, `w` is `[OC, K, C/g]`.
    pub fn conv1d(x_dims: &[usize], w_dims: &[usize], params: &ConvParams) -> QnnResult<Self> {
        if x_dims.len() != 3 || w_dims.len() != 3 {
            return Err(QnnError::InvalidParameter(format!(
                "[{OP}] expected rank-3 input and weights, got {x_dims:?} and {w_dims:?}"
            )));
        }
        let (batch, in_channels, in_len) = match params.layout {
            Layout::ChannelsFirst => (x_dims[0], x_dims[1], x_dims[2]),
            Layout::ChannelsLast => (x_dims[0], x_dims[2], x_dims[1]),
        };
        let (out_channels, w_group_in, k) = match params.layout {
            Layout::ChannelsFirst => (w_dims[0], w_dims[1], w_dims[2]),
            Layout::ChannelsLast => (w_dims[0], w_dims[2], w_dims[1]),
        };

        params.check(OP, in_channels, out_channels)?;
        if w_group_in != in_channels / params.groups {
            return Err(QnnError::shape(OP, &[out_channels, in_channels / params.groups, k], w_dims));
        }
        let out_len = output_size(in_len, k, params.stride, params.padding, params.dilation)?;

        Ok(ConvGeometry {
            layout: params.layout,
            batch,
            in_channels,
            out_channels,
            groups: params.groups,
            in_h: 1,
            in_w: in_len,
            k_h: 1,
            k_w: k,
            out_h: 1,
            out_w: out_len,
            stride: params.stride,
            dilation: params.dilation,
            pad_h: 0,
            pad_w: params.padding,
        })
    }

    /// Declared output dims for a 1-D geometry.
    pub fn conv1d_output_dims(&self) -> [usize; 3] {
        match self.layout {
            Layout::ChannelsFirst => [self.batch, self.out_channels, self.out_w],
            Layout::ChannelsLast => [self.batch, self.out_w, self.out_channels],
        }
    }
}

/// Quantized 1-D convolution, blocked over `ctx.blocking.conv1d_len` output
/// positions.
#[allow(clippy::too_many_arguments)]
pub fn conv1d(
    ctx: &mut LayerContext<'_>,
    out: &mut FloatTensor,
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    params: &ConvParams,
    alignment: usize,
) -> QnnResult<()> {
    let geom = ConvGeometry::conv1d(x.dims(), w.dims(), params)?;
    check_layer(OP, w, bias, bits, alignment, geom.out_channels)?;

    let expected = geom.conv1d_output_dims();
    if out.dims() != expected {
        return Err(QnnError::shape(OP, &expected, out.dims()));
    }

    let block = ctx.blocking.conv1d_len;
    run_blocked(OP, ctx, &geom, out.data_mut(), x.data(), w, bias, bits, alignment, block)
}
