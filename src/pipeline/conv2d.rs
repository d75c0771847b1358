use super::conv::{check_layer, run_blocked, ConvParams, Layout};
use super::im2col::{output_size, ConvGeometry};
use super::LayerContext;
use crate::codec::BitPair;
use crate::error::{QnnError, QnnResult};
use crate::tensor::{FloatTensor, PackedTensor};

const OP: &str = "conv2d";

impl ConvGeometry {
    /// Geometry of a 2-D convolution.
    ///
    /// Channels-first: `x` is `[N, C, H, W]`, `w` is `[OC, C/g, KH, KW]`.
    /// Channels-last: `x` is `[N, H, W, C]`, `w` is `[OC, KH, KW, C/g]`.
    pub fn conv2d(x_dims: &[usize], w_dims: &[usize], params: &ConvParams) -> QnnResult<Self> {
        if x_dims.len() != 4 || w_dims.len() != 4 {
            return Err(QnnError::InvalidParameter(format!(
                "[{OP}] expected rank-4 input and weights, got {x_dims:?} and {w_dims:?}"
            )));
        }
        let (batch, in_channels, in_h, in_w) = match params.layout {
            Layout::ChannelsFirst => (x_dims[0], x_dims[1], x_dims[2], x_dims[3]),
            Layout::ChannelsLast => (x_dims[0], x_dims[3], x_dims[1], x_dims[2]),
        };
        let (out_channels, w_group_in, k_h, k_w) = match params.layout {
            Layout::ChannelsFirst => (w_dims[0], w_dims[1], w_dims[2], w_dims[3]),
            Layout::ChannelsLast => (w_dims[0], w_dims[3], w_dims[1], w_dims[2]),
        };

        params.check(OP, in_channels, out_channels)?;
        if w_group_in != in_channels / params.groups {
            return Err(QnnError::shape(
                OP,
                &[out_channels, in_channels / params.groups, k_h, k_w],
                w_dims,
            ));
        }
        let out_h = output_size(in_h, k_h, params.stride, params.padding, params.dilation)?;
        let out_w = output_size(in_w, k_w, params.stride, params.padding, params.dilation)?;

        Ok(ConvGeometry {
            layout: params.layout,
            batch,
            in_channels,
            out_channels,
            groups: params.groups,
            in_h,
            in_w,
            k_h,
            k_w,
            out_h,
            out_w,
            stride: params.stride,
            dilation: params.dilation,
            pad_h: params.padding,
            pad_w: params.padding,
        })
    }

    /// Declared output dims for a 2-D geometry.
    pub fn conv2d_output_dims(&self) -> [usize; 4] {
        match self.layout {
            Layout::ChannelsFirst => [self.batch, self.out_channels, self.out_h, self.out_w],
            Layout::ChannelsLast => [self.batch, self.out_h, self.out_w, self.out_channels],
        }
    }
}

/// Quantized 2-D convolution, blocked over `ctx.blocking.conv2d_rows` output
/// rows at a time.
#[allow(clippy::too_many_arguments)]
pub fn conv2d(
    ctx: &mut LayerContext<'_>,
    out: &mut FloatTensor,
    x: &FloatTensor,
    w: &PackedTensor,
    bias: Option<&[f32]>,
    bits: BitPair,
    params: &ConvParams,
    alignment: usize,
) -> QnnResult<()> {
    let geom = ConvGeometry::conv2d(x.dims(), w.dims(), params)?;
    check_layer(OP, w, bias, bits, alignment, geom.out_channels)?;

    let expected = geom.conv2d_output_dims();
    if out.dims() != expected {
        return Err(QnnError::shape(OP, &expected, out.dims()));
    }

    let block = ctx.blocking.conv2d_rows * geom.out_w;
    run_blocked(OP, ctx, &geom, out.data_mut(), x.data(), w, bias, bits, alignment, block)
}
