//! Convolution geometry and the im2col gather.
//!
//! 1-D convolution is carried as 2-D with a unit height, so both share one
//! geometry type and one gather. The gather fills one row per output
//! position; the column order inside a row matches the packed weight row
//! layout for the tensor layout in use:
//!
//! - channels-first, weights `[OC, IC/g, KH, KW]`: `(ci · KH + kh) · KW + kw`
//! - channels-last, weights `[OC, KH, KW, IC/g]`: `(kh · KW + kw) · IC/g + ci`

use super::conv::Layout;
use crate::error::{QnnError, QnnResult};
use crate::tensor::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub layout: Layout,
    pub batch: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub groups: usize,
    pub in_h: usize,
    pub in_w: usize,
    pub k_h: usize,
    pub k_w: usize,
    pub out_h: usize,
    pub out_w: usize,
    pub stride: usize,
    pub dilation: usize,
    pub pad_h: usize,
    pub pad_w: usize,
}

impl ConvGeometry {
    pub fn group_in(&self) -> usize {
        self.in_channels / self.groups
    }

    pub fn group_out(&self) -> usize {
        self.out_channels / self.groups
    }

    /// Length of one im2col row (and of one packed weight row).
    pub fn reduction(&self) -> usize {
        self.group_in() * self.k_h * self.k_w
    }

    /// Output positions per (batch, channel).
    pub fn positions(&self) -> usize {
        self.out_h * self.out_w
    }

    /// Input as a rank-4 shape in memory order. 1-D inputs have unit height.
    pub fn input_shape(&self) -> Shape {
        match self.layout {
            Layout::ChannelsFirst => Shape::rank4([self.batch, self.in_channels, self.in_h, self.in_w]),
            Layout::ChannelsLast => Shape::rank4([self.batch, self.in_h, self.in_w, self.in_channels]),
        }
    }

    /// Output as a rank-4 shape in memory order.
    pub fn output_shape(&self) -> Shape {
        match self.layout {
            Layout::ChannelsFirst => Shape::rank4([self.batch, self.out_channels, self.out_h, self.out_w]),
            Layout::ChannelsLast => Shape::rank4([self.batch, self.out_h, self.out_w, self.out_channels]),
        }
    }

    #[inline]
    pub fn input_index(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        let index = match self.layout {
            Layout::ChannelsFirst => [n, c, h, w],
            Layout::ChannelsLast => [n, h, w, c],
        };
        self.input_shape().offset(&index)
    }

    /// Flat index of output channel `oc` at position `pos` (`oh · OW + ow`).
    #[inline]
    pub fn output_index(&self, n: usize, oc: usize, pos: usize) -> usize {
        let (oh, ow) = (pos / self.out_w, pos % self.out_w);
        let index = match self.layout {
            Layout::ChannelsFirst => [n, oc, oh, ow],
            Layout::ChannelsLast => [n, oh, ow, oc],
        };
        self.output_shape().offset(&index)
    }

    pub fn output_len(&self) -> usize {
        self.output_shape().numel()
    }

    /// Fill `cols` with the patches of output positions `pos0..pos0 + count`
    /// for batch element `n` and group `group`. Taps that land in the padding
    /// read as 0.
    pub fn gather(&self, x: &[f32], n: usize, group: usize, pos0: usize, count: usize, cols: &mut [f32]) {
        let cg = self.group_in();
        let red = self.reduction();
        debug_assert!(cols.len() >= count * red);

        for r in 0..count {
            let pos = pos0 + r;
            let (oh, ow) = (pos / self.out_w, pos % self.out_w);
            let row = &mut cols[r * red..(r + 1) * red];

            for kh in 0..self.k_h {
                let ih = (oh * self.stride + kh * self.dilation) as isize - self.pad_h as isize;
                for kw in 0..self.k_w {
                    let iw = (ow * self.stride + kw * self.dilation) as isize - self.pad_w as isize;
                    let inside = ih >= 0 && iw >= 0 && (ih as usize) < self.in_h && (iw as usize) < self.in_w;

                    for ci in 0..cg {
                        let v = if inside {
                            x[self.input_index(n, group * cg + ci, ih as usize, iw as usize)]
                        } else {
                            0.0
                        };
                        let col = match self.layout {
                            Layout::ChannelsFirst => (ci * self.k_h + kh) * self.k_w + kw,
                            Layout::ChannelsLast => (kh * self.k_w + kw) * cg + ci,
                        };
                        row[col] = v;
                    }
                }
            }
        }
    }
}

/// `⌊(input + 2·padding − (dilation·(kernel − 1) + 1)) / stride⌋ + 1`.
pub fn output_size(input: usize, kernel: usize, stride: usize, padding: usize, dilation: usize) -> QnnResult<usize> {
    if kernel == 0 {
        return Err(QnnError::InvalidParameter("kernel size must be positive".into()));
    }
    if stride == 0 || dilation == 0 {
        return Err(QnnError::InvalidParameter(format!(
            "stride ({stride}) and dilation ({dilation}) must be positive"
        )));
    }
    let effective = dilation * (kernel - 1) + 1;
    let padded = input + 2 * padding;
    if effective > padded {
        return Err(QnnError::InvalidParameter(format!(
            "effective kernel {effective} larger than padded input {padded}"
        )));
    }
    Ok((padded - effective) / stride + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_size_law() {
        assert_eq!(output_size(5, 3, 1, 0, 1).unwrap(), 3);
        assert_eq!(output_size(5, 3, 2, 1, 1).unwrap(), 3);
        assert_eq!(output_size(7, 3, 1, 0, 2).unwrap(), 3);
        assert_eq!(output_size(4, 4, 3, 0, 1).unwrap(), 1);
        assert!(output_size(2, 4, 1, 0, 1).is_err());
        assert!(output_size(4, 3, 0, 0, 1).is_err());
    }

    #[test]
    fn channels_last_output_index() {
        let g = ConvGeometry {
            layout: Layout::ChannelsLast,
            batch: 2,
            in_channels: 3,
            out_channels: 4,
            groups: 1,
            in_h: 5,
            in_w: 5,
            k_h: 3,
            k_w: 3,
            out_h: 3,
            out_w: 3,
            stride: 1,
            dilation: 1,
            pad_h: 0,
            pad_w: 0,
        };
        // NHWC: ((n · OH + oh) · OW + ow) · OC + oc
        assert_eq!(g.output_index(1, 2, 4), ((3 + 1) * 3 + 1) * 4 + 2);
        assert_eq!(g.input_index(1, 2, 4, 3), ((5 + 4) * 5 + 3) * 3 + 2);
        assert_eq!(g.output_len(), 2 * 4 * 9);
    }

    #[test]
    fn gather_pads_with_zero() {
        // 1 channel, width 3, kernel 3, padding 1, channels-first
        let g = ConvGeometry {
            layout: Layout::ChannelsFirst,
            batch: 1,
            in_channels: 1,
            out_channels: 1,
            groups: 1,
            in_h: 1,
            in_w: 3,
            k_h: 1,
            k_w: 3,
            out_h: 1,
            out_w: 3,
            stride: 1,
            dilation: 1,
            pad_h: 0,
            pad_w: 1,
        };
        let mut cols = [f32::NAN; 9];
        g.gather(&[1.0, 2.0, 3.0], 0, 0, 0, 3, &mut cols);
        assert_eq!(cols, [0.0, 1.0, 2.0, 1.0, 2.0, 3.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn channels_last_column_order() {
        // 2 channels, width 2, kernel 2, no padding, channels-last
        let g = ConvGeometry {
            layout: Layout::ChannelsLast,
            batch: 1,
            in_channels: 2,
            out_channels: 1,
            groups: 1,
            in_h: 1,
            in_w: 2,
            k_h: 1,
            k_w: 2,
            out_h: 1,
            out_w: 1,
            stride: 1,
            dilation: 1,
            pad_h: 0,
            pad_w: 0,
        };
        // x[w][c]
        let x = [10.0, 20.0, 11.0, 21.0];
        let mut cols = [0.0; 4];
        g.gather(&x, 0, 0, 0, 1, &mut cols);
        assert_eq!(cols, [10.0, 20.0, 11.0, 21.0]);
    }
}
