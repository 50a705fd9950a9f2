use crate::color::{ColorDescriptor, ColorModel};
use crate::dispatch::{Job, Kernel, KernelError, for_each_item};
use crate::error::FxResult;
use crate::extent::ImageExtent;
use crate::pixel::{self, Pixel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdArgs {
    /// Cut-off on a 0–255 scale, rescaled to the depth's range.
    pub threshold: u8,
    /// Added to the color channels afterwards, in 0–255 units and channel
    /// order. All zero means no bias.
    pub bias: [u8; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerArgs {
    pub power: u32,
}

/// Keeps only what is brighter than the threshold, stretched back to the
/// full range. Alpha passes through.
pub struct ThresholdKernel<'a> {
    args: ThresholdArgs,
    color: ColorDescriptor,
    input: &'a [u8],
}

impl<'a> ThresholdKernel<'a> {
    pub fn new(
        args: ThresholdArgs,
        extent: &ImageExtent,
        color: ColorDescriptor,
        input: &'a [u8],
    ) -> FxResult<Self> {
        super::check_pixel_input("threshold input", input, extent, &color)?;
        Ok(Self { args, color, input })
    }

    fn apply(&self, src: Pixel) -> Pixel {
        let max = self.color.channel_max();
        let thresh = (self.args.threshold as f64 / 255.0) * max;
        let scale = max / (max + self.color.depth().channel_step() - thresh);
        let alpha = self.color.alpha_index();
        let mut out = src;

        match self.color.model() {
            ColorModel::Alpha => {}
            ColorModel::Rgba | ColorModel::Xyza | ColorModel::GrayA => {
                for c in 0..alpha {
                    out.0[c] = (src.0[c] - thresh) * scale;
                }
            }
            // Ink values: light areas are the ones with little ink.
            ColorModel::Cmyka => {
                for c in 0..alpha {
                    out.0[c] = ((max - src.0[c]) - thresh) * scale;
                }
            }
            // Only lightness/luma is thresholded, chroma is kept.
            ColorModel::Laba | ColorModel::YCbCrA => {
                out.0[0] = (src.0[0] - thresh) * scale;
            }
        }

        if self.args.bias != [0; 4] {
            for (c, b) in self.args.bias.iter().enumerate().take(alpha) {
                out.0[c] = out.0[c].max(0.0) + (*b as f64 / 255.0) * max;
            }
        }
        out
    }
}

impl Kernel<u8> for ThresholdKernel<'_> {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn process(&self, job: &Job<'_>, out: &mut [u8]) -> Result<(), KernelError> {
        for_each_item(job, out, self.color.bytes_per_pixel(), |i, px_out| {
            let src = pixel::read(self.input, i, &self.color);
            pixel::encode(&self.apply(src), px_out, &self.color);
        })
    }
}

/// Multiplies every channel, alpha included, by an integer factor.
pub struct PowerKernel<'a> {
    args: PowerArgs,
    color: ColorDescriptor,
    input: &'a [u8],
}

impl<'a> PowerKernel<'a> {
    pub fn new(
        args: PowerArgs,
        extent: &ImageExtent,
        color: ColorDescriptor,
        input: &'a [u8],
    ) -> FxResult<Self> {
        super::check_pixel_input("power input", input, extent, &color)?;
        Ok(Self { args, color, input })
    }
}

impl Kernel<u8> for PowerKernel<'_> {
    fn name(&self) -> &'static str {
        "power"
    }

    fn process(&self, job: &Job<'_>, out: &mut [u8]) -> Result<(), KernelError> {
        let factor = self.args.power as f64;
        for_each_item(job, out, self.color.bytes_per_pixel(), |i, px_out| {
            let src = pixel::read(self.input, i, &self.color);
            pixel::encode(&src.scale(factor), px_out, &self.color);
        })
    }
}
