use crate::color::ColorDescriptor;
use crate::dispatch::{Job, Kernel, KernelError, for_each_item};
use crate::error::FxResult;
use crate::extent::ImageExtent;
use crate::pixel::{self, Pixel};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PseudoFlareArgs {
    pub artifact_copies: i32,
    /// Spacing between ghosts as a fraction of the distance to the center.
    pub artifact_displacement: f64,
    /// Halo radius in pixels.
    pub halo_displacement: i32,
    pub power: f64,
    pub bilinear: u8,
}

/// Ghost copies of bright areas mirrored through the image center, plus a
/// ring-shaped halo. Expects a thresholded image as input.
pub struct PseudoFlareKernel<'a> {
    args: PseudoFlareArgs,
    extent: ImageExtent,
    color: ColorDescriptor,
    input: &'a [u8],
}

impl<'a> PseudoFlareKernel<'a> {
    pub fn new(
        args: PseudoFlareArgs,
        extent: ImageExtent,
        color: ColorDescriptor,
        input: &'a [u8],
    ) -> FxResult<Self> {
        super::check_pixel_input("pseudo flare input", input, &extent, &color)?;
        Ok(Self {
            args,
            extent,
            color,
            input,
        })
    }

    /// Moves `pos` back into the image along the line of slope `slope`,
    /// whole image widths (or heights for steep lines) at a time.
    fn wrap(&self, pos: (f64, f64), slope: f64) -> (f64, f64) {
        let w = self.extent.width() as f64;
        let h = self.extent.height() as f64;
        let (mut x, mut y) = pos;
        if (-1.0..=1.0).contains(&slope) {
            let k = (x / w).floor();
            x -= k * w;
            y -= k * w * slope;
        } else {
            let k = (y / h).floor();
            y -= k * h;
            x -= k * h / slope;
        }
        (x, y)
    }

    /// `(1 - d/|center|)^exponent`, where `d` is the distance of `pos` from
    /// the center.
    fn center_weight(pos: (f64, f64), center: (f64, f64), center_len: f64, exponent: i32) -> f64 {
        let d = (pos.0 - center.0).hypot(pos.1 - center.1);
        (1.0 - d / center_len).powi(exponent)
    }

    fn flare_at(&self, x: usize, y: usize) -> Pixel {
        let bilinear = self.args.bilinear != 0;
        let center = self.extent.center();
        let center_len = center.0.hypot(center.1).max(f64::EPSILON);
        let mirrored = (
            (self.extent.width() - x - 1) as f64,
            (self.extent.height() - y - 1) as f64,
        );
        let dir = (
            (center.0 - mirrored.0) * self.args.artifact_displacement,
            (center.1 - mirrored.1) * self.args.artifact_displacement,
        );
        let dir_len = dir.0.hypot(dir.1);
        let slope = dir.1 / dir.0;

        let mut acc = pixel::read_at(self.input, x, y, &self.extent, &self.color);
        for j in 0..self.args.artifact_copies.max(0) {
            let offset = (mirrored.0 + dir.0 * j as f64, mirrored.1 + dir.1 * j as f64);
            let offset = if dir_len > 0.0 {
                self.wrap(offset, slope)
            } else {
                offset
            };
            let weight = Self::center_weight(offset, center, center_len, 4);
            let sample = pixel::sample(
                self.input,
                offset.0,
                offset.1,
                &self.extent,
                &self.color,
                bilinear,
            );
            acc = acc.add(sample.scale(weight));
        }

        // No direction to place the halo along when the mirrored point is the center.
        if dir_len > 0.0 {
            let halo_px = self.args.halo_displacement as f64;
            let halo = (
                mirrored.0 + dir.0 / dir_len * halo_px,
                mirrored.1 + dir.1 / dir_len * halo_px,
            );
            let halo = self.wrap(halo, slope);
            let weight = Self::center_weight(halo, center, center_len, 8);
            let sample = pixel::sample(
                self.input,
                halo.0,
                halo.1,
                &self.extent,
                &self.color,
                bilinear,
            );
            acc = acc.add(sample.scale(weight));
        }

        acc.scale(self.args.power)
    }
}

impl Kernel<u8> for PseudoFlareKernel<'_> {
    fn name(&self) -> &'static str {
        "pseudo-flare"
    }

    fn process(&self, job: &Job<'_>, out: &mut [u8]) -> Result<(), KernelError> {
        for_each_item(job, out, self.color.bytes_per_pixel(), |i, px_out| {
            let (x, y) = self.extent.coords(i);
            pixel::encode(&self.flare_at(x, y), px_out, &self.color);
        })
    }
}
