use crate::color::ColorDescriptor;
use crate::dispatch::{Job, Kernel, KernelError, for_each_item};
use crate::error::FxResult;
use crate::extent::ImageExtent;
use crate::pixel::{self, Pixel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadialArgs {
    /// Displacement in pixels reached at the image corners.
    pub power: i32,
    /// Percentage of the center-to-corner distance left untouched.
    pub deadzone: i32,
    pub exp_falloff: u8,
    pub bilinear: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearArgs {
    /// Displacement in pixels.
    pub power: i32,
    /// Degrees; 0 shifts the forward channel down the image.
    pub direction: i32,
    pub bilinear: u8,
}

/// Builds one output pixel by taking the forward channel from `+vec`, the
/// backward channel from `-vec` and averaging alpha over all three samples.
fn shift_channels(
    input: &[u8],
    x: usize,
    y: usize,
    vec: (f64, f64),
    extent: &ImageExtent,
    color: &ColorDescriptor,
    bilinear: bool,
) -> Pixel {
    let (fwd, bwd) = color.displacement_channels();
    let alpha = color.alpha_index();
    let (fx, fy) = (x as f64, y as f64);

    let mut out = pixel::read_at(input, x, y, extent, color);
    let forward = pixel::sample(input, fx + vec.0, fy + vec.1, extent, color, bilinear);
    let backward = pixel::sample(input, fx - vec.0, fy - vec.1, extent, color, bilinear);
    let transparency = (out.0[alpha] + forward.0[alpha] + backward.0[alpha]) / 3.0;

    out.0[fwd] = forward.0[fwd];
    out.0[bwd] = backward.0[bwd];
    out.0[alpha] = transparency;
    out
}

/// Displacement growing from the edge of a central dead zone towards the
/// corners.
pub struct RadialAberrationKernel<'a> {
    args: RadialArgs,
    extent: ImageExtent,
    color: ColorDescriptor,
    input: &'a [u8],
}

impl<'a> RadialAberrationKernel<'a> {
    pub fn new(
        args: RadialArgs,
        extent: ImageExtent,
        color: ColorDescriptor,
        input: &'a [u8],
    ) -> FxResult<Self> {
        super::check_pixel_input("radial aberration input", input, &extent, &color)?;
        Ok(Self {
            args,
            extent,
            color,
            input,
        })
    }

    /// Offset applied at `(x, y)`, or `None` inside the dead zone.
    fn displacement(&self, x: usize, y: usize) -> Option<(f64, f64)> {
        let (cx, cy) = self.extent.center();
        let norm = cx.hypot(cy).max(1.0);
        let (dx, dy) = ((x as f64 - cx) / norm, (y as f64 - cy) / norm);
        let len = dx.hypot(dy);
        let deadzone = (self.args.deadzone as f64 / 100.0).clamp(0.0, 1.0);

        if len < deadzone || len == 0.0 {
            return None;
        }
        let mut t = if deadzone < 1.0 {
            (len - deadzone) / (1.0 - deadzone)
        } else {
            0.0
        };
        if self.args.exp_falloff != 0 {
            t *= t;
        }
        let scale = t * self.args.power as f64 / len;
        Some((dx * scale, dy * scale))
    }
}

impl Kernel<u8> for RadialAberrationKernel<'_> {
    fn name(&self) -> &'static str {
        "radial-aberration"
    }

    fn process(&self, job: &Job<'_>, out: &mut [u8]) -> Result<(), KernelError> {
        let bilinear = self.args.bilinear != 0;
        for_each_item(job, out, self.color.bytes_per_pixel(), |i, px_out| {
            let (x, y) = self.extent.coords(i);
            let px = match self.displacement(x, y) {
                Some(vec) => {
                    shift_channels(self.input, x, y, vec, &self.extent, &self.color, bilinear)
                }
                None => pixel::read(self.input, i, &self.color),
            };
            pixel::encode(&px, px_out, &self.color);
        })
    }
}

/// The same displacement for every pixel, along a fixed angle.
pub struct LinearAberrationKernel<'a> {
    extent: ImageExtent,
    color: ColorDescriptor,
    input: &'a [u8],
    vec: (f64, f64),
    bilinear: bool,
}

impl<'a> LinearAberrationKernel<'a> {
    pub fn new(
        args: LinearArgs,
        extent: ImageExtent,
        color: ColorDescriptor,
        input: &'a [u8],
    ) -> FxResult<Self> {
        super::check_pixel_input("linear aberration input", input, &extent, &color)?;
        let rad = (args.direction as f64).to_radians();
        let power = args.power as f64;
        Ok(Self {
            extent,
            color,
            input,
            vec: (-rad.sin() * power, rad.cos() * power),
            bilinear: args.bilinear != 0,
        })
    }
}

impl Kernel<u8> for LinearAberrationKernel<'_> {
    fn name(&self) -> &'static str {
        "linear-aberration"
    }

    fn process(&self, job: &Job<'_>, out: &mut [u8]) -> Result<(), KernelError> {
        for_each_item(job, out, self.color.bytes_per_pixel(), |i, px_out| {
            let (x, y) = self.extent.coords(i);
            let px = shift_channels(
                self.input,
                x,
                y,
                self.vec,
                &self.extent,
                &self.color,
                self.bilinear,
            );
            pixel::encode(&px, px_out, &self.color);
        })
    }
}
