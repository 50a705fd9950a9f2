use std::f64::consts::{FRAC_PI_2, TAU};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::color::ColorDescriptor;
use crate::dispatch::{Job, Kernel, KernelError, for_each_item};
use crate::error::{FxError, FxResult};
use crate::extent::ImageExtent;
use crate::pixel;

/// Shape direction meaning "oriented towards the image center".
pub const DIRECTION_TOWARDS_CENTER: i32 = -1;
/// Shape direction meaning "a random angle per shape".
pub const DIRECTION_RANDOM: i32 = -2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtArgs {
    /// Largest shape size in pixels.
    pub size: i32,
    /// Percentage by which a shape may be smaller than `size`.
    pub size_variance: i32,
    /// Largest opacity, 1–100.
    pub opacity: i32,
    pub opacity_variance: i32,
    /// Number of sides; 1 is a circle, 2 a line.
    pub shape: u8,
    /// Degrees, or one of the `DIRECTION_*` sentinels.
    pub direction: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtShape {
    Circle,
    Line,
    Polygon(u8),
}

impl DirtShape {
    pub fn from_sides(sides: u8) -> Self {
        match sides {
            0 | 1 => DirtShape::Circle,
            2 => DirtShape::Line,
            n => DirtShape::Polygon(n),
        }
    }

    pub fn sides(self) -> usize {
        match self {
            DirtShape::Circle => 1,
            DirtShape::Line => 2,
            DirtShape::Polygon(n) => n as usize,
        }
    }

    /// Floats per shape record, `2 * sides + 2`:
    /// - circle: `cx, cy, radius, opacity`
    /// - line: `x1, y1, x2, y2, opacity`
    /// - polygon: `x1, y1, .., xn, yn, opacity`, trailing float unused
    pub fn record_len(self) -> usize {
        self.sides() * 2 + 2
    }

    fn opacity_index(self) -> usize {
        match self {
            DirtShape::Circle => 3,
            other => other.sides() * 2,
        }
    }
}

/// Fills shape records. Worker `i` seeds its generator with `seeds[i]`, so
/// the output depends only on the seeds and the partitioning.
pub struct ShapeGenKernel {
    args: DirtArgs,
    extent: ImageExtent,
    shape: DirtShape,
    seeds: Vec<u64>,
}

impl ShapeGenKernel {
    pub fn new(args: DirtArgs, extent: ImageExtent, seeds: Vec<u64>) -> Self {
        Self {
            args,
            extent,
            shape: DirtShape::from_sides(args.shape),
            seeds,
        }
    }

    pub fn record_len(&self) -> usize {
        self.shape.record_len()
    }

    fn generate(&self, rng: &mut StdRng, rec: &mut [f32]) {
        let (cx, cy) = self.extent.center();
        let x = rng.gen_range(0..self.extent.width()) as f64;
        let y = rng.gen_range(0..self.extent.height()) as f64;
        let size = vary(rng, self.args.size, self.args.size_variance);
        let opacity = vary(rng, self.args.opacity, self.args.opacity_variance);

        if self.shape == DirtShape::Circle {
            rec.copy_from_slice(&[x as f32, y as f32, size as f32, opacity as f32]);
            return;
        }

        // Angle of the first vertex as seen from the shape's center.
        let start = match self.args.direction {
            DIRECTION_TOWARDS_CENTER if (cx - x).hypot(cy - y) > f64::EPSILON => {
                (cy - y).atan2(cx - x)
            }
            DIRECTION_TOWARDS_CENTER => FRAC_PI_2,
            DIRECTION_RANDOM => (rng.gen_range(0..360) as f64).to_radians() + FRAC_PI_2,
            degrees => (degrees as f64).to_radians() + FRAC_PI_2,
        };

        let sides = self.shape.sides();
        let step = match self.shape {
            DirtShape::Line => std::f64::consts::PI,
            _ => TAU / sides as f64,
        };
        for k in 0..sides {
            let angle = start + step * k as f64;
            rec[2 * k] = (x + size * angle.cos()) as f32;
            rec[2 * k + 1] = (y + size * angle.sin()) as f32;
        }
        rec[self.shape.opacity_index()] = opacity as f32;
        rec[2 * sides + 1] = 0.0;
    }
}

/// `base` reduced by a random percentage below `variance`.
fn vary(rng: &mut StdRng, base: i32, variance: i32) -> f64 {
    if variance <= 0 {
        return base as f64;
    }
    base as f64 * (100.0 - rng.gen_range(0..variance) as f64) / 100.0
}

impl Kernel<f32> for ShapeGenKernel {
    fn name(&self) -> &'static str {
        "dirt-shapes"
    }

    fn process(&self, job: &Job<'_>, out: &mut [f32]) -> Result<(), KernelError> {
        let seed = self
            .seeds
            .get(job.worker)
            .copied()
            .ok_or_else(|| KernelError::Failed(format!("no seed for worker {}", job.worker)))?;
        let mut rng = StdRng::seed_from_u64(seed);
        for_each_item(job, out, self.record_len(), |_, rec| self.generate(&mut rng, rec))
    }
}

/// Renders shape records into an alpha mask over the model's white.
pub struct DirtRenderKernel<'a> {
    args: DirtArgs,
    extent: ImageExtent,
    color: ColorDescriptor,
    shape: DirtShape,
    shapes: &'a [f32],
}

impl<'a> DirtRenderKernel<'a> {
    pub fn new(
        args: DirtArgs,
        extent: ImageExtent,
        color: ColorDescriptor,
        shapes: &'a [f32],
    ) -> FxResult<Self> {
        let shape = DirtShape::from_sides(args.shape);
        if shapes.len() % shape.record_len() != 0 {
            return Err(FxError::BufferSize {
                what: "dirt shape records",
                expected: shapes.len() / shape.record_len() * shape.record_len(),
                actual: shapes.len(),
            });
        }
        Ok(Self {
            args,
            extent,
            color,
            shape,
            shapes,
        })
    }

    fn covers(&self, rec: &[f32], x: f64, y: f64) -> bool {
        let p = |i: usize| (rec[2 * i] as f64, rec[2 * i + 1] as f64);
        match self.shape {
            DirtShape::Circle => (x - rec[0] as f64).hypot(y - rec[1] as f64) <= rec[2] as f64,
            DirtShape::Line => segment_distance((x, y), p(0), p(1)) <= 1.0,
            DirtShape::Polygon(n) => {
                let n = n as usize;
                let mut inside = false;
                let mut prev = p(n - 1);
                for k in 0..n {
                    let cur = p(k);
                    if (cur.1 > y) != (prev.1 > y) {
                        let cross_x = cur.0 + (y - cur.1) * (prev.0 - cur.0) / (prev.1 - cur.1);
                        if x < cross_x {
                            inside = !inside;
                        }
                    }
                    prev = cur;
                }
                inside
            }
        }
    }
}

fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (p.0 - (a.0 + t * dx)).hypot(p.1 - (a.1 + t * dy))
}

impl Kernel<u8> for DirtRenderKernel<'_> {
    fn name(&self) -> &'static str {
        "dirt-render"
    }

    fn process(&self, job: &Job<'_>, out: &mut [u8]) -> Result<(), KernelError> {
        let max = self.color.channel_max();
        let alpha = self.color.alpha_index();
        // Records are anchored on their first point; lines reach one pixel
        // past the far end.
        let reach = self.args.size as f64 * 2.0 + 1.0;
        let opacity_at = self.shape.opacity_index();

        for_each_item(job, out, self.color.bytes_per_pixel(), |i, px_out| {
            let (px, py) = self.extent.coords(i);
            let (x, y) = (px as f64, py as f64);
            let mut color = pixel::white(&self.color);
            for rec in self.shapes.chunks_exact(self.shape.record_len()) {
                let (ax, ay) = (rec[0] as f64, rec[1] as f64);
                if (ax - x).abs() > reach || (ay - y).abs() > reach {
                    continue;
                }
                if self.covers(rec, x, y) {
                    color.0[alpha] += rec[opacity_at] as f64 / 100.0 * max;
                }
            }
            pixel::encode(&color, px_out, &self.color);
        })
    }
}
