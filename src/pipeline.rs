//! Sequencing of dispatcher passes into multi-stage effects.
//!
//! A chain runs its stages strictly one after another: every stage reads the
//! previous stage's output and writes a freshly allocated buffer of the same
//! layout, and stage `k + 1` only starts once stage `k` has joined.

use std::num::NonZeroUsize;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::color::ColorDescriptor;
use crate::dispatch::{CancelToken, Dispatcher, Kernel, WorkerPool};
use crate::error::FxResult;
use crate::extent::ImageExtent;
use crate::kernels::{
    DirtRenderKernel, LinearAberrationKernel, LinearArgs, PowerArgs, PowerKernel, PseudoFlareArgs,
    PseudoFlareKernel, RadialAberrationKernel, RadialArgs, ShapeGenKernel, ThresholdArgs,
    ThresholdKernel,
};
use crate::params::LensDirtArgs;
use crate::partition::partition;

/// Which kernel a stage runs, with its args.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StageKernel {
    Threshold(ThresholdArgs),
    Power(PowerArgs),
    RadialAberration(RadialArgs),
    LinearAberration(LinearArgs),
    PseudoFlare(PseudoFlareArgs),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineStage {
    pub name: &'static str,
    pub kernel: StageKernel,
}

impl PipelineStage {
    pub fn threshold(args: ThresholdArgs) -> Self {
        Self {
            name: "threshold",
            kernel: StageKernel::Threshold(args),
        }
    }

    pub fn power(args: PowerArgs) -> Self {
        Self {
            name: "power",
            kernel: StageKernel::Power(args),
        }
    }

    pub fn radial_aberration(args: RadialArgs) -> Self {
        Self {
            name: "radial-aberration",
            kernel: StageKernel::RadialAberration(args),
        }
    }

    pub fn linear_aberration(args: LinearArgs) -> Self {
        Self {
            name: "linear-aberration",
            kernel: StageKernel::LinearAberration(args),
        }
    }

    pub fn pseudo_flare(args: PseudoFlareArgs) -> Self {
        Self {
            name: "pseudo-flare",
            kernel: StageKernel::PseudoFlare(args),
        }
    }
}

/// Worker pool plus the policies shared by every stage of one apply.
pub struct Pipeline {
    pool: WorkerPool,
    timeout: Option<Duration>,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(workers: NonZeroUsize) -> FxResult<Self> {
        Ok(Self {
            pool: WorkerPool::new(workers)?,
            timeout: None,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.pool.workers()
    }

    fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(&self.pool)
            .with_cancel(self.cancel.clone())
            .with_timeout(self.timeout)
    }

    /// Runs one pixel kernel over the whole image into a new buffer.
    fn run_pixels<K: Kernel<u8>>(
        &self,
        stage: &'static str,
        kernel: &K,
        extent: &ImageExtent,
        color: &ColorDescriptor,
    ) -> FxResult<Vec<u8>> {
        let ranges = partition(extent.pixel_count(), self.workers());
        let mut out = extent.alloc_buffer(color);
        self.dispatcher()
            .dispatch(stage, &ranges, color.bytes_per_pixel(), &mut out, kernel)?;
        Ok(out)
    }

    pub fn run_stage(
        &self,
        stage: &PipelineStage,
        input: &[u8],
        extent: &ImageExtent,
        color: &ColorDescriptor,
    ) -> FxResult<Vec<u8>> {
        let (extent, color) = (*extent, *color);
        match stage.kernel {
            StageKernel::Threshold(args) => {
                let kernel = ThresholdKernel::new(args, &extent, color, input)?;
                self.run_pixels(stage.name, &kernel, &extent, &color)
            }
            StageKernel::Power(args) => {
                let kernel = PowerKernel::new(args, &extent, color, input)?;
                self.run_pixels(stage.name, &kernel, &extent, &color)
            }
            StageKernel::RadialAberration(args) => {
                let kernel = RadialAberrationKernel::new(args, extent, color, input)?;
                self.run_pixels(stage.name, &kernel, &extent, &color)
            }
            StageKernel::LinearAberration(args) => {
                let kernel = LinearAberrationKernel::new(args, extent, color, input)?;
                self.run_pixels(stage.name, &kernel, &extent, &color)
            }
            StageKernel::PseudoFlare(args) => {
                let kernel = PseudoFlareKernel::new(args, extent, color, input)?;
                self.run_pixels(stage.name, &kernel, &extent, &color)
            }
        }
    }

    /// Runs `stages` in order, feeding each stage's output to the next.
    /// An empty chain returns a copy of `input`.
    pub fn run_chain(
        &self,
        stages: &[PipelineStage],
        input: &[u8],
        extent: &ImageExtent,
        color: &ColorDescriptor,
    ) -> FxResult<Vec<u8>> {
        let Some((first, rest)) = stages.split_first() else {
            return Ok(input.to_vec());
        };
        let mut current = self.run_stage(first, input, extent, color)?;
        for stage in rest {
            current = self.run_stage(stage, &current, extent, color)?;
        }
        debug!(stages = stages.len(), workers = self.workers().get(), "chain finished");
        Ok(current)
    }

    /// One generator seed per worker: consecutive from `base` when given,
    /// otherwise 16 random bits each.
    pub fn dirt_seeds(&self, base: Option<u64>) -> Vec<u64> {
        let workers = self.workers().get();
        match base {
            Some(base) => (0..workers as u64).map(|i| base.wrapping_add(i)).collect(),
            None => {
                let mut rng = rand::thread_rng();
                (0..workers).map(|_| rng.gen_range(0..=u16::MAX as u64)).collect()
            }
        }
    }

    /// First lens-dirt phase: shape records partitioned over the workers.
    pub fn generate_dirt_shapes(
        &self,
        args: &LensDirtArgs,
        extent: &ImageExtent,
    ) -> FxResult<Vec<f32>> {
        let kernel = ShapeGenKernel::new(args.dirt, *extent, self.dirt_seeds(args.seed));
        let record_len = kernel.record_len();
        let ranges = partition(args.shape_count, self.workers());
        let mut shapes = vec![0.0f32; args.shape_count * record_len];
        self.dispatcher()
            .dispatch("dirt-shapes", &ranges, record_len, &mut shapes, &kernel)?;
        Ok(shapes)
    }

    /// Both lens-dirt phases: generate shapes, then render every pixel
    /// against the whole shape array.
    pub fn run_lens_dirt(
        &self,
        args: &LensDirtArgs,
        extent: &ImageExtent,
        color: &ColorDescriptor,
    ) -> FxResult<Vec<u8>> {
        let shapes = self.generate_dirt_shapes(args, extent)?;
        let kernel = DirtRenderKernel::new(args.dirt, *extent, *color, &shapes)?;
        self.run_pixels("dirt-render", &kernel, extent, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorDepth, ColorModel};
    use crate::error::FxError;
    use crate::kernels::DirtArgs;
    use crate::params::Smoothing;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn rgba8() -> ColorDescriptor {
        ColorDescriptor::new(ColorModel::Rgba, ColorDepth::U8)
    }

    /// Deterministic noise with some bright spots.
    fn noise(extent: &ImageExtent, color: &ColorDescriptor) -> Vec<u8> {
        let mut state = 0x2545_f491_u32;
        (0..extent.buffer_len(color))
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect()
    }

    fn flare_chain() -> Vec<PipelineStage> {
        vec![
            PipelineStage::threshold(ThresholdArgs {
                threshold: 200,
                bias: [0; 4],
            }),
            PipelineStage::pseudo_flare(PseudoFlareArgs {
                artifact_copies: 4,
                artifact_displacement: 0.4,
                halo_displacement: 12,
                power: 1.0,
                bilinear: 1,
            }),
            PipelineStage::radial_aberration(RadialArgs {
                power: 3,
                deadzone: 0,
                exp_falloff: 0,
                bilinear: 1,
            }),
        ]
    }

    fn dirt_args(shape_count: usize) -> LensDirtArgs {
        LensDirtArgs {
            shape_count,
            dirt: DirtArgs {
                size: 6,
                size_variance: 50,
                opacity: 50,
                opacity_variance: 50,
                shape: 5,
                direction: -2,
            },
            smoothing: Smoothing::default(),
            seed: Some(42),
        }
    }

    #[test]
    fn bloom_threshold_stage_fills_the_whole_buffer() {
        let extent = ImageExtent::new(100, 100).unwrap();
        let input = vec![240u8; 40_000];
        let pipeline = Pipeline::new(nz(4)).unwrap();
        let stage = PipelineStage::threshold(ThresholdArgs {
            threshold: 230,
            bias: [0; 4],
        });
        let out = pipeline.run_stage(&stage, &input, &extent, &rgba8()).unwrap();
        assert_eq!(out.len(), 40_000);
        // (240 - 230) * 255 / 26 rounds to 98; alpha passes through.
        assert!(out.chunks_exact(4).all(|px| px == [98, 98, 98, 240]));
    }

    #[test]
    fn worker_count_does_not_change_chain_output() {
        let extent = ImageExtent::new(67, 41).unwrap();
        let input = noise(&extent, &rgba8());
        let four = Pipeline::new(nz(4))
            .unwrap()
            .run_chain(&flare_chain(), &input, &extent, &rgba8())
            .unwrap();
        let sixteen = Pipeline::new(nz(16))
            .unwrap()
            .run_chain(&flare_chain(), &input, &extent, &rgba8())
            .unwrap();
        let one = Pipeline::new(nz(1))
            .unwrap()
            .run_chain(&flare_chain(), &input, &extent, &rgba8())
            .unwrap();
        assert_eq!(four, sixteen);
        assert_eq!(four, one);
    }

    #[test]
    fn more_workers_than_pixels_is_fine() {
        let extent = ImageExtent::new(3, 1).unwrap();
        let color = ColorDescriptor::new(ColorModel::GrayA, ColorDepth::F32);
        let input = extent.alloc_buffer(&color);
        let pipeline = Pipeline::new(nz(8)).unwrap();
        let out = pipeline
            .run_stage(&PipelineStage::power(PowerArgs { power: 2 }), &input, &extent, &color)
            .unwrap();
        assert_eq!(out.len(), 3 * 8);
    }

    #[test]
    fn empty_chain_copies_input() {
        let extent = ImageExtent::new(2, 2).unwrap();
        let input = noise(&extent, &rgba8());
        let out = Pipeline::new(nz(2))
            .unwrap()
            .run_chain(&[], &input, &extent, &rgba8())
            .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn mismatched_input_fails_before_dispatch() {
        let extent = ImageExtent::new(10, 10).unwrap();
        let input = vec![0u8; 399];
        let err = Pipeline::new(nz(2))
            .unwrap()
            .run_chain(&flare_chain(), &input, &extent, &rgba8())
            .unwrap_err();
        assert!(matches!(err, FxError::BufferSize { expected: 400, actual: 399, .. }));
    }

    #[test]
    fn cancelled_pipeline_reports_the_first_stage() {
        let extent = ImageExtent::new(10, 10).unwrap();
        let input = vec![0u8; 400];
        let token = CancelToken::new();
        token.cancel();
        let err = Pipeline::new(nz(2))
            .unwrap()
            .with_cancel(token)
            .run_chain(&flare_chain(), &input, &extent, &rgba8())
            .unwrap_err();
        assert!(matches!(err, FxError::Cancelled { stage: "threshold" }));
    }

    #[test]
    fn dirt_shapes_are_split_across_workers() {
        let extent = ImageExtent::new(120, 80).unwrap();
        let pipeline = Pipeline::new(nz(4)).unwrap();
        let shapes = pipeline.generate_dirt_shapes(&dirt_args(50), &extent).unwrap();
        assert_eq!(shapes.len(), 50 * 12);
        assert!(shapes.iter().all(|v| v.is_finite()));
        // Every record got an opacity.
        assert!(shapes.chunks_exact(12).all(|rec| rec[10] > 0.0));
    }

    #[test]
    fn fixed_seed_reproduces_dirt() {
        let extent = ImageExtent::new(64, 64).unwrap();
        let pipeline = Pipeline::new(nz(4)).unwrap();
        let a = pipeline.run_lens_dirt(&dirt_args(50), &extent, &rgba8()).unwrap();
        let b = pipeline.run_lens_dirt(&dirt_args(50), &extent, &rgba8()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64 * 64 * 4);
        assert!(a.chunks_exact(4).all(|px| px[..3] == [255, 255, 255]));
        assert!(a.chunks_exact(4).any(|px| px[3] > 0));
    }

    #[test]
    fn seeds_are_per_worker() {
        let pipeline = Pipeline::new(nz(3)).unwrap();
        assert_eq!(pipeline.dirt_seeds(Some(10)), vec![10, 11, 12]);
        let random = pipeline.dirt_seeds(None);
        assert_eq!(random.len(), 3);
        assert!(random.iter().all(|s| *s <= u16::MAX as u64));
    }
}
