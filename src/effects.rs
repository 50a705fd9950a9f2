use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::color::{ColorDescriptor, ColorModel};
use crate::config::EngineConfig;
use crate::dispatch::CancelToken;
use crate::error::{FxError, FxResult};
use crate::extent::ImageExtent;
use crate::host::HostDocument;
use crate::kernels::{PowerArgs, ThresholdArgs};
use crate::params::{
    AberrationArgs, AberrationParams, AnamorphicFlareParams, BloomParams, ColorProvider,
    EffectParams, GlobalParams, LensDirtParams, NoBias, PseudoFlareParams, Smoothing,
    resolve_threads,
};
use crate::pipeline::{Pipeline, PipelineStage};

/// How the host should composite the effect layer over the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Add,
    Subtract,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Bloom(BloomParams),
    ChromaticAberration(AberrationParams),
    AnamorphicFlare(AnamorphicFlareParams),
    PseudoFlare(PseudoFlareParams),
    LensDirt(LensDirtParams),
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Bloom(_) => "bloom",
            Effect::ChromaticAberration(_) => "chromatic-aberration",
            Effect::AnamorphicFlare(_) => "anamorphic-flare",
            Effect::PseudoFlare(_) => "pseudo-flare",
            Effect::LensDirt(_) => "lens-dirt",
        }
    }

    fn thread_override(&self) -> Option<u32> {
        match self {
            Effect::Bloom(p) => p.thread_override(),
            Effect::ChromaticAberration(p) => p.thread_override(),
            Effect::AnamorphicFlare(p) => p.thread_override(),
            Effect::PseudoFlare(p) => p.thread_override(),
            Effect::LensDirt(p) => p.thread_override(),
        }
    }

    /// Light-adding effects composite additively; in CMYK adding light means
    /// removing ink.
    pub fn blend_mode(&self, color: &ColorDescriptor) -> BlendMode {
        match self {
            Effect::ChromaticAberration(_) => BlendMode::Normal,
            _ if color.model() == ColorModel::Cmyka => BlendMode::Subtract,
            _ => BlendMode::Add,
        }
    }
}

/// Everything an apply needs besides the effect and the document.
pub struct ApplyContext<'a> {
    pub config: EngineConfig,
    pub global: GlobalParams,
    pub bias: &'a dyn ColorProvider,
    pub cancel: CancelToken,
}

impl Default for ApplyContext<'_> {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            global: GlobalParams::default(),
            bias: &NoBias,
            cancel: CancelToken::new(),
        }
    }
}

impl ApplyContext<'_> {
    pub fn workers_for(&self, effect: &Effect) -> NonZeroUsize {
        resolve_threads(
            effect.thread_override(),
            self.global.threads,
            self.config.default_workers(),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApplyReport {
    pub effect: &'static str,
    pub blend_mode: BlendMode,
    /// Stage names in the order they ran, post passes included.
    pub stages: Vec<&'static str>,
    pub workers: NonZeroUsize,
    pub elapsed: Duration,
}

/// Runs `effect` on `doc` and writes the result back.
///
/// Color space and extent are resolved before any buffer is allocated or
/// the document touched, so an unsupported document is left as it was.
pub fn apply(
    effect: &Effect,
    doc: &mut dyn HostDocument,
    ctx: &ApplyContext<'_>,
) -> FxResult<ApplyReport> {
    let started = Instant::now();
    let color = ColorDescriptor::resolve(doc.color_model(), doc.color_depth())?;
    let extent = ImageExtent::new(doc.width(), doc.height())?;
    let workers = ctx.workers_for(effect);

    let pipeline = Pipeline::new(workers)?
        .with_timeout(ctx.config.join_timeout())
        .with_cancel(ctx.cancel.clone());
    let mut run = Run {
        pipeline: &pipeline,
        doc,
        extent,
        color,
        stages: Vec::new(),
    };
    let bias = ctx.bias.bias().unwrap_or_default();

    let result = match effect {
        Effect::Bloom(p) => {
            let args = p.kernel_args(&extent, &color);
            run.light_pass(with_bias(args.threshold, bias), args.smoothing, args.power)
        }
        Effect::AnamorphicFlare(p) => {
            let args = p.kernel_args(&extent, &color);
            run.light_pass(with_bias(args.threshold, bias), args.smoothing, args.power)
        }
        Effect::ChromaticAberration(p) => {
            let stage = match p.kernel_args(&extent, &color) {
                AberrationArgs::Radial(args) => PipelineStage::radial_aberration(args),
                AberrationArgs::Linear(args) => PipelineStage::linear_aberration(args),
            };
            run.chain(&[stage])
        }
        Effect::PseudoFlare(p) => {
            let args = p.kernel_args(&extent, &color);
            let stages = [
                PipelineStage::threshold(with_bias(args.threshold, bias)),
                PipelineStage::pseudo_flare(args.flare),
                PipelineStage::radial_aberration(args.aberration),
            ];
            run.chain(&stages).and_then(|()| run.smooth(args.smoothing))
        }
        Effect::LensDirt(p) => {
            let args = p.kernel_args(&extent, &color);
            run.lens_dirt(&args).and_then(|()| run.smooth(args.smoothing))
        }
    };

    if let Err(err) = &result {
        warn!(effect = effect.name(), error = %err, "apply failed");
    }
    result?;

    let report = ApplyReport {
        effect: effect.name(),
        blend_mode: effect.blend_mode(&color),
        stages: run.stages,
        workers,
        elapsed: started.elapsed(),
    };
    info!(
        effect = report.effect,
        color = %color,
        width = extent.width(),
        height = extent.height(),
        workers = workers.get(),
        elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
        "effect applied"
    );
    Ok(report)
}

fn with_bias(mut args: ThresholdArgs, bias: [u8; 4]) -> ThresholdArgs {
    args.bias = bias;
    args
}

/// State of one apply in progress.
struct Run<'p, 'd> {
    pipeline: &'p Pipeline,
    doc: &'d mut dyn HostDocument,
    extent: ImageExtent,
    color: ColorDescriptor,
    stages: Vec<&'static str>,
}

impl Run<'_, '_> {
    fn read(&self) -> FxResult<Vec<u8>> {
        let data = self.doc.pixel_data()?;
        let expected = self.extent.buffer_len(&self.color);
        if data.len() != expected {
            return Err(FxError::BufferSize {
                what: "host pixel data",
                expected,
                actual: data.len(),
            });
        }
        Ok(data)
    }

    fn chain(&mut self, stages: &[PipelineStage]) -> FxResult<()> {
        let input = self.read()?;
        let output = self.pipeline.run_chain(stages, &input, &self.extent, &self.color)?;
        self.doc.set_pixel_data(&output)?;
        self.stages.extend(stages.iter().map(|s| s.name));
        Ok(())
    }

    fn smooth(&mut self, smoothing: Smoothing) -> FxResult<()> {
        if smoothing.is_none() {
            return Ok(());
        }
        self.doc.apply_blur(smoothing.half_width, smoothing.half_height)?;
        self.stages.push("blur");
        Ok(())
    }

    /// Threshold, host blur, then a power pass over the blurred result.
    fn light_pass(
        &mut self,
        threshold: ThresholdArgs,
        smoothing: Smoothing,
        power: PowerArgs,
    ) -> FxResult<()> {
        self.chain(&[PipelineStage::threshold(threshold)])?;
        self.smooth(smoothing)?;
        self.chain(&[PipelineStage::power(power)])
    }

    fn lens_dirt(&mut self, args: &crate::params::LensDirtArgs) -> FxResult<()> {
        let output = self.pipeline.run_lens_dirt(args, &self.extent, &self.color)?;
        self.doc.set_pixel_data(&output)?;
        self.stages.extend(["dirt-shapes", "dirt-render"]);
        Ok(())
    }
}
