use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use lensfx::params::{
    AberrationParams, AnamorphicFlareParams, BloomParams, GlobalParams, LensDirtParams,
    PseudoFlareParams,
};
use lensfx::{ApplyContext, Effect, EngineConfig, RasterDocument, apply};

const RUNS: usize = 5;
const WORKER_COUNTS: &[u32] = &[1, 2, 4, 8];

fn median_ms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

/// Dark gradient with a few bright highlights so threshold stages have
/// something to keep.
fn synthetic_image(width: u32, height: u32) -> RgbaImage {
    let spots = [(width / 4, height / 3), (width * 2 / 3, height / 2), (width / 2, height * 3 / 4)];
    RgbaImage::from_fn(width, height, |x, y| {
        let lit = spots
            .iter()
            .any(|&(sx, sy)| x.abs_diff(sx).pow(2) + y.abs_diff(sy).pow(2) < 400);
        if lit {
            return Rgba([255, 255, 255, 255]);
        }
        let v = ((x + y) * 160 / (width + height)) as u8;
        Rgba([v, v / 2, 255 - v, 255])
    })
}

fn effects() -> Vec<Effect> {
    vec![
        Effect::Bloom(BloomParams::default()),
        Effect::ChromaticAberration(AberrationParams::default()),
        Effect::AnamorphicFlare(AnamorphicFlareParams::default()),
        Effect::PseudoFlare(PseudoFlareParams::default()),
        Effect::LensDirt(LensDirtParams {
            seed: Some(1),
            ..LensDirtParams::default()
        }),
    ]
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let image = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => image::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?
            .into_rgba8(),
        None => synthetic_image(1920, 1080),
    };
    eprintln!("Measuring {}x{} image", image.width(), image.height());

    let config = EngineConfig::from_env();
    for effect in effects() {
        for &workers in WORKER_COUNTS {
            let ctx = ApplyContext {
                config: config.clone(),
                global: GlobalParams { threads: Some(workers) },
                ..ApplyContext::default()
            };
            let mut samples = Vec::with_capacity(RUNS);
            for _ in 0..RUNS {
                let mut doc = RasterDocument::new(image.clone());
                let report = apply(&effect, &mut doc, &ctx)
                    .with_context(|| format!("{} failed with {workers} workers", effect.name()))?;
                samples.push(report.elapsed.as_secs_f64() * 1000.0);
            }
            println!(
                "METRIC {}_w{}_ms_median={:.2}",
                effect.name().replace('-', "_"),
                workers,
                median_ms(&samples)
            );
        }
    }

    Ok(())
}
