use crate::color::ColorDescriptor;
use crate::extent::ImageExtent;
use crate::kernels::{PowerArgs, ThresholdArgs};

use super::{
    EffectParams, Smoothing, TickRange, fraction_to_px, fraction_to_tick, thread_override,
    tick_to_fraction,
};

pub const THRESH: TickRange = TickRange::new(0, 255, 230);
pub const BLUR_STRENGTH: TickRange = TickRange::new(1, 500, 50);
pub const POWER: TickRange = TickRange::new(0, 25, 2);

/// Bloom slider positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BloomControls {
    pub thresh: i64,
    /// Tenths of a percent of the image width.
    pub blur_strength: i64,
    pub power: i64,
    pub num_threads: Option<i64>,
}

impl Default for BloomControls {
    fn default() -> Self {
        Self {
            thresh: THRESH.default,
            blur_strength: BLUR_STRENGTH.default,
            power: POWER.default,
            num_threads: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomParams {
    pub threshold: u8,
    /// Blur half-size as a fraction of the image width.
    pub blur_strength: f64,
    pub power: u32,
    pub threads: Option<u32>,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self::from_controls(&BloomControls::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BloomArgs {
    pub threshold: ThresholdArgs,
    pub smoothing: Smoothing,
    pub power: PowerArgs,
}

impl EffectParams for BloomParams {
    type Controls = BloomControls;
    type Args = BloomArgs;

    fn from_controls(c: &BloomControls) -> Self {
        Self {
            threshold: THRESH.clamp(c.thresh) as u8,
            blur_strength: tick_to_fraction(c.blur_strength, BLUR_STRENGTH, 1000.0),
            power: POWER.clamp(c.power) as u32,
            threads: thread_override(c.num_threads),
        }
    }

    fn controls(&self) -> BloomControls {
        BloomControls {
            thresh: self.threshold as i64,
            blur_strength: fraction_to_tick(self.blur_strength, 1000.0),
            power: self.power as i64,
            num_threads: self.threads.map(i64::from),
        }
    }

    fn kernel_args(&self, extent: &ImageExtent, _color: &ColorDescriptor) -> BloomArgs {
        // Bloom spreads evenly, so both axes use the width.
        let half = fraction_to_px(self.blur_strength, extent.width());
        BloomArgs {
            threshold: ThresholdArgs {
                threshold: self.threshold,
                bias: [0; 4],
            },
            smoothing: Smoothing {
                half_width: half,
                half_height: half,
            },
            power: PowerArgs { power: self.power },
        }
    }

    fn thread_override(&self) -> Option<u32> {
        self.threads
    }
}
