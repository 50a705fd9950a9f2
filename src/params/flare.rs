use crate::color::ColorDescriptor;
use crate::extent::ImageExtent;
use crate::kernels::{PowerArgs, PseudoFlareArgs, RadialArgs, ThresholdArgs};

use super::{
    EffectParams, Smoothing, TickRange, flag, fraction_to_px, fraction_to_tick, thread_override,
    tick_to_fraction,
};

pub const AF_THRESH: TickRange = TickRange::new(0, 255, 250);
pub const AF_BLUR_STRENGTH: TickRange = TickRange::new(1, 1000, 500);
pub const AF_HORIZONTAL: TickRange = TickRange::new(0, 1, 1);
pub const AF_POWER: TickRange = TickRange::new(0, 25, 10);

pub const PF_THRESH: TickRange = TickRange::new(0, 255, 250);
pub const PF_ARTIFACT_COPIES: TickRange = TickRange::new(0, 8, 4);
pub const PF_ARTIFACT_DISPERSAL: TickRange = TickRange::new(1, 200, 40);
pub const PF_HALO_WIDTH: TickRange = TickRange::new(1, 1000, 250);
pub const PF_BLUR_STRENGTH: TickRange = TickRange::new(1, 500, 100);
pub const PF_ABERRATION_STRENGTH: TickRange = TickRange::new(0, 500, 50);
pub const PF_POWER: TickRange = TickRange::new(0, 10, 1);
pub const PF_INTERPOLATE: TickRange = TickRange::new(0, 1, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlareOrientation {
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnamorphicFlareControls {
    pub thresh: i64,
    pub blur_strength: i64,
    pub is_horizontal: i64,
    pub power: i64,
    pub num_threads: Option<i64>,
}

impl Default for AnamorphicFlareControls {
    fn default() -> Self {
        Self {
            thresh: AF_THRESH.default,
            blur_strength: AF_BLUR_STRENGTH.default,
            is_horizontal: AF_HORIZONTAL.default,
            power: AF_POWER.default,
            num_threads: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnamorphicFlareParams {
    pub threshold: u8,
    /// Streak half-length as a fraction of the streak axis.
    pub blur_strength: f64,
    pub orientation: FlareOrientation,
    pub power: u32,
    pub threads: Option<u32>,
}

impl Default for AnamorphicFlareParams {
    fn default() -> Self {
        Self::from_controls(&AnamorphicFlareControls::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnamorphicFlareArgs {
    pub threshold: ThresholdArgs,
    /// Blur along the streak axis only.
    pub smoothing: Smoothing,
    pub power: PowerArgs,
}

impl EffectParams for AnamorphicFlareParams {
    type Controls = AnamorphicFlareControls;
    type Args = AnamorphicFlareArgs;

    fn from_controls(c: &AnamorphicFlareControls) -> Self {
        Self {
            threshold: AF_THRESH.clamp(c.thresh) as u8,
            blur_strength: tick_to_fraction(c.blur_strength, AF_BLUR_STRENGTH, 1000.0),
            orientation: if AF_HORIZONTAL.clamp(c.is_horizontal) == 1 {
                FlareOrientation::Horizontal
            } else {
                FlareOrientation::Vertical
            },
            power: AF_POWER.clamp(c.power) as u32,
            threads: thread_override(c.num_threads),
        }
    }

    fn controls(&self) -> AnamorphicFlareControls {
        AnamorphicFlareControls {
            thresh: self.threshold as i64,
            blur_strength: fraction_to_tick(self.blur_strength, 1000.0),
            is_horizontal: (self.orientation == FlareOrientation::Horizontal) as i64,
            power: self.power as i64,
            num_threads: self.threads.map(i64::from),
        }
    }

    fn kernel_args(&self, extent: &ImageExtent, _color: &ColorDescriptor) -> AnamorphicFlareArgs {
        let smoothing = match self.orientation {
            FlareOrientation::Horizontal => Smoothing {
                half_width: fraction_to_px(self.blur_strength, extent.width()),
                half_height: 0,
            },
            FlareOrientation::Vertical => Smoothing {
                half_width: 0,
                half_height: fraction_to_px(self.blur_strength, extent.height()),
            },
        };
        AnamorphicFlareArgs {
            threshold: ThresholdArgs {
                threshold: self.threshold,
                bias: [0; 4],
            },
            smoothing,
            power: PowerArgs { power: self.power },
        }
    }

    fn thread_override(&self) -> Option<u32> {
        self.threads
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PseudoFlareControls {
    pub thresh: i64,
    pub artifact_copies: i64,
    /// Hundredths of the distance to the center.
    pub artifact_dispersal: i64,
    /// Tenths of a percent of the image width.
    pub halo_width: i64,
    pub blur_strength: i64,
    pub aberration_strength: i64,
    pub power: i64,
    pub interpolate: i64,
    pub num_threads: Option<i64>,
}

impl Default for PseudoFlareControls {
    fn default() -> Self {
        Self {
            thresh: PF_THRESH.default,
            artifact_copies: PF_ARTIFACT_COPIES.default,
            artifact_dispersal: PF_ARTIFACT_DISPERSAL.default,
            halo_width: PF_HALO_WIDTH.default,
            blur_strength: PF_BLUR_STRENGTH.default,
            aberration_strength: PF_ABERRATION_STRENGTH.default,
            power: PF_POWER.default,
            interpolate: PF_INTERPOLATE.default,
            num_threads: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PseudoFlareParams {
    pub threshold: u8,
    pub artifact_copies: u8,
    pub artifact_dispersal: f64,
    pub halo_width: f64,
    pub blur_strength: f64,
    pub aberration_strength: f64,
    pub power: u32,
    pub interpolate: bool,
    pub threads: Option<u32>,
}

impl Default for PseudoFlareParams {
    fn default() -> Self {
        Self::from_controls(&PseudoFlareControls::default())
    }
}

/// Args for the three chained stages plus the trailing blur.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PseudoFlareStageArgs {
    pub threshold: ThresholdArgs,
    pub flare: PseudoFlareArgs,
    pub aberration: RadialArgs,
    pub smoothing: Smoothing,
}

impl EffectParams for PseudoFlareParams {
    type Controls = PseudoFlareControls;
    type Args = PseudoFlareStageArgs;

    fn from_controls(c: &PseudoFlareControls) -> Self {
        Self {
            threshold: PF_THRESH.clamp(c.thresh) as u8,
            artifact_copies: PF_ARTIFACT_COPIES.clamp(c.artifact_copies) as u8,
            artifact_dispersal: tick_to_fraction(
                c.artifact_dispersal,
                PF_ARTIFACT_DISPERSAL,
                100.0,
            ),
            halo_width: tick_to_fraction(c.halo_width, PF_HALO_WIDTH, 1000.0),
            blur_strength: tick_to_fraction(c.blur_strength, PF_BLUR_STRENGTH, 1000.0),
            aberration_strength: tick_to_fraction(
                c.aberration_strength,
                PF_ABERRATION_STRENGTH,
                1000.0,
            ),
            power: PF_POWER.clamp(c.power) as u32,
            interpolate: PF_INTERPOLATE.clamp(c.interpolate) == 1,
            threads: thread_override(c.num_threads),
        }
    }

    fn controls(&self) -> PseudoFlareControls {
        PseudoFlareControls {
            thresh: self.threshold as i64,
            artifact_copies: self.artifact_copies as i64,
            artifact_dispersal: fraction_to_tick(self.artifact_dispersal, 100.0),
            halo_width: fraction_to_tick(self.halo_width, 1000.0),
            blur_strength: fraction_to_tick(self.blur_strength, 1000.0),
            aberration_strength: fraction_to_tick(self.aberration_strength, 1000.0),
            power: self.power as i64,
            interpolate: self.interpolate as i64,
            num_threads: self.threads.map(i64::from),
        }
    }

    fn kernel_args(&self, extent: &ImageExtent, _color: &ColorDescriptor) -> PseudoFlareStageArgs {
        let width = extent.width();
        let blur = fraction_to_px(self.blur_strength, width);
        PseudoFlareStageArgs {
            threshold: ThresholdArgs {
                threshold: self.threshold,
                bias: [0; 4],
            },
            flare: PseudoFlareArgs {
                artifact_copies: self.artifact_copies as i32,
                artifact_displacement: self.artifact_dispersal,
                halo_displacement: fraction_to_px(self.halo_width, width),
                power: self.power as f64,
                bilinear: flag(self.interpolate),
            },
            aberration: RadialArgs {
                power: fraction_to_px(self.aberration_strength, width),
                deadzone: 0,
                exp_falloff: 0,
                bilinear: flag(self.interpolate),
            },
            smoothing: Smoothing {
                half_width: blur,
                half_height: blur,
            },
        }
    }

    fn thread_override(&self) -> Option<u32> {
        self.threads
    }
}
