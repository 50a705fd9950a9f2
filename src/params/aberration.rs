use crate::color::ColorDescriptor;
use crate::extent::ImageExtent;
use crate::kernels::{LinearArgs, RadialArgs};

use super::{
    EffectParams, TickRange, flag, fraction_to_px, fraction_to_tick, thread_override,
    tick_to_fraction,
};

pub const MAX_DISPLACEMENT: TickRange = TickRange::new(1, 300, 20);
pub const DEAD_ZONE: TickRange = TickRange::new(0, 100, 5);
pub const TOGGLE: TickRange = TickRange::new(0, 1, 1);
pub const DIRECTION: TickRange = TickRange::new(0, 359, 100);
pub const INTERPOLATE: TickRange = TickRange::new(0, 1, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AberrationControls {
    /// Tenths of a percent of the image width.
    pub max_d: i64,
    pub dead_z: i64,
    pub is_shape_radial: i64,
    pub is_falloff_exp: i64,
    pub direction: i64,
    pub interpolate: i64,
    pub num_threads: Option<i64>,
}

impl Default for AberrationControls {
    fn default() -> Self {
        Self {
            max_d: MAX_DISPLACEMENT.default,
            dead_z: DEAD_ZONE.default,
            is_shape_radial: TOGGLE.default,
            is_falloff_exp: TOGGLE.default,
            direction: DIRECTION.default,
            interpolate: INTERPOLATE.default,
            num_threads: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AberrationShape {
    /// Grows from the center outwards.
    Radial,
    /// Uniform shift along `direction`.
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Falloff {
    Linear,
    Exponential,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AberrationParams {
    /// Largest displacement as a fraction of the image width.
    pub max_displacement: f64,
    /// Radial dead zone, percent of the center-to-corner distance.
    pub dead_zone: u8,
    pub shape: AberrationShape,
    pub falloff: Falloff,
    /// Degrees, linear shape only.
    pub direction: u16,
    pub interpolate: bool,
    pub threads: Option<u32>,
}

impl Default for AberrationParams {
    fn default() -> Self {
        Self::from_controls(&AberrationControls::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AberrationArgs {
    Radial(RadialArgs),
    Linear(LinearArgs),
}

impl EffectParams for AberrationParams {
    type Controls = AberrationControls;
    type Args = AberrationArgs;

    fn from_controls(c: &AberrationControls) -> Self {
        Self {
            max_displacement: tick_to_fraction(c.max_d, MAX_DISPLACEMENT, 1000.0),
            dead_zone: DEAD_ZONE.clamp(c.dead_z) as u8,
            shape: if TOGGLE.clamp(c.is_shape_radial) == 1 {
                AberrationShape::Radial
            } else {
                AberrationShape::Linear
            },
            falloff: if TOGGLE.clamp(c.is_falloff_exp) == 1 {
                Falloff::Exponential
            } else {
                Falloff::Linear
            },
            direction: DIRECTION.clamp(c.direction) as u16,
            interpolate: INTERPOLATE.clamp(c.interpolate) == 1,
            threads: thread_override(c.num_threads),
        }
    }

    fn controls(&self) -> AberrationControls {
        AberrationControls {
            max_d: fraction_to_tick(self.max_displacement, 1000.0),
            dead_z: self.dead_zone as i64,
            is_shape_radial: (self.shape == AberrationShape::Radial) as i64,
            is_falloff_exp: (self.falloff == Falloff::Exponential) as i64,
            direction: self.direction as i64,
            interpolate: self.interpolate as i64,
            num_threads: self.threads.map(i64::from),
        }
    }

    fn kernel_args(&self, extent: &ImageExtent, _color: &ColorDescriptor) -> AberrationArgs {
        let power = fraction_to_px(self.max_displacement, extent.width());
        match self.shape {
            AberrationShape::Radial => AberrationArgs::Radial(RadialArgs {
                power,
                deadzone: self.dead_zone as i32,
                exp_falloff: flag(self.falloff == Falloff::Exponential),
                bilinear: flag(self.interpolate),
            }),
            AberrationShape::Linear => AberrationArgs::Linear(LinearArgs {
                power,
                direction: self.direction as i32,
                bilinear: flag(self.interpolate),
            }),
        }
    }

    fn thread_override(&self) -> Option<u32> {
        self.threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorDepth, ColorModel};

    fn rgba8() -> ColorDescriptor {
        ColorDescriptor::new(ColorModel::Rgba, ColorDepth::U8)
    }

    #[test]
    fn one_percent_on_a_thousand_pixel_image_is_ten_pixels() {
        let extent = ImageExtent::new(1000, 500).unwrap();
        let p = AberrationParams {
            max_displacement: 0.01,
            ..AberrationParams::default()
        };
        assert_eq!(
            p.kernel_args(&extent, &rgba8()),
            AberrationArgs::Radial(RadialArgs {
                power: 10,
                deadzone: 5,
                exp_falloff: 1,
                bilinear: 0,
            })
        );
    }

    #[test]
    fn linear_shape_carries_direction() {
        let extent = ImageExtent::new(200, 100).unwrap();
        let c = AberrationControls {
            is_shape_radial: 0,
            direction: 45,
            interpolate: 1,
            ..AberrationControls::default()
        };
        let p = AberrationParams::from_controls(&c);
        assert_eq!(
            p.kernel_args(&extent, &rgba8()),
            AberrationArgs::Linear(LinearArgs {
                power: 4,
                direction: 45,
                bilinear: 1,
            })
        );
        assert_eq!(p.controls(), c);
    }

    #[test]
    fn kernel_args_are_idempotent() {
        let extent = ImageExtent::new(333, 77).unwrap();
        let p = AberrationParams::default();
        assert_eq!(p.kernel_args(&extent, &rgba8()), p.kernel_args(&extent, &rgba8()));
    }

    #[test]
    fn toggles_clamp_to_zero_or_one() {
        let c = AberrationControls {
            is_shape_radial: 7,
            is_falloff_exp: -2,
            direction: 720,
            ..AberrationControls::default()
        };
        let p = AberrationParams::from_controls(&c);
        assert_eq!(p.shape, AberrationShape::Radial);
        assert_eq!(p.falloff, Falloff::Linear);
        assert_eq!(p.direction, 359);
    }
}
