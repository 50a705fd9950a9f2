use crate::color::ColorDescriptor;
use crate::extent::ImageExtent;
use crate::kernels::DirtArgs;
use crate::kernels::dirt::{DIRECTION_RANDOM, DIRECTION_TOWARDS_CENTER};

use super::{
    EffectParams, Smoothing, TickRange, fraction_to_px, fraction_to_tick, thread_override,
    tick_to_fraction,
};

pub const NUM_SHAPES: TickRange = TickRange::new(1, 100, 5);
pub const MAX_SIZE: TickRange = TickRange::new(1, 500, 100);
pub const SIZE_VAR: TickRange = TickRange::new(0, 100, 50);
pub const MAX_OPACITY: TickRange = TickRange::new(1, 100, 50);
pub const OPACITY_VAR: TickRange = TickRange::new(0, 100, 50);
pub const SHAPE: TickRange = TickRange::new(1, 10, 5);
pub const DIRECTION: TickRange = TickRange::new(-2, 359, 100);
pub const ANGLE: TickRange = TickRange::new(0, 359, 100);
pub const BLUR_SIZE: TickRange = TickRange::new(0, 250, 10);

/// Particles generated per `numShapes` tick.
pub const SHAPES_PER_TICK: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LensDirtControls {
    pub num_shapes: i64,
    pub max_size: i64,
    pub size_var: i64,
    pub max_opacity: i64,
    pub opacity_var: i64,
    pub shape: i64,
    pub direction: i64,
    /// Last dial position, kept even while `direction` is random or
    /// towards the center.
    pub angle: i64,
    pub blur_size: i64,
    pub num_threads: Option<i64>,
}

impl Default for LensDirtControls {
    fn default() -> Self {
        Self {
            num_shapes: NUM_SHAPES.default,
            max_size: MAX_SIZE.default,
            size_var: SIZE_VAR.default,
            max_opacity: MAX_OPACITY.default,
            opacity_var: OPACITY_VAR.default,
            shape: SHAPE.default,
            direction: DIRECTION.default,
            angle: ANGLE.default,
            blur_size: BLUR_SIZE.default,
            num_threads: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtDirection {
    Random,
    TowardsCenter,
    Angle(u16),
}

impl DirtDirection {
    fn from_tick(tick: i64) -> Self {
        match DIRECTION.clamp(tick) {
            -2 => DirtDirection::Random,
            -1 => DirtDirection::TowardsCenter,
            degrees => DirtDirection::Angle(degrees as u16),
        }
    }

    fn tick(self) -> i64 {
        match self {
            DirtDirection::Random => DIRECTION_RANDOM as i64,
            DirtDirection::TowardsCenter => DIRECTION_TOWARDS_CENTER as i64,
            DirtDirection::Angle(degrees) => degrees as i64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LensDirtParams {
    pub shape_count: u32,
    /// Largest particle size as a fraction of the image width.
    pub max_size: f64,
    pub size_variance: u8,
    pub max_opacity: u8,
    pub opacity_variance: u8,
    /// 1 circle, 2 line, more for regular polygons.
    pub sides: u8,
    pub direction: DirtDirection,
    pub angle: u16,
    /// Trailing blur as a fraction of the image width, zero for none.
    pub blur: f64,
    /// Fixed generator seed; random per apply when unset.
    pub seed: Option<u64>,
    pub threads: Option<u32>,
}

impl Default for LensDirtParams {
    fn default() -> Self {
        Self::from_controls(&LensDirtControls::default())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LensDirtArgs {
    pub shape_count: usize,
    pub dirt: DirtArgs,
    pub smoothing: Smoothing,
    pub seed: Option<u64>,
}

impl EffectParams for LensDirtParams {
    type Controls = LensDirtControls;
    type Args = LensDirtArgs;

    fn from_controls(c: &LensDirtControls) -> Self {
        Self {
            shape_count: NUM_SHAPES.clamp(c.num_shapes) as u32 * SHAPES_PER_TICK,
            max_size: tick_to_fraction(c.max_size, MAX_SIZE, 1000.0),
            size_variance: SIZE_VAR.clamp(c.size_var) as u8,
            max_opacity: MAX_OPACITY.clamp(c.max_opacity) as u8,
            opacity_variance: OPACITY_VAR.clamp(c.opacity_var) as u8,
            sides: SHAPE.clamp(c.shape) as u8,
            direction: DirtDirection::from_tick(c.direction),
            angle: ANGLE.clamp(c.angle) as u16,
            blur: tick_to_fraction(c.blur_size, BLUR_SIZE, 1000.0),
            seed: None,
            threads: thread_override(c.num_threads),
        }
    }

    fn controls(&self) -> LensDirtControls {
        LensDirtControls {
            num_shapes: (self.shape_count / SHAPES_PER_TICK) as i64,
            max_size: fraction_to_tick(self.max_size, 1000.0),
            size_var: self.size_variance as i64,
            max_opacity: self.max_opacity as i64,
            opacity_var: self.opacity_variance as i64,
            shape: self.sides as i64,
            direction: self.direction.tick(),
            angle: self.angle as i64,
            blur_size: fraction_to_tick(self.blur, 1000.0),
            num_threads: self.threads.map(i64::from),
        }
    }

    fn kernel_args(&self, extent: &ImageExtent, _color: &ColorDescriptor) -> LensDirtArgs {
        let blur = fraction_to_px(self.blur, extent.width());
        LensDirtArgs {
            shape_count: self.shape_count as usize,
            dirt: DirtArgs {
                size: fraction_to_px(self.max_size, extent.width()),
                size_variance: self.size_variance as i32,
                opacity: self.max_opacity as i32,
                opacity_variance: self.opacity_variance as i32,
                shape: self.sides,
                direction: self.direction.tick() as i32,
            },
            smoothing: Smoothing {
                half_width: blur,
                half_height: blur,
            },
            seed: self.seed,
        }
    }

    fn thread_override(&self) -> Option<u32> {
        self.threads
    }
}
