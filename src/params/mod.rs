//! Per-effect parameter models.
//!
//! Every effect has three views of its configuration:
//! - *controls*: integer slider ticks, identical to what gets persisted;
//! - *params*: model units (fractions, typed enums), what the UI edits;
//! - *kernel args*: pixels and byte flags for one concrete image.
//!
//! Conversions between them are pure. Ticks are clamped into their slider
//! range on the way in, so a hand-edited settings file can never produce
//! out-of-range kernel input.

pub mod aberration;
pub mod bloom;
pub mod dirt;
pub mod flare;
pub mod global;

pub use aberration::{
    AberrationArgs, AberrationControls, AberrationParams, AberrationShape, Falloff,
};
pub use bloom::{BloomArgs, BloomControls, BloomParams};
pub use dirt::{DirtDirection, LensDirtArgs, LensDirtControls, LensDirtParams};
pub use flare::{
    AnamorphicFlareArgs, AnamorphicFlareControls, AnamorphicFlareParams, FlareOrientation,
    PseudoFlareControls, PseudoFlareParams, PseudoFlareStageArgs,
};
pub use global::{GlobalControls, GlobalParams};

use std::num::NonZeroUsize;

use crate::color::ColorDescriptor;
use crate::extent::ImageExtent;

pub const MIN_THREADS: u32 = 1;
pub const MAX_THREADS: u32 = 64;

/// Inclusive slider range of one control, with its default tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickRange {
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

impl TickRange {
    pub const fn new(min: i64, max: i64, default: i64) -> Self {
        Self { min, max, default }
    }

    pub fn clamp(&self, tick: i64) -> i64 {
        tick.clamp(self.min, self.max)
    }
}

pub const THREAD_TICKS: TickRange = TickRange::new(MIN_THREADS as i64, MAX_THREADS as i64, 4);

/// Host smoothing request, in pixels. Zero on both axes means no blur.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Smoothing {
    pub half_width: i32,
    pub half_height: i32,
}

impl Smoothing {
    pub fn is_none(&self) -> bool {
        self.half_width <= 0 && self.half_height <= 0
    }
}

/// Supplies the bias color added after thresholding.
pub trait ColorProvider {
    /// Bias in 0–255 units and buffer channel order, `None` when unset.
    fn bias(&self) -> Option<[u8; 4]>;
}

/// The usual provider: no bias at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoBias;

impl ColorProvider for NoBias {
    fn bias(&self) -> Option<[u8; 4]> {
        None
    }
}

/// Conversions shared by every effect's parameter model.
pub trait EffectParams: Sized {
    type Controls;
    type Args;

    fn from_controls(controls: &Self::Controls) -> Self;

    fn controls(&self) -> Self::Controls;

    /// Resolves the parameters against one image. Pure: the same inputs
    /// always yield the same args.
    fn kernel_args(&self, extent: &ImageExtent, color: &ColorDescriptor) -> Self::Args;

    /// Worker count chosen for this effect alone, if any.
    fn thread_override(&self) -> Option<u32>;
}

/// `tick / per_unit`, after clamping the tick into `range`.
pub fn tick_to_fraction(tick: i64, range: TickRange, per_unit: f64) -> f64 {
    range.clamp(tick) as f64 / per_unit
}

pub fn fraction_to_tick(fraction: f64, per_unit: f64) -> i64 {
    (fraction * per_unit).round() as i64
}

/// A fraction of an image dimension, rounded to whole pixels.
pub fn fraction_to_px(fraction: f64, dimension: usize) -> i32 {
    (fraction * dimension as f64).round() as i32
}

pub fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Clamps a persisted thread tick, keeping "unset" as `None`.
pub fn thread_override(tick: Option<i64>) -> Option<u32> {
    tick.map(|t| THREAD_TICKS.clamp(t) as u32)
}

/// Effective worker count: the effect's own override wins, then the global
/// setting, then `fallback`. Always within 1–64.
pub fn resolve_threads(
    local: Option<u32>,
    global: Option<u32>,
    fallback: NonZeroUsize,
) -> NonZeroUsize {
    let requested = local.or(global).map_or(fallback.get(), |n| n as usize);
    let clamped = requested.clamp(MIN_THREADS as usize, MAX_THREADS as usize);
    NonZeroUsize::new(clamped).unwrap_or(NonZeroUsize::MIN)
}

/// Available parallelism, capped to the supported worker range.
pub fn default_threads() -> NonZeroUsize {
    let available = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    let clamped = available.clamp(MIN_THREADS as usize, MAX_THREADS as usize);
    NonZeroUsize::new(clamped).unwrap_or(NonZeroUsize::MIN)
}
