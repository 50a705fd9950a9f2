//! Lens effects for raster documents: bloom, chromatic aberration,
//! anamorphic and pseudo lens flares, and lens dirt.
//!
//! Every effect is split into per-pixel stages that run over disjoint pixel
//! ranges on a fixed-size worker pool; see [`dispatch`] and [`pipeline`].
//! [`effects::apply`] drives one effect against a [`host::HostDocument`].

pub mod color;
pub mod config;
pub mod dispatch;
pub mod effects;
pub mod error;
pub mod extent;
pub mod host;
pub mod kernels;
pub mod params;
pub mod partition;
pub mod pipeline;
pub mod pixel;
pub mod settings;

pub use color::{ColorDepth, ColorDescriptor, ColorModel};
pub use config::EngineConfig;
pub use dispatch::CancelToken;
pub use effects::{ApplyContext, ApplyReport, BlendMode, Effect, apply};
pub use error::{FxError, FxResult, WorkerFault};
pub use extent::ImageExtent;
pub use host::{HostDocument, RasterDocument};
pub use pipeline::Pipeline;
