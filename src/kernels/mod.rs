pub mod aberration;
pub mod dirt;
pub mod flare;
pub mod threshold;

pub use aberration::{LinearAberrationKernel, LinearArgs, RadialAberrationKernel, RadialArgs};
pub use dirt::{DirtArgs, DirtRenderKernel, DirtShape, ShapeGenKernel};
pub use flare::{PseudoFlareArgs, PseudoFlareKernel};
pub use threshold::{PowerArgs, PowerKernel, ThresholdArgs, ThresholdKernel};

use crate::color::ColorDescriptor;
use crate::error::{FxError, FxResult};
use crate::extent::ImageExtent;

fn check_pixel_input(
    what: &'static str,
    input: &[u8],
    extent: &ImageExtent,
    color: &ColorDescriptor,
) -> FxResult<()> {
    let expected = extent.buffer_len(color);
    if input.len() != expected {
        return Err(FxError::BufferSize {
            what,
            expected,
            actual: input.len(),
        });
    }
    Ok(())
}
