use crate::color::ColorDescriptor;
use crate::error::{FxError, FxResult};

/// Width and height of the image being processed, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageExtent {
    width: usize,
    height: usize,
}

impl ImageExtent {
    /// Validates host-reported dimensions; both must be positive.
    pub fn new(width: i64, height: i64) -> FxResult<Self> {
        if width <= 0 || height <= 0 {
            return Err(FxError::InvalidExtent { width, height });
        }
        Ok(Self {
            width: width as usize,
            height: height as usize,
        })
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub const fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Byte length of a full pixel buffer in the given layout.
    pub const fn buffer_len(&self, color: &ColorDescriptor) -> usize {
        self.pixel_count() * color.bytes_per_pixel()
    }

    /// Zeroed pixel buffer sized for this extent and layout.
    pub fn alloc_buffer(&self, color: &ColorDescriptor) -> Vec<u8> {
        vec![0u8; self.buffer_len(color)]
    }

    /// Linear pixel index to `(x, y)`.
    pub const fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    /// Image center in pixel coordinates.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.width as f64 - 1.0) / 2.0,
            (self.height as f64 - 1.0) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ColorDepth, ColorModel};

    #[test]
    fn rejects_non_positive_dimensions() {
        assert!(matches!(
            ImageExtent::new(0, 10),
            Err(FxError::InvalidExtent {
                width: 0,
                height: 10
            })
        ));
        assert!(ImageExtent::new(10, -1).is_err());
    }

    #[test]
    fn buffer_len_uses_bytes_per_pixel() {
        let extent = ImageExtent::new(100, 100).unwrap();
        let color = ColorDescriptor::new(ColorModel::Rgba, ColorDepth::U8);
        assert_eq!(extent.buffer_len(&color), 40_000);
        let cmyk = ColorDescriptor::new(ColorModel::Cmyka, ColorDepth::F32);
        assert_eq!(extent.alloc_buffer(&cmyk).len(), 200_000);
    }

    #[test]
    fn coords_wrap_rows() {
        let extent = ImageExtent::new(7, 3).unwrap();
        assert_eq!(extent.coords(0), (0, 0));
        assert_eq!(extent.coords(8), (1, 1));
        assert_eq!(extent.coords(20), (6, 2));
    }
}
