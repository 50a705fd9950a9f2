use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::filter::separable_filter;
use tracing::debug;

use crate::error::{FxError, FxResult};

/// What the engine needs from a host application's document.
///
/// Pixel data is the raw buffer in the host's own layout, described by
/// `color_model` and `color_depth` (`"RGBA"` + `"U8"` means blue, green,
/// red, alpha bytes).
pub trait HostDocument {
    fn width(&self) -> i64;

    fn height(&self) -> i64;

    fn color_model(&self) -> &str;

    fn color_depth(&self) -> &str;

    fn pixel_data(&self) -> FxResult<Vec<u8>>;

    fn set_pixel_data(&mut self, data: &[u8]) -> FxResult<()>;

    /// Box-style smoothing with the given half sizes in pixels. A zero half
    /// size leaves that axis untouched.
    fn apply_blur(&mut self, half_width: i32, half_height: i32) -> FxResult<()>;
}

/// An in-memory 8-bit RGBA document.
#[derive(Clone, Debug)]
pub struct RasterDocument {
    image: RgbaImage,
}

impl RasterDocument {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_rgba8())
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

fn box_kernel(half: i32) -> Vec<f32> {
    let len = (half.max(0) as usize) * 2 + 1;
    vec![1.0 / len as f32; len]
}

impl HostDocument for RasterDocument {
    fn width(&self) -> i64 {
        self.image.width() as i64
    }

    fn height(&self) -> i64 {
        self.image.height() as i64
    }

    fn color_model(&self) -> &str {
        "RGBA"
    }

    fn color_depth(&self) -> &str {
        "U8"
    }

    fn pixel_data(&self) -> FxResult<Vec<u8>> {
        let mut data = self.image.as_raw().clone();
        for px in data.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        Ok(data)
    }

    fn set_pixel_data(&mut self, data: &[u8]) -> FxResult<()> {
        let expected = self.image.as_raw().len();
        if data.len() != expected {
            return Err(FxError::BufferSize {
                what: "document pixels",
                expected,
                actual: data.len(),
            });
        }
        for (dst, src) in self.image.pixels_mut().zip(data.chunks_exact(4)) {
            *dst = Rgba([src[2], src[1], src[0], src[3]]);
        }
        Ok(())
    }

    fn apply_blur(&mut self, half_width: i32, half_height: i32) -> FxResult<()> {
        if half_width <= 0 && half_height <= 0 {
            return Ok(());
        }
        debug!(half_width, half_height, "blurring document");
        self.image = separable_filter(
            &self.image,
            &box_kernel(half_width),
            &box_kernel(half_height),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_data_is_bgra() {
        let doc = RasterDocument::new(RgbaImage::from_pixel(2, 1, Rgba([10, 20, 30, 40])));
        assert_eq!(doc.pixel_data().unwrap(), vec![30, 20, 10, 40, 30, 20, 10, 40]);
    }

    #[test]
    fn set_pixel_data_swaps_back() {
        let mut doc = RasterDocument::new(RgbaImage::new(1, 1));
        doc.set_pixel_data(&[1, 2, 3, 4]).unwrap();
        assert_eq!(doc.image().get_pixel(0, 0), &Rgba([3, 2, 1, 4]));
        assert!(doc.set_pixel_data(&[1, 2, 3]).is_err());
    }

    #[test]
    fn zero_blur_is_identity() {
        let mut img = RgbaImage::new(4, 4);
        img.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let mut doc = RasterDocument::new(img.clone());
        doc.apply_blur(0, 0).unwrap();
        assert_eq!(doc.image(), &img);
    }

    #[test]
    fn horizontal_blur_spreads_along_rows_only() {
        let mut img = RgbaImage::new(9, 9);
        img.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let mut doc = RasterDocument::new(img);
        doc.apply_blur(2, 0).unwrap();
        assert_eq!(doc.image().get_pixel(4, 4)[0], 51);
        assert_eq!(doc.image().get_pixel(2, 4)[0], 51);
        assert_eq!(doc.image().get_pixel(4, 3)[0], 0);
        assert_eq!(doc.image().get_pixel(1, 4)[0], 0);
    }
}
