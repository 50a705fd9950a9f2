//! Channel-level pixel access for every supported layout.
//!
//! Kernels work on [`Pixel`] values (channels widened to `f64`) and never
//! touch raw bytes directly, so the same kernel code serves U8, U16 and F32
//! buffers of any color model.

use crate::color::{ColorDepth, ColorDescriptor, ColorModel, MAX_CHANNELS};
use crate::extent::ImageExtent;

/// Fractions below this are treated as landing exactly on a pixel.
const SAMPLE_EPS: f64 = 0.00001;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pixel(pub [f64; MAX_CHANNELS]);

impl Pixel {
    pub const ZERO: Pixel = Pixel([0.0; MAX_CHANNELS]);

    pub fn splat(value: f64) -> Self {
        Pixel([value; MAX_CHANNELS])
    }

    pub fn scale(mut self, factor: f64) -> Self {
        for c in &mut self.0 {
            *c *= factor;
        }
        self
    }

    pub fn add(mut self, other: Pixel) -> Self {
        for (a, b) in self.0.iter_mut().zip(other.0) {
            *a += b;
        }
        self
    }

    fn lerp(self, other: Pixel, t: f64) -> Self {
        self.scale(1.0 - t).add(other.scale(t))
    }
}

/// Reads the pixel at linear index `index`.
pub fn read(buf: &[u8], index: usize, color: &ColorDescriptor) -> Pixel {
    let bpp = color.bytes_per_pixel();
    decode(&buf[index * bpp..(index + 1) * bpp], color)
}

/// Reads the pixel at `(x, y)`; coordinates must be inside the image.
pub fn read_at(
    buf: &[u8],
    x: usize,
    y: usize,
    extent: &ImageExtent,
    color: &ColorDescriptor,
) -> Pixel {
    read(buf, y * extent.width() + x, color)
}

/// Decodes one pixel worth of bytes.
pub fn decode(bytes: &[u8], color: &ColorDescriptor) -> Pixel {
    let mut px = Pixel::ZERO;
    let width = color.depth().bytes_per_channel();
    for (c, chunk) in bytes.chunks_exact(width).take(color.channel_count()).enumerate() {
        px.0[c] = match color.depth() {
            ColorDepth::U8 => chunk[0] as f64,
            ColorDepth::U16 => u16::from_ne_bytes([chunk[0], chunk[1]]) as f64,
            ColorDepth::F32 => f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f64,
        };
    }
    px
}

/// Clamps every channel into the depth's range and encodes it into `out`,
/// which must be exactly one pixel long.
pub fn encode(px: &Pixel, out: &mut [u8], color: &ColorDescriptor) {
    let max = color.channel_max();
    let width = color.depth().bytes_per_channel();
    for (c, chunk) in out.chunks_exact_mut(width).take(color.channel_count()).enumerate() {
        let v = if px.0[c].is_nan() {
            0.0
        } else {
            px.0[c].clamp(0.0, max)
        };
        match color.depth() {
            ColorDepth::U8 => chunk[0] = v.round() as u8,
            ColorDepth::U16 => chunk.copy_from_slice(&(v.round() as u16).to_ne_bytes()),
            ColorDepth::F32 => chunk.copy_from_slice(&(v as f32).to_ne_bytes()),
        }
    }
}

/// Samples the image at fractional coordinates.
///
/// Coordinates are clamped to the image bounds. With `bilinear` the four
/// neighbouring pixels are blended, otherwise the pixel containing the point
/// is returned.
pub fn sample(
    buf: &[u8],
    x: f64,
    y: f64,
    extent: &ImageExtent,
    color: &ColorDescriptor,
    bilinear: bool,
) -> Pixel {
    let max_x = (extent.width() - 1) as f64;
    let max_y = (extent.height() - 1) as f64;
    let cx = if x.is_nan() { 0.0 } else { x.clamp(0.0, max_x) };
    let cy = if y.is_nan() { 0.0 } else { y.clamp(0.0, max_y) };
    let px = cx.floor() as usize;
    let py = cy.floor() as usize;
    let fx = cx - px as f64;
    let fy = cy - py as f64;

    let mut base = read_at(buf, px, py, extent, color);
    if !bilinear {
        return base;
    }

    let blend_y = fy > SAMPLE_EPS && py + 1 < extent.height();
    let blend_x = fx > SAMPLE_EPS && px + 1 < extent.width();
    if blend_y {
        base = base.lerp(read_at(buf, px, py + 1, extent, color), fy);
    }
    if blend_x {
        let mut right = read_at(buf, px + 1, py, extent, color);
        if blend_y {
            right = right.lerp(read_at(buf, px + 1, py + 1, extent, color), fy);
        }
        base = base.lerp(right, fx);
    }
    base
}

/// Opaque-agnostic "white" of a model: full intensity with neutral chroma,
/// zero alpha.
pub fn white(color: &ColorDescriptor) -> Pixel {
    let max = color.channel_max();
    let mut px = Pixel::splat(max);
    match color.model() {
        ColorModel::Cmyka => px = Pixel::ZERO,
        ColorModel::Laba | ColorModel::YCbCrA => {
            px.0[1] = max / 2.0;
            px.0[2] = max / 2.0;
        }
        _ => {}
    }
    px.0[color.alpha_index()] = 0.0;
    px
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba8() -> ColorDescriptor {
        ColorDescriptor::new(ColorModel::Rgba, ColorDepth::U8)
    }

    #[test]
    fn u16_round_trips_through_native_bytes() {
        let color = ColorDescriptor::new(ColorModel::GrayA, ColorDepth::U16);
        let mut buf = vec![0u8; 4];
        let mut px = Pixel::ZERO;
        px.0[0] = 40_000.0;
        px.0[1] = 65_535.0;
        encode(&px, &mut buf, &color);
        let back = read(&buf, 0, &color);
        assert_eq!(back.0[0], 40_000.0);
        assert_eq!(back.0[1], 65_535.0);
    }

    #[test]
    fn encode_clamps_to_depth_range() {
        let mut buf = vec![0u8; 4];
        encode(&Pixel([300.0, -5.0, 12.4, 12.6, 0.0]), &mut buf, &rgba8());
        assert_eq!(buf, vec![255, 0, 12, 13]);

        let color = ColorDescriptor::new(ColorModel::Rgba, ColorDepth::F32);
        let mut fbuf = vec![0u8; 16];
        encode(&Pixel([2.0, 0.5, -1.0, 1.0, 0.0]), &mut fbuf, &color);
        let back = read(&fbuf, 0, &color);
        assert_eq!(back.0[0], 1.0);
        assert_eq!(back.0[1], 0.5);
        assert_eq!(back.0[2], 0.0);
    }

    #[test]
    fn nearest_sample_clamps_out_of_bounds() {
        let extent = ImageExtent::new(2, 1).unwrap();
        let buf = vec![10, 10, 10, 255, 200, 200, 200, 255];
        let left = sample(&buf, -4.0, 0.0, &extent, &rgba8(), false);
        let right = sample(&buf, 9.0, 3.0, &extent, &rgba8(), false);
        assert_eq!(left.0[0], 10.0);
        assert_eq!(right.0[0], 200.0);
    }

    #[test]
    fn bilinear_sample_blends_neighbours() {
        let extent = ImageExtent::new(2, 1).unwrap();
        let buf = vec![0, 0, 0, 255, 200, 200, 200, 255];
        let mid = sample(&buf, 0.5, 0.0, &extent, &rgba8(), true);
        assert!((mid.0[0] - 100.0).abs() < 1e-9);
        let nearest = sample(&buf, 0.5, 0.0, &extent, &rgba8(), false);
        assert_eq!(nearest.0[0], 0.0);
    }

    #[test]
    fn white_keeps_chroma_neutral_and_alpha_clear() {
        let lab = ColorDescriptor::new(ColorModel::Laba, ColorDepth::U8);
        let px = white(&lab);
        assert_eq!(px.0[0], 255.0);
        assert_eq!(px.0[1], 127.5);
        assert_eq!(px.0[3], 0.0);
        let cmyk = ColorDescriptor::new(ColorModel::Cmyka, ColorDepth::U8);
        assert_eq!(white(&cmyk), Pixel::ZERO);
    }
}
