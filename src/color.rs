use crate::error::{FxError, FxResult};

/// Largest channel count of any supported model (CMYKA).
pub const MAX_CHANNELS: usize = 5;

const CHANNELS: [usize; 7] = [1, 4, 4, 4, 5, 2, 4];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorModel {
    Alpha,
    Rgba,
    Xyza,
    Laba,
    Cmyka,
    GrayA,
    YCbCrA,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorDepth {
    U8,
    U16,
    F32,
}

impl ColorModel {
    pub const ALL: [ColorModel; 7] = [
        ColorModel::Alpha,
        ColorModel::Rgba,
        ColorModel::Xyza,
        ColorModel::Laba,
        ColorModel::Cmyka,
        ColorModel::GrayA,
        ColorModel::YCbCrA,
    ];

    /// Host-facing name of the model.
    pub fn name(self) -> &'static str {
        match self {
            ColorModel::Alpha => "A",
            ColorModel::Rgba => "RGBA",
            ColorModel::Xyza => "XYZA",
            ColorModel::Laba => "LABA",
            ColorModel::Cmyka => "CMYKA",
            ColorModel::GrayA => "GRAYA",
            ColorModel::YCbCrA => "YCbCrA",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn channel_count(self) -> usize {
        CHANNELS[self as usize]
    }
}

impl ColorDepth {
    pub const ALL: [ColorDepth; 3] = [ColorDepth::U8, ColorDepth::U16, ColorDepth::F32];

    pub fn name(self) -> &'static str {
        match self {
            ColorDepth::U8 => "U8",
            ColorDepth::U16 => "U16",
            ColorDepth::F32 => "F32",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Bytes used by one channel sample.
    pub const fn bytes_per_channel(self) -> usize {
        1 << (self as usize)
    }

    /// Value of a fully saturated channel.
    pub fn channel_max(self) -> f64 {
        match self {
            ColorDepth::U8 => u8::MAX as f64,
            ColorDepth::U16 => u16::MAX as f64,
            ColorDepth::F32 => 1.0,
        }
    }

    /// Smallest meaningful step between two channel values.
    pub fn channel_step(self) -> f64 {
        match self {
            ColorDepth::U8 | ColorDepth::U16 => 1.0,
            ColorDepth::F32 => 1.0 / 255.0,
        }
    }
}

/// Resolved color model + depth pair of the image being processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorDescriptor {
    model: ColorModel,
    depth: ColorDepth,
}

impl ColorDescriptor {
    pub const fn new(model: ColorModel, depth: ColorDepth) -> Self {
        Self { model, depth }
    }

    /// Resolves host color-space names.
    ///
    /// Half floats (`F16`) and unknown names fail with
    /// [`FxError::UnsupportedColorSpace`].
    pub fn resolve(model_name: &str, depth_name: &str) -> FxResult<Self> {
        let unsupported = || FxError::UnsupportedColorSpace {
            model: model_name.to_string(),
            depth: depth_name.to_string(),
        };
        let model = ColorModel::from_name(model_name).ok_or_else(unsupported)?;
        let depth = ColorDepth::from_name(depth_name).ok_or_else(unsupported)?;
        Ok(Self { model, depth })
    }

    pub const fn model(&self) -> ColorModel {
        self.model
    }

    pub const fn depth(&self) -> ColorDepth {
        self.depth
    }

    pub const fn channel_count(&self) -> usize {
        self.model.channel_count()
    }

    pub const fn bytes_per_pixel(&self) -> usize {
        self.model.channel_count() * self.depth.bytes_per_channel()
    }

    pub fn channel_max(&self) -> f64 {
        self.depth.channel_max()
    }

    /// Alpha is always stored last.
    pub const fn alpha_index(&self) -> usize {
        self.model.channel_count() - 1
    }

    /// Channels shifted in opposite directions by the aberration kernels,
    /// as `(forward, backward)`.
    ///
    /// Integer RGBA is stored blue-green-red-alpha by the host, float RGBA is
    /// stored red-green-blue-alpha.
    pub fn displacement_channels(&self) -> (usize, usize) {
        match (self.model, self.depth) {
            (ColorModel::Rgba, ColorDepth::U8 | ColorDepth::U16) => (2, 0),
            (ColorModel::Rgba, ColorDepth::F32) => (0, 2),
            (ColorModel::Xyza, _) => (0, 2),
            (ColorModel::Laba, _) => (1, 2),
            (ColorModel::Cmyka, _) => (0, 2),
            (ColorModel::YCbCrA, _) => (2, 1),
            (ColorModel::GrayA, _) | (ColorModel::Alpha, _) => (0, 0),
        }
    }
}

impl std::fmt::Display for ColorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.model.name(), self.depth.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bpp(model: &str, depth: &str) -> usize {
        ColorDescriptor::resolve(model, depth)
            .expect("color space should resolve")
            .bytes_per_pixel()
    }

    #[test]
    fn bytes_per_pixel_follows_channel_table() {
        assert_eq!(bpp("RGBA", "U8"), 4);
        assert_eq!(bpp("GRAYA", "U16"), 4);
        assert_eq!(bpp("CMYKA", "F32"), 20);
        assert_eq!(bpp("A", "U8"), 1);
        assert_eq!(bpp("YCbCrA", "U16"), 8);
        assert_eq!(bpp("LABA", "F32"), 16);
    }

    #[test]
    fn every_pair_matches_channel_times_depth_width() {
        for model in ColorModel::ALL {
            for depth in ColorDepth::ALL {
                let desc = ColorDescriptor::new(model, depth);
                let expected = CHANNELS[model.code() as usize] * 2usize.pow(depth.code() as u32);
                assert_eq!(desc.bytes_per_pixel(), expected, "{desc}");
            }
        }
    }

    #[test]
    fn half_float_is_rejected() {
        let err = ColorDescriptor::resolve("RGBA", "F16").unwrap_err();
        assert!(matches!(err, FxError::UnsupportedColorSpace { .. }));
    }

    #[test]
    fn unknown_model_is_rejected() {
        assert!(ColorDescriptor::resolve("HSV", "U8").is_err());
        assert!(ColorDescriptor::resolve("rgba", "U8").is_err());
    }

    #[test]
    fn codes_are_enumeration_indices() {
        let desc = ColorDescriptor::resolve("YCbCrA", "F32").unwrap();
        assert_eq!(desc.model().code(), 6);
        assert_eq!(desc.depth().code(), 2);
    }

    #[test]
    fn integer_rgba_displaces_red_forward_and_blue_backward() {
        let desc = ColorDescriptor::new(ColorModel::Rgba, ColorDepth::U8);
        assert_eq!(desc.displacement_channels(), (2, 0));
    }
}
