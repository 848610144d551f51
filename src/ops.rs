// src/ops.rs
//
// Transform operations and the small value types that parameterize
// decode/encode/transform jobs.
// These are cheap to create and store - the expensive work happens in run().

use crate::colorspace::Colorspace;
use crate::error::{reject, ImageUtilError, Result};

/// Default JPEG encode quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;
pub const MIN_JPEG_QUALITY: u8 = 1;
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Default GIF frame delay, in 1/100 s.
pub const DEFAULT_GIF_DELAY: u32 = 0;

/// Geometric and pixel-layout operations applied by a transform job.
///
/// Each operation is self-contained; the pipeline applies them in the
/// order crop, resize, rotate, convert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Cut a region out of the image
    Crop { x: u32, y: u32, width: u32, height: u32 },

    /// Scale to an exact size
    Resize { width: u32, height: u32 },

    /// Quarter-turn rotation or mirror
    Rotate { rotation: Rotation },

    /// Repack pixels into another colorspace
    Convert { target: Colorspace },
}

/// Rotation and flip modes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Rotation {
    #[default]
    None = 0,
    Rotate90,
    Rotate180,
    Rotate270,
    FlipHorizontal,
    FlipVertical,
}

impl Rotation {
    /// True when the output swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = ImageUtilError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Rotation::None),
            1 => Ok(Rotation::Rotate90),
            2 => Ok(Rotation::Rotate180),
            3 => Ok(Rotation::Rotate270),
            4 => Ok(Rotation::FlipHorizontal),
            5 => Ok(Rotation::FlipVertical),
            other => Err(reject(
                "Rotation::try_from",
                ImageUtilError::InvalidParameter,
                format_args!("rotation {other} out of range"),
            )),
        }
    }
}

/// JPEG decode-time scale factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Downscale {
    #[default]
    OneOne = 0,
    OneHalf,
    OneQuarter,
    OneEighth,
}

impl Downscale {
    /// Numerator over a fixed denominator of 8, as the DCT scaler expects.
    pub fn numerator(self) -> u8 {
        match self {
            Downscale::OneOne => 8,
            Downscale::OneHalf => 4,
            Downscale::OneQuarter => 2,
            Downscale::OneEighth => 1,
        }
    }
}

impl TryFrom<i32> for Downscale {
    type Error = ImageUtilError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(Downscale::OneOne),
            1 => Ok(Downscale::OneHalf),
            2 => Ok(Downscale::OneQuarter),
            3 => Ok(Downscale::OneEighth),
            other => Err(reject(
                "Downscale::try_from",
                ImageUtilError::InvalidParameter,
                format_args!("downscale {other} out of range"),
            )),
        }
    }
}

/// PNG zlib compression level, 0 (none) through 9 (best).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PngCompression(u8);

impl PngCompression {
    pub const NONE: PngCompression = PngCompression(0);
    pub const BEST: PngCompression = PngCompression(9);

    pub fn level(self) -> u8 {
        self.0
    }
}

impl Default for PngCompression {
    fn default() -> Self {
        PngCompression(6)
    }
}

impl TryFrom<i32> for PngCompression {
    type Error = ImageUtilError;

    fn try_from(raw: i32) -> Result<Self> {
        match u8::try_from(raw) {
            Ok(level) if level <= Self::BEST.0 => Ok(PngCompression(level)),
            _ => Err(reject(
                "PngCompression::try_from",
                ImageUtilError::InvalidParameter,
                format_args!("png compression {raw} out of range"),
            )),
        }
    }
}
