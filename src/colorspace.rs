// src/colorspace.rs
//
// Colorspace enumeration and the per-format catalog that maps each
// colorspace onto the pixel layout a codec consumes natively.
//
// The catalog is a set of static tables indexed by colorspace value. An entry
// of UNSUPPORTED (-1) marks a colorspace with no native representation in
// that codec. Enumeration walks a table from the highest index down, which
// puts the RGB family ahead of the YUV family.

use crate::codecs::pixel::PixelFormat;
use crate::error::{reject, ImageUtilError, Result};
use std::fmt;

/// Pixel layouts understood by the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Colorspace {
    /// YV12, YCrCb planar 4:2:0
    Yv12 = 0,
    /// YUV422 planar
    Yuv422,
    /// I420, YCbCr planar 4:2:0
    I420,
    /// NV12, Y plane + interleaved CbCr 4:2:0
    Nv12,
    /// UYVY packed 4:2:2
    Uyvy,
    /// YUYV packed 4:2:2
    Yuyv,
    /// RGB565 packed 16-bit
    Rgb565,
    /// RGB888
    Rgb888,
    /// ARGB8888
    Argb8888,
    /// BGRA8888
    Bgra8888,
    /// RGBA8888
    Rgba8888,
    /// BGRX8888, padding byte ignored on read
    Bgrx8888,
    /// NV21, Y plane + interleaved CrCb 4:2:0
    Nv21,
    /// NV16, Y plane + interleaved CbCr 4:2:2
    Nv16,
    /// NV61, Y plane + interleaved CrCb 4:2:2
    Nv61,
}

/// Number of colorspace values; also the length of every catalog table.
pub const COLORSPACE_COUNT: usize = 15;

impl Colorspace {
    pub const FIRST: Colorspace = Colorspace::Yv12;
    pub const LAST: Colorspace = Colorspace::Nv61;

    /// All colorspaces in ascending enum order.
    pub const ALL: [Colorspace; COLORSPACE_COUNT] = [
        Colorspace::Yv12,
        Colorspace::Yuv422,
        Colorspace::I420,
        Colorspace::Nv12,
        Colorspace::Uyvy,
        Colorspace::Yuyv,
        Colorspace::Rgb565,
        Colorspace::Rgb888,
        Colorspace::Argb8888,
        Colorspace::Bgra8888,
        Colorspace::Rgba8888,
        Colorspace::Bgrx8888,
        Colorspace::Nv21,
        Colorspace::Nv16,
        Colorspace::Nv61,
    ];

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Colorspace::Yv12 => "YV12",
            Colorspace::Yuv422 => "YUV422",
            Colorspace::I420 => "I420",
            Colorspace::Nv12 => "NV12",
            Colorspace::Uyvy => "UYVY",
            Colorspace::Yuyv => "YUYV",
            Colorspace::Rgb565 => "RGB565",
            Colorspace::Rgb888 => "RGB888",
            Colorspace::Argb8888 => "ARGB8888",
            Colorspace::Bgra8888 => "BGRA8888",
            Colorspace::Rgba8888 => "RGBA8888",
            Colorspace::Bgrx8888 => "BGRX8888",
            Colorspace::Nv21 => "NV21",
            Colorspace::Nv16 => "NV16",
            Colorspace::Nv61 => "NV61",
        }
    }
}

impl fmt::Display for Colorspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for Colorspace {
    type Error = ImageUtilError;

    fn try_from(raw: i32) -> Result<Self> {
        validate_range(raw)
    }
}

/// Encoded image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ImageType {
    Jpeg = 0,
    Png,
    Gif,
    Bmp,
}

impl ImageType {
    pub fn name(self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpeg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Bmp => "bmp",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i32> for ImageType {
    type Error = ImageUtilError;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(ImageType::Jpeg),
            1 => Ok(ImageType::Png),
            2 => Ok(ImageType::Gif),
            3 => Ok(ImageType::Bmp),
            other => Err(reject(
                "ImageType::try_from",
                ImageUtilError::InvalidParameter,
                format_args!("image type {other} out of range"),
            )),
        }
    }
}

/// Which catalog table to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorspaceTable {
    /// Raw conversion and geometric transforms
    Transform,
    Jpeg,
    Png,
    Gif,
    Bmp,
}

impl From<ImageType> for ColorspaceTable {
    fn from(image_type: ImageType) -> Self {
        match image_type {
            ImageType::Jpeg => ColorspaceTable::Jpeg,
            ImageType::Png => ColorspaceTable::Png,
            ImageType::Gif => ColorspaceTable::Gif,
            ImageType::Bmp => ColorspaceTable::Bmp,
        }
    }
}

/// Catalog marker for "no native representation".
pub const UNSUPPORTED: i32 = -1;

const YV12: i32 = PixelFormat::Yv12 as i32;
const I420: i32 = PixelFormat::I420 as i32;
const YUV422: i32 = PixelFormat::Yuv422 as i32;
const NV12: i32 = PixelFormat::Nv12 as i32;
const NV21: i32 = PixelFormat::Nv21 as i32;
const NV16: i32 = PixelFormat::Nv16 as i32;
const NV61: i32 = PixelFormat::Nv61 as i32;
const UYVY: i32 = PixelFormat::Uyvy as i32;
const YUYV: i32 = PixelFormat::Yuyv as i32;
const RGB565: i32 = PixelFormat::Rgb565 as i32;
const RGB888: i32 = PixelFormat::Rgb888 as i32;
const ARGB8888: i32 = PixelFormat::Argb8888 as i32;
const BGRA8888: i32 = PixelFormat::Bgra8888 as i32;
const RGBA8888: i32 = PixelFormat::Rgba8888 as i32;
const BGRX8888: i32 = PixelFormat::Bgrx8888 as i32;

static TRANSFORM_TABLE: [i32; COLORSPACE_COUNT] = [
    YV12, YUV422, I420, NV12, UYVY, YUYV, RGB565, RGB888, ARGB8888, BGRA8888, RGBA8888, BGRX8888,
    NV21, NV16, NV61,
];

static JPEG_TABLE: [i32; COLORSPACE_COUNT] = [
    YV12,
    UNSUPPORTED, // YUV422
    I420,
    NV12,
    UNSUPPORTED, // UYVY
    YUYV,
    UNSUPPORTED, // RGB565
    RGB888,
    ARGB8888,
    BGRA8888,
    RGBA8888,
    UNSUPPORTED, // BGRX8888
    NV21,
    NV16,
    NV61,
];

static PNG_TABLE: [i32; COLORSPACE_COUNT] = rgba_only_table();
static GIF_TABLE: [i32; COLORSPACE_COUNT] = rgba_only_table();
static BMP_TABLE: [i32; COLORSPACE_COUNT] = rgba_only_table();

const fn rgba_only_table() -> [i32; COLORSPACE_COUNT] {
    let mut table = [UNSUPPORTED; COLORSPACE_COUNT];
    table[Colorspace::Rgba8888 as usize] = RGBA8888;
    table
}

fn table(which: ColorspaceTable) -> &'static [i32; COLORSPACE_COUNT] {
    match which {
        ColorspaceTable::Transform => &TRANSFORM_TABLE,
        ColorspaceTable::Jpeg => &JPEG_TABLE,
        ColorspaceTable::Png => &PNG_TABLE,
        ColorspaceTable::Gif => &GIF_TABLE,
        ColorspaceTable::Bmp => &BMP_TABLE,
    }
}

/// Raw catalog entry: a native code or [`UNSUPPORTED`].
pub fn native_code(colorspace: Colorspace, which: impl Into<ColorspaceTable>) -> i32 {
    table(which.into())[colorspace.index()]
}

/// Native pixel layout for `colorspace` in the given table, if any.
pub fn lookup(colorspace: Colorspace, which: impl Into<ColorspaceTable>) -> Option<PixelFormat> {
    PixelFormat::from_native(native_code(colorspace, which))
}

pub fn is_supported(colorspace: Colorspace, which: impl Into<ColorspaceTable>) -> bool {
    native_code(colorspace, which) != UNSUPPORTED
}

/// Lookup that fails with NotSupportedFormat, logging `func`.
pub(crate) fn require(
    func: &str,
    colorspace: Colorspace,
    which: impl Into<ColorspaceTable>,
) -> Result<PixelFormat> {
    let which = which.into();
    lookup(colorspace, which).ok_or_else(|| {
        reject(
            func,
            ImageUtilError::NotSupportedFormat,
            format_args!("{colorspace} has no native layout in {which:?} table"),
        )
    })
}

/// Visit every supported colorspace of a table in descending enum order.
///
/// Stops as soon as `visitor` returns `false`.
pub fn for_each_supported<F>(which: impl Into<ColorspaceTable>, mut visitor: F)
where
    F: FnMut(Colorspace) -> bool,
{
    let entries = table(which.into());
    for colorspace in Colorspace::ALL.iter().rev() {
        if entries[colorspace.index()] == UNSUPPORTED {
            continue;
        }
        if !visitor(*colorspace) {
            return;
        }
    }
}

/// Reject raw colorspace values outside `[FIRST, LAST]`.
pub fn validate_range(raw: i32) -> Result<Colorspace> {
    if raw < Colorspace::FIRST.as_raw() || raw > Colorspace::LAST.as_raw() {
        return Err(reject(
            "validate_range",
            ImageUtilError::InvalidParameter,
            format_args!("colorspace {raw} out of range"),
        ));
    }
    Ok(Colorspace::ALL[raw as usize])
}
