// src/engine/api.rs
//
// Stateless entry points: buffer sizing, raw colorspace conversion,
// one-shot resize/rotate/crop, and JPEG decode/encode without a handle.
//
// Each function validates its own arguments before touching a codec or the
// pipeline; collaborator failures are translated, never passed through.

use crate::codecs::pixel::{self, PixelBuffer, PixelFormat};
use crate::colorspace::{self, Colorspace, ColorspaceTable, ImageType};
use crate::engine::decoder;
use crate::engine::encoder;
use crate::engine::io::{self, Source};
use crate::engine::pipeline;
use crate::error::{reject, translate_result, ImageUtilError, Result};
use crate::ops::{Downscale, Operation, Rotation, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};
use crate::RawImage;
use std::path::Path;
use tracing::debug;

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

fn require_dimensions(func: &str, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(reject(
            func,
            ImageUtilError::InvalidParameter,
            format_args!("invalid dimensions {width}x{height}"),
        ));
    }
    Ok(())
}

fn require_pixels(func: &str, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(reject(func, ImageUtilError::InvalidParameter, "empty pixel buffer"));
    }
    Ok(())
}

fn require_path(func: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(reject(func, ImageUtilError::NoSuchFile, "empty path"));
    }
    Ok(())
}

fn require_quality(func: &str, quality: u8) -> Result<()> {
    if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality) {
        return Err(reject(
            func,
            ImageUtilError::InvalidParameter,
            format_args!("quality {quality} out of range"),
        ));
    }
    Ok(())
}

/// Run one geometric operation over a raw image.
fn transform_once(
    func: &str,
    src: &[u8],
    width: u32,
    height: u32,
    colorspace: Colorspace,
    op: Operation,
) -> Result<RawImage> {
    let format = colorspace::require(func, colorspace, ColorspaceTable::Transform)?;
    let input = PixelBuffer {
        width,
        height,
        format,
        data: src.to_vec(),
    };
    let out = translate_result(func, pipeline::apply_ops(input, &[op]))?;
    Ok(RawImage::new(out.width, out.height, colorspace, out.data))
}

// =============================================================================
// RAW PIXEL OPERATIONS
// =============================================================================

/// Byte size of a `width` x `height` image in `colorspace`.
pub fn calculate_buffer_size(width: u32, height: u32, colorspace: Colorspace) -> Result<usize> {
    const FUNC: &str = "calculate_buffer_size";
    require_dimensions(FUNC, width, height)?;
    let format = colorspace::require(FUNC, colorspace, ColorspaceTable::Transform)?;
    translate_result(FUNC, pixel::buffer_size(format, width, height))
}

/// Repack `src` from one colorspace into another. Same-layout conversions
/// copy exactly.
pub fn convert_colorspace(
    src: &[u8],
    width: u32,
    height: u32,
    src_colorspace: Colorspace,
    dst_colorspace: Colorspace,
) -> Result<Vec<u8>> {
    const FUNC: &str = "convert_colorspace";
    require_pixels(FUNC, src)?;
    require_dimensions(FUNC, width, height)?;
    let from = colorspace::require(FUNC, src_colorspace, ColorspaceTable::Transform)?;
    let to = colorspace::require(FUNC, dst_colorspace, ColorspaceTable::Transform)?;
    debug!(
        target: "image_util",
        from = %src_colorspace,
        to = %dst_colorspace,
        width,
        height,
        "convert colorspace"
    );
    translate_result(FUNC, pixel::convert(src, width, height, from, to))
}

pub fn resize(
    src: &[u8],
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    colorspace: Colorspace,
) -> Result<RawImage> {
    const FUNC: &str = "resize";
    require_pixels(FUNC, src)?;
    require_dimensions(FUNC, src_width, src_height)?;
    require_dimensions(FUNC, dst_width, dst_height)?;
    transform_once(
        FUNC,
        src,
        src_width,
        src_height,
        colorspace,
        Operation::Resize {
            width: dst_width,
            height: dst_height,
        },
    )
}

/// Rotate or flip; 90 and 270 degree rotations swap the dimensions.
pub fn rotate(
    src: &[u8],
    src_width: u32,
    src_height: u32,
    rotation: Rotation,
    colorspace: Colorspace,
) -> Result<RawImage> {
    const FUNC: &str = "rotate";
    require_pixels(FUNC, src)?;
    require_dimensions(FUNC, src_width, src_height)?;
    transform_once(
        FUNC,
        src,
        src_width,
        src_height,
        colorspace,
        Operation::Rotate { rotation },
    )
}

/// Cut a `width` x `height` region at (`x`, `y`). The region must lie
/// inside the source.
#[allow(clippy::too_many_arguments)]
pub fn crop(
    src: &[u8],
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    src_width: u32,
    src_height: u32,
    colorspace: Colorspace,
) -> Result<RawImage> {
    const FUNC: &str = "crop";
    require_pixels(FUNC, src)?;
    require_dimensions(FUNC, src_width, src_height)?;
    require_dimensions(FUNC, width, height)?;
    let inside = x < src_width
        && y < src_height
        && x.checked_add(width).is_some_and(|r| r <= src_width)
        && y.checked_add(height).is_some_and(|b| b <= src_height);
    if !inside {
        return Err(reject(
            FUNC,
            ImageUtilError::InvalidParameter,
            format_args!(
                "region {width}x{height}+{x}+{y} outside {src_width}x{src_height} source"
            ),
        ));
    }
    transform_once(
        FUNC,
        src,
        src_width,
        src_height,
        colorspace,
        Operation::Crop {
            x,
            y,
            width,
            height,
        },
    )
}

// =============================================================================
// JPEG
// =============================================================================

fn decode_jpeg_source(
    func: &str,
    source: Source,
    colorspace: Colorspace,
    downscale: Downscale,
) -> Result<RawImage> {
    let format = colorspace::require(func, colorspace, ImageType::Jpeg)?;
    let result = source
        .load()
        .and_then(|data| decoder::decode(ImageType::Jpeg, &data, format, downscale));
    let decoded = translate_result(func, result)?;
    Ok(RawImage::new(
        decoded.width,
        decoded.height,
        colorspace,
        decoded.data,
    ))
}

/// Decode a JPEG file into `colorspace`.
pub fn decode_jpeg(path: impl AsRef<Path>, colorspace: Colorspace) -> Result<RawImage> {
    decode_jpeg_with_downscale(path, colorspace, Downscale::OneOne)
}

pub fn decode_jpeg_with_downscale(
    path: impl AsRef<Path>,
    colorspace: Colorspace,
    downscale: Downscale,
) -> Result<RawImage> {
    const FUNC: &str = "decode_jpeg";
    let path = path.as_ref();
    require_path(FUNC, path)?;
    decode_jpeg_source(FUNC, Source::Path(path.to_path_buf()), colorspace, downscale)
}

/// Decode JPEG bytes into `colorspace`.
pub fn decode_jpeg_from_memory(data: &[u8], colorspace: Colorspace) -> Result<RawImage> {
    decode_jpeg_from_memory_with_downscale(data, colorspace, Downscale::OneOne)
}

pub fn decode_jpeg_from_memory_with_downscale(
    data: &[u8],
    colorspace: Colorspace,
    downscale: Downscale,
) -> Result<RawImage> {
    const FUNC: &str = "decode_jpeg_from_memory";
    if data.is_empty() {
        return Err(reject(FUNC, ImageUtilError::InvalidParameter, "empty jpeg buffer"));
    }
    decode_jpeg_source(
        FUNC,
        Source::Memory(std::sync::Arc::new(data.to_vec())),
        colorspace,
        downscale,
    )
}

fn prepare_jpeg_encode(
    func: &str,
    pixels: &[u8],
    width: u32,
    height: u32,
    colorspace: Colorspace,
    quality: u8,
) -> Result<PixelFormat> {
    require_pixels(func, pixels)?;
    require_dimensions(func, width, height)?;
    let format = colorspace::require(func, colorspace, ImageType::Jpeg)?;
    require_quality(func, quality)?;
    Ok(format)
}

/// Encode raw pixels as a JPEG file.
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    colorspace: Colorspace,
    quality: u8,
    path: impl AsRef<Path>,
) -> Result<()> {
    const FUNC: &str = "encode_jpeg";
    let path = path.as_ref();
    require_path(FUNC, path)?;
    let format = prepare_jpeg_encode(FUNC, pixels, width, height, colorspace, quality)?;
    let result = encoder::encode_jpeg(pixels, width, height, format, quality)
        .and_then(|bytes| io::write_file(path, &bytes));
    translate_result(FUNC, result)
}

/// Encode raw pixels as JPEG bytes.
pub fn encode_jpeg_to_memory(
    pixels: &[u8],
    width: u32,
    height: u32,
    colorspace: Colorspace,
    quality: u8,
) -> Result<Vec<u8>> {
    const FUNC: &str = "encode_jpeg_to_memory";
    let format = prepare_jpeg_encode(FUNC, pixels, width, height, colorspace, quality)?;
    translate_result(
        FUNC,
        encoder::encode_jpeg(pixels, width, height, format, quality),
    )
}

/// Visit the colorspaces the JPEG codec supports, highest first, until
/// `visitor` returns false.
pub fn foreach_supported_jpeg_colorspace<F>(visitor: F)
where
    F: FnMut(Colorspace) -> bool,
{
    colorspace::for_each_supported(ImageType::Jpeg, visitor);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| [(i * 5 % 256) as u8, (i * 11 % 256) as u8, 128])
            .collect()
    }

    #[test]
    fn buffer_size_rejects_zero() {
        assert_eq!(
            calculate_buffer_size(0, 4, Colorspace::Rgb888),
            Err(ImageUtilError::InvalidParameter)
        );
        assert_eq!(calculate_buffer_size(4, 2, Colorspace::Rgb888), Ok(24));
        assert_eq!(calculate_buffer_size(4, 2, Colorspace::I420), Ok(12));
    }

    #[test]
    fn conversion_to_same_layout_is_exact() {
        let src = rgb(3, 3);
        let out = convert_colorspace(&src, 3, 3, Colorspace::Rgb888, Colorspace::Rgb888).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn conversion_rejects_short_buffer() {
        assert_eq!(
            convert_colorspace(&[0u8; 5], 3, 3, Colorspace::Rgb888, Colorspace::Rgba8888),
            Err(ImageUtilError::InvalidParameter)
        );
    }

    #[test]
    fn resize_reports_new_size() {
        let out = resize(&rgb(8, 4), 8, 4, 4, 2, Colorspace::Rgb888).unwrap();
        assert_eq!((out.width, out.height), (4, 2));
        assert_eq!(out.data.len(), 4 * 2 * 3);
        assert_eq!(
            resize(&rgb(8, 4), 8, 4, 0, 2, Colorspace::Rgb888),
            Err(ImageUtilError::InvalidParameter)
        );
    }

    #[test]
    fn rotate_swaps_dimensions() {
        let out = rotate(&rgb(6, 2), 6, 2, Rotation::Rotate90, Colorspace::Rgb888).unwrap();
        assert_eq!((out.width, out.height), (2, 6));
        let flipped = rotate(&rgb(6, 2), 6, 2, Rotation::FlipVertical, Colorspace::Rgb888).unwrap();
        assert_eq!((flipped.width, flipped.height), (6, 2));
    }

    #[test]
    fn crop_bounds_are_local_errors() {
        let src = rgb(4, 4);
        assert_eq!(
            crop(&src, 4, 0, 1, 1, 4, 4, Colorspace::Rgb888),
            Err(ImageUtilError::InvalidParameter)
        );
        assert_eq!(
            crop(&src, 2, 2, 3, 1, 4, 4, Colorspace::Rgb888),
            Err(ImageUtilError::InvalidParameter)
        );
        let out = crop(&src, 1, 1, 2, 2, 4, 4, Colorspace::Rgb888).unwrap();
        assert_eq!(&out.data[..3], &src[(4 + 1) * 3..(4 + 1) * 3 + 3]);
    }

    #[test]
    fn jpeg_memory_round_trip() {
        let jpeg = encode_jpeg_to_memory(&rgb(16, 16), 16, 16, Colorspace::Rgb888, 90).unwrap();
        let out = decode_jpeg_from_memory(&jpeg, Colorspace::Rgb888).unwrap();
        assert_eq!((out.width, out.height), (16, 16));
        assert_eq!(
            out.size(),
            calculate_buffer_size(16, 16, Colorspace::Rgb888).unwrap()
        );
        let half =
            decode_jpeg_from_memory_with_downscale(&jpeg, Colorspace::Rgb888, Downscale::OneHalf)
                .unwrap();
        assert_eq!((half.width, half.height), (8, 8));
    }

    #[test]
    fn jpeg_rejects_unsupported_colorspace_and_empty_path() {
        assert_eq!(
            encode_jpeg_to_memory(&rgb(2, 2), 2, 2, Colorspace::Rgb565, 100),
            Err(ImageUtilError::NotSupportedFormat)
        );
        assert_eq!(
            decode_jpeg("", Colorspace::Rgb888),
            Err(ImageUtilError::NoSuchFile)
        );
        assert_eq!(
            encode_jpeg(&rgb(2, 2), 2, 2, Colorspace::Rgb888, 80, ""),
            Err(ImageUtilError::NoSuchFile)
        );
        assert_eq!(
            encode_jpeg_to_memory(&rgb(2, 2), 2, 2, Colorspace::Rgb888, 0),
            Err(ImageUtilError::InvalidParameter)
        );
    }

    #[test]
    fn foreach_jpeg_descends() {
        let mut seen = Vec::new();
        foreach_supported_jpeg_colorspace(|cs| {
            seen.push(cs.as_raw());
            true
        });
        assert!(seen.windows(2).all(|w| w[0] > w[1]));
        assert!(!seen.contains(&Colorspace::Rgb565.as_raw()));
    }
}
