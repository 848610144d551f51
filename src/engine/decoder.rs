// src/engine/decoder.rs
//
// Decoder operations: signature sniffing, JPEG (mozjpeg), PNG (zune-png),
// GIF and BMP (image crate).
//
// Every primitive yields tightly packed pixels; `decode` then repacks them
// into the layout the caller asked for.

use crate::codecs::pixel::{self, PixelBuffer, PixelFormat};
use crate::colorspace::ImageType;
use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::EngineError;
use crate::ops::Downscale;
use image::{ImageFormat, ImageReader};
use mozjpeg::Decompress;
use std::io::Cursor;
use tracing::debug;
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

/// Magic-byte signatures, in match precedence order.
const SIGNATURES: [(ImageType, &[u8]); 4] = [
    (ImageType::Jpeg, &[0xFF, 0xD8]),
    (ImageType::Png, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
    (ImageType::Gif, b"GIF"),
    (ImageType::Bmp, b"BM"),
];

/// Bytes needed to match the longest signature.
pub const SIGNATURE_LEN: usize = 8;

/// Detect the encoded format from leading bytes. First match wins.
pub fn detect_format(header: &[u8]) -> Option<ImageType> {
    SIGNATURES
        .iter()
        .find(|(_, magic)| header.starts_with(magic))
        .map(|(image_type, _)| *image_type)
}

/// Decode `data` as `image_type`, delivering pixels in `target`.
///
/// `downscale` is honoured for JPEG only; other formats always decode at
/// full size.
pub fn decode(
    image_type: ImageType,
    data: &[u8],
    target: PixelFormat,
    downscale: Downscale,
) -> EngineResult<PixelBuffer> {
    if data.is_empty() {
        return Err(EngineError::no_decoded_data());
    }
    let decoded = match image_type {
        ImageType::Jpeg => decode_jpeg_mozjpeg(data, downscale)?,
        ImageType::Png => decode_png_zune(data)?,
        ImageType::Gif => decode_with_image_crate(data, ImageFormat::Gif)?,
        ImageType::Bmp => decode_with_image_crate(data, ImageFormat::Bmp)?,
    };
    if decoded.data.is_empty() {
        return Err(EngineError::no_decoded_data());
    }
    debug!(
        target: "image_util",
        format = %image_type,
        width = decoded.width,
        height = decoded.height,
        "decoded"
    );
    decoded.into_format(target)
}

/// Decode JPEG using mozjpeg, scaling in the DCT domain when asked to.
pub fn decode_jpeg_mozjpeg(data: &[u8], downscale: Downscale) -> EngineResult<PixelBuffer> {
    run_with_panic_policy("decode:mozjpeg", || {
        let mut decompress = Decompress::new_mem(data).map_err(|e| {
            EngineError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;

        check_dimensions(decompress.width() as u32, decompress.height() as u32)?;
        if downscale != Downscale::OneOne {
            decompress.scale(downscale.numerator());
        }

        let mut decompress = decompress.rgb().map_err(|e| {
            EngineError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = decompress.width() as u32;
        let height = decompress.height() as u32;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            EngineError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;
        let data: Vec<u8> = pixels.into_iter().flatten().collect();

        let expected = pixel::buffer_size(PixelFormat::Rgb888, width, height)?;
        if data.len() != expected {
            return Err(EngineError::decode_failed(format!(
                "mozjpeg: got {} bytes for {width}x{height}",
                data.len()
            )));
        }

        Ok(PixelBuffer {
            width,
            height,
            format: PixelFormat::Rgb888,
            data,
        })
    })
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8-bit.
pub fn decode_png_zune(data: &[u8]) -> EngineResult<PixelBuffer> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        decoder
            .decode_headers()
            .map_err(|e| EngineError::decode_failed(format!("png: bad header: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| EngineError::decode_failed("png: missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let pixels = decoder
            .decode()
            .map_err(|e| EngineError::decode_failed(format!("png: decode failed: {e}")))?;
        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(EngineError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| EngineError::decode_failed("png: missing colorspace"))?;

        let (format, data) = match colorspace {
            ColorSpace::RGB => (PixelFormat::Rgb888, buf),
            ColorSpace::RGBA => (PixelFormat::Rgba8888, buf),
            ColorSpace::Luma => (
                PixelFormat::Rgba8888,
                buf.iter().flat_map(|&l| [l, l, l, 255]).collect(),
            ),
            ColorSpace::LumaA => (
                PixelFormat::Rgba8888,
                buf.chunks_exact(2)
                    .flat_map(|la| [la[0], la[0], la[0], la[1]])
                    .collect(),
            ),
            other => {
                return Err(EngineError::decode_failed(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };

        Ok(PixelBuffer {
            width,
            height,
            format,
            data,
        })
    })
}

/// Decode GIF (first frame) or BMP using the image crate.
pub fn decode_with_image_crate(data: &[u8], format: ImageFormat) -> EngineResult<PixelBuffer> {
    ensure_dimensions_safe(data, format)?;
    run_with_panic_policy("decode:image", || {
        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| EngineError::decode_failed(format!("{format:?}: decode failed: {e}")))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(PixelBuffer {
            width,
            height,
            format: PixelFormat::Rgba8888,
            data: rgba.into_raw(),
        })
    })
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> EngineResult<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(EngineError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(EngineError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Read the header dimensions and ensure they are safe before decoding.
fn ensure_dimensions_safe(bytes: &[u8], format: ImageFormat) -> EngineResult<()> {
    let mut reader = ImageReader::new(Cursor::new(bytes));
    reader.set_format(format);
    match reader.into_dimensions() {
        Ok((width, height)) => check_dimensions(width, height),
        Err(e) => Err(EngineError::decode_failed(format!(
            "{format:?}: failed to read dimensions: {e}"
        ))),
    }
}
