// src/engine/encoder.rs
//
// Encoder operations: JPEG (mozjpeg), PNG (image + oxipng), animated GIF and
// BMP (image crate).

use crate::codecs::pixel::{self, PixelFormat};
use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::engine::decoder::check_dimensions;
use crate::error::EngineError;
use crate::ops::PngCompression;
use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{Delay, ExtendedColorType, Frame, ImageEncoder, RgbaImage};
use mozjpeg::{ColorSpace, Compress};

/// One frame of an animated GIF, as RGBA8888.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifFrame {
    pub width: u32,
    pub height: u32,
    /// Display time in 1/100 s
    pub delay: u32,
    pub rgba: Vec<u8>,
}

fn validate_input(data: &[u8], width: u32, height: u32, format: PixelFormat) -> EngineResult<()> {
    check_dimensions(width, height)?;
    let expected = pixel::buffer_size(format, width, height)?;
    if data.len() < expected {
        return Err(EngineError::buffer_size_mismatch(expected, data.len()));
    }
    Ok(())
}

/// Encode to JPEG using mozjpeg with 4:2:0 chroma subsampling.
pub fn encode_jpeg(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    quality: u8,
) -> EngineResult<Vec<u8>> {
    validate_input(data, width, height, format)?;
    let rgb = pixel::convert(data, width, height, format, PixelFormat::Rgb888)?;

    run_with_panic_policy("encode:jpeg", || {
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(f32::from(quality.clamp(1, 100)));
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));

        let estimated_size = (width as usize * height as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);
        {
            let mut writer = comp.start_compress(&mut output).map_err(|e| {
                EngineError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to start compress: {e:?}"),
                )
            })?;

            let stride = width as usize * 3;
            for row in rgb.chunks(stride) {
                writer.write_scanlines(row).map_err(|e| {
                    EngineError::encode_failed(
                        "jpeg",
                        format!("mozjpeg: failed to write scanlines: {e:?}"),
                    )
                })?;
            }

            writer.finish().map_err(|e| {
                EngineError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
            })?;
        }
        Ok(output)
    })
}

fn png_compression_type(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// oxipng preset for the top compression levels; lower levels skip it.
fn oxipng_preset(level: u8) -> Option<u8> {
    match level {
        7 => Some(2),
        8 => Some(4),
        9 => Some(6),
        _ => None,
    }
}

/// Encode RGBA8888 to PNG.
pub fn encode_png(
    rgba: &[u8],
    width: u32,
    height: u32,
    compression: PngCompression,
) -> EngineResult<Vec<u8>> {
    validate_input(rgba, width, height, PixelFormat::Rgba8888)?;
    let len = pixel::buffer_size(PixelFormat::Rgba8888, width, height)?;

    run_with_panic_policy("encode:png", || {
        let level = compression.level();
        let mut buf = Vec::new();
        PngEncoder::new_with_quality(&mut buf, png_compression_type(level), FilterType::Adaptive)
            .write_image(&rgba[..len], width, height, ExtendedColorType::Rgba8)
            .map_err(|e| EngineError::encode_failed("png", format!("PNG encode failed: {e}")))?;

        let Some(preset) = oxipng_preset(level) else {
            return Ok(buf);
        };
        let mut options = oxipng::Options::from_preset(preset);
        options.strip = oxipng::StripChunks::None;
        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            EngineError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

/// Encode an animation. The first frame fixes the logical screen size;
/// later frames are placed at the top-left corner.
pub fn encode_gif(frames: &[GifFrame]) -> EngineResult<Vec<u8>> {
    let Some(first) = frames.first() else {
        return Err(EngineError::invalid_argument(
            "frames",
            "0",
            "at least one frame is required",
        ));
    };
    for frame in frames {
        validate_input(&frame.rgba, frame.width, frame.height, PixelFormat::Rgba8888)?;
        if frame.width > first.width || frame.height > first.height {
            return Err(EngineError::invalid_argument(
                "frame",
                format!("{}x{}", frame.width, frame.height),
                format!("exceeds canvas {}x{}", first.width, first.height),
            ));
        }
    }

    run_with_panic_policy("encode:gif", || {
        let mut output = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut output);
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| EngineError::encode_failed("gif", e.to_string()))?;
            let mut converted = Vec::with_capacity(frames.len());
            for frame in frames {
                let len = pixel::buffer_size(PixelFormat::Rgba8888, frame.width, frame.height)?;
                let buffer = RgbaImage::from_raw(frame.width, frame.height, frame.rgba[..len].to_vec())
                    .ok_or_else(|| EngineError::encode_failed("gif", "frame buffer too small"))?;
                let delay = Delay::from_numer_denom_ms(frame.delay.saturating_mul(10), 1);
                converted.push(Frame::from_parts(buffer, 0, 0, delay));
            }
            encoder
                .encode_frames(converted)
                .map_err(|e| EngineError::encode_failed("gif", e.to_string()))?;
        }
        Ok(output)
    })
}

/// Encode RGBA8888 to a 32-bit BMP.
pub fn encode_bmp(rgba: &[u8], width: u32, height: u32) -> EngineResult<Vec<u8>> {
    validate_input(rgba, width, height, PixelFormat::Rgba8888)?;
    let len = pixel::buffer_size(PixelFormat::Rgba8888, width, height)?;

    run_with_panic_policy("encode:bmp", || {
        let mut output = Vec::new();
        BmpEncoder::new(&mut output)
            .write_image(&rgba[..len], width, height, ExtendedColorType::Rgba8)
            .map_err(|e| EngineError::encode_failed("bmp", e.to_string()))?;
        Ok(output)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decoder;
    use crate::ops::Downscale;
    use crate::colorspace::ImageType;

    fn rgba(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| [(i * 7 % 256) as u8, (i * 13 % 256) as u8, 90, 255])
            .collect()
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg() {
        let data = rgba(16, 8);
        let jpeg = encode_jpeg(&data, 16, 8, PixelFormat::Rgba8888, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded =
            decoder::decode(ImageType::Jpeg, &jpeg, PixelFormat::Rgb888, Downscale::OneOne)
                .unwrap();
        assert_eq!((decoded.width, decoded.height), (16, 8));
    }

    #[test]
    fn test_encode_jpeg_from_yuv() {
        let rgba = [120u8, 60, 30, 255].repeat(8 * 8);
        let nv12 = pixel::from_rgba(&rgba, 8, 8, PixelFormat::Nv12).unwrap();
        let jpeg = encode_jpeg(&nv12, 8, 8, PixelFormat::Nv12, 100).unwrap();
        let decoded =
            decoder::decode(ImageType::Jpeg, &jpeg, PixelFormat::Rgb888, Downscale::OneOne)
                .unwrap();
        assert!((decoded.data[0] as i32 - 120).abs() <= 6);
    }

    #[test]
    fn test_quality_affects_size() {
        let data = rgba(64, 64);
        let low = encode_jpeg(&data, 64, 64, PixelFormat::Rgba8888, 10).unwrap();
        let high = encode_jpeg(&data, 64, 64, PixelFormat::Rgba8888, 100).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_encode_png_is_lossless() {
        let data = rgba(7, 5);
        for level in [0, 6, 9] {
            let png =
                encode_png(&data, 7, 5, PngCompression::try_from(level).unwrap()).unwrap();
            let decoded =
                decoder::decode(ImageType::Png, &png, PixelFormat::Rgba8888, Downscale::OneOne)
                    .unwrap();
            assert_eq!(decoded.data, data, "level {level}");
        }
    }

    #[test]
    fn test_encode_bmp_round_trip() {
        let data = rgba(3, 2);
        let bmp = encode_bmp(&data, 3, 2).unwrap();
        assert_eq!(&bmp[..2], b"BM");
        let decoded =
            decoder::decode(ImageType::Bmp, &bmp, PixelFormat::Rgba8888, Downscale::OneOne)
                .unwrap();
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn test_encode_gif_frames() {
        let frames = vec![
            GifFrame {
                width: 4,
                height: 4,
                delay: 10,
                rgba: [255, 0, 0, 255].repeat(16),
            },
            GifFrame {
                width: 2,
                height: 2,
                delay: 20,
                rgba: [0, 0, 255, 255].repeat(4),
            },
        ];
        let gif = encode_gif(&frames).unwrap();
        assert_eq!(&gif[..3], b"GIF");
        let decoded =
            decoder::decode(ImageType::Gif, &gif, PixelFormat::Rgba8888, Downscale::OneOne)
                .unwrap();
        assert_eq!((decoded.width, decoded.height), (4, 4));
    }

    #[test]
    fn test_encode_gif_rejects_larger_frame() {
        let frames = vec![
            GifFrame {
                width: 2,
                height: 2,
                delay: 0,
                rgba: vec![0; 16],
            },
            GifFrame {
                width: 3,
                height: 2,
                delay: 0,
                rgba: vec![0; 24],
            },
        ];
        assert!(matches!(
            encode_gif(&frames),
            Err(EngineError::InvalidArgument { .. })
        ));
        assert!(encode_gif(&[]).is_err());
    }

    #[test]
    fn test_short_input_rejected() {
        let err = encode_bmp(&[0; 8], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            EngineError::BufferSizeMismatch {
                expected: 16,
                actual: 8
            }
        ));
    }
}
