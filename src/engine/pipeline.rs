// src/engine/pipeline.rs
//
// Geometric primitives (resize, rotate/flip, crop) and transform execution.
//
// Geometry always runs on RGBA8888; apply_ops unpacks once, applies every
// geometric step, then packs into the output layout.

use crate::codecs::pixel::{self, PixelBuffer, PixelFormat};
use crate::colorspace::{self, ColorspaceTable};
use crate::engine::common::{run_with_panic_policy, EngineResult};
use crate::error::EngineError;
use crate::ops::{Operation, Rotation};
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::{imageops, RgbaImage};
use tracing::{debug, warn};

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

fn to_image(rgba: Vec<u8>, width: u32, height: u32) -> EngineResult<RgbaImage> {
    let actual = rgba.len();
    RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        EngineError::buffer_size_mismatch(width as usize * height as usize * 4, actual)
    })
}

/// Resize an RGBA8888 buffer with fast_image_resize (Lanczos3).
///
/// Falls back to the image crate's resampler if fir rejects the buffer.
pub fn resize(
    rgba: Vec<u8>,
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
) -> EngineResult<Vec<u8>> {
    let src = (src_width, src_height);
    let dst = (dst_width, dst_height);
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(EngineError::resize_failed(src, dst, "invalid dimensions for resize"));
    }
    if src == dst {
        return Ok(rgba);
    }

    run_with_panic_policy("pipeline:resize", || {
        match fir_resize(rgba.clone(), src, dst) {
            Ok(pixels) => Ok(pixels),
            Err(reason) => {
                warn!(target: "image_util", %reason, "fir resize failed, using image crate");
                let img = to_image(rgba, src_width, src_height)?;
                Ok(imageops::resize(&img, dst_width, dst_height, imageops::FilterType::Lanczos3)
                    .into_raw())
            }
        }
    })
}

fn fir_resize(
    src_pixels: Vec<u8>,
    (src_width, src_height): (u32, u32),
    (dst_width, dst_height): (u32, u32),
) -> std::result::Result<Vec<u8>, String> {
    let needs_premultiply = src_pixels.iter().skip(3).step_by(4).any(|&a| a != 255);

    let mut src_image =
        fir::images::Image::from_vec_u8(src_width, src_height, src_pixels, PixelType::U8x4)
            .map_err(|e| format!("fir source image error: {e:?}"))?;
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, PixelType::U8x4);

    let mul_div = MulDiv::default();
    if needs_premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &default_resize_options())
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if needs_premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }
    Ok(dst_image.into_vec())
}

/// Rotate or flip an RGBA8888 buffer. Returns the new buffer and size.
pub fn rotate(
    rgba: Vec<u8>,
    width: u32,
    height: u32,
    rotation: Rotation,
) -> EngineResult<(Vec<u8>, u32, u32)> {
    if rotation == Rotation::None {
        return Ok((rgba, width, height));
    }
    let img = to_image(rgba, width, height)?;
    let out = match rotation {
        Rotation::None => img,
        Rotation::Rotate90 => imageops::rotate90(&img),
        Rotation::Rotate180 => imageops::rotate180(&img),
        Rotation::Rotate270 => imageops::rotate270(&img),
        Rotation::FlipHorizontal => imageops::flip_horizontal(&img),
        Rotation::FlipVertical => imageops::flip_vertical(&img),
    };
    let (w, h) = out.dimensions();
    Ok((out.into_raw(), w, h))
}

/// Cut `width` x `height` at (`x`, `y`) out of an RGBA8888 buffer.
pub fn crop(
    rgba: Vec<u8>,
    img_width: u32,
    img_height: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> EngineResult<Vec<u8>> {
    let fits = width > 0
        && height > 0
        && x.checked_add(width).is_some_and(|r| r <= img_width)
        && y.checked_add(height).is_some_and(|b| b <= img_height);
    if !fits {
        return Err(EngineError::invalid_crop_bounds(
            x, y, width, height, img_width, img_height,
        ));
    }
    if (x, y, width, height) == (0, 0, img_width, img_height) {
        return Ok(rgba);
    }
    let img = to_image(rgba, img_width, img_height)?;
    Ok(imageops::crop_imm(&img, x, y, width, height)
        .to_image()
        .into_raw())
}

/// Output size after applying `ops` to a `width` x `height` image.
///
/// Follows the execution order of [`apply_ops`], not the slice order.
pub fn output_dimensions(ops: &[Operation], width: u32, height: u32) -> (u32, u32) {
    let mut cropped = None;
    let mut resized = None;
    let mut rotation = Rotation::None;
    for op in ops {
        match *op {
            Operation::Crop { width, height, .. } => cropped = Some((width, height)),
            Operation::Resize { width, height } => resized = Some((width, height)),
            Operation::Rotate { rotation: r } => rotation = r,
            Operation::Convert { .. } => {}
        }
    }
    let (w, h) = resized.or(cropped).unwrap_or((width, height));
    if rotation.swaps_dimensions() {
        (h, w)
    } else {
        (w, h)
    }
}

/// Apply transform operations in the order crop, resize, rotate, convert.
///
/// Without a Convert step the result keeps the input layout.
pub fn apply_ops(image: PixelBuffer, ops: &[Operation]) -> EngineResult<PixelBuffer> {
    let mut target = image.format;
    let mut crop_op = None;
    let mut resize_op = None;
    let mut rotation = Rotation::None;
    for op in ops {
        match *op {
            Operation::Crop { .. } => crop_op = Some(op.clone()),
            Operation::Resize { .. } => resize_op = Some(op.clone()),
            Operation::Rotate { rotation: r } => rotation = r,
            Operation::Convert { target: cs } => {
                target = colorspace::lookup(cs, ColorspaceTable::Transform).ok_or_else(|| {
                    EngineError::unsupported_colorspace(cs.name(), "transform")
                })?;
            }
        }
    }

    let geometric = crop_op.is_some() || resize_op.is_some() || rotation != Rotation::None;
    if !geometric {
        return image.into_format(target);
    }

    let PixelBuffer {
        mut width,
        mut height,
        format,
        data,
    } = image;
    let mut rgba = pixel::to_rgba(&data, width, height, format)?;
    drop(data);

    if let Some(Operation::Crop {
        x,
        y,
        width: w,
        height: h,
    }) = crop_op
    {
        rgba = crop(rgba, width, height, x, y, w, h)?;
        (width, height) = (w, h);
    }
    if let Some(Operation::Resize { width: w, height: h }) = resize_op {
        rgba = resize(rgba, width, height, w, h)?;
        (width, height) = (w, h);
    }
    if rotation != Rotation::None {
        (rgba, width, height) = rotate(rgba, width, height, rotation)?;
    }
    debug!(target: "image_util", width, height, ?target, "transformed");

    let data = if target == PixelFormat::Rgba8888 {
        rgba
    } else {
        pixel::from_rgba(&rgba, width, height, target)?
    };
    Ok(PixelBuffer {
        width,
        height,
        format: target,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colorspace::Colorspace;

    /// 2x2 image: red, green / blue, white
    fn quad() -> Vec<u8> {
        vec![
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ]
    }

    fn px(data: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * width + x) * 4) as usize;
        [data[i], data[i + 1], data[i + 2], data[i + 3]]
    }

    #[test]
    fn rotate_90_moves_corners_clockwise() {
        let (out, w, h) = rotate(quad(), 2, 2, Rotation::Rotate90).unwrap();
        assert_eq!((w, h), (2, 2));
        assert_eq!(px(&out, w, 0, 0), [0, 0, 255, 255]);
        assert_eq!(px(&out, w, 1, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn rotate_swaps_dimensions() {
        let data = vec![0u8; 3 * 2 * 4];
        let (_, w, h) = rotate(data.clone(), 3, 2, Rotation::Rotate270).unwrap();
        assert_eq!((w, h), (2, 3));
        let (_, w, h) = rotate(data, 3, 2, Rotation::Rotate180).unwrap();
        assert_eq!((w, h), (3, 2));
    }

    #[test]
    fn flips_mirror_axes() {
        let (out, w, _) = rotate(quad(), 2, 2, Rotation::FlipHorizontal).unwrap();
        assert_eq!(px(&out, w, 0, 0), [0, 255, 0, 255]);
        let (out, w, _) = rotate(quad(), 2, 2, Rotation::FlipVertical).unwrap();
        assert_eq!(px(&out, w, 0, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn crop_extracts_region() {
        let out = crop(quad(), 2, 2, 1, 1, 1, 1).unwrap();
        assert_eq!(out, vec![255, 255, 255, 255]);
    }

    #[test]
    fn crop_out_of_bounds_fails() {
        assert!(matches!(
            crop(quad(), 2, 2, 1, 1, 2, 1),
            Err(EngineError::InvalidCropBounds { .. })
        ));
        assert!(crop(quad(), 2, 2, 0, 0, 0, 1).is_err());
        assert!(crop(quad(), 2, 2, u32::MAX, 0, 1, 1).is_err());
    }

    #[test]
    fn resize_changes_dimensions() {
        let src = [10u8, 20, 30, 255].repeat(8 * 8);
        let out = resize(src, 8, 8, 3, 5).unwrap();
        assert_eq!(out.len(), 3 * 5 * 4);
        assert!(out.chunks_exact(4).all(|p| (p[0] as i32 - 10).abs() <= 1));
    }

    #[test]
    fn resize_rejects_zero() {
        assert!(matches!(
            resize(vec![0; 4], 1, 1, 0, 1),
            Err(EngineError::ResizeFailed { .. })
        ));
    }

    #[test]
    fn apply_ops_order_and_convert() {
        let image = PixelBuffer {
            width: 4,
            height: 2,
            format: PixelFormat::Rgba8888,
            data: [50u8, 60, 70, 255].repeat(8),
        };
        let ops = [
            Operation::Convert {
                target: Colorspace::Rgb888,
            },
            Operation::Rotate {
                rotation: Rotation::Rotate90,
            },
            Operation::Crop {
                x: 0,
                y: 0,
                width: 2,
                height: 2,
            },
            Operation::Resize {
                width: 4,
                height: 6,
            },
        ];
        let out = apply_ops(image, &ops).unwrap();
        // crop 2x2, resize 4x6, rotate 90 -> 6x4
        assert_eq!((out.width, out.height), (6, 4));
        assert_eq!(out.format, PixelFormat::Rgb888);
        assert_eq!(out.data.len(), 6 * 4 * 3);
        assert_eq!(output_dimensions(&ops, 4, 2), (6, 4));
    }

    #[test]
    fn apply_ops_convert_only_is_direct() {
        let image = PixelBuffer {
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8888,
            data: quad(),
        };
        let out = apply_ops(
            image,
            &[Operation::Convert {
                target: Colorspace::Bgra8888,
            }],
        )
        .unwrap();
        assert_eq!(&out.data[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn apply_ops_keeps_yuv_layout_without_convert() {
        let rgba = [128u8, 128, 128, 255].repeat(16);
        let nv12 = pixel::from_rgba(&rgba, 4, 4, PixelFormat::Nv12).unwrap();
        let image = PixelBuffer {
            width: 4,
            height: 4,
            format: PixelFormat::Nv12,
            data: nv12,
        };
        let out = apply_ops(
            image,
            &[Operation::Rotate {
                rotation: Rotation::FlipVertical,
            }],
        )
        .unwrap();
        assert_eq!(out.format, PixelFormat::Nv12);
        assert_eq!(out.data.len(), 24);
    }
}
