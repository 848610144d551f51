// src/codecs/pixel.rs
//
// Native pixel layouts, buffer sizing and colorspace conversion.
//
// Every conversion pivots through RGBA8888. Channel reorders between the
// 8-bit RGB family are exact; RGB565 and the YCbCr layouts are lossy.
// YCbCr math is BT.601 full range in 14-bit fixed point.

use crate::error::EngineError;

type PixelResult<T> = std::result::Result<T, EngineError>;

/// Pixel layouts the conversion, geometry and codec layers operate on.
///
/// Discriminants are the native codes stored in the colorspace catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PixelFormat {
    Yv12 = 0,
    I420,
    Yuv422,
    Nv12,
    Nv21,
    Nv16,
    Nv61,
    Uyvy,
    Yuyv,
    Rgb565,
    Rgb888,
    Argb8888,
    Bgra8888,
    Rgba8888,
    Bgrx8888,
}

const ALL_FORMATS: [PixelFormat; 15] = [
    PixelFormat::Yv12,
    PixelFormat::I420,
    PixelFormat::Yuv422,
    PixelFormat::Nv12,
    PixelFormat::Nv21,
    PixelFormat::Nv16,
    PixelFormat::Nv61,
    PixelFormat::Uyvy,
    PixelFormat::Yuyv,
    PixelFormat::Rgb565,
    PixelFormat::Rgb888,
    PixelFormat::Argb8888,
    PixelFormat::Bgra8888,
    PixelFormat::Rgba8888,
    PixelFormat::Bgrx8888,
];

/// Tightly packed pixels in a known layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Repack into `target`, consuming self. No-op when already there.
    pub fn into_format(self, target: PixelFormat) -> PixelResult<PixelBuffer> {
        if self.format == target {
            return Ok(self);
        }
        let data = convert(&self.data, self.width, self.height, self.format, target)?;
        Ok(PixelBuffer {
            format: target,
            data,
            ..self
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChromaPacking {
    /// Separate Cb and Cr planes
    Planar { v_first: bool },
    /// One plane of interleaved chroma pairs
    SemiPlanar { v_first: bool },
    /// Luma and chroma interleaved per pixel pair
    Interleaved { luma_first: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct YuvLayout {
    packing: ChromaPacking,
    /// 4:2:0 when true, 4:2:2 otherwise
    vertical_subsampling: bool,
}

/// Single-plane RGB-family layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackedRgb {
    Rgb565,
    Rgb888,
    Argb8888,
    Bgra8888,
    Rgba8888,
    Bgrx8888,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Yuv(YuvLayout),
    Packed(PackedRgb),
}

impl PixelFormat {
    /// Decode a catalog entry. The unsupported sentinel maps to `None`.
    pub fn from_native(code: i32) -> Option<Self> {
        let index = usize::try_from(code).ok()?;
        ALL_FORMATS.get(index).copied()
    }

    fn layout(self) -> Layout {
        use ChromaPacking::*;
        let (packing, vertical_subsampling) = match self {
            PixelFormat::Yv12 => (Planar { v_first: true }, true),
            PixelFormat::I420 => (Planar { v_first: false }, true),
            PixelFormat::Yuv422 => (Planar { v_first: false }, false),
            PixelFormat::Nv12 => (SemiPlanar { v_first: false }, true),
            PixelFormat::Nv21 => (SemiPlanar { v_first: true }, true),
            PixelFormat::Nv16 => (SemiPlanar { v_first: false }, false),
            PixelFormat::Nv61 => (SemiPlanar { v_first: true }, false),
            PixelFormat::Uyvy => (Interleaved { luma_first: false }, false),
            PixelFormat::Yuyv => (Interleaved { luma_first: true }, false),
            PixelFormat::Rgb565 => return Layout::Packed(PackedRgb::Rgb565),
            PixelFormat::Rgb888 => return Layout::Packed(PackedRgb::Rgb888),
            PixelFormat::Argb8888 => return Layout::Packed(PackedRgb::Argb8888),
            PixelFormat::Bgra8888 => return Layout::Packed(PackedRgb::Bgra8888),
            PixelFormat::Rgba8888 => return Layout::Packed(PackedRgb::Rgba8888),
            PixelFormat::Bgrx8888 => return Layout::Packed(PackedRgb::Bgrx8888),
        };
        Layout::Yuv(YuvLayout {
            packing,
            vertical_subsampling,
        })
    }
}

impl PackedRgb {
    fn bytes_per_pixel(self) -> usize {
        match self {
            PackedRgb::Rgb565 => 2,
            PackedRgb::Rgb888 => 3,
            PackedRgb::Argb8888
            | PackedRgb::Bgra8888
            | PackedRgb::Rgba8888
            | PackedRgb::Bgrx8888 => 4,
        }
    }
}

fn chroma_dims(layout: YuvLayout, width: usize, height: usize) -> (usize, usize) {
    let chroma_width = width.div_ceil(2);
    let chroma_height = if layout.vertical_subsampling {
        height.div_ceil(2)
    } else {
        height
    };
    (chroma_width, chroma_height)
}

fn overflow(width: u32, height: u32) -> EngineError {
    EngineError::invalid_argument(
        "dimensions",
        format!("{width}x{height}"),
        "buffer size overflows usize",
    )
}

/// Byte size of a `width` x `height` image in `format`.
pub fn buffer_size(format: PixelFormat, width: u32, height: u32) -> PixelResult<usize> {
    if width == 0 || height == 0 {
        return Err(EngineError::invalid_argument(
            "dimensions",
            format!("{width}x{height}"),
            "width and height must be positive",
        ));
    }
    let (w, h) = (width as usize, height as usize);
    let luma = w.checked_mul(h).ok_or_else(|| overflow(width, height))?;

    let size = match format.layout() {
        Layout::Yuv(layout) => {
            let (cw, ch) = chroma_dims(layout, w, h);
            match layout.packing {
                ChromaPacking::Interleaved { .. } => cw
                    .checked_mul(4)
                    .and_then(|row| row.checked_mul(h)),
                _ => cw
                    .checked_mul(ch)
                    .and_then(|c| c.checked_mul(2))
                    .and_then(|c| c.checked_add(luma)),
            }
        }
        Layout::Packed(packed) => luma.checked_mul(packed.bytes_per_pixel()),
    };
    size.ok_or_else(|| overflow(width, height))
}

fn check_len(data: &[u8], expected: usize) -> PixelResult<()> {
    if data.len() < expected {
        return Err(EngineError::buffer_size_mismatch(expected, data.len()));
    }
    Ok(())
}

/// Convert a `width` x `height` image between two layouts.
pub fn convert(
    src: &[u8],
    width: u32,
    height: u32,
    from: PixelFormat,
    to: PixelFormat,
) -> PixelResult<Vec<u8>> {
    let expected = buffer_size(from, width, height)?;
    check_len(src, expected)?;
    if from == to {
        return Ok(src[..expected].to_vec());
    }
    let rgba = to_rgba(src, width, height, from)?;
    from_rgba(&rgba, width, height, to)
}

/// Expand any layout into tightly packed RGBA8888.
pub fn to_rgba(src: &[u8], width: u32, height: u32, format: PixelFormat) -> PixelResult<Vec<u8>> {
    let expected = buffer_size(format, width, height)?;
    check_len(src, expected)?;
    let src = &src[..expected];
    let (w, h) = (width as usize, height as usize);

    let packed = match format.layout() {
        Layout::Yuv(layout) => {
            let planes = unpack_planes(src, w, h, layout);
            return Ok(planes_to_rgba(&planes, w, h, layout));
        }
        Layout::Packed(packed) => packed,
    };

    let mut out = Vec::with_capacity(w * h * 4);
    match packed {
        PackedRgb::Rgba8888 => out.extend_from_slice(src),
        PackedRgb::Rgb888 => {
            for px in src.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        PackedRgb::Argb8888 => {
            for px in src.chunks_exact(4) {
                out.extend_from_slice(&[px[1], px[2], px[3], px[0]]);
            }
        }
        PackedRgb::Bgra8888 => {
            for px in src.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        PackedRgb::Bgrx8888 => {
            for px in src.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0], 255]);
            }
        }
        PackedRgb::Rgb565 => {
            for px in src.chunks_exact(2) {
                let v = u16::from_le_bytes([px[0], px[1]]);
                let r = ((v >> 11) & 0x1f) as u8;
                let g = ((v >> 5) & 0x3f) as u8;
                let b = (v & 0x1f) as u8;
                out.extend_from_slice(&[
                    (r << 3) | (r >> 2),
                    (g << 2) | (g >> 4),
                    (b << 3) | (b >> 2),
                    255,
                ]);
            }
        }
    }
    Ok(out)
}

/// Pack RGBA8888 into any layout.
pub fn from_rgba(rgba: &[u8], width: u32, height: u32, format: PixelFormat) -> PixelResult<Vec<u8>> {
    let expected = buffer_size(PixelFormat::Rgba8888, width, height)?;
    check_len(rgba, expected)?;
    let rgba = &rgba[..expected];
    let (w, h) = (width as usize, height as usize);

    let packed = match format.layout() {
        Layout::Yuv(layout) => {
            let planes = rgba_to_planes(rgba, w, h, layout);
            return Ok(pack_planes(&planes, w, h, layout));
        }
        Layout::Packed(packed) => packed,
    };

    let mut out = Vec::with_capacity(w * h * packed.bytes_per_pixel());
    match packed {
        PackedRgb::Rgba8888 => out.extend_from_slice(rgba),
        PackedRgb::Rgb888 => {
            for px in rgba.chunks_exact(4) {
                out.extend_from_slice(&px[..3]);
            }
        }
        PackedRgb::Argb8888 => {
            for px in rgba.chunks_exact(4) {
                out.extend_from_slice(&[px[3], px[0], px[1], px[2]]);
            }
        }
        PackedRgb::Bgra8888 => {
            for px in rgba.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        PackedRgb::Bgrx8888 => {
            for px in rgba.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0], 255]);
            }
        }
        PackedRgb::Rgb565 => {
            for px in rgba.chunks_exact(4) {
                let v = (u16::from(px[0] >> 3) << 11)
                    | (u16::from(px[1] >> 2) << 5)
                    | u16::from(px[2] >> 3);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    Ok(out)
}

// BT.601 full range, 14-bit fixed point.
const YUV_PREC: i32 = 14;
const YUV_RND: i32 = (1 << (YUV_PREC - 1)) - 1;

const Y_R: i32 = 4899;
const Y_G: i32 = 9617;
const Y_B: i32 = 1868;
const CB_R: i32 = -2765;
const CB_G: i32 = -5427;
const CB_B: i32 = 8192;
const CR_R: i32 = 8192;
const CR_G: i32 = -6860;
const CR_B: i32 = -1332;

const Y_CF: i32 = 16384;
const CR_CF: i32 = 22970;
const CB_CF: i32 = 29032;
const C_G_CR_COEF: i32 = -11700;
const C_G_CB_COEF: i32 = -5638;

#[inline]
fn clamp(a: i32) -> u8 {
    a.clamp(0, 255) as u8
}

#[inline]
fn luma(r: i32, g: i32, b: i32) -> u8 {
    clamp((Y_R * r + Y_G * g + Y_B * b + YUV_RND) >> YUV_PREC)
}

#[inline]
fn chroma(r: i32, g: i32, b: i32) -> (u8, u8) {
    let cb = ((CB_R * r + CB_G * g + CB_B * b + YUV_RND) >> YUV_PREC) + 128;
    let cr = ((CR_R * r + CR_G * g + CR_B * b + YUV_RND) >> YUV_PREC) + 128;
    (clamp(cb), clamp(cr))
}

#[inline]
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;
    let y0 = i32::from(y) * Y_CF + YUV_RND;
    [
        clamp((y0 + cr * CR_CF) >> YUV_PREC),
        clamp((y0 + cr * C_G_CR_COEF + cb * C_G_CB_COEF) >> YUV_PREC),
        clamp((y0 + cb * CB_CF) >> YUV_PREC),
    ]
}

struct Planes {
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
    chroma_width: usize,
}

fn rgba_to_planes(rgba: &[u8], w: usize, h: usize, layout: YuvLayout) -> Planes {
    let (cw, ch) = chroma_dims(layout, w, h);
    let rows_per_block = if layout.vertical_subsampling { 2 } else { 1 };

    let y = rgba
        .chunks_exact(4)
        .map(|px| luma(px[0].into(), px[1].into(), px[2].into()))
        .collect();

    let mut u = Vec::with_capacity(cw * ch);
    let mut v = Vec::with_capacity(cw * ch);
    for cy in 0..ch {
        for cx in 0..cw {
            let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
            for row in (cy * rows_per_block)..((cy + 1) * rows_per_block).min(h) {
                for col in (cx * 2)..((cx + 1) * 2).min(w) {
                    let px = &rgba[(row * w + col) * 4..][..4];
                    r += i32::from(px[0]);
                    g += i32::from(px[1]);
                    b += i32::from(px[2]);
                    n += 1;
                }
            }
            let (cb, cr) = chroma((r + n / 2) / n, (g + n / 2) / n, (b + n / 2) / n);
            u.push(cb);
            v.push(cr);
        }
    }

    Planes {
        y,
        u,
        v,
        chroma_width: cw,
    }
}

fn planes_to_rgba(planes: &Planes, w: usize, h: usize, layout: YuvLayout) -> Vec<u8> {
    let rows_per_block = if layout.vertical_subsampling { 2 } else { 1 };
    let mut out = Vec::with_capacity(w * h * 4);
    for row in 0..h {
        let chroma_row = (row / rows_per_block) * planes.chroma_width;
        for col in 0..w {
            let c = chroma_row + col / 2;
            let [r, g, b] = ycbcr_to_rgb(planes.y[row * w + col], planes.u[c], planes.v[c]);
            out.extend_from_slice(&[r, g, b, 255]);
        }
    }
    out
}

fn pack_planes(planes: &Planes, w: usize, h: usize, layout: YuvLayout) -> Vec<u8> {
    let cw = planes.chroma_width;
    match layout.packing {
        ChromaPacking::Planar { v_first } => {
            let (first, second) = if v_first {
                (&planes.v, &planes.u)
            } else {
                (&planes.u, &planes.v)
            };
            let mut out = Vec::with_capacity(planes.y.len() + first.len() * 2);
            out.extend_from_slice(&planes.y);
            out.extend_from_slice(first);
            out.extend_from_slice(second);
            out
        }
        ChromaPacking::SemiPlanar { v_first } => {
            let mut out = Vec::with_capacity(planes.y.len() + planes.u.len() * 2);
            out.extend_from_slice(&planes.y);
            for (&cb, &cr) in planes.u.iter().zip(&planes.v) {
                if v_first {
                    out.extend_from_slice(&[cr, cb]);
                } else {
                    out.extend_from_slice(&[cb, cr]);
                }
            }
            out
        }
        ChromaPacking::Interleaved { luma_first } => {
            let mut out = Vec::with_capacity(cw * 4 * h);
            for row in 0..h {
                for pair in 0..cw {
                    let x0 = pair * 2;
                    let y0 = planes.y[row * w + x0];
                    let y1 = if x0 + 1 < w {
                        planes.y[row * w + x0 + 1]
                    } else {
                        y0
                    };
                    let cb = planes.u[row * cw + pair];
                    let cr = planes.v[row * cw + pair];
                    if luma_first {
                        out.extend_from_slice(&[y0, cb, y1, cr]);
                    } else {
                        out.extend_from_slice(&[cb, y0, cr, y1]);
                    }
                }
            }
            out
        }
    }
}

fn unpack_planes(src: &[u8], w: usize, h: usize, layout: YuvLayout) -> Planes {
    let (cw, ch) = chroma_dims(layout, w, h);
    let luma_len = w * h;
    let chroma_len = cw * ch;

    match layout.packing {
        ChromaPacking::Planar { v_first } => {
            let first = &src[luma_len..luma_len + chroma_len];
            let second = &src[luma_len + chroma_len..luma_len + chroma_len * 2];
            let (u, v) = if v_first {
                (second, first)
            } else {
                (first, second)
            };
            Planes {
                y: src[..luma_len].to_vec(),
                u: u.to_vec(),
                v: v.to_vec(),
                chroma_width: cw,
            }
        }
        ChromaPacking::SemiPlanar { v_first } => {
            let pairs = &src[luma_len..luma_len + chroma_len * 2];
            let (mut u, mut v) = (Vec::with_capacity(chroma_len), Vec::with_capacity(chroma_len));
            for pair in pairs.chunks_exact(2) {
                let (cb, cr) = if v_first {
                    (pair[1], pair[0])
                } else {
                    (pair[0], pair[1])
                };
                u.push(cb);
                v.push(cr);
            }
            Planes {
                y: src[..luma_len].to_vec(),
                u,
                v,
                chroma_width: cw,
            }
        }
        ChromaPacking::Interleaved { luma_first } => {
            let mut y = vec![0u8; luma_len];
            let (mut u, mut v) = (Vec::with_capacity(chroma_len), Vec::with_capacity(chroma_len));
            for row in 0..h {
                for pair in 0..cw {
                    let quad = &src[(row * cw + pair) * 4..][..4];
                    let (y0, cb, y1, cr) = if luma_first {
                        (quad[0], quad[1], quad[2], quad[3])
                    } else {
                        (quad[1], quad[0], quad[3], quad[2])
                    };
                    let x0 = pair * 2;
                    y[row * w + x0] = y0;
                    if x0 + 1 < w {
                        y[row * w + x0 + 1] = y1;
                    }
                    u.push(cb);
                    v.push(cr);
                }
            }
            Planes {
                y,
                u,
                v,
                chroma_width: cw,
            }
        }
    }
}
