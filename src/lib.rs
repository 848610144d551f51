// src/lib.rs
//
// image-util: handle-based image decode, encode, colorspace conversion and
// geometric transforms.
//
// Layout:
// - colorspace: public colorspace enum and per-format support catalog
// - error: public error taxonomy and the internal-to-public translator
// - ops: transform operations and codec parameters
// - codecs: native pixel layouts and conversion math
// - engine: decode/encode/transform handles and stateless entry points

pub mod codecs;
pub mod colorspace;
pub mod engine;
pub mod error;
pub mod ops;

pub use colorspace::{Colorspace, ColorspaceTable, ImageType};
pub use engine::api::{
    calculate_buffer_size, convert_colorspace, crop, decode_jpeg, decode_jpeg_from_memory,
    decode_jpeg_from_memory_with_downscale, decode_jpeg_with_downscale, encode_jpeg,
    encode_jpeg_to_memory, foreach_supported_jpeg_colorspace, resize, rotate,
};
pub use engine::{
    CropArea, DecodeHandle, DecodeInfo, EncodeHandle, OutputBuffer, TransformHandle,
};
pub use error::{ErrorCode, ImageUtilError, Result};
pub use ops::{Downscale, PngCompression, Rotation};

/// Uncompressed image in one of the public colorspaces.
///
/// Source and result of transforms, and result of the stateless decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub colorspace: Colorspace,
    pub data: Vec<u8>,
}

impl RawImage {
    pub fn new(width: u32, height: u32, colorspace: Colorspace, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            colorspace,
            data,
        }
    }

    /// Byte size of the pixel data.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Get library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Encoded formats accepted by the decoder, in sniffing order.
pub fn supported_input_formats() -> [ImageType; 4] {
    [ImageType::Jpeg, ImageType::Png, ImageType::Gif, ImageType::Bmp]
}
