// src/error.rs
//
// Error handling for image-util, built on thiserror.
//
// Two layers:
// - EngineError: descriptive internal error raised by codecs and geometry
//   primitives. Never crosses the public API directly.
// - ImageUtilError: the small, stable public taxonomy. Every public entry
//   point returns it, either from local validation or via translate().
//
// ErrorCode mirrors the numeric platform codes (including None) for callers
// that need raw integers.

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Result class of an internal failure, as seen by the translator.
///
/// Several engine errors collapse into each class; several classes collapse
/// into one public error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A file could not be found, opened, read or created
    FileOpen,
    /// An argument failed validation inside a collaborator
    InvalidValue,
    /// The codec produced no pixel data
    NoDecodedData,
    /// Format or colorspace not handled by the codec
    NotSupportedFormat,
    /// Requested device capability is absent
    DeviceNotSupported,
    /// Allocation failed or would exceed a hard limit
    OutOfMemory,
    /// Anything else
    Internal,
}

/// Internal engine errors.
///
/// All errors are type-safe and carry enough context to be logged usefully.
#[derive(Debug, Error)]
pub enum EngineError {
    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Format Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Colorspace {colorspace} is not supported by {format}")]
    UnsupportedColorspace {
        colorspace: Cow<'static, str>,
        format: Cow<'static, str>,
    },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Decoder produced no image data")]
    NoDecodedData,

    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Failed to allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },

    // Operation Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Crop bounds ({x}+{width}, {y}+{height}) exceed image dimensions ({img_width}x{img_height})")]
    InvalidCropBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    #[error("Device does not support {feature}")]
    DeviceNotSupported { feature: Cow<'static, str> },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },
}

// Constructor Helpers
impl EngineError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn unsupported_colorspace(
        colorspace: impl Into<Cow<'static, str>>,
        format: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::UnsupportedColorspace {
            colorspace: colorspace.into(),
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn no_decoded_data() -> Self {
        Self::NoDecodedData
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn allocation_failed(bytes: usize) -> Self {
        Self::AllocationFailed { bytes }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn buffer_size_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    pub fn invalid_crop_bounds(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        Self::InvalidCropBounds {
            x,
            y,
            width,
            height,
            img_width,
            img_height,
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn device_not_supported(feature: impl Into<Cow<'static, str>>) -> Self {
        Self::DeviceNotSupported {
            feature: feature.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    /// Result class used by [`translate`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound { .. }
            | Self::FileReadFailed { .. }
            | Self::FileWriteFailed { .. } => ErrorKind::FileOpen,

            Self::InvalidArgument { .. }
            | Self::BufferSizeMismatch { .. }
            | Self::InvalidCropBounds { .. } => ErrorKind::InvalidValue,

            Self::NoDecodedData => ErrorKind::NoDecodedData,

            Self::UnsupportedFormat { .. } | Self::UnsupportedColorspace { .. } => {
                ErrorKind::NotSupportedFormat
            }

            Self::DeviceNotSupported { .. } => ErrorKind::DeviceNotSupported,

            Self::AllocationFailed { .. } => ErrorKind::OutOfMemory,

            Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::ResizeFailed { .. }
            | Self::InternalPanic { .. } => ErrorKind::Internal,
        }
    }
}

/// Public error taxonomy.
///
/// Success is represented by `Ok(..)`; see [`ErrorCode::None`] for the
/// numeric form.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageUtilError {
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("out of memory")]
    OutOfMemory,
    #[error("no such file")]
    NoSuchFile,
    #[error("invalid operation")]
    InvalidOperation,
    #[error("not supported format")]
    NotSupportedFormat,
    #[error("permission denied")]
    PermissionDenied,
    #[error("not supported")]
    NotSupported,
}

impl ImageUtilError {
    /// Numeric platform code for this error.
    pub fn code(self) -> ErrorCode {
        match self {
            Self::InvalidParameter => ErrorCode::InvalidParameter,
            Self::OutOfMemory => ErrorCode::OutOfMemory,
            Self::NoSuchFile => ErrorCode::NoSuchFile,
            Self::InvalidOperation => ErrorCode::InvalidOperation,
            Self::NotSupportedFormat => ErrorCode::NotSupportedFormat,
            Self::PermissionDenied => ErrorCode::PermissionDenied,
            Self::NotSupported => ErrorCode::NotSupported,
        }
    }
}

/// Base of the image-util error class.
const IMAGE_UTIL_ERROR_CLASS: i32 = -0x0275_0000;

/// Numeric error codes, matching the platform values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    None = 0,
    InvalidParameter = -22,
    OutOfMemory = -12,
    NoSuchFile = -2,
    InvalidOperation = -38,
    NotSupportedFormat = IMAGE_UTIL_ERROR_CLASS | 0x01,
    PermissionDenied = -13,
    NotSupported = -1_073_741_822,
}

impl ErrorCode {
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Collapse a public result into its numeric code.
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::None,
            Err(err) => err.code(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "ERROR_NONE",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::NoSuchFile => "NO_SUCH_FILE",
            Self::InvalidOperation => "INVALID_OPERATION",
            Self::NotSupportedFormat => "NOT_SUPPORTED_FORMAT",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotSupported => "NOT_SUPPORTED",
        };
        write!(f, "{name}(0x{:08x})", self.as_raw())
    }
}

/// Map an internal failure onto the public taxonomy.
///
/// `func` names the public entry point that observed the failure; it is
/// logged with every translation so catch-all InvalidOperation results can
/// be traced back.
pub fn translate(func: &str, err: &EngineError) -> ImageUtilError {
    let public = match err.kind() {
        ErrorKind::FileOpen => ImageUtilError::NoSuchFile,
        ErrorKind::InvalidValue | ErrorKind::NoDecodedData => ImageUtilError::InvalidParameter,
        ErrorKind::NotSupportedFormat | ErrorKind::DeviceNotSupported => {
            ImageUtilError::NotSupportedFormat
        }
        ErrorKind::OutOfMemory => ImageUtilError::OutOfMemory,
        ErrorKind::Internal => ImageUtilError::InvalidOperation,
    };
    error!(target: "image_util", func, code = %public.code(), "{err}");
    public
}

/// Translate a whole engine result, logging success at debug level.
pub(crate) fn translate_result<T>(
    func: &str,
    result: std::result::Result<T, EngineError>,
) -> Result<T> {
    match result {
        Ok(value) => {
            debug!(target: "image_util", func, code = %ErrorCode::None);
            Ok(value)
        }
        Err(err) => Err(translate(func, &err)),
    }
}

/// Log and return a locally detected argument error.
pub(crate) fn reject(func: &str, err: ImageUtilError, reason: impl fmt::Display) -> ImageUtilError {
    warn!(target: "image_util", func, code = %err.code(), "{reason}");
    err
}

// Result type alias
pub type Result<T> = std::result::Result<T, ImageUtilError>;
