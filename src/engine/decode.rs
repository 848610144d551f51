// src/engine/decode.rs
//
// DecodeHandle: accumulates an input (path or buffer), an output slot,
// a target colorspace and a JPEG downscale factor, then decodes once,
// synchronously or on a background worker.
//
// The encoded format is sniffed from the input's leading bytes when the
// input is set, so colorspace and downscale can be validated immediately.

use crate::codecs::pixel::PixelFormat;
use crate::colorspace::{self, Colorspace, ImageType};
use crate::engine::decoder::{self, SIGNATURE_LEN};
use crate::engine::io::{OutputBuffer, Source};
use crate::engine::tasks::AsyncWorker;
use crate::error::{reject, translate, translate_result, ImageUtilError, Result};
use crate::ops::Downscale;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Completion callback for [`DecodeHandle::run_async`].
pub type DecodeCallback = Box<dyn FnOnce(Result<DecodeInfo>) + Send + 'static>;

/// What a finished decode reports alongside the filled output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes written to the output buffer
    pub size: usize,
}

/// Everything a decode needs, detached from the handle.
struct DecodeJob {
    source: Source,
    image_type: ImageType,
    format: PixelFormat,
    downscale: Downscale,
    output: OutputBuffer,
}

impl DecodeJob {
    fn execute(self, func: &'static str) -> Result<DecodeInfo> {
        let result = self.source.load().and_then(|data| {
            decoder::decode(self.image_type, &data, self.format, self.downscale)
        });
        let decoded = translate_result(func, result)?;
        let info = DecodeInfo {
            width: decoded.width,
            height: decoded.height,
            size: decoded.data.len(),
        };
        self.output.fill(decoded.data);
        Ok(info)
    }
}

/// One configurable decode job.
#[derive(Debug)]
pub struct DecodeHandle {
    source: Option<Source>,
    image_type: Option<ImageType>,
    output: Option<OutputBuffer>,
    colorspace: Colorspace,
    downscale: Downscale,
    started: bool,
    worker: Option<AsyncWorker>,
}

impl Default for DecodeHandle {
    fn default() -> Self {
        Self {
            source: None,
            image_type: None,
            output: None,
            colorspace: Colorspace::Rgba8888,
            downscale: Downscale::OneOne,
            started: false,
            worker: None,
        }
    }
}

impl DecodeHandle {
    pub fn create() -> Result<Self> {
        debug!(target: "image_util", "decode handle created");
        Ok(Self::default())
    }

    /// Decode from a file. The file is opened now to sniff its format and
    /// read in full when the job runs.
    pub fn set_input_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        const FUNC: &str = "decode_set_input_path";
        self.clear_input();
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(reject(FUNC, ImageUtilError::NoSuchFile, "empty path"));
        }
        self.set_source(FUNC, Source::Path(path.to_path_buf()))
    }

    /// Decode from encoded bytes held in memory.
    pub fn set_input_buffer(&mut self, data: impl Into<Vec<u8>>) -> Result<()> {
        const FUNC: &str = "decode_set_input_buffer";
        self.clear_input();
        let data = data.into();
        if data.is_empty() {
            return Err(reject(FUNC, ImageUtilError::InvalidParameter, "empty buffer"));
        }
        self.set_source(FUNC, Source::Memory(Arc::new(data)))
    }

    /// A failed input setter leaves the handle with no input.
    fn clear_input(&mut self) {
        self.source = None;
        self.image_type = None;
    }

    fn set_source(&mut self, func: &str, source: Source) -> Result<()> {
        let header = source.header(SIGNATURE_LEN).map_err(|e| translate(func, &e))?;
        let Some(image_type) = decoder::detect_format(&header) else {
            return Err(reject(
                func,
                ImageUtilError::NotSupportedFormat,
                "unrecognized image signature",
            ));
        };
        debug!(target: "image_util", format = %image_type, "input format detected");
        self.source = Some(source);
        self.image_type = Some(image_type);
        Ok(())
    }

    pub fn set_output_buffer(&mut self, output: OutputBuffer) -> Result<()> {
        self.output = Some(output);
        Ok(())
    }

    /// Target layout; must be supported by the detected format.
    pub fn set_colorspace(&mut self, colorspace: Colorspace) -> Result<()> {
        const FUNC: &str = "decode_set_colorspace";
        let image_type = self.detected(FUNC)?;
        colorspace::require(FUNC, colorspace, image_type)?;
        self.colorspace = colorspace;
        Ok(())
    }

    /// DCT-domain scale factor; JPEG input only.
    pub fn set_jpeg_downscale(&mut self, downscale: Downscale) -> Result<()> {
        const FUNC: &str = "decode_set_jpeg_downscale";
        if self.detected(FUNC)? != ImageType::Jpeg {
            return Err(reject(
                FUNC,
                ImageUtilError::NotSupportedFormat,
                "downscale applies to jpeg only",
            ));
        }
        self.downscale = downscale;
        Ok(())
    }

    /// Format detected from the current input.
    pub fn image_type(&self) -> Option<ImageType> {
        self.image_type
    }

    fn detected(&self, func: &str) -> Result<ImageType> {
        self.image_type.ok_or_else(|| {
            reject(func, ImageUtilError::InvalidParameter, "no input has been set")
        })
    }

    fn prepare(&mut self, func: &'static str) -> Result<DecodeJob> {
        if self.started {
            return Err(reject(
                func,
                ImageUtilError::InvalidOperation,
                "decode handle has already run",
            ));
        }
        let (Some(source), Some(image_type)) = (self.source.clone(), self.image_type) else {
            return Err(reject(func, ImageUtilError::InvalidParameter, "input not set"));
        };
        let Some(output) = self.output.clone() else {
            return Err(reject(func, ImageUtilError::InvalidParameter, "output not set"));
        };
        let format = colorspace::require(func, self.colorspace, image_type)?;
        let downscale = if image_type == ImageType::Jpeg {
            self.downscale
        } else {
            Downscale::OneOne
        };
        self.started = true;
        Ok(DecodeJob {
            source,
            image_type,
            format,
            downscale,
            output,
        })
    }

    /// Decode synchronously, filling the output buffer.
    pub fn run(&mut self) -> Result<DecodeInfo> {
        const FUNC: &str = "decode_run";
        self.prepare(FUNC)?.execute(FUNC)
    }

    /// Decode on a background worker; `callback` receives the result.
    pub fn run_async<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<DecodeInfo>) + Send + 'static,
    {
        const FUNC: &str = "decode_run_async";
        let job = self.prepare(FUNC)?;
        let callback: DecodeCallback = Box::new(callback);
        let worker = AsyncWorker::spawn("decode", move || job.execute(FUNC), callback)
            .map_err(|e| translate(FUNC, &e))?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Block until an async run has delivered its callback.
    pub fn wait(&self) {
        if let Some(worker) = &self.worker {
            worker.wait();
        }
    }

    /// Release the handle, signalling and joining any worker.
    pub fn destroy(self) {
        debug!(target: "image_util", "decode handle destroyed");
    }
}
