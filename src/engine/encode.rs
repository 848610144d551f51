// src/engine/encode.rs
//
// EncodeHandle: accumulates per-format encode configuration and input
// pixels, then encodes once to a file or an output buffer, synchronously or
// on a background worker.
//
// Animated GIF state: the first set_resolution fixes the canvas size; every
// set_input_buffer fills the frame at the current index and, when more than
// one frame was declared, advances it. Resolution and delay setters apply to
// the frame at the current index.

use crate::codecs::pixel::PixelFormat;
use crate::colorspace::{self, Colorspace, ImageType};
use crate::engine::encoder::{self, GifFrame};
use crate::engine::io::{Destination, OutputBuffer};
use crate::engine::tasks::AsyncWorker;
use crate::error::{reject, translate, translate_result, ImageUtilError, Result};
use crate::ops::{
    PngCompression, DEFAULT_GIF_DELAY, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
use std::path::Path;
use tracing::debug;

/// Completion callback for [`EncodeHandle::run_async`]; receives the
/// encoded size in bytes.
pub type EncodeCallback = Box<dyn FnOnce(Result<usize>) + Send + 'static>;

#[derive(Debug, Clone)]
struct FrameSlot {
    resolution: Option<(u32, u32)>,
    /// 1/100 s
    delay: u32,
    data: Option<Vec<u8>>,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self {
            resolution: None,
            delay: DEFAULT_GIF_DELAY,
            data: None,
        }
    }
}

#[derive(Debug)]
enum Payload {
    Still(Vec<u8>),
    Animation(Vec<GifFrame>),
}

/// Everything an encode needs, detached from the handle.
#[derive(Debug)]
struct EncodeJob {
    image_type: ImageType,
    format: PixelFormat,
    width: u32,
    height: u32,
    quality: u8,
    compression: PngCompression,
    payload: Payload,
    destination: Destination,
}

impl EncodeJob {
    fn execute(self, func: &'static str) -> Result<usize> {
        let result = match self.payload {
            Payload::Animation(frames) => encoder::encode_gif(&frames),
            Payload::Still(data) => match self.image_type {
                ImageType::Jpeg => encoder::encode_jpeg(
                    &data,
                    self.width,
                    self.height,
                    self.format,
                    self.quality,
                ),
                ImageType::Png => {
                    encoder::encode_png(&data, self.width, self.height, self.compression)
                }
                ImageType::Bmp => encoder::encode_bmp(&data, self.width, self.height),
                ImageType::Gif => encoder::encode_gif(&[GifFrame {
                    width: self.width,
                    height: self.height,
                    delay: DEFAULT_GIF_DELAY,
                    rgba: data,
                }]),
            },
        };
        let destination = self.destination;
        translate_result(func, result.and_then(|bytes| destination.deliver(bytes)))
    }
}

/// One configurable encode job for a fixed output format.
#[derive(Debug)]
pub struct EncodeHandle {
    image_type: ImageType,
    colorspace: Colorspace,
    quality: u8,
    compression: PngCompression,
    /// Canvas size (frame 0 for GIF)
    resolution: Option<(u32, u32)>,
    frame_count: usize,
    frames: Vec<FrameSlot>,
    current_frame: usize,
    destination: Option<Destination>,
    started: bool,
    worker: Option<AsyncWorker>,
}

impl EncodeHandle {
    pub fn create(image_type: ImageType) -> Result<Self> {
        debug!(target: "image_util", format = %image_type, "encode handle created");
        Ok(Self {
            image_type,
            colorspace: Colorspace::Rgba8888,
            quality: DEFAULT_JPEG_QUALITY,
            compression: PngCompression::default(),
            resolution: None,
            frame_count: 1,
            frames: vec![FrameSlot::default()],
            current_frame: 0,
            destination: None,
            started: false,
            worker: None,
        })
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    fn is_animation(&self) -> bool {
        self.image_type == ImageType::Gif && self.frame_count > 1
    }

    fn require_format(&self, func: &str, expected: ImageType) -> Result<()> {
        if self.image_type != expected {
            return Err(reject(
                func,
                ImageUtilError::NotSupportedFormat,
                format_args!("{func} applies to {expected}, handle encodes {}", self.image_type),
            ));
        }
        Ok(())
    }

    /// Image size. For GIF the first call fixes the canvas; later frames may
    /// be smaller but never larger.
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        const FUNC: &str = "encode_set_resolution";
        if width == 0 || height == 0 {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidParameter,
                format_args!("invalid resolution {width}x{height}"),
            ));
        }
        if self.image_type != ImageType::Gif {
            self.resolution = Some((width, height));
            return Ok(());
        }

        let current = self.current_frame;
        if current >= self.frames.len() {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidParameter,
                format_args!("frame {current} beyond declared count"),
            ));
        }
        match self.resolution {
            None => self.resolution = Some((width, height)),
            Some((canvas_w, canvas_h)) if width > canvas_w || height > canvas_h => {
                return Err(reject(
                    FUNC,
                    ImageUtilError::InvalidParameter,
                    format_args!("frame {width}x{height} exceeds canvas {canvas_w}x{canvas_h}"),
                ));
            }
            Some(_) => {}
        }
        if let Some(slot) = self.frames.get_mut(self.current_frame) {
            slot.resolution = Some((width, height));
        }
        Ok(())
    }

    pub fn set_colorspace(&mut self, colorspace: Colorspace) -> Result<()> {
        colorspace::require("encode_set_colorspace", colorspace, self.image_type)?;
        self.colorspace = colorspace;
        Ok(())
    }

    /// JPEG quality, 1 through 100.
    pub fn set_quality(&mut self, quality: u8) -> Result<()> {
        const FUNC: &str = "encode_set_quality";
        self.require_format(FUNC, ImageType::Jpeg)?;
        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality) {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidParameter,
                format_args!("quality {quality} out of range"),
            ));
        }
        self.quality = quality;
        Ok(())
    }

    pub fn set_png_compression(&mut self, compression: PngCompression) -> Result<()> {
        self.require_format("encode_set_png_compression", ImageType::Png)?;
        self.compression = compression;
        Ok(())
    }

    /// Declare the number of animation frames. Frames already configured
    /// are kept.
    pub fn set_gif_frame_count(&mut self, count: usize) -> Result<()> {
        const FUNC: &str = "encode_set_gif_frame_count";
        self.require_format(FUNC, ImageType::Gif)?;
        if count == 0 {
            return Err(reject(FUNC, ImageUtilError::InvalidParameter, "frame count is 0"));
        }
        let previous = self.frames.len();
        self.frames.resize_with(count, FrameSlot::default);
        if count < previous {
            // The last kept slot becomes current so it can be replaced.
            self.current_frame = self.current_frame.min(count - 1);
        }
        self.frame_count = count;
        Ok(())
    }

    /// Delay of the current frame, in 1/100 s.
    pub fn set_gif_frame_delay_time(&mut self, delay: u32) -> Result<()> {
        const FUNC: &str = "encode_set_gif_frame_delay_time";
        self.require_format(FUNC, ImageType::Gif)?;
        let current = self.current_frame;
        let Some(slot) = self.frames.get_mut(current) else {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidParameter,
                format_args!("frame {current} beyond declared count"),
            ));
        };
        slot.delay = delay;
        Ok(())
    }

    /// Pixels for the current frame, laid out in the configured colorspace.
    pub fn set_input_buffer(&mut self, data: impl Into<Vec<u8>>) -> Result<()> {
        const FUNC: &str = "encode_set_input_buffer";
        let data = data.into();
        if data.is_empty() {
            return Err(reject(FUNC, ImageUtilError::InvalidParameter, "empty buffer"));
        }
        let current = self.current_frame;
        let Some(slot) = self.frames.get_mut(current) else {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidOperation,
                format_args!("all {} frames already supplied", self.frame_count),
            ));
        };
        slot.data = Some(data);
        if self.is_animation() {
            self.current_frame += 1;
            debug!(target: "image_util", frame = current, "gif frame supplied");
        }
        Ok(())
    }

    pub fn set_output_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(reject(
                "encode_set_output_path",
                ImageUtilError::NoSuchFile,
                "empty path",
            ));
        }
        self.destination = Some(Destination::Path(path.to_path_buf()));
        Ok(())
    }

    /// Encode into memory. BMP can only be written to a file.
    pub fn set_output_buffer(&mut self, output: OutputBuffer) -> Result<()> {
        if self.image_type == ImageType::Bmp {
            return Err(reject(
                "encode_set_output_buffer",
                ImageUtilError::NotSupportedFormat,
                "bmp encoder writes to files only",
            ));
        }
        self.destination = Some(Destination::Buffer(output));
        Ok(())
    }

    fn supplied_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.data.is_some()).count()
    }

    fn prepare(&mut self, func: &'static str) -> Result<EncodeJob> {
        if self.started {
            return Err(reject(
                func,
                ImageUtilError::InvalidOperation,
                "encode handle has already run",
            ));
        }
        let Some((width, height)) = self.resolution else {
            return Err(reject(func, ImageUtilError::InvalidParameter, "resolution not set"));
        };
        let Some(destination) = self.destination.clone() else {
            return Err(reject(func, ImageUtilError::InvalidParameter, "output not set"));
        };
        let supplied = self.supplied_frames();
        if supplied == 0 {
            return Err(reject(func, ImageUtilError::InvalidParameter, "input not set"));
        }
        if self.is_animation() && supplied != self.frame_count {
            return Err(reject(
                func,
                ImageUtilError::InvalidOperation,
                format_args!(
                    "total frame count does not match data set: {supplied} of {}",
                    self.frame_count
                ),
            ));
        }
        let format = colorspace::require(func, self.colorspace, self.image_type)?;

        let payload = if self.image_type == ImageType::Gif {
            Payload::Animation(
                std::mem::take(&mut self.frames)
                    .into_iter()
                    .map(|slot| {
                        let (w, h) = slot.resolution.unwrap_or((width, height));
                        GifFrame {
                            width: w,
                            height: h,
                            delay: slot.delay,
                            rgba: slot.data.unwrap_or_default(),
                        }
                    })
                    .collect(),
            )
        } else {
            let data = self.frames.first_mut().and_then(|slot| slot.data.take());
            Payload::Still(data.unwrap_or_default())
        };

        self.started = true;
        Ok(EncodeJob {
            image_type: self.image_type,
            format,
            width,
            height,
            quality: self.quality,
            compression: self.compression,
            payload,
            destination,
        })
    }

    /// Encode synchronously; returns the encoded size in bytes.
    pub fn run(&mut self) -> Result<usize> {
        const FUNC: &str = "encode_run";
        self.prepare(FUNC)?.execute(FUNC)
    }

    /// Encode on a background worker; `callback` receives the size.
    pub fn run_async<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<usize>) + Send + 'static,
    {
        const FUNC: &str = "encode_run_async";
        let job = self.prepare(FUNC)?;
        let callback: EncodeCallback = Box::new(callback);
        let worker = AsyncWorker::spawn("encode", move || job.execute(FUNC), callback)
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
        debug!(target: "image_util", format = %self.image_type, "encode handle destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decoder;
    use crate::ops::Downscale;
    use std::sync::mpsc;
    use std::time::Duration;

    fn rgba(width: u32, height: u32) -> Vec<u8> {
        [200u8, 100, 50, 255].repeat((width * height) as usize)
    }

    #[test]
    fn format_specific_setters_are_guarded() {
        let mut png = EncodeHandle::create(ImageType::Png).unwrap();
        assert_eq!(png.set_quality(90), Err(ImageUtilError::NotSupportedFormat));
        assert_eq!(
            png.set_gif_frame_count(2),
            Err(ImageUtilError::NotSupportedFormat)
        );
        png.set_png_compression(PngCompression::BEST).unwrap();

        let mut jpeg = EncodeHandle::create(ImageType::Jpeg).unwrap();
        assert_eq!(
            jpeg.set_png_compression(PngCompression::NONE),
            Err(ImageUtilError::NotSupportedFormat)
        );
        assert_eq!(jpeg.set_quality(0), Err(ImageUtilError::InvalidParameter));
        assert_eq!(jpeg.set_quality(101), Err(ImageUtilError::InvalidParameter));
        jpeg.set_quality(100).unwrap();
    }

    #[test]
    fn colorspace_checked_against_format_table() {
        let mut jpeg = EncodeHandle::create(ImageType::Jpeg).unwrap();
        assert_eq!(
            jpeg.set_colorspace(Colorspace::Rgb565),
            Err(ImageUtilError::NotSupportedFormat)
        );
        jpeg.set_colorspace(Colorspace::Nv12).unwrap();
        let mut gif = EncodeHandle::create(ImageType::Gif).unwrap();
        assert_eq!(
            gif.set_colorspace(Colorspace::Rgb888),
            Err(ImageUtilError::NotSupportedFormat)
        );
    }

    #[test]
    fn bmp_rejects_output_buffer() {
        let mut bmp = EncodeHandle::create(ImageType::Bmp).unwrap();
        assert_eq!(
            bmp.set_output_buffer(OutputBuffer::new()),
            Err(ImageUtilError::NotSupportedFormat)
        );
        assert_eq!(bmp.set_output_path(""), Err(ImageUtilError::NoSuchFile));
    }

    #[test]
    fn run_validates_configuration() {
        let mut handle = EncodeHandle::create(ImageType::Png).unwrap();
        assert_eq!(handle.run(), Err(ImageUtilError::InvalidParameter));
        handle.set_resolution(2, 2).unwrap();
        assert_eq!(handle.run(), Err(ImageUtilError::InvalidParameter));
        handle.set_output_buffer(OutputBuffer::new()).unwrap();
        assert_eq!(handle.run(), Err(ImageUtilError::InvalidParameter));
        handle.set_input_buffer(rgba(2, 2)).unwrap();
        assert!(handle.run().is_ok());
        assert_eq!(handle.run(), Err(ImageUtilError::InvalidOperation));
    }

    #[test]
    fn png_to_buffer_round_trips() {
        let output = OutputBuffer::new();
        let mut handle = EncodeHandle::create(ImageType::Png).unwrap();
        handle.set_resolution(3, 2).unwrap();
        handle.set_input_buffer(rgba(3, 2)).unwrap();
        handle.set_output_buffer(output.clone()).unwrap();
        let size = handle.run().unwrap();
        let bytes = output.take().unwrap();
        assert_eq!(bytes.len(), size);
        let decoded =
            decoder::decode(ImageType::Png, &bytes, PixelFormat::Rgba8888, Downscale::OneOne)
                .unwrap();
        assert_eq!(decoded.data, rgba(3, 2));
    }

    #[test]
    fn short_input_is_invalid_parameter() {
        let mut handle = EncodeHandle::create(ImageType::Jpeg).unwrap();
        handle.set_resolution(4, 4).unwrap();
        handle.set_input_buffer(vec![0u8; 10]).unwrap();
        handle.set_output_buffer(OutputBuffer::new()).unwrap();
        assert_eq!(handle.run(), Err(ImageUtilError::InvalidParameter));
    }

    #[test]
    fn gif_frame_resolution_is_capped_by_first() {
        let mut gif = EncodeHandle::create(ImageType::Gif).unwrap();
        gif.set_gif_frame_count(2).unwrap();
        gif.set_resolution(4, 4).unwrap();
        gif.set_input_buffer(rgba(4, 4)).unwrap();
        assert_eq!(
            gif.set_resolution(5, 4),
            Err(ImageUtilError::InvalidParameter)
        );
        gif.set_resolution(2, 3).unwrap();
    }

    #[test]
    fn gif_frame_count_must_match() {
        let output = OutputBuffer::new();
        let mut gif = EncodeHandle::create(ImageType::Gif).unwrap();
        assert_eq!(
            gif.set_gif_frame_count(0),
            Err(ImageUtilError::InvalidParameter)
        );
        gif.set_gif_frame_count(3).unwrap();
        gif.set_output_buffer(output.clone()).unwrap();
        gif.set_resolution(4, 4).unwrap();
        gif.set_gif_frame_delay_time(10).unwrap();
        gif.set_input_buffer(rgba(4, 4)).unwrap();
        gif.set_resolution(2, 2).unwrap();
        gif.set_gif_frame_delay_time(20).unwrap();
        gif.set_input_buffer(rgba(2, 2)).unwrap();
        assert_eq!(gif.run(), Err(ImageUtilError::InvalidOperation));

        gif.set_resolution(4, 4).unwrap();
        gif.set_input_buffer(rgba(4, 4)).unwrap();
        assert_eq!(
            gif.set_gif_frame_delay_time(5),
            Err(ImageUtilError::InvalidParameter)
        );
        assert_eq!(
            gif.set_resolution(4, 4),
            Err(ImageUtilError::InvalidParameter)
        );
        assert_eq!(
            gif.set_input_buffer(rgba(4, 4)),
            Err(ImageUtilError::InvalidOperation)
        );

        let size = gif.run().unwrap();
        let bytes = output.take().unwrap();
        assert_eq!(bytes.len(), size);
        assert_eq!(&bytes[..3], b"GIF");
    }

    #[test]
    fn shrinking_gif_frame_count_keeps_supplied_frames() {
        let output = OutputBuffer::new();
        let mut gif = EncodeHandle::create(ImageType::Gif).unwrap();
        gif.set_gif_frame_count(3).unwrap();
        gif.set_resolution(4, 4).unwrap();
        gif.set_input_buffer(rgba(4, 4)).unwrap();
        gif.set_gif_frame_count(1).unwrap();
        gif.set_input_buffer(rgba(4, 4)).unwrap();
        gif.set_output_buffer(output.clone()).unwrap();
        let size = gif.run().unwrap();
        assert_eq!(output.len(), size);

        let mut gif = EncodeHandle::create(ImageType::Gif).unwrap();
        gif.set_gif_frame_count(3).unwrap();
        gif.set_resolution(4, 4).unwrap();
        for _ in 0..3 {
            gif.set_input_buffer(rgba(4, 4)).unwrap();
        }
        gif.set_gif_frame_count(2).unwrap();
        gif.set_gif_frame_delay_time(30).unwrap();
        gif.set_input_buffer(rgba(4, 4)).unwrap();
        assert_eq!(
            gif.set_input_buffer(rgba(4, 4)),
            Err(ImageUtilError::InvalidOperation)
        );
        gif.set_output_buffer(OutputBuffer::new()).unwrap();
        assert!(gif.run().unwrap() > 0);
    }

    #[test]
    fn single_frame_gif_does_not_advance() {
        let output = OutputBuffer::new();
        let mut gif = EncodeHandle::create(ImageType::Gif).unwrap();
        gif.set_resolution(2, 2).unwrap();
        gif.set_input_buffer(rgba(2, 2)).unwrap();
        gif.set_input_buffer(rgba(2, 2)).unwrap();
        gif.set_output_buffer(output.clone()).unwrap();
        assert!(gif.run().unwrap() > 0);
    }

    #[test]
    fn bmp_to_file_async() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bmp");
        let mut bmp = EncodeHandle::create(ImageType::Bmp).unwrap();
        bmp.set_resolution(3, 3).unwrap();
        bmp.set_input_buffer(rgba(3, 3)).unwrap();
        bmp.set_output_path(&path).unwrap();

        let (tx, rx) = mpsc::channel();
        bmp.run_async(move |r| {
            let _ = tx.send(r);
        })
        .unwrap();
        let size = rx.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, size);
        bmp.destroy();
    }

    #[test]
    fn unwritable_path_is_no_such_file() {
        let mut jpeg = EncodeHandle::create(ImageType::Jpeg).unwrap();
        jpeg.set_resolution(2, 2).unwrap();
        jpeg.set_input_buffer(rgba(2, 2)).unwrap();
        jpeg.set_output_path("/nonexistent/dir/out.jpg").unwrap();
        assert_eq!(jpeg.run(), Err(ImageUtilError::NoSuchFile));
    }
}
