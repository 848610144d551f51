// src/engine/transform.rs
//
// TransformHandle: accumulates colorspace / resolution / rotation / crop
// configuration for one image, then runs the transform on a background worker
// and reports through a completion callback.
//
// Resize and crop are mutually exclusive. Getters fail for aspects that were
// never set rather than returning defaults.

use crate::codecs::pixel::{self, PixelBuffer};
use crate::colorspace::{self, Colorspace, ColorspaceTable};
use crate::engine::pipeline;
use crate::engine::tasks::AsyncWorker;
use crate::error::{reject, translate, ImageUtilError, Result};
use crate::ops::{Operation, Rotation};
use crate::RawImage;
use tracing::debug;

/// Completion callback for [`TransformHandle::run`].
pub type TransformCallback = Box<dyn FnOnce(Result<RawImage>) + Send + 'static>;

/// Crop rectangle as start (inclusive) and end (exclusive) corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropArea {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

impl CropArea {
    pub fn width(&self) -> u32 {
        self.end_x - self.start_x
    }

    pub fn height(&self) -> u32 {
        self.end_y - self.start_y
    }
}

/// One configurable image transform job.
#[derive(Debug, Default)]
pub struct TransformHandle {
    colorspace: Option<Colorspace>,
    resolution: Option<(u32, u32)>,
    rotation: Option<Rotation>,
    crop_area: Option<CropArea>,
    hardware_acceleration: bool,
    worker: Option<AsyncWorker>,
}

impl TransformHandle {
    pub fn create() -> Result<Self> {
        debug!(target: "image_util", "transform handle created");
        Ok(Self::default())
    }

    /// Only the software path exists, so requesting hardware mode fails.
    pub fn set_hardware_acceleration(&mut self, mode: bool) -> Result<()> {
        if mode {
            return Err(reject(
                "transform_set_hardware_acceleration",
                ImageUtilError::NotSupported,
                "hardware acceleration is not available",
            ));
        }
        self.hardware_acceleration = false;
        Ok(())
    }

    pub fn hardware_acceleration(&self) -> bool {
        self.hardware_acceleration
    }

    pub fn set_colorspace(&mut self, colorspace: Colorspace) -> Result<()> {
        colorspace::require(
            "transform_set_colorspace",
            colorspace,
            ColorspaceTable::Transform,
        )?;
        debug!(target: "image_util", %colorspace, "transform colorspace set");
        self.colorspace = Some(colorspace);
        Ok(())
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        const FUNC: &str = "transform_set_resolution";
        if self.crop_area.is_some() {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidOperation,
                "crop area already set",
            ));
        }
        if width == 0 || height == 0 {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidParameter,
                format_args!("invalid resolution {width}x{height}"),
            ));
        }
        self.resolution = Some((width, height));
        Ok(())
    }

    pub fn set_rotation(&mut self, rotation: Rotation) -> Result<()> {
        self.rotation = Some(rotation);
        Ok(())
    }

    pub fn set_crop_area(
        &mut self,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> Result<()> {
        const FUNC: &str = "transform_set_crop_area";
        if self.resolution.is_some() {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidOperation,
                "resolution already set",
            ));
        }
        if end_x <= start_x || end_y <= start_y {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidParameter,
                format_args!("invalid crop area ({start_x},{start_y})-({end_x},{end_y})"),
            ));
        }
        self.crop_area = Some(CropArea {
            start_x,
            start_y,
            end_x,
            end_y,
        });
        Ok(())
    }

    pub fn colorspace(&self) -> Result<Colorspace> {
        self.colorspace
            .ok_or_else(|| unset("transform_get_colorspace", "colorspace"))
    }

    pub fn resolution(&self) -> Result<(u32, u32)> {
        self.resolution
            .ok_or_else(|| unset("transform_get_resolution", "resolution"))
    }

    pub fn rotation(&self) -> Result<Rotation> {
        self.rotation
            .ok_or_else(|| unset("transform_get_rotation", "rotation"))
    }

    pub fn crop_area(&self) -> Result<CropArea> {
        self.crop_area
            .ok_or_else(|| unset("transform_get_crop_area", "crop area"))
    }

    fn operations(&self) -> Vec<Operation> {
        let mut ops = Vec::with_capacity(4);
        if let Some(area) = self.crop_area {
            ops.push(Operation::Crop {
                x: area.start_x,
                y: area.start_y,
                width: area.width(),
                height: area.height(),
            });
        }
        if let Some((width, height)) = self.resolution {
            ops.push(Operation::Resize { width, height });
        }
        if let Some(rotation) = self.rotation {
            ops.push(Operation::Rotate { rotation });
        }
        if let Some(target) = self.colorspace {
            ops.push(Operation::Convert { target });
        }
        ops
    }

    /// Transform `source` on a background worker and deliver the result to
    /// `callback`.
    ///
    /// A previous run still in flight is cancelled and joined first, so at
    /// most one callback is ever outstanding.
    pub fn run<F>(&mut self, source: RawImage, callback: F) -> Result<()>
    where
        F: FnOnce(Result<RawImage>) + Send + 'static,
    {
        const FUNC: &str = "transform_run";
        let ops = self.operations();
        if ops.is_empty() {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidParameter,
                "no transform configured",
            ));
        }
        let format = colorspace::require(FUNC, source.colorspace, ColorspaceTable::Transform)?;
        let expected = pixel::buffer_size(format, source.width, source.height)
            .map_err(|e| translate(FUNC, &e))?;
        if source.data.len() != expected {
            return Err(reject(
                FUNC,
                ImageUtilError::InvalidParameter,
                format_args!("source holds {} bytes, expected {expected}", source.data.len()),
            ));
        }

        if let Some(mut previous) = self.worker.take() {
            previous.cancel();
        }

        let output_colorspace = self.colorspace.unwrap_or(source.colorspace);
        let (out_width, out_height) =
            pipeline::output_dimensions(&ops, source.width, source.height);
        debug!(
            target: "image_util",
            src_width = source.width,
            src_height = source.height,
            out_width,
            out_height,
            colorspace = %output_colorspace,
            "transform queued"
        );
        let input = PixelBuffer {
            width: source.width,
            height: source.height,
            format,
            data: source.data,
        };
        let callback: TransformCallback = Box::new(callback);
        let job = move || {
            pipeline::apply_ops(input, &ops)
                .map(|out| RawImage {
                    width: out.width,
                    height: out.height,
                    colorspace: output_colorspace,
                    data: out.data,
                })
                .map_err(|e| translate(FUNC, &e))
        };
        let worker = AsyncWorker::spawn("transform", job, callback)
            .map_err(|e| translate(FUNC, &e))?;
        self.worker = Some(worker);
        Ok(())
    }

    /// True once the last run has delivered its callback.
    pub fn is_completed(&self) -> Result<bool> {
        match &self.worker {
            Some(worker) => Ok(worker.is_finished()),
            None => Err(reject(
                "transform_is_completed",
                ImageUtilError::InvalidOperation,
                "no transform has been run",
            )),
        }
    }

    /// Block until the last run has delivered its callback.
    pub fn wait(&self) {
        if let Some(worker) = &self.worker {
            worker.wait();
        }
    }

    /// Release the handle. An in-flight callback either completes first or
    /// never runs.
    pub fn destroy(self) {
        debug!(target: "image_util", "transform handle destroyed");
    }
}

fn unset(func: &str, what: &str) -> ImageUtilError {
    reject(
        func,
        ImageUtilError::InvalidOperation,
        format_args!("{what} was never set"),
    )
}
