// src/engine.rs
//
// The core of image-util. Handle-based jobs that:
// 1. Accumulate configuration through setters, validating each argument
// 2. Execute once on run() (or on a background worker for run_async())
// 3. Report failures through the public error taxonomy only
//
// This file is a facade over the modules in engine/

use std::time::Duration;

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Images larger than 32768x32768 are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Interval at which a thread waiting on a worker re-checks its state.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod api;
mod common;
mod decode;
pub mod decoder;
mod encode;
pub mod encoder;
pub mod io;
pub mod pipeline;
mod tasks;
mod transform;

pub use common::{run_with_panic_policy, EngineResult};
pub use decode::{DecodeCallback, DecodeHandle, DecodeInfo};
pub use decoder::{check_dimensions, detect_format};
pub use encode::{EncodeCallback, EncodeHandle};
pub use io::{Destination, OutputBuffer, Source};
pub use pipeline::apply_ops;
pub use tasks::AsyncWorker;
pub use transform::{CropArea, TransformCallback, TransformHandle};
