// src/engine/io.rs
//
// I/O operations: input Source, output destinations, file loading and writing.

use crate::engine::common::EngineResult;
use crate::error::EngineError;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Image source - in-memory data or a file path (lazy loading)
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory encoded bytes
    Memory(Arc<Vec<u8>>),
    /// File path, read only when the job runs
    Path(PathBuf),
}

impl Source {
    /// Load the actual bytes from the source
    pub fn load(&self) -> EngineResult<Arc<Vec<u8>>> {
        match self {
            Source::Memory(data) => Ok(data.clone()),
            Source::Path(path) => {
                let data = std::fs::read(path).map_err(|e| open_error(path, e))?;
                Ok(Arc::new(data))
            }
        }
    }

    /// Leading bytes of the source, at most `len` of them.
    pub fn header(&self, len: usize) -> EngineResult<Vec<u8>> {
        match self {
            Source::Memory(data) => Ok(data[..len.min(data.len())].to_vec()),
            Source::Path(path) => {
                let file = File::open(path).map_err(|e| open_error(path, e))?;
                let mut buf = Vec::with_capacity(len);
                file.take(len as u64)
                    .read_to_end(&mut buf)
                    .map_err(|e| EngineError::file_read_failed(display(path), e))?;
                Ok(buf)
            }
        }
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn open_error(path: &Path, err: std::io::Error) -> EngineError {
    if err.kind() == std::io::ErrorKind::NotFound {
        EngineError::file_not_found(display(path))
    } else {
        EngineError::file_read_failed(display(path), err)
    }
}

/// Caller-owned slot that receives a job's output bytes.
///
/// Clones share the same slot, so a caller can keep one clone, hand another
/// to a handle, and read the result after `run` or from inside an async
/// completion callback.
#[derive(Clone, Debug, Default)]
pub struct OutputBuffer {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the bytes out, leaving the slot empty.
    pub fn take(&self) -> Option<Vec<u8>> {
        self.slot.lock().take()
    }

    pub fn len(&self) -> usize {
        self.slot.lock().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn fill(&self, data: Vec<u8>) {
        *self.slot.lock() = Some(data);
    }
}

/// Where an encode job writes its stream.
#[derive(Clone, Debug)]
pub enum Destination {
    Path(PathBuf),
    Buffer(OutputBuffer),
}

impl Destination {
    /// Deliver encoded bytes; returns the number written.
    pub fn deliver(&self, data: Vec<u8>) -> EngineResult<usize> {
        let size = data.len();
        match self {
            Destination::Path(path) => write_file(path, &data)?,
            Destination::Buffer(buffer) => buffer.fill(data),
        }
        Ok(size)
    }
}

/// Write `data` to `path`, creating or truncating the file.
pub fn write_file(path: &Path, data: &[u8]) -> EngineResult<()> {
    std::fs::write(path, data).map_err(|e| EngineError::file_write_failed(display(path), e))
}
