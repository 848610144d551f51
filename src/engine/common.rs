// src/engine/common.rs
//
// Common utilities shared across engine modules.
// Provides the engine result alias and panic containment for codec calls.

use crate::error::EngineError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Result type used by every engine primitive.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Run a codec call, turning a panic inside it into `EngineError::InternalPanic`.
///
/// Third-party codecs (notably mozjpeg, which reports libjpeg errors by
/// unwinding) must never unwind through a public entry point or a worker
/// thread.
pub fn run_with_panic_policy<T, F>(label: &'static str, f: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(target: "image_util", label, "codec panicked: {message}");
            Err(EngineError::internal_panic(format!("{label}: {message}")))
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_ok_and_err() {
        assert_eq!(run_with_panic_policy("t", || Ok(3)).unwrap(), 3);
        let err = run_with_panic_policy::<(), _>("t", || Err(EngineError::no_decoded_data()));
        assert!(matches!(err, Err(EngineError::NoDecodedData)));
    }

    #[test]
    fn converts_panic_to_internal_error() {
        let err = run_with_panic_policy::<(), _>("decode:test", || panic!("libjpeg error"))
            .unwrap_err();
        match err {
            EngineError::InternalPanic { message } => {
                assert!(message.contains("decode:test"));
                assert!(message.contains("libjpeg error"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
