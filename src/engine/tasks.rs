// src/engine/tasks.rs
//
// Single-shot background worker shared by the decode, encode and transform
// handles.
//
// One worker runs one job on its own thread and hands the result to a
// completion callback. Teardown is signal-then-join: `cancel` marks the
// worker cancelled and wakes anyone waiting, then joins the thread. A callback
// that has not started by then is dropped without being invoked.

use crate::engine::common::{panic_message, EngineResult};
use crate::engine::WORKER_POLL_INTERVAL;
use crate::error::EngineError;
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

#[derive(Debug, Default)]
struct WorkerState {
    cancelled: bool,
    finished: bool,
    /// Callback ran to completion
    delivered: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<WorkerState>,
    cvar: Condvar,
}

impl Shared {
    fn finish(&self, delivered: bool) {
        let mut state = self.state.lock();
        state.finished = true;
        state.delivered = delivered;
        self.cvar.notify_all();
    }
}

/// Background thread running exactly one job.
#[derive(Debug)]
pub struct AsyncWorker {
    name: &'static str,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl AsyncWorker {
    /// Spawn a thread that runs `job` and passes its output to `callback`.
    pub fn spawn<T, J, C>(name: &'static str, job: J, callback: C) -> EngineResult<Self>
    where
        T: Send + 'static,
        J: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);

        let thread = thread::Builder::new()
            .name(format!("image-util-{name}"))
            .spawn(move || {
                let output = job();
                if worker_shared.state.lock().cancelled {
                    debug!(target: "image_util", worker = name, "cancelled before callback");
                    worker_shared.finish(false);
                    return;
                }
                match catch_unwind(AssertUnwindSafe(|| callback(output))) {
                    Ok(()) => worker_shared.finish(true),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(target: "image_util", worker = name, "callback panicked: {message}");
                        worker_shared.finish(false);
                    }
                }
            })
            .map_err(|e| EngineError::internal_panic(format!("failed to spawn worker: {e}")))?;

        debug!(target: "image_util", worker = name, "spawned");
        Ok(Self {
            name,
            shared,
            thread: Some(thread),
        })
    }

    /// True once the job has completed and its callback (if any) returned or panicked.
    pub fn is_finished(&self) -> bool {
        self.shared.state.lock().finished
    }

    /// True if the callback ran to completion.
    pub fn delivered(&self) -> bool {
        self.shared.state.lock().delivered
    }

    /// Block until the worker finishes, re-checking every poll interval.
    pub fn wait(&self) {
        let mut state = self.shared.state.lock();
        while !state.finished {
            self.shared.cvar.wait_for(&mut state, WORKER_POLL_INTERVAL);
        }
    }

    /// Signal cancellation and join the thread.
    ///
    /// After this returns the callback is either complete or will never run.
    pub fn cancel(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.cancelled = true;
            self.shared.cvar.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(target: "image_util", worker = self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for AsyncWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn runs_job_and_callback_once() {
        let (tx, rx) = mpsc::channel();
        let worker = AsyncWorker::spawn("test", || 21 * 2, move |v| tx.send(v).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        worker.wait();
        assert!(worker.is_finished());
        assert!(worker.delivered());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancel_before_completion_skips_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let mut worker = AsyncWorker::spawn(
            "test",
            move || {
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
            },
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

        // Mark cancelled while the job is still blocked, then let it finish.
        worker.shared.state.lock().cancelled = true;
        release_tx.send(()).unwrap();
        worker.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(worker.is_finished());
        assert!(!worker.delivered());
    }

    #[test]
    fn drop_joins_thread() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let worker = AsyncWorker::spawn(
            "test",
            || thread::sleep(Duration::from_millis(20)),
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        drop(worker);
        // Either delivered before the cancel flag landed, or skipped; never later.
        let after_drop = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
        assert!(after_drop <= 1);
    }

    #[test]
    fn panicking_callback_still_finishes() {
        let worker = Arc::new(
            AsyncWorker::spawn("test", || 1, |_: i32| panic!("callback failure")).unwrap(),
        );
        let waiter = Arc::clone(&worker);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            waiter.wait();
            let _ = tx.send(());
        });
        rx.recv_timeout(Duration::from_secs(5))
            .expect("wait() returned after a panicking callback");
        assert!(worker.is_finished());
        assert!(!worker.delivered());
    }
}
