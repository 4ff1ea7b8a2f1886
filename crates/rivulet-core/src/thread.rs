//! Named background worker with cooperative exit and pause.
//!
//! A [`Worker`] runs one closure on its own OS thread. The closure receives a
//! [`WorkerContext`] and is expected to poll
//! [`should_exit`](WorkerContext::should_exit) regularly. Pausing is
//! cooperative too: the worker parks itself with
//! [`pause`](WorkerContext::pause) and another thread wakes it with
//! [`Worker::resume`].
//!
//! Pausing spins with a short sleep quantum. It is meant for control threads;
//! never call it on the audio thread.
//!
//! ```rust
//! use rivulet_core::Worker;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let ticks = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&ticks);
//! let mut worker = Worker::new("ticker");
//! worker
//!     .start(move |ctx| {
//!         while !ctx.should_exit() {
//!             seen.fetch_add(1, Ordering::Relaxed);
//!             std::thread::yield_now();
//!         }
//!     })
//!     .unwrap();
//! worker.stop().unwrap();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{EngineError, Result};

/// Sleep granularity while paused.
const PAUSE_QUANTUM: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct WorkerShared {
    should_exit: AtomicBool,
    paused: AtomicBool,
    running: AtomicBool,
}

/// Handle passed to the worker closure.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    shared: Arc<WorkerShared>,
}

impl WorkerContext {
    /// Whether the owner asked this worker to finish.
    pub fn should_exit(&self) -> bool {
        self.shared.should_exit.load(Ordering::Acquire)
    }

    /// Blocks until [`Worker::resume`] or an exit request.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
        while self.shared.paused.load(Ordering::Acquire) && !self.should_exit() {
            std::thread::sleep(PAUSE_QUANTUM);
        }
        self.shared.paused.store(false, Ordering::Release);
    }

    /// Like [`pause`](Self::pause) but gives up after `timeout`.
    ///
    /// Returns `true` if woken by [`Worker::resume`] or an exit request,
    /// `false` if the timeout elapsed.
    pub fn pause_with_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.shared.paused.store(true, Ordering::Release);
        let mut woken = true;
        while self.shared.paused.load(Ordering::Acquire) && !self.should_exit() {
            let now = Instant::now();
            if now >= deadline {
                woken = false;
                break;
            }
            std::thread::sleep(PAUSE_QUANTUM.min(deadline - now));
        }
        self.shared.paused.store(false, Ordering::Release);
        woken
    }
}

/// Owned background thread.
///
/// Dropping a running worker signals it to exit and joins it.
#[derive(Debug)]
pub struct Worker {
    name: String,
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Creates a stopped worker. `name` labels the OS thread.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(WorkerShared::default()),
            handle: None,
        }
    }

    /// Thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns the thread running `body`.
    ///
    /// Fails with [`EngineError::ThreadAlreadyRunning`] if a previous body has
    /// not been joined yet.
    pub fn start<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&WorkerContext) + Send + 'static,
    {
        if self.handle.is_some() {
            return Err(EngineError::ThreadAlreadyRunning);
        }

        self.shared.should_exit.store(false, Ordering::Release);
        self.shared.paused.store(false, Ordering::Release);
        self.shared.running.store(true, Ordering::Release);

        let ctx = WorkerContext {
            shared: Arc::clone(&self.shared),
        };
        let spawned = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                body(&ctx);
                ctx.shared.running.store(false, Ordering::Release);
            });

        match spawned {
            Ok(handle) => {
                tracing::debug!(worker = %self.name, "worker_start: running");
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::Release);
                tracing::warn!(worker = %self.name, %err, "worker_start: spawn failed");
                Err(EngineError::ThreadStartFailed)
            }
        }
    }

    /// Asks the worker to finish.
    ///
    /// Fails with [`EngineError::ThreadInvalid`] when not started and with
    /// [`EngineError::ThreadShouldExitAlreadySet`] on a repeated request.
    pub fn set_should_exit(&self) -> Result<()> {
        if self.handle.is_none() {
            return Err(EngineError::ThreadInvalid);
        }
        if self.shared.should_exit.swap(true, Ordering::AcqRel) {
            return Err(EngineError::ThreadShouldExitAlreadySet);
        }
        Ok(())
    }

    /// Wakes a worker blocked in [`WorkerContext::pause`].
    pub fn resume(&self) -> Result<()> {
        if self.handle.is_none() {
            return Err(EngineError::ThreadInvalid);
        }
        self.shared.paused.store(false, Ordering::Release);
        Ok(())
    }

    /// Whether the worker is currently parked in a pause.
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Whether the body is still executing.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Joins the thread.
    ///
    /// Fails with [`EngineError::ThreadInvalid`] when there is nothing to join
    /// and [`EngineError::ThreadWaitFailed`] if the body panicked.
    pub fn wait(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or(EngineError::ThreadInvalid)?;
        handle.join().map_err(|_| {
            tracing::warn!(worker = %self.name, "worker_wait: body panicked");
            EngineError::ThreadWaitFailed
        })?;
        tracing::debug!(worker = %self.name, "worker_wait: joined");
        Ok(())
    }

    /// Signals exit (if not already signalled) and joins.
    pub fn stop(&mut self) -> Result<()> {
        match self.set_should_exit() {
            Ok(()) | Err(EngineError::ThreadShouldExitAlreadySet) => self.wait(),
            Err(err) => Err(err),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.handle.is_some()
            && let Err(err) = self.stop()
        {
            tracing::warn!(worker = %self.name, %err, "worker_drop: did not stop cleanly");
        }
    }
}
