//! Progress reporting for long-running model builds and allocations.
//!
//! The statistics build and the allocation both run as single batch
//! computations; they push `(fraction, message)` updates through this trait.
//! Updates may be emitted from worker threads, so implementations must be
//! `Send + Sync`.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

/// Receiver for fractional progress updates.
pub trait ProgressSink: Send + Sync {
    /// Called with the overall completed fraction in `[0, 1]` and a short
    /// status message describing the current phase.
    fn report(&self, fraction: f64, message: &str);
}

/// No-op implementation for callers that do not track progress.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _fraction: f64, _message: &str) {}
}

/// Forwards progress updates to the `log` facade at info level.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, fraction: f64, message: &str) {
        info!("[{:>3.0}%] {}", fraction * 100.0, message);
    }
}

/// Pollable progress tracker holding the latest update.
///
/// The fraction is stored as atomic bits so another thread can poll it
/// without taking the message lock.
#[derive(Default)]
pub struct ProgressTracker {
    fraction_bits: AtomicU64,
    message: Mutex<String>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fraction(&self) -> f64 {
        f64::from_bits(self.fraction_bits.load(Ordering::SeqCst))
    }

    pub fn message(&self) -> String {
        self.message.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl ProgressSink for ProgressTracker {
    fn report(&self, fraction: f64, message: &str) {
        self.fraction_bits
            .store(fraction.to_bits(), Ordering::SeqCst);
        if let Ok(mut m) = self.message.lock() {
            *m = message.to_string();
        }
    }
}
