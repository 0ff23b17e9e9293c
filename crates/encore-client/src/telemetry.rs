//! Run-wide failure telemetry
//!
//! Two consumers: the level-up gate reads "was anything fatal or slow in the
//! last few seconds", and the final result carries the full error log. The
//! log can be frozen at the run deadline so trailing completions stop
//! accumulating noise.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct Telemetry {
    last_error: Mutex<Option<(String, Instant)>>,
    last_slow: Mutex<Option<(String, Instant)>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&self, message: impl Into<String>) {
        *self.last_error.lock() = Some((message.into(), Instant::now()));
    }

    pub fn record_slow(&self, path: impl Into<String>) {
        *self.last_slow.lock() = Some((path.into(), Instant::now()));
    }

    /// The most recent error message, if it happened within `window`.
    pub fn recent_error(&self, window: Duration) -> Option<String> {
        self.last_error
            .lock()
            .as_ref()
            .filter(|(_, at)| at.elapsed() < window)
            .map(|(msg, _)| msg.clone())
    }

    /// The most recent slow path, if it happened within `window`.
    pub fn recent_slow(&self, window: Duration) -> Option<String> {
        self.last_slow
            .lock()
            .as_ref()
            .filter(|(_, at)| at.elapsed() < window)
            .map(|(path, _)| path.clone())
    }
}

#[derive(Debug, Default)]
pub struct ErrorLog {
    frozen: AtomicBool,
    entries: Mutex<Vec<String>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message: impl Into<String>) {
        if self.frozen.load(Ordering::Acquire) {
            return;
        }
        self.entries.lock().push(message.into());
    }

    /// Stop collecting; in-flight requests finishing after the deadline
    /// should not show up in the result.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_error_window() {
        let telemetry = Telemetry::new();
        assert!(telemetry.recent_error(Duration::from_secs(5)).is_none());

        telemetry.record_error("remains out of range");
        assert!(telemetry.recent_error(Duration::from_secs(5)).is_some());
        assert!(telemetry.recent_error(Duration::from_nanos(0)).is_none());
    }

    #[test]
    fn test_error_log_freezes() {
        let log = ErrorLog::new();
        log.record("one");
        log.freeze();
        log.record("two");
        assert_eq!(log.entries(), vec!["one".to_string()]);
    }
}
