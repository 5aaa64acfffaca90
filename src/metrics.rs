// Scan pipeline metrics
//
// Lightweight counters for the camera loop, the quick-scan controller and the
// request primer. Shared as Arc<ScanMetrics> and logged on shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Pipeline counters.
///
/// Uses atomic operations so every controller can record without locks.
#[derive(Debug)]
pub struct ScanMetrics {
    /// Camera sessions that reached the scanning phase
    pub camera_sessions: AtomicU64,

    /// Codes delivered by the camera loop
    pub camera_hits: AtomicU64,

    /// Frames whose detection pass failed (swallowed)
    pub detection_errors: AtomicU64,

    /// Actions that ran to completion
    pub actions_executed: AtomicU64,

    /// Actions that returned an error
    pub actions_failed: AtomicU64,

    /// Runs skipped because the same code ran within the dedupe window
    pub skipped_duplicate: AtomicU64,

    /// Runs skipped because an action was still in flight
    pub skipped_locked: AtomicU64,

    /// Runs skipped because the field was empty
    pub skipped_empty: AtomicU64,

    /// Underlying priming operations started
    pub primes_started: AtomicU64,

    start_time: Instant,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            camera_sessions: AtomicU64::new(0),
            camera_hits: AtomicU64::new(0),
            detection_errors: AtomicU64::new(0),
            actions_executed: AtomicU64::new(0),
            actions_failed: AtomicU64::new(0),
            skipped_duplicate: AtomicU64::new(0),
            skipped_locked: AtomicU64::new(0),
            skipped_empty: AtomicU64::new(0),
            primes_started: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_camera_session(&self) {
        self.camera_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_camera_hit(&self) {
        self.camera_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection_error(&self) {
        self.detection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished action, failed or not
    pub fn record_action(&self, succeeded: bool) {
        self.actions_executed.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.actions_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_skipped_duplicate(&self) {
        self.skipped_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_locked(&self) {
        self.skipped_locked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_empty(&self) {
        self.skipped_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prime_started(&self) {
        self.primes_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Scan Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Camera: {} sessions, {} hits, {} detection errors",
            self.camera_sessions.load(Ordering::Relaxed),
            self.camera_hits.load(Ordering::Relaxed),
            self.detection_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Actions: {} executed, {} failed",
            self.actions_executed.load(Ordering::Relaxed),
            self.actions_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Skipped runs: {} duplicate, {} locked, {} empty",
            self.skipped_duplicate.load(Ordering::Relaxed),
            self.skipped_locked.load(Ordering::Relaxed),
            self.skipped_empty.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Primer operations started: {}",
            self.primes_started.load(Ordering::Relaxed)
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = ScanMetrics::new();
        assert_eq!(metrics.camera_sessions.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.actions_executed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_actions() {
        let metrics = ScanMetrics::new();

        metrics.record_action(true);
        metrics.record_action(false);
        metrics.record_action(true);

        assert_eq!(metrics.actions_executed.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.actions_failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_skip_counters() {
        let metrics = ScanMetrics::new();

        metrics.record_skipped_duplicate();
        metrics.record_skipped_locked();
        metrics.record_skipped_locked();
        metrics.record_skipped_empty();

        assert_eq!(metrics.skipped_duplicate.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.skipped_locked.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.skipped_empty.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_uptime() {
        let metrics = ScanMetrics::new();
        thread::sleep(Duration::from_millis(10));
        assert!(metrics.uptime().as_millis() >= 10);
    }
}
