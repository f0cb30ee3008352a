//! Periodic homing of all flap modules.

/// Default gap between forced re-homes: 144 minutes.
pub const DEFAULT_RECALIBRATION_INTERVAL_MS: u64 = 144 * 60 * 1_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecalibrationScheduler {
    interval_ms: u64,
}

impl Default for RecalibrationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RECALIBRATION_INTERVAL_MS)
    }
}

impl RecalibrationScheduler {
    pub const fn new(interval_ms: u64) -> Self {
        Self { interval_ms }
    }

    pub const fn is_due(&self, last_calibration_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(last_calibration_ms) > self.interval_ms
    }

    /// Returns true when a recalibration should run now and restarts the
    /// interval from `now_ms`.
    pub fn poll(&self, last_calibration_ms: &mut u64, now_ms: u64) -> bool {
        if !self.is_due(*last_calibration_ms, now_ms) {
            return false;
        }

        *last_calibration_ms = now_ms;
        true
    }
}
