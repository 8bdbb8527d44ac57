//! Mapping of high resolution server timestamps onto the local monotonic clock.
//!
//! Frame timing messages carry server time interpolated to microseconds. When
//! the server clock is the same monotonic clock as ours the values are used
//! as-is, otherwise a measured offset is subtracted.

use nix::time::{clock_gettime, ClockId};

/// Calibration is redone when a converted time is this far past the last query
const RECALIBRATE_AFTER_US: i64 = 10 * 1_000_000;
/// Server and local clocks closer than this are treated as the same clock
const SAME_CLOCK_TOLERANCE_US: i64 = 1_000_000;

/// Source of the local monotonic time, in microseconds
pub type MonotonicClock = fn() -> i64;

/// Read `CLOCK_MONOTONIC` in microseconds
#[must_use]
pub fn monotonic_time() -> i64 {
    clock_gettime(ClockId::CLOCK_MONOTONIC)
        .map(|ts| ts.tv_sec() * 1_000_000 + ts.tv_nsec() / 1_000)
        .unwrap_or_else(|e| {
            log::error!("failed to read the monotonic clock: {}", e);
            0
        })
}

/// Cached relationship between server time and local monotonic time
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerTimeOracle {
    /// Local time of the last calibration, `0` if never calibrated
    query_time:   i64,
    /// Whether the server clock is the local monotonic clock
    is_monotonic: bool,
    /// `server - local`, in microseconds
    offset:       i64,
}

impl ServerTimeOracle {
    /// Create an uncalibrated oracle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if converting `server_time` needs a fresh server query
    #[must_use]
    pub const fn needs_calibration(&self, server_time: i64) -> bool {
        self.query_time == 0
            || (!self.is_monotonic && server_time > self.query_time + RECALIBRATE_AFTER_US)
    }

    /// Record a server time sample (milliseconds) taken at local time `now`
    pub fn calibrate(&mut self, server_time_ms: u32, now: i64) {
        let server_us = i64::from(server_time_ms) * 1000;
        self.query_time = now;

        if server_us > now - SAME_CLOCK_TOLERANCE_US && server_us < now + SAME_CLOCK_TOLERANCE_US {
            self.is_monotonic = true;
        }
        self.offset = server_us - now;

        log::debug!(
            "calibrated server time: monotonic={} offset={}us",
            self.is_monotonic,
            self.offset
        );
    }

    /// Convert a calibrated server time in microseconds to local time
    #[must_use]
    pub const fn convert(&self, server_time: i64) -> i64 {
        if self.is_monotonic {
            server_time
        } else {
            server_time - self.offset
        }
    }

    /// Whether the server shares the local monotonic clock
    #[must_use]
    pub const fn is_monotonic(&self) -> bool {
        self.is_monotonic
    }

    /// Local time of the last calibration
    #[must_use]
    pub const fn query_time(&self) -> i64 {
        self.query_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_clocks_match() {
        let mut oracle = ServerTimeOracle::new();
        assert!(oracle.needs_calibration(5_000_000));

        // server says 5000ms, local clock 5.2s
        oracle.calibrate(5_000, 5_200_000);
        assert!(oracle.is_monotonic());
        assert_eq!(oracle.convert(7_123_456), 7_123_456);
        assert!(!oracle.needs_calibration(60_000_000));
    }

    #[test]
    fn offset_when_clocks_differ() {
        let mut oracle = ServerTimeOracle::new();
        oracle.calibrate(100_000, 2_000_000);
        assert!(!oracle.is_monotonic());
        assert_eq!(oracle.convert(100_500_000), 2_500_000);
    }

    #[test]
    fn recalibrates_after_ten_seconds() {
        let mut oracle = ServerTimeOracle::new();
        oracle.calibrate(100_000, 2_000_000);
        assert!(!oracle.needs_calibration(12_000_000));
        assert!(oracle.needs_calibration(12_000_001));
    }

    #[test]
    fn monotonic_clock_advances() {
        let a = monotonic_time();
        let b = monotonic_time();
        assert!(a > 0);
        assert!(b >= a);
    }
}
