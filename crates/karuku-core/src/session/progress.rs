//! Throughput and remaining-time estimates for running sessions.

use serde::Serialize;
use std::time::Duration;

/// Point-in-time progress of a load or batch session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Time since item processing started (zero while still scanning)
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn done(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Completed fraction in 0.0..=1.0; an empty session counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.done() as f64 / self.total as f64).min(1.0)
    }

    /// Items per second, once at least one item finished.
    pub fn throughput(&self) -> Option<f64> {
        throughput(self.done(), self.elapsed)
    }

    /// Estimated time left: `(total - done) / throughput`.
    pub fn eta(&self) -> Option<Duration> {
        estimate_remaining(self.total, self.done(), self.elapsed)
    }

    /// One-line status such as `12/40 (ok 11, failed 1) | ~0m31s left | 0.9/s`.
    pub fn status_line(&self) -> String {
        let eta = self
            .eta()
            .map(|d| format!("~{} left", format_duration(d)))
            .unwrap_or_else(|| "estimating".to_string());
        let speed = self
            .throughput()
            .map(|s| format!("{:.1}/s", s))
            .unwrap_or_else(|| "-/s".to_string());
        format!(
            "{}/{} (ok {}, failed {}) | {} | {}",
            self.done(),
            self.total,
            self.succeeded,
            self.failed,
            eta,
            speed
        )
    }
}

/// Items per second over `elapsed`.
pub fn throughput(done: usize, elapsed: Duration) -> Option<f64> {
    if done == 0 {
        return None;
    }
    let secs = elapsed.as_secs_f64().max(0.001);
    Some(done as f64 / secs)
}

/// Remaining time at the current throughput.
pub fn estimate_remaining(total: usize, done: usize, elapsed: Duration) -> Option<Duration> {
    if total == 0 {
        return None;
    }
    let speed = throughput(done, elapsed)?;
    let remaining = total.saturating_sub(done) as f64 / speed;
    Some(Duration::from_secs_f64(remaining.max(0.0)))
}

/// Compact duration: `42s`, `3m05s`, `1h02m`.
pub fn format_duration(duration: Duration) -> String {
    let whole = duration.as_secs();
    if whole < 60 {
        return format!("{}s", whole);
    }
    let (minutes, secs) = (whole / 60, whole % 60);
    if minutes < 60 {
        return format!("{}m{:02}s", minutes, secs);
    }
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_millis(59_900)), "59s");
        assert_eq!(format_duration(Duration::from_secs(185)), "3m05s");
        assert_eq!(format_duration(Duration::from_secs(3720)), "1h02m");
    }

    #[test]
    fn test_eta_from_throughput() {
        // 10 done in 5s -> 2/s -> 30 remaining take 15s
        let eta = estimate_remaining(40, 10, Duration::from_secs(5)).unwrap();
        assert_eq!(eta, Duration::from_secs(15));
        assert!(estimate_remaining(40, 0, Duration::from_secs(5)).is_none());
        assert!(estimate_remaining(0, 0, Duration::ZERO).is_none());
    }

    #[test]
    fn test_snapshot() {
        let snapshot = ProgressSnapshot {
            total: 4,
            succeeded: 1,
            failed: 1,
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(snapshot.done(), 2);
        assert!((snapshot.fraction() - 0.5).abs() < f64::EPSILON);
        assert_eq!(snapshot.throughput(), Some(1.0));
        assert!(snapshot.status_line().starts_with("2/4 (ok 1, failed 1) | ~2s left"));
    }

    #[test]
    fn test_empty_session_is_complete() {
        let snapshot = ProgressSnapshot {
            total: 0,
            succeeded: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        };
        assert_eq!(snapshot.fraction(), 1.0);
        assert!(snapshot.eta().is_none());
    }
}
