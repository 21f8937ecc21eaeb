//! Parsing for `ffmpeg -progress` key/value output.

/// Turns `out_time_ms` reports into a monotonic percentage capped at 99.
///
/// `ffmpeg` reports `out_time_ms` in microseconds despite the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTracker {
    total_micros: i64,
    last: u8,
}

impl ProgressTracker {
    /// Largest percentage reported before the process exits successfully.
    pub const CEILING: u8 = 99;

    /// Tracker for a source of `duration_secs`; non-positive durations never report.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(duration_secs: f64) -> Self {
        let total_micros = if duration_secs.is_finite() && duration_secs > 0.0 {
            (duration_secs * 1_000_000.0) as i64
        } else {
            0
        };
        Self {
            total_micros,
            last: 0,
        }
    }

    /// Feed one output line; returns a new percentage when progress advanced.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        if self.total_micros <= 0 {
            return None;
        }
        let (key, value) = line.trim().split_once('=')?;
        if key != "out_time_ms" {
            return None;
        }
        let micros: i64 = value.trim().parse().ok()?;
        let percent = (micros as f64 / self.total_micros as f64 * 100.0)
            .clamp(0.0, f64::from(Self::CEILING)) as u8;
        if percent > self.last {
            self.last = percent;
            return Some(percent);
        }
        None
    }
}

/// Parse `ffprobe` duration output (seconds as a decimal string).
#[must_use]
pub fn parse_duration(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_monotonic_percentages() {
        let mut tracker = ProgressTracker::new(100.0);
        assert_eq!(tracker.observe("frame=10"), None);
        assert_eq!(tracker.observe("out_time_ms=25000000"), Some(25));
        assert_eq!(tracker.observe("out_time_ms=10000000"), None);
        assert_eq!(tracker.observe("out_time_ms=25500000"), None);
        assert_eq!(tracker.observe(" out_time_ms=50000000 "), Some(50));
        assert_eq!(tracker.observe("out_time_ms=N/A"), None);
    }

    #[test]
    fn caps_below_completion() {
        let mut tracker = ProgressTracker::new(10.0);
        assert_eq!(tracker.observe("out_time_ms=99999999"), Some(99));
        assert_eq!(tracker.observe("out_time_ms=10000000"), None);
    }

    #[test]
    fn unknown_duration_never_reports() {
        let mut tracker = ProgressTracker::new(0.0);
        assert_eq!(tracker.observe("out_time_ms=5000000"), None);
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("12.5\n"), Some(12.5));
        assert_eq!(parse_duration("-3"), None);
    }
}
