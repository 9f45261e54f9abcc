//! Expiry countdown formatting.

use crate::types::TimeLeft;
use chrono::Utc;

/// Format the time remaining until `expires_at` (epoch seconds), relative
/// to `now` (epoch seconds, floored).
///
/// At or past expiry the text is the literal `EXPIRED` with zero seconds.
/// Otherwise the largest units present are shown: `1h 2m 5s`, `2m 5s`, or
/// `5s`. Pure; callers keeping a live countdown must re-invoke at least
/// once per second rather than cache the text.
pub fn format_time_left(expires_at: i64, now: i64) -> TimeLeft {
    let diff = expires_at - now;

    if diff <= 0 {
        return TimeLeft {
            text: "EXPIRED".to_string(),
            seconds: 0,
        };
    }

    let hours = diff / 3600;
    let minutes = (diff % 3600) / 60;
    let seconds = diff % 60;

    let text = if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    };

    TimeLeft {
        text,
        seconds: diff,
    }
}

/// [`format_time_left`] against the current wall clock.
pub fn time_left(expires_at: i64) -> TimeLeft {
    format_time_left(expires_at, Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn expired_at_or_before_now() {
        for expires_at in [NOW, NOW - 1, NOW - 86_400, 0] {
            let left = format_time_left(expires_at, NOW);
            assert_eq!(left.text, "EXPIRED");
            assert_eq!(left.seconds, 0);
            assert!(left.is_expired());
        }
    }

    #[test]
    fn hours_minutes_seconds() {
        let left = format_time_left(NOW + 3725, NOW);
        assert_eq!(left.text, "1h 2m 5s");
        assert_eq!(left.seconds, 3725);
    }

    #[test]
    fn minutes_seconds_without_hours() {
        let left = format_time_left(NOW + 90, NOW);
        assert_eq!(left.text, "1m 30s");
        assert_eq!(left.seconds, 90);
    }

    #[test]
    fn seconds_alone() {
        let left = format_time_left(NOW + 45, NOW);
        assert_eq!(left.text, "45s");
        assert_eq!(left.seconds, 45);
    }

    #[test]
    fn zero_components_are_kept_inside_larger_units() {
        assert_eq!(format_time_left(NOW + 3600, NOW).text, "1h 0m 0s");
        assert_eq!(format_time_left(NOW + 60, NOW).text, "1m 0s");
    }

    #[test]
    fn expiring_soon_threshold() {
        assert!(format_time_left(NOW + 119, NOW).is_expiring_soon());
        assert!(!format_time_left(NOW + 120, NOW).is_expiring_soon());
        assert!(!format_time_left(NOW, NOW).is_expiring_soon());
    }
}
