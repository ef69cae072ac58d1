//! Elapsed-time helpers.
//!
//! "Now" is sampled when the helper is called. A `start` in the future yields
//! a negative value, which is returned unclamped.

use std::time::Instant;

/// Whole microseconds since `start`, truncated toward zero.
pub fn elapsed_microseconds(start: Instant) -> i64 {
    elapsed_microseconds_between(start, Instant::now())
}

/// Fractional seconds since `start`.
pub fn elapsed_seconds(start: Instant) -> f64 {
    elapsed_seconds_between(start, Instant::now())
}

/// Whole microseconds from `start` to `now`, truncated toward zero.
pub fn elapsed_microseconds_between(start: Instant, now: Instant) -> i64 {
    match now.checked_duration_since(start) {
        Some(elapsed) => clamp_i64(elapsed.as_micros()),
        None => -clamp_i64(start.duration_since(now).as_micros()),
    }
}

/// Fractional seconds from `start` to `now`.
pub fn elapsed_seconds_between(start: Instant, now: Instant) -> f64 {
    match now.checked_duration_since(start) {
        Some(elapsed) => elapsed.as_secs_f64(),
        None => -start.duration_since(now).as_secs_f64(),
    }
}

fn clamp_i64(micros: u128) -> i64 {
    i64::try_from(micros).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_between_positive() {
        let start = Instant::now();
        let now = start + Duration::from_micros(2_500_000);

        assert_eq!(elapsed_microseconds_between(start, now), 2_500_000);
        assert_eq!(elapsed_seconds_between(start, now), 2.5);
    }

    #[test]
    fn test_between_truncates() {
        let start = Instant::now();
        let now = start + Duration::from_nanos(1_999);

        assert_eq!(elapsed_microseconds_between(start, now), 1);
    }

    #[test]
    fn test_between_negative() {
        let now = Instant::now();
        let start = now + Duration::from_nanos(1_000_999);

        assert_eq!(elapsed_microseconds_between(start, now), -1_000);
        assert!((elapsed_seconds_between(start, now) + 0.001000999).abs() < 1e-12);
    }

    #[test]
    fn test_between_zero() {
        let now = Instant::now();
        assert_eq!(elapsed_microseconds_between(now, now), 0);
        assert_eq!(elapsed_seconds_between(now, now), 0.0);
    }
}
