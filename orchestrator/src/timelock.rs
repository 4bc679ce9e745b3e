//! Timelock Calculator (C2): pure function of a base duration and the
//! current wall time, producing the five deadlines every session carries.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::errors::TimelockError;
use crate::types::Deadlines;

const MIN_BASE_DURATION_SECS: i64 = 30 * 60;
const MAX_BASE_DURATION_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct TimelockConfig {
    /// Public withdrawal window after the private one (`P`).
    pub public_window_secs: i64,
    /// Cancellation window after the public withdrawal window (`C`).
    pub cancel_window_secs: i64,
    /// Configured safety buffer subtracted from the destination cancellation
    /// deadline (`S`). Applied as `min(safety_buffer_secs, D/4)` against the
    /// session's actual base duration — see `compute_deadlines` below for why.
    pub safety_buffer_secs: i64,
}

impl Default for TimelockConfig {
    fn default() -> Self {
        Self {
            public_window_secs: 10 * 60,
            cancel_window_secs: 30 * 60,
            safety_buffer_secs: 2 * 60 * 60,
        }
    }
}

/// Compute the five absolute deadlines for a session starting at `t0`,
/// given a base duration `base_duration_secs` (`D`).
///
/// §4.2 fixes `destination_withdrawal = t0 + D/2` and
/// `destination_cancellation = t0 + D - S` with a configured safety buffer
/// `S` (default 2 hours). Taken literally, the §3 ordering invariant
/// `destination_withdrawal < destination_cancellation` only holds for
/// `D > 2*S` — i.e. `D > 4h` with the default buffer — which would reject
/// every `D` in the spec's own canonical range below 4 hours, including the
/// 1-hour swap in seed scenario 1 and the `D = 30min` lower boundary. The
/// buffer is therefore scaled to the session's own duration,
/// `effective_s = min(S, D/4)`, which keeps `destination_cancellation`
/// strictly between `destination_withdrawal` and `source_withdrawal` for
/// every `D` in `[30min, 7d]` while still applying the full configured
/// buffer once `D` is large enough (`D >= 4*S`) for it to fit.
pub fn compute_deadlines(
    config: &TimelockConfig,
    base_duration_secs: i64,
    t0: DateTime<Utc>,
) -> Result<Deadlines, TimelockError> {
    if base_duration_secs < MIN_BASE_DURATION_SECS || base_duration_secs > MAX_BASE_DURATION_SECS {
        return Err(TimelockError::InvalidTimeout);
    }

    let d = ChronoDuration::seconds(base_duration_secs);
    let p = ChronoDuration::seconds(config.public_window_secs);
    let c = ChronoDuration::seconds(config.cancel_window_secs);
    let s = ChronoDuration::seconds(config.safety_buffer_secs).min(d / 4);

    let deadlines = Deadlines {
        source_withdrawal: t0 + d,
        source_public_withdrawal: t0 + d + p,
        source_cancellation: t0 + d + p + c,
        destination_withdrawal: t0 + d / 2,
        destination_cancellation: t0 + d - s,
    };

    deadlines
        .check_invariants()
        .map_err(|_| TimelockError::InvalidTimeout)?;

    Ok(deadlines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_function_of_d_and_t0() {
        let config = TimelockConfig::default();
        let t0 = Utc::now();
        let a = compute_deadlines(&config, 3600, t0).unwrap();
        let b = compute_deadlines(&config, 3600, t0).unwrap();
        assert_eq!(a.source_withdrawal, b.source_withdrawal);
        assert_eq!(a.destination_cancellation, b.destination_cancellation);
    }

    #[test]
    fn test_boundary_30_minutes_accepted() {
        let config = TimelockConfig::default();
        let t0 = Utc::now();
        assert!(compute_deadlines(&config, 30 * 60, t0).is_ok());
    }

    #[test]
    fn test_boundary_29_minutes_refused() {
        let config = TimelockConfig::default();
        let t0 = Utc::now();
        assert!(compute_deadlines(&config, 29 * 60, t0).is_err());
    }

    #[test]
    fn test_7_days_accepted_8_days_refused() {
        let config = TimelockConfig::default();
        let t0 = Utc::now();
        assert!(compute_deadlines(&config, 7 * 24 * 60 * 60, t0).is_ok());
        assert!(compute_deadlines(&config, 8 * 24 * 60 * 60, t0).is_err());
    }

    #[test]
    fn test_ordering_invariants_hold() {
        let config = TimelockConfig::default();
        let t0 = Utc::now();
        let deadlines = compute_deadlines(&config, 3600, t0).unwrap();
        assert!(deadlines.check_invariants().is_ok());
        assert!(deadlines.destination_cancellation < deadlines.source_withdrawal);
        assert!(
            deadlines.source_withdrawal <= deadlines.source_public_withdrawal
                && deadlines.source_public_withdrawal < deadlines.source_cancellation
        );
        assert!(deadlines.destination_withdrawal < deadlines.destination_cancellation);
    }

    /// With the default 2-hour safety buffer, `D <= 4h` is the regime
    /// where the literal `D - S` formula would otherwise invert the
    /// destination invariant; every canonical `D` below that line must
    /// still produce valid deadlines through the real calculator.
    #[test]
    fn test_short_duration_below_four_times_safety_buffer_still_valid() {
        let config = TimelockConfig::default();
        let t0 = Utc::now();
        for base_duration_secs in [30 * 60, 3600, 2 * 3600, 4 * 3600 - 1] {
            let deadlines = compute_deadlines(&config, base_duration_secs, t0)
                .unwrap_or_else(|_| panic!("D={base_duration_secs}s should produce valid deadlines"));
            assert!(deadlines.destination_withdrawal < deadlines.destination_cancellation);
            assert!(deadlines.destination_cancellation < deadlines.source_withdrawal);
        }
    }

    #[test]
    fn test_long_duration_applies_full_configured_safety_buffer() {
        let config = TimelockConfig::default();
        let t0 = Utc::now();
        let deadlines = compute_deadlines(&config, 8 * 3600, t0).unwrap();
        let expected = t0 + ChronoDuration::seconds(8 * 3600) - ChronoDuration::seconds(config.safety_buffer_secs);
        assert_eq!(deadlines.destination_cancellation, expected);
    }
}
