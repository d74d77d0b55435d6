//! Scene clock.
//!
//! The clock decides which instant time-dependent data (sampled positions,
//! path trails) is evaluated at. When `should_animate` is set it advances on
//! every [`Clock::tick`] without the caller having to drive it explicitly.

use chrono::{DateTime, TimeDelta, Utc};

/// Time range a data source is defined over, and how to play it back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockRange {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub current: DateTime<Utc>,
    pub multiplier: f64,
}

#[derive(Clone, Debug)]
pub struct Clock {
    pub current: DateTime<Utc>,
    pub multiplier: f64,
    pub should_animate: bool,
    /// Optional playback range; ticking past `stop` loops back to `start`.
    pub range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// Converts seconds to a [`TimeDelta`] with microsecond resolution.
pub fn seconds(s: f64) -> TimeDelta {
    TimeDelta::microseconds((s * 1e6).round() as i64)
}

/// `t` shifted by `s` seconds, or `None` when the result is not a
/// representable instant.
pub fn offset_by(t: DateTime<Utc>, s: f64) -> Option<DateTime<Utc>> {
    if !s.is_finite() {
        return None;
    }
    t.checked_add_signed(seconds(s))
}

/// Seconds elapsed from `from` to `to` (negative if `to` is earlier).
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let d = to - from;
    match d.num_microseconds() {
        Some(us) => us as f64 * 1e-6,
        None => d.num_milliseconds() as f64 * 1e-3,
    }
}

impl Clock {
    pub fn new(current: DateTime<Utc>, should_animate: bool) -> Self {
        Self {
            current,
            multiplier: 1.0,
            should_animate,
            range: None,
        }
    }

    /// Advances the clock by `dt` real seconds scaled by `multiplier`.
    ///
    /// Does nothing while `should_animate` is off.
    pub fn tick(&mut self, dt: f64) {
        if !self.should_animate {
            return;
        }
        let next = offset_by(self.current, dt * self.multiplier);
        self.current = match (next, self.range) {
            (Some(t), Some((start, stop))) if t < start || t > stop => start,
            (Some(t), _) => t,
            (None, Some((start, _))) => start,
            (None, None) => self.current,
        };
    }

    /// Takes over the range, current time and multiplier of a data source.
    pub fn track(&mut self, range: &ClockRange) {
        self.range = Some((range.start, range.stop));
        self.current = range.current;
        self.multiplier = range.multiplier;
    }

    /// Moves the current time to `t`, clamped into the range if there is one.
    pub fn set_current(&mut self, t: DateTime<Utc>) {
        self.current = match self.range {
            Some((start, stop)) => t.clamp(start, stop),
            None => t,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn tick_advances_only_when_animating() {
        let mut clock = Clock::new(t0(), false);
        clock.tick(5.0);
        assert_eq!(clock.current, t0());

        clock.should_animate = true;
        clock.multiplier = 10.0;
        clock.tick(0.5);
        assert_eq!(clock.current, t0() + TimeDelta::seconds(5));
    }

    #[test]
    fn tick_loops_back_at_range_stop() {
        let mut clock = Clock::new(t0(), true);
        clock.track(&ClockRange {
            start: t0(),
            stop: t0() + TimeDelta::seconds(10),
            current: t0() + TimeDelta::seconds(8),
            multiplier: 1.0,
        });

        clock.tick(1.0);
        assert_eq!(clock.current, t0() + TimeDelta::seconds(9));

        clock.tick(3.0);
        assert_eq!(clock.current, t0());
    }

    #[test]
    fn set_current_clamps_into_range() {
        let mut clock = Clock::new(t0(), true);
        clock.range = Some((t0(), t0() + TimeDelta::seconds(60)));
        clock.set_current(t0() + TimeDelta::seconds(600));
        assert_eq!(clock.current, t0() + TimeDelta::seconds(60));
    }

    #[test]
    fn tick_with_huge_multiplier_wraps_instead_of_overflowing() {
        let mut clock = Clock::new(t0(), true);
        clock.multiplier = 1e300;
        clock.tick(1.0);
        assert_eq!(clock.current, t0());

        clock.range = Some((t0(), t0() + TimeDelta::seconds(10)));
        clock.current = t0() + TimeDelta::seconds(5);
        clock.tick(1.0);
        assert_eq!(clock.current, t0());
    }

    #[test]
    fn offset_by_rejects_unrepresentable_instants() {
        assert_eq!(offset_by(t0(), 2.0), Some(t0() + TimeDelta::seconds(2)));
        assert_eq!(offset_by(t0(), 1e13), None);
        assert_eq!(offset_by(t0(), f64::NAN), None);
    }

    #[test]
    fn seconds_between_is_signed() {
        let later = t0() + seconds(1.5);
        assert!((seconds_between(t0(), later) - 1.5).abs() < 1e-9);
        assert!((seconds_between(later, t0()) + 1.5).abs() < 1e-9);
    }
}
