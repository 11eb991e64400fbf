use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::prelude::*;

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error(
        "invalid subdivision '{0}'; must be one of: 1/32, 1/16, 1/8, 1/4"
    )]
    InvalidSubdivision(String),
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(String),
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Subdivision {
    ThirtySecond,
    Sixteenth,
    Eighth,
    #[default]
    Quarter,
}

impl Subdivision {
    pub const ALL: [Subdivision; 4] = [
        Subdivision::ThirtySecond,
        Subdivision::Sixteenth,
        Subdivision::Eighth,
        Subdivision::Quarter,
    ];

    /// Fraction of a beat, e.g. `1/4 => 0.25`
    pub fn value(self) -> f64 {
        match self {
            Self::ThirtySecond => 1.0 / 32.0,
            Self::Sixteenth => 1.0 / 16.0,
            Self::Eighth => 1.0 / 8.0,
            Self::Quarter => 1.0 / 4.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThirtySecond => "1/32",
            Self::Sixteenth => "1/16",
            Self::Eighth => "1/8",
            Self::Quarter => "1/4",
        }
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subdivision {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|division| division.as_str() == s.trim())
            .ok_or_else(|| ClockError::InvalidSubdivision(s.to_string()))
    }
}

/// Milliseconds between ticks for the given tempo and subdivision.
pub fn interval_ms(bpm: f32, subdivision: Subdivision) -> f64 {
    (MS_PER_MINUTE / bpm as f64) * subdivision.value()
}

/// Derives a tick counter from wall-clock time.
///
/// The tick is always computed from the elapsed time since a start anchor, so
/// irregular polling never accumulates drift. The anchor is set lazily by the
/// first [`Clock::tick`] after construction or [`Clock::reset`].
#[derive(Clone, Debug)]
pub struct Clock {
    interval: Option<Duration>,
    start: Option<Instant>,
    current: u64,
}

impl Clock {
    /// Builds a clock from a tempo and a division string such as `"1/16"`.
    /// An invalid configuration is logged and produces a clock that never
    /// advances.
    pub fn new(bpm: f32, division: &str) -> Self {
        let mut clock = Self {
            interval: None,
            start: None,
            current: 0,
        };
        clock.set_tempo(bpm, division);
        clock
    }

    pub fn with_subdivision(bpm: f32, subdivision: Subdivision) -> Self {
        Self::new(bpm, subdivision.as_str())
    }

    /// Reconfigures tempo and division without moving the start anchor.
    pub fn set_tempo(&mut self, bpm: f32, division: &str) {
        self.interval = match resolve_interval(bpm, division) {
            Ok(interval) => Some(interval),
            Err(err) => {
                error!("{}; clock will not advance", err);
                None
            }
        };
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Returns the new tick only when it differs from the last published one.
    pub fn tick(&mut self, now: Instant) -> Option<u64> {
        let interval = self.interval?;
        let start = *self.start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        let ticks = (elapsed.as_secs_f64() / interval.as_secs_f64()).floor();
        let ticks = ticks as u64;

        if ticks == self.current {
            return None;
        }

        self.current = ticks;
        Some(ticks)
    }

    pub fn reset(&mut self) -> u64 {
        self.start = None;
        self.current = 0;
        self.current
    }
}

fn resolve_interval(bpm: f32, division: &str) -> Result<Duration, ClockError> {
    let subdivision = division.parse::<Subdivision>()?;

    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(ClockError::InvalidTempo(bpm.to_string()));
    }

    // Extreme tempos give intervals a Duration cannot hold, or one of zero.
    match Duration::try_from_secs_f64(interval_ms(bpm, subdivision) / 1000.0) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => Err(ClockError::InvalidTempo(bpm.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_supported_subdivisions() {
        for division in Subdivision::ALL {
            assert_eq!(division.as_str().parse::<Subdivision>(), Ok(division));
        }
        assert_eq!(
            "1/3".parse::<Subdivision>(),
            Err(ClockError::InvalidSubdivision("1/3".to_string()))
        );
    }

    #[test]
    fn interval_at_120_bpm() {
        assert_eq!(interval_ms(120.0, Subdivision::Quarter), 125.0);
        assert_eq!(interval_ms(120.0, Subdivision::ThirtySecond), 15.625);
    }

    #[test]
    fn first_tick_anchors_time_zero() {
        let start = Instant::now();
        let mut clock = Clock::new(120.0, "1/4");

        assert_eq!(clock.tick(start), None);
        assert_eq!(clock.tick(start + Duration::from_millis(124)), None);
        assert_eq!(clock.tick(start + Duration::from_millis(125)), Some(1));
        assert_eq!(clock.current(), 1);
    }

    #[test]
    fn only_publishes_changes() {
        let start = Instant::now();
        let mut clock = Clock::new(120.0, "1/4");
        clock.tick(start);

        assert_eq!(clock.tick(start + Duration::from_millis(130)), Some(1));
        assert_eq!(clock.tick(start + Duration::from_millis(140)), None);
        assert_eq!(clock.tick(start + Duration::from_millis(250)), Some(2));
    }

    #[test]
    fn derives_ticks_from_anchor_without_drift() {
        let start = Instant::now();
        let mut clock = Clock::new(120.0, "1/4");
        clock.tick(start);

        // Sparse, irregular polling still lands on the exact tick.
        assert_eq!(clock.tick(start + Duration::from_millis(1_010)), Some(8));
        assert_eq!(
            clock.tick(start + Duration::from_millis(10_000)),
            Some(80)
        );
    }

    #[test]
    fn reset_reanchors_on_next_tick() {
        let start = Instant::now();
        let mut clock = Clock::new(120.0, "1/4");
        clock.tick(start);
        clock.tick(start + Duration::from_millis(500));
        assert_eq!(clock.current(), 4);

        assert_eq!(clock.reset(), 0);
        let later = start + Duration::from_secs(5);
        assert_eq!(clock.tick(later), None);
        assert_eq!(clock.tick(later + Duration::from_millis(125)), Some(1));
    }

    #[test]
    fn invalid_division_never_advances() {
        let start = Instant::now();
        let mut clock = Clock::new(120.0, "1/3");
        assert!(!clock.is_running());
        assert_eq!(clock.tick(start), None);
        assert_eq!(clock.tick(start + Duration::from_secs(10)), None);
        assert_eq!(clock.current(), 0);
    }

    #[test]
    fn non_positive_tempo_never_advances() {
        let start = Instant::now();
        let mut clock = Clock::new(0.0, "1/4");
        assert_eq!(clock.tick(start + Duration::from_secs(1)), None);

        clock.set_tempo(120.0, "1/4");
        assert!(clock.is_running());
    }

    #[test]
    fn extreme_tempo_stays_idle() {
        let start = Instant::now();
        let mut slow = Clock::new(1e-20, "1/4");
        assert!(!slow.is_running());
        assert_eq!(slow.tick(start + Duration::from_secs(1)), None);

        let fast = Clock::new(f32::MAX, "1/32");
        assert!(!fast.is_running());
        assert_eq!(
            resolve_interval(1e-20, "1/4"),
            Err(ClockError::InvalidTempo(1e-20_f32.to_string()))
        );
    }
}
