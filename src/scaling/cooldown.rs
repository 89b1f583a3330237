//! Per-direction cooldown tracking
//!
//! Tracks the last successful scale in each direction so the controller can
//! enforce a minimum dwell time between adjustments of the same sense and
//! avoid flapping. Both timestamps start at the loop's start time: a fresh
//! controller waits out each cooldown once before its first scale in that
//! direction.

use std::time::{Duration, Instant};

use super::Direction;
use crate::config::AutoscalerConfig;

/// Last scale-up and scale-down times
///
/// Owned exclusively by the controller loop; no locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownTracker {
    last_scale_up: Instant,
    last_scale_down: Instant,
}

impl CooldownTracker {
    /// Anchor both directions at `start`
    pub fn new(start: Instant) -> Self {
        Self {
            last_scale_up: start,
            last_scale_down: start,
        }
    }

    /// Time of the last applied change in `direction` (or the start anchor)
    pub fn last_scale(&self, direction: Direction) -> Instant {
        match direction {
            Direction::Up => self.last_scale_up,
            Direction::Down => self.last_scale_down,
        }
    }

    /// End of the cooldown for `direction`, `None` when it lies beyond what
    /// `Instant` can represent
    fn cooldown_end(&self, direction: Direction, config: &AutoscalerConfig) -> Option<Instant> {
        self.last_scale(direction).checked_add(config.cooldown(direction))
    }

    /// True while `now` is before `last_scale + cooldown` for `direction`.
    /// A cooldown too long to represent never ends.
    pub fn in_cooldown(&self, direction: Direction, now: Instant, config: &AutoscalerConfig) -> bool {
        self.cooldown_end(direction, config).map_or(true, |end| now < end)
    }

    /// Time left before `direction` leaves cooldown; zero once it has,
    /// `Duration::MAX` when it never will
    pub fn remaining(&self, direction: Direction, now: Instant, config: &AutoscalerConfig) -> Duration {
        self.cooldown_end(direction, config)
            .map_or(Duration::MAX, |end| end.saturating_duration_since(now))
    }

    /// Record an applied replica change.
    ///
    /// Call only after the workload confirmed the new count; a no-op or
    /// failed write must not restart the cooldown.
    pub fn record_scale(&mut self, direction: Direction, now: Instant) {
        match direction {
            Direction::Up => self.last_scale_up = now,
            Direction::Down => self.last_scale_down = now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> AutoscalerConfig {
        AutoscalerConfig {
            scale_up_cooldown: Duration::from_secs(10),
            scale_down_cooldown: Duration::from_secs(30),
            ..AutoscalerConfig::default()
        }
    }

    #[test]
    fn test_start_anchors_both_directions() {
        let config = make_config();
        let start = Instant::now();
        let tracker = CooldownTracker::new(start);

        assert!(tracker.in_cooldown(Direction::Up, start, &config));
        assert!(tracker.in_cooldown(Direction::Down, start, &config));
        assert_eq!(tracker.last_scale(Direction::Up), start);
        assert_eq!(tracker.last_scale(Direction::Down), start);
    }

    #[test]
    fn test_cooldown_expires_exactly_at_boundary() {
        let config = make_config();
        let start = Instant::now();
        let tracker = CooldownTracker::new(start);

        let just_before = start + Duration::from_secs(10) - Duration::from_millis(1);
        assert!(tracker.in_cooldown(Direction::Up, just_before, &config));

        let boundary = start + Duration::from_secs(10);
        assert!(!tracker.in_cooldown(Direction::Up, boundary, &config));
        // Down has a longer cooldown
        assert!(tracker.in_cooldown(Direction::Down, boundary, &config));
    }

    #[test]
    fn test_record_scale_only_touches_one_direction() {
        let config = make_config();
        let start = Instant::now();
        let mut tracker = CooldownTracker::new(start);

        let later = start + Duration::from_secs(60);
        assert!(!tracker.in_cooldown(Direction::Up, later, &config));
        assert!(!tracker.in_cooldown(Direction::Down, later, &config));

        tracker.record_scale(Direction::Up, later);
        assert!(tracker.in_cooldown(Direction::Up, later, &config));
        assert!(!tracker.in_cooldown(Direction::Down, later, &config));
        assert_eq!(tracker.last_scale(Direction::Down), start);
    }

    #[test]
    fn test_remaining() {
        let config = make_config();
        let start = Instant::now();
        let tracker = CooldownTracker::new(start);

        let now = start + Duration::from_secs(4);
        assert_eq!(tracker.remaining(Direction::Up, now, &config), Duration::from_secs(6));
        assert_eq!(tracker.remaining(Direction::Down, now, &config), Duration::from_secs(26));

        let much_later = start + Duration::from_secs(600);
        assert_eq!(tracker.remaining(Direction::Up, much_later, &config), Duration::ZERO);
    }

    #[test]
    fn test_unrepresentable_cooldown_never_ends() {
        let config = AutoscalerConfig {
            scale_down_cooldown: Duration::MAX,
            ..make_config()
        };
        let start = Instant::now();
        let tracker = CooldownTracker::new(start);

        let much_later = start + Duration::from_secs(10 * 365 * 24 * 3600);
        assert!(tracker.in_cooldown(Direction::Down, much_later, &config));
        assert_eq!(tracker.remaining(Direction::Down, much_later, &config), Duration::MAX);
        assert!(!tracker.in_cooldown(Direction::Up, much_later, &config));
    }

    #[test]
    fn test_zero_cooldown_never_blocks() {
        let config = AutoscalerConfig {
            scale_up_cooldown: Duration::ZERO,
            ..make_config()
        };
        let start = Instant::now();
        let mut tracker = CooldownTracker::new(start);
        tracker.record_scale(Direction::Up, start);

        assert!(!tracker.in_cooldown(Direction::Up, start, &config));
    }
}
