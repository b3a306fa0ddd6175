//! ---
//! emu_section: "05-simulation"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Ramp generator driving simulated sensor values."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::Display;
use tf_emu_protocol::RampBounds;
use tracing::trace;

/// Current travel direction of a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Bounded, direction reversing value generator.
///
/// Each [`tick`](Self::tick) moves the value one `step` in the current
/// direction. Reaching `max` while going up (or `min` while going down) flips
/// the direction and moves one step back. The value never leaves
/// `[min, max]`, even when `step` does not divide the range.
#[derive(Debug, Clone)]
pub struct RampGenerator {
    value: f64,
    direction: Direction,
    bounds: RampBounds,
}

impl RampGenerator {
    /// Start a ramp at `start`, heading up.
    ///
    /// Returns `None` for a zero step or unusable bounds; such fields keep a
    /// constant value and never get a generator.
    pub fn new(start: f64, bounds: RampBounds) -> Option<Self> {
        Self::with_direction(start, Direction::Up, bounds)
    }

    /// Start a ramp at `start` heading in `direction`.
    pub fn with_direction(start: f64, direction: Direction, bounds: RampBounds) -> Option<Self> {
        let RampBounds { min, max, step } = bounds;
        if step == 0.0 || !step.is_finite() || !min.is_finite() || !max.is_finite() || min > max {
            return None;
        }
        Some(Self {
            value: start.clamp(min, max),
            direction,
            bounds: RampBounds::new(min, max, step.abs()),
        })
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Current direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Bounds the ramp runs between.
    pub fn bounds(&self) -> RampBounds {
        self.bounds
    }

    /// Advance by one step and return the new value, clamped into the bounds.
    pub fn tick(&mut self) -> f64 {
        let RampBounds { min, max, step } = self.bounds;
        match self.direction {
            Direction::Up if self.value >= max => {
                self.direction = Direction::Down;
                self.value -= step;
                trace!(value = self.value, "ramp turned down");
            }
            Direction::Up => self.value += step,
            Direction::Down if self.value <= min => {
                self.direction = Direction::Up;
                self.value += step;
                trace!(value = self.value, "ramp turned up");
            }
            Direction::Down => self.value -= step,
        }
        self.value = self.value.clamp(min, max);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_bounds_and_turns_at_the_edges() {
        let mut ramp = RampGenerator::new(0.0, RampBounds::new(0.0, 100.0, 1.0)).unwrap();
        let mut previous = (ramp.value(), ramp.direction());
        let mut turns = Vec::new();
        for _ in 0..450 {
            let value = ramp.tick();
            assert!((0.0..=100.0).contains(&value), "value {value} escaped");
            if ramp.direction() != previous.1 {
                turns.push((previous.0, ramp.direction()));
            }
            previous = (value, ramp.direction());
        }
        assert!(turns.len() >= 4);
        for (at, heading) in turns {
            match heading {
                Direction::Down => assert_eq!(at, 100.0),
                Direction::Up => assert_eq!(at, 0.0),
            }
        }
    }

    #[test]
    fn first_ticks_follow_the_transition_rule() {
        let mut ramp = RampGenerator::new(98.0, RampBounds::new(0.0, 100.0, 1.0)).unwrap();
        let values: Vec<f64> = (0..4).map(|_| ramp.tick()).collect();
        assert_eq!(values, vec![99.0, 100.0, 99.0, 98.0]);
        assert_eq!(ramp.direction(), Direction::Down);
    }

    #[test]
    fn uneven_steps_are_clamped() {
        let mut ramp = RampGenerator::new(0.0, RampBounds::new(0.0, 10.0, 4.0)).unwrap();
        let values: Vec<f64> = (0..6).map(|_| ramp.tick()).collect();
        assert_eq!(values, vec![4.0, 8.0, 10.0, 6.0, 2.0, 0.0]);
    }

    #[test]
    fn zero_step_never_builds_a_generator() {
        assert!(RampGenerator::new(5.0, RampBounds::new(0.0, 10.0, 0.0)).is_none());
        assert!(RampGenerator::new(5.0, RampBounds::new(10.0, 0.0, 1.0)).is_none());
    }

    #[test]
    fn downward_start_turns_at_min() {
        let bounds = RampBounds::new(-2.0, 2.0, 1.0);
        let mut ramp = RampGenerator::with_direction(-1.0, Direction::Down, bounds).unwrap();
        let values: Vec<f64> = (0..3).map(|_| ramp.tick()).collect();
        assert_eq!(values, vec![-2.0, -1.0, 0.0]);
        assert_eq!(ramp.direction(), Direction::Up);
    }
}
