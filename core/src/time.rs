//! Simulation time, counted in resolution steps.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// A point in simulation time, counted in steps of the current [`Resolution`].
///
/// `i64::MAX` and `i64::MIN` are reserved as positive and negative infinity.
/// Data loggers fill unused reply slots with [`Time::NEG_INF`], so a
/// non-finite stamp marks the end of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(i64);

impl Time {
    pub const ZERO: Self = Self(0);
    pub const POS_INF: Self = Self(i64::MAX);
    pub const NEG_INF: Self = Self(i64::MIN);

    pub const fn step(steps: i64) -> Self {
        Self(steps)
    }

    pub const fn steps(self) -> i64 {
        self.0
    }

    pub const fn is_finite(self) -> bool {
        self.0 != i64::MAX && self.0 != i64::MIN
    }
}

impl Add for Time {
    type Output = Time;

    /// Infinities absorb; finite sums saturate into the finite range.
    fn add(self, rhs: Time) -> Time {
        if !self.is_finite() {
            return self;
        }
        if !rhs.is_finite() {
            return rhs;
        }
        let sum = self.0.saturating_add(rhs.0);
        Time(sum.clamp(i64::MIN + 1, i64::MAX - 1))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Time::POS_INF => write!(f, "+inf"),
            Time::NEG_INF => write!(f, "-inf"),
            Time(steps) => write!(f, "{}steps", steps),
        }
    }
}

/// Length of one simulation step in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution(f64);

impl Resolution {
    pub fn new(ms_per_step: f64) -> Result<Self, KernelError> {
        if !ms_per_step.is_finite() || ms_per_step <= 0.0 {
            return Err(KernelError::InvalidResolution(ms_per_step));
        }
        Ok(Self(ms_per_step))
    }

    pub fn ms(&self) -> f64 {
        self.0
    }

    /// Nearest step to `ms`. Any non-finite input (NaN included) maps to an
    /// infinite time, as do values beyond the representable step range.
    pub fn time_from_ms(&self, ms: f64) -> Time {
        if ms.is_nan() {
            return Time::POS_INF;
        }
        let steps = (ms / self.0).round();
        if steps >= (i64::MAX - 1) as f64 {
            Time::POS_INF
        } else if steps <= (i64::MIN + 1) as f64 {
            Time::NEG_INF
        } else {
            Time(steps as i64)
        }
    }

    pub fn to_ms(&self, t: Time) -> f64 {
        match t {
            Time::POS_INF => f64::INFINITY,
            Time::NEG_INF => f64::NEG_INFINITY,
            Time(steps) => steps as f64 * self.0,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self(crate::DEFAULT_RESOLUTION_MS)
    }
}
