use std::fmt;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SimTime
// ---------------------------------------------------------------------------

/// Integer-nanosecond simulation clock.
///
/// The joint stepping loop advances in fixed increments of `physics_dt`, so
/// the clock tracks elapsed time as a monotonically increasing `u64`
/// nanosecond count rather than accumulating floating-point error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Resource,
)]
pub struct SimTime {
    nanos: u64,
    steps: u64,
}

impl SimTime {
    /// Clock at zero, before the first step.
    #[must_use]
    pub const fn new() -> Self {
        Self { nanos: 0, steps: 0 }
    }

    /// Raw nanosecond count.
    #[must_use]
    pub const fn nanos(&self) -> u64 {
        self.nanos
    }

    /// Completed step count.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Elapsed milliseconds (truncated).
    #[must_use]
    pub const fn millis(&self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Elapsed seconds as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Elapsed seconds as `f32`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn secs_f32(&self) -> f32 {
        self.nanos as f32 / 1_000_000_000.0
    }

    /// Record one completed step of `dt_secs` seconds.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn advance(&mut self, dt_secs: f64) {
        let dt_nanos = (dt_secs * 1_000_000_000.0) as u64;
        self.nanos = self.nanos.saturating_add(dt_nanos);
        self.steps = self.steps.saturating_add(1);
    }

    /// Reset the clock to zero.
    pub const fn reset(&mut self) {
        self.nanos = 0;
        self.steps = 0;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.nanos / 1_000_000_000;
        let sub_millis = (self.nanos % 1_000_000_000) / 1_000_000;
        write!(f, "{secs}.{sub_millis:03}s (step {})", self.steps)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
