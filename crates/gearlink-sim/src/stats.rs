//! Coupling statistics tracking.
//!
//! [`CouplingStats`] records how well the attached transmission joints hold
//! the gear relationship over a run: the last observed positions, the last
//! deviation from `multiplier * position1`, and the worst deviation seen.

use bevy::prelude::*;
use gearlink_physics::joint::{AxisId, JointPhase, TransmissionJoint};

// ---------------------------------------------------------------------------
// CouplingStats
// ---------------------------------------------------------------------------

/// Bevy resource that tracks coupling quality across a simulation run.
#[derive(Resource, Clone, Debug)]
pub struct CouplingStats {
    /// Total read-back ticks observed.
    pub steps: u64,
    /// Primary-axis position at the last tick (rad).
    pub last_position1: f32,
    /// Secondary-axis position at the last tick (rad).
    pub last_position2: f32,
    /// Deviation `position2 - multiplier * position1` at the last tick (rad).
    pub last_deviation: f32,
    /// Largest deviation magnitude seen since the last reset (rad).
    pub max_abs_deviation: f32,
}

impl Default for CouplingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CouplingStats {
    /// Create empty stats.
    pub const fn new() -> Self {
        Self {
            steps: 0,
            last_position1: 0.0,
            last_position2: 0.0,
            last_deviation: 0.0,
            max_abs_deviation: 0.0,
        }
    }

    /// Whether the last observed deviation sits inside the given backlash
    /// band (half-width `backlash / 2` on each side of the target).
    pub fn within_backlash(&self, backlash: f32) -> bool {
        self.last_deviation.abs() <= backlash * 0.5
    }

    /// Reset all statistics.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// System that samples attached joints after read-back and folds their
/// deviation into the stats.
#[allow(clippy::needless_pass_by_value)]
pub fn coupling_stats_system(
    mut stats: ResMut<CouplingStats>,
    joints: Query<&TransmissionJoint>,
) {
    stats.steps += 1;
    for joint in &joints {
        if joint.phase() != JointPhase::Attached {
            continue;
        }
        let position1 = joint.position(AxisId::Axis1);
        let position2 = joint.position(AxisId::Axis2);
        let deviation = joint.coupling().deviation(position1, position2);

        stats.last_position1 = position1;
        stats.last_position2 = position2;
        stats.last_deviation = deviation;
        if deviation.abs() > stats.max_abs_deviation {
            stats.max_abs_deviation = deviation.abs();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
