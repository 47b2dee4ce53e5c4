//! Gear coupling law: multiplier, backlash dead zone, restoring torque.
//!
//! # Coupling Convention
//!
//! `multiplier` relates the two axis positions: the coupling drives axis 2
//! toward `multiplier * position1`. Negative values reverse the rotation
//! direction (external gear mesh). The law is stateless: torque is
//! recomputed from the current positions every step, nothing is integrated.
//!
//! With backlash `b`, deviations within the dead zone `[-b/2, +b/2]`
//! transmit no torque. Outside the band a proportional restoring torque
//! `-stiffness * excess` acts on axis 2, with the balanced reaction
//! `-multiplier * torque` on axis 1.

use thiserror::Error;

use crate::gear::GearType;

/// Default restoring-torque gain (Nm/rad).
pub const DEFAULT_STIFFNESS: f32 = 10.0;

/// Invalid coupling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CouplingError {
    #[error("coupling multiplier must be non-zero and finite, got {0}")]
    InvalidMultiplier(f32),
}

// ---------------------------------------------------------------------------
// Coupling
// ---------------------------------------------------------------------------

/// The gear coupling between the two hinge axes.
#[derive(Clone, Debug, PartialEq)]
pub struct Coupling {
    /// Gear ratio relating axis 1 position to axis 2 position.
    pub multiplier: f32,
    /// Angular play of the mesh (rad). Zero means rigid coupling.
    pub backlash: f32,
    /// Restoring-torque gain outside the dead zone (Nm/rad).
    pub stiffness: f32,
    /// Gear relationship inferred from the axis geometry. `Undefined`
    /// disables the coupling entirely.
    pub gear: GearType,
}

impl Coupling {
    /// New coupling with the given multiplier and backlash.
    ///
    /// A zero or non-finite multiplier is a configuration error, never a
    /// silent decoupling.
    pub fn new(multiplier: f32, backlash: f32) -> Result<Self, CouplingError> {
        if multiplier == 0.0 || !multiplier.is_finite() {
            return Err(CouplingError::InvalidMultiplier(multiplier));
        }
        Ok(Self {
            multiplier,
            backlash: backlash.max(0.0),
            stiffness: DEFAULT_STIFFNESS,
            gear: GearType::Undefined,
        })
    }

    /// Set the restoring-torque gain.
    #[must_use]
    pub const fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Set the inferred gear type.
    #[must_use]
    pub const fn with_gear(mut self, gear: GearType) -> Self {
        self.gear = gear;
        self
    }

    /// Target position of axis 2 implied by the gear relationship.
    pub fn target_position(&self, position1: f32) -> f32 {
        self.multiplier * position1
    }

    /// Deviation of axis 2 from the gear relationship.
    pub fn deviation(&self, position1: f32, position2: f32) -> f32 {
        self.multiplier.mul_add(-position1, position2)
    }

    /// Restoring torque on axis 2.
    ///
    /// Zero when the gear type is `Undefined` or the deviation lies within
    /// the backlash dead zone; otherwise proportional to the deviation in
    /// excess of the band, opposing it.
    pub fn torque(&self, position1: f32, position2: f32) -> f32 {
        if !self.gear.is_coupled() {
            return 0.0;
        }
        let deviation = self.deviation(position1, position2);
        let half_band = self.backlash * 0.5;
        if deviation.abs() <= half_band {
            return 0.0;
        }
        let excess = deviation - half_band * deviation.signum();
        -self.stiffness * excess
    }

    /// Balanced reaction torque on axis 1 for a given axis 2 torque.
    pub fn reaction_torque(&self, torque2: f32) -> f32 {
        -self.multiplier * torque2
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
