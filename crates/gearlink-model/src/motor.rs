//! Rotational motor device attached to a hinge axis.
//!
//! Instantaneous response with linear torque-speed saturation:
//! `available = max_torque * (1 - |velocity| / max_velocity)`.

// ---------------------------------------------------------------------------
// RotationalMotor
// ---------------------------------------------------------------------------

/// A named rotational motor mounted on one of the joint's axes.
#[derive(Clone, Debug, PartialEq)]
pub struct RotationalMotor {
    /// Device name reported by joint device enumeration.
    pub name: String,
    /// Maximum torque output (Nm).
    pub max_torque: f32,
    /// Maximum velocity (rad/s).
    pub max_velocity: f32,
}

impl RotationalMotor {
    /// New motor with the given limits.
    pub fn new(name: impl Into<String>, max_torque: f32, max_velocity: f32) -> Self {
        Self {
            name: name.into(),
            max_torque,
            max_velocity,
        }
    }

    /// Device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output torque for a torque command at the current axis velocity.
    pub fn compute(&self, torque_cmd: f32, velocity: f32) -> f32 {
        let speed_ratio = (velocity.abs() / self.max_velocity).min(1.0);
        let available = self.max_torque * (1.0 - speed_ratio);
        torque_cmd.clamp(-available, available)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
