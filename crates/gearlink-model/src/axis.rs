//! Per-axis hinge parameters and passive torque terms.
//!
//! # Physics
//!
//! Each hinge axis carries three passive torque contributions, summed by the
//! joint every step:
//!
//! - Spring toward the zero reference: `T = -spring_constant * position`
//! - Viscous damping: `T = -damping_constant * velocity`
//! - Optional static friction: below the stiction velocity threshold the
//!   axis cancels the applied torque and holds still.

use nalgebra::{Point3, UnitVector3, Vector3};

/// Velocity threshold below which static friction holds the axis (rad/s).
const STICTION_VELOCITY: f32 = 0.01;

// ---------------------------------------------------------------------------
// AxisParameters
// ---------------------------------------------------------------------------

/// Hinge axis geometry and passive dynamics, expressed in the parent body
/// frame.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisParameters {
    /// Rotation axis direction.  Need not be normalized; a zero vector marks
    /// the axis as degenerate (see [`unit_axis`](Self::unit_axis)).
    pub axis: Vector3<f32>,
    /// Anchor point the axis passes through.
    pub anchor: Point3<f32>,
    /// Spring constant toward zero (Nm/rad).
    pub spring_constant: f32,
    /// Viscous damping constant (Nm/(rad/s)).
    pub damping_constant: f32,
    /// Whether static friction holds the axis at rest.
    pub static_friction: bool,
    /// Lower position limit (rad).  `-INFINITY` when unbounded.
    pub min_position: f32,
    /// Upper position limit (rad).  `INFINITY` when unbounded.
    pub max_position: f32,
}

impl Default for AxisParameters {
    fn default() -> Self {
        Self::about(Vector3::z())
    }
}

impl AxisParameters {
    /// Unbounded, passive axis about the given direction, anchored at the
    /// origin.
    pub fn about(axis: Vector3<f32>) -> Self {
        Self {
            axis,
            anchor: Point3::origin(),
            spring_constant: 0.0,
            damping_constant: 0.0,
            static_friction: false,
            min_position: f32::NEG_INFINITY,
            max_position: f32::INFINITY,
        }
    }

    /// Set the anchor point.
    #[must_use]
    pub const fn with_anchor(mut self, anchor: Point3<f32>) -> Self {
        self.anchor = anchor;
        self
    }

    /// Set the spring constant (Nm/rad).
    #[must_use]
    pub const fn with_spring(mut self, spring_constant: f32) -> Self {
        self.spring_constant = spring_constant;
        self
    }

    /// Set the damping constant (Nm/(rad/s)).
    #[must_use]
    pub const fn with_damping(mut self, damping_constant: f32) -> Self {
        self.damping_constant = damping_constant;
        self
    }

    /// Enable static friction.
    #[must_use]
    pub const fn with_static_friction(mut self) -> Self {
        self.static_friction = true;
        self
    }

    /// Set position limits (rad).
    #[must_use]
    pub const fn with_limits(mut self, min: f32, max: f32) -> Self {
        self.min_position = min;
        self.max_position = max;
        self
    }

    /// Normalized axis direction, or `None` when the direction is degenerate.
    pub fn unit_axis(&self) -> Option<UnitVector3<f32>> {
        UnitVector3::try_new(self.axis, f32::EPSILON)
    }

    /// Whether the axis has at least one finite position limit.
    pub fn is_limited(&self) -> bool {
        self.min_position.is_finite() || self.max_position.is_finite()
    }

    /// Clamp a position to the configured limits.
    pub fn clamp_position(&self, position: f32) -> f32 {
        position.clamp(self.min_position, self.max_position)
    }

    /// Spring torque toward the zero reference: `-k * position`.
    pub fn spring_torque(&self, position: f32) -> f32 {
        -self.spring_constant * position
    }

    /// Viscous damping torque: `-c * velocity`.
    pub fn damping_torque(&self, velocity: f32) -> f32 {
        -self.damping_constant * velocity
    }

    /// Static friction torque.
    ///
    /// Returns `-applied_torque` (hold still) when static friction is
    /// enabled and the axis is below the stiction velocity threshold;
    /// zero otherwise.
    pub fn friction_torque(&self, velocity: f32, applied_torque: f32) -> f32 {
        if self.static_friction && velocity.abs() < STICTION_VELOCITY {
            -applied_torque
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
