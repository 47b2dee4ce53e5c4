//! Engine-agnostic physics boundary.
//!
//! [`HingeEngine`] is the narrow surface the transmission joint talks to:
//! named rigid bodies, hinge constraints with mutable axis/anchor/limits,
//! torque application, and raw angle read-back. The raw angle wraps at ±π
//! (it is recovered from the relative body rotation), which is why the joint
//! rebases its logical position against it every step.
//!
//! [`PhysicsBackend`] is the plugin-level seam: a concrete engine inserts
//! its resources and registers its systems through it.

use bevy::app::App;
use nalgebra::{Point3, UnitQuaternion, UnitVector3, Vector3};

use gearlink_core::error::AttachError;

// ---------------------------------------------------------------------------
// HingeId
// ---------------------------------------------------------------------------

/// Opaque handle for a hinge constraint created through [`HingeEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HingeId(pub(crate) u64);

impl HingeId {
    /// Construct a handle from a raw id. Intended for engine implementations.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// HingeEngine
// ---------------------------------------------------------------------------

/// The joint's view of a rigid-body engine.
///
/// Object-safe so orchestration code can run against `&mut dyn HingeEngine`,
/// including mock engines in unit tests. Bodies are addressed by name; the
/// caller checks [`has_body`](Self::has_body) before attaching so it can
/// report which role is missing.
pub trait HingeEngine {
    /// Whether a body with this name exists.
    fn has_body(&self, name: &str) -> bool;

    /// Create a revolute constraint between two named bodies.
    ///
    /// `axis` and `anchor` are given in the world frame at attach time;
    /// `limits` are `[min, max]` in radians when present.
    fn attach_hinge(
        &mut self,
        parent: &str,
        child: &str,
        axis: UnitVector3<f32>,
        anchor: Point3<f32>,
        limits: Option<[f32; 2]>,
    ) -> Result<HingeId, AttachError>;

    /// Remove a hinge constraint. Unknown handles are ignored.
    fn detach(&mut self, hinge: HingeId);

    /// Update the hinge axis direction.
    fn set_axis(&mut self, hinge: HingeId, axis: UnitVector3<f32>);

    /// Update the hinge anchor point (world frame).
    fn set_anchor(&mut self, hinge: HingeId, anchor: Point3<f32>);

    /// Update or clear the hinge position limits.
    fn set_limits(&mut self, hinge: HingeId, limits: Option<[f32; 2]>);

    /// Apply a torque about the hinge axis for the next step. Zero releases
    /// the axis entirely.
    fn apply_torque(&mut self, hinge: HingeId, torque: f32);

    /// Current hinge angle as the engine sees it, wrapped to (-π, π].
    fn raw_angle(&self, hinge: HingeId) -> f32;

    /// Relative angular velocity about the hinge axis (rad/s).
    fn angular_velocity(&self, hinge: HingeId) -> f32;

    /// World-frame pose of a named body.
    fn body_pose(&self, name: &str) -> Option<(Vector3<f32>, UnitQuaternion<f32>)>;

    /// Write the world-frame pose of a named body (kinematic update).
    fn set_body_pose(&mut self, name: &str, translation: Vector3<f32>, rotation: UnitQuaternion<f32>);
}

// ---------------------------------------------------------------------------
// PhysicsBackend
// ---------------------------------------------------------------------------

/// Trait that concrete physics engines implement at the plugin level.
///
/// The backend is responsible for:
/// - Inserting engine-specific resources (rigid body sets, pipelines, etc.)
/// - Registering systems in the `Actuate`/`Simulate`/`Readback` sets
pub trait PhysicsBackend: Send + Sync + 'static {
    /// Called once during plugin build to insert engine-specific resources
    /// and register systems.
    fn build(&self, app: &mut App);

    /// Human-readable engine name (e.g., "rapier3d").
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hinge_engine_is_object_safe() {
        fn _accepts_dyn(_: &mut dyn HingeEngine) {}
    }

    #[test]
    fn physics_backend_is_object_safe() {
        fn _accepts_boxed(_: Box<dyn PhysicsBackend>) {}
    }

    #[test]
    fn boxed_backend_is_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Box<dyn PhysicsBackend>>();
    }

    struct DummyBackend;

    impl PhysicsBackend for DummyBackend {
        fn build(&self, _app: &mut App) {}
        fn name(&self) -> &str {
            "dummy"
        }
    }

    #[test]
    fn dummy_backend_name() {
        let b: Box<dyn PhysicsBackend> = Box::new(DummyBackend);
        assert_eq!(b.name(), "dummy");
    }

    #[test]
    fn hinge_id_round_trips_raw() {
        let id = HingeId::from_raw(7);
        assert_eq!(id, HingeId(7));
    }
}
