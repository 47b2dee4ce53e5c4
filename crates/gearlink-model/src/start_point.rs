//! Pose bookkeeping for the intermediate body between the joint's two ends.
//!
//! The start point rides on axis 1: its pose is the cached zero pose
//! rotated about the axis-1 line by the current axis-1 position. The cached
//! zero pose is captured at attach and invalidated whenever the joint
//! detaches from the engine.
//!
//! The driven-by-joint flag lets pose-change observers tell a joint-driven
//! update apart from an external write, so the observer does not feed the
//! joint's own motion back into it.

use nalgebra::{Point3, UnitQuaternion, UnitVector3, Vector3};

// ---------------------------------------------------------------------------
// StartPointLink
// ---------------------------------------------------------------------------

/// Cached zero pose and update bookkeeping for the start-point body.
#[derive(Clone, Debug, Default)]
pub struct StartPointLink {
    zero_translation: Vector3<f32>,
    zero_rotation: UnitQuaternion<f32>,
    cached: bool,
    driven_by_joint: bool,
}

impl StartPointLink {
    /// New link with no cached pose.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the body's pose at zero joint position.
    pub fn cache_zero_pose(&mut self, translation: Vector3<f32>, rotation: UnitQuaternion<f32>) {
        self.zero_translation = translation;
        self.zero_rotation = rotation;
        self.cached = true;
    }

    /// Whether a zero pose is cached.
    #[must_use]
    pub const fn has_cache(&self) -> bool {
        self.cached
    }

    /// Drop the cached zero pose. Called on detach; the next attach
    /// recaptures it.
    pub fn invalidate(&mut self) {
        self.cached = false;
        self.driven_by_joint = false;
    }

    /// The cached zero pose, if any.
    #[must_use]
    pub fn zero_pose(&self) -> Option<(Vector3<f32>, UnitQuaternion<f32>)> {
        self.cached.then_some((self.zero_translation, self.zero_rotation))
    }

    /// Start-point pose for the given axis-1 position: the cached zero pose
    /// rotated about the axis line through `anchor`.
    ///
    /// Returns `None` when no zero pose is cached.
    #[must_use]
    pub fn pose_for(
        &self,
        axis: &UnitVector3<f32>,
        anchor: Point3<f32>,
        position: f32,
    ) -> Option<(Vector3<f32>, UnitQuaternion<f32>)> {
        if !self.cached {
            return None;
        }
        let rotation = UnitQuaternion::from_axis_angle(axis, position);
        let translation = anchor.coords + rotation * (self.zero_translation - anchor.coords);
        Some((translation, rotation * self.zero_rotation))
    }

    /// Mark the next pose write as joint-driven.
    pub fn mark_joint_driven(&mut self) {
        self.driven_by_joint = true;
    }

    /// Consume the joint-driven flag. Returns `true` exactly once per
    /// [`mark_joint_driven`](Self::mark_joint_driven) call.
    pub fn consume_joint_driven(&mut self) -> bool {
        std::mem::take(&mut self.driven_by_joint)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
