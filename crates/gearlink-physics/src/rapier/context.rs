//! Bevy resource wrapping all Rapier3D physics pipeline state.

use std::collections::HashMap;

use bevy::prelude::Resource;
use nalgebra::{Point3, UnitQuaternion, UnitVector3, Vector3};
use rapier3d::prelude::{
    CCDSolver, ColliderSet, DefaultBroadPhase, ImpulseJointHandle, ImpulseJointSet,
    IntegrationParameters, IslandManager, JointAxesMask, JointAxis, MassProperties, MotorModel,
    MultibodyJointSet, NarrowPhase, PhysicsPipeline, RevoluteJointBuilder, RigidBodyBuilder,
    RigidBodyHandle, RigidBodySet,
};

use gearlink_core::config::{BodyConfig, SimConfig};
use gearlink_core::error::AttachError;

use crate::backend::{HingeEngine, HingeId};

// ---------------------------------------------------------------------------
// HingeInfo
// ---------------------------------------------------------------------------

/// Per-hinge metadata stored alongside the rapier handle.
struct HingeInfo {
    parent_body: RigidBodyHandle,
    child_body: RigidBodyHandle,
    handle: ImpulseJointHandle,
    /// Hinge axis in the world frame (unit direction).
    axis: UnitVector3<f32>,
}

// ---------------------------------------------------------------------------
// RapierWorld
// ---------------------------------------------------------------------------

/// All rapier state in a single Bevy resource.
///
/// `PhysicsPipeline::step()` requires mutable access to every set
/// simultaneously, so they must all live together.
#[derive(Resource)]
pub struct RapierWorld {
    // -- Rapier sets --
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,

    // -- Pipeline objects --
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,

    // -- Parameters --
    integration_parameters: IntegrationParameters,
    gravity: Vector3<f32>,
    /// Number of physics substeps per joint pre/post cycle.
    pub substeps: usize,

    // -- Name / handle mappings --
    body_handles: HashMap<String, RigidBodyHandle>,
    hinges: HashMap<HingeId, HingeInfo>,
    next_hinge: u64,

    // -- Initial state for reset --
    initial_poses: HashMap<RigidBodyHandle, (Vector3<f32>, UnitQuaternion<f32>)>,
}

impl RapierWorld {
    /// Create a new world with given gravity, timestep, and substep count.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(gravity: Vector3<f32>, dt: f64, substeps: usize) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = dt as f32;

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            integration_parameters,
            gravity,
            substeps,
            body_handles: HashMap::new(),
            hinges: HashMap::new(),
            next_hinge: 0,
            initial_poses: HashMap::new(),
        }
    }

    /// Create a world from simulation configuration.
    pub fn from_config(config: &SimConfig) -> Self {
        let g = Vector3::new(config.gravity[0], config.gravity[1], config.gravity[2]);
        Self::new(g, config.physics_dt, config.substeps)
    }

    /// Spawn a rigid body from configuration. Replaces any body with the
    /// same name.
    pub fn spawn_body(&mut self, config: &BodyConfig) -> RigidBodyHandle {
        let translation = Vector3::new(
            config.translation[0],
            config.translation[1],
            config.translation[2],
        );
        let builder = if config.fixed {
            RigidBodyBuilder::fixed().translation(translation)
        } else {
            RigidBodyBuilder::dynamic()
                .translation(translation)
                .can_sleep(false)
                .additional_mass_properties(MassProperties::new(
                    Point3::origin(),
                    config.mass,
                    Vector3::new(config.inertia[0], config.inertia[1], config.inertia[2]),
                ))
        };
        let handle = self.rigid_body_set.insert(builder.build());
        self.body_handles.insert(config.name.clone(), handle);
        handle
    }

    /// Store current body poses as the initial state for reset.
    pub fn snapshot_initial_state(&mut self) {
        self.initial_poses.clear();
        for &handle in self.body_handles.values() {
            if let Some(body) = self.rigid_body_set.get(handle) {
                let pos = body.position();
                self.initial_poses
                    .insert(handle, (pos.translation.vector, pos.rotation));
            }
        }
    }

    /// Reset all rigid bodies to their initial poses with zero velocity.
    pub fn reset_to_initial(&mut self) {
        for (&handle, &(translation, rotation)) in &self.initial_poses {
            if let Some(body) = self.rigid_body_set.get_mut(handle) {
                body.set_translation(translation, true);
                body.set_rotation(rotation, true);
                body.set_linvel(Vector3::zeros(), true);
                body.set_angvel(Vector3::zeros(), true);
                body.wake_up(true);
            }
        }
    }

    /// Run one physics substep.
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    /// Run all configured substeps for one joint pre/post cycle.
    pub fn step_cycle(&mut self) {
        for _ in 0..self.substeps {
            self.step();
        }
    }

    fn body(&self, name: &str) -> Option<RigidBodyHandle> {
        self.body_handles.get(name).copied()
    }

    /// Recompute the local anchors of a hinge for a world-frame anchor point.
    fn local_anchors(
        &self,
        info: &HingeInfo,
        anchor: Point3<f32>,
    ) -> Option<(Point3<f32>, Point3<f32>)> {
        let parent = self.rigid_body_set.get(info.parent_body)?;
        let child = self.rigid_body_set.get(info.child_body)?;
        Some((
            parent.position().inverse_transform_point(&anchor),
            child.position().inverse_transform_point(&anchor),
        ))
    }
}

// ---------------------------------------------------------------------------
// HingeEngine impl
// ---------------------------------------------------------------------------

impl HingeEngine for RapierWorld {
    fn has_body(&self, name: &str) -> bool {
        self.body_handles.contains_key(name)
    }

    fn attach_hinge(
        &mut self,
        parent: &str,
        child: &str,
        axis: UnitVector3<f32>,
        anchor: Point3<f32>,
        limits: Option<[f32; 2]>,
    ) -> Result<HingeId, AttachError> {
        let parent_handle = self
            .body(parent)
            .ok_or_else(|| AttachError::BackendRejected(format!("no body named {parent}")))?;
        let child_handle = self
            .body(child)
            .ok_or_else(|| AttachError::BackendRejected(format!("no body named {child}")))?;

        let parent_pos = *self.rigid_body_set[parent_handle].position();
        let child_pos = *self.rigid_body_set[child_handle].position();

        let mut joint: rapier3d::prelude::GenericJoint = RevoluteJointBuilder::new(axis)
            .local_anchor1(parent_pos.inverse_transform_point(&anchor))
            .local_anchor2(child_pos.inverse_transform_point(&anchor))
            .build()
            .into();
        joint.set_local_axis1(parent_pos.rotation.inverse() * axis);
        joint.set_local_axis2(child_pos.rotation.inverse() * axis);

        if let Some([lo, hi]) = limits {
            joint.set_limits(JointAxis::AngX, [lo, hi]);
        }
        joint.set_motor_model(JointAxis::AngX, MotorModel::ForceBased);
        joint.set_motor(JointAxis::AngX, 0.0, 0.0, 0.0, 0.0);

        let handle = self
            .impulse_joint_set
            .insert(parent_handle, child_handle, joint, true);

        let id = HingeId::from_raw(self.next_hinge);
        self.next_hinge += 1;
        self.hinges.insert(
            id,
            HingeInfo {
                parent_body: parent_handle,
                child_body: child_handle,
                handle,
                axis,
            },
        );
        Ok(id)
    }

    fn detach(&mut self, hinge: HingeId) {
        if let Some(info) = self.hinges.remove(&hinge) {
            self.impulse_joint_set.remove(info.handle, true);
        }
    }

    fn set_axis(&mut self, hinge: HingeId, axis: UnitVector3<f32>) {
        let Some(info) = self.hinges.get_mut(&hinge) else {
            return;
        };
        info.axis = axis;
        let parent_rot = self
            .rigid_body_set
            .get(info.parent_body)
            .map(|b| b.position().rotation);
        let child_rot = self
            .rigid_body_set
            .get(info.child_body)
            .map(|b| b.position().rotation);
        if let Some(joint) = self.impulse_joint_set.get_mut(info.handle, true) {
            if let Some(rot) = parent_rot {
                joint.data.set_local_axis1(rot.inverse() * axis);
            }
            if let Some(rot) = child_rot {
                joint.data.set_local_axis2(rot.inverse() * axis);
            }
        }
    }

    fn set_anchor(&mut self, hinge: HingeId, anchor: Point3<f32>) {
        let Some(info) = self.hinges.get(&hinge) else {
            return;
        };
        let Some((local1, local2)) = self.local_anchors(info, anchor) else {
            return;
        };
        let handle = info.handle;
        if let Some(joint) = self.impulse_joint_set.get_mut(handle, true) {
            joint.data.set_local_anchor1(local1);
            joint.data.set_local_anchor2(local2);
        }
    }

    fn set_limits(&mut self, hinge: HingeId, limits: Option<[f32; 2]>) {
        let Some(info) = self.hinges.get(&hinge) else {
            return;
        };
        if let Some(joint) = self.impulse_joint_set.get_mut(info.handle, true) {
            match limits {
                Some([lo, hi]) => {
                    joint.data.set_limits(JointAxis::AngX, [lo, hi]);
                }
                None => {
                    joint.data.limit_axes.remove(JointAxesMask::ANG_X);
                }
            }
        }
    }

    fn apply_torque(&mut self, hinge: HingeId, torque: f32) {
        let Some(info) = self.hinges.get(&hinge) else {
            return;
        };
        if let Some(joint) = self.impulse_joint_set.get_mut(info.handle, true) {
            // Motor trick: ForceBased motor with huge target velocity,
            // clamped to the desired torque magnitude.
            if torque.abs() > 1e-10 {
                let target_vel = torque.signum() * 1e10;
                joint.data.set_motor(JointAxis::AngX, 0.0, target_vel, 0.0, 1.0);
                joint.data.set_motor_max_force(JointAxis::AngX, torque.abs());
            } else {
                // Zero torque: fully disable the motor so the DOF is free.
                joint.data.set_motor(JointAxis::AngX, 0.0, 0.0, 0.0, 0.0);
                joint.data.set_motor_max_force(JointAxis::AngX, 0.0);
            }
        }
    }

    fn raw_angle(&self, hinge: HingeId) -> f32 {
        let Some(info) = self.hinges.get(&hinge) else {
            return f32::NAN;
        };
        let (Some(parent), Some(child)) = (
            self.rigid_body_set.get(info.parent_body),
            self.rigid_body_set.get(info.child_body),
        ) else {
            return f32::NAN;
        };

        // Angle about the hinge axis, extracted from the relative rotation
        // quaternion. Wraps at ±π.
        let relative = parent.position().rotation.inverse() * child.position().rotation;
        let sin_half_proj = relative.imag().dot(&info.axis);
        2.0 * f32::atan2(sin_half_proj, relative.w)
    }

    fn angular_velocity(&self, hinge: HingeId) -> f32 {
        let Some(info) = self.hinges.get(&hinge) else {
            return 0.0;
        };
        let (Some(parent), Some(child)) = (
            self.rigid_body_set.get(info.parent_body),
            self.rigid_body_set.get(info.child_body),
        ) else {
            return 0.0;
        };
        (child.angvel() - parent.angvel()).dot(&info.axis)
    }

    fn body_pose(&self, name: &str) -> Option<(Vector3<f32>, UnitQuaternion<f32>)> {
        let handle = self.body(name)?;
        let body = self.rigid_body_set.get(handle)?;
        let pos = body.position();
        Some((pos.translation.vector, pos.rotation))
    }

    fn set_body_pose(
        &mut self,
        name: &str,
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) {
        let Some(handle) = self.body(name) else {
            return;
        };
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_translation(translation, true);
            body.set_rotation(rotation, true);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
