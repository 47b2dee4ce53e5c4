//! The transmission joint orchestrator.
//!
//! Couples two hinge axes through a gear relationship. Axis 1 hinges the
//! parent body to the optional start-point body (or directly to the end
//! point); axis 2 hinges the start point to the end point. The coupling law
//! drives axis 2 toward `multiplier * position1` with a backlash dead zone.
//!
//! # Position rebasing
//!
//! The engine reports hinge angles wrapped to (-π, π]. Logical positions
//! must accumulate beyond that range, so every post-step the joint rebases:
//! `delta = wrap(raw - offset); position += delta; offset = raw`. A
//! non-finite read-back keeps the previous positions and reports the step
//! error instead of corrupting state.

use std::f32::consts::PI;

use bevy::prelude::Component;
use nalgebra::UnitQuaternion;
use tracing::{debug, warn};

use gearlink_core::config::{AxisConfig, StartPointConfig, TransmissionConfig};
use gearlink_core::error::{AttachError, ConfigError, StepError};
use gearlink_model::axis::AxisParameters;
use gearlink_model::coupling::{Coupling, CouplingError};
use gearlink_model::gear::{GEOMETRY_TOLERANCE, GearType, infer_gear_type};
use gearlink_model::motor::RotationalMotor;
use gearlink_model::start_point::StartPointLink;

use crate::backend::{HingeEngine, HingeId};

/// Hinge limit magnitude standing in for an unbounded side.
const UNBOUNDED_LIMIT: f32 = 1.0e9;

/// Wrap an angle to (-π, π].
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI { PI } else { wrapped }
}

// ---------------------------------------------------------------------------
// JointPhase / AxisId
// ---------------------------------------------------------------------------

/// Lifecycle phase of the joint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JointPhase {
    /// Constructed but parameter blocks not finalized yet.
    #[default]
    Unfinalized,
    /// Finalized, not connected to a physics engine.
    Detached,
    /// Hinges live in the physics engine.
    Attached,
}

/// Selects one of the joint's two rotational axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisId {
    Axis1,
    Axis2,
}

// ---------------------------------------------------------------------------
// TransmissionJoint
// ---------------------------------------------------------------------------

/// Gear-coupled dual-hinge joint between named rigid bodies.
#[derive(Component, Debug)]
pub struct TransmissionJoint {
    // -- Configuration (non-derived, survives save) --
    parent: String,
    end_point: String,
    start_point_ref: Option<StartPointConfig>,
    axis1: AxisParameters,
    axis2: AxisParameters,
    explicit_parameters2: bool,
    coupling: Coupling,
    initial_position1: f32,
    initial_position2: f32,

    // -- Derived state (recomputed at attach, never saved) --
    phase: JointPhase,
    start_point: Option<StartPointLink>,
    hinge1: Option<HingeId>,
    hinge2: Option<HingeId>,
    position1: f32,
    position2: f32,
    velocity1: f32,
    velocity2: f32,
    offset1: f32,
    offset2: f32,

    // -- Devices --
    motor1: Option<RotationalMotor>,
    motor2: Option<RotationalMotor>,

    // -- Pending updates --
    axis_dirty: bool,
    anchor_dirty: bool,
    limits_dirty: bool,
    pose_write_pending: bool,
    start_point_changed: bool,
}

impl TransmissionJoint {
    /// Build a joint from validated configuration. The joint starts in the
    /// `Unfinalized` phase; call [`pre_finalize`](Self::pre_finalize) before
    /// attaching.
    pub fn from_config(config: &TransmissionConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let coupling = Coupling::new(config.multiplier, config.backlash)
            .map_err(|CouplingError::InvalidMultiplier(m)| ConfigError::InvalidMultiplier(m))?
            .with_stiffness(config.coupling_stiffness);

        let axis1 = axis_parameters(&config.axis1);
        let (axis2, explicit_parameters2, initial_position2) = match &config.parameters2 {
            Some(params2) => (axis_parameters(params2), true, params2.position),
            None => (AxisParameters::default(), false, 0.0),
        };

        Ok(Self {
            parent: config.parent.clone(),
            end_point: config.end_point.clone(),
            start_point: config.start_point.as_ref().map(|_| StartPointLink::new()),
            start_point_ref: config.start_point.clone(),
            axis1,
            axis2,
            explicit_parameters2,
            coupling,
            initial_position1: config.axis1.position,
            initial_position2,
            phase: JointPhase::Unfinalized,
            hinge1: None,
            hinge2: None,
            position1: 0.0,
            position2: 0.0,
            velocity1: 0.0,
            velocity2: 0.0,
            offset1: 0.0,
            offset2: 0.0,
            motor1: None,
            motor2: None,
            axis_dirty: false,
            anchor_dirty: false,
            limits_dirty: false,
            pose_write_pending: false,
            start_point_changed: false,
        })
    }

    /// Finalize parameter blocks: default axis 2 to axis 1's geometry when
    /// no explicit block was given, clamp initial positions into limits.
    /// Idempotent; a no-op once past `Unfinalized`.
    pub fn pre_finalize(&mut self) {
        if self.phase != JointPhase::Unfinalized {
            return;
        }
        if !self.explicit_parameters2 {
            self.axis2 = AxisParameters::about(self.axis1.axis).with_anchor(self.axis1.anchor);
        }
        self.initial_position1 = self.axis1.clamp_position(self.initial_position1);
        self.initial_position2 = self.axis2.clamp_position(self.initial_position2);
        self.position1 = self.initial_position1;
        self.position2 = self.initial_position2;
        self.phase = JointPhase::Detached;
    }

    /// Create the hinge constraints in the engine and derive attach-time
    /// state: gear classification and the start-point zero pose.
    ///
    /// On any failure the joint stays `Detached` with no hinges.
    pub fn attach(&mut self, engine: &mut dyn HingeEngine) -> Result<(), AttachError> {
        match self.phase {
            JointPhase::Unfinalized => return Err(AttachError::NotFinalized),
            JointPhase::Attached => return Err(AttachError::AlreadyAttached),
            JointPhase::Detached => {}
        }

        if !engine.has_body(&self.parent) {
            warn!(body = %self.parent, "transmission attach failed: parent body missing");
            return Err(AttachError::MissingParent(self.parent.clone()));
        }
        if !engine.has_body(&self.end_point) {
            warn!(body = %self.end_point, "transmission attach failed: end-point body missing");
            return Err(AttachError::MissingEndPoint(self.end_point.clone()));
        }
        let start_name_owned = self
            .start_point_ref
            .as_ref()
            .map(|c| c.body_name().to_owned());
        let start_name = start_name_owned.as_deref();
        if let Some(name) = start_name {
            if !engine.has_body(name) {
                warn!(body = %name, "transmission attach failed: start-point body missing");
                return Err(AttachError::MissingStartPoint(name.to_owned()));
            }
        }

        let unit1 = self
            .axis1
            .unit_axis()
            .ok_or_else(|| AttachError::BackendRejected("degenerate axis 1".into()))?;

        // Axis 1 hinges the parent to the start point when present,
        // otherwise directly to the end point.
        let axis1_child = start_name.unwrap_or(&self.end_point).to_owned();
        let hinge1 = engine.attach_hinge(
            &self.parent,
            &axis1_child,
            unit1,
            self.axis1.anchor,
            limit_array(&self.axis1),
        )?;

        // Axis 2 hinges the start point to the end point; without a start
        // point the secondary position is tracked from the coupling law.
        let hinge2 = if let Some(name) = start_name {
            let unit2 = match self.axis2.unit_axis() {
                Some(u) => u,
                None => {
                    engine.detach(hinge1);
                    return Err(AttachError::BackendRejected("degenerate axis 2".into()));
                }
            };
            match engine.attach_hinge(
                name,
                &self.end_point,
                unit2,
                self.axis2.anchor,
                limit_array(&self.axis2),
            ) {
                Ok(h) => Some(h),
                Err(err) => {
                    engine.detach(hinge1);
                    return Err(err);
                }
            }
        } else {
            None
        };

        self.reclassify();
        if !self.coupling.gear.is_coupled() {
            warn!("gear type undefined from axis geometry; coupling disabled");
        } else {
            debug!(gear = %self.coupling.gear, "transmission attached");
        }

        // Cache the start point's zero pose: its current pose rotated back
        // by the current axis-1 position.
        if let (Some(link), Some(name)) = (self.start_point.as_mut(), start_name) {
            if let Some((translation, rotation)) = engine.body_pose(name) {
                let back =
                    UnitQuaternion::from_axis_angle(&unit1, -self.position1);
                let anchor = self.axis1.anchor.coords;
                link.cache_zero_pose(
                    anchor + back * (translation - anchor),
                    back * rotation,
                );
            }
        }

        self.offset1 = engine.raw_angle(hinge1);
        self.offset2 = hinge2.map_or(0.0, |h| engine.raw_angle(h));
        self.hinge1 = Some(hinge1);
        self.hinge2 = hinge2;
        self.phase = JointPhase::Attached;
        Ok(())
    }

    /// Push pending parameter updates and this step's torques into the
    /// engine. Called once per step before the engine integrates.
    pub fn pre_physics_step(&mut self, engine: &mut dyn HingeEngine, _dt: f64) -> Result<(), StepError> {
        let Some(hinge1) = self.hinge1 else {
            return Err(StepError::Detached);
        };

        self.flush_parameter_updates(engine, hinge1);

        if self.pose_write_pending {
            self.pose_write_pending = false;
            self.write_start_point_pose(engine);
            // Rebase so the kinematic write is not read back as motion.
            self.offset1 = engine.raw_angle(hinge1);
            if let Some(h2) = self.hinge2 {
                self.offset2 = engine.raw_angle(h2);
            }
        }

        let coupling_t2 = self.coupling.torque(self.position1, self.position2);

        let mut t1 = self.axis1.spring_torque(self.position1)
            + self.axis1.damping_torque(self.velocity1)
            + self.coupling.reaction_torque(coupling_t2);
        t1 += self.axis1.friction_torque(self.velocity1, t1);
        engine.apply_torque(hinge1, t1);

        if let Some(hinge2) = self.hinge2 {
            let mut t2 = self.axis2.spring_torque(self.position2)
                + self.axis2.damping_torque(self.velocity2)
                + coupling_t2;
            t2 += self.axis2.friction_torque(self.velocity2, t2);
            engine.apply_torque(hinge2, t2);
        }
        Ok(())
    }

    /// Read the stepped state back from the engine, rebasing positions
    /// against the wrapped raw angles.
    ///
    /// A non-finite raw angle keeps the previous positions and reports the
    /// error.
    pub fn post_physics_step(&mut self, engine: &mut dyn HingeEngine) -> Result<(), StepError> {
        let Some(hinge1) = self.hinge1 else {
            return Err(StepError::Detached);
        };

        let raw1 = engine.raw_angle(hinge1);
        if !raw1.is_finite() {
            warn!("non-finite angle read back on axis 1; keeping previous position");
            return Err(StepError::NonFiniteAngle { axis: 1 });
        }
        let raw2 = self.hinge2.map(|h| engine.raw_angle(h));
        if let Some(r) = raw2 {
            if !r.is_finite() {
                warn!("non-finite angle read back on axis 2; keeping previous position");
                return Err(StepError::NonFiniteAngle { axis: 2 });
            }
        }

        self.position1 += wrap_angle(raw1 - self.offset1);
        self.offset1 = raw1;
        self.velocity1 = engine.angular_velocity(hinge1);

        match (self.hinge2, raw2) {
            (Some(hinge2), Some(raw2)) => {
                self.position2 += wrap_angle(raw2 - self.offset2);
                self.offset2 = raw2;
                self.velocity2 = engine.angular_velocity(hinge2);
            }
            _ => {
                // No physical secondary hinge: the secondary position
                // follows the gear relationship directly.
                self.position2 = self.coupling.target_position(self.position1);
                self.velocity2 = self.coupling.multiplier * self.velocity1;
            }
        }
        Ok(())
    }

    /// Set a logical axis position, clamped into the axis limits. Never
    /// rejected: out-of-range requests saturate.
    pub fn set_position(&mut self, value: f32, axis: AxisId) {
        match axis {
            AxisId::Axis1 => {
                self.position1 = self.axis1.clamp_position(value);
                self.velocity1 = 0.0;
                if self.start_point.is_some() {
                    self.pose_write_pending = true;
                }
            }
            AxisId::Axis2 => {
                self.position2 = self.axis2.clamp_position(value);
                self.velocity2 = 0.0;
            }
        }
    }

    /// Current logical position of an axis (rad).
    #[must_use]
    pub const fn position(&self, axis: AxisId) -> f32 {
        match axis {
            AxisId::Axis1 => self.position1,
            AxisId::Axis2 => self.position2,
        }
    }

    /// Configured initial position of an axis (rad).
    #[must_use]
    pub const fn initial_position(&self, axis: AxisId) -> f32 {
        match axis {
            AxisId::Axis1 => self.initial_position1,
            AxisId::Axis2 => self.initial_position2,
        }
    }

    /// Current angular velocity of an axis (rad/s).
    #[must_use]
    pub const fn velocity(&self, axis: AxisId) -> f32 {
        match axis {
            AxisId::Axis1 => self.velocity1,
            AxisId::Axis2 => self.velocity2,
        }
    }

    /// Restore both axis positions to their initial values. Returns whether
    /// anything changed.
    pub fn reset_joint_positions(&mut self) -> bool {
        let changed =
            self.position1 != self.initial_position1 || self.position2 != self.initial_position2;
        self.position1 = self.initial_position1;
        self.position2 = self.initial_position2;
        changed
    }

    /// Reset kinematic state to the initial configuration.
    pub fn reset(&mut self) {
        self.reset_joint_positions();
        self.velocity1 = 0.0;
        self.velocity2 = 0.0;
        if self.start_point.is_some() {
            self.pose_write_pending = true;
        }
    }

    /// Detach from the engine and invalidate attach-derived caches. The
    /// joint returns to `Detached` and can be re-attached.
    pub fn reset_physics(&mut self, engine: &mut dyn HingeEngine) {
        if let Some(hinge) = self.hinge1.take() {
            engine.detach(hinge);
        }
        if let Some(hinge) = self.hinge2.take() {
            engine.detach(hinge);
        }
        if let Some(link) = self.start_point.as_mut() {
            link.invalidate();
        }
        self.coupling.gear = GearType::Undefined;
        self.offset1 = 0.0;
        self.offset2 = 0.0;
        if self.phase == JointPhase::Attached {
            self.phase = JointPhase::Detached;
        }
    }

    /// Replace the start-point reference. Flags the identity change for
    /// observers; an attached joint must be re-attached for the change to
    /// take effect.
    pub fn set_start_point(&mut self, start_point: Option<StartPointConfig>) {
        let old = self.start_point_ref.as_ref().map(StartPointConfig::body_name);
        let new = start_point.as_ref().map(StartPointConfig::body_name);
        if old == new {
            self.start_point_ref = start_point;
            return;
        }
        if self.phase == JointPhase::Attached {
            warn!("start point changed while attached; re-attach to apply");
        }
        self.start_point = start_point.as_ref().map(|_| StartPointLink::new());
        self.start_point_ref = start_point;
        self.start_point_changed = true;
    }

    /// Consume the start-point identity-change flag.
    pub fn take_start_point_changed(&mut self) -> bool {
        std::mem::take(&mut self.start_point_changed)
    }

    /// Replace an axis direction. Propagated to the engine on the next
    /// pre-step; gear type is reclassified immediately.
    pub fn set_axis_direction(&mut self, axis: AxisId, direction: nalgebra::Vector3<f32>) {
        match axis {
            AxisId::Axis1 => self.axis1.axis = direction,
            AxisId::Axis2 => self.axis2.axis = direction,
        }
        self.axis_dirty = true;
        self.reclassify();
    }

    /// Replace an axis anchor. Propagated to the engine on the next
    /// pre-step; gear type is reclassified immediately.
    pub fn set_anchor(&mut self, axis: AxisId, anchor: nalgebra::Point3<f32>) {
        match axis {
            AxisId::Axis1 => self.axis1.anchor = anchor,
            AxisId::Axis2 => self.axis2.anchor = anchor,
        }
        self.anchor_dirty = true;
        self.reclassify();
    }

    /// Replace an axis's position limits. Propagated on the next pre-step.
    pub fn set_limits(&mut self, axis: AxisId, min: f32, max: f32) {
        let params = match axis {
            AxisId::Axis1 => &mut self.axis1,
            AxisId::Axis2 => &mut self.axis2,
        };
        params.min_position = min;
        params.max_position = max;
        self.limits_dirty = true;
    }

    /// Mount a motor device on an axis.
    pub fn set_motor(&mut self, axis: AxisId, motor: RotationalMotor) {
        match axis {
            AxisId::Axis1 => self.motor1 = Some(motor),
            AxisId::Axis2 => self.motor2 = Some(motor),
        }
    }

    /// Motor devices mounted on the joint, axis 1 first.
    #[must_use]
    pub fn devices(&self) -> Vec<&RotationalMotor> {
        self.motor1.iter().chain(self.motor2.iter()).collect()
    }

    /// The inferred gear relationship.
    #[must_use]
    pub const fn gear_type(&self) -> GearType {
        self.coupling.gear
    }

    /// Lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> JointPhase {
        self.phase
    }

    /// The coupling law in effect.
    #[must_use]
    pub const fn coupling(&self) -> &Coupling {
        &self.coupling
    }

    /// Parent body name.
    #[must_use]
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// End-point body name.
    #[must_use]
    pub fn end_point(&self) -> &str {
        &self.end_point
    }

    /// Start-point body name, if configured.
    #[must_use]
    pub fn start_point_name(&self) -> Option<&str> {
        self.start_point_ref.as_ref().map(StartPointConfig::body_name)
    }

    /// Export the non-derived configuration. Gear type, position offsets,
    /// and cached zero poses are recomputed at attach and never saved.
    #[must_use]
    pub fn to_config(&self) -> TransmissionConfig {
        TransmissionConfig {
            parent: self.parent.clone(),
            end_point: self.end_point.clone(),
            multiplier: self.coupling.multiplier,
            backlash: self.coupling.backlash,
            coupling_stiffness: self.coupling.stiffness,
            axis1: axis_config(&self.axis1, self.initial_position1),
            parameters2: self
                .explicit_parameters2
                .then(|| axis_config(&self.axis2, self.initial_position2)),
            start_point: self.start_point_ref.clone(),
        }
    }

    // -- internals --

    fn reclassify(&mut self) {
        self.coupling.gear = infer_gear_type(
            self.axis1.axis,
            self.axis1.anchor,
            self.axis2.axis,
            self.axis2.anchor,
            GEOMETRY_TOLERANCE,
        );
    }

    fn flush_parameter_updates(&mut self, engine: &mut dyn HingeEngine, hinge1: HingeId) {
        if self.axis_dirty {
            self.axis_dirty = false;
            if let Some(unit) = self.axis1.unit_axis() {
                engine.set_axis(hinge1, unit);
            }
            if let (Some(hinge2), Some(unit)) = (self.hinge2, self.axis2.unit_axis()) {
                engine.set_axis(hinge2, unit);
            }
        }
        if self.anchor_dirty {
            self.anchor_dirty = false;
            engine.set_anchor(hinge1, self.axis1.anchor);
            if let Some(hinge2) = self.hinge2 {
                engine.set_anchor(hinge2, self.axis2.anchor);
            }
        }
        if self.limits_dirty {
            self.limits_dirty = false;
            engine.set_limits(hinge1, limit_array(&self.axis1));
            if let Some(hinge2) = self.hinge2 {
                engine.set_limits(hinge2, limit_array(&self.axis2));
            }
        }
    }

    fn write_start_point_pose(&mut self, engine: &mut dyn HingeEngine) {
        let (Some(link), Some(sp)) = (self.start_point.as_mut(), self.start_point_ref.as_ref())
        else {
            return;
        };
        let Some(unit1) = self.axis1.unit_axis() else {
            return;
        };
        if let Some((translation, rotation)) =
            link.pose_for(&unit1, self.axis1.anchor, self.position1)
        {
            link.mark_joint_driven();
            engine.set_body_pose(sp.body_name(), translation, rotation);
        }
    }
}

// ---------------------------------------------------------------------------
// Config conversion helpers
// ---------------------------------------------------------------------------

fn axis_parameters(config: &AxisConfig) -> AxisParameters {
    let mut params = AxisParameters::about(nalgebra::Vector3::new(
        config.axis[0],
        config.axis[1],
        config.axis[2],
    ))
    .with_anchor(nalgebra::Point3::new(
        config.anchor[0],
        config.anchor[1],
        config.anchor[2],
    ))
    .with_spring(config.spring_constant)
    .with_damping(config.damping_constant)
    .with_limits(
        config.min_position.unwrap_or(f32::NEG_INFINITY),
        config.max_position.unwrap_or(f32::INFINITY),
    );
    if config.static_friction {
        params = params.with_static_friction();
    }
    params
}

fn axis_config(params: &AxisParameters, initial_position: f32) -> AxisConfig {
    AxisConfig {
        axis: [params.axis.x, params.axis.y, params.axis.z],
        anchor: [params.anchor.x, params.anchor.y, params.anchor.z],
        spring_constant: params.spring_constant,
        damping_constant: params.damping_constant,
        static_friction: params.static_friction,
        min_position: params.min_position.is_finite().then_some(params.min_position),
        max_position: params.max_position.is_finite().then_some(params.max_position),
        position: initial_position,
    }
}

fn limit_array(params: &AxisParameters) -> Option<[f32; 2]> {
    params.is_limited().then(|| {
        [
            params.min_position.max(-UNBOUNDED_LIMIT),
            params.max_position.min(UNBOUNDED_LIMIT),
        ]
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::f32::consts::{FRAC_PI_2, PI};

    use nalgebra::{Point3, UnitVector3, Vector3};

    use gearlink_core::config::{AxisConfig, StartPointConfig, TransmissionConfig};

    use super::*;

    // ---- MockEngine ----

    #[derive(Default)]
    struct MockHinge {
        raw_angle: f32,
        angular_velocity: f32,
        torque: f32,
        axis: Option<UnitVector3<f32>>,
        anchor: Option<Point3<f32>>,
        limits: Option<[f32; 2]>,
    }

    #[derive(Default)]
    struct MockEngine {
        bodies: HashMap<String, (Vector3<f32>, UnitQuaternion<f32>)>,
        hinges: HashMap<HingeId, MockHinge>,
        next: u64,
    }

    impl MockEngine {
        fn with_bodies(names: &[&str]) -> Self {
            let mut engine = Self::default();
            for name in names {
                engine.bodies.insert(
                    (*name).to_owned(),
                    (Vector3::zeros(), UnitQuaternion::identity()),
                );
            }
            engine
        }

        fn set_raw_angle(&mut self, hinge: HingeId, angle: f32) {
            if let Some(h) = self.hinges.get_mut(&hinge) {
                h.raw_angle = angle;
            }
        }

        fn torque(&self, hinge: HingeId) -> f32 {
            self.hinges[&hinge].torque
        }
    }

    impl HingeEngine for MockEngine {
        fn has_body(&self, name: &str) -> bool {
            self.bodies.contains_key(name)
        }

        fn attach_hinge(
            &mut self,
            _parent: &str,
            _child: &str,
            axis: UnitVector3<f32>,
            anchor: Point3<f32>,
            limits: Option<[f32; 2]>,
        ) -> Result<HingeId, AttachError> {
            let id = HingeId::from_raw(self.next);
            self.next += 1;
            self.hinges.insert(
                id,
                MockHinge {
                    axis: Some(axis),
                    anchor: Some(anchor),
                    limits,
                    ..MockHinge::default()
                },
            );
            Ok(id)
        }

        fn detach(&mut self, hinge: HingeId) {
            self.hinges.remove(&hinge);
        }

        fn set_axis(&mut self, hinge: HingeId, axis: UnitVector3<f32>) {
            if let Some(h) = self.hinges.get_mut(&hinge) {
                h.axis = Some(axis);
            }
        }

        fn set_anchor(&mut self, hinge: HingeId, anchor: Point3<f32>) {
            if let Some(h) = self.hinges.get_mut(&hinge) {
                h.anchor = Some(anchor);
            }
        }

        fn set_limits(&mut self, hinge: HingeId, limits: Option<[f32; 2]>) {
            if let Some(h) = self.hinges.get_mut(&hinge) {
                h.limits = limits;
            }
        }

        fn apply_torque(&mut self, hinge: HingeId, torque: f32) {
            if let Some(h) = self.hinges.get_mut(&hinge) {
                h.torque = torque;
            }
        }

        fn raw_angle(&self, hinge: HingeId) -> f32 {
            self.hinges.get(&hinge).map_or(f32::NAN, |h| h.raw_angle)
        }

        fn angular_velocity(&self, hinge: HingeId) -> f32 {
            self.hinges.get(&hinge).map_or(0.0, |h| h.angular_velocity)
        }

        fn body_pose(&self, name: &str) -> Option<(Vector3<f32>, UnitQuaternion<f32>)> {
            self.bodies.get(name).copied()
        }

        fn set_body_pose(
            &mut self,
            name: &str,
            translation: Vector3<f32>,
            rotation: UnitQuaternion<f32>,
        ) {
            if let Some(pose) = self.bodies.get_mut(name) {
                *pose = (translation, rotation);
            }
        }
    }

    // ---- fixtures ----

    fn basic_config() -> TransmissionConfig {
        TransmissionConfig::new("frame", "wheel")
    }

    fn three_body_config() -> TransmissionConfig {
        TransmissionConfig {
            multiplier: 2.0,
            start_point: Some(StartPointConfig::Body("pinion".into())),
            parameters2: Some(AxisConfig {
                anchor: [0.2, 0.0, 0.0],
                ..AxisConfig::default()
            }),
            ..TransmissionConfig::new("frame", "wheel")
        }
    }

    fn attached_joint(engine: &mut MockEngine) -> TransmissionJoint {
        let mut joint = TransmissionJoint::from_config(&three_body_config()).unwrap();
        joint.pre_finalize();
        joint.attach(engine).unwrap();
        joint
    }

    // ---- wrap_angle ----

    #[test]
    fn wrap_angle_identity_in_range() {
        assert!((wrap_angle(1.0) - 1.0).abs() < 1e-6);
        assert!((wrap_angle(-1.0) - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn wrap_angle_wraps_past_pi() {
        assert!((wrap_angle(PI + 0.1) - (-PI + 0.1)).abs() < 1e-5);
        assert!((wrap_angle(-PI - 0.1) - (PI - 0.1)).abs() < 1e-5);
        assert!((wrap_angle(2.0 * PI)).abs() < 1e-5);
    }

    // ---- lifecycle ----

    #[test]
    fn from_config_rejects_zero_multiplier() {
        let config = TransmissionConfig {
            multiplier: 0.0,
            ..basic_config()
        };
        assert!(matches!(
            TransmissionJoint::from_config(&config).unwrap_err(),
            ConfigError::InvalidMultiplier(_)
        ));
    }

    #[test]
    fn attach_before_finalize_fails() {
        let mut engine = MockEngine::with_bodies(&["frame", "wheel"]);
        let mut joint = TransmissionJoint::from_config(&basic_config()).unwrap();
        assert_eq!(joint.attach(&mut engine).unwrap_err(), AttachError::NotFinalized);
        assert_eq!(joint.phase(), JointPhase::Unfinalized);
    }

    #[test]
    fn pre_finalize_defaults_axis2_to_axis1_geometry() {
        let config = TransmissionConfig {
            axis1: AxisConfig {
                axis: [1.0, 0.0, 0.0],
                anchor: [0.0, 0.5, 0.0],
                ..AxisConfig::default()
            },
            ..basic_config()
        };
        let mut joint = TransmissionJoint::from_config(&config).unwrap();
        joint.pre_finalize();
        assert_eq!(joint.phase(), JointPhase::Detached);
        assert!((joint.axis2.axis - Vector3::x()).norm() < f32::EPSILON);
        assert!((joint.axis2.anchor.coords - Vector3::new(0.0, 0.5, 0.0)).norm() < f32::EPSILON);
    }

    #[test]
    fn pre_finalize_clamps_initial_position() {
        let config = TransmissionConfig {
            axis1: AxisConfig {
                min_position: Some(-1.0),
                max_position: Some(1.0),
                position: 3.0,
                ..AxisConfig::default()
            },
            ..basic_config()
        };
        let mut joint = TransmissionJoint::from_config(&config).unwrap();
        joint.pre_finalize();
        assert!((joint.position(AxisId::Axis1) - 1.0).abs() < f32::EPSILON);
        assert!((joint.initial_position(AxisId::Axis1) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn attach_missing_end_point_keeps_joint_detached() {
        let mut engine = MockEngine::with_bodies(&["frame"]);
        let mut joint = TransmissionJoint::from_config(&basic_config()).unwrap();
        joint.pre_finalize();
        assert_eq!(
            joint.attach(&mut engine).unwrap_err(),
            AttachError::MissingEndPoint("wheel".into())
        );
        assert_eq!(joint.phase(), JointPhase::Detached);
        assert!(engine.hinges.is_empty());
    }

    #[test]
    fn attach_missing_start_point_keeps_joint_detached() {
        let mut engine = MockEngine::with_bodies(&["frame", "wheel"]);
        let mut joint = TransmissionJoint::from_config(&three_body_config()).unwrap();
        joint.pre_finalize();
        assert_eq!(
            joint.attach(&mut engine).unwrap_err(),
            AttachError::MissingStartPoint("pinion".into())
        );
        assert_eq!(joint.phase(), JointPhase::Detached);
        assert!(engine.hinges.is_empty());
    }

    #[test]
    fn attach_classifies_gear_and_creates_hinges() {
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let joint = attached_joint(&mut engine);
        assert_eq!(joint.phase(), JointPhase::Attached);
        // Parallel Z axes offset by 0.2 along X.
        assert_eq!(joint.gear_type(), GearType::ChainDrive);
        assert_eq!(engine.hinges.len(), 2);
    }

    #[test]
    fn double_attach_rejected() {
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = attached_joint(&mut engine);
        assert_eq!(
            joint.attach(&mut engine).unwrap_err(),
            AttachError::AlreadyAttached
        );
    }

    // ---- stepping ----

    #[test]
    fn pre_step_detached_errors() {
        let mut engine = MockEngine::with_bodies(&["frame", "wheel"]);
        let mut joint = TransmissionJoint::from_config(&basic_config()).unwrap();
        joint.pre_finalize();
        assert_eq!(
            joint.pre_physics_step(&mut engine, 0.001).unwrap_err(),
            StepError::Detached
        );
    }

    #[test]
    fn coupling_torque_flows_to_both_hinges() {
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = attached_joint(&mut engine);
        // position2 deviates from 2 * position1 by +0.1.
        joint.set_position(0.2, AxisId::Axis1);
        joint.set_position(0.5, AxisId::Axis2);
        joint.pre_physics_step(&mut engine, 0.001).unwrap();

        let h1 = joint.hinge1.unwrap();
        let h2 = joint.hinge2.unwrap();
        let t2 = engine.torque(h2);
        let t1 = engine.torque(h1);
        // Restoring torque opposes the positive deviation; reaction balances.
        assert!(t2 < 0.0);
        assert!((t1 - (-2.0 * t2)).abs() < 1e-5);
    }

    #[test]
    fn dead_zone_applies_no_torque() {
        let config = TransmissionConfig {
            backlash: 0.4,
            ..three_body_config()
        };
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = TransmissionJoint::from_config(&config).unwrap();
        joint.pre_finalize();
        joint.attach(&mut engine).unwrap();

        // Deviation 0.1 is inside the 0.2 half-band.
        joint.set_position(0.2, AxisId::Axis1);
        joint.set_position(0.5, AxisId::Axis2);
        joint.pre_physics_step(&mut engine, 0.001).unwrap();
        assert!(engine.torque(joint.hinge2.unwrap()).abs() < f32::EPSILON);
        assert!(engine.torque(joint.hinge1.unwrap()).abs() < f32::EPSILON);
    }

    #[test]
    fn post_step_accumulates_wrapped_angles() {
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = attached_joint(&mut engine);
        let h1 = joint.hinge1.unwrap();

        // Raw angle walks to 3.0, then wraps to -3.0: the logical position
        // must keep increasing through the wrap, not jump backwards.
        engine.set_raw_angle(h1, 3.0);
        joint.post_physics_step(&mut engine).unwrap();
        assert!((joint.position(AxisId::Axis1) - 3.0).abs() < 1e-5);

        engine.set_raw_angle(h1, -3.0);
        joint.post_physics_step(&mut engine).unwrap();
        let expected = 3.0 + (2.0 * PI - 6.0);
        assert!((joint.position(AxisId::Axis1) - expected).abs() < 1e-4);
    }

    #[test]
    fn non_finite_readback_keeps_previous_position() {
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = attached_joint(&mut engine);
        let h1 = joint.hinge1.unwrap();

        engine.set_raw_angle(h1, 0.5);
        joint.post_physics_step(&mut engine).unwrap();
        let before = joint.position(AxisId::Axis1);

        engine.set_raw_angle(h1, f32::NAN);
        assert_eq!(
            joint.post_physics_step(&mut engine).unwrap_err(),
            StepError::NonFiniteAngle { axis: 1 }
        );
        assert!((joint.position(AxisId::Axis1) - before).abs() < f32::EPSILON);
    }

    #[test]
    fn secondary_tracks_gear_ratio_without_start_point() {
        let mut engine = MockEngine::with_bodies(&["frame", "wheel"]);
        let config = TransmissionConfig {
            multiplier: -1.5,
            ..basic_config()
        };
        let mut joint = TransmissionJoint::from_config(&config).unwrap();
        joint.pre_finalize();
        joint.attach(&mut engine).unwrap();
        assert!(joint.hinge2.is_none());

        let h1 = joint.hinge1.unwrap();
        engine.set_raw_angle(h1, 0.4);
        joint.post_physics_step(&mut engine).unwrap();
        assert!((joint.position(AxisId::Axis2) - (-0.6)).abs() < 1e-5);
    }

    // ---- set_position / reset ----

    #[test]
    fn set_position_clamps_to_limits() {
        let config = TransmissionConfig {
            axis1: AxisConfig {
                min_position: Some(-1.0),
                max_position: Some(1.0),
                ..AxisConfig::default()
            },
            ..basic_config()
        };
        let mut joint = TransmissionJoint::from_config(&config).unwrap();
        joint.pre_finalize();
        joint.set_position(5.0, AxisId::Axis1);
        assert!((joint.position(AxisId::Axis1) - 1.0).abs() < f32::EPSILON);
        joint.set_position(-5.0, AxisId::Axis1);
        assert!((joint.position(AxisId::Axis1) - (-1.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn set_position_moves_start_point_on_next_pre_step() {
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        engine
            .bodies
            .insert("pinion".into(), (Vector3::new(0.1, 0.0, 0.0), UnitQuaternion::identity()));
        let mut joint = attached_joint(&mut engine);

        joint.set_position(FRAC_PI_2, AxisId::Axis1);
        joint.pre_physics_step(&mut engine, 0.001).unwrap();

        // Pinion at (0.1, 0, 0) rotated +90 deg about Z lands at (0, 0.1, 0).
        let (pos, rot) = engine.body_pose("pinion").unwrap();
        assert!((pos - Vector3::new(0.0, 0.1, 0.0)).norm() < 1e-5);
        assert!((rot.angle() - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn reset_restores_initial_positions() {
        let config = TransmissionConfig {
            axis1: AxisConfig {
                position: 0.3,
                ..AxisConfig::default()
            },
            ..three_body_config()
        };
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = TransmissionJoint::from_config(&config).unwrap();
        joint.pre_finalize();
        joint.attach(&mut engine).unwrap();

        joint.set_position(2.0, AxisId::Axis1);
        joint.set_position(-1.0, AxisId::Axis2);
        joint.reset();
        assert!((joint.position(AxisId::Axis1) - 0.3).abs() < f32::EPSILON);
        assert!((joint.position(AxisId::Axis2)).abs() < f32::EPSILON);
        assert!((joint.velocity(AxisId::Axis1)).abs() < f32::EPSILON);
    }

    #[test]
    fn reset_joint_positions_reports_change() {
        let mut joint = TransmissionJoint::from_config(&basic_config()).unwrap();
        joint.pre_finalize();
        assert!(!joint.reset_joint_positions());
        joint.set_position(1.0, AxisId::Axis1);
        assert!(joint.reset_joint_positions());
        assert!(!joint.reset_joint_positions());
    }

    #[test]
    fn reset_physics_detaches_and_invalidates() {
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = attached_joint(&mut engine);
        joint.reset_physics(&mut engine);
        assert_eq!(joint.phase(), JointPhase::Detached);
        assert_eq!(joint.gear_type(), GearType::Undefined);
        assert!(engine.hinges.is_empty());

        // Re-attach works after a physics reset.
        joint.attach(&mut engine).unwrap();
        assert_eq!(joint.phase(), JointPhase::Attached);
        assert_eq!(joint.gear_type(), GearType::ChainDrive);
    }

    // ---- start point identity ----

    #[test]
    fn set_start_point_flags_identity_change() {
        let mut joint = TransmissionJoint::from_config(&three_body_config()).unwrap();
        assert!(!joint.take_start_point_changed());

        joint.set_start_point(Some(StartPointConfig::Body("idler".into())));
        assert!(joint.take_start_point_changed());
        assert!(!joint.take_start_point_changed());
        assert_eq!(joint.start_point_name(), Some("idler"));
    }

    #[test]
    fn same_body_reference_form_is_not_a_change() {
        let mut joint = TransmissionJoint::from_config(&three_body_config()).unwrap();
        joint.set_start_point(Some(StartPointConfig::Reference("pinion".into())));
        assert!(!joint.take_start_point_changed());
    }

    // ---- devices ----

    #[test]
    fn devices_lists_motors_in_axis_order() {
        let mut joint = TransmissionJoint::from_config(&basic_config()).unwrap();
        assert!(joint.devices().is_empty());
        joint.set_motor(AxisId::Axis2, RotationalMotor::new("m2", 5.0, 10.0));
        joint.set_motor(AxisId::Axis1, RotationalMotor::new("m1", 5.0, 10.0));
        let names: Vec<_> = joint.devices().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["m1", "m2"]);
    }

    // ---- save surface ----

    #[test]
    fn to_config_round_trips_non_derived_fields() {
        let config = TransmissionConfig {
            backlash: 0.05,
            coupling_stiffness: 7.0,
            ..three_body_config()
        };
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = TransmissionJoint::from_config(&config).unwrap();
        joint.pre_finalize();
        joint.attach(&mut engine).unwrap();

        // Derived state changes must not leak into the saved config.
        let h1 = joint.hinge1.unwrap();
        engine.set_raw_angle(h1, 1.0);
        joint.post_physics_step(&mut engine).unwrap();

        assert_eq!(joint.to_config(), config);
    }

    #[test]
    fn to_config_omits_defaulted_parameters2() {
        let mut joint = TransmissionJoint::from_config(&basic_config()).unwrap();
        joint.pre_finalize();
        assert!(joint.to_config().parameters2.is_none());
    }

    // ---- parameter updates ----

    #[test]
    fn axis_change_reclassifies_and_pushes_to_engine() {
        let mut engine = MockEngine::with_bodies(&["frame", "pinion", "wheel"]);
        let mut joint = attached_joint(&mut engine);
        assert_eq!(joint.gear_type(), GearType::ChainDrive);

        // Tilt axis 2 so the lines become skew.
        joint.set_axis_direction(AxisId::Axis2, Vector3::x());
        assert_eq!(joint.gear_type(), GearType::Undefined);

        joint.pre_physics_step(&mut engine, 0.001).unwrap();
        let h2 = joint.hinge2.unwrap();
        let pushed = engine.hinges[&h2].axis.unwrap();
        assert!((pushed.into_inner() - Vector3::x()).norm() < 1e-6);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn joint_is_send_sync() {
        assert_send_sync::<TransmissionJoint>();
    }
}
