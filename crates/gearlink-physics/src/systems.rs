//! Systems driving the transmission joint step cycle.
//!
//! Three phases per `Update` tick, ordered by `GearlinkSet`:
//! actuation (torques in), simulation (engine substeps), read-back
//! (positions rebased from raw angles).

use bevy::prelude::*;
use tracing::warn;

use gearlink_core::config::SimConfig;
use gearlink_core::time::SimTime;

use crate::components::StartPointChanged;
use crate::joint::{JointPhase, TransmissionJoint};
use crate::rapier::RapierWorld;

/// Push spring/damping/friction/coupling torques and pending parameter
/// updates into the engine.
#[allow(clippy::needless_pass_by_value)]
pub fn pre_physics_system(
    mut world: ResMut<RapierWorld>,
    sim: Res<SimConfig>,
    mut joints: Query<&mut TransmissionJoint>,
) {
    for mut joint in &mut joints {
        if joint.phase() != JointPhase::Attached {
            continue;
        }
        if let Err(err) = joint.pre_physics_step(world.as_mut(), sim.physics_dt) {
            warn!(%err, "transmission pre-step failed");
        }
    }
}

/// Run the engine's configured substeps and advance the simulation clock.
#[allow(clippy::needless_pass_by_value)]
pub fn physics_step_system(
    mut world: ResMut<RapierWorld>,
    sim: Res<SimConfig>,
    mut time: ResMut<SimTime>,
) {
    world.step_cycle();
    time.advance(sim.cycle_dt());
}

/// Read raw angles back into logical positions and publish start-point
/// identity changes.
pub fn post_physics_system(
    mut world: ResMut<RapierWorld>,
    mut joints: Query<(Entity, &mut TransmissionJoint)>,
    mut start_point_events: EventWriter<StartPointChanged>,
) {
    for (entity, mut joint) in &mut joints {
        if joint.phase() == JointPhase::Attached {
            if let Err(err) = joint.post_physics_step(world.as_mut()) {
                warn!(%err, "transmission read-back failed");
            }
        }
        if joint.take_start_point_changed() {
            start_point_events.write(StartPointChanged { joint: entity });
        }
    }
}
