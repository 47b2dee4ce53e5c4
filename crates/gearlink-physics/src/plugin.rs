//! The main physics plugin that delegates to a concrete backend.

use bevy::app::{App, Plugin, Update};
use bevy::prelude::IntoScheduleConfigs;

use gearlink_core::GearlinkSet;
use gearlink_core::config::SimConfig;

use crate::backend::PhysicsBackend;
use crate::components::StartPointChanged;
use crate::rapier::RapierWorld;
use crate::systems::{physics_step_system, post_physics_system, pre_physics_system};

// ---------------------------------------------------------------------------
// GearlinkPhysicsPlugin
// ---------------------------------------------------------------------------

/// Bevy plugin that wires a [`PhysicsBackend`] into the app.
///
/// # Usage
///
/// ```ignore
/// app.add_plugins(GearlinkPhysicsPlugin::new(RapierBackend::new(sim_config)));
/// ```
///
/// The plugin delegates all setup to the backend's
/// [`build`](PhysicsBackend::build) method, which inserts engine-specific
/// resources and registers systems in the `GearlinkSet` phases.
pub struct GearlinkPhysicsPlugin {
    backend: Box<dyn PhysicsBackend>,
}

impl GearlinkPhysicsPlugin {
    /// Create a new physics plugin with the given backend.
    pub fn new(backend: impl PhysicsBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// The name of the active physics backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

impl Plugin for GearlinkPhysicsPlugin {
    fn build(&self, app: &mut App) {
        self.backend.build(app);
    }
}

// ---------------------------------------------------------------------------
// RapierBackend
// ---------------------------------------------------------------------------

/// The rapier3d backend: inserts [`RapierWorld`] and registers the
/// pre/step/post systems.
#[derive(Default)]
pub struct RapierBackend {
    sim: SimConfig,
}

impl RapierBackend {
    /// Backend configured from simulation settings.
    #[must_use]
    pub const fn new(sim: SimConfig) -> Self {
        Self { sim }
    }
}

impl PhysicsBackend for RapierBackend {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.sim.clone());
        app.insert_resource(RapierWorld::from_config(&self.sim));
        app.add_event::<StartPointChanged>();
        app.add_systems(
            Update,
            (
                pre_physics_system.in_set(GearlinkSet::Actuate),
                physics_step_system.in_set(GearlinkSet::Simulate),
                post_physics_system.in_set(GearlinkSet::Readback),
            ),
        );
    }

    fn name(&self) -> &str {
        "rapier3d"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
