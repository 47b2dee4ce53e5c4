//! Top-level Bevy plugin integrating the Gearlink simulation stack.
//!
//! [`GearlinkSimPlugin`] is a convenience meta-plugin that adds the core and
//! physics plugins in one call, plus coupling statistics tracking. Most
//! callers go through [`SceneBuilder`] instead of adding it directly.
//!
//! # Example
//!
//! ```no_run
//! use bevy::prelude::*;
//! use gearlink_sim::GearlinkSimPlugin;
//!
//! App::new()
//!     .add_plugins(GearlinkSimPlugin)
//!     .run();
//! ```

pub mod builder;
pub mod stats;

#[cfg(test)]
mod headless;

use bevy::prelude::*;
use gearlink_core::GearlinkSet;
use gearlink_physics::plugin::{GearlinkPhysicsPlugin, RapierBackend};
use gearlink_physics::systems::post_physics_system;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use builder::{SceneBuilder, SpawnedScene};
pub use stats::CouplingStats;

// ---------------------------------------------------------------------------
// GearlinkSimPlugin
// ---------------------------------------------------------------------------

/// Meta-plugin that adds the full Gearlink simulation stack.
///
/// Includes:
/// - [`GearlinkCorePlugin`](gearlink_core::GearlinkCorePlugin): system
///   ordering and the `SimTime` clock
/// - [`GearlinkPhysicsPlugin`] with the rapier3d backend: the physics world
///   and the pre/step/read-back systems
/// - [`CouplingStats`] resource and its sampling system
///
/// The backend starts from default simulation settings; [`SceneBuilder`]
/// overrides them from the loaded scene before spawning anything.
pub struct GearlinkSimPlugin;

impl Plugin for GearlinkSimPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(gearlink_core::GearlinkCorePlugin)
            .add_plugins(GearlinkPhysicsPlugin::new(RapierBackend::default()))
            .init_resource::<CouplingStats>()
            .add_systems(
                Update,
                stats::coupling_stats_system
                    .in_set(GearlinkSet::Readback)
                    .after(post_physics_system),
            );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
