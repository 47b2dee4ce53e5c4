// gearlink-core: Errors, configuration, clock, and system ordering for the
// Gearlink transmission-joint simulator.

pub mod config;
pub mod error;
pub mod time;

use bevy::prelude::*;

// ---------------------------------------------------------------------------
// System ordering
// ---------------------------------------------------------------------------

/// Execution phases of one simulation step, chained in `Update`.
///
/// - `Actuate`: joints push spring/damping/coupling torques into the engine.
/// - `Simulate`: the physics engine integrates one (sub)stepped interval.
/// - `Readback`: joint positions are read back and rebased against the
///   engine's raw angles.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GearlinkSet {
    Actuate,
    Simulate,
    Readback,
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Registers the shared clock resource and the `Actuate -> Simulate ->
/// Readback` ordering that the physics and sim crates hang their systems on.
pub struct GearlinkCorePlugin;

impl Plugin for GearlinkCorePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<time::SimTime>();
        app.configure_sets(
            Update,
            (
                GearlinkSet::Actuate,
                GearlinkSet::Simulate,
                GearlinkSet::Readback,
            )
                .chain(),
        );
    }
}
