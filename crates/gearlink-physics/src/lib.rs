// gearlink-physics: Engine boundary, rapier3d backend, and the transmission
// joint orchestrator.

pub mod backend;
pub mod components;
pub mod joint;
pub mod plugin;
pub mod rapier;
pub mod systems;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::backend::{HingeEngine, HingeId, PhysicsBackend};
    pub use crate::components::{JointBodies, StartPointChanged};
    pub use crate::joint::{AxisId, JointPhase, TransmissionJoint};
    pub use crate::plugin::{GearlinkPhysicsPlugin, RapierBackend};
    pub use crate::rapier::RapierWorld;
}
