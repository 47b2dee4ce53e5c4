//! ECS components and events for transmission joint entities.

use bevy::prelude::{Component, Entity, Event};

/// Names of the rigid bodies a joint entity connects, for scene queries and
/// diagnostics. The authoritative references live on the joint itself.
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct JointBodies {
    pub parent: String,
    pub end_point: String,
    pub start_point: Option<String>,
}

/// Fired when a joint's start-point body identity changes. Pose updates of
/// the current start point do not fire this.
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartPointChanged {
    pub joint: Entity,
}
