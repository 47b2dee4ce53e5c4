//! Scene builder for constructing a fully configured Bevy [`App`].
//!
//! [`SceneBuilder`] takes a validated [`SceneConfig`], spawns its rigid
//! bodies into the physics world, attaches the transmission joint, and
//! returns a ready-to-run [`SpawnedScene`].
//!
//! # Example
//!
//! ```no_run
//! use gearlink_sim::SceneBuilder;
//!
//! let scene = SceneBuilder::from_file("scene.toml")
//!     .and_then(SceneBuilder::build)
//!     .expect("scene build failed");
//! ```

use std::path::Path;

use bevy::prelude::*;
use tracing::info;

use gearlink_core::config::{SceneConfig, SimConfig};
use gearlink_core::error::GearlinkError;
use gearlink_physics::backend::HingeEngine;
use gearlink_physics::components::JointBodies;
use gearlink_physics::joint::TransmissionJoint;
use gearlink_physics::rapier::RapierWorld;

use crate::GearlinkSimPlugin;

// ---------------------------------------------------------------------------
// SpawnedScene
// ---------------------------------------------------------------------------

/// Result of building a scene: the Bevy app plus the joint entity.
pub struct SpawnedScene {
    /// The fully configured Bevy application.
    pub app: App,
    /// Entity holding the [`TransmissionJoint`] component.
    pub joint: Entity,
}

impl std::fmt::Debug for SpawnedScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedScene")
            .field("joint", &self.joint)
            .finish_non_exhaustive()
    }
}

impl SpawnedScene {
    /// The spawned joint component, if the entity is still alive.
    pub fn joint(&self) -> Option<&TransmissionJoint> {
        self.app.world().get::<TransmissionJoint>(self.joint)
    }

    /// Mutable access to the spawned joint component.
    pub fn joint_mut(&mut self) -> Option<Mut<'_, TransmissionJoint>> {
        self.app.world_mut().get_mut::<TransmissionJoint>(self.joint)
    }

    /// Run `n` full pre/step/read-back cycles.
    pub fn step_n(&mut self, n: u32) {
        for _ in 0..n {
            self.app.update();
        }
    }
}

// ---------------------------------------------------------------------------
// SceneBuilder
// ---------------------------------------------------------------------------

/// Builds a complete simulation from a [`SceneConfig`].
///
/// Bodies are spawned before the joint attaches so that every name the
/// transmission references resolves to a live rigid body.
pub struct SceneBuilder {
    scene: SceneConfig,
}

impl SceneBuilder {
    /// Builder over an already-loaded scene configuration.
    #[must_use]
    pub const fn new(scene: SceneConfig) -> Self {
        Self { scene }
    }

    /// Parse a scene from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, GearlinkError> {
        Ok(Self::new(SceneConfig::from_toml(content)?))
    }

    /// Load a scene from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if reading, parsing, or validation
    /// fails.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GearlinkError> {
        Ok(Self::new(SceneConfig::from_file(path)?))
    }

    /// The scene configuration this builder will realize.
    pub const fn scene(&self) -> &SceneConfig {
        &self.scene
    }

    /// Build the Bevy [`App`], spawn all bodies, and attach the joint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the scene fails validation, or an
    /// attach error if the joint cannot bind to its bodies. On attach
    /// failure the joint is left detached and no entity is spawned.
    pub fn build(self) -> Result<SpawnedScene, GearlinkError> {
        self.scene.validate()?;

        let mut app = App::new();
        app.add_plugins(GearlinkSimPlugin);

        // The plugin installs defaults; override with the scene's settings.
        *app.world_mut().resource_mut::<SimConfig>() = self.scene.simulation.clone();
        *app.world_mut().resource_mut::<RapierWorld>() =
            RapierWorld::from_config(&self.scene.simulation);

        // Finalize plugin setup before spawning entities.
        app.finish();
        app.cleanup();

        let mut joint = TransmissionJoint::from_config(&self.scene.transmission)?;
        joint.pre_finalize();
        {
            let mut world = app.world_mut().resource_mut::<RapierWorld>();
            for body in &self.scene.bodies {
                world.spawn_body(body);
            }
            world.snapshot_initial_state();
            joint.attach(world.as_mut() as &mut dyn HingeEngine)?;
        }

        info!(
            parent = %self.scene.transmission.parent,
            end_point = %self.scene.transmission.end_point,
            gear = %joint.gear_type(),
            "transmission attached"
        );

        let bodies = JointBodies {
            parent: self.scene.transmission.parent.clone(),
            end_point: self.scene.transmission.end_point.clone(),
            start_point: self
                .scene
                .transmission
                .start_point
                .as_ref()
                .map(|sp| sp.body_name().to_owned()),
        };
        let entity = app.world_mut().spawn((joint, bodies)).id();

        Ok(SpawnedScene { app, joint: entity })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use gearlink_core::config::{BodyConfig, TransmissionConfig};
    use gearlink_core::error::{ConfigError, GearlinkError};
    use gearlink_core::time::SimTime;
    use gearlink_model::gear::GearType;
    use gearlink_physics::joint::JointPhase;

    use super::*;
    use crate::CouplingStats;

    fn minimal_scene() -> SceneConfig {
        SceneConfig {
            simulation: SimConfig {
                gravity: [0.0; 3],
                ..SimConfig::default()
            },
            bodies: vec![
                BodyConfig::fixed("frame"),
                BodyConfig::dynamic("wheel").at([0.0, 0.0, 0.2]),
            ],
            transmission: TransmissionConfig::new("frame", "wheel"),
        }
    }

    #[test]
    fn build_minimal_scene() {
        let scene = SceneBuilder::new(minimal_scene()).build().unwrap();
        assert!(scene.app.world().get_resource::<CouplingStats>().is_some());
        assert!(scene.app.world().get_resource::<SimTime>().is_some());
        assert_eq!(scene.joint().unwrap().phase(), JointPhase::Attached);
    }

    #[test]
    fn build_classifies_coaxial_gear() {
        let mut config = minimal_scene();
        config.transmission.parameters2 = Some(gearlink_core::config::AxisConfig {
            anchor: [0.0, 0.0, 0.2],
            ..Default::default()
        });
        let scene = SceneBuilder::new(config).build().unwrap();
        assert_eq!(scene.joint().unwrap().gear_type(), GearType::ClassicGear);
    }

    #[test]
    fn build_spawns_joint_bodies_component() {
        let scene = SceneBuilder::new(minimal_scene()).build().unwrap();
        let bodies = scene.app.world().get::<JointBodies>(scene.joint).unwrap();
        assert_eq!(bodies.parent, "frame");
        assert_eq!(bodies.end_point, "wheel");
        assert!(bodies.start_point.is_none());
    }

    #[test]
    fn build_rejects_unknown_body() {
        let mut config = minimal_scene();
        config.transmission.end_point = "ghost".into();
        assert!(matches!(
            SceneBuilder::new(config).build().unwrap_err(),
            GearlinkError::Config(ConfigError::UnknownBody(_))
        ));
    }

    #[test]
    fn build_rejects_zero_multiplier() {
        let mut config = minimal_scene();
        config.transmission.multiplier = 0.0;
        assert!(matches!(
            SceneBuilder::new(config).build().unwrap_err(),
            GearlinkError::Config(ConfigError::InvalidMultiplier(_))
        ));
    }

    #[test]
    fn built_scene_advances_clock() {
        let mut scene = SceneBuilder::new(minimal_scene()).build().unwrap();
        scene.step_n(5);
        let time = scene.app.world().resource::<SimTime>();
        assert_eq!(time.steps(), 5);
    }

    #[test]
    fn from_toml_rejects_garbage() {
        assert!(SceneBuilder::from_toml("not toml at all [").is_err());
    }
}
