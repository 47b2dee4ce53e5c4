use std::path::Path;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_physics_dt() -> f64 {
    0.001
}
const fn default_substeps() -> usize {
    1
}
const fn default_gravity() -> [f32; 3] {
    [0.0, 0.0, -9.81]
}
const fn default_max_steps() -> u32 {
    1000
}
const fn default_axis() -> [f32; 3] {
    [0.0, 0.0, 1.0]
}
const fn default_multiplier() -> f32 {
    1.0
}
const fn default_coupling_stiffness() -> f32 {
    10.0
}
const fn default_mass() -> f32 {
    1.0
}
const fn default_inertia() -> [f32; 3] {
    [0.01, 0.01, 0.01]
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Stepping-loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
pub struct SimConfig {
    /// Physics timestep in seconds (default: 0.001 = 1000 Hz).
    #[serde(default = "default_physics_dt")]
    pub physics_dt: f64,

    /// Number of engine substeps per joint pre/post step cycle.
    #[serde(default = "default_substeps")]
    pub substeps: usize,

    /// Gravity vector [x, y, z] in m/s^2.
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],

    /// Maximum steps a headless run executes (default: 1000).
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            physics_dt: default_physics_dt(),
            substeps: default_substeps(),
            gravity: default_gravity(),
            max_steps: default_max_steps(),
        }
    }
}

impl SimConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.physics_dt <= 0.0 {
            return Err(ConfigError::InvalidPhysicsDt(self.physics_dt));
        }
        if self.substeps == 0 {
            return Err(ConfigError::MissingField("substeps".into()));
        }
        Ok(())
    }

    /// Seconds covered by one full pre/step/post cycle.
    #[allow(clippy::cast_precision_loss)]
    pub fn cycle_dt(&self) -> f64 {
        self.physics_dt * self.substeps as f64
    }
}

// ---------------------------------------------------------------------------
// AxisConfig
// ---------------------------------------------------------------------------

/// Per-axis hinge configuration, relative to the parent body frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Rotation axis direction (need not be normalized; must be non-zero).
    #[serde(default = "default_axis")]
    pub axis: [f32; 3],

    /// Anchor point the axis passes through.
    #[serde(default)]
    pub anchor: [f32; 3],

    /// Spring constant toward the zero reference (Nm/rad).
    #[serde(default)]
    pub spring_constant: f32,

    /// Damping constant opposing angular velocity (Nm/(rad/s)).
    #[serde(default)]
    pub damping_constant: f32,

    /// Whether static friction holds the axis still at rest.
    #[serde(default)]
    pub static_friction: bool,

    /// Lower position limit (rad). Unbounded when absent.
    #[serde(default)]
    pub min_position: Option<f32>,

    /// Upper position limit (rad). Unbounded when absent.
    #[serde(default)]
    pub max_position: Option<f32>,

    /// Initial logical position (rad).
    #[serde(default)]
    pub position: f32,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            axis: default_axis(),
            anchor: [0.0; 3],
            spring_constant: 0.0,
            damping_constant: 0.0,
            static_friction: false,
            min_position: None,
            max_position: None,
            position: 0.0,
        }
    }
}

impl AxisConfig {
    fn validate(&self, label: &'static str) -> Result<(), ConfigError> {
        let [x, y, z] = self.axis;
        if (x * x + y * y + z * z) < f32::EPSILON {
            return Err(ConfigError::DegenerateAxis(label));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StartPointConfig
// ---------------------------------------------------------------------------

/// Reference to the optional intermediate body between the joint's two ends.
///
/// Three reference forms are accepted in scene files:
///
/// ```toml
/// start_point = { body = "idler" }        # direct body
/// start_point = { reference = "idler" }   # named reference defined elsewhere
/// start_point = { slot = "axle_slot" }    # slot-mounted body
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPointConfig {
    /// Direct body owned by the joint's scene subtree.
    Body(String),
    /// Named reference to a body defined elsewhere in the scene.
    Reference(String),
    /// Body mounted through a named slot.
    Slot(String),
}

impl StartPointConfig {
    /// The referenced body name, regardless of reference form.
    pub fn body_name(&self) -> &str {
        match self {
            Self::Body(name) | Self::Reference(name) | Self::Slot(name) => name,
        }
    }
}

// ---------------------------------------------------------------------------
// TransmissionConfig
// ---------------------------------------------------------------------------

/// Transmission joint configuration.
///
/// Only non-derived state appears here: gear type, position offsets, and
/// cached zero transforms are recomputed at attach and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionConfig {
    /// Parent body name.
    pub parent: String,

    /// End-point body name.
    pub end_point: String,

    /// Gear ratio relating axis1 rotation to axis2 rotation. Negative values
    /// reverse the rotation direction. Must be non-zero.
    #[serde(default = "default_multiplier")]
    pub multiplier: f32,

    /// Angular play of the gear coupling (rad). Zero means rigid coupling.
    #[serde(default)]
    pub backlash: f32,

    /// Restoring-torque gain applied outside the backlash band (Nm/rad).
    #[serde(default = "default_coupling_stiffness")]
    pub coupling_stiffness: f32,

    /// Axis 1 hinge parameters.
    #[serde(default)]
    pub axis1: AxisConfig,

    /// Axis 2 hinge parameters. When absent, axis 2 defaults to axis 1's
    /// geometry and the joint tracks its scalar position directly.
    #[serde(default)]
    pub parameters2: Option<AxisConfig>,

    /// Optional intermediate body between parent and end point.
    #[serde(default)]
    pub start_point: Option<StartPointConfig>,
}

impl TransmissionConfig {
    /// Minimal configuration between two named bodies.
    pub fn new(parent: impl Into<String>, end_point: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            end_point: end_point.into(),
            multiplier: default_multiplier(),
            backlash: 0.0,
            coupling_stiffness: default_coupling_stiffness(),
            axis1: AxisConfig::default(),
            parameters2: None,
            start_point: None,
        }
    }

    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.multiplier == 0.0 || !self.multiplier.is_finite() {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        if self.backlash < 0.0 {
            return Err(ConfigError::NegativeBacklash(self.backlash));
        }
        self.axis1.validate("axis1")?;
        if let Some(params2) = &self.parameters2 {
            params2.validate("axis2")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BodyConfig
// ---------------------------------------------------------------------------

/// A rigid body spawned into the scene before joints attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    pub name: String,

    #[serde(default)]
    pub translation: [f32; 3],

    #[serde(default = "default_mass")]
    pub mass: f32,

    /// Principal angular inertia about the body frame axes.
    #[serde(default = "default_inertia")]
    pub inertia: [f32; 3],

    /// Fixed bodies never move; dynamic bodies respond to torques.
    #[serde(default)]
    pub fixed: bool,
}

impl BodyConfig {
    /// Dynamic body at the origin with default mass properties.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            translation: [0.0; 3],
            mass: default_mass(),
            inertia: default_inertia(),
            fixed: false,
        }
    }

    /// Fixed (static) body at the origin.
    pub fn fixed(name: impl Into<String>) -> Self {
        Self {
            fixed: true,
            ..Self::dynamic(name)
        }
    }

    /// Builder: set the spawn translation.
    pub const fn at(mut self, translation: [f32; 3]) -> Self {
        self.translation = translation;
        self
    }
}

// ---------------------------------------------------------------------------
// SceneConfig
// ---------------------------------------------------------------------------

/// Complete scene configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub simulation: SimConfig,

    #[serde(default)]
    pub bodies: Vec<BodyConfig>,

    pub transmission: TransmissionConfig,
}

impl SceneConfig {
    /// Validate every section, checking that joint body references resolve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.transmission.validate()?;

        let known = |name: &str| self.bodies.iter().any(|b| b.name == name);
        for name in [
            self.transmission.parent.as_str(),
            self.transmission.end_point.as_str(),
        ] {
            if !known(name) {
                return Err(ConfigError::UnknownBody(name.into()));
            }
        }
        if let Some(sp) = &self.transmission.start_point {
            if !known(sp.body_name()) {
                return Err(ConfigError::UnknownBody(sp.body_name().into()));
            }
        }
        Ok(())
    }

    /// Parse and validate from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Serialize back to TOML (the save surface).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
