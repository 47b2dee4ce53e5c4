use thiserror::Error;

/// Top-level error type for gearlink-core.
#[derive(Debug, Error)]
pub enum GearlinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Attach error: {0}")]
    Attach(#[from] AttachError),

    #[error("Step error: {0}")]
    Step(#[from] StepError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid multiplier: {0} (must be non-zero and finite)")]
    InvalidMultiplier(f32),

    #[error("Invalid backlash: {0} (must be >= 0)")]
    NegativeBacklash(f32),

    #[error("Degenerate axis direction for {0} (zero length)")]
    DegenerateAxis(&'static str),

    #[error("Invalid physics_dt: {0} (must be > 0)")]
    InvalidPhysicsDt(f64),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown body: {0}")]
    UnknownBody(String),
}

/// Errors attaching a joint to the physics engine.
///
/// The joint stays detached whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("End-point body not found: {0}")]
    MissingEndPoint(String),

    #[error("Start-point body not found: {0}")]
    MissingStartPoint(String),

    #[error("Parent body not found: {0}")]
    MissingParent(String),

    #[error("Joint has not been finalized")]
    NotFinalized,

    #[error("Joint is already attached")]
    AlreadyAttached,

    #[error("Physics backend rejected the constraint: {0}")]
    BackendRejected(String),
}

/// Per-step errors reading state back from the physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("Engine reported a non-finite angle on axis {axis}")]
    NonFiniteAngle { axis: u8 },

    #[error("Joint is not attached to the physics engine")]
    Detached,
}
