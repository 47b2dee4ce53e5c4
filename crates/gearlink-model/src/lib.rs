//! Engine-agnostic transmission math for gear-coupled dual-hinge joints.
//!
//! Pure Rust library with no game engine dependencies.  Provides gear type
//! classification from axis geometry, the multiplier/backlash coupling law,
//! per-axis passive dynamics, and start-point pose bookkeeping.
//!
//! # Coupling Pipeline
//!
//! ```text
//! Axis geometry → Gear classification → Coupling law → Restoring torque
//! (lines in 3D)   (classic/bevel/chain)  (dead zone)    (axis 2 + reaction)
//! ```
//!
//! # Quick Start
//!
//! ```
//! use gearlink_model::prelude::*;
//! use nalgebra::{Point3, Vector3};
//!
//! let gear = infer_gear_type(
//!     Vector3::z(),
//!     Point3::origin(),
//!     Vector3::z(),
//!     Point3::new(0.2, 0.0, 0.0),
//!     GEOMETRY_TOLERANCE,
//! );
//! assert_eq!(gear, GearType::ChainDrive);
//!
//! let coupling = Coupling::new(2.0, 0.01).unwrap().with_gear(gear);
//! let torque2 = coupling.torque(0.5, 1.2);
//! let torque1 = coupling.reaction_torque(torque2);
//! assert!(torque2 < 0.0 && torque1 > 0.0);
//! ```

pub mod axis;
pub mod coupling;
pub mod gear;
pub mod motor;
pub mod start_point;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::axis::AxisParameters;
    pub use crate::coupling::{Coupling, CouplingError};
    pub use crate::gear::{GEOMETRY_TOLERANCE, GearType, infer_gear_type};
    pub use crate::motor::RotationalMotor;
    pub use crate::start_point::StartPointLink;
}
