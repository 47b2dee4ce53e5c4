//! Gear type classification from the relative geometry of the two hinge
//! axes.
//!
//! # Classification
//!
//! The gear type is a pure function of the two axis lines (direction +
//! anchor), evaluated in a common frame:
//!
//! - Collinear axes: [`GearType::ClassicGear`] (meshed spur gears on the
//!   same shaft line).
//! - Parallel axes with a perpendicular offset: [`GearType::ChainDrive`]
//!   (sprockets linked by a chain or belt).
//! - Non-parallel axes whose lines intersect: [`GearType::BevelGear`].
//! - Skew non-parallel lines, or a degenerate axis direction:
//!   [`GearType::Undefined`] — the coupling is disabled until the geometry
//!   is fixed.

use std::fmt;

use nalgebra::{Point3, Vector3};

/// Geometric tolerance for parallelism and line-intersection tests.
pub const GEOMETRY_TOLERANCE: f32 = 1e-4;

// ---------------------------------------------------------------------------
// GearType
// ---------------------------------------------------------------------------

/// The mechanical relationship inferred from the two hinge axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GearType {
    /// Geometry does not form a valid gear pair; coupling is disabled.
    #[default]
    Undefined,
    /// Collinear axes.
    ClassicGear,
    /// Intersecting non-parallel axes.
    BevelGear,
    /// Parallel axes offset by a perpendicular distance.
    ChainDrive,
}

impl GearType {
    /// Whether the coupling law applies torque for this gear type.
    #[must_use]
    pub const fn is_coupled(self) -> bool {
        !matches!(self, Self::Undefined)
    }
}

impl fmt::Display for GearType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::ClassicGear => "classic gear",
            Self::BevelGear => "bevel gear",
            Self::ChainDrive => "chain drive",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify the gear relationship of two axis lines.
///
/// Deterministic and idempotent: the same geometry always yields the same
/// type. Both lines must be expressed in the same frame.
pub fn infer_gear_type(
    dir1: Vector3<f32>,
    anchor1: Point3<f32>,
    dir2: Vector3<f32>,
    anchor2: Point3<f32>,
    tolerance: f32,
) -> GearType {
    let n1 = dir1.norm();
    let n2 = dir2.norm();
    if n1 < f32::EPSILON || n2 < f32::EPSILON {
        return GearType::Undefined;
    }
    let u1 = dir1 / n1;
    let u2 = dir2 / n2;

    let offset = anchor2 - anchor1;
    let cross = u1.cross(&u2);

    if cross.norm() < tolerance {
        // Parallel lines: collinear when the anchor offset has no component
        // perpendicular to the shared direction.
        let perpendicular = offset - u1 * offset.dot(&u1);
        if perpendicular.norm() < tolerance {
            GearType::ClassicGear
        } else {
            GearType::ChainDrive
        }
    } else {
        // Non-parallel lines intersect iff the skew-line distance
        // |offset . (u1 x u2)| / |u1 x u2| vanishes.
        let distance = offset.dot(&cross).abs() / cross.norm();
        if distance < tolerance {
            GearType::BevelGear
        } else {
            GearType::Undefined
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
