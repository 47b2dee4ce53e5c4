//! Rapier3D backend.

pub mod context;

pub use context::RapierWorld;
