//! Core types: math re-exports and the viewer's model transform.

pub use glam::{Mat4, Vec3, vec3};

pub mod transform;

pub use transform::{SPIN_STEP, ViewTransform};
