//! Core geometry and scene-facing value types.

pub mod bounds;
pub mod camera;
pub mod light;
pub mod mesh;
