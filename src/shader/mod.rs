//! The reflection-driven parameter binding layer.

pub mod catalog;
pub mod globals;
pub mod params;
pub mod reflection;
