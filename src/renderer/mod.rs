//! The renderer: GPU context, mesh drawing, and the cascaded shadow pipeline.

pub mod context;
pub mod draw;
pub mod shadow;
