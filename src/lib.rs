//! Ember — a rendering pipeline core built on wgpu.
//!
//! Two pieces make up the crate:
//!
//! 1. A **reflection-driven parameter binding layer**: shaders are plain WGSL,
//!    reflected with naga at load time into a name-keyed catalog of uniform
//!    fields and resource slots. [`ParameterBlock`]s merge values into any
//!    shader that declares a field of the same name, so heterogeneous
//!    materials feed heterogeneous shaders through one generic mechanism.
//! 2. A **cascaded shadow-map renderer** driving a fixed per-frame sequence:
//!    depth collect, scene-bounds accumulation, light-basis construction,
//!    per-cascade projection fitting, cascade rendering, and a screen-space
//!    occlusion resolve.
//!
//! Everything is single-threaded per frame; all caches are explicitly owned
//! registries constructed next to the device (no global state).

pub mod core;
pub mod errors;
pub mod material;
pub mod names;
pub mod renderer;
pub mod shader;

pub use crate::core::bounds::Aabb;
pub use crate::core::camera::{Frustum, RenderCamera};
pub use crate::core::light::{GpuLight, Light, LightKind, MAX_LIGHTS, main_directional, pack_lights};
pub use crate::core::mesh::{
    Mesh, StreamLayout, VertexAttributeDesc, VertexSemantics, VertexStream, select_streams,
};
pub use crate::errors::{EmberError, Result};
pub use crate::material::{DepthStateKey, Material, Pass};
pub use crate::names::{Name, NameRegistry};
pub use crate::renderer::context::GpuContext;
pub use crate::renderer::draw::{
    InstanceAttribute, InstanceStream, MeshDrawer, PipelineId, PipelineKey, RenderNode,
    RenderTargetDesc, StreamKey, assemble_vertex_layouts, fx_hash_key,
};
pub use crate::renderer::shadow::{
    CascadeConfig, CascadeState, CascadedShadowRenderer, MAX_CASCADES, ShadowTargets,
};
pub use crate::shader::catalog::{ShaderCatalog, ShaderCore, ShaderHandle, UniformRing};
pub use crate::shader::globals::GlobalShaderContext;
pub use crate::shader::params::{ParameterBlock, ParameterBlockBuilder};
pub use crate::shader::reflection::{ShaderReflection, StageKind, reflect_wgsl};
