//! Mesh Drawing and the Pipeline Cache
//!
//! [`MeshDrawer`] owns every `wgpu::RenderPipeline` the crate creates.
//! Pipelines are stored in a contiguous `Vec` addressed by [`PipelineId`]
//! handles and deduplicated through a full-state [`PipelineKey`] hashed with
//! `FxHasher`. The cache is an owned registry living as long as its drawer;
//! rendering is single-threaded, so there are no locks.
//!
//! A draw goes through a fixed sequence: select the mesh streams covering the
//! vertex shader's reflected inputs (validated before any GPU call), assemble
//! the vertex layout by matching input locations to stream attributes by
//! semantic, merge parameters (pass, extra, globals, per-object matrices —
//! later writes win by name), look up or build the pipeline, bind, draw.

use std::hash::{Hash, Hasher};
use std::ops::Range;

use glam::Mat4;
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use crate::core::mesh::{self, Mesh, StreamLayout};
use crate::errors::{EmberError, Result};
use crate::material::{DepthStateKey, Material, Pass};
use crate::names::{Name, NameRegistry};
use crate::renderer::context::GpuContext;
use crate::shader::catalog::{ShaderCatalog, ShaderCore, ShaderHandle};
use crate::shader::globals::GlobalShaderContext;
use crate::shader::params::ParameterBlock;
use crate::shader::reflection::VertexInput;

/// One unit of renderable work handed in by the host each frame.
#[derive(Debug)]
pub struct RenderNode<'a> {
    pub mesh: &'a Mesh,
    pub material: &'a Material,
    pub world: Mat4,
}

/// Handle into the drawer's contiguous pipeline storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(u32);

impl PipelineId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The attachment formats a pipeline renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetDesc {
    /// `None` for depth-only passes.
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth_format: wgpu::TextureFormat,
    pub sample_count: u32,
}

impl RenderTargetDesc {
    /// Depth-only target, as used by the cascade passes.
    #[must_use]
    pub fn depth_only(depth_format: wgpu::TextureFormat) -> Self {
        Self {
            color_format: None,
            depth_format,
            sample_count: 1,
        }
    }
}

/// A caller-supplied per-instance stream, appended after the mesh's
/// per-vertex streams with step mode `Instance`.
#[derive(Debug)]
pub struct InstanceStream {
    pub buffer: wgpu::Buffer,
    pub stride: u64,
    pub attributes: Vec<InstanceAttribute>,
}

/// Instance attributes carry explicit shader locations; they are not matched
/// by semantic.
#[derive(Debug, Clone, Copy)]
pub struct InstanceAttribute {
    pub location: u32,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

// ============================================================================
// Layout assembly (pure)
// ============================================================================

/// One selected stream with its shader-location-resolved attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledStream {
    /// Index into the mesh's stream list.
    pub stream_index: usize,
    pub stride: u64,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

/// Matches the vertex shader's inputs against the selected streams by
/// semantic, producing per-stream attribute lists with the shader's
/// locations filled in.
pub fn assemble_vertex_layouts(
    layouts: &[&StreamLayout],
    selected: &[usize],
    inputs: &[VertexInput],
) -> Result<Vec<AssembledStream>> {
    let mut assembled: Vec<AssembledStream> = selected
        .iter()
        .map(|&i| AssembledStream {
            stream_index: i,
            stride: layouts[i].stride,
            attributes: Vec::new(),
        })
        .collect();

    for input in inputs {
        let mut placed = false;
        for stream in &mut assembled {
            if let Some(attr) = layouts[stream.stream_index].attribute(input.semantic) {
                stream.attributes.push(wgpu::VertexAttribute {
                    format: attr.format,
                    offset: attr.offset,
                    shader_location: input.location,
                });
                placed = true;
                break;
            }
        }
        if !placed {
            let available = selected
                .iter()
                .fold(mesh::VertexSemantics::empty(), |acc, &i| {
                    acc | layouts[i].semantics()
                });
            return Err(EmberError::UnsatisfiedVertexInput {
                required: input.semantic,
                available,
            });
        }
    }

    Ok(assembled)
}

// ============================================================================
// Pipeline keys
// ============================================================================

/// Full-state pipeline cache key. Identical (stream signature, shaders, pass
/// state, target) always hashes to the same cached pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub vertex: ShaderHandle,
    pub fragment: Option<ShaderHandle>,
    pub depth_state: DepthStateKey,
    pub topology: wgpu::PrimitiveTopology,
    pub target: RenderTargetDesc,
    pub streams: Vec<StreamKey>,
}

/// Signature of one bound vertex buffer inside a [`PipelineKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub stride: u64,
    pub step: wgpu::VertexStepMode,
    /// (shader location, format, byte offset) per attribute.
    pub attributes: Vec<(u32, wgpu::VertexFormat, u64)>,
}

impl StreamKey {
    fn from_assembled(stream: &AssembledStream) -> Self {
        Self {
            stride: stream.stride,
            step: wgpu::VertexStepMode::Vertex,
            attributes: stream
                .attributes
                .iter()
                .map(|a| (a.shader_location, a.format, a.offset))
                .collect(),
        }
    }

    fn from_instance(stream: &InstanceStream) -> Self {
        Self {
            stride: stream.stride,
            step: wgpu::VertexStepMode::Instance,
            attributes: stream
                .attributes
                .iter()
                .map(|a| (a.location, a.format, a.offset))
                .collect(),
        }
    }
}

/// Hashes a canonical key with `FxHasher`.
#[must_use]
pub fn fx_hash_key<T: Hash>(key: &T) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

// ============================================================================
// Mesh drawer
// ============================================================================

/// Owns the pipeline cache and issues draws.
pub struct MeshDrawer {
    n_world: Name,
    n_world_inv_transpose: Name,
    n_world_view_proj: Name,
    pipelines: Vec<wgpu::RenderPipeline>,
    lookup: FxHashMap<u64, PipelineId>,
}

impl MeshDrawer {
    #[must_use]
    pub fn new(names: &NameRegistry) -> Self {
        Self {
            n_world: names.intern("world_matrix"),
            n_world_inv_transpose: names.intern("world_inv_transpose"),
            n_world_view_proj: names.intern("world_view_proj"),
            pipelines: Vec::with_capacity(16),
            lookup: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Drops every cached pipeline (target format changes).
    pub fn clear_cache(&mut self) {
        self.pipelines.clear();
        self.lookup.clear();
    }

    /// Draws one mesh with one pass. See the module docs for the sequence.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_mesh(
        &mut self,
        gpu: &GpuContext,
        rpass: &mut wgpu::RenderPass<'_>,
        catalog: &mut ShaderCatalog,
        globals: &GlobalShaderContext,
        mesh: &Mesh,
        pass: &Pass,
        world: Mat4,
        extra: Option<&ParameterBlock>,
        target: RenderTargetDesc,
    ) -> Result<()> {
        self.draw_mesh_instanced(
            gpu, rpass, catalog, globals, mesh, pass, world, extra, &[], 0..1, target,
        )
    }

    /// Instanced variant: appends `instances` after the per-vertex streams
    /// and draws `instance_range` instances.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_mesh_instanced(
        &mut self,
        gpu: &GpuContext,
        rpass: &mut wgpu::RenderPass<'_>,
        catalog: &mut ShaderCatalog,
        globals: &GlobalShaderContext,
        mesh: &Mesh,
        pass: &Pass,
        world: Mat4,
        extra: Option<&ParameterBlock>,
        instances: &[InstanceStream],
        instance_range: Range<u32>,
        target: RenderTargetDesc,
    ) -> Result<()> {
        // Stream selection and layout assembly, validated before any GPU call
        let required = catalog.core(pass.vertex).reflection().required_semantics();
        let masks = mesh.stream_masks();
        let selected = mesh::select_streams(&masks, required)?;
        let layouts: SmallVec<[&StreamLayout; 4]> =
            mesh.streams.iter().map(|s| &s.layout).collect();
        let inputs = catalog.core(pass.vertex).reflection().vertex_inputs.clone();
        let assembled = assemble_vertex_layouts(&layouts, &selected, &inputs)?;

        // Parameter merge; later writes win by name
        self.merge_parameters(catalog.core_mut(pass.vertex), pass, globals, world, extra);
        catalog.core_mut(pass.vertex).refresh(&gpu.device, &gpu.queue)?;
        if let Some(fragment) = pass.fragment {
            self.merge_parameters(catalog.core_mut(fragment), pass, globals, world, extra);
            catalog.core_mut(fragment).refresh(&gpu.device, &gpu.queue)?;
        }

        // Pipeline lookup / creation
        let mut streams: Vec<StreamKey> =
            assembled.iter().map(StreamKey::from_assembled).collect();
        streams.extend(instances.iter().map(StreamKey::from_instance));
        let key = PipelineKey {
            vertex: pass.vertex,
            fragment: pass.fragment,
            depth_state: pass.depth_state,
            topology: mesh.topology,
            target,
            streams,
        };
        let id = self.get_or_create_pipeline(&gpu.device, catalog, pass, &assembled, instances, &key)?;

        // Bind and draw
        rpass.set_pipeline(&self.pipelines[id.index()]);
        for (slot, stream) in assembled.iter().enumerate() {
            rpass.set_vertex_buffer(
                slot as u32,
                mesh.streams[stream.stream_index].buffer.slice(..),
            );
        }
        for (slot, stream) in instances.iter().enumerate() {
            rpass.set_vertex_buffer((assembled.len() + slot) as u32, stream.buffer.slice(..));
        }
        rpass.set_index_buffer(mesh.index_buffer.slice(..), mesh.index_format);

        catalog.core(pass.vertex).setup(rpass)?;
        if let Some(fragment) = pass.fragment {
            catalog.core(fragment).setup(rpass)?;
        }
        rpass.draw_indexed(0..mesh.index_count, 0, instance_range);
        Ok(())
    }

    fn merge_parameters(
        &self,
        core: &mut ShaderCore,
        pass: &Pass,
        globals: &GlobalShaderContext,
        world: Mat4,
        extra: Option<&ParameterBlock>,
    ) {
        pass.params.apply_to(core);
        if let Some(extra) = extra {
            extra.apply_to(core);
        }
        globals.apply_to(core);

        let world_view_proj = globals.view_projection() * world;
        core.try_write_field(self.n_world, bytemuck::bytes_of(&world));
        core.try_write_field(
            self.n_world_inv_transpose,
            bytemuck::bytes_of(&world.inverse().transpose()),
        );
        core.try_write_field(self.n_world_view_proj, bytemuck::bytes_of(&world_view_proj));
    }

    fn get_or_create_pipeline(
        &mut self,
        device: &wgpu::Device,
        catalog: &ShaderCatalog,
        pass: &Pass,
        assembled: &[AssembledStream],
        instances: &[InstanceStream],
        key: &PipelineKey,
    ) -> Result<PipelineId> {
        let hash = fx_hash_key(key);
        if let Some(&id) = self.lookup.get(&hash) {
            return Ok(id);
        }

        let vcore = catalog.core(pass.vertex);
        let fcore = pass.fragment.map(|f| catalog.core(f));

        // Bind group layouts ordered by each stage's declared group index;
        // groups must be distinct and contiguous from zero.
        let mut groups: SmallVec<[(u32, &wgpu::BindGroupLayout); 2]> = SmallVec::new();
        for core in std::iter::once(vcore).chain(fcore) {
            let Some(layout) = core.bind_group_layout() else {
                unreachable!("cores are refreshed before pipeline creation");
            };
            groups.push((core.reflection().group, layout));
        }
        groups.sort_by_key(|(g, _)| *g);
        for (i, (g, _)) in groups.iter().enumerate() {
            if *g != i as u32 {
                return Err(EmberError::ShaderLayoutUnsupported(format!(
                    "pass '{}': stage bind groups must be distinct and contiguous from 0",
                    vcore.label()
                )));
            }
        }
        let bind_group_layouts: SmallVec<[Option<&wgpu::BindGroupLayout>; 2]> =
            groups.iter().map(|(_, l)| Some(*l)).collect();

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(vcore.label()),
            bind_group_layouts: &bind_group_layouts,
            immediate_size: 0,
        });

        // Vertex buffer layouts: per-vertex streams, then instance streams
        let instance_attrs: Vec<Vec<wgpu::VertexAttribute>> = instances
            .iter()
            .map(|s| {
                s.attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: a.format,
                        offset: a.offset,
                        shader_location: a.location,
                    })
                    .collect()
            })
            .collect();
        let mut buffers: Vec<wgpu::VertexBufferLayout<'_>> = assembled
            .iter()
            .map(|s| wgpu::VertexBufferLayout {
                array_stride: s.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &s.attributes,
            })
            .collect();
        buffers.extend(instances.iter().zip(&instance_attrs).map(|(s, attrs)| {
            wgpu::VertexBufferLayout {
                array_stride: s.stride,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: attrs,
            }
        }));

        let Some(vmodule) = vcore.module() else {
            unreachable!("cores are refreshed before pipeline creation");
        };
        let color_targets: Vec<Option<wgpu::ColorTargetState>> = key
            .target
            .color_format
            .map(|format| {
                vec![Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })]
            })
            .unwrap_or_default();

        let fragment_state = fcore.map(|core| {
            let Some(module) = core.module() else {
                unreachable!("cores are refreshed before pipeline creation");
            };
            wgpu::FragmentState {
                module,
                entry_point: Some(core.reflection().entry_point.as_str()),
                targets: &color_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(vcore.label()),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: vmodule,
                entry_point: Some(vcore.reflection().entry_point.as_str()),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: fragment_state,
            primitive: wgpu::PrimitiveState {
                topology: key.topology,
                cull_mode: key.depth_state.cull_mode,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: key.target.depth_format,
                depth_write_enabled: Some(key.depth_state.depth_write),
                depth_compare: Some(key.depth_state.compare),
                stencil: wgpu::StencilState::default(),
                bias: key.depth_state.depth_bias_state(),
            }),
            multisample: wgpu::MultisampleState {
                count: key.target.sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview_mask: None,
            cache: None,
        });

        let id = PipelineId(self.pipelines.len() as u32);
        log::debug!(
            "built pipeline {} for '{}' ({} streams)",
            id.0,
            vcore.label(),
            key.streams.len()
        );
        self.pipelines.push(pipeline);
        self.lookup.insert(hash, id);
        Ok(id)
    }
}
