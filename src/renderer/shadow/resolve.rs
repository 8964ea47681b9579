//! Screen-Space Shadow Resolve
//!
//! The final phase of the shadow frame: a fullscreen triangle that
//! reconstructs view-space positions from the scene depth buffer, picks a
//! cascade by split depth, compare-samples the shadow map array, and writes
//! occlusion into the `R8Unorm` resolve target. The fragment shader is loaded
//! through the ordinary catalog, so its uniforms and resources go through the
//! same name-keyed binding layer as scene shaders.

use glam::{Mat4, Vec4};

use crate::errors::Result;
use crate::renderer::context::GpuContext;
use crate::renderer::shadow::{CascadeState, ShadowTargets};
use crate::shader::catalog::{ShaderCatalog, ShaderHandle};

pub struct ResolvePass {
    vertex: ShaderHandle,
    fragment: ShaderHandle,
    pipeline: Option<wgpu::RenderPipeline>,
    /// Occlusion multiplier written for shadowed pixels.
    strength: f32,
}

impl ResolvePass {
    pub fn new(catalog: &mut ShaderCatalog) -> Result<Self> {
        let vertex = catalog.load("shadow_resolve_vs", include_str!("fullscreen.wgsl"))?;
        let fragment = catalog.load("shadow_resolve_fs", include_str!("resolve.wgsl"))?;
        Ok(Self {
            vertex,
            fragment,
            pipeline: None,
            strength: 1.0,
        })
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength.clamp(0.0, 1.0);
    }

    /// Rebinds the depth and shadow-map resources; called at creation and
    /// after every target recreation.
    pub fn bind_targets(&self, catalog: &mut ShaderCatalog, targets: &ShadowTargets) -> Result<()> {
        let fs = catalog.core_mut(self.fragment);
        fs.bind_texture("scene_depth", &targets.scene_depth_view)?;
        fs.bind_texture("shadow_maps", &targets.array_view)?;
        fs.bind_sampler("shadow_sampler", &targets.comparison_sampler)?;
        Ok(())
    }

    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        catalog: &mut ShaderCatalog,
        targets: &ShadowTargets,
        state: &CascadeState,
        inv_projection: Mat4,
    ) -> Result<()> {
        {
            // These names are declared by resolve.wgsl; a hard error here
            // means the shader and this code have drifted apart.
            let fs = catalog.core_mut(self.fragment);
            fs.write_field("inv_projection", bytemuck::bytes_of(&inv_projection))?;
            fs.write_field("cascade_from_view", bytemuck::cast_slice(&state.from_view))?;
            fs.write_field("split_depths", bytemuck::bytes_of(&state.splits))?;
            let params = Vec4::new(state.count as f32, self.strength, 0.0, 0.0);
            fs.write_field("resolve_params", bytemuck::bytes_of(&params))?;
            fs.refresh(&gpu.device, &gpu.queue)?;
        }
        catalog.core_mut(self.vertex).refresh(&gpu.device, &gpu.queue)?;
        self.ensure_pipeline(&gpu.device, catalog);

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Resolve"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &targets.resolve_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });
        if let Some(pipeline) = &self.pipeline {
            rpass.set_pipeline(pipeline);
            catalog.core(self.fragment).setup(&mut rpass)?;
            rpass.draw(0..3, 0..1);
        }
        Ok(())
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, catalog: &ShaderCatalog) {
        if self.pipeline.is_some() {
            return;
        }
        let vcore = catalog.core(self.vertex);
        let fcore = catalog.core(self.fragment);
        let (Some(vmodule), Some(fmodule), Some(flayout)) =
            (vcore.module(), fcore.module(), fcore.bind_group_layout())
        else {
            unreachable!("resolve cores are refreshed before pipeline creation");
        };

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Resolve Layout"),
            bind_group_layouts: &[Some(flayout)],
            immediate_size: 0,
        });

        self.pipeline = Some(
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Shadow Resolve Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: vmodule,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fmodule,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::R8Unorm,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            }),
        );
    }
}
