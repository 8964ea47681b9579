//! Cascaded Shadow Maps
//!
//! [`CascadedShadowRenderer`] drives a fixed per-frame sequence, strictly in
//! order, recording into one encoder. Each frame starts by rewinding the
//! catalog's per-draw uniform rings, then runs:
//!
//! 1. depth collect — depth-only prepass of visible geometry into the scene
//!    depth target, accumulating the view-space visible depth extent on the
//!    CPU from frustum-clipped node bounds;
//! 2. scene bounds accumulation — running view-space AABB over all nodes;
//! 3. light basis construction — light view anchored at the origin, coarse
//!    ortho over the scene bounds in light space;
//! 4. per-cascade partitioning — partition fractions over the visible depth
//!    extent, slice corners tightened against the scene box, crop fitted per
//!    cascade with texel snapping;
//! 5. cascade render — each depth-array layer cleared to 1.0, casters drawn
//!    with the cascade matrix substituted into the global view-projection;
//! 6. screen-space resolve — occlusion written into the `R8Unorm` target.
//!
//! With no shadow-casting directional light, shadows are disabled for the
//! frame: the resolve target is cleared to zero occlusion, the state is
//! flagged inactive, and no cascade math runs.
//!
//! Results are published through an output [`ParameterBlock`]
//! (`shadow_map_array`, `shadow_sampler`, `cascade_matrices`, `split_depths`,
//! `screen_shadow_texture`) that hosts merge into receiving shaders.

pub mod cascades;
pub mod resolve;

use glam::{Mat4, Vec4};

use crate::core::bounds::Aabb;
use crate::core::camera::RenderCamera;
use crate::core::light::{Light, main_directional};
use crate::errors::{EmberError, Result};
use crate::renderer::context::GpuContext;
use crate::renderer::draw::{MeshDrawer, RenderNode, RenderTargetDesc};
use crate::renderer::shadow::cascades::{LightBasis, cascade_ranges, fit_cascade, tighten_corners};
use crate::renderer::shadow::resolve::ResolvePass;
use crate::shader::catalog::ShaderCatalog;
use crate::shader::globals::GlobalShaderContext;
use crate::shader::params::{ParameterBlock, ParameterBlockBuilder};

/// Maximum cascade count.
pub const MAX_CASCADES: usize = 4;

/// Static shadow configuration, validated at construction.
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    pub map_size: u32,
    /// N+1 monotonically increasing partition fractions in `[0, 1]`.
    pub fractions: Vec<f32>,
}

impl CascadeConfig {
    pub fn new(map_size: u32, fractions: Vec<f32>) -> Result<Self> {
        let invalid = |detail: String| EmberError::ResourceCreation {
            what: "cascade config".to_owned(),
            detail,
        };
        if map_size == 0 {
            return Err(invalid("shadow map size must be non-zero".to_owned()));
        }
        let cascades = fractions.len().saturating_sub(1);
        if cascades == 0 || cascades > MAX_CASCADES {
            return Err(invalid(format!(
                "{} fractions define {cascades} cascades, expected 1..={MAX_CASCADES}",
                fractions.len()
            )));
        }
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(invalid("fractions must lie in [0, 1]".to_owned()));
        }
        if fractions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(invalid("fractions must be strictly increasing".to_owned()));
        }
        Ok(Self {
            map_size,
            fractions,
        })
    }

    /// Config from the practical split scheme (`lambda` blends uniform and
    /// logarithmic distributions over `[near, far]`).
    pub fn practical(map_size: u32, count: u32, near: f32, far: f32, lambda: f32) -> Result<Self> {
        Self::new(map_size, cascades::practical_fractions(count, near, far, lambda))
    }

    #[must_use]
    pub fn cascade_count(&self) -> usize {
        self.fractions.len() - 1
    }
}

/// Per-frame cascade results.
#[derive(Debug, Clone, Copy)]
pub struct CascadeState {
    /// World space → light clip space, per cascade.
    pub from_world: [Mat4; MAX_CASCADES],
    /// Camera view space → light clip space, per cascade.
    pub from_view: [Mat4; MAX_CASCADES],
    /// Far view-space depth of each cascade.
    pub splits: Vec4,
    pub count: u32,
    /// False when the frame had no shadow-casting directional light.
    pub active: bool,
}

impl Default for CascadeState {
    fn default() -> Self {
        Self {
            from_world: [Mat4::IDENTITY; MAX_CASCADES],
            from_view: [Mat4::IDENTITY; MAX_CASCADES],
            splits: Vec4::ZERO,
            count: 0,
            active: false,
        }
    }
}

/// GPU targets of the shadow pipeline; recreated on resize.
pub struct ShadowTargets {
    pub depth_array: wgpu::Texture,
    pub array_view: wgpu::TextureView,
    pub layer_views: Vec<wgpu::TextureView>,
    pub scene_depth: wgpu::Texture,
    pub scene_depth_view: wgpu::TextureView,
    pub resolve: wgpu::Texture,
    pub resolve_view: wgpu::TextureView,
    pub comparison_sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl ShadowTargets {
    #[must_use]
    pub fn create(gpu: &GpuContext, config: &CascadeConfig, width: u32, height: u32) -> Self {
        let (depth_array, array_view, layer_views) = gpu.create_depth_array(
            "Cascade Shadow Maps",
            config.map_size,
            config.cascade_count() as u32,
        );
        let (scene_depth, scene_depth_view) =
            gpu.create_depth_target("Shadow Scene Depth", width, height);
        let (resolve, resolve_view) =
            gpu.create_resolve_target("Shadow Resolve Target", width, height);
        let comparison_sampler = gpu.create_comparison_sampler("Shadow Comparison Sampler");
        log::info!(
            "created shadow targets: {}x{} maps x{}, {width}x{height} resolve",
            config.map_size,
            config.map_size,
            config.cascade_count()
        );
        Self {
            depth_array,
            array_view,
            layer_views,
            scene_depth,
            scene_depth_view,
            resolve,
            resolve_view,
            comparison_sampler,
            width,
            height,
        }
    }
}

/// The cascaded shadow-map renderer.
pub struct CascadedShadowRenderer {
    config: CascadeConfig,
    targets: ShadowTargets,
    state: CascadeState,
    resolve: ResolvePass,
    outputs: ParameterBlock,
}

impl CascadedShadowRenderer {
    pub fn new(
        gpu: &GpuContext,
        catalog: &mut ShaderCatalog,
        config: CascadeConfig,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let targets = ShadowTargets::create(gpu, &config, width, height);
        let resolve = ResolvePass::new(catalog)?;
        resolve.bind_targets(catalog, &targets)?;

        let outputs = ParameterBlockBuilder::new(catalog.names().clone())
            .field("cascade_matrices", std::mem::size_of::<[Mat4; MAX_CASCADES]>())
            .field("split_depths", std::mem::size_of::<Vec4>())
            .texture("shadow_map_array")
            .texture("screen_shadow_texture")
            .sampler("shadow_sampler")
            .build();

        let mut renderer = Self {
            config,
            targets,
            state: CascadeState::default(),
            resolve,
            outputs,
        };
        renderer.publish()?;
        Ok(renderer)
    }

    #[must_use]
    pub fn state(&self) -> &CascadeState {
        &self.state
    }

    #[must_use]
    pub fn targets(&self) -> &ShadowTargets {
        &self.targets
    }

    /// The published shadow parameters, for merging into receiving shaders.
    #[must_use]
    pub fn outputs(&self) -> &ParameterBlock {
        &self.outputs
    }

    pub fn set_resolve_strength(&mut self, strength: f32) {
        self.resolve.set_strength(strength);
    }

    /// Synchronously recreates the screen-sized targets.
    pub fn resize(
        &mut self,
        gpu: &GpuContext,
        catalog: &mut ShaderCatalog,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.targets = ShadowTargets::create(gpu, &self.config, width, height);
        self.resolve.bind_targets(catalog, &self.targets)?;
        self.publish()
    }

    /// Runs the whole shadow frame. See the module docs for the phases.
    #[allow(clippy::too_many_arguments)]
    pub fn render_frame(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        catalog: &mut ShaderCatalog,
        globals: &mut GlobalShaderContext,
        drawer: &mut MeshDrawer,
        camera: &RenderCamera,
        lights: &[Light],
        nodes: &[RenderNode<'_>],
    ) -> Result<()> {
        // New frame: rewind every core's per-draw uniform ring
        catalog.begin_frame();
        globals.set_camera(camera);
        globals.set_lights(lights);

        let Some(sun) = main_directional(lights) else {
            log::debug!("no shadow-casting directional light; shadows disabled this frame");
            self.state = CascadeState::default();
            self.clear_resolve(encoder);
            return self.publish();
        };
        let sun_direction = sun.direction;
        let depth_target = RenderTargetDesc::depth_only(wgpu::TextureFormat::Depth32Float);

        // Phases 1 + 2: depth collect and scene bounds accumulation
        let view_frustum = camera.view_space_frustum();
        let mut scene_bounds = Aabb::empty();
        let mut visible = Aabb::empty();
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Depth Collect"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.scene_depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            for node in nodes {
                let view_world = camera.view_matrix * node.world;
                let vs_bounds = node.mesh.bounds.transformed(&view_world);
                scene_bounds.merge(&vs_bounds);
                if !view_frustum.intersects_aabb(&vs_bounds) {
                    continue;
                }
                visible.merge(&vs_bounds);
                if let Some(pass) = node.material.shadow_pass() {
                    drawer.draw_mesh(
                        gpu,
                        &mut rpass,
                        catalog,
                        globals,
                        node.mesh,
                        pass,
                        node.world,
                        None,
                        depth_target,
                    )?;
                }
            }
        }

        // Visible depth extent (view-space z decreases with distance)
        let (near_d, far_d) = if visible.is_empty() {
            (camera.near, camera.far)
        } else {
            let near_d = (-visible.max.z).max(camera.near);
            let far_d = (-visible.min.z).min(camera.far);
            if near_d < far_d {
                (near_d, far_d)
            } else {
                (camera.near, camera.far)
            }
        };

        // Phase 3: light basis
        let basis = LightBasis::new(sun_direction, camera.view_matrix, &scene_bounds);

        // Phase 4: per-cascade partitioning and fitting
        let ranges = cascade_ranges(&self.config.fractions, near_d, far_d);
        let mut state = CascadeState {
            count: ranges.len() as u32,
            active: true,
            ..Default::default()
        };
        for (i, &(slice_near, slice_far)) in ranges.iter().enumerate() {
            let slice = camera.slice_corners_view(slice_near, slice_far);
            let tight = tighten_corners(&slice, &scene_bounds);
            let fitted = fit_cascade(&basis, &tight, self.config.map_size);
            state.from_world[i] = fitted.from_world;
            state.from_view[i] = fitted.from_view;
            state.splits[i] = slice_far;
        }
        self.state = state;

        // Phase 5: cascade render, light matrix substituted into the globals
        let saved_vp = globals.view_projection();
        for cascade in 0..self.state.count as usize {
            globals.set_view_projection(self.state.from_world[cascade]);
            let label = format!("Shadow Cascade {cascade}");
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&label),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.layer_views[cascade],
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            for node in nodes {
                if let Some(pass) = node.material.shadow_pass() {
                    drawer.draw_mesh(
                        gpu,
                        &mut rpass,
                        catalog,
                        globals,
                        node.mesh,
                        pass,
                        node.world,
                        None,
                        depth_target,
                    )?;
                }
            }
        }
        globals.set_view_projection(saved_vp);

        // Phase 6: screen-space resolve
        self.resolve.render(
            gpu,
            encoder,
            catalog,
            &self.targets,
            &self.state,
            camera.projection_matrix.inverse(),
        )?;

        self.publish()
    }

    /// Refreshes the published output block from the current state/targets.
    fn publish(&mut self) -> Result<()> {
        self.outputs
            .set_field("cascade_matrices", bytemuck::cast_slice(&self.state.from_view))?;
        self.outputs
            .set_field("split_depths", bytemuck::bytes_of(&self.state.splits))?;
        self.outputs
            .bind_texture("shadow_map_array", &self.targets.array_view)?;
        self.outputs
            .bind_texture("screen_shadow_texture", &self.targets.resolve_view)?;
        self.outputs
            .bind_sampler("shadow_sampler", &self.targets.comparison_sampler)?;
        Ok(())
    }

    /// Zero-occlusion clear of the resolve target for disabled frames.
    fn clear_resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Resolve Clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.targets.resolve_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });
    }
}
