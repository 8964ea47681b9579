//! Global Shader Context
//!
//! Frame-wide values every shader may consume: camera matrices, eye position,
//! and the packed light array. The context owns the reserved parameter names
//! and broadcasts its state into any [`ShaderCore`] through the same
//! name-keyed merge materials use — a shader opts in to a global simply by
//! declaring a uniform field with the reserved name.
//!
//! Reserved names and their WGSL types:
//!
//! | name                     | type                 |
//! |--------------------------|----------------------|
//! | `view_matrix`            | `mat4x4<f32>`        |
//! | `projection_matrix`      | `mat4x4<f32>`        |
//! | `view_projection_matrix` | `mat4x4<f32>`        |
//! | `eye_position`           | `vec4<f32>` (w = 1)  |
//! | `lights`                 | `array<Light, 10>`   |
//! | `light_count`            | `u32`                |

use glam::{Mat4, Vec4};

use crate::core::camera::RenderCamera;
use crate::core::light::{GpuLight, Light, MAX_LIGHTS, pack_lights};
use crate::names::{Name, NameRegistry};
use crate::shader::catalog::ShaderCore;

/// Frame-wide shader state, merged into cores by reserved name.
#[derive(Debug)]
pub struct GlobalShaderContext {
    n_view: Name,
    n_projection: Name,
    n_view_projection: Name,
    n_eye: Name,
    n_lights: Name,
    n_light_count: Name,

    view: Mat4,
    projection: Mat4,
    view_projection: Mat4,
    eye_position: Vec4,
    lights: [GpuLight; MAX_LIGHTS],
    light_count: u32,
}

impl GlobalShaderContext {
    #[must_use]
    pub fn new(names: &NameRegistry) -> Self {
        Self {
            n_view: names.intern("view_matrix"),
            n_projection: names.intern("projection_matrix"),
            n_view_projection: names.intern("view_projection_matrix"),
            n_eye: names.intern("eye_position"),
            n_lights: names.intern("lights"),
            n_light_count: names.intern("light_count"),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            eye_position: Vec4::W,
            lights: [GpuLight::default(); MAX_LIGHTS],
            light_count: 0,
        }
    }

    pub fn set_camera(&mut self, camera: &RenderCamera) {
        self.view = camera.view_matrix;
        self.projection = camera.projection_matrix;
        self.view_projection = camera.view_projection_matrix;
        self.eye_position = camera.position.extend(1.0);
    }

    /// The view-projection matrix currently broadcast to shaders.
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// Substitutes the broadcast view-projection matrix, leaving view and
    /// projection untouched. The cascade renderer uses this to render casters
    /// with a light-space matrix through the ordinary draw path.
    pub fn set_view_projection(&mut self, view_projection: Mat4) {
        self.view_projection = view_projection;
    }

    pub fn set_lights(&mut self, lights: &[Light]) {
        let (packed, count) = pack_lights(lights);
        self.lights = packed;
        self.light_count = count;
    }

    /// Broadcasts every global into `core`; fields the shader does not
    /// declare are skipped.
    pub fn apply_to(&self, core: &mut ShaderCore) {
        core.try_write_field(self.n_view, bytemuck::bytes_of(&self.view));
        core.try_write_field(self.n_projection, bytemuck::bytes_of(&self.projection));
        core.try_write_field(
            self.n_view_projection,
            bytemuck::bytes_of(&self.view_projection),
        );
        core.try_write_field(self.n_eye, bytemuck::bytes_of(&self.eye_position));
        core.try_write_field(self.n_lights, bytemuck::cast_slice(&self.lights));
        core.try_write_field(self.n_light_count, bytemuck::bytes_of(&self.light_count));
    }
}
