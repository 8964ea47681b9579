//! Materials and Passes
//!
//! A [`Material`] is an ordered list of [`Pass`]es. Each pass names a vertex
//! core, optionally a fragment core (depth-only passes have none), the
//! fixed-function depth/raster state, and a [`ParameterBlock`] of
//! material-level values merged into the cores at draw time.
//!
//! [`DepthStateKey`] doubles as part of the pipeline-cache key, so it stores
//! the slope bias as raw bits to stay `Eq + Hash`.

use crate::shader::catalog::ShaderHandle;
use crate::shader::params::ParameterBlock;

/// Hashable fixed-function depth and raster state of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStateKey {
    pub depth_write: bool,
    pub compare: wgpu::CompareFunction,
    pub bias_constant: i32,
    /// `f32::to_bits` of the slope-scaled bias.
    pub bias_slope_bits: u32,
    pub cull_mode: Option<wgpu::Face>,
}

impl DepthStateKey {
    #[must_use]
    pub fn new(
        depth_write: bool,
        compare: wgpu::CompareFunction,
        bias_constant: i32,
        bias_slope: f32,
        cull_mode: Option<wgpu::Face>,
    ) -> Self {
        Self {
            depth_write,
            compare,
            bias_constant,
            bias_slope_bits: bias_slope.to_bits(),
            cull_mode,
        }
    }

    /// Depth state for shadow-caster passes: constant and slope-scaled bias
    /// against acne, no culling so thin casters shadow from both sides.
    #[must_use]
    pub fn shadow_caster() -> Self {
        Self::new(true, wgpu::CompareFunction::LessEqual, 2, 2.0, None)
    }

    #[must_use]
    pub fn bias_slope(&self) -> f32 {
        f32::from_bits(self.bias_slope_bits)
    }

    #[must_use]
    pub fn depth_bias_state(&self) -> wgpu::DepthBiasState {
        wgpu::DepthBiasState {
            constant: self.bias_constant,
            slope_scale: self.bias_slope(),
            clamp: 0.0,
        }
    }
}

impl Default for DepthStateKey {
    fn default() -> Self {
        Self::new(
            true,
            wgpu::CompareFunction::Less,
            0,
            0.0,
            Some(wgpu::Face::Back),
        )
    }
}

/// One shading pass of a material.
#[derive(Debug)]
pub struct Pass {
    pub vertex: ShaderHandle,
    /// `None` for depth-only passes.
    pub fragment: Option<ShaderHandle>,
    pub depth_state: DepthStateKey,
    pub params: ParameterBlock,
}

/// An ordered list of passes with a distinguished main pass and an optional
/// shadow-caster pass.
#[derive(Debug)]
pub struct Material {
    label: String,
    passes: Vec<Pass>,
    main_pass: usize,
    shadow_pass: Option<usize>,
}

impl Material {
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            passes: Vec::new(),
            main_pass: 0,
            shadow_pass: None,
        }
    }

    /// Appends a pass, returning its index.
    pub fn push_pass(&mut self, pass: Pass) -> usize {
        self.passes.push(pass);
        self.passes.len() - 1
    }

    pub fn set_main_pass(&mut self, index: usize) {
        self.main_pass = index;
    }

    pub fn set_shadow_pass(&mut self, index: usize) {
        self.shadow_pass = Some(index);
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn passes_mut(&mut self) -> &mut [Pass] {
        &mut self.passes
    }

    #[must_use]
    pub fn main_pass(&self) -> &Pass {
        &self.passes[self.main_pass]
    }

    /// The depth-only pass used when this material casts shadows.
    #[must_use]
    pub fn shadow_pass(&self) -> Option<&Pass> {
        self.shadow_pass.map(|i| &self.passes[i])
    }
}
