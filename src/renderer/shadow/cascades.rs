//! Cascade Math
//!
//! Pure functions for cascaded shadow maps, separated from the render passes
//! for testability: partition ranges, practical split fractions, corner
//! tightening against the scene bounds, the light basis, and per-cascade
//! projection fitting with texel snapping.
//!
//! All view-space math is right-handed with -Z forward; light clip space uses
//! the [0, 1] depth range.

use glam::{Mat4, Vec3, Vec4};

use crate::core::bounds::Aabb;
use crate::renderer::shadow::MAX_CASCADES;

// ============================================================================
// Partitioning
// ============================================================================

/// Expands N+1 partition fractions over `[near, far]` into N `(near, far)`
/// cascade ranges.
#[must_use]
pub fn cascade_ranges(fractions: &[f32], near: f32, far: f32) -> Vec<(f32, f32)> {
    let range = far - near;
    fractions
        .windows(2)
        .map(|w| (near + w[0] * range, near + w[1] * range))
        .collect()
}

/// Practical split scheme: `lambda` blends uniform (`0.0`) and logarithmic
/// (`1.0`) distributions. Returns N+1 normalized partition fractions.
#[must_use]
pub fn practical_fractions(count: u32, near: f32, far: f32, lambda: f32) -> Vec<f32> {
    let n = count.clamp(1, MAX_CASCADES as u32) as usize;
    let mut fractions = Vec::with_capacity(n + 1);
    fractions.push(0.0);
    for i in 1..n {
        let p = i as f32 / n as f32;
        let log_split = near * (far / near).powf(p);
        let uni_split = near + (far - near) * p;
        let split = lambda * log_split + (1.0 - lambda) * uni_split;
        fractions.push((split - near) / (far - near));
    }
    fractions.push(1.0);
    fractions
}

// ============================================================================
// Corner tightening
// ============================================================================

/// Tightens frustum-slice corners against the scene bounds, componentwise
/// per canonical corner direction: on each corner's positive axes the corner
/// may only move down to the box face, on negative axes only up. Both inputs
/// use the canonical bit order (bit 0 = +x, bit 1 = +y, bit 2 = +z) shared by
/// [`Aabb::corners`] and `RenderCamera::slice_corners_view`.
#[must_use]
pub fn tighten_corners(slice: &[Vec3; 8], scene: &Aabb) -> [Vec3; 8] {
    let box_corners = scene.corners();
    let mut tight = [Vec3::ZERO; 8];
    for i in 0..8 {
        let (s, b) = (slice[i], box_corners[i]);
        tight[i] = Vec3::new(
            if i & 1 != 0 { s.x.min(b.x) } else { s.x.max(b.x) },
            if i & 2 != 0 { s.y.min(b.y) } else { s.y.max(b.y) },
            if i & 4 != 0 { s.z.min(b.z) } else { s.z.max(b.z) },
        );
    }
    tight
}

// ============================================================================
// Light basis
// ============================================================================

/// The frame's directional-light frame of reference: a light view anchored at
/// the origin, the camera-view → light-space transform, and a coarse ortho
/// projection spanning the whole visible scene in light space. Cascades are
/// crops of the coarse projection.
#[derive(Debug, Clone, Copy)]
pub struct LightBasis {
    pub light_view: Mat4,
    /// Camera view space → light space.
    pub view_to_light: Mat4,
    pub coarse_proj: Mat4,
}

impl LightBasis {
    /// `scene_bounds_view` is the accumulated scene AABB in camera view space.
    #[must_use]
    pub fn new(light_direction: Vec3, camera_view: Mat4, scene_bounds_view: &Aabb) -> Self {
        let safe_dir = if light_direction.length_squared() > 1e-6 {
            light_direction.normalize()
        } else {
            -Vec3::Z
        };
        let up = if safe_dir.y.abs() > 0.99 { Vec3::X } else { Vec3::Y };
        let light_view = Mat4::look_at_rh(Vec3::ZERO, safe_dir, up);
        let view_to_light = light_view * camera_view.inverse();

        let bounds = if scene_bounds_view.is_empty() {
            Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
        } else {
            *scene_bounds_view
        };
        let ls = bounds.transformed(&view_to_light);
        // glam orthographic_rh takes positive near/far distances along -z
        let coarse_proj =
            Mat4::orthographic_rh(ls.min.x, ls.max.x, ls.min.y, ls.max.y, -ls.max.z, -ls.min.z);

        Self {
            light_view,
            view_to_light,
            coarse_proj,
        }
    }
}

// ============================================================================
// Cascade fitting
// ============================================================================

/// One fitted cascade projection.
#[derive(Debug, Clone, Copy)]
pub struct CascadeMatrices {
    /// World space → light clip space; used to render the cascade.
    pub from_world: Mat4,
    /// Camera view space → light clip space; used by the resolve pass.
    pub from_view: Mat4,
}

/// Fits a crop of the coarse projection around the tightened slice corners
/// (camera view space), snapping the x/y bounds to the shadow-map texel grid
/// so the cascade does not shimmer as the camera moves. The near bound stays
/// at the coarse near plane so casters between the light and the slice are
/// kept.
#[must_use]
pub fn fit_cascade(basis: &LightBasis, corners_view: &[Vec3; 8], map_size: u32) -> CascadeMatrices {
    let to_clip = basis.coarse_proj * basis.view_to_light;

    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for c in corners_view {
        // Orthographic projection: w stays 1
        let p = to_clip.transform_point3(*c);
        min = min.min(p);
        max = max.max(p);
    }
    min = min.max(Vec3::new(-1.0, -1.0, 0.0));
    max = max.min(Vec3::new(1.0, 1.0, 1.0));

    // Texel snapping; skipped for degenerate bounds
    let texel_x = (max.x - min.x) / map_size as f32;
    if texel_x > 0.0 {
        min.x = (min.x / texel_x).floor() * texel_x;
        max.x = (max.x / texel_x).ceil() * texel_x;
    }
    let texel_y = (max.y - min.y) / map_size as f32;
    if texel_y > 0.0 {
        min.y = (min.y / texel_y).floor() * texel_y;
        max.y = (max.y / texel_y).ceil() * texel_y;
    }

    let dx = (max.x - min.x).max(1e-6);
    let dy = (max.y - min.y).max(1e-6);
    let dz = max.z.max(1e-6);
    let crop = Mat4::from_cols(
        Vec4::new(2.0 / dx, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / dy, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0 / dz, 0.0),
        Vec4::new(-(max.x + min.x) / dx, -(max.y + min.y) / dy, 0.0, 1.0),
    );

    CascadeMatrices {
        from_world: crop * basis.coarse_proj * basis.light_view,
        from_view: crop * to_clip,
    }
}
