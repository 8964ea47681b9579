//! Camera Snapshot and View Frustum
//!
//! The renderer consumes an immutable [`RenderCamera`] snapshot per frame:
//! view/projection matrices, eye position, near/far, and the derived
//! [`Frustum`]. The camera collaborator owning input handling and projection
//! bookkeeping lives outside this crate.

use glam::{Mat4, Vec3, Vec4};

use crate::core::bounds::Aabb;

/// Six clip planes extracted from a projection (or view-projection) matrix.
///
/// Plane order: Left, Right, Bottom, Top, Near, Far. Extraction follows
/// Gribb-Hartmann adjusted for WGPU's [0, 1] NDC depth range.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[0] = rows[3] + rows[0]; // Left
        planes[1] = rows[3] - rows[0]; // Right
        planes[2] = rows[3] + rows[1]; // Bottom
        planes[3] = rows[3] - rows[1]; // Top
        planes[4] = rows[2]; // Near (z in [0, 1])
        planes[5] = rows[3] - rows[2]; // Far

        for plane in &mut planes {
            let length = Vec3::new(plane.x, plane.y, plane.z).length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// Conservative box test: true unless the box is fully outside a plane.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        if aabb.is_empty() {
            return false;
        }
        for plane in &self.planes {
            // Positive vertex of the box relative to the plane normal
            let p = Vec3::new(
                if plane.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if plane.x * p.x + plane.y * p.y + plane.z * p.z + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

/// Per-frame camera snapshot handed to the renderer.
#[derive(Debug, Clone)]
pub struct RenderCamera {
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub view_projection_matrix: Mat4,
    pub position: Vec3,
    /// World-space frustum from the view-projection matrix.
    pub frustum: Frustum,
    pub near: f32,
    pub far: f32,
}

impl RenderCamera {
    /// Builds a snapshot from a view matrix and a perspective projection.
    ///
    /// The eye position is recovered from the inverse view matrix.
    #[must_use]
    pub fn from_view_projection(view: Mat4, projection: Mat4, near: f32, far: f32) -> Self {
        let view_projection = projection * view;
        let position = view.inverse().transform_point3(Vec3::ZERO);
        Self {
            view_matrix: view,
            projection_matrix: projection,
            view_projection_matrix: view_projection,
            position,
            frustum: Frustum::from_matrix(view_projection),
            near,
            far,
        }
    }

    /// The frustum in view space (projection planes only), used to clip
    /// view-space bounds without leaving camera space.
    #[must_use]
    pub fn view_space_frustum(&self) -> Frustum {
        Frustum::from_matrix(self.projection_matrix)
    }

    /// The 8 corners of the frustum slice `[slice_near, slice_far]` in view
    /// space (RH, -Z forward), in the canonical bit order shared with
    /// [`Aabb::corners`]: bit 0 = +x, bit 1 = +y, bit 2 = +z. Since view-space
    /// z decreases with distance, the +z face is the near face.
    #[must_use]
    pub fn slice_corners_view(&self, slice_near: f32, slice_far: f32) -> [Vec3; 8] {
        let proj = self.projection_matrix;
        let tan_half_fov = 1.0 / proj.y_axis.y;
        let aspect = proj.y_axis.y / proj.x_axis.x;

        let h_near = tan_half_fov * slice_near;
        let w_near = h_near * aspect;
        let h_far = tan_half_fov * slice_far;
        let w_far = h_far * aspect;

        let mut corners = [Vec3::ZERO; 8];
        for (i, c) in corners.iter_mut().enumerate() {
            // bit 2 set -> near face (larger view-space z)
            let (w, h, z) = if i & 4 != 0 {
                (w_near, h_near, -slice_near)
            } else {
                (w_far, h_far, -slice_far)
            };
            *c = Vec3::new(
                if i & 1 != 0 { w } else { -w },
                if i & 2 != 0 { h } else { -h },
                z,
            );
        }
        corners
    }
}
