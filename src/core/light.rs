//! Lights and Their GPU Records
//!
//! The lights collaborator hands the renderer an ordered `&[Light]`, capped
//! at [`MAX_LIGHTS`]. Each variant converts to one fixed-layout [`GpuLight`]
//! record; the packed array plus a count are broadcast to shaders through the
//! reserved `lights` / `light_count` parameter names.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Maximum number of lights uploaded per frame. Excess lights are dropped.
pub const MAX_LIGHTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point { range: f32 },
    Spot { range: f32, inner_cone: f32, outer_cone: f32 },
}

#[derive(Debug, Clone)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    /// Direction the light is shining (directional and spot).
    pub direction: Vec3,
    pub cast_shadows: bool,
}

impl Light {
    #[must_use]
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
            position: Vec3::ZERO,
            direction: direction.normalize_or_zero(),
            cast_shadows: true,
        }
    }

    #[must_use]
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point { range },
            color,
            intensity,
            position,
            direction: Vec3::ZERO,
            cast_shadows: false,
        }
    }

    #[must_use]
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_cone: f32,
        outer_cone: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot {
                range,
                inner_cone,
                outer_cone,
            },
            color,
            intensity,
            position,
            direction: direction.normalize_or_zero(),
            cast_shadows: false,
        }
    }
}

/// Fixed-layout GPU light record (64 bytes, std140-compatible).
///
/// - `position_kind`: xyz position, w = kind (0 directional, 1 point, 2 spot)
/// - `direction_range`: xyz direction, w = range
/// - `color_intensity`: rgb color, w = intensity
/// - `cone_params`: x = cos(inner), y = cos(outer), zw unused
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct GpuLight {
    pub position_kind: Vec4,
    pub direction_range: Vec4,
    pub color_intensity: Vec4,
    pub cone_params: Vec4,
}

impl From<&Light> for GpuLight {
    fn from(light: &Light) -> Self {
        let (kind, range, inner, outer) = match light.kind {
            LightKind::Directional => (0.0, 0.0, 0.0, 0.0),
            LightKind::Point { range } => (1.0, range, 0.0, 0.0),
            LightKind::Spot {
                range,
                inner_cone,
                outer_cone,
            } => (2.0, range, inner_cone.cos(), outer_cone.cos()),
        };
        Self {
            position_kind: light.position.extend(kind),
            direction_range: light.direction.extend(range),
            color_intensity: light.color.extend(light.intensity),
            cone_params: Vec4::new(inner, outer, 0.0, 0.0),
        }
    }
}

/// Packs the first [`MAX_LIGHTS`] lights into a fixed array plus a count.
#[must_use]
pub fn pack_lights(lights: &[Light]) -> ([GpuLight; MAX_LIGHTS], u32) {
    if lights.len() > MAX_LIGHTS {
        log::warn!(
            "{} lights supplied, dropping {} beyond the cap of {MAX_LIGHTS}",
            lights.len(),
            lights.len() - MAX_LIGHTS
        );
    }
    let mut packed = [GpuLight::default(); MAX_LIGHTS];
    let count = lights.len().min(MAX_LIGHTS);
    for (dst, src) in packed.iter_mut().zip(lights.iter().take(MAX_LIGHTS)) {
        *dst = GpuLight::from(src);
    }
    (packed, count as u32)
}

/// The single shadow-casting directional light of the frame, if any.
///
/// The cascade renderer supports exactly one; the first match wins and any
/// further shadow-casting directionals are ignored.
#[must_use]
pub fn main_directional(lights: &[Light]) -> Option<&Light> {
    lights
        .iter()
        .find(|l| matches!(l.kind, LightKind::Directional) && l.cast_shadows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_record_is_64_bytes() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 64);
    }

    #[test]
    fn packing_caps_at_max() {
        let lights: Vec<Light> = (0..12)
            .map(|i| Light::point(Vec3::splat(i as f32), Vec3::ONE, 1.0, 5.0))
            .collect();
        let (packed, count) = pack_lights(&lights);

        assert_eq!(count, MAX_LIGHTS as u32);
        assert_eq!(packed[9].position_kind.x, 9.0);
    }

    #[test]
    fn main_directional_skips_non_casters() {
        let mut sun = Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0);
        sun.cast_shadows = false;
        let lights = vec![
            Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 5.0),
            sun,
            Light::directional(Vec3::NEG_Z, Vec3::ONE, 2.0),
        ];

        let main = main_directional(&lights).expect("caster present");
        assert_eq!(main.direction, Vec3::NEG_Z);
    }
}
