//! Cascade Math Tests
//!
//! Tests for:
//! - Partition ranges over the visible depth extent
//! - Practical split fractions
//! - Config validation
//! - Corner tightening against the scene bounds
//! - Cascade fitting: every tightened corner lands inside the cascade's NDC

use ember::renderer::shadow::cascades::{
    LightBasis, cascade_ranges, fit_cascade, practical_fractions, tighten_corners,
};
use ember::{Aabb, CascadeConfig, RenderCamera};
use glam::{Mat4, Vec3};

const EPSILON: f32 = 1e-3;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Partitioning
// ============================================================================

#[test]
fn fractions_expand_to_exact_ranges() {
    let ranges = cascade_ranges(&[0.0, 0.1, 0.3, 0.5, 1.0], 1.0, 50.0);
    let expected = [(1.0, 5.9), (5.9, 15.7), (15.7, 25.5), (25.5, 50.0)];

    assert_eq!(ranges.len(), 4);
    for (i, ((n, f), (en, ef))) in ranges.iter().zip(expected).enumerate() {
        assert!(approx(*n, en), "range {i} near: expected {en}, got {n}");
        assert!(approx(*f, ef), "range {i} far: expected {ef}, got {f}");
    }
}

#[test]
fn ranges_tile_the_extent_without_gaps() {
    let ranges = cascade_ranges(&[0.0, 0.25, 0.5, 1.0], 0.5, 80.0);
    assert!(approx(ranges[0].0, 0.5));
    assert!(approx(ranges.last().unwrap().1, 80.0));
    for w in ranges.windows(2) {
        assert!(approx(w[0].1, w[1].0), "adjacent ranges must share a bound");
    }
}

#[test]
fn practical_fractions_are_normalized_and_increasing() {
    let fractions = practical_fractions(4, 0.1, 100.0, 0.5);

    assert_eq!(fractions.len(), 5);
    assert!(approx(fractions[0], 0.0));
    assert!(approx(fractions[4], 1.0));
    for w in fractions.windows(2) {
        assert!(w[0] < w[1], "fractions must be strictly increasing: {fractions:?}");
    }
}

// ============================================================================
// Config validation
// ============================================================================

#[test]
fn config_rejects_bad_fractions() {
    assert!(CascadeConfig::new(2048, vec![0.0, 0.5, 0.3, 1.0]).is_err());
    assert!(CascadeConfig::new(2048, vec![0.0, 1.5]).is_err());
    assert!(CascadeConfig::new(2048, vec![1.0]).is_err());
    assert!(CascadeConfig::new(0, vec![0.0, 1.0]).is_err());
    // 5 cascades exceed the limit
    assert!(CascadeConfig::new(2048, vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]).is_err());

    let config = CascadeConfig::new(2048, vec![0.0, 0.1, 0.3, 0.5, 1.0]).unwrap();
    assert_eq!(config.cascade_count(), 4);
}

#[test]
fn practical_config_is_valid_by_construction() {
    let config = CascadeConfig::practical(1024, 4, 0.1, 100.0, 0.5).unwrap();
    assert_eq!(config.cascade_count(), 4);
}

// ============================================================================
// Corner tightening
// ============================================================================

#[test]
fn oversized_slice_tightens_to_the_scene_box() {
    let scene = Aabb::new(Vec3::new(-10.0, -10.0, -10.0), Vec3::new(10.0, 10.0, 10.0));
    let slice = Aabb::new(Vec3::splat(-20.0), Vec3::splat(20.0)).corners();

    let tight = tighten_corners(&slice, &scene);
    assert_eq!(tight, scene.corners());
}

#[test]
fn contained_slice_is_untouched() {
    let scene = Aabb::new(Vec3::splat(-100.0), Vec3::splat(100.0));
    let slice = Aabb::new(Vec3::new(-3.0, -2.0, -8.0), Vec3::new(3.0, 2.0, -1.0)).corners();

    let tight = tighten_corners(&slice, &scene);
    assert_eq!(tight, slice);
}

// ============================================================================
// Cascade fitting
// ============================================================================

#[test]
fn cascade_matrix_contains_its_tightened_corners() {
    let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.5, 100.0);
    let camera = RenderCamera::from_view_projection(Mat4::IDENTITY, proj, 0.5, 100.0);
    let scene = Aabb::new(Vec3::new(-30.0, -30.0, -60.0), Vec3::new(30.0, 30.0, -0.5));

    let light_dir = Vec3::new(-1.0, -1.0, -1.0).normalize();
    let basis = LightBasis::new(light_dir, camera.view_matrix, &scene);

    for &(near, far) in &[(0.5, 5.0), (5.0, 20.0), (20.0, 60.0)] {
        let slice = camera.slice_corners_view(near, far);
        let tight = tighten_corners(&slice, &scene);
        let fitted = fit_cascade(&basis, &tight, 2048);

        for (i, corner) in tight.iter().enumerate() {
            let ndc = fitted.from_view.transform_point3(*corner);
            assert!(
                ndc.x >= -1.0 - EPSILON && ndc.x <= 1.0 + EPSILON,
                "slice [{near}, {far}] corner {i}: ndc.x = {} out of range",
                ndc.x
            );
            assert!(
                ndc.y >= -1.0 - EPSILON && ndc.y <= 1.0 + EPSILON,
                "slice [{near}, {far}] corner {i}: ndc.y = {} out of range",
                ndc.y
            );
            assert!(
                ndc.z >= -EPSILON && ndc.z <= 1.0 + EPSILON,
                "slice [{near}, {far}] corner {i}: ndc.z = {} out of range",
                ndc.z
            );
        }
    }
}

#[test]
fn identity_view_makes_world_and_view_matrices_agree() {
    // With an identity camera view, world space and view space coincide, so
    // the render and resolve matrices must be the same transform.
    let proj = Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.1, 50.0);
    let camera = RenderCamera::from_view_projection(Mat4::IDENTITY, proj, 0.1, 50.0);
    let scene = Aabb::new(Vec3::splat(-20.0), Vec3::new(20.0, 20.0, 0.0));

    let basis = LightBasis::new(Vec3::NEG_Y, camera.view_matrix, &scene);
    let slice = camera.slice_corners_view(1.0, 10.0);
    let fitted = fit_cascade(&basis, &tighten_corners(&slice, &scene), 1024);

    assert!(fitted.from_world.abs_diff_eq(fitted.from_view, 1e-4));
}

#[test]
fn degenerate_light_direction_falls_back() {
    let scene = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let basis = LightBasis::new(Vec3::ZERO, Mat4::IDENTITY, &scene);
    // Falls back to -Z; the basis stays finite and invertible
    assert!(basis.light_view.determinant().abs() > 1e-6);
}
