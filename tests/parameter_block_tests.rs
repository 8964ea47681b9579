//! Parameter Binding Tests
//!
//! Tests for:
//! - Name-keyed field writes through the CPU mirror
//! - Hard errors on direct writes, silent skips on merges
//! - Parameter block → core merges and write ordering
//! - Global context broadcast by reserved name
//!
//! Blocks and cores share one `NameRegistry` throughout, as they do at
//! runtime; merges are keyed by interned symbols.

use ember::{
    EmberError, GlobalShaderContext, NameRegistry, ParameterBlockBuilder, RenderCamera,
    ShaderCatalog, ShaderCore, UniformRing,
};
use glam::{Mat4, Vec3, Vec4};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const OBJECT_WGSL: &str = r"
struct ObjectUniforms {
    world_view_proj: mat4x4<f32>,
    tint: vec4<f32>,
    intensity: f32,
};

@group(0) @binding(0) var<uniform> u: ObjectUniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.world_view_proj * vec4<f32>(position * u.intensity, 1.0);
}
";

fn object_core() -> (NameRegistry, ShaderCore) {
    init_logs();
    let names = NameRegistry::new();
    let core = ShaderCore::new(names.clone(), "object", OBJECT_WGSL).expect("valid shader");
    (names, core)
}

fn field_span(core: &ShaderCore, name: &str) -> (usize, usize) {
    let f = core
        .reflection()
        .fields
        .iter()
        .find(|f| f.name == name)
        .expect("declared field");
    (f.offset as usize, f.size as usize)
}

// ============================================================================
// Direct writes
// ============================================================================

#[test]
fn write_field_round_trips_through_the_mirror() {
    let (_, mut core) = object_core();
    let tint = Vec4::new(0.25, 0.5, 0.75, 1.0);
    core.write_field("tint", bytemuck::bytes_of(&tint)).unwrap();

    let (offset, size) = field_span(&core, "tint");
    assert_eq!(
        &core.mirror_bytes()[offset..offset + size],
        bytemuck::bytes_of(&tint)
    );
}

#[test]
fn write_field_rejects_unknown_names() {
    let (_, mut core) = object_core();
    let err = core.write_field("specular", &[0u8; 4]).unwrap_err();
    assert!(
        matches!(err, EmberError::UnknownParameterName(ref n) if n == "specular"),
        "got {err:?}"
    );
}

#[test]
fn write_field_rejects_size_mismatch() {
    let (_, mut core) = object_core();
    let err = core.write_field("intensity", &[0u8; 16]).unwrap_err();
    assert!(
        matches!(
            err,
            EmberError::FieldSizeMismatch {
                expected: 4,
                got: 16,
                ..
            }
        ),
        "got {err:?}"
    );
}

#[test]
fn merge_writes_skip_silently() {
    let (names, mut core) = object_core();
    let before = core.mirror_bytes().to_vec();

    // Unknown field: skipped
    assert!(!core.try_write_field(names.intern("specular"), &[0u8; 4]));
    // Known field, wrong payload size: also skipped
    assert!(!core.try_write_field(names.intern("intensity"), &[0u8; 16]));
    assert_eq!(core.mirror_bytes(), &before[..], "mirror left untouched");
}

#[test]
fn remerging_identical_values_is_stable() {
    let (names, mut core) = object_core();
    let mut block = ParameterBlockBuilder::new(names)
        .field("intensity", 4)
        .build();
    block.set_f32("intensity", 2.0).unwrap();

    block.apply_to(&mut core);
    let first = core.mirror_bytes().to_vec();
    block.apply_to(&mut core);
    assert_eq!(core.mirror_bytes(), &first[..]);
}

// ============================================================================
// Parameter blocks
// ============================================================================

#[test]
fn block_merges_only_written_fields() {
    let (names, mut core) = object_core();
    let mut block = ParameterBlockBuilder::new(names)
        .field("tint", 16)
        .field("intensity", 4)
        .build();
    block.set_vec4("tint", Vec4::ONE).unwrap();

    block.apply_to(&mut core);

    let (t_off, t_size) = field_span(&core, "tint");
    let (i_off, i_size) = field_span(&core, "intensity");
    assert_eq!(
        &core.mirror_bytes()[t_off..t_off + t_size],
        bytemuck::bytes_of(&Vec4::ONE)
    );
    assert_eq!(
        &core.mirror_bytes()[i_off..i_off + i_size],
        &[0u8; 4],
        "unset field not merged"
    );
}

#[test]
fn block_set_field_is_strict() {
    let names = NameRegistry::new();
    let mut block = ParameterBlockBuilder::new(names).field("tint", 16).build();

    let err = block.set_f32("specular", 1.0).unwrap_err();
    assert!(matches!(err, EmberError::UnknownParameterName(_)));
    let err = block.set_f32("tint", 1.0).unwrap_err();
    assert!(matches!(err, EmberError::FieldSizeMismatch { .. }));
}

#[test]
fn later_merges_win_by_name() {
    let (names, mut core) = object_core();

    let mut red = ParameterBlockBuilder::new(names.clone())
        .field("tint", 16)
        .build();
    red.set_vec4("tint", Vec4::new(1.0, 0.0, 0.0, 1.0)).unwrap();
    let mut green = ParameterBlockBuilder::new(names)
        .field("tint", 16)
        .build();
    green
        .set_vec4("tint", Vec4::new(0.0, 1.0, 0.0, 1.0))
        .unwrap();

    red.apply_to(&mut core);
    green.apply_to(&mut core);

    let (offset, size) = field_span(&core, "tint");
    assert_eq!(
        &core.mirror_bytes()[offset..offset + size],
        bytemuck::bytes_of(&Vec4::new(0.0, 1.0, 0.0, 1.0))
    );

    // A direct write after the merges wins again
    core.write_field("tint", bytemuck::bytes_of(&Vec4::new(0.0, 0.0, 1.0, 1.0)))
        .unwrap();
    assert_eq!(
        &core.mirror_bytes()[offset..offset + size],
        bytemuck::bytes_of(&Vec4::new(0.0, 0.0, 1.0, 1.0))
    );
}

#[test]
fn builder_mirrors_a_reflection() {
    let names = NameRegistry::new();
    let mut catalog = ShaderCatalog::new(names.clone());
    let handle = catalog.load("object", OBJECT_WGSL).unwrap();

    let mut block = ParameterBlockBuilder::new(names)
        .from_reflection(catalog.core(handle).reflection())
        .build();
    // Every declared field is settable at its declared size
    block.set_mat4("world_view_proj", &Mat4::IDENTITY).unwrap();
    block.set_vec4("tint", Vec4::ONE).unwrap();
    block.set_f32("intensity", 1.0).unwrap();
}

// ============================================================================
// Per-draw uniform slots
// ============================================================================

#[test]
fn successive_draws_get_distinct_slots() {
    // A 160-byte block on a device with 256-byte dynamic-offset alignment
    let mut ring = UniformRing::new(160, 256);
    assert_eq!(ring.slot_size(), 256);

    let (a, grew_a) = ring.allocate();
    let (b, grew_b) = ring.allocate();
    let (c, _) = ring.allocate();
    assert!(!grew_a && !grew_b);
    assert_eq!(a, 0);
    assert_eq!(b, 256);
    assert_eq!(c, 512);
}

#[test]
fn frame_reset_rewinds_the_ring() {
    let mut ring = UniformRing::new(64, 256);
    ring.allocate();
    ring.allocate();

    ring.reset();
    assert_eq!(ring.allocate().0, 0);
}

#[test]
fn exhausted_ring_grows_into_a_fresh_buffer() {
    let mut ring = UniformRing::new(16, 16);
    let slots = ring.capacity() / ring.slot_size();
    for _ in 0..slots {
        assert!(!ring.allocate().1);
    }

    let before = ring.capacity();
    let (offset, grew) = ring.allocate();
    assert!(grew, "over-capacity allocation must grow the buffer");
    assert_eq!(offset, 0, "the fresh buffer is written from the front");
    assert_eq!(ring.capacity(), before * 2);
    assert_eq!(ring.allocate().0, ring.slot_size());
}

// ============================================================================
// Global context
// ============================================================================

#[test]
fn globals_broadcast_by_reserved_name() {
    const GLOBALS_WGSL: &str = r"
struct FrameUniforms {
    view_matrix: mat4x4<f32>,
    view_projection_matrix: mat4x4<f32>,
    eye_position: vec4<f32>,
    light_count: u32,
};
@group(0) @binding(0) var<uniform> u: FrameUniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.view_projection_matrix * vec4<f32>(position, 1.0);
}
";
    let names = NameRegistry::new();
    let mut core = ShaderCore::new(names.clone(), "frame", GLOBALS_WGSL).unwrap();

    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
    let camera = RenderCamera::from_view_projection(view, proj, 0.1, 100.0);

    let mut globals = GlobalShaderContext::new(&names);
    globals.set_camera(&camera);
    globals.apply_to(&mut core);

    let (offset, size) = field_span(&core, "view_matrix");
    assert_eq!(
        &core.mirror_bytes()[offset..offset + size],
        bytemuck::bytes_of(&view)
    );

    let (e_off, e_size) = field_span(&core, "eye_position");
    let eye: Vec4 = bytemuck::pod_read_unaligned(&core.mirror_bytes()[e_off..e_off + e_size]);
    assert!((eye.truncate() - camera.position).length() < 1e-5);
}
