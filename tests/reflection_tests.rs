//! Shader Reflection Tests
//!
//! Tests for:
//! - Uniform block field extraction (names, offsets, sizes)
//! - Texture/sampler slot extraction with dimensions and comparison flags
//! - Vertex input semantics
//! - Layout contract violations at load

use ember::{EmberError, StageKind, VertexSemantics, reflect_wgsl};

const LIT_VS: &str = r"
struct ObjectUniforms {
    world_matrix: mat4x4<f32>,
    world_view_proj: mat4x4<f32>,
    tint: vec4<f32>,
    intensity: f32,
};

@group(0) @binding(0) var<uniform> u: ObjectUniforms;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(vin: VsIn) -> @builtin(position) vec4<f32> {
    return u.world_view_proj * vec4<f32>(vin.position, 1.0);
}
";

const LIT_FS: &str = r"
struct MaterialUniforms {
    base_color: vec4<f32>,
};

@group(1) @binding(0) var<uniform> u: MaterialUniforms;
@group(1) @binding(1) var albedo: texture_2d<f32>;
@group(1) @binding(2) var albedo_sampler: sampler;
@group(1) @binding(3) var shadow_maps: texture_depth_2d_array;
@group(1) @binding(4) var shadow_sampler: sampler_comparison;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return u.base_color * textureSample(albedo, albedo_sampler, uv);
}
";

// ============================================================================
// Uniform block reflection
// ============================================================================

#[test]
fn reflects_uniform_fields_with_exact_offsets_and_sizes() {
    let r = reflect_wgsl(LIT_VS).expect("valid shader");

    assert_eq!(r.stage, StageKind::Vertex);
    assert_eq!(r.entry_point, "vs_main");
    assert_eq!(r.group, 0);
    assert_eq!(r.uniform_binding, Some(0));

    let expected = [
        ("world_matrix", 0, 64),
        ("world_view_proj", 64, 64),
        ("tint", 128, 16),
        ("intensity", 144, 4),
    ];
    assert_eq!(r.fields.len(), expected.len());
    for (field, (name, offset, size)) in r.fields.iter().zip(expected) {
        assert_eq!(field.name, name);
        assert_eq!(field.offset, offset, "offset of '{name}'");
        assert_eq!(field.size, size, "size of '{name}'");
    }
    // Struct span rounds up to its 16-byte alignment
    assert_eq!(r.uniform_size, 160);
}

#[test]
fn reflects_vertex_inputs_as_semantics() {
    let r = reflect_wgsl(LIT_VS).expect("valid shader");

    assert_eq!(r.vertex_inputs.len(), 3);
    assert_eq!(r.vertex_inputs[0].location, 0);
    assert_eq!(r.vertex_inputs[0].semantic, VertexSemantics::POSITION);
    assert_eq!(r.vertex_inputs[2].semantic, VertexSemantics::TEXCOORD);
    assert_eq!(
        r.required_semantics(),
        VertexSemantics::POSITION | VertexSemantics::NORMAL | VertexSemantics::TEXCOORD
    );
}

// ============================================================================
// Resource slot reflection
// ============================================================================

#[test]
fn reflects_texture_and_sampler_slots() {
    let r = reflect_wgsl(LIT_FS).expect("valid shader");

    assert_eq!(r.stage, StageKind::Fragment);
    assert_eq!(r.group, 1);
    assert!(r.vertex_inputs.is_empty());

    assert_eq!(r.textures.len(), 2);
    let albedo = &r.textures[0];
    assert_eq!(albedo.name, "albedo");
    assert_eq!(albedo.binding, 1);
    assert_eq!(albedo.dimension, wgpu::TextureViewDimension::D2);
    assert!(matches!(
        albedo.sample_type,
        wgpu::TextureSampleType::Float { .. }
    ));

    let shadow = &r.textures[1];
    assert_eq!(shadow.name, "shadow_maps");
    assert_eq!(shadow.dimension, wgpu::TextureViewDimension::D2Array);
    assert_eq!(shadow.sample_type, wgpu::TextureSampleType::Depth);

    assert_eq!(r.samplers.len(), 2);
    assert!(!r.samplers[0].comparison, "plain sampler");
    assert!(r.samplers[1].comparison, "comparison sampler");
}

// ============================================================================
// Layout contract violations
// ============================================================================

#[test]
fn rejects_invalid_wgsl() {
    let err = reflect_wgsl("this is not wgsl").unwrap_err();
    assert!(matches!(err, EmberError::ShaderParse(_)), "got {err:?}");
}

#[test]
fn rejects_two_uniform_blocks() {
    let src = r"
struct A { x: f32 };
struct B { y: f32 };
@group(0) @binding(0) var<uniform> a: A;
@group(0) @binding(1) var<uniform> b: B;
@fragment
fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(a.x, b.y, 0.0, 1.0); }
";
    let err = reflect_wgsl(src).unwrap_err();
    assert!(
        matches!(err, EmberError::ShaderLayoutUnsupported(_)),
        "got {err:?}"
    );
}

#[test]
fn rejects_mixed_bind_groups() {
    let src = r"
@group(0) @binding(0) var t: texture_2d<f32>;
@group(1) @binding(0) var s: sampler;
@fragment
fn fs_main() -> @location(0) vec4<f32> { return textureSample(t, s, vec2<f32>(0.5)); }
";
    let err = reflect_wgsl(src).unwrap_err();
    assert!(
        matches!(err, EmberError::ShaderLayoutUnsupported(_)),
        "got {err:?}"
    );
}

#[test]
fn rejects_compute_entry_points() {
    let src = r"
@compute @workgroup_size(1)
fn cs_main() { }
";
    let err = reflect_wgsl(src).unwrap_err();
    assert!(
        matches!(err, EmberError::ShaderLayoutUnsupported(_)),
        "got {err:?}"
    );
}

#[test]
fn rejects_multiple_entry_points() {
    let src = r"
@vertex
fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }
@fragment
fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
";
    let err = reflect_wgsl(src).unwrap_err();
    assert!(
        matches!(err, EmberError::ShaderLayoutUnsupported(_)),
        "got {err:?}"
    );
}

#[test]
fn rejects_unknown_vertex_attribute_names() {
    let src = r"
@vertex
fn vs_main(@location(0) wobble: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(wobble, 1.0);
}
";
    let err = reflect_wgsl(src).unwrap_err();
    assert!(
        matches!(err, EmberError::ShaderLayoutUnsupported(_)),
        "got {err:?}"
    );
}
