//! Mesh Stream Binding Tests
//!
//! Tests for:
//! - Stream selection against a shader's required semantics
//! - Coverage validation before any GPU call
//! - Vertex layout assembly (locations matched by semantic)
//! - Pipeline cache key identity

use ember::renderer::draw::{StreamKey, assemble_vertex_layouts, fx_hash_key};
use ember::shader::reflection::VertexInput;
use ember::{
    DepthStateKey, EmberError, NameRegistry, PipelineKey, RenderTargetDesc, ShaderCatalog,
    StreamLayout, VertexAttributeDesc, VertexSemantics, select_streams,
};

fn position_stream() -> StreamLayout {
    StreamLayout {
        stride: 12,
        attributes: vec![VertexAttributeDesc {
            semantic: VertexSemantics::POSITION,
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
        }],
    }
}

fn normal_uv_stream() -> StreamLayout {
    StreamLayout {
        stride: 20,
        attributes: vec![
            VertexAttributeDesc {
                semantic: VertexSemantics::NORMAL,
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
            },
            VertexAttributeDesc {
                semantic: VertexSemantics::TEXCOORD,
                format: wgpu::VertexFormat::Float32x2,
                offset: 12,
            },
        ],
    }
}

fn input(name: &str, location: u32) -> VertexInput {
    VertexInput {
        name: name.to_owned(),
        location,
        semantic: VertexSemantics::from_attribute_name(name).unwrap(),
    }
}

// ============================================================================
// Stream selection
// ============================================================================

#[test]
fn position_only_shader_selects_one_stream() {
    // A {position, normal, tangent} mesh drawn by a position-only shadow
    // shader binds exactly the one stream that carries position.
    let masks = [
        VertexSemantics::POSITION,
        VertexSemantics::NORMAL | VertexSemantics::TANGENT,
    ];
    let selected = select_streams(&masks, VertexSemantics::POSITION).unwrap();
    assert_eq!(&selected[..], &[0]);
}

#[test]
fn selection_binds_exactly_the_intersecting_streams() {
    let masks = [
        VertexSemantics::POSITION,
        VertexSemantics::NORMAL | VertexSemantics::TANGENT,
        VertexSemantics::TEXCOORD,
    ];
    let required = VertexSemantics::POSITION | VertexSemantics::TEXCOORD;
    let selected = select_streams(&masks, required).unwrap();
    assert_eq!(&selected[..], &[0, 2]);
}

#[test]
fn uncovered_requirement_fails_before_any_gpu_call() {
    let masks = [VertexSemantics::POSITION | VertexSemantics::NORMAL];
    let required = VertexSemantics::POSITION | VertexSemantics::JOINTS;
    let err = select_streams(&masks, required).unwrap_err();

    match err {
        EmberError::UnsatisfiedVertexInput {
            required,
            available,
        } => {
            assert!(required.contains(VertexSemantics::JOINTS));
            assert!(!available.contains(VertexSemantics::JOINTS));
        }
        other => panic!("expected UnsatisfiedVertexInput, got {other:?}"),
    }
}

// ============================================================================
// Layout assembly
// ============================================================================

#[test]
fn assembly_assigns_shader_locations_by_semantic() {
    let pos = position_stream();
    let nuv = normal_uv_stream();
    let layouts = [&pos, &nuv];
    let inputs = [input("position", 0), input("normal", 1), input("uv", 2)];

    let assembled = assemble_vertex_layouts(&layouts, &[0, 1], &inputs).unwrap();

    assert_eq!(assembled.len(), 2);
    assert_eq!(assembled[0].stride, 12);
    assert_eq!(assembled[0].attributes.len(), 1);
    assert_eq!(assembled[0].attributes[0].shader_location, 0);

    assert_eq!(assembled[1].attributes.len(), 2);
    let uv = &assembled[1].attributes[1];
    assert_eq!(uv.shader_location, 2);
    assert_eq!(uv.offset, 12);
    assert_eq!(uv.format, wgpu::VertexFormat::Float32x2);
}

#[test]
fn assembly_rejects_inputs_no_selected_stream_carries() {
    let pos = position_stream();
    let layouts = [&pos];
    let inputs = [input("position", 0), input("normal", 1)];

    let err = assemble_vertex_layouts(&layouts, &[0], &inputs).unwrap_err();
    assert!(matches!(err, EmberError::UnsatisfiedVertexInput { .. }));
}

// ============================================================================
// Pipeline keys
// ============================================================================

const DEPTH_VS: &str = r"
struct ObjectUniforms { world_view_proj: mat4x4<f32> };
@group(0) @binding(0) var<uniform> u: ObjectUniforms;
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return u.world_view_proj * vec4<f32>(position, 1.0);
}
";

fn sample_key(catalog: &mut ShaderCatalog, stride: u64) -> PipelineKey {
    let _ = env_logger::builder().is_test(true).try_init();
    let vertex = catalog.load("depth", DEPTH_VS).unwrap();
    PipelineKey {
        vertex,
        fragment: None,
        depth_state: DepthStateKey::shadow_caster(),
        topology: wgpu::PrimitiveTopology::TriangleList,
        target: RenderTargetDesc::depth_only(wgpu::TextureFormat::Depth32Float),
        streams: vec![StreamKey {
            stride,
            step: wgpu::VertexStepMode::Vertex,
            attributes: vec![(0, wgpu::VertexFormat::Float32x3, 0)],
        }],
    }
}

#[test]
fn identical_state_yields_identical_keys() {
    let mut catalog = ShaderCatalog::new(NameRegistry::new());
    let a = sample_key(&mut catalog, 12);
    let mut b = a.clone();

    assert_eq!(a, b);
    assert_eq!(fx_hash_key(&a), fx_hash_key(&b));

    // A different stream signature is a different pipeline
    b.streams[0].stride = 24;
    assert_ne!(a, b);
    assert_ne!(fx_hash_key(&a), fx_hash_key(&b));
}
