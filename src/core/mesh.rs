//! Meshes, Vertex Streams, and Semantics Masks
//!
//! A mesh owns one or more GPU vertex streams, each tagged with a
//! [`VertexSemantics`] bitmask describing which attributes it carries. Draw
//! assembly intersects those masks with the vertex shader's reflected
//! requirement to pick exactly the streams a pass needs — a position-only
//! shadow shader binds one buffer of a {position, normal, uv} mesh.
//!
//! Meshes are immutable after creation; stream layouts are separated into
//! [`StreamLayout`] so selection and layout assembly stay pure and testable.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::core::bounds::Aabb;
use crate::errors::{EmberError, Result};

bitflags! {
    /// Which named vertex attributes a stream or shader declares.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VertexSemantics: u32 {
        const POSITION  = 1 << 0;
        const NORMAL    = 1 << 1;
        const TANGENT   = 1 << 2;
        const TEXCOORD  = 1 << 3;
        const TEXCOORD1 = 1 << 4;
        const COLOR     = 1 << 5;
        const JOINTS    = 1 << 6;
        const WEIGHTS   = 1 << 7;
    }
}

impl VertexSemantics {
    /// Maps a WGSL vertex-input name to its semantic. Matching is
    /// case-insensitive and accepts the common aliases the importer emits.
    #[must_use]
    pub fn from_attribute_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "position" | "pos" => Some(Self::POSITION),
            "normal" => Some(Self::NORMAL),
            "tangent" => Some(Self::TANGENT),
            "uv" | "uv0" | "texcoord" | "texcoord0" => Some(Self::TEXCOORD),
            "uv1" | "texcoord1" => Some(Self::TEXCOORD1),
            "color" | "vertex_color" => Some(Self::COLOR),
            "joints" => Some(Self::JOINTS),
            "weights" => Some(Self::WEIGHTS),
            _ => None,
        }
    }
}

/// One attribute inside a stream: where it sits and how it is encoded.
/// Shader locations are assigned at pipeline assembly from reflection, not
/// stored here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttributeDesc {
    pub semantic: VertexSemantics,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

/// The CPU-side layout of a vertex stream (no GPU resources).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttributeDesc>,
}

impl StreamLayout {
    /// Union of the semantics of all attributes in this stream.
    #[must_use]
    pub fn semantics(&self) -> VertexSemantics {
        self.attributes
            .iter()
            .fold(VertexSemantics::empty(), |acc, a| acc | a.semantic)
    }

    #[must_use]
    pub fn attribute(&self, semantic: VertexSemantics) -> Option<&VertexAttributeDesc> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }
}

/// A GPU vertex stream: buffer plus layout.
#[derive(Debug)]
pub struct VertexStream {
    pub buffer: wgpu::Buffer,
    pub layout: StreamLayout,
}

/// An immutable GPU mesh.
#[derive(Debug)]
pub struct Mesh {
    pub streams: Vec<VertexStream>,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub index_format: wgpu::IndexFormat,
    pub bounds: Aabb,
    pub topology: wgpu::PrimitiveTopology,
}

impl Mesh {
    /// Semantics masks of all streams, in stream order.
    #[must_use]
    pub fn stream_masks(&self) -> SmallVec<[VertexSemantics; 4]> {
        self.streams
            .iter()
            .map(|s| s.layout.semantics())
            .collect()
    }
}

/// Selects the streams whose mask intersects `required`, in stream order.
///
/// Fails with [`EmberError::UnsatisfiedVertexInput`] when the union of all
/// stream masks does not cover the requirement — checked here, before any
/// GPU call, rather than left for the driver to reject.
pub fn select_streams(
    masks: &[VertexSemantics],
    required: VertexSemantics,
) -> Result<SmallVec<[usize; 4]>> {
    let available = masks
        .iter()
        .fold(VertexSemantics::empty(), |acc, m| acc | *m);
    if !available.contains(required) {
        return Err(EmberError::UnsatisfiedVertexInput {
            required,
            available,
        });
    }

    Ok(masks
        .iter()
        .enumerate()
        .filter(|(_, m)| m.intersects(required))
        .map(|(i, _)| i)
        .collect())
}
