//! Shader Reflection
//!
//! Extracts the binding surface of a WGSL shader at load time: the fields of
//! its single uniform block (name, byte offset, byte size), its named texture
//! and sampler slots, its stage kind, and — for vertex stages — the semantics
//! of its vertex inputs. [`reflect_wgsl`] is a pure function of the source;
//! everything downstream (catalogs, parameter blocks, input-layout assembly)
//! consumes only this metadata, never the module itself.
//!
//! # Layout contract
//!
//! A shader accepted by this core declares:
//! - exactly one entry point, vertex or fragment;
//! - at most one `var<uniform>` block, which must be a struct;
//! - all of its bindings in a single bind group;
//! - vertex-input names that map to known [`VertexSemantics`].
//!
//! Anything else is a [`ShaderLayoutUnsupported`] load failure.
//!
//! [`ShaderLayoutUnsupported`]: crate::errors::EmberError::ShaderLayoutUnsupported

use crate::core::mesh::VertexSemantics;
use crate::errors::{EmberError, Result};

/// Pipeline stage a compiled shader binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    #[must_use]
    pub fn visibility(self) -> wgpu::ShaderStages {
        match self {
            Self::Vertex => wgpu::ShaderStages::VERTEX,
            Self::Fragment => wgpu::ShaderStages::FRAGMENT,
        }
    }
}

/// One field of the shader's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

/// A named texture binding slot.
#[derive(Debug, Clone)]
pub struct TextureSlot {
    pub name: String,
    pub binding: u32,
    pub dimension: wgpu::TextureViewDimension,
    pub sample_type: wgpu::TextureSampleType,
}

/// A named sampler binding slot.
#[derive(Debug, Clone)]
pub struct SamplerSlot {
    pub name: String,
    pub binding: u32,
    pub comparison: bool,
}

/// One vertex-stage input attribute.
#[derive(Debug, Clone)]
pub struct VertexInput {
    pub name: String,
    pub location: u32,
    pub semantic: VertexSemantics,
}

/// Reflection metadata for one compiled shader.
#[derive(Debug, Clone)]
pub struct ShaderReflection {
    pub stage: StageKind,
    pub entry_point: String,
    /// The single bind group index all of this shader's bindings use.
    pub group: u32,
    /// Binding index of the uniform block, if the shader declares one.
    pub uniform_binding: Option<u32>,
    /// Total byte size of the uniform block (0 without one).
    pub uniform_size: u32,
    pub fields: Vec<UniformField>,
    pub textures: Vec<TextureSlot>,
    pub samplers: Vec<SamplerSlot>,
    /// Vertex inputs in declaration order; empty for fragment stages.
    pub vertex_inputs: Vec<VertexInput>,
}

impl ShaderReflection {
    /// Union of the semantics this shader's vertex inputs require.
    #[must_use]
    pub fn required_semantics(&self) -> VertexSemantics {
        self.vertex_inputs
            .iter()
            .fold(VertexSemantics::empty(), |acc, i| acc | i.semantic)
    }
}

/// Reflects a WGSL shader. Pure function of its input; no side effects.
pub fn reflect_wgsl(source: &str) -> Result<ShaderReflection> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| EmberError::ShaderParse(e.emit_to_string(source)))?;

    let (stage, entry_point) = single_entry_point(&module)?;

    let mut group: Option<u32> = None;
    let mut uniform_binding = None;
    let mut uniform_size = 0;
    let mut fields = Vec::new();
    let mut textures = Vec::new();
    let mut samplers = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        track_group(&mut group, binding.group)?;
        let var_name = || var.name.clone().unwrap_or_default();

        match (&var.space, &module.types[var.ty].inner) {
            (naga::AddressSpace::Uniform, naga::TypeInner::Struct { members, span }) => {
                if uniform_binding.is_some() {
                    return Err(EmberError::ShaderLayoutUnsupported(
                        "more than one uniform block declared".into(),
                    ));
                }
                uniform_binding = Some(binding.binding);
                uniform_size = *span;
                fields = reflect_struct_fields(&module, members)?;
            }
            (naga::AddressSpace::Uniform, _) => {
                return Err(EmberError::ShaderLayoutUnsupported(format!(
                    "uniform block '{}' must be a struct",
                    var_name()
                )));
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Image { dim, arrayed, class }) => {
                textures.push(TextureSlot {
                    name: var_name(),
                    binding: binding.binding,
                    dimension: view_dimension(*dim, *arrayed),
                    sample_type: sample_type(*class)?,
                });
            }
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { comparison }) => {
                samplers.push(SamplerSlot {
                    name: var_name(),
                    binding: binding.binding,
                    comparison: *comparison,
                });
            }
            _ => {
                return Err(EmberError::ShaderLayoutUnsupported(format!(
                    "unsupported binding '{}'",
                    var_name()
                )));
            }
        }
    }

    let vertex_inputs = match stage {
        StageKind::Vertex => reflect_vertex_inputs(&module)?,
        StageKind::Fragment => Vec::new(),
    };

    Ok(ShaderReflection {
        stage,
        entry_point,
        group: group.unwrap_or(0),
        uniform_binding,
        uniform_size,
        fields,
        textures,
        samplers,
        vertex_inputs,
    })
}

fn single_entry_point(module: &naga::Module) -> Result<(StageKind, String)> {
    let mut found = None;
    for ep in &module.entry_points {
        if found.is_some() {
            return Err(EmberError::ShaderLayoutUnsupported(
                "more than one entry point declared".into(),
            ));
        }
        let stage = match ep.stage {
            naga::ShaderStage::Vertex => StageKind::Vertex,
            naga::ShaderStage::Fragment => StageKind::Fragment,
            _ => {
                return Err(EmberError::ShaderLayoutUnsupported(format!(
                    "unrecognized stage kind for entry point '{}'",
                    ep.name
                )));
            }
        };
        found = Some((stage, ep.name.clone()));
    }
    found.ok_or_else(|| EmberError::ShaderLayoutUnsupported("no entry point declared".into()))
}

fn track_group(group: &mut Option<u32>, seen: u32) -> Result<()> {
    match group {
        None => {
            *group = Some(seen);
            Ok(())
        }
        Some(g) if *g == seen => Ok(()),
        Some(g) => Err(EmberError::ShaderLayoutUnsupported(format!(
            "bindings span multiple groups ({g} and {seen})"
        ))),
    }
}

fn reflect_struct_fields(
    module: &naga::Module,
    members: &[naga::StructMember],
) -> Result<Vec<UniformField>> {
    members
        .iter()
        .map(|m| {
            let name = m.name.clone().ok_or_else(|| {
                EmberError::ShaderLayoutUnsupported("unnamed uniform block member".into())
            })?;
            let size = module.types[m.ty].inner.size(module.to_ctx());
            Ok(UniformField {
                name,
                offset: m.offset,
                size,
            })
        })
        .collect()
}

fn view_dimension(dim: naga::ImageDimension, arrayed: bool) -> wgpu::TextureViewDimension {
    match (dim, arrayed) {
        (naga::ImageDimension::D1, _) => wgpu::TextureViewDimension::D1,
        (naga::ImageDimension::D2, false) => wgpu::TextureViewDimension::D2,
        (naga::ImageDimension::D2, true) => wgpu::TextureViewDimension::D2Array,
        (naga::ImageDimension::D3, _) => wgpu::TextureViewDimension::D3,
        (naga::ImageDimension::Cube, false) => wgpu::TextureViewDimension::Cube,
        (naga::ImageDimension::Cube, true) => wgpu::TextureViewDimension::CubeArray,
    }
}

fn sample_type(class: naga::ImageClass) -> Result<wgpu::TextureSampleType> {
    match class {
        naga::ImageClass::Sampled { kind, .. } => Ok(match kind {
            naga::ScalarKind::Sint => wgpu::TextureSampleType::Sint,
            naga::ScalarKind::Uint => wgpu::TextureSampleType::Uint,
            _ => wgpu::TextureSampleType::Float { filterable: true },
        }),
        naga::ImageClass::Depth { .. } => Ok(wgpu::TextureSampleType::Depth),
        naga::ImageClass::Storage { .. } => Err(EmberError::ShaderLayoutUnsupported(
            "storage textures are not supported".into(),
        )),
    }
}

fn reflect_vertex_inputs(module: &naga::Module) -> Result<Vec<VertexInput>> {
    let ep = &module.entry_points[0];
    let mut inputs = Vec::new();

    for arg in &ep.function.arguments {
        match &arg.binding {
            Some(naga::Binding::Location { location, .. }) => {
                push_input(&mut inputs, arg.name.as_deref(), *location)?;
            }
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                // Inputs gathered into a struct argument
                if let naga::TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
                    for m in members {
                        if let Some(naga::Binding::Location { location, .. }) = &m.binding {
                            push_input(&mut inputs, m.name.as_deref(), *location)?;
                        }
                    }
                }
            }
        }
    }

    Ok(inputs)
}

fn push_input(inputs: &mut Vec<VertexInput>, name: Option<&str>, location: u32) -> Result<()> {
    let name = name.unwrap_or_default();
    let semantic = VertexSemantics::from_attribute_name(name).ok_or_else(|| {
        EmberError::ShaderLayoutUnsupported(format!("unknown vertex attribute name '{name}'"))
    })?;
    inputs.push(VertexInput {
        name: name.to_owned(),
        location,
        semantic,
    });
    Ok(())
}
