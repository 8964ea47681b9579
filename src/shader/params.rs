//! Parameter Blocks
//!
//! A [`ParameterBlock`] is a shader-independent bag of named values: uniform
//! fields as raw bytes plus texture and sampler bindings. Materials and
//! renderers fill blocks, then merge them into any [`ShaderCore`] with
//! [`ParameterBlock::apply_to`] — each value lands in every shader that
//! declares a field or slot of the same name and size, and is skipped
//! silently everywhere else. That one mechanism lets heterogeneous materials
//! feed heterogeneous shaders without per-pair glue code.
//!
//! Direct writes to the block itself (`set_*`, `bind_*`) stay strict: naming
//! a field the block does not declare is a hard error.

use std::collections::hash_map::Entry;

use bytemuck::Pod;
use glam::{Mat4, Vec2, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::errors::{EmberError, Result};
use crate::names::{Name, NameRegistry};
use crate::shader::catalog::ShaderCore;
use crate::shader::reflection::ShaderReflection;

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: usize,
    size: usize,
    /// Only slots that were actually written participate in merges.
    set: bool,
}

/// Declares the named values a [`ParameterBlock`] will carry.
#[derive(Debug)]
pub struct ParameterBlockBuilder {
    names: NameRegistry,
    fields: Vec<(Name, usize)>,
    textures: Vec<Name>,
    samplers: Vec<Name>,
}

impl ParameterBlockBuilder {
    #[must_use]
    pub fn new(names: NameRegistry) -> Self {
        Self {
            names,
            fields: Vec::new(),
            textures: Vec::new(),
            samplers: Vec::new(),
        }
    }

    /// Declares a uniform field of `size` bytes.
    #[must_use]
    pub fn field(mut self, name: &str, size: usize) -> Self {
        self.fields.push((self.names.intern(name), size));
        self
    }

    #[must_use]
    pub fn texture(mut self, name: &str) -> Self {
        self.textures.push(self.names.intern(name));
        self
    }

    #[must_use]
    pub fn sampler(mut self, name: &str) -> Self {
        self.samplers.push(self.names.intern(name));
        self
    }

    /// Declares every field and slot a reflected shader exposes, so a block
    /// built from it can drive that shader completely.
    #[must_use]
    pub fn from_reflection(mut self, reflection: &ShaderReflection) -> Self {
        for f in &reflection.fields {
            self.fields.push((self.names.intern(&f.name), f.size as usize));
        }
        for t in &reflection.textures {
            self.textures.push(self.names.intern(&t.name));
        }
        for s in &reflection.samplers {
            self.samplers.push(self.names.intern(&s.name));
        }
        self
    }

    /// Re-declared names keep their first slot; duplicates claim no bytes.
    #[must_use]
    pub fn build(self) -> ParameterBlock {
        let mut slots = FxHashMap::default();
        let mut cursor = 0usize;
        for (name, size) in self.fields {
            if let Entry::Vacant(entry) = slots.entry(name) {
                // Keep slots 16-byte aligned so typed payloads never straddle
                cursor = (cursor + 15) & !15;
                entry.insert(Slot {
                    offset: cursor,
                    size,
                    set: false,
                });
                cursor += size;
            }
        }
        ParameterBlock {
            names: self.names,
            slots,
            data: vec![0u8; cursor],
            textures: self.textures.into_iter().map(|n| (n, None)).collect(),
            samplers: self.samplers.into_iter().map(|n| (n, None)).collect(),
        }
    }
}

/// A named bag of uniform values and resource bindings.
#[derive(Debug)]
pub struct ParameterBlock {
    names: NameRegistry,
    slots: FxHashMap<Name, Slot>,
    data: Vec<u8>,
    textures: Vec<(Name, Option<wgpu::TextureView>)>,
    samplers: Vec<(Name, Option<wgpu::Sampler>)>,
}

impl ParameterBlock {
    /// Writes raw bytes into the named field. Hard error on unknown names
    /// and size mismatches.
    pub fn set_field(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let id = self
            .names
            .get(name)
            .filter(|id| self.slots.contains_key(id))
            .ok_or_else(|| EmberError::UnknownParameterName(name.to_owned()))?;
        self.set_field_id(id, bytes)
    }

    /// As [`Self::set_field`], keyed by an interned [`Name`].
    pub fn set_field_id(&mut self, name: Name, bytes: &[u8]) -> Result<()> {
        let slot = self
            .slots
            .get_mut(&name)
            .ok_or_else(|| EmberError::UnknownParameterName(self.names.resolve(name).to_owned()))?;
        if slot.size != bytes.len() {
            return Err(EmberError::FieldSizeMismatch {
                name: self.names.resolve(name).to_owned(),
                expected: slot.size,
                got: bytes.len(),
            });
        }
        self.data[slot.offset..slot.offset + slot.size].copy_from_slice(bytes);
        slot.set = true;
        Ok(())
    }

    /// Typed write of any plain-old-data value.
    pub fn set<T: Pod>(&mut self, name: &str, value: &T) -> Result<()> {
        self.set_field(name, bytemuck::bytes_of(value))
    }

    pub fn set_mat4(&mut self, name: &str, value: &Mat4) -> Result<()> {
        self.set(name, value)
    }

    pub fn set_vec2(&mut self, name: &str, value: Vec2) -> Result<()> {
        self.set(name, &value)
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) -> Result<()> {
        self.set(name, &value)
    }

    pub fn set_vec4(&mut self, name: &str, value: Vec4) -> Result<()> {
        self.set(name, &value)
    }

    pub fn set_f32(&mut self, name: &str, value: f32) -> Result<()> {
        self.set(name, &value)
    }

    pub fn set_u32(&mut self, name: &str, value: u32) -> Result<()> {
        self.set(name, &value)
    }

    /// The bytes of a written field, `None` if absent or never set.
    #[must_use]
    pub fn field_bytes(&self, name: Name) -> Option<&[u8]> {
        let slot = self.slots.get(&name)?;
        slot.set
            .then(|| &self.data[slot.offset..slot.offset + slot.size])
    }

    /// Binds a texture view to the named slot. Hard error on unknown names.
    pub fn bind_texture(&mut self, name: &str, view: &wgpu::TextureView) -> Result<()> {
        let id = self
            .names
            .get(name)
            .ok_or_else(|| EmberError::UnknownParameterName(name.to_owned()))?;
        let slot = self
            .textures
            .iter_mut()
            .find(|(n, _)| *n == id)
            .ok_or_else(|| EmberError::UnknownParameterName(name.to_owned()))?;
        slot.1 = Some(view.clone());
        Ok(())
    }

    /// Binds a sampler to the named slot. Hard error on unknown names.
    pub fn bind_sampler(&mut self, name: &str, sampler: &wgpu::Sampler) -> Result<()> {
        let id = self
            .names
            .get(name)
            .ok_or_else(|| EmberError::UnknownParameterName(name.to_owned()))?;
        let slot = self
            .samplers
            .iter_mut()
            .find(|(n, _)| *n == id)
            .ok_or_else(|| EmberError::UnknownParameterName(name.to_owned()))?;
        slot.1 = Some(sampler.clone());
        Ok(())
    }

    /// Merges every written value into `core` by name. Values the shader
    /// does not declare (or declares at a different size) are skipped.
    ///
    /// The block and the core must share a [`NameRegistry`]; merge keys are
    /// interned symbols, not strings.
    pub fn apply_to(&self, core: &mut ShaderCore) {
        for (name, slot) in &self.slots {
            if slot.set {
                core.try_write_field(*name, &self.data[slot.offset..slot.offset + slot.size]);
            }
        }
        for (name, view) in &self.textures {
            if let Some(view) = view {
                core.try_bind_texture(*name, view);
            }
        }
        for (name, sampler) in &self.samplers {
            if let Some(sampler) = sampler {
                core.try_bind_sampler(*name, sampler);
            }
        }
    }
}
