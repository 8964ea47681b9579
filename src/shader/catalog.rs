//! Shader Catalog and Cores
//!
//! A [`ShaderCore`] owns everything one compiled shader needs at draw time:
//! its reflected layout, a CPU mirror of the uniform block, the bound texture
//! and sampler resources, and lazily-created GPU objects (module, bind group
//! layout, buffer, bind group). Writes go by interned [`Name`]; a direct
//! write to an unknown name is a hard error, while the `try_` variants used
//! by name-keyed merges skip silently.
//!
//! Uniform uploads go through a per-core [`UniformRing`]: every refresh with
//! a dirty mirror claims a fresh aligned slot in the ring buffer and the bind
//! group is set with that slot's dynamic offset, so draws recorded earlier in
//! the frame's encoder keep the values they were recorded with. The ring is
//! rewound once per frame through [`ShaderCatalog::begin_frame`].
//!
//! The [`ShaderCatalog`] is the owning registry. Handles are plain indices
//! into it, valid for its whole lifetime (cores are never removed).

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::errors::{EmberError, Result};
use crate::names::{Name, NameRegistry};
use crate::shader::reflection::{self, ShaderReflection, StageKind};

/// Index of a core inside its [`ShaderCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(u32);

impl ShaderHandle {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldSpan {
    offset: usize,
    size: usize,
}

/// Slot allocator for per-draw uniform uploads.
///
/// Each draw that dirties a core's mirror claims the next slot, sized to the
/// uniform block rounded up to the device's dynamic-offset alignment. Pure
/// bookkeeping; the backing `wgpu::Buffer` lives beside it in the core.
#[derive(Debug, Clone, Copy)]
pub struct UniformRing {
    slot_size: u64,
    capacity: u64,
    cursor: u64,
}

impl UniformRing {
    const INITIAL_SLOTS: u64 = 64;

    /// `size` is the uniform block's byte size, `alignment` the device's
    /// `min_uniform_buffer_offset_alignment`.
    #[must_use]
    pub fn new(size: u32, alignment: u32) -> Self {
        let align = u64::from(alignment.max(1));
        let slot_size = u64::from(size).div_ceil(align) * align;
        Self {
            slot_size,
            capacity: slot_size * Self::INITIAL_SLOTS,
            cursor: 0,
        }
    }

    #[must_use]
    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    /// Byte size the backing buffer must have.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Claims the next slot, returning its byte offset plus `true` when the
    /// backing buffer must be recreated at the doubled capacity. On growth
    /// the ring rewinds into the fresh buffer; slots already recorded stay
    /// valid in the old one until the frame's commands finish.
    pub fn allocate(&mut self) -> (u64, bool) {
        if self.cursor + self.slot_size > self.capacity {
            self.capacity *= 2;
            self.cursor = self.slot_size;
            return (0, true);
        }
        let offset = self.cursor;
        self.cursor += self.slot_size;
        (offset, false)
    }

    /// Rewinds to the front of the buffer. Called once per frame; slots are
    /// reused, so a queue submission must separate frames.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Replaces `slot` only when `value` differs, reporting whether it changed.
fn replace_if_changed<T: Clone + PartialEq>(slot: &mut Option<T>, value: &T) -> bool {
    if slot.as_ref() == Some(value) {
        return false;
    }
    *slot = Some(value.clone());
    true
}

#[derive(Debug)]
struct TextureBinding {
    name: Name,
    binding: u32,
    dimension: wgpu::TextureViewDimension,
    sample_type: wgpu::TextureSampleType,
    view: Option<wgpu::TextureView>,
}

#[derive(Debug)]
struct SamplerBinding {
    name: Name,
    binding: u32,
    comparison: bool,
    sampler: Option<wgpu::Sampler>,
}

/// GPU-side objects of a core, created on first [`ShaderCore::prepare`].
#[derive(Debug)]
struct GpuShader {
    module: wgpu::ShaderModule,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
}

/// One loaded shader: reflected layout plus live parameter state.
#[derive(Debug)]
pub struct ShaderCore {
    label: String,
    source: String,
    names: NameRegistry,
    reflection: ShaderReflection,
    fields: FxHashMap<Name, FieldSpan>,
    /// CPU mirror of the uniform block, uploaded whole into a ring slot
    /// when dirty.
    mirror: Vec<u8>,
    mirror_dirty: bool,
    textures: Vec<TextureBinding>,
    samplers: Vec<SamplerBinding>,
    bindings_dirty: bool,
    ring: Option<UniformRing>,
    /// Offset of the slot holding the most recent upload.
    dynamic_offset: u32,
    gpu: Option<GpuShader>,
}

impl ShaderCore {
    /// Reflects `source` and builds the name-keyed catalog for it.
    pub fn new(names: NameRegistry, label: &str, source: &str) -> Result<Self> {
        let reflection = reflection::reflect_wgsl(source)?;

        let mut fields = FxHashMap::default();
        for f in &reflection.fields {
            fields.insert(
                names.intern(&f.name),
                FieldSpan {
                    offset: f.offset as usize,
                    size: f.size as usize,
                },
            );
        }
        let textures = reflection
            .textures
            .iter()
            .map(|t| TextureBinding {
                name: names.intern(&t.name),
                binding: t.binding,
                dimension: t.dimension,
                sample_type: t.sample_type,
                view: None,
            })
            .collect();
        let samplers = reflection
            .samplers
            .iter()
            .map(|s| SamplerBinding {
                name: names.intern(&s.name),
                binding: s.binding,
                comparison: s.comparison,
                sampler: None,
            })
            .collect();

        let mirror = vec![0u8; reflection.uniform_size as usize];
        Ok(Self {
            label: label.to_owned(),
            source: source.to_owned(),
            names,
            reflection,
            fields,
            mirror,
            mirror_dirty: false,
            textures,
            samplers,
            bindings_dirty: true,
            ring: None,
            dynamic_offset: 0,
            gpu: None,
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    #[must_use]
    pub fn stage(&self) -> StageKind {
        self.reflection.stage
    }

    #[must_use]
    pub fn has_field(&self, name: Name) -> bool {
        self.fields.contains_key(&name)
    }

    // ========================================================================
    // Parameter writes
    // ========================================================================

    /// Writes `bytes` into the named uniform field. Unknown names and size
    /// mismatches are hard errors.
    pub fn write_field(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let id = self
            .names
            .get(name)
            .filter(|id| self.fields.contains_key(id))
            .ok_or_else(|| EmberError::UnknownParameterName(name.to_owned()))?;
        self.write_field_id(id, bytes)
    }

    /// As [`Self::write_field`], keyed by an interned [`Name`].
    pub fn write_field_id(&mut self, name: Name, bytes: &[u8]) -> Result<()> {
        let span = *self
            .fields
            .get(&name)
            .ok_or_else(|| EmberError::UnknownParameterName(self.names.resolve(name).to_owned()))?;
        if span.size != bytes.len() {
            return Err(EmberError::FieldSizeMismatch {
                name: self.names.resolve(name).to_owned(),
                expected: span.size,
                got: bytes.len(),
            });
        }
        self.mirror[span.offset..span.offset + span.size].copy_from_slice(bytes);
        self.mirror_dirty = true;
        Ok(())
    }

    /// Merge-style write: skips silently when this shader has no such field.
    /// Returns whether the field was written.
    pub fn try_write_field(&mut self, name: Name, bytes: &[u8]) -> bool {
        let Some(span) = self.fields.get(&name).copied() else {
            return false;
        };
        if span.size != bytes.len() {
            log::debug!(
                "skipping merge into '{}': field '{}' is {} bytes, payload {}",
                self.label,
                self.names.resolve(name),
                span.size,
                bytes.len()
            );
            return false;
        }
        self.mirror[span.offset..span.offset + span.size].copy_from_slice(bytes);
        self.mirror_dirty = true;
        true
    }

    /// Raw view of the mirrored uniform block.
    #[must_use]
    pub fn mirror_bytes(&self) -> &[u8] {
        &self.mirror
    }

    // ========================================================================
    // Resource binds
    // ========================================================================

    /// Binds a texture view to the named slot. Unknown names are hard errors.
    pub fn bind_texture(&mut self, name: &str, view: &wgpu::TextureView) -> Result<()> {
        let id = self
            .names
            .get(name)
            .ok_or_else(|| EmberError::UnknownParameterName(name.to_owned()))?;
        if !self.try_bind_texture(id, view) {
            return Err(EmberError::UnknownParameterName(name.to_owned()));
        }
        Ok(())
    }

    /// Merge-style texture bind; returns whether the slot exists. Rebinding
    /// the identical view does not dirty the bind group.
    pub fn try_bind_texture(&mut self, name: Name, view: &wgpu::TextureView) -> bool {
        let Some(slot) = self.textures.iter_mut().find(|t| t.name == name) else {
            return false;
        };
        if replace_if_changed(&mut slot.view, view) {
            self.bindings_dirty = true;
        }
        true
    }

    /// Binds a sampler to the named slot. Unknown names are hard errors.
    pub fn bind_sampler(&mut self, name: &str, sampler: &wgpu::Sampler) -> Result<()> {
        let id = self
            .names
            .get(name)
            .ok_or_else(|| EmberError::UnknownParameterName(name.to_owned()))?;
        if !self.try_bind_sampler(id, sampler) {
            return Err(EmberError::UnknownParameterName(name.to_owned()));
        }
        Ok(())
    }

    /// Merge-style sampler bind; returns whether the slot exists. Rebinding
    /// the identical sampler does not dirty the bind group.
    pub fn try_bind_sampler(&mut self, name: Name, sampler: &wgpu::Sampler) -> bool {
        let Some(slot) = self.samplers.iter_mut().find(|s| s.name == name) else {
            return false;
        };
        if replace_if_changed(&mut slot.sampler, sampler) {
            self.bindings_dirty = true;
        }
        true
    }

    // ========================================================================
    // GPU state
    // ========================================================================

    /// Creates the module, bind group layout, and uniform buffer. Idempotent.
    pub fn prepare(&mut self, device: &wgpu::Device) {
        if self.gpu.is_some() {
            return;
        }

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&self.label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&self.source)),
        });

        let visibility = self.reflection.stage.visibility();
        let mut entries = Vec::new();
        if let Some(binding) = self.reflection.uniform_binding {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(u64::from(
                        self.reflection.uniform_size,
                    )),
                },
                count: None,
            });
        }
        for t in &self.textures {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: t.binding,
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type: t.sample_type,
                    view_dimension: t.dimension,
                    multisampled: false,
                },
                count: None,
            });
        }
        for s in &self.samplers {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: s.binding,
                visibility,
                ty: wgpu::BindingType::Sampler(if s.comparison {
                    wgpu::SamplerBindingType::Comparison
                } else {
                    wgpu::SamplerBindingType::Filtering
                }),
                count: None,
            });
        }

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&self.label),
            entries: &entries,
        });

        let uniform_buffer = (self.reflection.uniform_size > 0).then(|| {
            let ring = UniformRing::new(
                self.reflection.uniform_size,
                device.limits().min_uniform_buffer_offset_alignment,
            );
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size: ring.capacity(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.ring = Some(ring);
            buffer
        });
        self.mirror_dirty = !self.mirror.is_empty();

        self.gpu = Some(GpuShader {
            module,
            layout,
            uniform_buffer,
            bind_group: None,
        });
    }

    /// Uploads the dirty mirror and (re)builds the bind group when resource
    /// bindings changed. Every declared slot must be bound by now.
    pub fn refresh(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<()> {
        self.prepare(device);
        let Some(gpu) = self.gpu.as_mut() else {
            unreachable!("prepare always installs gpu state");
        };

        if self.mirror_dirty {
            if gpu.uniform_buffer.is_some() {
                let Some(ring) = self.ring.as_mut() else {
                    unreachable!("a core with a uniform buffer always has a ring");
                };
                let (offset, grew) = ring.allocate();
                if grew {
                    log::debug!(
                        "growing uniform ring for '{}' to {} bytes",
                        self.label,
                        ring.capacity()
                    );
                    gpu.uniform_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(&self.label),
                        size: ring.capacity(),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    }));
                    self.bindings_dirty = true;
                }
                if let Some(buffer) = &gpu.uniform_buffer {
                    queue.write_buffer(buffer, offset, &self.mirror);
                }
                self.dynamic_offset = offset as u32;
            }
            self.mirror_dirty = false;
        }

        if !self.bindings_dirty && gpu.bind_group.is_some() {
            return Ok(());
        }

        let mut entries = Vec::new();
        if let (Some(binding), Some(buffer)) =
            (self.reflection.uniform_binding, &gpu.uniform_buffer)
        {
            // One block-sized window into the ring, positioned per draw by
            // the dynamic offset at setup.
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(u64::from(self.reflection.uniform_size)),
                }),
            });
        }
        for t in &self.textures {
            let view = t.view.as_ref().ok_or_else(|| {
                EmberError::MissingResourceBinding(self.names.resolve(t.name).to_owned())
            })?;
            entries.push(wgpu::BindGroupEntry {
                binding: t.binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        for s in &self.samplers {
            let sampler = s.sampler.as_ref().ok_or_else(|| {
                EmberError::MissingResourceBinding(self.names.resolve(s.name).to_owned())
            })?;
            entries.push(wgpu::BindGroupEntry {
                binding: s.binding,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        gpu.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&self.label),
            layout: &gpu.layout,
            entries: &entries,
        }));
        self.bindings_dirty = false;
        Ok(())
    }

    /// Sets this core's bind group at its declared group index, with the
    /// dynamic offset of the most recently uploaded uniform slot.
    /// [`Self::refresh`] must have succeeded this frame.
    pub fn setup(&self, rpass: &mut wgpu::RenderPass<'_>) -> Result<()> {
        let gpu = self.gpu.as_ref();
        let bind_group = gpu.and_then(|g| g.bind_group.as_ref()).ok_or_else(|| {
            EmberError::MissingResourceBinding(format!(
                "shader '{}' was not refreshed before setup",
                self.label
            ))
        })?;
        let offsets = [self.dynamic_offset];
        let offsets: &[wgpu::DynamicOffset] =
            if gpu.is_some_and(|g| g.uniform_buffer.is_some()) {
                &offsets
            } else {
                &[]
            };
        rpass.set_bind_group(self.reflection.group, bind_group, offsets);
        Ok(())
    }

    /// Rewinds the per-draw uniform ring and forces a fresh upload on the
    /// next refresh. Called once per frame, before recording; ring slots are
    /// reused, so a queue submission must separate frames.
    pub fn begin_frame(&mut self) {
        if let Some(ring) = self.ring.as_mut() {
            ring.reset();
        }
        self.mirror_dirty = !self.mirror.is_empty();
    }

    /// The compiled module, once prepared.
    #[must_use]
    pub fn module(&self) -> Option<&wgpu::ShaderModule> {
        self.gpu.as_ref().map(|g| &g.module)
    }

    /// The bind group layout, once prepared.
    #[must_use]
    pub fn bind_group_layout(&self) -> Option<&wgpu::BindGroupLayout> {
        self.gpu.as_ref().map(|g| &g.layout)
    }
}

/// Owning registry of every loaded [`ShaderCore`].
#[derive(Debug)]
pub struct ShaderCatalog {
    names: NameRegistry,
    cores: Vec<ShaderCore>,
}

impl ShaderCatalog {
    #[must_use]
    pub fn new(names: NameRegistry) -> Self {
        Self {
            names,
            cores: Vec::new(),
        }
    }

    #[must_use]
    pub fn names(&self) -> &NameRegistry {
        &self.names
    }

    /// Reflects and registers a WGSL shader, returning its handle.
    pub fn load(&mut self, label: &str, source: &str) -> Result<ShaderHandle> {
        let core = ShaderCore::new(self.names.clone(), label, source)?;
        let handle = ShaderHandle(u32::try_from(self.cores.len()).unwrap_or(u32::MAX));
        log::debug!(
            "loaded shader '{label}' ({:?}, {} fields, {} textures, {} samplers)",
            core.stage(),
            core.reflection().fields.len(),
            core.reflection().textures.len(),
            core.reflection().samplers.len()
        );
        self.cores.push(core);
        Ok(handle)
    }

    #[must_use]
    pub fn core(&self, handle: ShaderHandle) -> &ShaderCore {
        &self.cores[handle.index()]
    }

    pub fn core_mut(&mut self, handle: ShaderHandle) -> &mut ShaderCore {
        &mut self.cores[handle.index()]
    }

    /// Mutable access to two distinct cores at once (vertex + fragment of the
    /// same pass).
    pub fn pair_mut(
        &mut self,
        a: ShaderHandle,
        b: ShaderHandle,
    ) -> (&mut ShaderCore, &mut ShaderCore) {
        let (a, b) = (a.index(), b.index());
        assert_ne!(a, b, "pair_mut requires distinct handles");
        if a < b {
            let (lo, hi) = self.cores.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.cores.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    /// Rewinds every core's per-draw uniform ring. Call once per frame.
    pub fn begin_frame(&mut self) {
        for core in &mut self.cores {
            core.begin_frame();
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ShaderCore> {
        self.cores.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}
