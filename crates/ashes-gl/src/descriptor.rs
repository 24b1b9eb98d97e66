//! Descriptor set layouts, pools and sets.
//!
//! GL has no descriptor sets, so binding them replays as a walk over the
//! set's stored resources: sampled images land on texture units, storage
//! images on image units, buffers on indexed binding points. The flat
//! unit assignment comes from the pipeline layout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use ashes_api::{
    DescriptorPoolSize, DescriptorSetLayoutBinding, DescriptorType, Error, Result, WHOLE_SIZE,
};

use crate::buffer::{Buffer, BufferView};
use crate::context::ContextLock;
use crate::convert;
use crate::device::DeviceShared;
use crate::image::ImageView;
use crate::pipeline::{FlatBinding, PipelineLayout};
use crate::registry::{ObjectId, ObjectKind};
use crate::sampler::Sampler;

// ── Layouts ───────────────────────────────────────────────────────

pub(crate) struct DescriptorSetLayoutShared {
    device: Weak<DeviceShared>,
    bindings: Vec<DescriptorSetLayoutBinding>,
    id: ObjectId,
}

impl Drop for DescriptorSetLayoutShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::DescriptorSetLayout);
        }
    }
}

#[derive(Clone)]
pub struct DescriptorSetLayout {
    shared: Arc<DescriptorSetLayoutShared>,
}

impl DescriptorSetLayout {
    pub(crate) fn new(
        device: &Arc<DeviceShared>,
        mut bindings: Vec<DescriptorSetLayoutBinding>,
    ) -> Result<Self> {
        bindings.sort_by_key(|b| b.binding);
        for pair in bindings.windows(2) {
            if pair[0].binding == pair[1].binding {
                return Err(Error::Validation(format!(
                    "duplicate descriptor binding {}",
                    pair[0].binding
                )));
            }
        }
        if bindings.iter().any(|b| b.descriptor_count == 0) {
            return Err(Error::Validation("descriptor count must be nonzero".into()));
        }
        Ok(Self {
            shared: Arc::new(DescriptorSetLayoutShared {
                device: Arc::downgrade(device),
                bindings,
                id: device.registry.register(ObjectKind::DescriptorSetLayout),
            }),
        })
    }

    /// Bindings sorted by binding number.
    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.shared.bindings
    }

    pub(crate) fn binding(&self, binding: u32) -> Option<&DescriptorSetLayoutBinding> {
        self.shared
            .bindings
            .binary_search_by_key(&binding, |b| b.binding)
            .ok()
            .map(|i| &self.shared.bindings[i])
    }

    /// Dynamic-offset bindings in binding order; the offset list consumed at
    /// bind time follows this order.
    pub(crate) fn dynamic_count(&self) -> usize {
        self.shared
            .bindings
            .iter()
            .filter(|b| b.descriptor_type.is_dynamic())
            .count()
    }
}

// ── Pools ─────────────────────────────────────────────────────────

struct PoolBudget {
    sets: u32,
    by_type: HashMap<DescriptorType, u32>,
}

pub(crate) struct DescriptorPoolShared {
    device: Weak<DeviceShared>,
    budget: Mutex<PoolBudget>,
    epoch: AtomicU64,
    id: ObjectId,
}

impl Drop for DescriptorPoolShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::DescriptorPool);
        }
    }
}

#[derive(Clone)]
pub struct DescriptorPool {
    shared: Arc<DescriptorPoolShared>,
}

impl DescriptorPool {
    pub(crate) fn new(
        device: &Arc<DeviceShared>,
        max_sets: u32,
        sizes: Vec<DescriptorPoolSize>,
    ) -> Result<Self> {
        if max_sets == 0 {
            return Err(Error::Validation("pool must hold at least one set".into()));
        }
        let mut by_type = HashMap::new();
        for size in sizes {
            *by_type.entry(size.ty).or_insert(0) += size.descriptor_count;
        }
        Ok(Self {
            shared: Arc::new(DescriptorPoolShared {
                device: Arc::downgrade(device),
                budget: Mutex::new(PoolBudget {
                    sets: max_sets,
                    by_type,
                }),
                epoch: AtomicU64::new(0),
                id: device.registry.register(ObjectKind::DescriptorPool),
            }),
        })
    }

    pub fn allocate(&self, layout: &DescriptorSetLayout) -> Result<DescriptorSet> {
        let device = self
            .shared
            .device
            .upgrade()
            .ok_or_else(|| Error::DeviceLost("device destroyed before allocation".into()))?;
        {
            let mut budget = self.shared.budget.lock();
            if budget.sets == 0 {
                return Err(Error::TooManyObjects("descriptor sets in pool"));
            }
            for binding in layout.bindings() {
                let available = budget
                    .by_type
                    .get(&binding.descriptor_type)
                    .copied()
                    .unwrap_or(0);
                if available < binding.descriptor_count {
                    return Err(Error::FragmentedPool("descriptor type budget exhausted"));
                }
            }
            budget.sets -= 1;
            for binding in layout.bindings() {
                if let Some(count) = budget.by_type.get_mut(&binding.descriptor_type) {
                    *count -= binding.descriptor_count;
                }
            }
        }
        Ok(DescriptorSet {
            shared: Arc::new(DescriptorSetShared {
                device: Arc::downgrade(&device),
                pool: Arc::downgrade(&self.shared),
                epoch: self.shared.epoch.load(Ordering::Acquire),
                layout: layout.clone(),
                resources: Mutex::new(HashMap::new()),
                id: device.registry.register(ObjectKind::DescriptorSet),
            }),
        })
    }

    /// Return the whole budget to the pool. Sets allocated before the reset
    /// keep their resources but no longer count against it.
    pub fn reset(&self, max_sets: u32, sizes: Vec<DescriptorPoolSize>) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);
        let mut by_type = HashMap::new();
        for size in sizes {
            *by_type.entry(size.ty).or_insert(0) += size.descriptor_count;
        }
        *self.shared.budget.lock() = PoolBudget {
            sets: max_sets,
            by_type,
        };
    }
}

// ── Sets ──────────────────────────────────────────────────────────

/// One write into a descriptor set.
#[derive(Clone)]
pub enum WriteDescriptor {
    Sampler {
        binding: u32,
        sampler: Sampler,
    },
    CombinedImageSampler {
        binding: u32,
        view: ImageView,
        sampler: Sampler,
    },
    SampledImage {
        binding: u32,
        view: ImageView,
    },
    StorageImage {
        binding: u32,
        view: ImageView,
    },
    UniformTexelBuffer {
        binding: u32,
        view: BufferView,
    },
    StorageTexelBuffer {
        binding: u32,
        view: BufferView,
    },
    UniformBuffer {
        binding: u32,
        buffer: Buffer,
        offset: u64,
        range: u64,
    },
    StorageBuffer {
        binding: u32,
        buffer: Buffer,
        offset: u64,
        range: u64,
    },
    UniformBufferDynamic {
        binding: u32,
        buffer: Buffer,
        offset: u64,
        range: u64,
    },
    StorageBufferDynamic {
        binding: u32,
        buffer: Buffer,
        offset: u64,
        range: u64,
    },
    InputAttachment {
        binding: u32,
        view: ImageView,
    },
}

impl WriteDescriptor {
    fn binding(&self) -> u32 {
        match self {
            WriteDescriptor::Sampler { binding, .. }
            | WriteDescriptor::CombinedImageSampler { binding, .. }
            | WriteDescriptor::SampledImage { binding, .. }
            | WriteDescriptor::StorageImage { binding, .. }
            | WriteDescriptor::UniformTexelBuffer { binding, .. }
            | WriteDescriptor::StorageTexelBuffer { binding, .. }
            | WriteDescriptor::UniformBuffer { binding, .. }
            | WriteDescriptor::StorageBuffer { binding, .. }
            | WriteDescriptor::UniformBufferDynamic { binding, .. }
            | WriteDescriptor::StorageBufferDynamic { binding, .. }
            | WriteDescriptor::InputAttachment { binding, .. } => *binding,
        }
    }

    fn descriptor_type(&self) -> DescriptorType {
        match self {
            WriteDescriptor::Sampler { .. } => DescriptorType::Sampler,
            WriteDescriptor::CombinedImageSampler { .. } => DescriptorType::CombinedImageSampler,
            WriteDescriptor::SampledImage { .. } => DescriptorType::SampledImage,
            WriteDescriptor::StorageImage { .. } => DescriptorType::StorageImage,
            WriteDescriptor::UniformTexelBuffer { .. } => DescriptorType::UniformTexelBuffer,
            WriteDescriptor::StorageTexelBuffer { .. } => DescriptorType::StorageTexelBuffer,
            WriteDescriptor::UniformBuffer { .. } => DescriptorType::UniformBuffer,
            WriteDescriptor::StorageBuffer { .. } => DescriptorType::StorageBuffer,
            WriteDescriptor::UniformBufferDynamic { .. } => DescriptorType::UniformBufferDynamic,
            WriteDescriptor::StorageBufferDynamic { .. } => DescriptorType::StorageBufferDynamic,
            WriteDescriptor::InputAttachment { .. } => DescriptorType::InputAttachment,
        }
    }
}

pub(crate) struct DescriptorSetShared {
    device: Weak<DeviceShared>,
    pool: Weak<DescriptorPoolShared>,
    epoch: u64,
    layout: DescriptorSetLayout,
    resources: Mutex<HashMap<u32, WriteDescriptor>>,
    id: ObjectId,
}

impl Drop for DescriptorSetShared {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            if pool.epoch.load(Ordering::Acquire) == self.epoch {
                let mut budget = pool.budget.lock();
                budget.sets += 1;
                for binding in self.layout.bindings() {
                    *budget.by_type.entry(binding.descriptor_type).or_insert(0) +=
                        binding.descriptor_count;
                }
            }
        }
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::DescriptorSet);
        }
    }
}

#[derive(Clone)]
pub struct DescriptorSet {
    shared: Arc<DescriptorSetShared>,
}

impl DescriptorSet {
    pub fn layout(&self) -> &DescriptorSetLayout {
        &self.shared.layout
    }

    /// Store writes. Each write must name a binding the layout declares,
    /// with a matching descriptor type.
    pub fn update(&self, writes: Vec<WriteDescriptor>) -> Result<()> {
        let mut resources = self.shared.resources.lock();
        for write in writes {
            let binding = write.binding();
            let declared = self.shared.layout.binding(binding).ok_or_else(|| {
                Error::Validation(format!("write to undeclared binding {}", binding))
            })?;
            if declared.descriptor_type != write.descriptor_type() {
                return Err(Error::Validation(format!(
                    "binding {} is {:?}, write is {:?}",
                    binding,
                    declared.descriptor_type,
                    write.descriptor_type()
                )));
            }
            resources.insert(binding, write);
        }
        Ok(())
    }

    pub(crate) fn dynamic_count(&self) -> usize {
        self.shared.layout.dynamic_count()
    }

    /// Replay this set's bindings through the flat assignment the pipeline
    /// layout computed for `set_index`. Returns true when any texture unit
    /// was touched.
    pub(crate) fn apply(
        &self,
        lock: &mut ContextLock<'_>,
        layout: &PipelineLayout,
        set_index: u32,
        dynamic_offsets: &mut impl Iterator<Item = u32>,
    ) -> bool {
        let resources = self.shared.resources.lock();
        let mut bindings: Vec<_> = resources.iter().collect();
        bindings.sort_by_key(|(binding, _)| **binding);

        let mut touched_textures = false;
        for (&binding, write) in bindings {
            let Some(flat) = layout.flat_binding(set_index, binding) else {
                debug!(
                    "descriptor (set {}, binding {}) has no slot in the bound layout",
                    set_index, binding
                );
                continue;
            };
            match (flat, write) {
                (FlatBinding::TextureUnit(unit), WriteDescriptor::CombinedImageSampler { view, sampler, .. }) => {
                    lock.bind_texture_unit(unit, view.gl_target(), view.gl_name());
                    lock.bind_sampler_unit(unit, sampler.gl_name());
                    touched_textures = true;
                }
                (FlatBinding::TextureUnit(unit), WriteDescriptor::SampledImage { view, .. })
                | (FlatBinding::TextureUnit(unit), WriteDescriptor::InputAttachment { view, .. }) => {
                    lock.bind_texture_unit(unit, view.gl_target(), view.gl_name());
                    lock.bind_sampler_unit(unit, 0);
                    touched_textures = true;
                }
                (FlatBinding::TextureUnit(unit), WriteDescriptor::Sampler { sampler, .. }) => {
                    lock.bind_sampler_unit(unit, sampler.gl_name());
                }
                (FlatBinding::TextureUnit(unit), WriteDescriptor::UniformTexelBuffer { view, .. })
                | (FlatBinding::TextureUnit(unit), WriteDescriptor::StorageTexelBuffer { view, .. }) => {
                    lock.bind_texture_unit(unit, glow::TEXTURE_BUFFER, view.gl_name());
                    lock.bind_sampler_unit(unit, 0);
                    touched_textures = true;
                }
                (FlatBinding::ImageUnit(unit), WriteDescriptor::StorageImage { view, .. }) => {
                    let layered = view.layer_count() > 1;
                    lock.gl.bind_image_texture(
                        unit,
                        view.gl_name(),
                        view.base_mip_level() as i32,
                        layered,
                        view.base_array_layer() as i32,
                        glow::READ_WRITE,
                        convert::format_info(view.format()).internal,
                    );
                }
                (FlatBinding::UniformIndex(index), WriteDescriptor::UniformBuffer { buffer, offset, range, .. }) => {
                    bind_buffer_slot(lock, glow::UNIFORM_BUFFER, index, buffer, *offset, *range);
                }
                (FlatBinding::UniformIndex(index), WriteDescriptor::UniformBufferDynamic { buffer, offset, range, .. }) => {
                    let dynamic = dynamic_offsets.next().unwrap_or(0) as u64;
                    bind_buffer_slot(lock, glow::UNIFORM_BUFFER, index, buffer, *offset + dynamic, *range);
                }
                (FlatBinding::StorageIndex(index), WriteDescriptor::StorageBuffer { buffer, offset, range, .. }) => {
                    bind_buffer_slot(lock, glow::SHADER_STORAGE_BUFFER, index, buffer, *offset, *range);
                }
                (FlatBinding::StorageIndex(index), WriteDescriptor::StorageBufferDynamic { buffer, offset, range, .. }) => {
                    let dynamic = dynamic_offsets.next().unwrap_or(0) as u64;
                    bind_buffer_slot(lock, glow::SHADER_STORAGE_BUFFER, index, buffer, *offset + dynamic, *range);
                }
                _ => {
                    debug!(
                        "descriptor (set {}, binding {}) does not match its layout slot",
                        set_index, binding
                    );
                }
            }
        }
        touched_textures
    }

    /// Texture units and targets this set occupies under `layout`, used to
    /// schedule the after-submit unbinds that restore a clean context.
    pub(crate) fn sampled_units(&self, layout: &PipelineLayout, set_index: u32) -> Vec<(u32, u32)> {
        let resources = self.shared.resources.lock();
        let mut units = Vec::new();
        for (&binding, write) in resources.iter() {
            let Some(FlatBinding::TextureUnit(unit)) = layout.flat_binding(set_index, binding)
            else {
                continue;
            };
            let target = match write {
                WriteDescriptor::CombinedImageSampler { view, .. }
                | WriteDescriptor::SampledImage { view, .. }
                | WriteDescriptor::InputAttachment { view, .. } => view.gl_target(),
                WriteDescriptor::UniformTexelBuffer { .. }
                | WriteDescriptor::StorageTexelBuffer { .. } => glow::TEXTURE_BUFFER,
                _ => continue,
            };
            units.push((unit, target));
        }
        units.sort_unstable();
        units
    }
}

fn bind_buffer_slot(
    lock: &mut ContextLock<'_>,
    target: u32,
    index: u32,
    buffer: &Buffer,
    offset: u64,
    range: u64,
) {
    let size = if range == WHOLE_SIZE {
        buffer.size().saturating_sub(offset)
    } else {
        range
    };
    lock.set_buffer_range(target, index, buffer.gl_name(), offset as i32, size as i32);
}
