//! Buffer objects and texel buffer views.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use ashes_api::{
    AccessFlags, BufferCreateInfo, BufferUsageFlags, Error, Format, MemoryPropertyFlags, Result,
    QUEUE_FAMILY_IGNORED, WHOLE_SIZE,
};

use crate::context::ContextLock;
use crate::convert;
use crate::device::DeviceShared;
use crate::registry::{ObjectId, ObjectKind};
use crate::state::SCRATCH_UNIT;

/// Buffer-scoped memory dependency, produced by the barrier builders and
/// consumed by `pipeline_barrier`.
#[derive(Clone)]
pub struct BufferMemoryBarrier {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub buffer: Buffer,
    pub offset: u64,
    pub size: u64,
}

pub(crate) struct BufferShared {
    device: Weak<DeviceShared>,
    name: u32,
    size: u64,
    usage: BufferUsageFlags,
    memory: MemoryPropertyFlags,
    access: Mutex<AccessFlags>,
    id: ObjectId,
}

impl BufferShared {
    fn device(&self) -> Option<Arc<DeviceShared>> {
        self.device.upgrade()
    }
}

impl Drop for BufferShared {
    fn drop(&mut self) {
        match self.device.upgrade() {
            Some(device) => {
                {
                    let mut lock = device.lock();
                    lock.forget_buffer(self.name);
                    lock.gl.delete_buffer(self.name);
                }
                device.registry.unregister(self.id, ObjectKind::Buffer);
                debug!("destroyed buffer {}", self.name);
            }
            None => debug!("buffer {} outlived its device, skipping GL teardown", self.name),
        }
    }
}

/// A GL buffer object. Handles are cheap clones of one underlying object.
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<BufferShared>,
}

impl Buffer {
    pub(crate) fn new(device: &Arc<DeviceShared>, info: &BufferCreateInfo) -> Result<Self> {
        if info.size == 0 {
            return Err(Error::Validation("buffer size must be nonzero".into()));
        }
        let byte_size = i32::try_from(info.size).map_err(|_| {
            Error::OutOfDeviceMemory(format!("{} bytes exceeds the backend limit", info.size))
        })?;
        let host_visible = info.memory.contains(MemoryPropertyFlags::HOST_VISIBLE);
        let download = host_visible
            && info.usage.contains(BufferUsageFlags::TRANSFER_DST)
            && !info.usage.intersects(
                BufferUsageFlags::VERTEX_BUFFER
                    | BufferUsageFlags::INDEX_BUFFER
                    | BufferUsageFlags::UNIFORM_BUFFER
                    | BufferUsageFlags::STORAGE_BUFFER
                    | BufferUsageFlags::INDIRECT_BUFFER
                    | BufferUsageFlags::UNIFORM_TEXEL_BUFFER
                    | BufferUsageFlags::STORAGE_TEXEL_BUFFER,
            );

        let name = {
            let mut lock = device.lock();
            let name = lock.gl.create_buffer();
            if name == 0 {
                return Err(Error::OutOfDeviceMemory("could not create buffer object".into()));
            }
            lock.set_buffer(glow::COPY_WRITE_BUFFER, name);
            lock.gl.buffer_data(
                glow::COPY_WRITE_BUFFER,
                byte_size,
                convert::buffer_usage_hint(host_visible, download),
            );
            name
        };
        debug!("created buffer ({} bytes): {}", info.size, name);
        Ok(Self {
            shared: Arc::new(BufferShared {
                device: Arc::downgrade(device),
                name,
                size: info.size,
                usage: info.usage,
                memory: info.memory,
                access: Mutex::new(AccessFlags::empty()),
                id: device.registry.register(ObjectKind::Buffer),
            }),
        })
    }

    pub fn size(&self) -> u64 {
        self.shared.size
    }

    pub fn usage(&self) -> BufferUsageFlags {
        self.shared.usage
    }

    pub fn is_host_visible(&self) -> bool {
        self.shared.memory.contains(MemoryPropertyFlags::HOST_VISIBLE)
    }

    pub(crate) fn gl_name(&self) -> u32 {
        self.shared.name
    }

    pub fn set_debug_name(&self, name: &str) {
        if let Some(device) = self.shared.device() {
            device.registry.set_label(self.shared.id, name);
        }
    }

    /// Map `size` bytes at `offset`. Pass [`WHOLE_SIZE`] to map to the end.
    /// The returned guard keeps no context lock; flushing and unmapping
    /// re-acquire it.
    pub fn map(&self, offset: u64, size: u64, mode: MapMode) -> Result<MappedRange<'_>> {
        let device = self
            .shared
            .device()
            .ok_or_else(|| Error::DeviceLost("device destroyed before map".into()))?;
        if !self.is_host_visible() {
            return Err(Error::MemoryMapFailed("memory is not host visible".into()));
        }
        let len = self.resolve_range(offset, size).ok_or_else(|| {
            Error::MemoryMapFailed(format!(
                "range {}+{} exceeds buffer size {}",
                offset, size, self.shared.size
            ))
        })?;
        let access = match mode {
            MapMode::Read => glow::MAP_READ_BIT,
            MapMode::Write => glow::MAP_WRITE_BIT | glow::MAP_FLUSH_EXPLICIT_BIT,
        };
        let ptr = {
            let mut lock = device.lock();
            lock.set_buffer(glow::COPY_WRITE_BUFFER, self.shared.name);
            lock.gl
                .map_buffer_range(glow::COPY_WRITE_BUFFER, offset as i32, len as i32, access)
        };
        if ptr.is_null() {
            return Err(Error::MemoryMapFailed(format!(
                "driver refused to map {} bytes at {}",
                len, offset
            )));
        }
        Ok(MappedRange {
            buffer: &self.shared,
            device,
            ptr,
            len: len as usize,
            mode,
        })
    }

    /// Immediate upload outside of command recording.
    pub fn upload(&self, offset: u64, data: &[u8]) -> Result<()> {
        let device = self
            .shared
            .device()
            .ok_or_else(|| Error::DeviceLost("device destroyed before upload".into()))?;
        if self.resolve_range(offset, data.len() as u64) != Some(data.len() as u64) {
            return Err(Error::Validation(format!(
                "upload of {} bytes at {} exceeds buffer size {}",
                data.len(),
                offset,
                self.shared.size
            )));
        }
        let mut lock = device.lock();
        lock.set_buffer(glow::COPY_WRITE_BUFFER, self.shared.name);
        lock.gl
            .buffer_sub_data(glow::COPY_WRITE_BUFFER, offset as i32, data);
        Ok(())
    }

    /// Immediate readback outside of command recording.
    pub fn download(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let device = self
            .shared
            .device()
            .ok_or_else(|| Error::DeviceLost("device destroyed before download".into()))?;
        if self.resolve_range(offset, out.len() as u64) != Some(out.len() as u64) {
            return Err(Error::Validation(format!(
                "download of {} bytes at {} exceeds buffer size {}",
                out.len(),
                offset,
                self.shared.size
            )));
        }
        let mut lock = device.lock();
        lock.set_buffer(glow::COPY_READ_BUFFER, self.shared.name);
        lock.gl
            .read_buffer_sub_data(glow::COPY_READ_BUFFER, offset as i32, out);
        Ok(())
    }

    fn resolve_range(&self, offset: u64, size: u64) -> Option<u64> {
        let len = if size == WHOLE_SIZE {
            self.shared.size.checked_sub(offset)?
        } else {
            size
        };
        let end = offset.checked_add(len)?;
        (len > 0 && end <= self.shared.size).then_some(len)
    }

    // ── Barrier builders ──────────────────────────────────────────

    /// Transition the tracked access mask to `dst_access` and describe the
    /// dependency edge.
    pub fn make_memory_transition(&self, dst_access: AccessFlags) -> BufferMemoryBarrier {
        let mut tracked = self.shared.access.lock();
        let src_access = *tracked;
        *tracked = dst_access;
        BufferMemoryBarrier {
            src_access,
            dst_access,
            src_queue_family: QUEUE_FAMILY_IGNORED,
            dst_queue_family: QUEUE_FAMILY_IGNORED,
            buffer: self.clone(),
            offset: 0,
            size: self.shared.size,
        }
    }

    pub fn make_transfer_source(&self) -> BufferMemoryBarrier {
        self.make_memory_transition(AccessFlags::TRANSFER_READ)
    }

    pub fn make_transfer_destination(&self) -> BufferMemoryBarrier {
        self.make_memory_transition(AccessFlags::TRANSFER_WRITE)
    }

    pub fn make_vertex_input(&self) -> BufferMemoryBarrier {
        self.make_memory_transition(AccessFlags::VERTEX_ATTRIBUTE_READ)
    }

    pub fn make_index_input(&self) -> BufferMemoryBarrier {
        self.make_memory_transition(AccessFlags::INDEX_READ)
    }

    pub fn make_uniform_input(&self) -> BufferMemoryBarrier {
        self.make_memory_transition(AccessFlags::UNIFORM_READ)
    }

    pub fn make_indirect_input(&self) -> BufferMemoryBarrier {
        self.make_memory_transition(AccessFlags::INDIRECT_COMMAND_READ)
    }

    pub fn make_host_read(&self) -> BufferMemoryBarrier {
        self.make_memory_transition(AccessFlags::HOST_READ)
    }

    pub fn make_host_write(&self) -> BufferMemoryBarrier {
        self.make_memory_transition(AccessFlags::HOST_WRITE)
    }
}

/// How a mapped range will be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    Read,
    Write,
}

/// Live mapping of a buffer range. Writes become visible to GL when flushed;
/// dropping the guard flushes the whole range and unmaps.
pub struct MappedRange<'a> {
    buffer: &'a BufferShared,
    device: Arc<DeviceShared>,
    ptr: *mut u8,
    len: usize,
    mode: MapMode,
}

impl MappedRange<'_> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn data(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        debug_assert_eq!(self.mode, MapMode::Write);
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Flush part of the mapping, offsets relative to the mapped start.
    pub fn flush(&self, offset: u64, size: u64) {
        if self.mode != MapMode::Write {
            return;
        }
        let len = if size == WHOLE_SIZE {
            (self.len as u64).saturating_sub(offset)
        } else {
            size.min((self.len as u64).saturating_sub(offset))
        };
        if len == 0 {
            return;
        }
        let lock = self.rebind();
        lock.gl
            .flush_mapped_range(glow::COPY_WRITE_BUFFER, offset as i32, len as i32);
    }

    fn rebind(&self) -> ContextLock<'_> {
        let mut lock = self.device.lock();
        lock.set_buffer(glow::COPY_WRITE_BUFFER, self.buffer.name);
        lock
    }
}

impl Drop for MappedRange<'_> {
    fn drop(&mut self) {
        let lock = self.rebind();
        if self.mode == MapMode::Write {
            lock.gl
                .flush_mapped_range(glow::COPY_WRITE_BUFFER, 0, self.len as i32);
        }
        lock.gl.unmap_buffer(glow::COPY_WRITE_BUFFER);
    }
}

// ── Buffer views ──────────────────────────────────────────────────

pub(crate) struct BufferViewShared {
    device: Weak<DeviceShared>,
    texture: u32,
    #[allow(dead_code)]
    buffer: Buffer,
    format: Format,
    id: ObjectId,
}

impl Drop for BufferViewShared {
    fn drop(&mut self) {
        match self.device.upgrade() {
            Some(device) => {
                {
                    let mut lock = device.lock();
                    lock.forget_texture(self.texture);
                    lock.gl.delete_texture(self.texture);
                }
                device.registry.unregister(self.id, ObjectKind::BufferView);
                debug!("destroyed buffer view {}", self.texture);
            }
            None => debug!(
                "buffer view {} outlived its device, skipping GL teardown",
                self.texture
            ),
        }
    }
}

/// Formatted view of a buffer range, backed by a `TEXTURE_BUFFER` texture.
#[derive(Clone)]
pub struct BufferView {
    shared: Arc<BufferViewShared>,
}

impl BufferView {
    pub(crate) fn new(
        device: &Arc<DeviceShared>,
        buffer: &Buffer,
        format: Format,
        offset: u64,
        range: u64,
    ) -> Result<Self> {
        if !buffer.usage().intersects(
            BufferUsageFlags::UNIFORM_TEXEL_BUFFER | BufferUsageFlags::STORAGE_TEXEL_BUFFER,
        ) {
            return Err(Error::Validation(
                "buffer was not created with texel buffer usage".into(),
            ));
        }
        let len = if range == WHOLE_SIZE {
            buffer.size().saturating_sub(offset)
        } else {
            range
        };
        let end = offset.checked_add(len);
        if len == 0 || end.map_or(true, |end| end > buffer.size()) {
            return Err(Error::Validation(format!(
                "view range {}+{} exceeds buffer size {}",
                offset,
                range,
                buffer.size()
            )));
        }
        let whole = offset == 0 && len == buffer.size();
        if !whole && !device.backend.texel_buffer_range {
            return Err(Error::FeatureNotPresent("texture buffer range"));
        }

        let internal = convert::format_info(format).internal;
        let texture = {
            let mut lock = device.lock();
            let texture = lock.gl.create_texture();
            if texture == 0 {
                return Err(Error::OutOfDeviceMemory("could not create buffer view texture".into()));
            }
            lock.bind_texture_unit(SCRATCH_UNIT, glow::TEXTURE_BUFFER, texture);
            if whole {
                lock.gl
                    .tex_buffer(glow::TEXTURE_BUFFER, internal, buffer.gl_name());
            } else {
                lock.gl.tex_buffer_range(
                    glow::TEXTURE_BUFFER,
                    internal,
                    buffer.gl_name(),
                    offset as i32,
                    len as i32,
                );
            }
            texture
        };
        debug!(
            "created buffer view of {} ({:?}, {}+{}): {}",
            buffer.gl_name(),
            format,
            offset,
            len,
            texture
        );
        Ok(Self {
            shared: Arc::new(BufferViewShared {
                device: Arc::downgrade(device),
                texture,
                buffer: buffer.clone(),
                format,
                id: device.registry.register(ObjectKind::BufferView),
            }),
        })
    }

    pub fn format(&self) -> Format {
        self.shared.format
    }

    pub(crate) fn gl_name(&self) -> u32 {
        self.shared.texture
    }
}
