//! Vertex array assembly.
//!
//! GL bakes vertex attribute pointers into vertex array objects, so each
//! distinct combination of pipeline vertex input and bound buffers gets
//! its own VAO. Command buffers cache them by [`GeometryKey`]; the GL-side
//! object is built lazily on first replay, which keeps recording free of
//! the context lock.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use ashes_api::{IndexType, PipelineVertexInputState, VertexInputRate};

use crate::context::ContextLock;
use crate::convert::{self, VertexAttribFormat};
use crate::device::DeviceShared;

/// One bound vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VertexBinding {
    pub binding: u32,
    pub buffer: u32,
    pub offset: u64,
}

/// The bound index buffer, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct IndexBinding {
    pub buffer: u32,
    pub offset: u64,
    pub index_type: IndexType,
}

/// Everything that feeds VAO construction. Two draws with equal keys can
/// share one VAO.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct GeometryKey {
    pub vertex: Vec<VertexBinding>,
    pub index: Option<IndexBinding>,
    /// Hash of the pipeline's vertex input description; a pipeline switch
    /// with a different input layout forces a fresh VAO.
    pub input_hash: u64,
}

/// A vertex/index buffer combination and the VAO that binds it. The VAO is
/// created on first [`bind`](Self::bind). Owned entries delete their VAO on
/// drop; the wrapper around the device's shared empty VAO does not.
pub struct GeometryBuffers {
    device: Weak<DeviceShared>,
    vao: Mutex<u32>,
    bindings: Vec<VertexBinding>,
    index: Option<IndexBinding>,
    /// `None` for the shared empty VAO, which is pre-built.
    input: Option<PipelineVertexInputState>,
    owns_vao: bool,
}

impl GeometryBuffers {
    /// Captures the buffer combination for a later GL-side build.
    pub(crate) fn deferred(
        device: &Arc<DeviceShared>,
        input: PipelineVertexInputState,
        key: &GeometryKey,
    ) -> Arc<Self> {
        Arc::new(Self {
            device: Arc::downgrade(device),
            vao: Mutex::new(0),
            bindings: key.vertex.clone(),
            index: key.index,
            input: Some(input),
            owns_vao: true,
        })
    }

    /// Refers to the device's shared empty indexed VAO, for draws recorded
    /// without a vertex layout. The VAO itself is resolved at bind time.
    pub(crate) fn for_empty_vao(device: &Arc<DeviceShared>) -> Arc<Self> {
        Arc::new(Self {
            device: Arc::downgrade(device),
            vao: Mutex::new(0),
            bindings: Vec::new(),
            index: None,
            input: None,
            owns_vao: false,
        })
    }

    /// Binds the VAO for drawing, building it on first use.
    pub(crate) fn bind(&self, lock: &mut ContextLock<'_>) {
        let mut vao = self.vao.lock();
        if *vao == 0 {
            match &self.input {
                Some(input) => *vao = build_vao(lock, input, &self.bindings, self.index),
                None => {
                    if let Some(device) = self.device.upgrade() {
                        let (shared_vao, _) = device.empty_indexed_vao(lock);
                        *vao = shared_vao;
                    }
                }
            }
        }
        lock.set_vertex_array(*vao);
    }

    /// The GL vertex array name, zero before the first bind.
    pub fn vao(&self) -> u32 {
        *self.vao.lock()
    }
}

impl Drop for GeometryBuffers {
    fn drop(&mut self) {
        if !self.owns_vao {
            return;
        }
        let vao = *self.vao.get_mut();
        if vao == 0 {
            return;
        }
        let Some(device) = self.device.upgrade() else {
            return;
        };
        let mut lock = device.lock();
        lock.forget_vertex_array(vao);
        lock.gl().delete_vertex_array(vao);
    }
}

/// Builds a VAO for the bound buffers per the pipeline's input layout.
/// Leaves the context with no vertex array bound.
fn build_vao(
    lock: &mut ContextLock<'_>,
    input: &PipelineVertexInputState,
    bound: &[VertexBinding],
    index: Option<IndexBinding>,
) -> u32 {
    let vao = lock.gl().create_vertex_array();
    lock.force_vertex_array(vao);
    for attribute in &input.attributes {
        let Some(binding) = input
            .bindings
            .iter()
            .find(|b| b.binding == attribute.binding)
        else {
            continue;
        };
        let Some(slot) = bound.iter().find(|v| v.binding == attribute.binding) else {
            debug!(
                "vertex binding {} has no bound buffer, skipping attribute {}",
                attribute.binding, attribute.location
            );
            continue;
        };
        lock.set_buffer(glow::ARRAY_BUFFER, slot.buffer);
        lock.gl().enable_vertex_attrib(attribute.location);
        let pointer_offset = (slot.offset + u64::from(attribute.offset)) as i32;
        match convert::vertex_attrib(attribute.format) {
            VertexAttribFormat::Float {
                size,
                data_type,
                normalized,
            } => lock.gl().vertex_attrib_pointer_f32(
                attribute.location,
                size,
                data_type,
                normalized,
                binding.stride as i32,
                pointer_offset,
            ),
            VertexAttribFormat::Integer { size, data_type } => {
                lock.gl().vertex_attrib_pointer_i32(
                    attribute.location,
                    size,
                    data_type,
                    binding.stride as i32,
                    pointer_offset,
                )
            }
        }
        if binding.input_rate == VertexInputRate::Instance {
            lock.gl().vertex_attrib_divisor(attribute.location, 1);
        }
    }
    if let Some(index) = index {
        // Element binding is VAO state, bypass the shared buffer cache.
        lock.gl().bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index.buffer);
    }
    lock.force_vertex_array(0);
    debug!(
        "built vertex array for {} attributes: {}",
        input.attributes.len(),
        vao
    );
    vao
}
