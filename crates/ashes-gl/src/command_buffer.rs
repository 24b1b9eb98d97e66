//! Command recording and the record-side state machine.
//!
//! A command buffer moves through `Initial -> Recording -> Executable`,
//! briefly `Pending` while a submit replays it, then back to `Executable`
//! for resubmission. Recording resolves every binding decision immediately
//! (vertex array selection, index offsets, push-constant routing) so
//! replay is a flat walk over [`Command`] values.
//!
//! Record-time misuse splits two ways: calls in the wrong state are caller
//! bugs (assert in debug, warn and ignore in release), while unsupported
//! features and malformed begin/end sequences surface as errors.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use ashes_api::{
    access_compatible_with_stages, AccessFlags, BufferCopy, BufferImageCopy, ClearAttachment,
    ClearColorValue, ClearDepthStencilValue, ClearRect, ClearValue, CommandBufferLevel, Error,
    Filter, ImageBlit, ImageCopy, ImageSubresourceRange, IndexType, MemoryBarrier,
    PipelineBindPoint, PipelineStageFlags, Rect2D, Result, ShaderStageFlags, Viewport,
    WHOLE_SIZE,
};

use crate::buffer::{Buffer, BufferMemoryBarrier};
use crate::commands::Command;
use crate::context::ContextLock;
use crate::convert;
use crate::descriptor::DescriptorSet;
use crate::device::DeviceShared;
use crate::framebuffer::Framebuffer;
use crate::geometry::{GeometryBuffers, GeometryKey, IndexBinding, VertexBinding};
use crate::image::{Image, ImageMemoryBarrier};
use crate::pipeline::{Pipeline, PipelineLayout};
use crate::query::QueryPool;
use crate::registry::{ObjectId, ObjectKind};
use crate::render_pass::RenderPass;
use crate::sync::Event;

// ── Pools ─────────────────────────────────────────────────────────

pub(crate) struct CommandPoolShared {
    device: Weak<DeviceShared>,
    id: ObjectId,
}

impl Drop for CommandPoolShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::CommandPool);
        }
    }
}

/// Allocation scope for command buffers.
#[derive(Clone)]
pub struct CommandPool {
    shared: Arc<CommandPoolShared>,
}

impl CommandPool {
    pub(crate) fn new(device: &Arc<DeviceShared>) -> Self {
        let id = device.registry.register(ObjectKind::CommandPool);
        Self {
            shared: Arc::new(CommandPoolShared {
                device: Arc::downgrade(device),
                id,
            }),
        }
    }

    pub fn allocate(&self, level: CommandBufferLevel) -> Result<CommandBuffer> {
        let device = self
            .shared
            .device
            .upgrade()
            .ok_or_else(|| Error::DeviceLost("command pool device destroyed".into()))?;
        Ok(CommandBuffer::new(&device, level))
    }
}

// ── State machine ─────────────────────────────────────────────────

/// Lifecycle state of a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Initial,
    Recording,
    Executable,
    Pending,
}

/// Cleanup replayed once per submit after the command walk, restoring the
/// context assumptions an embedder relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AfterSubmitAction {
    RestoreProgram,
    RestoreTexture { unit: u32, target: u32 },
}

impl AfterSubmitAction {
    pub(crate) fn apply(&self, lock: &mut ContextLock<'_>) {
        match *self {
            AfterSubmitAction::RestoreProgram => lock.set_program(0),
            AfterSubmitAction::RestoreTexture { unit, target } => {
                lock.bind_texture_unit(unit, target, 0)
            }
        }
    }
}

/// Record-time-only state, rebuilt by `begin` and discarded by `reset`.
struct Recorder {
    state: RecordState,
    commands: Vec<Command>,
    render_pass: Option<RenderPass>,
    framebuffer: Option<Framebuffer>,
    subpass: u32,
    clear_values: Vec<ClearValue>,
    graphics_pipeline: Option<Pipeline>,
    compute_pipeline: Option<Pipeline>,
    vertex_bindings: Vec<VertexBinding>,
    index_binding: Option<IndexBinding>,
    geometry_cache: HashMap<GeometryKey, Arc<GeometryBuffers>>,
    bound_geometry: Option<Arc<GeometryBuffers>>,
    empty_geometry: Option<Arc<GeometryBuffers>>,
    staged_pushes: Vec<(u32, Vec<u8>)>,
    after_submit: Vec<AfterSubmitAction>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            state: RecordState::Initial,
            commands: Vec::new(),
            render_pass: None,
            framebuffer: None,
            subpass: 0,
            clear_values: Vec::new(),
            graphics_pipeline: None,
            compute_pipeline: None,
            vertex_bindings: Vec::new(),
            index_binding: None,
            geometry_cache: HashMap::new(),
            bound_geometry: None,
            empty_geometry: None,
            staged_pushes: Vec::new(),
            after_submit: Vec::new(),
        }
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn push_after_submit(&mut self, action: AfterSubmitAction) {
        if !self.after_submit.contains(&action) {
            self.after_submit.push(action);
        }
    }
}

pub(crate) struct CommandBufferShared {
    device: Weak<DeviceShared>,
    level: CommandBufferLevel,
    inner: Mutex<Recorder>,
    id: ObjectId,
}

impl Drop for CommandBufferShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::CommandBuffer);
        }
    }
}

/// Records Vulkan-style calls into a replayable command list.
#[derive(Clone)]
pub struct CommandBuffer {
    shared: Arc<CommandBufferShared>,
}

impl CommandBuffer {
    fn new(device: &Arc<DeviceShared>, level: CommandBufferLevel) -> Self {
        let id = device.registry.register(ObjectKind::CommandBuffer);
        debug!("allocated {:?} command buffer", level);
        Self {
            shared: Arc::new(CommandBufferShared {
                device: Arc::downgrade(device),
                level,
                inner: Mutex::new(Recorder::new()),
                id,
            }),
        }
    }

    pub fn level(&self) -> CommandBufferLevel {
        self.shared.level
    }

    pub fn state(&self) -> RecordState {
        self.shared.inner.lock().state
    }

    /// Snapshot of the recorded command list, mostly useful to assert on
    /// replay structure.
    pub fn recorded_commands(&self) -> Vec<Command> {
        self.shared.inner.lock().commands.clone()
    }

    /// Distinct vertex array combinations this recording has built.
    pub fn cached_geometry_count(&self) -> usize {
        self.shared.inner.lock().geometry_cache.len()
    }

    // ── Lifecycle ─────────────────────────────────────────────────

    pub fn begin(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state == RecordState::Recording {
            return Err(Error::Validation(
                "begin called on a command buffer already recording".into(),
            ));
        }
        if inner.state == RecordState::Pending {
            return Err(Error::Validation(
                "begin called on a command buffer pending execution".into(),
            ));
        }
        inner.clear();
        inner.state = RecordState::Recording;
        Ok(())
    }

    pub fn end(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordState::Recording {
            return Err(Error::Validation(
                "end called on a command buffer that is not recording".into(),
            ));
        }
        if inner.render_pass.is_some() {
            return Err(Error::Validation(
                "end called inside an open render pass".into(),
            ));
        }
        if !inner.staged_pushes.is_empty() {
            warn!(
                "{} push constant writes recorded before any pipeline bind were dropped",
                inner.staged_pushes.len()
            );
            inner.staged_pushes.clear();
        }
        inner.state = RecordState::Executable;
        Ok(())
    }

    /// Returns the buffer to `Initial`, discarding recorded commands.
    /// Valid from any state.
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        inner.clear();
    }

    /// Runs `record` with the recorder when the state machine allows it.
    /// Wrong-state calls assert in debug builds and are ignored with a
    /// warning in release builds.
    fn record(&self, name: &str, record: impl FnOnce(&mut Recorder)) {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordState::Recording {
            debug_assert!(
                false,
                "{} called while the command buffer is {:?}",
                name, inner.state
            );
            warn!("{} ignored: command buffer is {:?}", name, inner.state);
            return;
        }
        record(&mut inner);
    }

    /// Same gate for recording calls that can fail for reasons other than
    /// the state machine.
    fn try_record(
        &self,
        name: &str,
        record: impl FnOnce(&mut Recorder) -> Result<()>,
    ) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordState::Recording {
            debug_assert!(
                false,
                "{} called while the command buffer is {:?}",
                name, inner.state
            );
            warn!("{} ignored: command buffer is {:?}", name, inner.state);
            return Ok(());
        }
        record(&mut inner)
    }

    // ── Binds ─────────────────────────────────────────────────────

    pub fn bind_pipeline(&self, pipeline: &Pipeline) {
        self.record("bind_pipeline", |inner| {
            match pipeline.bind_point() {
                PipelineBindPoint::Graphics => {
                    let input_changed = inner
                        .graphics_pipeline
                        .as_ref()
                        .is_some_and(|old| old.vertex_input_hash() != pipeline.vertex_input_hash());
                    if input_changed {
                        // A new attribute layout invalidates every VAO built
                        // for the old one.
                        inner.geometry_cache.clear();
                        inner.bound_geometry = None;
                    }
                    inner.graphics_pipeline = Some(pipeline.clone());
                    inner.commands.push(Command::BindPipeline {
                        pipeline: pipeline.clone(),
                    });
                }
                PipelineBindPoint::Compute => {
                    inner.compute_pipeline = Some(pipeline.clone());
                    inner.commands.push(Command::BindComputePipeline {
                        pipeline: pipeline.clone(),
                    });
                }
            }
            inner.push_after_submit(AfterSubmitAction::RestoreProgram);
            // Pushes staged before the first bind flush now, oldest first.
            let staged = std::mem::take(&mut inner.staged_pushes);
            for (offset, data) in staged {
                inner.commands.push(Command::PushConstants {
                    pipeline: pipeline.clone(),
                    offset,
                    data,
                });
            }
        });
    }

    pub fn bind_vertex_buffers(&self, first_binding: u32, buffers: &[(&Buffer, u64)]) {
        self.record("bind_vertex_buffers", |inner| {
            for (index, (buffer, offset)) in buffers.iter().enumerate() {
                let binding = VertexBinding {
                    binding: first_binding + index as u32,
                    buffer: buffer.gl_name(),
                    offset: *offset,
                };
                match inner
                    .vertex_bindings
                    .iter_mut()
                    .find(|b| b.binding == binding.binding)
                {
                    Some(slot) => *slot = binding,
                    None => inner.vertex_bindings.push(binding),
                }
            }
            inner.vertex_bindings.sort_unstable_by_key(|b| b.binding);
        });
    }

    pub fn bind_index_buffer(&self, buffer: &Buffer, offset: u64, index_type: IndexType) {
        self.record("bind_index_buffer", |inner| {
            inner.index_binding = Some(IndexBinding {
                buffer: buffer.gl_name(),
                offset,
                index_type,
            });
        });
    }

    pub fn bind_descriptor_sets(
        &self,
        layout: &PipelineLayout,
        first_set: u32,
        sets: &[&DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.record("bind_descriptor_sets", |inner| {
            let mut remaining = dynamic_offsets;
            for (index, set) in sets.iter().enumerate() {
                let set_index = first_set + index as u32;
                let dynamic = set.dynamic_count().min(remaining.len());
                let (taken, rest) = remaining.split_at(dynamic);
                remaining = rest;
                for (unit, target) in set.sampled_units(layout, set_index) {
                    inner.push_after_submit(AfterSubmitAction::RestoreTexture { unit, target });
                }
                inner.commands.push(Command::BindDescriptorSet {
                    set: (*set).clone(),
                    layout: layout.clone(),
                    set_index,
                    dynamic_offsets: taken.to_vec(),
                });
            }
            if !remaining.is_empty() {
                warn!(
                    "{} dynamic offsets were not consumed by any bound set",
                    remaining.len()
                );
            }
        });
    }

    pub fn push_constants(
        &self,
        _layout: &PipelineLayout,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.record("push_constants", |inner| {
            let pipeline = if stages.contains(ShaderStageFlags::COMPUTE) {
                inner.compute_pipeline.as_ref().or(inner.graphics_pipeline.as_ref())
            } else {
                inner.graphics_pipeline.as_ref().or(inner.compute_pipeline.as_ref())
            };
            match pipeline {
                Some(pipeline) => inner.commands.push(Command::PushConstants {
                    pipeline: pipeline.clone(),
                    offset,
                    data: data.to_vec(),
                }),
                // No pipeline yet: stage the write, it flushes after the
                // next bind in this order.
                None => inner.staged_pushes.push((offset, data.to_vec())),
            }
        });
    }

    // ── Render passes ─────────────────────────────────────────────

    pub fn begin_render_pass(
        &self,
        render_pass: &RenderPass,
        framebuffer: &Framebuffer,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) {
        self.record("begin_render_pass", |inner| {
            if inner.render_pass.is_some() {
                warn!("begin_render_pass inside an open render pass, ignoring");
                return;
            }
            inner.render_pass = Some(render_pass.clone());
            inner.framebuffer = Some(framebuffer.clone());
            inner.subpass = 0;
            inner.clear_values = clear_values.to_vec();
            inner.bound_geometry = None;
            inner.commands.push(Command::BeginRenderPass {
                render_pass: render_pass.clone(),
                framebuffer: framebuffer.clone(),
                render_area,
            });
            inner.commands.push(Command::BeginSubpass {
                render_pass: render_pass.clone(),
                framebuffer: framebuffer.clone(),
                subpass: 0,
                clear_values: clear_values.to_vec(),
            });
        });
    }

    pub fn next_subpass(&self) {
        self.record("next_subpass", |inner| {
            let Some(render_pass) = inner.render_pass.clone() else {
                warn!("next_subpass outside a render pass, ignoring");
                return;
            };
            let Some(framebuffer) = inner.framebuffer.clone() else {
                return;
            };
            if inner.subpass + 1 >= render_pass.subpass_count() {
                warn!(
                    "next_subpass beyond the {} subpasses of the active pass, ignoring",
                    render_pass.subpass_count()
                );
                return;
            }
            inner.subpass += 1;
            inner.bound_geometry = None;
            let subpass = inner.subpass;
            let clear_values = inner.clear_values.clone();
            inner.commands.push(Command::EndSubpass);
            inner.commands.push(Command::BeginSubpass {
                render_pass,
                framebuffer,
                subpass,
                clear_values,
            });
        });
    }

    pub fn end_render_pass(&self) {
        self.record("end_render_pass", |inner| {
            let Some(render_pass) = inner.render_pass.take() else {
                warn!("end_render_pass outside a render pass, ignoring");
                return;
            };
            let Some(framebuffer) = inner.framebuffer.take() else {
                return;
            };
            inner.subpass = 0;
            inner.clear_values.clear();
            inner.bound_geometry = None;
            inner.commands.push(Command::EndSubpass);
            inner.commands.push(Command::EndRenderPass {
                render_pass,
                framebuffer,
            });
        });
    }

    /// Splices every secondary buffer's commands into this primary, in
    /// argument order, and inherits their after-submit cleanups.
    pub fn execute_commands(&self, secondaries: &[&CommandBuffer]) -> Result<()> {
        self.try_record("execute_commands", |inner| {
            for secondary in secondaries {
                if Arc::ptr_eq(&secondary.shared, &self.shared) {
                    return Err(Error::Validation(
                        "a command buffer cannot execute itself".into(),
                    ));
                }
                if secondary.shared.level != CommandBufferLevel::Secondary {
                    return Err(Error::Validation(
                        "execute_commands requires secondary command buffers".into(),
                    ));
                }
                let other = secondary.shared.inner.lock();
                if other.state != RecordState::Executable {
                    return Err(Error::Validation(format!(
                        "secondary command buffer is {:?}, must be Executable",
                        other.state
                    )));
                }
                inner.commands.extend(other.commands.iter().cloned());
                for action in &other.after_submit {
                    inner.push_after_submit(*action);
                }
            }
            Ok(())
        })
    }

    // ── Draws and dispatch ────────────────────────────────────────

    pub fn draw(
        &self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.record("draw", |inner| {
            let Some(pipeline) = inner.graphics_pipeline.clone() else {
                warn!("draw without a bound graphics pipeline, ignoring");
                return;
            };
            if pipeline.has_vertex_input() {
                if !ensure_geometry(inner, &pipeline) {
                    return;
                }
                inner.commands.push(Command::Draw {
                    mode: pipeline.primitive_mode(),
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                });
            } else {
                // No attribute layout: route through the shared identity
                // index buffer so every draw is an indexed draw.
                ensure_empty_geometry(inner);
                inner.commands.push(Command::DrawIndexed {
                    mode: pipeline.primitive_mode(),
                    index_count: Command::clamp_empty_geometry_count(vertex_count),
                    instance_count,
                    first_index: first_vertex,
                    vertex_offset: 0,
                    first_instance,
                    index_type: glow::UNSIGNED_INT,
                    index_offset: 0,
                });
            }
        });
    }

    pub fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.record("draw_indexed", |inner| {
            let Some(pipeline) = inner.graphics_pipeline.clone() else {
                warn!("draw_indexed without a bound graphics pipeline, ignoring");
                return;
            };
            let Some(index) = inner.index_binding else {
                warn!("draw_indexed without a bound index buffer, ignoring");
                return;
            };
            if !ensure_geometry(inner, &pipeline) {
                return;
            }
            inner.commands.push(Command::DrawIndexed {
                mode: pipeline.primitive_mode(),
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
                index_type: convert::index_type(index.index_type),
                index_offset: index.offset,
            });
        });
    }

    pub fn draw_indirect(
        &self,
        buffer: &Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> Result<()> {
        self.try_record("draw_indirect", |inner| {
            self.check_multi_draw(draw_count)?;
            let Some(pipeline) = inner.graphics_pipeline.clone() else {
                warn!("draw_indirect without a bound graphics pipeline, ignoring");
                return Ok(());
            };
            if pipeline.has_vertex_input() && !ensure_geometry(inner, &pipeline) {
                return Ok(());
            }
            inner.commands.push(Command::DrawIndirect {
                buffer: buffer.clone(),
                offset,
                draw_count,
                stride,
                mode: pipeline.primitive_mode(),
            });
            Ok(())
        })
    }

    pub fn draw_indexed_indirect(
        &self,
        buffer: &Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> Result<()> {
        self.try_record("draw_indexed_indirect", |inner| {
            self.check_multi_draw(draw_count)?;
            let Some(pipeline) = inner.graphics_pipeline.clone() else {
                warn!("draw_indexed_indirect without a bound graphics pipeline, ignoring");
                return Ok(());
            };
            let Some(index) = inner.index_binding else {
                warn!("draw_indexed_indirect without a bound index buffer, ignoring");
                return Ok(());
            };
            if !ensure_geometry(inner, &pipeline) {
                return Ok(());
            }
            inner.commands.push(Command::DrawIndexedIndirect {
                buffer: buffer.clone(),
                offset,
                draw_count,
                stride,
                mode: pipeline.primitive_mode(),
                index_type: convert::index_type(index.index_type),
            });
            Ok(())
        })
    }

    pub fn dispatch(&self, x: u32, y: u32, z: u32) {
        self.record("dispatch", |inner| {
            if inner.compute_pipeline.is_none() {
                warn!("dispatch without a bound compute pipeline, ignoring");
                return;
            }
            inner.commands.push(Command::Dispatch { x, y, z });
        });
    }

    pub fn dispatch_indirect(&self, buffer: &Buffer, offset: u64) {
        self.record("dispatch_indirect", |inner| {
            if inner.compute_pipeline.is_none() {
                warn!("dispatch_indirect without a bound compute pipeline, ignoring");
                return;
            }
            inner.commands.push(Command::DispatchIndirect {
                buffer: buffer.clone(),
                offset,
            });
        });
    }

    fn check_multi_draw(&self, draw_count: u32) -> Result<()> {
        if draw_count <= 1 {
            return Ok(());
        }
        let device = self
            .shared
            .device
            .upgrade()
            .ok_or_else(|| Error::DeviceLost("command buffer device destroyed".into()))?;
        if !device.features.multi_draw_indirect {
            return Err(Error::FeatureNotPresent("multi-draw indirect"));
        }
        Ok(())
    }

    // ── Transfers ─────────────────────────────────────────────────

    pub fn copy_buffer(&self, src: &Buffer, dst: &Buffer, regions: &[BufferCopy]) {
        self.record("copy_buffer", |inner| {
            for region in regions {
                let size = if region.size == WHOLE_SIZE {
                    src.size().saturating_sub(region.src_offset)
                } else {
                    region.size
                };
                inner.commands.push(Command::CopyBuffer {
                    src: src.clone(),
                    dst: dst.clone(),
                    src_offset: region.src_offset,
                    dst_offset: region.dst_offset,
                    size,
                });
            }
        });
    }

    pub fn copy_image(&self, src: &Image, dst: &Image, regions: &[ImageCopy]) {
        self.record("copy_image", |inner| {
            for region in regions {
                inner.commands.push(Command::CopyImage {
                    src: src.clone(),
                    dst: dst.clone(),
                    region: *region,
                });
            }
        });
    }

    pub fn copy_buffer_to_image(&self, buffer: &Buffer, image: &Image, regions: &[BufferImageCopy]) {
        self.record("copy_buffer_to_image", |inner| {
            for region in regions {
                inner.commands.push(Command::CopyBufferToImage {
                    buffer: buffer.clone(),
                    image: image.clone(),
                    region: *region,
                });
            }
        });
    }

    pub fn copy_image_to_buffer(&self, image: &Image, buffer: &Buffer, regions: &[BufferImageCopy]) {
        self.record("copy_image_to_buffer", |inner| {
            for region in regions {
                inner.commands.push(Command::CopyImageToBuffer {
                    image: image.clone(),
                    buffer: buffer.clone(),
                    region: *region,
                });
            }
        });
    }

    pub fn blit_image(&self, src: &Image, dst: &Image, regions: &[ImageBlit], filter: Filter) {
        self.record("blit_image", |inner| {
            let filter = match filter {
                Filter::Nearest => glow::NEAREST,
                Filter::Linear => glow::LINEAR,
            };
            for region in regions {
                inner.commands.push(Command::BlitImage {
                    src: src.clone(),
                    dst: dst.clone(),
                    region: *region,
                    filter,
                });
            }
        });
    }

    pub fn fill_buffer(&self, buffer: &Buffer, offset: u64, size: u64, data: u32) {
        self.record("fill_buffer", |inner| {
            let size = if size == WHOLE_SIZE {
                buffer.size().saturating_sub(offset)
            } else {
                size
            };
            if offset % 4 != 0 || size % 4 != 0 {
                warn!("fill_buffer range {}+{} is not 4-byte aligned, ignoring", offset, size);
                return;
            }
            inner.commands.push(Command::FillBuffer {
                buffer: buffer.clone(),
                offset,
                size,
                data,
            });
        });
    }

    pub fn update_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) {
        self.record("update_buffer", |inner| {
            inner.commands.push(Command::UpdateBuffer {
                buffer: buffer.clone(),
                offset,
                data: data.to_vec(),
            });
        });
    }

    // ── Clears ────────────────────────────────────────────────────

    pub fn clear_color_image(
        &self,
        image: &Image,
        value: ClearColorValue,
        ranges: &[ImageSubresourceRange],
    ) {
        self.record("clear_color_image", |inner| {
            inner.commands.push(Command::ClearColorImage {
                image: image.clone(),
                value,
                ranges: ranges.to_vec(),
            });
        });
    }

    pub fn clear_depth_stencil_image(
        &self,
        image: &Image,
        value: ClearDepthStencilValue,
        ranges: &[ImageSubresourceRange],
    ) {
        self.record("clear_depth_stencil_image", |inner| {
            inner.commands.push(Command::ClearDepthStencilImage {
                image: image.clone(),
                value,
                ranges: ranges.to_vec(),
            });
        });
    }

    pub fn clear_attachments(&self, attachments: &[ClearAttachment], rects: &[ClearRect]) {
        self.record("clear_attachments", |inner| {
            let Some(framebuffer) = inner.framebuffer.clone() else {
                warn!("clear_attachments outside a render pass, ignoring");
                return;
            };
            inner.commands.push(Command::ClearAttachments {
                framebuffer,
                attachments: attachments.to_vec(),
                rects: rects.to_vec(),
                subpass: inner.subpass,
            });
        });
    }

    pub fn generate_mipmaps(&self, image: &Image) {
        self.record("generate_mipmaps", |inner| {
            inner.commands.push(Command::GenerateMipmaps {
                image: image.clone(),
            });
        });
    }

    // ── Barriers and events ───────────────────────────────────────

    pub fn memory_barrier(
        &self,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        barrier: MemoryBarrier,
    ) {
        self.pipeline_barrier(src_stage, dst_stage, &[barrier], &[], &[]);
    }

    /// Records one `glMemoryBarrier` covering the union of destination
    /// accesses. Incompatible access/stage pairs are a caller bug caught
    /// in debug builds only.
    pub fn pipeline_barrier(
        &self,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        memory: &[MemoryBarrier],
        buffers: &[BufferMemoryBarrier],
        images: &[ImageMemoryBarrier],
    ) {
        self.record("pipeline_barrier", |inner| {
            let mut dst_access = AccessFlags::empty();
            for barrier in memory {
                debug_assert!(
                    access_compatible_with_stages(barrier.src_access_mask, src_stage),
                    "memory barrier source access {:?} incompatible with stages {:?}",
                    barrier.src_access_mask,
                    src_stage
                );
                debug_assert!(
                    access_compatible_with_stages(barrier.dst_access_mask, dst_stage),
                    "memory barrier destination access {:?} incompatible with stages {:?}",
                    barrier.dst_access_mask,
                    dst_stage
                );
                dst_access |= barrier.dst_access_mask;
            }
            for barrier in buffers {
                debug_assert!(
                    access_compatible_with_stages(barrier.dst_access, dst_stage),
                    "buffer barrier destination access {:?} incompatible with stages {:?}",
                    barrier.dst_access,
                    dst_stage
                );
                dst_access |= barrier.dst_access;
            }
            for barrier in images {
                debug_assert!(
                    access_compatible_with_stages(barrier.dst_access, dst_stage),
                    "image barrier destination access {:?} incompatible with stages {:?}",
                    barrier.dst_access,
                    dst_stage
                );
                dst_access |= barrier.dst_access;
            }
            inner.commands.push(Command::MemoryBarrier {
                bits: convert::barrier_bits(dst_access),
                host_read: dst_access.contains(AccessFlags::HOST_READ),
            });
        });
    }

    pub fn set_event(&self, event: &Event, _stage: PipelineStageFlags) {
        self.record("set_event", |inner| {
            inner.commands.push(Command::SetEvent {
                event: event.clone(),
            });
        });
    }

    pub fn reset_event(&self, event: &Event, _stage: PipelineStageFlags) {
        self.record("reset_event", |inner| {
            inner.commands.push(Command::ResetEvent {
                event: event.clone(),
            });
        });
    }

    pub fn wait_events(&self, events: &[&Event]) {
        self.record("wait_events", |inner| {
            inner.commands.push(Command::WaitEvents {
                events: events.iter().map(|event| (*event).clone()).collect(),
            });
        });
    }

    // ── Queries and dynamic state ─────────────────────────────────

    pub fn reset_query_pool(&self, pool: &QueryPool, first_query: u32, query_count: u32) {
        self.record("reset_query_pool", |inner| {
            inner.commands.push(Command::ResetQueryPool {
                pool: pool.clone(),
                first_query,
                query_count,
            });
        });
    }

    pub fn begin_query(&self, pool: &QueryPool, query: u32) {
        self.record("begin_query", |inner| {
            inner.commands.push(Command::BeginQuery {
                pool: pool.clone(),
                query,
            });
        });
    }

    pub fn end_query(&self, pool: &QueryPool, _query: u32) {
        self.record("end_query", |inner| {
            inner.commands.push(Command::EndQuery { pool: pool.clone() });
        });
    }

    pub fn write_timestamp(&self, _stage: PipelineStageFlags, pool: &QueryPool, query: u32) {
        self.record("write_timestamp", |inner| {
            inner.commands.push(Command::WriteTimestamp {
                pool: pool.clone(),
                query,
            });
        });
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.record("set_viewport", |inner| {
            inner.commands.push(Command::SetViewport { viewport });
        });
    }

    pub fn set_scissor(&self, rect: Rect2D) {
        self.record("set_scissor", |inner| {
            inner.commands.push(Command::SetScissor { rect });
        });
    }

    pub fn set_line_width(&self, width: f32) {
        self.record("set_line_width", |inner| {
            inner.commands.push(Command::SetLineWidth { width });
        });
    }

    pub fn set_depth_bias(&self, constant_factor: f32, clamp: f32, slope_factor: f32) {
        self.record("set_depth_bias", |inner| {
            inner.commands.push(Command::SetDepthBias {
                constant_factor,
                clamp,
                slope_factor,
            });
        });
    }

    // ── Submission side ───────────────────────────────────────────

    /// Marks the buffer `Pending` and hands the queue a snapshot to replay.
    pub(crate) fn take_for_submit(&self) -> Result<(Vec<Command>, Vec<AfterSubmitAction>)> {
        let mut inner = self.shared.inner.lock();
        if inner.state != RecordState::Executable {
            return Err(Error::Validation(format!(
                "submitted command buffer is {:?}, must be Executable",
                inner.state
            )));
        }
        inner.state = RecordState::Pending;
        Ok((inner.commands.clone(), inner.after_submit.clone()))
    }

    /// Restores `Executable` once the synchronous replay finished.
    pub(crate) fn finish_submit(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state == RecordState::Pending {
            inner.state = RecordState::Executable;
        }
    }
}

/// Emits a `BindGeometryBuffers` for the current vertex/index combination
/// unless the matching VAO is already bound. Returns false when the VAO
/// could not be built.
fn ensure_geometry(inner: &mut Recorder, pipeline: &Pipeline) -> bool {
    let Some(input) = pipeline.vertex_input() else {
        return false;
    };
    // Only bindings the pipeline actually reads key the VAO.
    let vertex: Vec<VertexBinding> = inner
        .vertex_bindings
        .iter()
        .filter(|binding| input.bindings.iter().any(|b| b.binding == binding.binding))
        .copied()
        .collect();
    let key = GeometryKey {
        vertex,
        index: inner.index_binding,
        input_hash: pipeline.vertex_input_hash(),
    };
    let geometry = match inner.geometry_cache.get(&key) {
        Some(existing) => existing.clone(),
        None => {
            let Some(device) = pipeline.device_shared() else {
                warn!("draw recorded after device destruction, ignoring");
                return false;
            };
            let built = GeometryBuffers::deferred(&device, input.clone(), &key);
            inner.geometry_cache.insert(key, built.clone());
            built
        }
    };
    let already_bound = inner
        .bound_geometry
        .as_ref()
        .is_some_and(|bound| Arc::ptr_eq(bound, &geometry));
    if !already_bound {
        inner.commands.push(Command::BindGeometryBuffers {
            geometry: geometry.clone(),
        });
        inner.bound_geometry = Some(geometry);
    }
    true
}

/// Binds the device's empty indexed VAO for layout-less draws.
fn ensure_empty_geometry(inner: &mut Recorder) {
    if inner.empty_geometry.is_none() {
        let Some(pipeline) = inner.graphics_pipeline.as_ref() else {
            return;
        };
        let Some(device) = pipeline.device_shared() else {
            return;
        };
        inner.empty_geometry = Some(GeometryBuffers::for_empty_vao(&device));
    }
    let Some(geometry) = inner.empty_geometry.clone() else {
        return;
    };
    let already_bound = inner
        .bound_geometry
        .as_ref()
        .is_some_and(|bound| Arc::ptr_eq(bound, &geometry));
    if !already_bound {
        inner.commands.push(Command::BindGeometryBuffers {
            geometry: geometry.clone(),
        });
        inner.bound_geometry = Some(geometry);
    }
}
