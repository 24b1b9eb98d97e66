//! Recorded command objects.
//!
//! One closed enum, one variant per recordable operation. Every variant
//! carries the values and resource references its replay needs, resolved
//! at record time; `apply` is a mechanical walk that talks to GL through
//! the cached setters. Cloning is cheap since resource payloads are
//! reference counted, which is what secondary-buffer re-execution relies
//! on.

use std::sync::Arc;

use tracing::{trace, warn};

use ashes_api::{
    ClearAttachment, ClearColorValue, ClearDepthStencilValue, ClearRect, ClearValue,
    ImageAspectFlags, ImageSubresourceRange, Rect2D, Viewport,
};

use crate::buffer::Buffer;
use crate::context::ContextLock;
use crate::convert;
use crate::descriptor::DescriptorSet;
use crate::device::EMPTY_INDEX_COUNT;
use crate::framebuffer::Framebuffer;
use crate::geometry::GeometryBuffers;
use crate::image::Image;
use crate::pipeline::{Pipeline, PipelineLayout};
use crate::query::QueryPool;
use crate::render_pass::RenderPass;
use crate::sync::Event;

/// One recorded operation. Replay is an exhaustive match in
/// [`Command::apply`].
#[derive(Clone)]
pub enum Command {
    BindPipeline {
        pipeline: Pipeline,
    },
    BindComputePipeline {
        pipeline: Pipeline,
    },
    BindGeometryBuffers {
        geometry: Arc<GeometryBuffers>,
    },
    BindDescriptorSet {
        set: DescriptorSet,
        layout: PipelineLayout,
        set_index: u32,
        dynamic_offsets: Vec<u32>,
    },
    PushConstants {
        pipeline: Pipeline,
        offset: u32,
        data: Vec<u8>,
    },
    Draw {
        mode: u32,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        mode: u32,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
        /// GL element type of the bound index buffer.
        index_type: u32,
        /// Byte offset the index binding starts at.
        index_offset: u64,
    },
    DrawIndirect {
        buffer: Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
        mode: u32,
    },
    DrawIndexedIndirect {
        buffer: Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
        mode: u32,
        index_type: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        buffer: Buffer,
        offset: u64,
    },
    BeginRenderPass {
        render_pass: RenderPass,
        framebuffer: Framebuffer,
        render_area: Rect2D,
    },
    BeginSubpass {
        render_pass: RenderPass,
        framebuffer: Framebuffer,
        subpass: u32,
        clear_values: Vec<ClearValue>,
    },
    EndSubpass,
    EndRenderPass {
        render_pass: RenderPass,
        framebuffer: Framebuffer,
    },
    CopyBuffer {
        src: Buffer,
        dst: Buffer,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    },
    CopyImage {
        src: Image,
        dst: Image,
        region: ashes_api::ImageCopy,
    },
    CopyBufferToImage {
        buffer: Buffer,
        image: Image,
        region: ashes_api::BufferImageCopy,
    },
    CopyImageToBuffer {
        image: Image,
        buffer: Buffer,
        region: ashes_api::BufferImageCopy,
    },
    BlitImage {
        src: Image,
        dst: Image,
        region: ashes_api::ImageBlit,
        filter: u32,
    },
    FillBuffer {
        buffer: Buffer,
        offset: u64,
        size: u64,
        data: u32,
    },
    UpdateBuffer {
        buffer: Buffer,
        offset: u64,
        data: Vec<u8>,
    },
    ClearColorImage {
        image: Image,
        value: ClearColorValue,
        ranges: Vec<ImageSubresourceRange>,
    },
    ClearDepthStencilImage {
        image: Image,
        value: ClearDepthStencilValue,
        ranges: Vec<ImageSubresourceRange>,
    },
    ClearAttachments {
        framebuffer: Framebuffer,
        attachments: Vec<ClearAttachment>,
        rects: Vec<ClearRect>,
        subpass: u32,
    },
    MemoryBarrier {
        /// `glMemoryBarrier` bitfield derived from destination accesses.
        bits: u32,
        /// Host reads additionally flush the pipeline.
        host_read: bool,
    },
    SetEvent {
        event: Event,
    },
    ResetEvent {
        event: Event,
    },
    WaitEvents {
        events: Vec<Event>,
    },
    ResetQueryPool {
        pool: QueryPool,
        first_query: u32,
        query_count: u32,
    },
    BeginQuery {
        pool: QueryPool,
        query: u32,
    },
    EndQuery {
        pool: QueryPool,
    },
    WriteTimestamp {
        pool: QueryPool,
        query: u32,
    },
    SetViewport {
        viewport: Viewport,
    },
    SetScissor {
        rect: Rect2D,
    },
    SetLineWidth {
        width: f32,
    },
    SetDepthBias {
        constant_factor: f32,
        clamp: f32,
        slope_factor: f32,
    },
    GenerateMipmaps {
        image: Image,
    },
}

impl Command {
    /// Performs the recorded operation against the live context. The lock
    /// is the proof of exclusive context access.
    pub(crate) fn apply(&self, lock: &mut ContextLock<'_>) {
        match self {
            Command::BindPipeline { pipeline } | Command::BindComputePipeline { pipeline } => {
                pipeline.apply(lock);
            }
            Command::BindGeometryBuffers { geometry } => {
                geometry.bind(lock);
            }
            Command::BindDescriptorSet {
                set,
                layout,
                set_index,
                dynamic_offsets,
            } => {
                let mut offsets = dynamic_offsets.iter().copied();
                set.apply(lock, layout, *set_index, &mut offsets);
            }
            Command::PushConstants {
                pipeline,
                offset,
                data,
            } => {
                pipeline.write_push_constants(lock, *offset, data);
            }
            Command::Draw {
                mode,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => {
                lock.gl().draw_arrays(
                    *mode,
                    *first_vertex as i32,
                    *vertex_count as i32,
                    *instance_count as i32,
                    *first_instance,
                );
            }
            Command::DrawIndexed {
                mode,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
                index_type,
                index_offset,
            } => {
                let element_size = match *index_type {
                    glow::UNSIGNED_SHORT => 2u64,
                    _ => 4u64,
                };
                let offset = index_offset + u64::from(*first_index) * element_size;
                lock.gl().draw_elements(
                    *mode,
                    *index_count as i32,
                    *index_type,
                    offset as i32,
                    *instance_count as i32,
                    *vertex_offset,
                    *first_instance,
                );
            }
            Command::DrawIndirect {
                buffer,
                offset,
                draw_count,
                stride,
                mode,
            } => {
                lock.set_buffer(glow::DRAW_INDIRECT_BUFFER, buffer.gl_name());
                for index in 0..*draw_count {
                    let record = offset + u64::from(index) * u64::from(*stride);
                    lock.gl().draw_arrays_indirect(*mode, record as i32);
                }
            }
            Command::DrawIndexedIndirect {
                buffer,
                offset,
                draw_count,
                stride,
                mode,
                index_type,
            } => {
                lock.set_buffer(glow::DRAW_INDIRECT_BUFFER, buffer.gl_name());
                for index in 0..*draw_count {
                    let record = offset + u64::from(index) * u64::from(*stride);
                    lock.gl()
                        .draw_elements_indirect(*mode, *index_type, record as i32);
                }
            }
            Command::Dispatch { x, y, z } => {
                lock.gl().dispatch(*x, *y, *z);
            }
            Command::DispatchIndirect { buffer, offset } => {
                lock.set_buffer(glow::DISPATCH_INDIRECT_BUFFER, buffer.gl_name());
                lock.gl().dispatch_indirect(*offset as i32);
            }
            Command::BeginRenderPass {
                render_pass: _,
                framebuffer,
                render_area,
            } => {
                trace!("begin render pass on framebuffer {}", framebuffer.gl_name());
                lock.set_draw_framebuffer(framebuffer.gl_name());
                lock.set_cap(glow::SCISSOR_TEST, true);
                lock.set_scissor_rect(
                    render_area.offset.x,
                    render_area.offset.y,
                    render_area.extent.width as i32,
                    render_area.extent.height as i32,
                );
            }
            Command::BeginSubpass {
                render_pass,
                framebuffer,
                subpass,
                clear_values,
            } => {
                let buffers = framebuffer.draw_buffers_for_subpass(*subpass);
                if !buffers.is_empty() {
                    lock.gl().draw_buffers(&buffers);
                }
                for request in render_pass.clears_for_subpass(*subpass) {
                    framebuffer.perform_clear(lock, &request, clear_values);
                }
            }
            Command::EndSubpass => {}
            Command::EndRenderPass {
                render_pass,
                framebuffer,
            } => {
                for (view, description) in framebuffer
                    .attachments()
                    .iter()
                    .zip(render_pass.attachments())
                {
                    view.image().set_tracked_layout(description.final_layout);
                }
                lock.set_draw_framebuffer(0);
                trace!("end render pass");
            }
            Command::CopyBuffer {
                src,
                dst,
                src_offset,
                dst_offset,
                size,
            } => {
                lock.set_buffer(glow::COPY_READ_BUFFER, src.gl_name());
                lock.set_buffer(glow::COPY_WRITE_BUFFER, dst.gl_name());
                lock.gl().copy_buffer_sub_data(
                    glow::COPY_READ_BUFFER,
                    glow::COPY_WRITE_BUFFER,
                    *src_offset as i32,
                    *dst_offset as i32,
                    *size as i32,
                );
            }
            Command::CopyImage { src, dst, region } => {
                copy_image_regions(lock, src, dst, region);
            }
            Command::CopyBufferToImage {
                buffer,
                image,
                region,
            } => {
                upload_buffer_to_image(lock, buffer, image, region);
            }
            Command::CopyImageToBuffer {
                image,
                buffer,
                region,
            } => {
                download_image_to_buffer(lock, image, buffer, region);
            }
            Command::BlitImage {
                src,
                dst,
                region,
                filter,
            } => {
                blit_image_region(lock, src, dst, region, *filter);
            }
            Command::FillBuffer {
                buffer,
                offset,
                size,
                data,
            } => {
                let words = vec![*data; (*size / 4) as usize];
                lock.set_buffer(glow::COPY_WRITE_BUFFER, buffer.gl_name());
                lock.gl().buffer_sub_data(
                    glow::COPY_WRITE_BUFFER,
                    *offset as i32,
                    bytemuck::cast_slice(&words),
                );
            }
            Command::UpdateBuffer {
                buffer,
                offset,
                data,
            } => {
                lock.set_buffer(glow::COPY_WRITE_BUFFER, buffer.gl_name());
                lock.gl()
                    .buffer_sub_data(glow::COPY_WRITE_BUFFER, *offset as i32, data);
            }
            Command::ClearColorImage {
                image,
                value,
                ranges,
            } => {
                clear_image_subresources(lock, image, ranges, |lock, _| match value {
                    ClearColorValue::Float32(rgba) => {
                        lock.gl().clear_buffer_f32(glow::COLOR, 0, rgba)
                    }
                    ClearColorValue::Int32(rgba) => {
                        lock.gl().clear_buffer_i32(glow::COLOR, 0, rgba)
                    }
                    ClearColorValue::Uint32(rgba) => {
                        lock.gl().clear_buffer_u32(glow::COLOR, 0, rgba)
                    }
                });
            }
            Command::ClearDepthStencilImage {
                image,
                value,
                ranges,
            } => {
                let aspects = image.format().aspects();
                clear_image_subresources(lock, image, ranges, |lock, _| {
                    lock.set_depth_write(true);
                    lock.set_stencil_write_mask(glow::FRONT, u32::MAX);
                    lock.set_stencil_write_mask(glow::BACK, u32::MAX);
                    if aspects.contains(ImageAspectFlags::DEPTH | ImageAspectFlags::STENCIL) {
                        lock.gl()
                            .clear_buffer_depth_stencil(0, value.depth, value.stencil as i32);
                    } else if aspects.contains(ImageAspectFlags::DEPTH) {
                        lock.gl().clear_buffer_f32(glow::DEPTH, 0, &[value.depth]);
                    } else {
                        lock.gl()
                            .clear_buffer_i32(glow::STENCIL, 0, &[value.stencil as i32]);
                    }
                });
            }
            Command::ClearAttachments {
                framebuffer,
                attachments,
                rects,
                subpass,
            } => {
                clear_attachments(lock, framebuffer, attachments, rects, *subpass);
            }
            Command::MemoryBarrier { bits, host_read } => {
                if *bits != 0 {
                    lock.gl().memory_barrier(*bits);
                }
                if *host_read {
                    lock.gl().flush();
                }
            }
            Command::SetEvent { event } => event.set(),
            Command::ResetEvent { event } => event.reset(),
            Command::WaitEvents { events } => {
                // Replay is synchronous; an unsignaled event here can only
                // come from a host that never set it.
                for event in events {
                    if !event.is_set() {
                        warn!("wait on an event that was never signaled");
                    }
                }
            }
            Command::ResetQueryPool { .. } => {
                // GL queries reset implicitly on the next begin.
            }
            Command::BeginQuery { pool, query } => {
                if let Some(name) = pool.gl_query(*query) {
                    lock.gl().begin_query(pool.gl_target(), name);
                }
            }
            Command::EndQuery { pool } => {
                lock.gl().end_query(pool.gl_target());
            }
            Command::WriteTimestamp { pool, query } => {
                if let Some(name) = pool.gl_query(*query) {
                    lock.gl().query_counter(name);
                }
            }
            Command::SetViewport { viewport } => {
                lock.set_viewport(
                    viewport.x as i32,
                    viewport.y as i32,
                    viewport.width as i32,
                    viewport.height as i32,
                );
                lock.set_depth_range(viewport.min_depth, viewport.max_depth);
            }
            Command::SetScissor { rect } => {
                lock.set_cap(glow::SCISSOR_TEST, true);
                lock.set_scissor_rect(
                    rect.offset.x,
                    rect.offset.y,
                    rect.extent.width as i32,
                    rect.extent.height as i32,
                );
            }
            Command::SetLineWidth { width } => {
                lock.set_line_width(*width);
            }
            Command::SetDepthBias {
                constant_factor,
                clamp: _,
                slope_factor,
            } => {
                lock.set_cap(glow::POLYGON_OFFSET_FILL, true);
                lock.set_polygon_offset(*slope_factor, *constant_factor);
            }
            Command::GenerateMipmaps { image } => {
                lock.bind_texture_unit(crate::state::SCRATCH_UNIT, image.gl_target(), image.gl_name());
                lock.gl().generate_mipmap(image.gl_target());
            }
        }
    }

    /// Clamp applied to layout-less draws routed through the identity
    /// index buffer.
    pub(crate) fn clamp_empty_geometry_count(vertex_count: u32) -> u32 {
        if vertex_count > EMPTY_INDEX_COUNT {
            warn!(
                "draw of {} vertices exceeds the {}-entry identity index buffer, clamping",
                vertex_count, EMPTY_INDEX_COUNT
            );
            EMPTY_INDEX_COUNT
        } else {
            vertex_count
        }
    }
}

// ── Transfer helpers ──────────────────────────────────────────────

/// Attaches one mip level / array layer of an image to the given point of
/// the currently bound framebuffer target. Cube faces attach through their
/// face target, everything else through the whole-texture or layer entry
/// points.
fn attach_for_transfer(lock: &ContextLock<'_>, fb_target: u32, image: &Image, level: u32, layer: u32) {
    let point = if image.format().is_depth_or_stencil() {
        convert::depth_stencil_attachment_point(image.format().aspects())
    } else {
        glow::COLOR_ATTACHMENT0
    };
    if image.gl_target() == glow::TEXTURE_CUBE_MAP {
        lock.gl().framebuffer_texture_2d(
            fb_target,
            point,
            glow::TEXTURE_CUBE_MAP_POSITIVE_X + layer,
            image.gl_name(),
            level as i32,
        );
    } else if image.array_layers() > 1 || image.extent().depth > 1 {
        lock.gl()
            .framebuffer_texture_layer(fb_target, point, image.gl_name(), level as i32, layer as i32);
    } else {
        lock.gl()
            .framebuffer_texture(fb_target, point, image.gl_name(), level as i32);
    }
}

/// Bytes one array layer occupies in the staging buffer for a copy region.
fn layer_stride(image: &Image, region: &ashes_api::BufferImageCopy) -> u64 {
    let width = if region.buffer_row_length != 0 {
        region.buffer_row_length
    } else {
        region.image_extent.width
    };
    let height = if region.buffer_image_height != 0 {
        region.buffer_image_height
    } else {
        region.image_extent.height
    };
    u64::from(width) * u64::from(height) * image.format().texel_size()
}

fn transfer_mask(image: &Image) -> u32 {
    let aspects = image.format().aspects();
    let mut mask = 0;
    if aspects.contains(ImageAspectFlags::COLOR) {
        mask |= glow::COLOR_BUFFER_BIT;
    }
    if aspects.contains(ImageAspectFlags::DEPTH) {
        mask |= glow::DEPTH_BUFFER_BIT;
    }
    if aspects.contains(ImageAspectFlags::STENCIL) {
        mask |= glow::STENCIL_BUFFER_BIT;
    }
    mask
}

/// Runs `body` with fresh scratch read/draw framebuffers bound, then
/// deletes them and drops the bindings from the cache.
fn with_scratch_framebuffers(
    lock: &mut ContextLock<'_>,
    body: impl FnOnce(&mut ContextLock<'_>, u32, u32),
) {
    let read = lock.gl().create_framebuffer();
    let draw = lock.gl().create_framebuffer();
    lock.set_read_framebuffer(read);
    lock.set_draw_framebuffer(draw);
    lock.set_cap(glow::SCISSOR_TEST, false);
    body(lock, read, draw);
    lock.forget_framebuffer(read);
    lock.forget_framebuffer(draw);
    lock.gl().delete_framebuffer(read);
    lock.gl().delete_framebuffer(draw);
}

/// GL 3.3 has no direct image copy, so regions move through a framebuffer
/// blit with nearest filtering and exactly matching rectangles.
fn copy_image_regions(lock: &mut ContextLock<'_>, src: &Image, dst: &Image, region: &ashes_api::ImageCopy) {
    let mask = transfer_mask(src);
    let layers = region
        .src_subresource
        .layer_count
        .min(region.dst_subresource.layer_count);
    with_scratch_framebuffers(lock, |lock, _, _| {
        for layer in 0..layers {
            attach_for_transfer(
                lock,
                glow::READ_FRAMEBUFFER,
                src,
                region.src_subresource.mip_level,
                region.src_subresource.base_array_layer + layer,
            );
            attach_for_transfer(
                lock,
                glow::DRAW_FRAMEBUFFER,
                dst,
                region.dst_subresource.mip_level,
                region.dst_subresource.base_array_layer + layer,
            );
            if mask & glow::COLOR_BUFFER_BIT != 0 {
                lock.gl().read_buffer(glow::COLOR_ATTACHMENT0);
                lock.gl().draw_buffers(&[glow::COLOR_ATTACHMENT0]);
            }
            lock.gl().blit_framebuffer(
                region.src_offset.x,
                region.src_offset.y,
                region.src_offset.x + region.extent.width as i32,
                region.src_offset.y + region.extent.height as i32,
                region.dst_offset.x,
                region.dst_offset.y,
                region.dst_offset.x + region.extent.width as i32,
                region.dst_offset.y + region.extent.height as i32,
                mask,
                glow::NEAREST,
            );
        }
    });
}

fn blit_image_region(
    lock: &mut ContextLock<'_>,
    src: &Image,
    dst: &Image,
    region: &ashes_api::ImageBlit,
    filter: u32,
) {
    let mask = transfer_mask(src);
    // Depth and stencil blits require nearest filtering.
    let filter = if mask == glow::COLOR_BUFFER_BIT {
        filter
    } else {
        glow::NEAREST
    };
    let layers = region
        .src_subresource
        .layer_count
        .min(region.dst_subresource.layer_count);
    with_scratch_framebuffers(lock, |lock, _, _| {
        for layer in 0..layers {
            attach_for_transfer(
                lock,
                glow::READ_FRAMEBUFFER,
                src,
                region.src_subresource.mip_level,
                region.src_subresource.base_array_layer + layer,
            );
            attach_for_transfer(
                lock,
                glow::DRAW_FRAMEBUFFER,
                dst,
                region.dst_subresource.mip_level,
                region.dst_subresource.base_array_layer + layer,
            );
            if mask & glow::COLOR_BUFFER_BIT != 0 {
                lock.gl().read_buffer(glow::COLOR_ATTACHMENT0);
                lock.gl().draw_buffers(&[glow::COLOR_ATTACHMENT0]);
            }
            lock.gl().blit_framebuffer(
                region.src_offsets[0].x,
                region.src_offsets[0].y,
                region.src_offsets[1].x,
                region.src_offsets[1].y,
                region.dst_offsets[0].x,
                region.dst_offsets[0].y,
                region.dst_offsets[1].x,
                region.dst_offsets[1].y,
                mask,
                filter,
            );
        }
    });
}

fn upload_buffer_to_image(
    lock: &mut ContextLock<'_>,
    buffer: &Buffer,
    image: &Image,
    region: &ashes_api::BufferImageCopy,
) {
    let info = convert::format_info(image.format());
    let target = image.gl_target();
    lock.set_buffer(glow::PIXEL_UNPACK_BUFFER, buffer.gl_name());
    lock.bind_texture_unit(crate::state::SCRATCH_UNIT, target, image.gl_name());
    lock.set_unpack_alignment(1);
    lock.gl()
        .pixel_store_i32(glow::UNPACK_ROW_LENGTH, region.buffer_row_length as i32);
    lock.gl()
        .pixel_store_i32(glow::UNPACK_IMAGE_HEIGHT, region.buffer_image_height as i32);
    let sub = &region.image_subresource;
    let layered = image.array_layers() > 1;
    if target == glow::TEXTURE_CUBE_MAP {
        // Cube faces upload one at a time through their face targets.
        let stride = layer_stride(image, region);
        for face in 0..sub.layer_count {
            lock.gl().tex_sub_image_2d_pbo(
                glow::TEXTURE_CUBE_MAP_POSITIVE_X + sub.base_array_layer + face,
                sub.mip_level as i32,
                region.image_offset.x,
                region.image_offset.y,
                region.image_extent.width as i32,
                region.image_extent.height as i32,
                info.format,
                info.data_type,
                (region.buffer_offset + u64::from(face) * stride) as u32,
            );
        }
    } else if image.extent().depth > 1 || layered {
        let (z, depth) = if layered {
            (sub.base_array_layer as i32, sub.layer_count as i32)
        } else {
            (region.image_offset.z, region.image_extent.depth as i32)
        };
        lock.gl().tex_sub_image_3d_pbo(
            target,
            sub.mip_level as i32,
            region.image_offset.x,
            region.image_offset.y,
            z,
            region.image_extent.width as i32,
            region.image_extent.height as i32,
            depth,
            info.format,
            info.data_type,
            region.buffer_offset as u32,
        );
    } else {
        lock.gl().tex_sub_image_2d_pbo(
            target,
            sub.mip_level as i32,
            region.image_offset.x,
            region.image_offset.y,
            region.image_extent.width as i32,
            region.image_extent.height as i32,
            info.format,
            info.data_type,
            region.buffer_offset as u32,
        );
    }
    lock.gl().pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
    lock.gl().pixel_store_i32(glow::UNPACK_IMAGE_HEIGHT, 0);
    lock.set_buffer(glow::PIXEL_UNPACK_BUFFER, 0);
}

fn download_image_to_buffer(
    lock: &mut ContextLock<'_>,
    image: &Image,
    buffer: &Buffer,
    region: &ashes_api::BufferImageCopy,
) {
    let info = convert::format_info(image.format());
    let sub = &region.image_subresource;
    lock.set_buffer(glow::PIXEL_PACK_BUFFER, buffer.gl_name());
    lock.set_pack_alignment(1);
    lock.gl()
        .pixel_store_i32(glow::PACK_ROW_LENGTH, region.buffer_row_length as i32);
    let stride = layer_stride(image, region);
    with_scratch_framebuffers(lock, |lock, _, _| {
        for layer in 0..sub.layer_count {
            attach_for_transfer(
                lock,
                glow::READ_FRAMEBUFFER,
                image,
                sub.mip_level,
                sub.base_array_layer + layer,
            );
            if !image.format().is_depth_or_stencil() {
                lock.gl().read_buffer(glow::COLOR_ATTACHMENT0);
            }
            lock.gl().read_pixels_pbo(
                region.image_offset.x,
                region.image_offset.y,
                region.image_extent.width as i32,
                region.image_extent.height as i32,
                info.format,
                info.data_type,
                (region.buffer_offset + u64::from(layer) * stride) as u32,
            );
        }
    });
    lock.gl().pixel_store_i32(glow::PACK_ROW_LENGTH, 0);
    lock.set_buffer(glow::PIXEL_PACK_BUFFER, 0);
}

/// Clears every mip and layer a range names by attaching each to a
/// scratch framebuffer. Vulkan image clears ignore the scissor.
fn clear_image_subresources(
    lock: &mut ContextLock<'_>,
    image: &Image,
    ranges: &[ImageSubresourceRange],
    clear: impl Fn(&mut ContextLock<'_>, u32),
) {
    let color = !image.format().is_depth_or_stencil();
    with_scratch_framebuffers(lock, |lock, _, _| {
        for range in ranges {
            let level_count = range
                .level_count
                .min(image.mip_levels().saturating_sub(range.base_mip_level));
            let layer_count = range
                .layer_count
                .min(image.array_layers().saturating_sub(range.base_array_layer));
            for level in range.base_mip_level..range.base_mip_level + level_count {
                for layer in range.base_array_layer..range.base_array_layer + layer_count {
                    attach_for_transfer(lock, glow::DRAW_FRAMEBUFFER, image, level, layer);
                    if color {
                        lock.gl().draw_buffers(&[glow::COLOR_ATTACHMENT0]);
                        lock.set_color_mask(true, true, true, true);
                    }
                    clear(lock, level);
                }
            }
        }
    });
}

/// Clears regions of the current subpass's attachments in place. The
/// framebuffer is already bound; draw-buffer slots follow the subpass
/// color order.
fn clear_attachments(
    lock: &mut ContextLock<'_>,
    framebuffer: &Framebuffer,
    attachments: &[ClearAttachment],
    rects: &[ClearRect],
    subpass: u32,
) {
    let subpasses = framebuffer.render_pass().subpasses();
    let Some(desc) = subpasses.get(subpass as usize) else {
        return;
    };
    lock.set_cap(glow::SCISSOR_TEST, true);
    for rect in rects {
        lock.set_scissor_rect(
            rect.rect.offset.x,
            rect.rect.offset.y,
            rect.rect.extent.width as i32,
            rect.rect.extent.height as i32,
        );
        for attachment in attachments {
            if attachment.aspect_mask.contains(ImageAspectFlags::COLOR) {
                if desc.color_attachments.len() <= attachment.color_attachment as usize {
                    continue;
                }
                lock.set_color_mask(true, true, true, true);
                match attachment.clear_value {
                    ClearValue::Color(ClearColorValue::Float32(rgba)) => {
                        lock.gl()
                            .clear_buffer_f32(glow::COLOR, attachment.color_attachment, &rgba)
                    }
                    ClearValue::Color(ClearColorValue::Int32(rgba)) => {
                        lock.gl()
                            .clear_buffer_i32(glow::COLOR, attachment.color_attachment, &rgba)
                    }
                    ClearValue::Color(ClearColorValue::Uint32(rgba)) => {
                        lock.gl()
                            .clear_buffer_u32(glow::COLOR, attachment.color_attachment, &rgba)
                    }
                    ClearValue::DepthStencil(_) => {}
                }
            } else {
                let value = match attachment.clear_value {
                    ClearValue::DepthStencil(value) => value,
                    ClearValue::Color(_) => continue,
                };
                let depth = attachment.aspect_mask.contains(ImageAspectFlags::DEPTH);
                let stencil = attachment.aspect_mask.contains(ImageAspectFlags::STENCIL);
                if depth {
                    lock.set_depth_write(true);
                }
                if stencil {
                    lock.set_stencil_write_mask(glow::FRONT, u32::MAX);
                    lock.set_stencil_write_mask(glow::BACK, u32::MAX);
                }
                if depth && stencil {
                    lock.gl()
                        .clear_buffer_depth_stencil(0, value.depth, value.stencil as i32);
                } else if depth {
                    lock.gl().clear_buffer_f32(glow::DEPTH, 0, &[value.depth]);
                } else if stencil {
                    lock.gl()
                        .clear_buffer_i32(glow::STENCIL, 0, &[value.stencil as i32]);
                }
            }
        }
    }
}
