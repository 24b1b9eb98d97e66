//! GL context seam.
//!
//! Every GL entry point the backend touches goes through the [`Gl`] trait so
//! that replay code can run against a recording fake in tests. Object names
//! are raw `u32`s with `0` meaning "no object", offsets and sizes use the
//! integer widths GL itself takes. [`GlowTable`] is the production
//! implementation on top of `glow`; it is the only place in the crate that
//! calls into `glow` functions.

use std::collections::HashSet;
use std::ffi::c_void;
use std::num::NonZeroU32;

use glow::HasContext;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::state::StateCache;

// ── Function table ────────────────────────────────────────────────

/// Narrow view of the GL 4.x entry points used by the backend.
///
/// Targets, caps and format tokens are the `glow` constants passed through
/// unchanged. Implementations must tolerate being called from any thread as
/// long as calls are serialized; the backend serializes all calls behind the
/// context lock.
#[allow(clippy::too_many_arguments)]
pub trait Gl: Send + Sync {
    // Capability queries.
    fn get_integer(&self, pname: u32) -> i32;
    fn get_string(&self, pname: u32) -> String;
    fn has_extension(&self, name: &str) -> bool;
    fn get_error(&self) -> u32;

    // Buffer objects.
    fn create_buffer(&self) -> u32;
    fn delete_buffer(&self, buffer: u32);
    fn bind_buffer(&self, target: u32, buffer: u32);
    fn bind_buffer_base(&self, target: u32, index: u32, buffer: u32);
    fn bind_buffer_range(&self, target: u32, index: u32, buffer: u32, offset: i32, size: i32);
    fn buffer_data(&self, target: u32, size: i32, usage: u32);
    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]);
    fn read_buffer_sub_data(&self, target: u32, offset: i32, out: &mut [u8]);
    fn copy_buffer_sub_data(
        &self,
        src_target: u32,
        dst_target: u32,
        src_offset: i32,
        dst_offset: i32,
        size: i32,
    );
    fn map_buffer_range(&self, target: u32, offset: i32, length: i32, access: u32) -> *mut u8;
    fn flush_mapped_range(&self, target: u32, offset: i32, length: i32);
    fn unmap_buffer(&self, target: u32);

    // Vertex arrays.
    fn create_vertex_array(&self) -> u32;
    fn delete_vertex_array(&self, vao: u32);
    fn bind_vertex_array(&self, vao: u32);
    fn enable_vertex_attrib(&self, index: u32);
    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn vertex_attrib_pointer_i32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        stride: i32,
        offset: i32,
    );
    fn vertex_attrib_divisor(&self, index: u32, divisor: u32);

    // Textures.
    fn create_texture(&self) -> u32;
    fn delete_texture(&self, texture: u32);
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: u32);
    fn tex_storage_2d(&self, target: u32, levels: i32, internal_format: u32, width: i32, height: i32);
    fn tex_storage_3d(
        &self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        depth: i32,
    );
    fn tex_sub_image_2d(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        data: &[u8],
    );
    fn tex_sub_image_2d_pbo(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        offset: u32,
    );
    fn tex_sub_image_3d(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        format: u32,
        data_type: u32,
        data: &[u8],
    );
    fn tex_sub_image_3d_pbo(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        format: u32,
        data_type: u32,
        offset: u32,
    );
    fn generate_mipmap(&self, target: u32);
    fn tex_parameter_i32(&self, target: u32, pname: u32, value: i32);
    fn pixel_store_i32(&self, pname: u32, value: i32);
    fn read_pixels_pbo(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        offset: u32,
    );
    fn bind_image_texture(
        &self,
        unit: u32,
        texture: u32,
        level: i32,
        layered: bool,
        layer: i32,
        access: u32,
        format: u32,
    );
    fn tex_buffer(&self, target: u32, internal_format: u32, buffer: u32);
    fn tex_buffer_range(
        &self,
        target: u32,
        internal_format: u32,
        buffer: u32,
        offset: i32,
        size: i32,
    );

    // Samplers.
    fn create_sampler(&self) -> u32;
    fn delete_sampler(&self, sampler: u32);
    fn bind_sampler(&self, unit: u32, sampler: u32);
    fn sampler_parameter_i32(&self, sampler: u32, pname: u32, value: i32);
    fn sampler_parameter_f32(&self, sampler: u32, pname: u32, value: f32);
    fn sampler_parameter_f32_slice(&self, sampler: u32, pname: u32, values: &[f32]);

    // Framebuffers.
    fn create_framebuffer(&self) -> u32;
    fn delete_framebuffer(&self, fb: u32);
    fn bind_framebuffer(&self, target: u32, fb: u32);
    fn framebuffer_texture(&self, target: u32, attachment: u32, texture: u32, level: i32);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        tex_target: u32,
        texture: u32,
        level: i32,
    );
    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: u32,
        level: i32,
        layer: i32,
    );
    fn check_framebuffer_status(&self, target: u32) -> u32;
    fn draw_buffers(&self, bufs: &[u32]);
    fn read_buffer(&self, src: u32);
    fn blit_framebuffer(
        &self,
        src_x0: i32,
        src_y0: i32,
        src_x1: i32,
        src_y1: i32,
        dst_x0: i32,
        dst_y0: i32,
        dst_x1: i32,
        dst_y1: i32,
        mask: u32,
        filter: u32,
    );
    fn clear_buffer_f32(&self, target: u32, draw_buffer: u32, values: &[f32]);
    fn clear_buffer_i32(&self, target: u32, draw_buffer: u32, values: &[i32]);
    fn clear_buffer_u32(&self, target: u32, draw_buffer: u32, values: &[u32]);
    fn clear_buffer_depth_stencil(&self, draw_buffer: u32, depth: f32, stencil: i32);

    // Programs and shaders.
    fn create_program(&self) -> u32;
    fn delete_program(&self, program: u32);
    fn create_shader(&self, stage: u32) -> u32;
    fn delete_shader(&self, shader: u32);
    fn shader_source(&self, shader: u32, source: &str);
    fn compile_shader(&self, shader: u32);
    fn shader_compile_ok(&self, shader: u32) -> bool;
    fn shader_info_log(&self, shader: u32) -> String;
    fn attach_shader(&self, program: u32, shader: u32);
    fn link_program(&self, program: u32);
    fn program_link_ok(&self, program: u32) -> bool;
    fn program_info_log(&self, program: u32) -> String;
    fn use_program(&self, program: u32);
    fn uniform_block_index(&self, program: u32, name: &str) -> Option<u32>;
    fn uniform_block_binding(&self, program: u32, index: u32, binding: u32);

    // Fixed-function state.
    fn enable(&self, cap: u32);
    fn disable(&self, cap: u32);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);
    fn front_face(&self, mode: u32);
    fn cull_face(&self, mode: u32);
    fn polygon_mode(&self, mode: u32);
    fn line_width(&self, width: f32);
    fn polygon_offset(&self, factor: f32, units: f32);
    fn depth_func(&self, func: u32);
    fn depth_mask(&self, write: bool);
    fn depth_range(&self, near: f32, far: f32);
    fn color_mask(&self, r: bool, g: bool, b: bool, a: bool);
    fn stencil_func(&self, face: u32, func: u32, reference: i32, mask: u32);
    fn stencil_op(&self, face: u32, fail: u32, depth_fail: u32, pass: u32);
    fn stencil_write_mask(&self, face: u32, mask: u32);
    fn blend_equation(&self, rgb: u32, alpha: u32);
    fn blend_func(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);
    fn blend_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn patch_vertices(&self, count: i32);

    // Draws and dispatch. `instances == 1` with `base_instance == 0` selects
    // the plain entry point.
    fn draw_arrays(&self, mode: u32, first: i32, count: i32, instances: i32, base_instance: u32);
    fn draw_elements(
        &self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: i32,
        instances: i32,
        base_vertex: i32,
        base_instance: u32,
    );
    fn draw_arrays_indirect(&self, mode: u32, offset: i32);
    fn draw_elements_indirect(&self, mode: u32, element_type: u32, offset: i32);
    fn dispatch(&self, x: u32, y: u32, z: u32);
    fn dispatch_indirect(&self, offset: i32);

    // Queries.
    fn create_query(&self) -> u32;
    fn delete_query(&self, query: u32);
    fn begin_query(&self, target: u32, query: u32);
    fn end_query(&self, target: u32);
    fn query_counter(&self, query: u32);
    fn query_result_available(&self, query: u32) -> bool;
    fn query_result_u64(&self, query: u32) -> u64;

    // Ordering.
    fn memory_barrier(&self, mask: u32);
    fn flush(&self);
    fn finish(&self);
}

// ── glow-backed table ─────────────────────────────────────────────

/// Production [`Gl`] implementation over a loaded `glow::Context`.
pub struct GlowTable {
    gl: glow::Context,
    extensions: HashSet<String>,
}

// GL calls are serialized behind the context lock and the caller keeps the
// native context current on the calling thread.
unsafe impl Send for GlowTable {}
unsafe impl Sync for GlowTable {}

impl GlowTable {
    /// Build the table from a symbol loader, typically
    /// [`crate::loader::load_system_gl`].
    ///
    /// # Safety
    ///
    /// The loader must return pointers valid for the GL context that is
    /// current on this thread, and that context must outlive the table.
    pub unsafe fn load_with(loader: impl FnMut(&str) -> *const c_void) -> Self {
        let gl = unsafe { glow::Context::from_loader_function(loader) };
        let extensions = gl.supported_extensions().clone();
        Self { gl, extensions }
    }
}

fn buf(name: u32) -> Option<glow::NativeBuffer> {
    NonZeroU32::new(name).map(glow::NativeBuffer)
}

fn tex(name: u32) -> Option<glow::NativeTexture> {
    NonZeroU32::new(name).map(glow::NativeTexture)
}

fn vao(name: u32) -> Option<glow::NativeVertexArray> {
    NonZeroU32::new(name).map(glow::NativeVertexArray)
}

fn smp(name: u32) -> Option<glow::NativeSampler> {
    NonZeroU32::new(name).map(glow::NativeSampler)
}

fn fbo(name: u32) -> Option<glow::NativeFramebuffer> {
    NonZeroU32::new(name).map(glow::NativeFramebuffer)
}

fn prg(name: u32) -> Option<glow::NativeProgram> {
    NonZeroU32::new(name).map(glow::NativeProgram)
}

fn shd(name: u32) -> glow::NativeShader {
    glow::NativeShader(NonZeroU32::new(name).unwrap_or(NonZeroU32::MIN))
}

fn qry(name: u32) -> glow::NativeQuery {
    glow::NativeQuery(NonZeroU32::new(name).unwrap_or(NonZeroU32::MIN))
}

impl Gl for GlowTable {
    fn get_integer(&self, pname: u32) -> i32 {
        unsafe { self.gl.get_parameter_i32(pname) }
    }

    fn get_string(&self, pname: u32) -> String {
        unsafe { self.gl.get_parameter_string(pname) }
    }

    fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    fn get_error(&self) -> u32 {
        unsafe { self.gl.get_error() }
    }

    fn create_buffer(&self) -> u32 {
        unsafe { self.gl.create_buffer().map(|b| b.0.get()).unwrap_or(0) }
    }

    fn delete_buffer(&self, buffer: u32) {
        if let Some(b) = buf(buffer) {
            unsafe { self.gl.delete_buffer(b) }
        }
    }

    fn bind_buffer(&self, target: u32, buffer: u32) {
        unsafe { self.gl.bind_buffer(target, buf(buffer)) }
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: u32) {
        unsafe { self.gl.bind_buffer_base(target, index, buf(buffer)) }
    }

    fn bind_buffer_range(&self, target: u32, index: u32, buffer: u32, offset: i32, size: i32) {
        unsafe { self.gl.bind_buffer_range(target, index, buf(buffer), offset, size) }
    }

    fn buffer_data(&self, target: u32, size: i32, usage: u32) {
        unsafe { self.gl.buffer_data_size(target, size, usage) }
    }

    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]) {
        unsafe { self.gl.buffer_sub_data_u8_slice(target, offset, data) }
    }

    fn read_buffer_sub_data(&self, target: u32, offset: i32, out: &mut [u8]) {
        unsafe { self.gl.get_buffer_sub_data(target, offset, out) }
    }

    fn copy_buffer_sub_data(
        &self,
        src_target: u32,
        dst_target: u32,
        src_offset: i32,
        dst_offset: i32,
        size: i32,
    ) {
        unsafe {
            self.gl
                .copy_buffer_sub_data(src_target, dst_target, src_offset, dst_offset, size)
        }
    }

    fn map_buffer_range(&self, target: u32, offset: i32, length: i32, access: u32) -> *mut u8 {
        unsafe { self.gl.map_buffer_range(target, offset, length, access) }
    }

    fn flush_mapped_range(&self, target: u32, offset: i32, length: i32) {
        unsafe { self.gl.flush_mapped_buffer_range(target, offset, length) }
    }

    fn unmap_buffer(&self, target: u32) {
        unsafe { self.gl.unmap_buffer(target) }
    }

    fn create_vertex_array(&self) -> u32 {
        unsafe { self.gl.create_vertex_array().map(|v| v.0.get()).unwrap_or(0) }
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        if let Some(v) = vao(vertex_array) {
            unsafe { self.gl.delete_vertex_array(v) }
        }
    }

    fn bind_vertex_array(&self, vertex_array: u32) {
        unsafe { self.gl.bind_vertex_array(vao(vertex_array)) }
    }

    fn enable_vertex_attrib(&self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, size, data_type, normalized, stride, offset)
        }
    }

    fn vertex_attrib_pointer_i32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        stride: i32,
        offset: i32,
    ) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_i32(index, size, data_type, stride, offset)
        }
    }

    fn vertex_attrib_divisor(&self, index: u32, divisor: u32) {
        unsafe { self.gl.vertex_attrib_divisor(index, divisor) }
    }

    fn create_texture(&self) -> u32 {
        unsafe { self.gl.create_texture().map(|t| t.0.get()).unwrap_or(0) }
    }

    fn delete_texture(&self, texture: u32) {
        if let Some(t) = tex(texture) {
            unsafe { self.gl.delete_texture(t) }
        }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, target: u32, texture: u32) {
        unsafe { self.gl.bind_texture(target, tex(texture)) }
    }

    fn tex_storage_2d(
        &self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) {
        unsafe {
            self.gl
                .tex_storage_2d(target, levels, internal_format, width, height)
        }
    }

    fn tex_storage_3d(
        &self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        depth: i32,
    ) {
        unsafe {
            self.gl
                .tex_storage_3d(target, levels, internal_format, width, height, depth)
        }
    }

    fn tex_sub_image_2d(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        data: &[u8],
    ) {
        unsafe {
            self.gl.tex_sub_image_2d(
                target,
                level,
                x,
                y,
                width,
                height,
                format,
                data_type,
                glow::PixelUnpackData::Slice(Some(data)),
            )
        }
    }

    fn tex_sub_image_2d_pbo(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        offset: u32,
    ) {
        unsafe {
            self.gl.tex_sub_image_2d(
                target,
                level,
                x,
                y,
                width,
                height,
                format,
                data_type,
                glow::PixelUnpackData::BufferOffset(offset),
            )
        }
    }

    fn tex_sub_image_3d(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        format: u32,
        data_type: u32,
        data: &[u8],
    ) {
        unsafe {
            self.gl.tex_sub_image_3d(
                target,
                level,
                x,
                y,
                z,
                width,
                height,
                depth,
                format,
                data_type,
                glow::PixelUnpackData::Slice(Some(data)),
            )
        }
    }

    fn tex_sub_image_3d_pbo(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        format: u32,
        data_type: u32,
        offset: u32,
    ) {
        unsafe {
            self.gl.tex_sub_image_3d(
                target,
                level,
                x,
                y,
                z,
                width,
                height,
                depth,
                format,
                data_type,
                glow::PixelUnpackData::BufferOffset(offset),
            )
        }
    }

    fn generate_mipmap(&self, target: u32) {
        unsafe { self.gl.generate_mipmap(target) }
    }

    fn tex_parameter_i32(&self, target: u32, pname: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(target, pname, value) }
    }

    fn pixel_store_i32(&self, pname: u32, value: i32) {
        unsafe { self.gl.pixel_store_i32(pname, value) }
    }

    fn read_pixels_pbo(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        offset: u32,
    ) {
        unsafe {
            self.gl.read_pixels(
                x,
                y,
                width,
                height,
                format,
                data_type,
                glow::PixelPackData::BufferOffset(offset),
            )
        }
    }

    fn bind_image_texture(
        &self,
        unit: u32,
        texture: u32,
        level: i32,
        layered: bool,
        layer: i32,
        access: u32,
        format: u32,
    ) {
        unsafe {
            self.gl
                .bind_image_texture(unit, tex(texture), level, layered, layer, access, format)
        }
    }

    fn tex_buffer(&self, target: u32, internal_format: u32, buffer: u32) {
        if let Some(b) = buf(buffer) {
            unsafe { self.gl.tex_buffer(target, internal_format, b) }
        }
    }

    fn tex_buffer_range(
        &self,
        target: u32,
        internal_format: u32,
        buffer: u32,
        offset: i32,
        size: i32,
    ) {
        if let Some(b) = buf(buffer) {
            unsafe {
                self.gl
                    .tex_buffer_range(target, internal_format, b, offset, size)
            }
        }
    }

    fn create_sampler(&self) -> u32 {
        unsafe { self.gl.create_sampler().map(|s| s.0.get()).unwrap_or(0) }
    }

    fn delete_sampler(&self, sampler: u32) {
        if let Some(s) = smp(sampler) {
            unsafe { self.gl.delete_sampler(s) }
        }
    }

    fn bind_sampler(&self, unit: u32, sampler: u32) {
        unsafe { self.gl.bind_sampler(unit, smp(sampler)) }
    }

    fn sampler_parameter_i32(&self, sampler: u32, pname: u32, value: i32) {
        if let Some(s) = smp(sampler) {
            unsafe { self.gl.sampler_parameter_i32(s, pname, value) }
        }
    }

    fn sampler_parameter_f32(&self, sampler: u32, pname: u32, value: f32) {
        if let Some(s) = smp(sampler) {
            unsafe { self.gl.sampler_parameter_f32(s, pname, value) }
        }
    }

    fn sampler_parameter_f32_slice(&self, sampler: u32, pname: u32, values: &[f32]) {
        if let Some(s) = smp(sampler) {
            unsafe { self.gl.sampler_parameter_f32_slice(s, pname, values) }
        }
    }

    fn create_framebuffer(&self) -> u32 {
        unsafe { self.gl.create_framebuffer().map(|f| f.0.get()).unwrap_or(0) }
    }

    fn delete_framebuffer(&self, fb: u32) {
        if let Some(f) = fbo(fb) {
            unsafe { self.gl.delete_framebuffer(f) }
        }
    }

    fn bind_framebuffer(&self, target: u32, fb: u32) {
        unsafe { self.gl.bind_framebuffer(target, fbo(fb)) }
    }

    fn framebuffer_texture(&self, target: u32, attachment: u32, texture: u32, level: i32) {
        unsafe {
            self.gl
                .framebuffer_texture(target, attachment, tex(texture), level)
        }
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        tex_target: u32,
        texture: u32,
        level: i32,
    ) {
        unsafe {
            self.gl
                .framebuffer_texture_2d(target, attachment, tex_target, tex(texture), level)
        }
    }

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: u32,
        level: i32,
        layer: i32,
    ) {
        unsafe {
            self.gl
                .framebuffer_texture_layer(target, attachment, tex(texture), level, layer)
        }
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        unsafe { self.gl.check_framebuffer_status(target) }
    }

    fn draw_buffers(&self, bufs: &[u32]) {
        unsafe { self.gl.draw_buffers(bufs) }
    }

    fn read_buffer(&self, src: u32) {
        unsafe { self.gl.read_buffer(src) }
    }

    fn blit_framebuffer(
        &self,
        src_x0: i32,
        src_y0: i32,
        src_x1: i32,
        src_y1: i32,
        dst_x0: i32,
        dst_y0: i32,
        dst_x1: i32,
        dst_y1: i32,
        mask: u32,
        filter: u32,
    ) {
        unsafe {
            self.gl.blit_framebuffer(
                src_x0, src_y0, src_x1, src_y1, dst_x0, dst_y0, dst_x1, dst_y1, mask, filter,
            )
        }
    }

    fn clear_buffer_f32(&self, target: u32, draw_buffer: u32, values: &[f32]) {
        unsafe { self.gl.clear_buffer_f32_slice(target, draw_buffer, values) }
    }

    fn clear_buffer_i32(&self, target: u32, draw_buffer: u32, values: &[i32]) {
        unsafe { self.gl.clear_buffer_i32_slice(target, draw_buffer, values) }
    }

    fn clear_buffer_u32(&self, target: u32, draw_buffer: u32, values: &[u32]) {
        unsafe { self.gl.clear_buffer_u32_slice(target, draw_buffer, values) }
    }

    fn clear_buffer_depth_stencil(&self, draw_buffer: u32, depth: f32, stencil: i32) {
        unsafe {
            self.gl
                .clear_buffer_depth_stencil(glow::DEPTH_STENCIL, draw_buffer, depth, stencil)
        }
    }

    fn create_program(&self) -> u32 {
        unsafe { self.gl.create_program().map(|p| p.0.get()).unwrap_or(0) }
    }

    fn delete_program(&self, program: u32) {
        if let Some(p) = prg(program) {
            unsafe { self.gl.delete_program(p) }
        }
    }

    fn create_shader(&self, stage: u32) -> u32 {
        unsafe { self.gl.create_shader(stage).map(|s| s.0.get()).unwrap_or(0) }
    }

    fn delete_shader(&self, shader: u32) {
        if shader != 0 {
            unsafe { self.gl.delete_shader(shd(shader)) }
        }
    }

    fn shader_source(&self, shader: u32, source: &str) {
        unsafe { self.gl.shader_source(shd(shader), source) }
    }

    fn compile_shader(&self, shader: u32) {
        unsafe { self.gl.compile_shader(shd(shader)) }
    }

    fn shader_compile_ok(&self, shader: u32) -> bool {
        unsafe { self.gl.get_shader_compile_status(shd(shader)) }
    }

    fn shader_info_log(&self, shader: u32) -> String {
        unsafe { self.gl.get_shader_info_log(shd(shader)) }
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let Some(p) = prg(program) {
            unsafe { self.gl.attach_shader(p, shd(shader)) }
        }
    }

    fn link_program(&self, program: u32) {
        if let Some(p) = prg(program) {
            unsafe { self.gl.link_program(p) }
        }
    }

    fn program_link_ok(&self, program: u32) -> bool {
        match prg(program) {
            Some(p) => unsafe { self.gl.get_program_link_status(p) },
            None => false,
        }
    }

    fn program_info_log(&self, program: u32) -> String {
        match prg(program) {
            Some(p) => unsafe { self.gl.get_program_info_log(p) },
            None => String::new(),
        }
    }

    fn use_program(&self, program: u32) {
        unsafe { self.gl.use_program(prg(program)) }
    }

    fn uniform_block_index(&self, program: u32, name: &str) -> Option<u32> {
        let p = prg(program)?;
        unsafe { self.gl.get_uniform_block_index(p, name) }
    }

    fn uniform_block_binding(&self, program: u32, index: u32, binding: u32) {
        if let Some(p) = prg(program) {
            unsafe { self.gl.uniform_block_binding(p, index, binding) }
        }
    }

    fn enable(&self, cap: u32) {
        unsafe { self.gl.enable(cap) }
    }

    fn disable(&self, cap: u32) {
        unsafe { self.gl.disable(cap) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.scissor(x, y, width, height) }
    }

    fn front_face(&self, mode: u32) {
        unsafe { self.gl.front_face(mode) }
    }

    fn cull_face(&self, mode: u32) {
        unsafe { self.gl.cull_face(mode) }
    }

    fn polygon_mode(&self, mode: u32) {
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) }
    }

    fn line_width(&self, width: f32) {
        unsafe { self.gl.line_width(width) }
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        unsafe { self.gl.polygon_offset(factor, units) }
    }

    fn depth_func(&self, func: u32) {
        unsafe { self.gl.depth_func(func) }
    }

    fn depth_mask(&self, write: bool) {
        unsafe { self.gl.depth_mask(write) }
    }

    fn depth_range(&self, near: f32, far: f32) {
        unsafe { self.gl.depth_range_f32(near, far) }
    }

    fn color_mask(&self, r: bool, g: bool, b: bool, a: bool) {
        unsafe { self.gl.color_mask(r, g, b, a) }
    }

    fn stencil_func(&self, face: u32, func: u32, reference: i32, mask: u32) {
        unsafe { self.gl.stencil_func_separate(face, func, reference, mask) }
    }

    fn stencil_op(&self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
        unsafe { self.gl.stencil_op_separate(face, fail, depth_fail, pass) }
    }

    fn stencil_write_mask(&self, face: u32, mask: u32) {
        unsafe { self.gl.stencil_mask_separate(face, mask) }
    }

    fn blend_equation(&self, rgb: u32, alpha: u32) {
        unsafe { self.gl.blend_equation_separate(rgb, alpha) }
    }

    fn blend_func(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        unsafe {
            self.gl
                .blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha)
        }
    }

    fn blend_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { self.gl.blend_color(r, g, b, a) }
    }

    fn patch_vertices(&self, count: i32) {
        unsafe { self.gl.patch_parameter_i32(glow::PATCH_VERTICES, count) }
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32, instances: i32, base_instance: u32) {
        unsafe {
            if base_instance != 0 {
                self.gl
                    .draw_arrays_instanced_base_instance(mode, first, count, instances, base_instance);
            } else if instances != 1 {
                self.gl.draw_arrays_instanced(mode, first, count, instances);
            } else {
                self.gl.draw_arrays(mode, first, count);
            }
        }
    }

    fn draw_elements(
        &self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: i32,
        instances: i32,
        base_vertex: i32,
        base_instance: u32,
    ) {
        unsafe {
            if base_instance != 0 {
                self.gl.draw_elements_instanced_base_vertex_base_instance(
                    mode,
                    count,
                    element_type,
                    offset,
                    instances,
                    base_vertex,
                    base_instance,
                );
            } else if instances != 1 {
                self.gl.draw_elements_instanced_base_vertex(
                    mode,
                    count,
                    element_type,
                    offset,
                    instances,
                    base_vertex,
                );
            } else if base_vertex != 0 {
                self.gl
                    .draw_elements_base_vertex(mode, count, element_type, offset, base_vertex);
            } else {
                self.gl.draw_elements(mode, count, element_type, offset);
            }
        }
    }

    fn draw_arrays_indirect(&self, mode: u32, offset: i32) {
        unsafe { self.gl.draw_arrays_indirect_offset(mode, offset) }
    }

    fn draw_elements_indirect(&self, mode: u32, element_type: u32, offset: i32) {
        unsafe { self.gl.draw_elements_indirect_offset(mode, element_type, offset) }
    }

    fn dispatch(&self, x: u32, y: u32, z: u32) {
        unsafe { self.gl.dispatch_compute(x, y, z) }
    }

    fn dispatch_indirect(&self, offset: i32) {
        unsafe { self.gl.dispatch_compute_indirect(offset) }
    }

    fn create_query(&self) -> u32 {
        unsafe { self.gl.create_query().map(|q| q.0.get()).unwrap_or(0) }
    }

    fn delete_query(&self, query: u32) {
        if query != 0 {
            unsafe { self.gl.delete_query(qry(query)) }
        }
    }

    fn begin_query(&self, target: u32, query: u32) {
        unsafe { self.gl.begin_query(target, qry(query)) }
    }

    fn end_query(&self, target: u32) {
        unsafe { self.gl.end_query(target) }
    }

    fn query_counter(&self, query: u32) {
        unsafe { self.gl.query_counter(qry(query), glow::TIMESTAMP) }
    }

    fn query_result_available(&self, query: u32) -> bool {
        unsafe {
            self.gl
                .get_query_parameter_u32(qry(query), glow::QUERY_RESULT_AVAILABLE)
                != 0
        }
    }

    fn query_result_u64(&self, query: u32) -> u64 {
        // 32-bit read; wide enough for occlusion counts and short intervals.
        unsafe { u64::from(self.gl.get_query_parameter_u32(qry(query), glow::QUERY_RESULT)) }
    }

    fn memory_barrier(&self, mask: u32) {
        unsafe { self.gl.memory_barrier(mask) }
    }

    fn flush(&self) {
        unsafe { self.gl.flush() }
    }

    fn finish(&self) {
        unsafe { self.gl.finish() }
    }
}

// ── Context and lock ──────────────────────────────────────────────

/// Callback that presents the default framebuffer, supplied by whoever owns
/// the native window (`SwapBuffers`, `eglSwapBuffers`, ...).
pub type SwapHook = Box<dyn FnMut() + Send>;

/// A GL function table paired with the shadow copy of its fixed-function
/// state. All replay and all immediate resource work goes through
/// [`Context::lock`], which serializes access to both.
pub struct Context {
    gl: Box<dyn Gl>,
    state: Mutex<StateCache>,
    swap: Mutex<Option<SwapHook>>,
}

impl Context {
    pub fn new(gl: Box<dyn Gl>) -> Self {
        Self {
            gl,
            state: Mutex::new(StateCache::new()),
            swap: Mutex::new(None),
        }
    }

    /// Acquire the context for a batch of GL work.
    pub fn lock(&self) -> ContextLock<'_> {
        ContextLock {
            gl: self.gl.as_ref(),
            state: self.state.lock(),
        }
    }

    pub fn set_swap_hook(&self, hook: SwapHook) {
        *self.swap.lock() = Some(hook);
    }

    /// Invoke the swap hook. Without one, presented frames can only be
    /// flushed.
    pub(crate) fn swap_buffers(&self) {
        match self.swap.lock().as_mut() {
            Some(hook) => hook(),
            None => {
                self.gl.flush();
                debug!("presented without a swap hook, flushed instead");
            }
        }
    }
}

/// Exclusive access token for GL work. Holding one proves the state cache
/// lock is held, so cached setters can trust their shadow values.
pub struct ContextLock<'a> {
    pub(crate) gl: &'a dyn Gl,
    pub(crate) state: MutexGuard<'a, StateCache>,
}

impl<'a> ContextLock<'a> {
    pub fn gl(&self) -> &'a dyn Gl {
        self.gl
    }
}
