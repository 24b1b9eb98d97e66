//! Shared test fixtures.
//!
//! [`FakeGl`] implements the backend's GL function table seam with a call
//! log and a byte-accurate buffer store, so replay tests can assert on the
//! exact GL traffic a submission produces and transfer tests can round-trip
//! real data. Object names come from one shared counter and are never zero.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use ashes_api::{
    AttachmentDescription, AttachmentLoadOp, AttachmentReference, AttachmentStoreOp, Extent2D,
    Format, ImageLayout, PipelineVertexInputState, RenderPassCreateInfo, SampleCount,
    ShaderStageFlags, SubpassDescription, VertexInputAttributeDescription,
    VertexInputBindingDescription, VertexInputRate,
};
use ashes_gl::{
    Device, Framebuffer, Gl, GraphicsPipelineCreateInfo, Pipeline, RenderPass,
};

pub const VERTEX_SRC: &str = "#version 330 core\nvoid main() { gl_Position = vec4(0.0, 0.0, 0.0, 1.0); }\n";
pub const FRAGMENT_SRC: &str = "#version 330 core\nout vec4 color;\nvoid main() { color = vec4(1.0); }\n";
pub const COMPUTE_SRC: &str = "#version 430 core\nlayout(local_size_x = 1) in;\nvoid main() {}\n";

/// Cloneable view of the GL calls a [`FakeGl`] has seen.
#[derive(Clone)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Number of logged calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }
}

/// Recording implementation of the GL seam.
///
/// Capability queries answer as a desktop GL context of the configured
/// version with no extensions. Buffer objects are backed by real byte
/// vectors keyed on the generic bind target, which makes uploads,
/// downloads, copies, and maps behave like the real thing.
pub struct FakeGl {
    version: (i32, i32),
    calls: Arc<Mutex<Vec<String>>>,
    next_name: AtomicU32,
    bound: Mutex<HashMap<u32, u32>>,
    buffers: Mutex<HashMap<u32, Vec<u8>>>,
}

impl FakeGl {
    pub fn new() -> Self {
        Self::with_version(4, 6)
    }

    pub fn with_version(major: i32, minor: i32) -> Self {
        Self {
            version: (major, minor),
            calls: Arc::new(Mutex::new(Vec::new())),
            next_name: AtomicU32::new(1),
            bound: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Grab the log handle before the fake moves into a device.
    pub fn log(&self) -> CallLog {
        CallLog(self.calls.clone())
    }

    fn push(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn name(&self, call: &str) -> u32 {
        self.push(call.to_string());
        self.next_name.fetch_add(1, Ordering::Relaxed)
    }

    fn bound_buffer(&self, target: u32) -> u32 {
        self.bound.lock().get(&target).copied().unwrap_or(0)
    }
}

impl Gl for FakeGl {
    fn get_integer(&self, pname: u32) -> i32 {
        match pname {
            glow::MAJOR_VERSION => self.version.0,
            glow::MINOR_VERSION => self.version.1,
            glow::MAX_TEXTURE_SIZE | glow::MAX_3D_TEXTURE_SIZE => 16384,
            glow::MAX_ARRAY_TEXTURE_LAYERS => 2048,
            glow::MAX_TEXTURE_BUFFER_SIZE => 1 << 27,
            glow::MAX_UNIFORM_BLOCK_SIZE => 65536,
            glow::MAX_SHADER_STORAGE_BLOCK_SIZE => 1 << 27,
            glow::MAX_COLOR_ATTACHMENTS => 8,
            glow::MAX_VERTEX_ATTRIBS => 16,
            glow::UNIFORM_BUFFER_OFFSET_ALIGNMENT => 256,
            glow::SHADER_STORAGE_BUFFER_OFFSET_ALIGNMENT => 32,
            _ => 0,
        }
    }

    fn get_string(&self, pname: u32) -> String {
        match pname {
            glow::RENDERER => "FakeGL".to_string(),
            glow::VENDOR => "ashes test".to_string(),
            glow::VERSION => format!("{}.{} fake", self.version.0, self.version.1),
            _ => String::new(),
        }
    }

    fn has_extension(&self, _name: &str) -> bool {
        false
    }

    fn get_error(&self) -> u32 {
        glow::NO_ERROR
    }

    fn create_buffer(&self) -> u32 {
        self.name("create_buffer")
    }

    fn delete_buffer(&self, buffer: u32) {
        self.push(format!("delete_buffer({buffer})"));
        self.buffers.lock().remove(&buffer);
    }

    fn bind_buffer(&self, target: u32, buffer: u32) {
        self.push(format!("bind_buffer({target:#x}, {buffer})"));
        self.bound.lock().insert(target, buffer);
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: u32) {
        self.push(format!("bind_buffer_base({target:#x}, {index}, {buffer})"));
    }

    fn bind_buffer_range(&self, target: u32, index: u32, buffer: u32, offset: i32, size: i32) {
        self.push(format!(
            "bind_buffer_range({target:#x}, {index}, {buffer}, {offset}, {size})"
        ));
    }

    fn buffer_data(&self, target: u32, size: i32, _usage: u32) {
        self.push(format!("buffer_data(size={size})"));
        let name = self.bound_buffer(target);
        if name != 0 {
            self.buffers.lock().insert(name, vec![0; size.max(0) as usize]);
        }
    }

    fn buffer_sub_data(&self, target: u32, offset: i32, data: &[u8]) {
        self.push(format!("buffer_sub_data(offset={offset}, len={})", data.len()));
        let name = self.bound_buffer(target);
        let mut buffers = self.buffers.lock();
        let store = buffers.entry(name).or_default();
        let end = offset as usize + data.len();
        if store.len() < end {
            store.resize(end, 0);
        }
        store[offset as usize..end].copy_from_slice(data);
    }

    fn read_buffer_sub_data(&self, target: u32, offset: i32, out: &mut [u8]) {
        self.push(format!("read_buffer_sub_data(offset={offset}, len={})", out.len()));
        let name = self.bound_buffer(target);
        let buffers = self.buffers.lock();
        if let Some(store) = buffers.get(&name) {
            let end = (offset as usize + out.len()).min(store.len());
            if offset as usize <= end {
                let src = &store[offset as usize..end];
                out[..src.len()].copy_from_slice(src);
            }
        }
    }

    fn copy_buffer_sub_data(
        &self,
        src_target: u32,
        dst_target: u32,
        src_offset: i32,
        dst_offset: i32,
        size: i32,
    ) {
        self.push(format!(
            "copy_buffer_sub_data(src={src_offset}, dst={dst_offset}, size={size})"
        ));
        let src_name = self.bound_buffer(src_target);
        let dst_name = self.bound_buffer(dst_target);
        let mut buffers = self.buffers.lock();
        let chunk: Vec<u8> = match buffers.get(&src_name) {
            Some(store) => {
                let start = src_offset as usize;
                let end = (start + size.max(0) as usize).min(store.len());
                store.get(start..end).map(<[u8]>::to_vec).unwrap_or_default()
            }
            None => return,
        };
        let store = buffers.entry(dst_name).or_default();
        let end = dst_offset as usize + chunk.len();
        if store.len() < end {
            store.resize(end, 0);
        }
        store[dst_offset as usize..end].copy_from_slice(&chunk);
    }

    fn map_buffer_range(&self, target: u32, offset: i32, length: i32, _access: u32) -> *mut u8 {
        self.push(format!("map_buffer_range(offset={offset}, len={length})"));
        let name = self.bound_buffer(target);
        let mut buffers = self.buffers.lock();
        let store = buffers.entry(name).or_default();
        let end = offset as usize + length.max(0) as usize;
        if store.len() < end {
            store.resize(end, 0);
        }
        // The caller unmaps before this vector can be resized again, so the
        // pointer stays valid for the duration of the map.
        unsafe { store.as_mut_ptr().add(offset as usize) }
    }

    fn flush_mapped_range(&self, _target: u32, _offset: i32, _length: i32) {
        self.push("flush_mapped_range".to_string());
    }

    fn unmap_buffer(&self, _target: u32) {
        self.push("unmap_buffer".to_string());
    }

    fn create_vertex_array(&self) -> u32 {
        self.name("create_vertex_array")
    }

    fn delete_vertex_array(&self, vao: u32) {
        self.push(format!("delete_vertex_array({vao})"));
    }

    fn bind_vertex_array(&self, vao: u32) {
        self.push(format!("bind_vertex_array({vao})"));
    }

    fn enable_vertex_attrib(&self, index: u32) {
        self.push(format!("enable_vertex_attrib({index})"));
    }

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        _size: i32,
        _data_type: u32,
        _normalized: bool,
        _stride: i32,
        _offset: i32,
    ) {
        self.push(format!("vertex_attrib_pointer_f32({index})"));
    }

    fn vertex_attrib_pointer_i32(
        &self,
        index: u32,
        _size: i32,
        _data_type: u32,
        _stride: i32,
        _offset: i32,
    ) {
        self.push(format!("vertex_attrib_pointer_i32({index})"));
    }

    fn vertex_attrib_divisor(&self, index: u32, divisor: u32) {
        self.push(format!("vertex_attrib_divisor({index}, {divisor})"));
    }

    fn create_texture(&self) -> u32 {
        self.name("create_texture")
    }

    fn delete_texture(&self, texture: u32) {
        self.push(format!("delete_texture({texture})"));
    }

    fn active_texture(&self, unit: u32) {
        self.push(format!("active_texture({unit})"));
    }

    fn bind_texture(&self, target: u32, texture: u32) {
        self.push(format!("bind_texture({target:#x}, {texture})"));
    }

    fn tex_storage_2d(&self, _target: u32, levels: i32, _internal_format: u32, width: i32, height: i32) {
        self.push(format!("tex_storage_2d({width}x{height}, levels={levels})"));
    }

    fn tex_storage_3d(
        &self,
        _target: u32,
        levels: i32,
        _internal_format: u32,
        width: i32,
        height: i32,
        depth: i32,
    ) {
        self.push(format!("tex_storage_3d({width}x{height}x{depth}, levels={levels})"));
    }

    fn tex_sub_image_2d(
        &self,
        _target: u32,
        level: i32,
        _x: i32,
        _y: i32,
        width: i32,
        height: i32,
        _format: u32,
        _data_type: u32,
        _data: &[u8],
    ) {
        self.push(format!("tex_sub_image_2d({width}x{height}, level={level})"));
    }

    fn tex_sub_image_2d_pbo(
        &self,
        _target: u32,
        level: i32,
        _x: i32,
        _y: i32,
        width: i32,
        height: i32,
        _format: u32,
        _data_type: u32,
        offset: u32,
    ) {
        self.push(format!(
            "tex_sub_image_2d_pbo({width}x{height}, level={level}, offset={offset})"
        ));
    }

    fn tex_sub_image_3d(
        &self,
        _target: u32,
        level: i32,
        _x: i32,
        _y: i32,
        _z: i32,
        width: i32,
        height: i32,
        depth: i32,
        _format: u32,
        _data_type: u32,
        _data: &[u8],
    ) {
        self.push(format!("tex_sub_image_3d({width}x{height}x{depth}, level={level})"));
    }

    fn tex_sub_image_3d_pbo(
        &self,
        _target: u32,
        level: i32,
        _x: i32,
        _y: i32,
        _z: i32,
        width: i32,
        height: i32,
        depth: i32,
        _format: u32,
        _data_type: u32,
        offset: u32,
    ) {
        self.push(format!(
            "tex_sub_image_3d_pbo({width}x{height}x{depth}, level={level}, offset={offset})"
        ));
    }

    fn generate_mipmap(&self, _target: u32) {
        self.push("generate_mipmap".to_string());
    }

    fn tex_parameter_i32(&self, _target: u32, _pname: u32, _value: i32) {
        self.push("tex_parameter_i32".to_string());
    }

    fn pixel_store_i32(&self, _pname: u32, _value: i32) {
        self.push("pixel_store_i32".to_string());
    }

    fn read_pixels_pbo(
        &self,
        _x: i32,
        _y: i32,
        width: i32,
        height: i32,
        _format: u32,
        _data_type: u32,
        offset: u32,
    ) {
        self.push(format!("read_pixels_pbo({width}x{height}, offset={offset})"));
    }

    fn bind_image_texture(
        &self,
        unit: u32,
        texture: u32,
        _level: i32,
        _layered: bool,
        _layer: i32,
        _access: u32,
        _format: u32,
    ) {
        self.push(format!("bind_image_texture({unit}, {texture})"));
    }

    fn tex_buffer(&self, _target: u32, _internal_format: u32, buffer: u32) {
        self.push(format!("tex_buffer({buffer})"));
    }

    fn tex_buffer_range(&self, _target: u32, _internal_format: u32, buffer: u32, offset: i32, size: i32) {
        self.push(format!("tex_buffer_range({buffer}, {offset}, {size})"));
    }

    fn create_sampler(&self) -> u32 {
        self.name("create_sampler")
    }

    fn delete_sampler(&self, sampler: u32) {
        self.push(format!("delete_sampler({sampler})"));
    }

    fn bind_sampler(&self, unit: u32, sampler: u32) {
        self.push(format!("bind_sampler({unit}, {sampler})"));
    }

    fn sampler_parameter_i32(&self, _sampler: u32, _pname: u32, _value: i32) {
        self.push("sampler_parameter_i32".to_string());
    }

    fn sampler_parameter_f32(&self, _sampler: u32, _pname: u32, _value: f32) {
        self.push("sampler_parameter_f32".to_string());
    }

    fn sampler_parameter_f32_slice(&self, _sampler: u32, _pname: u32, _values: &[f32]) {
        self.push("sampler_parameter_f32_slice".to_string());
    }

    fn create_framebuffer(&self) -> u32 {
        self.name("create_framebuffer")
    }

    fn delete_framebuffer(&self, fb: u32) {
        self.push(format!("delete_framebuffer({fb})"));
    }

    fn bind_framebuffer(&self, target: u32, fb: u32) {
        self.push(format!("bind_framebuffer({target:#x}, {fb})"));
    }

    fn framebuffer_texture(&self, _target: u32, attachment: u32, texture: u32, _level: i32) {
        self.push(format!("framebuffer_texture({attachment:#x}, {texture})"));
    }

    fn framebuffer_texture_2d(
        &self,
        _target: u32,
        attachment: u32,
        _tex_target: u32,
        texture: u32,
        _level: i32,
    ) {
        self.push(format!("framebuffer_texture_2d({attachment:#x}, {texture})"));
    }

    fn framebuffer_texture_layer(
        &self,
        _target: u32,
        attachment: u32,
        texture: u32,
        _level: i32,
        layer: i32,
    ) {
        self.push(format!("framebuffer_texture_layer({attachment:#x}, {texture}, {layer})"));
    }

    fn check_framebuffer_status(&self, _target: u32) -> u32 {
        glow::FRAMEBUFFER_COMPLETE
    }

    fn draw_buffers(&self, bufs: &[u32]) {
        self.push(format!("draw_buffers(len={})", bufs.len()));
    }

    fn read_buffer(&self, _src: u32) {
        self.push("read_buffer".to_string());
    }

    fn blit_framebuffer(
        &self,
        _src_x0: i32,
        _src_y0: i32,
        _src_x1: i32,
        _src_y1: i32,
        _dst_x0: i32,
        _dst_y0: i32,
        _dst_x1: i32,
        _dst_y1: i32,
        _mask: u32,
        _filter: u32,
    ) {
        self.push("blit_framebuffer".to_string());
    }

    fn clear_buffer_f32(&self, _target: u32, draw_buffer: u32, _values: &[f32]) {
        self.push(format!("clear_buffer_f32(slot={draw_buffer})"));
    }

    fn clear_buffer_i32(&self, _target: u32, draw_buffer: u32, _values: &[i32]) {
        self.push(format!("clear_buffer_i32(slot={draw_buffer})"));
    }

    fn clear_buffer_u32(&self, _target: u32, draw_buffer: u32, _values: &[u32]) {
        self.push(format!("clear_buffer_u32(slot={draw_buffer})"));
    }

    fn clear_buffer_depth_stencil(&self, _draw_buffer: u32, depth: f32, stencil: i32) {
        self.push(format!("clear_buffer_depth_stencil({depth}, {stencil})"));
    }

    fn create_program(&self) -> u32 {
        self.name("create_program")
    }

    fn delete_program(&self, program: u32) {
        self.push(format!("delete_program({program})"));
    }

    fn create_shader(&self, _stage: u32) -> u32 {
        self.name("create_shader")
    }

    fn delete_shader(&self, shader: u32) {
        self.push(format!("delete_shader({shader})"));
    }

    fn shader_source(&self, _shader: u32, _source: &str) {
        self.push("shader_source".to_string());
    }

    fn compile_shader(&self, _shader: u32) {
        self.push("compile_shader".to_string());
    }

    fn shader_compile_ok(&self, _shader: u32) -> bool {
        true
    }

    fn shader_info_log(&self, _shader: u32) -> String {
        String::new()
    }

    fn attach_shader(&self, _program: u32, _shader: u32) {
        self.push("attach_shader".to_string());
    }

    fn link_program(&self, program: u32) {
        self.push(format!("link_program({program})"));
    }

    fn program_link_ok(&self, _program: u32) -> bool {
        true
    }

    fn program_info_log(&self, _program: u32) -> String {
        String::new()
    }

    fn use_program(&self, program: u32) {
        self.push(format!("use_program({program})"));
    }

    fn uniform_block_index(&self, _program: u32, _name: &str) -> Option<u32> {
        None
    }

    fn uniform_block_binding(&self, _program: u32, _index: u32, _binding: u32) {
        self.push("uniform_block_binding".to_string());
    }

    fn enable(&self, cap: u32) {
        self.push(format!("enable({cap:#x})"));
    }

    fn disable(&self, cap: u32) {
        self.push(format!("disable({cap:#x})"));
    }

    fn viewport(&self, _x: i32, _y: i32, width: i32, height: i32) {
        self.push(format!("viewport({width}x{height})"));
    }

    fn scissor(&self, _x: i32, _y: i32, width: i32, height: i32) {
        self.push(format!("scissor({width}x{height})"));
    }

    fn front_face(&self, _mode: u32) {
        self.push("front_face".to_string());
    }

    fn cull_face(&self, _mode: u32) {
        self.push("cull_face".to_string());
    }

    fn polygon_mode(&self, _mode: u32) {
        self.push("polygon_mode".to_string());
    }

    fn line_width(&self, width: f32) {
        self.push(format!("line_width({width})"));
    }

    fn polygon_offset(&self, _factor: f32, _units: f32) {
        self.push("polygon_offset".to_string());
    }

    fn depth_func(&self, _func: u32) {
        self.push("depth_func".to_string());
    }

    fn depth_mask(&self, write: bool) {
        self.push(format!("depth_mask({write})"));
    }

    fn depth_range(&self, _near: f32, _far: f32) {
        self.push("depth_range".to_string());
    }

    fn color_mask(&self, _r: bool, _g: bool, _b: bool, _a: bool) {
        self.push("color_mask".to_string());
    }

    fn stencil_func(&self, _face: u32, _func: u32, _reference: i32, _mask: u32) {
        self.push("stencil_func".to_string());
    }

    fn stencil_op(&self, _face: u32, _fail: u32, _depth_fail: u32, _pass: u32) {
        self.push("stencil_op".to_string());
    }

    fn stencil_write_mask(&self, _face: u32, _mask: u32) {
        self.push("stencil_write_mask".to_string());
    }

    fn blend_equation(&self, _rgb: u32, _alpha: u32) {
        self.push("blend_equation".to_string());
    }

    fn blend_func(&self, _src_rgb: u32, _dst_rgb: u32, _src_alpha: u32, _dst_alpha: u32) {
        self.push("blend_func".to_string());
    }

    fn blend_color(&self, _r: f32, _g: f32, _b: f32, _a: f32) {
        self.push("blend_color".to_string());
    }

    fn patch_vertices(&self, count: i32) {
        self.push(format!("patch_vertices({count})"));
    }

    fn draw_arrays(&self, _mode: u32, first: i32, count: i32, instances: i32, _base_instance: u32) {
        self.push(format!("draw_arrays(first={first}, count={count}, instances={instances})"));
    }

    fn draw_elements(
        &self,
        _mode: u32,
        count: i32,
        _element_type: u32,
        offset: i32,
        instances: i32,
        _base_vertex: i32,
        _base_instance: u32,
    ) {
        self.push(format!(
            "draw_elements(count={count}, offset={offset}, instances={instances})"
        ));
    }

    fn draw_arrays_indirect(&self, _mode: u32, offset: i32) {
        self.push(format!("draw_arrays_indirect(offset={offset})"));
    }

    fn draw_elements_indirect(&self, _mode: u32, _element_type: u32, offset: i32) {
        self.push(format!("draw_elements_indirect(offset={offset})"));
    }

    fn dispatch(&self, x: u32, y: u32, z: u32) {
        self.push(format!("dispatch({x}, {y}, {z})"));
    }

    fn dispatch_indirect(&self, offset: i32) {
        self.push(format!("dispatch_indirect(offset={offset})"));
    }

    fn create_query(&self) -> u32 {
        self.name("create_query")
    }

    fn delete_query(&self, query: u32) {
        self.push(format!("delete_query({query})"));
    }

    fn begin_query(&self, _target: u32, query: u32) {
        self.push(format!("begin_query({query})"));
    }

    fn end_query(&self, _target: u32) {
        self.push("end_query".to_string());
    }

    fn query_counter(&self, query: u32) {
        self.push(format!("query_counter({query})"));
    }

    fn query_result_available(&self, _query: u32) -> bool {
        true
    }

    fn query_result_u64(&self, _query: u32) -> u64 {
        7
    }

    fn memory_barrier(&self, mask: u32) {
        self.push(format!("memory_barrier({mask:#x})"));
    }

    fn flush(&self) {
        self.push("flush".to_string());
    }

    fn finish(&self) {
        self.push("finish".to_string());
    }
}

/// GL 4.6 device over a fresh fake, plus the call log watching it.
pub fn new_device() -> (Device, CallLog) {
    ashes_common::logging::init_logging();
    let fake = FakeGl::new();
    let log = fake.log();
    let device = match Device::new(Box::new(fake)) {
        Ok(device) => device,
        Err(err) => panic!("device creation failed: {err}"),
    };
    (device, log)
}

/// GL 3.3 device: no compute, no multi-draw indirect, no texel buffer range.
pub fn gl33_device() -> (Device, CallLog) {
    ashes_common::logging::init_logging();
    let fake = FakeGl::with_version(3, 3);
    let log = fake.log();
    let device = match Device::new(Box::new(fake)) {
        Ok(device) => device,
        Err(err) => panic!("device creation failed: {err}"),
    };
    (device, log)
}

/// Render pass with no attachments and `subpasses` empty subpasses, plus a
/// 64x64 framebuffer for it.
pub fn bare_pass(device: &Device, subpasses: usize) -> (RenderPass, Framebuffer) {
    let info = RenderPassCreateInfo {
        attachments: Vec::new(),
        subpasses: vec![SubpassDescription::default(); subpasses],
        dependencies: Vec::new(),
    };
    let render_pass = device.create_render_pass(&info).unwrap();
    let framebuffer = device
        .create_framebuffer(
            &render_pass,
            Vec::new(),
            Extent2D { width: 64, height: 64 },
            1,
        )
        .unwrap();
    (render_pass, framebuffer)
}

/// Single-subpass pass with one clearable color attachment.
pub fn color_pass(device: &Device) -> RenderPassCreateInfo {
    RenderPassCreateInfo {
        attachments: vec![AttachmentDescription {
            format: Format::R8G8B8A8Unorm,
            samples: SampleCount::Count1,
            load_op: AttachmentLoadOp::Clear,
            store_op: AttachmentStoreOp::Store,
            stencil_load_op: AttachmentLoadOp::DontCare,
            stencil_store_op: AttachmentStoreOp::DontCare,
            initial_layout: ImageLayout::Undefined,
            final_layout: ImageLayout::ColorAttachmentOptimal,
        }],
        subpasses: vec![SubpassDescription {
            color_attachments: vec![AttachmentReference {
                attachment: 0,
                layout: ImageLayout::ColorAttachmentOptimal,
            }],
            ..SubpassDescription::default()
        }],
        dependencies: Vec::new(),
    }
}

/// Graphics pipeline with no vertex input; draws route through the shared
/// identity index buffer.
pub fn procedural_pipeline(device: &Device, render_pass: &RenderPass) -> Pipeline {
    graphics_pipeline(device, render_pass, PipelineVertexInputState::default())
}

/// Graphics pipeline reading one vec4 attribute from binding 0.
pub fn mesh_pipeline(device: &Device, render_pass: &RenderPass) -> Pipeline {
    graphics_pipeline(
        device,
        render_pass,
        PipelineVertexInputState {
            bindings: vec![VertexInputBindingDescription {
                binding: 0,
                stride: 16,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes: vec![VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: Format::R32G32B32A32Sfloat,
                offset: 0,
            }],
        },
    )
}

pub fn graphics_pipeline(
    device: &Device,
    render_pass: &RenderPass,
    vertex_input: PipelineVertexInputState,
) -> Pipeline {
    let vertex = device
        .create_shader_module(ShaderStageFlags::VERTEX, VERTEX_SRC)
        .unwrap();
    let fragment = device
        .create_shader_module(ShaderStageFlags::FRAGMENT, FRAGMENT_SRC)
        .unwrap();
    let layout = device.create_pipeline_layout(Vec::new(), Vec::new()).unwrap();
    device
        .create_graphics_pipeline(GraphicsPipelineCreateInfo {
            stages: vec![vertex, fragment],
            vertex_input,
            input_assembly: Default::default(),
            tessellation: Default::default(),
            viewport: Default::default(),
            rasterization: Default::default(),
            multisample: Default::default(),
            depth_stencil: Default::default(),
            color_blend: Default::default(),
            dynamic_states: Vec::new(),
            layout,
            render_pass: render_pass.clone(),
            subpass: 0,
        })
        .unwrap()
}
