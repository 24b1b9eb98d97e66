//! Pipelines and pipeline layouts.
//!
//! A pipeline layout flattens the (set, binding) space onto GL binding
//! points: texture units, image units, uniform and storage buffer indices.
//! A pipeline owns a linked GL program plus the fixed-function state block
//! its bind replays through the cached setters.
//!
//! Push constants have no GL equivalent, so a pipeline whose program
//! declares a `PushConstants` uniform block gets a small backing UBO on
//! binding point [`PUSH_CONSTANT_BINDING`]; push writes land there.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use ashes_api::{
    DescriptorType, DynamicState, Error, PipelineBindPoint, PipelineColorBlendState,
    PipelineDepthStencilState, PipelineInputAssemblyState, PipelineMultisampleState,
    PipelineRasterizationState, PipelineTessellationState, PipelineVertexInputState,
    PipelineViewportState, PrimitiveTopology, PushConstantRange, Result, ShaderStageFlags,
    StencilOpState,
};

use crate::context::ContextLock;
use crate::convert;
use crate::descriptor::DescriptorSetLayout;
use crate::device::DeviceShared;
use crate::registry::{ObjectId, ObjectKind};
use crate::render_pass::RenderPass;
use crate::shader::ShaderModule;
use crate::state::SCRATCH_UNIT;

/// Uniform buffer binding point reserved for the push-constant block.
/// Layout flattening never hands this index to a descriptor.
pub(crate) const PUSH_CONSTANT_BINDING: u32 = 30;

/// GL 4.2 guarantees at least this many image units.
const MAX_IMAGE_UNITS: u32 = 8;

/// GL 4.3 guarantees at least this many indexed SSBO binding points.
const MAX_STORAGE_BINDINGS: u32 = 8;

/// Upper bound for push-constant data when the layout declares no ranges
/// but the program still carries a `PushConstants` block.
const DEFAULT_PUSH_SIZE: u32 = 128;

// ── Layout flattening ─────────────────────────────────────────────

/// GL binding point a descriptor lands on once sets are flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlatBinding {
    TextureUnit(u32),
    ImageUnit(u32),
    UniformIndex(u32),
    StorageIndex(u32),
}

pub(crate) struct PipelineLayoutShared {
    device: Weak<DeviceShared>,
    set_layouts: Vec<DescriptorSetLayout>,
    push_constant_ranges: Vec<PushConstantRange>,
    flat: HashMap<(u32, u32), FlatBinding>,
    id: ObjectId,
}

impl Drop for PipelineLayoutShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::PipelineLayout);
        }
    }
}

/// Flattened binding map shared by pipelines and descriptor set binds.
#[derive(Clone)]
pub struct PipelineLayout {
    shared: Arc<PipelineLayoutShared>,
}

impl PipelineLayout {
    pub(crate) fn new(
        device: &Arc<DeviceShared>,
        set_layouts: Vec<DescriptorSetLayout>,
        push_constant_ranges: Vec<PushConstantRange>,
    ) -> Result<Self> {
        let max_push = device.properties.limits.max_push_constants_size;
        for range in &push_constant_ranges {
            if range.size == 0 || range.offset + range.size > max_push {
                return Err(Error::Validation(format!(
                    "push constant range {}..{} exceeds the {} byte limit",
                    range.offset,
                    range.offset + range.size,
                    max_push
                )));
            }
        }

        let mut flat = HashMap::new();
        let mut next_texture = 0u32;
        let mut next_image = 0u32;
        let mut next_uniform = 0u32;
        let mut next_storage = 0u32;
        for (set_index, layout) in set_layouts.iter().enumerate() {
            for binding in layout.bindings() {
                let assigned = match binding.descriptor_type {
                    DescriptorType::Sampler
                    | DescriptorType::CombinedImageSampler
                    | DescriptorType::SampledImage
                    | DescriptorType::UniformTexelBuffer
                    | DescriptorType::StorageTexelBuffer
                    | DescriptorType::InputAttachment => {
                        let unit = next_texture;
                        next_texture += binding.descriptor_count;
                        FlatBinding::TextureUnit(unit)
                    }
                    DescriptorType::StorageImage => {
                        let unit = next_image;
                        next_image += binding.descriptor_count;
                        FlatBinding::ImageUnit(unit)
                    }
                    DescriptorType::UniformBuffer | DescriptorType::UniformBufferDynamic => {
                        let index = next_uniform;
                        next_uniform += binding.descriptor_count;
                        FlatBinding::UniformIndex(index)
                    }
                    DescriptorType::StorageBuffer | DescriptorType::StorageBufferDynamic => {
                        let index = next_storage;
                        next_storage += binding.descriptor_count;
                        FlatBinding::StorageIndex(index)
                    }
                };
                flat.insert((set_index as u32, binding.binding), assigned);
            }
        }
        // The last texture unit is the transfer scratch unit and binding 30
        // backs push constants.
        if next_texture > SCRATCH_UNIT {
            return Err(Error::Validation(format!(
                "layout needs {} texture units but only {} are addressable",
                next_texture, SCRATCH_UNIT
            )));
        }
        if next_uniform > PUSH_CONSTANT_BINDING {
            return Err(Error::Validation(format!(
                "layout needs {} uniform buffer bindings but only {} are addressable",
                next_uniform, PUSH_CONSTANT_BINDING
            )));
        }
        if next_image > MAX_IMAGE_UNITS {
            return Err(Error::Validation(format!(
                "layout needs {} image units but only {} are addressable",
                next_image, MAX_IMAGE_UNITS
            )));
        }
        if next_storage > MAX_STORAGE_BINDINGS {
            return Err(Error::Validation(format!(
                "layout needs {} storage buffer bindings but only {} are addressable",
                next_storage, MAX_STORAGE_BINDINGS
            )));
        }

        let id = device.registry.register(ObjectKind::PipelineLayout);
        debug!(
            "created pipeline layout ({} sets, {} push constant ranges)",
            set_layouts.len(),
            push_constant_ranges.len()
        );
        Ok(Self {
            shared: Arc::new(PipelineLayoutShared {
                device: Arc::downgrade(device),
                set_layouts,
                push_constant_ranges,
                flat,
                id,
            }),
        })
    }

    pub fn set_layouts(&self) -> &[DescriptorSetLayout] {
        &self.shared.set_layouts
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.shared.push_constant_ranges
    }

    pub(crate) fn flat_binding(&self, set: u32, binding: u32) -> Option<FlatBinding> {
        self.shared.flat.get(&(set, binding)).copied()
    }

    /// Size of the push-constant backing store, padded to UBO-friendly
    /// 16-byte alignment.
    pub(crate) fn push_constant_size(&self) -> u32 {
        let highest = self
            .shared
            .push_constant_ranges
            .iter()
            .map(|range| range.offset + range.size)
            .max()
            .unwrap_or(DEFAULT_PUSH_SIZE);
        (highest + 15) & !15
    }
}

// ── Creation descriptions ─────────────────────────────────────────

#[derive(Clone)]
pub struct GraphicsPipelineCreateInfo {
    pub stages: Vec<ShaderModule>,
    pub vertex_input: PipelineVertexInputState,
    pub input_assembly: PipelineInputAssemblyState,
    pub tessellation: PipelineTessellationState,
    pub viewport: PipelineViewportState,
    pub rasterization: PipelineRasterizationState,
    pub multisample: PipelineMultisampleState,
    pub depth_stencil: PipelineDepthStencilState,
    pub color_blend: PipelineColorBlendState,
    pub dynamic_states: Vec<DynamicState>,
    pub layout: PipelineLayout,
    pub render_pass: RenderPass,
    pub subpass: u32,
}

#[derive(Clone)]
pub struct ComputePipelineCreateInfo {
    pub stage: ShaderModule,
    pub layout: PipelineLayout,
}

// ── Pipelines ─────────────────────────────────────────────────────

struct GraphicsState {
    vertex_input: PipelineVertexInputState,
    input_assembly: PipelineInputAssemblyState,
    tessellation: PipelineTessellationState,
    viewport: PipelineViewportState,
    rasterization: PipelineRasterizationState,
    multisample: PipelineMultisampleState,
    depth_stencil: PipelineDepthStencilState,
    color_blend: PipelineColorBlendState,
    dynamic: Vec<DynamicState>,
}

struct PushConstantState {
    /// Backing UBO, created on first write. 0 until then.
    buffer: Mutex<u32>,
    size: u32,
}

pub(crate) struct PipelineShared {
    device: Weak<DeviceShared>,
    program: u32,
    bind_point: PipelineBindPoint,
    layout: PipelineLayout,
    graphics: Option<GraphicsState>,
    push: Option<PushConstantState>,
    vertex_input_hash: u64,
    id: ObjectId,
}

impl Drop for PipelineShared {
    fn drop(&mut self) {
        let Some(device) = self.device.upgrade() else {
            debug!("pipeline outlived its device, skipping GL teardown");
            return;
        };
        {
            let mut lock = device.lock();
            lock.forget_program(self.program);
            lock.gl().delete_program(self.program);
            if let Some(push) = &self.push {
                let buffer = *push.buffer.lock();
                if buffer != 0 {
                    lock.forget_buffer(buffer);
                    lock.gl().delete_buffer(buffer);
                }
            }
        }
        device.registry.unregister(self.id, ObjectKind::Pipeline);
        debug!("destroyed pipeline: {}", self.program);
    }
}

/// A linked GL program plus the state its bind applies.
#[derive(Clone)]
pub struct Pipeline {
    shared: Arc<PipelineShared>,
}

impl Pipeline {
    pub(crate) fn new_graphics(
        device: &Arc<DeviceShared>,
        info: GraphicsPipelineCreateInfo,
    ) -> Result<Self> {
        let stage_mask = info
            .stages
            .iter()
            .fold(ShaderStageFlags::empty(), |mask, module| mask | module.stage());
        if !stage_mask.contains(ShaderStageFlags::VERTEX) {
            return Err(Error::Validation(
                "graphics pipeline requires a vertex stage".into(),
            ));
        }
        if stage_mask.contains(ShaderStageFlags::COMPUTE) {
            return Err(Error::Validation(
                "graphics pipeline cannot contain a compute stage".into(),
            ));
        }
        let distinct: u32 = info.stages.iter().map(|m| m.stage().bits().count_ones()).sum();
        if distinct != stage_mask.bits().count_ones() {
            return Err(Error::Validation("duplicate pipeline stage".into()));
        }
        if info.subpass >= info.render_pass.subpass_count() {
            return Err(Error::Validation(format!(
                "pipeline targets subpass {} of a {}-subpass render pass",
                info.subpass,
                info.render_pass.subpass_count()
            )));
        }
        for attribute in &info.vertex_input.attributes {
            if !info
                .vertex_input
                .bindings
                .iter()
                .any(|b| b.binding == attribute.binding)
            {
                return Err(Error::Validation(format!(
                    "vertex attribute {} references undeclared binding {}",
                    attribute.location, attribute.binding
                )));
            }
        }
        if info.input_assembly.topology == PrimitiveTopology::PatchList
            && info.tessellation.patch_control_points == 0
        {
            return Err(Error::Validation(
                "patch list topology requires a nonzero patch size".into(),
            ));
        }

        let raster = &info.rasterization;
        if raster.polygon_mode != ashes_api::PolygonMode::Fill
            && !device.features.fill_mode_non_solid
        {
            return Err(Error::FeatureNotPresent("non-solid fill modes"));
        }
        if raster.depth_clamp_enable && !device.features.depth_clamp {
            return Err(Error::FeatureNotPresent("depth clamp"));
        }
        if raster.line_width != 1.0
            && !info.dynamic_states.contains(&DynamicState::LineWidth)
            && !device.features.wide_lines
        {
            return Err(Error::FeatureNotPresent("wide lines"));
        }
        if info.depth_stencil.depth_bounds_test_enable {
            warn!("depth bounds test is not supported, ignoring");
        }
        if info.color_blend.logic_op_enable {
            warn!("blend logic ops are not supported, ignoring");
        }
        if let Some(first) = info.color_blend.attachments.first() {
            if info.color_blend.attachments.iter().any(|a| a != first) {
                warn!("per-attachment blend states differ, using attachment 0 for all");
            }
        }

        let vertex_input_hash = hash_vertex_input(&info.vertex_input);
        let program = link_program(device, &info.stages)?;
        let push = resolve_push_block(device, program, &info.layout);

        let id = device.registry.register(ObjectKind::Pipeline);
        debug!(
            "created graphics pipeline ({:?} stages, {} vertex bindings): {}",
            stage_mask,
            info.vertex_input.bindings.len(),
            program
        );
        Ok(Self {
            shared: Arc::new(PipelineShared {
                device: Arc::downgrade(device),
                program,
                bind_point: PipelineBindPoint::Graphics,
                layout: info.layout,
                graphics: Some(GraphicsState {
                    vertex_input: info.vertex_input,
                    input_assembly: info.input_assembly,
                    tessellation: info.tessellation,
                    viewport: info.viewport,
                    rasterization: info.rasterization,
                    multisample: info.multisample,
                    depth_stencil: info.depth_stencil,
                    color_blend: info.color_blend,
                    dynamic: info.dynamic_states,
                }),
                push,
                vertex_input_hash,
                id,
            }),
        })
    }

    pub(crate) fn new_compute(
        device: &Arc<DeviceShared>,
        info: ComputePipelineCreateInfo,
    ) -> Result<Self> {
        if info.stage.stage() != ShaderStageFlags::COMPUTE {
            return Err(Error::Validation(format!(
                "compute pipeline requires a compute stage, got {:?}",
                info.stage.stage()
            )));
        }
        let program = link_program(device, std::slice::from_ref(&info.stage))?;
        let push = resolve_push_block(device, program, &info.layout);

        let id = device.registry.register(ObjectKind::Pipeline);
        debug!("created compute pipeline: {}", program);
        Ok(Self {
            shared: Arc::new(PipelineShared {
                device: Arc::downgrade(device),
                program,
                bind_point: PipelineBindPoint::Compute,
                layout: info.layout,
                graphics: None,
                push,
                vertex_input_hash: 0,
                id,
            }),
        })
    }

    pub fn bind_point(&self) -> PipelineBindPoint {
        self.shared.bind_point
    }

    pub fn layout(&self) -> &PipelineLayout {
        &self.shared.layout
    }

    pub fn set_debug_name(&self, name: &str) {
        if let Some(device) = self.shared.device.upgrade() {
            device.registry.set_label(self.shared.id, name);
        }
    }

    pub(crate) fn program(&self) -> u32 {
        self.shared.program
    }

    pub(crate) fn device_shared(&self) -> Option<Arc<DeviceShared>> {
        self.shared.device.upgrade()
    }

    /// Hash of the vertex input description; two pipelines sharing it can
    /// reuse the same vertex array object.
    pub(crate) fn vertex_input_hash(&self) -> u64 {
        self.shared.vertex_input_hash
    }

    pub(crate) fn vertex_input(&self) -> Option<&PipelineVertexInputState> {
        self.shared.graphics.as_ref().map(|g| &g.vertex_input)
    }

    /// False when the pipeline declares no vertex attributes and draws
    /// must synthesize their geometry from the index stream.
    pub(crate) fn has_vertex_input(&self) -> bool {
        self.shared
            .graphics
            .as_ref()
            .is_some_and(|g| !g.vertex_input.is_empty())
    }

    pub(crate) fn primitive_mode(&self) -> u32 {
        match &self.shared.graphics {
            Some(graphics) => convert::topology(graphics.input_assembly.topology),
            None => glow::TRIANGLES,
        }
    }

    pub(crate) fn is_dynamic(&self, state: DynamicState) -> bool {
        self.shared
            .graphics
            .as_ref()
            .is_some_and(|g| g.dynamic.contains(&state))
    }

    /// Replays the pipeline onto the context: program, fixed-function
    /// state, and the push-constant range binding when one exists.
    pub(crate) fn apply(&self, lock: &mut ContextLock<'_>) {
        lock.set_program(self.shared.program);
        if let Some(push) = &self.shared.push {
            let buffer = *push.buffer.lock();
            if buffer != 0 {
                lock.set_buffer_range(
                    glow::UNIFORM_BUFFER,
                    PUSH_CONSTANT_BINDING,
                    buffer,
                    0,
                    push.size as i32,
                );
            }
        }
        let Some(gfx) = &self.shared.graphics else {
            return;
        };

        lock.set_cap(
            glow::PRIMITIVE_RESTART_FIXED_INDEX,
            gfx.input_assembly.primitive_restart_enable,
        );
        if gfx.input_assembly.topology == PrimitiveTopology::PatchList {
            lock.set_patch_vertices(gfx.tessellation.patch_control_points as i32);
        }

        if !self.is_dynamic(DynamicState::Viewport) {
            if let Some(viewport) = gfx.viewport.viewports.first() {
                lock.set_viewport(
                    viewport.x as i32,
                    viewport.y as i32,
                    viewport.width as i32,
                    viewport.height as i32,
                );
                lock.set_depth_range(viewport.min_depth, viewport.max_depth);
            }
        }
        if !self.is_dynamic(DynamicState::Scissor) {
            if let Some(scissor) = gfx.viewport.scissors.first() {
                lock.set_cap(glow::SCISSOR_TEST, true);
                lock.set_scissor_rect(
                    scissor.offset.x,
                    scissor.offset.y,
                    scissor.extent.width as i32,
                    scissor.extent.height as i32,
                );
            }
        }

        let raster = &gfx.rasterization;
        lock.set_cap(glow::RASTERIZER_DISCARD, raster.rasterizer_discard_enable);
        lock.set_cap(glow::DEPTH_CLAMP, raster.depth_clamp_enable);
        lock.set_polygon_mode(convert::polygon_mode(raster.polygon_mode));
        match convert::cull_mode(raster.cull_mode) {
            Some(face) => {
                lock.set_cap(glow::CULL_FACE, true);
                lock.set_cull_face(face);
            }
            None => lock.set_cap(glow::CULL_FACE, false),
        }
        lock.set_front_face(convert::front_face(raster.front_face));
        if !self.is_dynamic(DynamicState::DepthBias) {
            lock.set_cap(glow::POLYGON_OFFSET_FILL, raster.depth_bias_enable);
            if raster.depth_bias_enable {
                lock.set_polygon_offset(
                    raster.depth_bias_slope_factor,
                    raster.depth_bias_constant_factor,
                );
            }
        }
        if !self.is_dynamic(DynamicState::LineWidth) {
            lock.set_line_width(raster.line_width);
        }

        lock.set_cap(
            glow::SAMPLE_ALPHA_TO_COVERAGE,
            gfx.multisample.alpha_to_coverage_enable,
        );
        lock.set_cap(glow::SAMPLE_ALPHA_TO_ONE, gfx.multisample.alpha_to_one_enable);

        let depth = &gfx.depth_stencil;
        lock.set_cap(glow::DEPTH_TEST, depth.depth_test_enable);
        if depth.depth_test_enable {
            lock.set_depth_func(convert::compare_op(depth.depth_compare_op));
        }
        lock.set_depth_write(depth.depth_write_enable);
        lock.set_cap(glow::STENCIL_TEST, depth.stencil_test_enable);
        if depth.stencil_test_enable {
            apply_stencil_face(lock, glow::FRONT, &depth.front);
            apply_stencil_face(lock, glow::BACK, &depth.back);
        }

        let blend = &gfx.color_blend;
        if let Some(attachment) = blend.attachments.first() {
            lock.set_cap(glow::BLEND, attachment.blend_enable);
            if attachment.blend_enable {
                lock.set_blend_equation(
                    convert::blend_op(attachment.color_blend_op),
                    convert::blend_op(attachment.alpha_blend_op),
                );
                lock.set_blend_func(
                    convert::blend_factor(attachment.src_color_blend_factor),
                    convert::blend_factor(attachment.dst_color_blend_factor),
                    convert::blend_factor(attachment.src_alpha_blend_factor),
                    convert::blend_factor(attachment.dst_alpha_blend_factor),
                );
            }
            let mask = attachment.color_write_mask;
            lock.set_color_mask(
                mask.contains(ashes_api::ColorComponentFlags::R),
                mask.contains(ashes_api::ColorComponentFlags::G),
                mask.contains(ashes_api::ColorComponentFlags::B),
                mask.contains(ashes_api::ColorComponentFlags::A),
            );
        }
        lock.set_blend_color(blend.blend_constants);
    }

    /// Writes bytes into the push-constant backing store, creating it on
    /// first use, and leaves it bound on the reserved binding point.
    /// A pipeline whose program has no `PushConstants` block drops the
    /// write, matching programs that never read the pushed range.
    pub(crate) fn write_push_constants(&self, lock: &mut ContextLock<'_>, offset: u32, data: &[u8]) {
        let Some(push) = &self.shared.push else {
            debug!("push constants written to a pipeline without a PushConstants block");
            return;
        };
        let mut buffer = push.buffer.lock();
        if *buffer == 0 {
            let name = lock.gl().create_buffer();
            lock.set_buffer(glow::COPY_WRITE_BUFFER, name);
            lock.gl()
                .buffer_data(glow::COPY_WRITE_BUFFER, push.size as i32, glow::DYNAMIC_DRAW);
            *buffer = name;
        } else {
            lock.set_buffer(glow::COPY_WRITE_BUFFER, *buffer);
        }
        let end = (offset as usize).saturating_add(data.len());
        if end > push.size as usize {
            warn!(
                "push constant write {}..{} exceeds the {} byte block, clamping",
                offset, end, push.size
            );
        }
        let len = data.len().min((push.size as usize).saturating_sub(offset as usize));
        if len > 0 {
            lock.gl()
                .buffer_sub_data(glow::COPY_WRITE_BUFFER, offset as i32, &data[..len]);
        }
        lock.set_buffer_range(
            glow::UNIFORM_BUFFER,
            PUSH_CONSTANT_BINDING,
            *buffer,
            0,
            push.size as i32,
        );
    }
}

fn apply_stencil_face(lock: &mut ContextLock<'_>, face: u32, state: &StencilOpState) {
    lock.set_stencil_func(
        face,
        convert::compare_op(state.compare_op),
        state.reference as i32,
        state.compare_mask,
    );
    lock.set_stencil_op(
        face,
        convert::stencil_op(state.fail_op),
        convert::stencil_op(state.depth_fail_op),
        convert::stencil_op(state.pass_op),
    );
    lock.set_stencil_write_mask(face, state.write_mask);
}

/// Compiles every stage and links them into one program. Shader objects
/// are deleted once the link result is known.
fn link_program(device: &Arc<DeviceShared>, stages: &[ShaderModule]) -> Result<u32> {
    let lock = device.lock();
    let gl = lock.gl();
    let program = gl.create_program();
    if program == 0 {
        return Err(Error::OutOfDeviceMemory("program allocation failed".into()));
    }
    let mut shaders = Vec::with_capacity(stages.len());
    for module in stages {
        let shader = gl.create_shader(convert::shader_stage(module.stage()));
        gl.shader_source(shader, module.source());
        gl.compile_shader(shader);
        if !gl.shader_compile_ok(shader) {
            let log = gl.shader_info_log(shader);
            gl.delete_shader(shader);
            for &old in &shaders {
                gl.delete_shader(old);
            }
            gl.delete_program(program);
            return Err(Error::InitializationFailed(format!(
                "{:?} shader failed to compile: {}",
                module.stage(),
                log.trim()
            )));
        }
        gl.attach_shader(program, shader);
        shaders.push(shader);
    }
    gl.link_program(program);
    for &shader in &shaders {
        gl.delete_shader(shader);
    }
    if !gl.program_link_ok(program) {
        let log = gl.program_info_log(program);
        gl.delete_program(program);
        return Err(Error::InitializationFailed(format!(
            "program failed to link: {}",
            log.trim()
        )));
    }
    Ok(program)
}

/// Routes the program's `PushConstants` uniform block, when present, to
/// the reserved binding point and sizes its backing store.
fn resolve_push_block(
    device: &Arc<DeviceShared>,
    program: u32,
    layout: &PipelineLayout,
) -> Option<PushConstantState> {
    let lock = device.lock();
    let index = lock.gl().uniform_block_index(program, "PushConstants")?;
    lock.gl()
        .uniform_block_binding(program, index, PUSH_CONSTANT_BINDING);
    Some(PushConstantState {
        buffer: Mutex::new(0),
        size: layout.push_constant_size(),
    })
}

fn hash_vertex_input(state: &PipelineVertexInputState) -> u64 {
    let mut hasher = DefaultHasher::new();
    state.bindings.hash(&mut hasher);
    state.attributes.hash(&mut hasher);
    hasher.finish()
}
