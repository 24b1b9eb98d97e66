//! Logical device over one GL context.
//!
//! [`Device`] owns the context, the shadow state cache and the debug
//! registry. Resources hold a weak reference back to [`DeviceShared`]; a
//! resource dropped after its device skips GL teardown instead of touching a
//! dead context.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use ashes_api::{
    BackendFeatures, BufferCreateInfo, DescriptorPoolSize, DescriptorSetLayoutBinding, Error,
    Extent2D, FenceCreateFlags, Format, ImageCreateInfo, ImageViewCreateInfo, MemoryHeap,
    MemoryPropertyFlags, MemoryType, PhysicalDeviceFeatures, PhysicalDeviceLimits,
    PhysicalDeviceMemoryProperties, PhysicalDeviceProperties, PhysicalDeviceType,
    PushConstantRange, QueryType, QueueFamilyProperties, QueueFlags, RenderPassCreateInfo, Result,
    SamplerCreateInfo, ShaderStageFlags,
};

use crate::buffer::{Buffer, BufferView};
use crate::command_buffer::CommandPool;
use crate::context::{Context, ContextLock, Gl, SwapHook};
use crate::descriptor::{DescriptorPool, DescriptorSetLayout};
use crate::framebuffer::Framebuffer;
use crate::image::{Image, ImageView};
use crate::pipeline::{
    ComputePipelineCreateInfo, GraphicsPipelineCreateInfo, Pipeline, PipelineLayout,
};
use crate::query::QueryPool;
use crate::queue::Queue;
use crate::registry::Registry;
use crate::render_pass::RenderPass;
use crate::sampler::Sampler;
use crate::shader::ShaderModule;
use crate::swapchain::{Swapchain, SwapchainCreateInfo};
use crate::sync::{Event, Fence, Semaphore};

const GPU_MEMORY_INFO_DEDICATED_VIDMEM_NVX: u32 = 0x9047;

/// Identity index count backing the shared empty vertex array.
pub(crate) const EMPTY_INDEX_COUNT: u32 = 1 << 16;

#[derive(Debug, Clone, Copy, Default)]
struct EmptyGeometry {
    vao: u32,
    index_buffer: u32,
}

pub struct DeviceShared {
    pub(crate) context: Context,
    pub(crate) registry: Registry,
    pub(crate) properties: PhysicalDeviceProperties,
    pub(crate) features: PhysicalDeviceFeatures,
    pub(crate) backend: BackendFeatures,
    pub(crate) memory: PhysicalDeviceMemoryProperties,
    pub(crate) queue_family: QueueFamilyProperties,
    empty_geometry: Mutex<EmptyGeometry>,
}

impl DeviceShared {
    pub(crate) fn lock(&self) -> ContextLock<'_> {
        self.context.lock()
    }

    /// Vertex array with no attributes and an identity index buffer bound.
    /// Draws recorded without a vertex layout replay through it as indexed
    /// draws. Created on first use. Returns `(vao, index buffer)`.
    pub(crate) fn empty_indexed_vao(&self, lock: &mut ContextLock<'_>) -> (u32, u32) {
        let mut cached = self.empty_geometry.lock();
        if cached.vao == 0 {
            let indices: Vec<u32> = (0..EMPTY_INDEX_COUNT).collect();
            let bytes: &[u8] = bytemuck::cast_slice(&indices);
            let index_buffer = lock.gl.create_buffer();
            let vao = lock.gl.create_vertex_array();
            // The element binding is vertex array state, so fill it with the
            // array bound.
            lock.force_vertex_array(vao);
            lock.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index_buffer);
            lock.gl
                .buffer_data(glow::ELEMENT_ARRAY_BUFFER, bytes.len() as i32, glow::STATIC_DRAW);
            lock.gl.buffer_sub_data(glow::ELEMENT_ARRAY_BUFFER, 0, bytes);
            lock.force_vertex_array(0);
            *cached = EmptyGeometry { vao, index_buffer };
            debug!(
                "created identity-indexed vertex array ({} indices)",
                EMPTY_INDEX_COUNT
            );
        }
        (cached.vao, cached.index_buffer)
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        let geometry = *self.empty_geometry.get_mut();
        if geometry.vao != 0 {
            let lock = self.context.lock();
            lock.gl.delete_vertex_array(geometry.vao);
            lock.gl.delete_buffer(geometry.index_buffer);
        }
        let leaked = self.registry.report_leaks();
        if leaked > 0 {
            warn!("device destroyed with {} objects still alive", leaked);
        } else {
            debug!("device destroyed");
        }
    }
}

/// Owning handle to the logical device.
#[derive(Clone)]
pub struct Device {
    shared: Arc<DeviceShared>,
}

impl Device {
    /// Wrap a GL function table. Fails with `InitializationFailed` when the
    /// context is below GL 3.3.
    pub fn new(gl: Box<dyn Gl>) -> Result<Self> {
        let context = Context::new(gl);
        let (properties, features, backend, memory) = {
            let lock = context.lock();
            probe(lock.gl())?
        };
        info!(
            "created device: {} ({}), GL {}",
            properties.device_name, properties.vendor_name, properties.api_version
        );
        debug!("features: {:?}", features);
        debug!("backend features: {:?}", backend);
        let shared = Arc::new(DeviceShared {
            context,
            registry: Registry::new(),
            properties,
            features,
            backend,
            memory,
            queue_family: QueueFamilyProperties {
                queue_flags: QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER,
                queue_count: 1,
                timestamp_valid_bits: 64,
            },
            empty_geometry: Mutex::new(EmptyGeometry::default()),
        });
        Ok(Self { shared })
    }

    /// Load the system GL library and build a device over it. The native
    /// context must already be current on this thread.
    pub fn from_system() -> Result<Self> {
        let gl = crate::loader::load_system_gl()?;
        Self::new(gl)
    }

    pub(crate) fn shared(&self) -> &Arc<DeviceShared> {
        &self.shared
    }

    pub fn properties(&self) -> &PhysicalDeviceProperties {
        &self.shared.properties
    }

    pub fn limits(&self) -> &PhysicalDeviceLimits {
        &self.shared.properties.limits
    }

    pub fn features(&self) -> &PhysicalDeviceFeatures {
        &self.shared.features
    }

    pub fn backend_features(&self) -> &BackendFeatures {
        &self.shared.backend
    }

    pub fn memory_properties(&self) -> &PhysicalDeviceMemoryProperties {
        &self.shared.memory
    }

    pub fn queue_family_properties(&self) -> &QueueFamilyProperties {
        &self.shared.queue_family
    }

    /// The single queue. Handles are cheap and interchangeable.
    pub fn queue(&self) -> Queue {
        Queue::new(self.shared.clone())
    }

    /// Block until all submitted GL work has completed.
    pub fn wait_idle(&self) {
        let lock = self.shared.lock();
        lock.gl.finish();
    }

    /// Install the window-system callback used by presentation.
    pub fn set_swap_hook(&self, hook: SwapHook) {
        self.shared.context.set_swap_hook(hook);
    }

    /// Number of live objects tracked by the debug registry.
    pub fn live_object_count(&self) -> usize {
        self.shared.registry.live_count()
    }

    // ── Resource creation ─────────────────────────────────────────

    pub fn create_buffer(&self, info: &BufferCreateInfo) -> Result<Buffer> {
        Buffer::new(&self.shared, info)
    }

    pub fn create_buffer_view(
        &self,
        buffer: &Buffer,
        format: Format,
        offset: u64,
        range: u64,
    ) -> Result<BufferView> {
        BufferView::new(&self.shared, buffer, format, offset, range)
    }

    pub fn create_image(&self, info: &ImageCreateInfo) -> Result<Image> {
        Image::new(&self.shared, info)
    }

    pub fn create_image_view(&self, image: &Image, info: &ImageViewCreateInfo) -> Result<ImageView> {
        ImageView::new(&self.shared, image, info)
    }

    pub fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<Sampler> {
        Sampler::new(&self.shared, info)
    }

    pub fn create_descriptor_set_layout(
        &self,
        bindings: Vec<DescriptorSetLayoutBinding>,
    ) -> Result<DescriptorSetLayout> {
        DescriptorSetLayout::new(&self.shared, bindings)
    }

    pub fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: Vec<DescriptorPoolSize>,
    ) -> Result<DescriptorPool> {
        DescriptorPool::new(&self.shared, max_sets, sizes)
    }

    pub fn create_render_pass(&self, info: &RenderPassCreateInfo) -> Result<RenderPass> {
        RenderPass::new(&self.shared, info)
    }

    pub fn create_framebuffer(
        &self,
        render_pass: &RenderPass,
        attachments: Vec<ImageView>,
        extent: Extent2D,
        layers: u32,
    ) -> Result<Framebuffer> {
        Framebuffer::new(&self.shared, render_pass, attachments, extent, layers)
    }

    pub fn create_shader_module(&self, stage: ShaderStageFlags, source: &str) -> Result<ShaderModule> {
        ShaderModule::new(&self.shared, stage, source)
    }

    pub fn create_pipeline_layout(
        &self,
        set_layouts: Vec<DescriptorSetLayout>,
        push_constant_ranges: Vec<PushConstantRange>,
    ) -> Result<PipelineLayout> {
        PipelineLayout::new(&self.shared, set_layouts, push_constant_ranges)
    }

    pub fn create_graphics_pipeline(&self, info: GraphicsPipelineCreateInfo) -> Result<Pipeline> {
        Pipeline::new_graphics(&self.shared, info)
    }

    pub fn create_compute_pipeline(&self, info: ComputePipelineCreateInfo) -> Result<Pipeline> {
        Pipeline::new_compute(&self.shared, info)
    }

    pub fn create_command_pool(&self) -> CommandPool {
        CommandPool::new(&self.shared)
    }

    pub fn create_query_pool(&self, query_type: QueryType, count: u32, precise: bool) -> Result<QueryPool> {
        QueryPool::new(&self.shared, query_type, count, precise)
    }

    pub fn create_fence(&self, flags: FenceCreateFlags) -> Fence {
        Fence::new(&self.shared, flags)
    }

    pub fn create_semaphore(&self) -> Semaphore {
        Semaphore::new(&self.shared)
    }

    pub fn create_event(&self) -> Event {
        Event::new(&self.shared)
    }

    /// Build a swapchain, or log and return `None` if its backing resources
    /// cannot be created.
    pub fn create_swapchain(&self, info: &SwapchainCreateInfo) -> Option<Swapchain> {
        Swapchain::new(&self.shared, info)
    }
}

// ── Capability probing ────────────────────────────────────────────

type Probed = (
    PhysicalDeviceProperties,
    PhysicalDeviceFeatures,
    BackendFeatures,
    PhysicalDeviceMemoryProperties,
);

fn probe(gl: &dyn Gl) -> Result<Probed> {
    let major = gl.get_integer(glow::MAJOR_VERSION);
    let minor = gl.get_integer(glow::MINOR_VERSION);
    let version = (major, minor);
    if version < (3, 3) {
        return Err(Error::InitializationFailed(format!(
            "GL {}.{} is below the required 3.3",
            major, minor
        )));
    }
    let at_least = |maj: i32, min: i32| version >= (maj, min);

    let renderer = gl.get_string(glow::RENDERER);
    let vendor = gl.get_string(glow::VENDOR);
    let api_version = gl.get_string(glow::VERSION);

    let storage_buffers = at_least(4, 3) || gl.has_extension("GL_ARB_shader_storage_buffer_object");
    let max_texture_size = gl.get_integer(glow::MAX_TEXTURE_SIZE) as u32;
    let limits = PhysicalDeviceLimits {
        max_image_dimension_1d: max_texture_size,
        max_image_dimension_2d: max_texture_size,
        max_image_dimension_3d: gl.get_integer(glow::MAX_3D_TEXTURE_SIZE) as u32,
        max_image_array_layers: gl.get_integer(glow::MAX_ARRAY_TEXTURE_LAYERS) as u32,
        max_texel_buffer_elements: gl.get_integer(glow::MAX_TEXTURE_BUFFER_SIZE) as u32,
        max_uniform_buffer_range: gl.get_integer(glow::MAX_UNIFORM_BLOCK_SIZE) as u32,
        max_storage_buffer_range: if storage_buffers {
            gl.get_integer(glow::MAX_SHADER_STORAGE_BLOCK_SIZE) as u32
        } else {
            0
        },
        max_push_constants_size: 128,
        max_color_attachments: gl.get_integer(glow::MAX_COLOR_ATTACHMENTS) as u32,
        max_vertex_input_attributes: gl.get_integer(glow::MAX_VERTEX_ATTRIBS) as u32,
        max_vertex_input_bindings: gl.get_integer(glow::MAX_VERTEX_ATTRIBS) as u32,
        max_viewports: 1,
        min_uniform_buffer_offset_alignment: gl
            .get_integer(glow::UNIFORM_BUFFER_OFFSET_ALIGNMENT)
            .max(1) as u64,
        min_storage_buffer_offset_alignment: if storage_buffers {
            gl.get_integer(glow::SHADER_STORAGE_BUFFER_OFFSET_ALIGNMENT).max(1) as u64
        } else {
            256
        },
        timestamp_period: 1.0,
    };

    let properties = PhysicalDeviceProperties {
        device_type: classify_renderer(&renderer),
        device_name: renderer,
        vendor_name: vendor,
        api_version,
        limits,
    };

    let features = PhysicalDeviceFeatures {
        multi_draw_indirect: at_least(4, 3) || gl.has_extension("GL_ARB_multi_draw_indirect"),
        geometry_shader: true,
        tessellation_shader: at_least(4, 0) || gl.has_extension("GL_ARB_tessellation_shader"),
        sampler_anisotropy: at_least(4, 6)
            || gl.has_extension("GL_EXT_texture_filter_anisotropic")
            || gl.has_extension("GL_ARB_texture_filter_anisotropic"),
        sample_rate_shading: at_least(4, 0),
        fill_mode_non_solid: true,
        wide_lines: true,
        depth_clamp: true,
        independent_blend: false,
        occlusion_query_precise: true,
    };

    let backend = BackendFeatures {
        texel_buffer_range: at_least(4, 3) || gl.has_extension("GL_ARB_texture_buffer_range"),
        compute_shaders: at_least(4, 3) || gl.has_extension("GL_ARB_compute_shader"),
        storage_buffers,
        base_instance: at_least(4, 2) || gl.has_extension("GL_ARB_base_instance"),
    };

    let heap_size = if gl.has_extension("GL_NVX_gpu_memory_info") {
        let kib = gl.get_integer(GPU_MEMORY_INFO_DEDICATED_VIDMEM_NVX);
        (kib.max(0) as u64) << 10
    } else {
        1 << 30
    };
    let memory = PhysicalDeviceMemoryProperties {
        memory_heaps: vec![MemoryHeap {
            size: heap_size,
            device_local: true,
        }],
        memory_types: vec![
            MemoryType {
                property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
                heap_index: 0,
            },
            MemoryType {
                property_flags: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 0,
            },
            MemoryType {
                property_flags: MemoryPropertyFlags::DEVICE_LOCAL
                    | MemoryPropertyFlags::HOST_VISIBLE
                    | MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 0,
            },
        ],
    };

    Ok((properties, features, backend, memory))
}

fn classify_renderer(renderer: &str) -> PhysicalDeviceType {
    let lower = renderer.to_ascii_lowercase();
    if ["llvmpipe", "softpipe", "swiftshader"].iter().any(|s| lower.contains(s)) {
        PhysicalDeviceType::Cpu
    } else if ["geforce", "quadro", "radeon", "arc"].iter().any(|s| lower.contains(s)) {
        PhysicalDeviceType::DiscreteGpu
    } else if lower.contains("intel") || lower.contains("apple") {
        PhysicalDeviceType::IntegratedGpu
    } else {
        PhysicalDeviceType::Other
    }
}
