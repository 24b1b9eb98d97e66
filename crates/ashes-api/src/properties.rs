//! Device capability reporting.

use crate::enums::PhysicalDeviceType;
use crate::flags::{MemoryPropertyFlags, QueueFlags};

/// Identity of the logical device's underlying adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalDeviceProperties {
    /// Human-readable device name (driver's renderer string).
    pub device_name: String,
    /// Driver vendor string.
    pub vendor_name: String,
    /// Backend API version string as the driver reports it.
    pub api_version: String,
    pub device_type: PhysicalDeviceType,
    pub limits: PhysicalDeviceLimits,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalDeviceLimits {
    pub max_image_dimension_1d: u32,
    pub max_image_dimension_2d: u32,
    pub max_image_dimension_3d: u32,
    pub max_image_array_layers: u32,
    pub max_texel_buffer_elements: u32,
    pub max_uniform_buffer_range: u32,
    pub max_storage_buffer_range: u32,
    pub max_push_constants_size: u32,
    pub max_color_attachments: u32,
    pub max_vertex_input_attributes: u32,
    pub max_vertex_input_bindings: u32,
    pub max_viewports: u32,
    pub min_uniform_buffer_offset_alignment: u64,
    pub min_storage_buffer_offset_alignment: u64,
    /// Nanoseconds per timestamp-query tick.
    pub timestamp_period: f32,
}

impl Default for PhysicalDeviceLimits {
    fn default() -> Self {
        Self {
            max_image_dimension_1d: 4096,
            max_image_dimension_2d: 4096,
            max_image_dimension_3d: 256,
            max_image_array_layers: 256,
            max_texel_buffer_elements: 65536,
            max_uniform_buffer_range: 16384,
            max_storage_buffer_range: 1 << 27,
            max_push_constants_size: 128,
            max_color_attachments: 4,
            max_vertex_input_attributes: 16,
            max_vertex_input_bindings: 16,
            max_viewports: 1,
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 256,
            timestamp_period: 1.0,
        }
    }
}

/// Vulkan-shaped optional features the application can rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhysicalDeviceFeatures {
    pub multi_draw_indirect: bool,
    pub geometry_shader: bool,
    pub tessellation_shader: bool,
    pub sampler_anisotropy: bool,
    pub sample_rate_shading: bool,
    pub fill_mode_non_solid: bool,
    pub wide_lines: bool,
    pub depth_clamp: bool,
    pub independent_blend: bool,
    pub occlusion_query_precise: bool,
}

/// Backend capabilities with no Vulkan feature equivalent; the GL backend
/// derives these from the context version and extension list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendFeatures {
    /// Partial-range texel buffer views are representable.
    pub texel_buffer_range: bool,
    pub compute_shaders: bool,
    pub storage_buffers: bool,
    pub base_instance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryHeap {
    pub size: u64,
    pub device_local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryType {
    pub property_flags: MemoryPropertyFlags,
    pub heap_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDeviceMemoryProperties {
    pub memory_heaps: Vec<MemoryHeap>,
    pub memory_types: Vec<MemoryType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueFamilyProperties {
    pub queue_flags: QueueFlags,
    pub queue_count: u32,
    pub timestamp_valid_bits: u32,
}
