//! Mappings from API enums to GL tokens.

use ashes_api::{
    AccessFlags, BlendFactor, BlendOp, BorderColor, CompareOp, ComponentSwizzle, CullModeFlags,
    Filter, Format, FrontFace, ImageAspectFlags, ImageCreateFlags, ImageType, ImageViewType,
    IndexType, MemoryPropertyFlags, PolygonMode, PrimitiveTopology, QueryType,
    SamplerAddressMode, SamplerMipmapMode, ShaderStageFlags, StencilOp,
};

/// Upload triple for a texture format: sized internal format plus the
/// client format and component type used by `tex_sub_image` and
/// `read_pixels`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlFormat {
    pub internal: u32,
    pub format: u32,
    pub data_type: u32,
}

pub fn format_info(format: Format) -> GlFormat {
    let (internal, fmt, data_type) = match format {
        Format::Undefined | Format::R8G8B8A8Unorm => {
            (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE)
        }
        Format::R8Unorm => (glow::R8, glow::RED, glow::UNSIGNED_BYTE),
        Format::R8Uint => (glow::R8UI, glow::RED_INTEGER, glow::UNSIGNED_BYTE),
        Format::R8G8Unorm => (glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
        Format::R8G8B8Unorm => (glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE),
        Format::R8G8B8A8Srgb => (glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE),
        Format::B8G8R8A8Unorm => (glow::RGBA8, glow::BGRA, glow::UNSIGNED_BYTE),
        Format::B8G8R8A8Srgb => (glow::SRGB8_ALPHA8, glow::BGRA, glow::UNSIGNED_BYTE),
        Format::R16Sfloat => (glow::R16F, glow::RED, glow::HALF_FLOAT),
        Format::R16G16Sfloat => (glow::RG16F, glow::RG, glow::HALF_FLOAT),
        Format::R16G16B16A16Sfloat => (glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT),
        Format::R32Uint => (glow::R32UI, glow::RED_INTEGER, glow::UNSIGNED_INT),
        Format::R32Sint => (glow::R32I, glow::RED_INTEGER, glow::INT),
        Format::R32Sfloat => (glow::R32F, glow::RED, glow::FLOAT),
        Format::R32G32Sfloat => (glow::RG32F, glow::RG, glow::FLOAT),
        Format::R32G32B32Sfloat => (glow::RGB32F, glow::RGB, glow::FLOAT),
        Format::R32G32B32A32Sfloat => (glow::RGBA32F, glow::RGBA, glow::FLOAT),
        Format::D16Unorm => (
            glow::DEPTH_COMPONENT16,
            glow::DEPTH_COMPONENT,
            glow::UNSIGNED_SHORT,
        ),
        Format::D24UnormS8Uint => (
            glow::DEPTH24_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::UNSIGNED_INT_24_8,
        ),
        Format::D32Sfloat => (glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::FLOAT),
        Format::D32SfloatS8Uint => (
            glow::DEPTH32F_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::FLOAT_32_UNSIGNED_INT_24_8_REV,
        ),
        Format::S8Uint => (
            glow::STENCIL_INDEX8,
            glow::STENCIL_INDEX,
            glow::UNSIGNED_BYTE,
        ),
    };
    GlFormat {
        internal,
        format: fmt,
        data_type,
    }
}

/// How a vertex attribute of a given format reaches the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribFormat {
    Float {
        size: i32,
        data_type: u32,
        normalized: bool,
    },
    Integer {
        size: i32,
        data_type: u32,
    },
}

pub fn vertex_attrib(format: Format) -> VertexAttribFormat {
    use VertexAttribFormat::{Float, Integer};
    match format {
        Format::R8Unorm => Float {
            size: 1,
            data_type: glow::UNSIGNED_BYTE,
            normalized: true,
        },
        Format::R8Uint => Integer {
            size: 1,
            data_type: glow::UNSIGNED_BYTE,
        },
        Format::R8G8Unorm => Float {
            size: 2,
            data_type: glow::UNSIGNED_BYTE,
            normalized: true,
        },
        Format::R8G8B8Unorm => Float {
            size: 3,
            data_type: glow::UNSIGNED_BYTE,
            normalized: true,
        },
        Format::R16Sfloat => Float {
            size: 1,
            data_type: glow::HALF_FLOAT,
            normalized: false,
        },
        Format::R16G16Sfloat => Float {
            size: 2,
            data_type: glow::HALF_FLOAT,
            normalized: false,
        },
        Format::R16G16B16A16Sfloat => Float {
            size: 4,
            data_type: glow::HALF_FLOAT,
            normalized: false,
        },
        Format::R32Uint => Integer {
            size: 1,
            data_type: glow::UNSIGNED_INT,
        },
        Format::R32Sint => Integer {
            size: 1,
            data_type: glow::INT,
        },
        Format::R32Sfloat => Float {
            size: 1,
            data_type: glow::FLOAT,
            normalized: false,
        },
        Format::R32G32Sfloat => Float {
            size: 2,
            data_type: glow::FLOAT,
            normalized: false,
        },
        Format::R32G32B32Sfloat => Float {
            size: 3,
            data_type: glow::FLOAT,
            normalized: false,
        },
        Format::R32G32B32A32Sfloat => Float {
            size: 4,
            data_type: glow::FLOAT,
            normalized: false,
        },
        _ => Float {
            size: 4,
            data_type: glow::UNSIGNED_BYTE,
            normalized: true,
        },
    }
}

pub fn topology(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::PointList => glow::POINTS,
        PrimitiveTopology::LineList => glow::LINES,
        PrimitiveTopology::LineStrip => glow::LINE_STRIP,
        PrimitiveTopology::TriangleList => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => glow::TRIANGLE_FAN,
        PrimitiveTopology::LineListWithAdjacency => glow::LINES_ADJACENCY,
        PrimitiveTopology::LineStripWithAdjacency => glow::LINE_STRIP_ADJACENCY,
        PrimitiveTopology::TriangleListWithAdjacency => glow::TRIANGLES_ADJACENCY,
        PrimitiveTopology::TriangleStripWithAdjacency => glow::TRIANGLE_STRIP_ADJACENCY,
        PrimitiveTopology::PatchList => glow::PATCHES,
    }
}

pub fn index_type(index_type: IndexType) -> u32 {
    match index_type {
        IndexType::Uint16 => glow::UNSIGNED_SHORT,
        IndexType::Uint32 => glow::UNSIGNED_INT,
    }
}

pub fn compare_op(op: CompareOp) -> u32 {
    match op {
        CompareOp::Never => glow::NEVER,
        CompareOp::Less => glow::LESS,
        CompareOp::Equal => glow::EQUAL,
        CompareOp::LessOrEqual => glow::LEQUAL,
        CompareOp::Greater => glow::GREATER,
        CompareOp::NotEqual => glow::NOTEQUAL,
        CompareOp::GreaterOrEqual => glow::GEQUAL,
        CompareOp::Always => glow::ALWAYS,
    }
}

pub fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
        BlendFactor::ConstantColor => glow::CONSTANT_COLOR,
        BlendFactor::OneMinusConstantColor => glow::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::ConstantAlpha => glow::CONSTANT_ALPHA,
        BlendFactor::OneMinusConstantAlpha => glow::ONE_MINUS_CONSTANT_ALPHA,
        BlendFactor::SrcAlphaSaturate => glow::SRC_ALPHA_SATURATE,
    }
}

pub fn blend_op(op: BlendOp) -> u32 {
    match op {
        BlendOp::Add => glow::FUNC_ADD,
        BlendOp::Subtract => glow::FUNC_SUBTRACT,
        BlendOp::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
        BlendOp::Min => glow::MIN,
        BlendOp::Max => glow::MAX,
    }
}

pub fn stencil_op(op: StencilOp) -> u32 {
    match op {
        StencilOp::Keep => glow::KEEP,
        StencilOp::Zero => glow::ZERO,
        StencilOp::Replace => glow::REPLACE,
        StencilOp::IncrementAndClamp => glow::INCR,
        StencilOp::DecrementAndClamp => glow::DECR,
        StencilOp::Invert => glow::INVERT,
        StencilOp::IncrementAndWrap => glow::INCR_WRAP,
        StencilOp::DecrementAndWrap => glow::DECR_WRAP,
    }
}

pub fn polygon_mode(mode: PolygonMode) -> u32 {
    match mode {
        PolygonMode::Fill => glow::FILL,
        PolygonMode::Line => glow::LINE,
        PolygonMode::Point => glow::POINT,
    }
}

pub fn front_face(face: FrontFace) -> u32 {
    match face {
        FrontFace::CounterClockwise => glow::CCW,
        FrontFace::Clockwise => glow::CW,
    }
}

/// `None` means face culling is disabled.
pub fn cull_mode(mode: CullModeFlags) -> Option<u32> {
    if mode.contains(CullModeFlags::FRONT | CullModeFlags::BACK) {
        Some(glow::FRONT_AND_BACK)
    } else if mode.contains(CullModeFlags::FRONT) {
        Some(glow::FRONT)
    } else if mode.contains(CullModeFlags::BACK) {
        Some(glow::BACK)
    } else {
        None
    }
}

pub fn mag_filter(filter: Filter) -> i32 {
    match filter {
        Filter::Nearest => glow::NEAREST as i32,
        Filter::Linear => glow::LINEAR as i32,
    }
}

pub fn min_filter(filter: Filter, mipmap: SamplerMipmapMode, mipmapped: bool) -> i32 {
    let token = if mipmapped {
        match (filter, mipmap) {
            (Filter::Nearest, SamplerMipmapMode::Nearest) => glow::NEAREST_MIPMAP_NEAREST,
            (Filter::Nearest, SamplerMipmapMode::Linear) => glow::NEAREST_MIPMAP_LINEAR,
            (Filter::Linear, SamplerMipmapMode::Nearest) => glow::LINEAR_MIPMAP_NEAREST,
            (Filter::Linear, SamplerMipmapMode::Linear) => glow::LINEAR_MIPMAP_LINEAR,
        }
    } else {
        match filter {
            Filter::Nearest => glow::NEAREST,
            Filter::Linear => glow::LINEAR,
        }
    };
    token as i32
}

pub fn address_mode(mode: SamplerAddressMode) -> i32 {
    let token = match mode {
        SamplerAddressMode::Repeat => glow::REPEAT,
        SamplerAddressMode::MirroredRepeat => glow::MIRRORED_REPEAT,
        SamplerAddressMode::ClampToEdge => glow::CLAMP_TO_EDGE,
        SamplerAddressMode::ClampToBorder => glow::CLAMP_TO_BORDER,
        SamplerAddressMode::MirrorClampToEdge => glow::MIRROR_CLAMP_TO_EDGE,
    };
    token as i32
}

pub fn border_color(color: BorderColor) -> [f32; 4] {
    match color {
        BorderColor::FloatTransparentBlack | BorderColor::IntTransparentBlack => {
            [0.0, 0.0, 0.0, 0.0]
        }
        BorderColor::FloatOpaqueBlack | BorderColor::IntOpaqueBlack => [0.0, 0.0, 0.0, 1.0],
        BorderColor::FloatOpaqueWhite | BorderColor::IntOpaqueWhite => [1.0, 1.0, 1.0, 1.0],
    }
}

/// Texture target for an image. One-dimensional images are stored as
/// height-one 2D textures, so `TEXTURE_1D` never appears.
pub fn image_target(
    image_type: ImageType,
    array_layers: u32,
    samples: u32,
    flags: ImageCreateFlags,
) -> u32 {
    let _ = samples;
    match image_type {
        ImageType::Type1D => {
            if array_layers > 1 {
                glow::TEXTURE_2D_ARRAY
            } else {
                glow::TEXTURE_2D
            }
        }
        ImageType::Type2D => {
            if flags.contains(ImageCreateFlags::CUBE_COMPATIBLE) && array_layers % 6 == 0 {
                if array_layers > 6 {
                    glow::TEXTURE_CUBE_MAP_ARRAY
                } else {
                    glow::TEXTURE_CUBE_MAP
                }
            } else if array_layers > 1 {
                glow::TEXTURE_2D_ARRAY
            } else {
                glow::TEXTURE_2D
            }
        }
        ImageType::Type3D => glow::TEXTURE_3D,
    }
}

pub fn view_target(view_type: ImageViewType) -> u32 {
    match view_type {
        ImageViewType::Type1D | ImageViewType::Type2D => glow::TEXTURE_2D,
        ImageViewType::Type1DArray | ImageViewType::Type2DArray => glow::TEXTURE_2D_ARRAY,
        ImageViewType::Type3D => glow::TEXTURE_3D,
        ImageViewType::Cube => glow::TEXTURE_CUBE_MAP,
        ImageViewType::CubeArray => glow::TEXTURE_CUBE_MAP_ARRAY,
    }
}

/// Swizzle token for one channel; `identity` is the channel's own token.
pub fn swizzle(swizzle: ComponentSwizzle, identity: u32) -> i32 {
    let token = match swizzle {
        ComponentSwizzle::Identity => identity,
        ComponentSwizzle::Zero => glow::ZERO,
        ComponentSwizzle::One => glow::ONE,
        ComponentSwizzle::R => glow::RED,
        ComponentSwizzle::G => glow::GREEN,
        ComponentSwizzle::B => glow::BLUE,
        ComponentSwizzle::A => glow::ALPHA,
    };
    token as i32
}

/// Shader object type for a single stage bit.
pub fn shader_stage(stage: ShaderStageFlags) -> u32 {
    match stage {
        ShaderStageFlags::VERTEX => glow::VERTEX_SHADER,
        ShaderStageFlags::TESSELLATION_CONTROL => glow::TESS_CONTROL_SHADER,
        ShaderStageFlags::TESSELLATION_EVALUATION => glow::TESS_EVALUATION_SHADER,
        ShaderStageFlags::GEOMETRY => glow::GEOMETRY_SHADER,
        ShaderStageFlags::COMPUTE => glow::COMPUTE_SHADER,
        _ => glow::FRAGMENT_SHADER,
    }
}

/// Usage hint for buffer allocation, picked from how the buffer can be
/// reached by the host.
pub fn buffer_usage_hint(host_visible: bool, download: bool) -> u32 {
    if !host_visible {
        glow::STATIC_DRAW
    } else if download {
        glow::STREAM_READ
    } else {
        glow::DYNAMIC_DRAW
    }
}

pub fn memory_is_host_visible(memory: MemoryPropertyFlags) -> bool {
    memory.contains(MemoryPropertyFlags::HOST_VISIBLE)
}

/// `glMemoryBarrier` mask for the destination accesses of a barrier.
pub fn barrier_bits(access: AccessFlags) -> u32 {
    if access.intersects(AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE) {
        return glow::ALL_BARRIER_BITS;
    }
    let mut bits = 0;
    if access.contains(AccessFlags::INDIRECT_COMMAND_READ) {
        bits |= glow::COMMAND_BARRIER_BIT;
    }
    if access.contains(AccessFlags::INDEX_READ) {
        bits |= glow::ELEMENT_ARRAY_BARRIER_BIT;
    }
    if access.contains(AccessFlags::VERTEX_ATTRIBUTE_READ) {
        bits |= glow::VERTEX_ATTRIB_ARRAY_BARRIER_BIT;
    }
    if access.contains(AccessFlags::UNIFORM_READ) {
        bits |= glow::UNIFORM_BARRIER_BIT;
    }
    if access.contains(AccessFlags::INPUT_ATTACHMENT_READ) {
        bits |= glow::TEXTURE_FETCH_BARRIER_BIT;
    }
    if access.contains(AccessFlags::SHADER_READ) {
        bits |= glow::TEXTURE_FETCH_BARRIER_BIT
            | glow::SHADER_IMAGE_ACCESS_BARRIER_BIT
            | glow::SHADER_STORAGE_BARRIER_BIT;
    }
    if access.contains(AccessFlags::SHADER_WRITE) {
        bits |= glow::SHADER_IMAGE_ACCESS_BARRIER_BIT | glow::SHADER_STORAGE_BARRIER_BIT;
    }
    if access.intersects(
        AccessFlags::COLOR_ATTACHMENT_READ
            | AccessFlags::COLOR_ATTACHMENT_WRITE
            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
    ) {
        bits |= glow::FRAMEBUFFER_BARRIER_BIT;
    }
    if access.intersects(AccessFlags::TRANSFER_READ | AccessFlags::TRANSFER_WRITE) {
        bits |= glow::TEXTURE_UPDATE_BARRIER_BIT
            | glow::BUFFER_UPDATE_BARRIER_BIT
            | glow::PIXEL_BUFFER_BARRIER_BIT;
    }
    if access.intersects(AccessFlags::HOST_READ | AccessFlags::HOST_WRITE) {
        bits |= glow::CLIENT_MAPPED_BUFFER_BARRIER_BIT | glow::BUFFER_UPDATE_BARRIER_BIT;
    }
    bits
}

/// Blit/clear mask for an aspect set.
pub fn clear_mask(aspects: ImageAspectFlags) -> u32 {
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

/// Attachment point for a depth and/or stencil aspect set.
pub fn depth_stencil_attachment_point(aspects: ImageAspectFlags) -> u32 {
    let depth = aspects.contains(ImageAspectFlags::DEPTH);
    let stencil = aspects.contains(ImageAspectFlags::STENCIL);
    if depth && stencil {
        glow::DEPTH_STENCIL_ATTACHMENT
    } else if stencil {
        glow::STENCIL_ATTACHMENT
    } else {
        glow::DEPTH_ATTACHMENT
    }
}

/// Query target for a pool type. Timestamps do not use a target, they are
/// written with `glQueryCounter`.
pub fn query_target(query_type: QueryType, precise: bool) -> u32 {
    match query_type {
        QueryType::Occlusion => {
            if precise {
                glow::SAMPLES_PASSED
            } else {
                glow::ANY_SAMPLES_PASSED
            }
        }
        QueryType::PipelineStatistics => glow::PRIMITIVES_GENERATED,
        QueryType::Timestamp => glow::TIMESTAMP,
    }
}
