//! Vulkan-style flag sets.
//!
//! Bit values follow the Vulkan numbering so dumps stay comparable with
//! validation-layer output.

bitflags::bitflags! {
    /// Pipeline stages named by barriers and subpass dependencies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE                    = 0x0000_0001;
        const DRAW_INDIRECT                  = 0x0000_0002;
        const VERTEX_INPUT                   = 0x0000_0004;
        const VERTEX_SHADER                  = 0x0000_0008;
        const TESSELLATION_CONTROL_SHADER    = 0x0000_0010;
        const TESSELLATION_EVALUATION_SHADER = 0x0000_0020;
        const GEOMETRY_SHADER                = 0x0000_0040;
        const FRAGMENT_SHADER                = 0x0000_0080;
        const EARLY_FRAGMENT_TESTS           = 0x0000_0100;
        const LATE_FRAGMENT_TESTS            = 0x0000_0200;
        const COLOR_ATTACHMENT_OUTPUT        = 0x0000_0400;
        const COMPUTE_SHADER                 = 0x0000_0800;
        const TRANSFER                       = 0x0000_1000;
        const BOTTOM_OF_PIPE                 = 0x0000_2000;
        const HOST                           = 0x0000_4000;
        const ALL_GRAPHICS                   = 0x0000_8000;
        const ALL_COMMANDS                   = 0x0001_0000;
    }
}

impl PipelineStageFlags {
    /// The stages that execute shader code.
    pub fn shader_stages() -> Self {
        Self::VERTEX_SHADER
            | Self::TESSELLATION_CONTROL_SHADER
            | Self::TESSELLATION_EVALUATION_SHADER
            | Self::GEOMETRY_SHADER
            | Self::FRAGMENT_SHADER
            | Self::COMPUTE_SHADER
    }
}

bitflags::bitflags! {
    /// Memory access kinds named by barriers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        const INDIRECT_COMMAND_READ          = 0x0000_0001;
        const INDEX_READ                     = 0x0000_0002;
        const VERTEX_ATTRIBUTE_READ          = 0x0000_0004;
        const UNIFORM_READ                   = 0x0000_0008;
        const INPUT_ATTACHMENT_READ          = 0x0000_0010;
        const SHADER_READ                    = 0x0000_0020;
        const SHADER_WRITE                   = 0x0000_0040;
        const COLOR_ATTACHMENT_READ          = 0x0000_0080;
        const COLOR_ATTACHMENT_WRITE         = 0x0000_0100;
        const DEPTH_STENCIL_ATTACHMENT_READ  = 0x0000_0200;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x0000_0400;
        const TRANSFER_READ                  = 0x0000_0800;
        const TRANSFER_WRITE                 = 0x0000_1000;
        const HOST_READ                      = 0x0000_2000;
        const HOST_WRITE                     = 0x0000_4000;
        const MEMORY_READ                    = 0x0000_8000;
        const MEMORY_WRITE                   = 0x0001_0000;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsageFlags: u32 {
        const TRANSFER_SRC         = 0x0000_0001;
        const TRANSFER_DST         = 0x0000_0002;
        const UNIFORM_TEXEL_BUFFER = 0x0000_0004;
        const STORAGE_TEXEL_BUFFER = 0x0000_0008;
        const UNIFORM_BUFFER       = 0x0000_0010;
        const STORAGE_BUFFER       = 0x0000_0020;
        const INDEX_BUFFER         = 0x0000_0040;
        const VERTEX_BUFFER        = 0x0000_0080;
        const INDIRECT_BUFFER      = 0x0000_0100;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsageFlags: u32 {
        const TRANSFER_SRC             = 0x0000_0001;
        const TRANSFER_DST             = 0x0000_0002;
        const SAMPLED                  = 0x0000_0004;
        const STORAGE                  = 0x0000_0008;
        const COLOR_ATTACHMENT         = 0x0000_0010;
        const DEPTH_STENCIL_ATTACHMENT = 0x0000_0020;
        const TRANSIENT_ATTACHMENT     = 0x0000_0040;
        const INPUT_ATTACHMENT         = 0x0000_0080;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageAspectFlags: u32 {
        const COLOR   = 0x0000_0001;
        const DEPTH   = 0x0000_0002;
        const STENCIL = 0x0000_0004;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX                  = 0x0000_0001;
        const TESSELLATION_CONTROL    = 0x0000_0002;
        const TESSELLATION_EVALUATION = 0x0000_0004;
        const GEOMETRY                = 0x0000_0008;
        const FRAGMENT                = 0x0000_0010;
        const COMPUTE                 = 0x0000_0020;
        const ALL_GRAPHICS            = Self::VERTEX.bits()
            | Self::TESSELLATION_CONTROL.bits()
            | Self::TESSELLATION_EVALUATION.bits()
            | Self::GEOMETRY.bits()
            | Self::FRAGMENT.bits();
        const ALL                     = Self::ALL_GRAPHICS.bits() | Self::COMPUTE.bits();
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemoryPropertyFlags: u32 {
        const DEVICE_LOCAL  = 0x0000_0001;
        const HOST_VISIBLE  = 0x0000_0002;
        const HOST_COHERENT = 0x0000_0004;
        const HOST_CACHED   = 0x0000_0008;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandBufferUsageFlags: u32 {
        const ONE_TIME_SUBMIT      = 0x0000_0001;
        const RENDER_PASS_CONTINUE = 0x0000_0002;
        const SIMULTANEOUS_USE     = 0x0000_0004;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FenceCreateFlags: u32 {
        const SIGNALED = 0x0000_0001;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DependencyFlags: u32 {
        const BY_REGION = 0x0000_0001;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColorComponentFlags: u32 {
        const R = 0x0000_0001;
        const G = 0x0000_0002;
        const B = 0x0000_0004;
        const A = 0x0000_0008;
        const RGBA = Self::R.bits() | Self::G.bits() | Self::B.bits() | Self::A.bits();
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CullModeFlags: u32 {
        const FRONT          = 0x0000_0001;
        const BACK           = 0x0000_0002;
        const FRONT_AND_BACK = Self::FRONT.bits() | Self::BACK.bits();
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QueryControlFlags: u32 {
        const PRECISE = 0x0000_0001;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QueryResultFlags: u32 {
        const RESULT_64         = 0x0000_0001;
        const WAIT              = 0x0000_0002;
        const WITH_AVAILABILITY = 0x0000_0004;
        const PARTIAL           = 0x0000_0008;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageCreateFlags: u32 {
        const CUBE_COMPATIBLE = 0x0000_0010;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QueueFlags: u32 {
        const GRAPHICS = 0x0000_0001;
        const COMPUTE  = 0x0000_0002;
        const TRANSFER = 0x0000_0004;
    }
}

/// True when a barrier's destination access mask makes sense for the listed
/// destination stages. Shader reads need a shader stage, attachment access
/// needs the matching attachment stage, and so on. Used as a debug assertion
/// by the barrier recording paths.
pub fn access_compatible_with_stages(access: AccessFlags, stages: PipelineStageFlags) -> bool {
    if stages.intersects(PipelineStageFlags::ALL_COMMANDS) {
        return true;
    }
    let graphics_wildcard = stages.intersects(PipelineStageFlags::ALL_GRAPHICS);
    let mut remaining = access;

    let mut satisfy = |mask: AccessFlags, ok: bool| {
        if ok {
            remaining.remove(mask);
        }
    };

    satisfy(
        AccessFlags::INDIRECT_COMMAND_READ,
        stages.intersects(PipelineStageFlags::DRAW_INDIRECT) || graphics_wildcard,
    );
    satisfy(
        AccessFlags::INDEX_READ | AccessFlags::VERTEX_ATTRIBUTE_READ,
        stages.intersects(PipelineStageFlags::VERTEX_INPUT) || graphics_wildcard,
    );
    satisfy(
        AccessFlags::UNIFORM_READ | AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
        stages.intersects(PipelineStageFlags::shader_stages()) || graphics_wildcard,
    );
    satisfy(
        AccessFlags::INPUT_ATTACHMENT_READ,
        stages.intersects(PipelineStageFlags::FRAGMENT_SHADER) || graphics_wildcard,
    );
    satisfy(
        AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
        stages.intersects(PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT) || graphics_wildcard,
    );
    satisfy(
        AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        stages.intersects(
            PipelineStageFlags::EARLY_FRAGMENT_TESTS | PipelineStageFlags::LATE_FRAGMENT_TESTS,
        ) || graphics_wildcard,
    );
    satisfy(
        AccessFlags::TRANSFER_READ | AccessFlags::TRANSFER_WRITE,
        stages.intersects(PipelineStageFlags::TRANSFER),
    );
    satisfy(
        AccessFlags::HOST_READ | AccessFlags::HOST_WRITE,
        stages.intersects(PipelineStageFlags::HOST),
    );
    // MEMORY_READ/WRITE pair with any stage.
    remaining.remove(AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE);

    remaining.is_empty()
}
