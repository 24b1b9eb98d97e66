//! OpenGL backend for the Ashes rendering API.
//!
//! Vulkan-shaped recording over a GL 3.3+ context: command buffers capture
//! closed command objects, submission replays them synchronously under a
//! per-device context lock, and a shadow state cache keeps redundant GL
//! calls off the driver. The embedder owns the native context and window
//! integration; this crate only needs the context current on the thread
//! that creates the device and submits work.

pub mod buffer;
pub mod command_buffer;
pub mod commands;
pub mod context;
mod convert;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod geometry;
pub mod image;
pub mod loader;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod registry;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod staging;
mod state;
pub mod swapchain;
pub mod sync;

pub use buffer::{Buffer, BufferMemoryBarrier, BufferView, MapMode, MappedRange};
pub use command_buffer::{CommandBuffer, CommandPool, RecordState};
pub use commands::Command;
pub use context::{Context, ContextLock, Gl, GlowTable, SwapHook};
pub use descriptor::{DescriptorPool, DescriptorSet, DescriptorSetLayout, WriteDescriptor};
pub use device::Device;
pub use framebuffer::Framebuffer;
pub use geometry::GeometryBuffers;
pub use image::{Image, ImageMemoryBarrier, ImageView};
pub use loader::load_system_gl;
pub use pipeline::{
    ComputePipelineCreateInfo, GraphicsPipelineCreateInfo, Pipeline, PipelineLayout,
};
pub use query::QueryPool;
pub use queue::{Queue, SubmitInfo};
pub use registry::{ObjectId, ObjectKind, Registry};
pub use render_pass::RenderPass;
pub use sampler::Sampler;
pub use shader::ShaderModule;
pub use staging::StagingBuffer;
pub use swapchain::{Swapchain, SwapchainCreateInfo};
pub use sync::{Event, Fence, Semaphore};
