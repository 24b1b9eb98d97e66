//! Images and image views.
//!
//! A view does not allocate a new GL texture. It records the target, format
//! and subresource window over the image's texture; swizzles and the
//! depth/stencil sampling mode are applied to the shared texture when the
//! view is built.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use ashes_api::{
    AccessFlags, ComponentMapping, Error, Extent3D, Format, ImageAspectFlags, ImageCreateInfo,
    ImageLayout, ImageSubresourceRange, ImageViewCreateInfo, Result, QUEUE_FAMILY_IGNORED,
    REMAINING_ARRAY_LAYERS,
};

use crate::convert;
use crate::device::DeviceShared;
use crate::registry::{ObjectId, ObjectKind};
use crate::state::SCRATCH_UNIT;

/// Image-scoped layout and memory dependency, produced by the barrier
/// builders and consumed by `pipeline_barrier`.
#[derive(Clone)]
pub struct ImageMemoryBarrier {
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub image: Image,
    pub subresource_range: ImageSubresourceRange,
}

/// Accesses implied by holding an image in a layout.
pub(crate) fn access_for_layout(layout: ImageLayout) -> AccessFlags {
    match layout {
        ImageLayout::Undefined | ImageLayout::Preinitialized => AccessFlags::empty(),
        ImageLayout::General => AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
        ImageLayout::ColorAttachmentOptimal => {
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE
        }
        ImageLayout::DepthStencilAttachmentOptimal => {
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        }
        ImageLayout::DepthStencilReadOnlyOptimal => AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
        ImageLayout::ShaderReadOnlyOptimal => AccessFlags::SHADER_READ,
        ImageLayout::TransferSrcOptimal => AccessFlags::TRANSFER_READ,
        ImageLayout::TransferDstOptimal => AccessFlags::TRANSFER_WRITE,
        ImageLayout::PresentSrc => AccessFlags::MEMORY_READ,
    }
}

pub(crate) struct ImageShared {
    device: Weak<DeviceShared>,
    name: u32,
    target: u32,
    info: ImageCreateInfo,
    layout: Mutex<ImageLayout>,
    id: ObjectId,
}

impl Drop for ImageShared {
    fn drop(&mut self) {
        match self.device.upgrade() {
            Some(device) => {
                {
                    let mut lock = device.lock();
                    lock.forget_texture(self.name);
                    lock.gl.delete_texture(self.name);
                }
                device.registry.unregister(self.id, ObjectKind::Image);
                debug!("destroyed image {}", self.name);
            }
            None => debug!("image {} outlived its device, skipping GL teardown", self.name),
        }
    }
}

#[derive(Clone)]
pub struct Image {
    shared: Arc<ImageShared>,
}

impl Image {
    pub(crate) fn new(device: &Arc<DeviceShared>, info: &ImageCreateInfo) -> Result<Self> {
        if info.format == Format::Undefined {
            return Err(Error::FormatNotSupported(info.format));
        }
        if info.extent.width == 0 || info.extent.height == 0 || info.extent.depth == 0 {
            return Err(Error::Validation("image extent must be nonzero".into()));
        }
        if info.mip_levels == 0 || info.array_layers == 0 {
            return Err(Error::Validation(
                "image mip and layer counts must be nonzero".into(),
            ));
        }
        let samples = info.samples.as_u32();
        if samples > 1 {
            warn!(
                "multisampled storage ({}x) is not supported, allocating single-sampled",
                samples
            );
        }
        let target = convert::image_target(info.image_type, info.array_layers, samples, info.flags);
        let gl_format = convert::format_info(info.format);

        let name = {
            let mut lock = device.lock();
            let name = lock.gl.create_texture();
            if name == 0 {
                return Err(Error::OutOfDeviceMemory("could not create texture object".into()));
            }
            lock.bind_texture_unit(SCRATCH_UNIT, target, name);
            let levels = info.mip_levels as i32;
            let width = info.extent.width as i32;
            let height = info.extent.height.max(1) as i32;
            match target {
                glow::TEXTURE_3D => {
                    lock.gl.tex_storage_3d(
                        target,
                        levels,
                        gl_format.internal,
                        width,
                        height,
                        info.extent.depth as i32,
                    );
                }
                glow::TEXTURE_2D_ARRAY | glow::TEXTURE_CUBE_MAP_ARRAY => {
                    lock.gl.tex_storage_3d(
                        target,
                        levels,
                        gl_format.internal,
                        width,
                        height,
                        info.array_layers as i32,
                    );
                }
                _ => {
                    lock.gl
                        .tex_storage_2d(target, levels, gl_format.internal, width, height);
                }
            }
            lock.gl
                .tex_parameter_i32(target, glow::TEXTURE_MAX_LEVEL, levels - 1);
            name
        };
        debug!(
            "created image {:?} {}x{}x{} ({} mips, {} layers): {}",
            info.format,
            info.extent.width,
            info.extent.height,
            info.extent.depth,
            info.mip_levels,
            info.array_layers,
            name
        );
        Ok(Self {
            shared: Arc::new(ImageShared {
                device: Arc::downgrade(device),
                name,
                target,
                info: info.clone(),
                layout: Mutex::new(info.initial_layout),
                id: device.registry.register(ObjectKind::Image),
            }),
        })
    }

    pub fn format(&self) -> Format {
        self.shared.info.format
    }

    pub fn extent(&self) -> Extent3D {
        self.shared.info.extent
    }

    pub fn mip_levels(&self) -> u32 {
        self.shared.info.mip_levels
    }

    pub fn array_layers(&self) -> u32 {
        self.shared.info.array_layers
    }

    pub fn current_layout(&self) -> ImageLayout {
        *self.shared.layout.lock()
    }

    pub(crate) fn gl_name(&self) -> u32 {
        self.shared.name
    }

    pub(crate) fn gl_target(&self) -> u32 {
        self.shared.target
    }

    pub fn set_debug_name(&self, name: &str) {
        if let Some(device) = self.shared.device.upgrade() {
            device.registry.set_label(self.shared.id, name);
        }
    }

    // ── Barrier builders ──────────────────────────────────────────

    /// Transition the tracked layout to `new_layout` and describe the
    /// dependency edge from the layout the image was in.
    pub fn make_transition(
        &self,
        new_layout: ImageLayout,
        subresource_range: ImageSubresourceRange,
    ) -> ImageMemoryBarrier {
        let mut layout = self.shared.layout.lock();
        let old_layout = *layout;
        *layout = new_layout;
        ImageMemoryBarrier {
            src_access: access_for_layout(old_layout),
            dst_access: access_for_layout(new_layout),
            old_layout,
            new_layout,
            src_queue_family: QUEUE_FAMILY_IGNORED,
            dst_queue_family: QUEUE_FAMILY_IGNORED,
            image: self.clone(),
            subresource_range,
        }
    }

    fn whole_range(&self) -> ImageSubresourceRange {
        ImageSubresourceRange::whole(self.format().aspects())
    }

    pub fn make_color_attachment(&self) -> ImageMemoryBarrier {
        self.make_transition(ImageLayout::ColorAttachmentOptimal, self.whole_range())
    }

    pub fn make_depth_stencil_attachment(&self) -> ImageMemoryBarrier {
        self.make_transition(ImageLayout::DepthStencilAttachmentOptimal, self.whole_range())
    }

    pub fn make_shader_input(&self) -> ImageMemoryBarrier {
        self.make_transition(ImageLayout::ShaderReadOnlyOptimal, self.whole_range())
    }

    pub fn make_transfer_source(&self) -> ImageMemoryBarrier {
        self.make_transition(ImageLayout::TransferSrcOptimal, self.whole_range())
    }

    pub fn make_transfer_destination(&self) -> ImageMemoryBarrier {
        self.make_transition(ImageLayout::TransferDstOptimal, self.whole_range())
    }

    pub fn make_present_source(&self) -> ImageMemoryBarrier {
        self.make_transition(ImageLayout::PresentSrc, self.whole_range())
    }

    pub fn make_general_layout(&self, dst_access: AccessFlags) -> ImageMemoryBarrier {
        let mut barrier = self.make_transition(ImageLayout::General, self.whole_range());
        barrier.dst_access = dst_access;
        barrier
    }

    /// Record a layout change decided elsewhere, such as a render pass
    /// final layout.
    pub(crate) fn set_tracked_layout(&self, layout: ImageLayout) {
        *self.shared.layout.lock() = layout;
    }
}

// ── Image views ───────────────────────────────────────────────────

pub(crate) struct ImageViewShared {
    device: Weak<DeviceShared>,
    image: Image,
    target: u32,
    info: ImageViewCreateInfo,
    id: ObjectId,
}

impl Drop for ImageViewShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::ImageView);
        }
    }
}

#[derive(Clone)]
pub struct ImageView {
    shared: Arc<ImageViewShared>,
}

impl ImageView {
    pub(crate) fn new(
        device: &Arc<DeviceShared>,
        image: &Image,
        info: &ImageViewCreateInfo,
    ) -> Result<Self> {
        let range = &info.subresource_range;
        if range.base_mip_level >= image.mip_levels()
            || range.base_array_layer >= image.array_layers()
        {
            return Err(Error::Validation(format!(
                "view subresource (mip {}, layer {}) outside image ({} mips, {} layers)",
                range.base_mip_level,
                range.base_array_layer,
                image.mip_levels(),
                image.array_layers()
            )));
        }
        let target = convert::view_target(info.view_type);

        {
            let mut lock = device.lock();
            lock.bind_texture_unit(SCRATCH_UNIT, image.gl_target(), image.gl_name());
            let mapping = &info.components;
            if *mapping != ComponentMapping::default() {
                lock.gl.tex_parameter_i32(
                    image.gl_target(),
                    glow::TEXTURE_SWIZZLE_R,
                    convert::swizzle(mapping.r, glow::RED),
                );
                lock.gl.tex_parameter_i32(
                    image.gl_target(),
                    glow::TEXTURE_SWIZZLE_G,
                    convert::swizzle(mapping.g, glow::GREEN),
                );
                lock.gl.tex_parameter_i32(
                    image.gl_target(),
                    glow::TEXTURE_SWIZZLE_B,
                    convert::swizzle(mapping.b, glow::BLUE),
                );
                lock.gl.tex_parameter_i32(
                    image.gl_target(),
                    glow::TEXTURE_SWIZZLE_A,
                    convert::swizzle(mapping.a, glow::ALPHA),
                );
            }
            // Sampling the stencil aspect of a combined texture needs the
            // sampling mode switched away from depth.
            if range.aspect_mask == ImageAspectFlags::STENCIL && image.format().is_depth() {
                lock.gl.tex_parameter_i32(
                    image.gl_target(),
                    glow::DEPTH_STENCIL_TEXTURE_MODE,
                    glow::STENCIL_INDEX as i32,
                );
            }
        }

        Ok(Self {
            shared: Arc::new(ImageViewShared {
                device: Arc::downgrade(device),
                image: image.clone(),
                target,
                info: info.clone(),
                id: device.registry.register(ObjectKind::ImageView),
            }),
        })
    }

    pub fn image(&self) -> &Image {
        &self.shared.image
    }

    pub fn format(&self) -> Format {
        self.shared.info.format
    }

    pub fn aspects(&self) -> ImageAspectFlags {
        self.shared.info.subresource_range.aspect_mask
    }

    pub(crate) fn gl_name(&self) -> u32 {
        self.shared.image.gl_name()
    }

    pub(crate) fn gl_target(&self) -> u32 {
        self.shared.target
    }

    pub(crate) fn base_mip_level(&self) -> u32 {
        self.shared.info.subresource_range.base_mip_level
    }

    pub(crate) fn base_array_layer(&self) -> u32 {
        self.shared.info.subresource_range.base_array_layer
    }

    /// Layers the view covers, clamped to the image.
    pub(crate) fn layer_count(&self) -> u32 {
        let range = &self.shared.info.subresource_range;
        if range.layer_count == REMAINING_ARRAY_LAYERS {
            self.shared.image.array_layers() - range.base_array_layer
        } else {
            range.layer_count
        }
    }
}
