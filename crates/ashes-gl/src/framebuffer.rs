//! Framebuffer objects.
//!
//! Attachment points are assigned by walking the render pass attachment
//! table: color formats take `COLOR_ATTACHMENT0 + n` in table order, a
//! depth or stencil format takes the point its aspects dictate. Subpass
//! replay uses the table-index-to-point map for draw buffer lists and
//! load-op clears.

use std::sync::{Arc, Weak};

use tracing::debug;

use ashes_api::{ClearColorValue, ClearValue, Error, Extent2D, Result};

use crate::context::ContextLock;
use crate::convert;
use crate::device::DeviceShared;
use crate::image::ImageView;
use crate::registry::{ObjectId, ObjectKind};
use crate::render_pass::{ClearRequest, RenderPass};

pub(crate) struct FramebufferShared {
    device: Weak<DeviceShared>,
    name: u32,
    render_pass: RenderPass,
    attachments: Vec<ImageView>,
    /// Attachment table index to GL color point slot, `None` for the
    /// depth/stencil attachment.
    color_slots: Vec<Option<u32>>,
    extent: Extent2D,
    layers: u32,
    id: ObjectId,
}

impl Drop for FramebufferShared {
    fn drop(&mut self) {
        let Some(device) = self.device.upgrade() else {
            debug!("framebuffer outlived its device, skipping GL teardown");
            return;
        };
        {
            let mut lock = device.lock();
            lock.forget_framebuffer(self.name);
            lock.gl().delete_framebuffer(self.name);
        }
        device.registry.unregister(self.id, ObjectKind::Framebuffer);
        debug!("destroyed framebuffer: {}", self.name);
    }
}

/// A GL framebuffer wired to image views per a render pass description.
#[derive(Clone)]
pub struct Framebuffer {
    shared: Arc<FramebufferShared>,
}

impl Framebuffer {
    pub(crate) fn new(
        device: &Arc<DeviceShared>,
        render_pass: &RenderPass,
        attachments: Vec<ImageView>,
        extent: Extent2D,
        layers: u32,
    ) -> Result<Self> {
        let descriptions = render_pass.attachments();
        if attachments.len() != descriptions.len() {
            return Err(Error::Validation(format!(
                "framebuffer supplies {} attachments but the render pass describes {}",
                attachments.len(),
                descriptions.len()
            )));
        }
        for (index, (view, description)) in attachments.iter().zip(descriptions).enumerate() {
            if view.format() != description.format {
                return Err(Error::Validation(format!(
                    "attachment {} is {:?} but the render pass expects {:?}",
                    index,
                    view.format(),
                    description.format
                )));
            }
        }
        if extent.width == 0 || extent.height == 0 || layers == 0 {
            return Err(Error::Validation(
                "framebuffer extent and layer count must be nonzero".into(),
            ));
        }

        let mut lock = device.lock();
        let name = lock.gl().create_framebuffer();
        if name == 0 {
            return Err(Error::OutOfDeviceMemory("framebuffer allocation failed".into()));
        }
        lock.set_draw_framebuffer(name);

        let mut color_slots = Vec::with_capacity(attachments.len());
        let mut next_color = 0u32;
        for view in &attachments {
            let point = if view.format().is_depth_or_stencil() {
                color_slots.push(None);
                convert::depth_stencil_attachment_point(view.aspects())
            } else {
                let slot = next_color;
                next_color += 1;
                color_slots.push(Some(slot));
                glow::COLOR_ATTACHMENT0 + slot
            };
            attach_view(&lock, point, view);
        }

        let status = lock.gl().check_framebuffer_status(glow::DRAW_FRAMEBUFFER);
        if status != glow::FRAMEBUFFER_COMPLETE {
            lock.forget_framebuffer(name);
            lock.gl().delete_framebuffer(name);
            return Err(Error::InitializationFailed(format!(
                "framebuffer incomplete: {:#06x}",
                status
            )));
        }
        drop(lock);

        let id = device.registry.register(ObjectKind::Framebuffer);
        debug!(
            "created framebuffer {}x{} ({} attachments): {}",
            extent.width,
            extent.height,
            attachments.len(),
            name
        );
        Ok(Self {
            shared: Arc::new(FramebufferShared {
                device: Arc::downgrade(device),
                name,
                render_pass: render_pass.clone(),
                attachments,
                color_slots,
                extent,
                layers,
                id,
            }),
        })
    }

    pub fn extent(&self) -> Extent2D {
        self.shared.extent
    }

    pub fn layers(&self) -> u32 {
        self.shared.layers
    }

    pub fn render_pass(&self) -> &RenderPass {
        &self.shared.render_pass
    }

    pub fn attachments(&self) -> &[ImageView] {
        &self.shared.attachments
    }

    pub fn set_debug_name(&self, name: &str) {
        if let Some(device) = self.shared.device.upgrade() {
            device.registry.set_label(self.shared.id, name);
        }
    }

    pub(crate) fn gl_name(&self) -> u32 {
        self.shared.name
    }

    /// GL draw buffer slot for an attachment table index.
    pub(crate) fn color_slot(&self, attachment: u32) -> Option<u32> {
        self.shared
            .color_slots
            .get(attachment as usize)
            .copied()
            .flatten()
    }

    /// Draw buffer list for a subpass: one entry per subpass color slot,
    /// `NONE` where the reference points nowhere.
    pub(crate) fn draw_buffers_for_subpass(&self, subpass: u32) -> Vec<u32> {
        let Some(desc) = self.shared.render_pass.subpasses().get(subpass as usize) else {
            return Vec::new();
        };
        desc.color_attachments
            .iter()
            .map(|reference| match self.color_slot(reference.attachment) {
                Some(slot) => glow::COLOR_ATTACHMENT0 + slot,
                None => glow::NONE,
            })
            .collect()
    }

    /// Issues one load-op clear. Callers set the draw framebuffer and
    /// scissor to the render area first; GL clears honor both.
    pub(crate) fn perform_clear(
        &self,
        lock: &mut ContextLock<'_>,
        request: &ClearRequest,
        values: &[ClearValue],
    ) {
        match *request {
            ClearRequest::Color { attachment, slot } => {
                let value = match values.get(attachment as usize) {
                    Some(ClearValue::Color(color)) => *color,
                    _ => ClearColorValue::default(),
                };
                match value {
                    ClearColorValue::Float32(rgba) => {
                        lock.gl().clear_buffer_f32(glow::COLOR, slot, &rgba)
                    }
                    ClearColorValue::Int32(rgba) => {
                        lock.gl().clear_buffer_i32(glow::COLOR, slot, &rgba)
                    }
                    ClearColorValue::Uint32(rgba) => {
                        lock.gl().clear_buffer_u32(glow::COLOR, slot, &rgba)
                    }
                }
            }
            ClearRequest::DepthStencil {
                attachment,
                depth,
                stencil,
            } => {
                let value = match values.get(attachment as usize) {
                    Some(ClearValue::DepthStencil(ds)) => *ds,
                    _ => Default::default(),
                };
                // Depth writes and the stencil mask gate clears too.
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

/// Wires one view onto an attachment point of the bound draw framebuffer.
/// Views into array images attach a single layer unless the framebuffer
/// is layered across the whole view.
fn attach_view(lock: &ContextLock<'_>, point: u32, view: &ImageView) {
    let layered = view.layer_count() > 1;
    if layered || (view.base_array_layer() == 0 && view.image().array_layers() == 1) {
        lock.gl().framebuffer_texture(
            glow::DRAW_FRAMEBUFFER,
            point,
            view.gl_name(),
            view.base_mip_level() as i32,
        );
    } else {
        lock.gl().framebuffer_texture_layer(
            glow::DRAW_FRAMEBUFFER,
            point,
            view.gl_name(),
            view.base_mip_level() as i32,
            view.base_array_layer() as i32,
        );
    }
}
