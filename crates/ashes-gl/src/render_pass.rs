//! Render pass descriptions.
//!
//! OpenGL has no render pass object, so this is pure bookkeeping: the
//! attachment table and subpass wiring are validated up front and then
//! consulted at `begin_render_pass` replay time to decide which
//! framebuffer attachments to clear, invalidate, or resolve.

use std::sync::{Arc, Weak};

use tracing::debug;

use ashes_api::{
    AttachmentDescription, AttachmentLoadOp, Error, RenderPassCreateInfo, Result,
    SubpassDependency, SubpassDescription, SUBPASS_EXTERNAL,
};

use crate::device::DeviceShared;
use crate::registry::{ObjectId, ObjectKind};

pub(crate) struct RenderPassShared {
    device: Weak<DeviceShared>,
    attachments: Vec<AttachmentDescription>,
    subpasses: Vec<SubpassDescription>,
    dependencies: Vec<SubpassDependency>,
    id: ObjectId,
}

impl Drop for RenderPassShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::RenderPass);
        }
    }
}

/// A description of attachments and the subpasses that read and write them.
#[derive(Clone)]
pub struct RenderPass {
    shared: Arc<RenderPassShared>,
}

impl RenderPass {
    pub(crate) fn new(device: &Arc<DeviceShared>, info: &RenderPassCreateInfo) -> Result<Self> {
        if info.subpasses.is_empty() {
            return Err(Error::Validation(
                "render pass must describe at least one subpass".into(),
            ));
        }
        let attachment_count = info.attachments.len() as u32;
        for (index, subpass) in info.subpasses.iter().enumerate() {
            let refs = subpass
                .input_attachments
                .iter()
                .chain(&subpass.color_attachments)
                .chain(&subpass.resolve_attachments)
                .chain(subpass.depth_stencil_attachment.as_ref());
            for reference in refs {
                if reference.attachment >= attachment_count {
                    return Err(Error::Validation(format!(
                        "subpass {} references attachment {} but the render pass has {}",
                        index, reference.attachment, attachment_count
                    )));
                }
            }
            if !subpass.resolve_attachments.is_empty()
                && subpass.resolve_attachments.len() != subpass.color_attachments.len()
            {
                return Err(Error::Validation(format!(
                    "subpass {} has {} resolve attachments for {} color attachments",
                    index,
                    subpass.resolve_attachments.len(),
                    subpass.color_attachments.len()
                )));
            }
            if let Some(depth) = &subpass.depth_stencil_attachment {
                let format = info.attachments[depth.attachment as usize].format;
                if !format.is_depth_or_stencil() {
                    return Err(Error::Validation(format!(
                        "subpass {} uses {:?} as its depth/stencil attachment",
                        index, format
                    )));
                }
            }
            for color in &subpass.color_attachments {
                let format = info.attachments[color.attachment as usize].format;
                if format.is_depth_or_stencil() {
                    return Err(Error::Validation(format!(
                        "subpass {} uses {:?} as a color attachment",
                        index, format
                    )));
                }
            }
        }
        let subpass_count = info.subpasses.len() as u32;
        for dependency in &info.dependencies {
            for subpass in [dependency.src_subpass, dependency.dst_subpass] {
                if subpass != SUBPASS_EXTERNAL && subpass >= subpass_count {
                    return Err(Error::Validation(format!(
                        "dependency references subpass {} but the render pass has {}",
                        subpass, subpass_count
                    )));
                }
            }
        }

        let id = device.registry.register(ObjectKind::RenderPass);
        debug!(
            "created render pass ({} attachments, {} subpasses)",
            info.attachments.len(),
            info.subpasses.len()
        );
        Ok(Self {
            shared: Arc::new(RenderPassShared {
                device: Arc::downgrade(device),
                attachments: info.attachments.clone(),
                subpasses: info.subpasses.clone(),
                dependencies: info.dependencies.clone(),
                id,
            }),
        })
    }

    pub fn attachments(&self) -> &[AttachmentDescription] {
        &self.shared.attachments
    }

    pub fn subpasses(&self) -> &[SubpassDescription] {
        &self.shared.subpasses
    }

    pub fn dependencies(&self) -> &[SubpassDependency] {
        &self.shared.dependencies
    }

    pub fn subpass_count(&self) -> u32 {
        self.shared.subpasses.len() as u32
    }

    /// Attachments the given subpass writes whose load op asks for a clear.
    /// The begin-pass replay clears exactly these, leaving the rest intact.
    pub(crate) fn clears_for_subpass(&self, subpass: u32) -> Vec<ClearRequest> {
        let Some(desc) = self.shared.subpasses.get(subpass as usize) else {
            return Vec::new();
        };
        let mut clears = Vec::new();
        for (slot, reference) in desc.color_attachments.iter().enumerate() {
            let attachment = &self.shared.attachments[reference.attachment as usize];
            // Only the first subpass to touch an attachment performs its load op.
            if attachment.load_op == AttachmentLoadOp::Clear
                && self.first_use_of(reference.attachment) == Some(subpass)
            {
                clears.push(ClearRequest::Color {
                    attachment: reference.attachment,
                    slot: slot as u32,
                });
            }
        }
        if let Some(depth) = &desc.depth_stencil_attachment {
            let attachment = &self.shared.attachments[depth.attachment as usize];
            if self.first_use_of(depth.attachment) == Some(subpass) {
                let format = attachment.format;
                let clear_depth = format.is_depth() && attachment.load_op == AttachmentLoadOp::Clear;
                let clear_stencil =
                    format.is_stencil() && attachment.stencil_load_op == AttachmentLoadOp::Clear;
                if clear_depth || clear_stencil {
                    clears.push(ClearRequest::DepthStencil {
                        attachment: depth.attachment,
                        depth: clear_depth,
                        stencil: clear_stencil,
                    });
                }
            }
        }
        clears
    }

    fn first_use_of(&self, attachment: u32) -> Option<u32> {
        for (index, subpass) in self.shared.subpasses.iter().enumerate() {
            let used = subpass
                .color_attachments
                .iter()
                .chain(&subpass.input_attachments)
                .chain(subpass.depth_stencil_attachment.as_ref())
                .any(|reference| reference.attachment == attachment);
            if used {
                return Some(index as u32);
            }
        }
        None
    }
}

/// One clear the begin-pass replay must issue for a subpass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClearRequest {
    Color {
        /// Index into the render pass attachment table.
        attachment: u32,
        /// Color slot within the subpass, maps to a GL draw buffer.
        slot: u32,
    },
    DepthStencil {
        attachment: u32,
        depth: bool,
        stencil: bool,
    },
}
