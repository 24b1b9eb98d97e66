//! FBO-backed presentation ring.
//!
//! There is no real surface here. The swapchain owns a small ring of
//! colour images, each wrapped in a framebuffer so presentation can blit
//! it onto the default framebuffer before invoking the embedder's swap
//! hook. Acquisition rotates the ring and signals immediately, matching
//! the synchronous replay model.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use ashes_api::{
    Error, Extent2D, Extent3D, Format, ImageCreateInfo, ImageUsageFlags, Result,
};

use crate::device::DeviceShared;
use crate::image::Image;
use crate::registry::{ObjectId, ObjectKind};
use crate::sync::{Fence, Semaphore};

#[derive(Debug, Clone, Copy)]
pub struct SwapchainCreateInfo {
    pub extent: Extent2D,
    pub format: Format,
    pub image_count: u32,
}

impl Default for SwapchainCreateInfo {
    fn default() -> Self {
        Self {
            extent: Extent2D {
                width: 1,
                height: 1,
            },
            format: Format::R8G8B8A8Unorm,
            image_count: 2,
        }
    }
}

struct SwapchainShared {
    device: Weak<DeviceShared>,
    images: Vec<Image>,
    /// One read framebuffer per image, for the present blit.
    framebuffers: Vec<u32>,
    extent: Extent2D,
    format: Format,
    next: Mutex<u32>,
    id: ObjectId,
}

impl Drop for SwapchainShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            {
                let mut lock = device.lock();
                for framebuffer in &self.framebuffers {
                    lock.forget_framebuffer(*framebuffer);
                    lock.gl().delete_framebuffer(*framebuffer);
                }
            }
            device.registry.unregister(self.id, ObjectKind::Swapchain);
            debug!("destroyed swapchain ({} images)", self.images.len());
        }
    }
}

/// Image ring standing in for a window-system swapchain.
#[derive(Clone)]
pub struct Swapchain {
    shared: Arc<SwapchainShared>,
}

impl Swapchain {
    /// Builds the ring, or logs and returns `None` when its backing
    /// resources cannot be created.
    pub(crate) fn new(device: &Arc<DeviceShared>, info: &SwapchainCreateInfo) -> Option<Self> {
        match Self::try_new(device, info) {
            Ok(swapchain) => Some(swapchain),
            Err(err) => {
                warn!("swapchain creation failed: {}", err);
                None
            }
        }
    }

    fn try_new(device: &Arc<DeviceShared>, info: &SwapchainCreateInfo) -> Result<Self> {
        if info.image_count == 0 {
            return Err(Error::Validation("swapchain needs at least one image".into()));
        }
        if info.extent.width == 0 || info.extent.height == 0 {
            return Err(Error::Validation(format!(
                "swapchain extent {}x{} is empty",
                info.extent.width, info.extent.height
            )));
        }
        if info.format.is_depth_or_stencil() {
            return Err(Error::Validation(format!(
                "swapchain format {:?} is not a colour format",
                info.format
            )));
        }
        let mut images = Vec::with_capacity(info.image_count as usize);
        for _ in 0..info.image_count {
            images.push(Image::new(
                device,
                &ImageCreateInfo {
                    format: info.format,
                    extent: Extent3D {
                        width: info.extent.width,
                        height: info.extent.height,
                        depth: 1,
                    },
                    usage: ImageUsageFlags::COLOR_ATTACHMENT | ImageUsageFlags::TRANSFER_SRC,
                    ..ImageCreateInfo::default()
                },
            )?);
        }

        let mut framebuffers = Vec::with_capacity(images.len());
        let mut lock = device.lock();
        for image in &images {
            let framebuffer = lock.gl().create_framebuffer();
            if framebuffer == 0 {
                for framebuffer in &framebuffers {
                    lock.gl().delete_framebuffer(*framebuffer);
                }
                return Err(Error::OutOfDeviceMemory("framebuffer creation failed".into()));
            }
            lock.set_read_framebuffer(framebuffer);
            lock.gl().framebuffer_texture(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                image.gl_name(),
                0,
            );
            let status = lock.gl().check_framebuffer_status(glow::READ_FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                lock.set_read_framebuffer(0);
                lock.gl().delete_framebuffer(framebuffer);
                for framebuffer in &framebuffers {
                    lock.gl().delete_framebuffer(*framebuffer);
                }
                return Err(Error::InitializationFailed(format!(
                    "swapchain framebuffer incomplete: {:#06x}",
                    status
                )));
            }
            framebuffers.push(framebuffer);
        }
        lock.set_read_framebuffer(0);
        drop(lock);

        let id = device.registry.register(ObjectKind::Swapchain);
        debug!(
            "created swapchain: {} {:?} images at {}x{}",
            images.len(),
            info.format,
            info.extent.width,
            info.extent.height
        );
        Ok(Self {
            shared: Arc::new(SwapchainShared {
                device: Arc::downgrade(device),
                images,
                framebuffers,
                extent: info.extent,
                format: info.format,
                next: Mutex::new(0),
                id,
            }),
        })
    }

    pub fn images(&self) -> &[Image] {
        &self.shared.images
    }

    pub fn image_count(&self) -> u32 {
        self.shared.images.len() as u32
    }

    pub fn extent(&self) -> Extent2D {
        self.shared.extent
    }

    pub fn format(&self) -> Format {
        self.shared.format
    }

    pub fn set_debug_name(&self, name: &str) {
        if let Some(device) = self.shared.device.upgrade() {
            device.registry.set_label(self.shared.id, name);
        }
    }

    /// Rotates the ring and hands out the next image index. The backend
    /// replays synchronously, so the image is free by construction and the
    /// timeout never comes into play; the semaphore and fence signal before
    /// this returns.
    pub fn acquire_next_image(
        &self,
        _timeout_ns: u64,
        semaphore: Option<&Semaphore>,
        fence: Option<&Fence>,
    ) -> Result<u32> {
        if self.shared.device.strong_count() == 0 {
            return Err(Error::DeviceLost("swapchain device destroyed".into()));
        }
        let mut next = self.shared.next.lock();
        let index = *next;
        *next = (*next + 1) % self.image_count();
        drop(next);
        if let Some(semaphore) = semaphore {
            semaphore.signal();
        }
        if let Some(fence) = fence {
            fence.signal();
        }
        Ok(index)
    }

    /// Blits the image onto the default framebuffer and swaps.
    pub(crate) fn present(&self, image_index: u32) -> Result<()> {
        let device = self
            .shared
            .device
            .upgrade()
            .ok_or_else(|| Error::DeviceLost("swapchain device destroyed".into()))?;
        let Some(framebuffer) = self.shared.framebuffers.get(image_index as usize) else {
            return Err(Error::Validation(format!(
                "presented image index {} out of {}",
                image_index,
                self.image_count()
            )));
        };
        {
            let mut lock = device.lock();
            lock.set_read_framebuffer(*framebuffer);
            lock.set_draw_framebuffer(0);
            lock.set_cap(glow::SCISSOR_TEST, false);
            let width = self.shared.extent.width as i32;
            let height = self.shared.extent.height as i32;
            lock.gl().blit_framebuffer(
                0,
                0,
                width,
                height,
                0,
                0,
                width,
                height,
                glow::COLOR_BUFFER_BIT,
                glow::NEAREST,
            );
            lock.set_read_framebuffer(0);
        }
        device.context.swap_buffers();
        Ok(())
    }

    pub(crate) fn owned_by(&self, device: &Arc<DeviceShared>) -> bool {
        std::ptr::eq(self.shared.device.as_ptr(), Arc::as_ptr(device))
    }
}
