//! Submission and synchronous replay.
//!
//! GL has no device-side queue, so submission replays command lists
//! immediately on the submitting thread while holding the context lock.
//! Fences and semaphores signal as soon as the replay returns, which keeps
//! their host-side semantics intact without a worker thread.

use std::sync::Arc;

use tracing::{debug, warn};

use ashes_api::{Error, Result};

use crate::command_buffer::{AfterSubmitAction, CommandBuffer};
use crate::commands::Command;
use crate::device::DeviceShared;
use crate::swapchain::Swapchain;
use crate::sync::{Fence, Semaphore};

/// One batch of command buffers with its semaphore edges.
#[derive(Default)]
pub struct SubmitInfo<'a> {
    pub wait_semaphores: &'a [Semaphore],
    pub command_buffers: &'a [CommandBuffer],
    pub signal_semaphores: &'a [Semaphore],
}

/// The device's single queue. Handles are cheap and interchangeable; all of
/// them serialize on the shared context lock.
#[derive(Clone)]
pub struct Queue {
    device: Arc<DeviceShared>,
}

impl Queue {
    pub(crate) fn new(device: Arc<DeviceShared>) -> Self {
        Self { device }
    }

    /// Replays every command buffer in submission order. Buffers move to
    /// `Pending` for the duration of the replay and back to `Executable`
    /// after, whatever the outcome. The fence signals once, after the last
    /// batch.
    pub fn submit(&self, infos: &[SubmitInfo<'_>], fence: Option<&Fence>) -> Result<()> {
        for info in infos {
            for semaphore in info.wait_semaphores {
                if !semaphore.take_signal() {
                    warn!("submission waited on a semaphore that was never signaled");
                }
            }
        }

        // Validate every buffer before touching the context so a bad batch
        // leaves nothing half-replayed.
        let mut taken: Vec<(&CommandBuffer, Vec<Command>, Vec<AfterSubmitAction>)> = Vec::new();
        for info in infos {
            for buffer in info.command_buffers {
                match buffer.take_for_submit() {
                    Ok((commands, actions)) => taken.push((buffer, commands, actions)),
                    Err(err) => {
                        for (submitted, _, _) in &taken {
                            submitted.finish_submit();
                        }
                        return Err(err);
                    }
                }
            }
        }

        let command_count: usize = taken.iter().map(|(_, commands, _)| commands.len()).sum();
        debug!(
            "submitting {} command buffers ({} commands)",
            taken.len(),
            command_count
        );

        {
            let mut lock = self.device.lock();
            let mut cleanup: Vec<AfterSubmitAction> = Vec::new();
            for (_, commands, actions) in &taken {
                for command in commands {
                    command.apply(&mut lock);
                }
                for action in actions {
                    if !cleanup.contains(action) {
                        cleanup.push(*action);
                    }
                }
            }
            for action in &cleanup {
                action.apply(&mut lock);
            }
        }

        for (buffer, _, _) in &taken {
            buffer.finish_submit();
        }
        for info in infos {
            for semaphore in info.signal_semaphores {
                semaphore.signal();
            }
        }
        if let Some(fence) = fence {
            fence.signal();
        }
        Ok(())
    }

    /// Convenience wrapper for a single fenced batch.
    pub fn submit_one(&self, buffer: &CommandBuffer, fence: Option<&Fence>) -> Result<()> {
        let buffers = [buffer.clone()];
        self.submit(
            &[SubmitInfo {
                command_buffers: &buffers,
                ..SubmitInfo::default()
            }],
            fence,
        )
    }

    /// Copies the acquired swapchain image to the default framebuffer and
    /// runs the window-system swap hook.
    pub fn present(
        &self,
        swapchain: &Swapchain,
        image_index: u32,
        wait_semaphores: &[Semaphore],
    ) -> Result<()> {
        for semaphore in wait_semaphores {
            if !semaphore.take_signal() {
                warn!("present waited on a semaphore that was never signaled");
            }
        }
        if !swapchain.owned_by(&self.device) {
            return Err(Error::Validation(
                "swapchain belongs to a different device".into(),
            ));
        }
        swapchain.present(image_index)
    }

    /// Block until all replayed GL work has completed.
    pub fn wait_idle(&self) {
        let lock = self.device.lock();
        lock.gl.finish();
    }
}
