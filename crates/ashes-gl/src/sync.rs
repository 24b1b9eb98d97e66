//! Fences, semaphores and events.
//!
//! Submission replays synchronously under the context lock, so these are
//! host-side bookkeeping. A fence still supports a real blocking wait for
//! callers structured around asynchronous submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use ashes_api::{FenceCreateFlags, WaitResult};

use crate::device::DeviceShared;
use crate::registry::{ObjectId, ObjectKind};

// ── Fences ────────────────────────────────────────────────────────

pub(crate) struct FenceShared {
    device: Weak<DeviceShared>,
    signaled: Mutex<bool>,
    condvar: Condvar,
    id: ObjectId,
}

impl Drop for FenceShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::Fence);
        }
    }
}

/// Host-visible completion flag signaled when a submission finishes.
#[derive(Clone)]
pub struct Fence {
    shared: Arc<FenceShared>,
}

impl Fence {
    pub(crate) fn new(device: &Arc<DeviceShared>, flags: FenceCreateFlags) -> Self {
        let id = device.registry.register(ObjectKind::Fence);
        Self {
            shared: Arc::new(FenceShared {
                device: Arc::downgrade(device),
                signaled: Mutex::new(flags.contains(FenceCreateFlags::SIGNALED)),
                condvar: Condvar::new(),
                id,
            }),
        }
    }

    pub fn is_signaled(&self) -> bool {
        *self.shared.signaled.lock()
    }

    /// Blocks until the fence signals or `timeout_ns` lapses; `u64::MAX`
    /// waits indefinitely. A dropped device cannot signal anything
    /// anymore, so waiting on an unsignaled fence then reports an error
    /// instead of hanging.
    pub fn wait(&self, timeout_ns: u64) -> WaitResult {
        let mut signaled = self.shared.signaled.lock();
        if *signaled {
            return WaitResult::Success;
        }
        if self.shared.device.strong_count() == 0 {
            debug!("fence wait after device destruction");
            return WaitResult::Error;
        }
        if timeout_ns == 0 {
            return WaitResult::Timeout;
        }
        if timeout_ns == u64::MAX {
            while !*signaled {
                self.shared.condvar.wait(&mut signaled);
            }
            return WaitResult::Success;
        }
        let deadline = std::time::Instant::now() + Duration::from_nanos(timeout_ns);
        while !*signaled {
            if self
                .shared
                .condvar
                .wait_until(&mut signaled, deadline)
                .timed_out()
            {
                return if *signaled {
                    WaitResult::Success
                } else {
                    WaitResult::Timeout
                };
            }
        }
        WaitResult::Success
    }

    pub fn reset(&self) {
        *self.shared.signaled.lock() = false;
    }

    pub(crate) fn signal(&self) {
        let mut signaled = self.shared.signaled.lock();
        *signaled = true;
        self.shared.condvar.notify_all();
    }
}

// ── Semaphores ────────────────────────────────────────────────────

pub(crate) struct SemaphoreShared {
    device: Weak<DeviceShared>,
    signaled: AtomicBool,
    id: ObjectId,
}

impl Drop for SemaphoreShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::Semaphore);
        }
    }
}

/// Queue-side ordering token. Replay is synchronous, so a semaphore only
/// records the signaled/waited handshake for validation.
#[derive(Clone)]
pub struct Semaphore {
    shared: Arc<SemaphoreShared>,
}

impl Semaphore {
    pub(crate) fn new(device: &Arc<DeviceShared>) -> Self {
        let id = device.registry.register(ObjectKind::Semaphore);
        Self {
            shared: Arc::new(SemaphoreShared {
                device: Arc::downgrade(device),
                signaled: AtomicBool::new(false),
                id,
            }),
        }
    }

    pub(crate) fn signal(&self) {
        self.shared.signaled.store(true, Ordering::Release);
    }

    /// Consumes a pending signal. False when nothing was signaled, which
    /// under synchronous replay means a submission order bug.
    pub(crate) fn take_signal(&self) -> bool {
        self.shared.signaled.swap(false, Ordering::AcqRel)
    }
}

// ── Events ────────────────────────────────────────────────────────

pub(crate) struct EventShared {
    device: Weak<DeviceShared>,
    signaled: AtomicBool,
    id: ObjectId,
}

impl Drop for EventShared {
    fn drop(&mut self) {
        if let Some(device) = self.device.upgrade() {
            device.registry.unregister(self.id, ObjectKind::Event);
        }
    }
}

/// Host or command signaled toggle, polled by the host or by replayed
/// wait commands.
#[derive(Clone)]
pub struct Event {
    shared: Arc<EventShared>,
}

impl Event {
    pub(crate) fn new(device: &Arc<DeviceShared>) -> Self {
        let id = device.registry.register(ObjectKind::Event);
        Self {
            shared: Arc::new(EventShared {
                device: Arc::downgrade(device),
                signaled: AtomicBool::new(false),
                id,
            }),
        }
    }

    pub fn set(&self) {
        self.shared.signaled.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.shared.signaled.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.shared.signaled.load(Ordering::Acquire)
    }
}
