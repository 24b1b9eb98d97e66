//! Debug registry of live API objects.
//!
//! Every resource registers itself on creation and unregisters on drop. Ids
//! are slot indices paired with a generation counter, so a stale id from a
//! double destroy is caught instead of pointing at a recycled slot. The whole
//! registry is a no-op unless leak checking is on (debug builds, or
//! `ASHES_LEAK_CHECK=1`).

use std::backtrace::Backtrace;

use parking_lot::Mutex;
use tracing::warn;

/// What a registry slot holds. Used only for leak and misuse reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Buffer,
    BufferView,
    Image,
    ImageView,
    Sampler,
    DescriptorSetLayout,
    DescriptorPool,
    DescriptorSet,
    RenderPass,
    Framebuffer,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    CommandPool,
    CommandBuffer,
    QueryPool,
    Fence,
    Semaphore,
    Event,
    Swapchain,
}

/// Slot index plus the generation it was handed out under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Id handed out when the registry is disabled.
    pub const NONE: ObjectId = ObjectId {
        index: u32::MAX,
        generation: 0,
    };
}

struct LiveObject {
    kind: ObjectKind,
    label: Option<String>,
    origin: Option<Backtrace>,
}

struct Slot {
    generation: u32,
    live: Option<LiveObject>,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

pub struct Registry {
    enabled: bool,
    capture_origin: bool,
    inner: Mutex<Slots>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            enabled: ashes_common::env::leak_check_enabled(),
            capture_origin: ashes_common::env::leak_backtrace_enabled(),
            inner: Mutex::new(Slots::default()),
        }
    }

    pub fn register(&self, kind: ObjectKind) -> ObjectId {
        if !self.enabled {
            return ObjectId::NONE;
        }
        let origin = self.capture_origin.then(Backtrace::force_capture);
        let live = LiveObject {
            kind,
            label: None,
            origin,
        };
        let mut inner = self.inner.lock();
        match inner.free.pop() {
            Some(index) => {
                let slot = &mut inner.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.live = Some(live);
                ObjectId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = inner.slots.len() as u32;
                inner.slots.push(Slot {
                    generation: 0,
                    live: Some(live),
                });
                ObjectId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    pub fn unregister(&self, id: ObjectId, kind: ObjectKind) {
        if !self.enabled || id == ObjectId::NONE {
            return;
        }
        let mut inner = self.inner.lock();
        let Some(slot) = inner.slots.get_mut(id.index as usize) else {
            warn!("unregister of unknown {:?} id {:?}", kind, id);
            return;
        };
        if slot.generation != id.generation || slot.live.is_none() {
            warn!("stale unregister of {:?} id {:?}", kind, id);
            return;
        }
        slot.live = None;
        inner.free.push(id.index);
    }

    /// Attach a debug label, shown in leak reports.
    pub fn set_label(&self, id: ObjectId, label: &str) {
        if !self.enabled || id == ObjectId::NONE {
            return;
        }
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation {
                if let Some(live) = slot.live.as_mut() {
                    live.label = Some(label.to_owned());
                }
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.inner.lock().slots.iter().filter(|s| s.live.is_some()).count()
    }

    /// Log every object still registered. Returns how many there were.
    pub fn report_leaks(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        let inner = self.inner.lock();
        let mut leaked = 0;
        for (index, slot) in inner.slots.iter().enumerate() {
            if let Some(live) = &slot.live {
                leaked += 1;
                match &live.label {
                    Some(label) => warn!(
                        "leaked {:?} (slot {}, generation {}): {:?}",
                        live.kind, index, slot.generation, label
                    ),
                    None => warn!(
                        "leaked {:?} (slot {}, generation {})",
                        live.kind, index, slot.generation
                    ),
                }
                if let Some(origin) = &live.origin {
                    warn!("created at:\n{}", origin);
                }
            }
        }
        leaked
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
