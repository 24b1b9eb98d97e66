//! Backend-independent Vulkan-shaped vocabulary for the Ashes renderers.
//!
//! Everything here is plain data: enums, flag sets, creation-info structs and
//! the error/result types shared by every backend. No backend handles appear
//! in this crate.

pub mod enums;
pub mod error;
pub mod flags;
pub mod format;
pub mod pipeline_state;
pub mod properties;
pub mod structs;

pub use enums::*;
pub use error::{Error, Result, ResultCode, WaitResult};
pub use flags::*;
pub use format::Format;
pub use pipeline_state::*;
pub use properties::*;
pub use structs::*;

/// Sentinel for barrier queue-family fields meaning "no ownership transfer".
pub const QUEUE_FAMILY_IGNORED: u32 = u32::MAX;

/// Sentinel subpass index naming the implicit external subpass.
pub const SUBPASS_EXTERNAL: u32 = u32::MAX;

/// Wait forever (fence waits, event waits).
pub const WHOLE_TIMEOUT: u64 = u64::MAX;

/// Buffer range covering everything from the offset to the end.
pub const WHOLE_SIZE: u64 = u64::MAX;

/// Mip level count meaning "all remaining levels".
pub const REMAINING_MIP_LEVELS: u32 = u32::MAX;

/// Array layer count meaning "all remaining layers".
pub const REMAINING_ARRAY_LAYERS: u32 = u32::MAX;
