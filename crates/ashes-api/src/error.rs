use thiserror::Error;

use crate::format::Format;

/// Vulkan-style result codes surfaced by backend entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    NotReady,
    Timeout,
    EventSet,
    EventReset,
    Incomplete,
    ErrorOutOfHostMemory,
    ErrorOutOfDeviceMemory,
    ErrorInitializationFailed,
    ErrorDeviceLost,
    ErrorMemoryMapFailed,
    ErrorLayerNotPresent,
    ErrorExtensionNotPresent,
    ErrorFeatureNotPresent,
    ErrorIncompatibleDriver,
    ErrorTooManyObjects,
    ErrorFormatNotSupported,
    ErrorFragmentedPool,
    ErrorSurfaceLost,
    ErrorNativeWindowInUse,
    ErrorValidationFailed,
}

/// Errors raised by resource creation, recording and submission.
///
/// Every variant maps onto a Vulkan-style [`ResultCode`] via
/// [`Error::result_code`]; callers asserting on failure kinds should match
/// the code, not the message.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("memory map failed: {0}")]
    MemoryMapFailed(String),
    #[error("feature not present: {0}")]
    FeatureNotPresent(&'static str),
    #[error("extension not present: {0}")]
    ExtensionNotPresent(String),
    #[error("format not supported: {0:?}")]
    FormatNotSupported(Format),
    #[error("out of device memory: {0}")]
    OutOfDeviceMemory(String),
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    #[error("device lost: {0}")]
    DeviceLost(String),
    #[error("too many objects: {0}")]
    TooManyObjects(&'static str),
    #[error("pool fragmented: {0}")]
    FragmentedPool(&'static str),
    #[error("invalid usage: {0}")]
    Validation(String),
}

impl Error {
    /// The Vulkan-style code this error surfaces as.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Error::MemoryMapFailed(_) => ResultCode::ErrorMemoryMapFailed,
            Error::FeatureNotPresent(_) => ResultCode::ErrorFeatureNotPresent,
            Error::ExtensionNotPresent(_) => ResultCode::ErrorExtensionNotPresent,
            Error::FormatNotSupported(_) => ResultCode::ErrorFormatNotSupported,
            Error::OutOfDeviceMemory(_) => ResultCode::ErrorOutOfDeviceMemory,
            Error::InitializationFailed(_) => ResultCode::ErrorInitializationFailed,
            Error::DeviceLost(_) => ResultCode::ErrorDeviceLost,
            Error::TooManyObjects(_) => ResultCode::ErrorTooManyObjects,
            Error::FragmentedPool(_) => ResultCode::ErrorFragmentedPool,
            Error::Validation(_) => ResultCode::ErrorValidationFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Three-way outcome of a blocking fence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Success,
    Timeout,
    Error,
}
