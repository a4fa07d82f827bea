//! Error types for the WinBridge Vulkan driver.

use ash::vk;
use thiserror::Error;

/// Failures that leave the driver globally unavailable.
///
/// Any of these during first use is cached for the lifetime of the
/// process; the loader is never asked to retry.
#[derive(Debug, Error)]
pub enum DriverInitError {
    #[error("native Vulkan library '{library}' could not be loaded: {source}")]
    LibraryNotFound {
        library: String,
        #[source]
        source: libloading::Error,
    },

    #[error("required symbol '{symbol}' not found in the native Vulkan library")]
    SymbolNotFound {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

/// Failure while rewriting an instance descriptor for the native driver.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslationError {
    /// The rewritten extension-name array could not be allocated.
    #[error("failed to allocate the enabled-extension name array")]
    OutOfHostMemory,
}

impl TranslationError {
    /// The result code reported across the driver boundary for this error.
    pub fn to_vk(&self) -> vk::Result {
        match self {
            TranslationError::OutOfHostMemory => vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        }
    }
}
