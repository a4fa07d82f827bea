//! WinBridge Vulkan driver - Win32 to Xlib presentation translation.
//!
//! This crate is the windowing driver the WinBridge emulation layer loads
//! to give Win32 applications a Vulkan presentation path on an X11 host:
//!
//! ```text
//! Application → Win32 Vulkan loader → this driver → native Xlib driver → GPU
//! ```
//!
//! The driver owns no rendering logic of its own. Its work is descriptor
//! translation at the boundary: Win32 surface extension names are rewritten
//! to their Xlib equivalents, Win32 window handles become native drawables
//! supplied by the host window system, and everything else is forwarded to
//! the seven native entry points resolved at initialization. Swapchain and
//! presentation operations are deferred to the native driver and answer
//! with an out-of-memory error until they grow an implementation.

pub mod backend;
pub mod driver;
pub mod error;
mod surface;
pub mod translate;
pub mod window;

pub use backend::XlibBackend;
pub use driver::{get_vulkan_driver, VulkanDriver, XlibVulkanDriver, DRIVER_INTERFACE_VERSION};
pub use error::{DriverInitError, TranslationError};
pub use translate::{translate_instance_create_info, TranslatedInstanceCreateInfo};
pub use window::WindowSystem;
