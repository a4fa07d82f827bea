//! Native Xlib Vulkan entry points.
//!
//! The backend is the capability object every presentation call finally
//! lands in: the host Vulkan library plus the handful of its entry points
//! this driver forwards into. It is constructed once by the host side and
//! injected into the driver table; resolution is all-or-nothing, a single
//! missing symbol makes the whole driver unavailable.

use std::env;
use std::os::raw::c_char;

use ash::vk;
use libloading::Library;
use tracing::debug;

use crate::error::DriverInitError;

/// Environment variable overriding the native library backing the driver.
pub const LIBRARY_ENV_VAR: &str = "WINBRIDGE_VULKAN_LIBRARY";

/// Default soname of the host Vulkan loader.
pub const DEFAULT_LIBRARY: &str = "libvulkan.so.1";

pub type CreateInstanceFn = unsafe extern "system" fn(
    *const vk::InstanceCreateInfo,
    *const vk::AllocationCallbacks,
    *mut vk::Instance,
) -> vk::Result;

pub type CreateXlibSurfaceFn = unsafe extern "system" fn(
    vk::Instance,
    *const vk::XlibSurfaceCreateInfoKHR,
    *const vk::AllocationCallbacks,
    *mut vk::SurfaceKHR,
) -> vk::Result;

pub type DestroyInstanceFn =
    unsafe extern "system" fn(vk::Instance, *const vk::AllocationCallbacks);

pub type DestroySurfaceFn =
    unsafe extern "system" fn(vk::Instance, vk::SurfaceKHR, *const vk::AllocationCallbacks);

pub type GetDeviceProcAddrFn =
    unsafe extern "system" fn(vk::Device, *const c_char) -> vk::PFN_vkVoidFunction;

pub type GetInstanceProcAddrFn =
    unsafe extern "system" fn(vk::Instance, *const c_char) -> vk::PFN_vkVoidFunction;

pub type GetPhysicalDeviceXlibPresentationSupportFn = unsafe extern "system" fn(
    vk::PhysicalDevice,
    u32,
    *mut vk::Display,
    vk::VisualID,
) -> vk::Bool32;

/// The seven native entry points the driver forwards into.
pub struct XlibBackend {
    pub(crate) create_instance: CreateInstanceFn,
    pub(crate) create_xlib_surface: CreateXlibSurfaceFn,
    pub(crate) destroy_instance: DestroyInstanceFn,
    pub(crate) destroy_surface: DestroySurfaceFn,
    pub(crate) get_device_proc_addr: GetDeviceProcAddrFn,
    pub(crate) get_instance_proc_addr: GetInstanceProcAddrFn,
    pub(crate) get_physical_device_xlib_presentation_support:
        GetPhysicalDeviceXlibPresentationSupportFn,
    /// Keeps the function pointers above valid. `None` only in tests.
    _library: Option<Library>,
}

impl XlibBackend {
    /// Opens the host Vulkan library and resolves the required symbols.
    ///
    /// The library name defaults to [`DEFAULT_LIBRARY`] and can be
    /// overridden through [`LIBRARY_ENV_VAR`].
    pub fn load() -> Result<Self, DriverInitError> {
        let library = env::var(LIBRARY_ENV_VAR).unwrap_or_else(|_| DEFAULT_LIBRARY.to_owned());
        Self::load_from(&library)
    }

    /// Opens `library` and resolves the required symbols from it.
    pub fn load_from(library: &str) -> Result<Self, DriverInitError> {
        debug!(library, "loading native Vulkan library");

        // SAFETY: loading the system Vulkan loader runs its initializers,
        // which is the documented way to reach the API.
        let handle = unsafe { Library::new(library) }.map_err(|source| {
            DriverInitError::LibraryNotFound {
                library: library.to_owned(),
                source,
            }
        })?;

        // SAFETY: every signature below matches the Vulkan prototype of
        // the symbol it is resolved from.
        let backend = unsafe {
            XlibBackend {
                create_instance: resolve(&handle, "vkCreateInstance")?,
                create_xlib_surface: resolve(&handle, "vkCreateXlibSurfaceKHR")?,
                destroy_instance: resolve(&handle, "vkDestroyInstance")?,
                destroy_surface: resolve(&handle, "vkDestroySurfaceKHR")?,
                get_device_proc_addr: resolve(&handle, "vkGetDeviceProcAddr")?,
                get_instance_proc_addr: resolve(&handle, "vkGetInstanceProcAddr")?,
                get_physical_device_xlib_presentation_support: resolve(
                    &handle,
                    "vkGetPhysicalDeviceXlibPresentationSupportKHR",
                )?,
                _library: Some(handle),
            }
        };

        debug!(library, "native Vulkan entry points resolved");
        Ok(backend)
    }
}

/// Resolves one symbol, copying the function pointer out of the library.
///
/// # Safety
///
/// `T` must be the exact function pointer type of the named symbol.
unsafe fn resolve<T: Copy>(library: &Library, symbol: &'static str) -> Result<T, DriverInitError> {
    let resolved = library
        .get::<T>(symbol.as_bytes())
        .map_err(|source| DriverInitError::SymbolNotFound { symbol, source })?;
    Ok(*resolved)
}

#[cfg(test)]
pub(crate) fn stub_backend() -> XlibBackend {
    use ash::vk::Handle;

    unsafe extern "system" fn create_instance(
        _create_info: *const vk::InstanceCreateInfo,
        _allocator: *const vk::AllocationCallbacks,
        instance: *mut vk::Instance,
    ) -> vk::Result {
        *instance = vk::Instance::from_raw(0x1);
        vk::Result::SUCCESS
    }

    unsafe extern "system" fn create_xlib_surface(
        _instance: vk::Instance,
        _create_info: *const vk::XlibSurfaceCreateInfoKHR,
        _allocator: *const vk::AllocationCallbacks,
        surface: *mut vk::SurfaceKHR,
    ) -> vk::Result {
        *surface = vk::SurfaceKHR::from_raw(0x5afe);
        vk::Result::SUCCESS
    }

    unsafe extern "system" fn destroy_instance(
        _instance: vk::Instance,
        _allocator: *const vk::AllocationCallbacks,
    ) {
    }

    unsafe extern "system" fn destroy_surface(
        _instance: vk::Instance,
        _surface: vk::SurfaceKHR,
        _allocator: *const vk::AllocationCallbacks,
    ) {
    }

    unsafe extern "system" fn get_device_proc_addr(
        _device: vk::Device,
        _name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        None
    }

    unsafe extern "system" fn get_instance_proc_addr(
        _instance: vk::Instance,
        _name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        None
    }

    unsafe extern "system" fn get_physical_device_xlib_presentation_support(
        _physical_device: vk::PhysicalDevice,
        _queue_family_index: u32,
        _display: *mut vk::Display,
        _visual_id: vk::VisualID,
    ) -> vk::Bool32 {
        vk::TRUE
    }

    XlibBackend {
        create_instance,
        create_xlib_surface,
        destroy_instance,
        destroy_surface,
        get_device_proc_addr,
        get_instance_proc_addr,
        get_physical_device_xlib_presentation_support,
        _library: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_reports_library_not_found() {
        let result = XlibBackend::load_from("libwinbridge-test-does-not-exist.so");
        match result {
            Err(DriverInitError::LibraryNotFound { library, .. }) => {
                assert_eq!(library, "libwinbridge-test-does-not-exist.so");
            }
            other => panic!("expected LibraryNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_library_without_vulkan_symbols_reports_symbol_not_found() {
        // libc is always loadable but exports no Vulkan entry points, so
        // resolution must fail on the very first symbol.
        let result = XlibBackend::load_from("libc.so.6");
        match result {
            Err(DriverInitError::SymbolNotFound { symbol, .. }) => {
                assert_eq!(symbol, "vkCreateInstance");
            }
            other => panic!("expected SymbolNotFound, got {:?}", other.err()),
        }
    }
}
