//! Driver-side dispatch table for the Win32 Vulkan presentation API.
//!
//! The emulation layer's loader asks for this table once and then routes
//! every presentation entry point through it. Every slot is always
//! present: operations without an implementation still answer, with
//! `VK_ERROR_OUT_OF_HOST_MEMORY`, so the loader never dereferences an
//! empty slot.

use std::borrow::Cow;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::slice;
use std::sync::{Arc, OnceLock};

use ash::extensions::khr::{Surface, Win32Surface};
use ash::vk;
use tracing::{error, trace, warn};

use crate::backend::XlibBackend;
use crate::surface::DriverSurface;
use crate::translate::translate_instance_create_info;
use crate::window::WindowSystem;

/// Interface version spoken between the loader and this driver. Bumped
/// whenever the shape of [`VulkanDriver`] changes.
pub const DRIVER_INTERFACE_VERSION: u32 = 1;

/// The presentation entry points the loader routes through a windowing
/// driver, with the exact signatures of the platform API.
pub trait VulkanDriver: Send + Sync {
    unsafe fn acquire_next_image(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
        fence: vk::Fence,
        image_index: *mut u32,
    ) -> vk::Result;

    unsafe fn create_instance(
        &self,
        create_info: *const vk::InstanceCreateInfo,
        allocator: *const vk::AllocationCallbacks,
        instance: *mut vk::Instance,
    ) -> vk::Result;

    unsafe fn create_swapchain(
        &self,
        device: vk::Device,
        create_info: *const vk::SwapchainCreateInfoKHR,
        allocator: *const vk::AllocationCallbacks,
        swapchain: *mut vk::SwapchainKHR,
    ) -> vk::Result;

    unsafe fn create_win32_surface(
        &self,
        instance: vk::Instance,
        create_info: *const vk::Win32SurfaceCreateInfoKHR,
        allocator: *const vk::AllocationCallbacks,
        surface: *mut vk::SurfaceKHR,
    ) -> vk::Result;

    unsafe fn destroy_instance(
        &self,
        instance: vk::Instance,
        allocator: *const vk::AllocationCallbacks,
    );

    unsafe fn destroy_surface(
        &self,
        instance: vk::Instance,
        surface: vk::SurfaceKHR,
        allocator: *const vk::AllocationCallbacks,
    );

    unsafe fn destroy_swapchain(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        allocator: *const vk::AllocationCallbacks,
    );

    unsafe fn enumerate_instance_extension_properties(
        &self,
        layer_name: *const c_char,
        count: *mut u32,
        properties: *mut vk::ExtensionProperties,
    ) -> vk::Result;

    unsafe fn get_device_proc_addr(
        &self,
        device: vk::Device,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction;

    unsafe fn get_instance_proc_addr(
        &self,
        instance: vk::Instance,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction;

    unsafe fn get_physical_device_surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        capabilities: *mut vk::SurfaceCapabilitiesKHR,
    ) -> vk::Result;

    unsafe fn get_physical_device_surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        count: *mut u32,
        formats: *mut vk::SurfaceFormatKHR,
    ) -> vk::Result;

    unsafe fn get_physical_device_surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        count: *mut u32,
        present_modes: *mut vk::PresentModeKHR,
    ) -> vk::Result;

    unsafe fn get_physical_device_surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
        supported: *mut vk::Bool32,
    ) -> vk::Result;

    unsafe fn get_physical_device_win32_presentation_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> vk::Bool32;

    unsafe fn get_swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        count: *mut u32,
        images: *mut vk::Image,
    ) -> vk::Result;

    unsafe fn queue_present(
        &self,
        queue: vk::Queue,
        present_info: *const vk::PresentInfoKHR,
    ) -> vk::Result;
}

/// The one driver implementation: Win32 presentation calls forwarded to
/// the native Xlib entry points, with descriptors rewritten on the way.
pub struct XlibVulkanDriver {
    backend: XlibBackend,
    windows: Arc<dyn WindowSystem>,
}

impl XlibVulkanDriver {
    pub fn new(backend: XlibBackend, windows: Arc<dyn WindowSystem>) -> Self {
        Self { backend, windows }
    }
}

/// Instance extensions advertised to the Win32 side.
fn supported_instance_extensions() -> [vk::ExtensionProperties; 2] {
    [
        extension_properties(Surface::name(), 1),
        extension_properties(Win32Surface::name(), 1),
    ]
}

fn extension_properties(name: &CStr, spec_version: u32) -> vk::ExtensionProperties {
    let mut properties = vk::ExtensionProperties {
        spec_version,
        ..Default::default()
    };
    for (dst, &src) in properties
        .extension_name
        .iter_mut()
        .zip(name.to_bytes_with_nul())
    {
        *dst = src as c_char;
    }
    properties
}

fn name_for_log<'a>(name: *const c_char) -> Cow<'a, str> {
    if name.is_null() {
        Cow::from("")
    } else {
        // SAFETY: non-null proc-addr names are nul-terminated strings by
        // the API contract.
        unsafe { CStr::from_ptr(name) }.to_string_lossy()
    }
}

impl VulkanDriver for XlibVulkanDriver {
    unsafe fn acquire_next_image(
        &self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _semaphore: vk::Semaphore,
        _fence: vk::Fence,
        _image_index: *mut u32,
    ) -> vk::Result {
        warn!("not implemented: acquire_next_image");
        vk::Result::ERROR_OUT_OF_HOST_MEMORY
    }

    unsafe fn create_instance(
        &self,
        create_info: *const vk::InstanceCreateInfo,
        allocator: *const vk::AllocationCallbacks,
        instance: *mut vk::Instance,
    ) -> vk::Result {
        trace!(?create_info, ?instance, "create_instance");

        if !allocator.is_null() {
            warn!("allocation callbacks are not supported");
            return vk::Result::ERROR_INCOMPATIBLE_DRIVER;
        }

        let translated = match translate_instance_create_info(&*create_info) {
            Ok(translated) => translated,
            Err(err) => {
                error!(error = %err, "failed to rewrite instance create info");
                return err.to_vk();
            }
        };

        let result = (self.backend.create_instance)(translated.as_raw(), ptr::null(), instance);

        // The native driver reads the rewritten name array only during
        // the call above; it can be released now.
        drop(translated);

        result
    }

    unsafe fn create_swapchain(
        &self,
        _device: vk::Device,
        _create_info: *const vk::SwapchainCreateInfoKHR,
        _allocator: *const vk::AllocationCallbacks,
        _swapchain: *mut vk::SwapchainKHR,
    ) -> vk::Result {
        warn!("not implemented: create_swapchain");
        vk::Result::ERROR_OUT_OF_HOST_MEMORY
    }

    unsafe fn create_win32_surface(
        &self,
        instance: vk::Instance,
        create_info: *const vk::Win32SurfaceCreateInfoKHR,
        allocator: *const vk::AllocationCallbacks,
        surface: *mut vk::SurfaceKHR,
    ) -> vk::Result {
        trace!(?instance, ?create_info, "create_win32_surface");

        if !allocator.is_null() {
            warn!("allocation callbacks are not supported");
            return vk::Result::ERROR_INCOMPATIBLE_DRIVER;
        }

        let create_info = &*create_info;

        // Only top-level windows can be presented into; a child window
        // has no native drawable of its own.
        if !self.windows.is_toplevel(create_info.hwnd) {
            warn!("child-window rendering is not supported");
            return vk::Result::ERROR_INCOMPATIBLE_DRIVER;
        }

        let window = match self.windows.native_window(create_info.hwnd) {
            Some(window) => window,
            None => {
                error!("no native drawable available for the requested window");
                return vk::Result::ERROR_OUT_OF_HOST_MEMORY;
            }
        };

        let native_info = vk::XlibSurfaceCreateInfoKHR::builder()
            .dpy(self.windows.display())
            .window(window)
            .build();

        let mut native = vk::SurfaceKHR::null();
        let result =
            (self.backend.create_xlib_surface)(instance, &native_info, ptr::null(), &mut native);
        if result != vk::Result::SUCCESS {
            error!(?result, "native surface creation failed");
            return result;
        }

        *surface = Box::new(DriverSurface { window, native }).into_handle();

        trace!(surface = ?*surface, window, "created surface");
        vk::Result::SUCCESS
    }

    unsafe fn destroy_instance(
        &self,
        instance: vk::Instance,
        allocator: *const vk::AllocationCallbacks,
    ) {
        trace!(?instance, "destroy_instance");

        if !allocator.is_null() {
            warn!("allocation callbacks are not supported");
        }

        (self.backend.destroy_instance)(instance, ptr::null());
    }

    unsafe fn destroy_surface(
        &self,
        instance: vk::Instance,
        surface: vk::SurfaceKHR,
        allocator: *const vk::AllocationCallbacks,
    ) {
        trace!(?instance, ?surface, "destroy_surface");

        if !allocator.is_null() {
            warn!("allocation callbacks are not supported");
        }

        if surface == vk::SurfaceKHR::null() {
            return;
        }

        let surface = DriverSurface::from_handle(surface);
        (self.backend.destroy_surface)(instance, surface.native, ptr::null());
        trace!(window = surface.window, "destroyed surface");
    }

    unsafe fn destroy_swapchain(
        &self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
        _allocator: *const vk::AllocationCallbacks,
    ) {
        warn!("not implemented: destroy_swapchain");
    }

    unsafe fn enumerate_instance_extension_properties(
        &self,
        layer_name: *const c_char,
        count: *mut u32,
        properties: *mut vk::ExtensionProperties,
    ) -> vk::Result {
        trace!(?count, ?properties, "enumerate_instance_extension_properties");

        // The loader keeps layer enumeration to itself; a layer name
        // reaching the driver is a caller error.
        if !layer_name.is_null() {
            error!("layer enumeration is not routed through the driver");
            return vk::Result::ERROR_LAYER_NOT_PRESENT;
        }

        let supported = supported_instance_extensions();

        if properties.is_null() {
            *count = supported.len() as u32;
            return vk::Result::SUCCESS;
        }

        let copies = (*count as usize).min(supported.len());
        slice::from_raw_parts_mut(properties, copies).copy_from_slice(&supported[..copies]);
        *count = copies as u32;

        if copies < supported.len() {
            vk::Result::INCOMPLETE
        } else {
            vk::Result::SUCCESS
        }
    }

    unsafe fn get_device_proc_addr(
        &self,
        device: vk::Device,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        trace!(?device, name = %name_for_log(name), "get_device_proc_addr");
        (self.backend.get_device_proc_addr)(device, name)
    }

    unsafe fn get_instance_proc_addr(
        &self,
        instance: vk::Instance,
        name: *const c_char,
    ) -> vk::PFN_vkVoidFunction {
        trace!(?instance, name = %name_for_log(name), "get_instance_proc_addr");
        (self.backend.get_instance_proc_addr)(instance, name)
    }

    unsafe fn get_physical_device_surface_capabilities(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
        _capabilities: *mut vk::SurfaceCapabilitiesKHR,
    ) -> vk::Result {
        warn!("not implemented: get_physical_device_surface_capabilities");
        vk::Result::ERROR_OUT_OF_HOST_MEMORY
    }

    unsafe fn get_physical_device_surface_formats(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
        _count: *mut u32,
        _formats: *mut vk::SurfaceFormatKHR,
    ) -> vk::Result {
        warn!("not implemented: get_physical_device_surface_formats");
        vk::Result::ERROR_OUT_OF_HOST_MEMORY
    }

    unsafe fn get_physical_device_surface_present_modes(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
        _count: *mut u32,
        _present_modes: *mut vk::PresentModeKHR,
    ) -> vk::Result {
        warn!("not implemented: get_physical_device_surface_present_modes");
        vk::Result::ERROR_OUT_OF_HOST_MEMORY
    }

    unsafe fn get_physical_device_surface_support(
        &self,
        _physical_device: vk::PhysicalDevice,
        _queue_family_index: u32,
        _surface: vk::SurfaceKHR,
        _supported: *mut vk::Bool32,
    ) -> vk::Result {
        warn!("not implemented: get_physical_device_surface_support");
        vk::Result::ERROR_OUT_OF_HOST_MEMORY
    }

    unsafe fn get_physical_device_win32_presentation_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> vk::Bool32 {
        trace!(
            ?physical_device,
            queue_family_index,
            "get_physical_device_win32_presentation_support"
        );

        (self.backend.get_physical_device_xlib_presentation_support)(
            physical_device,
            queue_family_index,
            self.windows.display(),
            self.windows.visual_id(),
        )
    }

    unsafe fn get_swapchain_images(
        &self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
        _count: *mut u32,
        _images: *mut vk::Image,
    ) -> vk::Result {
        warn!("not implemented: get_swapchain_images");
        vk::Result::ERROR_OUT_OF_HOST_MEMORY
    }

    unsafe fn queue_present(
        &self,
        _queue: vk::Queue,
        _present_info: *const vk::PresentInfoKHR,
    ) -> vk::Result {
        warn!("not implemented: queue_present");
        vk::Result::ERROR_OUT_OF_HOST_MEMORY
    }
}

static DRIVER: OnceLock<Option<XlibVulkanDriver>> = OnceLock::new();

/// Returns the process-wide driver table for `version`.
///
/// `None` when the requested interface version is not the one this
/// driver implements, or when the native library or one of its required
/// entry points cannot be resolved. Resolution happens on first use;
/// its outcome, success or failure, is cached for the lifetime of the
/// process and never retried.
pub fn get_vulkan_driver(
    version: u32,
    windows: Arc<dyn WindowSystem>,
) -> Option<&'static dyn VulkanDriver> {
    if version != DRIVER_INTERFACE_VERSION {
        error!(
            requested = version,
            implemented = DRIVER_INTERFACE_VERSION,
            "driver interface version mismatch"
        );
        return None;
    }

    DRIVER
        .get_or_init(|| match XlibBackend::load() {
            Ok(backend) => Some(XlibVulkanDriver::new(backend, windows)),
            Err(err) => {
                error!(error = %err, "native Vulkan backend unavailable");
                None
            }
        })
        .as_ref()
        .map(|driver| driver as &dyn VulkanDriver)
}
