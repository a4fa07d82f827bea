//! Surface records handed back across the driver boundary.

use ash::vk;
use ash::vk::Handle;

/// Pairs the host drawable with the surface the native driver created
/// for it. The `VkSurfaceKHR` handle the caller receives is the heap
/// address of this record.
pub(crate) struct DriverSurface {
    pub window: vk::Window,
    pub native: vk::SurfaceKHR,
}

impl DriverSurface {
    /// Leaks the record into a caller-facing surface handle.
    pub fn into_handle(self: Box<Self>) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(Box::into_raw(self) as u64)
    }

    /// Reclaims ownership of the record behind `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must come from [`DriverSurface::into_handle`] and must
    /// not have been reclaimed before.
    pub unsafe fn from_handle(handle: vk::SurfaceKHR) -> Box<Self> {
        Box::from_raw(handle.as_raw() as usize as *mut Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_round_trip() {
        let surface = Box::new(DriverSurface {
            window: 0x2a,
            native: vk::SurfaceKHR::from_raw(0xdead_beef),
        });

        let handle = surface.into_handle();
        assert_ne!(handle, vk::SurfaceKHR::null());

        let reclaimed = unsafe { DriverSurface::from_handle(handle) };
        assert_eq!(reclaimed.window, 0x2a);
        assert_eq!(reclaimed.native, vk::SurfaceKHR::from_raw(0xdead_beef));
    }
}
