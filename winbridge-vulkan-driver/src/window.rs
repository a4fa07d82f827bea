//! Host window-system collaborator.

use ash::vk;

/// Windowing state the surrounding emulation layer supplies to the driver.
///
/// The driver never creates or destroys host windows itself. Everything it
/// needs from the host reduces to this contract: hand over the shared
/// display connection, and turn an opaque Win32 window handle into a
/// native drawable the driver can present into.
pub trait WindowSystem: Send + Sync {
    /// Display connection shared with the native driver.
    fn display(&self) -> *mut vk::Display;

    /// Visual the host uses for client windows. Presentation-support
    /// queries are answered against this visual.
    fn visual_id(&self) -> vk::VisualID;

    /// Whether `window` is a top-level window parented to the desktop.
    fn is_toplevel(&self, window: vk::HWND) -> bool;

    /// Maps `window` to a native drawable usable as a presentation
    /// target, or `None` when the host cannot provide one.
    fn native_window(&self, window: vk::HWND) -> Option<vk::Window>;
}
