//! Instance-descriptor translation between the Win32 and Xlib surface APIs.
//!
//! Applications on the Win32 side describe the instance they want in terms
//! of Win32 extensions. The native driver only understands the Xlib
//! equivalents, so the descriptor is rewritten before it crosses over:
//! surface extension names are substituted, everything the native driver
//! must not see (chained structures, layer names) is stripped.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use ash::extensions::khr::{Win32Surface, XlibSurface};
use ash::vk;
use tracing::warn;

use crate::error::TranslationError;

/// Win32 extension names and the Xlib names they are rewritten to.
///
/// A single entry today; kept as a table so further surface extensions
/// slot in without touching the rewrite loop.
fn extension_substitutions() -> [(&'static CStr, &'static CStr); 1] {
    [(Win32Surface::name(), XlibSurface::name())]
}

/// An instance descriptor rewritten for the native Xlib driver.
///
/// Owns the rewritten extension-name array and nothing else: the
/// application info and any untouched name strings are still borrowed
/// from the caller's descriptor. The native driver reads the array only
/// for the duration of the call it is passed to, so dropping this value
/// right after that call returns is sound.
pub struct TranslatedInstanceCreateInfo {
    create_info: vk::InstanceCreateInfo,
    extension_names: Vec<*const c_char>,
}

impl TranslatedInstanceCreateInfo {
    /// Pointer to the rewritten descriptor, for handing to the native
    /// entry point. Valid for as long as `self` lives.
    pub fn as_raw(&self) -> *const vk::InstanceCreateInfo {
        &self.create_info
    }
}

/// Rewrites `src` into a descriptor the native Xlib driver can consume.
///
/// The type tag, creation flags and application-info pointer carry over
/// verbatim. Chained structures are reported and dropped, never
/// forwarded: a chain node may hold Win32-specific payload (callback
/// pointers among them) that has no meaning to the native driver. Layer
/// names are also never forwarded, since layer negotiation already
/// happened in the caller's loader and repeating the names here would
/// activate the same layers twice. Extension names are copied to their
/// original positions, with Win32 surface extensions substituted by
/// their Xlib equivalents and everything else passed through by pointer.
///
/// Exactly one heap allocation is made, for the rewritten name array, or
/// none when the input requests no extensions. If that allocation fails
/// the whole translation is abandoned.
///
/// # Safety
///
/// `src` must be a valid instance descriptor: its chain pointer, name
/// arrays and counts must describe live memory for the duration of the
/// call, and the returned value must not outlive the name strings of
/// `src`.
pub unsafe fn translate_instance_create_info(
    src: &vk::InstanceCreateInfo,
) -> Result<TranslatedInstanceCreateInfo, TranslationError> {
    let mut node = src.p_next as *const vk::BaseInStructure;
    while !node.is_null() {
        let header = &*node;
        warn!(
            s_type = ?header.s_type,
            "dropping chained structure the native driver cannot consume"
        );
        node = header.p_next;
    }

    let extension_names = rewrite_extension_names(
        src.pp_enabled_extension_names,
        src.enabled_extension_count as usize,
    )?;

    let create_info = vk::InstanceCreateInfo {
        s_type: src.s_type,
        p_next: ptr::null(),
        flags: src.flags,
        p_application_info: src.p_application_info,
        enabled_layer_count: 0,
        pp_enabled_layer_names: ptr::null(),
        enabled_extension_count: src.enabled_extension_count,
        pp_enabled_extension_names: if extension_names.is_empty() {
            ptr::null()
        } else {
            extension_names.as_ptr()
        },
    };

    Ok(TranslatedInstanceCreateInfo {
        create_info,
        extension_names,
    })
}

unsafe fn rewrite_extension_names(
    src: *const *const c_char,
    count: usize,
) -> Result<Vec<*const c_char>, TranslationError> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut names = allocate_name_array(count)?;
    for &name in slice::from_raw_parts(src, count) {
        let requested = CStr::from_ptr(name);
        let rewritten = extension_substitutions()
            .iter()
            .find(|&&(win32, _)| win32 == requested)
            .map(|&(_, xlib)| xlib.as_ptr())
            .unwrap_or(name);
        names.push(rewritten);
    }
    Ok(names)
}

/// Reserves the name array up front so the rewrite loop never
/// reallocates, and so an allocation failure happens before anything is
/// written.
fn allocate_name_array(count: usize) -> Result<Vec<*const c_char>, TranslationError> {
    let mut names = Vec::new();
    names
        .try_reserve_exact(count)
        .map_err(|_| TranslationError::OutOfHostMemory)?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::{c_void, CString};

    #[test]
    fn test_no_extensions_allocates_nothing() {
        let src = vk::InstanceCreateInfo::builder().build();

        let translated = unsafe { translate_instance_create_info(&src) }.unwrap();

        assert_eq!(translated.create_info.enabled_extension_count, 0);
        assert!(translated.create_info.pp_enabled_extension_names.is_null());
        assert_eq!(translated.extension_names.capacity(), 0);
    }

    #[test]
    fn test_win32_surface_name_is_rewritten() {
        let names = [Win32Surface::name().as_ptr()];
        let src = vk::InstanceCreateInfo::builder()
            .enabled_extension_names(&names)
            .build();

        let translated = unsafe { translate_instance_create_info(&src) }.unwrap();

        assert_eq!(translated.create_info.enabled_extension_count, 1);
        let rewritten = unsafe { CStr::from_ptr(translated.extension_names[0]) };
        assert_eq!(rewritten, XlibSurface::name());
    }

    #[test]
    fn test_unrelated_names_keep_their_input_pointers() {
        let other = CString::new("VK_EXT_other").unwrap();
        let names = [other.as_ptr()];
        let src = vk::InstanceCreateInfo::builder()
            .enabled_extension_names(&names)
            .build();

        let translated = unsafe { translate_instance_create_info(&src) }.unwrap();

        // Pass-through is by pointer, not by copy.
        assert_eq!(translated.extension_names[0], other.as_ptr());
    }

    #[test]
    fn test_substitution_preserves_order_and_positions() {
        let other = CString::new("VK_EXT_other").unwrap();
        let names = [Win32Surface::name().as_ptr(), other.as_ptr()];
        let src = vk::InstanceCreateInfo::builder()
            .enabled_extension_names(&names)
            .build();

        let translated = unsafe { translate_instance_create_info(&src) }.unwrap();

        assert_eq!(translated.create_info.enabled_extension_count, 2);
        let first = unsafe { CStr::from_ptr(translated.extension_names[0]) };
        assert_eq!(first, XlibSurface::name());
        assert_eq!(translated.extension_names[1], other.as_ptr());
    }

    #[test]
    fn test_duplicate_names_keep_their_multiplicity() {
        let names = [
            Win32Surface::name().as_ptr(),
            Win32Surface::name().as_ptr(),
        ];
        let src = vk::InstanceCreateInfo::builder()
            .enabled_extension_names(&names)
            .build();

        let translated = unsafe { translate_instance_create_info(&src) }.unwrap();

        assert_eq!(translated.create_info.enabled_extension_count, 2);
        for &name in &translated.extension_names {
            let rewritten = unsafe { CStr::from_ptr(name) };
            assert_eq!(rewritten, XlibSurface::name());
        }
    }

    #[test]
    fn test_chained_structures_are_never_forwarded() {
        let _guard = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        let tail = vk::BaseInStructure {
            s_type: vk::StructureType::from_raw(1_000_123_001),
            p_next: ptr::null(),
        };
        let head = vk::BaseInStructure {
            s_type: vk::StructureType::from_raw(1_000_123_000),
            p_next: &tail,
        };
        let src = vk::InstanceCreateInfo {
            p_next: &head as *const _ as *const c_void,
            ..Default::default()
        };

        let translated = unsafe { translate_instance_create_info(&src) }.unwrap();

        assert!(translated.create_info.p_next.is_null());
        assert_eq!(translated.create_info.enabled_extension_count, 0);
    }

    #[test]
    fn test_layer_names_are_stripped() {
        let layer = CString::new("VK_LAYER_KHRONOS_validation").unwrap();
        let layers = [layer.as_ptr()];
        let src = vk::InstanceCreateInfo::builder()
            .enabled_layer_names(&layers)
            .build();

        let translated = unsafe { translate_instance_create_info(&src) }.unwrap();

        assert_eq!(translated.create_info.enabled_layer_count, 0);
        assert!(translated.create_info.pp_enabled_layer_names.is_null());
    }

    #[test]
    fn test_tag_flags_and_application_info_carry_over() {
        let app_info = vk::ApplicationInfo::builder()
            .api_version(vk::API_VERSION_1_3)
            .build();
        let src = vk::InstanceCreateInfo {
            s_type: vk::StructureType::from_raw(42),
            flags: vk::InstanceCreateFlags::from_raw(0x1),
            p_application_info: &app_info,
            ..Default::default()
        };

        let translated = unsafe { translate_instance_create_info(&src) }.unwrap();

        assert_eq!(translated.create_info.s_type, vk::StructureType::from_raw(42));
        assert_eq!(
            translated.create_info.flags,
            vk::InstanceCreateFlags::from_raw(0x1)
        );
        assert_eq!(
            translated.create_info.p_application_info,
            &app_info as *const vk::ApplicationInfo
        );
    }

    #[test]
    fn test_allocation_failure_reports_out_of_host_memory() {
        // A reservation this large overflows the allocator's capacity
        // limit, which takes the same failure path as memory exhaustion.
        let result = allocate_name_array(usize::MAX);
        assert_eq!(result.unwrap_err(), TranslationError::OutOfHostMemory);
    }
}
