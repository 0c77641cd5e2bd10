// SPDX-License-Identifier: Apache-2.0
//! Load `libsane` and resolve the SANE entry points.
//!
//! The frontend ABI is a fixed set of unprefixed symbols:
//!
//! ```text
//! sane_init
//! sane_exit
//! sane_get_devices
//! sane_open
//! sane_close
//! sane_get_option_descriptor
//! sane_control_option
//! sane_strstatus        (optional, used for diagnostics)
//! ```
//!
//! [`NativeLibrary`] implements [`Backend`] over these pointers. It copies
//! everything the library returns into owned Rust values before the call
//! returns, since SANE only guarantees returned memory until the next call.

use std::ffi::{CStr, c_void};
use std::os::raw::c_char;
use std::path::Path;

use libloading::{Library, Symbol};

use crate::backend::{Action, Backend, RawHandle};
use crate::config::SaneConfig;
use crate::device::DeviceDescriptor;
use crate::error::{Result, SaneError, Status, check_status};
use crate::ffi;
use crate::option::{Capabilities, Constraint, InfoFlags, OptionDescriptor, Range, Unit, ValueType};
use crate::version::LibraryVersion;

// ---------------------------------------------------------------------------
// SANE function table
// ---------------------------------------------------------------------------

/// A loaded `libsane` with all function pointers resolved.
///
/// The library handle is kept alive for the lifetime of this struct so the
/// `.so` is not unloaded while we still hold function pointers into it.
pub(crate) struct NativeLibrary {
    /// Prevent the shared library from being unloaded.
    _library: Library,

    /// Path the library was loaded from (for diagnostics).
    library_path: String,

    /// Set between a successful `sane_init` and `sane_exit`.
    initialized: bool,

    fn_init: ffi::FnInit,
    fn_exit: ffi::FnExit,
    fn_get_devices: ffi::FnGetDevices,
    fn_open: ffi::FnOpen,
    fn_close: ffi::FnClose,
    fn_get_option_descriptor: ffi::FnGetOptionDescriptor,
    fn_control_option: ffi::FnControlOption,
    fn_strstatus: Option<ffi::FnStrStatus>,
}

impl NativeLibrary {
    /// Load a SANE library and resolve all function pointers.
    ///
    /// # Errors
    ///
    /// Returns [`SaneError::Init`] if `dlopen` fails or a required symbol
    /// cannot be resolved.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let path_str = path.display().to_string();

        // SAFETY: we are loading an external shared library. The caller is
        // responsible for ensuring the library is trustworthy.
        let library = unsafe { Library::new(path) }
            .map_err(|e| SaneError::init(format!("failed to load '{path_str}': {e}")))?;

        tracing::debug!("loaded SANE library '{path_str}'");

        let fn_init = resolve_required::<ffi::FnInit>(&library, "sane_init")?;
        let fn_exit = resolve_required::<ffi::FnExit>(&library, "sane_exit")?;
        let fn_get_devices = resolve_required::<ffi::FnGetDevices>(&library, "sane_get_devices")?;
        let fn_open = resolve_required::<ffi::FnOpen>(&library, "sane_open")?;
        let fn_close = resolve_required::<ffi::FnClose>(&library, "sane_close")?;
        let fn_get_option_descriptor =
            resolve_required::<ffi::FnGetOptionDescriptor>(&library, "sane_get_option_descriptor")?;
        let fn_control_option =
            resolve_required::<ffi::FnControlOption>(&library, "sane_control_option")?;
        let fn_strstatus = resolve_optional::<ffi::FnStrStatus>(&library, "sane_strstatus");

        Ok(Self {
            _library: library,
            library_path: path_str,
            initialized: false,
            fn_init,
            fn_exit,
            fn_get_devices,
            fn_open,
            fn_close,
            fn_get_option_descriptor,
            fn_control_option,
            fn_strstatus,
        })
    }

    /// Try each configured candidate in turn; the first that loads wins.
    pub(crate) fn load_from_config(config: &SaneConfig) -> Result<Self> {
        let mut failures = Vec::new();
        for candidate in config.library_candidates() {
            match Self::load(&candidate) {
                Ok(library) => return Ok(library),
                Err(e) => {
                    tracing::debug!("skipping {}: {e}", candidate.display());
                    failures.push(e.to_string());
                }
            }
        }
        Err(SaneError::init(format!(
            "no usable SANE library found ({})",
            failures.join("; ")
        )))
    }

    /// Filesystem path the library was loaded from.
    pub(crate) fn library_path(&self) -> &str {
        &self.library_path
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        if self.initialized {
            tracing::warn!("'{}' dropped without sane_exit; exiting now", self.library_path);
            // SAFETY: sane_init succeeded and sane_exit has not been called.
            unsafe { (self.fn_exit)() };
        }
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("library_path", &self.library_path)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Backend for NativeLibrary {
    fn name(&self) -> &str {
        &self.library_path
    }

    fn describe_status(&self, status: Status) -> Option<String> {
        let f = self.fn_strstatus?;
        // SAFETY: sane_strstatus returns a static string (or NULL).
        unsafe { c_str_to_string(f(status.code())) }
    }

    fn init(&mut self) -> std::result::Result<LibraryVersion, Status> {
        let mut code: ffi::SaneInt = 0;
        // SAFETY: valid out-pointer; no authorization callback.
        let ret = unsafe { (self.fn_init)(&mut code, None) };
        check_status(ret)?;
        self.initialized = true;
        Ok(LibraryVersion::from_code(code))
    }

    fn exit(&mut self) {
        if self.initialized {
            // SAFETY: paired with the successful sane_init above.
            unsafe { (self.fn_exit)() };
            self.initialized = false;
        }
    }

    fn get_devices(&mut self, local_only: bool) -> std::result::Result<Vec<DeviceDescriptor>, Status> {
        let mut list: *const *const ffi::SaneDevice = std::ptr::null();
        // SAFETY: valid out-pointer.
        let ret = unsafe { (self.fn_get_devices)(&mut list, ffi::SaneBool::from(local_only)) };
        check_status(ret)?;

        let mut devices = Vec::new();
        if list.is_null() {
            return Ok(devices);
        }

        // SAFETY: on success the library hands back a NULL-terminated array of
        // device pointers that stays valid until the next sane_get_devices.
        unsafe {
            let mut cursor = list;
            while !(*cursor).is_null() {
                let dev = &**cursor;
                devices.push(DeviceDescriptor {
                    name: c_str_to_string(dev.name).unwrap_or_default(),
                    vendor: c_str_to_string(dev.vendor).unwrap_or_default(),
                    model: c_str_to_string(dev.model).unwrap_or_default(),
                    kind: c_str_to_string(dev.type_).unwrap_or_default(),
                });
                cursor = cursor.add(1);
            }
        }

        Ok(devices)
    }

    fn open(&mut self, name: &CStr) -> std::result::Result<RawHandle, Status> {
        let mut handle: ffi::SaneHandle = std::ptr::null_mut();
        // SAFETY: `name` is NUL-terminated; valid out-pointer.
        let ret = unsafe { (self.fn_open)(name.as_ptr(), &mut handle) };
        check_status(ret)?;
        Ok(RawHandle::from_ptr(handle))
    }

    fn close(&mut self, handle: RawHandle) {
        // SAFETY: the handle came from sane_open and the runtime closes it once.
        unsafe { (self.fn_close)(handle.as_ptr()) };
    }

    fn option_descriptor(&mut self, handle: RawHandle, index: i32) -> Option<OptionDescriptor> {
        // SAFETY: the handle is open and the runtime has bounds-checked `index`.
        let ptr = unsafe { (self.fn_get_option_descriptor)(handle.as_ptr(), index) };
        if ptr.is_null() {
            return None;
        }
        let index = usize::try_from(index).ok()?;
        // SAFETY: a non-null descriptor stays valid until the handle is closed.
        Some(unsafe { convert_descriptor(index, &*ptr) })
    }

    fn control_option(
        &mut self,
        handle: RawHandle,
        index: i32,
        action: Action,
        value: &mut [u8],
    ) -> std::result::Result<InfoFlags, Status> {
        let value_ptr = if value.is_empty() {
            std::ptr::null_mut()
        } else {
            value.as_mut_ptr().cast::<c_void>()
        };
        let mut info: ffi::SaneInt = 0;
        // SAFETY: the buffer was sized from the option's descriptor.
        let ret = unsafe {
            (self.fn_control_option)(handle.as_ptr(), index, action.code(), value_ptr, &mut info)
        };
        check_status(ret)?;
        Ok(InfoFlags::from_bits(info))
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Copy a C string into an owned `String`; NULL yields `None`.
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL-terminated string.
unsafe fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: guaranteed by the caller.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

/// # Safety
///
/// `raw` must be a descriptor returned by `sane_get_option_descriptor`,
/// whose constraint pointer matches its constraint type.
unsafe fn convert_descriptor(index: usize, raw: &ffi::SaneOptionDescriptor) -> OptionDescriptor {
    // SAFETY: upheld by the caller for every pointer in `raw`.
    unsafe {
        let constraint = match raw.constraint_type {
            ffi::SANE_CONSTRAINT_RANGE if !raw.constraint.range.is_null() => {
                let r = &*raw.constraint.range;
                Constraint::Range(Range {
                    min: r.min,
                    max: r.max,
                    quant: r.quant,
                })
            }
            ffi::SANE_CONSTRAINT_WORD_LIST if !raw.constraint.word_list.is_null() => {
                let list = raw.constraint.word_list;
                let len = usize::try_from(*list).unwrap_or(0);
                Constraint::WordList(std::slice::from_raw_parts(list.add(1), len).to_vec())
            }
            ffi::SANE_CONSTRAINT_STRING_LIST if !raw.constraint.string_list.is_null() => {
                let mut strings = Vec::new();
                let mut cursor = raw.constraint.string_list;
                while !(*cursor).is_null() {
                    strings.extend(c_str_to_string(*cursor));
                    cursor = cursor.add(1);
                }
                Constraint::StringList(strings)
            }
            _ => Constraint::None,
        };

        OptionDescriptor {
            index,
            name: c_str_to_string(raw.name).unwrap_or_default(),
            title: c_str_to_string(raw.title).unwrap_or_default(),
            description: c_str_to_string(raw.desc).unwrap_or_default(),
            value_type: ValueType::from_code(raw.type_),
            unit: Unit::from_code(raw.unit),
            size: usize::try_from(raw.size).unwrap_or(0),
            capabilities: Capabilities::from_bits(raw.cap),
            constraint,
        }
    }
}

// ---------------------------------------------------------------------------
// Symbol resolution helpers
// ---------------------------------------------------------------------------

/// Resolve a required symbol. Returns an error if the symbol is missing.
fn resolve_required<T: Copy>(library: &Library, name: &str) -> Result<T> {
    tracing::trace!("resolving required symbol '{name}'");

    // SAFETY: The caller guarantees the type `T` matches the actual function
    // signature exported by the library. This is the core FFI contract.
    unsafe {
        let sym: Symbol<T> = library
            .get(name.as_bytes())
            .map_err(|e| SaneError::init(format!("symbol '{name}' not found: {e}")))?;
        Ok(*sym)
    }
}

/// Resolve an optional symbol. Returns `None` if the symbol is missing.
fn resolve_optional<T: Copy>(library: &Library, name: &str) -> Option<T> {
    tracing::trace!("resolving optional symbol '{name}'");

    // SAFETY: as for `resolve_required`.
    unsafe { library.get::<T>(name.as_bytes()).ok().map(|s| *s) }
}
