// SPDX-License-Identifier: Apache-2.0
//! The native-layer contract.
//!
//! [`Backend`] mirrors the SANE C entry points one-to-one, already lifted
//! into Rust types: strings are owned, descriptors are decoded, and status
//! codes are [`Status`] values. It performs **no** validation; every
//! defensive check lives in the layer above ([`crate::runtime`] and
//! [`crate::session`]), so an implementation may be exactly as fragile as
//! the library it wraps.
//!
//! Implementations:
//! - `NativeLibrary`: `libsane` loaded with `libloading`. It is private to
//!   the crate and only ever driven by the runtime, so a forged handle or
//!   an unchecked index cannot reach the real library.
//! - [`crate::mock::MockBackend`]: in-process emulation for tests
//!
//! Handles cannot be built from raw pointers outside the crate:
//!
//! ```compile_fail
//! let handle = rsane::backend::RawHandle(1);
//! ```
//!
//! and the native library cannot be loaded and called directly:
//!
//! ```compile_fail
//! let lib = rsane::library::NativeLibrary::load(std::path::Path::new("libsane.so.1"));
//! ```

use std::ffi::{CStr, c_void};

use crate::device::DeviceDescriptor;
use crate::error::Status;
use crate::ffi;
use crate::option::{InfoFlags, OptionDescriptor};
use crate::version::LibraryVersion;

/// Opaque native device handle.
///
/// The pointer value is stored as a `usize` so the handle is `Copy`, `Send`
/// and `Hash`. It is only meaningful to the backend that issued it, and
/// never dereferenced on the Rust side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(usize);

impl RawHandle {
    /// A handle token issued by an in-process [`Backend`].
    pub const fn new(token: usize) -> Self {
        Self(token)
    }

    pub const fn token(self) -> usize {
        self.0
    }

    pub(crate) fn from_ptr(ptr: ffi::SaneHandle) -> Self {
        Self(ptr as usize)
    }

    pub(crate) fn as_ptr(self) -> ffi::SaneHandle {
        self.0 as *mut c_void
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// `SANE_Action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GetValue,
    SetValue,
    SetAuto,
}

impl Action {
    pub fn code(self) -> ffi::SaneAction {
        match self {
            Action::GetValue => ffi::SANE_ACTION_GET_VALUE,
            Action::SetValue => ffi::SANE_ACTION_SET_VALUE,
            Action::SetAuto => ffi::SANE_ACTION_SET_AUTO,
        }
    }
}

/// One SANE implementation. All calls are made with the process-wide
/// runtime lock held, so implementations never see concurrent calls.
pub trait Backend: Send {
    /// Human-readable identification for logs.
    fn name(&self) -> &str;

    /// The library's own wording for `status` (`sane_strstatus`), if it has one.
    fn describe_status(&self, _status: Status) -> Option<String> {
        None
    }

    /// `sane_init`
    fn init(&mut self) -> Result<LibraryVersion, Status>;

    /// `sane_exit`
    fn exit(&mut self);

    /// `sane_get_devices`
    fn get_devices(&mut self, local_only: bool) -> Result<Vec<DeviceDescriptor>, Status>;

    /// `sane_open`
    fn open(&mut self, name: &CStr) -> Result<RawHandle, Status>;

    /// `sane_close`
    fn close(&mut self, handle: RawHandle);

    /// `sane_get_option_descriptor`; `None` when the library returns NULL.
    ///
    /// Real libraries may crash instead of returning NULL for an index
    /// outside `0..count`; callers must bounds-check first.
    fn option_descriptor(&mut self, handle: RawHandle, index: i32) -> Option<OptionDescriptor>;

    /// `sane_control_option`. `value` is the in/out buffer; an empty slice
    /// is passed to the library as NULL (`SET_AUTO`, buttons).
    fn control_option(
        &mut self,
        handle: RawHandle,
        index: i32,
        action: Action,
        value: &mut [u8],
    ) -> Result<InfoFlags, Status>;
}
