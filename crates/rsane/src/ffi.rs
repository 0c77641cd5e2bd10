// SPDX-License-Identifier: Apache-2.0
//! Raw FFI constants and type definitions for the SANE 1.0 C interface.
//!
//! These values must match `sane/sane.h` from sane-backends. All function
//! pointers are resolved at runtime from `libsane` (see
//! the crate-private `NativeLibrary`); nothing is linked statically.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

// ===========================================================================
// Scalar types
// ===========================================================================

/// `SANE_Word`: every numeric SANE value is one 32-bit word.
pub type SaneWord = i32;

/// `SANE_Int`
pub type SaneInt = SaneWord;

/// `SANE_Bool`
pub type SaneBool = SaneWord;

/// `SANE_Fixed`: signed 16.16 fixed point.
pub type SaneFixed = SaneWord;

/// `SANE_String_Const`
pub type SaneStringConst = *const c_char;

/// Opaque device handle (`SANE_Handle`).
pub type SaneHandle = *mut c_void;

/// Size in bytes of one `SANE_Word`.
pub const WORD_SIZE: usize = std::mem::size_of::<SaneWord>();

/// Number of fractional bits in a `SANE_Fixed`.
pub const SANE_FIXED_SCALE_SHIFT: u32 = 16;

// ===========================================================================
// Version
// ===========================================================================

pub const SANE_CURRENT_MAJOR: u8 = 1;
pub const SANE_CURRENT_MINOR: u8 = 0;

/// `SANE_VERSION_CODE(major, minor, build)`
#[inline]
pub fn version_code(major: u8, minor: u8, build: u16) -> SaneInt {
    ((i32::from(major) & 0xff) << 24) | ((i32::from(minor) & 0xff) << 16) | i32::from(build)
}

// ===========================================================================
// Status codes (SANE_Status)
// ===========================================================================

pub type SaneStatus = c_int;

pub const SANE_STATUS_GOOD: SaneStatus = 0;
pub const SANE_STATUS_UNSUPPORTED: SaneStatus = 1;
pub const SANE_STATUS_CANCELLED: SaneStatus = 2;
pub const SANE_STATUS_DEVICE_BUSY: SaneStatus = 3;
pub const SANE_STATUS_INVAL: SaneStatus = 4;
pub const SANE_STATUS_EOF: SaneStatus = 5;
pub const SANE_STATUS_JAMMED: SaneStatus = 6;
pub const SANE_STATUS_NO_DOCS: SaneStatus = 7;
pub const SANE_STATUS_COVER_OPEN: SaneStatus = 8;
pub const SANE_STATUS_IO_ERROR: SaneStatus = 9;
pub const SANE_STATUS_NO_MEM: SaneStatus = 10;
pub const SANE_STATUS_ACCESS_DENIED: SaneStatus = 11;

// ===========================================================================
// Value types (SANE_Value_Type)
// ===========================================================================

pub type SaneValueType = c_int;

pub const SANE_TYPE_BOOL: SaneValueType = 0;
pub const SANE_TYPE_INT: SaneValueType = 1;
pub const SANE_TYPE_FIXED: SaneValueType = 2;
pub const SANE_TYPE_STRING: SaneValueType = 3;
pub const SANE_TYPE_BUTTON: SaneValueType = 4;
pub const SANE_TYPE_GROUP: SaneValueType = 5;

// ===========================================================================
// Units (SANE_Unit)
// ===========================================================================

pub type SaneUnit = c_int;

pub const SANE_UNIT_NONE: SaneUnit = 0;
pub const SANE_UNIT_PIXEL: SaneUnit = 1;
pub const SANE_UNIT_BIT: SaneUnit = 2;
pub const SANE_UNIT_MM: SaneUnit = 3;
pub const SANE_UNIT_DPI: SaneUnit = 4;
pub const SANE_UNIT_PERCENT: SaneUnit = 5;
pub const SANE_UNIT_MICROSECOND: SaneUnit = 6;

// ===========================================================================
// Capability bits (SANE_CAP_*)
// ===========================================================================

pub const SANE_CAP_SOFT_SELECT: SaneInt = 1 << 0;
pub const SANE_CAP_HARD_SELECT: SaneInt = 1 << 1;
pub const SANE_CAP_SOFT_DETECT: SaneInt = 1 << 2;
pub const SANE_CAP_EMULATED: SaneInt = 1 << 3;
pub const SANE_CAP_AUTOMATIC: SaneInt = 1 << 4;
pub const SANE_CAP_INACTIVE: SaneInt = 1 << 5;
pub const SANE_CAP_ADVANCED: SaneInt = 1 << 6;

// ===========================================================================
// Info bits returned by sane_control_option (SANE_INFO_*)
// ===========================================================================

pub const SANE_INFO_INEXACT: SaneInt = 1 << 0;
pub const SANE_INFO_RELOAD_OPTIONS: SaneInt = 1 << 1;
pub const SANE_INFO_RELOAD_PARAMS: SaneInt = 1 << 2;

// ===========================================================================
// Constraint types (SANE_Constraint_Type)
// ===========================================================================

pub type SaneConstraintType = c_int;

pub const SANE_CONSTRAINT_NONE: SaneConstraintType = 0;
pub const SANE_CONSTRAINT_RANGE: SaneConstraintType = 1;
pub const SANE_CONSTRAINT_WORD_LIST: SaneConstraintType = 2;
pub const SANE_CONSTRAINT_STRING_LIST: SaneConstraintType = 3;

// ===========================================================================
// Control actions (SANE_Action)
// ===========================================================================

pub type SaneAction = c_int;

pub const SANE_ACTION_GET_VALUE: SaneAction = 0;
pub const SANE_ACTION_SET_VALUE: SaneAction = 1;
pub const SANE_ACTION_SET_AUTO: SaneAction = 2;

// ===========================================================================
// Structures
// ===========================================================================

/// `SANE_Device`
#[repr(C)]
pub struct SaneDevice {
    pub name: SaneStringConst,
    pub vendor: SaneStringConst,
    pub model: SaneStringConst,
    pub type_: SaneStringConst,
}

/// `SANE_Range`
#[repr(C)]
pub struct SaneRange {
    pub min: SaneWord,
    pub max: SaneWord,
    pub quant: SaneWord,
}

/// Anonymous constraint union inside `SANE_Option_Descriptor`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union SaneConstraint {
    /// NULL-terminated list of strings.
    pub string_list: *const SaneStringConst,
    /// First element is the list length, followed by that many words.
    pub word_list: *const SaneWord,
    pub range: *const SaneRange,
}

/// `SANE_Option_Descriptor`
#[repr(C)]
pub struct SaneOptionDescriptor {
    pub name: SaneStringConst,
    pub title: SaneStringConst,
    pub desc: SaneStringConst,
    pub type_: SaneValueType,
    pub unit: SaneUnit,
    pub size: SaneInt,
    pub cap: SaneInt,
    pub constraint_type: SaneConstraintType,
    pub constraint: SaneConstraint,
}

// ===========================================================================
// Function pointer types
// ===========================================================================

/// `void (*SANE_Auth_Callback)(SANE_String_Const resource, SANE_Char *username, SANE_Char *password)`
pub type SaneAuthCallback =
    Option<unsafe extern "C" fn(resource: SaneStringConst, username: *mut c_char, password: *mut c_char)>;

/// `SANE_Status sane_init(SANE_Int *version_code, SANE_Auth_Callback authorize)`
pub type FnInit =
    unsafe extern "C" fn(version_code: *mut SaneInt, authorize: SaneAuthCallback) -> SaneStatus;

/// `void sane_exit(void)`
pub type FnExit = unsafe extern "C" fn();

/// `SANE_Status sane_get_devices(const SANE_Device ***device_list, SANE_Bool local_only)`
pub type FnGetDevices = unsafe extern "C" fn(
    device_list: *mut *const *const SaneDevice,
    local_only: SaneBool,
) -> SaneStatus;

/// `SANE_Status sane_open(SANE_String_Const devicename, SANE_Handle *handle)`
pub type FnOpen = unsafe extern "C" fn(name: SaneStringConst, handle: *mut SaneHandle) -> SaneStatus;

/// `void sane_close(SANE_Handle handle)`
pub type FnClose = unsafe extern "C" fn(handle: SaneHandle);

/// `const SANE_Option_Descriptor *sane_get_option_descriptor(SANE_Handle handle, SANE_Int option)`
pub type FnGetOptionDescriptor =
    unsafe extern "C" fn(handle: SaneHandle, option: SaneInt) -> *const SaneOptionDescriptor;

/// `SANE_Status sane_control_option(handle, option, action, value, info)`
pub type FnControlOption = unsafe extern "C" fn(
    handle: SaneHandle,
    option: SaneInt,
    action: SaneAction,
    value: *mut c_void,
    info: *mut SaneInt,
) -> SaneStatus;

/// `SANE_String_Const sane_strstatus(SANE_Status status)`
pub type FnStrStatus = unsafe extern "C" fn(status: SaneStatus) -> SaneStringConst;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_code_layout() {
        assert_eq!(version_code(1, 0, 0), 0x0100_0000);
        assert_eq!(version_code(1, 2, 3), 0x0102_0003);
    }

    #[test]
    fn test_descriptor_layout_matches_c() {
        // Three pointers, five ints (padded), one pointer-sized union.
        let ptr = std::mem::size_of::<*const c_char>();
        assert_eq!(std::mem::size_of::<SaneConstraint>(), ptr);
        assert!(std::mem::size_of::<SaneOptionDescriptor>() >= 4 * ptr + 5 * WORD_SIZE);
    }
}
