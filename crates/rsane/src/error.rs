// SPDX-License-Identifier: Apache-2.0
//! Error types for SANE device interaction.

use std::fmt;

use serde::Serialize;

use crate::ffi;

/// A non-success `SANE_Status`, translated at the native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
pub enum Status {
    #[error("operation not supported")]
    Unsupported,
    #[error("operation was cancelled")]
    Cancelled,
    #[error("device busy")]
    DeviceBusy,
    #[error("invalid argument")]
    Invalid,
    #[error("end of file reached")]
    Eof,
    #[error("document feeder jammed")]
    Jammed,
    #[error("document feeder out of documents")]
    NoDocs,
    #[error("scanner cover is open")]
    CoverOpen,
    #[error("error during device I/O")]
    IoError,
    #[error("out of memory")]
    NoMemory,
    #[error("access to resource has been denied")]
    AccessDenied,
    #[error("unknown SANE status {0}")]
    Unknown(i32),
}

impl Status {
    /// Translate a raw status code. `SANE_STATUS_GOOD` yields `None`.
    pub fn from_code(code: ffi::SaneStatus) -> Option<Self> {
        let status = match code {
            ffi::SANE_STATUS_GOOD => return None,
            ffi::SANE_STATUS_UNSUPPORTED => Status::Unsupported,
            ffi::SANE_STATUS_CANCELLED => Status::Cancelled,
            ffi::SANE_STATUS_DEVICE_BUSY => Status::DeviceBusy,
            ffi::SANE_STATUS_INVAL => Status::Invalid,
            ffi::SANE_STATUS_EOF => Status::Eof,
            ffi::SANE_STATUS_JAMMED => Status::Jammed,
            ffi::SANE_STATUS_NO_DOCS => Status::NoDocs,
            ffi::SANE_STATUS_COVER_OPEN => Status::CoverOpen,
            ffi::SANE_STATUS_IO_ERROR => Status::IoError,
            ffi::SANE_STATUS_NO_MEM => Status::NoMemory,
            ffi::SANE_STATUS_ACCESS_DENIED => Status::AccessDenied,
            other => Status::Unknown(other),
        };
        Some(status)
    }

    /// The raw code this status was translated from.
    pub fn code(self) -> ffi::SaneStatus {
        match self {
            Status::Unsupported => ffi::SANE_STATUS_UNSUPPORTED,
            Status::Cancelled => ffi::SANE_STATUS_CANCELLED,
            Status::DeviceBusy => ffi::SANE_STATUS_DEVICE_BUSY,
            Status::Invalid => ffi::SANE_STATUS_INVAL,
            Status::Eof => ffi::SANE_STATUS_EOF,
            Status::Jammed => ffi::SANE_STATUS_JAMMED,
            Status::NoDocs => ffi::SANE_STATUS_NO_DOCS,
            Status::CoverOpen => ffi::SANE_STATUS_COVER_OPEN,
            Status::IoError => ffi::SANE_STATUS_IO_ERROR,
            Status::NoMemory => ffi::SANE_STATUS_NO_MEM,
            Status::AccessDenied => ffi::SANE_STATUS_ACCESS_DENIED,
            Status::Unknown(code) => code,
        }
    }
}

/// Convert a native return code into `Ok(())` or the translated status.
pub fn check_status(code: ffi::SaneStatus) -> std::result::Result<(), Status> {
    match Status::from_code(code) {
        None => Ok(()),
        Some(status) => Err(status),
    }
}

/// Why a device could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpenErrorKind {
    NotFound,
    AccessDenied,
    Busy,
    InvalidName,
}

impl fmt::Display for OpenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpenErrorKind::NotFound => "device not found",
            OpenErrorKind::AccessDenied => "access denied",
            OpenErrorKind::Busy => "device busy",
            OpenErrorKind::InvalidName => "invalid device name",
        };
        f.write_str(s)
    }
}

/// The kind of option access a capability check guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Access {
    Get,
    Set,
    Auto,
    Press,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Access::Get => "reading its value",
            Access::Set => "setting its value",
            Access::Auto => "automatic selection",
            Access::Press => "being pressed",
        };
        f.write_str(s)
    }
}

/// Errors arising from SANE operations.
#[derive(Debug, thiserror::Error)]
pub enum SaneError {
    #[error("failed to initialize SANE: {reason}")]
    Init { reason: String },

    #[error("SANE is not initialized")]
    NotInitialized,

    #[error("device enumeration failed: {status}")]
    Enumeration { status: Status },

    #[error("cannot open device '{name}': {kind}")]
    Open {
        name: String,
        kind: OpenErrorKind,
        status: Option<Status>,
    },

    #[error("option index {index} is out of range (device has {count} options)")]
    Index { index: usize, count: usize },

    #[error("option {index} does not allow {required}")]
    Capability { index: usize, required: Access },

    #[error("option {index} holds {expected}, got {found}")]
    TypeMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("device session used after close")]
    UseAfterClose,

    #[error("control of option {index} failed: {status}")]
    Control { index: usize, status: Status },
}

impl SaneError {
    pub(crate) fn init(reason: impl Into<String>) -> Self {
        SaneError::Init {
            reason: reason.into(),
        }
    }

    pub(crate) fn open(name: &str, kind: OpenErrorKind, status: Option<Status>) -> Self {
        SaneError::Open {
            name: name.to_string(),
            kind,
            status,
        }
    }

    /// Map a native `sane_open` failure onto the open taxonomy.
    pub(crate) fn from_open_status(name: &str, status: Status) -> Self {
        let kind = match status {
            Status::AccessDenied => OpenErrorKind::AccessDenied,
            Status::DeviceBusy => OpenErrorKind::Busy,
            Status::Invalid => OpenErrorKind::InvalidName,
            _ => OpenErrorKind::NotFound,
        };
        SaneError::open(name, kind, Some(status))
    }

    /// The open failure kind, if this is an open error.
    pub fn open_kind(&self) -> Option<OpenErrorKind> {
        match self {
            SaneError::Open { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_good_status_is_not_an_error() {
        assert_eq!(Status::from_code(ffi::SANE_STATUS_GOOD), None);
        assert!(check_status(ffi::SANE_STATUS_GOOD).is_ok());
    }

    #[test]
    fn test_status_codes_round_trip() {
        for code in 1..=11 {
            let status = Status::from_code(code).unwrap();
            assert!(!matches!(status, Status::Unknown(_)));
            assert_eq!(status.code(), code);
        }
        assert_eq!(Status::from_code(42), Some(Status::Unknown(42)));
    }

    #[test]
    fn test_open_status_mapping() {
        let err = SaneError::from_open_status("x", Status::DeviceBusy);
        assert_eq!(err.open_kind(), Some(OpenErrorKind::Busy));
        let err = SaneError::from_open_status("x", Status::AccessDenied);
        assert_eq!(err.open_kind(), Some(OpenErrorKind::AccessDenied));
        let err = SaneError::from_open_status("x", Status::Invalid);
        assert_eq!(err.open_kind(), Some(OpenErrorKind::InvalidName));
        let err = SaneError::from_open_status("x", Status::IoError);
        assert_eq!(err.open_kind(), Some(OpenErrorKind::NotFound));
    }

    #[test]
    fn test_error_messages() {
        let err = SaneError::Index { index: 12, count: 12 };
        assert_eq!(
            err.to_string(),
            "option index 12 is out of range (device has 12 options)"
        );
        let err = SaneError::Capability {
            index: 3,
            required: Access::Set,
        };
        assert_eq!(err.to_string(), "option 3 does not allow setting its value");
    }
}
