// SPDX-License-Identifier: Apache-2.0
//! Library version reported by `sane_init`.

use std::fmt;

use serde::Serialize;

use crate::ffi;

/// Version triple decoded from a `SANE_VERSION_CODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LibraryVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}

impl LibraryVersion {
    /// Decode `major << 24 | minor << 16 | build`.
    pub fn from_code(code: ffi::SaneInt) -> Self {
        let code = code as u32;
        Self {
            major: ((code >> 24) & 0xff) as u8,
            minor: ((code >> 16) & 0xff) as u8,
            build: (code & 0xffff) as u16,
        }
    }

    pub fn code(&self) -> ffi::SaneInt {
        ffi::version_code(self.major, self.minor, self.build)
    }

    /// Whether the library speaks the protocol revision this crate was
    /// written against.
    pub fn is_current(&self) -> bool {
        self.major == ffi::SANE_CURRENT_MAJOR && self.minor == ffi::SANE_CURRENT_MINOR
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}
