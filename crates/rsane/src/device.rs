// SPDX-License-Identifier: Apache-2.0
//! Devices reported by enumeration.

use serde::Serialize;

/// One entry of a `sane_get_devices` snapshot.
///
/// `name` is the handle passed to [`crate::open`]; the other fields are
/// informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub vendor: String,
    pub model: String,
    /// Device class, e.g. `"flatbed scanner"` or `"virtual device"`.
    pub kind: String,
}

impl DeviceDescriptor {
    pub fn new(
        name: impl Into<String>,
        vendor: impl Into<String>,
        model: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            model: model.into(),
            kind: kind.into(),
        }
    }

    /// The backend part of the name (`"net"` for `"net:host:test:0"`).
    pub fn backend(&self) -> &str {
        self.name.split(':').next().unwrap_or_default()
    }
}
