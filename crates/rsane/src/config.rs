// SPDX-License-Identifier: Apache-2.0
//! Runtime configuration.

use std::path::PathBuf;

/// Overrides the library search with an explicit path.
pub const LIBRARY_ENV: &str = "RSANE_LIBRARY";

/// When truthy, enumeration asks backends for local devices only.
pub const LOCAL_ONLY_ENV: &str = "RSANE_LOCAL_ONLY";

/// Library names tried, in order, when no path is configured.
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &[
    "libsane.so.1",
    "libsane.so",
    "libsane.1.dylib",
    "libsane.dylib",
];

/// How [`crate::init`] finds the native library and how enumeration behaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaneConfig {
    /// Explicit path to `libsane`; `None` searches [`DEFAULT_LIBRARY_NAMES`].
    pub library_path: Option<PathBuf>,
    /// Passed to `sane_get_devices` as `local_only`.
    pub local_only: bool,
}

impl SaneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `RSANE_LIBRARY` and `RSANE_LOCAL_ONLY` from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment, a test map, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let library_path = lookup(LIBRARY_ENV)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let local_only = lookup(LOCAL_ONLY_ENV).is_some_and(|v| parse_flag(&v));
        Self {
            library_path,
            local_only,
        }
    }

    #[must_use]
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_local_only(mut self, local_only: bool) -> Self {
        self.local_only = local_only;
        self
    }

    /// Paths to try when loading, in order.
    pub fn library_candidates(&self) -> Vec<PathBuf> {
        match &self.library_path {
            Some(path) => vec![path.clone()],
            None => DEFAULT_LIBRARY_NAMES.iter().map(PathBuf::from).collect(),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
