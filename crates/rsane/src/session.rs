// SPDX-License-Identifier: Apache-2.0
//! Device sessions and the option protocol.
//!
//! A session is the handle for every option query and update on one device.
//! Sessions are created with [`crate::open`], closed with
//! [`DeviceSession::close`] (which consumes them), and closed automatically
//! when dropped.
//!
//! Every option call is bounds-checked against the session's option count
//! before the native layer sees the index. `sane_get_option_descriptor` is
//! documented to return NULL out of range, but common backends index their
//! option arrays unchecked and corrupt memory instead.

use serde::Serialize;

use crate::backend::{Action, Backend};
use crate::error::{Access, Result, SaneError};
use crate::ffi;
use crate::option::{InfoFlags, OptionDescriptor, ValueType};
use crate::runtime::{self, SessionEntry};
use crate::value::{self, OptionValue};

/// Result of a successful `set_option_value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetOutcome {
    /// Side effects reported by the device.
    pub info: InfoFlags,
    /// The value the device actually stored (differs when `INEXACT`).
    pub value: OptionValue,
}

impl SetOutcome {
    /// Previously fetched descriptors (and the option count) may be stale.
    pub fn reload_options(&self) -> bool {
        self.info.contains(InfoFlags::RELOAD_OPTIONS)
    }

    pub fn reload_params(&self) -> bool {
        self.info.contains(InfoFlags::RELOAD_PARAMS)
    }

    pub fn inexact(&self) -> bool {
        self.info.contains(InfoFlags::INEXACT)
    }
}

/// An open device.
///
/// Holds no native state itself, only a registry id, so it is `Send` and
/// `Sync`; all calls serialise on the process-wide lock.
#[derive(Debug)]
pub struct DeviceSession {
    id: u64,
    device: String,
    closed: bool,
}

impl DeviceSession {
    pub(crate) fn new(id: u64, device: String) -> Self {
        Self {
            id,
            device,
            closed: false,
        }
    }

    /// Name the session was opened with.
    pub fn device_name(&self) -> &str {
        &self.device
    }

    /// False once [`crate::exit`] has invalidated this session.
    pub fn is_open(&self) -> bool {
        !self.closed && runtime::is_registered(self.id)
    }

    /// Release the native handle.
    ///
    /// # Errors
    ///
    /// [`SaneError::UseAfterClose`] if [`crate::exit`] already closed it.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        runtime::release(self.id)
    }

    // -----------------------------------------------------------------------
    // Descriptors
    // -----------------------------------------------------------------------

    /// Number of options, including option 0.
    pub fn option_count(&self) -> Result<usize> {
        runtime::with_session(self.id, |backend, entry| option_count(backend, entry))
    }

    /// Descriptor of the option at `index`.
    ///
    /// # Errors
    ///
    /// [`SaneError::Index`] when `index >= option_count()`.
    pub fn get_option_descriptor(&self, index: usize) -> Result<OptionDescriptor> {
        runtime::with_session(self.id, |backend, entry| descriptor(backend, entry, index))
    }

    /// Descriptors of every option after option 0, group headers included.
    pub fn options(&self) -> Result<Vec<OptionDescriptor>> {
        runtime::with_session(self.id, |backend, entry| {
            let count = option_count(backend, entry)?;
            (1..count).map(|i| descriptor(backend, entry, i)).collect()
        })
    }

    /// Look an option up by its `name`.
    pub fn find_option(&self, name: &str) -> Result<Option<OptionDescriptor>> {
        Ok(self.options()?.into_iter().find(|d| !d.is_group() && d.name == name))
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Current value of the option at `index`.
    ///
    /// # Errors
    ///
    /// [`SaneError::Capability`] unless the option is active, soft-detectable
    /// and value-carrying.
    pub fn get_option_value(&self, index: usize) -> Result<OptionValue> {
        runtime::with_session(self.id, |backend, entry| {
            let desc = descriptor(backend, entry, index)?;
            if !desc.is_readable() {
                return Err(SaneError::Capability {
                    index,
                    required: Access::Get,
                });
            }
            let mut buf = value::buffer_for(&desc);
            control(backend, entry, index, Action::GetValue, &mut buf)?;
            let current = value::decode(&desc, &buf)?;
            if index == 0 {
                if let Some(n) = current.as_int().and_then(|n| usize::try_from(n).ok()) {
                    entry.option_count = Some(n);
                }
            }
            Ok(current)
        })
    }

    /// Set the option at `index`.
    ///
    /// # Errors
    ///
    /// [`SaneError::Capability`] unless the option is active, soft-settable
    /// and value-carrying; [`SaneError::TypeMismatch`] if `new_value` does not
    /// match the descriptor's type and size.
    pub fn set_option_value(&self, index: usize, new_value: impl Into<OptionValue>) -> Result<SetOutcome> {
        let requested = new_value.into();
        runtime::with_session(self.id, |backend, entry| {
            let desc = descriptor(backend, entry, index)?;
            if !desc.is_settable() {
                return Err(SaneError::Capability {
                    index,
                    required: Access::Set,
                });
            }
            let mut buf = value::encode(&desc, &requested)?;
            let info = control(backend, entry, index, Action::SetValue, &mut buf)?;
            let stored = value::decode(&desc, &buf)?;
            if info.contains(InfoFlags::INEXACT) {
                tracing::debug!("option '{}' stored {stored} instead of {requested}", desc.name);
            }
            Ok(SetOutcome { info, value: stored })
        })
    }

    /// Let the device choose the value of the option at `index`.
    ///
    /// # Errors
    ///
    /// [`SaneError::Capability`] unless the option is active, soft-settable
    /// and automatic.
    pub fn set_option_auto(&self, index: usize) -> Result<InfoFlags> {
        runtime::with_session(self.id, |backend, entry| {
            let desc = descriptor(backend, entry, index)?;
            if !desc.value_type.carries_value() || !desc.capabilities.is_automatic() {
                return Err(SaneError::Capability {
                    index,
                    required: Access::Auto,
                });
            }
            control(backend, entry, index, Action::SetAuto, &mut [])
        })
    }

    /// Trigger a `Button` option.
    pub fn press_button(&self, index: usize) -> Result<InfoFlags> {
        runtime::with_session(self.id, |backend, entry| {
            let desc = descriptor(backend, entry, index)?;
            if desc.value_type != ValueType::Button || !desc.capabilities.is_settable() {
                return Err(SaneError::Capability {
                    index,
                    required: Access::Press,
                });
            }
            control(backend, entry, index, Action::SetValue, &mut [])
        })
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match runtime::release(self.id) {
            Ok(()) => tracing::debug!("session on '{}' closed on drop", self.device),
            // Already closed by exit(); nothing left to release.
            Err(SaneError::UseAfterClose) => {}
            Err(e) => tracing::error!("failed to close session on '{}': {e}", self.device),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers (run with the runtime lock held)
// ---------------------------------------------------------------------------

fn native_index(index: usize, count: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| SaneError::Index { index, count })
}

fn option_count(backend: &mut dyn Backend, entry: &mut SessionEntry) -> Result<usize> {
    if let Some(count) = entry.option_count {
        return Ok(count);
    }
    // Option 0 is always present, so reading it needs no bounds check. Its
    // buffer still honours whatever size the backend declares for it.
    let len = backend
        .option_descriptor(entry.handle, 0)
        .map_or(0, |desc| value::buffer_for(&desc).len())
        .max(ffi::WORD_SIZE);
    let mut buf = vec![0u8; len];
    backend
        .control_option(entry.handle, 0, Action::GetValue, &mut buf)
        .map_err(|status| SaneError::Control { index: 0, status })?;
    let raw = i32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let count = usize::try_from(raw).unwrap_or_else(|_| {
        tracing::warn!("'{}' reports a negative option count ({raw})", entry.device);
        0
    });
    entry.option_count = Some(count);
    Ok(count)
}

fn descriptor(backend: &mut dyn Backend, entry: &mut SessionEntry, index: usize) -> Result<OptionDescriptor> {
    let count = option_count(backend, entry)?;
    if index >= count {
        tracing::warn!(
            "option index {index} out of range on '{}' ({count} options); not forwarded",
            entry.device
        );
        return Err(SaneError::Index { index, count });
    }
    let raw = native_index(index, count)?;
    backend
        .option_descriptor(entry.handle, raw)
        .ok_or(SaneError::Index { index, count })
}

fn control(
    backend: &mut dyn Backend,
    entry: &mut SessionEntry,
    index: usize,
    action: Action,
    buf: &mut [u8],
) -> Result<InfoFlags> {
    let count = entry.option_count.unwrap_or(0);
    let raw = native_index(index, count)?;
    let info = backend
        .control_option(entry.handle, raw, action, buf)
        .map_err(|status| SaneError::Control { index, status })?;
    if info.contains(InfoFlags::RELOAD_OPTIONS) {
        tracing::debug!("'{}' asked for an option reload", entry.device);
        entry.option_count = None;
    }
    Ok(info)
}
