// SPDX-License-Identifier: Apache-2.0
//! Process-wide SANE state.
//!
//! SANE is a global library: one `sane_init` per process, handles that die
//! with `sane_exit`, and no thread-safety guarantees. This module holds the
//! single [`Runtime`] behind one mutex. Every public operation takes the
//! lock for its full duration, so at most one native call runs at a time
//! across all threads and sessions.
//!
//! Sessions are tracked in a registry keyed by a never-reused id. `exit()`
//! closes and forgets every registered handle, which is how stale
//! [`DeviceSession`] values are detected: their id no longer resolves.

use std::collections::BTreeMap;
use std::ffi::CString;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{Backend, RawHandle};
use crate::config::SaneConfig;
use crate::device::DeviceDescriptor;
use crate::error::{OpenErrorKind, Result, SaneError};
use crate::library::NativeLibrary;
use crate::session::DeviceSession;
use crate::version::LibraryVersion;

static RUNTIME: Mutex<Runtime> = Mutex::new(Runtime::new());

pub(crate) struct Runtime {
    backend: Option<Box<dyn Backend>>,
    local_only: bool,
    next_session: u64,
    sessions: BTreeMap<u64, SessionEntry>,
}

/// Registry entry for one open native handle.
pub(crate) struct SessionEntry {
    pub(crate) handle: RawHandle,
    pub(crate) device: String,
    /// Cached value of option 0; cleared on `RELOAD_OPTIONS`.
    pub(crate) option_count: Option<usize>,
}

impl Runtime {
    const fn new() -> Self {
        Self {
            backend: None,
            local_only: false,
            next_session: 1,
            sessions: BTreeMap::new(),
        }
    }
}

fn lock() -> MutexGuard<'static, Runtime> {
    // A panic while the lock was held leaves the registry consistent: every
    // mutation is a single insert/remove after the native call returned.
    RUNTIME.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Load `libsane` as configured by the environment and initialise it.
///
/// # Errors
///
/// [`SaneError::Init`] if the library cannot be loaded, `sane_init` fails,
/// or SANE is already initialised.
pub fn init() -> Result<LibraryVersion> {
    init_with_config(&SaneConfig::from_env())
}

/// Like [`init`], with an explicit configuration.
pub fn init_with_config(config: &SaneConfig) -> Result<LibraryVersion> {
    let mut rt = lock();
    if rt.backend.is_some() {
        return Err(SaneError::init("already initialized; call exit() first"));
    }
    let library = NativeLibrary::load_from_config(config)?;
    tracing::debug!("using SANE library at '{}'", library.library_path());
    install(&mut rt, Box::new(library), config.local_only)
}

/// Initialise with any [`Backend`], e.g. [`crate::mock::MockBackend`].
pub fn init_with(backend: impl Backend + 'static) -> Result<LibraryVersion> {
    let mut rt = lock();
    if rt.backend.is_some() {
        return Err(SaneError::init("already initialized; call exit() first"));
    }
    install(&mut rt, Box::new(backend), false)
}

fn install(rt: &mut Runtime, mut backend: Box<dyn Backend>, local_only: bool) -> Result<LibraryVersion> {
    let version = backend.init().map_err(|status| {
        let detail = backend
            .describe_status(status)
            .unwrap_or_else(|| status.to_string());
        SaneError::init(format!("sane_init failed on '{}': {detail}", backend.name()))
    })?;

    if !version.is_current() {
        tracing::warn!("'{}' reports SANE {version}, expected 1.0.x", backend.name());
    }
    tracing::info!("initialized SANE {version} via '{}'", backend.name());

    rt.backend = Some(backend);
    rt.local_only = local_only;
    Ok(version)
}

/// Close every open session and shut the library down.
///
/// Outstanding [`DeviceSession`] values become stale and fail with
/// [`SaneError::UseAfterClose`]. Calling `exit` when not initialised does
/// nothing.
pub fn exit() {
    let mut rt = lock();
    let Some(mut backend) = rt.backend.take() else {
        tracing::debug!("exit() called while not initialized");
        return;
    };

    let sessions = std::mem::take(&mut rt.sessions);
    for (id, entry) in sessions {
        tracing::debug!("closing session {id} on '{}' at exit", entry.device);
        backend.close(entry.handle);
    }
    backend.exit();
    tracing::info!("SANE exited via '{}'", backend.name());
}

/// Whether [`init`] has succeeded without a matching [`exit`].
pub fn is_initialized() -> bool {
    lock().backend.is_some()
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// Snapshot of the devices the library currently reports.
///
/// An empty list is a valid answer, not an error.
pub fn get_devices() -> Result<Vec<DeviceDescriptor>> {
    let mut rt = lock();
    let local_only = rt.local_only;
    enumerate(&mut rt, local_only)
}

/// [`get_devices`] with an explicit `local_only` flag.
pub fn get_devices_with(local_only: bool) -> Result<Vec<DeviceDescriptor>> {
    enumerate(&mut lock(), local_only)
}

fn enumerate(rt: &mut Runtime, local_only: bool) -> Result<Vec<DeviceDescriptor>> {
    let backend = rt.backend.as_deref_mut().ok_or(SaneError::NotInitialized)?;
    let devices = backend
        .get_devices(local_only)
        .map_err(|status| SaneError::Enumeration { status })?;
    tracing::debug!("enumerated {} device(s)", devices.len());
    Ok(devices)
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Open the device called `name`.
///
/// The name is checked against a fresh enumeration before it is handed to
/// `sane_open`: several backends crash on names they do not know instead
/// of returning an error.
///
/// # Errors
///
/// [`SaneError::Open`] with kind `InvalidName` (empty or embedded NUL),
/// `NotFound` (not enumerated, or the library failed), `AccessDenied` or
/// `Busy`.
pub fn open(name: &str) -> Result<DeviceSession> {
    let mut rt = lock();
    let local_only = rt.local_only;
    let rt = &mut *rt;
    let backend = rt.backend.as_deref_mut().ok_or(SaneError::NotInitialized)?;

    if name.is_empty() {
        tracing::warn!("refusing to open a device with an empty name");
        return Err(SaneError::open(name, OpenErrorKind::InvalidName, None));
    }
    let c_name = CString::new(name).map_err(|_| {
        tracing::warn!("refusing to open '{}': embedded NUL", name.escape_debug());
        SaneError::open(name, OpenErrorKind::InvalidName, None)
    })?;

    let devices = backend
        .get_devices(local_only)
        .map_err(|status| SaneError::open(name, OpenErrorKind::NotFound, Some(status)))?;
    if !devices.iter().any(|d| d.name == name) {
        tracing::warn!("refusing to open '{name}': not among {} enumerated device(s)", devices.len());
        return Err(SaneError::open(name, OpenErrorKind::NotFound, None));
    }

    let handle = backend
        .open(&c_name)
        .map_err(|status| SaneError::from_open_status(name, status))?;
    if handle.is_null() {
        return Err(SaneError::open(name, OpenErrorKind::NotFound, None));
    }

    let id = rt.next_session;
    rt.next_session += 1;
    rt.sessions.insert(
        id,
        SessionEntry {
            handle,
            device: name.to_string(),
            option_count: None,
        },
    );
    tracing::debug!("opened session {id} on '{name}' (handle {handle:?})");

    Ok(DeviceSession::new(id, name.to_string()))
}

/// Run `f` with the backend and the registry entry of session `id`.
pub(crate) fn with_session<T>(
    id: u64,
    f: impl FnOnce(&mut dyn Backend, &mut SessionEntry) -> Result<T>,
) -> Result<T> {
    let mut rt = lock();
    let rt = &mut *rt;
    let backend = rt.backend.as_deref_mut().ok_or(SaneError::UseAfterClose)?;
    let entry = rt.sessions.get_mut(&id).ok_or(SaneError::UseAfterClose)?;
    f(backend, entry)
}

/// Whether session `id` still owns a native handle.
pub(crate) fn is_registered(id: u64) -> bool {
    lock().sessions.contains_key(&id)
}

/// Close session `id` at the native layer and forget it.
pub(crate) fn release(id: u64) -> Result<()> {
    let mut rt = lock();
    let rt = &mut *rt;
    let backend = rt.backend.as_deref_mut().ok_or(SaneError::UseAfterClose)?;
    let entry = rt.sessions.remove(&id).ok_or(SaneError::UseAfterClose)?;
    backend.close(entry.handle);
    tracing::debug!("closed session {id} on '{}'", entry.device);
    Ok(())
}

/// Number of sessions holding native handles.
pub fn open_session_count() -> usize {
    lock().sessions.len()
}
