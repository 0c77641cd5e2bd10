// SPDX-License-Identifier: Apache-2.0
//! # rsane
//!
//! Safe, typed access to [SANE](http://www.sane-project.org/) (Scanner Access
//! Now Easy): library lifecycle, device discovery, and the option protocol
//! of open devices.
//!
//! `libsane` is loaded at runtime with `libloading`; nothing links against
//! it at build time. The wrapper assumes the library is fragile: every call
//! is serialised behind one process-wide lock, device names are checked
//! against a fresh enumeration before `sane_open`, and option indices are
//! bounds-checked before they reach the native layer.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────────────┐
//!                 │      application       │
//!                 └───────────┬────────────┘
//!                             │ init / get_devices / open
//!                 ┌───────────┴────────────┐
//!                 │  runtime (one Mutex)   │ ← liveness, session registry
//!                 │  DeviceSession         │ ← bounds, capability, type checks
//!                 │  OptionValue codec     │ ← typed ↔ native buffers
//!                 └───────────┬────────────┘
//!                             │ trait Backend
//!               ┌─────────────┴──────────────┐
//!               │ NativeLibrary   MockBackend│
//!               │ (libsane.so)    (in-proc)  │
//!               └────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! let version = rsane::init().expect("failed to initialise SANE");
//! println!("SANE {version}");
//!
//! for device in rsane::get_devices().expect("enumeration failed") {
//!     let session = rsane::open(&device.name).expect("open failed");
//!     for desc in session.options().expect("options") {
//!         if desc.is_readable() {
//!             let value = session.get_option_value(desc.index).expect("get");
//!             println!("  {} = {value}", desc.name);
//!         }
//!     }
//!     session.close().expect("close failed");
//! }
//!
//! rsane::exit();
//! ```

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod ffi;
mod library;
pub mod mock;
pub mod option;
pub mod runtime;
pub mod session;
pub mod value;
pub mod version;

// Re-export the most commonly used types at crate root.
pub use backend::Backend;
pub use config::SaneConfig;
pub use device::DeviceDescriptor;
pub use error::{Access, OpenErrorKind, Result, SaneError, Status};
pub use option::{Capabilities, Constraint, InfoFlags, OptionDescriptor, Range, Unit, ValueType};
pub use runtime::{
    exit, get_devices, get_devices_with, init, init_with, init_with_config, is_initialized, open,
    open_session_count,
};
pub use session::{DeviceSession, SetOutcome};
pub use value::{Fixed, OptionValue};
pub use version::LibraryVersion;

/// Close `session`, releasing its native handle. Same as
/// [`DeviceSession::close`].
pub fn close(session: DeviceSession) -> Result<()> {
    session.close()
}
