// SPDX-License-Identifier: Apache-2.0
//! In-process emulation of a SANE library.
//!
//! [`MockBackend`] behaves like `libsane` configured with only the `test`
//! backend: virtual devices named `test:N` exposing a fixed option table
//! with groups, constraints, inactive and read-only options, a button, and
//! a mode switch that changes the option count. It follows the documented
//! contract (NULL for an unknown descriptor index, `INVAL` for bad
//! requests) and records every call in a [`CallJournal`] so tests can prove
//! which requests reached the native layer.

use std::collections::BTreeMap;
use std::ffi::CStr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::{Action, Backend, RawHandle};
use crate::device::DeviceDescriptor;
use crate::error::Status;
use crate::ffi;
use crate::option::{Capabilities, Constraint, InfoFlags, OptionDescriptor, Range, Unit, ValueType};
use crate::value::Fixed;
use crate::version::LibraryVersion;

/// Option count in gray mode; color mode adds `color-balance`.
pub const GRAY_OPTION_COUNT: usize = 12;
pub const COLOR_OPTION_COUNT: usize = 13;

// ---------------------------------------------------------------------------
// Call journal
// ---------------------------------------------------------------------------

/// A call that reached the emulated native layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    Init,
    Exit,
    GetDevices { local_only: bool },
    Open { name: String },
    Close { handle: RawHandle },
    OptionDescriptor { handle: RawHandle, index: i32 },
    ControlOption { handle: RawHandle, index: i32, action: Action },
}

/// Shared record of native calls, readable after the backend has been
/// handed to [`crate::init_with`].
#[derive(Debug, Clone, Default)]
pub struct CallJournal(Arc<Mutex<Vec<NativeCall>>>);

impl CallJournal {
    fn record(&self, call: NativeCall) {
        tracing::trace!("mock native call: {call:?}");
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, pred: impl Fn(&NativeCall) -> bool) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| pred(c))
            .count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// A virtual device known to the mock.
#[derive(Debug, Clone)]
pub struct MockDevice {
    descriptor: DeviceDescriptor,
    open_failure: Option<Status>,
    listed: bool,
    remote: bool,
}

impl MockDevice {
    /// A `frontend-tester` device with the standard option table.
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: DeviceDescriptor::new(name, "Noname", "frontend-tester", "virtual device"),
            open_failure: None,
            listed: true,
            remote: false,
        }
    }

    /// `sane_open` on this device fails with `status`.
    #[must_use]
    pub fn open_fails(mut self, status: Status) -> Self {
        self.open_failure = Some(status);
        self
    }

    /// Openable by name but absent from enumeration.
    #[must_use]
    pub fn unlisted(mut self) -> Self {
        self.listed = false;
        self
    }

    /// Hidden when enumerating with `local_only`.
    #[must_use]
    pub fn remote(mut self) -> Self {
        self.remote = true;
        self
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }
}

struct MockOption {
    desc: OptionDescriptor,
    value: Vec<u8>,
    auto_value: Option<Vec<u8>>,
}

struct OpenDevice {
    name: String,
    options: Vec<MockOption>,
    color: bool,
}

impl OpenDevice {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            options: standard_options(),
            color: false,
        }
    }

    fn visible(&self) -> usize {
        if self.color {
            COLOR_OPTION_COUNT
        } else {
            GRAY_OPTION_COUNT
        }
    }

    fn option_mut(&mut self, name: &str) -> Option<&mut MockOption> {
        self.options.iter_mut().find(|o| o.desc.name == name)
    }

    /// Apply device-side consequences of a successful set.
    fn side_effects(&mut self, name: &str) -> InfoFlags {
        match name {
            "mode" => {
                let color = self
                    .option_mut("mode")
                    .is_some_and(|o| o.value.starts_with(b"Color\0"));
                self.color = color;
                if let Some(three_pass) = self.option_mut("three-pass") {
                    let caps = three_pass.desc.capabilities.bits() & !ffi::SANE_CAP_INACTIVE;
                    let inactive = if color { 0 } else { ffi::SANE_CAP_INACTIVE };
                    three_pass.desc.capabilities = Capabilities::from_bits(caps | inactive);
                }
                InfoFlags::RELOAD_OPTIONS | InfoFlags::RELOAD_PARAMS
            }
            "depth" | "resolution" => InfoFlags::RELOAD_PARAMS,
            _ => InfoFlags::empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Emulated SANE library.
pub struct MockBackend {
    version: LibraryVersion,
    devices: Vec<MockDevice>,
    fail_init: Option<Status>,
    fail_enumeration: Option<Status>,
    initialized: bool,
    open: BTreeMap<RawHandle, OpenDevice>,
    next_handle: usize,
    journal: CallJournal,
}

impl MockBackend {
    /// Two devices, `test:0` and `test:1`.
    pub fn new() -> Self {
        Self::empty()
            .with_device(MockDevice::new("test:0"))
            .with_device(MockDevice::new("test:1"))
    }

    /// No devices at all.
    pub fn empty() -> Self {
        Self {
            version: LibraryVersion::from_code(ffi::version_code(
                ffi::SANE_CURRENT_MAJOR,
                ffi::SANE_CURRENT_MINOR,
                28,
            )),
            devices: Vec::new(),
            fail_init: None,
            fail_enumeration: None,
            initialized: false,
            open: BTreeMap::new(),
            next_handle: 0x1000,
            journal: CallJournal::default(),
        }
    }

    #[must_use]
    pub fn with_device(mut self, device: MockDevice) -> Self {
        self.devices.push(device);
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: LibraryVersion) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn failing_init(mut self, status: Status) -> Self {
        self.fail_init = Some(status);
        self
    }

    #[must_use]
    pub fn failing_enumeration(mut self, status: Status) -> Self {
        self.fail_enumeration = Some(status);
        self
    }

    /// A handle on the call record that outlives the backend.
    pub fn journal(&self) -> CallJournal {
        self.journal.clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn init(&mut self) -> Result<LibraryVersion, Status> {
        self.journal.record(NativeCall::Init);
        if let Some(status) = self.fail_init {
            return Err(status);
        }
        self.initialized = true;
        Ok(self.version)
    }

    fn exit(&mut self) {
        self.journal.record(NativeCall::Exit);
        self.open.clear();
        self.initialized = false;
    }

    fn get_devices(&mut self, local_only: bool) -> Result<Vec<DeviceDescriptor>, Status> {
        self.journal.record(NativeCall::GetDevices { local_only });
        if let Some(status) = self.fail_enumeration {
            return Err(status);
        }
        Ok(self
            .devices
            .iter()
            .filter(|d| d.listed && !(local_only && d.remote))
            .map(|d| d.descriptor.clone())
            .collect())
    }

    fn open(&mut self, name: &CStr) -> Result<RawHandle, Status> {
        let name = name.to_string_lossy().into_owned();
        self.journal.record(NativeCall::Open { name: name.clone() });

        let device = self
            .devices
            .iter()
            .find(|d| d.descriptor.name == name)
            .ok_or(Status::Invalid)?;
        if let Some(status) = device.open_failure {
            return Err(status);
        }
        if self.open.values().any(|d| d.name == name) {
            return Err(Status::DeviceBusy);
        }

        let handle = RawHandle::new(self.next_handle);
        self.next_handle += 0x10;
        self.open.insert(handle, OpenDevice::new(&name));
        Ok(handle)
    }

    fn close(&mut self, handle: RawHandle) {
        self.journal.record(NativeCall::Close { handle });
        if self.open.remove(&handle).is_none() {
            tracing::warn!("mock: close of unknown handle {handle:?}");
        }
    }

    fn option_descriptor(&mut self, handle: RawHandle, index: i32) -> Option<OptionDescriptor> {
        self.journal.record(NativeCall::OptionDescriptor { handle, index });
        let device = self.open.get(&handle)?;
        let idx = usize::try_from(index).ok().filter(|&i| i < device.visible())?;
        Some(device.options[idx].desc.clone())
    }

    fn control_option(
        &mut self,
        handle: RawHandle,
        index: i32,
        action: Action,
        value: &mut [u8],
    ) -> Result<InfoFlags, Status> {
        self.journal.record(NativeCall::ControlOption {
            handle,
            index,
            action,
        });
        let device = self.open.get_mut(&handle).ok_or(Status::Invalid)?;
        let visible = device.visible();
        let idx = usize::try_from(index)
            .ok()
            .filter(|&i| i < visible)
            .ok_or(Status::Invalid)?;

        if idx == 0 {
            if action != Action::GetValue || value.len() < ffi::WORD_SIZE {
                return Err(Status::Invalid);
            }
            let count = i32::try_from(visible).map_err(|_| Status::Invalid)?;
            value[..ffi::WORD_SIZE].copy_from_slice(&count.to_ne_bytes());
            return Ok(InfoFlags::empty());
        }

        let option = &mut device.options[idx];
        let caps = option.desc.capabilities;
        match action {
            Action::GetValue => {
                if !option.desc.is_readable() || value.len() < option.value.len() {
                    return Err(Status::Invalid);
                }
                value[..option.value.len()].copy_from_slice(&option.value);
                Ok(InfoFlags::empty())
            }
            Action::SetValue => {
                if !caps.is_settable() {
                    return Err(Status::Invalid);
                }
                if option.desc.value_type == ValueType::Button {
                    return Ok(InfoFlags::empty());
                }
                let (stored, mut info) = constrain(&option.desc, value)?;
                value[..stored.len()].copy_from_slice(&stored);
                option.value = stored;
                let name = option.desc.name.clone();
                info = info | device.side_effects(&name);
                Ok(info)
            }
            Action::SetAuto => {
                if !caps.is_automatic() {
                    return Err(Status::Invalid);
                }
                let auto = option.auto_value.clone().ok_or(Status::Invalid)?;
                option.value = auto;
                let name = option.desc.name.clone();
                Ok(device.side_effects(&name))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Value constraint emulation (sanei_constrain_value)
// ---------------------------------------------------------------------------

fn constrain(desc: &OptionDescriptor, value: &[u8]) -> Result<(Vec<u8>, InfoFlags), Status> {
    if value.len() < desc.size {
        return Err(Status::Invalid);
    }
    let mut info = InfoFlags::empty();

    if desc.value_type == ValueType::String {
        let end = value.iter().position(|&b| b == 0).unwrap_or(desc.size);
        let requested = &value[..end];
        let stored = match &desc.constraint {
            Constraint::StringList(allowed) => {
                let canonical = allowed
                    .iter()
                    .find(|a| a.as_bytes().eq_ignore_ascii_case(requested))
                    .ok_or(Status::Invalid)?;
                if canonical.as_bytes() != requested {
                    info = InfoFlags::INEXACT;
                }
                canonical.as_bytes()
            }
            _ => requested,
        };
        return Ok((c_bytes(stored, desc.size), info));
    }

    let mut words: Vec<i32> = value[..desc.size]
        .chunks_exact(ffi::WORD_SIZE)
        .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    for word in &mut words {
        let original = *word;
        match &desc.constraint {
            Constraint::Range(range) => {
                let (min, max) = (i64::from(range.min), i64::from(range.max));
                let mut w = i64::from(original).clamp(min, max.max(min));
                if range.quant > 0 {
                    let quant = i64::from(range.quant);
                    let steps = ((w - min) as f64 / quant as f64).round() as i64;
                    w = (min + steps * quant).min(max);
                }
                *word = i32::try_from(w).map_err(|_| Status::Invalid)?;
            }
            Constraint::WordList(list) => {
                *word = list
                    .iter()
                    .copied()
                    .min_by_key(|&candidate| (i64::from(candidate) - i64::from(original)).abs())
                    .ok_or(Status::Invalid)?;
            }
            Constraint::None | Constraint::StringList(_) => {
                if desc.value_type == ValueType::Bool && !matches!(original, 0 | 1) {
                    return Err(Status::Invalid);
                }
            }
        }
        if *word != original {
            info = InfoFlags::INEXACT;
        }
    }
    Ok((words_bytes(&words), info))
}

// ---------------------------------------------------------------------------
// The standard option table
// ---------------------------------------------------------------------------

fn words_bytes(words: &[i32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_ne_bytes()).collect()
}

fn c_bytes(bytes: &[u8], size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    let n = bytes.len().min(size.saturating_sub(1));
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn string_bytes(s: &str, size: usize) -> Vec<u8> {
    c_bytes(s.as_bytes(), size)
}

fn fixed(v: f64) -> i32 {
    Fixed::from_f64(v).raw()
}

struct OptionSpec {
    name: &'static str,
    title: &'static str,
    value_type: ValueType,
    unit: Unit,
    size: usize,
    caps: i32,
    constraint: Constraint,
    value: Vec<u8>,
    auto_value: Option<Vec<u8>>,
}

impl OptionSpec {
    fn new(name: &'static str, title: &'static str, value_type: ValueType, size: usize, caps: i32) -> Self {
        Self {
            name,
            title,
            value_type,
            unit: Unit::None,
            size,
            caps,
            constraint: Constraint::None,
            value: vec![0u8; size],
            auto_value: None,
        }
    }

    fn group(title: &'static str) -> Self {
        Self::new("", title, ValueType::Group, 0, 0)
    }

    fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }

    fn words(mut self, words: &[i32]) -> Self {
        self.value = words_bytes(words);
        self
    }

    fn text(mut self, s: &str) -> Self {
        self.value = string_bytes(s, self.size);
        self
    }

    fn auto(mut self, words: &[i32]) -> Self {
        self.auto_value = Some(words_bytes(words));
        self
    }

    fn build(self, index: usize) -> MockOption {
        MockOption {
            desc: OptionDescriptor {
                index,
                name: self.name.to_string(),
                title: self.title.to_string(),
                description: String::new(),
                value_type: self.value_type,
                unit: self.unit,
                size: self.size,
                capabilities: Capabilities::from_bits(self.caps),
                constraint: self.constraint,
            },
            value: self.value,
            auto_value: self.auto_value,
        }
    }
}

fn standard_options() -> Vec<MockOption> {
    const RW: i32 = ffi::SANE_CAP_SOFT_SELECT | ffi::SANE_CAP_SOFT_DETECT;
    const W: usize = ffi::WORD_SIZE;

    let specs = vec![
        // 0: value is computed from the visible count on read.
        OptionSpec::new("", "Number of options", ValueType::Int, W, ffi::SANE_CAP_SOFT_DETECT),
        OptionSpec::group("Scan Mode"),
        OptionSpec::new("mode", "Scan mode", ValueType::String, 16, RW)
            .constraint(Constraint::StringList(vec!["Gray".into(), "Color".into()]))
            .text("Gray"),
        OptionSpec::new("depth", "Bit depth", ValueType::Int, W, RW)
            .unit(Unit::Bit)
            .constraint(Constraint::WordList(vec![1, 8, 16]))
            .words(&[8]),
        OptionSpec::new("resolution", "Scan resolution", ValueType::Fixed, W, RW | ffi::SANE_CAP_AUTOMATIC)
            .unit(Unit::Dpi)
            .constraint(Constraint::Range(Range {
                min: fixed(1.0),
                max: fixed(1200.0),
                quant: fixed(1.0),
            }))
            .words(&[fixed(50.0)])
            .auto(&[fixed(300.0)]),
        OptionSpec::new("three-pass", "Three-pass simulation", ValueType::Bool, W, RW | ffi::SANE_CAP_INACTIVE)
            .words(&[0]),
        OptionSpec::group("Special Options"),
        OptionSpec::new("gamma-table", "Gamma table", ValueType::Int, 4 * W, RW | ffi::SANE_CAP_ADVANCED)
            .constraint(Constraint::Range(Range { min: 0, max: 255, quant: 0 }))
            .words(&[0, 85, 170, 255]),
        OptionSpec::new("hand-scanner", "Hand-scanner simulation", ValueType::Bool, W, RW | ffi::SANE_CAP_ADVANCED)
            .words(&[0]),
        OptionSpec::new("read-only", "Read-only option", ValueType::Int, W, ffi::SANE_CAP_SOFT_DETECT)
            .words(&[42]),
        OptionSpec::new("calibrate", "Calibrate", ValueType::Button, 0, ffi::SANE_CAP_SOFT_SELECT),
        OptionSpec::new(
            "hw-switch",
            "Hardware switch",
            ValueType::Bool,
            W,
            ffi::SANE_CAP_HARD_SELECT | ffi::SANE_CAP_SOFT_DETECT,
        )
        .words(&[1]),
        // Only visible in color mode.
        OptionSpec::new("color-balance", "Color balance", ValueType::Fixed, 3 * W, RW)
            .unit(Unit::Percent)
            .constraint(Constraint::Range(Range {
                min: 0,
                max: fixed(200.0),
                quant: 0,
            }))
            .words(&[fixed(100.0), fixed(100.0), fixed(100.0)]),
    ];

    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| spec.build(index))
        .collect()
}
