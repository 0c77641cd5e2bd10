// SPDX-License-Identifier: Apache-2.0
//! Tests against a scripted backend that behaves like a careless C library:
//! it writes the full declared option size into whatever buffer it gets,
//! serves non-UTF-8 strings, and counts how many calls are in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rsane::backend::{Action, Backend, RawHandle};
use rsane::{
    Capabilities, Constraint, DeviceDescriptor, InfoFlags, LibraryVersion, OptionDescriptor,
    OptionValue, Status, Unit, ValueType,
};
use serial_test::serial;

const LABEL: usize = 1;
const WIDE_BOOL: usize = 2;
const ODD_INT: usize = 3;
const EMPTY_INT: usize = 4;

const LATIN1_LABEL: &[u8] = b"Schwarz/Wei\xdf";

fn option(index: usize, name: &str, value_type: ValueType, size: usize) -> OptionDescriptor {
    let caps = if index == 0 {
        Capabilities::SOFT_DETECT
    } else {
        Capabilities::SOFT_SELECT | Capabilities::SOFT_DETECT
    };
    OptionDescriptor {
        index,
        name: name.into(),
        title: name.into(),
        description: String::new(),
        value_type,
        unit: Unit::None,
        size,
        capabilities: caps,
        constraint: Constraint::None,
    }
}

/// Shared observations, readable after the backend moved into the runtime.
#[derive(Clone, Default)]
struct CallLog {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    /// `(index, declared size, buffer length)` of every control call.
    buffers: Arc<Mutex<Vec<(usize, usize, usize)>>>,
}

impl CallLog {
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn buffers(&self) -> Vec<(usize, usize, usize)> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

struct InFlight<'a>(&'a CallLog);

impl<'a> InFlight<'a> {
    fn enter(log: &'a CallLog) -> Self {
        let now = log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        log.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_micros(50));
        Self(log)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ScriptedBackend {
    log: CallLog,
    devices: Vec<&'static str>,
    options: Vec<OptionDescriptor>,
    /// Stored value of each option, per open handle.
    values: Vec<(RawHandle, Vec<Vec<u8>>)>,
    next_handle: usize,
}

impl ScriptedBackend {
    fn new(log: CallLog) -> Self {
        let options = vec![
            option(0, "", ValueType::Int, 4),
            option(LABEL, "label", ValueType::String, 13),
            option(WIDE_BOOL, "wide-bool", ValueType::Bool, 8),
            option(ODD_INT, "odd-int", ValueType::Int, 6),
            option(EMPTY_INT, "empty-int", ValueType::Int, 0),
        ];
        Self {
            log,
            devices: vec!["scripted:a", "scripted:b"],
            options,
            values: Vec::new(),
            next_handle: 0x100,
        }
    }

    fn initial_values(&self) -> Vec<Vec<u8>> {
        let count = i32::try_from(self.options.len()).unwrap();
        let mut label = LATIN1_LABEL.to_vec();
        label.push(0);
        vec![
            count.to_ne_bytes().to_vec(),
            label,
            vec![1, 0, 0, 0, 0, 0, 0, 0],
            vec![7, 0, 0, 0, 0xaa, 0xbb],
            Vec::new(),
        ]
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn init(&mut self) -> Result<LibraryVersion, Status> {
        Ok(LibraryVersion::from_code(0x0100_0001))
    }

    fn exit(&mut self) {
        self.values.clear();
    }

    fn get_devices(&mut self, _local_only: bool) -> Result<Vec<DeviceDescriptor>, Status> {
        let _call = InFlight::enter(&self.log);
        Ok(self
            .devices
            .iter()
            .map(|name| DeviceDescriptor::new(*name, "Acme", "Scripted", "flatbed scanner"))
            .collect())
    }

    fn open(&mut self, _name: &std::ffi::CStr) -> Result<RawHandle, Status> {
        let _call = InFlight::enter(&self.log);
        let handle = RawHandle::new(self.next_handle);
        self.next_handle += 1;
        let values = self.initial_values();
        self.values.push((handle, values));
        Ok(handle)
    }

    fn close(&mut self, handle: RawHandle) {
        let _call = InFlight::enter(&self.log);
        self.values.retain(|(h, _)| *h != handle);
    }

    fn option_descriptor(&mut self, _handle: RawHandle, index: i32) -> Option<OptionDescriptor> {
        let _call = InFlight::enter(&self.log);
        self.options.get(usize::try_from(index).ok()?).cloned()
    }

    fn control_option(
        &mut self,
        handle: RawHandle,
        index: i32,
        action: Action,
        value: &mut [u8],
    ) -> Result<InfoFlags, Status> {
        let _call = InFlight::enter(&self.log);
        let index = usize::try_from(index).map_err(|_| Status::Invalid)?;
        let size = self.options.get(index).ok_or(Status::Invalid)?.size;
        self.log
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((index, size, value.len()));

        let (_, values) = self
            .values
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .ok_or(Status::Invalid)?;
        // A C library reads and writes exactly `size` bytes; slicing here
        // panics where it would have overflowed the heap.
        match action {
            Action::GetValue => value[..size].copy_from_slice(&values[index]),
            Action::SetValue => values[index] = value[..size].to_vec(),
            Action::SetAuto => return Err(Status::Invalid),
        }
        Ok(InfoFlags::empty())
    }
}

fn start() -> CallLog {
    rsane::exit();
    let log = CallLog::default();
    rsane::init_with(ScriptedBackend::new(log.clone())).unwrap();
    log
}

#[test]
#[serial]
fn test_latin1_string_round_trips_byte_exact() {
    start();
    let session = rsane::open("scripted:a").unwrap();

    let label = session.get_option_value(LABEL).unwrap();
    assert_eq!(label, OptionValue::Bytes(LATIN1_LABEL.to_vec()));

    let outcome = session.set_option_value(LABEL, label.clone()).unwrap();
    assert_eq!(outcome.value, label);
    assert_eq!(session.get_option_value(LABEL).unwrap(), label);

    session.set_option_value(LABEL, "Weiss").unwrap();
    assert_eq!(session.get_option_value(LABEL).unwrap(), OptionValue::String("Weiss".into()));
    rsane::exit();
}

#[test]
#[serial]
fn test_buffers_cover_the_declared_size() {
    let log = start();
    let session = rsane::open("scripted:a").unwrap();

    assert_eq!(session.get_option_value(WIDE_BOOL).unwrap(), OptionValue::Bool(true));
    session.set_option_value(WIDE_BOOL, false).unwrap();
    assert_eq!(session.get_option_value(ODD_INT).unwrap(), OptionValue::Int(7));
    session.set_option_value(ODD_INT, 9).unwrap();
    assert_eq!(session.get_option_value(ODD_INT).unwrap(), OptionValue::Int(9));

    let buffers = log.buffers();
    assert!(!buffers.is_empty());
    for (index, size, len) in buffers {
        assert!(len >= size, "option {index}: declared {size} bytes, got a {len}-byte buffer");
    }
    rsane::exit();
}

#[test]
#[serial]
fn test_zero_sized_int_round_trips() {
    start();
    let session = rsane::open("scripted:a").unwrap();
    let value = session.get_option_value(EMPTY_INT).unwrap();
    assert_eq!(value, OptionValue::Int(0));
    let outcome = session.set_option_value(EMPTY_INT, value.clone()).unwrap();
    assert_eq!(outcome.value, value);
    rsane::exit();
}

#[test]
#[serial]
fn test_concurrent_sessions_never_overlap_native_calls() {
    let log = start();
    let a = rsane::open("scripted:a").unwrap();
    let b = rsane::open("scripted:b").unwrap();

    std::thread::scope(|scope| {
        for (session, flag) in [(&a, true), (&b, false)] {
            scope.spawn(move || {
                for _ in 0..100 {
                    session.set_option_value(WIDE_BOOL, flag).unwrap();
                    assert_eq!(session.get_option_value(WIDE_BOOL).unwrap(), OptionValue::Bool(flag));
                    session.options().unwrap();
                }
            });
        }
    });

    assert_eq!(log.peak(), 1, "native calls overlapped");
    a.close().unwrap();
    b.close().unwrap();
    rsane::exit();
}
