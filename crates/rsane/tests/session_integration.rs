// SPDX-License-Identifier: Apache-2.0
//! Integration tests against the in-process mock SANE library.
//!
//! The runtime is process-wide, so every test is `#[serial]` and starts by
//! calling `exit()` to discard whatever an earlier failing test left behind.

use rsane::mock::{CallJournal, COLOR_OPTION_COUNT, GRAY_OPTION_COUNT, MockBackend, MockDevice, NativeCall};
use rsane::{
    Access, Capabilities, Constraint, Fixed, InfoFlags, OpenErrorKind, OptionValue, SaneError,
    Status, Unit, ValueType,
};
use serial_test::serial;

const MODE: usize = 2;
const DEPTH: usize = 3;
const RESOLUTION: usize = 4;
const THREE_PASS: usize = 5;
const GAMMA: usize = 7;
const READ_ONLY: usize = 9;
const CALIBRATE: usize = 10;
const HW_SWITCH: usize = 11;
const COLOR_BALANCE: usize = 12;

fn start_with(mock: MockBackend) -> CallJournal {
    rsane::exit();
    let journal = mock.journal();
    rsane::init_with(mock).expect("mock init failed");
    journal
}

fn start() -> CallJournal {
    start_with(MockBackend::new())
}

fn open_first() -> rsane::DeviceSession {
    let devices = rsane::get_devices().unwrap();
    assert!(!devices.is_empty());
    rsane::open(&devices[0].name).expect("open failed")
}

// ---------------------------------------------------------------------------
// Library lifecycle
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn test_init_reports_current_version() {
    rsane::exit();
    let version = rsane::init_with(MockBackend::new()).unwrap();
    assert!(version.is_current());
    assert!(rsane::is_initialized());
    rsane::exit();
    assert!(!rsane::is_initialized());
}

#[test]
#[serial]
fn test_repeated_init_exit_cycles() {
    for _ in 0..3 {
        let journal = start();
        let session = open_first();
        assert_eq!(rsane::open_session_count(), 1);
        rsane::exit();
        assert_eq!(rsane::open_session_count(), 0);
        assert!(!session.is_open());
        assert_eq!(journal.count(|c| matches!(c, NativeCall::Close { .. })), 1);
        assert_eq!(journal.count(|c| *c == NativeCall::Exit), 1);
    }
}

#[test]
#[serial]
fn test_double_init_is_rejected() {
    start();
    let err = rsane::init_with(MockBackend::new()).unwrap_err();
    assert!(matches!(err, SaneError::Init { .. }));
    // The first backend is still installed.
    assert_eq!(rsane::get_devices().unwrap().len(), 2);
    rsane::exit();
}

#[test]
#[serial]
fn test_failed_init_leaves_runtime_uninitialized() {
    rsane::exit();
    let err = rsane::init_with(MockBackend::new().failing_init(Status::IoError)).unwrap_err();
    assert!(matches!(err, SaneError::Init { .. }));
    assert!(!rsane::is_initialized());

    rsane::init_with(MockBackend::new()).unwrap();
    rsane::exit();
}

#[test]
#[serial]
fn test_operations_before_init_fail_cleanly() {
    rsane::exit();
    assert!(matches!(rsane::get_devices(), Err(SaneError::NotInitialized)));
    assert!(matches!(rsane::open("test:0"), Err(SaneError::NotInitialized)));
    // Exit while not initialised is a no-op.
    rsane::exit();
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn test_get_devices_snapshot() {
    let journal = start();
    let devices = rsane::get_devices().unwrap();
    let names: Vec<_> = devices.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["test:0", "test:1"]);
    assert_eq!(devices[0].vendor, "Noname");
    assert_eq!(devices[0].model, "frontend-tester");
    assert_eq!(devices[0].kind, "virtual device");

    rsane::get_devices().unwrap();
    assert_eq!(journal.count(|c| matches!(c, NativeCall::GetDevices { .. })), 2);
    rsane::exit();
}

#[test]
#[serial]
fn test_empty_enumeration_is_not_an_error() {
    start_with(MockBackend::empty());
    assert!(rsane::get_devices().unwrap().is_empty());
    rsane::exit();
}

#[test]
#[serial]
fn test_enumeration_failure() {
    start_with(MockBackend::new().failing_enumeration(Status::IoError));
    let err = rsane::get_devices().unwrap_err();
    assert!(matches!(
        err,
        SaneError::Enumeration {
            status: Status::IoError
        }
    ));
    rsane::exit();
}

#[test]
#[serial]
fn test_local_only_enumeration() {
    let journal = start_with(
        MockBackend::empty()
            .with_device(MockDevice::new("test:0"))
            .with_device(MockDevice::new("net:scanhost:test:0").remote()),
    );
    assert_eq!(rsane::get_devices().unwrap().len(), 2);
    assert_eq!(rsane::get_devices_with(true).unwrap().len(), 1);
    assert!(journal.calls().contains(&NativeCall::GetDevices { local_only: true }));
    rsane::exit();
}

#[test]
#[serial]
fn test_every_enumerated_device_opens() {
    start();
    let sessions: Vec<_> = rsane::get_devices()
        .unwrap()
        .iter()
        .map(|d| rsane::open(&d.name).unwrap())
        .collect();
    assert_eq!(rsane::open_session_count(), sessions.len());
    for session in sessions {
        rsane::close(session).unwrap();
    }
    assert_eq!(rsane::open_session_count(), 0);
    rsane::exit();
}

// ---------------------------------------------------------------------------
// Opening and closing
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn test_open_invalid_name_never_reaches_native() {
    let journal = start();
    let err = rsane::open("__definitely_invalid_device_name__").unwrap_err();
    assert_eq!(err.open_kind(), Some(OpenErrorKind::NotFound));
    assert_eq!(journal.count(|c| matches!(c, NativeCall::Open { .. })), 0);
    rsane::exit();
}

#[test]
#[serial]
fn test_open_malformed_names() {
    start();
    let err = rsane::open("").unwrap_err();
    assert_eq!(err.open_kind(), Some(OpenErrorKind::InvalidName));
    let err = rsane::open("test\0:0").unwrap_err();
    assert_eq!(err.open_kind(), Some(OpenErrorKind::InvalidName));
    rsane::exit();
}

#[test]
#[serial]
fn test_open_unlisted_device_is_refused() {
    let journal = start_with(MockBackend::new().with_device(MockDevice::new("ghost").unlisted()));
    let err = rsane::open("ghost").unwrap_err();
    assert_eq!(err.open_kind(), Some(OpenErrorKind::NotFound));
    assert_eq!(journal.count(|c| matches!(c, NativeCall::Open { .. })), 0);
    rsane::exit();
}

#[test]
#[serial]
fn test_open_native_failures_are_translated() {
    start_with(
        MockBackend::new().with_device(MockDevice::new("locked").open_fails(Status::AccessDenied)),
    );
    let err = rsane::open("locked").unwrap_err();
    assert!(matches!(
        err,
        SaneError::Open {
            kind: OpenErrorKind::AccessDenied,
            status: Some(Status::AccessDenied),
            ..
        }
    ));

    let _first = rsane::open("test:0").unwrap();
    let err = rsane::open("test:0").unwrap_err();
    assert_eq!(err.open_kind(), Some(OpenErrorKind::Busy));
    rsane::exit();
}

#[test]
#[serial]
fn test_close_releases_handle_once() {
    let journal = start();
    let session = open_first();
    assert!(session.is_open());
    session.close().unwrap();
    assert_eq!(rsane::open_session_count(), 0);
    assert_eq!(journal.count(|c| matches!(c, NativeCall::Close { .. })), 1);

    // The device can be opened again.
    let session = open_first();
    drop(session);
    assert_eq!(journal.count(|c| matches!(c, NativeCall::Close { .. })), 2);
    rsane::exit();
    assert_eq!(journal.count(|c| matches!(c, NativeCall::Close { .. })), 2);
}

// ---------------------------------------------------------------------------
// Option descriptors
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn test_option_zero_descriptor() {
    start();
    let session = open_first();
    let desc = session.get_option_descriptor(0).unwrap();
    assert_eq!(desc.name, "");
    assert_eq!(desc.title, "Number of options");
    assert_eq!(desc.value_type, ValueType::Int);
    assert_eq!(desc.unit, Unit::None);
    assert_eq!(desc.size, 4);
    assert_eq!(desc.capabilities, Capabilities::SOFT_DETECT);
    assert!(!desc.is_settable());
    assert_eq!(desc.constraint, Constraint::None);

    let json = serde_json::to_value(&desc).unwrap();
    assert_eq!(json["value_type"], "Int");
    assert_eq!(json["capabilities"], serde_json::json!(["soft-detect"]));
    rsane::exit();
}

#[test]
#[serial]
fn test_option_zero_value_is_the_option_count() {
    start();
    let session = open_first();
    let count = session.get_option_value(0).unwrap();
    assert_eq!(count, OptionValue::Int(GRAY_OPTION_COUNT as i32));
    assert_eq!(session.option_count().unwrap(), GRAY_OPTION_COUNT);
    assert_eq!(session.options().unwrap().len(), GRAY_OPTION_COUNT - 1);
    rsane::exit();
}

#[test]
#[serial]
fn test_out_of_bounds_descriptor_is_rejected_before_native() {
    let journal = start();
    let session = open_first();
    let count = session.option_count().unwrap();

    for index in [count, count + 1, 999_999, usize::MAX] {
        let err = session.get_option_descriptor(index).unwrap_err();
        assert!(
            matches!(err, SaneError::Index { index: i, count: c } if i == index && c == count),
            "unexpected error {err:?}"
        );
    }
    assert!(matches!(
        session.get_option_value(999_999),
        Err(SaneError::Index { .. })
    ));
    assert!(matches!(
        session.set_option_value(count, 1),
        Err(SaneError::Index { .. })
    ));

    let out_of_range = journal.count(|c| match c {
        NativeCall::OptionDescriptor { index, .. } | NativeCall::ControlOption { index, .. } => {
            usize::try_from(*index).map_or(true, |i| i >= count)
        }
        _ => false,
    });
    assert_eq!(out_of_range, 0);
    rsane::exit();
}

#[test]
#[serial]
fn test_find_option_by_name() {
    start();
    let session = open_first();
    let desc = session.find_option("resolution").unwrap().unwrap();
    assert_eq!(desc.index, RESOLUTION);
    assert_eq!(desc.unit, Unit::Dpi);
    assert!(desc.capabilities.contains(Capabilities::AUTOMATIC));
    assert!(session.find_option("no-such-option").unwrap().is_none());
    // Color-only options are absent in gray mode.
    assert!(session.find_option("color-balance").unwrap().is_none());
    rsane::exit();
}

// ---------------------------------------------------------------------------
// Option values
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn test_get_every_readable_option() {
    start();
    let session = open_first();
    let count = session.option_count().unwrap();
    for index in 0..count {
        let desc = session.get_option_descriptor(index).unwrap();
        let result = session.get_option_value(index);
        if desc.is_readable() {
            let value = result.unwrap();
            if let Some(words) = value.words() {
                assert_eq!(words.len(), desc.word_count(), "option {}", desc.name);
            }
        } else {
            assert!(
                matches!(result, Err(SaneError::Capability { required: Access::Get, .. })),
                "option {index} ({}) should not be readable",
                desc.title
            );
        }
    }
    assert_eq!(session.get_option_value(MODE).unwrap(), OptionValue::String("Gray".into()));
    assert_eq!(session.get_option_value(DEPTH).unwrap(), OptionValue::Int(8));
    assert_eq!(session.get_option_value(GAMMA).unwrap(), OptionValue::IntList(vec![0, 85, 170, 255]));
    assert_eq!(session.get_option_value(READ_ONLY).unwrap(), OptionValue::Int(42));
    rsane::exit();
}

#[test]
#[serial]
fn test_inactive_group_and_button_options_are_not_readable() {
    start();
    let session = open_first();
    for index in [1, THREE_PASS, CALIBRATE] {
        assert!(matches!(
            session.get_option_value(index),
            Err(SaneError::Capability { required: Access::Get, .. })
        ));
    }
    rsane::exit();
}

#[test]
#[serial]
fn test_round_trip_on_settable_options() {
    start();
    let session = open_first();
    for desc in session.options().unwrap() {
        if !(desc.is_readable() && desc.is_settable()) {
            continue;
        }
        let value = session.get_option_value(desc.index).unwrap();
        let outcome = session
            .set_option_value(desc.index, value.clone())
            .unwrap_or_else(|e| panic!("round trip of '{}' failed: {e}", desc.name));
        assert_eq!(outcome.value, value);
        assert!(!outcome.inexact());
    }
    rsane::exit();
}

#[test]
#[serial]
fn test_type_mismatch_is_not_forwarded() {
    let journal = start();
    let session = open_first();
    journal.clear();

    let err = session.set_option_value(DEPTH, "8").unwrap_err();
    assert!(matches!(err, SaneError::TypeMismatch { index: DEPTH, .. }));
    let err = session.set_option_value(GAMMA, vec![1, 2]).unwrap_err();
    assert!(matches!(err, SaneError::TypeMismatch { index: GAMMA, .. }));
    let err = session.set_option_value(MODE, "a-mode-name-longer-than-sixteen-bytes").unwrap_err();
    assert!(matches!(err, SaneError::TypeMismatch { index: MODE, .. }));

    let sets = journal.count(|c| {
        matches!(c, NativeCall::ControlOption { action: rsane::backend::Action::SetValue, .. })
    });
    assert_eq!(sets, 0);
    rsane::exit();
}

#[test]
#[serial]
fn test_unsettable_options_are_capability_errors() {
    start();
    let session = open_first();
    for index in [0, READ_ONLY, HW_SWITCH, THREE_PASS] {
        let desc = session.get_option_descriptor(index).unwrap();
        let value = match desc.value_type {
            ValueType::Bool => OptionValue::Bool(true),
            _ => OptionValue::Int(1),
        };
        assert!(
            matches!(
                session.set_option_value(index, value),
                Err(SaneError::Capability { required: Access::Set, .. })
            ),
            "option {index} should not be settable"
        );
    }
    rsane::exit();
}

#[test]
#[serial]
fn test_inexact_set_reports_stored_value() {
    start();
    let session = open_first();
    let outcome = session
        .set_option_value(RESOLUTION, Fixed::from_f64(150.4))
        .unwrap();
    assert!(outcome.inexact());
    assert!(outcome.reload_params());
    assert_eq!(outcome.value, OptionValue::Fixed(Fixed::from_f64(150.0)));
    assert_eq!(
        session.get_option_value(RESOLUTION).unwrap(),
        OptionValue::Fixed(Fixed::from_f64(150.0))
    );
    rsane::exit();
}

#[test]
#[serial]
fn test_reload_options_refreshes_the_count() {
    start();
    let session = open_first();
    assert_eq!(session.option_count().unwrap(), GRAY_OPTION_COUNT);
    assert!(matches!(
        session.get_option_descriptor(COLOR_BALANCE),
        Err(SaneError::Index { .. })
    ));

    let outcome = session.set_option_value(MODE, "Color").unwrap();
    assert!(outcome.reload_options());
    assert_eq!(session.option_count().unwrap(), COLOR_OPTION_COUNT);

    let balance = session.get_option_descriptor(COLOR_BALANCE).unwrap();
    assert_eq!(balance.name, "color-balance");
    assert_eq!(balance.word_count(), 3);
    let three_pass = session.get_option_descriptor(THREE_PASS).unwrap();
    assert!(three_pass.capabilities.is_active());
    session.set_option_value(THREE_PASS, true).unwrap();

    session.set_option_value(MODE, "Gray").unwrap();
    assert_eq!(session.option_count().unwrap(), GRAY_OPTION_COUNT);
    rsane::exit();
}

#[test]
#[serial]
fn test_set_option_auto() {
    start();
    let session = open_first();
    let info = session.set_option_auto(RESOLUTION).unwrap();
    assert!(info.contains(InfoFlags::RELOAD_PARAMS));
    assert_eq!(
        session.get_option_value(RESOLUTION).unwrap(),
        OptionValue::Fixed(Fixed::from_f64(300.0))
    );
    assert!(matches!(
        session.set_option_auto(DEPTH),
        Err(SaneError::Capability { required: Access::Auto, .. })
    ));
    rsane::exit();
}

#[test]
#[serial]
fn test_press_button() {
    start();
    let session = open_first();
    assert!(session.press_button(CALIBRATE).unwrap().is_empty());
    assert!(matches!(
        session.press_button(DEPTH),
        Err(SaneError::Capability { required: Access::Press, .. })
    ));
    assert!(matches!(
        session.set_option_value(CALIBRATE, true),
        Err(SaneError::Capability { required: Access::Set, .. })
    ));
    rsane::exit();
}

// ---------------------------------------------------------------------------
// Close-then-use
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn test_session_is_stale_after_exit() {
    start();
    let session = open_first();
    rsane::exit();

    assert!(!session.is_open());
    assert!(matches!(session.option_count(), Err(SaneError::UseAfterClose)));
    assert!(matches!(session.get_option_descriptor(0), Err(SaneError::UseAfterClose)));
    assert!(matches!(session.get_option_value(0), Err(SaneError::UseAfterClose)));
    assert!(matches!(session.set_option_value(DEPTH, 8), Err(SaneError::UseAfterClose)));
    assert!(matches!(session.set_option_auto(RESOLUTION), Err(SaneError::UseAfterClose)));
    assert!(matches!(session.close(), Err(SaneError::UseAfterClose)));
}

#[test]
#[serial]
fn test_stale_session_stays_stale_after_reinit() {
    start();
    let stale = open_first();
    rsane::exit();

    let journal = start();
    let fresh = open_first();
    assert!(matches!(stale.get_option_value(DEPTH), Err(SaneError::UseAfterClose)));
    assert_eq!(fresh.get_option_value(DEPTH).unwrap(), OptionValue::Int(8));

    // Dropping the stale session must not close anything on the new backend.
    drop(stale);
    assert_eq!(journal.count(|c| matches!(c, NativeCall::Close { .. })), 0);
    fresh.close().unwrap();
    rsane::exit();
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
#[serial]
fn test_sessions_on_worker_threads() {
    start();
    let a = rsane::open("test:0").unwrap();
    let b = rsane::open("test:1").unwrap();

    std::thread::scope(|scope| {
        for (session, depth) in [(&a, 1), (&b, 16)] {
            scope.spawn(move || {
                for _ in 0..50 {
                    let outcome = session.set_option_value(DEPTH, depth).unwrap();
                    assert_eq!(outcome.value, OptionValue::Int(depth));
                    assert_eq!(session.get_option_value(DEPTH).unwrap(), OptionValue::Int(depth));
                    session.options().unwrap();
                }
            });
        }
    });

    a.close().unwrap();
    b.close().unwrap();
    rsane::exit();
}
