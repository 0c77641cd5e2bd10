// SPDX-License-Identifier: Apache-2.0
//! Option descriptors: the typed view of `SANE_Option_Descriptor`.
//!
//! Descriptors carry no identity beyond their index within a session and
//! may go stale whenever a set operation reports
//! [`InfoFlags::RELOAD_OPTIONS`].

use std::fmt;
use std::ops::BitOr;

use serde::{Serialize, Serializer};

use crate::ffi;
use crate::value::{Fixed, OptionValue};

// ---------------------------------------------------------------------------
// Value type
// ---------------------------------------------------------------------------

/// `SANE_Value_Type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    Bool,
    Int,
    Fixed,
    String,
    Button,
    Group,
    /// A type code this crate does not know; values are passed as raw bytes.
    Other(i32),
}

impl ValueType {
    pub fn from_code(code: ffi::SaneValueType) -> Self {
        match code {
            ffi::SANE_TYPE_BOOL => ValueType::Bool,
            ffi::SANE_TYPE_INT => ValueType::Int,
            ffi::SANE_TYPE_FIXED => ValueType::Fixed,
            ffi::SANE_TYPE_STRING => ValueType::String,
            ffi::SANE_TYPE_BUTTON => ValueType::Button,
            ffi::SANE_TYPE_GROUP => ValueType::Group,
            other => ValueType::Other(other),
        }
    }

    pub fn code(self) -> ffi::SaneValueType {
        match self {
            ValueType::Bool => ffi::SANE_TYPE_BOOL,
            ValueType::Int => ffi::SANE_TYPE_INT,
            ValueType::Fixed => ffi::SANE_TYPE_FIXED,
            ValueType::String => ffi::SANE_TYPE_STRING,
            ValueType::Button => ffi::SANE_TYPE_BUTTON,
            ValueType::Group => ffi::SANE_TYPE_GROUP,
            ValueType::Other(code) => code,
        }
    }

    /// Buttons and group headers have no value to get or set.
    pub fn carries_value(self) -> bool {
        !matches!(self, ValueType::Button | ValueType::Group)
    }

    /// Whether values of this type are arrays of `SANE_Word`.
    pub fn is_word(self) -> bool {
        matches!(self, ValueType::Bool | ValueType::Int | ValueType::Fixed)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int => f.write_str("int"),
            ValueType::Fixed => f.write_str("fixed"),
            ValueType::String => f.write_str("string"),
            ValueType::Button => f.write_str("button"),
            ValueType::Group => f.write_str("group"),
            ValueType::Other(code) => write!(f, "type#{code}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// `SANE_Unit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    None,
    Pixel,
    Bit,
    Mm,
    Dpi,
    Percent,
    Microsecond,
    Other(i32),
}

impl Unit {
    pub fn from_code(code: ffi::SaneUnit) -> Self {
        match code {
            ffi::SANE_UNIT_NONE => Unit::None,
            ffi::SANE_UNIT_PIXEL => Unit::Pixel,
            ffi::SANE_UNIT_BIT => Unit::Bit,
            ffi::SANE_UNIT_MM => Unit::Mm,
            ffi::SANE_UNIT_DPI => Unit::Dpi,
            ffi::SANE_UNIT_PERCENT => Unit::Percent,
            ffi::SANE_UNIT_MICROSECOND => Unit::Microsecond,
            other => Unit::Other(other),
        }
    }

    /// Short suffix used when printing values (`"dpi"`, `"mm"`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::None | Unit::Other(_) => "",
            Unit::Pixel => "px",
            Unit::Bit => "bit",
            Unit::Mm => "mm",
            Unit::Dpi => "dpi",
            Unit::Percent => "%",
            Unit::Microsecond => "us",
        }
    }
}

// ---------------------------------------------------------------------------
// Bit sets
// ---------------------------------------------------------------------------

macro_rules! sane_bits {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $value:path => $label:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(i32);

        impl $name {
            $($(#[$fmeta])* pub const $flag: Self = Self($value);)+

            pub const fn empty() -> Self {
                Self(0)
            }

            /// Keep every bit, including ones this crate has no name for.
            pub const fn from_bits(bits: i32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> i32 {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub fn names(self) -> Vec<&'static str> {
                let mut names = Vec::new();
                $(if self.contains(Self::$flag) {
                    names.push($label);
                })+
                names
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.names().join("|"))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_seq(self.names())
            }
        }
    };
}

sane_bits! {
    /// `SANE_CAP_*` bits of an option.
    Capabilities {
        /// Settable by software.
        SOFT_SELECT = ffi::SANE_CAP_SOFT_SELECT => "soft-select",
        /// Settable only by a physical control on the device.
        HARD_SELECT = ffi::SANE_CAP_HARD_SELECT => "hard-select",
        /// Readable by software.
        SOFT_DETECT = ffi::SANE_CAP_SOFT_DETECT => "soft-detect",
        EMULATED = ffi::SANE_CAP_EMULATED => "emulated",
        AUTOMATIC = ffi::SANE_CAP_AUTOMATIC => "automatic",
        INACTIVE = ffi::SANE_CAP_INACTIVE => "inactive",
        ADVANCED = ffi::SANE_CAP_ADVANCED => "advanced",
    }
}

impl Capabilities {
    pub fn is_active(self) -> bool {
        !self.contains(Self::INACTIVE)
    }

    /// Active and software-readable.
    pub fn is_readable(self) -> bool {
        self.is_active() && self.contains(Self::SOFT_DETECT)
    }

    /// Active and software-settable.
    pub fn is_settable(self) -> bool {
        self.is_active() && self.contains(Self::SOFT_SELECT)
    }

    pub fn is_automatic(self) -> bool {
        self.is_settable() && self.contains(Self::AUTOMATIC)
    }
}

sane_bits! {
    /// `SANE_INFO_*` side effects reported by a set operation.
    InfoFlags {
        /// The device stored a value close to, but not equal to, the request.
        INEXACT = ffi::SANE_INFO_INEXACT => "inexact",
        /// Other descriptors (including the option count) may have changed.
        RELOAD_OPTIONS = ffi::SANE_INFO_RELOAD_OPTIONS => "reload-options",
        /// Scan parameters may have changed.
        RELOAD_PARAMS = ffi::SANE_INFO_RELOAD_PARAMS => "reload-params",
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Inclusive range of words; `quant == 0` means continuous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub min: i32,
    pub max: i32,
    pub quant: i32,
}

impl Range {
    pub fn contains(&self, word: i32) -> bool {
        if word < self.min || word > self.max {
            return false;
        }
        self.quant <= 0 || (i64::from(word) - i64::from(self.min)) % i64::from(self.quant) == 0
    }

    /// Interpret the bounds as fixed-point, for `Fixed` options.
    pub fn as_fixed(&self) -> (Fixed, Fixed, Fixed) {
        (
            Fixed::from_raw(self.min),
            Fixed::from_raw(self.max),
            Fixed::from_raw(self.quant),
        )
    }
}

/// Legal values of an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Constraint {
    None,
    Range(Range),
    WordList(Vec<i32>),
    StringList(Vec<String>),
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Description of the option at one index of an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionDescriptor {
    pub index: usize,
    pub name: String,
    pub title: String,
    pub description: String,
    pub value_type: ValueType,
    pub unit: Unit,
    /// Value size in bytes. For word types this is a multiple of four; for
    /// strings it includes the terminating NUL.
    pub size: usize,
    pub capabilities: Capabilities,
    pub constraint: Constraint,
}

impl OptionDescriptor {
    /// Number of `SANE_Word`s in a word-typed value; zero for other types.
    ///
    /// A `Bool` is always one word. An `Int` or `Fixed` declared smaller
    /// than one word still holds one.
    pub fn word_count(&self) -> usize {
        match self.value_type {
            ValueType::Bool => 1,
            ValueType::Int | ValueType::Fixed => (self.size / ffi::WORD_SIZE).max(1),
            _ => 0,
        }
    }

    /// The value can be fetched with `get_option_value`.
    pub fn is_readable(&self) -> bool {
        self.value_type.carries_value() && self.capabilities.is_readable()
    }

    /// The value can be changed with `set_option_value`.
    pub fn is_settable(&self) -> bool {
        self.value_type.carries_value() && self.capabilities.is_settable()
    }

    pub fn is_group(&self) -> bool {
        self.value_type == ValueType::Group
    }

    /// Whether `value` satisfies this option's constraint.
    ///
    /// Devices are free to round values that miss a range quantum, so the
    /// session does not enforce this; it is a helper for front ends.
    pub fn check(&self, value: &OptionValue) -> bool {
        match (&self.constraint, value) {
            (Constraint::None, _) => true,
            (Constraint::StringList(allowed), OptionValue::String(s)) => allowed.iter().any(|a| a == s),
            (Constraint::StringList(_), _) => false,
            (Constraint::Range(range), v) => v.words().is_some_and(|w| w.iter().all(|&x| range.contains(x))),
            (Constraint::WordList(list), v) => v.words().is_some_and(|w| w.iter().all(|x| list.contains(x))),
        }
    }

    /// Shape of the value this option holds, for error messages.
    pub(crate) fn value_shape(&self) -> String {
        match self.value_type {
            ValueType::Int | ValueType::Fixed if self.word_count() != 1 => {
                format!("{}[{}]", self.value_type, self.word_count())
            }
            ValueType::String => format!("string(max {} bytes)", self.size.saturating_sub(1)),
            ValueType::Other(_) => format!("{}({} bytes)", self.value_type, self.size),
            other => other.to_string(),
        }
    }
}
