// SPDX-License-Identifier: Apache-2.0
//! Typed option values and their native byte layout.
//!
//! `sane_control_option` exchanges values through an untyped buffer whose
//! layout depends on the descriptor: an array of native-endian words for
//! `Bool`/`Int`/`Fixed`, a NUL-terminated string for `String`. Conversion in
//! both directions checks the value against the descriptor and fails with
//! [`SaneError::TypeMismatch`] instead of reinterpreting memory.

use std::fmt;

use serde::Serialize;

use crate::error::{Access, Result, SaneError};
use crate::ffi;
use crate::option::{OptionDescriptor, ValueType};

// ---------------------------------------------------------------------------
// Fixed point
// ---------------------------------------------------------------------------

/// `SANE_Fixed`: signed 16.16 fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "f64")]
pub struct Fixed(i32);

impl Fixed {
    const ONE: f64 = (1 << ffi::SANE_FIXED_SCALE_SHIFT) as f64;

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// `SANE_FIX(v)`; saturates outside roughly ±32768.
    pub fn from_f64(v: f64) -> Self {
        Self((v * Self::ONE).round() as i32)
    }

    /// `SANE_FIX(v)`, or `None` when `v` is not representable in 16.16.
    pub fn try_from_f64(v: f64) -> Option<Self> {
        let scaled = (v * Self::ONE).round();
        (scaled >= f64::from(i32::MIN) && scaled <= f64::from(i32::MAX)).then(|| Self(scaled as i32))
    }

    /// `SANE_UNFIX(v)`
    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / Self::ONE
    }
}

impl From<Fixed> for f64 {
    fn from(v: Fixed) -> f64 {
        v.to_f64()
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A value read from or written to an option.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
    IntList(Vec<i32>),
    Fixed(Fixed),
    FixedList(Vec<Fixed>),
    String(String),
    /// Raw value of an option whose type code is not recognised, or a
    /// string that is not UTF-8 (stored without its NUL terminator).
    Bytes(Vec<u8>),
}

impl OptionValue {
    /// Shape of this value, for error messages.
    pub fn shape(&self) -> String {
        match self {
            OptionValue::Bool(_) => "bool".into(),
            OptionValue::Int(_) => "int".into(),
            OptionValue::IntList(v) => format!("int[{}]", v.len()),
            OptionValue::Fixed(_) => "fixed".into(),
            OptionValue::FixedList(v) => format!("fixed[{}]", v.len()),
            OptionValue::String(s) => format!("string({} bytes)", s.len()),
            OptionValue::Bytes(b) => format!("bytes({})", b.len()),
        }
    }

    /// The raw words of a word-typed value.
    pub fn words(&self) -> Option<Vec<i32>> {
        match self {
            OptionValue::Bool(b) => Some(vec![i32::from(*b)]),
            OptionValue::Int(v) => Some(vec![*v]),
            OptionValue::IntList(v) => Some(v.clone()),
            OptionValue::Fixed(v) => Some(vec![v.raw()]),
            OptionValue::FixedList(v) => Some(v.iter().map(|f| f.raw()).collect()),
            OptionValue::String(_) | OptionValue::Bytes(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_fixed(&self) -> Option<Fixed> {
        match self {
            OptionValue::Fixed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parse user input according to the descriptor, as front ends do for
    /// `name=value` arguments. Lists are comma separated.
    pub fn parse_for(desc: &OptionDescriptor, input: &str) -> Result<Self> {
        let mismatch = || SaneError::TypeMismatch {
            index: desc.index,
            expected: desc.value_shape(),
            found: format!("'{input}'"),
        };
        let value = match desc.value_type {
            ValueType::Bool => match input.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => OptionValue::Bool(true),
                "0" | "false" | "no" | "off" => OptionValue::Bool(false),
                _ => return Err(mismatch()),
            },
            ValueType::Int => {
                let words: Vec<i32> = input
                    .split(',')
                    .map(|s| s.trim().parse::<i32>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| mismatch())?;
                if desc.word_count() == 1 && words.len() == 1 {
                    OptionValue::Int(words[0])
                } else {
                    OptionValue::IntList(words)
                }
            }
            ValueType::Fixed => {
                let words: Vec<Fixed> = input
                    .split(',')
                    .map(|s| s.trim().parse::<f64>().ok().and_then(Fixed::try_from_f64))
                    .collect::<Option<_>>()
                    .ok_or_else(mismatch)?;
                if desc.word_count() == 1 && words.len() == 1 {
                    OptionValue::Fixed(words[0])
                } else {
                    OptionValue::FixedList(words)
                }
            }
            ValueType::String => OptionValue::String(input.to_string()),
            ValueType::Button | ValueType::Group => {
                return Err(SaneError::Capability {
                    index: desc.index,
                    required: Access::Set,
                });
            }
            ValueType::Other(_) => return Err(mismatch()),
        };
        Ok(value)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        }
        match self {
            OptionValue::Bool(v) => write!(f, "{}", if *v { "yes" } else { "no" }),
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::IntList(v) => f.write_str(&join(v)),
            OptionValue::Fixed(v) => write!(f, "{v}"),
            OptionValue::FixedList(v) => f.write_str(&join(v)),
            OptionValue::String(s) => f.write_str(s),
            OptionValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v)
    }
}

impl From<Vec<i32>> for OptionValue {
    fn from(v: Vec<i32>) -> Self {
        OptionValue::IntList(v)
    }
}

impl From<Fixed> for OptionValue {
    fn from(v: Fixed) -> Self {
        OptionValue::Fixed(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::String(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::String(v)
    }
}

// ---------------------------------------------------------------------------
// Marshalling
// ---------------------------------------------------------------------------

/// Bytes handed to the native layer for `desc`: never less than the
/// declared `size`, which is what the library will read or write.
fn buffer_len(desc: &OptionDescriptor) -> usize {
    desc.size.max(desc.word_count() * ffi::WORD_SIZE)
}

/// A zeroed buffer large enough for the option's value.
pub(crate) fn buffer_for(desc: &OptionDescriptor) -> Vec<u8> {
    vec![0u8; buffer_len(desc)]
}

/// The first `desc.word_count()` words of `buf`.
fn read_words(desc: &OptionDescriptor, buf: &[u8]) -> Vec<i32> {
    buf.chunks_exact(ffi::WORD_SIZE)
        .take(desc.word_count())
        .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn write_words(desc: &OptionDescriptor, words: &[i32]) -> Vec<u8> {
    let mut buf = buffer_for(desc);
    for (slot, word) in buf.chunks_exact_mut(ffi::WORD_SIZE).zip(words) {
        slot.copy_from_slice(&word.to_ne_bytes());
    }
    buf
}

/// Decode a native value buffer according to `desc`.
pub(crate) fn decode(desc: &OptionDescriptor, buf: &[u8]) -> Result<OptionValue> {
    let value = match desc.value_type {
        ValueType::Bool => OptionValue::Bool(read_words(desc, buf).first().is_some_and(|&w| w != 0)),
        ValueType::Int => {
            let words = read_words(desc, buf);
            if desc.word_count() == 1 {
                OptionValue::Int(words.first().copied().unwrap_or_default())
            } else {
                OptionValue::IntList(words)
            }
        }
        ValueType::Fixed => {
            let words: Vec<Fixed> = read_words(desc, buf).into_iter().map(Fixed::from_raw).collect();
            if desc.word_count() == 1 {
                OptionValue::Fixed(words.first().copied().unwrap_or_default())
            } else {
                OptionValue::FixedList(words)
            }
        }
        ValueType::String => {
            let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            // Backends often report Latin-1; keep such values byte-exact.
            match String::from_utf8(buf[..end].to_vec()) {
                Ok(text) => OptionValue::String(text),
                Err(e) => OptionValue::Bytes(e.into_bytes()),
            }
        }
        ValueType::Other(_) => OptionValue::Bytes(buf.to_vec()),
        ValueType::Button | ValueType::Group => {
            return Err(SaneError::Capability {
                index: desc.index,
                required: Access::Get,
            });
        }
    };
    Ok(value)
}

/// Encode `value` into a native buffer for `desc`, rejecting any value
/// whose type or size disagrees with the descriptor.
pub(crate) fn encode(desc: &OptionDescriptor, value: &OptionValue) -> Result<Vec<u8>> {
    let mismatch = || SaneError::TypeMismatch {
        index: desc.index,
        expected: desc.value_shape(),
        found: value.shape(),
    };
    let words = desc.word_count();
    let buf = match (desc.value_type, value) {
        (ValueType::Bool, OptionValue::Bool(b)) => write_words(desc, &[i32::from(*b)]),
        (ValueType::Int, OptionValue::Int(v)) if words == 1 => write_words(desc, &[*v]),
        (ValueType::Int, OptionValue::IntList(v)) if v.len() == words => write_words(desc, v),
        (ValueType::Fixed, OptionValue::Fixed(v)) if words == 1 => write_words(desc, &[v.raw()]),
        (ValueType::Fixed, OptionValue::FixedList(v)) if v.len() == words => {
            write_words(desc, &v.iter().map(|f| f.raw()).collect::<Vec<_>>())
        }
        (ValueType::String, OptionValue::String(s)) => c_string_buffer(desc, s.as_bytes()).ok_or_else(mismatch)?,
        (ValueType::String, OptionValue::Bytes(b)) => c_string_buffer(desc, b).ok_or_else(mismatch)?,
        (ValueType::Other(_), OptionValue::Bytes(b)) if b.len() == desc.size => b.clone(),
        (ValueType::Button | ValueType::Group, _) => {
            return Err(SaneError::Capability {
                index: desc.index,
                required: Access::Set,
            });
        }
        _ => return Err(mismatch()),
    };
    Ok(buf)
}

/// `bytes` NUL-terminated in a buffer of the declared size, or `None` if
/// they contain a NUL or leave no room for the terminator.
fn c_string_buffer(desc: &OptionDescriptor, bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.contains(&0) || bytes.len() + 1 > desc.size {
        return None;
    }
    let mut buf = buffer_for(desc);
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(buf)
}
