// SPDX-License-Identifier: Apache-2.0
//! CLI command implementations.

pub mod common;
pub mod devices;
pub mod options;
pub mod values;
pub mod version;
