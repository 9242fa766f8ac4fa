// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Common Modul for the shuttle tracker
//!
//! Provides the common data types that are used across every modul.

pub mod driver;
pub mod position;
pub mod roster;
pub mod serde;
pub mod settings;
pub mod test_helper;
pub mod tracking;
