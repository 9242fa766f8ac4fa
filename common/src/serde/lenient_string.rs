// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Accepts any JSON value for an optional text field.
//!
//! Strings are taken as they are, numbers and booleans in their JSON
//! spelling. Arrays and objects carry no usable text and read as absent, so
//! a record is never rejected because of one of its text fields.

use serde::{self, Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => {
            debug!("Ignoring text field with structured value {}", other);
            Ok(None)
        }
    }
}
