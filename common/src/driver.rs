// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::serde::lenient_string;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Value shown for a secondary driver field the roster endpoint didn't send.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Availability of a driver as reported by the roster endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverStatus {
    Active,
    Offline,
    #[default]
    Unknown,
}

impl DriverStatus {
    /// Maps the free-form status text of the roster endpoint.
    ///
    /// `active` and `online` mean [`DriverStatus::Active`], `offline` and
    /// `inactive` mean [`DriverStatus::Offline`]. The match ignores case and
    /// surrounding whitespace, everything else is [`DriverStatus::Unknown`].
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "active" | "online" => DriverStatus::Active,
            "offline" | "inactive" => DriverStatus::Offline,
            _ => DriverStatus::Unknown,
        }
    }
}

/// A roster entry exactly as the roster endpoint delivers it.
///
/// Backends disagree on field names, so both spellings of the same attribute
/// are kept side by side until [`normalize_records`] resolves them.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RawDriverRecord {
    #[serde(default, deserialize_with = "lenient_string::deserialize")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "lenient_string::deserialize")]
    pub document_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string::deserialize")]
    pub name: Option<String>,
    #[serde(
        default,
        rename = "fullName",
        deserialize_with = "lenient_string::deserialize"
    )]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string::deserialize")]
    pub phone: Option<String>,
    #[serde(
        default,
        rename = "phoneNumber",
        deserialize_with = "lenient_string::deserialize"
    )]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string::deserialize")]
    pub route: Option<String>,
    #[serde(default, deserialize_with = "lenient_string::deserialize")]
    pub status: Option<String>,
}

impl RawDriverRecord {
    /// Parses a roster payload. A JSON `null` payload is an empty roster.
    ///
    /// Only a payload that is not a list fails. A single entry that is not a
    /// record is dropped, the rest of the roster is kept.
    pub fn list_from_json(json: &str) -> serde_json::Result<Vec<RawDriverRecord>> {
        let entries: Option<Vec<serde_json::Value>> = serde_json::from_str(json)?;
        let records = entries
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Dropping unreadable roster entry {}. Error: {}", index, e);
                    None
                }
            })
            .collect();
        Ok(records)
    }
}

/// A driver in its canonical shape.
///
/// Only `id` is mandatory. Every other field carries a sentinel value when
/// the endpoint didn't provide it, so a record is never lost because of
/// missing secondary information.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub route: String,
    pub status: DriverStatus,
}

impl DriverRecord {
    /// Returns `true` if `phone` holds a number and not the sentinel.
    pub fn has_phone(&self) -> bool {
        self.phone != NOT_SPECIFIED
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolves field aliases and fills sentinels for a single raw record.
///
/// `index` is the position of the record in the payload and only used to
/// build a display name for drivers without one. Returns `None` if the
/// record has no identifier at all.
pub fn normalize_record(raw: RawDriverRecord, index: usize) -> Option<DriverRecord> {
    let id = non_empty(raw.id).or_else(|| non_empty(raw.document_id))?;
    let name = non_empty(raw.name)
        .or_else(|| non_empty(raw.full_name))
        .unwrap_or_else(|| format!("Driver {}", index + 1));
    let phone = non_empty(raw.phone)
        .or_else(|| non_empty(raw.phone_number))
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let route = non_empty(raw.route).unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let status = raw
        .status
        .as_deref()
        .map(DriverStatus::parse)
        .unwrap_or_default();
    Some(DriverRecord {
        id,
        name,
        phone,
        route,
        status,
    })
}

/// Normalizes a whole roster payload, keeping the payload order.
///
/// Records without an identifier are dropped. If an identifier appears more
/// than once, the first occurrence wins.
pub fn normalize_records(raw: Vec<RawDriverRecord>) -> Vec<DriverRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(raw.len());
    for (index, raw_record) in raw.into_iter().enumerate() {
        let Some(record) = normalize_record(raw_record, index) else {
            warn!("Dropping roster entry {} without id", index);
            continue;
        };
        if !seen.insert(record.id.clone()) {
            warn!("Dropping duplicate roster entry with id {}", record.id);
            continue;
        }
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_name_and_phone_aliases() {
        let raw =
            RawDriverRecord::list_from_json(r#"[{"id":"d1","fullName":"Raj","phoneNumber":"555-1"}]"#)
                .unwrap();
        let records = normalize_records(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Raj");
        assert_eq!(records[0].phone, "555-1");
        assert_eq!(records[0].route, NOT_SPECIFIED);
        assert_eq!(records[0].status, DriverStatus::Unknown);
    }

    #[test]
    fn canonical_name_wins_over_alias() {
        let raw = RawDriverRecord::list_from_json(
            r#"[{"id":"d1","name":"Raj","fullName":"Raj Kumar","phone":"1","phoneNumber":"2"}]"#,
        )
        .unwrap();
        let records = normalize_records(raw);
        assert_eq!(records[0].name, "Raj");
        assert_eq!(records[0].phone, "1");
    }

    #[test]
    fn empty_name_falls_back_to_alias() {
        let raw =
            RawDriverRecord::list_from_json(r#"[{"id":"d1","name":"","fullName":"Asha"}]"#).unwrap();
        assert_eq!(normalize_records(raw)[0].name, "Asha");
    }

    #[test]
    fn missing_secondary_fields_keep_record() {
        let raw = RawDriverRecord::list_from_json(r#"[{"id":"a"},{"id":"b"}]"#).unwrap();
        let records = normalize_records(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Driver 2");
        assert!(!records[1].has_phone());
    }

    #[test]
    fn numeric_ids_and_document_ids_are_accepted() {
        let raw =
            RawDriverRecord::list_from_json(r#"[{"id":7,"phone":5551234},{"_id":"abc"}]"#).unwrap();
        let records = normalize_records(raw);
        assert_eq!(records[0].id, "7");
        assert_eq!(records[0].phone, "5551234");
        assert_eq!(records[1].id, "abc");
    }

    #[test]
    fn drop_records_without_id_and_duplicates() {
        let raw = RawDriverRecord::list_from_json(
            r#"[{"name":"ghost"},{"id":"d1","name":"first"},{"id":"d1","name":"second"}]"#,
        )
        .unwrap();
        let records = normalize_records(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "first");
    }

    #[test]
    fn wrong_typed_secondary_fields_keep_record() {
        let raw = RawDriverRecord::list_from_json(
            r#"[{"id":"d1","name":"Raj"},{"id":"d2","route":7,"name":["x"],"status":true}]"#,
        )
        .unwrap();
        let records = normalize_records(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Raj");
        assert_eq!(records[1].id, "d2");
        assert_eq!(records[1].route, "7");
        assert_eq!(records[1].name, "Driver 2");
        assert_eq!(records[1].status, DriverStatus::Unknown);
    }

    #[test]
    fn unreadable_entry_is_dropped_alone() {
        let raw =
            RawDriverRecord::list_from_json(r#"[42,{"id":"d1","name":"Raj"},"driver"]"#).unwrap();
        let records = normalize_records(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "d1");
    }

    #[test]
    fn map_status_text() {
        assert_eq!(DriverStatus::parse("Online"), DriverStatus::Active);
        assert_eq!(DriverStatus::parse(" active "), DriverStatus::Active);
        assert_eq!(DriverStatus::parse("INACTIVE"), DriverStatus::Offline);
        assert_eq!(DriverStatus::parse("offline"), DriverStatus::Offline);
        assert_eq!(DriverStatus::parse("on break"), DriverStatus::Unknown);
    }

    #[test]
    fn null_payload_is_empty() {
        assert!(RawDriverRecord::list_from_json("null").unwrap().is_empty());
        assert!(RawDriverRecord::list_from_json(r#"{"drivers":[]}"#).is_err());
    }
}
