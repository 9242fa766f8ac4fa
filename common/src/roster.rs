// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::driver::DriverRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A thread-safe, reference-counted pointer to a [`Roster`] snapshot.
pub type RosterPtr = Arc<Roster>;

/// Where the records of a [`Roster`] come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterSource {
    /// The records are the result of the most recent poll.
    Fresh,
    /// The most recent poll failed. The records are the last fresh ones.
    Stale,
}

/// The set of known drivers as last retrieved from the roster endpoint.
///
/// A stale roster always carries the records and the `valid_at` of the most
/// recent fresh roster, or nothing if there never was one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub records: Vec<DriverRecord>,
    pub valid_at: DateTime<Utc>,
    pub source: RosterSource,
}

impl Roster {
    pub fn fresh(records: Vec<DriverRecord>, valid_at: DateTime<Utc>) -> Self {
        Roster {
            records,
            valid_at,
            source: RosterSource::Fresh,
        }
    }

    /// The roster reported when polling failed before anything was ever obtained.
    pub fn empty_stale(valid_at: DateTime<Utc>) -> Self {
        Roster {
            records: vec![],
            valid_at,
            source: RosterSource::Stale,
        }
    }

    /// Returns a copy of this roster tagged [`RosterSource::Stale`].
    ///
    /// Records and `valid_at` are unchanged.
    pub fn to_stale(&self) -> Self {
        Roster {
            records: self.records.clone(),
            valid_at: self.valid_at,
            source: RosterSource::Stale,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.source == RosterSource::Stale
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn driver(&self, id: &str) -> Option<&DriverRecord> {
        self.records.iter().find(|d| d.id == id)
    }
}
