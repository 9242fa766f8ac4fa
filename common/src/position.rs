// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A thread-safe, reference-counted pointer to a [`Position`].
///
/// Fixes are immutable, so every consumer of a fix shares the same allocation.
pub type PositionPtr = Arc<Position>;

/// Represents a geographical coordinate with latitude and longitude.
///
/// The `Coordinate` struct is commonly used to store a point on Earth
/// in decimal degrees. Latitude values range from -90.0 to 90.0, and
/// longitude values range from -180.0 to 180.0.
///
/// # Example
///
/// ```rust
/// use common::position::Coordinate;
///
/// let pune = Coordinate::new(18.5204, 73.8567);
/// assert_eq!(pune.maps_url(), "https://www.google.com/maps?q=18.5204,73.8567");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate {
            latitude,
            longitude,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Link that opens the coordinate in a map application.
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }

    /// Returns `true` if both components are finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A single resolved position reading (a fix) reported by a positioning device.
///
/// A `Position` is never changed after creation. A newer fix from the same
/// source supersedes it instead.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    latitude: f64,
    longitude: f64,
    accuracy: f64,
    captured_at: DateTime<Utc>,
}

impl Position {
    /// Creates a new [`Position`].
    ///
    /// # Arguments
    ///
    /// * `latitude` – Latitude in decimal degrees. Positive for northern hemisphere.
    /// * `longitude` – Longitude in decimal degrees. Positive for eastern hemisphere.
    /// * `accuracy` – Radius of the uncertainty in meters. Negative or non finite
    ///   values are stored as `0.0`.
    /// * `captured_at` – Time the device resolved the fix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use common::position::Position;
    ///
    /// let pos = Position::new(18.5204, 73.8567, 12.0, chrono::Utc::now());
    /// assert_eq!(pos.accuracy(), 12.0);
    /// ```
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, captured_at: DateTime<Utc>) -> Self {
        let accuracy = if accuracy.is_finite() && accuracy > 0.0 {
            accuracy
        } else {
            0.0
        };
        Position {
            latitude,
            longitude,
            accuracy,
            captured_at,
        }
    }

    /// Like [`Position::new`] but rejects coordinates outside the WGS84 range.
    pub fn try_new(
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        captured_at: DateTime<Utc>,
    ) -> Option<Self> {
        if !Coordinate::new(latitude, longitude).is_valid() {
            return None;
        }
        Some(Position::new(latitude, longitude, accuracy, captured_at))
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Accuracy of the fix in meters, always `>= 0`.
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Age of the fix relative to `now`. A fix from the future has age zero.
    pub fn age(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.captured_at).to_std().unwrap_or_default()
    }
}

/// Authorization state of the device positioning capability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    /// Nobody asked yet, or the platform didn't tell.
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(&self) -> bool {
        *self == PermissionState::Granted
    }
}
