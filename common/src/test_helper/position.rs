// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::position::{Coordinate, Position};
use chrono::{DateTime, TimeZone, Utc};

/// Fixed reference time used by the test fixtures (2026-01-05 08:00:00 UTC).
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A fix `seconds` after [`reference_time`].
pub fn get_position_at(latitude: f64, longitude: f64, seconds: i64) -> Position {
    Position::new(
        latitude,
        longitude,
        5.0,
        reference_time() + chrono::Duration::seconds(seconds),
    )
}

/// A short shuttle route across the campus.
pub fn get_route() -> Vec<Coordinate> {
    vec![
        Coordinate::new(18.5196, 73.8553),
        Coordinate::new(18.5204, 73.8567),
        Coordinate::new(18.5215, 73.8579),
    ]
}
