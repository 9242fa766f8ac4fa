// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{
    driver::DriverRecord,
    position::{Coordinate, PositionPtr},
    roster::RosterPtr,
};
use serde::Serialize;

/// Anchor shown when neither a driver nor the viewer can be located (Pune, India).
pub const DEFAULT_ANCHOR: Coordinate = Coordinate {
    latitude: 18.5204,
    longitude: 73.8567,
};

/// State of the driver side location sharing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TrackingState {
    /// Sharing is off.
    #[default]
    Idle,
    /// Waiting for the permission answer.
    Requesting,
    /// A position watch is running.
    Active,
    /// Permission was refused. Toggling on again asks again.
    Denied,
}

/// Location sharing session of a driver.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSession {
    pub active: bool,
    /// The latest fix of the session. Kept after sharing is switched off.
    pub last_emitted_position: Option<PositionPtr>,
}

/// Origin of an [`Anchor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AnchorKind {
    /// The driver's own position, supplied by the publishing channel.
    DriverReported,
    /// A one-shot fix of the viewing device.
    ViewerFix,
    /// [`DEFAULT_ANCHOR`].
    Default,
}

/// The position chosen for display.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Anchor {
    pub coordinate: Coordinate,
    pub kind: AnchorKind,
}

impl Anchor {
    pub fn new(coordinate: Coordinate, kind: AnchorKind) -> Self {
        Anchor { coordinate, kind }
    }

    pub fn default_anchor() -> Self {
        Anchor::new(DEFAULT_ANCHOR, AnchorKind::Default)
    }
}

/// A roster entry together with the anchor it is displayed at, if any.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DriverAnchor {
    pub driver: DriverRecord,
    pub anchor: Option<Anchor>,
}

/// Everything the display layer needs to draw the viewer screen.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnchorView {
    pub roster: RosterPtr,
    pub drivers: Vec<DriverAnchor>,
    /// Set if and only if the roster is empty.
    pub fallback: Option<Anchor>,
}

/// A driver position delivered by the publishing channel.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverPosition {
    pub driver_id: String,
    pub position: PositionPtr,
}
