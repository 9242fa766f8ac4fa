// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use common::{
    position::{Coordinate, Position, PositionPtr},
    roster::RosterPtr,
    tracking::{Anchor, AnchorKind, AnchorView, DriverAnchor},
};
use position_source::PositionError;
use std::collections::HashMap;

/// Computes what the viewer screen shows for `roster`.
///
/// Every driver is anchored at the position its publishing channel reported
/// for it, or not at all. An empty roster gets a fallback anchor so the
/// screen is never blank: the viewer's own fix, or `default_anchor` if the
/// fix failed or wasn't taken.
///
/// The viewer fix only matters for an empty roster, callers should only
/// acquire it in that case.
pub fn reconcile_anchors(
    roster: &RosterPtr,
    remote_positions: &HashMap<String, PositionPtr>,
    viewer_fix: Option<&Result<Position, PositionError>>,
    default_anchor: Coordinate,
) -> AnchorView {
    let drivers = roster
        .records
        .iter()
        .map(|driver| DriverAnchor {
            driver: driver.clone(),
            anchor: remote_positions
                .get(&driver.id)
                .map(|position| Anchor::new(position.coordinate(), AnchorKind::DriverReported)),
        })
        .collect();

    let fallback = roster.is_empty().then(|| match viewer_fix {
        Some(Ok(fix)) => Anchor::new(fix.coordinate(), AnchorKind::ViewerFix),
        _ => Anchor::new(default_anchor, AnchorKind::Default),
    });

    AnchorView {
        roster: roster.clone(),
        drivers,
        fallback,
    }
}
