// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use common::tracking::AnchorView;
use module_core::{EventKind, Module, ModuleCtx};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// Stand-in for a screen, logs everything a display would render.
pub struct DisplayLog {
    ctx: ModuleCtx,
}

impl DisplayLog {
    pub fn new(ctx: ModuleCtx) -> Self {
        DisplayLog { ctx }
    }

    fn show_anchors(view: &AnchorView) {
        for entry in &view.drivers {
            let driver = &entry.driver;
            match &entry.anchor {
                Some(anchor) => info!(
                    "{} ({:?}) route: {} phone: {} at {}",
                    driver.name,
                    driver.status,
                    driver.route,
                    driver.phone,
                    anchor.coordinate.maps_url()
                ),
                None => info!(
                    "{} ({:?}) route: {} phone: {}, position unknown",
                    driver.name, driver.status, driver.route, driver.phone
                ),
            }
        }
        if let Some(fallback) = &view.fallback {
            info!(
                "No drivers available, showing {:?} anchor {}",
                fallback.kind,
                fallback.coordinate.maps_url()
            );
        }
    }
}

#[async_trait::async_trait]
impl Module for DisplayLog {
    async fn run(&mut self) -> Result<(), ()> {
        let mut run = true;
        while run {
            match self.ctx.receiver.recv().await {
                Ok(event) => match event.kind {
                    EventKind::QuitEvent => run = false,
                    EventKind::RosterEvent(roster) => {
                        if roster.is_stale() {
                            info!(
                                "Roster of {} drivers, outdated since {}",
                                roster.len(),
                                roster.valid_at
                            );
                        } else {
                            info!("Roster of {} drivers", roster.len());
                        }
                    }
                    EventKind::TrackingStateEvent(state) => info!("Location sharing {:?}", state),
                    EventKind::TrackingSessionEvent(session) => {
                        debug!("Session active: {}", session.active)
                    }
                    EventKind::PositionEvent(position) => info!(
                        "Sharing position {} (accuracy {:.1} m)",
                        position.coordinate().maps_url(),
                        position.accuracy()
                    ),
                    EventKind::AnchorsEvent(view) => DisplayLog::show_anchors(&view),
                    _ => (),
                },
                Err(RecvError::Lagged(n)) => debug!("Display lagged behind by {} events", n),
                Err(RecvError::Closed) => run = false,
            }
        }
        Ok(())
    }
}
