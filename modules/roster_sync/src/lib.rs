// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Roster synchronizer of the shuttle tracker
//!
//! Polls the driver roster and keeps the last good snapshot, so a failing
//! backend degrades to a stale roster instead of an empty screen.

pub mod endpoint;
pub mod synchronizer;

pub use endpoint::{FetchError, HttpRosterEndpoint, RosterEndpoint, TokenProvider};
pub use synchronizer::RosterSynchronizer;

use module_core::{Event, EventKind, Module, ModuleCtx};
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

/// Publishes the roster on the event bus.
///
/// The roster is fetched once at start, then polled periodically. Every
/// result is published as [`EventKind::RosterEvent`].
pub struct RosterModule {
    ctx: ModuleCtx,
    synchronizer: RosterSynchronizer,
    interval: Duration,
}

impl RosterModule {
    pub fn new(ctx: ModuleCtx, endpoint: Arc<dyn RosterEndpoint>, interval: Duration) -> Self {
        RosterModule {
            ctx,
            synchronizer: RosterSynchronizer::new(endpoint),
            interval,
        }
    }
}

#[async_trait::async_trait]
impl Module for RosterModule {
    async fn run(&mut self) -> Result<(), ()> {
        let mut run = true;
        let initial_fetch = self.synchronizer.fetch_once();
        tokio::pin!(initial_fetch);
        loop {
            tokio::select! {
                roster = &mut initial_fetch => {
                    let _ = self.ctx.publish_event(EventKind::RosterEvent(roster));
                    break;
                }
                event = self.ctx.receiver.recv() => {
                    if let Ok(Event { kind: EventKind::QuitEvent }) | Err(RecvError::Closed) = event {
                        run = false;
                        break;
                    }
                }
            }
        }

        if run {
            let sender = self.ctx.sender.clone();
            self.synchronizer.start(self.interval, move |roster| {
                let _ = sender.send(Event {
                    kind: EventKind::RosterEvent(roster),
                });
            });
        }

        while run {
            match self.ctx.receiver.recv().await {
                Ok(event) => {
                    if event.kind == EventKind::QuitEvent {
                        run = false;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    debug!("Roster module lagged behind by {} events", n)
                }
                Err(_) => run = false,
            }
        }

        self.synchronizer.stop();
        info!("Roster module stopped");
        Ok(())
    }
}
