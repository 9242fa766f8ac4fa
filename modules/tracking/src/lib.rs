// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Tracking coordinator of the shuttle tracker
//!
//! Drives the location sharing of a driver and computes the display anchors
//! of a viewer from the roster and the known driver positions.

pub mod driver_tracker;
pub mod reconcile;

pub use driver_tracker::DriverTracker;
pub use reconcile::reconcile_anchors;

use common::{
    position::{Coordinate, PositionPtr},
    roster::RosterPtr,
    tracking::{AnchorView, DEFAULT_ANCHOR},
};
use module_core::{DriverPositionPtr, Event, EventKind, Module, ModuleCtx};
use position_source::{PositionOptions, PositionSource};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, info};

/// The role of the user of the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Shares its own position.
    Driver,
    /// Watches the drivers.
    Viewer,
}

/// Connects the position source and the roster to the display.
///
/// As [`Role::Driver`] it switches location sharing on
/// [`EventKind::ToggleTrackingEvent`] and publishes every state change and
/// every fix of the session. As [`Role::Viewer`] it publishes new display
/// anchors after every roster and driver position update.
///
/// A [`EventKind::QuitEvent`] is honoured while a permission request is
/// still open. Events that arrive during the request are handled afterwards.
pub struct TrackingCoordinator {
    ctx: ModuleCtx,
    role: Role,
    source: Arc<PositionSource>,
    options: PositionOptions,
    default_anchor: Coordinate,
    tracker: Option<DriverTracker>,
    roster: Option<RosterPtr>,
    remote_positions: HashMap<String, PositionPtr>,
    pending: VecDeque<Event>,
    fix_task: Option<JoinHandle<()>>,
}

impl TrackingCoordinator {
    pub fn new(
        ctx: ModuleCtx,
        role: Role,
        source: Arc<PositionSource>,
        options: PositionOptions,
    ) -> Self {
        let tracker = (role == Role::Driver).then(|| {
            let state_sender = ctx.sender.clone();
            let position_sender = ctx.sender.clone();
            DriverTracker::new(source.clone(), options)
                .with_state_observer(move |state, session| {
                    let _ = state_sender.send(Event {
                        kind: EventKind::TrackingStateEvent(state),
                    });
                    let _ = state_sender.send(Event {
                        kind: EventKind::TrackingSessionEvent(Arc::new(session.clone())),
                    });
                })
                .with_position_sink(move |position| {
                    let _ = position_sender.send(Event {
                        kind: EventKind::PositionEvent(position),
                    });
                })
        });
        TrackingCoordinator {
            ctx,
            role,
            source,
            options,
            default_anchor: DEFAULT_ANCHOR,
            tracker,
            roster: None,
            remote_positions: HashMap::new(),
            pending: VecDeque::new(),
            fix_task: None,
        }
    }

    /// Sets the anchor shown when neither a driver nor the viewer can be located.
    pub fn with_default_anchor(mut self, anchor: Coordinate) -> Self {
        self.default_anchor = anchor;
        self
    }

    /// Returns `false` if a quit arrived before the toggle completed.
    async fn on_toggle(&mut self, on: bool) -> bool {
        let Some(tracker) = self.tracker.as_mut() else {
            debug!("Ignoring tracking toggle, role {:?}", self.role);
            return true;
        };
        tokio::select! {
            _ = tracker.toggle(on) => true,
            _ = wait_for_quit(&mut self.ctx.receiver, &mut self.pending) => {
                info!("Quit while switching location sharing");
                false
            }
        }
    }

    fn on_roster(&mut self, roster: RosterPtr) {
        let before = self.remote_positions.len();
        self.remote_positions
            .retain(|id, _| roster.driver(id).is_some());
        if self.remote_positions.len() < before {
            debug!(
                "Forgot the positions of {} drivers no longer in the roster",
                before - self.remote_positions.len()
            );
        }
        self.roster = Some(roster);
        if self.role == Role::Viewer {
            self.publish_anchors();
        }
    }

    fn on_driver_position(&mut self, update: DriverPositionPtr) {
        let newer = self
            .remote_positions
            .get(&update.driver_id)
            .is_none_or(|known| known.captured_at() <= update.position.captured_at());
        if !newer {
            debug!("Ignoring outdated position of driver {}", update.driver_id);
            return;
        }
        self.remote_positions
            .insert(update.driver_id.clone(), update.position.clone());
        let has_drivers = self.roster.as_ref().is_some_and(|r| !r.is_empty());
        if self.role == Role::Viewer && has_drivers {
            self.publish_anchors();
        }
    }

    /// Publishes the anchors of the current roster.
    ///
    /// An empty roster needs the viewer's own fix, which is resolved on a
    /// separate task. A newer roster supersedes a fix still in flight.
    fn publish_anchors(&mut self) {
        let Some(roster) = self.roster.clone() else {
            return;
        };
        self.cancel_fix_task();

        if !roster.is_empty() {
            let view = reconcile_anchors(&roster, &self.remote_positions, None, self.default_anchor);
            send_anchors(&self.ctx.sender, view);
            return;
        }

        let source = self.source.clone();
        let options = self.options;
        let default_anchor = self.default_anchor;
        let sender = self.ctx.sender.clone();
        self.fix_task = Some(tokio::spawn(async move {
            let fix = source.get_current_position(&options).await;
            let view = reconcile_anchors(&roster, &HashMap::new(), Some(&fix), default_anchor);
            send_anchors(&sender, view);
        }));
    }

    fn cancel_fix_task(&mut self) {
        if let Some(task) = self.fix_task.take() {
            task.abort();
        }
    }
}

fn send_anchors(sender: &broadcast::Sender<Event>, view: AnchorView) {
    let _ = sender.send(Event {
        kind: EventKind::AnchorsEvent(Arc::new(view)),
    });
}

/// Receives until a quit, queueing every other event in `pending`.
async fn wait_for_quit(receiver: &mut broadcast::Receiver<Event>, pending: &mut VecDeque<Event>) {
    loop {
        match receiver.recv().await {
            Ok(event) => match event.kind {
                EventKind::QuitEvent => return,
                _ => pending.push_back(event),
            },
            Err(RecvError::Lagged(n)) => debug!("Coordinator lagged behind by {} events", n),
            Err(RecvError::Closed) => return,
        }
    }
}

#[async_trait::async_trait]
impl Module for TrackingCoordinator {
    async fn run(&mut self) -> Result<(), ()> {
        if let Some(tracker) = &self.tracker {
            let _ = self
                .ctx
                .publish_event(EventKind::TrackingStateEvent(tracker.state()));
        }

        let mut run = true;
        while run {
            let event = match self.pending.pop_front() {
                Some(event) => Ok(event),
                None => self.ctx.receiver.recv().await,
            };
            match event {
                Ok(event) => match event.kind {
                    EventKind::QuitEvent => run = false,
                    EventKind::ToggleTrackingEvent(on) => run = self.on_toggle(on).await,
                    EventKind::RosterEvent(roster) => self.on_roster(roster),
                    EventKind::DriverPositionEvent(update) => self.on_driver_position(update),
                    _ => (),
                },
                Err(RecvError::Lagged(n)) => debug!("Coordinator lagged behind by {} events", n),
                Err(RecvError::Closed) => run = false,
            }
        }

        self.cancel_fix_task();
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.toggle_off();
        }
        info!("Tracking coordinator stopped");
        Ok(())
    }
}
