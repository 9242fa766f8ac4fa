// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use common::{
    position::{PermissionState, PositionPtr},
    tracking::{TrackingSession, TrackingState},
};
use position_source::{PositionError, PositionOptions, PositionSource, WatchHandle};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Called on every state change with the new state and the session at that moment.
pub type StateObserver = Box<dyn Fn(TrackingState, &TrackingSession) + Send + Sync>;

/// Receives every fix of an active session.
pub type PositionSink = Arc<dyn Fn(PositionPtr) + Send + Sync>;

/// Location sharing of a driver.
///
/// ```text
/// Idle --on--> Requesting --granted--> Active --off--> Idle
///                   |
///                   +--denied / watch refused--> Denied --on--> Requesting
/// ```
///
/// Switching on while `Requesting` or `Active` and switching off while
/// `Idle` does nothing. Switching off while `Denied` returns to `Idle`.
pub struct DriverTracker {
    source: Arc<PositionSource>,
    options: PositionOptions,
    state: TrackingState,
    session: Arc<RwLock<TrackingSession>>,
    watch: Option<WatchHandle>,
    on_state: StateObserver,
    on_position: PositionSink,
}

impl DriverTracker {
    pub fn new(source: Arc<PositionSource>, options: PositionOptions) -> Self {
        DriverTracker {
            source,
            options,
            state: TrackingState::Idle,
            session: Arc::new(RwLock::new(TrackingSession::default())),
            watch: None,
            on_state: Box::new(|_, _| ()),
            on_position: Arc::new(|_| ()),
        }
    }

    pub fn with_state_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(TrackingState, &TrackingSession) + Send + Sync + 'static,
    {
        self.on_state = Box::new(observer);
        self
    }

    /// Sets the receiver of the session fixes, i.e. the publishing channel.
    pub fn with_position_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(PositionPtr) + Send + Sync + 'static,
    {
        self.on_position = Arc::new(sink);
        self
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// Returns a snapshot of the session.
    pub fn session(&self) -> TrackingSession {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn toggle(&mut self, on: bool) -> TrackingState {
        if on {
            self.toggle_on().await
        } else {
            self.toggle_off()
        }
    }

    /// Switches location sharing on.
    ///
    /// Asks for the permission and starts a position watch if it is granted.
    /// A permission request that isn't answered within the position timeout
    /// counts as denied.
    pub async fn toggle_on(&mut self) -> TrackingState {
        if matches!(self.state, TrackingState::Requesting | TrackingState::Active) {
            debug!("Location sharing already {:?}", self.state);
            return self.state;
        }
        self.transition(TrackingState::Requesting);

        let answer =
            match tokio::time::timeout(self.options.timeout, self.source.request_permission())
                .await
            {
                Ok(answer) => answer,
                Err(_) => {
                    warn!(
                        "No answer to the location permission request within {:?}",
                        self.options.timeout
                    );
                    PermissionState::Denied
                }
            };
        if answer != PermissionState::Granted {
            info!("Location permission denied");
            self.transition(TrackingState::Denied);
            return self.state;
        }

        let session = self.session.clone();
        let sink = self.on_position.clone();
        let on_update = move |position: PositionPtr| {
            session
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .last_emitted_position = Some(position.clone());
            sink(position);
        };
        let on_error = |e: PositionError| debug!("Session fix failed: {}", e);

        match self
            .source
            .watch_position(&self.options, on_update, on_error)
            .await
        {
            Ok(handle) => {
                self.watch = Some(handle);
                self.set_active(true);
                self.transition(TrackingState::Active);
            }
            Err(e) => {
                warn!("Position watch refused after permission grant. Error: {}", e);
                self.transition(TrackingState::Denied);
            }
        }
        self.state
    }

    /// Switches location sharing off.
    ///
    /// The last emitted position of the session is kept.
    pub fn toggle_off(&mut self) -> TrackingState {
        if self.state == TrackingState::Idle {
            return self.state;
        }
        if let Some(watch) = self.watch.take() {
            watch.cancel();
        }
        self.set_active(false);
        self.transition(TrackingState::Idle);
        self.state
    }

    fn set_active(&self, active: bool) {
        self.session
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .active = active;
    }

    fn transition(&mut self, next: TrackingState) {
        debug!("Tracking state {:?} -> {:?}", self.state, next);
        self.state = next;
        let session = self.session();
        (self.on_state)(next, &session);
    }
}
