// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::endpoint::{FetchError, RosterEndpoint};
use chrono::{DateTime, Utc};
use common::{
    driver::{RawDriverRecord, normalize_records},
    roster::{Roster, RosterPtr},
};
use std::{
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type FetchResult = Result<Vec<RawDriverRecord>, FetchError>;

#[derive(Default)]
struct RosterState {
    /// Most recent fresh roster.
    last_good: Option<RosterPtr>,
    /// Most recent roster handed out, fresh or stale.
    current: Option<RosterPtr>,
}

/// Turns the outcome of a fetch into the roster to report.
///
/// A failed fetch reports the last fresh roster tagged stale, or an empty
/// stale roster if there never was a fresh one. The last fresh roster is
/// only ever replaced by a newer fresh one.
fn apply_result(state: &RwLock<RosterState>, result: FetchResult) -> RosterPtr {
    let mut state = state.write().unwrap_or_else(|e| e.into_inner());
    let roster = match result {
        Ok(raw) => {
            let roster = Arc::new(Roster::fresh(normalize_records(raw), Utc::now()));
            info!("Roster updated with {} drivers", roster.len());
            state.last_good = Some(roster.clone());
            roster
        }
        Err(e) => {
            warn!("Roster fetch failed, keeping the last roster. Error: {}", e);
            match &state.last_good {
                Some(last_good) => Arc::new(last_good.to_stale()),
                None => Arc::new(Roster::empty_stale(DateTime::<Utc>::UNIX_EPOCH)),
            }
        }
    };
    state.current = Some(roster.clone());
    roster
}

/// Open while the poll loop may hand out results. Delivery happens with the
/// gate locked, so closing it waits for a delivery in progress.
type DeliveryGate = Arc<Mutex<bool>>;

struct Poller {
    token: CancellationToken,
    gate: DeliveryGate,
    task: JoinHandle<()>,
}

impl Poller {
    /// Ends the poll loop. No result is delivered once this returns.
    fn shut_down(self) {
        self.token.cancel();
        *self.gate.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }
}

/// Keeps the driver roster up to date by polling a [`RosterEndpoint`].
///
/// The synchronizer owns its polling task. Stopping it or dropping the
/// synchronizer ends the task, there is no global timer.
pub struct RosterSynchronizer {
    endpoint: Arc<dyn RosterEndpoint>,
    state: Arc<RwLock<RosterState>>,
    poller: Mutex<Option<Poller>>,
}

impl RosterSynchronizer {
    pub fn new(endpoint: Arc<dyn RosterEndpoint>) -> Self {
        RosterSynchronizer {
            endpoint,
            state: Arc::new(RwLock::new(RosterState::default())),
            poller: Mutex::new(None),
        }
    }

    /// Starts polling every `interval`.
    ///
    /// `on_update` is called with the resulting roster after every completed
    /// fetch, successful or not. The first fetch happens one `interval` after
    /// the start. A running poll loop is stopped and replaced.
    ///
    /// `on_update` must not call back into the synchronizer.
    pub fn start<F>(&self, interval: Duration, on_update: F)
    where
        F: Fn(RosterPtr) + Send + Sync + 'static,
    {
        let interval = if interval.is_zero() {
            warn!("Roster poll interval of zero requested, polling every millisecond");
            Duration::from_millis(1)
        } else {
            interval
        };
        let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = poller.take() {
            debug!("Restarting roster polling");
            old.shut_down();
        }
        let token = CancellationToken::new();
        let gate = Arc::new(Mutex::new(true));
        let task = tokio::spawn(poll_loop(
            self.endpoint.clone(),
            self.state.clone(),
            interval,
            on_update,
            token.clone(),
            gate.clone(),
        ));
        info!("Roster polling started, interval {:?}", interval);
        *poller = Some(Poller { token, gate, task });
    }

    /// Stops polling.
    ///
    /// A fetch in flight isn't interrupted, but its result is dropped. If a
    /// result is being delivered right now, the call waits for it, so no
    /// `on_update` starts after `stop` returned. Stopping a stopped
    /// synchronizer does nothing.
    pub fn stop(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(poller) = poller.take() {
            poller.shut_down();
            info!("Roster polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        let poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        poller
            .as_ref()
            .is_some_and(|p| !p.token.is_cancelled() && !p.task.is_finished())
    }

    /// Fetches the roster right now, independent of the poll loop.
    ///
    /// The same failure policy as for polling applies.
    pub async fn fetch_once(&self) -> RosterPtr {
        let result = self.endpoint.fetch().await;
        apply_result(&self.state, result)
    }

    /// Returns the roster handed out last, if any fetch has completed yet.
    pub fn last_roster(&self) -> Option<RosterPtr> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .current
            .clone()
    }
}

impl Drop for RosterSynchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop<F>(
    endpoint: Arc<dyn RosterEndpoint>,
    state: Arc<RwLock<RosterState>>,
    interval: Duration,
    on_update: F,
    token: CancellationToken,
    gate: DeliveryGate,
) where
    F: Fn(RosterPtr) + Send + Sync + 'static,
{
    let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let (done_tx, mut done_rx) = mpsc::channel::<FetchResult>(1);
    let mut in_flight = false;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            Some(result) = done_rx.recv() => {
                in_flight = false;
                let open = gate.lock().unwrap_or_else(|e| e.into_inner());
                if !*open {
                    break;
                }
                on_update(apply_result(&state, result));
            }
            _ = timer.tick() => {
                if in_flight {
                    debug!("Previous roster fetch still running, skipping tick");
                } else {
                    in_flight = true;
                    let endpoint = endpoint.clone();
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        let _ = done_tx.send(endpoint.fetch().await).await;
                    });
                }
            }
        }
    }
    debug!("Roster poll loop finished");
}
