// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use async_trait::async_trait;
use common::{driver::RawDriverRecord, test_helper::roster::get_roster_as_json};
use roster_sync::{FetchError, RosterEndpoint};
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

pub type FetchResult = Result<Vec<RawDriverRecord>, FetchError>;

/// Endpoint that answers from a script. Once the script is used up every
/// fetch fails with a transport error.
#[derive(Default)]
pub struct FakeEndpoint {
    script: Mutex<VecDeque<FetchResult>>,
    delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeEndpoint {
    pub fn new(script: Vec<FetchResult>) -> Self {
        FakeEndpoint {
            script: Mutex::new(script.into()),
            ..FakeEndpoint::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RosterEndpoint for FakeEndpoint {
    async fn fetch(&self) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("offline".to_string())))
    }
}

pub fn roster_payload() -> FetchResult {
    Ok(RawDriverRecord::list_from_json(get_roster_as_json()).unwrap())
}

pub fn offline() -> FetchResult {
    Err(FetchError::Transport("offline".to_string()))
}
