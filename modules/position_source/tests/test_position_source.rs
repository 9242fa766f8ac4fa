// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use async_trait::async_trait;
use chrono::Utc;
use common::{
    position::{PermissionState, Position, PositionPtr},
    test_helper::position::get_position_at,
};
use position_source::{
    DeviceLocator, FixReceiver, PositionError, PositionOptions, PositionSource,
};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    time::timeout,
};

type Reading = Result<Position, PositionError>;

/// Scripted locator. One-shot fixes come from `fix`, watch readings are fed
/// through the sender returned by [`FakeLocator::new`].
struct FakeLocator {
    permission: Mutex<Result<PermissionState, PositionError>>,
    request_answer: PermissionState,
    fix: Option<Position>,
    fix_calls: AtomicUsize,
    requests: AtomicUsize,
    feed: Mutex<Option<FixReceiver>>,
}

impl FakeLocator {
    fn new(permission: PermissionState) -> (FakeLocator, mpsc::Sender<Reading>) {
        let (tx, rx) = mpsc::channel(16);
        let locator = FakeLocator {
            permission: Mutex::new(Ok(permission)),
            request_answer: PermissionState::Granted,
            fix: Some(get_position_at(18.5204, 73.8567, 0)),
            fix_calls: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            feed: Mutex::new(Some(rx)),
        };
        (locator, tx)
    }
}

#[async_trait]
impl DeviceLocator for FakeLocator {
    async fn permission(&self) -> Result<PermissionState, PositionError> {
        self.permission.lock().unwrap().clone()
    }

    async fn request_permission(&self) -> PermissionState {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock().unwrap() = Ok(self.request_answer);
        self.request_answer
    }

    async fn current_fix(&self, _options: &PositionOptions) -> Result<Position, PositionError> {
        self.fix_calls.fetch_add(1, Ordering::SeqCst);
        match self.fix {
            Some(fix) => Ok(fix),
            None => std::future::pending().await,
        }
    }

    async fn subscribe(&self, _options: &PositionOptions) -> Result<FixReceiver, PositionError> {
        self.feed
            .lock()
            .unwrap()
            .take()
            .ok_or(PositionError::Unavailable)
    }
}

fn fresh_options() -> PositionOptions {
    PositionOptions {
        timeout: Duration::from_millis(100),
        max_age: Duration::ZERO,
        high_accuracy: true,
    }
}

fn collecting_callbacks() -> (
    impl Fn(PositionPtr) + Send + 'static,
    impl Fn(PositionError) + Send + 'static,
    UnboundedReceiver<PositionPtr>,
    UnboundedReceiver<PositionError>,
) {
    let (pos_tx, pos_rx) = mpsc::unbounded_channel();
    let (err_tx, err_rx) = mpsc::unbounded_channel();
    (
        move |pos| {
            let _ = pos_tx.send(pos);
        },
        move |e| {
            let _ = err_tx.send(e);
        },
        pos_rx,
        err_rx,
    )
}

async fn next<T>(rx: &mut UnboundedReceiver<T>) -> T {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("nothing received in time")
        .expect("channel closed")
}

#[test_log::test(tokio::test)]
async fn unavailable_source_fails_every_request() {
    let source = PositionSource::unavailable();
    assert!(!source.is_available());
    assert_eq!(source.query_permission().await, PermissionState::Denied);
    assert_eq!(source.request_permission().await, PermissionState::Denied);
    assert_eq!(
        source.get_current_position(&fresh_options()).await,
        Err(PositionError::Unavailable)
    );
    let (on_update, on_error, _, _) = collecting_callbacks();
    let result = source
        .watch_position(&fresh_options(), on_update, on_error)
        .await;
    assert_eq!(result.err(), Some(PositionError::Unavailable));
}

#[test_log::test(tokio::test)]
async fn missing_permission_api_reads_as_denied() {
    let (locator, _tx) = FakeLocator::new(PermissionState::Granted);
    *locator.permission.lock().unwrap() = Err(PositionError::Unavailable);
    let source = PositionSource::new(Arc::new(locator));
    assert_eq!(source.query_permission().await, PermissionState::Denied);
}

#[test_log::test(tokio::test)]
async fn denied_permission_fails_with_denied() {
    let (locator, _tx) = FakeLocator::new(PermissionState::Denied);
    let locator = Arc::new(locator);
    let source = PositionSource::new(locator.clone());
    assert_eq!(
        source.get_current_position(&fresh_options()).await,
        Err(PositionError::Denied)
    );
    assert_eq!(locator.fix_calls.load(Ordering::SeqCst), 0);
    assert_eq!(locator.requests.load(Ordering::SeqCst), 0);
}

#[test_log::test(tokio::test)]
async fn unknown_permission_is_requested_first() {
    let (locator, _tx) = FakeLocator::new(PermissionState::Unknown);
    let locator = Arc::new(locator);
    let source = PositionSource::new(locator.clone());

    let fix = source.get_current_position(&fresh_options()).await;

    assert_eq!(fix, Ok(get_position_at(18.5204, 73.8567, 0)));
    assert_eq!(locator.requests.load(Ordering::SeqCst), 1);
    assert_eq!(source.query_permission().await, PermissionState::Granted);
}

#[test_log::test(tokio::test)]
async fn refused_request_resolves_to_denied() {
    let (mut locator, _tx) = FakeLocator::new(PermissionState::Unknown);
    locator.request_answer = PermissionState::Unknown;
    let source = PositionSource::new(Arc::new(locator));
    assert_eq!(source.request_permission().await, PermissionState::Denied);
}

#[test_log::test(tokio::test)]
async fn silent_device_times_out() {
    let (mut locator, _tx) = FakeLocator::new(PermissionState::Granted);
    locator.fix = None;
    let source = PositionSource::new(Arc::new(locator));
    let started = tokio::time::Instant::now();

    let fix = source.get_current_position(&fresh_options()).await;

    assert_eq!(fix, Err(PositionError::Timeout));
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test_log::test(tokio::test)]
async fn recent_fix_is_served_from_cache() {
    let now_fix = Position::new(18.5204, 73.8567, 5.0, Utc::now());
    let (mut locator, _tx) = FakeLocator::new(PermissionState::Granted);
    locator.fix = Some(now_fix);
    let locator = Arc::new(locator);
    let source = PositionSource::new(locator.clone());

    let first = source.get_current_position(&fresh_options()).await;
    let cached = source
        .get_current_position(&PositionOptions {
            max_age: Duration::from_secs(60),
            ..fresh_options()
        })
        .await;
    assert_eq!(first, Ok(now_fix));
    assert_eq!(cached, Ok(now_fix));
    assert_eq!(locator.fix_calls.load(Ordering::SeqCst), 1);

    let _ = source.get_current_position(&fresh_options()).await;
    assert_eq!(locator.fix_calls.load(Ordering::SeqCst), 2);
}

#[test_log::test(tokio::test)]
async fn watch_delivers_fixes_in_order() {
    let (locator, tx) = FakeLocator::new(PermissionState::Granted);
    let source = PositionSource::new(Arc::new(locator));
    let (on_update, on_error, mut positions, _) = collecting_callbacks();
    let handle = source
        .watch_position(&fresh_options(), on_update, on_error)
        .await
        .expect("watch not started");

    tx.send(Ok(get_position_at(18.5196, 73.8553, 1))).await.unwrap();
    tx.send(Ok(get_position_at(18.5204, 73.8567, 2))).await.unwrap();

    assert_eq!(*next(&mut positions).await, get_position_at(18.5196, 73.8553, 1));
    assert_eq!(*next(&mut positions).await, get_position_at(18.5204, 73.8567, 2));
    handle.cancel();
}

#[test_log::test(tokio::test)]
async fn watch_continues_after_failed_reading() {
    let (locator, tx) = FakeLocator::new(PermissionState::Granted);
    let source = PositionSource::new(Arc::new(locator));
    let (on_update, on_error, mut positions, mut errors) = collecting_callbacks();
    let handle = source
        .watch_position(&fresh_options(), on_update, on_error)
        .await
        .expect("watch not started");

    tx.send(Err(PositionError::Transient("no signal".into())))
        .await
        .unwrap();
    tx.send(Ok(get_position_at(18.5204, 73.8567, 1))).await.unwrap();

    assert_eq!(
        next(&mut errors).await,
        PositionError::Transient("no signal".into())
    );
    assert_eq!(*next(&mut positions).await, get_position_at(18.5204, 73.8567, 1));
    assert!(!handle.is_cancelled());
}

#[test_log::test(tokio::test)]
async fn out_of_order_fix_is_discarded() {
    let (locator, tx) = FakeLocator::new(PermissionState::Granted);
    let source = PositionSource::new(Arc::new(locator));
    let (on_update, on_error, mut positions, _) = collecting_callbacks();
    let _handle = source
        .watch_position(&fresh_options(), on_update, on_error)
        .await
        .expect("watch not started");

    tx.send(Ok(get_position_at(18.5204, 73.8567, 10))).await.unwrap();
    tx.send(Ok(get_position_at(18.5196, 73.8553, 5))).await.unwrap();
    tx.send(Ok(get_position_at(18.5215, 73.8579, 10))).await.unwrap();

    assert_eq!(*next(&mut positions).await, get_position_at(18.5204, 73.8567, 10));
    assert_eq!(*next(&mut positions).await, get_position_at(18.5215, 73.8579, 10));
    assert!(positions.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn cancel_is_idempotent_and_stops_updates() {
    let (locator, tx) = FakeLocator::new(PermissionState::Granted);
    let source = PositionSource::new(Arc::new(locator));
    let (on_update, on_error, mut positions, _) = collecting_callbacks();
    let handle = source
        .watch_position(&fresh_options(), on_update, on_error)
        .await
        .expect("watch not started");

    tx.send(Ok(get_position_at(18.5204, 73.8567, 1))).await.unwrap();
    let _ = next(&mut positions).await;

    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());

    let _ = tx.send(Ok(get_position_at(18.5215, 73.8579, 2))).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(positions.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn dropping_the_handle_releases_the_device() {
    let (locator, tx) = FakeLocator::new(PermissionState::Granted);
    let source = PositionSource::new(Arc::new(locator));
    let (on_update, on_error, _, _) = collecting_callbacks();
    let handle = source
        .watch_position(&fresh_options(), on_update, on_error)
        .await
        .expect("watch not started");

    drop(handle);

    timeout(Duration::from_millis(200), tx.closed())
        .await
        .expect("device subscription still open after drop");
}

#[test_log::test(tokio::test)]
async fn watch_fix_feeds_the_cache() {
    let now_fix = Position::new(18.5204, 73.8567, 5.0, Utc::now());
    let (mut locator, tx) = FakeLocator::new(PermissionState::Granted);
    locator.fix = None;
    let source = PositionSource::new(Arc::new(locator));
    let (on_update, on_error, mut positions, _) = collecting_callbacks();
    let _handle = source
        .watch_position(&fresh_options(), on_update, on_error)
        .await
        .expect("watch not started");

    tx.send(Ok(now_fix)).await.unwrap();
    let _ = next(&mut positions).await;

    let cached = source
        .get_current_position(&PositionOptions {
            max_age: Duration::from_secs(60),
            ..fresh_options()
        })
        .await;
    assert_eq!(cached, Ok(now_fix));
}
