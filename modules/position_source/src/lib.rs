// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Position source of the shuttle tracker
//!
//! Wraps the positioning capability of the device: permission handling,
//! one-shot fixes and continuous position watches.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    position::{PermissionState, Position, PositionPtr},
    settings::Settings,
};
use std::{
    sync::{Arc, RwLock},
    time::Duration,
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod gpsd_locator;
pub mod simulated_locator;

/// Failures of a position request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The platform has no positioning capability.
    #[error("positioning is not available on this device")]
    Unavailable,
    /// The user or the platform refused the permission.
    #[error("permission to access the position was denied")]
    Denied,
    /// No fix arrived within the configured bound.
    #[error("no position fix within the timeout")]
    Timeout,
    /// A single reading failed. Watches keep running after this error.
    #[error("transient positioning failure: {0}")]
    Transient(String),
}

/// Options of a position request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionOptions {
    /// Maximum wall clock time to wait for a fix.
    pub timeout: Duration,
    /// A fix that is not older than this is served without asking the device.
    pub max_age: Duration,
    /// Trade latency for precision.
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        PositionOptions {
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(60),
            high_accuracy: true,
        }
    }
}

impl From<&Settings> for PositionOptions {
    fn from(settings: &Settings) -> Self {
        PositionOptions {
            timeout: settings.position_timeout,
            max_age: settings.max_position_age,
            high_accuracy: settings.high_accuracy,
        }
    }
}

/// Receiving end of a device subscription. Every item is a fix or a failed reading.
pub type FixReceiver = mpsc::Receiver<Result<Position, PositionError>>;

/// Common interface that every positioning capability of a device must support.
///
/// Implementations talk to the actual hardware or platform service. They
/// know nothing about drivers or the display.
#[async_trait]
pub trait DeviceLocator: Send + Sync {
    /// Returns the current authorization without asking the user.
    ///
    /// An error means the platform has no permission API.
    async fn permission(&self) -> Result<PermissionState, PositionError>;

    /// Asks for the permission. May wait for the user to answer.
    async fn request_permission(&self) -> PermissionState;

    /// Resolves a single fix. May wait indefinitely, callers bound the wait.
    async fn current_fix(&self, options: &PositionOptions) -> Result<Position, PositionError>;

    /// Starts continuous acquisition.
    ///
    /// The device stops producing fixes once the returned receiver is dropped.
    async fn subscribe(&self, options: &PositionOptions) -> Result<FixReceiver, PositionError>;
}

/// Subscription to continuous position updates.
///
/// The only operation is [`WatchHandle::cancel`]. Dropping the handle
/// cancels the watch as well.
#[derive(Debug)]
pub struct WatchHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stops the acquisition. Calling it again has no effect.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("Cancelling position watch");
        }
        self.token.cancel();
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The position source of the device.
///
/// A source without a [`DeviceLocator`] represents a platform without any
/// positioning capability. Every request on such a source fails with
/// [`PositionError::Unavailable`] and the permission reads as denied.
pub struct PositionSource {
    locator: Option<Arc<dyn DeviceLocator>>,
    /// Latest fix seen by a one-shot request or a watch.
    last_fix: Arc<RwLock<Option<Position>>>,
}

impl PositionSource {
    pub fn new(locator: Arc<dyn DeviceLocator>) -> Self {
        PositionSource {
            locator: Some(locator),
            last_fix: Arc::new(RwLock::new(None)),
        }
    }

    /// A source for a platform without positioning capability.
    pub fn unavailable() -> Self {
        PositionSource {
            locator: None,
            last_fix: Arc::new(RwLock::new(None)),
        }
    }

    pub fn is_available(&self) -> bool {
        self.locator.is_some()
    }

    /// Probes the current authorization.
    ///
    /// Fails closed: without a capability or a permission API the answer is
    /// [`PermissionState::Denied`].
    pub async fn query_permission(&self) -> PermissionState {
        let Some(locator) = &self.locator else {
            return PermissionState::Denied;
        };
        match locator.permission().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Permission query failed, treating as denied. Error: {}", e);
                PermissionState::Denied
            }
        }
    }

    /// Requests the permission, resolves to granted or denied.
    pub async fn request_permission(&self) -> PermissionState {
        let Some(locator) = &self.locator else {
            return PermissionState::Denied;
        };
        match locator.request_permission().await {
            PermissionState::Granted => PermissionState::Granted,
            state => {
                info!("Position permission not granted ({:?})", state);
                PermissionState::Denied
            }
        }
    }

    /// Returns a single fix.
    ///
    /// A fix held by the source that is not older than `options.max_age` is
    /// returned right away. Otherwise the device is asked and the call fails
    /// with [`PositionError::Timeout`] if it doesn't answer within
    /// `options.timeout`.
    pub async fn get_current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Position, PositionError> {
        let locator = self.authorized_locator().await?;
        if let Some(cached) = self.cached_fix(options.max_age, Utc::now()) {
            debug!("Serving cached fix captured at {}", cached.captured_at());
            return Ok(cached);
        }
        let position = match tokio::time::timeout(options.timeout, locator.current_fix(options)).await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!("No position fix within {:?}", options.timeout);
                return Err(PositionError::Timeout);
            }
        };
        store_fix(&self.last_fix, &position);
        Ok(position)
    }

    /// Starts a continuous watch.
    ///
    /// `on_update` is called for every new fix, in non decreasing order of
    /// capture time. Fixes older than the last delivered one are discarded.
    /// `on_error` is called for failed readings, the watch continues after
    /// them. Both callbacks run on the acquisition task and must not block.
    pub async fn watch_position<U, E>(
        &self,
        options: &PositionOptions,
        on_update: U,
        on_error: E,
    ) -> Result<WatchHandle, PositionError>
    where
        U: Fn(PositionPtr) + Send + 'static,
        E: Fn(PositionError) + Send + 'static,
    {
        let locator = self.authorized_locator().await?;
        let receiver = locator.subscribe(options).await?;
        let token = CancellationToken::new();
        let task = tokio::spawn(watch_task(
            receiver,
            token.clone(),
            self.last_fix.clone(),
            on_update,
            on_error,
        ));
        info!("Position watch started");
        Ok(WatchHandle { token, task })
    }

    /// Returns the locator if positioning is available and permitted.
    ///
    /// An undecided permission is requested first.
    async fn authorized_locator(&self) -> Result<&Arc<dyn DeviceLocator>, PositionError> {
        let Some(locator) = &self.locator else {
            return Err(PositionError::Unavailable);
        };
        let state = match self.query_permission().await {
            PermissionState::Unknown => self.request_permission().await,
            state => state,
        };
        if !state.is_granted() {
            return Err(PositionError::Denied);
        }
        Ok(locator)
    }

    fn cached_fix(&self, max_age: Duration, now: DateTime<Utc>) -> Option<Position> {
        let guard = self.last_fix.read().unwrap_or_else(|e| e.into_inner());
        (*guard).filter(|fix| fix.age(now) <= max_age)
    }
}

/// Replaces the stored fix unless it is newer than `position`.
fn store_fix(last_fix: &RwLock<Option<Position>>, position: &Position) {
    let mut guard = last_fix.write().unwrap_or_else(|e| e.into_inner());
    let holds_newer = guard.is_some_and(|stored| stored.captured_at() > position.captured_at());
    if !holds_newer {
        *guard = Some(*position);
    }
}

async fn watch_task<U, E>(
    mut receiver: FixReceiver,
    token: CancellationToken,
    last_fix: Arc<RwLock<Option<Position>>>,
    on_update: U,
    on_error: E,
) where
    U: Fn(PositionPtr) + Send + 'static,
    E: Fn(PositionError) + Send + 'static,
{
    let mut last_delivered: Option<DateTime<Utc>> = None;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            item = receiver.recv() => match item {
                Some(Ok(position)) => {
                    if let Some(previous) = last_delivered
                        && position.captured_at() < previous
                    {
                        debug!(
                            "Discarding out of order fix captured at {}",
                            position.captured_at()
                        );
                        continue;
                    }
                    last_delivered = Some(position.captured_at());
                    store_fix(&last_fix, &position);
                    on_update(Arc::new(position));
                }
                Some(Err(e)) => {
                    warn!("Position watch reading failed. Error: {}", e);
                    on_error(e);
                }
                None => {
                    info!("Device closed the position watch");
                    break;
                }
            }
        }
    }
}
