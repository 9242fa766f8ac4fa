// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{DeviceLocator, FixReceiver, PositionError, PositionOptions};
use async_trait::async_trait;
use chrono::Utc;
use common::position::{Coordinate, PermissionState, Position};
use std::{
    io::{Error, ErrorKind},
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use utm::{lat_lon_to_zone_number, lat_to_zone_letter, to_utm_wgs84, wsg84_utm_to_lat_lon};

#[derive(Debug, Clone, Copy, Default)]
struct UtmPoint {
    easting: f64,
    northing: f64,
}

/// UTM zone the whole route is projected into.
#[derive(Debug, Clone, Copy)]
struct UtmZone {
    number: u8,
    letter: char,
}

fn convert_route(route: &[Coordinate]) -> Result<(UtmZone, Vec<UtmPoint>), Error> {
    let first = route
        .first()
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "route parameter is empty"))?;
    let number = lat_lon_to_zone_number(first.latitude, first.longitude);
    let letter = lat_to_zone_letter(first.latitude).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!(
                "Position lat: {}, long: {} can't be converted to a UTM zone",
                first.latitude, first.longitude
            ),
        )
    })?;
    let mut points = Vec::with_capacity(route.len());
    for coordinate in route {
        if !coordinate.is_valid() {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Invalid route coordinate {:?}", coordinate),
            ));
        }
        let (northing, easting, _) = to_utm_wgs84(coordinate.latitude, coordinate.longitude, number);
        points.push(UtmPoint { easting, northing });
    }
    Ok((UtmZone { number, letter }, points))
}

/// Moves a simulated device along the route with a constant velocity.
struct RouteRuntime {
    zone: UtmZone,
    points: Vec<UtmPoint>,
    current: UtmPoint,
    next_point: usize,
    velocity: f64,
}

impl RouteRuntime {
    /// Advances the device by `elapsed` and returns the new coordinate.
    ///
    /// The route is driven in a loop. Waypoints are never skipped, a step that
    /// would pass a waypoint ends on it.
    fn advance(&mut self, elapsed: Duration) -> Option<Coordinate> {
        if self.points.len() > 1 {
            let target = self.points[self.next_point];
            let dx = target.easting - self.current.easting;
            let dy = target.northing - self.current.northing;
            let remaining = (dx * dx + dy * dy).sqrt();
            let step = self.velocity * elapsed.as_secs_f64();
            if step >= remaining {
                self.current = target;
                self.next_point = (self.next_point + 1) % self.points.len();
            } else {
                self.current.easting += dx / remaining * step;
                self.current.northing += dy / remaining * step;
            }
        }
        self.coordinate()
    }

    fn coordinate(&self) -> Option<Coordinate> {
        let (latitude, longitude) = wsg84_utm_to_lat_lon(
            self.current.easting,
            self.current.northing,
            self.zone.number,
            self.zone.letter,
        )
        .ok()?;
        Some(Coordinate::new(latitude, longitude))
    }
}

/// A device that drives a fixed route.
///
/// The permission state, the answer to a permission request and the fix
/// latency are configurable, which makes it usable for demos without
/// hardware and for tests.
pub struct SimulatedLocator {
    runtime: Arc<Mutex<RouteRuntime>>,
    interval: Duration,
    accuracy: f64,
    permission: RwLock<PermissionState>,
    request_answer: PermissionState,
    fix_delay: Option<Duration>,
    error_every: Option<usize>,
}

impl SimulatedLocator {
    /// Creates a device that drives `route` with `velocity` m/s and reports
    /// a fix every `interval`.
    ///
    /// The permission starts as [`PermissionState::Granted`].
    pub fn new(route: &[Coordinate], velocity: f64, interval: Duration) -> Result<Self, Error> {
        let (zone, points) = convert_route(route)?;
        let current = points[0];
        let next_point = if points.len() > 1 { 1 } else { 0 };
        Ok(SimulatedLocator {
            runtime: Arc::new(Mutex::new(RouteRuntime {
                zone,
                points,
                current,
                next_point,
                velocity,
            })),
            interval,
            accuracy: 5.0,
            permission: RwLock::new(PermissionState::Granted),
            request_answer: PermissionState::Granted,
            fix_delay: Some(Duration::ZERO),
            error_every: None,
        })
    }

    /// Sets the current permission and the answer a permission request resolves to.
    pub fn with_permission(mut self, current: PermissionState, answer: PermissionState) -> Self {
        self.permission = RwLock::new(current);
        self.request_answer = answer;
        self
    }

    /// Sets how long a one-shot fix takes. `None` never resolves a fix.
    pub fn with_fix_delay(mut self, delay: Option<Duration>) -> Self {
        self.fix_delay = delay;
        self
    }

    /// Reports a failed reading instead of every `n`-th fix of a subscription.
    pub fn with_error_every(mut self, n: usize) -> Self {
        self.error_every = (n > 0).then_some(n);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Changes the permission from outside, like a user editing the system settings.
    pub fn set_permission(&self, state: PermissionState) {
        *self.permission.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn fix_at(&self, coordinate: Coordinate) -> Position {
        Position::new(
            coordinate.latitude,
            coordinate.longitude,
            self.accuracy,
            Utc::now(),
        )
    }
}

#[async_trait]
impl DeviceLocator for SimulatedLocator {
    async fn permission(&self) -> Result<PermissionState, PositionError> {
        Ok(*self.permission.read().unwrap_or_else(|e| e.into_inner()))
    }

    async fn request_permission(&self) -> PermissionState {
        let mut permission = self.permission.write().unwrap_or_else(|e| e.into_inner());
        if *permission == PermissionState::Unknown {
            *permission = self.request_answer;
        }
        *permission
    }

    async fn current_fix(&self, _options: &PositionOptions) -> Result<Position, PositionError> {
        let Some(delay) = self.fix_delay else {
            debug!("Simulated device never resolves a fix");
            std::future::pending::<()>().await;
            return Err(PositionError::Timeout);
        };
        tokio::time::sleep(delay).await;
        let coordinate = self
            .runtime
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .coordinate()
            .ok_or_else(|| PositionError::Transient("route point out of UTM range".into()))?;
        Ok(self.fix_at(coordinate))
    }

    async fn subscribe(&self, _options: &PositionOptions) -> Result<FixReceiver, PositionError> {
        let (tx, rx) = mpsc::channel(16);
        let runtime = self.runtime.clone();
        let interval = self.interval;
        let accuracy = self.accuracy;
        let error_every = self.error_every;
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            let mut tick: usize = 0;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = timer.tick() => {
                        tick += 1;
                        let coordinate = runtime
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .advance(interval);
                        let item = match coordinate {
                            _ if error_every.is_some_and(|n| tick % n == 0) => {
                                Err(PositionError::Transient("simulated signal loss".into()))
                            }
                            Some(c) => Ok(Position::new(c.latitude, c.longitude, accuracy, Utc::now())),
                            None => Err(PositionError::Transient("route point out of UTM range".into())),
                        };
                        trace!("Simulated reading {:?}", item);
                        if tx.send(item).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Simulated position subscription ended");
        });
        Ok(rx)
    }
}
