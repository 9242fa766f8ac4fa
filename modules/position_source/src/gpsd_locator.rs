// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{DeviceLocator, FixReceiver, PositionError, PositionOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::position::{PermissionState, Position};
use futures::StreamExt;
use gpsd_proto::Tpv;
use std::{
    io::{self, Error, ErrorKind},
    net::SocketAddr,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, warn};

type Reading = Result<Position, PositionError>;

/// Converts a gpsd TPV report into a fix.
///
/// Reports without latitude, longitude or a parsable time carry no fix and
/// yield `None`. The accuracy is the horizontal error estimate built from
/// `epx` and `epy`, or `0.0` if gpsd doesn't provide one.
fn tpv_to_position(tpv: &Tpv) -> Option<Position> {
    let lat = tpv.lat?;
    let lon = tpv.lon?;
    let time = tpv.time.as_ref()?;
    let captured_at = DateTime::<Utc>::from_str(time).ok()?;
    let accuracy = match (tpv.epx, tpv.epy) {
        (Some(x), Some(y)) => f64::from(x).hypot(f64::from(y)),
        (Some(e), None) | (None, Some(e)) => f64::from(e),
        (None, None) => 0.0,
    };
    Position::try_new(lat, lon, accuracy, captured_at)
}

async fn gpsd_reader(
    mut stream: TcpStream,
    sender: broadcast::Sender<Reading>,
    connected: Arc<AtomicBool>,
) {
    if let Err(e) = stream
        .write_all(gpsd_proto::ENABLE_WATCH_CMD.as_bytes())
        .await
    {
        error!("Failed to enable gpsd watch. Error: {}", e);
        connected.store(false, Ordering::SeqCst);
        return;
    }
    let mut framed = Framed::new(stream, LinesCodec::new());
    while let Some(result) = framed.next().await {
        match result {
            Ok(ref line) => {
                let Ok(tpv) = serde_json::from_str::<Tpv>(line) else {
                    continue;
                };
                match tpv_to_position(&tpv) {
                    Some(position) => {
                        let _ = sender.send(Ok(position));
                    }
                    None => debug!("gpsd report without fix"),
                }
            }
            Err(e) => {
                warn!("gpsd receive error {e:?}");
                let _ = sender.send(Err(PositionError::Transient(e.to_string())));
            }
        }
    }
    info!("gpsd connection closed");
    connected.store(false, Ordering::SeqCst);
}

/// Positioning through a gpsd daemon.
///
/// gpsd has no permission model. The permission reads as granted while the
/// daemon connection is up and as denied once it is lost.
pub struct GpsdLocator {
    sender: broadcast::Sender<Reading>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl GpsdLocator {
    /// Connects to the gpsd daemon at `address` and enables its watch mode.
    ///
    /// # Returns
    ///
    /// * `Ok(GpsdLocator)` - If the connection is successful established.
    /// * `Err(io::Error)` - If the address is invalid or the connection fails.
    pub async fn connect(address: &str) -> Result<Self, Error> {
        let address: SocketAddr = match address.parse() {
            Ok(addr) => addr,
            Err(e) => return Err(io::Error::new(ErrorKind::InvalidInput, e)),
        };
        let stream = TcpStream::connect(address).await?;
        info!("Connected to gpsd at {}", address);
        let (sender, _) = broadcast::channel(32);
        let connected = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(gpsd_reader(stream, sender.clone(), connected.clone()));
        Ok(GpsdLocator {
            sender,
            connected,
            reader,
        })
    }

    fn state(&self) -> PermissionState {
        if self.connected.load(Ordering::SeqCst) {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }
}

impl Drop for GpsdLocator {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl DeviceLocator for GpsdLocator {
    async fn permission(&self) -> Result<PermissionState, PositionError> {
        Ok(self.state())
    }

    async fn request_permission(&self) -> PermissionState {
        self.state()
    }

    async fn current_fix(&self, _options: &PositionOptions) -> Result<Position, PositionError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(PositionError::Unavailable);
        }
        let mut receiver = self.sender.subscribe();
        loop {
            match receiver.recv().await {
                Ok(Ok(position)) => return Ok(position),
                Ok(Err(e)) => debug!("Ignoring failed gpsd reading: {}", e),
                Err(broadcast::error::RecvError::Lagged(_)) => (),
                Err(broadcast::error::RecvError::Closed) => return Err(PositionError::Unavailable),
            }
        }
    }

    async fn subscribe(&self, _options: &PositionOptions) -> Result<FixReceiver, PositionError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(PositionError::Unavailable);
        }
        let mut readings = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    reading = readings.recv() => match reading {
                        Ok(reading) => {
                            if tx.send(reading).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Position watch lagged behind gpsd by {} readings", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
        Ok(rx)
    }
}
