// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{position::Coordinate, serde::millis, tracking::DEFAULT_ANCHOR};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;
use tracing::info;

/// Base address of the campus services API.
pub const DEFAULT_API_BASE_URL: &str = "https://mad-backend-5ijo.onrender.com/api";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime configuration of the tracking engine.
///
/// Every field is optional in the JSON representation, missing fields take
/// the value of [`Settings::default`]. Durations are written in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub api_base_url: String,
    /// Period of the roster polling.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Bound of a single roster request.
    #[serde(with = "millis")]
    pub fetch_timeout: Duration,
    /// Bound of a one-shot position request.
    #[serde(with = "millis")]
    pub position_timeout: Duration,
    /// Maximum age of a cached fix that is still acceptable.
    #[serde(with = "millis")]
    pub max_position_age: Duration,
    pub high_accuracy: bool,
    pub default_anchor: Coordinate,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(30_000),
            fetch_timeout: Duration::from_secs(10),
            position_timeout: Duration::from_secs(10),
            max_position_age: Duration::from_secs(60),
            high_accuracy: true,
            default_anchor: DEFAULT_ANCHOR,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Loads the settings from `path`.
    ///
    /// A missing file is not an error, the defaults are returned instead.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                info!("Loading settings from {}", path.to_string_lossy());
                Settings::from_json(&json)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No settings file at {}, using defaults",
                    path.to_string_lossy()
                );
                Ok(Settings::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
