// SPDX-FileCopyrightText: 2026 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

mod display_log;

use clap::{CommandFactory, Parser, ValueEnum};
use common::{position::Coordinate, settings::Settings};
use display_log::DisplayLog;
use dirs::config_dir;
use module_core::{Event, EventBus, EventKind, Module};
use position_source::{
    PositionOptions, PositionSource, gpsd_locator::GpsdLocator,
    simulated_locator::SimulatedLocator,
};
use roster_sync::{HttpRosterEndpoint, RosterModule};
use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracking::{Role, TrackingCoordinator};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliRole {
    Driver,
    Viewer,
}

impl From<CliRole> for Role {
    fn from(role: CliRole) -> Self {
        match role {
            CliRole::Driver => Role::Driver,
            CliRole::Viewer => Role::Viewer,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_enum, default_value_t = CliRole::Viewer)]
    role: CliRole,
    /// Address of the gpsd daemon, e.g. 127.0.0.1:2947
    #[arg(short = 'd', long)]
    gpsd: Option<String>,
    /// CSV file with the route (latitude,longitude) of a simulated device
    #[arg(short = 'f', long)]
    simulate: Option<String>,
    /// Start sharing the location right away (driver role)
    #[arg(short, long)]
    share: bool,
    #[arg(short = 'u', long)]
    api_url: Option<String>,
    /// Bearer token of the signed in user
    #[arg(short, long)]
    token: Option<String>,
    /// Roster poll interval in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,
    /// Settings file, defaults to <config dir>/shuttle/settings.json
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn read_route_from_file(file_path: &str) -> Result<Vec<Coordinate>, ()> {
    let mut rdr = csv::Reader::from_path(file_path).map_err(|e| {
        error!("Failed to open route file {}. Error: {}", file_path, e);
    })?;
    let mut route = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| error!("Invalid route record. Error: {}", e))?;
        let field = |index: usize| {
            record
                .get(index)
                .and_then(|value| f64::from_str(value.trim()).ok())
                .ok_or_else(|| error!("Invalid route record {:?}", record))
        };
        route.push(Coordinate::new(field(0)?, field(1)?));
    }
    debug!("length of route: {}", route.len());
    Ok(route)
}

fn get_settings_path(cli: &Cli) -> Result<PathBuf, ()> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }
    let mut path = config_dir().ok_or_else(|| {
        error!("Could not determine config directory");
    })?;
    path.push("shuttle");
    path.push("settings.json");
    Ok(path)
}

fn load_settings(cli: &Cli) -> Result<Settings, ()> {
    let path = get_settings_path(cli)?;
    let mut settings = Settings::load(&path).map_err(|e| {
        error!("Failed to load settings {}. Error: {}", path.to_string_lossy(), e);
    })?;
    if let Some(api_url) = &cli.api_url {
        settings.api_base_url = api_url.clone();
    }
    if let Some(interval) = cli.interval {
        settings.poll_interval = Duration::from_millis(interval);
    }
    Ok(settings)
}

async fn create_position_source(cli: &Cli) -> Result<PositionSource, ()> {
    if let Some(address) = &cli.gpsd {
        match GpsdLocator::connect(address).await {
            Ok(locator) => Ok(PositionSource::new(Arc::new(locator))),
            Err(e) => {
                error!("Failed to connect to gpsd!. Error: {}", e);
                Err(())
            }
        }
    } else if let Some(route_file) = &cli.simulate {
        let route = read_route_from_file(route_file)?;
        let locator = SimulatedLocator::new(&route, 10.0, Duration::from_secs(5)).map_err(|e| {
            error!("Failed to create simulated device. Error: {}", e);
            let _ = Cli::command().print_help();
        })?;
        Ok(PositionSource::new(Arc::new(locator)))
    } else {
        warn!("No position source given, positioning is unavailable. Use --gpsd or --simulate");
        Ok(PositionSource::unavailable())
    }
}

#[tokio::main]
async fn main() -> Result<(), ()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = load_settings(&cli)?;
    let source = Arc::new(create_position_source(&cli).await?);

    let mut endpoint = HttpRosterEndpoint::new(&settings.api_base_url, settings.fetch_timeout)
        .map_err(|e| error!("Failed to create roster endpoint. Error: {}", e))?;
    if let Some(token) = cli.token.clone() {
        endpoint = endpoint.with_token_provider(Arc::new(move || Some(token.clone())));
    }

    let eb = EventBus::default();
    let quit_sender = eb.sender();
    ctrlc::set_handler(move || {
        let _ = quit_sender.send(Event {
            kind: EventKind::QuitEvent,
        });
    })
    .map_err(|e| error!("Failed to install the signal handler. Error: {}", e))?;

    let mut display = DisplayLog::new(eb.context());
    let mut roster = RosterModule::new(eb.context(), Arc::new(endpoint), settings.poll_interval);
    let mut coordinator = TrackingCoordinator::new(
        eb.context(),
        cli.role.into(),
        source,
        PositionOptions::from(&settings),
    )
    .with_default_anchor(settings.default_anchor);

    if cli.share {
        eb.publish(&Event {
            kind: EventKind::ToggleTrackingEvent(true),
        });
    }

    info!("Starting modules...");
    let (display, roster, coordinator) =
        tokio::join!(display.run(), roster.run(), coordinator.run());
    display.and(roster).and(coordinator)
}
