use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    data::{Location, Locations, HOME, WORK},
    error::ConfigError,
};

pub const SETTINGS_FILE: &str = ".bikes_config.json";
pub const PATTERNS_FILE: &str = "data/station_patterns.json";

/// Every tunable number the classifier and trip aggregator use.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Stations listed per location.
    pub nearby_stations: usize,
    /// Closest stations a location's prediction is computed from.
    pub prediction_stations: usize,

    /// Raw counts at or above these never rate LOW. `None` turns the floor
    /// rule off, and for bikes also the leave-by projection.
    pub bike_floor: Option<u32>,
    pub dock_floor: Option<u32>,

    pub high_pct: f64,
    pub medium_pct: f64,
    pub improving_pct: f64,
    pub drain_tolerance: f64,

    pub depletion_lookahead_hours: u32,
    pub depletion_min_severity: f64,
    pub fill_trigger_flow: f64,
    pub fill_hour_flow: f64,

    pub trip_bike_weight: f64,
    pub trip_dock_weight: f64,
    pub trip_high_score: f64,
    pub trip_medium_score: f64,

    pub leave_by_buffer_minutes: f64,
    pub leave_by_horizon_hours: f64,

    pub refresh_interval_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            nearby_stations: 5,
            prediction_stations: 2,
            bike_floor: Some(5),
            dock_floor: Some(5),
            high_pct: 40.0,
            medium_pct: 25.0,
            improving_pct: 15.0,
            drain_tolerance: -2.0,
            depletion_lookahead_hours: 4,
            depletion_min_severity: 15.0,
            fill_trigger_flow: 5.0,
            fill_hour_flow: 8.0,
            trip_bike_weight: 0.6,
            trip_dock_weight: 0.4,
            trip_high_score: 2.5,
            trip_medium_score: 1.8,
            leave_by_buffer_minutes: 30.0,
            leave_by_horizon_hours: 1.0,
            refresh_interval_secs: 60,
            fetch_timeout_secs: 10,
        }
    }
}

impl Thresholds {
    /// The earlier variant of the model: no floor rule and no leave-by.
    pub fn legacy(self) -> Self {
        Self {
            bike_floor: None,
            dock_floor: None,
            ..self
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Deserialize, Debug, Default)]
struct SettingsFile {
    #[serde(rename = "Home")]
    home: Option<Location>,
    #[serde(rename = "Work")]
    work: Option<Location>,
    #[serde(default)]
    thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub locations: Locations,
    pub thresholds: Thresholds,
}

impl TryFrom<SettingsFile> for Settings {
    type Error = ConfigError;

    fn try_from(value: SettingsFile) -> Result<Self, Self::Error> {
        Ok(Self {
            locations: Locations {
                home: value.home.ok_or(ConfigError::MissingLocation(HOME))?,
                work: value.work.ok_or(ConfigError::MissingLocation(WORK))?,
            },
            thresholds: value.thresholds,
        })
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(SETTINGS_FILE)
    }

    pub fn from_json(path: &Path, body: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<SettingsFile>(body)
            .map_err(|source| ConfigError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .try_into()
    }

    /// Reads settings from `path`, falling back to the built-in locations
    /// and default thresholds when the file does not exist or does not
    /// parse. Only an unreadable file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!(
                "No settings at {}, using default locations",
                path.display()
            );
            return Ok(Self::default());
        }

        let body = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::from_json(path, &body).unwrap_or_else(|err| {
            log::warn!("{}, using default locations", err);
            Self::default()
        }))
    }
}
