use std::{collections::HashMap, fs, path::Path, time::Duration};

use serde::{de::DeserializeOwned, Deserialize};

use crate::error::FeedError;

pub const STATION_INFO_URL: &str =
    "https://tor.publicbikesystem.net/ube/gbfs/v1/en/station_information";
pub const STATION_STATUS_URL: &str =
    "https://tor.publicbikesystem.net/ube/gbfs/v1/en/station_status";

pub const IN_SERVICE: &str = "IN_SERVICE";

#[derive(Deserialize, Debug, Clone)]
pub struct StationInformation {
    pub station_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub is_charging_station: bool,
    pub address: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StationStatus {
    pub station_id: String,
    pub status: Option<String>,
    #[serde(default)]
    pub num_bikes_available: u32,
    #[serde(default)]
    pub num_ebikes_available: u32,
    #[serde(default)]
    pub num_docks_available: u32,
}

impl StationStatus {
    pub fn is_in_service(&self) -> bool {
        self.status.as_deref() == Some(IN_SERVICE)
    }
}

#[derive(Deserialize, Debug)]
struct Feed<T> {
    data: FeedData<T>,
}

#[derive(Deserialize, Debug)]
struct FeedData<T> {
    stations: Vec<T>,
}

/// Both halves of a live feed at one instant. Station information keeps
/// the feed's order; status is keyed by station id for the merge.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub info: Vec<StationInformation>,
    pub status: HashMap<String, StationStatus>,
}

impl Snapshot {
    pub fn new(info: Vec<StationInformation>, status: Vec<StationStatus>) -> Self {
        Self {
            info,
            status: status
                .into_iter()
                .map(|status| (status.station_id.to_owned(), status))
                .collect(),
        }
    }

    pub fn in_service_count(&self) -> usize {
        self.status
            .values()
            .filter(|status| status.is_in_service())
            .count()
    }

    pub fn from_json(info: &str, status: &str) -> Result<Self, FeedError> {
        Ok(Self::new(
            decode::<StationInformation>("station_information", info)?,
            decode::<StationStatus>("station_status", status)?,
        ))
    }

    pub fn from_files(info: &Path, status: &Path) -> Result<Self, FeedError> {
        let read = |path: &Path| {
            fs::read_to_string(path).map_err(|source| FeedError::Read {
                path: path.to_path_buf(),
                source,
            })
        };

        Self::from_json(&read(info)?, &read(status)?)
    }
}

fn decode<T: DeserializeOwned>(origin: &str, body: &str) -> Result<Vec<T>, FeedError> {
    serde_json::from_str::<Feed<T>>(body)
        .map(|feed| feed.data.stations)
        .map_err(|source| FeedError::Decode {
            origin: origin.to_owned(),
            source,
        })
}

pub struct FeedClient {
    client: reqwest::blocking::Client,
    info_url: String,
    status_url: String,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FeedError::Client)?;

        Ok(Self {
            client,
            info_url: STATION_INFO_URL.to_owned(),
            status_url: STATION_STATUS_URL.to_owned(),
        })
    }

    fn get(&self, url: &str) -> Result<String, FeedError> {
        let request_error = |source| FeedError::Request {
            url: url.to_owned(),
            source,
        };

        self.client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(request_error)
    }

    pub fn fetch_snapshot(&self) -> Result<Snapshot, FeedError> {
        log::debug!("Fetching {}", self.info_url);
        let info = self.get(&self.info_url)?;
        log::debug!("Fetching {}", self.status_url);
        let status = self.get(&self.status_url)?;

        Snapshot::from_json(&info, &status)
    }
}
