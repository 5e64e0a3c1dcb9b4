use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Could not build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url:?} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Could not read feed file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed feed {origin:?}")]
    Decode {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Could not read pattern document {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed pattern document {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown weekday code {0:?}")]
    UnknownWeekday(String),

    #[error("Hour key {0:?} is not an hour between 0 and 23")]
    InvalidHour(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read settings {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing {0:?} location in settings")]
    MissingLocation(&'static str),
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Could not read trip log {path:?}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Could not write pattern document {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not encode pattern document")]
    Encode(#[from] serde_json::Error),

    #[error("Weeks of data must be positive")]
    NoWeeks,
}
