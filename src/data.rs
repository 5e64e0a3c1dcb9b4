use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

pub type StationId = String;

/// Lowercase three-letter codes used as weekday keys in pattern documents.
pub const DAY_CODES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// An in-service station merged from both feed halves, with its distance
/// from the point it was located for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSnapshot {
    pub id: StationId,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lon: f64,
    pub capacity: u32,
    pub is_charging: bool,
    pub bikes_available: u32,
    pub ebikes_available: u32,
    pub docks_available: u32,
    #[serde(rename = "distance")]
    pub distance_m: f64,
}

/// Aggregated counts over a group of stations. Docks and bikes may exceed
/// capacity transiently and are not clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub bikes: u32,
    pub ebikes: u32,
    pub docks: u32,
    pub capacity: u32,
}

impl<'a> FromIterator<&'a StationSnapshot> for Totals {
    fn from_iter<I: IntoIterator<Item = &'a StationSnapshot>>(iter: I) -> Self {
        iter.into_iter().fold(Totals::default(), |acc, station| Totals {
            bikes: acc.bikes + station.bikes_available,
            ebikes: acc.ebikes + station.ebikes_available,
            docks: acc.docks + station.docks_available,
            capacity: acc.capacity + station.capacity,
        })
    }
}

impl Totals {
    pub fn bike_pct(&self) -> f64 {
        percentage(self.bikes, self.capacity)
    }

    pub fn dock_pct(&self) -> f64 {
        percentage(self.docks, self.capacity)
    }
}

fn percentage(count: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    f64::from(count) / f64::from(capacity) * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Likelihood {
    Low,
    Medium,
    High,
}

impl Likelihood {
    pub fn score(self) -> u8 {
        match self {
            Likelihood::High => 3,
            Likelihood::Medium => 2,
            Likelihood::Low => 1,
        }
    }
}

impl fmt::Display for Likelihood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Likelihood::High => "HIGH",
            Likelihood::Medium => "MEDIUM",
            Likelihood::Low => "LOW",
        })
    }
}

/// The weekday/hour a prediction is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfWeek {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
}

impl From<NaiveDateTime> for TimeOfWeek {
    fn from(value: NaiveDateTime) -> Self {
        Self {
            weekday: value.weekday(),
            hour: value.hour(),
            minute: value.minute(),
        }
    }
}

impl TimeOfWeek {
    pub fn day_index(&self) -> usize {
        self.weekday.num_days_from_monday() as usize
    }

    pub fn day_name(&self) -> &'static str {
        DAY_NAMES[self.day_index()]
    }

    pub fn minutes_since_midnight(&self) -> f64 {
        f64::from(self.hour * 60 + self.minute)
    }

    pub fn is_morning(&self) -> bool {
        self.hour < 12
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub bike_likelihood: Likelihood,
    pub dock_likelihood: Likelihood,
    pub bike_warning: Option<String>,
    pub dock_warning: Option<String>,
    pub net_flow_bikes: f64,
    pub net_flow_docks: f64,
    pub day: String,
    pub hour: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Direction {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub confidence: Likelihood,
    pub message: String,
    pub leave_by: Option<String>,
    pub bike_likelihood: Likelihood,
    pub dock_likelihood: Likelihood,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// The two habitual places a trip runs between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locations {
    #[serde(rename = "Home")]
    pub home: Location,
    #[serde(rename = "Work")]
    pub work: Location,
}

impl Default for Locations {
    fn default() -> Self {
        Self {
            home: Location {
                lat: 43.6375,
                lon: -79.4030,
                emoji: Some("🏠".to_owned()),
                address: Some("215 Fort York Blvd".to_owned()),
            },
            work: Location {
                lat: 43.6458,
                lon: -79.3854,
                emoji: Some("🏢".to_owned()),
                address: Some("155 Wellington St (RBC Centre)".to_owned()),
            },
        }
    }
}

pub const HOME: &str = "Home";
pub const WORK: &str = "Work";

/// Rounds to one decimal place, ties to even: -1.25 becomes -1.2.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// "12 AM", "9 AM", "12 PM", "5 PM".
pub fn format_hour_12h(hour: u32) -> String {
    match hour {
        0 => "12 AM".to_owned(),
        12 => "12 PM".to_owned(),
        h if h < 12 => format!("{} AM", h),
        h => format!("{} PM", h - 12),
    }
}

/// "12:05 AM", "8:30 AM", "1:07 PM".
pub fn format_time_12h(hour: u32, minute: u32) -> String {
    match hour {
        0 => format!("12:{:02} AM", minute),
        12 => format!("12:{:02} PM", minute),
        h if h < 12 => format!("{}:{:02} AM", h, minute),
        h => format!("{}:{:02} PM", h - 12, minute),
    }
}
