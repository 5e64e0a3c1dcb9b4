use std::{collections::BTreeMap, collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    data::{StationId, DAY_CODES},
    error::PatternError,
};

pub type HourTable = BTreeMap<String, f64>;
pub type WeekTable = BTreeMap<String, HourTable>;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub weeks_of_data: u32,
    #[serde(default)]
    pub total_stations: usize,
    #[serde(default)]
    pub generated: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DepletionRisk {
    pub hour: u32,
    pub severity: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StationPattern {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub departures: WeekTable,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arrivals: WeekTable,
    #[serde(default)]
    pub net_flow: WeekTable,
    #[serde(default)]
    pub depletion_risk: BTreeMap<String, DepletionRisk>,
}

/// The on-disk pattern document as written by the pattern builder.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PatternDocument {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub patterns: BTreeMap<StationId, StationPattern>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct StationHistory {
    net_flow: [[f64; 24]; 7],
    depletion: [Option<DepletionRisk>; 7],
}

/// Historical flow per station, weekday and hour. Built once from a
/// [`PatternDocument`] and never mutated afterwards.
#[derive(Debug, Default)]
pub struct PatternRepository {
    pub metadata: Metadata,
    stations: HashMap<StationId, StationHistory>,
}

fn day_index(code: &str) -> Result<usize, PatternError> {
    DAY_CODES
        .iter()
        .position(|&day| day == code)
        .ok_or_else(|| PatternError::UnknownWeekday(code.to_owned()))
}

fn hour_index(key: &str) -> Result<usize, PatternError> {
    key.trim()
        .parse::<usize>()
        .ok()
        .filter(|&hour| hour < 24)
        .ok_or_else(|| PatternError::InvalidHour(key.to_owned()))
}

impl StationHistory {
    /// Copies every well-formed slot out of `pattern`. Keys that name no
    /// weekday or hour are skipped with a warning.
    fn from_pattern(station_id: &str, pattern: &StationPattern) -> Self {
        let mut history = Self::default();
        let skip = |err: PatternError| log::warn!("Station {}: skipping {}", station_id, err);

        for (day, hours) in &pattern.net_flow {
            let day = match day_index(day) {
                Ok(day) => day,
                Err(err) => {
                    skip(err);
                    continue;
                }
            };
            for (hour, &flow) in hours {
                match hour_index(hour) {
                    Ok(hour) => history.net_flow[day][hour] = flow,
                    Err(err) => skip(err),
                }
            }
        }

        for (day, &risk) in &pattern.depletion_risk {
            match day_index(day) {
                Ok(day) => history.depletion[day] = Some(risk),
                Err(err) => skip(err),
            }
        }

        history
    }
}

impl From<PatternDocument> for PatternRepository {
    fn from(value: PatternDocument) -> Self {
        let stations = value
            .patterns
            .iter()
            .map(|(station_id, pattern)| {
                (
                    station_id.to_owned(),
                    StationHistory::from_pattern(station_id, pattern),
                )
            })
            .collect();

        Self {
            metadata: value.metadata,
            stations,
        }
    }
}

impl PatternRepository {
    pub fn from_json(path: &Path, body: &str) -> Result<Self, PatternError> {
        let document = serde_json::from_str::<PatternDocument>(body).map_err(|source| {
            PatternError::Decode {
                path: path.to_path_buf(),
                source,
            }
        })?;

        Ok(Self::from(document))
    }

    /// Loads the pattern document at `path`. A missing file is not an
    /// error: it yields `None` and predictions are switched off.
    pub fn load(path: &Path) -> Result<Option<Self>, PatternError> {
        if !path.exists() {
            log::warn!(
                "No pattern document at {}, predictions unavailable",
                path.display()
            );
            return Ok(None);
        }

        let body = fs::read_to_string(path).map_err(|source| PatternError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let repository = Self::from_json(path, &body)?;

        log::info!(
            "Loaded patterns for {} stations from {:?}",
            repository.station_count(),
            repository.metadata.data_source
        );

        Ok(Some(repository))
    }

    /// Like [`PatternRepository::load`], but an unreadable or malformed
    /// document also just switches predictions off.
    pub fn load_available(path: &Path) -> Option<Self> {
        Self::load(path).unwrap_or_else(|err| {
            log::error!("{}, predictions unavailable", err);
            None
        })
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Average net flow (arrivals minus departures) for the slot, `0.0`
    /// when the station, weekday or hour has no history.
    pub fn lookup(&self, station_id: &str, weekday: usize, hour: u32) -> f64 {
        self.stations
            .get(station_id)
            .and_then(|history| history.net_flow.get(weekday)?.get(hour as usize))
            .copied()
            .unwrap_or_default()
    }

    pub fn depletion(&self, station_id: &str, weekday: usize) -> Option<DepletionRisk> {
        *self.stations.get(station_id)?.depletion.get(weekday)?
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const DOCUMENT: &str = r#"{
        "metadata": {"data_source": "Toronto Bike Share Ridership 2024 (Jan-Sep)", "weeks_of_data": 39, "total_stations": 2, "generated": "2024-10-01T12:00:00"},
        "patterns": {
            "7000": {
                "departures": {"fri": {"8": 4.1}},
                "net_flow": {"fri": {"8": -3.5, "9": -1.2}, "mon": {"23": 0.4}},
                "depletion_risk": {"fri": {"hour": 10, "severity": 22.0}}
            },
            "7052": {"net_flow": {}}
        }
    }"#;

    fn repository() -> PatternRepository {
        PatternRepository::from_json(&PathBuf::from("patterns.json"), DOCUMENT).unwrap()
    }

    #[test]
    fn lookup_reads_typed_slots() {
        let repository = repository();

        assert_eq!(repository.station_count(), 2);
        assert_eq!(repository.lookup("7000", 4, 8), -3.5);
        assert_eq!(repository.lookup("7000", 4, 9), -1.2);
        assert_eq!(repository.lookup("7000", 0, 23), 0.4);
        assert_eq!(repository.metadata.weeks_of_data, 39);
    }

    #[test]
    fn absent_history_defaults() {
        let repository = repository();

        assert_eq!(repository.lookup("7000", 4, 7), 0.0);
        assert_eq!(repository.lookup("7000", 2, 8), 0.0);
        assert_eq!(repository.lookup("7052", 4, 8), 0.0);
        assert_eq!(repository.lookup("9999", 4, 8), 0.0);
        assert_eq!(repository.lookup("7000", 9, 30), 0.0);

        assert_eq!(repository.depletion("7000", 3), None);
        assert_eq!(repository.depletion("9999", 4), None);
        assert_eq!(
            repository.depletion("7000", 4),
            Some(DepletionRisk {
                hour: 10,
                severity: 22.0
            })
        );
    }

    #[test]
    fn stray_keys_are_skipped() {
        let body = r#"{"patterns": {
            "7000": {"net_flow": {"fri": {"8": -3.5}}},
            "7001": {"net_flow": {"friday": {"8": 1.0}, "sat": {"9": 2.0, "noon": 5.0}}},
            "7999": {
                "net_flow": {"fri": {"24": 1.0, "7": 0.5}},
                "depletion_risk": {"someday": {"hour": 9, "severity": 20.0}}
            }
        }}"#;
        let path = PathBuf::from("patterns.json");
        let repository = PatternRepository::from_json(&path, body).unwrap();

        assert_eq!(repository.station_count(), 3);
        assert_eq!(repository.lookup("7000", 4, 8), -3.5);
        assert_eq!(repository.lookup("7001", 4, 8), 0.0);
        assert_eq!(repository.lookup("7001", 5, 9), 2.0);
        assert_eq!(repository.lookup("7999", 4, 7), 0.5);
        assert_eq!(repository.depletion("7999", 4), None);
    }

    #[test]
    fn key_errors_name_the_key() {
        assert!(matches!(
            day_index("friday"),
            Err(PatternError::UnknownWeekday(day)) if day == "friday"
        ));
        assert!(matches!(
            hour_index("24"),
            Err(PatternError::InvalidHour(hour)) if hour == "24"
        ));
        assert_eq!(hour_index(" 7").unwrap(), 7);
    }

    #[test]
    fn missing_document_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = PatternRepository::load(&dir.path().join("station_patterns.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn loads_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station_patterns.json");
        fs::write(&path, DOCUMENT).unwrap();

        let repository = PatternRepository::load(&path).unwrap().unwrap();
        assert_eq!(repository.lookup("7000", 4, 8), -3.5);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station_patterns.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            PatternRepository::load(&path),
            Err(PatternError::Decode { .. })
        ));
        assert!(PatternRepository::load_available(&path).is_none());
    }
}
