use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs,
    path::Path,
};

use chrono::{Datelike, NaiveDateTime, Timelike};
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    data::{round_tenth, StationId, DAY_CODES},
    error::HistoryError,
    patterns::{DepletionRisk, Metadata, PatternDocument, StationPattern},
};

/// A day whose running deficit dips below this many bikes gets a
/// depletion-risk entry.
pub const DEPLETION_THRESHOLD: i64 = -10;

pub const DATETIME_FORMATS: [&str; 2] = ["%m/%d/%Y %H:%M", "%d/%m/%Y %H:%M"];

#[derive(Deserialize, Debug, Default)]
pub struct TripRecord {
    #[serde(rename = "Start Time", default)]
    pub start_time: String,
    #[serde(rename = "Start Station Id", default)]
    pub start_station_id: String,
    #[serde(rename = "End Time", default)]
    pub end_time: String,
    #[serde(rename = "End Station Id", default)]
    pub end_station_id: String,
}

pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
}

type Slot = (usize, u32);

/// Departure and arrival counts per station, weekday and hour, summed
/// over every trip log fed in.
#[derive(Debug, Default)]
pub struct PatternBuilder {
    departures: HashMap<StationId, HashMap<Slot, i64>>,
    arrivals: HashMap<StationId, HashMap<Slot, i64>>,
    trips: usize,
}

fn slot(time: &NaiveDateTime) -> Slot {
    (time.weekday().num_days_from_monday() as usize, time.hour())
}

fn average(count: i64, weeks: u32) -> f64 {
    round_tenth(count as f64 / f64::from(weeks))
}

impl PatternBuilder {
    pub fn record(&mut self, trip: &TripRecord) {
        self.trips += 1;

        let start_station = trip.start_station_id.trim();
        let start = parse_datetime(&trip.start_time);
        if let Some(start) = start.filter(|_| !start_station.is_empty()) {
            *self
                .departures
                .entry(start_station.to_owned())
                .or_default()
                .entry(slot(&start))
                .or_default() += 1;
        }

        let end_station = trip.end_station_id.trim();
        let end = parse_datetime(&trip.end_time);
        if let Some(end) = end.filter(|_| !end_station.is_empty()) {
            *self
                .arrivals
                .entry(end_station.to_owned())
                .or_default()
                .entry(slot(&end))
                .or_default() += 1;
        }
    }

    pub fn read_csv(&mut self, path: &Path) -> Result<(), HistoryError> {
        log::info!("Processing {}", path.display());
        let before = self.trips;

        let csv_error = |source| HistoryError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;

        for parse_result in reader.deserialize::<TripRecord>() {
            match parse_result {
                Ok(trip) => self.record(&trip),
                Err(err) => log::debug!("Skipping row in {}: {}", path.display(), err),
            }
        }

        log::info!("  Processed {} trips", self.trips - before);
        Ok(())
    }

    fn count(table: &HashMap<StationId, HashMap<Slot, i64>>, station: &str, slot: Slot) -> i64 {
        table
            .get(station)
            .and_then(|slots| slots.get(&slot))
            .copied()
            .unwrap_or_default()
    }

    fn station_pattern(&self, station: &str, weeks: u32) -> StationPattern {
        let mut pattern = StationPattern::default();

        for (day, code) in DAY_CODES.iter().enumerate() {
            let mut departures = BTreeMap::new();
            let mut arrivals = BTreeMap::new();
            let mut net_flow = BTreeMap::new();

            let mut cumulative = 0;
            let mut worst = 0;
            let mut worst_hour = 0;

            for hour in 0..24 {
                let departed = Self::count(&self.departures, station, (day, hour));
                let arrived = Self::count(&self.arrivals, station, (day, hour));
                let net = arrived - departed;

                departures.insert(hour.to_string(), average(departed, weeks));
                arrivals.insert(hour.to_string(), average(arrived, weeks));
                net_flow.insert(hour.to_string(), average(net, weeks));

                cumulative += net;
                if cumulative < worst {
                    worst = cumulative;
                    worst_hour = hour;
                }
            }

            if worst < DEPLETION_THRESHOLD {
                pattern.depletion_risk.insert(
                    code.to_string(),
                    DepletionRisk {
                        hour: worst_hour,
                        severity: worst.abs() as f64,
                    },
                );
            }

            pattern.departures.insert(code.to_string(), departures);
            pattern.arrivals.insert(code.to_string(), arrivals);
            pattern.net_flow.insert(code.to_string(), net_flow);
        }

        pattern
    }

    /// Turns the raw counts into per-week averages. Depletion severity
    /// stays a raw count over the whole period.
    pub fn build(
        &self,
        weeks: u32,
        data_source: &str,
        generated: NaiveDateTime,
    ) -> Result<PatternDocument, HistoryError> {
        if weeks == 0 {
            return Err(HistoryError::NoWeeks);
        }

        let stations = self
            .departures
            .keys()
            .chain(self.arrivals.keys())
            .collect::<BTreeSet<_>>();

        let patterns = stations
            .into_iter()
            .map(|station| (station.to_owned(), self.station_pattern(station, weeks)))
            .collect::<BTreeMap<_, _>>();

        Ok(PatternDocument {
            metadata: Metadata {
                data_source: data_source.to_owned(),
                weeks_of_data: weeks,
                total_stations: patterns.len(),
                generated: generated.format("%Y-%m-%dT%H:%M:%S").to_string(),
            },
            patterns,
        })
    }
}

pub fn write_document(document: &PatternDocument, path: &Path) -> Result<(), HistoryError> {
    let body = serde_json::to_string_pretty(document)?;
    fs::write(path, body).map_err(|source| HistoryError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Stations ranked by how strongly they drain on the given weekday, for a
/// quick look at the builder's output.
pub fn most_draining(
    document: &PatternDocument,
    day: &str,
    count: usize,
) -> Vec<(StationId, DepletionRisk)> {
    document
        .patterns
        .iter()
        .filter_map(|(station, pattern)| {
            Some((station.to_owned(), *pattern.depletion_risk.get(day)?))
        })
        .sorted_by(|x, y| y.1.severity.total_cmp(&x.1.severity))
        .take(count)
        .collect()
}
