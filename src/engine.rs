use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use crate::{
    config::{Settings, Thresholds},
    data::{
        Direction, Location, PredictionResult, StationSnapshot, TimeOfWeek, Totals, TripSummary,
        HOME, WORK,
    },
    gbfs::Snapshot,
    patterns::PatternRepository,
    predictor, trip,
};

#[derive(Debug, Clone, Serialize)]
pub struct LocationReport {
    pub name: String,
    pub location: Location,
    pub nearby: Vec<StationSnapshot>,
    pub prediction: Option<PredictionResult>,
    /// Bikes across the stations the prediction is drawn from.
    pub total_bikes: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub total_stations: usize,
    pub prediction_source: String,
    pub nearby_stations: usize,
    pub prediction_stations: usize,
}

/// Everything one evaluation pass produces, ready for any renderer.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub timestamp: NaiveDateTime,
    pub is_morning: bool,
    pub direction: Direction,
    pub trip_summary: TripSummary,
    /// Origin first, then destination. Serialized as a map keyed by
    /// location name.
    #[serde(serialize_with = "by_name")]
    pub locations: [LocationReport; 2],
    pub meta: Meta,
}

fn by_name<S>(locations: &[LocationReport; 2], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(locations.iter().map(|report| (&report.name, report)))
}

impl Dashboard {
    pub fn origin(&self) -> &LocationReport {
        &self.locations[0]
    }

    pub fn destination(&self) -> &LocationReport {
        &self.locations[1]
    }
}

/// Holds what survives between passes: the settings and the pattern
/// history, both read-only after start-up.
#[derive(Debug)]
pub struct Engine {
    pub settings: Settings,
    pub patterns: Option<Arc<PatternRepository>>,
}

impl Engine {
    pub fn new(settings: Settings, patterns: Option<Arc<PatternRepository>>) -> Self {
        Self { settings, patterns }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.settings.thresholds
    }

    fn report(
        &self,
        name: &str,
        location: &Location,
        snapshot: &Snapshot,
        now: TimeOfWeek,
    ) -> LocationReport {
        let thresholds = self.thresholds();
        let nearby =
            snapshot.nearest_stations(location.lat, location.lon, thresholds.nearby_stations);
        let prediction = predictor::predict(self.patterns.as_deref(), thresholds, &nearby, now);
        let total_bikes = nearby
            .iter()
            .take(thresholds.prediction_stations)
            .collect::<Totals>()
            .bikes;

        log::debug!(
            "{}: {} nearby stations, {} bikes at the closest {}",
            name,
            nearby.len(),
            total_bikes,
            thresholds.prediction_stations
        );

        LocationReport {
            name: name.to_owned(),
            location: location.clone(),
            nearby,
            prediction,
            total_bikes,
        }
    }

    /// One complete pass over a snapshot. Nothing is carried over to the
    /// next pass.
    pub fn evaluate(&self, snapshot: &Snapshot, timestamp: NaiveDateTime) -> Dashboard {
        let now = TimeOfWeek::from(timestamp);
        let locations = &self.settings.locations;

        let home = self.report(HOME, &locations.home, snapshot, now);
        let work = self.report(WORK, &locations.work, snapshot, now);
        let (origin, destination) = if now.is_morning() {
            (home, work)
        } else {
            (work, home)
        };

        let trip_summary = trip::summarize(
            origin.prediction.as_ref(),
            destination.prediction.as_ref(),
            origin.total_bikes,
            now,
            self.thresholds(),
        );

        log::info!(
            "Trip {} -> {}: {} ({})",
            trip_summary.direction.from,
            trip_summary.direction.to,
            trip_summary.confidence,
            trip_summary.message
        );

        let prediction_source = self
            .patterns
            .as_ref()
            .map(|patterns| patterns.metadata.data_source.to_owned())
            .filter(|source| !source.is_empty())
            .unwrap_or_else(|| "unknown".to_owned());

        Dashboard {
            timestamp,
            is_morning: now.is_morning(),
            direction: trip_summary.direction.clone(),
            trip_summary,
            locations: [origin, destination],
            meta: Meta {
                total_stations: snapshot.in_service_count(),
                prediction_source,
                nearby_stations: self.thresholds().nearby_stations,
                prediction_stations: self.thresholds().prediction_stations,
            },
        }
    }
}
