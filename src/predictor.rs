use itertools::Itertools;

use crate::{
    config::Thresholds,
    data::{
        format_hour_12h, round_tenth, Likelihood, PredictionResult, StationSnapshot, TimeOfWeek,
        Totals,
    },
    patterns::PatternRepository,
};

/// Rates one side (bikes or docks) from its share of capacity and its
/// historical trend, then applies the absolute floor.
pub fn classify(
    pct: f64,
    net_flow: f64,
    count: u32,
    floor: Option<u32>,
    thresholds: &Thresholds,
) -> Likelihood {
    let improving = pct >= thresholds.improving_pct && net_flow > 0.0;

    let rated = if pct >= thresholds.high_pct && net_flow >= thresholds.drain_tolerance {
        Likelihood::High
    } else if pct >= thresholds.medium_pct || improving {
        Likelihood::Medium
    } else {
        Likelihood::Low
    };

    match floor {
        Some(floor) if rated == Likelihood::Low && count >= floor => Likelihood::Medium,
        _ => rated,
    }
}

#[derive(Debug)]
pub struct Predictor<'a> {
    pub patterns: &'a PatternRepository,
    pub thresholds: &'a Thresholds,
}

impl<'a> Predictor<'a> {
    pub fn new(patterns: &'a PatternRepository, thresholds: &'a Thresholds) -> Self {
        Self {
            patterns,
            thresholds,
        }
    }

    /// The closest few of `nearby`, which is already sorted by distance.
    pub fn prediction_stations<'s>(&self, nearby: &'s [StationSnapshot]) -> &'s [StationSnapshot] {
        &nearby[..nearby.len().min(self.thresholds.prediction_stations)]
    }

    pub fn predict(&self, nearby: &[StationSnapshot], now: TimeOfWeek) -> PredictionResult {
        let stations = self.prediction_stations(nearby);
        let day = now.day_index();

        let totals: Totals = stations.iter().collect();
        let net_flow_bikes: f64 = stations
            .iter()
            .map(|station| self.patterns.lookup(&station.id, day, now.hour))
            .sum();
        let net_flow_docks = -net_flow_bikes;

        let bike_likelihood = classify(
            totals.bike_pct(),
            net_flow_bikes,
            totals.bikes,
            self.thresholds.bike_floor,
            self.thresholds,
        );
        let dock_likelihood = classify(
            totals.dock_pct(),
            net_flow_docks,
            totals.docks,
            self.thresholds.dock_floor,
            self.thresholds,
        );

        let bike_warning = self.depletion_hour(stations, now).map(|hour| {
            format!("Often runs low by {} on {}s", format_hour_12h(hour), now.day_name())
        });
        let dock_warning = (net_flow_bikes > self.thresholds.fill_trigger_flow)
            .then(|| self.fill_hour(stations, now))
            .flatten()
            .map(|hour| {
                format!("Fills up around {} on {}s", format_hour_12h(hour), now.day_name())
            });

        let net_flow_bikes = round_tenth(net_flow_bikes);

        PredictionResult {
            bike_likelihood,
            dock_likelihood,
            bike_warning,
            dock_warning,
            net_flow_bikes,
            net_flow_docks: -net_flow_bikes,
            day: now.day_name().to_owned(),
            hour: now.hour,
        }
    }

    /// Earliest material depletion event still ahead of `now` within the
    /// lookahead window.
    fn depletion_hour(&self, stations: &[StationSnapshot], now: TimeOfWeek) -> Option<u32> {
        let lookahead = i64::from(self.thresholds.depletion_lookahead_hours);

        stations
            .iter()
            .filter_map(|station| self.patterns.depletion(&station.id, now.day_index()))
            .filter(|risk| {
                let hours_ahead = i64::from(risk.hour) - i64::from(now.hour);
                hours_ahead > 0
                    && hours_ahead <= lookahead
                    && risk.severity > self.thresholds.depletion_min_severity
            })
            .map(|risk| risk.hour)
            .min()
    }

    /// Earliest upcoming hour, across all stations, with heavy inflow.
    /// Hours never run past the end of the day.
    fn fill_hour(&self, stations: &[StationSnapshot], now: TimeOfWeek) -> Option<u32> {
        let last = (now.hour + self.thresholds.depletion_lookahead_hours).min(23);

        stations
            .iter()
            .cartesian_product(now.hour + 1..=last)
            .filter(|(station, hour)| {
                let flow = self.patterns.lookup(&station.id, now.day_index(), *hour);
                flow > self.thresholds.fill_hour_flow
            })
            .map(|(_, hour)| hour)
            .min()
    }
}

/// Predicts for one location, or `None` when no pattern history is loaded.
pub fn predict(
    patterns: Option<&PatternRepository>,
    thresholds: &Thresholds,
    nearby: &[StationSnapshot],
    now: TimeOfWeek,
) -> Option<PredictionResult> {
    Some(Predictor::new(patterns?, thresholds).predict(nearby, now))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::Weekday;

    use super::*;
    use crate::patterns::{DepletionRisk, PatternDocument, StationPattern};

    fn friday(hour: u32) -> TimeOfWeek {
        TimeOfWeek {
            weekday: Weekday::Fri,
            hour,
            minute: 0,
        }
    }

    fn station(id: &str, bikes: u32, docks: u32, capacity: u32) -> StationSnapshot {
        StationSnapshot {
            id: id.to_owned(),
            name: format!("Station {}", id),
            address: format!("Station {}", id),
            lat: 43.64,
            lon: -79.39,
            capacity,
            is_charging: false,
            bikes_available: bikes,
            ebikes_available: 0,
            docks_available: docks,
            distance_m: 100.0,
        }
    }

    fn pattern(flows: &[(u32, f64)], risk: Option<(u32, f64)>) -> StationPattern {
        let mut pattern = StationPattern::default();
        pattern.net_flow.insert(
            "fri".to_owned(),
            flows
                .iter()
                .map(|(hour, flow)| (hour.to_string(), *flow))
                .collect(),
        );
        if let Some((hour, severity)) = risk {
            pattern
                .depletion_risk
                .insert("fri".to_owned(), DepletionRisk { hour, severity });
        }
        pattern
    }

    fn repository(stations: Vec<(&str, StationPattern)>) -> PatternRepository {
        let mut document = PatternDocument::default();
        for (id, pattern) in stations {
            document.patterns.insert(id.to_owned(), pattern);
        }
        PatternRepository::from(document)
    }

    #[test]
    fn classification_thresholds() {
        let thresholds = Thresholds::default();

        assert_eq!(classify(45.0, -1.0, 0, None, &thresholds), Likelihood::High);
        assert_eq!(classify(45.0, -2.5, 0, None, &thresholds), Likelihood::Medium);
        assert_eq!(classify(30.0, -5.0, 0, None, &thresholds), Likelihood::Medium);
        assert_eq!(classify(20.0, 0.5, 0, None, &thresholds), Likelihood::Medium);
        assert_eq!(classify(20.0, 0.0, 0, None, &thresholds), Likelihood::Low);
        assert_eq!(classify(10.0, 0.0, 0, None, &thresholds), Likelihood::Low);
    }

    #[test]
    fn floor_only_lifts_low_to_medium() {
        let thresholds = Thresholds::default();

        assert_eq!(classify(10.0, 0.0, 5, Some(5), &thresholds), Likelihood::Medium);
        assert_eq!(classify(10.0, 0.0, 4, Some(5), &thresholds), Likelihood::Low);
        assert_eq!(classify(45.0, -1.0, 0, Some(5), &thresholds), Likelihood::High);
        assert_eq!(classify(30.0, -5.0, 0, Some(5), &thresholds), Likelihood::Medium);
        assert_eq!(classify(45.0, -1.0, 50, Some(5), &thresholds), Likelihood::High);

        for pct in [0.0, 10.0, 20.0, 30.0, 50.0] {
            for flow in [-5.0, -1.0, 0.0, 3.0] {
                let without = classify(pct, flow, 8, None, &thresholds);
                let with = classify(pct, flow, 8, Some(5), &thresholds);
                match without {
                    Likelihood::Low => assert_eq!(with, Likelihood::Medium),
                    rated => assert_eq!(with, rated),
                }
            }
        }
    }

    #[test]
    fn uses_only_the_closest_stations() {
        let patterns = repository(vec![
            ("a", pattern(&[(8, -1.0)], None)),
            ("b", pattern(&[(8, -0.5)], None)),
            ("c", pattern(&[(8, -20.0)], None)),
        ]);
        let thresholds = Thresholds::default();
        let nearby = vec![
            station("a", 9, 11, 20),
            station("b", 9, 11, 20),
            station("c", 0, 20, 20),
        ];

        let prediction = Predictor::new(&patterns, &thresholds).predict(&nearby, friday(8));

        assert_eq!(prediction.bike_likelihood, Likelihood::High);
        assert_eq!(prediction.dock_likelihood, Likelihood::High);
        assert_abs_diff_eq!(prediction.net_flow_bikes, -1.5);
        assert_eq!(prediction.net_flow_docks, -prediction.net_flow_bikes);
        assert_eq!(prediction.day, "Friday");
        assert_eq!(prediction.hour, 8);
    }

    #[test]
    fn net_flow_rounds_half_to_even() {
        let patterns = repository(vec![
            ("a", pattern(&[(8, -0.625)], None)),
            ("b", pattern(&[(8, -0.625)], None)),
        ]);
        let thresholds = Thresholds::default();
        let nearby = vec![station("a", 9, 11, 20), station("b", 9, 11, 20)];

        let prediction = Predictor::new(&patterns, &thresholds).predict(&nearby, friday(8));

        assert_eq!(prediction.net_flow_bikes, -1.2);
        assert_eq!(prediction.net_flow_docks, 1.2);
    }

    #[test]
    fn empty_station_set_rates_low() {
        let patterns = repository(vec![]);
        let thresholds = Thresholds::default();

        let prediction = Predictor::new(&patterns, &thresholds).predict(&[], friday(8));

        assert_eq!(prediction.bike_likelihood, Likelihood::Low);
        assert_eq!(prediction.dock_likelihood, Likelihood::Low);
        assert_eq!(prediction.net_flow_bikes, 0.0);
        assert_eq!(prediction.bike_warning, None);
        assert_eq!(prediction.dock_warning, None);
    }

    #[test]
    fn unavailable_patterns_give_no_prediction() {
        let nearby = vec![station("a", 10, 10, 20)];
        assert_eq!(predict(None, &Thresholds::default(), &nearby, friday(8)), None);
    }

    #[test]
    fn depletion_warning_picks_earliest_material_event() {
        let patterns = repository(vec![
            ("a", pattern(&[], Some((11, 30.0)))),
            ("b", pattern(&[], Some((10, 16.0)))),
        ]);
        let thresholds = Thresholds::default();
        let nearby = vec![station("a", 5, 15, 20), station("b", 5, 15, 20)];

        let prediction = Predictor::new(&patterns, &thresholds).predict(&nearby, friday(8));

        assert_eq!(
            prediction.bike_warning.as_deref(),
            Some("Often runs low by 10 AM on Fridays")
        );
    }

    #[test]
    fn depletion_warning_window_and_severity() {
        let thresholds = Thresholds::default();
        let nearby = vec![station("a", 5, 15, 20)];
        let warn = |risk: (u32, f64), hour: u32| {
            let patterns = repository(vec![("a", pattern(&[], Some(risk)))]);
            Predictor::new(&patterns, &thresholds)
                .predict(&nearby, friday(hour))
                .bike_warning
        };

        assert!(warn((12, 20.0), 8).is_some());
        assert!(warn((13, 20.0), 8).is_none());
        assert!(warn((8, 20.0), 8).is_none());
        assert!(warn((7, 20.0), 8).is_none());
        assert!(warn((9, 15.0), 8).is_none());
        assert!(warn((9, 15.1), 8).is_some());
    }

    #[test]
    fn fill_warning_needs_strong_inflow_now() {
        let thresholds = Thresholds::default();
        let nearby = vec![station("a", 15, 5, 20)];

        let weak = repository(vec![("a", pattern(&[(8, 5.0), (9, 12.0)], None))]);
        let strong = repository(vec![("a", pattern(&[(8, 5.5), (9, 12.0)], None))]);

        let prediction = Predictor::new(&weak, &thresholds).predict(&nearby, friday(8));
        assert_eq!(prediction.dock_warning, None);

        let prediction = Predictor::new(&strong, &thresholds).predict(&nearby, friday(8));
        assert_eq!(
            prediction.dock_warning.as_deref(),
            Some("Fills up around 9 AM on Fridays")
        );
    }

    #[test]
    fn fill_warning_takes_earliest_hour_across_stations() {
        // The first station matches later in the window than the second;
        // the earlier hour wins regardless of station order.
        let patterns = repository(vec![
            ("a", pattern(&[(8, 3.0), (11, 9.0)], None)),
            ("b", pattern(&[(8, 3.0), (10, 9.0), (9, 8.0)], None)),
        ]);
        let thresholds = Thresholds::default();
        let nearby = vec![station("a", 15, 5, 20), station("b", 15, 5, 20)];

        let prediction = Predictor::new(&patterns, &thresholds).predict(&nearby, friday(8));

        assert_eq!(
            prediction.dock_warning.as_deref(),
            Some("Fills up around 10 AM on Fridays")
        );
    }

    #[test]
    fn fill_warning_stops_at_end_of_day() {
        let patterns = repository(vec![("a", pattern(&[(22, 9.0), (23, 12.0)], None))]);
        let thresholds = Thresholds::default();
        let nearby = vec![station("a", 15, 5, 20)];

        let prediction = Predictor::new(&patterns, &thresholds).predict(&nearby, friday(22));
        assert_eq!(
            prediction.dock_warning.as_deref(),
            Some("Fills up around 11 PM on Fridays")
        );

        let prediction = Predictor::new(&patterns, &thresholds).predict(&nearby, friday(23));
        assert_eq!(prediction.dock_warning, None);
    }
}
