use crate::{
    config::Thresholds,
    data::{
        format_time_12h, Direction, Likelihood, PredictionResult, TimeOfWeek, TripSummary, HOME,
        WORK,
    },
};

/// Home to work before noon, work to home from noon on.
pub fn direction(now: TimeOfWeek) -> Direction {
    let (from, to) = if now.is_morning() {
        (HOME, WORK)
    } else {
        (WORK, HOME)
    };

    Direction {
        from: from.to_owned(),
        to: to.to_owned(),
    }
}

/// Combines both legs into one rating. No bike at the origin means no
/// trip, whatever the docks look like; otherwise bikes weigh more.
pub fn trip_confidence(
    bikes: Likelihood,
    docks: Likelihood,
    thresholds: &Thresholds,
) -> Likelihood {
    if bikes == Likelihood::Low {
        return Likelihood::Low;
    }

    let score = f64::from(bikes.score()) * thresholds.trip_bike_weight
        + f64::from(docks.score()) * thresholds.trip_dock_weight;

    if score >= thresholds.trip_high_score {
        Likelihood::High
    } else if score >= thresholds.trip_medium_score {
        Likelihood::Medium
    } else {
        Likelihood::Low
    }
}

/// Latest sensible departure before the origin drains to the bike floor,
/// as minutes since midnight. Only produced for a near-term deadline.
pub fn leave_by_minutes(
    origin_bikes: u32,
    net_flow_bikes: f64,
    now: TimeOfWeek,
    thresholds: &Thresholds,
) -> Option<f64> {
    if net_flow_bikes >= 0.0 {
        return None;
    }

    let floor = thresholds.bike_floor?;
    let bikes_above_floor = i64::from(origin_bikes) - i64::from(floor);
    if bikes_above_floor <= 0 {
        return None;
    }

    let hours_until_floor = bikes_above_floor as f64 / net_flow_bikes.abs();
    let current = now.minutes_since_midnight();
    let leave_by = current + hours_until_floor * 60.0 - thresholds.leave_by_buffer_minutes;

    if leave_by <= current || leave_by - current > thresholds.leave_by_horizon_hours * 60.0 {
        return None;
    }

    Some(leave_by)
}

pub fn format_leave_by(minutes: f64) -> String {
    let minutes = minutes.floor() as u32;
    format_time_12h((minutes / 60) % 24, minutes % 60)
}

pub fn trip_message(
    confidence: Likelihood,
    bikes: Likelihood,
    docks: Likelihood,
    leave_by: Option<&str>,
    destination: &str,
) -> String {
    match (confidence, bikes, docks, leave_by) {
        (Likelihood::Low, ..) => "Consider transit/walking".to_owned(),
        (Likelihood::High, ..) => "Safe to bike".to_owned(),
        (_, Likelihood::High, Likelihood::Low, _) => {
            format!("Docks may be tight at {}", destination.to_lowercase())
        }
        (_, _, _, Some(time)) => format!("Safe to bike, but leave by {}", time),
        _ => "Safe to bike".to_owned(),
    }
}

/// Summarises the active trip. A missing prediction on either side counts
/// as LOW with no flow, so the summary is always produced.
pub fn summarize(
    origin: Option<&PredictionResult>,
    destination: Option<&PredictionResult>,
    origin_bikes: u32,
    now: TimeOfWeek,
    thresholds: &Thresholds,
) -> TripSummary {
    let direction = direction(now);

    let bike_likelihood = origin.map_or(Likelihood::Low, |p| p.bike_likelihood);
    let dock_likelihood = destination.map_or(Likelihood::Low, |p| p.dock_likelihood);
    let net_flow_bikes = origin.map_or(0.0, |p| p.net_flow_bikes);

    let confidence = trip_confidence(bike_likelihood, dock_likelihood, thresholds);
    let leave_by =
        leave_by_minutes(origin_bikes, net_flow_bikes, now, thresholds).map(format_leave_by);
    let message = trip_message(
        confidence,
        bike_likelihood,
        dock_likelihood,
        leave_by.as_deref(),
        &direction.to,
    );

    TripSummary {
        confidence,
        message,
        leave_by,
        bike_likelihood,
        dock_likelihood,
        direction,
    }
}
