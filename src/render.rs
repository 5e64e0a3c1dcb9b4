use std::fmt::Write;

use crate::{
    data::{Likelihood, PredictionResult, TimeOfWeek, Totals},
    engine::{Dashboard, LocationReport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Swiftbar,
}

pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters as u32)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

pub const BAR_WIDTH: usize = 12;

fn cells(count: u32, capacity: u32, width: usize) -> usize {
    (f64::from(count.min(capacity)) / f64::from(capacity) * width as f64) as usize
}

/// Share of capacity held by regular bikes (█) then e-bikes (▓).
pub fn bike_bar(bikes: u32, ebikes: u32, capacity: u32, width: usize) -> String {
    if capacity == 0 {
        return "N/A".to_owned();
    }

    let bike_cells = cells(bikes, capacity, width);
    let ebike_cells = cells(ebikes, capacity, width).min(width - bike_cells);
    format!(
        "{}{}{}",
        "█".repeat(bike_cells),
        "▓".repeat(ebike_cells),
        "░".repeat(width - bike_cells - ebike_cells)
    )
}

pub fn dock_bar(docks: u32, capacity: u32, width: usize) -> String {
    if capacity == 0 {
        return "N/A".to_owned();
    }

    let dock_cells = cells(docks, capacity, width);
    format!("{}{}", "█".repeat(dock_cells), "░".repeat(width - dock_cells))
}

const LEGEND: &str = "█ Regular Bikes  ▓ E-Bikes  █ Available Docks  ░ Empty/Used  ⚡ Charging Station\n\
    Predictions: HIGH=good availability+stable trend  MEDIUM=okay but changing  LOW=limited availability";

fn symbol(likelihood: Likelihood) -> &'static str {
    match likelihood {
        Likelihood::High => "✓",
        Likelihood::Medium => "⚠",
        Likelihood::Low => "✗",
    }
}

fn color(likelihood: Likelihood) -> &'static str {
    match likelihood {
        Likelihood::High => "green",
        Likelihood::Medium => "yellow",
        Likelihood::Low => "red",
    }
}

fn title(report: &LocationReport) -> String {
    let emoji = report.location.emoji.as_deref().unwrap_or("📍");
    let name = report.location.address.as_deref().unwrap_or(&report.name);
    format!("{} {}", emoji, name)
}

fn prediction_lines(out: &mut String, prediction: Option<&PredictionResult>) -> std::fmt::Result {
    let Some(prediction) = prediction else {
        return writeln!(out, "  No prediction data available");
    };

    write!(
        out,
        "  Get a Bike:  {} {}",
        prediction.bike_likelihood,
        symbol(prediction.bike_likelihood)
    )?;
    if let Some(warning) = &prediction.bike_warning {
        write!(out, "    {}", warning)?;
    }
    writeln!(out)?;

    write!(
        out,
        "  Find a Dock: {} {}",
        prediction.dock_likelihood,
        symbol(prediction.dock_likelihood)
    )?;
    if let Some(warning) = &prediction.dock_warning {
        write!(out, "    {}", warning)?;
    }
    writeln!(out)
}

fn location_block(out: &mut String, report: &LocationReport) -> std::fmt::Result {
    writeln!(out, "{}", title(report))?;
    prediction_lines(out, report.prediction.as_ref())?;
    writeln!(out)?;

    for station in &report.nearby {
        let charging = if station.is_charging { "⚡ " } else { "" };
        let ebikes = if station.ebikes_available > 0 {
            format!("+{}e", station.ebikes_available)
        } else {
            String::default()
        };

        writeln!(
            out,
            "  {:<32} {:>7}  {} {:>2}{:<4} {} {:>2}/{}",
            format!("{}{}", charging, station.name),
            format_distance(station.distance_m),
            bike_bar(
                station.bikes_available,
                station.ebikes_available,
                station.capacity,
                BAR_WIDTH
            ),
            station.bikes_available,
            ebikes,
            dock_bar(station.docks_available, station.capacity, BAR_WIDTH),
            station.docks_available,
            station.capacity
        )?;
    }

    let totals: Totals = report.nearby.iter().collect();
    writeln!(
        out,
        "  Nearby totals: {} bikes + {} e-bikes | {} docks",
        totals.bikes, totals.ebikes, totals.docks
    )
}

fn text(dashboard: &Dashboard) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let now = TimeOfWeek::from(dashboard.timestamp);
    let trip = &dashboard.trip_summary;

    writeln!(out, "Toronto Bike Share • Live Availability + Predictions")?;
    writeln!(
        out,
        "{} {}",
        now.day_name(),
        dashboard.timestamp.format("%Y-%m-%d %I:%M:%S %p")
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "Trip: {} - {}  ({} → {})",
        trip.confidence, trip.message, trip.direction.from, trip.direction.to
    )?;
    writeln!(out)?;

    for report in [dashboard.origin(), dashboard.destination()] {
        location_block(&mut out, report)?;
        writeln!(out)?;
    }

    writeln!(out, "{}", LEGEND)?;
    writeln!(out)?;

    write!(
        out,
        "Showing {} nearest stations (predictions based on closest {}) • {} active stations • Predictions based on {}",
        dashboard.meta.nearby_stations,
        dashboard.meta.prediction_stations,
        dashboard.meta.total_stations,
        dashboard.meta.prediction_source
    )?;

    Ok(out)
}

fn swiftbar(dashboard: &Dashboard) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let trip = &dashboard.trip_summary;
    let tint = color(trip.confidence);
    let icon = match trip.confidence {
        Likelihood::Low => "exclamationmark.triangle",
        _ => "bicycle",
    };

    writeln!(out, ":{}: {} | sfimage={} color={}", icon, trip.confidence, icon, tint)?;
    writeln!(out, "---")?;
    writeln!(out, "{} | size=14 color={}", trip.message, tint)?;
    if let Some(leave_by) = &trip.leave_by {
        writeln!(out, "Leave by: {} | size=12 color=orange", leave_by)?;
    }
    writeln!(out, "---")?;

    for (report, role) in dashboard.locations.iter().zip(["START", "END"]) {
        let emoji = report.location.emoji.as_deref().unwrap_or("📍");
        writeln!(out, "{} {} ({}) | size=13 font=Menlo color=white", emoji, report.name, role)?;

        if let Some(prediction) = &report.prediction {
            writeln!(
                out,
                "Bikes: {} • Docks: {} | size=11 color=gray",
                prediction.bike_likelihood, prediction.dock_likelihood
            )?;
            if let Some(warning) = &prediction.bike_warning {
                writeln!(out, "⚠️ {} | size=11 color=orange", warning)?;
            }
        }

        for station in &report.nearby {
            writeln!(
                out,
                "🚲 {:<2} 🔌 {:<2} - {} ({}) | font=Menlo size=11 trim=false",
                station.bikes_available,
                station.docks_available,
                station.name,
                format_distance(station.distance_m)
            )?;
        }
        writeln!(out, "---")?;
    }

    write!(out, "Refresh | refresh=true")?;
    Ok(out)
}

pub fn render(dashboard: &Dashboard, format: Format) -> anyhow::Result<String> {
    Ok(match format {
        Format::Text => text(dashboard)?,
        Format::Json => serde_json::to_string_pretty(dashboard)?,
        Format::Swiftbar => swiftbar(dashboard)?,
    })
}

/// What to print when a pass could not produce a dashboard.
pub fn render_error(message: &str, format: Format) -> String {
    match format {
        Format::Text => message.to_owned(),
        Format::Json => serde_json::json!({ "error": message }).to_string(),
        Format::Swiftbar => format!("⚠️ Error | color=red\n---\n{}", message),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        config::Settings,
        data::{Direction, Location, StationSnapshot, TripSummary},
        engine::Meta,
    };

    fn report(name: &str, prediction: Option<PredictionResult>) -> LocationReport {
        LocationReport {
            name: name.to_owned(),
            location: Location {
                lat: 43.6375,
                lon: -79.403,
                emoji: Some("🏠".to_owned()),
                address: None,
            },
            nearby: vec![StationSnapshot {
                id: "7000".to_owned(),
                name: "Fort York Blvd / Capreol Ct".to_owned(),
                address: "Fort York Blvd / Capreol Ct".to_owned(),
                lat: 43.6376,
                lon: -79.4031,
                capacity: 35,
                is_charging: true,
                bikes_available: 10,
                ebikes_available: 2,
                docks_available: 23,
                distance_m: 1234.0,
            }],
            prediction,
            total_bikes: 10,
        }
    }

    fn dashboard() -> Dashboard {
        let prediction = PredictionResult {
            bike_likelihood: Likelihood::Medium,
            dock_likelihood: Likelihood::High,
            bike_warning: Some("Often runs low by 10 AM on Tuesdays".to_owned()),
            dock_warning: None,
            net_flow_bikes: -6.0,
            net_flow_docks: 6.0,
            day: "Tuesday".to_owned(),
            hour: 8,
        };

        Dashboard {
            timestamp: NaiveDate::from_ymd_opt(2024, 10, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            is_morning: true,
            direction: Direction {
                from: "Home".to_owned(),
                to: "Work".to_owned(),
            },
            trip_summary: TripSummary {
                confidence: Likelihood::Medium,
                message: "Safe to bike, but leave by 8:20 AM".to_owned(),
                leave_by: Some("8:20 AM".to_owned()),
                bike_likelihood: Likelihood::Medium,
                dock_likelihood: Likelihood::High,
                direction: Direction {
                    from: "Home".to_owned(),
                    to: "Work".to_owned(),
                },
            },
            locations: [report("Home", Some(prediction)), report("Work", None)],
            meta: Meta {
                total_stations: 650,
                prediction_source: "unknown".to_owned(),
                nearby_stations: Settings::default().thresholds.nearby_stations,
                prediction_stations: 2,
            },
        }
    }

    #[test]
    fn distances_switch_to_kilometres() {
        assert_eq!(format_distance(87.9), "87m");
        assert_eq!(format_distance(999.0), "999m");
        assert_eq!(format_distance(1234.0), "1.2km");
    }

    #[test]
    fn text_dashboard() {
        let out = render(&dashboard(), Format::Text).unwrap();

        assert!(out.contains("Tuesday 2024-10-01 08:00:00 AM"));
        assert!(out.contains("Trip: MEDIUM - Safe to bike, but leave by 8:20 AM  (Home → Work)"));
        assert!(out.contains("Get a Bike:  MEDIUM ⚠    Often runs low by 10 AM on Tuesdays"));
        assert!(out.contains("No prediction data available"));
        assert!(out.contains("⚡ Fort York Blvd / Capreol Ct"));
        assert!(out.contains("Nearby totals: 10 bikes + 2 e-bikes | 23 docks"));
        assert!(out.contains("███░░░░░░░░░ 10+2e  ███████░░░░░ 23/35"));
        assert!(out.contains("░ Empty/Used"));
        assert!(out.contains("LOW=limited availability"));
    }

    #[test]
    fn availability_bars() {
        assert_eq!(bike_bar(10, 2, 35, 12), "███░░░░░░░░░");
        assert_eq!(bike_bar(10, 10, 20, 12), "██████▓▓▓▓▓▓");
        assert_eq!(bike_bar(0, 20, 20, 4), "▓▓▓▓");
        assert_eq!(bike_bar(30, 30, 20, 4), "████");
        assert_eq!(bike_bar(5, 0, 0, 12), "N/A");
        assert_eq!(dock_bar(23, 35, 12), "███████░░░░░");
        assert_eq!(dock_bar(0, 35, 4), "░░░░");
        assert_eq!(dock_bar(3, 0, 12), "N/A");
    }

    #[test]
    fn swiftbar_menu() {
        let out = render(&dashboard(), Format::Swiftbar).unwrap();
        let lines = out.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], ":bicycle: MEDIUM | sfimage=bicycle color=yellow");
        assert_eq!(lines[3], "Leave by: 8:20 AM | size=12 color=orange");
        assert!(out.contains("🏠 Home (START)"));
        assert!(out.contains("🏠 Work (END)"));
        assert!(out.contains("🚲 10 🔌 23 - Fort York Blvd / Capreol Ct (1.2km)"));
        assert_eq!(lines.last(), Some(&"Refresh | refresh=true"));
    }

    #[test]
    fn json_dashboard_round_trips_key_fields() {
        let out = render(&dashboard(), Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["trip_summary"]["leave_by"], "8:20 AM");
        assert_eq!(value["direction"]["to"], "Work");
        assert_eq!(value["locations"]["Work"]["prediction"], serde_json::Value::Null);
        assert_eq!(value["meta"]["total_stations"], 650);
    }

    #[test]
    fn errors_render_per_format() {
        assert_eq!(
            render_error("Error fetching data", Format::Swiftbar),
            "⚠️ Error | color=red\n---\nError fetching data"
        );
        assert_eq!(
            render_error("Error fetching data", Format::Json),
            r#"{"error":"Error fetching data"}"#
        );
    }
}
