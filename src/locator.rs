use itertools::Itertools;

use crate::{data::StationSnapshot, gbfs::Snapshot};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two points given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

impl Snapshot {
    /// Merges both feed halves into in-service stations measured from the
    /// given point, in feed order. Stations without a status entry, or with
    /// any status other than in-service, are left out.
    pub fn stations_from(&self, lat: f64, lon: f64) -> impl Iterator<Item = StationSnapshot> + '_ {
        self.info.iter().filter_map(move |info| {
            let status = self.status.get(&info.station_id)?;
            if !status.is_in_service() {
                return None;
            }

            Some(StationSnapshot {
                id: info.station_id.to_owned(),
                name: info.name.to_owned(),
                address: info.address.clone().unwrap_or_else(|| info.name.to_owned()),
                lat: info.lat,
                lon: info.lon,
                capacity: info.capacity,
                is_charging: info.is_charging_station,
                bikes_available: status.num_bikes_available,
                ebikes_available: status.num_ebikes_available,
                docks_available: status.num_docks_available,
                distance_m: haversine_distance(lat, lon, info.lat, info.lon),
            })
        })
    }

    /// The `count` closest in-service stations, nearest first. Equal
    /// distances keep feed order.
    pub fn nearest_stations(&self, lat: f64, lon: f64, count: usize) -> Vec<StationSnapshot> {
        self.stations_from(lat, lon)
            .sorted_by(|x, y| x.distance_m.total_cmp(&y.distance_m))
            .take(count)
            .collect()
    }
}
