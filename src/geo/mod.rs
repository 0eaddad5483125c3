//! Spherical-earth distance helpers.
//!
//! Distances use the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_M`]; this matches what the map layer and the backend use for
//! coverage radii, so do not swap in an ellipsoidal model here.

pub mod tiles;

use crate::models::Position;

/// Mean earth radius for the spherical approximation, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two lat/lon pairs given in degrees.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

pub fn distance_between(a: &Position, b: &Position) -> f64 {
    haversine_m(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Sum of consecutive haversine legs along a track.
pub fn track_length_m<'a, I>(points: I) -> f64
where
    I: IntoIterator<Item = &'a Position>,
{
    let mut total = 0.0;
    let mut previous: Option<&Position> = None;
    for point in points {
        if let Some(prev) = previous {
            total += distance_between(prev, point);
        }
        previous = Some(point);
    }
    total
}

/// Shift a coordinate by a metric offset. Accurate to well under a meter for
/// offsets of a few kilometers, which is all the callers need.
pub fn offset_by_meters(lat: f64, lon: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    let d_lat = (north_m / EARTH_RADIUS_M).to_degrees();
    let d_lon = (east_m / (EARTH_RADIUS_M * lat.to_radians().cos())).to_degrees();
    (lat + d_lat, lon + d_lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lon: f64) -> Position {
        Position::new(lat, lon, 0)
    }

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(haversine_m(52.52, 13.405, 52.52, 13.405), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_194.9).abs() < 1.0, "got {d}");
    }

    #[test]
    fn known_city_pair() {
        // Berlin -> Paris, roughly 878 km great-circle.
        let d = haversine_m(52.5200, 13.4050, 48.8566, 2.3522);
        assert!((d - 877_500.0).abs() < 2_000.0, "got {d}");
    }

    #[test]
    fn offsets_measure_back_to_requested_distance() {
        let (lat, lon) = offset_by_meters(40.0, -74.0, 30.0, 40.0);
        let d = haversine_m(40.0, -74.0, lat, lon);
        assert!((d - 50.0).abs() < 0.05, "got {d}");
    }

    #[test]
    fn track_length_sums_legs() {
        let a = at(0.0, 0.0);
        let b = at(0.0, 0.001);
        let c = at(0.0, 0.002);
        let total = track_length_m([&a, &b, &c]);
        let leg = distance_between(&a, &b);
        assert!((total - 2.0 * leg).abs() < 1e-6);
        assert_eq!(track_length_m(std::iter::empty()), 0.0);
        assert_eq!(track_length_m([&a]), 0.0);
    }
}
