//! Great-circle distance between stations
use ecofare_core::Coordinates;

/// Mean Earth radius (IUGG), meters
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance in meters
pub fn great_circle_meters(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
