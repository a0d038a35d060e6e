//! Spatial math for waypoint checks.

use crate::models::Position;

/// WGS84 semi-major axis.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Earth-centered, earth-fixed coordinates in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Project a geodetic position onto the WGS84 ellipsoid frame.
pub fn to_ecef(position: &Position) -> Ecef {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let lat = position.lat.to_radians();
    let lon = position.lon.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let h = position.alt_m;

    Ecef {
        x: (n + h) * cos_lat * lon.cos(),
        y: (n + h) * cos_lat * lon.sin(),
        z: (n * (1.0 - e2) + h) * sin_lat,
    }
}

/// Straight-line distance between two positions, altitude included.
pub fn distance_3d(a: &Position, b: &Position) -> f64 {
    let a = to_ecef(a);
    let b = to_ecef(b);
    let (dx, dy, dz) = (a.x - b.x, a.y - b.y, a.z - b.z);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

pub fn meters_per_deg_lat(lat_deg: f64) -> f64 {
    let lat_rad = lat_deg.to_radians();
    111_132.954 - 559.822 * (2.0 * lat_rad).cos() + 1.175 * (4.0 * lat_rad).cos()
        - 0.0023 * (6.0 * lat_rad).cos()
}

/// Latitude delta (degrees) for a northward offset in meters.
pub fn meters_to_lat(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / meters_per_deg_lat(ref_lat_deg)
}
