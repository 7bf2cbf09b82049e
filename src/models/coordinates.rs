use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A geographic position with named fields.
///
/// Path parameters arrive as `"lat,lng"`, while GeoJSON and PostGIS expect
/// `[lng, lat]`. [`Coordinates::to_lng_lat`] is the only place the order flips.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, String> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err("Latitude and longitude must be finite numbers".to_string());
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!(
                "Invalid latitude: {} (must be between -90 and 90)",
                lat
            ));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(format!(
                "Invalid longitude: {} (must be between -180 and 180)",
                lng
            ));
        }
        Ok(Coordinates { lat, lng })
    }

    /// GeoJSON position order: `[longitude, latitude]`.
    pub fn to_lng_lat(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }

    /// WKT point for PostGIS (`POINT(lng lat)`).
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.lng, self.lat)
    }

    /// Great-circle angle between two positions in radians (haversine).
    pub fn central_angle_to(&self, other: &Coordinates) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Distance on a sphere of the given radius, in that radius' unit.
    pub fn distance_on_sphere(&self, other: &Coordinates, sphere_radius: f64) -> f64 {
        self.central_angle_to(other) * sphere_radius
    }
}

/// Parses the `"lat,lng"` path parameter format.
impl FromStr for Coordinates {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const FORMAT_HINT: &str = "Please provide latitude and longitude in the format lat,lng";

        let mut parts = s.split(',').map(str::trim);
        let (lat, lng) = match (parts.next(), parts.next(), parts.next()) {
            (Some(lat), Some(lng), None) if !lat.is_empty() && !lng.is_empty() => (lat, lng),
            _ => return Err(FORMAT_HINT.to_string()),
        };

        let lat: f64 = lat
            .parse()
            .map_err(|_| format!("{FORMAT_HINT} (latitude '{lat}' is not a number)"))?;
        let lng: f64 = lng
            .parse()
            .map_err(|_| format!("{FORMAT_HINT} (longitude '{lng}' is not a number)"))?;

        Coordinates::new(lat, lng)
    }
}
