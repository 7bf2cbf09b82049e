//! Unit conversions for spherical proximity queries.

use crate::error::{AppError, Result};
use crate::models::DistanceUnit;

/// Angular radius (radians) of a cap whose surface radius is `distance`.
pub fn radius_from_distance(distance: f64, unit: DistanceUnit) -> Result<f64> {
    if !distance.is_finite() || distance <= 0.0 {
        return Err(AppError::Validation(format!(
            "Distance must be a positive number, got {}",
            distance
        )));
    }
    Ok(distance / unit.earth_radius())
}

/// Factor turning near-query meters into `unit`.
pub fn distance_multiplier(unit: DistanceUnit) -> f64 {
    unit.per_meter()
}
