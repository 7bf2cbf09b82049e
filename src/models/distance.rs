use crate::constants::{EARTH_RADIUS_KM, EARTH_RADIUS_MI, KILOMETERS_PER_METER, MILES_PER_METER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display unit for proximity queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Mi,
    #[default]
    Km,
}

impl DistanceUnit {
    /// `"mi"` selects miles; anything else falls back to kilometers.
    pub fn from_param(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "mi" => DistanceUnit::Mi,
            "km" => DistanceUnit::Km,
            other => {
                if !other.is_empty() {
                    tracing::debug!("Unknown distance unit '{}', using km", other);
                }
                DistanceUnit::Km
            }
        }
    }

    /// Earth radius expressed in this unit.
    pub fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::Mi => EARTH_RADIUS_MI,
            DistanceUnit::Km => EARTH_RADIUS_KM,
        }
    }

    /// How many of this unit fit in one meter.
    pub fn per_meter(self) -> f64 {
        match self {
            DistanceUnit::Mi => MILES_PER_METER,
            DistanceUnit::Km => KILOMETERS_PER_METER,
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceUnit::Mi => write!(f, "mi"),
            DistanceUnit::Km => write!(f, "km"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_parsing() {
        assert_eq!(DistanceUnit::from_param("mi"), DistanceUnit::Mi);
        assert_eq!(DistanceUnit::from_param("MI"), DistanceUnit::Mi);
        assert_eq!(DistanceUnit::from_param("km"), DistanceUnit::Km);
        assert_eq!(DistanceUnit::from_param(""), DistanceUnit::Km);
        assert_eq!(DistanceUnit::from_param("furlongs"), DistanceUnit::Km);
    }

    #[test]
    fn test_per_meter() {
        assert!((1000.0 * DistanceUnit::Km.per_meter() - 1.0).abs() < 1e-12);
        assert!((1000.0 * DistanceUnit::Mi.per_meter() - 0.621371).abs() < 1e-9);
    }

    #[test]
    fn test_unit_display() {
        assert_eq!(DistanceUnit::Mi.to_string(), "mi");
        assert_eq!(DistanceUnit::Km.to_string(), "km");
    }
}
