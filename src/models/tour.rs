use crate::models::Coordinates;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "difficult" => Ok(Difficulty::Difficult),
            _ => Err(format!("Invalid difficulty: {}", s)),
        }
    }
}

/// A GeoJSON point. Coordinates are stored `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "geojson::Geometry", try_from = "geojson::Geometry")]
pub struct GeoPoint {
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn to_coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat(),
            lng: self.lng(),
        }
    }
}

impl From<Coordinates> for GeoPoint {
    fn from(c: Coordinates) -> Self {
        GeoPoint {
            coordinates: c.to_lng_lat(),
        }
    }
}

impl From<GeoPoint> for geojson::Geometry {
    fn from(p: GeoPoint) -> Self {
        geojson::Geometry::new(geojson::Value::Point(p.coordinates.to_vec()))
    }
}

impl TryFrom<geojson::Geometry> for GeoPoint {
    type Error = String;

    fn try_from(geometry: geojson::Geometry) -> Result<Self, Self::Error> {
        match geometry.value {
            geojson::Value::Point(position) if position.len() >= 2 => {
                let c = Coordinates::new(position[1], position[0])?;
                Ok(GeoPoint::from(c))
            }
            geojson::Value::Point(_) => Err("Point needs longitude and latitude".to_string()),
            _ => Err("Expected a Point geometry".to_string()),
        }
    }
}

impl FromStr for GeoPoint {
    type Err = String;

    /// Parses a GeoJSON geometry string such as PostGIS `ST_AsGeoJSON` output.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let geojson: geojson::GeoJson = s
            .parse()
            .map_err(|e: geojson::Error| format!("Invalid GeoJSON: {}", e))?;
        match geojson {
            geojson::GeoJson::Geometry(geometry) => GeoPoint::try_from(geometry),
            _ => Err("Expected a GeoJSON geometry".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub difficulty: Difficulty,
    pub ratings_quantity: i64,
    pub ratings_average: f64,
    pub price: f64,
    #[serde(with = "rfc3339_list")]
    pub start_dates: Vec<OffsetDateTime>,
    pub start_location: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Projection used by the top-tours alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourSummary {
    pub name: String,
    pub price: f64,
    pub ratings_average: f64,
    pub summary: Option<String>,
    pub difficulty: Difficulty,
}

impl From<&Tour> for TourSummary {
    fn from(tour: &Tour) -> Self {
        TourSummary {
            name: tour.name.clone(),
            price: tour.price,
            ratings_average: tour.ratings_average,
            summary: tour.summary.clone(),
            difficulty: tour.difficulty,
        }
    }
}

mod rfc3339_list {
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(dates: &[OffsetDateTime], s: S) -> Result<S::Ok, S::Error> {
        let formatted = dates
            .iter()
            .map(|d| d.format(&Rfc3339))
            .collect::<Result<Vec<_>, _>>()
            .map_err(S::Error::custom)?;
        s.collect_seq(formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<OffsetDateTime>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|raw| OffsetDateTime::parse(raw, &Rfc3339).map_err(D::Error::custom))
            .collect()
    }
}
