//! Derived records computed per request. None of these are persisted or cached.

use serde::{Deserialize, Serialize};

/// One record per difficulty label present in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    /// Uppercased difficulty label, e.g. `EASY`
    #[serde(rename = "_id")]
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts falling in one calendar month of the requested year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPlan {
    /// Calendar month, 1-12
    pub month: u8,
    /// Number of tour starts in the month
    pub amount: i64,
    /// Tour names, once per matching start date
    pub name: Vec<String>,
}

/// Distance of one tour's start location from a reference point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourDistance {
    pub name: String,
    /// In the unit requested by the caller
    pub distance: f64,
}
