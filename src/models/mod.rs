pub mod coordinates;
pub mod distance;
pub mod image;
pub mod stats;
pub mod tour;

pub use coordinates::Coordinates;
pub use distance::DistanceUnit;
pub use image::{CleanupOutcome, ImageCategory, IngestedImages, UploadedFile};
pub use stats::{DifficultyStats, MonthlyPlan, TourDistance};
pub use tour::{Difficulty, GeoPoint, Tour, TourSummary};
