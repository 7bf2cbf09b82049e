//! In-process tour repository.
//!
//! Evaluates the same typed pipelines and geo queries as the PostGIS
//! backend over a `Vec<Tour>`. The API and service tests run against it.

use crate::db::pipeline::{
    AccumulatorOp, FieldKind, GroupKey, Pipeline, SortOrder, Stage, TourField, GROUP_ID_FIELD,
};
use crate::db::tour_repository::{PreviousImages, TourRepository};
use crate::error::{AppError, Result};
use crate::models::{Coordinates, IngestedImages, Tour, TourDistance, TourSummary};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Float(f64),
    Integer(i64),
    Date(OffsetDateTime),
    List(Vec<Cell>),
}

impl Cell {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn compare(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Date(a), Cell::Date(b)) => a.cmp(b),
            (Cell::Integer(a), Cell::Integer(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        }
    }

    fn into_json(self) -> Result<Value> {
        Ok(match self {
            Cell::Text(s) => Value::String(s),
            Cell::Float(v) => json!(v),
            Cell::Integer(v) => json!(v),
            Cell::Date(d) => Value::String(format_date(d)?),
            Cell::List(cells) => Value::Array(
                cells
                    .into_iter()
                    .map(Cell::into_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }
}

fn format_date(d: OffsetDateTime) -> Result<String> {
    d.format(&Rfc3339)
        .map_err(|e| AppError::Internal(format!("Cannot format date: {}", e)))
}

type Row = BTreeMap<String, Cell>;

fn tour_to_row(tour: &Tour) -> Row {
    TourField::all()
        .into_iter()
        .map(|field| {
            let cell = match field {
                TourField::Name => Cell::Text(tour.name.clone()),
                TourField::Difficulty => Cell::Text(tour.difficulty.to_string()),
                TourField::Price => Cell::Float(tour.price),
                TourField::RatingsAverage => Cell::Float(tour.ratings_average),
                TourField::RatingsQuantity => Cell::Integer(tour.ratings_quantity),
                TourField::StartDates => {
                    Cell::List(tour.start_dates.iter().copied().map(Cell::Date).collect())
                }
            };
            (field.as_str().to_string(), cell)
        })
        .collect()
}

fn field_cell<'a>(row: &'a Row, field: TourField) -> Result<&'a Cell> {
    row.get(field.as_str())
        .ok_or_else(|| AppError::Internal(format!("Row is missing field '{}'", field)))
}

/// Run a validated pipeline over `tours`.
pub(crate) fn evaluate_pipeline(pipeline: &Pipeline, tours: &[Tour]) -> Result<Vec<Value>> {
    let mut rows: Vec<Row> = tours.iter().map(tour_to_row).collect();

    for stage in pipeline.stages() {
        rows = match stage {
            Stage::Unwind(field) => {
                let mut out = Vec::new();
                for row in rows {
                    if let Some(Cell::List(items)) = row.get(field.as_str()) {
                        for item in items {
                            let mut expanded = row.clone();
                            expanded.insert(field.as_str().to_string(), item.clone());
                            out.push(expanded);
                        }
                    }
                }
                out
            }
            Stage::MatchDateRange { field, from, to } => rows
                .into_iter()
                .filter(|row| {
                    matches!(row.get(field.as_str()), Some(Cell::Date(d)) if d >= from && d <= to)
                })
                .collect(),
            Stage::Group { key, accumulators } => {
                let mut groups: Vec<(Cell, Vec<Row>)> = Vec::new();
                for row in rows {
                    let key_cell = group_key(key, &row)?;
                    match groups.iter_mut().find(|(k, _)| *k == key_cell) {
                        Some((_, members)) => members.push(row),
                        None => groups.push((key_cell, vec![row])),
                    }
                }

                let mut out = Vec::with_capacity(groups.len());
                for (key_cell, members) in groups {
                    let mut record = Row::new();
                    record.insert(GROUP_ID_FIELD.to_string(), key_cell);
                    for acc in accumulators {
                        record.insert(acc.output.clone(), accumulate(&acc.op, &members)?);
                    }
                    out.push(record);
                }
                out
            }
            Stage::AddField { name, source } => rows
                .into_iter()
                .map(|mut row| {
                    if let Some(value) = row.get(source).cloned() {
                        row.insert(name.clone(), value);
                    }
                    row
                })
                .collect(),
            Stage::Sort { field, order } => {
                // Stable, so ties keep group order
                rows.sort_by(|a, b| {
                    let ord = match (a.get(field), b.get(field)) {
                        (Some(x), Some(y)) => x.compare(y),
                        _ => Ordering::Equal,
                    };
                    match order {
                        SortOrder::Ascending => ord,
                        SortOrder::Descending => ord.reverse(),
                    }
                });
                rows
            }
            Stage::Exclude(excluded) => rows
                .into_iter()
                .map(|mut row| {
                    for name in excluded {
                        row.remove(name);
                    }
                    row
                })
                .collect(),
            Stage::Limit(n) => {
                rows.truncate(*n as usize);
                rows
            }
        };
    }

    rows.into_iter()
        .map(|row| {
            let mut doc = serde_json::Map::new();
            for (k, cell) in row {
                doc.insert(k, cell.into_json()?);
            }
            Ok(Value::Object(doc))
        })
        .collect()
}

fn group_key(key: &GroupKey, row: &Row) -> Result<Cell> {
    match key {
        GroupKey::Upper(field) => match field_cell(row, *field)? {
            Cell::Text(s) => Ok(Cell::Text(s.to_uppercase())),
            other => Err(AppError::Internal(format!("Cannot uppercase {:?}", other))),
        },
        GroupKey::Month(field) => match field_cell(row, *field)? {
            Cell::Date(d) => {
                let month = d.to_offset(time::UtcOffset::UTC).month() as u8;
                Ok(Cell::Integer(i64::from(month)))
            }
            other => Err(AppError::Internal(format!("Cannot take month of {:?}", other))),
        },
    }
}

fn accumulate(op: &AccumulatorOp, members: &[Row]) -> Result<Cell> {
    let numbers = |field: TourField| -> Result<Vec<f64>> {
        members
            .iter()
            .map(|row| {
                field_cell(row, field)?
                    .as_f64()
                    .ok_or_else(|| AppError::Internal(format!("Field '{}' is not numeric", field)))
            })
            .collect()
    };

    Ok(match op {
        AccumulatorOp::Count => Cell::Integer(members.len() as i64),
        AccumulatorOp::Sum(f) if f.kind() == FieldKind::Integer => {
            Cell::Integer(numbers(*f)?.iter().map(|v| *v as i64).sum())
        }
        AccumulatorOp::Sum(f) => Cell::Float(numbers(*f)?.iter().sum()),
        AccumulatorOp::Avg(f) => {
            let values = numbers(*f)?;
            Cell::Float(values.iter().sum::<f64>() / values.len().max(1) as f64)
        }
        AccumulatorOp::Min(f) => Cell::Float(numbers(*f)?.into_iter().fold(f64::INFINITY, f64::min)),
        AccumulatorOp::Max(f) => {
            Cell::Float(numbers(*f)?.into_iter().fold(f64::NEG_INFINITY, f64::max))
        }
        AccumulatorOp::Push(f) => Cell::List(
            members
                .iter()
                .map(|row| field_cell(row, *f).cloned())
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

/// Tour collection held in memory behind an async lock.
#[derive(Default)]
pub struct MemoryTourRepository {
    tours: RwLock<Vec<Tour>>,
}

impl MemoryTourRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tours(tours: Vec<Tour>) -> Self {
        MemoryTourRepository {
            tours: RwLock::new(tours),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Tour> {
        self.tours.read().await.iter().find(|t| t.id == id).cloned()
    }
}

#[async_trait]
impl TourRepository for MemoryTourRepository {
    async fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Value>> {
        let tours = self.tours.read().await;
        evaluate_pipeline(pipeline, &tours)
    }

    async fn find_within_sphere(
        &self,
        center: &Coordinates,
        radius_radians: f64,
    ) -> Result<Vec<Tour>> {
        let tours = self.tours.read().await;
        Ok(tours
            .iter()
            .filter(|t| center.central_angle_to(&t.start_location.to_coordinates()) <= radius_radians)
            .cloned()
            .collect())
    }

    async fn geo_near(&self, center: &Coordinates, multiplier: f64) -> Result<Vec<TourDistance>> {
        let tours = self.tours.read().await;
        let mut results: Vec<TourDistance> = tours
            .iter()
            .map(|t| {
                let meters = center.distance_on_sphere(
                    &t.start_location.to_coordinates(),
                    crate::constants::POSTGIS_SPHERE_RADIUS_METERS,
                );
                TourDistance {
                    name: t.name.clone(),
                    distance: meters * multiplier,
                }
            })
            .collect();

        results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        Ok(results)
    }

    async fn top_tours(&self, limit: i64) -> Result<Vec<TourSummary>> {
        let tours = self.tours.read().await;
        let mut sorted: Vec<&Tour> = tours.iter().collect();
        sorted.sort_by(|a, b| {
            a.price
                .partial_cmp(&b.price)
                .unwrap_or(Ordering::Equal)
                .then(
                    a.ratings_average
                        .partial_cmp(&b.ratings_average)
                        .unwrap_or(Ordering::Equal),
                )
        });
        Ok(sorted
            .into_iter()
            .take(limit.max(0) as usize)
            .map(TourSummary::from)
            .collect())
    }

    async fn replace_images(
        &self,
        id: Uuid,
        images: &IngestedImages,
    ) -> Result<Option<PreviousImages>> {
        let mut tours = self.tours.write().await;
        let Some(tour) = tours.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        let previous = PreviousImages {
            image_cover: tour.image_cover.clone(),
            images: tour.images.clone(),
        };
        if let Some(ref cover) = images.image_cover {
            tour.image_cover = Some(cover.clone());
        }
        if !images.images.is_empty() {
            tour.images = images.images.clone();
        }
        Ok(Some(previous))
    }

    async fn insert(&self, tour: &Tour) -> Result<Uuid> {
        self.tours.write().await.push(tour.clone());
        Ok(tour.id)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tours.read().await.len() as i64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "memory_repo_tests.rs"]
mod memory_repo_tests;
