//! Typed aggregation pipelines over the tour collection.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s assembled with
//! [`PipelineBuilder`] and validated before any repository sees it. Both
//! repository backends execute the same stage list: PostGIS compiles it to
//! chained CTEs, the in-memory backend evaluates it directly.
//!
//! Stages before the single `Group` operate on tour documents (optionally
//! unwound); stages after it operate on group output records, whose fields
//! are `_id` plus one field per accumulator.

use crate::error::{AppError, Result};
use std::fmt;
use time::OffsetDateTime;

/// Name of the grouping key in group output records.
pub const GROUP_ID_FIELD: &str = "_id";

/// Fields of a tour document that pipelines may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TourField {
    Name,
    Difficulty,
    Price,
    RatingsAverage,
    RatingsQuantity,
    StartDates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Float,
    Integer,
    DateArray,
}

impl TourField {
    /// Document-level name, also used as the quoted SQL alias.
    pub fn as_str(self) -> &'static str {
        match self {
            TourField::Name => "name",
            TourField::Difficulty => "difficulty",
            TourField::Price => "price",
            TourField::RatingsAverage => "ratingsAverage",
            TourField::RatingsQuantity => "ratingsQuantity",
            TourField::StartDates => "startDates",
        }
    }

    /// Column in the `tours` table.
    pub fn column(self) -> &'static str {
        match self {
            TourField::Name => "name",
            TourField::Difficulty => "difficulty",
            TourField::Price => "price",
            TourField::RatingsAverage => "ratings_average",
            TourField::RatingsQuantity => "ratings_quantity",
            TourField::StartDates => "start_dates",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            TourField::Name | TourField::Difficulty => FieldKind::Text,
            TourField::Price | TourField::RatingsAverage => FieldKind::Float,
            TourField::RatingsQuantity => FieldKind::Integer,
            TourField::StartDates => FieldKind::DateArray,
        }
    }

    pub fn all() -> [TourField; 6] {
        [
            TourField::Name,
            TourField::Difficulty,
            TourField::Price,
            TourField::RatingsAverage,
            TourField::RatingsQuantity,
            TourField::StartDates,
        ]
    }

    fn is_numeric(self) -> bool {
        matches!(self.kind(), FieldKind::Float | FieldKind::Integer)
    }
}

impl fmt::Display for TourField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// Uppercased text value
    Upper(TourField),
    /// UTC calendar month (1-12) of an unwound date
    Month(TourField),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorOp {
    Count,
    Sum(TourField),
    Avg(TourField),
    Min(TourField),
    Max(TourField),
    Push(TourField),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub output: String,
    pub op: AccumulatorOp,
}

impl Accumulator {
    pub fn count(output: &str) -> Self {
        Self::new(output, AccumulatorOp::Count)
    }

    pub fn sum(output: &str, field: TourField) -> Self {
        Self::new(output, AccumulatorOp::Sum(field))
    }

    pub fn avg(output: &str, field: TourField) -> Self {
        Self::new(output, AccumulatorOp::Avg(field))
    }

    pub fn min(output: &str, field: TourField) -> Self {
        Self::new(output, AccumulatorOp::Min(field))
    }

    pub fn max(output: &str, field: TourField) -> Self {
        Self::new(output, AccumulatorOp::Max(field))
    }

    pub fn push(output: &str, field: TourField) -> Self {
        Self::new(output, AccumulatorOp::Push(field))
    }

    fn new(output: &str, op: AccumulatorOp) -> Self {
        Accumulator {
            output: output.to_string(),
            op,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// One row per element of an array field; rows with empty arrays vanish
    Unwind(TourField),
    /// Keep rows whose (unwound) date lies in `[from, to]`, both inclusive
    MatchDateRange {
        field: TourField,
        from: OffsetDateTime,
        to: OffsetDateTime,
    },
    Group {
        key: GroupKey,
        accumulators: Vec<Accumulator>,
    },
    /// Copy an existing output field under a new name
    AddField { name: String, source: String },
    Sort { field: String, order: SortOrder },
    /// Drop the listed output fields
    Exclude(Vec<String>),
    Limit(u32),
}

/// A validated stage list. Only [`PipelineBuilder::build`] creates one.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    name: &'static str,
    stages: Vec<Stage>,
    output_fields: Vec<String>,
}

impl Pipeline {
    pub fn builder(name: &'static str) -> PipelineBuilder {
        PipelineBuilder {
            name,
            stages: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Fields present on every output record, in declaration order.
    pub fn output_fields(&self) -> &[String] {
        &self.output_fields
    }
}

#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: &'static str,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn unwind(mut self, field: TourField) -> Self {
        self.stages.push(Stage::Unwind(field));
        self
    }

    pub fn match_date_range(
        mut self,
        field: TourField,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Self {
        self.stages.push(Stage::MatchDateRange { field, from, to });
        self
    }

    pub fn group(mut self, key: GroupKey, accumulators: Vec<Accumulator>) -> Self {
        self.stages.push(Stage::Group { key, accumulators });
        self
    }

    pub fn add_field(mut self, name: &str, source: &str) -> Self {
        self.stages.push(Stage::AddField {
            name: name.to_string(),
            source: source.to_string(),
        });
        self
    }

    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.stages.push(Stage::Sort {
            field: field.to_string(),
            order,
        });
        self
    }

    pub fn exclude(mut self, fields: &[&str]) -> Self {
        self.stages
            .push(Stage::Exclude(fields.iter().map(|f| f.to_string()).collect()));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    /// Validate the stage list against the tour document shape.
    pub fn build(self) -> Result<Pipeline> {
        let output_fields = validate(&self.stages)
            .map_err(|e| AppError::Validation(format!("Invalid pipeline '{}': {}", self.name, e)))?;

        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
            output_fields,
        })
    }
}

/// Walks the stages once, tracking which fields exist. Returns the output
/// fields of the final records.
fn validate(stages: &[Stage]) -> std::result::Result<Vec<String>, String> {
    let mut unwound: Vec<TourField> = Vec::new();
    // Output record fields, known once the group stage has been seen
    let mut grouped: Option<Vec<String>> = None;
    let mut sort_key: Option<&str> = None;

    for (idx, stage) in stages.iter().enumerate() {
        let at = |msg: String| format!("stage {}: {}", idx, msg);

        match (stage, grouped.as_mut()) {
            (Stage::Unwind(field), None)
                if field.kind() == FieldKind::DateArray && !unwound.contains(field) =>
            {
                unwound.push(*field);
            }
            (Stage::MatchDateRange { field, from, to }, None) if unwound.contains(field) => {
                if from > to {
                    return Err(at("date range start is after its end".to_string()));
                }
            }
            (Stage::Group { key, accumulators }, None) => {
                grouped = Some(group_fields(key, accumulators, &unwound).map_err(|e| at(e))?);
            }
            (Stage::AddField { name, source }, Some(fields))
                if fields.contains(source) && !fields.contains(name) =>
            {
                fields.push(name.clone());
            }
            (Stage::Sort { field, .. }, Some(fields)) if fields.contains(field) => {
                sort_key = Some(field.as_str());
            }
            (Stage::Exclude(excluded), Some(fields))
                if excluded
                    .iter()
                    .all(|f| fields.contains(f) && sort_key != Some(f.as_str())) =>
            {
                fields.retain(|f| !excluded.contains(f));
            }
            (Stage::Limit(n), _) if *n > 0 => {}
            (stage, _) => return Err(at(format!("{:?} is not valid here", stage))),
        }
    }

    grouped.ok_or_else(|| "pipeline must contain a group stage".to_string())
}

/// `_id` plus one field per accumulator.
fn group_fields(
    key: &GroupKey,
    accumulators: &[Accumulator],
    unwound: &[TourField],
) -> std::result::Result<Vec<String>, String> {
    match key {
        GroupKey::Upper(field) if field.kind() != FieldKind::Text => {
            return Err(format!("cannot uppercase non-text field '{}'", field));
        }
        GroupKey::Month(field) if !unwound.contains(field) => {
            return Err(format!("month key on '{}' requires unwinding it first", field));
        }
        _ => {}
    }

    let mut fields = vec![GROUP_ID_FIELD.to_string()];
    for acc in accumulators {
        let input_ok = match &acc.op {
            AccumulatorOp::Count => true,
            AccumulatorOp::Push(f) => f.kind() != FieldKind::DateArray,
            AccumulatorOp::Sum(f)
            | AccumulatorOp::Avg(f)
            | AccumulatorOp::Min(f)
            | AccumulatorOp::Max(f) => f.is_numeric(),
        };
        if !input_ok {
            return Err(format!("'{}' cannot accumulate {:?}", acc.output, acc.op));
        }
        if acc.output.is_empty() || fields.contains(&acc.output) {
            return Err(format!("invalid or duplicate output field '{}'", acc.output));
        }
        fields.push(acc.output.clone());
    }
    Ok(fields)
}
