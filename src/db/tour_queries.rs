use crate::constants::POSTGIS_SPHERE_RADIUS_METERS;
use crate::models::{Coordinates, IngestedImages, Tour, TourDistance, TourSummary};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::pipeline::{
    AccumulatorOp, FieldKind, GroupKey, Pipeline, SortOrder, Stage, TourField, GROUP_ID_FIELD,
};
use super::tour_repository::{PreviousImages, RawTourRow};

const TOUR_COLUMNS: &str = "id, name, summary, difficulty, price, ratings_average, ratings_quantity,
                start_dates, ST_AsGeoJSON(start_location) AS start_location, image_cover, images";

/// SQL text plus its positional timestamp parameters.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPipeline {
    pub sql: String,
    pub binds: Vec<OffsetDateTime>,
}

/// Compile a validated pipeline into one statement of chained CTEs
/// returning a `jsonb` document per output record.
pub(crate) fn compile_pipeline(pipeline: &Pipeline) -> CompiledPipeline {
    let source_cols: Vec<String> = TourField::all()
        .iter()
        .map(|f| format!("{} AS {}", f.column(), quote_ident(f.as_str())))
        .collect();

    let mut ctes = vec![format!("s0 AS (SELECT {} FROM tours)", source_cols.join(", "))];
    let mut cols: Vec<String> = TourField::all().iter().map(|f| f.as_str().to_string()).collect();
    let mut binds = Vec::new();
    let mut order_by: Option<String> = None;

    for stage in pipeline.stages() {
        let prev = format!("s{}", ctes.len() - 1);
        let body = match stage {
            Stage::Unwind(field) => {
                let select: Vec<String> = cols
                    .iter()
                    .map(|c| {
                        if c == field.as_str() {
                            format!("u.elem AS {}", quote_ident(c))
                        } else {
                            format!("p.{}", quote_ident(c))
                        }
                    })
                    .collect();
                format!(
                    "SELECT {} FROM {prev} p CROSS JOIN LATERAL unnest(p.{}) AS u(elem)",
                    select.join(", "),
                    quote_ident(field.as_str())
                )
            }
            Stage::MatchDateRange { field, from, to } => {
                binds.push(*from);
                let from_idx = binds.len();
                binds.push(*to);
                let to_idx = binds.len();
                let col = quote_ident(field.as_str());
                format!("SELECT * FROM {prev} WHERE {col} >= ${from_idx} AND {col} <= ${to_idx}")
            }
            Stage::Group { key, accumulators } => {
                let key_expr = match key {
                    GroupKey::Upper(f) => format!("upper({})", quote_ident(f.as_str())),
                    GroupKey::Month(f) => format!(
                        "EXTRACT(MONTH FROM {} AT TIME ZONE 'UTC')::int",
                        quote_ident(f.as_str())
                    ),
                };
                let mut select = vec![format!("{key_expr} AS {}", quote_ident(GROUP_ID_FIELD))];
                cols = vec![GROUP_ID_FIELD.to_string()];
                for acc in accumulators {
                    select.push(format!("{} AS {}", accumulator_sql(&acc.op), quote_ident(&acc.output)));
                    cols.push(acc.output.clone());
                }
                format!("SELECT {} FROM {prev} GROUP BY 1", select.join(", "))
            }
            Stage::AddField { name, source } => {
                cols.push(name.clone());
                format!("SELECT *, {} AS {} FROM {prev}", quote_ident(source), quote_ident(name))
            }
            Stage::Sort { field, order } => {
                let dir = match order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                order_by = Some(format!("{} {dir}", quote_ident(field)));
                continue;
            }
            Stage::Exclude(excluded) => {
                cols.retain(|c| !excluded.contains(c));
                let select: Vec<String> = cols.iter().map(|c| quote_ident(c)).collect();
                format!("SELECT {} FROM {prev}", select.join(", "))
            }
            Stage::Limit(n) => match &order_by {
                Some(order) => format!("SELECT * FROM {prev} ORDER BY {order} LIMIT {n}"),
                None => format!("SELECT * FROM {prev} LIMIT {n}"),
            },
        };
        ctes.push(format!("s{} AS ({})", ctes.len(), body));
    }

    let last = format!("s{}", ctes.len() - 1);
    let mut sql = format!("WITH {} SELECT to_jsonb(t) AS doc FROM {last} t", ctes.join(", "));
    if let Some(order) = order_by {
        sql.push_str(&format!(" ORDER BY t.{order}"));
    }

    CompiledPipeline { sql, binds }
}

fn accumulator_sql(op: &AccumulatorOp) -> String {
    match op {
        AccumulatorOp::Count => "COUNT(*)::bigint".to_string(),
        AccumulatorOp::Sum(f) => match f.kind() {
            FieldKind::Integer => format!("SUM({})::bigint", quote_ident(f.as_str())),
            _ => format!("SUM({})::float8", quote_ident(f.as_str())),
        },
        AccumulatorOp::Avg(f) => format!("AVG({})::float8", quote_ident(f.as_str())),
        AccumulatorOp::Min(f) => format!("MIN({})", quote_ident(f.as_str())),
        AccumulatorOp::Max(f) => format!("MAX({})", quote_ident(f.as_str())),
        AccumulatorOp::Push(f) => format!("array_agg({})", quote_ident(f.as_str())),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub async fn run_pipeline(
    pool: &PgPool,
    pipeline: &Pipeline,
) -> Result<Vec<serde_json::Value>, sqlx::Error> {
    let compiled = compile_pipeline(pipeline);
    tracing::debug!(pipeline = pipeline.name(), sql = %compiled.sql, "Running aggregation");

    let mut query = sqlx::query_scalar::<_, serde_json::Value>(&compiled.sql);
    for bind in &compiled.binds {
        query = query.bind(*bind);
    }
    query.fetch_all(pool).await
}

/// Tours whose start location lies inside the spherical cap around `center`.
pub async fn find_tours_within_sphere(
    pool: &PgPool,
    center: &Coordinates,
    radius_radians: f64,
) -> Result<Vec<Tour>, sqlx::Error> {
    let sql = format!(
        "SELECT {TOUR_COLUMNS}
         FROM tours
         WHERE ST_DWithin(start_location, ST_GeogFromText($1), $2, false)"
    );

    let rows = sqlx::query_as::<_, TourRow>(&sql)
        .bind(center.to_wkt())
        .bind(radius_radians * POSTGIS_SPHERE_RADIUS_METERS)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().filter_map(|row| row.into_raw().into_tour()).collect())
}

/// Every tour with its distance from `center`, nearest first.
pub async fn find_tour_distances(
    pool: &PgPool,
    center: &Coordinates,
    multiplier: f64,
) -> Result<Vec<TourDistance>, sqlx::Error> {
    let rows: Vec<(String, f64)> = sqlx::query_as(
        r#"
        SELECT name, ST_Distance(start_location, ST_GeogFromText($1)) * $2 AS distance
        FROM tours
        ORDER BY start_location <-> ST_GeogFromText($1)
        "#,
    )
    .bind(center.to_wkt())
    .bind(multiplier)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, distance)| TourDistance { name, distance })
        .collect())
}

pub async fn find_top_tours(pool: &PgPool, limit: i64) -> Result<Vec<TourSummary>, sqlx::Error> {
    let rows: Vec<TourSummaryRow> = sqlx::query_as(
        r#"
        SELECT name, price, ratings_average, summary, difficulty
        FROM tours
        ORDER BY price ASC, ratings_average ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TourSummaryRow::into_summary).collect())
}

/// Store new image references, returning what they replaced.
/// Fields absent from `images` keep their current value.
pub async fn replace_tour_images(
    pool: &PgPool,
    id: Uuid,
    images: &IngestedImages,
) -> Result<Option<PreviousImages>, sqlx::Error> {
    let row: Option<(Option<String>, Vec<String>)> = sqlx::query_as(
        r#"
        WITH prev AS (
            SELECT id, image_cover, images FROM tours WHERE id = $1 FOR UPDATE
        )
        UPDATE tours t
        SET image_cover = COALESCE($2, t.image_cover),
            images = CASE WHEN cardinality($3::text[]) > 0 THEN $3::text[] ELSE t.images END
        FROM prev
        WHERE t.id = prev.id
        RETURNING prev.image_cover, prev.images
        "#,
    )
    .bind(id)
    .bind(images.image_cover.as_deref())
    .bind(&images.images)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(image_cover, images)| PreviousImages {
        image_cover,
        images,
    }))
}

pub async fn insert_tour(pool: &PgPool, tour: &Tour) -> Result<Uuid, sqlx::Error> {
    let location = Coordinates {
        lat: tour.start_location.lat(),
        lng: tour.start_location.lng(),
    };

    let result: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO tours (id, name, summary, difficulty, price, ratings_average, ratings_quantity,
                           start_dates, start_location, image_cover, images)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, ST_GeogFromText($9), $10, $11)
        RETURNING id
        "#,
    )
    .bind(tour.id)
    .bind(&tour.name)
    .bind(&tour.summary)
    .bind(tour.difficulty.to_string())
    .bind(tour.price)
    .bind(tour.ratings_average)
    .bind(tour.ratings_quantity)
    .bind(&tour.start_dates)
    .bind(location.to_wkt())
    .bind(&tour.image_cover)
    .bind(&tour.images)
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

#[derive(sqlx::FromRow)]
struct TourRow {
    id: Uuid,
    name: String,
    summary: Option<String>,
    difficulty: String,
    price: f64,
    ratings_average: f64,
    ratings_quantity: i64,
    start_dates: Vec<OffsetDateTime>,
    start_location: String,
    image_cover: Option<String>,
    images: Vec<String>,
}

impl TourRow {
    fn into_raw(self) -> RawTourRow {
        RawTourRow {
            id: self.id,
            name: self.name,
            summary: self.summary,
            difficulty: self.difficulty,
            price: self.price,
            ratings_average: self.ratings_average,
            ratings_quantity: self.ratings_quantity,
            start_dates: self.start_dates,
            start_location_geojson: self.start_location,
            image_cover: self.image_cover,
            images: self.images,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TourSummaryRow {
    name: String,
    price: f64,
    ratings_average: f64,
    summary: Option<String>,
    difficulty: String,
}

impl TourSummaryRow {
    fn into_summary(self) -> TourSummary {
        TourSummary {
            difficulty: super::tour_repository::parse_difficulty(&self.difficulty, &self.name),
            name: self.name,
            price: self.price,
            ratings_average: self.ratings_average,
            summary: self.summary,
        }
    }
}
