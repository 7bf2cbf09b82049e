use super::success;
use crate::db::PreviousImages;
use crate::error::{AppError, Result};
use crate::models::{CleanupOutcome, ImageCategory, IngestedImages, UploadedFile};
use crate::services::with_timeout;
use crate::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn multipart_error(e: MultipartError) -> AppError {
    AppError::Validation(format!("Malformed multipart body: {}", e))
}

/// Pull every file part out of the request. Plain form fields are skipped.
async fn collect_files(multipart: &mut Multipart) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let name = field.name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        files.push(UploadedFile {
            field: name,
            file_name: Some(file_name),
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Ok(files)
}

/// PATCH /tours/{id}/images
/// Multipart fields `imageCover` (one file) and `images` (gallery)
pub async fn upload_tour_images(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    let id: Uuid = id
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid tour id '{}'", id)))?;

    let files = collect_files(&mut multipart).await?;
    tracing::info!(tour_id = %id, files = files.len(), "Tour image upload");

    let ingestor = &state.image_ingestor;
    let ingested = ingestor
        .ingest(&id.to_string(), ImageCategory::Tours, files)
        .await?;

    if ingested.is_empty() {
        return Ok(success("data", json!({ "id": id })));
    }

    let update = with_timeout(
        state.query_timeout,
        "tour image update",
        state.tour_repo.replace_images(id, &ingested),
    )
    .await;

    let previous = match update {
        Ok(Some(previous)) => previous,
        Ok(None) => {
            discard_new(&state, &ingested).await;
            return Err(AppError::NotFound(format!("No tour found with id {}", id)));
        }
        Err(e) => {
            discard_new(&state, &ingested).await;
            return Err(e);
        }
    };

    remove_superseded(&state, &previous, &ingested).await;

    Ok(success(
        "data",
        json!({
            "id": id,
            "imageCover": ingested.image_cover,
            "images": ingested.images,
        }),
    ))
}

/// Files of a batch that never got referenced.
async fn discard_new(state: &AppState, ingested: &IngestedImages) {
    for name in ingested.all_files() {
        state
            .image_ingestor
            .remove_image(ImageCategory::Tours, name)
            .await;
    }
}

/// Delete the images a tour no longer points at. Failures are only logged.
async fn remove_superseded(state: &AppState, previous: &PreviousImages, ingested: &IngestedImages) {
    let mut stale: Vec<&str> = Vec::new();
    if ingested.image_cover.is_some() {
        stale.extend(previous.image_cover.as_deref());
    }
    if !ingested.images.is_empty() {
        stale.extend(previous.images.iter().map(String::as_str));
    }

    for name in stale {
        if ingested.all_files().any(|f| f == name) {
            continue;
        }
        let outcome = state
            .image_ingestor
            .remove_image(ImageCategory::Tours, name)
            .await;
        if outcome == CleanupOutcome::Removed {
            tracing::debug!(file = name, "Removed superseded tour image");
        }
    }
}
