pub mod geo_math;
pub mod geo_query;
pub mod image_ingest;
pub mod tour_stats;

use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;

/// Await `fut`, failing with a retryable [`AppError::Timeout`] once `limit` elapses.
pub(crate) async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{} did not finish within {:?}",
            operation, limit
        ))),
    }
}
