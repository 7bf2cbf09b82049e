use axum::Router;
use std::sync::Arc;
use tourbook::config::Config;
use tourbook::db::{PgTourRepository, TourRepository};
use tourbook::AppState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourbook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| format!("Failed to load configuration: {}", e))?;

    tracing::info!("Starting tourbook API server");
    tracing::info!(
        image_root = %config.upload.image_root.display(),
        query_timeout_secs = config.query_timeout_secs,
        "Configuration loaded successfully"
    );

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = tourbook::db::create_pool(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Database migrations completed");

    let tour_repo: Arc<dyn TourRepository> = Arc::new(PgTourRepository::new(db_pool));
    let image_root = config.upload.image_root.clone();

    let state = Arc::new(AppState::new(
        tour_repo,
        config.query_timeout(),
        config.upload.clone(),
    ));

    // Build router with static images, CORS and tracing
    let app = Router::new()
        .nest("/api/v1", tourbook::routes::create_router(state))
        .nest_service("/img", ServeDir::new(image_root))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.server_address();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
