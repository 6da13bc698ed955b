//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, exec::SubprocessExecAdapter, genai::OpenAiTextAdapter},
    config::Config,
    error::ApiError,
    web::{app_router, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use learnsphere_core::pipeline::GenerationPipeline;
use learnsphere_core::ports::TextGenerationService;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Database & Run Migrations ---
    info!(path = %config.database_path.display(), "Opening database...");
    let options = SqliteConnectOptions::new()
        .filename(&config.database_path)
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let model: Option<Arc<dyn TextGenerationService>> = match &config.genai_api_key {
        Some(key) => {
            let mut openai_config = OpenAIConfig::new().with_api_key(key);
            if let Some(base) = &config.genai_api_base {
                openai_config = openai_config.with_api_base(base);
            }
            Some(Arc::new(OpenAiTextAdapter::new(Client::with_config(
                openai_config,
            ))))
        }
        None => {
            warn!("GENAI_API_KEY is not set; /api/generate will serve the mock payload");
            None
        }
    };
    let pipeline = GenerationPipeline::new(model, config.genai_models.clone());

    let executor = Arc::new(SubprocessExecAdapter::new(
        config.python_bin.clone(),
        config.run_timeout,
    ));
    warn!(
        interpreter = %config.python_bin,
        "/api/run executes submitted code without sandboxing"
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        pipeline,
        executor,
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(app_router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
