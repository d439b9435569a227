//! Main Entrypoint for the Lumen API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Loading the optional system prompt for the voice model.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use lumen_api::{config::Config, db::Db, router::create_router, state::AppState};
use sqlx::PgPool;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SYSTEM_PROMPT_FILE: &str = "system_prompt.md";

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Reads `system_prompt.md` from the prompts directory, if present.
fn load_system_prompt(prompts_path: &Path) -> anyhow::Result<Option<String>> {
    let path = prompts_path.join(SYSTEM_PROMPT_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let content = content.trim();
    Ok((!content.is_empty()).then(|| content.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Load the System Prompt ---
    let system_prompt = load_system_prompt(&config.prompts_path)?.map(Arc::new);
    if system_prompt.is_none() {
        info!(path = %config.prompts_path.display(), "No system prompt found; the model runs without one.");
    }
    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; voice sessions will fail to start.");
    }

    let bind_address = config.bind_address;
    let model = config.gemini_model.clone();
    let app_state = Arc::new(AppState {
        db,
        config: Arc::new(config),
        system_prompt,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(%model, %bind_address, "Service configured. Starting server...");
    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
