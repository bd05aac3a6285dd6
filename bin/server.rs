// Industry Impact - Web Server
// REST + GeoJSON API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use industry_impact::api::{build_router, AppState};
use industry_impact::{init_logging, GeographyReference, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_logging(config.verbose);

    info!("Industry Impact - Web Server v{}", industry_impact::VERSION);

    if !config.database.exists() {
        anyhow::bail!(
            "Database not found at {} (run `industry-impact import` first)",
            config.database.display()
        );
    }

    // Boundaries are loaded once and shared read-only by every request
    let geography = GeographyReference::load(&config.states, &config.counties)
        .context("Failed to load boundary files")?;
    info!(
        states = geography.states.len(),
        counties = geography.counties.len(),
        "geography reference ready"
    );

    let state = AppState::new(config.database.clone(), geography, config.engine);
    let app = build_router(state, config.timeout());

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(addr = %config.bind, database = %config.database.display(), "server running");
    info!("routes listed at http://{}/", config.bind);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
