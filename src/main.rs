use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};

mod config;
mod db;
mod engine;
mod model;
mod provider;
mod server;

use config::Config;
use db::Database;
use engine::PipelineEngine;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    info!("Starting in '{}' environment", config.app_env);

    // Open database and seed reference data
    let db = Database::open(&config.database_url)?;
    info!("Database opened: {}", config.database_url);
    db.with_transaction(engine::pipeline::seed_reference_data)?;

    // Periodic pipeline sweeps, if enabled
    if config.sweep_interval_secs > 0 {
        let sweep_config = config.clone();
        let sweep_db = db.clone();
        tokio::spawn(async move {
            let provider = match provider::default_provider(&sweep_config) {
                Ok(p) => p,
                Err(err) => {
                    error!("Failed to build odds provider: {}", err);
                    return;
                }
            };
            let engine = PipelineEngine::new(sweep_config.clone(), sweep_db);
            let mut interval =
                tokio::time::interval(Duration::from_secs(sweep_config.sweep_interval_secs));
            loop {
                interval.tick().await;
                match engine.run_once(provider.as_ref()).await {
                    Ok(summary) => info!(
                        "Sweep finished: events={} picks={} quarantined={}",
                        summary.events_processed,
                        summary.picks_emitted_this_run,
                        summary.quarantine_count
                    ),
                    Err(err) => error!("Pipeline sweep failed: {}", err),
                }
            }
        });
        info!(
            "Pipeline sweeps every {}s enabled",
            config.sweep_interval_secs
        );
    }

    // Run the API server (blocks until shutdown)
    let state = AppState {
        db,
        config: config.clone(),
    };
    let app = server::router(state);
    let addr: SocketAddr = config.api_addr.parse()?;
    info!("API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
