use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::db::{self, Database};
use crate::engine::features::FeatureRow;
use crate::engine::PipelineEngine;
use crate::model::train_baseline_model;
use crate::provider::default_provider;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

/// Build the Axum router for the read views and admin endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/picks/today", get(picks_today_handler))
        .route("/picks/:pick_id", get(pick_by_id_handler))
        .route("/metrics/clv", get(clv_metrics_handler))
        .route("/admin/retrain", post(retrain_handler))
        .route("/admin/run-once", post(run_once_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET /health
async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let latest = state.db.latest_run_id().map_err(internal_error)?;
    Ok(Json(json!({ "status": "ok", "latest_pipeline_run": latest })))
}

/// GET /picks/today
async fn picks_today_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .list_picks_today()
        .map(Json)
        .map_err(internal_error)
}

/// GET /picks/{id}
async fn pick_by_id_handler(
    State(state): State<Arc<AppState>>,
    Path(pick_id): Path<i64>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.db.get_pick(pick_id).map_err(internal_error)? {
        Some(pick) => Ok(Json(pick)),
        None => Err((StatusCode::NOT_FOUND, format!("pick {pick_id} not found"))),
    }
}

/// GET /metrics/clv
async fn clv_metrics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.db.clv_metrics().map(Json).map_err(internal_error)
}

/// POST /admin/retrain — fit the baseline model on seed data and register
/// the artifact.
async fn retrain_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let rows = vec![
        FeatureRow {
            team_win_loss_home_away: 0.6,
            recent_form_last_n: 0.6,
            head_to_head: 0.5,
            rest_days_density: 0.0,
            off_def_efficiency: 1.0,
            home_court_advantage: 1.0,
        },
        FeatureRow {
            team_win_loss_home_away: 0.4,
            recent_form_last_n: 0.4,
            head_to_head: 0.5,
            rest_days_density: -1.0,
            off_def_efficiency: -1.0,
            home_court_advantage: 1.0,
        },
    ];
    let labels = vec![1u8, 0u8];
    let model_version = format!("model-{}", Utc::now().timestamp());
    let (artifact_path, metrics) = train_baseline_model(
        &rows,
        &labels,
        &model_version,
        std::path::Path::new(&state.config.artifact_dir),
    )
    .map_err(internal_error)?;

    let metrics_json = serde_json::to_value(&metrics).map_err(internal_error)?;
    state
        .db
        .with_transaction(|conn| {
            db::insert_model_artifact(
                conn,
                &model_version,
                metrics.trained_at,
                "seed",
                &metrics_json,
                &artifact_path,
            )
        })
        .map_err(internal_error)?;

    info!("Model retrained: version={}", model_version);
    Ok(Json(json!({
        "artifact_path": artifact_path,
        "metrics": metrics_json,
        "model_version": model_version,
    })))
}

/// POST /admin/run-once — invoke a pipeline sweep with the default provider.
async fn run_once_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let provider = default_provider(&state.config).map_err(internal_error)?;
    let engine = PipelineEngine::new(state.config.clone(), state.db.clone());
    let summary = engine
        .run_once(provider.as_ref())
        .await
        .map_err(internal_error)?;
    Ok(Json(summary))
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
