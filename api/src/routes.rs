use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{PriceFilter, PricePipeline};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PricePipeline>,
    /// Held for the duration of a cycle so runs never overlap.
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pipeline: PricePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/pipeline/run", post(run_pipeline))
        .route("/api/prices", get(list_prices))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_pipeline(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let Ok(guard) = state.run_lock.clone().try_lock_owned() else {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "a pipeline run is already in progress" })),
        );
    };

    // Spawned so a dropped HTTP connection cannot cut a cycle short.
    let pipeline = state.pipeline.clone();
    let handle = tokio::spawn(async move {
        let _guard = guard;
        pipeline.run_cycle().await
    });

    match handle.await {
        Ok(Ok(report)) => {
            info!("On-demand run {} finished", report.run_id);
            (StatusCode::OK, Json(json!(report)))
        }
        Ok(Err(e)) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": e.kind(),
                "stage": e.stage(),
                "message": e.to_string(),
            })),
        ),
        Err(e) => {
            error!("Pipeline task aborted: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "pipeline task aborted" })),
            )
        }
    }
}

async fn list_prices(
    State(state): State<AppState>,
    Query(filter): Query<PriceFilter>,
) -> (StatusCode, Json<Value>) {
    match state.pipeline.store().final_records(&filter).await {
        Ok(records) => (StatusCode::OK, Json(json!(records))),
        Err(e) => {
            error!("Failed to read final prices: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
