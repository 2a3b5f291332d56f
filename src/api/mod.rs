//! HTTP API for coffee score prediction
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness plus artifact load status
//! - `GET /metrics` - Prometheus-formatted metrics
//! - `POST /predict` - Positional batch `{"rows": [[f64, ...], ...]}`
//! - `POST /predict_row` - Positional single row `{"row": [f64, ...]}`
//! - `POST /predict_named` - Named batch `{"rows": [{"Aroma": 7.5, ...}, ...]}`
//!
//! Malformed bodies are answered with 422, transform or predict failures
//! with 500. Both carry `{"error": "..."}`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cupscore::api::{create_router, AppState};
//!
//! let state = AppState::new(ServiceContext::load(&config));
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

mod types;

use std::{sync::Arc, time::Instant};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, error, warn};

pub use self::types::{
    ErrorResponse, HealthResponse, NamedPredictRequest, PredictRequest, PredictResponse,
    PredictRowRequest,
};
use crate::{
    error::{CupError, Result},
    metrics::MetricsCollector,
    predict::ServiceContext,
};

/// Prefix the named endpoint puts on processing failures
pub const NAMED_ERROR_PREFIX: &str = "Invalid payload or transform error: ";

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    ctx: Arc<ServiceContext>,
    metrics: MetricsCollector,
}

impl AppState {
    /// Wrap a loaded service context
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self::with_shared(Arc::new(ctx))
    }

    /// Share an existing context
    #[must_use]
    pub fn with_shared(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            metrics: MetricsCollector::new(),
        }
    }

    /// Service context
    #[must_use]
    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Request metrics
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/predict", post(predict_handler))
        .route("/predict_row", post(predict_row_handler))
        .route("/predict_named", post(predict_named_handler))
        .with_state(state)
}

/// Health check handler; answers whether or not artifacts loaded
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let ctx = state.context();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        model_loaded: ctx.predictor_status().loaded,
        preprocessor_loaded: ctx.transform_status().loaded,
        mode: ctx.mode().as_str().to_string(),
        model_error: ctx.predictor_status().error.clone(),
        preprocessor_error: ctx.transform_status().error.clone(),
    })
}

/// Metrics handler - returns Prometheus-formatted metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.to_prometheus()
}

async fn predict_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|r| reject(&state, &r))?;
    run(&state, "", move |ctx| ctx.predict_positional(request.rows)).await
}

async fn predict_row_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRowRequest>, JsonRejection>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|r| reject(&state, &r))?;
    run(&state, "", move |ctx| ctx.predict_positional(vec![request.row])).await
}

async fn predict_named_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NamedPredictRequest>, JsonRejection>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|r| reject(&state, &r))?;
    run(&state, NAMED_ERROR_PREFIX, move |ctx| {
        ctx.predict_named(&request.rows)
    })
    .await
}

/// Score on the blocking pool and map the outcome to a response
async fn run<F>(
    state: &AppState,
    error_prefix: &'static str,
    job: F,
) -> std::result::Result<Json<PredictResponse>, ApiError>
where
    F: FnOnce(&ServiceContext) -> Result<Vec<Option<f64>>> + Send + 'static,
{
    let ctx = Arc::clone(&state.ctx);
    let start = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || job(&ctx))
        .await
        .map_err(|e| CupError::Predict(format!("prediction task aborted: {e}")))
        .and_then(|result| result);

    match outcome {
        Ok(predictions) => {
            state.metrics.record_success(&predictions, start.elapsed());
            debug!(rows = predictions.len(), "batch scored");
            Ok(Json(PredictResponse { predictions }))
        },
        Err(e) if e.is_client_error() => {
            state.metrics.record_rejected();
            warn!(error = %e, "rejected prediction request");
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        },
        Err(e) => {
            state.metrics.record_failure();
            error!(error = %e, "prediction failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("{error_prefix}{e}"),
                }),
            ))
        },
    }
}

fn reject(state: &AppState, rejection: &JsonRejection) -> ApiError {
    state.metrics.record_rejected();
    let reason = rejection.body_text();
    warn!(error = %reason, "malformed request body");
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: CupError::invalid_input(reason).to_string(),
        }),
    )
}

#[cfg(test)]
mod tests;
