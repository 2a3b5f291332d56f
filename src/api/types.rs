//! Request and response bodies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process is serving
    pub status: String,
    /// Service version
    pub version: String,
    /// Whether the fitted predictor loaded
    pub model_loaded: bool,
    /// Whether the fitted transform loaded
    pub preprocessor_loaded: bool,
    /// Serving mode: "full", "transform_only" or "degraded"
    pub mode: String,
    /// Why the predictor failed to load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_error: Option<String>,
    /// Why the transform failed to load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preprocessor_error: Option<String>,
}

/// Positional batch: numeric rows in the agreed column order
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Rows of feature values
    pub rows: Vec<Vec<f64>>,
}

/// Positional single row
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRowRequest {
    /// Feature values
    pub row: Vec<f64>,
}

/// Named batch: one object per row, absent keys are missing values
#[derive(Debug, Serialize, Deserialize)]
pub struct NamedPredictRequest {
    /// Rows keyed by field name
    pub rows: Vec<Map<String, Value>>,
}

/// Predictions, one per request row, `null` where no finite value exists
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Per-row predictions in request order
    pub predictions: Vec<Option<f64>>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}
