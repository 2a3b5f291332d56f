use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;
use crate::artifacts::{
    CategoricalColumn, ColumnPreprocessor, FittedPredictor, LinearRegressor, NumericColumn,
};
use crate::predict::FallbackPolicy;
use crate::table::Matrix;

fn degraded_app() -> Router {
    create_router(AppState::new(ServiceContext::new()))
}

fn full_app() -> Router {
    let pre = ColumnPreprocessor::new(
        vec![
            NumericColumn {
                name: "Aroma".to_string(),
                median: 7.5,
                mean: 7.5,
                scale: 0.5,
            },
            NumericColumn {
                name: "Flavor".to_string(),
                median: 7.5,
                mean: 7.5,
                scale: 0.5,
            },
        ],
        vec![CategoricalColumn {
            name: "Species".to_string(),
            most_frequent: "Arabica".to_string(),
            categories: vec!["Arabica".to_string(), "Robusta".to_string()],
        }],
    );
    let model = LinearRegressor {
        coefficients: vec![1.0, 1.0, 0.5, -0.5],
        intercept: 82.0,
    };
    let ctx = ServiceContext::new()
        .with_transform(Arc::new(pre))
        .with_predictor(Arc::new(model));
    create_router(AppState::new(ctx))
}

async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("test"),
        )
        .await
        .expect("test");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("test");
    (status, serde_json::from_slice(&bytes).expect("test"))
}

async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("test"))
        .await
        .expect("test");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("test");
    (status, String::from_utf8(bytes.to_vec()).expect("test"))
}

#[tokio::test]
async fn test_health_without_artifacts() {
    let (status, body) = get_text(degraded_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_str(&body).expect("test");
    assert_eq!(health.status, "ok");
    assert!(!health.model_loaded);
    assert!(!health.preprocessor_loaded);
    assert_eq!(health.mode, "degraded");
    assert!(!body.contains("model_error"));
}

#[tokio::test]
async fn test_health_full_mode() {
    let (_, body) = get_text(full_app(), "/health").await;
    let health: HealthResponse = serde_json::from_str(&body).expect("test");
    assert!(health.model_loaded);
    assert!(health.preprocessor_loaded);
    assert_eq!(health.mode, "full");
}

#[tokio::test]
async fn test_predict_named_full_mode() {
    let (status, body) = post_json(
        full_app(),
        "/predict_named",
        r#"{"rows": [{"Aroma": 8.0, "Flavor": 8.0, "Species": "Robusta"}, {}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"predictions": [83.5, 82.5]}));
}

#[tokio::test]
async fn test_predict_named_sanitized_row_degraded() {
    // Aroma clamped to 10, Flavor absent: row mean propagates the gap as null
    let (status, body) = post_json(
        degraded_app(),
        "/predict_named",
        r#"{"rows": [{"Aroma": 10.0, "Flavor": null}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predictions"].as_array().map(Vec::len), Some(1));
    assert!(body["predictions"][0].is_null());
}

#[tokio::test]
async fn test_predict_named_transform_error_is_500_with_prefix() {
    let (status, body) = post_json(
        full_app(),
        "/predict_named",
        r#"{"rows": [{"Aroma": "bad"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().expect("test");
    assert!(message.starts_with(NAMED_ERROR_PREFIX));
}

#[tokio::test]
async fn test_predict_named_rows_not_objects_is_422() {
    let (status, body) = post_json(degraded_app(), "/predict_named", r#"{"rows": [[1, 2]]}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_predict_positional_batch() {
    let (status, body) = post_json(
        degraded_app(),
        "/predict",
        r#"{"rows": [[1.0, 2.0, 3.0], [5.0, 5.0, 5.0]]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"predictions": [2.0, 5.0]}));
}

#[tokio::test]
async fn test_predict_ragged_rows_is_422() {
    let (status, body) = post_json(degraded_app(), "/predict", r#"{"rows": [[1.0], [1.0, 2.0]]}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().expect("test").contains("rectangular"));
}

#[tokio::test]
async fn test_predict_malformed_json_is_422() {
    let (status, _) = post_json(degraded_app(), "/predict", r#"{"rows": "#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post_json(degraded_app(), "/predict", r#"{"rows": [["x"]]}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_predict_positional_width_mismatch_is_500() {
    let (status, body) = post_json(full_app(), "/predict", r#"{"rows": [[1.0, 2.0]]}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["error"].as_str().expect("test").starts_with(NAMED_ERROR_PREFIX));
}

#[tokio::test]
async fn test_predict_row_single() {
    let ctx = ServiceContext::new().with_fallback(FallbackPolicy::Null);
    let app = create_router(AppState::new(ctx));
    let (status, body) = post_json(app, "/predict_row", r#"{"row": [1.0, 2.0]}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"predictions": [null]}));
}

#[tokio::test]
async fn test_empty_batch_returns_empty_predictions() {
    let (status, body) = post_json(full_app(), "/predict_named", r#"{"rows": []}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"predictions": []}));
}

#[derive(Debug)]
struct NanModel;

impl FittedPredictor for NanModel {
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        Ok(vec![f64::NAN; x.n_rows()])
    }
}

#[tokio::test]
async fn test_nan_prediction_serialized_as_null() {
    let ctx = ServiceContext::new().with_predictor(Arc::new(NanModel));
    let app = create_router(AppState::new(ctx));
    let (status, body) = post_json(app, "/predict", r#"{"rows": [[1.0], [2.0]]}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"predictions": [null, null]}));
}

#[tokio::test]
async fn test_metrics_reflect_requests() {
    let state = AppState::new(ServiceContext::new());
    let app = create_router(state.clone());
    let _ = post_json(app.clone(), "/predict", r#"{"rows": [[1.0]]}"#).await;
    let _ = post_json(app.clone(), "/predict", r#"{"rows": 5}"#).await;

    let snapshot = state.metrics().snapshot();
    assert_eq!(snapshot.successful_requests, 1);
    assert_eq!(snapshot.rejected_requests, 1);

    let (status, text) = get_text(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("cupscore_requests_total 2"));
}
