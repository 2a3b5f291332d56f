//! # cupscore
//!
//! Coffee quality score serving: turn loosely typed form input into a
//! prediction from a fitted preprocessing pipeline and regression model.
//!
//! ## Pipeline
//!
//! ```text
//! raw rows -> sanitize -> gate -> JSON-safe payload -> HTTP
//!          -> ServiceContext (transform -> predict -> finite or null) -> response
//! ```
//!
//! - [`coerce`]: total coercion of free-form values into clamped floats, and
//!   row sanitization against the [`schema`]
//! - [`gate`]: client-side check that a batch carries any signal
//! - [`json_safe`]: recursive normalizer that maps non-finite floats to `null`
//! - [`predict`]: the prediction service with its three serving modes
//! - [`api`]: axum HTTP endpoints (feature `server`)
//! - [`submission`] and [`http_client`]: the caller side (feature `client`)
//!
//! ## Example
//!
//! ```rust
//! use cupscore::coerce::{sanitize, RawRow};
//! use cupscore::predict::ServiceContext;
//! use cupscore::schema::FieldSchema;
//!
//! let row = sanitize(&RawRow::positional(["7", "8.5pts", "", "13"]), &FieldSchema::coffee());
//! assert_eq!(row.get("Flavor"), Some(Some(8.5)));
//! assert_eq!(row.get("Body"), Some(None));
//! assert_eq!(row.get("Acidity"), Some(Some(10.0)));
//!
//! // No artifacts loaded: degraded mode still answers one value per row
//! let predictions = ServiceContext::new().predict_rows(&[row]).unwrap();
//! assert_eq!(predictions.len(), 1);
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// Clippy allows (MUST come after deny/warn to override them)
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)] // usize -> f64 for means and rates
#![allow(clippy::cast_possible_truncation)] // u128 -> u64 for metrics
#![allow(clippy::must_use_candidate)] // Not all methods need #[must_use]
#![allow(clippy::doc_markdown)] // Allow technical terms without backticks
#![allow(clippy::uninlined_format_args)] // Prefer explicit format args
#![allow(clippy::missing_panics_doc)] // Allow missing Panics doc sections

#[cfg(feature = "server")]
pub mod api;
/// Fitted transform and predictor artifacts
pub mod artifacts;
/// Value coercion and row sanitization
pub mod coerce;
/// YAML configuration
pub mod config;
pub mod error;
/// Submission gate
pub mod gate;
/// HTTP client for the prediction endpoint
#[cfg(feature = "client")]
pub mod http_client;
/// JSON safety normalizer
pub mod json_safe;
/// Serving metrics
#[cfg(feature = "server")]
pub mod metrics;
/// Prediction service
pub mod predict;
/// Field schema
pub mod schema;
/// Caller-side submission flow
#[cfg(feature = "client")]
pub mod submission;
pub mod table;

pub use error::{CupError, Result};
pub use predict::{FallbackPolicy, ServiceContext, ServiceMode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
