//! Prediction service
//!
//! [`ServiceContext`] is built once at startup from whatever artifacts loaded
//! and is read-only afterwards; request handlers share it behind an `Arc`.
//!
//! Which artifacts are present selects the [`ServiceMode`]:
//!
//! | Transform | Predictor | Mode | Pipeline |
//! |---|---|---|---|
//! | yes | yes | `Full` | transform, then predict |
//! | yes | no | `TransformOnly` | transform, then fallback policy |
//! | no | any | `Degraded` | raw numeric passthrough, then predictor or fallback |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    artifacts::{self, ArtifactStatus, FittedPredictor, FittedTransform, LoadedArtifact},
    coerce::CanonicalRow,
    config::AppConfig,
    error::{CupError, Result},
    json_safe::finite_or_none,
    table::{Matrix, Table},
};

/// Serving mode selected by artifact availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    /// Transform and predictor both loaded
    Full,
    /// Transform loaded, predictor missing
    TransformOnly,
    /// Transform missing
    Degraded,
}

impl ServiceMode {
    /// Wire name of the mode
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::TransformOnly => "transform_only",
            Self::Degraded => "degraded",
        }
    }
}

/// Placeholder prediction used when no predictor is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Row mean of the features; any `NaN` makes the row `NaN`
    #[default]
    RowMean,
    /// Row mean ignoring `NaN`
    NanMean,
    /// Always `null`
    Null,
}

impl FallbackPolicy {
    /// One placeholder value per matrix row (`NaN` where undefined)
    #[must_use]
    pub fn apply(self, x: &Matrix) -> Vec<f64> {
        x.iter_rows()
            .map(|row| match self {
                Self::RowMean => mean(row.iter().copied()),
                Self::NanMean => mean(row.iter().copied().filter(|v| !v.is_nan())),
                Self::Null => f64::NAN,
            })
            .collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Load-once, read-only serving context
#[derive(Debug, Clone, Default)]
pub struct ServiceContext {
    transform: Option<Arc<dyn FittedTransform>>,
    predictor: Option<Arc<dyn FittedPredictor>>,
    transform_status: ArtifactStatus,
    predictor_status: ArtifactStatus,
    input_columns: Vec<String>,
    fallback: FallbackPolicy,
}

impl ServiceContext {
    /// Context with no artifacts (degraded mode, row-mean fallback)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load artifacts named by `config` and build the context
    ///
    /// Artifact failures are recorded in the status, never returned.
    #[must_use]
    pub fn load(config: &AppConfig) -> Self {
        let ctx = Self::from_artifacts(
            artifacts::load_transform(&config.artifacts.preprocessor),
            artifacts::load_predictor(&config.artifacts.model),
        )
        .with_input_columns(config.data.input_columns.clone())
        .with_fallback(config.serving.fallback);

        match ctx.mode() {
            ServiceMode::Full => info!(mode = ctx.mode().as_str(), "prediction service ready"),
            mode => warn!(
                mode = mode.as_str(),
                fallback = ?ctx.fallback,
                "prediction service running without all artifacts"
            ),
        }
        ctx
    }

    /// Build from already-loaded artifact slots
    #[must_use]
    pub fn from_artifacts(
        transform: LoadedArtifact<dyn FittedTransform>,
        predictor: LoadedArtifact<dyn FittedPredictor>,
    ) -> Self {
        Self {
            transform: transform.artifact,
            predictor: predictor.artifact,
            transform_status: transform.status,
            predictor_status: predictor.status,
            ..Self::default()
        }
    }

    /// Set the fitted transform
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn FittedTransform>) -> Self {
        self.transform = Some(transform);
        self.transform_status = ArtifactStatus::ok();
        self
    }

    /// Set the fitted predictor
    #[must_use]
    pub fn with_predictor(mut self, predictor: Arc<dyn FittedPredictor>) -> Self {
        self.predictor = Some(predictor);
        self.predictor_status = ArtifactStatus::ok();
        self
    }

    /// Set the globally configured input column order
    #[must_use]
    pub fn with_input_columns(mut self, columns: Vec<String>) -> Self {
        self.input_columns = columns;
        self
    }

    /// Set the fallback policy
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Current serving mode
    #[must_use]
    pub fn mode(&self) -> ServiceMode {
        match (&self.transform, &self.predictor) {
            (Some(_), Some(_)) => ServiceMode::Full,
            (Some(_), None) => ServiceMode::TransformOnly,
            (None, _) => ServiceMode::Degraded,
        }
    }

    /// Load outcome of the preprocessor
    #[must_use]
    pub fn transform_status(&self) -> &ArtifactStatus {
        &self.transform_status
    }

    /// Load outcome of the model
    #[must_use]
    pub fn predictor_status(&self) -> &ArtifactStatus {
        &self.predictor_status
    }

    /// Active fallback policy
    #[must_use]
    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Columns used to lay out named rows, or `None` to use the rows' own keys
    fn expected_columns(&self) -> Option<Vec<String>> {
        if let Some(names) = self.transform.as_ref().and_then(|t| t.feature_names_in()) {
            if !names.is_empty() {
                return Some(names.to_vec());
            }
        }
        if self.input_columns.is_empty() {
            None
        } else {
            Some(self.input_columns.clone())
        }
    }

    /// Predict one value per table row; `None` where the output is not finite
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Transform`] or [`CupError::Predict`] if an artifact
    /// fails, and [`CupError::Predict`] if the output count does not match
    /// the row count.
    pub fn predict_table(&self, table: &Table) -> Result<Vec<Option<f64>>> {
        let n_rows = table.n_rows();
        if n_rows == 0 {
            return Ok(Vec::new());
        }
        debug!(rows = n_rows, mode = self.mode().as_str(), "predicting batch");

        let features = match &self.transform {
            Some(transform) => transform.transform(table)?,
            None => table.to_matrix()?,
        };
        if features.n_rows() != n_rows {
            return Err(CupError::Transform(format!(
                "transform returned {} rows for {n_rows} input rows",
                features.n_rows()
            )));
        }

        let raw = match &self.predictor {
            Some(predictor) => predictor.predict(&features)?,
            None => self.fallback.apply(&features),
        };
        if raw.len() != n_rows {
            return Err(CupError::Predict(format!(
                "predictor returned {} values for {n_rows} rows",
                raw.len()
            )));
        }

        Ok(raw.into_iter().map(finite_or_none).collect())
    }

    /// Predict for JSON object rows; keys not present are missing values
    ///
    /// # Errors
    ///
    /// See [`ServiceContext::predict_table`].
    pub fn predict_named(&self, rows: &[Map<String, Value>]) -> Result<Vec<Option<f64>>> {
        let columns = self
            .expected_columns()
            .unwrap_or_else(|| Table::infer_columns(rows));
        self.predict_table(&Table::from_named_rows(rows, &columns))
    }

    /// Predict for purely numeric rows in the agreed column order
    ///
    /// # Errors
    ///
    /// Returns [`CupError::InvalidInput`] for ragged rows, otherwise see
    /// [`ServiceContext::predict_table`].
    pub fn predict_positional(&self, rows: Vec<Vec<f64>>) -> Result<Vec<Option<f64>>> {
        self.predict_table(&Table::positional(rows)?)
    }

    /// Predict for sanitized rows
    ///
    /// # Errors
    ///
    /// See [`ServiceContext::predict_table`].
    pub fn predict_rows(&self, rows: &[CanonicalRow]) -> Result<Vec<Option<f64>>> {
        let columns = self.expected_columns().unwrap_or_else(|| {
            let mut names: Vec<String> = Vec::new();
            for (name, _) in rows.iter().flat_map(CanonicalRow::iter) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            names
        });
        self.predict_table(&Table::from_canonical(rows, &columns))
    }
}
