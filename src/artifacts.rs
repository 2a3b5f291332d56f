//! Fitted artifacts: preprocessing transform and regression predictor
//!
//! The serving path treats both as opaque capabilities behind
//! [`FittedTransform`] and [`FittedPredictor`]. Training lives elsewhere; this
//! module only loads what training exported.
//!
//! ## Artifact files
//!
//! Both artifacts are JSON documents tagged with `kind`:
//!
//! ```json
//! {"kind": "column_preprocessor",
//!  "numeric": [{"name": "Aroma", "median": 7.58, "mean": 7.56, "scale": 0.38}],
//!  "categorical": [{"name": "Species", "most_frequent": "Arabica",
//!                   "categories": ["Arabica", "Robusta"]}]}
//! ```
//!
//! ```json
//! {"kind": "linear_regression", "coefficients": [0.8, 1.2, 0.0, 0.0], "intercept": 82.1}
//! ```

use std::{fmt, fs, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{CupError, Result},
    table::{Cell, Matrix, Table},
};

/// A fitted feature transform
pub trait FittedTransform: Send + Sync + fmt::Debug {
    /// Input column order the transform was fitted on, if it records one
    fn feature_names_in(&self) -> Option<&[String]>;

    /// Encode a table into a dense matrix with one row per table row
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Transform`] when the table does not fit the
    /// transform (missing columns, wrong width, non-numeric values).
    fn transform(&self, table: &Table) -> Result<Matrix>;
}

/// A fitted regression model
pub trait FittedPredictor: Send + Sync + fmt::Debug {
    /// One raw output per matrix row
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Predict`] when the matrix width does not match.
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>>;
}

/// Numeric column: median imputation then standard scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    /// Input column name
    pub name: String,
    /// Training median, used for missing values
    pub median: f64,
    /// Training mean
    pub mean: f64,
    /// Training standard deviation
    pub scale: f64,
}

impl NumericColumn {
    fn encode(&self, cell: &Cell) -> Result<f64> {
        let raw = match cell {
            Cell::Missing => self.median,
            Cell::Number(v) if v.is_nan() => self.median,
            Cell::Number(v) => *v,
            Cell::Text(s) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_nan() => self.median,
                Ok(v) => v,
                Err(_) => {
                    return Err(CupError::Transform(format!(
                        "column '{}' expects numeric values, got '{s}'",
                        self.name
                    )))
                },
            },
        };
        // Constant training columns have zero variance; leave them unscaled
        let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
        Ok((raw - self.mean) / scale)
    }
}

/// Categorical column: most-frequent imputation then one-hot encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    /// Input column name
    pub name: String,
    /// Training mode, used for missing values
    pub most_frequent: String,
    /// Known categories, one output column each
    pub categories: Vec<String>,
}

impl CategoricalColumn {
    fn encode_into(&self, cell: &Cell, out: &mut Vec<f64>) {
        let value = match cell {
            Cell::Missing => self.most_frequent.clone(),
            Cell::Number(v) if v.is_nan() => self.most_frequent.clone(),
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        };
        // Unknown categories encode as all zeros
        out.extend(
            self.categories
                .iter()
                .map(|c| if *c == value { 1.0 } else { 0.0 }),
        );
    }
}

/// Column-wise preprocessor: numeric block first, then one-hot blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PreprocessorColumns")]
pub struct ColumnPreprocessor {
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
    #[serde(skip)]
    feature_names: Vec<String>,
}

/// Serialized form of [`ColumnPreprocessor`]; the name index is rebuilt on load
#[derive(Deserialize)]
struct PreprocessorColumns {
    #[serde(default)]
    numeric: Vec<NumericColumn>,
    #[serde(default)]
    categorical: Vec<CategoricalColumn>,
}

impl From<PreprocessorColumns> for ColumnPreprocessor {
    fn from(columns: PreprocessorColumns) -> Self {
        Self::new(columns.numeric, columns.categorical)
    }
}

impl ColumnPreprocessor {
    /// Build a preprocessor from its column definitions
    #[must_use]
    pub fn new(numeric: Vec<NumericColumn>, categorical: Vec<CategoricalColumn>) -> Self {
        let feature_names = numeric
            .iter()
            .map(|c| c.name.clone())
            .chain(categorical.iter().map(|c| c.name.clone()))
            .collect();
        Self {
            numeric,
            categorical,
            feature_names,
        }
    }

    /// Numeric columns, in output order
    #[must_use]
    pub fn numeric(&self) -> &[NumericColumn] {
        &self.numeric
    }

    /// Categorical columns, encoded after the numeric block
    #[must_use]
    pub fn categorical(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Width of the encoded output
    #[must_use]
    pub fn n_features_out(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// Position of each expected input column within `table`
    fn locate_columns(&self, table: &Table) -> Result<Vec<usize>> {
        match table.columns() {
            Some(_) => self
                .feature_names
                .iter()
                .map(|name| {
                    table.column_index(name).ok_or_else(|| {
                        CupError::Transform(format!("columns are missing: {{'{name}'}}"))
                    })
                })
                .collect(),
            None if table.n_rows() == 0 || table.n_cols() == self.feature_names.len() => {
                Ok((0..self.feature_names.len()).collect())
            },
            None => Err(CupError::Transform(format!(
                "X has {} features, but the preprocessor is expecting {} features as input",
                table.n_cols(),
                self.feature_names.len()
            ))),
        }
    }
}

impl FittedTransform for ColumnPreprocessor {
    fn feature_names_in(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn transform(&self, table: &Table) -> Result<Matrix> {
        let positions = self.locate_columns(table)?;
        let (num_pos, cat_pos) = positions.split_at(self.numeric.len());
        let width = self.n_features_out();
        let mut data = Vec::with_capacity(table.n_rows() * width);

        for row in table.rows() {
            for (column, &pos) in self.numeric.iter().zip(num_pos) {
                data.push(column.encode(&row[pos])?);
            }
            for (column, &pos) in self.categorical.iter().zip(cat_pos) {
                column.encode_into(&row[pos], &mut data);
            }
        }

        Matrix::from_vec(table.n_rows(), width, data)
            .map_err(|e| CupError::Transform(e.to_string()))
    }
}

/// Ordinary linear regression: `y = x · coefficients + intercept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    /// One weight per input feature
    pub coefficients: Vec<f64>,
    /// Bias term
    pub intercept: f64,
}

impl FittedPredictor for LinearRegressor {
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        if x.n_cols() != self.coefficients.len() {
            return Err(CupError::Predict(format!(
                "X has {} features, but LinearRegression is expecting {} features as input",
                x.n_cols(),
                self.coefficients.len()
            )));
        }
        Ok(x.iter_rows()
            .map(|row| {
                row.iter()
                    .zip(&self.coefficients)
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
                    + self.intercept
            })
            .collect())
    }
}

/// Preprocessor artifact file
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TransformFile {
    ColumnPreprocessor(ColumnPreprocessor),
}

/// Model artifact file
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum PredictorFile {
    LinearRegression(LinearRegressor),
}

/// Parse a preprocessor artifact from JSON text
///
/// # Errors
///
/// Returns [`CupError::ArtifactLoad`] on malformed JSON or an unknown `kind`.
pub fn parse_transform(json: &str) -> Result<Arc<dyn FittedTransform>> {
    let file: TransformFile = serde_json::from_str(json).map_err(|e| CupError::ArtifactLoad {
        artifact: "preprocessor".to_string(),
        reason: e.to_string(),
    })?;
    match file {
        TransformFile::ColumnPreprocessor(pre) => Ok(Arc::new(pre)),
    }
}

/// Parse a model artifact from JSON text
///
/// # Errors
///
/// Returns [`CupError::ArtifactLoad`] on malformed JSON or an unknown `kind`.
pub fn parse_predictor(json: &str) -> Result<Arc<dyn FittedPredictor>> {
    let file: PredictorFile = serde_json::from_str(json).map_err(|e| CupError::ArtifactLoad {
        artifact: "model".to_string(),
        reason: e.to_string(),
    })?;
    match file {
        PredictorFile::LinearRegression(model) => Ok(Arc::new(model)),
    }
}

/// Outcome of loading one artifact at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArtifactStatus {
    /// Whether the artifact is in memory
    pub loaded: bool,
    /// Why loading failed; `None` if it loaded or the file was simply absent
    pub error: Option<String>,
}

impl ArtifactStatus {
    /// Status of an artifact that loaded cleanly
    #[must_use]
    pub fn ok() -> Self {
        Self {
            loaded: true,
            error: None,
        }
    }
}

/// An artifact slot after the load-once step
#[derive(Debug, Clone)]
pub struct LoadedArtifact<T: ?Sized> {
    /// The artifact, if it loaded
    pub artifact: Option<Arc<T>>,
    /// What happened while loading
    pub status: ArtifactStatus,
}

impl<T: ?Sized> LoadedArtifact<T> {
    /// Empty slot (artifact not configured or file absent)
    #[must_use]
    pub fn absent() -> Self {
        Self {
            artifact: None,
            status: ArtifactStatus::default(),
        }
    }

    /// Slot holding a loaded artifact
    #[must_use]
    pub fn present(artifact: Arc<T>) -> Self {
        Self {
            artifact: Some(artifact),
            status: ArtifactStatus::ok(),
        }
    }
}

fn load_with<T: ?Sized>(
    path: &Path,
    label: &str,
    parse: impl FnOnce(&str) -> Result<Arc<T>>,
) -> LoadedArtifact<T> {
    if !path.exists() {
        warn!(artifact = label, path = %path.display(), "artifact file not found");
        return LoadedArtifact::absent();
    }
    let parsed = fs::read_to_string(path)
        .map_err(|e| CupError::ArtifactLoad {
            artifact: label.to_string(),
            reason: e.to_string(),
        })
        .and_then(|text| parse(&text));
    match parsed {
        Ok(artifact) => {
            info!(artifact = label, path = %path.display(), "artifact loaded");
            LoadedArtifact::present(artifact)
        },
        Err(e) => {
            warn!(artifact = label, path = %path.display(), error = %e, "artifact failed to load");
            LoadedArtifact {
                artifact: None,
                status: ArtifactStatus {
                    loaded: false,
                    error: Some(e.to_string()),
                },
            }
        },
    }
}

/// Load the preprocessor artifact; never fails, records the outcome instead
pub fn load_transform(path: &Path) -> LoadedArtifact<dyn FittedTransform> {
    load_with(path, "preprocessor", parse_transform)
}

/// Load the model artifact; never fails, records the outcome instead
pub fn load_predictor(path: &Path) -> LoadedArtifact<dyn FittedPredictor> {
    load_with(path, "model", parse_predictor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preprocessor() -> ColumnPreprocessor {
        ColumnPreprocessor::new(
            vec![
                NumericColumn {
                    name: "Aroma".to_string(),
                    median: 7.0,
                    mean: 7.0,
                    scale: 0.5,
                },
                NumericColumn {
                    name: "Flavor".to_string(),
                    median: 8.0,
                    mean: 6.0,
                    scale: 0.0,
                },
            ],
            vec![CategoricalColumn {
                name: "Species".to_string(),
                most_frequent: "Arabica".to_string(),
                categories: vec!["Arabica".to_string(), "Robusta".to_string()],
            }],
        )
    }

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn test_transform_imputes_scales_and_encodes() {
        let table = Table::named(
            names(&["Species", "Aroma", "Flavor"]),
            vec![
                vec![Cell::Text("Robusta".into()), Cell::Number(8.0), Cell::Missing],
                vec![Cell::Missing, Cell::Missing, Cell::Number(7.0)],
                vec![Cell::Text("Liberica".into()), Cell::Number(7.0), Cell::Number(6.0)],
            ],
        )
        .expect("table");
        let m = preprocessor().transform(&table).expect("transform");
        assert_eq!(m.n_cols(), 4);
        assert_eq!(m.row(0), &[2.0, 2.0, 0.0, 1.0]);
        assert_eq!(m.row(1), &[0.0, 1.0, 1.0, 0.0]);
        assert_eq!(m.row(2), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transform_missing_named_column_is_error() {
        let table = Table::named(names(&["Aroma"]), vec![vec![Cell::Number(1.0)]]).expect("table");
        let err = preprocessor().transform(&table).unwrap_err();
        assert!(matches!(err, CupError::Transform(_)));
        assert!(err.to_string().contains("Flavor"));
    }

    #[test]
    fn test_transform_positional_width_check() {
        let narrow = Table::positional(vec![vec![1.0, 2.0]]).expect("table");
        assert!(matches!(
            preprocessor().transform(&narrow),
            Err(CupError::Transform(_))
        ));
    }

    #[test]
    fn test_transform_rejects_non_numeric_text() {
        let table = Table::named(
            names(&["Aroma", "Flavor", "Species"]),
            vec![vec![Cell::Text("bad".into()), Cell::Missing, Cell::Missing]],
        )
        .expect("table");
        let err = preprocessor().transform(&table).unwrap_err();
        assert!(err.to_string().contains("Aroma"));
    }

    #[test]
    fn test_linear_regressor() {
        let model = LinearRegressor {
            coefficients: vec![1.0, 2.0],
            intercept: 0.5,
        };
        let x = Matrix::from_rows(vec![vec![1.0, 1.0], vec![0.0, -1.0]]).expect("matrix");
        assert_eq!(model.predict(&x).expect("predict"), vec![3.5, -1.5]);

        let wrong = Matrix::from_rows(vec![vec![1.0]]).expect("matrix");
        assert!(matches!(model.predict(&wrong), Err(CupError::Predict(_))));
    }

    #[test]
    fn test_parse_artifacts() {
        let pre = parse_transform(
            r#"{"kind":"column_preprocessor","numeric":[{"name":"Aroma","median":7,"mean":7,"scale":1}]}"#,
        )
        .expect("preprocessor");
        assert_eq!(pre.feature_names_in(), Some(&["Aroma".to_string()][..]));

        let model = parse_predictor(r#"{"kind":"linear_regression","coefficients":[1.0],"intercept":0}"#)
            .expect("model");
        let x = Matrix::from_rows(vec![vec![4.0]]).expect("matrix");
        assert_eq!(model.predict(&x).expect("predict"), vec![4.0]);
    }

    #[test]
    fn test_deserialized_preprocessor_indexes_feature_names() {
        let pre: ColumnPreprocessor = serde_json::from_str(
            r#"{"numeric":[{"name":"Aroma","median":7,"mean":7,"scale":1}],
                "categorical":[{"name":"Species","most_frequent":"Arabica","categories":["Arabica"]}]}"#,
        )
        .expect("preprocessor");
        assert_eq!(pre.feature_names_in(), Some(&names(&["Aroma", "Species"])[..]));

        let table = Table::named(
            names(&["Species", "Aroma"]),
            vec![vec![Cell::Text("Arabica".to_string()), Cell::Number(8.0)]],
        )
        .expect("table");
        let x = pre.transform(&table).expect("transform");
        assert_eq!(x.row(0), &[1.0, 1.0]);

        let round_trip: ColumnPreprocessor =
            serde_json::from_str(&serde_json::to_string(&pre).expect("encode")).expect("decode");
        assert_eq!(round_trip, pre);
    }

    #[test]
    fn test_parse_unknown_kind_fails() {
        let err = parse_predictor(r#"{"kind":"random_forest"}"#).unwrap_err();
        assert!(matches!(err, CupError::ArtifactLoad { .. }));
    }

    #[test]
    fn test_load_absent_file_records_no_error() {
        let slot = load_predictor(Path::new("/nonexistent/cupscore/model.json"));
        assert!(slot.artifact.is_none());
        assert!(!slot.status.loaded);
        assert!(slot.status.error.is_none());
    }
}
