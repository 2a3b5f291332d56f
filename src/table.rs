//! Tabular request data and dense numeric matrices
//!
//! [`Table`] is the batch as the transport layer hands it over: rows of
//! loosely typed cells, with column names when the request had them.
//! [`Matrix`] is the dense row-major `f64` form the fitted artifacts exchange.

use serde_json::{Map, Value};

use crate::{
    coerce::CanonicalRow,
    error::{CupError, Result},
};

/// One table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Missing value; imputed by a fitted transform, `NaN` in passthrough
    Missing,
    /// Numeric value
    Number(f64),
    /// Text value (categorical columns, or noise in numeric ones)
    Text(String),
}

impl Cell {
    /// Numeric view of the cell for passthrough mode
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Transform`] for text that is not a float.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            Cell::Missing => Ok(f64::NAN),
            Cell::Number(v) => Ok(*v),
            Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                CupError::Transform(format!("could not convert string to float: '{s}'"))
            }),
        }
    }
}

impl From<&Value> for Cell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Missing,
            Value::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64().map_or(Cell::Missing, Cell::Number),
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Missing, Cell::Number)
    }
}

/// Batch of rows, optionally with column names
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Table with named columns
    ///
    /// # Errors
    ///
    /// Returns [`CupError::InvalidInput`] if a row's width differs from the
    /// number of columns.
    pub fn named(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(CupError::invalid_input(format!(
                "row {idx} has {} values, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns: Some(columns),
            rows,
        })
    }

    /// Table of purely numeric rows without column names
    ///
    /// # Errors
    ///
    /// Returns [`CupError::InvalidInput`] if rows differ in length.
    pub fn positional(rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some(first) = rows.first() {
            let width = first.len();
            if let Some(idx) = rows.iter().position(|r| r.len() != width) {
                return Err(CupError::invalid_input(format!(
                    "rows must be rectangular: row {idx} has {} values, row 0 has {width}",
                    rows[idx].len()
                )));
            }
        }
        Ok(Self {
            columns: None,
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Cell::Number).collect())
                .collect(),
        })
    }

    /// Reindex JSON object rows onto `columns`; absent keys become missing
    #[must_use]
    pub fn from_named_rows(rows: &[Map<String, Value>], columns: &[String]) -> Self {
        let cells = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(col).map_or(Cell::Missing, Cell::from))
                    .collect()
            })
            .collect();
        Self {
            columns: Some(columns.to_vec()),
            rows: cells,
        }
    }

    /// Reindex canonical rows onto `columns`; fields not in a row become missing
    #[must_use]
    pub fn from_canonical(rows: &[CanonicalRow], columns: &[String]) -> Self {
        let cells = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(col).flatten().map_or(Cell::Missing, Cell::Number))
                    .collect()
            })
            .collect();
        Self {
            columns: Some(columns.to_vec()),
            rows: cells,
        }
    }

    /// Union of keys across rows, in first-seen order
    #[must_use]
    pub fn infer_columns(rows: &[Map<String, Value>]) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for key in rows.iter().flat_map(Map::keys) {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
        columns
    }

    /// Column names, if the table has them
    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Rows of cells
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (0 for an empty positional table)
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns
            .as_ref()
            .map_or_else(|| self.rows.first().map_or(0, Vec::len), Vec::len)
    }

    /// Position of a named column
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.as_ref()?.iter().position(|c| c == name)
    }

    /// Dense numeric form: missing cells become `NaN`
    ///
    /// # Errors
    ///
    /// Returns [`CupError::Transform`] if a text cell is not a float.
    pub fn to_matrix(&self) -> Result<Matrix> {
        let cols = self.n_cols();
        let mut data = Vec::with_capacity(self.n_rows() * cols);
        for row in &self.rows {
            for cell in row {
                data.push(cell.to_f64()?);
            }
        }
        Matrix::from_vec(self.n_rows(), cols, data)
    }
}

/// Dense row-major matrix of `f64`
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix from row-major data
    ///
    /// # Errors
    ///
    /// Returns [`CupError::InvalidInput`] if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let expected = rows * cols;
        if data.len() != expected {
            return Err(CupError::invalid_input(format!(
                "matrix data has {} values, shape {rows}x{cols} needs {expected}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Create a matrix from equal-length rows
    ///
    /// # Errors
    ///
    /// Returns [`CupError::InvalidInput`] if rows differ in length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(CupError::invalid_input("rows must be rectangular"));
        }
        Self::from_vec(n, cols, rows.into_iter().flatten().collect())
    }

    /// Number of rows
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// Borrow one row
    ///
    /// # Panics
    ///
    /// Panics if `idx >= n_rows()`.
    #[must_use]
    pub fn row(&self, idx: usize) -> &[f64] {
        &self.data[idx * self.cols..(idx + 1) * self.cols]
    }

    /// Iterate over rows
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Row-major data
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn test_positional_rejects_ragged_rows() {
        let err = Table::positional(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("rectangular"));
    }

    #[test]
    fn test_positional_shape() {
        let table = Table::positional(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).expect("table");
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_cols(), 3);
        assert!(table.columns().is_none());
        let m = table.to_matrix().expect("matrix");
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_named_rows_reindex_fills_missing() {
        let rows = vec![obj(json!({"Aroma": 7.5, "Extra": 1})), obj(json!({"Flavor": null}))];
        let columns = vec!["Aroma".to_string(), "Flavor".to_string()];
        let table = Table::from_named_rows(&rows, &columns);
        assert_eq!(table.rows()[0], vec![Cell::Number(7.5), Cell::Missing]);
        assert_eq!(table.rows()[1], vec![Cell::Missing, Cell::Missing]);
        assert_eq!(table.column_index("Flavor"), Some(1));
        assert_eq!(table.column_index("Extra"), None);
    }

    #[test]
    fn test_infer_columns_first_seen_order() {
        let rows = vec![obj(json!({"b": 1, "a": 2})), obj(json!({"c": 3, "a": 4}))];
        assert_eq!(Table::infer_columns(&rows), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_to_matrix_missing_is_nan_and_bad_text_errors() {
        let table = Table::named(
            vec!["x".to_string(), "y".to_string()],
            vec![vec![Cell::Missing, Cell::Text(" 2.5 ".to_string())]],
        )
        .expect("table");
        let m = table.to_matrix().expect("matrix");
        assert!(m.row(0)[0].is_nan());
        assert_eq!(m.row(0)[1], 2.5);

        let bad = Table::named(vec!["x".to_string()], vec![vec![Cell::Text("bad".to_string())]])
            .expect("table");
        let err = bad.to_matrix().unwrap_err();
        assert!(matches!(err, CupError::Transform(_)));
    }

    #[test]
    fn test_named_rejects_width_mismatch() {
        let err = Table::named(vec!["x".to_string()], vec![vec![]]).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_matrix_zero_width_rows() {
        let m = Matrix::from_vec(2, 0, vec![]).expect("matrix");
        assert_eq!(m.iter_rows().count(), 2);
        assert!(m.row(0).is_empty());
    }

    #[test]
    fn test_matrix_from_vec_checks_len() {
        assert!(Matrix::from_vec(2, 2, vec![1.0; 3]).is_err());
        let m = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).expect("matrix");
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }
}
