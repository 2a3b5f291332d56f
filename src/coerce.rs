//! Value coercion and row sanitation
//!
//! Untrusted form input arrives as loosely typed scalars. [`coerce`] turns one
//! scalar into either a finite in-range float or the absent marker and never
//! fails; [`sanitize`] applies it across a [`FieldSchema`] so that every
//! [`CanonicalRow`] carries exactly the schema's fields.
//!
//! ## Example
//!
//! ```
//! use cupscore::coerce::{coerce, RawValue};
//! use cupscore::schema::Range;
//!
//! let range = Range::new(0.0, 10.0);
//! assert_eq!(coerce(&RawValue::from("7.5pts"), range), Some(7.5));
//! assert_eq!(coerce(&RawValue::from("13"), range), Some(10.0));
//! assert_eq!(coerce(&RawValue::from(""), range), None);
//! ```

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::schema::{FieldSchema, Range};

/// One raw scalar as supplied by a caller
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// No value (null / None / unset cell)
    Null,
    /// Boolean; counts as 1.0 or 0.0
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float, possibly non-finite
    Float(f64),
    /// Free-form text
    Text(String),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<&serde_json::Value> for RawValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(s) => Self::Text(s.clone()),
            // Containers are not scalars; their text form goes through salvage parsing
            other => Self::Text(other.to_string()),
        }
    }
}

/// Raw input row in one of the two shapes a form can produce
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// Field name to value; unknown names are ignored
    Tabular(HashMap<String, RawValue>),
    /// Values aligned to the schema's declared order
    Positional(Vec<RawValue>),
}

impl RawRow {
    /// Build a tabular row from `(name, value)` pairs
    pub fn tabular<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self::Tabular(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a positional row
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RawValue>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }
}

/// Schema-validated row: every schema field, in order, as a finite in-range
/// float or `None` (absent)
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    values: Vec<(String, Option<f64>)>,
}

impl CanonicalRow {
    /// Value of a field; outer `None` when the field is not in the schema
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Option<f64>> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| *v)
    }

    /// `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Values in schema order
    pub fn values(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        self.values.iter().map(|(_, v)| *v)
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for CanonicalRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Coerce one raw scalar into `range`
///
/// Empty or whitespace-only text and null are absent. Text that does not parse
/// as a float is salvaged by keeping only digits, `.` and `-` (so `"7.5pts"`
/// becomes `7.5`). Non-finite results are absent; finite results are clamped.
#[must_use]
pub fn coerce(raw: &RawValue, range: Range) -> Option<f64> {
    let parsed = match raw {
        RawValue::Null => None,
        RawValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        RawValue::Int(i) => Some(*i as f64),
        RawValue::Float(f) => Some(*f),
        RawValue::Text(text) => parse_text(text),
    }?;

    if parsed.is_finite() {
        Some(range.clamp(parsed))
    } else {
        None
    }
}

fn parse_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Some(value);
    }
    salvage(text)
}

fn salvage(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    match cleaned.as_str() {
        "" | "." | "-" => None,
        digits => digits.parse::<f64>().ok(),
    }
}

/// Sanitize one raw row against `schema`
///
/// Fields missing from the raw row are absent. Positional rows shorter than the
/// schema are padded with empty values; extra trailing values are ignored.
#[must_use]
pub fn sanitize(raw: &RawRow, schema: &FieldSchema) -> CanonicalRow {
    let values = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let value = match raw {
                RawRow::Tabular(map) => map.get(&field.name),
                RawRow::Positional(cells) => cells.get(idx),
            };
            let coerced = value.and_then(|v| coerce(v, field.range));
            (field.name.clone(), coerced)
        })
        .collect();
    CanonicalRow { values }
}

/// Sanitize every row of a batch, preserving order
#[must_use]
pub fn sanitize_table(rows: &[RawRow], schema: &FieldSchema) -> Vec<CanonicalRow> {
    rows.iter().map(|row| sanitize(row, schema)).collect()
}
