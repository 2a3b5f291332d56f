//! Field schema for sensory attributes
//!
//! A schema is an ordered list of named numeric fields, each bounded by a closed
//! range. Order matters: positional rows are matched against it and canonical
//! rows iterate in it.

use serde::{Deserialize, Serialize};

/// Lower bound shared by all cupping attributes
pub const SCORE_MIN: f64 = 0.0;

/// Upper bound shared by all cupping attributes
pub const SCORE_MAX: f64 = 10.0;

/// Names of the attributes exposed to end users, in form order
pub const COFFEE_FIELDS: [&str; 8] = [
    "Aroma",
    "Flavor",
    "Aftertaste",
    "Acidity",
    "Body",
    "Balance",
    "Sweetness",
    "Clean.Cup",
];

/// Help text shown next to the form for the one non-obvious attribute
pub const CLEAN_CUP_HELP: &str = "Clean.Cup indicates the absence of off-flavors or defects \
(higher is better). Typically scored on the same sensory scale as other cup attributes.";

/// Closed numeric range `[lo, hi]`; always `lo <= hi`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RangeBounds")]
pub struct Range {
    lo: f64,
    hi: f64,
}

#[derive(Deserialize)]
struct RangeBounds {
    lo: f64,
    hi: f64,
}

impl From<RangeBounds> for Range {
    fn from(bounds: RangeBounds) -> Self {
        Self::new(bounds.lo, bounds.hi)
    }
}

impl Range {
    /// Create a range; bounds are swapped if given in the wrong order
    #[must_use]
    pub fn new(lo: f64, hi: f64) -> Self {
        if lo <= hi {
            Self { lo, hi }
        } else {
            Self { lo: hi, hi: lo }
        }
    }

    /// Inclusive lower bound
    #[must_use]
    pub fn lo(&self) -> f64 {
        self.lo
    }

    /// Inclusive upper bound
    #[must_use]
    pub fn hi(&self) -> f64 {
        self.hi
    }

    /// Clamp a finite value into the range
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lo).min(self.hi)
    }

    /// Whether `value` lies inside the range
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lo && value <= self.hi
    }
}

/// One named, bounded field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name, used verbatim as the row key
    pub name: String,
    /// Accepted value range
    pub range: Range,
}

/// Ordered set of fields a canonical row must carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    fields: Vec<Field>,
}

impl FieldSchema {
    /// Build a schema from fields; later duplicates of a name are dropped
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        let mut unique: Vec<Field> = Vec::with_capacity(fields.len());
        for field in fields {
            if !unique.iter().any(|f| f.name == field.name) {
                unique.push(field);
            }
        }
        Self { fields: unique }
    }

    /// Schema where every name shares one range
    #[must_use]
    pub fn uniform<S: AsRef<str>>(names: &[S], range: Range) -> Self {
        Self::new(
            names
                .iter()
                .map(|name| Field {
                    name: name.as_ref().to_string(),
                    range,
                })
                .collect(),
        )
    }

    /// The eight cupping attributes, each in `[0, 10]`
    #[must_use]
    pub fn coffee() -> Self {
        Self::uniform(&COFFEE_FIELDS, Range::new(SCORE_MIN, SCORE_MAX))
    }

    /// Fields in declared order
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field names in declared order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Number of fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the schema has no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::coffee()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coffee_schema_order() {
        let schema = FieldSchema::coffee();
        assert_eq!(schema.len(), 8);
        let names: Vec<&str> = schema.names().collect();
        assert_eq!(names, COFFEE_FIELDS.to_vec());
        for field in schema.fields() {
            assert_eq!(field.range, Range::new(0.0, 10.0));
        }
    }

    #[test]
    fn test_range_clamp() {
        let range = Range::new(0.0, 10.0);
        assert_eq!(range.clamp(13.0), 10.0);
        assert_eq!(range.clamp(-2.0), 0.0);
        assert_eq!(range.clamp(7.5), 7.5);
        assert!(range.contains(0.0));
        assert!(range.contains(10.0));
        assert!(!range.contains(10.01));
    }

    #[test]
    fn test_range_swaps_reversed_bounds() {
        let range = Range::new(5.0, 1.0);
        assert_eq!(range.lo(), 1.0);
        assert_eq!(range.hi(), 5.0);
    }

    #[test]
    fn test_deserialized_range_is_ordered() {
        let range: Range = serde_json::from_str(r#"{"lo": 10, "hi": 0}"#).expect("range");
        assert_eq!(range, Range::new(0.0, 10.0));
        assert!(range.contains(5.0));
        assert_eq!(range.clamp(12.0), 10.0);
    }

    #[test]
    fn test_duplicate_fields_dropped() {
        let schema = FieldSchema::uniform(&["Aroma", "Body", "Aroma"], Range::new(0.0, 1.0));
        assert_eq!(schema.len(), 2);
        assert!(schema.get("Body").is_some());
        assert!(schema.get("Acidity").is_none());
    }
}
