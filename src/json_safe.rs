//! JSON safety normalizer
//!
//! Numeric code freely produces NaN, infinities and library-specific scalar
//! wrappers (half-precision floats, fixed-width integers). A strict JSON encoder
//! rejects those. [`normalize`] rewrites arbitrary nested [`Loose`] data into a
//! [`serde_json::Value`], which by construction cannot hold a non-finite
//! number: NaN and infinities become `null`.
//!
//! ## Example
//!
//! ```
//! use cupscore::json_safe::{normalize, Loose};
//!
//! let data = Loose::Seq(vec![Loose::Float(1.5), Loose::Float(f64::NAN)]);
//! assert_eq!(normalize(&data).to_string(), "[1.5,null]");
//! ```

use std::{fmt, sync::Arc};

use half::f16;
use serde_json::{Map, Number, Value};

use crate::{
    coerce::CanonicalRow,
    error::{CupError, Result},
};

/// Scalar wrapper types coming out of numeric libraries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericScalar {
    /// Half-precision float
    F16(f16),
    /// Single-precision float
    F32(f32),
    /// Double-precision float
    F64(f64),
    /// 8-bit signed integer
    I8(i8),
    /// 16-bit signed integer
    I16(i16),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit signed integer
    I64(i64),
    /// 8-bit unsigned integer
    U8(u8),
    /// 16-bit unsigned integer
    U16(u16),
    /// 32-bit unsigned integer
    U32(u32),
    /// 64-bit unsigned integer
    U64(u64),
    /// Boolean scalar
    Bool(bool),
}

impl NumericScalar {
    /// Unwrap into the equivalent plain primitive
    #[must_use]
    pub fn item(self) -> Loose {
        match self {
            Self::F16(v) => Loose::Float(v.to_f64()),
            Self::F32(v) => Loose::Float(f64::from(v)),
            Self::F64(v) => Loose::Float(v),
            Self::I8(v) => Loose::Int(i64::from(v)),
            Self::I16(v) => Loose::Int(i64::from(v)),
            Self::I32(v) => Loose::Int(i64::from(v)),
            Self::I64(v) => Loose::Int(v),
            Self::U8(v) => Loose::UInt(u64::from(v)),
            Self::U16(v) => Loose::UInt(u64::from(v)),
            Self::U32(v) => Loose::UInt(u64::from(v)),
            Self::U64(v) => Loose::UInt(v),
            Self::Bool(v) => Loose::Bool(v),
        }
    }
}

/// A value of a type the normalizer does not know about
///
/// Normalized via best-effort stringification; `None` means even that failed.
pub trait Opaque: fmt::Debug + Send + Sync {
    /// Text form of the value, if it has one
    fn stringify(&self) -> Option<String>;
}

/// Adapter exposing any `Display` type as [`Opaque`]
#[derive(Debug)]
pub struct Displayed<T>(pub T);

impl<T: fmt::Display + fmt::Debug + Send + Sync> Opaque for Displayed<T> {
    fn stringify(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

/// Arbitrary nested data prior to normalization
#[derive(Debug, Clone)]
pub enum Loose {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Float, possibly non-finite
    Float(f64),
    /// String
    Str(String),
    /// Numeric-library scalar wrapper
    Scalar(NumericScalar),
    /// Ordered sequence
    Seq(Vec<Loose>),
    /// Mapping; keys kept verbatim and in order
    Map(Vec<(String, Loose)>),
    /// Unrecognized type
    Opaque(Arc<dyn Opaque>),
}

impl From<f64> for Loose {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Loose {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Loose {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Loose {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Loose {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<f16> for Loose {
    fn from(v: f16) -> Self {
        Self::Scalar(NumericScalar::F16(v))
    }
}

impl From<NumericScalar> for Loose {
    fn from(v: NumericScalar) -> Self {
        Self::Scalar(v)
    }
}

impl<T: Into<Loose>> From<Option<T>> for Loose {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Loose>> From<Vec<T>> for Loose {
    fn from(v: Vec<T>) -> Self {
        Self::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl From<&CanonicalRow> for Loose {
    fn from(row: &CanonicalRow) -> Self {
        Self::Map(
            row.iter()
                .map(|(name, value)| (name.to_string(), Loose::from(value)))
                .collect(),
        )
    }
}

impl From<Value> for Loose {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    n.as_f64().map_or(Self::Null, Self::Float)
                }
            },
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::Seq(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

/// Rewrite `value` into strict-JSON-representable form
///
/// Total and recursive: mappings and sequences are walked, numeric-library
/// scalars are unwrapped, non-finite floats become `null`, unknown types are
/// stringified (or `null` when that fails).
#[must_use]
pub fn normalize(value: &Loose) -> Value {
    match value {
        Loose::Null => Value::Null,
        Loose::Bool(b) => Value::Bool(*b),
        Loose::Int(i) => Value::from(*i),
        Loose::UInt(u) => Value::from(*u),
        Loose::Float(f) => safe_float(*f),
        Loose::Str(s) => Value::String(s.clone()),
        Loose::Scalar(scalar) => normalize(&scalar.item()),
        Loose::Seq(items) => Value::Array(items.iter().map(normalize).collect()),
        Loose::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, item) in entries {
                map.insert(key.clone(), normalize(item));
            }
            Value::Object(map)
        },
        Loose::Opaque(opaque) => opaque.stringify().map_or(Value::Null, Value::String),
    }
}

/// Normalize a float: finite values pass, NaN and infinities become `null`
#[must_use]
pub fn safe_float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// Normalize a float to an optional finite value
#[must_use]
pub fn finite_or_none(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Normalize an already-JSON value (identity on anything `serde_json` can hold)
#[must_use]
pub fn normalize_json(value: &Value) -> Value {
    normalize(&Loose::from(value.clone()))
}

/// Normalize and encode compactly
///
/// # Errors
///
/// Returns [`CupError::Format`] if encoding fails, which a normalized value
/// does not trigger in practice.
pub fn to_safe_json_string(value: &Loose) -> Result<String> {
    serde_json::to_string(&normalize(value)).map_err(|e| CupError::Format {
        reason: format!("Serialization error: {e}"),
    })
}

/// Normalize and encode with two-space indentation
///
/// # Errors
///
/// Returns [`CupError::Format`] if encoding fails.
pub fn to_safe_json_pretty(value: &Loose) -> Result<String> {
    serde_json::to_string_pretty(&normalize(value)).map_err(|e| CupError::Format {
        reason: format!("Serialization error: {e}"),
    })
}
