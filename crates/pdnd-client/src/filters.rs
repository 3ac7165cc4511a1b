//! Query filters for downstream API calls.
//!
//! A filter resolves to a single query string, appended to the API URL with
//! a literal `?` when non-empty:
//!
//! - [`FilterSpec::Raw`] is used verbatim
//! - [`FilterSpec::Fragments`] are joined with `&`, in order, without re-encoding
//! - [`FilterSpec::Map`] is form-encoded in insertion order; list values become
//!   repeated `key[]=value` pairs
//!
//! ```rust
//! use pdnd_client::filters::{FilterSpec, FilterValue};
//!
//! let spec = FilterSpec::Map(vec![
//!     ("status".to_string(), FilterValue::from("ACTIVE")),
//!     ("category".to_string(), FilterValue::from(vec!["books", "music"])),
//! ]);
//! assert_eq!(
//!     spec.to_query_string(),
//!     "status=ACTIVE&category%5B%5D=books&category%5B%5D=music"
//! );
//! ```

use crate::error::{PdndError, Result};
use serde_json::Value;
use url::form_urlencoded;

/// Value of one entry in a [`FilterSpec::Map`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Emitted as `key=value`.
    Scalar(String),
    /// Emitted as `key[]=v` once per item, in order.
    List(Vec<String>),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl<T: Into<String>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Query portion of an API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// Pre-built query string.
    Raw(String),
    /// Pre-encoded `key=value` fragments.
    Fragments(Vec<String>),
    /// Key to scalar-or-list entries, form-encoded on output in the order given.
    Map(Vec<(String, FilterValue)>),
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self::Fragments(Vec::new())
    }
}

impl From<&str> for FilterSpec {
    fn from(raw: &str) -> Self {
        Self::Raw(raw.to_string())
    }
}

impl From<String> for FilterSpec {
    fn from(raw: String) -> Self {
        Self::Raw(raw)
    }
}

impl From<Vec<String>> for FilterSpec {
    fn from(fragments: Vec<String>) -> Self {
        Self::Fragments(fragments)
    }
}

impl From<Vec<(String, FilterValue)>> for FilterSpec {
    fn from(entries: Vec<(String, FilterValue)>) -> Self {
        Self::Map(entries)
    }
}

impl FilterSpec {
    /// Resolve to a canonical query string (without the leading `?`).
    #[must_use]
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Raw(raw) => raw.clone(),
            Self::Fragments(fragments) => fragments.join("&"),
            Self::Map(map) => encode_map(map),
        }
    }

    /// Append the resolved query string to `base_url`.
    #[must_use]
    pub fn apply_to(&self, base_url: &str) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            base_url.to_string()
        } else {
            format!("{base_url}?{query}")
        }
    }

    /// Interpret dynamically typed filters.
    ///
    /// A string is raw, an array of strings is a fragment list, an object of
    /// scalars or scalar arrays is a map. Object keys keep their document
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::InvalidArgument` for any other shape.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(raw) => Ok(Self::Raw(raw.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(fragment) => Ok(fragment.clone()),
                    other => Err(invalid_shape(other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Fragments),
            Value::Object(entries) => entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), filter_value(value)?)))
                .collect::<Result<Vec<_>>>()
                .map(Self::Map),
            other => Err(invalid_shape(other)),
        }
    }
}

impl TryFrom<Value> for FilterSpec {
    type Error = PdndError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(&value)
    }
}

fn encode_map(entries: &[(String, FilterValue)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in entries {
        match value {
            FilterValue::Scalar(scalar) => {
                serializer.append_pair(key, scalar);
            }
            FilterValue::List(items) => {
                let list_key = format!("{key}[]");
                for item in items {
                    serializer.append_pair(&list_key, item);
                }
            }
        }
    }
    serializer.finish()
}

fn filter_value(value: &Value) -> Result<FilterValue> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(scalar)
            .collect::<Result<Vec<_>>>()
            .map(FilterValue::List),
        other => scalar(other).map(FilterValue::Scalar),
    }
}

fn scalar(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(invalid_shape(other)),
    }
}

fn invalid_shape(value: &Value) -> PdndError {
    PdndError::InvalidArgument(format!(
        "Filters must be a string, a list of strings, or a map of scalars; got {value}"
    ))
}
