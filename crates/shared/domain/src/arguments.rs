//! Opaque configuration bags handed to storage backends, wrapper layers and mount options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single configuration value.
///
/// Values coming from environment overrides arrive as text, so the typed accessors on
/// [`Arguments`] also accept textual forms (`"true"`, `"42"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ArgumentValue {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            Self::Float(_) => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Float(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Conversion used by typed lookups with a fallback, see [`Arguments::value_or`].
pub trait FromArgument: Sized {
    fn from_argument(value: &ArgumentValue) -> Option<Self>;
}

impl FromArgument for bool {
    fn from_argument(value: &ArgumentValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromArgument for i64 {
    fn from_argument(value: &ArgumentValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FromArgument for u64 {
    fn from_argument(value: &ArgumentValue) -> Option<Self> {
        value.as_i64().and_then(|v| Self::try_from(v).ok())
    }
}

impl FromArgument for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_argument(value: &ArgumentValue) -> Option<Self> {
        match value {
            ArgumentValue::Float(f) => Some(*f),
            ArgumentValue::Integer(i) => Some(*i as Self),
            ArgumentValue::Text(s) => s.trim().parse().ok(),
            ArgumentValue::Bool(_) => None,
        }
    }
}

impl FromArgument for String {
    fn from_argument(value: &ArgumentValue) -> Option<Self> {
        match value {
            ArgumentValue::Text(s) => Some(s.clone()),
            ArgumentValue::Bool(b) => Some(b.to_string()),
            ArgumentValue::Integer(i) => Some(i.to_string()),
            ArgumentValue::Float(f) => Some(f.to_string()),
        }
    }
}

impl From<bool> for ArgumentValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ArgumentValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ArgumentValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ArgumentValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ArgumentValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Name → value bag, ordered by name for deterministic iteration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(BTreeMap<String, ArgumentValue>);

impl Arguments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgumentValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgumentValue>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Textual value; non-text values are not coerced.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgumentValue::as_str)
    }

    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgumentValue::as_bool)
    }

    #[must_use]
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgumentValue::as_i64)
    }

    /// Typed lookup falling back to `default` when the value is missing or has the wrong type.
    #[must_use]
    pub fn value_or<T: FromArgument>(&self, name: &str, default: T) -> T {
        self.get(name).and_then(T::from_argument).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Arguments
where
    K: Into<String>,
    V: Into<ArgumentValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
