// src/record.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{borrow::Cow, fmt};

/// Cells that look like plain decimal numbers (optionally signed, optional exponent).
/// Anything else, including `NaN` and `inf`, stays a string.
static NUMERIC_CELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$")
        .expect("numeric cell regex should be valid")
});

/// A single loosely-typed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Num(f64),
    Str(String),
    Null,
}

/// Hashable identity of a value, used for distinct counting.
/// `1` and `"1"` are different values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DistinctKey {
    Num(u64),
    Str(String),
}

impl Value {
    /// Lenient dynamic typing of a raw CSV cell: empty → null,
    /// numeric-looking → number, everything else → string.
    pub fn from_cell(raw: &str) -> Self {
        if raw.is_empty() {
            return Value::Null;
        }
        if NUMERIC_CELL.is_match(raw) {
            if let Ok(n) = raw.trim().parse::<f64>() {
                if n.is_finite() {
                    return Value::Num(n);
                }
            }
        }
        Value::Str(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_finite_number(&self) -> bool {
        matches!(self, Value::Num(n) if n.is_finite())
    }

    /// String form of the value. Integral numbers render without a fraction,
    /// null renders as the empty string.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Str(s) => Cow::Borrowed(s.as_str()),
            Value::Num(n) => Cow::Owned(format_number(*n)),
            Value::Null => Cow::Borrowed(""),
        }
    }

    /// `None` for null, which never counts towards cardinality.
    pub fn distinct_key(&self) -> Option<DistinctKey> {
        match self {
            Value::Null => None,
            Value::Str(s) => Some(DistinctKey::Str(s.clone())),
            // fold -0.0 into 0.0 and every NaN into one bucket
            Value::Num(n) if n.is_nan() => Some(DistinctKey::Num(f64::NAN.to_bits())),
            Value::Num(n) => Some(DistinctKey::Num((n + 0.0).to_bits())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Num(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(n as f64)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One source row: column name → value, in source column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, Value)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    /// Inserts or overwrites `name`. An overwritten field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(k, _)| k == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        let mut rec = RawRecord::new();
        for (k, v) in iter {
            rec.insert(k, v);
        }
        rec
    }
}

impl IntoIterator for RawRecord {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = RawRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column name to string, number or null")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawRecord, A::Error> {
                let mut rec = RawRecord::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, Value>()? {
                    rec.insert(k, v);
                }
                Ok(rec)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Shorthand for building records in tests and fixtures.
#[macro_export]
macro_rules! record {
    ($($k:expr => $v:expr),* $(,)?) => {{
        let mut rec = $crate::record::RawRecord::new();
        $( rec.insert($k, $crate::record::Value::from($v)); )*
        rec
    }};
}
