use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Represents a scalar cell value in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Missing value.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// Integer number literal.
    Integer(i64),
    /// Floating point number literal.
    Float(f64),
    /// Plain string literal.
    String(String),
    /// Date and time without an offset.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns true for `Null` and for floating-point NaN, which source
    /// systems use interchangeably for a missing number.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    /// Returns the numeric value for integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_)) && !self.is_null()
    }

    /// Converts the value into the JSON representation used by exports.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(value) => serde_json::Value::Bool(*value),
            Value::Integer(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(value) => serde_json::Value::String(value.clone()),
            Value::Timestamp(value) => {
                serde_json::Value::String(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
        }
    }

    /// Builds a value from a parsed JSON scalar. Arrays and objects are kept
    /// as their compact JSON text.
    pub fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Boolean(*value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(integer) => Value::Integer(integer),
                None => number.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(value) => Value::String(value.clone()),
            other => Value::String(other.to_string()),
        }
    }

    /// Hashable identity of the value when it takes part in a key tuple.
    pub fn key_atom(&self) -> KeyAtom {
        match self {
            Value::Null => KeyAtom::Null,
            Value::Boolean(value) => KeyAtom::Boolean(*value),
            Value::Integer(value) => KeyAtom::Integer(*value),
            Value::Float(value) if value.is_nan() => KeyAtom::Null,
            Value::Float(value) => {
                if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                    KeyAtom::Integer(*value as i64)
                } else {
                    KeyAtom::Float(value.to_bits())
                }
            }
            Value::String(value) => KeyAtom::String(value.clone()),
            Value::Timestamp(value) => KeyAtom::Timestamp(*value),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::String(value) => f.write_str(value),
            Value::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

/// One component of a key tuple. Integral floats collapse onto integers so
/// that `1` and `1.0` identify the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyAtom {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(u64),
    String(String),
    Timestamp(NaiveDateTime),
}

/// Ordered key-value tuple identifying a record.
pub type KeyTuple = Vec<KeyAtom>;

/// A single record: column name → value, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field, keeping the position of an existing
    /// column.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    /// Builder-style variant of [`Record::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Value of a column, `Null` when the record does not carry it.
    pub fn value_or_null(&self, column: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.get(column).unwrap_or(NULL)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Key tuple for the given columns; absent columns contribute `Null`.
    pub fn key(&self, key_columns: &[String]) -> KeyTuple {
        key_columns
            .iter()
            .map(|column| self.value_or_null(column).key_atom())
            .collect()
    }

    /// Key columns paired with this record's values, for reporting.
    pub fn key_values(&self, key_columns: &[String]) -> Vec<(String, Value)> {
        key_columns
            .iter()
            .map(|column| (column.clone(), self.value_or_null(column).clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

/// An ordered sequence of records supplied by an acquisition collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Union of column names across all records, in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for record in &self.records {
            for column in record.columns() {
                if seen.insert(column) {
                    columns.push(column.to_string());
                }
            }
        }
        columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.records
            .iter()
            .any(|record| record.get(column).is_some())
    }

    /// Builds a dataset from a JSON array of objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Dataset> {
        let rows = value.as_array()?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let object = row.as_object()?;
            records.push(
                object
                    .iter()
                    .map(|(column, value)| (column.clone(), Value::from_json(value)))
                    .collect(),
            );
        }
        Some(Dataset { records })
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Dataset {
            records: iter.into_iter().collect(),
        }
    }
}

/// Canonical identity of a column name: trimmed and lower-cased.
pub fn canonical_column(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Canonicalises a caller-supplied column list, dropping blanks and repeats
/// while preserving order.
pub fn canonical_columns<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|name| canonical_column(name.as_ref()))
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}
