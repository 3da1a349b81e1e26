// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int64(i64),
    Double(f64),
    Bool(bool),
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// A stored row: partition key, row key and named properties.
///
/// `(partition_key, row_key)` identifies the row within its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new<P: Into<String>, R: Into<String>>(partition_key: P, row_key: R) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_property<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        _ = self.properties.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub(crate) fn key(&self) -> (String, String) {
        (self.partition_key.clone(), self.row_key.clone())
    }
}

/// A unit of work inside a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert the entity, replacing any row with the same keys
    Upsert(Entity),
}

impl Operation {
    #[must_use]
    pub fn entity(&self) -> &Entity {
        match self {
            Operation::Upsert(entity) => entity,
        }
    }

    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.entity().partition_key
    }

    #[must_use]
    pub fn row_key(&self) -> &str {
        &self.entity().row_key
    }
}
