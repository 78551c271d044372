//! Strict Row-to-Entity Mapping
//!
//! Store adapters sit between dynamically typed result rows (SQL drivers,
//! JSON APIs) and the strongly typed entity models. This module makes that
//! seam explicit: a [`Row`] of named column values, typed coercion getters,
//! and a [`MappingError`] that names exactly which column failed instead of
//! silently producing defaults.

use crate::models::{EntityId, Folder, Note};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while mapping a result row to an entity.
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Missing column: {column}")]
    MissingColumn { column: String },

    #[error("Column {column} has unexpected type, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    #[error("Column {column} holds invalid timestamp {value}")]
    InvalidTimestamp { column: String, value: i64 },
}

impl MappingError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    pub fn type_mismatch(column: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected,
        }
    }
}

/// One result row: column name to dynamically typed value.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column setter.
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.insert(column.to_string(), value.into());
        self
    }

    fn value(&self, column: &str) -> Result<&Value, MappingError> {
        self.columns
            .get(column)
            .ok_or_else(|| MappingError::missing_column(column))
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, MappingError> {
        self.value(column)?
            .as_i64()
            .ok_or_else(|| MappingError::type_mismatch(column, "integer"))
    }

    /// Nullable integer column; SQL NULL maps to `None`.
    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>, MappingError> {
        match self.value(column)? {
            Value::Null => Ok(None),
            value => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| MappingError::type_mismatch(column, "integer or null")),
        }
    }

    pub fn get_str(&self, column: &str) -> Result<&str, MappingError> {
        self.value(column)?
            .as_str()
            .ok_or_else(|| MappingError::type_mismatch(column, "string"))
    }

    /// Boolean column, accepting SQLite-style 0/1 integers explicitly.
    pub fn get_bool(&self, column: &str) -> Result<bool, MappingError> {
        match self.value(column)? {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(MappingError::type_mismatch(column, "boolean or 0/1")),
            },
            _ => Err(MappingError::type_mismatch(column, "boolean or 0/1")),
        }
    }

    /// Unix-seconds timestamp column.
    pub fn get_timestamp(&self, column: &str) -> Result<DateTime<Utc>, MappingError> {
        let seconds = self.get_i64(column)?;
        DateTime::<Utc>::from_timestamp(seconds, 0).ok_or(MappingError::InvalidTimestamp {
            column: column.to_string(),
            value: seconds,
        })
    }
}

/// Entities constructible from a store result row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, MappingError>;
}

impl FromRow for Folder {
    fn from_row(row: &Row) -> Result<Self, MappingError> {
        Ok(Folder {
            id: EntityId::Persisted(row.get_i64("id")?),
            name: row.get_str("name")?.to_string(),
            parent_id: row.get_opt_i64("parent_id")?.map(EntityId::Persisted),
            position: row.get_i64("position")?,
            is_favorite: row.get_bool("is_favorite")?,
            is_public: row.get_bool("is_public")?,
            is_temp: false,
            created_at: row.get_timestamp("created_at")?,
            updated_at: row.get_timestamp("updated_at")?,
            children: Vec::new(),
        })
    }
}

impl FromRow for Note {
    fn from_row(row: &Row) -> Result<Self, MappingError> {
        Ok(Note {
            id: EntityId::Persisted(row.get_i64("id")?),
            title: row.get_str("title")?.to_string(),
            content: row.get_str("content")?.to_string(),
            parent_id: row.get_opt_i64("folder_id")?.map(EntityId::Persisted),
            position: row.get_i64("position")?,
            is_pinned: row.get_bool("is_pinned")?,
            is_temp: false,
            created_at: row.get_timestamp("created_at")?,
            updated_at: row.get_timestamp("updated_at")?,
        })
    }
}
