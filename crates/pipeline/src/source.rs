//! Row sources: where a job's dataset comes from.
//!
//! Decoding happens once, during the job's preparing phase. Two layouts
//! are accepted from JSON:
//!
//! - `{"headers": [...], "rows": [...]}` where each row is an object keyed
//!   by header or an array in header order.
//! - A bare array of objects; headers are collected from the keys.
//!
//! Scalars are stringified and `null` becomes an empty cell. Nested
//! arrays or objects inside a cell are rejected.

use std::path::PathBuf;

use async_trait::async_trait;
use registrar_core::dataset::Dataset;
use registrar_core::types::RowMap;
use serde_json::Value;

use crate::error::SourceError;

#[async_trait]
pub trait RowSource: Send + Sync {
    async fn decode(&self) -> Result<Dataset, SourceError>;
}

// ---------------------------------------------------------------------------
// StaticSource
// ---------------------------------------------------------------------------

/// A dataset that is already in memory.
#[derive(Debug, Clone)]
pub struct StaticSource(Dataset);

impl StaticSource {
    pub fn new(dataset: Dataset) -> Self {
        Self(dataset)
    }
}

#[async_trait]
impl RowSource for StaticSource {
    async fn decode(&self) -> Result<Dataset, SourceError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// JsonFileSource
// ---------------------------------------------------------------------------

/// Reads a JSON dataset file from disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RowSource for JsonFileSource {
    async fn decode(&self) -> Result<Dataset, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let dataset = parse_dataset(value)?;

        tracing::debug!(
            path = %self.path.display(),
            rows = dataset.len(),
            columns = dataset.headers.len(),
            "Decoded dataset file",
        );
        Ok(dataset)
    }
}

/// Build a [`Dataset`] from either accepted JSON layout.
pub fn parse_dataset(value: Value) -> Result<Dataset, SourceError> {
    let dataset = match value {
        Value::Object(mut obj) => {
            let headers = match obj.remove("headers") {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .map(|h| match h {
                        Value::String(s) => Ok(s),
                        other => Err(SourceError::UnsupportedFormat(format!(
                            "header must be a string, got {other}"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                _ => {
                    return Err(SourceError::UnsupportedFormat(
                        "expected a \"headers\" array".into(),
                    ))
                }
            };
            let rows = match obj.remove("rows") {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .map(|row| row_from_value(row, &headers))
                    .collect::<Result<Vec<_>, _>>()?,
                _ => {
                    return Err(SourceError::UnsupportedFormat(
                        "expected a \"rows\" array".into(),
                    ))
                }
            };
            Dataset::new(headers, rows)
        }
        Value::Array(items) => {
            let mut headers: Vec<String> = Vec::new();
            let mut rows = Vec::with_capacity(items.len());
            for item in items {
                let Value::Object(obj) = item else {
                    return Err(SourceError::UnsupportedFormat(
                        "array datasets must contain objects".into(),
                    ));
                };
                for key in obj.keys() {
                    if !headers.contains(key) {
                        headers.push(key.clone());
                    }
                }
                rows.push(row_from_value(Value::Object(obj), &headers)?);
            }
            Dataset::new(headers, rows)
        }
        other => {
            return Err(SourceError::UnsupportedFormat(format!(
                "expected an object or array at top level, got {}",
                json_kind(&other)
            )))
        }
    };

    if dataset.is_empty() {
        return Err(SourceError::Empty);
    }
    Ok(dataset)
}

fn row_from_value(row: Value, headers: &[String]) -> Result<RowMap, SourceError> {
    match row {
        Value::Object(obj) => obj
            .into_iter()
            .map(|(k, v)| cell_to_string(v).map(|s| (k, s)))
            .collect(),
        Value::Array(cells) => headers
            .iter()
            .cloned()
            .zip(cells)
            .map(|(h, v)| cell_to_string(v).map(|s| (h, s)))
            .collect(),
        other => Err(SourceError::UnsupportedFormat(format!(
            "row must be an object or array, got {}",
            json_kind(&other)
        ))),
    }
}

fn cell_to_string(value: Value) -> Result<String, SourceError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(SourceError::UnsupportedFormat(format!(
            "cell values must be scalars, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
