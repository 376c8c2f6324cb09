//! Logical field to source column mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::options::STATUS_FIELD;
use crate::types::RowMap;

/// Association between logical field names and the source columns that
/// supply their values. Keys are unique; order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `field` to `column`, replacing any previous column for `field`.
    pub fn with(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.0.insert(field.into(), column.into());
        self
    }

    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `(field, column)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, c)| (f.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check the mapping against a dataset's headers.
    ///
    /// Fails if the mapping is empty or names a column the headers do not
    /// contain. An empty header list skips the column check.
    pub fn check_against(&self, headers: &[String]) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(CoreError::Validation(
                "Field mapping must map at least one field".into(),
            ));
        }
        if headers.is_empty() {
            return Ok(());
        }
        let missing: Vec<String> = self
            .iter()
            .filter(|(_, column)| !headers.iter().any(|h| h == column))
            .map(|(field, column)| format!("{field} -> {column}"))
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::Validation(format!(
                "Mapped columns not found in dataset headers: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

impl<F, C> FromIterator<(F, C)> for FieldMapping
where
    F: Into<String>,
    C: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (F, C)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(f, c)| (f.into(), c.into()))
                .collect(),
        )
    }
}

/// One source row after mapping. Lives only for the duration of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRecord {
    /// 1-based position of the row in the dataset.
    pub row_number: usize,
    /// Logical field name to trimmed, non-empty value.
    pub values: BTreeMap<String, String>,
}

impl RowRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

/// Project a source row through the mapping.
///
/// Values are trimmed; empty or missing values are left out of the record.
/// When `default_status` is given and the mapping does not already supply
/// a `status` value, it is written to the record.
pub fn map_row(
    mapping: &FieldMapping,
    row_number: usize,
    row: &RowMap,
    default_status: Option<&str>,
) -> RowRecord {
    let mut values: BTreeMap<String, String> = mapping
        .iter()
        .filter_map(|(field, column)| {
            let value = row.get(column)?.trim();
            (!value.is_empty()).then(|| (field.to_string(), value.to_string()))
        })
        .collect();

    if let Some(status) = default_status {
        values
            .entry(STATUS_FIELD.to_string())
            .or_insert_with(|| status.to_string());
    }

    RowRecord { row_number, values }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn mapping() -> FieldMapping {
        FieldMapping::new()
            .with("email", "E-mail Address")
            .with("name", "Full Name")
    }

    #[test]
    fn maps_and_trims_values() {
        let r = row(&[("E-mail Address", "  ann@example.com "), ("Full Name", "Ann")]);
        let rec = map_row(&mapping(), 1, &r, None);
        assert_eq!(rec.row_number, 1);
        assert_eq!(rec.get("email"), Some("ann@example.com"));
        assert_eq!(rec.get("name"), Some("Ann"));
    }

    #[test]
    fn blank_and_missing_values_are_omitted() {
        let r = row(&[("E-mail Address", "   ")]);
        let rec = map_row(&mapping(), 4, &r, None);
        assert!(rec.values.is_empty());
    }

    #[test]
    fn unmapped_columns_are_dropped() {
        let r = row(&[("Full Name", "Ann"), ("Notes", "vip")]);
        let rec = map_row(&mapping(), 1, &r, None);
        assert_eq!(rec.values.len(), 1);
    }

    #[test]
    fn default_status_fills_status_field() {
        let r = row(&[("Full Name", "Ann")]);
        let rec = map_row(&mapping(), 1, &r, Some("registered"));
        assert_eq!(rec.get("status"), Some("registered"));
    }

    #[test]
    fn mapped_status_wins_over_default() {
        let m = mapping().with("status", "State");
        let r = row(&[("State", "waitlisted")]);
        let rec = map_row(&m, 1, &r, Some("registered"));
        assert_eq!(rec.get("status"), Some("waitlisted"));
    }

    #[test]
    fn check_against_reports_missing_columns() {
        let headers = vec!["Full Name".to_string()];
        let err = mapping().check_against(&headers).unwrap_err();
        assert!(err.to_string().contains("email -> E-mail Address"));
    }

    #[test]
    fn check_against_rejects_empty_mapping() {
        assert!(FieldMapping::new().check_against(&[]).is_err());
    }

    #[test]
    fn deserializes_from_plain_object() {
        let m: FieldMapping =
            serde_json::from_str(r#"{"email": "Email", "name": "Name"}"#).unwrap();
        assert_eq!(m.column_for("email"), Some("Email"));
        assert_eq!(m.len(), 2);
    }
}
