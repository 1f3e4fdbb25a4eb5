//! Resolution of mapped field values from rows.

use serde_json::Value;

use crate::config::StepConfig;
use crate::error::StepError;
use crate::types::Row;

/// Field names checked against the first row.
#[derive(Debug, Clone)]
pub struct FieldMap {
    access_token: String,
    source: String,
    target: String,
}

/// Values of the mapped fields for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFields {
    pub access_token: String,
    pub source: String,
    pub target: String,
}

impl FieldMap {
    /// Checks that `first` carries every mapped field.
    ///
    /// Later rows are assumed to share the first row's layout.
    pub fn resolve(config: &StepConfig, first: &Row) -> Result<Self, StepError> {
        for field in [
            &config.access_token_field,
            &config.source_files_field,
            &config.target_files_field,
        ] {
            if !first.contains_key(field) {
                return Err(StepError::UnknownField(field.clone()));
            }
        }
        Ok(Self {
            access_token: config.access_token_field.clone(),
            source: config.source_files_field.clone(),
            target: config.target_files_field.clone(),
        })
    }

    /// Reads the mapped values of `row`.
    pub fn extract(&self, row: &Row) -> Result<RowFields, StepError> {
        Ok(RowFields {
            access_token: string_field(row, &self.access_token)?,
            source: string_field(row, &self.source)?,
            target: string_field(row, &self.target)?,
        })
    }
}

fn string_field(row: &Row, field: &str) -> Result<String, StepError> {
    match row.get(field) {
        None | Some(Value::Null) => Err(StepError::EmptyValue {
            field: field.to_string(),
        }),
        Some(Value::String(s)) if s.is_empty() => Err(StepError::EmptyValue {
            field: field.to_string(),
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(StepError::NotAString {
            field: field.to_string(),
        }),
    }
}
