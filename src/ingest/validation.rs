use serde_json::Value;
use thiserror::Error;

/// Record-level errors. A record failing with one of these is excluded
/// from the run; it never aborts the load.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Required field missing: {0}")]
    MissingField(&'static str),

    #[error("Invalid field value: {field} = {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl RecordError {
    /// Stable label used when summarizing skipped records
    pub fn reason(&self) -> String {
        match self {
            RecordError::NotAnObject => "not_an_object".to_string(),
            RecordError::MissingField(field) => format!("missing_{}", field),
            RecordError::InvalidValue { field, .. } => format!("invalid_{}", field),
        }
    }
}

/// Look up a dotted field path.
///
/// Accepts both nested objects (`{"account": {"id": ..}}`) and the flattened
/// form some exports use (`{"account.id": ..}`).
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }
    path.split('.')
        .try_fold(record, |current, segment| current.get(segment))
}

/// Non-empty string at `path`, or None when absent, null, or blank.
pub fn optional_str(record: &Value, path: &str) -> Option<String> {
    lookup(record, path)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn required_str(record: &Value, path: &'static str) -> Result<String, RecordError> {
    optional_str(record, path).ok_or(RecordError::MissingField(path))
}

/// Numeric field that may be encoded as a JSON number or a decimal string.
pub fn required_f64(record: &Value, path: &'static str) -> Result<f64, RecordError> {
    let value = lookup(record, path)
        .filter(|v| !v.is_null())
        .ok_or(RecordError::MissingField(path))?;

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| RecordError::InvalidValue {
            field: path,
            value: value.to_string(),
        })
}
