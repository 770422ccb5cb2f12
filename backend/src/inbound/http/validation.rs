//! Shared validation helpers for inbound HTTP adapters.

use serde_json::json;

use crate::domain::{Error, RecordId};

/// Validation error codes for HTTP request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidInteger,
    InvalidJson,
    InvalidText,
    TooLarge,
    MissingFileName,
}

impl ErrorCode {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidInteger => "invalid_integer",
            ErrorCode::InvalidJson => "invalid_json",
            ErrorCode::InvalidText => "invalid_text",
            ErrorCode::TooLarge => "too_large",
            ErrorCode::MissingFileName => "missing_file_name",
        }
    }
}

/// Newtype wrapper for HTTP field names to provide type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    fn as_str(self) -> &'static str {
        self.0
    }
}

/// Builder for validation errors with field context.
struct ValidationError {
    field: &'static str,
    message: String,
}

impl ValidationError {
    fn new(field: FieldName, message: impl Into<String>) -> Self {
        Self {
            field: field.as_str(),
            message: message.into(),
        }
    }

    fn with_code(self, code: ErrorCode) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "code": code.as_str(),
        }))
    }

    fn with_value(self, code: ErrorCode, value: impl Into<String>) -> Error {
        Error::invalid_request(self.message).with_details(json!({
            "field": self.field,
            "value": value.into(),
            "code": code.as_str(),
        }))
    }
}

/// Treat absent and blank text the same way.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

pub(crate) fn parse_record_id(value: &str, field: FieldName) -> Result<RecordId, Error> {
    value
        .trim()
        .parse::<i64>()
        .map(RecordId::new)
        .map_err(|_| {
            ValidationError::new(field, format!("{} must be a whole number", field.as_str()))
                .with_value(ErrorCode::InvalidInteger, value)
        })
}

pub(crate) fn invalid_json_error(field: FieldName, reason: impl std::fmt::Display) -> Error {
    ValidationError::new(field, format!("{} must be valid JSON: {reason}", field.as_str()))
        .with_code(ErrorCode::InvalidJson)
}

pub(crate) fn invalid_text_error(field: FieldName) -> Error {
    ValidationError::new(field, format!("{} must be UTF-8 text", field.as_str()))
        .with_code(ErrorCode::InvalidText)
}

pub(crate) fn too_large_error(field: FieldName, limit: usize) -> Error {
    ValidationError::new(
        field,
        format!("{} exceeds the {limit} byte limit", field.as_str()),
    )
    .with_code(ErrorCode::TooLarge)
}

pub(crate) fn missing_file_name_error(field: FieldName) -> Error {
    ValidationError::new(field, format!("{} upload must carry a file name", field.as_str()))
        .with_code(ErrorCode::MissingFileName)
}
