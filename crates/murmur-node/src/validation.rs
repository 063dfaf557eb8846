//! # Input Validation
//!
//! Validation for request bodies accepted by the HTTP API.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use murmur_node::validation::SubmitMessageRequest;
//! use validator::Validate;
//!
//! let request = SubmitMessageRequest {
//!     sender: Some("alice".into()),
//!     content: "hello".into(),
//!     attachment: None,
//! };
//! assert!(request.validate().is_ok());
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use murmur_auth::IDENTITY_ID_REGEX;
use murmur_realtime::MessageDraft;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

/// Body of `POST /api/messages`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SubmitMessageRequest {
    /// Sender id. Ignored when the request carries a valid bearer token.
    #[validate(
        length(min = 1, max = 64),
        regex(path = *IDENTITY_ID_REGEX, message = "sender may only contain letters, digits, '.', '_' and '-'")
    )]
    #[serde(default)]
    pub sender: Option<String>,
    /// Text content.
    #[validate(custom(function = "validate_content"))]
    pub content: String,
    /// Attachment reference. Defaults to the sender's avatar.
    #[validate(url)]
    #[serde(default)]
    pub attachment: Option<String>,
}

/// Applies the relay's content rule so HTTP and WebSocket submissions agree.
fn validate_content(content: &str) -> Result<(), ValidationError> {
    MessageDraft::validate_content(content).map_err(|e| {
        ValidationError::new("content").with_message(Cow::Owned(e.to_string()))
    })
}

/// Validation error response.
#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    /// Error type.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Field-level error details.
    pub details: Vec<FieldError>,
}

/// Field-level validation error.
#[derive(Debug, Serialize)]
pub struct FieldError {
    /// Field name.
    pub field: String,
    /// Error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(self)).into_response()
    }
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    code: e.code.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Validation failed for field '{}'", field)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ValidationErrorResponse {
            error: "validation_error".to_string(),
            message: "Validation failed".to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(sender: Option<&str>, content: &str, attachment: Option<&str>) -> SubmitMessageRequest {
        SubmitMessageRequest {
            sender: sender.map(String::from),
            content: content.to_string(),
            attachment: attachment.map(String::from),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request(Some("alice"), "hi", None).validate().is_ok());
        assert!(request(None, "hi", Some("https://img/a.png")).validate().is_ok());
    }

    #[test]
    fn test_invalid_sender() {
        assert!(request(Some(""), "hi", None).validate().is_err());
        assert!(request(Some("has space"), "hi", None).validate().is_err());
        assert!(request(Some(&"a".repeat(65)), "hi", None).validate().is_err());
    }

    #[test]
    fn test_invalid_content() {
        assert!(request(Some("alice"), "", None).validate().is_err());
        assert!(request(Some("alice"), "   ", None).validate().is_err());
        assert!(request(Some("alice"), &"x".repeat(4097), None)
            .validate()
            .is_err());
        assert!(request(Some("alice"), &"é".repeat(4096), None)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_invalid_attachment() {
        assert!(request(Some("alice"), "hi", Some("not a url")).validate().is_err());
    }

    #[test]
    fn test_error_response_lists_fields() {
        let errors = request(Some("bad sender"), "", None).validate().unwrap_err();
        let response = ValidationErrorResponse::from(errors);

        let fields: Vec<&str> = response.details.iter().map(|d| d.field.as_str()).collect();
        assert!(fields.contains(&"content"));
        assert!(fields.contains(&"sender"));
        assert_eq!(response.error, "validation_error");
    }
}
