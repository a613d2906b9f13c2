use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::Utc;
use derive_more::Display;
use serde::Serialize;
use serde_json::json;
use sqlx::error::ErrorKind;
use tracing::error;

/// One field-level validation failure, surfaced to the client as
/// `{field, message}` inside the error envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Error taxonomy for the whole API. Domain code returns these; the
/// `ResponseError` impl below is the single translation point to an HTTP
/// status plus the response envelope.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "Validation failed")]
    Validation(Vec<FieldError>),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    /// Business-rule violation (duplicate check-in, overlapping leave, ...).
    /// Renders as 400, matching the rest of the surface.
    #[display(fmt = "{}", _0)]
    Conflict(String),
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "Internal server error")]
    Internal,
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }])
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "success": false,
            "message": self.to_string(),
            "timestamp": Utc::now(),
        });

        if let ApiError::Validation(errors) = self {
            body["errors"] = json!(errors);
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Known store constraint violations translate to fixed 400 messages;
/// anything else collapses to a generic 500 with the detail kept
/// server-side.
impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    return ApiError::bad_request("Duplicate entry found");
                }
                ErrorKind::ForeignKeyViolation => {
                    return ApiError::bad_request("Referenced record does not exist");
                }
                ErrorKind::NotNullViolation => {
                    return ApiError::bad_request("Required field is missing");
                }
                ErrorKind::CheckViolation => {
                    return ApiError::bad_request("Invalid data format");
                }
                _ => {}
            }
        }

        error!(error = %e, "Database error");
        ApiError::Internal
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut errors: Vec<FieldError> = e
            .field_errors()
            .iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(|f| FieldError {
                    field: snake_to_camel(field),
                    message: f
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}", snake_to_camel(field))),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::Validation(errors)
    }
}

/// True when the error is the store rejecting a duplicate row on a unique
/// key. Callers that absorb races (payroll generation) branch on this.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if matches!(db_err.kind(), ErrorKind::UniqueViolation))
}

/// DTO fields are snake_case in Rust but camelCase on the wire.
fn snake_to_camel(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ApiError::validation_field("email", "bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::conflict("Already checked in today").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::forbidden("admins only").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::not_found("missing").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_withholds_detail() {
        assert_eq!(ApiError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn field_names_are_camel_cased() {
        assert_eq!(snake_to_camel("start_date"), "startDate");
        assert_eq!(snake_to_camel("basic_salary"), "basicSalary");
        assert_eq!(snake_to_camel("email"), "email");
    }

    #[test]
    fn row_not_found_is_not_leaked_as_500() {
        // RowNotFound only surfaces from fetch_one; handlers use
        // fetch_optional, so it maps to the generic internal error.
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::Internal));
    }
}
