use actix_web::error::JsonPayloadError;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthError;
use crate::domain::{FieldError, ServiceError};

// ============================================================================
// HTTP error bodies
// ============================================================================
//
// Every failure leaves as JSON with a status and a timestamp that can be
// matched against the server log. Store details stay in the log.
//
// ============================================================================

pub const NOT_FOUND_MESSAGE: &str = "Record not found";
pub const UNHANDLED_MESSAGE: &str = "Unhandled error, contact development";
pub const UNAUTHENTICATED_MESSAGE: &str = "Authentication required";
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse<'a> {
    pub status: u16,
    pub timestamp: DateTime<Utc>,
    pub errors: &'a [FieldError],
}

fn error_body(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        status: status.as_u16(),
        message: message.into(),
        timestamp: Utc::now(),
    })
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DuplicateRecord(_) => StatusCode::CONFLICT,
            ServiceError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BusinessRule(_) => StatusCode::FORBIDDEN,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ServiceError::DuplicateRecord(message) | ServiceError::BusinessRule(message) => {
                tracing::warn!(status = status.as_u16(), message = %message, "Request rejected");
                error_body(status, message.as_str())
            }
            ServiceError::RecordNotFound(what) => {
                tracing::warn!(record = %what, "Record not found");
                error_body(status, NOT_FOUND_MESSAGE)
            }
            ServiceError::Validation(errors) => {
                tracing::warn!(field_count = errors.len(), "Request failed validation");
                HttpResponse::build(status).json(ValidationErrorResponse {
                    status: status.as_u16(),
                    timestamp: Utc::now(),
                    errors: errors.fields(),
                })
            }
            ServiceError::Store(e) => {
                tracing::error!(error = %e, "Unhandled error");
                error_body(status, UNHANDLED_MESSAGE)
            }
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Unconfigured | AuthError::KeyFetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) => UNAUTHENTICATED_MESSAGE,
            AuthError::Forbidden => ACCESS_DENIED_MESSAGE,
            AuthError::Unconfigured | AuthError::KeyFetch(_) => {
                tracing::error!(error = %self, "Token verification unavailable");
                UNHANDLED_MESSAGE
            }
        };
        error_body(status, message)
    }
}

/// Malformed or mistyped JSON bodies answer 400 in the common error shape.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::warn!(error = %err, "Unreadable request body");
    let response = error_body(StatusCode::BAD_REQUEST, err.to_string());
    actix_web::error::InternalError::from_response(err, response).into()
}
