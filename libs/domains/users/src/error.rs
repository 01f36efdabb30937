use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::UserId;

#[derive(Debug, Error)]
pub enum UserError {
    /// Malformed or missing input; the message is shown to the caller as-is
    #[error("{0}")]
    Validation(String),

    /// Email or username already taken
    #[error("{0}")]
    Conflict(String),

    #[error("User not found: {0}")]
    NotFound(String),

    /// Backend connectivity or driver failure
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    pub fn validation(message: impl Into<String>) -> Self {
        UserError::Validation(message.into())
    }

    pub fn not_found_id(id: UserId) -> Self {
        UserError::NotFound(format!("id {}", id))
    }

    pub fn not_found_email(email: &str) -> Self {
        UserError::NotFound(format!("email '{}'", email))
    }

    pub fn not_found_username(username: &str) -> Self {
        UserError::NotFound(format!("username '{}'", username))
    }

    pub fn email_taken() -> Self {
        UserError::Conflict("user with this email already exists".to_string())
    }

    pub fn username_taken() -> Self {
        UserError::Conflict("user with this username already exists".to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, UserError::NotFound(_))
    }
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        UserError::Storage(err.to_string())
    }
}

impl From<mongodb::error::Error> for UserError {
    fn from(err: mongodb::error::Error) -> Self {
        UserError::Storage(err.to_string())
    }
}

impl From<database::DatabaseError> for UserError {
    fn from(err: database::DatabaseError) -> Self {
        UserError::Storage(err.to_string())
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            UserError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            UserError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            UserError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "user not found".to_string(),
            ),
            UserError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            UserError::PasswordHash(msg) => {
                tracing::error!("Password hash error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (UserError::validation("email is required"), StatusCode::BAD_REQUEST),
            (UserError::email_taken(), StatusCode::CONFLICT),
            (UserError::not_found_id(7), StatusCode::NOT_FOUND),
            (UserError::Storage("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (UserError::PasswordHash("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_conflict_messages() {
        assert_eq!(
            UserError::email_taken().to_string(),
            "user with this email already exists"
        );
        assert_eq!(
            UserError::username_taken().to_string(),
            "user with this username already exists"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(UserError::not_found_email("a@b.com").is_not_found());
        assert!(!UserError::email_taken().is_not_found());
    }
}
