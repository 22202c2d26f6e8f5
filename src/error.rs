use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("invalid archive: {0}")]
    InvalidArchive(String),
    #[error("data.csv not found")]
    MissingDataEntry,
    #[error("malformed table: {0}")]
    MalformedTable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_upload(message: impl Into<String>) -> Self {
        Self::InvalidUpload(message.into())
    }

    pub fn invalid_archive(message: impl ToString) -> Self {
        Self::InvalidArchive(message.to_string())
    }

    pub fn malformed_table(message: impl Into<String>) -> Self {
        Self::MalformedTable(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Errors raised before anything reaches the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUpload(_)
                | Self::InvalidArchive(_)
                | Self::MissingDataEntry
                | Self::MalformedTable(_)
        )
    }

    /// Errors raised by a store backend; the enclosing batch has been rolled back.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Storage(_))
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Whether the underlying database error is a unique-key violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_client_error() {
            tracing::warn!(error = %self, "rejected price upload");
        } else {
            tracing::error!(error = %self, "price request failed");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
