use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use products_hr::{CascadeError, LifecycleError, StoreError};
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    /// The write committed but a re-read did not show it.
    #[error("{0}")]
    Unverified(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unverified(_) => "UNVERIFIED",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        tracing::error!(error = %value, "record store failure");
        Self::internal(value.into())
    }
}

impl From<CascadeError> for ApiError {
    fn from(value: CascadeError) -> Self {
        let message = value.user_message();
        match value {
            CascadeError::Validation(_) => ApiError::InvalidInput(message),
            CascadeError::NotFound(_) => ApiError::NotFound(message),
            CascadeError::Unverified { .. } => ApiError::Unverified(message),
            CascadeError::Discovery(source) | CascadeError::Commit(source) => {
                tracing::error!(error = %source, "role change failed");
                ApiError::internal(anyhow::Error::new(source).context(message))
            }
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::Validation(reason) => ApiError::InvalidInput(reason),
            LifecycleError::Duplicate(_) => ApiError::Conflict(value.to_string()),
            LifecycleError::NotFound(_) => ApiError::NotFound(value.to_string()),
            LifecycleError::Store(err) => err.into(),
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::InvalidInput(_) = self {
            err = err.extend_with(|_err, e| {
                e.set("type", "BAD_REQUEST");
            });
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

/// Maps a domain error to a GraphQL error that keeps its `code` extension.
pub fn graphql_error(err: impl Into<ApiError>) -> Error {
    err.into().extend()
}
