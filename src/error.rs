use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the storage and circulation layers. Handlers convert
/// these straight into HTTP responses.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Db(#[from] libsql::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn status(&self) -> StatusCode {
        match self {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::Db(_) | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            // Internal details stay in the logs.
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("request failed: {}", unpack_error(&self));
                "internal error".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Flattens an error and its sources into a single `a: b: c` string.
pub fn unpack_error(err: &(dyn std::error::Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_variants() {
        assert_eq!(DomainError::NotFound("book").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            DomainError::Conflict("isbn taken".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            DomainError::Invalid("bad copies".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn unpack_error_joins_sources() {
        let inner = anyhow::anyhow!("inner cause");
        let err = DomainError::Internal(inner.context("outer"));
        assert_eq!(unpack_error(&err), "outer: inner cause");
    }
}
