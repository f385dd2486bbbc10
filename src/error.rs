use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::users::{repo::RepoError, services::ValidationError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    /// `context` is what the client sees; `source` is only logged.
    #[error("{context}: {source}")]
    Internal {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Classifies a repository failure for one operation.
    pub fn from_repo(e: RepoError, not_found: &'static str, context: &'static str) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound(not_found),
            RepoError::Conflict(_) => ApiError::Conflict("Email already exists."),
            RepoError::Other(source) => ApiError::Internal { context, source },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::NotFound(msg) => json!({ "message": msg }),
            ApiError::Validation(e) => json!({ "error": e.to_string() }),
            ApiError::Conflict(msg) => json!({ "error": msg }),
            ApiError::Internal { context, source } => {
                tracing::error!(error = ?source, "{}", context);
                json!({ "error": context })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn repo_errors_are_classified() {
        let e = ApiError::from_repo(RepoError::NotFound, "User not found", "ctx");
        assert_eq!(e.status(), StatusCode::NOT_FOUND);

        let e = ApiError::from_repo(RepoError::Conflict("users_email_key".into()), "nf", "ctx");
        assert_eq!(e.status(), StatusCode::CONFLICT);

        let e = ApiError::from_repo(RepoError::Other(anyhow::anyhow!("boom")), "nf", "ctx");
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_detail_is_not_exposed() {
        let e = ApiError::Internal {
            context: "Failed to fetch user due to a server error",
            source: anyhow::anyhow!("password authentication failed for user \"postgres\""),
        };
        let res = e.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(res).await;
        assert_eq!(body["error"], "Failed to fetch user due to a server error");
        assert!(!body.to_string().contains("postgres"));
    }

    #[tokio::test]
    async fn not_found_uses_message_key() {
        let body = body_json(ApiError::NotFound("User not found").into_response()).await;
        assert_eq!(body, json!({ "message": "User not found" }));
    }

    #[tokio::test]
    async fn validation_uses_error_key() {
        let res = ApiError::from(ValidationError::PasswordTooShort).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(
            body,
            json!({ "error": "Password must be at least 8 characters long." })
        );
    }
}
