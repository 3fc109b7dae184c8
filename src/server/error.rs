//! Mapping of store errors onto HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::store::{ErrorKind, StoreError};

/// Store error returned from a handler.
#[derive(Debug)]
pub struct ApiError(pub StoreError);

impl ApiError {
    /// HTTP status for the wrapped error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Store operation failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(StoreError::InvalidInput(rejection.body_text()))
    }
}

/// JSON body extractor whose rejections use the `{"error": ...}` shape.
///
/// Missing content type, malformed JSON and mistyped fields all become 400.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (StoreError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (StoreError::user_not_found("bob"), StatusCode::NOT_FOUND),
            (
                StoreError::Conflict {
                    user_name: "bob".into(),
                    analysis_id: "x".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                StoreError::Sqlite(rusqlite::Error::InvalidQuery),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
