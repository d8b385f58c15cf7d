use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use taxthink_core::errors::GenerationError;
use taxthink_store::StoreError;

/// Failures a route handler can surface. Response bodies carry only a
/// generic message; detail goes to the server log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(detail) => {
                tracing::warn!(%detail, "rejected request body");
                (StatusCode::BAD_REQUEST, "Invalid request body")
            }
            ApiError::Store(StoreError::NotFound(what)) => {
                tracing::debug!(%what, "lookup missed");
                (StatusCode::NOT_FOUND, "Session not found")
            }
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            ApiError::Generation(err) => {
                tracing::error!(error = %err, kind = err.error_kind(), "generation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate response")
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// JSON body extractor whose rejection maps to the 400 validation kind,
/// keeping schema violations distinct from other failures.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(
            status_of(ApiError::Validation("missing field".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_session_maps_to_404() {
        assert_eq!(
            status_of(ApiError::Store(StoreError::NotFound("session 9".into()))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn store_fault_maps_to_500() {
        assert_eq!(
            status_of(ApiError::Store(StoreError::Unavailable("disk".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn generation_failure_maps_to_500() {
        assert_eq!(
            status_of(ApiError::Generation(GenerationError::EmptyReply)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
