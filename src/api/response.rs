use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogError;
use crate::identity::AuthError;
use crate::object_store::ObjectStoreError;

// ============================================================================
// JSend status enum
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

// ============================================================================
// JSend success envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T: Serialize> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
}

// ============================================================================
// JSend fail envelope (client errors, 4xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendFail {
    pub data: FailData,
    pub status: JSendStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailData {
    pub message: String,
}

impl JSendFail {
    pub fn response(
        status_code: StatusCode,
        message: impl Into<String>,
    ) -> (StatusCode, Json<JSendFail>) {
        (
            status_code,
            Json(JSendFail {
                data: FailData {
                    message: message.into(),
                },
                status: JSendStatus::Fail,
            }),
        )
    }
}

// ============================================================================
// JSend error envelope (server errors, 5xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendError {
    pub message: String,
    pub status: JSendStatus,
}

impl JSendError {
    pub fn response(
        status_code: StatusCode,
        message: impl Into<String>,
    ) -> (StatusCode, Json<JSendError>) {
        (
            status_code,
            Json(JSendError {
                message: message.into(),
                status: JSendStatus::Error,
            }),
        )
    }
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

/// A JSend-compatible error that can be either a fail (4xx) or error (5xx).
#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, String),
    Error(StatusCode, String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Fail(code, msg) => {
                let (status, json) = JSendFail::response(code, msg);
                (status, json).into_response()
            }
            ApiError::Error(code, msg) => {
                let (status, json) = JSendError::response(code, msg);
                (status, json).into_response()
            }
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::UNAUTHORIZED, message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::FORBIDDEN, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::NOT_FOUND, message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::PAYLOAD_TOO_LARGE, message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::CONFLICT, message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }
}

/// Account failures: bad input is a fail, a dead backend an error.
impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidEmail(_) | AuthError::WeakSecret(_) => {
                ApiError::bad_request(e.to_string())
            }
            AuthError::EmailTaken(_) => ApiError::conflict(e.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidSession => {
                ApiError::unauthorized(e.to_string())
            }
            AuthError::Backend(_) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotSignedIn => ApiError::unauthorized(e.to_string()),
            CatalogError::InvalidName(_)
            | CatalogError::NotPreviewable(_)
            | CatalogError::Transfer(ObjectStoreError::InvalidKey(_)) => {
                ApiError::bad_request(e.to_string())
            }
            CatalogError::Forbidden(_) => ApiError::forbidden(e.to_string()),
            CatalogError::UnknownRecord(_) => ApiError::not_found(e.to_string()),
            CatalogError::Transfer(_) | CatalogError::Query(_) => {
                ApiError::internal(e.to_string())
            }
        }
    }
}

/// Blob reads from the serving route.
impl From<ObjectStoreError> for ApiError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound(_) => ApiError::not_found("Blob not found"),
            ObjectStoreError::InvalidKey(_) => ApiError::bad_request(e.to_string()),
            _ => ApiError::internal(format!("Failed to retrieve blob: {e}")),
        }
    }
}

// ============================================================================
// Custom extractors (reject with JSend-formatted ApiError)
// ============================================================================

/// Drop-in replacement for `axum::Json` that rejects with JSend errors.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = match rejection {
                    JsonRejection::JsonDataError(err) => {
                        format!("Invalid request body: {}", err.body_text())
                    }
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body".into(),
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing Content-Type: application/json header".into()
                    }
                    _ => "Failed to read request body".into(),
                };
                Err(ApiError::bad_request(message))
            }
        }
    }
}

/// Drop-in replacement for `axum::extract::Query` that rejects with JSend errors.
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, ApiError> {
        let query = parts.uri.query().unwrap_or_default();
        serde_qs::from_str(query)
            .map(AppQuery)
            .map_err(|e| ApiError::bad_request(friendly_query_error(&e.to_string())))
    }
}

/// Translate serde/serde_qs error messages into human-friendly descriptions.
fn friendly_query_error(raw: &str) -> String {
    let cleaned = raw
        .replace("u32", "non-negative integer")
        .replace("u64", "non-negative integer")
        .replace("i32", "integer")
        .replace("i64", "integer");

    format!("Invalid query parameter: {cleaned}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatabaseError;

    fn status(e: ApiError) -> (StatusCode, bool) {
        match e {
            ApiError::Fail(code, _) => (code, true),
            ApiError::Error(code, _) => (code, false),
        }
    }

    #[test]
    fn test_auth_errors_map_to_fail_or_error() {
        assert_eq!(
            status(AuthError::EmailTaken("a@x.com".into()).into()),
            (StatusCode::CONFLICT, true)
        );
        assert_eq!(
            status(AuthError::InvalidCredentials.into()),
            (StatusCode::UNAUTHORIZED, true)
        );
        assert_eq!(
            status(AuthError::WeakSecret(6).into()),
            (StatusCode::BAD_REQUEST, true)
        );
        assert_eq!(
            status(AuthError::Backend("down".into()).into()),
            (StatusCode::INTERNAL_SERVER_ERROR, false)
        );
    }

    #[test]
    fn test_catalog_errors_map_to_status() {
        assert_eq!(
            status(CatalogError::Forbidden("u2_song.pdf".into()).into()),
            (StatusCode::FORBIDDEN, true)
        );
        assert_eq!(
            status(CatalogError::NotPreviewable("cover.png".into()).into()),
            (StatusCode::BAD_REQUEST, true)
        );
        assert_eq!(
            status(CatalogError::Transfer(ObjectStoreError::InvalidKey("..".into())).into()),
            (StatusCode::BAD_REQUEST, true)
        );
        assert_eq!(
            status(CatalogError::UnknownRecord("u1_x.pdf".into()).into()),
            (StatusCode::NOT_FOUND, true)
        );
        let offline = DatabaseError::Io(std::io::Error::other("offline"));
        assert_eq!(
            status(CatalogError::Query(offline).into()),
            (StatusCode::INTERNAL_SERVER_ERROR, false)
        );
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        assert_eq!(
            status(ObjectStoreError::NotFound("scores/u1/a.pdf".into()).into()),
            (StatusCode::NOT_FOUND, true)
        );
    }
}
