//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use martha_domain::error::MarthaError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    ok: Option<bool>,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Maps [`MarthaError`] and malformed requests to an HTTP response.
pub enum ApiError {
    Domain(MarthaError),
    /// The body could not be read as the expected document.
    BadRequest(&'static str),
    /// A path parameter names nothing.
    NotFound(&'static str),
}

impl From<MarthaError> for ApiError {
    fn from(err: MarthaError) -> Self {
        Self::Domain(err)
    }
}

impl ApiError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Domain(err) => status_of(err),
        }
    }
}

/// Status code for a domain error, shared with the dashboard.
pub(crate) fn status_of(err: &MarthaError) -> StatusCode {
    match err {
        MarthaError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MarthaError::NotFound(_) => StatusCode::NOT_FOUND,
        MarthaError::Relay(_) => StatusCode::SERVICE_UNAVAILABLE,
        MarthaError::Storage(_) | MarthaError::Hardware(_) | MarthaError::Host(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest(message) | Self::NotFound(message) => ErrorBody {
                ok: None,
                error: message.to_string(),
                detail: None,
            },
            Self::Domain(MarthaError::Validation(err)) => ErrorBody {
                ok: None,
                error: "validation failed".to_string(),
                detail: Some(err.to_string()),
            },
            Self::Domain(MarthaError::NotFound(err)) => ErrorBody {
                ok: None,
                error: err.to_string(),
                detail: None,
            },
            Self::Domain(MarthaError::Relay(err)) => ErrorBody {
                ok: Some(false),
                error: "relay locked".to_string(),
                detail: Some(err.to_string()),
            },
            Self::Domain(
                err @ (MarthaError::Storage(_) | MarthaError::Hardware(_) | MarthaError::Host(_)),
            ) => {
                tracing::error!(error = ?err, "request failed");
                ErrorBody {
                    ok: None,
                    error: "internal server error".to_string(),
                    detail: None,
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use martha_domain::error::{NotFoundError, ValidationError};
    use martha_domain::relay::RelayError;

    #[test]
    fn should_map_domain_errors_to_status_codes() {
        let cases = [
            (
                MarthaError::from(ValidationError::UnknownLogLevel(9)),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                MarthaError::from(NotFoundError::channel("heater")),
                StatusCode::NOT_FOUND,
            ),
            (
                MarthaError::from(RelayError::BootLocked),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                MarthaError::Hardware("bus stuck".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn should_use_bad_request_for_malformed_body() {
        assert_eq!(
            ApiError::BadRequest("invalid JSON").status(),
            StatusCode::BAD_REQUEST
        );
    }
}
