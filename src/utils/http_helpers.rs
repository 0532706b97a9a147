use http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::metrics::MetricsError;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        HTTPError::new(StatusCode::NOT_FOUND, "Not found")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Registry failures surface as server errors; the details go to the log.
impl From<MetricsError> for HTTPError {
    fn from(e: MetricsError) -> Self {
        error!("Metrics operation failed: {}", e);
        HTTPError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

/// Converts our `HTTPError` into a plain-text HTTP response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain")],
            self.message,
        )
            .into_response()
    }
}
