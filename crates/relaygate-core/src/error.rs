//! Maps `relaygate_pool::ProxyError` onto HTTP responses (§7).

use axum::response::{IntoResponse, Response};
use relaygate_pool::ProxyError;
use serde_json::json;

pub struct ApiError(pub ProxyError);

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let body = match &self.0 {
            ProxyError::AllUpstreamsFailed {
                last_status,
                last_message,
            } => json!({
                "error": {
                    "code": self.0.code(),
                    "last_status": last_status,
                    "last_message": last_message,
                }
            }),
            other => json!({ "error": other.code() }),
        };
        (status, axum::Json(body)).into_response()
    }
}
