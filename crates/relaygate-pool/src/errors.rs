use http::StatusCode;

/// Stable error kinds surfaced either as logs or in response bodies (§7).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("provider not found")]
    ProviderNotFound,
    #[error("provider disabled")]
    ProviderDisabled,
    #[error("no credentials available")]
    NoCredentials,
    #[error("all upstreams failed: {last_status:?} {last_message}")]
    AllUpstreamsFailed {
        last_status: Option<u16>,
        last_message: String,
    },
    #[error("invalid config: {0}")]
    ConfigInvalid(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::Forbidden => StatusCode::FORBIDDEN,
            ProxyError::ProviderNotFound => StatusCode::NOT_FOUND,
            ProxyError::ProviderDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::NoCredentials => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::AllUpstreamsFailed { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::Unauthorized => "unauthorized",
            ProxyError::Forbidden => "forbidden",
            ProxyError::ProviderNotFound => "provider_not_found",
            ProxyError::ProviderDisabled => "provider_disabled",
            ProxyError::NoCredentials => "no_credentials",
            ProxyError::AllUpstreamsFailed { .. } => "all_upstreams_failed",
            ProxyError::ConfigInvalid(_) => "config_invalid",
        }
    }
}

/// Classification of a completed upstream attempt (§4.4 step d, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    AuthFailure,
    Transient,
    FatalClient,
}

/// Classify an upstream HTTP status into a retry outcome (§4.4.d).
pub fn classify_status(status: u16) -> Outcome {
    match status {
        200..=299 => Outcome::Success,
        401 | 403 => Outcome::AuthFailure,
        408 | 429 => Outcome::Transient,
        500..=599 => Outcome::Transient,
        _ => Outcome::FatalClient,
    }
}
