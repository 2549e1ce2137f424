use std::time::Duration;

/// Failure of a single platform call. Token expiry and rate limiting are
/// first-class variants so callers never have to inspect status codes
/// buried in error strings: the service boundary checks `TokenExpired`
/// uniformly and the governor checks `RateLimited` uniformly.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("access token is expired or invalid")]
    TokenExpired,

    #[error("rate limited by platform (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authorization code exchange rejected: {0}")]
    AuthExchange(String),

    #[error("platform request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected platform response: {0}")]
    Api(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

impl PlatformError {
    /// Classify a non-success HTTP response. `retry_after_secs` is the
    /// parsed `retry-after` header value, when the platform sent one.
    pub fn from_status(
        status: reqwest::StatusCode,
        retry_after_secs: Option<u64>,
        body: &str,
    ) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED => PlatformError::TokenExpired,
            reqwest::StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimited {
                retry_after: retry_after_secs.map(Duration::from_secs),
            },
            _ => PlatformError::Api(format!("{} => {}", status, body)),
        }
    }

    pub fn is_token_expired(&self) -> bool {
        matches!(self, PlatformError::TokenExpired)
    }
}
