use thiserror::Error;

/// Failures surfaced by the transport layer and the service gateways.
///
/// Empty episode lists and missing stream sources are not errors; they are
/// data shapes that drive the fallback ladders. Only conditions that stop a
/// request outright live here.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("title not found")]
    NotFound,
}

impl ApiError {
    /// Transient failures are eligible for retry: no response received,
    /// a timeout, or a 5xx status. 4xx responses and NotFound are final.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::Http { status } => (500..600).contains(status),
            ApiError::NotFound => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ApiError::Timeout;
        }
        if let Some(status) = err.status() {
            return ApiError::Http {
                status: status.as_u16(),
            };
        }
        ApiError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        assert!(ApiError::Http { status: 503 }.is_transient());
        assert!(ApiError::Http { status: 500 }.is_transient());
        assert!(!ApiError::Http { status: 404 }.is_transient());
        assert!(!ApiError::Http { status: 400 }.is_transient());
        assert!(ApiError::Timeout.is_transient());
        assert!(ApiError::Network(String::from("connection refused")).is_transient());
        assert!(!ApiError::NotFound.is_transient());
    }
}
