use thiserror::Error;

/// Errors raised by the MediUX provider, the destination services, and the
/// provenance cache.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unable to connect to '{0}'")]
    Connection(String),

    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Map a reqwest transport failure onto the taxonomy.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            let url = err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "service".to_string());
            return Self::Connection(url);
        }
        Self::Network(err)
    }

    /// Map an HTTP error status onto the taxonomy. 401/403 become
    /// authentication errors, everything else an API error.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        if status == 401 || status == 403 {
            Self::Authentication { status, message }
        } else {
            Self::Api { status, message }
        }
    }
}
