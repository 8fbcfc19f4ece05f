use thiserror::Error;

/// Failure of a call to the metrics or notification API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Credentials rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("API reported failure: {message}")]
    Api { message: String },

    #[error("Response is missing field `{field}`")]
    MissingField { field: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Rejected credentials will not get better by asking again
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ApiError::Unauthorized { status },
            _ => ApiError::Status { status, body },
        }
    }
}
