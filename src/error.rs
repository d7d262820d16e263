use thiserror::Error;

/// Failure of a single request to the analysis provider.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("host must not be empty")]
    InvalidHost,

    #[error("connection to SSL Labs failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("SSL Labs returned HTTP {0}")]
    Status(u16),

    #[error("could not decode SSL Labs response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Terminal failure of one `analyze` invocation.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("SSL Labs reported an error: {message}")]
    Provider { message: String },
}

impl ScanError {
    /// True when the provider itself rejected the analysis.
    pub fn is_provider(&self) -> bool {
        matches!(self, ScanError::Provider { .. })
    }
}
