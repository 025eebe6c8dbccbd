use thiserror::Error;

/// Failures reported by a [`TelemetryStore`](crate::store::TelemetryStore)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to query table: {0}")]
    Query(String),

    #[error("Failed to add to table: {0}")]
    Put(String),
}

/// Errors that abort a telemetry invocation
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Could not decode data: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Could not encode results: {0}")]
    Encode(#[from] serde_json::Error),
}

impl TelemetryError {
    /// Short machine-readable code for error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "VALIDATION_ERROR",
            Self::InvalidBody(_) => "PARSE_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Encode(_) => "ENCODE_ERROR",
        }
    }

    /// Whether the caller sent something unusable
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::InvalidBody(_))
    }
}

pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;
