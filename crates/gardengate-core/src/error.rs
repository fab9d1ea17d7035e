use thiserror::Error;

/// Failures that stop an access decision from being made.
///
/// A plain "no" is not an error: it is `Verdict::Deny`. Everything here means
/// the system could not (or must not) answer, and is logged as such.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Malformed initData: {0}")]
    MalformedToken(String),

    #[error("initData verification failed: {0}")]
    InvalidIdentity(String),

    #[error("Authorization backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Authorization backend misconfigured: {0}")]
    BackendMisconfigured(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AccessError {
    /// Short error code string used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::MalformedToken(_) => "MALFORMED_TOKEN",
            AccessError::InvalidIdentity(_) => "INVALID_IDENTITY",
            AccessError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            AccessError::BackendMisconfigured(_) => "BACKEND_MISCONFIGURED",
            AccessError::Config(_) => "CONFIG_ERROR",
            AccessError::Serialization(_) => "SERIALIZATION_ERROR",
            AccessError::Io(_) => "IO_ERROR",
        }
    }

    /// True for failures a caller may reasonably retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, AccessError::BackendUnavailable(_) | AccessError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
