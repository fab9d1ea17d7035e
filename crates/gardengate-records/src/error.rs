use gardengate_core::AccessError;
use thiserror::Error;

/// Record-store errors. Kept separate from `AccessError` so each store can be
/// precise; the conversion below decides what counts as setup vs. outage.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store refused us (bad key, missing table, no permission).
    #[error("Record store rejected the request (status {status})")]
    Rejected { status: u16 },

    #[error("Record store error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store task failed: {0}")]
    Join(String),
}

impl RecordError {
    pub fn is_misconfiguration(&self) -> bool {
        match self {
            RecordError::Rejected { .. } | RecordError::InvalidTable(_) => true,
            RecordError::Database(e) => {
                let text = e.to_string();
                text.contains("no such table")
                    || text.contains("no such column")
                    || text.contains("unable to open database")
            }
            _ => false,
        }
    }
}

impl From<RecordError> for AccessError {
    fn from(err: RecordError) -> Self {
        if err.is_misconfiguration() {
            AccessError::BackendMisconfigured(err.to_string())
        } else {
            AccessError::BackendUnavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
