use gardengate_core::AccessError;
use teloxide::{ApiError, RequestError};

/// Why an initData payload was rejected.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("initData has no hash field")]
    MissingHash,

    #[error("initData hash does not match")]
    HashMismatch,

    #[error("initData payload is malformed: {0}")]
    Malformed(String),

    #[error("initData has expired (auth_date {auth_date:?})")]
    Expired { auth_date: Option<i64> },

    #[error("HMAC key rejected")]
    InvalidKey,
}

impl VerifyError {
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::MissingHash => "MISSING_HASH",
            VerifyError::HashMismatch => "HASH_MISMATCH",
            VerifyError::Malformed(_) => "MALFORMED_PAYLOAD",
            VerifyError::Expired { .. } => "EXPIRED",
            VerifyError::InvalidKey => "INVALID_KEY",
        }
    }
}

/// A missing hash means the client sent something that is not initData at
/// all; a rejected key is our setup, not the caller's. Everything else is a
/// signature or claim that failed to check out.
impl From<VerifyError> for AccessError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::MissingHash => AccessError::MalformedToken(err.to_string()),
            VerifyError::InvalidKey => AccessError::Config(err.to_string()),
            other => AccessError::InvalidIdentity(other.to_string()),
        }
    }
}

/// Errors produced when talking to the Telegram Bot API.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] RequestError),

    #[error("no bot token configured")]
    NoToken,

    #[error("invalid Bot API url: {0}")]
    InvalidApiUrl(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

pub type TgResult<T> = std::result::Result<T, TelegramError>;

impl TelegramError {
    /// Telegram says the user is not in the chat (or never talked to it).
    pub fn is_user_absent(&self) -> bool {
        match self {
            TelegramError::Teloxide(RequestError::Api(ApiError::UserNotFound)) => true,
            TelegramError::Teloxide(RequestError::Api(api)) => {
                let text = api.to_string().to_ascii_lowercase();
                text.contains("participant_id_invalid") || text.contains("user not found")
            }
            _ => false,
        }
    }

    /// The group is unknown to the bot or the bot cannot read it: an operator
    /// has to fix the setup, retrying will not help.
    pub fn is_misconfiguration(&self) -> bool {
        match self {
            TelegramError::NoToken
            | TelegramError::InvalidApiUrl(_)
            | TelegramError::Client(_) => true,
            TelegramError::Teloxide(RequestError::Api(api)) => match api {
                ApiError::ChatNotFound
                | ApiError::BotKicked
                | ApiError::BotKickedFromSupergroup
                | ApiError::InvalidToken => true,
                other => {
                    let text = other.to_string().to_ascii_lowercase();
                    text.contains("chat not found")
                        || text.contains("member list is inaccessible")
                        || text.contains("not enough rights")
                        || text.contains("bot is not a member")
                        || text.contains("bot was kicked")
                }
            },
            TelegramError::Teloxide(_) => false,
        }
    }
}

impl From<TelegramError> for AccessError {
    fn from(err: TelegramError) -> Self {
        if err.is_misconfiguration() {
            AccessError::BackendMisconfigured(err.to_string())
        } else {
            AccessError::BackendUnavailable(err.to_string())
        }
    }
}
