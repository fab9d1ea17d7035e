pub mod allow;
pub mod error;
pub mod init_data;
pub mod membership;
pub mod roster;

pub use allow::{Allowlist, AllowlistSource, StaticListBackend};
pub use error::{TelegramError, VerifyError};
pub use init_data::InitDataVerifier;
pub use membership::{BotDirectory, ChatDirectory, GroupRef, LiveMembershipBackend, MemberStatus};
