use async_trait::async_trait;

use crate::error::Result;
use crate::types::VerifiedIdentity;

/// Answers "is this identity allowed in" for private resources.
///
/// Exactly one implementation is active per process, chosen from config at
/// startup. `Ok(false)` is a normal denial; `Err` means the answer could not
/// be determined and must not be reported as a denial.
#[async_trait]
pub trait AuthorizationBackend: Send + Sync {
    /// Short backend name for logs and the health endpoint.
    fn name(&self) -> &str;

    async fn check(&self, identity: &VerifiedIdentity) -> Result<bool>;
}
