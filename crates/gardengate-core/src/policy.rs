use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::AuthorizationBackend;
use crate::error::{AccessError, Result};
use crate::types::{AccessRequirement, DenyReason, Verdict, VerifiedIdentity};

/// Default ceiling for a single backend round-trip.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Maps (identity, resource requirement) to a verdict.
///
/// Only `private` resources consult the backend. The policy takes a
/// `VerifiedIdentity`, so a request whose initData failed verification can
/// never reach it.
pub struct AccessPolicy {
    backend: Arc<dyn AuthorizationBackend>,
    timeout: Duration,
}

impl AccessPolicy {
    pub fn new(backend: Arc<dyn AuthorizationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn decide(
        &self,
        identity: &VerifiedIdentity,
        requirement: AccessRequirement,
    ) -> Result<Verdict> {
        let verdict = match requirement {
            AccessRequirement::Public => Verdict::Grant,
            AccessRequirement::None => Verdict::Deny(DenyReason::NotListed),
            AccessRequirement::Private => {
                let allowed = tokio::time::timeout(self.timeout, self.backend.check(identity))
                    .await
                    .map_err(|_| {
                        AccessError::BackendUnavailable(format!(
                            "{} backend timed out after {}ms",
                            self.backend.name(),
                            self.timeout.as_millis()
                        ))
                    })??;
                debug!(identity = %identity, backend = self.backend.name(), allowed, "backend answered");
                if allowed {
                    Verdict::Grant
                } else {
                    Verdict::Deny(DenyReason::NotAuthorized)
                }
            }
        };

        info!(
            identity = %identity,
            requirement = %requirement,
            granted = verdict.is_granted(),
            reason = verdict.reason().map(|r| r.code()),
            "access decided"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        answer: bool,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AuthorizationBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn check(&self, _identity: &VerifiedIdentity) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    struct Broken;

    #[async_trait]
    impl AuthorizationBackend for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        async fn check(&self, _identity: &VerifiedIdentity) -> Result<bool> {
            Err(AccessError::BackendMisconfigured("chat not found".into()))
        }
    }

    struct Slow;

    #[async_trait]
    impl AuthorizationBackend for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        async fn check(&self, _identity: &VerifiedIdentity) -> Result<bool> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(true)
        }
    }

    fn bob() -> VerifiedIdentity {
        VerifiedIdentity::from_verified_claims(Some(42), Some("Bob".into()))
    }

    #[tokio::test]
    async fn public_grants_without_backend_call() {
        let backend = Fixed::new(false);
        let policy = AccessPolicy::new(backend.clone(), DEFAULT_BACKEND_TIMEOUT);

        let verdict = policy
            .decide(&VerifiedIdentity::default(), AccessRequirement::Public)
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Grant);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unspecified_denies_as_not_listed() {
        let backend = Fixed::new(true);
        let policy = AccessPolicy::new(backend.clone(), DEFAULT_BACKEND_TIMEOUT);

        let verdict = policy.decide(&bob(), AccessRequirement::None).await.unwrap();
        assert_eq!(verdict, Verdict::Deny(DenyReason::NotListed));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn private_follows_backend_answer() {
        let yes = AccessPolicy::new(Fixed::new(true), DEFAULT_BACKEND_TIMEOUT);
        let no = AccessPolicy::new(Fixed::new(false), DEFAULT_BACKEND_TIMEOUT);

        assert_eq!(
            yes.decide(&bob(), AccessRequirement::Private).await.unwrap(),
            Verdict::Grant
        );
        assert_eq!(
            no.decide(&bob(), AccessRequirement::Private).await.unwrap(),
            Verdict::Deny(DenyReason::NotAuthorized)
        );
    }

    #[tokio::test]
    async fn backend_errors_are_not_downgraded_to_deny() {
        let policy = AccessPolicy::new(Arc::new(Broken), DEFAULT_BACKEND_TIMEOUT);
        let err = policy
            .decide(&bob(), AccessRequirement::Private)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::BackendMisconfigured(_)));
    }

    #[tokio::test]
    async fn slow_backend_times_out_as_unavailable() {
        let policy = AccessPolicy::new(Arc::new(Slow), Duration::from_millis(20));
        let err = policy
            .decide(&bob(), AccessRequirement::Private)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::BackendUnavailable(_)));
    }
}
