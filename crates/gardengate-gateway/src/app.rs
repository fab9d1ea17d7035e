use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use gardengate_core::{AccessPolicy, AuthorizationBackend, GardenConfig, ResourceManifest, Result};
use gardengate_telegram::{ChatDirectory, GroupRef, InitDataVerifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Directory and group of the live-membership backend, shared with the
/// roster endpoint.
#[derive(Clone)]
pub struct MembershipView {
    pub directory: Arc<dyn ChatDirectory>,
    pub group: GroupRef,
}

/// Shared state, passed as `Arc<AppState>` to every handler. Immutable after
/// startup.
pub struct AppState {
    pub verifier: InitDataVerifier,
    pub policy: AccessPolicy,
    pub manifest: ResourceManifest,
    pub membership: Option<MembershipView>,
}

impl AppState {
    pub fn new(
        config: &GardenConfig,
        backend: Arc<dyn AuthorizationBackend>,
        membership: Option<MembershipView>,
        manifest: ResourceManifest,
    ) -> Result<Self> {
        let mut verifier = InitDataVerifier::new(config.bot_token()?)?;
        if let Some(secs) = config.telegram.max_auth_age_secs {
            verifier = verifier.with_max_age(Duration::from_secs(secs));
        }
        let policy = AccessPolicy::new(backend, config.backend_timeout());
        Ok(Self {
            verifier,
            policy,
            manifest,
            membership,
        })
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/api/check-access",
            post(crate::http::check_access::check_access_handler),
        )
        .route(
            "/api/group-members",
            post(crate::http::group_members::group_members_handler),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
