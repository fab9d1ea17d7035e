//! POST /api/check-access: verify initData, then decide for one resource.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use gardengate_core::{AccessRequirement, DenyReason};
use serde::{Deserialize, Serialize};

use super::{require_init_data, verify_init_data, ApiError};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAccessRequest {
    #[serde(default)]
    pub init_data: Option<String>,
    /// Resource path; absent means "may this identity see private content".
    #[serde(default)]
    pub resource: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAccessResponse {
    pub has_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

pub async fn check_access_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckAccessRequest>, JsonRejection>,
) -> Result<Json<CheckAccessResponse>, ApiError> {
    let Json(request) = payload?;
    let init_data = require_init_data(request.init_data.as_deref())?;

    let identity = verify_init_data(&state.verifier, init_data)?;

    let requirement = match request.resource.as_deref() {
        Some(resource) => state.manifest.requirement_for(resource),
        None => AccessRequirement::Private,
    };

    let verdict = state.policy.decide(&identity, requirement).await?;

    Ok(Json(CheckAccessResponse {
        has_access: verdict.is_granted(),
        user_id: identity.id(),
        username: identity.username().map(String::from),
        reason: verdict.reason(),
    }))
}
