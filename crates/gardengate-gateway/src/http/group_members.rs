//! POST /api/group-members: the gate group's administrators plus the caller.
//!
//! Only meaningful with the live-membership backend, which owns the group.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use gardengate_core::AccessError;
use gardengate_telegram::roster::{group_roster, RosterEntry};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{require_init_data, verify_init_data, ApiError};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembersRequest {
    #[serde(default)]
    pub init_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembersResponse {
    pub members: Vec<RosterEntry>,
    pub group_identifier: String,
    pub count: usize,
}

pub async fn group_members_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GroupMembersRequest>, JsonRejection>,
) -> Result<Json<GroupMembersResponse>, ApiError> {
    let Json(request) = payload?;
    let init_data = require_init_data(request.init_data.as_deref())?;

    let identity = verify_init_data(&state.verifier, init_data)?;

    let view = state.membership.as_ref().ok_or_else(|| {
        AccessError::BackendMisconfigured(
            "group members require the live-membership backend".into(),
        )
    })?;

    let caller_id = identity
        .id()
        .ok_or_else(|| ApiError::bad_request("initData carries no user id"))?;

    let members = group_roster(view.directory.as_ref(), &view.group, caller_id).await?;
    info!(identity = %identity, group = %view.group, count = members.len(), "group roster served");

    Ok(Json(GroupMembersResponse {
        count: members.len(),
        members,
        group_identifier: view.group.to_string(),
    }))
}
