use serde::{Deserialize, Serialize};

use crate::models::{
    member::MemberRole,
    subscription::Plan,
    workspace::{Workspace, WorkspaceSummary},
};

#[derive(Deserialize)]
pub struct WorkspaceNameRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct TransferOwnershipRequest {
    pub user_id: i64,
}

#[derive(Serialize)]
pub struct WorkspaceListResponse {
    pub success: bool,
    pub workspaces: Vec<WorkspaceSummary>,
}

#[derive(Serialize)]
pub struct WorkspaceResponse {
    pub success: bool,
    pub workspace: Workspace,
    pub role: MemberRole,
    pub plan: Plan,
}
