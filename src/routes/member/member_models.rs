use serde::{Deserialize, Serialize};

use crate::models::{
    invitation::{Invitation, InvitationPreview},
    member::{MemberProfile, MemberRole},
};

#[derive(Serialize)]
pub struct MemberListResponse {
    pub success: bool,
    pub members: Vec<MemberProfile>,
}

#[derive(Deserialize)]
pub struct ChangeRoleRequest {
    pub role: MemberRole,
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub email: String,
    #[serde(default = "default_invite_role")]
    pub role: MemberRole,
}

fn default_invite_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Serialize)]
pub struct InvitationResponse {
    pub success: bool,
    pub invitation: Invitation,
}

#[derive(Serialize)]
pub struct InvitationListResponse {
    pub success: bool,
    pub invitations: Vec<Invitation>,
}

#[derive(Serialize)]
pub struct InvitationPreviewResponse {
    pub success: bool,
    pub invitation: InvitationPreview,
}

#[derive(Serialize)]
pub struct AcceptInvitationResponse {
    pub success: bool,
    pub workspace_id: i64,
    pub role: MemberRole,
}
