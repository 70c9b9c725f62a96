use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: i64,
    pub team_name: String,
    pub product_owner_user_id: Option<i64>,
    pub project_manager_user_id: Option<i64>,
}

/// The username + picture pair attached to team listings. Full user rows
/// never leave the users endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberInfo {
    pub username: String,
    pub profile_picture_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    pub id: i64,
    pub team_name: String,
    pub product_owner: Option<TeamMemberInfo>,
    pub project_manager: Option<TeamMemberInfo>,
    pub team_members: Vec<TeamMemberInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    pub team_name: String,
    pub product_owner_user_id: i64,
    pub project_manager_user_id: i64,
}
