use serde::{Deserialize, Serialize};

/// Coarse permission tier. Mutating user endpoints are reserved for administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Role {
    Administrator,
    SupportStaff,
}

impl Role {
    /// Wire-boundary mapping: the legacy client sends localized role labels,
    /// the database and responses only ever carry the canonical names.
    pub fn from_wire(value: &str) -> Option<Role> {
        match value {
            "Administrator" | "Администратор" => Some(Role::Administrator),
            "SupportStaff" | "Сотрудник_поддержки" => Some(Role::SupportStaff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: i64,
    pub username: String,
    /// bcrypt hash. Never serialized back to clients.
    #[serde(skip_serializing)]
    pub password: String,
    pub profile_picture_url: String,
    pub role: Role,
    pub team_id: Option<i64>,
    pub force_password_change: bool,
}

/// The sanitized profile returned by login, /auth/user and search.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub user_id: i64,
    pub username: String,
    pub profile_picture_url: String,
    pub role: Role,
    pub team_id: Option<i64>,
    pub force_password_change: bool,
}

impl From<User> for UserDetails {
    fn from(user: User) -> Self {
        UserDetails {
            user_id: user.user_id,
            username: user.username,
            profile_picture_url: user.profile_picture_url,
            role: user.role,
            team_id: user.team_id,
            force_password_change: user.force_password_change,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub profile_picture_url: Option<String>,
    pub team_id: Option<i64>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub profile_picture_url: Option<String>,
    pub team_id: Option<i64>,
    pub role: Option<String>,
}
