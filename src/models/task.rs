use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::UserDetails;

/// Board column. Any status may follow any status; the board does not
/// restrict transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Status {
    #[serde(alias = "Новая")]
    ToDo,
    #[serde(alias = "В работе")]
    InProgress,
    #[serde(alias = "На проверке")]
    UnderReview,
    #[serde(alias = "Выполнена")]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Priority {
    #[serde(alias = "Наивысший")]
    Urgent,
    #[serde(alias = "Высокий")]
    High,
    #[serde(alias = "Средний")]
    Medium,
    #[serde(alias = "Низкий")]
    Low,
    Backlog,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub tags: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub points: Option<i64>,
    pub project_id: i64,
    pub author_user_id: i64,
    pub assigned_user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub task_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: i64,
    pub file_url: String,
    pub file_name: Option<String>,
    pub task_id: i64,
    pub uploaded_by_id: i64,
}

/// A task together with the related rows the board views render.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithRelations {
    #[serde(flatten)]
    pub task: Task,
    pub author: Option<UserDetails>,
    pub assignee: Option<UserDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub tags: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub points: Option<i64>,
    pub project_id: i64,
    pub author_user_id: Option<i64>,
    pub assigned_user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskStatusRequest {
    pub status: Status,
}
