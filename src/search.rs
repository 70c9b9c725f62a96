use actix_web::{web, HttpResponse};
use log::error;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::models::project::Project;
use crate::models::task::Task;
use crate::models::user::UserDetails;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: String,
}

/// GET /search?query=
///
/// Substring match (SQL LIKE, case-insensitive for ASCII) over tasks,
/// projects and usernames. Users come back sanitized like everywhere else.
pub async fn search(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> HttpResponse {
    let pattern = format!("%{}%", query.query);

    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE title LIKE ? OR description LIKE ?",
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(&data.pool)
    .await;
    let tasks = match tasks {
        Ok(tasks) => tasks,
        Err(e) => {
            error!("Error searching tasks: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error performing search" }));
        }
    };

    let projects = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE name LIKE ? OR description LIKE ?",
    )
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(&data.pool)
    .await;
    let projects = match projects {
        Ok(projects) => projects,
        Err(e) => {
            error!("Error searching projects: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error performing search" }));
        }
    };

    let users = sqlx::query_as::<_, UserDetails>(
        "SELECT user_id, username, profile_picture_url, role, team_id, force_password_change \
         FROM users WHERE username LIKE ?",
    )
    .bind(&pattern)
    .fetch_all(&data.pool)
    .await;
    let users = match users {
        Ok(users) => users,
        Err(e) => {
            error!("Error searching users: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error performing search" }));
        }
    };

    HttpResponse::Ok().json(json!({
        "tasks": tasks,
        "projects": projects,
        "users": users,
    }))
}
