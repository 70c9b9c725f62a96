use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use log::{error, info};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::app_state::AppState;
use crate::models::task::{
    Attachment, Comment, CreateTaskRequest, Priority, Status, Task, TaskWithRelations,
    UpdateTaskStatusRequest,
};
use crate::models::user::UserDetails;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub project_id: i64,
}

async fn user_details(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<UserDetails>, sqlx::Error> {
    sqlx::query_as::<_, UserDetails>(
        "SELECT user_id, username, profile_picture_url, role, team_id, force_password_change \
         FROM users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Attaches author and assignee, and optionally the task's comments and
/// attachments (the per-project board view needs them, the per-user list
/// does not).
async fn with_relations(
    pool: &SqlitePool,
    task: Task,
    include_activity: bool,
) -> Result<TaskWithRelations, sqlx::Error> {
    let author = user_details(pool, task.author_user_id).await?;
    let assignee = user_details(pool, task.assigned_user_id).await?;

    let (comments, attachments) = if include_activity {
        let comments = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE task_id = ?")
            .bind(task.id)
            .fetch_all(pool)
            .await?;
        let attachments =
            sqlx::query_as::<_, Attachment>("SELECT * FROM attachments WHERE task_id = ?")
                .bind(task.id)
                .fetch_all(pool)
                .await?;
        (Some(comments), Some(attachments))
    } else {
        (None, None)
    };

    Ok(TaskWithRelations {
        task,
        author,
        assignee,
        comments,
        attachments,
    })
}

/// GET /tasks?projectId=
pub async fn get_tasks(data: web::Data<AppState>, query: web::Query<TaskQuery>) -> HttpResponse {
    let tasks = match sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE project_id = ?")
        .bind(query.project_id)
        .fetch_all(&data.pool)
        .await
    {
        Ok(tasks) => tasks,
        Err(e) => {
            error!("Error retrieving tasks: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error retrieving tasks" }));
        }
    };

    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        match with_relations(&data.pool, task, true).await {
            Ok(task) => out.push(task),
            Err(e) => {
                error!("Error attaching task relations: {}", e);
                return HttpResponse::InternalServerError()
                    .json(json!({ "message": "Error retrieving tasks" }));
            }
        }
    }

    HttpResponse::Ok().json(out)
}

/// POST /tasks
pub async fn create_task(
    data: web::Data<AppState>,
    body: web::Json<CreateTaskRequest>,
) -> HttpResponse {
    let (author_user_id, assigned_user_id) = match (body.author_user_id, body.assigned_user_id) {
        (Some(author), Some(assignee)) => (author, assignee),
        _ => {
            return HttpResponse::BadRequest()
                .json(json!({ "message": "Author and assignee are required" }))
        }
    };

    for (user_id, label) in [(author_user_id, "author"), (assigned_user_id, "assignee")] {
        match user_details(&data.pool, user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return HttpResponse::BadRequest().json(json!({
                    "message": format!("User with ID {} ({}) not found", user_id, label)
                }))
            }
            Err(e) => {
                error!("Error checking {}: {}", label, e);
                return HttpResponse::InternalServerError()
                    .json(json!({ "message": "Error creating task" }));
            }
        }
    }

    // Dates are defaulted but never reordered; a due date before the start
    // date is stored as sent.
    let start_date = body.start_date.unwrap_or_else(Utc::now);
    let due_date = body.due_date.unwrap_or(start_date + Duration::days(7));
    let status = body.status.unwrap_or(Status::ToDo);
    let priority = body.priority.unwrap_or(Priority::Low);

    let inserted = sqlx::query(
        "INSERT INTO tasks (title, description, status, priority, tags, start_date, due_date, \
         points, project_id, author_user_id, assigned_user_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&body.title)
    .bind(&body.description)
    .bind(status)
    .bind(priority)
    .bind(&body.tags)
    .bind(start_date)
    .bind(due_date)
    .bind(body.points)
    .bind(body.project_id)
    .bind(author_user_id)
    .bind(assigned_user_id)
    .execute(&data.pool)
    .await;

    let new_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) => {
            error!("Error creating task: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error creating task" }));
        }
    };

    match sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(new_id)
        .fetch_one(&data.pool)
        .await
    {
        Ok(task) => {
            info!("Task created: {}", task.id);
            HttpResponse::Created().json(task)
        }
        Err(e) => {
            error!("Error reading created task: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error creating task" }))
        }
    }
}

/// PATCH /tasks/{taskId}/status
///
/// Single-field update; any status may follow any status.
pub async fn update_task_status(
    data: web::Data<AppState>,
    task_id: web::Path<i64>,
    body: web::Json<UpdateTaskStatusRequest>,
) -> HttpResponse {
    let task_id = task_id.into_inner();

    let updated = sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
        .bind(body.status)
        .bind(task_id)
        .execute(&data.pool)
        .await;

    match updated {
        Ok(result) if result.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "message": "Task not found" }))
        }
        Ok(_) => {
            match sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
                .bind(task_id)
                .fetch_one(&data.pool)
                .await
            {
                Ok(task) => HttpResponse::Ok().json(task),
                Err(e) => {
                    error!("Error reading updated task: {}", e);
                    HttpResponse::InternalServerError()
                        .json(json!({ "message": "Error updating task" }))
                }
            }
        }
        Err(e) => {
            error!("Error updating task: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error updating task" }))
        }
    }
}

/// GET /tasks/user/{userId}
///
/// Union of the tasks the user authored and the tasks assigned to them.
pub async fn get_user_tasks(data: web::Data<AppState>, user_id: web::Path<i64>) -> HttpResponse {
    let tasks = match sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE author_user_id = ? OR assigned_user_id = ?",
    )
    .bind(*user_id)
    .bind(*user_id)
    .fetch_all(&data.pool)
    .await
    {
        Ok(tasks) => tasks,
        Err(e) => {
            error!("Error retrieving user's tasks: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error retrieving user's tasks" }));
        }
    };

    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        match with_relations(&data.pool, task, false).await {
            Ok(task) => out.push(task),
            Err(e) => {
                error!("Error attaching task relations: {}", e);
                return HttpResponse::InternalServerError()
                    .json(json!({ "message": "Error retrieving user's tasks" }));
            }
        }
    }

    HttpResponse::Ok().json(out)
}
