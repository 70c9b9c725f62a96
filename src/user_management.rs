use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::hash;
use log::{error, info};
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{AuthenticatedUser, BCRYPT_COST};
use crate::models::user::{CreateUserRequest, Role, UpdateUserRequest, User};

/// Mutating user endpoints are restricted to administrators. The caller's
/// role is re-read from the database rather than trusted from the token.
async fn require_admin(req: &HttpRequest, data: &AppState) -> Result<(), HttpResponse> {
    let current_user = match req.extensions().get::<AuthenticatedUser>() {
        Some(user) => user.clone(),
        None => {
            return Err(HttpResponse::Unauthorized().json(json!({ "error": "Not authenticated" })))
        }
    };

    let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE user_id = ?")
        .bind(current_user.user_id)
        .fetch_optional(&data.pool)
        .await;

    match role {
        Ok(Some(Role::Administrator)) => Ok(()),
        Ok(_) => Err(HttpResponse::Forbidden()
            .json(json!({ "error": "Insufficient permissions" }))),
        Err(e) => {
            error!("Error checking caller role: {}", e);
            Err(HttpResponse::InternalServerError()
                .json(json!({ "message": "Error checking permissions" })))
        }
    }
}

async fn username_taken(
    pool: &sqlx::SqlitePool,
    username: &str,
    exclude_user_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT user_id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(matches!(existing, Some(id) if Some(id) != exclude_user_id))
}

async fn team_exists(pool: &sqlx::SqlitePool, team_id: i64) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// GET /users
pub async fn get_users(data: web::Data<AppState>) -> HttpResponse {
    match sqlx::query_as::<_, User>("SELECT * FROM users")
        .fetch_all(&data.pool)
        .await
    {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(e) => {
            error!("Error retrieving users: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error retrieving users" }))
        }
    }
}

/// GET /users/{userId}
pub async fn get_user(data: web::Data<AppState>, user_id: web::Path<i64>) -> HttpResponse {
    match sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(*user_id)
        .fetch_optional(&data.pool)
        .await
    {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => HttpResponse::NotFound().json(json!({ "message": "User not found" })),
        Err(e) => {
            error!("Error retrieving user: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error retrieving user" }))
        }
    }
}

/// POST /users
pub async fn create_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }

    let role = match &body.role {
        Some(value) => match Role::from_wire(value) {
            Some(role) => role,
            None => {
                return HttpResponse::BadRequest()
                    .json(json!({ "message": format!("Unknown role: {}", value) }))
            }
        },
        None => Role::SupportStaff,
    };

    match username_taken(&data.pool, &body.username, None).await {
        Ok(true) => {
            return HttpResponse::BadRequest()
                .json(json!({ "message": "Username already taken" }))
        }
        Ok(false) => {}
        Err(e) => {
            error!("Error checking username: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error creating user" }));
        }
    }

    if let Some(team_id) = body.team_id {
        match team_exists(&data.pool, team_id).await {
            Ok(true) => {}
            Ok(false) => {
                return HttpResponse::BadRequest()
                    .json(json!({ "message": format!("Team {} not found", team_id) }))
            }
            Err(e) => {
                error!("Error checking team: {}", e);
                return HttpResponse::InternalServerError()
                    .json(json!({ "message": "Error creating user" }));
            }
        }
    }

    let hashed = match hash(&body.password, BCRYPT_COST) {
        Ok(h) => h,
        Err(e) => {
            error!("Error hashing password: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error hashing password" }));
        }
    };

    let profile_picture_url = body
        .profile_picture_url
        .clone()
        .unwrap_or_else(|| "user.jpg".to_string());

    let inserted = sqlx::query(
        "INSERT INTO users (username, password, profile_picture_url, role, team_id) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&body.username)
    .bind(&hashed)
    .bind(&profile_picture_url)
    .bind(role)
    .bind(body.team_id)
    .execute(&data.pool)
    .await;

    let new_user_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) => {
            error!("Error creating user: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error creating user" }));
        }
    };

    match sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(new_user_id)
        .fetch_one(&data.pool)
        .await
    {
        Ok(new_user) => {
            info!("User created: {}", new_user.username);
            HttpResponse::Ok().json(json!({
                "message": "User Created Successfully",
                "newUser": new_user,
            }))
        }
        Err(e) => {
            error!("Error reading created user: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error creating user" }))
        }
    }
}

/// PATCH /users/{userId}
///
/// Password changes go through /auth/change-password, never through here.
pub async fn update_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }
    let user_id = user_id.into_inner();

    let existing = match sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&data.pool)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({ "message": "User not found" }))
        }
        Err(e) => {
            error!("Error retrieving user: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error updating user" }));
        }
    };

    let username = body.username.clone().unwrap_or(existing.username);
    match username_taken(&data.pool, &username, Some(user_id)).await {
        Ok(true) => {
            return HttpResponse::BadRequest()
                .json(json!({ "message": "Username already taken" }))
        }
        Ok(false) => {}
        Err(e) => {
            error!("Error checking username: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error updating user" }));
        }
    }

    let team_id = match body.team_id {
        Some(team_id) => {
            match team_exists(&data.pool, team_id).await {
                Ok(true) => {}
                Ok(false) => {
                    return HttpResponse::BadRequest()
                        .json(json!({ "message": format!("Team {} not found", team_id) }))
                }
                Err(e) => {
                    error!("Error checking team: {}", e);
                    return HttpResponse::InternalServerError()
                        .json(json!({ "message": "Error updating user" }));
                }
            }
            Some(team_id)
        }
        None => existing.team_id,
    };

    let role = match &body.role {
        Some(value) => match Role::from_wire(value) {
            Some(role) => role,
            None => {
                return HttpResponse::BadRequest()
                    .json(json!({ "message": format!("Unknown role: {}", value) }))
            }
        },
        None => existing.role,
    };

    let profile_picture_url = body
        .profile_picture_url
        .clone()
        .unwrap_or(existing.profile_picture_url);

    let updated = sqlx::query(
        "UPDATE users SET username = ?, profile_picture_url = ?, role = ?, team_id = ? \
         WHERE user_id = ?",
    )
    .bind(&username)
    .bind(&profile_picture_url)
    .bind(role)
    .bind(team_id)
    .bind(user_id)
    .execute(&data.pool)
    .await;

    if let Err(e) = updated {
        error!("Error updating user: {}", e);
        return HttpResponse::InternalServerError()
            .json(json!({ "message": "Error updating user" }));
    }

    match sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&data.pool)
        .await
    {
        Ok(updated_user) => HttpResponse::Ok().json(json!({
            "message": "User Updated Successfully",
            "updatedUser": updated_user,
        })),
        Err(e) => {
            error!("Error reading updated user: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error updating user" }))
        }
    }
}

/// DELETE /users/{userId}
pub async fn delete_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<i64>,
) -> HttpResponse {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }

    match sqlx::query("DELETE FROM users WHERE user_id = ?")
        .bind(*user_id)
        .execute(&data.pool)
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "message": "User not found" }))
        }
        Ok(_) => {
            info!("User {} deleted", user_id);
            HttpResponse::Ok().json(json!({ "message": "User Deleted Successfully" }))
        }
        Err(e) => {
            error!("Error deleting user: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error deleting user" }))
        }
    }
}
