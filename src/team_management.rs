use actix_web::{web, HttpResponse};
use log::{error, info};
use serde_json::json;
use sqlx::SqlitePool;

use crate::app_state::AppState;
use crate::models::team::{CreateTeamRequest, Team, TeamMemberInfo, TeamView};

async fn member_info(
    pool: &SqlitePool,
    user_id: Option<i64>,
) -> Result<Option<TeamMemberInfo>, sqlx::Error> {
    let Some(user_id) = user_id else {
        return Ok(None);
    };
    sqlx::query_as::<_, TeamMemberInfo>(
        "SELECT username, profile_picture_url FROM users WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

async fn team_view(pool: &SqlitePool, team: Team) -> Result<TeamView, sqlx::Error> {
    let product_owner = member_info(pool, team.product_owner_user_id).await?;
    let project_manager = member_info(pool, team.project_manager_user_id).await?;
    let team_members = sqlx::query_as::<_, TeamMemberInfo>(
        "SELECT username, profile_picture_url FROM users WHERE team_id = ?",
    )
    .bind(team.id)
    .fetch_all(pool)
    .await?;

    Ok(TeamView {
        id: team.id,
        team_name: team.team_name,
        product_owner,
        project_manager,
        team_members,
    })
}

/// GET /teams
pub async fn get_teams(data: web::Data<AppState>) -> HttpResponse {
    let teams = match sqlx::query_as::<_, Team>("SELECT * FROM teams")
        .fetch_all(&data.pool)
        .await
    {
        Ok(teams) => teams,
        Err(e) => {
            error!("Error retrieving teams: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error retrieving teams" }));
        }
    };

    let mut views = Vec::with_capacity(teams.len());
    for team in teams {
        match team_view(&data.pool, team).await {
            Ok(view) => views.push(view),
            Err(e) => {
                error!("Error assembling team view: {}", e);
                return HttpResponse::InternalServerError()
                    .json(json!({ "message": "Error retrieving teams" }));
            }
        }
    }

    HttpResponse::Ok().json(views)
}

/// GET /teams/{id}
pub async fn get_team(data: web::Data<AppState>, team_id: web::Path<i64>) -> HttpResponse {
    let team = match sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
        .bind(*team_id)
        .fetch_optional(&data.pool)
        .await
    {
        Ok(Some(team)) => team,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "message": "Team not found" })),
        Err(e) => {
            error!("Error retrieving team: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error retrieving team" }));
        }
    };

    match team_view(&data.pool, team).await {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(e) => {
            error!("Error assembling team view: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error retrieving team" }))
        }
    }
}

/// POST /teams
pub async fn create_team(
    data: web::Data<AppState>,
    body: web::Json<CreateTeamRequest>,
) -> HttpResponse {
    // Owner and manager are validated independently so the error names the
    // role that failed.
    for (user_id, label) in [
        (body.product_owner_user_id, "Product owner"),
        (body.project_manager_user_id, "Project manager"),
    ] {
        match member_info(&data.pool, Some(user_id)).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return HttpResponse::BadRequest().json(json!({
                    "message": format!("{} with ID {} not found", label, user_id)
                }))
            }
            Err(e) => {
                error!("Error checking {}: {}", label, e);
                return HttpResponse::InternalServerError()
                    .json(json!({ "message": "Error creating team" }));
            }
        }
    }

    let duplicate = sqlx::query_scalar::<_, i64>("SELECT id FROM teams WHERE team_name = ?")
        .bind(&body.team_name)
        .fetch_optional(&data.pool)
        .await;
    match duplicate {
        Ok(Some(_)) => {
            return HttpResponse::BadRequest()
                .json(json!({ "message": "Team name already taken" }))
        }
        Ok(None) => {}
        Err(e) => {
            error!("Error checking team name: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error creating team" }));
        }
    }

    let inserted = sqlx::query(
        "INSERT INTO teams (team_name, product_owner_user_id, project_manager_user_id) \
         VALUES (?, ?, ?)",
    )
    .bind(&body.team_name)
    .bind(body.product_owner_user_id)
    .bind(body.project_manager_user_id)
    .execute(&data.pool)
    .await;

    let new_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) => {
            error!("Error creating team: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error creating team" }));
        }
    };

    match sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = ?")
        .bind(new_id)
        .fetch_one(&data.pool)
        .await
    {
        Ok(new_team) => {
            info!("Team created: {}", new_team.team_name);
            HttpResponse::Ok().json(json!({
                "message": "Team Created Successfully",
                "newTeam": new_team,
            }))
        }
        Err(e) => {
            error!("Error reading created team: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error creating team" }))
        }
    }
}
