use actix_web::{web, HttpResponse};
use log::{error, info};
use serde_json::json;

use crate::app_state::AppState;
use crate::models::project::{CreateProjectRequest, Project};

/// GET /project
pub async fn list_projects(data: web::Data<AppState>) -> HttpResponse {
    match sqlx::query_as::<_, Project>("SELECT * FROM projects")
        .fetch_all(&data.pool)
        .await
    {
        Ok(projects) => HttpResponse::Ok().json(projects),
        Err(e) => {
            error!("Error retrieving projects: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "message": "Error retrieving projects" }))
        }
    }
}

/// POST /project
///
/// Dates are stored as sent; end-before-start is not rejected here.
pub async fn create_project(
    data: web::Data<AppState>,
    body: web::Json<CreateProjectRequest>,
) -> HttpResponse {
    if body.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "message": "Project name is required" }));
    }

    let inserted = sqlx::query(
        "INSERT INTO projects (name, description, start_date, end_date) VALUES (?, ?, ?, ?)",
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(body.start_date)
    .bind(body.end_date)
    .execute(&data.pool)
    .await;

    let new_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) => {
            error!("Error creating project: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error creating project" }));
        }
    };

    match sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
        .bind(new_id)
        .fetch_one(&data.pool)
        .await
    {
        Ok(project) => {
            info!("Project created: {}", project.name);
            HttpResponse::Created().json(project)
        }
        Err(e) => {
            error!("Error reading created project: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "message": "Error creating project" }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    async fn test_state() -> web::Data<AppState> {
        web::Data::new(AppState {
            pool: test_pool().await,
            config: Config {
                database_url: "sqlite::memory:".to_string(),
                jwt_secret: "test-secret".to_string(),
                port: 0,
                frontend_origin: "http://localhost:3000".to_string(),
            },
        })
    }

    fn project_scope() -> impl actix_web::dev::HttpServiceFactory {
        web::scope("/project")
            .route("", web::get().to(list_projects))
            .route("", web::post().to(create_project))
    }

    #[actix_web::test]
    async fn create_then_list_round_trips() {
        let state = test_state().await;
        let app =
            test::init_service(App::new().app_data(state.clone()).service(project_scope())).await;

        let req = test::TestRequest::post()
            .uri("/project")
            .set_json(json!({ "name": "Migration", "description": "Q3 push" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/project").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "Migration");
    }

    #[actix_web::test]
    async fn empty_name_is_rejected() {
        let state = test_state().await;
        let app = test::init_service(App::new().app_data(state).service(project_scope())).await;

        let req = test::TestRequest::post()
            .uri("/project")
            .set_json(json!({ "name": "  " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
