// src/main.rs

mod app_state;
mod auth;
mod config;
mod db;
mod models;
mod project;
mod search;
mod task;
mod team_management;
mod user_management;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{change_password, get_auth_user, login, validate_jwt, AuthenticatedUser};
use crate::project::{create_project, list_projects};
use crate::search::search;
use crate::task::{create_task, get_tasks, get_user_tasks, update_task_status};
use crate::team_management::{create_team, get_team, get_teams};
use crate::user_management::{create_user, delete_user, get_user, get_users, update_user};

/// Bearer-token gate for protected scopes. A missing token is a 401, a bad
/// or expired one a 403; on success the caller's identity lands in the
/// request extensions for the handlers.
#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string());

        let Some(token) = token else {
            return respond_early(
                req,
                HttpResponse::Unauthorized().json(json!({ "error": "Missing token" })),
            );
        };

        let secret = match req.app_data::<web::Data<AppState>>() {
            Some(state) => state.config.jwt_secret.clone(),
            None => {
                return respond_early(
                    req,
                    HttpResponse::InternalServerError()
                        .json(json!({ "message": "Server configuration error" })),
                )
            }
        };

        match validate_jwt(&token, &secret) {
            Ok(claims) => {
                req.extensions_mut().insert(AuthenticatedUser {
                    user_id: claims.sub,
                    username: claims.username,
                });
            }
            Err(_) => {
                return respond_early(
                    req,
                    HttpResponse::Forbidden().json(json!({ "error": "Invalid token" })),
                );
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn respond_early<E>(
    req: ServiceRequest,
    resp: HttpResponse,
) -> Pin<Box<dyn Future<Output = Result<ServiceResponse<BoxBody>, E>>>> {
    let (req_parts, _payload) = req.into_parts();
    let srv_resp = ServiceResponse::new(req_parts, resp.map_into_boxed_body());
    Box::pin(async move { Ok(srv_resp) })
}

async fn home() -> HttpResponse {
    HttpResponse::Ok().body("This is home route")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let pool = db::init_pool(&config.database_url)
        .await
        .map_err(std::io::Error::other)?;

    let frontend_origin = config.frontend_origin.clone();
    let bind_addr = ("0.0.0.0", config.port);

    println!("Server running at http://0.0.0.0:{}", config.port);
    println!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(AppState {
                pool: pool.clone(),
                config: config.clone(),
            }))
            .route("/", web::get().to(home))
            // AUTH: login is open, the rest of the scope sits behind the gate
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(login))
                    .service(
                        web::scope("")
                            .wrap(Authentication)
                            .route("/user", web::get().to(get_auth_user))
                            .route("/change-password", web::post().to(change_password)),
                    ),
            )
            // USERS
            .service(
                web::scope("/users")
                    .wrap(Authentication)
                    .route("", web::get().to(get_users))
                    .route("", web::post().to(create_user))
                    .route("/{userId}", web::get().to(get_user))
                    .route("/{userId}", web::patch().to(update_user))
                    .route("/{userId}", web::delete().to(delete_user)),
            )
            // TEAMS
            .service(
                web::scope("/teams")
                    .wrap(Authentication)
                    .route("", web::get().to(get_teams))
                    .route("", web::post().to(create_team))
                    .route("/{id}", web::get().to(get_team)),
            )
            // PROJECTS
            .service(
                web::scope("/project")
                    .route("", web::get().to(list_projects))
                    .route("", web::post().to(create_project)),
            )
            // TASKS
            .service(
                web::scope("/tasks")
                    .route("/user/{userId}", web::get().to(get_user_tasks))
                    .route("", web::get().to(get_tasks))
                    .route("", web::post().to(create_task))
                    .route("/{taskId}/status", web::patch().to(update_task_status)),
            )
            // SEARCH
            .route("/search", web::get().to(search))
    })
    .bind(bind_addr)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{create_jwt, Claims};
    use crate::config::Config;
    use actix_web::http::StatusCode;
    use actix_web::{test, HttpRequest};
    use jsonwebtoken::{encode, EncodingKey, Header};

    async fn whoami(req: HttpRequest) -> HttpResponse {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => HttpResponse::Ok().json(json!({ "username": user.username })),
            None => HttpResponse::InternalServerError().finish(),
        }
    }

    async fn gated_state() -> web::Data<AppState> {
        web::Data::new(AppState {
            pool: crate::db::test_pool().await,
            config: Config {
                database_url: "sqlite::memory:".to_string(),
                jwt_secret: "test-secret".to_string(),
                port: 0,
                frontend_origin: "http://localhost:3000".to_string(),
            },
        })
    }

    fn gated_scope() -> impl actix_web::dev::HttpServiceFactory {
        web::scope("/protected")
            .wrap(Authentication)
            .route("", web::get().to(whoami))
    }

    #[actix_web::test]
    async fn missing_token_is_401() {
        let app =
            test::init_service(App::new().app_data(gated_state().await).service(gated_scope()))
                .await;
        let req = test::TestRequest::get().uri("/protected").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn malformed_token_is_403() {
        let app =
            test::init_service(App::new().app_data(gated_state().await).service(gated_scope()))
                .await;
        let req = test::TestRequest::get()
            .uri("/protected")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn expired_token_is_403() {
        let claims = Claims {
            sub: 1,
            username: "alice".to_string(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test-secret".as_ref()),
        )
        .unwrap();

        let app =
            test::init_service(App::new().app_data(gated_state().await).service(gated_scope()))
                .await;
        let req = test::TestRequest::get()
            .uri("/protected")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn valid_token_passes_identity_through() {
        let token = create_jwt(1, "alice", "test-secret").unwrap();
        let app =
            test::init_service(App::new().app_data(gated_state().await).service(gated_scope()))
                .await;
        let req = test::TestRequest::get()
            .uri("/protected")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["username"], "alice");
    }
}
