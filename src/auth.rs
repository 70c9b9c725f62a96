use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::models::user::{User, UserDetails};

/// Matches the original deployment's hashes.
pub const BCRYPT_COST: u32 = 10;

const TOKEN_TTL_HOURS: i64 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

/// Identity attached to request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
}

pub fn create_jwt(
    user_id: i64,
    username: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

/// POST /auth/login
pub async fn login(
    data: web::Data<AppState>,
    login_info: web::Json<LoginRequest>,
) -> HttpResponse {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(&login_info.username)
        .fetch_optional(&data.pool)
        .await;

    match user {
        Ok(Some(user)) => {
            if verify(&login_info.password, &user.password).unwrap_or(false) {
                match create_jwt(user.user_id, &user.username, &data.config.jwt_secret) {
                    Ok(token) => HttpResponse::Ok().json(json!({
                        "token": token,
                        "userDetails": UserDetails::from(user),
                    })),
                    Err(e) => {
                        error!("Error signing token: {}", e);
                        HttpResponse::InternalServerError()
                            .json(json!({ "message": "Error during login" }))
                    }
                }
            } else {
                HttpResponse::Unauthorized().json(json!({ "error": "Wrong password" }))
            }
        }
        Ok(None) => HttpResponse::Unauthorized().json(json!({ "error": "User not found" })),
        Err(e) => {
            error!("Error during login: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error during login" }))
        }
    }
}

/// GET /auth/user
pub async fn get_auth_user(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    let current_user = match req.extensions().get::<AuthenticatedUser>() {
        Some(user) => user.clone(),
        None => return HttpResponse::Unauthorized().json(json!({ "error": "Not authenticated" })),
    };

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(&current_user.username)
        .fetch_optional(&data.pool)
        .await;

    match user {
        Ok(Some(user)) => {
            HttpResponse::Ok().json(json!({ "userDetails": UserDetails::from(user) }))
        }
        Ok(None) => HttpResponse::NotFound().json(json!({ "error": "User not found" })),
        Err(e) => {
            error!("Error fetching auth user: {}", e);
            HttpResponse::InternalServerError().json(json!({ "message": "Error fetching user" }))
        }
    }
}

/// POST /auth/change-password
///
/// Rehashes and stores the new password and clears the force-change flag.
pub async fn change_password(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<ChangePasswordRequest>,
) -> HttpResponse {
    let current_user = match req.extensions().get::<AuthenticatedUser>() {
        Some(user) => user.clone(),
        None => return HttpResponse::Unauthorized().json(json!({ "error": "Not authenticated" })),
    };

    let hashed = match hash(&body.password, BCRYPT_COST) {
        Ok(h) => h,
        Err(e) => {
            error!("Error hashing password: {}", e);
            return HttpResponse::InternalServerError()
                .json(json!({ "message": "Error hashing password" }));
        }
    };

    let result = sqlx::query(
        "UPDATE users SET password = ?, force_password_change = 0 WHERE user_id = ?",
    )
    .bind(&hashed)
    .bind(current_user.user_id)
    .execute(&data.pool)
    .await;

    match result {
        Ok(_) => HttpResponse::Ok().json(json!({ "message": "Password changed" })),
        Err(e) => {
            error!("Error changing password: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "message": "Error changing password" }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_pool;
    use crate::Authentication;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use sqlx::SqlitePool;

    fn test_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            port: 0,
            frontend_origin: "http://localhost:3000".to_string(),
        }
    }

    async fn seed_user(pool: &SqlitePool, username: &str, password: &str) -> i64 {
        // Low cost keeps the test suite fast; the handlers always hash at BCRYPT_COST.
        let hashed = hash(password, 4).unwrap();
        sqlx::query(
            "INSERT INTO users (username, password, force_password_change) VALUES (?, ?, 1)",
        )
        .bind(username)
        .bind(hashed)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn test_state() -> web::Data<AppState> {
        web::Data::new(AppState {
            pool: test_pool().await,
            config: test_config(),
        })
    }

    #[actix_web::test]
    async fn login_returns_token_decodable_to_the_user() {
        let state = test_state().await;
        let user_id = seed_user(&state.pool, "alice", "secret123").await;

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/auth/login", web::post().to(login)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": "alice", "password": "secret123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["userDetails"]["username"], "alice");
        assert!(body["userDetails"].get("password").is_none());

        let claims = validate_jwt(body["token"].as_str().unwrap(), "test-secret").unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
    }

    #[actix_web::test]
    async fn login_rejects_wrong_password_and_unknown_user() {
        let state = test_state().await;
        seed_user(&state.pool, "alice", "secret123").await;

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/auth/login", web::post().to(login)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": "alice", "password": "nope" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body.get("token").is_none());

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "username": "bob", "password": "secret123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn change_password_rehashes_and_clears_force_flag() {
        let state = test_state().await;
        let user_id = seed_user(&state.pool, "alice", "old-password").await;
        let token = create_jwt(user_id, "alice", "test-secret").unwrap();

        let app = test::init_service(
            App::new().app_data(state.clone()).service(
                web::scope("/auth")
                    .wrap(Authentication)
                    .route("/change-password", web::post().to(change_password)),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/change-password")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({ "password": "new-password" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&state.pool)
            .await
            .unwrap();
        assert!(!user.force_password_change);
        assert!(verify("new-password", &user.password).unwrap());
    }

    #[actix_web::test]
    async fn auth_user_is_404_when_the_row_is_gone() {
        let state = test_state().await;
        // Token is valid but no such user exists anymore.
        let token = create_jwt(42, "ghost", "test-secret").unwrap();

        let app = test::init_service(
            App::new().app_data(state.clone()).service(
                web::scope("/auth")
                    .wrap(Authentication)
                    .route("/user", web::get().to(get_auth_user)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/auth/user")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
