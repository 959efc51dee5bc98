use crate::server::{Result, ServerError, ServerRouter, auth::BearerToken, json::Json};
use atelier_common::{
    model::{
        session::{Session, SessionToken},
        user::{CreateUser, Password, User, Username},
    },
    util::PositiveDuration,
};
use atelier_db::client::DbClient;
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::{Duration, UtcDateTime};

const SESSION_TTL: Duration = Duration::days(30);

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
}

#[derive(TypedPath)]
#[typed_path("/auth/register")]
struct RegisterPath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct RegisterResponse {
    message: String,
    user: User,
}

async fn register(
    _: RegisterPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<CreateUser>,
) -> Result<Json<RegisterResponse>> {
    let user = db
        .create_user(&request)
        .await?
        .ok_or(ServerError::UsernameOrEmailTaken)?;

    Ok(Json(RegisterResponse {
        message: format!("Welcome, {}!", user.username),
        user,
    }))
}

#[derive(TypedPath)]
#[typed_path("/auth/login")]
struct LoginPath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct LoginRequest {
    username: Username,
    password: Password,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LoginResponse {
    message: String,
    token: String,
    user: User,
}

async fn login(
    _: LoginPath,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, stored_password) = db
        .fetch_user_credentials(&request.username)
        .await?
        .ok_or(ServerError::WrongCredentials)?;

    // Verbatim comparison, matching how the password is stored. A documented
    // weakness that is kept; see DESIGN.md.
    if stored_password != request.password.get() {
        return Err(ServerError::WrongCredentials);
    }

    let token = SessionToken::generate_random(user.id);
    let session = Session {
        user: user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: Some(PositiveDuration::new_unchecked(SESSION_TTL)),
    };
    db.create_session(&session).await?;

    Ok(Json(LoginResponse {
        message: format!("Logged in as {}.", user.username),
        token: token.as_token_str(),
        user,
    }))
}

#[derive(TypedPath)]
#[typed_path("/auth/logout")]
struct LogoutPath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LogoutResponse {
    message: String,
}

async fn logout(
    _: LogoutPath,
    State(db): State<Arc<DbClient>>,
    BearerToken(token): BearerToken,
) -> Result<Json<LogoutResponse>> {
    let deleted = db.delete_session(&token.hash()?).await?;
    if !deleted {
        return Err(ServerError::InvalidToken);
    }

    Ok(Json(LogoutResponse {
        message: "Logged out.".to_owned(),
    }))
}
