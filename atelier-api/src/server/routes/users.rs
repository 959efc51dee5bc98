use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
};
use atelier_common::model::{
    Id,
    content::Content,
    user::{User, UserMarker, Username},
};
use atelier_db::client::DbClient;
use axum::{
    Router,
    extract::{Query, State},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(search_users)
        .typed_get(get_user)
        .typed_get(get_user_contents)
        .typed_get(get_following)
        .typed_get(get_followers)
        .typed_post(follow)
        .typed_delete(unfollow)
}

#[derive(TypedPath)]
#[typed_path("/users/search")]
struct SearchUsersPath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_users(
    _: SearchUsersPath,
    State(db): State<Arc<DbClient>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>> {
    let users = db.search_users(&query.q).await?;

    Ok(Json(users))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/contents", rejection(ServerError))]
struct GetUserContentsPath {
    id: Id<UserMarker>,
}

async fn get_user_contents(
    GetUserContentsPath { id }: GetUserContentsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Content>>> {
    let contents = db
        .fetch_user_contents(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(contents))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/following", rejection(ServerError))]
struct GetFollowingPath {
    id: Id<UserMarker>,
}

async fn get_following(
    GetFollowingPath { id }: GetFollowingPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Username>>> {
    if db.fetch_user(id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(id));
    }
    let following = db.fetch_following(id).await?;

    Ok(Json(following))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/followers", rejection(ServerError))]
struct GetFollowersPath {
    id: Id<UserMarker>,
}

async fn get_followers(
    GetFollowersPath { id }: GetFollowersPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Username>>> {
    if db.fetch_user(id).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(id));
    }
    let followers = db.fetch_followers(id).await?;

    Ok(Json(followers))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{username}/follow", rejection(ServerError))]
struct FollowPath {
    username: Username,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct FollowResponse {
    message: String,
}

/// A duplicate follow is reported as a conflict instead of silently
/// succeeding; clients show the failure message.
async fn follow(
    FollowPath { username }: FollowPath,
    authenticated: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<FollowResponse>> {
    let target = db
        .fetch_user_by_username(&username)
        .await?
        .ok_or_else(|| ServerError::UserByNameNotFound(username.clone()))?;

    if target.id == authenticated.user_id() {
        return Err(ServerError::SelfFollow);
    }

    let inserted = db.create_follow(authenticated.user_id(), target.id).await?;
    if !inserted {
        return Err(ServerError::AlreadyFollowing(username));
    }

    Ok(Json(FollowResponse {
        message: format!("You are now following {username}."),
    }))
}

async fn unfollow(
    FollowPath { username }: FollowPath,
    authenticated: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<FollowResponse>> {
    let target = db
        .fetch_user_by_username(&username)
        .await?
        .ok_or_else(|| ServerError::UserByNameNotFound(username.clone()))?;

    let deleted = db.delete_follow(authenticated.user_id(), target.id).await?;
    if !deleted {
        return Err(ServerError::NotFollowing(username));
    }

    Ok(Json(FollowResponse {
        message: format!("You are no longer following {username}."),
    }))
}
