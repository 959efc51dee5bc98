use crate::server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json};
use atelier_common::model::{
    Id,
    content::{Content, ContentBody, ContentMarker, ContentTitle, CreateContent},
};
use atelier_db::client::DbClient;
use axum::{
    Router,
    extract::{Query, State},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const EMPTY_FEED_HINT: &str =
    "You are not following anyone yet. Search for artists and follow them to fill your feed.";

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(create_content)
        .typed_get(search_contents)
        .typed_get(get_content)
        .typed_get(get_feed)
}

#[derive(TypedPath)]
#[typed_path("/contents")]
struct ContentsPath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct CreateContentRequest {
    title: ContentTitle,
    body: ContentBody,
    image: Option<String>,
    artist: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct CreateContentResponse {
    message: String,
    content: Content,
}

async fn create_content(
    _: ContentsPath,
    authenticated: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
    Json(request): Json<CreateContentRequest>,
) -> Result<Json<CreateContentResponse>> {
    let create = CreateContent {
        author: authenticated.user_id(),
        title: request.title,
        body: request.body,
        image: request.image,
        artist: request.artist,
    };

    let content = db
        .create_content(&create)
        .await?
        .ok_or(ServerError::UserByIdNotFound(authenticated.user_id()))?;

    Ok(Json(CreateContentResponse {
        message: "Content posted.".to_owned(),
        content,
    }))
}

#[derive(TypedPath)]
#[typed_path("/contents/search")]
struct SearchContentsPath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_contents(
    _: SearchContentsPath,
    State(db): State<Arc<DbClient>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Content>>> {
    let contents = db.search_contents(&query.q).await?;

    Ok(Json(contents))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/contents/{id}", rejection(ServerError))]
struct GetContentPath {
    id: Id<ContentMarker>,
}

async fn get_content(
    GetContentPath { id }: GetContentPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Content>> {
    let content = db
        .fetch_content(id)
        .await?
        .ok_or(ServerError::ContentByIdNotFound(id))?;

    Ok(Json(content))
}

#[derive(TypedPath)]
#[typed_path("/feed")]
struct FeedPath;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct FeedResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    contents: Vec<Content>,
}

/// An empty following list is a normal state, answered with a hint rather
/// than an error.
async fn get_feed(
    _: FeedPath,
    authenticated: AuthenticatedUser,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<FeedResponse>> {
    let following = db.fetch_following(authenticated.user_id()).await?;
    if following.is_empty() {
        return Ok(Json(FeedResponse {
            hint: Some(EMPTY_FEED_HINT.to_owned()),
            contents: Vec::new(),
        }));
    }

    let contents = db.fetch_feed(authenticated.user_id()).await?;
    Ok(Json(FeedResponse {
        hint: None,
        contents,
    }))
}
