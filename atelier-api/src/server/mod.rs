use crate::server::{bio::BioClient, uploads::UploadStore};
use atelier_common::model::{
    Id,
    content::ContentMarker,
    session::{SessionTokenDecodeError, SessionTokenHashError},
    user::{UserMarker, Username},
};
use atelier_db::client::{DbClient, DbError};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{BytesRejection, JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use bio::BioError;
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use uploads::UploadError;

mod auth;
pub mod bio;
mod json;
mod routes;
pub mod uploads;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub bio_client: BioClient,
    pub upload_store: UploadStore,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Request body rejected: {0}")]
    BodyRejection(#[from] BytesRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided session token could not be decoded: {0}")]
    InvalidSessionToken(#[from] SessionTokenDecodeError),
    #[error("The session token could not be hashed: {0}")]
    SessionTokenHash(#[from] SessionTokenHashError),
    #[error("Provided token was invalid or expired")]
    InvalidToken,
    #[error("Wrong username or password")]
    WrongCredentials,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("User {0} was not found.")]
    UserByNameNotFound(Username),
    #[error("Content with id {0} was not found.")]
    ContentByIdNotFound(Id<ContentMarker>),
    #[error("That username or email address is already taken.")]
    UsernameOrEmailTaken,
    #[error("You cannot follow yourself.")]
    SelfFollow,
    #[error("You are already following {0}.")]
    AlreadyFollowing(Username),
    #[error("You are not following {0}.")]
    NotFollowing(Username),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Bio(#[from] BioError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::UserByNameNotFound(_)
            | ServerError::ContentByIdNotFound(_)
            | ServerError::Bio(BioError::PageNotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken | ServerError::WrongCredentials => StatusCode::UNAUTHORIZED,
            ServerError::JsonRejection(_)
            | ServerError::BodyRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidSessionToken(_)
            | ServerError::SelfFollow
            | ServerError::NotFollowing(_) => StatusCode::BAD_REQUEST,
            ServerError::UsernameOrEmailTaken | ServerError::AlreadyFollowing(_) => {
                StatusCode::CONFLICT
            }
            ServerError::Upload(upload) => upload.status(),
            ServerError::Bio(_) => StatusCode::BAD_GATEWAY,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::SessionTokenHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Internal failures get a generic text so
    /// no database or serialization details leak.
    fn public_message(&self) -> String {
        match self {
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::SessionTokenHash(_)
            | ServerError::Upload(UploadError::Write(_)) => "internal server error".to_owned(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            error: self.public_message(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::{ServerError, bio::BioError, uploads::UploadError};
    use atelier_common::model::{Id, user::Username};
    use axum::http::StatusCode;

    fn username(name: &str) -> Username {
        Username::new(name.to_owned()).unwrap()
    }

    #[test]
    fn not_found_statuses() {
        assert_eq!(
            ServerError::UserByIdNotFound(Id::generate()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::UserByNameNotFound(username("ghost")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::ContentByIdNotFound(Id::generate()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::Bio(BioError::PageNotFound("ghost".to_owned())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn business_rule_statuses() {
        assert_eq!(
            ServerError::UsernameOrEmailTaken.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::AlreadyFollowing(username("alice")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ServerError::SelfFollow.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServerError::NotFollowing(username("alice")).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn authentication_statuses() {
        assert_eq!(ServerError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServerError::WrongCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn internal_failures_are_opaque() {
        let error = ServerError::Database(
            atelier_common::model::ModelValidationError::from(
                Username::new(String::new()).unwrap_err(),
            )
            .into(),
        );

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "internal server error");
    }

    #[test]
    fn upload_statuses() {
        assert_eq!(
            ServerError::Upload(UploadError::UnsupportedImageType).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ServerError::Upload(UploadError::TooLarge).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
