use crate::server::ServerError;
use atelier_common::model::{Id, session::SessionToken, user::UserMarker};
use atelier_db::client::DbClient;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::UtcDateTime;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The session token from the `Authorization` header, decoded but not yet
/// checked against the session store.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct BearerToken(pub SessionToken);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        Ok(Self(token))
    }
}

/// The session gate. Yields the authenticated caller's user id or rejects
/// the request; handlers never re-check credentials themselves.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(request_token) = BearerToken::from_request_parts(parts, state).await?;

        let token_hash = request_token.hash()?;

        let session = Arc::<DbClient>::from_ref(state)
            .fetch_session(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        assert_eq!(session.token_hash, token_hash);

        if session.is_expired(UtcDateTime::now()) {
            return Err(ServerError::InvalidToken);
        }

        Ok(Self { id: session.user })
    }
}
