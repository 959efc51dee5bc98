use atelier_common::model::{
    ModelValidationError,
    content::{Content, ContentBody, ContentTitle},
    session::Session,
    user::{User, Username},
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: Uuid,
    pub username: String,
    pub created_at: OffsetDateTime,
}

/// [`UserRecord`] plus the stored secret, fetched only for login.
#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_id: Uuid,
    pub username: String,
    pub created_at: OffsetDateTime,
    pub password: String,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct ContentRecord {
    pub content_id: Uuid,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub artist: Option<String>,
    pub created_at: OffsetDateTime,
    pub user_id: Uuid,
    pub username: String,
    pub author_created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, FromRow)]
pub(crate) struct SessionRecord {
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(value.username)?,
            created_at: value.created_at.to_utc(),
        })
    }
}

impl TryFrom<CredentialsRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            username: Username::new(value.username)?,
            created_at: value.created_at.to_utc(),
        })
    }
}

impl TryFrom<ContentRecord> for Content {
    type Error = ModelValidationError;

    fn try_from(value: ContentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.content_id.into(),
            author: User {
                id: value.user_id.into(),
                username: Username::new(value.username)?,
                created_at: value.author_created_at.to_utc(),
            },
            title: ContentTitle::new(value.title)?,
            body: ContentBody::new(value.body)?,
            image: value.image,
            artist: value.artist,
            created_at: value.created_at.to_utc(),
        })
    }
}

impl TryFrom<SessionRecord> for Session {
    type Error = ModelValidationError;

    fn try_from(value: SessionRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.to_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}
