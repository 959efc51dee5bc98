use crate::model::{
    Id,
    user::{User, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const CONTENT_TITLE_MAX_LEN: usize = 120;
pub const CONTENT_BODY_MAX_LEN: usize = 4000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ContentMarker;

/// A single user-authored post. Immutable once created; `created_at` is
/// server-assigned and is the sole feed ordering key.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Content {
    pub id: Id<ContentMarker>,
    pub author: User,
    pub title: ContentTitle,
    pub body: ContentBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub created_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateContent {
    pub author: Id<UserMarker>,
    pub title: ContentTitle,
    pub body: ContentBody,
    pub image: Option<String>,
    pub artist: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The title is empty or too long: {0:?}")]
pub struct InvalidContentTitleError(String);

impl ContentTitle {
    pub fn new(title: String) -> Result<Self, InvalidContentTitleError> {
        if title.trim().is_empty() || title.chars().count() > CONTENT_TITLE_MAX_LEN {
            Err(InvalidContentTitleError(title))
        } else {
            Ok(ContentTitle(title))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ContentTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ContentTitle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"ContentTitle"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentBody(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The body text is empty or too long")]
pub struct InvalidContentBodyError(String);

impl ContentBody {
    pub fn new(body: String) -> Result<Self, InvalidContentBodyError> {
        if body.trim().is_empty() || body.chars().count() > CONTENT_BODY_MAX_LEN {
            Err(InvalidContentBodyError(body))
        } else {
            Ok(ContentBody(body))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ContentBody {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ContentBody::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"ContentBody"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::content::{
        CONTENT_BODY_MAX_LEN, CONTENT_TITLE_MAX_LEN, ContentBody, ContentTitle,
    };

    #[test]
    fn title_requires_visible_characters() {
        assert!(ContentTitle::new("Still Life".to_owned()).is_ok());
        assert!(ContentTitle::new(String::new()).is_err());
        assert!(ContentTitle::new("   \n".to_owned()).is_err());
    }

    #[test]
    fn title_length_limit() {
        assert!(ContentTitle::new("x".repeat(CONTENT_TITLE_MAX_LEN)).is_ok());
        assert!(ContentTitle::new("x".repeat(CONTENT_TITLE_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn body_requires_visible_characters() {
        assert!(ContentBody::new("oil on canvas, 1889".to_owned()).is_ok());
        assert!(ContentBody::new("\t ".to_owned()).is_err());
        assert!(ContentBody::new("x".repeat(CONTENT_BODY_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn invalid_title_is_rejected_at_deserialization() {
        assert!(serde_json::from_str::<ContentTitle>("\"  \"").is_err());
        assert!(serde_json::from_str::<ContentTitle>("\"Sunflowers\"").is_ok());
    }
}
