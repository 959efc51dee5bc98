use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;
use time::UtcDateTime;

pub const USERNAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PASSWORD_MAX_LEN: usize = 128;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
    pub created_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct CreateUser {
    pub username: Username,
    pub email: EmailAddress,
    pub password: Password,
}

/// Case-sensitive identity key for follow edges. Immutable after creation.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The username is invalid: {0:?}")]
pub struct InvalidUsernameError(String);

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        let char_count = username.chars().count();
        let well_formed = (1..=USERNAME_MAX_LEN).contains(&char_count)
            && !username.chars().any(|c| c.is_whitespace() || c.is_control());

        if well_formed {
            Ok(Username(username))
        } else {
            Err(InvalidUsernameError(username))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Username"))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0:?}")]
pub struct InvalidEmailAddressError(String);

impl EmailAddress {
    pub fn new(email: String) -> Result<Self, InvalidEmailAddressError> {
        // Deliverability is the mail server's problem, we only reject the
        // obviously malformed.
        let well_formed = email.len() <= EMAIL_MAX_LEN
            && !email.chars().any(|c| c.is_whitespace() || c.is_control())
            && email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

        if well_formed {
            Ok(EmailAddress(email))
        } else {
            Err(InvalidEmailAddressError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for EmailAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        EmailAddress::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"EmailAddress"))
    }
}

/// Stored and compared verbatim. A known weakness of the system that is kept
/// on purpose; see DESIGN.md before "fixing" this.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Default, Hash)]
pub struct Password(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The password is empty or too long")]
pub struct InvalidPasswordError;

impl Password {
    pub fn new(password: String) -> Result<Self, InvalidPasswordError> {
        if (1..=PASSWORD_MAX_LEN).contains(&password.len()) {
            Ok(Password(password))
        } else {
            Err(InvalidPasswordError)
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(inner).map_err(|_| Error::invalid_value(Unexpected::Str(""), &"Password"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{EmailAddress, Password, USERNAME_MAX_LEN, Username};

    #[test]
    fn username_accepts_reasonable_handles() {
        for handle in ["alice", "bob_92", "Frida.Kahlo", "\u{e9}", "a"] {
            assert!(Username::new(handle.to_owned()).is_ok(), "{handle}");
        }
    }

    #[test]
    fn username_rejects_empty_whitespace_and_overlong() {
        assert!(Username::new(String::new()).is_err());
        assert!(Username::new("two words".to_owned()).is_err());
        assert!(Username::new("tab\tseparated".to_owned()).is_err());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn username_length_is_counted_in_chars() {
        assert!(Username::new("\u{fc}".repeat(USERNAME_MAX_LEN)).is_ok());
    }

    #[test]
    fn username_is_case_sensitive() {
        let lower = Username::new("alice".to_owned()).unwrap();
        let upper = Username::new("Alice".to_owned()).unwrap();

        assert_ne!(lower, upper);
    }

    #[test]
    fn email_validation() {
        assert!(EmailAddress::new("alice@example.com".to_owned()).is_ok());
        assert!(EmailAddress::new("@example.com".to_owned()).is_err());
        assert!(EmailAddress::new("alice@localhost".to_owned()).is_err());
        assert!(EmailAddress::new("not-an-email".to_owned()).is_err());
        assert!(EmailAddress::new("a lice@example.com".to_owned()).is_err());
    }

    #[test]
    fn password_never_appears_in_debug_output() {
        let password = Password::new("hunter2".to_owned()).unwrap();

        assert!(!format!("{password:?}").contains("hunter2"));
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(Password::new(String::new()).is_err());
    }
}
