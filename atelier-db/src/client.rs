use crate::record::{ContentRecord, CredentialsRecord, SessionRecord, UserRecord};
use atelier_common::model::content::{Content, ContentMarker, CreateContent};
use atelier_common::model::session::{Session, SessionTokenHash};
use atelier_common::model::user::{CreateUser, User, UserMarker, Username};
use atelier_common::model::{Id, ModelValidationError};
use sqlx::{PgPool, migrate::MigrateError};
use thiserror::Error;
use time::OffsetDateTime;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

const CONTENT_COLUMNS: &str = "
    contents.content_id,
    contents.title,
    contents.body,
    contents.image,
    contents.artist,
    contents.created_at,
    users.user_id,
    users.username,
    users.created_at AS author_created_at
";

pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("../migrations").run(&self.pool).await
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "
            SELECT user_id, username, created_at
            FROM users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "
            SELECT user_id, username, created_at
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// Fetches a user together with the stored password for the verbatim
    /// login comparison. Never exposed outside the login path.
    pub async fn fetch_user_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "
            SELECT user_id, username, created_at, password
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record
            .map(|record| {
                let password = record.password.clone();
                User::try_from(record).map(|user| (user, password))
            })
            .transpose()?;
        Ok(credentials)
    }

    /// Inserts a new user with a server-assigned id. Returns `None` when the
    /// username or email is already taken.
    pub async fn create_user(&self, user: &CreateUser) -> Result<Option<User>> {
        let user_id = Id::<UserMarker>::generate();

        let inserted = sqlx::query_scalar::<_, OffsetDateTime>(
            "
            INSERT INTO users (user_id, username, email, password)
            VALUES ($1, $2, $3, $4)
            RETURNING created_at
            ",
        )
        .bind(user_id.uuid())
        .bind(user.username.get())
        .bind(user.email.get())
        .bind(user.password.get())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(created_at) => Ok(Some(User {
                id: user_id,
                username: user.username.clone(),
                created_at: created_at.to_utc(),
            })),
            Err(error) if is_unique_violation(&error) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Case-insensitive substring search on usernames. An empty pattern
    /// matches every user.
    pub async fn search_users(&self, pattern: &str) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "
            SELECT user_id, username, created_at
            FROM users
            WHERE username ILIKE $1 ESCAPE '\\'
            ORDER BY username
            ",
        )
        .bind(substring_pattern(pattern))
        .fetch_all(&self.pool)
        .await?;

        let users = records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(users)
    }

    /// Inserts new content with a server-assigned id and timestamp. Returns
    /// `None` when the author does not exist.
    pub async fn create_content(&self, content: &CreateContent) -> Result<Option<Content>> {
        let Some(author) = self.fetch_user(content.author).await? else {
            return Ok(None);
        };

        let content_id = Id::<ContentMarker>::generate();
        let created_at = sqlx::query_scalar::<_, OffsetDateTime>(
            "
            INSERT INTO contents (content_id, author_id, title, body, image, artist)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at
            ",
        )
        .bind(content_id.uuid())
        .bind(content.author.uuid())
        .bind(content.title.get())
        .bind(content.body.get())
        .bind(content.image.as_deref())
        .bind(content.artist.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(Content {
            id: content_id,
            author,
            title: content.title.clone(),
            body: content.body.clone(),
            image: content.image.clone(),
            artist: content.artist.clone(),
            created_at: created_at.to_utc(),
        }))
    }

    pub async fn fetch_content(&self, content_id: Id<ContentMarker>) -> Result<Option<Content>> {
        let record = sqlx::query_as::<_, ContentRecord>(&format!(
            "
            SELECT {CONTENT_COLUMNS}
            FROM contents JOIN users ON users.user_id = contents.author_id
            WHERE contents.content_id = $1
            ",
        ))
        .bind(content_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let content = record.map(Content::try_from).transpose()?;
        Ok(content)
    }

    /// All contents by one author, most recent first. `None` when the author
    /// does not exist.
    pub async fn fetch_user_contents(
        &self,
        author: Id<UserMarker>,
    ) -> Result<Option<Vec<Content>>> {
        if self.fetch_user(author).await?.is_none() {
            return Ok(None);
        }

        let records = sqlx::query_as::<_, ContentRecord>(&format!(
            "
            SELECT {CONTENT_COLUMNS}
            FROM contents JOIN users ON users.user_id = contents.author_id
            WHERE contents.author_id = $1
            ORDER BY contents.created_at DESC
            ",
        ))
        .bind(author.uuid())
        .fetch_all(&self.pool)
        .await?;

        let contents = records
            .into_iter()
            .map(Content::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Some(contents))
    }

    /// Case-insensitive substring search across titles and bodies.
    pub async fn search_contents(&self, pattern: &str) -> Result<Vec<Content>> {
        let records = sqlx::query_as::<_, ContentRecord>(&format!(
            "
            SELECT {CONTENT_COLUMNS}
            FROM contents JOIN users ON users.user_id = contents.author_id
            WHERE contents.title ILIKE $1 ESCAPE '\\'
                OR contents.body ILIKE $1 ESCAPE '\\'
            ORDER BY contents.created_at DESC
            ",
        ))
        .bind(substring_pattern(pattern))
        .fetch_all(&self.pool)
        .await?;

        let contents = records
            .into_iter()
            .map(Content::try_from)
            .collect::<Result<_, _>>()?;
        Ok(contents)
    }

    /// Inserts the directed follow edge. Returns `false` when the edge
    /// already exists. The pair primary key makes the edge single-rowed, so
    /// there is no two-sided state to drift apart.
    pub async fn create_follow(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<bool> {
        let inserted = sqlx::query(
            "
            INSERT INTO follows (follower_id, followee_id)
            VALUES ($1, $2)
            ",
        )
        .bind(follower.uuid())
        .bind(followee.uuid())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(error) if is_unique_violation(&error) => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Deletes the directed follow edge. Returns `false` when there was no
    /// edge to delete.
    pub async fn delete_follow(
        &self,
        follower: Id<UserMarker>,
        followee: Id<UserMarker>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "
            DELETE FROM follows
            WHERE follower_id = $1 AND followee_id = $2
            ",
        )
        .bind(follower.uuid())
        .bind(followee.uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Usernames the given user follows, oldest edge first. Derived from the
    /// edge table on every call.
    pub async fn fetch_following(&self, user_id: Id<UserMarker>) -> Result<Vec<Username>> {
        let usernames = sqlx::query_scalar::<_, String>(
            "
            SELECT users.username
            FROM follows JOIN users ON users.user_id = follows.followee_id
            WHERE follows.follower_id = $1
            ORDER BY follows.created_at
            ",
        )
        .bind(user_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        collect_usernames(usernames)
    }

    /// Usernames following the given user, derived from the same edge table
    /// as [`fetch_following`](Self::fetch_following), so the two views cannot
    /// disagree.
    pub async fn fetch_followers(&self, user_id: Id<UserMarker>) -> Result<Vec<Username>> {
        let usernames = sqlx::query_scalar::<_, String>(
            "
            SELECT users.username
            FROM follows JOIN users ON users.user_id = follows.follower_id
            WHERE follows.followee_id = $1
            ORDER BY follows.created_at
            ",
        )
        .bind(user_id.uuid())
        .fetch_all(&self.pool)
        .await?;

        collect_usernames(usernames)
    }

    /// Contents authored by anyone the viewer follows, most recent first.
    /// Authors are matched by id through the edge table, never by the
    /// denormalized username.
    pub async fn fetch_feed(&self, viewer: Id<UserMarker>) -> Result<Vec<Content>> {
        let records = sqlx::query_as::<_, ContentRecord>(&format!(
            "
            SELECT {CONTENT_COLUMNS}
            FROM contents JOIN users ON users.user_id = contents.author_id
            WHERE contents.author_id IN (
                SELECT followee_id FROM follows WHERE follower_id = $1
            )
            ORDER BY contents.created_at DESC
            ",
        ))
        .bind(viewer.uuid())
        .fetch_all(&self.pool)
        .await?;

        let contents = records
            .into_iter()
            .map(Content::try_from)
            .collect::<Result<_, _>>()?;
        Ok(contents)
    }

    pub async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO sessions (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&session.token_hash.0[..])
        .bind(session.user.uuid())
        .bind(OffsetDateTime::from(session.created_at))
        .bind(session.expires_after.map(|duration| duration.whole_seconds()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_session(&self, token_hash: &SessionTokenHash) -> Result<Option<Session>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "
            SELECT user_id, token_hash, created_at, expires_after_seconds
            FROM sessions
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let session = record.map(Session::try_from).transpose()?;
        Ok(session)
    }

    /// Returns `false` when no session existed for the hash.
    pub async fn delete_session(&self, token_hash: &SessionTokenHash) -> Result<bool> {
        let result = sqlx::query(
            "
            DELETE FROM sessions
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.is_unique_violation())
}

fn collect_usernames(usernames: Vec<String>) -> Result<Vec<Username>> {
    usernames
        .into_iter()
        .map(|username| Username::new(username).map_err(|err| ModelValidationError::from(err).into()))
        .collect()
}

/// Builds an `ILIKE` pattern matching the raw input as a substring, with
/// pattern metacharacters in the input escaped.
fn substring_pattern(input: &str) -> String {
    let escaped: String = input
        .chars()
        .flat_map(|c| {
            let escape = matches!(c, '\\' | '%' | '_');
            escape.then_some('\\').into_iter().chain([c])
        })
        .collect();

    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, substring_pattern};
    use atelier_common::model::content::{ContentBody, ContentTitle, CreateContent};
    use atelier_common::model::session::{Session, SessionToken};
    use atelier_common::model::user::{CreateUser, EmailAddress, Password, Username};
    use atelier_common::util::PositiveDuration;
    use sqlx::PgPool;
    use time::{Duration, UtcDateTime};
    use uuid::Uuid;

    #[test]
    fn substring_pattern_escapes_metacharacters() {
        assert_eq!(substring_pattern("monet"), "%monet%");
        assert_eq!(substring_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(substring_pattern("back\\slash"), "%back\\\\slash%");
        assert_eq!(substring_pattern(""), "%%");
    }

    // The tests below exercise the graph and feed semantics against a real
    // PostgreSQL instance. Run them with:
    //     DATABASE_URL=postgres://... cargo test -p atelier-db -- --ignored

    async fn test_client() -> DbClient {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db tests");
        let pool = PgPool::connect(&url).await.unwrap();
        let client = DbClient::new(pool);
        client.migrate().await.unwrap();
        client
    }

    fn unique_create_user(prefix: &str) -> CreateUser {
        let tag = Uuid::new_v4().simple();
        CreateUser {
            username: Username::new(format!("{prefix}-{tag}")).unwrap(),
            email: EmailAddress::new(format!("{prefix}-{tag}@example.com")).unwrap(),
            password: Password::new("plaintext-on-purpose".to_owned()).unwrap(),
        }
    }

    fn create_content(author: &atelier_common::model::user::User, title: &str) -> CreateContent {
        CreateContent {
            author: author.id,
            title: ContentTitle::new(title.to_owned()).unwrap(),
            body: ContentBody::new(format!("body of {title}")).unwrap(),
            image: None,
            artist: None,
        }
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database via DATABASE_URL"]
    async fn follow_edge_is_visible_from_both_sides() {
        let db = test_client().await;
        let alice = db.create_user(&unique_create_user("alice")).await.unwrap().unwrap();
        let bob = db.create_user(&unique_create_user("bob")).await.unwrap().unwrap();

        assert!(db.create_follow(bob.id, alice.id).await.unwrap());

        let following = db.fetch_following(bob.id).await.unwrap();
        let followers = db.fetch_followers(alice.id).await.unwrap();
        assert!(following.contains(&alice.username));
        assert!(followers.contains(&bob.username));

        assert!(db.delete_follow(bob.id, alice.id).await.unwrap());
        assert!(!db.fetch_following(bob.id).await.unwrap().contains(&alice.username));
        assert!(!db.fetch_followers(alice.id).await.unwrap().contains(&bob.username));
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database via DATABASE_URL"]
    async fn duplicate_follow_and_missing_unfollow_are_reported() {
        let db = test_client().await;
        let alice = db.create_user(&unique_create_user("alice")).await.unwrap().unwrap();
        let bob = db.create_user(&unique_create_user("bob")).await.unwrap().unwrap();

        assert!(db.create_follow(bob.id, alice.id).await.unwrap());
        assert!(!db.create_follow(bob.id, alice.id).await.unwrap());

        assert!(db.delete_follow(bob.id, alice.id).await.unwrap());
        assert!(!db.delete_follow(bob.id, alice.id).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database via DATABASE_URL"]
    async fn self_follow_edge_is_rejected_by_the_schema() {
        let db = test_client().await;
        let alice = db.create_user(&unique_create_user("alice")).await.unwrap().unwrap();

        // The route guard refuses self-follows up front; the check constraint
        // makes sure no self-edge can ever land even without it.
        assert!(db.create_follow(alice.id, alice.id).await.is_err());
        assert!(db.fetch_following(alice.id).await.unwrap().is_empty());
        assert!(db.fetch_followers(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database via DATABASE_URL"]
    async fn search_with_no_matches_is_an_empty_success() {
        let db = test_client().await;
        let needle = format!("no-match-{}", Uuid::new_v4().simple());

        assert!(db.search_users(&needle).await.unwrap().is_empty());
        assert!(db.search_contents(&needle).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database via DATABASE_URL"]
    async fn duplicate_username_or_email_is_a_conflict() {
        let db = test_client().await;
        let create = unique_create_user("carol");

        assert!(db.create_user(&create).await.unwrap().is_some());
        assert!(db.create_user(&create).await.unwrap().is_none());

        let same_email = CreateUser {
            username: unique_create_user("carol").username,
            ..create
        };
        assert!(db.create_user(&same_email).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database via DATABASE_URL"]
    async fn feed_is_reverse_chronological_and_isolated() {
        let db = test_client().await;
        let alice = db.create_user(&unique_create_user("alice")).await.unwrap().unwrap();
        let bob = db.create_user(&unique_create_user("bob")).await.unwrap().unwrap();
        let carol = db.create_user(&unique_create_user("carol")).await.unwrap().unwrap();

        // Bob follows only alice; an empty following list means an empty feed.
        assert!(db.fetch_feed(bob.id).await.unwrap().is_empty());
        assert!(db.create_follow(bob.id, alice.id).await.unwrap());

        let first = db.create_content(&create_content(&alice, "T1")).await.unwrap().unwrap();
        let second = db.create_content(&create_content(&alice, "T2")).await.unwrap().unwrap();
        let unrelated = db.create_content(&create_content(&carol, "T3")).await.unwrap().unwrap();

        let feed = db.fetch_feed(bob.id).await.unwrap();
        let feed_ids: Vec<_> = feed.iter().map(|content| content.id).collect();
        assert!(feed_ids.contains(&first.id));
        assert!(feed_ids.contains(&second.id));
        assert!(!feed_ids.contains(&unrelated.id));
        assert!(feed.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));

        // After unfollowing, alice's older contents no longer show up.
        assert!(db.delete_follow(bob.id, alice.id).await.unwrap());
        assert!(db.fetch_feed(bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database via DATABASE_URL"]
    async fn session_round_trip() {
        let db = test_client().await;
        let dave = db.create_user(&unique_create_user("dave")).await.unwrap().unwrap();

        let token = SessionToken::generate_random(dave.id);
        let session = Session {
            user: dave.id,
            token_hash: token.hash().unwrap(),
            created_at: UtcDateTime::now(),
            expires_after: Some(PositiveDuration::new_unchecked(Duration::days(30))),
        };
        db.create_session(&session).await.unwrap();

        let fetched = db.fetch_session(&session.token_hash).await.unwrap().unwrap();
        assert_eq!(fetched.user, dave.id);
        assert_eq!(fetched.token_hash, session.token_hash);

        assert!(db.delete_session(&session.token_hash).await.unwrap());
        assert!(db.fetch_session(&session.token_hash).await.unwrap().is_none());
    }
}
