use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

fn conflict_or(err: sqlx::Error, what: String) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return StoreError::Conflict(what);
        }
    }
    StoreError::Database(err)
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub name: String,
    pub url: String,
    pub user_id: Option<i64>,
    pub last_fetched_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedFollow {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub user_id: i64,
    pub feed_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub feed_id: i64,
}

/// A feed joined with the name of the user who added it.
#[derive(Debug, Clone, FromRow)]
pub struct FeedOverview {
    pub name: String,
    pub url: String,
    pub creator: Option<String>,
}

/// A post joined with its feed's name, for browsing.
#[derive(Debug, Clone, FromRow)]
pub struct PostWithFeed {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub feed_name: String,
}

/// A post about to be stored by the ingestion step.
#[derive(Debug)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub description: Option<&'a str>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: i64,
}

pub struct Database {
    pool: SqlitePool,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                name TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL UNIQUE,
                user_id INTEGER REFERENCES users(id) ON DELETE CASCADE,
                last_fetched_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_follows (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                UNIQUE(user_id, feed_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                description TEXT,
                published_at TEXT,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_posts_feed_published
            ON posts(feed_id, published_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // --- users ---

    pub async fn create_user(&self, name: &str) -> Result<User, StoreError> {
        let now = now();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (created_at, updated_at, name)
            VALUES (?1, ?1, ?2)
            RETURNING *
            "#,
        )
        .bind(&now)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, format!("user `{name}`")))
    }

    pub async fn get_user(&self, name: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Delete every user; feeds, follows, and posts cascade away with them.
    pub async fn reset(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(())
    }

    // --- feeds ---

    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, StoreError> {
        let now = now();
        sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (created_at, updated_at, name, url, user_id)
            VALUES (?1, ?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(&now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, format!("a feed named `{name}` or at `{url}`")))
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, StoreError> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn list_feeds(&self) -> Result<Vec<FeedOverview>, StoreError> {
        let feeds = sqlx::query_as::<_, FeedOverview>(
            r#"
            SELECT feeds.name, feeds.url, users.name AS creator
            FROM feeds
            LEFT JOIN users ON feeds.user_id = users.id
            ORDER BY feeds.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// The single feed most overdue for a fetch: never-fetched feeds first,
    /// then oldest last-fetch time, ties broken by id so selection is stable.
    pub async fn select_most_due_feed(&self) -> Result<Option<Feed>, StoreError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT * FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Stamp a feed's last-fetch time. MAX keeps the column from moving
    /// backwards when overlapping cycles stamp the same feed out of order.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let at = at.to_rfc3339();
        sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(COALESCE(last_fetched_at, ''), ?1),
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(&at)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // --- feed follows ---

    pub async fn create_feed_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> Result<FeedFollow, StoreError> {
        let now = now();
        sqlx::query_as::<_, FeedFollow>(
            r#"
            INSERT INTO feed_follows (created_at, updated_at, user_id, feed_id)
            VALUES (?1, ?1, ?2, ?3)
            RETURNING *
            "#,
        )
        .bind(&now)
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "that follow".to_string()))
    }

    pub async fn follows_for_user(&self, user_id: i64) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT feeds.name
            FROM feed_follows
            JOIN feeds ON feed_follows.feed_id = feeds.id
            WHERE feed_follows.user_id = ?
            ORDER BY feed_follows.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Returns false when the user was not following a feed at that URL.
    pub async fn delete_feed_follow(
        &self,
        user_id: i64,
        feed_url: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM feed_follows
            WHERE user_id = ?
              AND feed_id IN (SELECT id FROM feeds WHERE url = ?)
            "#,
        )
        .bind(user_id)
        .bind(feed_url)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- posts ---

    pub async fn insert_post(&self, post: NewPost<'_>) -> Result<Post, StoreError> {
        let now = now();
        let published_at = post.published_at.map(|p| p.to_rfc3339());
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(&now)
        .bind(post.title)
        .bind(post.url)
        .bind(post.description)
        .bind(published_at)
        .bind(post.feed_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, format!("a post at `{}`", post.url)))
    }

    /// Newest posts from the feeds a user follows, joined with feed names.
    pub async fn posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<PostWithFeed>, StoreError> {
        let posts = sqlx::query_as::<_, PostWithFeed>(
            r#"
            SELECT posts.title, posts.url, posts.description, posts.published_at,
                   feeds.name AS feed_name
            FROM posts
            JOIN feeds ON posts.feed_id = feeds.id
            JOIN feed_follows ON feed_follows.feed_id = feeds.id
            WHERE feed_follows.user_id = ?
            ORDER BY posts.published_at DESC NULLS LAST, posts.created_at DESC, posts.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    mod user_tests {
        use super::*;

        #[tokio::test]
        async fn test_create_and_get_user() {
            let db = create_test_db().await;

            let user = db.create_user("alice").await.unwrap();
            assert_eq!(user.name, "alice");

            let found = db.get_user("alice").await.unwrap();
            assert_eq!(found.unwrap().id, user.id);
        }

        #[tokio::test]
        async fn test_get_missing_user() {
            let db = create_test_db().await;
            assert!(db.get_user("nobody").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_duplicate_user_is_conflict() {
            let db = create_test_db().await;
            db.create_user("alice").await.unwrap();

            let err = db.create_user("alice").await.unwrap_err();
            assert!(matches!(err, StoreError::Conflict(_)));
        }

        #[tokio::test]
        async fn test_list_users_sorted_by_name() {
            let db = create_test_db().await;
            db.create_user("carol").await.unwrap();
            db.create_user("alice").await.unwrap();
            db.create_user("bob").await.unwrap();

            let names: Vec<String> = db
                .list_users()
                .await
                .unwrap()
                .into_iter()
                .map(|u| u.name)
                .collect();
            assert_eq!(names, vec!["alice", "bob", "carol"]);
        }

        #[tokio::test]
        async fn test_reset_cascades_to_feeds_and_posts() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();
            db.create_feed_follow(user.id, feed.id).await.unwrap();
            db.insert_post(NewPost {
                title: "Post",
                url: "https://blog.example.com/post/1",
                description: None,
                published_at: None,
                feed_id: feed.id,
            })
            .await
            .unwrap();

            db.reset().await.unwrap();

            assert!(db.list_users().await.unwrap().is_empty());
            assert!(db.list_feeds().await.unwrap().is_empty());
            assert!(db
                .get_feed_by_url("https://blog.example.com/rss")
                .await
                .unwrap()
                .is_none());
        }
    }

    mod feed_tests {
        use super::*;

        #[tokio::test]
        async fn test_create_feed() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();

            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();

            assert_eq!(feed.name, "Blog");
            assert_eq!(feed.url, "https://blog.example.com/rss");
            assert_eq!(feed.user_id, Some(user.id));
            assert!(feed.last_fetched_at.is_none());
        }

        #[tokio::test]
        async fn test_duplicate_feed_url_is_conflict() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            db.create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();

            let err = db
                .create_feed("Other", "https://blog.example.com/rss", user.id)
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Conflict(_)));
        }

        #[tokio::test]
        async fn test_list_feeds_includes_creator() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            db.create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();

            let feeds = db.list_feeds().await.unwrap();
            assert_eq!(feeds.len(), 1);
            assert_eq!(feeds[0].creator.as_deref(), Some("alice"));
        }
    }

    mod selection_tests {
        use super::*;

        async fn seed_feeds(db: &Database, count: usize) -> Vec<Feed> {
            let user = db.create_user("alice").await.unwrap();
            let mut feeds = Vec::new();
            for i in 0..count {
                let feed = db
                    .create_feed(
                        &format!("Feed {i}"),
                        &format!("https://feed{i}.example.com/rss"),
                        user.id,
                    )
                    .await
                    .unwrap();
                feeds.push(feed);
            }
            feeds
        }

        #[tokio::test]
        async fn test_no_feeds_selects_none() {
            let db = create_test_db().await;
            assert!(db.select_most_due_feed().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_never_fetched_feed_beats_fetched_ones() {
            let db = create_test_db().await;
            let feeds = seed_feeds(&db, 3).await;

            db.mark_feed_fetched(feeds[0].id, ts(100)).await.unwrap();
            db.mark_feed_fetched(feeds[2].id, ts(50)).await.unwrap();

            let due = db.select_most_due_feed().await.unwrap().unwrap();
            assert_eq!(due.id, feeds[1].id);
        }

        #[tokio::test]
        async fn test_oldest_fetch_time_selected() {
            let db = create_test_db().await;
            let feeds = seed_feeds(&db, 3).await;

            db.mark_feed_fetched(feeds[0].id, ts(300)).await.unwrap();
            db.mark_feed_fetched(feeds[1].id, ts(100)).await.unwrap();
            db.mark_feed_fetched(feeds[2].id, ts(200)).await.unwrap();

            let due = db.select_most_due_feed().await.unwrap().unwrap();
            assert_eq!(due.id, feeds[1].id);
        }

        #[tokio::test]
        async fn test_ties_break_by_id() {
            let db = create_test_db().await;
            let feeds = seed_feeds(&db, 3).await;

            for feed in &feeds {
                db.mark_feed_fetched(feed.id, ts(100)).await.unwrap();
            }

            let due = db.select_most_due_feed().await.unwrap().unwrap();
            assert_eq!(due.id, feeds[0].id);
        }

        #[tokio::test]
        async fn test_selection_rotates_after_marking() {
            let db = create_test_db().await;
            let feeds = seed_feeds(&db, 2).await;

            let first = db.select_most_due_feed().await.unwrap().unwrap();
            assert_eq!(first.id, feeds[0].id);
            db.mark_feed_fetched(first.id, ts(100)).await.unwrap();

            let second = db.select_most_due_feed().await.unwrap().unwrap();
            assert_eq!(second.id, feeds[1].id);
        }
    }

    mod mark_fetched_tests {
        use super::*;

        #[tokio::test]
        async fn test_mark_sets_timestamp() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();

            db.mark_feed_fetched(feed.id, ts(100)).await.unwrap();

            let feed = db
                .get_feed_by_url("https://blog.example.com/rss")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(feed.last_fetched_at, Some(ts(100).to_rfc3339()));
        }

        #[tokio::test]
        async fn test_mark_never_moves_backwards() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();

            db.mark_feed_fetched(feed.id, ts(200)).await.unwrap();
            db.mark_feed_fetched(feed.id, ts(100)).await.unwrap();

            let feed = db
                .get_feed_by_url("https://blog.example.com/rss")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(feed.last_fetched_at, Some(ts(200).to_rfc3339()));
        }

        #[tokio::test]
        async fn test_marking_twice_keeps_later_time() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();

            db.mark_feed_fetched(feed.id, ts(100)).await.unwrap();
            db.mark_feed_fetched(feed.id, ts(101)).await.unwrap();

            let feed = db
                .get_feed_by_url("https://blog.example.com/rss")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(feed.last_fetched_at, Some(ts(101).to_rfc3339()));
        }
    }

    mod follow_tests {
        use super::*;

        #[tokio::test]
        async fn test_follow_and_list() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();

            db.create_feed_follow(user.id, feed.id).await.unwrap();

            let follows = db.follows_for_user(user.id).await.unwrap();
            assert_eq!(follows, vec!["Blog"]);
        }

        #[tokio::test]
        async fn test_duplicate_follow_is_conflict() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();
            db.create_feed_follow(user.id, feed.id).await.unwrap();

            let err = db.create_feed_follow(user.id, feed.id).await.unwrap_err();
            assert!(matches!(err, StoreError::Conflict(_)));
        }

        #[tokio::test]
        async fn test_unfollow() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();
            db.create_feed_follow(user.id, feed.id).await.unwrap();

            let removed = db
                .delete_feed_follow(user.id, "https://blog.example.com/rss")
                .await
                .unwrap();
            assert!(removed);
            assert!(db.follows_for_user(user.id).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_unfollow_unknown_feed_returns_false() {
            let db = create_test_db().await;
            let user = db.create_user("alice").await.unwrap();

            let removed = db
                .delete_feed_follow(user.id, "https://nowhere.example.com/rss")
                .await
                .unwrap();
            assert!(!removed);
        }
    }

    mod post_tests {
        use super::*;

        async fn seed_followed_feed(db: &Database) -> (User, Feed) {
            let user = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", user.id)
                .await
                .unwrap();
            db.create_feed_follow(user.id, feed.id).await.unwrap();
            (user, feed)
        }

        #[tokio::test]
        async fn test_insert_post() {
            let db = create_test_db().await;
            let (_, feed) = seed_followed_feed(&db).await;

            let post = db
                .insert_post(NewPost {
                    title: "Hello",
                    url: "https://blog.example.com/post/1",
                    description: Some("A post"),
                    published_at: Some(ts(100)),
                    feed_id: feed.id,
                })
                .await
                .unwrap();

            assert_eq!(post.title, "Hello");
            assert_eq!(post.feed_id, feed.id);
            assert_eq!(post.published_at, Some(ts(100).to_rfc3339()));
        }

        #[tokio::test]
        async fn test_duplicate_post_url_is_conflict_across_feeds() {
            let db = create_test_db().await;
            let (user, feed) = seed_followed_feed(&db).await;
            let other = db
                .create_feed("Other", "https://other.example.com/rss", user.id)
                .await
                .unwrap();

            db.insert_post(NewPost {
                title: "Hello",
                url: "https://blog.example.com/post/1",
                description: None,
                published_at: None,
                feed_id: feed.id,
            })
            .await
            .unwrap();

            let err = db
                .insert_post(NewPost {
                    title: "Same story, different feed",
                    url: "https://blog.example.com/post/1",
                    description: None,
                    published_at: None,
                    feed_id: other.id,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::Conflict(_)));
        }

        #[tokio::test]
        async fn test_posts_for_user_newest_first() {
            let db = create_test_db().await;
            let (user, feed) = seed_followed_feed(&db).await;

            for i in 1..=3 {
                db.insert_post(NewPost {
                    title: &format!("Post {i}"),
                    url: &format!("https://blog.example.com/post/{i}"),
                    description: None,
                    published_at: Some(ts(i * 100)),
                    feed_id: feed.id,
                })
                .await
                .unwrap();
            }

            let posts = db.posts_for_user(user.id, 10).await.unwrap();
            let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
            assert_eq!(titles, vec!["Post 3", "Post 2", "Post 1"]);
            assert_eq!(posts[0].feed_name, "Blog");
        }

        #[tokio::test]
        async fn test_posts_for_user_respects_limit() {
            let db = create_test_db().await;
            let (user, feed) = seed_followed_feed(&db).await;

            for i in 1..=5 {
                db.insert_post(NewPost {
                    title: &format!("Post {i}"),
                    url: &format!("https://blog.example.com/post/{i}"),
                    description: None,
                    published_at: Some(ts(i * 100)),
                    feed_id: feed.id,
                })
                .await
                .unwrap();
            }

            let posts = db.posts_for_user(user.id, 2).await.unwrap();
            assert_eq!(posts.len(), 2);
        }

        #[tokio::test]
        async fn test_posts_for_user_only_followed_feeds() {
            let db = create_test_db().await;
            let (user, feed) = seed_followed_feed(&db).await;
            let unfollowed = db
                .create_feed("Other", "https://other.example.com/rss", user.id)
                .await
                .unwrap();

            db.insert_post(NewPost {
                title: "Followed",
                url: "https://blog.example.com/post/1",
                description: None,
                published_at: None,
                feed_id: feed.id,
            })
            .await
            .unwrap();
            db.insert_post(NewPost {
                title: "Not followed",
                url: "https://other.example.com/post/1",
                description: None,
                published_at: None,
                feed_id: unfollowed.id,
            })
            .await
            .unwrap();

            let posts = db.posts_for_user(user.id, 10).await.unwrap();
            assert_eq!(posts.len(), 1);
            assert_eq!(posts[0].title, "Followed");
        }

        #[tokio::test]
        async fn test_undated_posts_sort_last() {
            let db = create_test_db().await;
            let (user, feed) = seed_followed_feed(&db).await;

            db.insert_post(NewPost {
                title: "Undated",
                url: "https://blog.example.com/post/undated",
                description: None,
                published_at: None,
                feed_id: feed.id,
            })
            .await
            .unwrap();
            db.insert_post(NewPost {
                title: "Dated",
                url: "https://blog.example.com/post/dated",
                description: None,
                published_at: Some(ts(100)),
                feed_id: feed.id,
            })
            .await
            .unwrap();

            let posts = db.posts_for_user(user.id, 10).await.unwrap();
            assert_eq!(posts[0].title, "Dated");
            assert_eq!(posts[1].title, "Undated");
        }
    }
}
