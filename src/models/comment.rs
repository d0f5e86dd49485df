use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::{LineId, LogType};

pub type CommentId = String;

/// A posted comment as supplied by the comment store.
///
/// The record is never mutated by the views; edits go through the comment service and come back
/// as a fresh record on the next load.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Comment {
    pub id: CommentId,
    /// Log line the comment is attached to. `None` for comments that lost their line.
    pub line_id: Option<LineId>,
    pub log_type: String,
    pub author_name: String,
    /// Identity token of the author, compared against the viewer's identity.
    pub author_identity: Option<String>,
    pub avatar_url: String,
    /// Markdown source of the comment.
    pub text: String,
    /// Creation or last edit time in epoch milliseconds.
    pub timestamp: i64,
}

impl Comment {
    pub fn new(
        line_id: &str,
        log_type: LogType,
        author_identity: &str,
        author_name: &str,
        avatar_url: &str,
        text: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            line_id: Some(line_id.to_string()),
            log_type: log_type.as_str().to_string(),
            author_name: author_name.to_string(),
            author_identity: Some(author_identity.to_string()),
            avatar_url: avatar_url.to_string(),
            text: text.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Whether `viewer_identity` is the author of this comment.
    ///
    /// An anonymous viewer or a comment without an author token never matches.
    pub fn is_authored_by(&self, viewer_identity: Option<&str>) -> bool {
        match (self.author_identity.as_deref(), viewer_identity) {
            (Some(author), Some(viewer)) => author == viewer,
            _ => false,
        }
    }

    pub async fn create_table(pool: &SqlitePool) -> color_eyre::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY NOT NULL,
                line_id TEXT,
                log_type TEXT NOT NULL,
                author_name TEXT NOT NULL,
                author_identity TEXT,
                avatar_url TEXT NOT NULL,
                text TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS comments_line_id ON comments (line_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Insert the comment into the database
    pub async fn create(&self, pool: &SqlitePool) -> color_eyre::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, line_id, log_type, author_name, author_identity, avatar_url, text, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&self.id)
        .bind(&self.line_id)
        .bind(&self.log_type)
        .bind(&self.author_name)
        .bind(&self.author_identity)
        .bind(&self.avatar_url)
        .bind(&self.text)
        .bind(self.timestamp)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Find all comments for a log line, oldest first
    pub async fn find_for_line(
        pool: &SqlitePool,
        line_id: &str,
    ) -> color_eyre::Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, line_id, log_type, author_name, author_identity, avatar_url, text, timestamp
            FROM comments
            WHERE line_id = ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(line_id)
        .fetch_all(pool)
        .await?;

        Ok(comments)
    }

    /// Rewrite the text of a comment. Returns whether a row matched.
    pub async fn update_text(
        pool: &SqlitePool,
        line_id: &str,
        comment_id: &str,
        log_type: LogType,
        text: &str,
        timestamp: i64,
    ) -> color_eyre::Result<bool> {
        let result = sqlx::query(
            "UPDATE comments SET text = ?, timestamp = ? WHERE id = ? AND line_id = ? AND log_type = ?",
        )
        .bind(text)
        .bind(timestamp)
        .bind(comment_id)
        .bind(line_id)
        .bind(log_type.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a comment. Returns whether a row matched.
    pub async fn delete(
        pool: &SqlitePool,
        line_id: &str,
        comment_id: &str,
        log_type: LogType,
    ) -> color_eyre::Result<bool> {
        let result =
            sqlx::query("DELETE FROM comments WHERE id = ? AND line_id = ? AND log_type = ?")
                .bind(comment_id)
                .bind(line_id)
                .bind(log_type.as_str())
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    #[cfg(test)]
    pub fn test_comment(id: &str, author_identity: Option<&str>, text: &str) -> Self {
        Self {
            id: id.to_string(),
            line_id: Some("app.log:1".to_string()),
            log_type: LogType::Webapp.as_str().to_string(),
            author_name: "Alice".to_string(),
            author_identity: author_identity.map(str::to_string),
            avatar_url: "https://example.com/alice.png".to_string(),
            text: text.to_string(),
            timestamp: 1_735_689_600_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        Comment::create_table(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_comment_creation() {
        let comment = Comment::new("app.log:7", LogType::Browser, "U1", "Alice", "", "hi");

        assert_eq!(comment.line_id.as_deref(), Some("app.log:7"));
        assert_eq!(comment.log_type, "browser");
        assert_eq!(comment.author_identity.as_deref(), Some("U1"));
        assert_eq!(comment.text, "hi");
        assert!(!comment.id.is_empty());
    }

    #[test]
    fn test_is_authored_by() {
        let comment = Comment::test_comment("c1", Some("U1"), "hello");
        assert!(comment.is_authored_by(Some("U1")));
        assert!(!comment.is_authored_by(Some("U2")));
        assert!(!comment.is_authored_by(None));

        let anonymous = Comment::test_comment("c2", None, "hello");
        assert!(!anonymous.is_authored_by(None));
        assert!(!anonymous.is_authored_by(Some("U1")));
    }

    #[tokio::test]
    async fn test_comment_crud_operations() {
        let pool = create_test_pool().await;

        let mut first = Comment::test_comment("c1", Some("U1"), "first");
        first.timestamp = 10;
        let mut second = Comment::test_comment("c2", Some("U2"), "second");
        second.timestamp = 5;
        first.create(&pool).await.unwrap();
        second.create(&pool).await.unwrap();

        let comments = Comment::find_for_line(&pool, "app.log:1").await.unwrap();
        assert_eq!(comments, vec![second.clone(), first.clone()]);

        let updated = Comment::update_text(&pool, "app.log:1", "c1", LogType::Webapp, "edited", 20)
            .await
            .unwrap();
        assert!(updated);
        let comments = Comment::find_for_line(&pool, "app.log:1").await.unwrap();
        assert_eq!(comments[1].text, "edited");
        assert_eq!(comments[1].timestamp, 20);

        let deleted = Comment::delete(&pool, "app.log:1", "c2", LogType::Webapp)
            .await
            .unwrap();
        assert!(deleted);
        let comments = Comment::find_for_line(&pool, "app.log:1").await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "c1");
    }

    #[tokio::test]
    async fn test_update_requires_matching_line_and_log_type() {
        let pool = create_test_pool().await;
        Comment::test_comment("c1", Some("U1"), "first")
            .create(&pool)
            .await
            .unwrap();

        let wrong_line = Comment::update_text(&pool, "app.log:2", "c1", LogType::Webapp, "x", 1)
            .await
            .unwrap();
        assert!(!wrong_line);

        let wrong_type = Comment::delete(&pool, "app.log:1", "c1", LogType::Mobile)
            .await
            .unwrap();
        assert!(!wrong_type);
    }
}
