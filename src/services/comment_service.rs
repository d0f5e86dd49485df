use color_eyre::eyre::eyre;
use futures::future::BoxFuture;

use crate::{
    database::Database,
    models::{Comment, LogType},
    services::{CommentService, ServiceResponse},
};

/// Comment service backed by the local SQLite store.
pub struct SqliteCommentService {
    database: Database,
}

impl SqliteCommentService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Store a new comment
    pub async fn post_comment(&self, comment: &Comment) -> color_eyre::Result<()> {
        comment.create(self.database.pool()).await?;
        log::info!(
            "Posted comment {} on {}",
            comment.id,
            comment.line_id.as_deref().unwrap_or("<detached>")
        );
        Ok(())
    }

    async fn handle_update(
        &self,
        line_id: &str,
        comment_id: &str,
        text: &str,
        log_type: LogType,
    ) -> color_eyre::Result<ServiceResponse> {
        let pool = self.database.pool();

        if text.is_empty() {
            if !Comment::delete(pool, line_id, comment_id, log_type).await? {
                return Err(eyre!("comment {comment_id} not found on {line_id}"));
            }
            return Ok(ServiceResponse {
                status: 200,
                body: format!("deleted {comment_id}"),
            });
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        if !Comment::update_text(pool, line_id, comment_id, log_type, text, timestamp).await? {
            return Err(eyre!("comment {comment_id} not found on {line_id}"));
        }
        Ok(ServiceResponse {
            status: 200,
            body: format!("updated {comment_id}"),
        })
    }
}

impl CommentService for SqliteCommentService {
    fn update_comment<'a>(
        &'a self,
        line_id: &'a str,
        comment_id: &'a str,
        text: &'a str,
        log_type: LogType,
    ) -> BoxFuture<'a, color_eyre::Result<ServiceResponse>> {
        Box::pin(self.handle_update(line_id, comment_id, text, log_type))
    }

    fn list_comments<'a>(
        &'a self,
        line_id: &'a str,
    ) -> BoxFuture<'a, color_eyre::Result<Vec<Comment>>> {
        Box::pin(Comment::find_for_line(self.database.pool(), line_id))
    }
}
