use std::sync::Arc;

use futures::future::BoxFuture;

use crate::models::{Comment, LogType};

pub mod comment_service;

pub use comment_service::SqliteCommentService;

/// Loading state for the comments of a log line
#[derive(Debug, Clone)]
pub enum CommentsLoadingState {
    Init,
    Loading,
    Loaded(Arc<Vec<Comment>>),
    Error(Arc<str>),
}

/// Response of the comment service. The body is opaque and only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: String,
}

/// System of record for comments.
///
/// An update with empty `text` is a delete request.
pub trait CommentService: Send + Sync {
    fn update_comment<'a>(
        &'a self,
        line_id: &'a str,
        comment_id: &'a str,
        text: &'a str,
        log_type: LogType,
    ) -> BoxFuture<'a, color_eyre::Result<ServiceResponse>>;

    fn list_comments<'a>(&'a self, line_id: &'a str)
    -> BoxFuture<'a, color_eyre::Result<Vec<Comment>>>;
}
