use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

use crate::app::App;

impl Widget for &App {
    /// Renders the view stack bottom to top. The log-line thread clears what it covers, so only
    /// the log list shows through when no thread is open.
    fn render(self, area: Rect, buf: &mut Buffer) {
        for view in self.view_stack.iter() {
            view.render(self, area, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::models::Comment;
    use crate::services::CommentsLoadingState;
    use crate::test_utils::{
        ScriptedCommentService, buffer_text, render_app_to_terminal_backend, test_app,
    };
    use crate::views::LogLineView;
    use crate::views::ViewHandler;
    use crate::event::AppEvent;

    #[tokio::test]
    async fn test_thread_covers_log_list() {
        let mut app = test_app(ScriptedCommentService::new(), Some("alice"));
        let mut thread = LogLineView::new("app.log:2".into());
        thread.handle_app_events(
            &mut app,
            &AppEvent::CommentsLoadingState {
                line_id: "app.log:2".into(),
                state: CommentsLoadingState::Loaded(Arc::new(vec![Comment::test_comment(
                    "c1",
                    Some("alice"),
                    "looks slow",
                )])),
            },
        );
        app.push_view(Box::new(thread));

        let text = buffer_text(&render_app_to_terminal_backend(app));

        assert!(text.contains("Comments for app.log:2"));
        assert!(text.contains("[warn] slow response"));
        assert!(text.contains("looks slow"));
        assert!(!text.contains("Viewing as alice"));
    }
}
