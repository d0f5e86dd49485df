use std::sync::Arc;

use crate::app::App;
use crate::event::{AppEvent, Event, LineIdRef};
use crate::logging::COMMENT_TARGET;
use crate::services::CommentsLoadingState;
use crate::views::log_line_view::LogLineView;

pub struct EventProcessor;

impl EventProcessor {
    pub async fn process_event(app: &mut App, event: Arc<Event>) -> color_eyre::Result<()> {
        match &*event {
            Event::Tick => {}
            #[allow(clippy::single_match)]
            Event::Crossterm(event) => match event {
                crossterm::event::Event::Key(key_event) => app.handle_key_events(key_event)?,
                _ => {}
            },
            Event::App(app_event) => {
                log::info!("Processing event: {app_event:?}");
                app.handle_app_events(app_event);
                match app_event {
                    AppEvent::Quit => app.quit(),
                    AppEvent::ViewClose => Self::view_close(app),
                    AppEvent::LineOpen { line_id } => Self::line_open(app, line_id),
                    AppEvent::CommentsLoad { line_id } => {
                        Self::comments_load(app, Arc::clone(line_id)).await
                    }
                    AppEvent::CommentsLoadingState { .. }
                    | AppEvent::CommentSubmitResolved { .. }
                    | AppEvent::CommentPosted { .. } => {
                        // Handled by the views
                    }
                }
            }
        }
        Ok(())
    }

    fn view_close(app: &mut App) {
        app.pop_view();
        if app.view_stack.len() == 1 {
            app.session.clear_selection();
        }
    }

    /// Select the line and open its comment thread
    fn line_open(app: &mut App, line_id: &Arc<LineIdRef>) {
        let Some(line) = app.find_line(line_id).cloned() else {
            log::warn!(target: COMMENT_TARGET, "Cannot open unknown line {line_id}");
            return;
        };
        app.session.select_line(line);
        app.push_view(Box::new(LogLineView::new(Arc::clone(line_id))));
        app.events.send(AppEvent::CommentsLoad {
            line_id: Arc::clone(line_id),
        });
    }

    /// Load the comments of a line from the comment service
    async fn comments_load(app: &mut App, line_id: Arc<LineIdRef>) {
        app.events.send(AppEvent::CommentsLoadingState {
            line_id: Arc::clone(&line_id),
            state: CommentsLoadingState::Loading,
        });
        let state = match app.comment_service.list_comments(&line_id).await {
            Ok(comments) => CommentsLoadingState::Loaded(Arc::new(comments)),
            Err(error) => {
                log::error!(target: COMMENT_TARGET, "Failed to load comments for {line_id}: {error:?}");
                CommentsLoadingState::Error(error.to_string().into())
            }
        };
        app.events
            .send(AppEvent::CommentsLoadingState { line_id, state });
    }
}
