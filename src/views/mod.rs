#[cfg(test)]
use std::any::Any;

use ratatui::{
    buffer::Buffer,
    crossterm::event::KeyEvent,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
};

use crate::{app::App, event::AppEvent};

pub mod comment_view;
pub mod log_line_view;
pub mod log_list_view;

pub use comment_view::{CommentCard, CommentView, format_timestamp};
pub use log_line_view::LogLineView;
pub use log_list_view::LogListView;

const SELECTION_INDICATOR: &str = ">";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewType {
    LogList,
    LogLine,
}

pub trait ViewHandler {
    fn view_type(&self) -> ViewType;
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
    fn handle_key_events(&mut self, app: &mut App, key_event: &KeyEvent) -> color_eyre::Result<()>;
    /// Handle app events that this view is interested in
    fn handle_app_events(&mut self, app: &mut App, event: &AppEvent) {
        // Default implementation does nothing
        let _ = (app, event);
    }
    /// Called once when the view is popped from the stack.
    fn unmount(&mut self, app: &mut App) {
        let _ = app;
    }

    /// Get a debug representation of the view's state for testing purposes.
    /// This is only available in test builds.
    #[cfg(test)]
    fn debug_state(&self) -> String {
        format!("{:?}", self.view_type())
    }

    /// Downcast to Any for type-specific operations (only used for testing)
    #[cfg(test)]
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Downcast to Any for type-specific operations (only used for testing)
    #[cfg(test)]
    fn as_any(&self) -> &dyn Any;
}

/// Footer line listing `key: description` pairs.
pub fn key_hints(hints: &[(&str, &str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(hints.len() * 3);
    for (index, (key, description)) in hints.iter().enumerate() {
        if index > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(key.to_string(), Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(
            format!(" {description}"),
            Style::default().fg(Color::Gray),
        ));
    }
    Line::from(spans)
}
