use std::sync::Arc;

use ratatui::{
    buffer::Buffer,
    crossterm::event::{KeyCode, KeyEvent},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

use crate::{
    app::App,
    controller::SubmitTicket,
    event::{AppEvent, LineIdRef},
    logging::COMMENT_TARGET,
    models::Comment,
    services::{CommentsLoadingState, ServiceResponse},
    views::{ViewHandler, ViewType, comment_view::CommentView, key_hints},
};

/// The comment thread of one log line.
///
/// Comment views are kept per slot and rebound when the thread reloads, so a slot can go on to
/// show a different comment than the one it was mounted with.
pub struct LogLineView {
    line_id: Arc<LineIdRef>,
    loading_state: CommentsLoadingState,
    comments: Vec<CommentView>,
    selected_index: usize,
}

impl LogLineView {
    pub fn new(line_id: Arc<LineIdRef>) -> Self {
        Self {
            line_id,
            loading_state: CommentsLoadingState::Init,
            comments: Vec::new(),
            selected_index: 0,
        }
    }

    fn selected_comment_mut(&mut self) -> Option<&mut CommentView> {
        self.comments.get_mut(self.selected_index)
    }

    fn is_editing(&self) -> bool {
        self.comments
            .get(self.selected_index)
            .is_some_and(CommentView::is_editing)
    }

    fn select_next(&mut self) {
        if self.selected_index + 1 < self.comments.len() {
            self.selected_index += 1;
        }
    }

    fn select_previous(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    fn request_reload(&self, app: &mut App) {
        app.events.send(AppEvent::CommentsLoad {
            line_id: Arc::clone(&self.line_id),
        });
    }

    fn handle_comments_loading_state(&mut self, app: &App, state: &CommentsLoadingState) {
        self.loading_state = state.clone();
        if let CommentsLoadingState::Loaded(comments) = state {
            self.reconcile(app, comments);
        }
    }

    /// Bind slot `i` to the `i`th loaded comment, mounting and unmounting views as the thread
    /// grows or shrinks.
    fn reconcile(&mut self, app: &App, comments: &[Comment]) {
        for (index, comment) in comments.iter().enumerate() {
            match self.comments.get_mut(index) {
                Some(view) => view.rebind(comment.clone()),
                None => self.comments.push(CommentView::new(
                    comment.clone(),
                    app.session.viewer_identity().map(str::to_string),
                    Arc::clone(&self.line_id),
                    app.events.sender(),
                )),
            }
        }
        if self.comments.len() > comments.len() {
            for view in self.comments.drain(comments.len()..) {
                view.unmount();
            }
        }
        self.selected_index = self
            .selected_index
            .min(self.comments.len().saturating_sub(1));
    }

    fn route_submit_resolution(
        &mut self,
        ticket: &SubmitTicket,
        result: &Result<ServiceResponse, Arc<str>>,
    ) {
        match self
            .comments
            .iter_mut()
            .find(|view| view.controller().is_awaiting(ticket))
        {
            Some(view) => view.resolve_submit(ticket, result),
            None => log::warn!(
                target: COMMENT_TARGET,
                "Discarding submit resolution for comment {}, its session is gone",
                ticket.comment_id
            ),
        }
    }

    fn render_comments(&self, area: Rect, buf: &mut Buffer) {
        let message = match &self.loading_state {
            CommentsLoadingState::Init | CommentsLoadingState::Loading => {
                Some(("Loading comments...".to_string(), Color::Yellow))
            }
            CommentsLoadingState::Error(error) => {
                Some((format!("Error loading comments: {error}"), Color::Red))
            }
            CommentsLoadingState::Loaded(_) if self.comments.is_empty() => {
                Some(("No comments on this line".to_string(), Color::Gray))
            }
            CommentsLoadingState::Loaded(_) => None,
        };
        if let Some((message, color)) = message {
            Paragraph::new(message)
                .style(Style::default().fg(color))
                .render(area, buf);
            return;
        }

        // Scroll just far enough for the selected comment to be fully visible.
        let mut first_visible = self.selected_index;
        let mut used = self.comments[self.selected_index].height();
        while first_visible > 0 {
            let previous = self.comments[first_visible - 1].height();
            if used.saturating_add(previous) > area.height {
                break;
            }
            used += previous;
            first_visible -= 1;
        }

        let mut y = area.y;
        for (index, view) in self.comments.iter().enumerate().skip(first_visible) {
            let bottom = area.y + area.height;
            if y >= bottom {
                break;
            }
            let height = view.height().min(bottom - y);
            let slot = Rect {
                x: area.x,
                y,
                width: area.width,
                height,
            };
            view.render(slot, buf, index == self.selected_index);
            y += height;
        }
    }

    #[cfg(test)]
    pub fn comment_views(&self) -> &[CommentView] {
        &self.comments
    }
}

impl ViewHandler for LogLineView {
    fn view_type(&self) -> ViewType {
        ViewType::LogLine
    }

    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .title(format!(" Comments for {} ", self.line_id))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue))
            .style(Style::default().bg(Color::Black));
        let inner_area = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Log line
                Constraint::Min(1),    // Comments
                Constraint::Length(1), // Key hints
            ])
            .split(inner_area);

        let line_text = app
            .find_line(&self.line_id)
            .map(|line| line.text.as_str())
            .unwrap_or_default();
        Paragraph::new(line_text)
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title(" Log line ")
                    .border_style(Style::default().fg(Color::Gray)),
            )
            .style(Style::default().fg(Color::White))
            .render(layout[0], buf);

        self.render_comments(layout[1], buf);

        let hints = match self.comments.get(self.selected_index) {
            Some(view) if view.is_editing() => key_hints(&[
                ("Ctrl+S", view.controller().submit_label()),
                ("Enter", "Newline"),
                ("Esc", "Cancel"),
            ]),
            Some(view) if view.controller().edit_affordance().is_some() => key_hints(&[
                ("j/k", "Move"),
                ("e", "Edit"),
                ("r", "Reload"),
                ("Esc", "Close"),
            ]),
            _ => key_hints(&[("j/k", "Move"), ("r", "Reload"), ("Esc", "Close")]),
        };
        hints.render(layout[2], buf);
    }

    fn handle_key_events(&mut self, app: &mut App, key_event: &KeyEvent) -> color_eyre::Result<()> {
        if self.is_editing() {
            if let Some(view) = self.selected_comment_mut() {
                view.handle_edit_key(app, key_event);
            }
            return Ok(());
        }

        match key_event.code {
            KeyCode::Esc | KeyCode::Char('q') => app.events.send(AppEvent::ViewClose),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Enter | KeyCode::Char('e') => {
                if let Some(view) = self.selected_comment_mut() {
                    view.edit();
                }
            }
            KeyCode::Char('r') => self.request_reload(app),
            _ => {}
        }
        Ok(())
    }

    fn handle_app_events(&mut self, app: &mut App, event: &AppEvent) {
        match event {
            AppEvent::CommentsLoadingState { line_id, state } if *line_id == self.line_id => {
                self.handle_comments_loading_state(app, state);
            }
            AppEvent::CommentSubmitResolved { ticket, result } => {
                self.route_submit_resolution(ticket, result);
            }
            AppEvent::CommentPosted { line_id } if *line_id == self.line_id => {
                self.request_reload(app);
            }
            _ => {
                // Other events are not handled by this view
            }
        }
    }

    fn unmount(&mut self, _app: &mut App) {
        for view in self.comments.drain(..) {
            view.unmount();
        }
    }

    #[cfg(test)]
    fn debug_state(&self) -> String {
        format!(
            "line_id: {}, loading_state: {}, comments: {}, selected_index: {}",
            self.line_id,
            match &self.loading_state {
                CommentsLoadingState::Init => "Init".to_string(),
                CommentsLoadingState::Loading => "Loading".to_string(),
                CommentsLoadingState::Loaded(comments) => format!("Loaded({})", comments.len()),
                CommentsLoadingState::Error(error) => format!("Error({error})"),
            },
            self.comments.len(),
            self.selected_index
        )
    }

    #[cfg(test)]
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    #[cfg(test)]
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
