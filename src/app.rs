use std::sync::Arc;

use ratatui::{DefaultTerminal, crossterm::event::KeyEvent};

use crate::event::{AppEvent, EventHandler};
use crate::event_handler::EventProcessor;
use crate::models::{LogLine, SessionState};
use crate::services::CommentService;
use crate::views::{ViewHandler, log_list_view::LogListView};

/// Application.
pub struct App {
    /// Is the application running?
    pub running: bool,
    /// Event handler.
    pub events: EventHandler,
    /// System of record for comments.
    pub comment_service: Arc<dyn CommentService>,
    /// Viewer identity and the selected log line.
    pub session: SessionState,
    /// Lines of the opened log.
    pub log_lines: Arc<[LogLine]>,
    /// Current view stack.
    pub view_stack: Vec<Box<dyn ViewHandler>>,
}

impl App {
    /// Constructs a new instance of [`App`].
    pub fn new(
        comment_service: Arc<dyn CommentService>,
        session: SessionState,
        log_lines: Vec<LogLine>,
    ) -> Self {
        let log_lines: Arc<[LogLine]> = log_lines.into();
        Self {
            running: true,
            events: EventHandler::new(),
            comment_service,
            session,
            view_stack: vec![Box::new(LogListView::new(Arc::clone(&log_lines)))],
            log_lines,
        }
    }

    /// Run the application's main loop.
    pub async fn run(mut self, mut terminal: DefaultTerminal) -> color_eyre::Result<()> {
        while self.running {
            terminal.draw(|frame| frame.render_widget(&self, frame.area()))?;
            let event = self.events.next().await?;
            EventProcessor::process_event(&mut self, event).await?;
        }
        Ok(())
    }

    /// Handles the key events and updates the state of [`App`].
    /// Only the top view in the stack will handle the key events.
    pub fn handle_key_events(&mut self, key_event: &KeyEvent) -> color_eyre::Result<()> {
        // We need to avoid borrowing self twice, so we'll extract the view temporarily
        if let Some(mut current_view) = self.view_stack.pop() {
            let result = current_view.handle_key_events(self, key_event);
            self.view_stack.push(current_view);
            result?;
        }
        Ok(())
    }

    /// Forward an app event to every view on the stack.
    pub fn handle_app_events(&mut self, event: &AppEvent) {
        let mut views = std::mem::take(&mut self.view_stack);
        for view in views.iter_mut() {
            view.handle_app_events(self, event);
        }
        // Views pushed while handling the event land on top.
        views.append(&mut self.view_stack);
        self.view_stack = views;
    }

    pub fn find_line(&self, line_id: &str) -> Option<&LogLine> {
        self.log_lines.iter().find(|line| line.id == line_id)
    }

    /// Push a view onto the view stack.
    pub fn push_view(&mut self, view: Box<dyn ViewHandler>) {
        self.view_stack.push(view);
    }

    /// Pop the current view from the view stack. The bottom view is never popped.
    pub fn pop_view(&mut self) {
        if self.view_stack.len() > 1
            && let Some(mut view) = self.view_stack.pop()
        {
            view.unmount(self);
        }
    }

    /// Set running to false to quit the application.
    pub fn quit(&mut self) {
        self.running = false;
    }
}
