#[cfg(test)]
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

#[cfg(test)]
use crate::{
    app::App,
    event::EventHandler,
    models::{Comment, LogLine, LogType, SessionState},
    services::{CommentService, ServiceResponse},
};
#[cfg(test)]
use futures::future::BoxFuture;
#[cfg(test)]
use ratatui::{Terminal, backend::TestBackend};

#[cfg(test)]
/// Usage:
/// assert_snapshot!(render_app_to_terminal_backend(app))
pub fn render_app_to_terminal_backend(app: App) -> TestBackend {
    let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
    terminal
        .draw(|buffer| buffer.render_widget(&app, buffer.area()))
        .unwrap();
    terminal.backend().clone()
}

#[cfg(test)]
/// Usage:
/// assert_snapshot!(render_view_to_terminal_backend(&app, |app, area, buf| {
///     view.render(app, area, buf);
/// }));
pub fn render_view_to_terminal_backend<F>(app: &App, render_fn: F) -> TestBackend
where
    F: FnOnce(&App, ratatui::layout::Rect, &mut ratatui::buffer::Buffer),
{
    let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
    terminal
        .draw(|frame| {
            render_fn(app, frame.area(), frame.buffer_mut());
        })
        .unwrap();
    terminal.backend().clone()
}

#[cfg(test)]
/// The rendered buffer as plain text, one row per line.
pub fn buffer_text(backend: &TestBackend) -> String {
    let buffer = backend.buffer();
    (0..buffer.area.height)
        .map(|y| {
            (0..buffer.area.width)
                .map(|x| buffer[(x, y)].symbol())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
pub fn test_line() -> LogLine {
    LogLine {
        id: "app.log:1".to_string(),
        number: 1,
        text: "[info] service started".to_string(),
        log_type: LogType::Webapp,
    }
}

#[cfg(test)]
pub fn test_log_lines() -> Vec<LogLine> {
    LogLine::parse(
        "app.log",
        "[info] service started\n[warn] slow response\n[error] request failed",
        LogType::Webapp,
    )
}

#[cfg(test)]
/// An [`App`] over three log lines that does not read the terminal.
pub fn test_app(service: ScriptedCommentService, viewer: Option<&str>) -> App {
    let log_lines: Arc<[LogLine]> = test_log_lines().into();
    App {
        running: true,
        events: EventHandler::new_for_test(),
        comment_service: Arc::new(service),
        session: SessionState::new(viewer.map(str::to_string)),
        view_stack: vec![Box::new(crate::views::LogListView::new(Arc::clone(
            &log_lines,
        )))],
        log_lines,
    }
}

#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub line_id: String,
    pub comment_id: String,
    pub text: String,
    pub log_type: LogType,
}

#[cfg(test)]
#[derive(Default)]
struct ScriptedState {
    update_results: VecDeque<color_eyre::Result<ServiceResponse>>,
    update_calls: Vec<UpdateCall>,
    comments: HashMap<String, Vec<Comment>>,
    list_error: Option<String>,
}

#[cfg(test)]
/// Comment service double that records updates and answers with queued results.
///
/// Updates without a queued result succeed with `200 ok`.
#[derive(Clone, Default)]
pub struct ScriptedCommentService {
    state: Arc<Mutex<ScriptedState>>,
}

#[cfg(test)]
impl ScriptedCommentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_update_result(&self, result: color_eyre::Result<ServiceResponse>) {
        self.state.lock().unwrap().update_results.push_back(result);
    }

    pub fn update_calls(&self) -> Vec<UpdateCall> {
        self.state.lock().unwrap().update_calls.clone()
    }

    pub fn set_comments(&self, line_id: &str, comments: Vec<Comment>) {
        self.state
            .lock()
            .unwrap()
            .comments
            .insert(line_id.to_string(), comments);
    }

    pub fn fail_listing(&self, error: color_eyre::Report) {
        self.state.lock().unwrap().list_error = Some(error.to_string());
    }
}

#[cfg(test)]
impl CommentService for ScriptedCommentService {
    fn update_comment<'a>(
        &'a self,
        line_id: &'a str,
        comment_id: &'a str,
        text: &'a str,
        log_type: LogType,
    ) -> BoxFuture<'a, color_eyre::Result<ServiceResponse>> {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.update_calls.push(UpdateCall {
                line_id: line_id.to_string(),
                comment_id: comment_id.to_string(),
                text: text.to_string(),
                log_type,
            });
            state.update_results.pop_front().unwrap_or_else(|| {
                Ok(ServiceResponse {
                    status: 200,
                    body: "ok".to_string(),
                })
            })
        };
        Box::pin(async move { result })
    }

    fn list_comments<'a>(
        &'a self,
        line_id: &'a str,
    ) -> BoxFuture<'a, color_eyre::Result<Vec<Comment>>> {
        let result = {
            let state = self.state.lock().unwrap();
            match &state.list_error {
                Some(message) => Err(color_eyre::eyre::eyre!("{message}")),
                None => Ok(state.comments.get(line_id).cloned().unwrap_or_default()),
            }
        };
        Box::pin(async move { result })
    }
}
