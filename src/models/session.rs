use crate::models::LogLine;

/// Read-only application context consumed by the comment views: who is looking and at which line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    viewer_identity: Option<String>,
    selected_line: Option<LogLine>,
}

impl SessionState {
    pub fn new(viewer_identity: Option<String>) -> Self {
        Self {
            viewer_identity,
            selected_line: None,
        }
    }

    pub fn viewer_identity(&self) -> Option<&str> {
        self.viewer_identity.as_deref()
    }

    pub fn selected_line(&self) -> Option<&LogLine> {
        self.selected_line.as_ref()
    }

    pub fn select_line(&mut self, line: LogLine) {
        self.selected_line = Some(line);
    }

    pub fn clear_selection(&mut self) {
        self.selected_line = None;
    }
}
