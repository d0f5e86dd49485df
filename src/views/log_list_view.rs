use std::sync::Arc;

use ratatui::{
    buffer::Buffer,
    crossterm::event::{KeyCode, KeyEvent, KeyModifiers},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Block, List, ListItem, ListState, Paragraph, StatefulWidget, Widget},
};

use crate::{
    app::App,
    event::AppEvent,
    models::LogLine,
    views::{SELECTION_INDICATOR, ViewHandler, ViewType, key_hints},
};

pub struct LogListView {
    lines: Arc<[LogLine]>,
    selected_line_index: Option<usize>,
}

impl ViewHandler for LogListView {
    fn view_type(&self) -> ViewType {
        ViewType::LogList
    }

    fn handle_key_events(&mut self, app: &mut App, key_event: &KeyEvent) -> color_eyre::Result<()> {
        match key_event.code {
            KeyCode::Char('q') => app.events.send(AppEvent::Quit),
            KeyCode::Char('c' | 'C') if key_event.modifiers == KeyModifiers::CONTROL => {
                app.events.send(AppEvent::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => self.select_next_line(),
            KeyCode::Char('k') | KeyCode::Up => self.select_previous_line(),
            KeyCode::Char('o') | KeyCode::Enter => self.open_selected_line(app),
            _ => {}
        }
        Ok(())
    }

    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        let viewer = app.session.viewer_identity().unwrap_or("anonymous");
        let header = Paragraph::new(format!("Viewing as {viewer}"))
            .block(Block::bordered().title("log-comments"))
            .fg(Color::Cyan);
        header.render(chunks[0], buf);

        if self.lines.is_empty() {
            Paragraph::new("No log lines - pass a LOG file to inspect")
                .block(Block::bordered().title("Log"))
                .fg(Color::Yellow)
                .render(chunks[1], buf);
        } else {
            let items: Vec<ListItem> = self
                .lines
                .iter()
                .enumerate()
                .map(|(index, line)| {
                    Self::render_line_item(line, Some(index) == self.selected_line_index)
                })
                .collect();
            let mut state = ListState::default().with_selected(self.selected_line_index);
            StatefulWidget::render(
                List::new(items)
                    .block(Block::bordered().title(format!("Log ({} lines)", self.lines.len())))
                    .style(Style::default().fg(Color::White)),
                chunks[1],
                buf,
                &mut state,
            );
        }

        key_hints(&[("j/k", "Move"), ("Enter", "Comments"), ("q", "Quit")])
            .render(chunks[2], buf);
    }

    #[cfg(test)]
    fn debug_state(&self) -> String {
        format!(
            "lines: {}, selected_line_index: {:?}",
            self.lines.len(),
            self.selected_line_index
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

impl LogListView {
    pub fn new(lines: Arc<[LogLine]>) -> Self {
        let selected_line_index = (!lines.is_empty()).then_some(0);
        Self {
            lines,
            selected_line_index,
        }
    }

    /// Move selection up (decrease index)
    pub fn select_previous_line(&mut self) {
        if self.lines.is_empty() {
            return;
        }

        match self.selected_line_index {
            None => self.selected_line_index = Some(0),
            Some(0) => {} // Already at top
            Some(index) => self.selected_line_index = Some(index - 1),
        }
    }

    /// Move selection down (increase index)
    pub fn select_next_line(&mut self) {
        if self.lines.is_empty() {
            return;
        }

        match self.selected_line_index {
            None => self.selected_line_index = Some(0),
            Some(index) if index >= self.lines.len() - 1 => {} // Already at bottom
            Some(index) => self.selected_line_index = Some(index + 1),
        }
    }

    pub fn open_selected_line(&self, app: &mut App) {
        if let Some(line) = self
            .selected_line_index
            .and_then(|index| self.lines.get(index))
        {
            app.events.send(AppEvent::LineOpen {
                line_id: Arc::from(line.id.as_str()),
            });
        }
    }

    fn render_line_item(line: &LogLine, is_selected: bool) -> ListItem<'_> {
        let style = if is_selected {
            Style::default().bg(Color::Blue).fg(Color::Black)
        } else {
            Style::default()
        };
        let prefix = if is_selected { SELECTION_INDICATOR } else { " " };
        ListItem::new(format!("{prefix} {:>4} {}", line.number, line.text)).style(style)
    }

    #[cfg(test)]
    pub fn selected_line_index(&self) -> Option<usize> {
        self.selected_line_index
    }
}
