use std::{fmt::Display, fmt::Write as _, sync::Arc};

use chrono::{Local, TimeZone};
use color_eyre::eyre::eyre;
use ratatui::{
    buffer::Buffer,
    crossterm::event::{KeyCode, KeyEvent, KeyModifiers},
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget, Wrap},
};

use crate::{
    app::App,
    controller::{CommentEditController, EditAffordance, EditMode, SubmitTicket},
    event::{AppEvent, EventSender, LineIdRef},
    logging::COMMENT_TARGET,
    markup::{
        SafeHtml, render_to_lines, render_to_markup,
        sanitize::{escape_attribute, escape_text},
    },
    models::Comment,
    services::ServiceResponse,
};

const TIMESTAMP_FORMAT: &str = "%B %-d, %Y, %-I:%M:%S %p";

/// Format epoch millis as `Month Day, Year, H:MM:SS AM/PM` in `tz`.
///
/// Millis outside the representable range format as an empty string.
pub fn format_timestamp<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    tz.timestamp_millis_opt(millis)
        .single()
        .map(|time| time.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// [`format_timestamp`] in the viewer's local timezone.
pub fn format_local_timestamp(millis: i64) -> String {
    format_timestamp(millis, &Local)
}

/// Read-mode view model of a comment for HTML hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentCard {
    pub author_name: String,
    pub timestamp: String,
    pub avatar_url: String,
    pub body: SafeHtml,
    /// Present only when the viewer wrote the comment.
    pub edit: Option<EditAffordance>,
}

impl CommentCard {
    pub fn from_controller<Tz: TimeZone>(controller: &CommentEditController, tz: &Tz) -> Self
    where
        Tz::Offset: Display,
    {
        let comment = controller.comment();
        Self {
            author_name: comment.author_name.clone(),
            timestamp: format_timestamp(comment.timestamp, tz),
            avatar_url: comment.avatar_url.clone(),
            body: render_to_markup(&comment.text),
            edit: controller.edit_affordance(),
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"Comment\">");
        match avatar_style(&self.avatar_url) {
            Some(style) => {
                out.push_str("<div class=\"Avatar\" style=\"");
                escape_attribute(&style, &mut out);
                out.push_str("\"></div>");
            }
            None => out.push_str("<div class=\"Avatar\"></div>"),
        }
        out.push_str("<div class=\"Text\"><div><span class=\"Name\">");
        escape_text(&self.author_name, &mut out);
        out.push_str("</span><span class=\"Timestamp\">");
        escape_text(&self.timestamp, &mut out);
        out.push_str("</span></div><div class=\"Body\">");
        out.push_str(self.body.as_str());
        out.push_str("</div>");
        if self.edit.is_some() {
            out.push_str("<a class=\"Edit\" href=\"#edit\">Edit</a>");
        }
        out.push_str("</div></div>");
        out
    }
}

/// CSS background for an http(s) avatar. Other schemes get no avatar.
fn avatar_style(url: &str) -> Option<String> {
    let lower = url.trim().to_ascii_lowercase();
    if !(lower.starts_with("https://") || lower.starts_with("http://")) {
        return None;
    }
    let mut encoded = String::with_capacity(url.len());
    for c in url.trim().chars() {
        match c {
            '"' | '\'' | '(' | ')' | '\\' | '<' | '>' => {
                let _ = write!(encoded, "%{:02X}", c as u32);
            }
            c if c.is_whitespace() || c.is_control() => {
                for byte in c.encode_utf8(&mut [0; 4]).bytes() {
                    let _ = write!(encoded, "%{byte:02X}");
                }
            }
            c => encoded.push(c),
        }
    }
    Some(format!("background-image: url(\"{encoded}\")"))
}

/// One comment of a log line in the terminal: a card in view mode, a form in edit mode.
pub struct CommentView {
    controller: CommentEditController,
    body: Vec<Line<'static>>,
    last_error: Option<String>,
}

impl CommentView {
    /// Mount a view for `comment`. Every successful submit tells the thread of `line_id` to reload.
    pub fn new(
        comment: Comment,
        viewer_identity: Option<String>,
        line_id: Arc<LineIdRef>,
        events: EventSender,
    ) -> Self {
        let body = render_to_lines(&comment.text);
        let controller = CommentEditController::mount(comment, viewer_identity, move || {
            events.send(AppEvent::CommentPosted {
                line_id: Arc::clone(&line_id),
            })
        });
        Self {
            controller,
            body,
            last_error: None,
        }
    }

    pub fn controller(&self) -> &CommentEditController {
        &self.controller
    }

    pub fn is_editing(&self) -> bool {
        self.controller.mode() == EditMode::Editing
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Show the comment the thread now has in this slot.
    pub fn rebind(&mut self, comment: Comment) {
        if comment.id != self.controller.comment().id {
            self.last_error = None;
        }
        if comment.text != self.controller.comment().text {
            self.body = render_to_lines(&comment.text);
        }
        self.controller.rebind(comment);
    }

    pub fn unmount(self) {
        self.controller.unmount();
    }

    /// Enter edit mode if the viewer may edit. Returns whether the mode changed.
    pub fn edit(&mut self) -> bool {
        let Some(affordance) = self.controller.edit_affordance() else {
            return false;
        };
        self.last_error = None;
        self.controller.enter_edit(affordance)
    }

    pub fn handle_edit_key(&mut self, app: &mut App, key_event: &KeyEvent) {
        match key_event.code {
            KeyCode::Esc => {
                self.controller.cancel_edit();
                self.last_error = None;
            }
            KeyCode::Char('s' | 'S') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.submit(app)
            }
            KeyCode::Enter => self.push_draft('\n'),
            KeyCode::Backspace => {
                let mut draft = self.controller.draft_text().to_string();
                draft.pop();
                self.controller.update_draft(draft);
            }
            KeyCode::Char(c)
                if !key_event
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.push_draft(c)
            }
            _ => {}
        }
    }

    fn push_draft(&mut self, c: char) {
        let mut draft = self.controller.draft_text().to_string();
        draft.push(c);
        self.controller.update_draft(draft);
    }

    /// Send the draft to the comment service. The answer comes back as
    /// [`AppEvent::CommentSubmitResolved`].
    pub fn submit(&mut self, app: &mut App) {
        let Some(request) = self.controller.begin_submit(app.session.selected_line()) else {
            return;
        };
        self.last_error = None;
        let service = Arc::clone(&app.comment_service);
        let events = app.events.sender();
        tokio::spawn(async move {
            let result = request
                .dispatch(service.as_ref())
                .await
                .map_err(|error| Arc::<str>::from(format!("{error:#}")));
            events.send(AppEvent::CommentSubmitResolved {
                ticket: request.ticket,
                result,
            });
        });
    }

    pub fn resolve_submit(
        &mut self,
        ticket: &SubmitTicket,
        result: &Result<ServiceResponse, Arc<str>>,
    ) {
        let result = result.clone().map_err(|message| eyre!("{message}"));
        if let Err(error) = self.controller.finish_submit(ticket, result) {
            log::error!(target: COMMENT_TARGET, "{error:#}");
            self.last_error = Some(format!("{error:#}"));
        }
    }

    /// Rows needed to draw the view, borders included.
    pub fn height(&self) -> u16 {
        let inner = match self.controller.mode() {
            EditMode::Viewing => self.body.len().max(1),
            EditMode::Editing => {
                let draft_lines = self.controller.draft_text().split('\n').count();
                draft_lines + 1 + usize::from(self.last_error.is_some())
            }
        };
        u16::try_from(inner + 2).unwrap_or(u16::MAX)
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, is_selected: bool) {
        match self.controller.mode() {
            EditMode::Viewing => self.render_card(area, buf, is_selected),
            EditMode::Editing => self.render_edit_form(area, buf),
        }
    }

    fn render_card(&self, area: Rect, buf: &mut Buffer, is_selected: bool) {
        let comment = self.controller.comment();
        let border_color = if is_selected { Color::Blue } else { Color::Gray };
        let mut block = Block::bordered()
            .border_style(Style::default().fg(border_color))
            .title(Line::from(vec![
                Span::styled(
                    format!(" {} ", comment.author_name),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("{} ", format_local_timestamp(comment.timestamp)),
                    Style::default().fg(Color::Yellow),
                ),
            ]));
        if self.controller.edit_affordance().is_some() {
            block = block.title_bottom(Line::from(" e: Edit ").right_aligned());
        }

        let body = if self.body.is_empty() {
            vec![Line::styled("(empty)", Style::default().fg(Color::DarkGray))]
        } else {
            self.body.clone()
        };
        Paragraph::new(body).block(block).render(area, buf);
    }

    fn render_edit_form(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered()
            .title(" Editing comment ")
            .border_style(Style::default().fg(Color::Yellow));

        let mut lines: Vec<Line> = self
            .controller
            .draft_text()
            .split('\n')
            .map(|line| Line::raw(line.to_string()))
            .collect();
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled("▏", Style::default().fg(Color::Yellow)));
        }

        let status = if self.controller.is_submitting() {
            Line::styled("Posting...", Style::default().fg(Color::Yellow))
        } else {
            Line::from(vec![
                Span::styled("Ctrl+S", Style::default().fg(Color::Cyan)),
                Span::styled(
                    format!(" {}  ", self.controller.submit_label()),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled("Esc", Style::default().fg(Color::Cyan)),
                Span::styled(" Cancel", Style::default().fg(Color::Gray)),
            ])
        };
        lines.push(status);
        if let Some(error) = &self.last_error {
            lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
        }

        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::test_utils::{
        ScriptedCommentService, buffer_text, render_view_to_terminal_backend, test_app, test_line,
    };
    use chrono::{FixedOffset, Utc};
    use insta::assert_snapshot;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::empty())
    }

    fn ctrl_s() -> KeyEvent {
        KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)
    }

    fn view_for(app: &App, comment: Comment) -> CommentView {
        CommentView::new(
            comment,
            app.session.viewer_identity().map(str::to_string),
            "app.log:1".into(),
            app.events.sender(),
        )
    }

    fn card_for(comment: Comment, viewer: Option<&str>) -> CommentCard {
        let controller = CommentEditController::mount(comment, viewer.map(str::to_string), || {});
        CommentCard::from_controller(&controller, &Utc)
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(1_735_689_600_000, &Utc),
            "January 1, 2025, 12:00:00 AM"
        );
        assert_eq!(
            format_timestamp(1_735_734_245_000, &Utc),
            "January 1, 2025, 12:24:05 PM"
        );
        let berlin = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            format_timestamp(1_735_689_600_000, &berlin),
            "January 1, 2025, 2:00:00 AM"
        );
        assert_eq!(format_timestamp(i64::MAX, &Utc), "");
    }

    #[test]
    fn test_card_html_for_author() {
        let card = card_for(
            Comment::test_comment("c1", Some("alice"), "hello **world**"),
            Some("alice"),
        );

        assert_snapshot!(
            card.to_html(),
            @r##"<div class="Comment"><div class="Avatar" style="background-image: url(&quot;https://example.com/alice.png&quot;)"></div><div class="Text"><div><span class="Name">Alice</span><span class="Timestamp">January 1, 2025, 12:00:00 AM</span></div><div class="Body"><p>hello <strong>world</strong></p></div><a class="Edit" href="#edit">Edit</a></div></div>"##
        );
    }

    #[test]
    fn test_card_html_without_authorship_has_no_edit_link() {
        let card = card_for(Comment::test_comment("c1", Some("alice"), "hi"), Some("bob"));

        assert!(card.edit.is_none());
        assert!(!card.to_html().contains("Edit"));
    }

    #[test]
    fn test_card_html_escapes_metadata() {
        let mut comment = Comment::test_comment("c1", None, "hi");
        comment.author_name = "<b>Mallory</b>".to_string();
        comment.avatar_url = "https://example.com/a.png\"); background: url(evil".to_string();
        let html = card_for(comment.clone(), None).to_html();

        assert!(html.contains("&lt;b&gt;Mallory&lt;/b&gt;"));
        assert!(html.contains("a.png%22%29;%20background:%20url%28evil"));

        comment.avatar_url = "javascript:alert(1)".to_string();
        let html = card_for(comment, None).to_html();
        assert!(html.contains("<div class=\"Avatar\"></div>"));
        assert!(!html.contains("javascript"));
    }

    #[tokio::test]
    async fn test_edit_requires_authorship() {
        let app = test_app(ScriptedCommentService::new(), Some("bob"));
        let mut view = view_for(&app, Comment::test_comment("c1", Some("alice"), "hi"));

        assert!(!view.edit());
        assert!(!view.is_editing());
    }

    #[tokio::test]
    async fn test_modified_keys_do_not_edit_draft() {
        let mut app = test_app(ScriptedCommentService::new(), Some("alice"));
        let mut view = view_for(&app, Comment::test_comment("c1", Some("alice"), "hi"));
        assert!(view.edit());

        view.handle_edit_key(&mut app, &KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        view.handle_edit_key(&mut app, &KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT));
        assert_eq!(view.controller().draft_text(), "hi");

        view.handle_edit_key(&mut app, &KeyEvent::new(KeyCode::Char('X'), KeyModifiers::SHIFT));
        assert_eq!(view.controller().draft_text(), "hiX");
    }

    #[tokio::test]
    async fn test_typing_updates_draft() {
        let mut app = test_app(ScriptedCommentService::new(), Some("alice"));
        let mut view = view_for(&app, Comment::test_comment("c1", Some("alice"), "hi"));
        assert!(view.edit());

        for code in [
            KeyCode::Char('!'),
            KeyCode::Enter,
            KeyCode::Char('x'),
            KeyCode::Backspace,
            KeyCode::Char('y'),
        ] {
            view.handle_edit_key(&mut app, &key(code));
        }

        assert_eq!(view.controller().draft_text(), "hi!\ny");
        assert_eq!(view.height(), 5);
        assert!(!app.events.has_pending_events());
    }

    #[tokio::test]
    async fn test_escape_cancels_edit() {
        let mut app = test_app(ScriptedCommentService::new(), Some("alice"));
        let mut view = view_for(&app, Comment::test_comment("c1", Some("alice"), "hi"));
        view.edit();
        view.handle_edit_key(&mut app, &key(KeyCode::Char('?')));

        view.handle_edit_key(&mut app, &key(KeyCode::Esc));

        assert!(!view.is_editing());
        assert_eq!(view.controller().draft_text(), "hi");
    }

    #[tokio::test]
    async fn test_submit_resolves_through_event_queue() {
        let service = ScriptedCommentService::new();
        let mut app = test_app(service.clone(), Some("alice"));
        app.session.select_line(test_line());
        let mut view = view_for(&app, Comment::test_comment("c1", Some("alice"), "hi"));
        view.edit();
        view.handle_edit_key(&mut app, &key(KeyCode::Char('!')));

        view.handle_edit_key(&mut app, &ctrl_s());
        assert!(view.controller().is_submitting());
        view.handle_edit_key(&mut app, &ctrl_s());

        let event = app.events.next().await.unwrap();
        let Event::App(AppEvent::CommentSubmitResolved { ticket, result }) = &*event else {
            panic!("Expected submit resolution, got: {event:?}");
        };
        view.resolve_submit(ticket, result);

        assert!(!view.is_editing());
        assert!(!view.controller().is_submitting());
        assert_eq!(service.update_calls().len(), 1);
        assert_eq!(service.update_calls()[0].text, "hi!");

        let event = app.events.try_recv().unwrap();
        assert!(matches!(
            &*event,
            Event::App(AppEvent::CommentPosted { line_id }) if line_id.as_ref() == "app.log:1"
        ));
    }

    #[tokio::test]
    async fn test_submit_without_selected_line_is_ignored() {
        let service = ScriptedCommentService::new();
        let mut app = test_app(service.clone(), Some("alice"));
        let mut view = view_for(&app, Comment::test_comment("c1", Some("alice"), "hi"));
        view.edit();

        view.handle_edit_key(&mut app, &ctrl_s());
        tokio::task::yield_now().await;

        assert!(!view.controller().is_submitting());
        assert!(view.is_editing());
        assert!(service.update_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submit_shows_error() {
        let service = ScriptedCommentService::new();
        service.push_update_result(Err(eyre!("cooper is down")));
        let mut app = test_app(service, Some("alice"));
        app.session.select_line(test_line());
        let mut view = view_for(&app, Comment::test_comment("c1", Some("alice"), "hi"));
        view.edit();
        view.handle_edit_key(&mut app, &ctrl_s());

        let event = app.events.next().await.unwrap();
        let Event::App(AppEvent::CommentSubmitResolved { ticket, result }) = &*event else {
            panic!("Expected submit resolution, got: {event:?}");
        };
        view.resolve_submit(ticket, result);

        assert!(view.is_editing());
        assert!(!view.controller().is_submitting());
        assert!(view.last_error().unwrap().contains("cooper is down"));
        assert!(!app.events.has_pending_events());

        let text = buffer_text(&render_view_to_terminal_backend(&app, |_, area, buf| {
            view.render(area, buf, true)
        }));
        assert!(text.contains("cooper is down"));
        assert!(text.contains("Ctrl+S Save"));
    }

    #[tokio::test]
    async fn test_render_card_and_form() {
        let mut app = test_app(ScriptedCommentService::new(), Some("alice"));
        let mut view = view_for(
            &app,
            Comment::test_comment("c1", Some("alice"), "Check **bold** text"),
        );

        let card = buffer_text(&render_view_to_terminal_backend(&app, |_, area, buf| {
            view.render(area, buf, true)
        }));
        assert!(card.contains("Alice"));
        assert!(card.contains("Check bold text"));
        assert!(card.contains("e: Edit"));

        view.edit();
        for _ in 0.."Check **bold** text".len() {
            view.handle_edit_key(&mut app, &key(KeyCode::Backspace));
        }
        let form = buffer_text(&render_view_to_terminal_backend(&app, |_, area, buf| {
            view.render(area, buf, true)
        }));
        assert!(form.contains("Editing comment"));
        assert!(form.contains("Ctrl+S Delete"));
    }

    #[tokio::test]
    async fn test_render_card_for_other_viewer_has_no_edit_hint() {
        let app = test_app(ScriptedCommentService::new(), Some("bob"));
        let view = view_for(&app, Comment::test_comment("c1", Some("alice"), "hi"));

        let card = buffer_text(&render_view_to_terminal_backend(&app, |_, area, buf| {
            view.render(area, buf, false)
        }));
        assert!(card.contains("hi"));
        assert!(!card.contains("Edit"));
    }

    #[tokio::test]
    async fn test_rebind_to_other_comment_clears_error_and_rerenders() {
        let app = test_app(ScriptedCommentService::new(), Some("alice"));
        let mut view = view_for(&app, Comment::test_comment("c1", Some("alice"), "first"));
        view.last_error = Some("old failure".to_string());
        view.edit();

        view.rebind(Comment::test_comment("c2", Some("alice"), "second"));

        assert!(!view.is_editing());
        assert_eq!(view.last_error(), None);
        assert_eq!(view.controller().draft_text(), "second");
        let text: String = view.body[0]
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert_eq!(text, "second");
    }
}
