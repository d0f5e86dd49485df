use markdown::mdast::{self, Node};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use super::{
    Document, References, emoji, is_literal_url,
    highlight::{self, CodeToken},
};

/// Render a comment body to styled terminal lines.
///
/// Blocks are separated by one blank line. Empty text renders no lines.
pub fn render_to_lines(text: &str) -> Vec<Line<'static>> {
    let document = Document::parse(text);
    let mut writer = LineWriter {
        references: &document.references,
        lines: Vec::new(),
        current: Vec::new(),
    };
    for (index, node) in document.root.children.iter().enumerate() {
        if index > 0 && !matches!(node, Node::Definition(_)) {
            writer.blank_line();
        }
        writer.block(node, "");
    }
    writer.flush();
    while writer.lines.last().is_some_and(|line| line.spans.is_empty()) {
        writer.lines.pop();
    }
    writer.lines
}

fn code_style(token: CodeToken) -> Style {
    let style = Style::default();
    match token {
        CodeToken::Plain => style.fg(Color::White),
        CodeToken::Keyword => style.fg(Color::Magenta),
        CodeToken::String => style.fg(Color::Green),
        CodeToken::Number => style.fg(Color::Yellow),
        CodeToken::Comment => style.fg(Color::DarkGray),
        CodeToken::Function => style.fg(Color::Blue),
        CodeToken::TypeName => style.fg(Color::Cyan),
    }
}

struct LineWriter<'a> {
    references: &'a References,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
}

impl LineWriter<'_> {
    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn blank_line(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|line| !line.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    /// Push text, starting a new line (with `prefix`) at every newline.
    fn push(&mut self, text: &str, style: Style, prefix: &str) {
        for (index, part) in text.split('\n').enumerate() {
            if index > 0 {
                self.flush();
                if !prefix.is_empty() {
                    self.current
                        .push(Span::styled(prefix.to_string(), Style::default().fg(Color::DarkGray)));
                }
            }
            if !part.is_empty() {
                self.current.push(Span::styled(part.to_string(), style));
            }
        }
    }

    fn start_line(&mut self, prefix: &str, marker: Option<String>) {
        self.flush();
        if !prefix.is_empty() {
            self.current
                .push(Span::styled(prefix.to_string(), Style::default().fg(Color::DarkGray)));
        }
        if let Some(marker) = marker {
            self.current
                .push(Span::styled(marker, Style::default().fg(Color::Cyan)));
        }
    }

    fn block(&mut self, node: &Node, prefix: &str) {
        match node {
            Node::Paragraph(paragraph) => {
                self.start_line(prefix, None);
                self.inlines(&paragraph.children, Style::default(), prefix);
                self.flush();
            }
            Node::Heading(heading) => {
                self.start_line(prefix, Some(format!("{} ", "#".repeat(heading.depth.into()))));
                let style = Style::default().add_modifier(Modifier::BOLD);
                self.inlines(&heading.children, style, prefix);
                self.flush();
            }
            Node::Blockquote(blockquote) => {
                let nested = format!("{prefix}│ ");
                for (index, child) in blockquote.children.iter().enumerate() {
                    if index > 0 {
                        self.start_line(&nested, None);
                        self.flush();
                    }
                    self.block(child, &nested);
                }
            }
            Node::List(list) => self.list(list, prefix),
            Node::Code(code) => self.code(code.lang.as_deref(), &code.value, prefix),
            Node::Math(math) => self.code(None, &math.value, prefix),
            Node::ThematicBreak(_) => {
                self.start_line(prefix, None);
                self.current
                    .push(Span::styled("────────", Style::default().fg(Color::DarkGray)));
                self.flush();
            }
            Node::Html(html) => {
                self.start_line(prefix, None);
                self.push(&html.value, Style::default(), prefix);
                self.flush();
            }
            Node::Table(table) => self.table(table, prefix),
            Node::Definition(_) => {}
            other => {
                self.start_line(prefix, None);
                self.inline(other, Style::default(), prefix);
                self.flush();
            }
        }
    }

    fn inlines(&mut self, nodes: &[Node], style: Style, prefix: &str) {
        for node in nodes {
            self.inline(node, style, prefix);
        }
    }

    fn inline(&mut self, node: &Node, style: Style, prefix: &str) {
        match node {
            Node::Text(text) => {
                self.push(&emoji::substitute_shortcodes(&text.value), style, prefix)
            }
            Node::Link(link) if is_literal_url(&link.url, &link.children) => {
                self.push(&link.children[0].to_string(), link_style(style), prefix)
            }
            Node::Strong(strong) => {
                self.inlines(&strong.children, style.add_modifier(Modifier::BOLD), prefix)
            }
            Node::Emphasis(emphasis) => {
                self.inlines(&emphasis.children, style.add_modifier(Modifier::ITALIC), prefix)
            }
            Node::Delete(delete) => self.inlines(
                &delete.children,
                style.add_modifier(Modifier::CROSSED_OUT),
                prefix,
            ),
            Node::InlineCode(code) => self.push(&code.value, style.fg(Color::Yellow), prefix),
            Node::InlineMath(math) => self.push(&math.value, style.fg(Color::Yellow), prefix),
            Node::Break(_) => self.push("\n", style, prefix),
            Node::Link(link) => self.inlines(&link.children, link_style(style), prefix),
            Node::LinkReference(reference) => {
                let style = if self.references.resolve(&reference.identifier).is_some() {
                    link_style(style)
                } else {
                    style
                };
                self.inlines(&reference.children, style, prefix);
            }
            Node::Image(image) => self.push(&format!("[image: {}]", image.alt), style, prefix),
            Node::ImageReference(reference) => {
                self.push(&format!("[image: {}]", reference.alt), style, prefix)
            }
            Node::Html(html) => self.push(&html.value, style, prefix),
            Node::FootnoteReference(reference) => {
                self.push(&format!("[{}]", reference.identifier), style, prefix)
            }
            other => match other.children() {
                Some(children) => self.inlines(children, style, prefix),
                None => self.push(&other.to_string(), style, prefix),
            },
        }
    }

    fn list(&mut self, list: &mdast::List, prefix: &str) {
        let mut number = list.start.unwrap_or(1);
        let nested = format!("{prefix}  ");
        for child in &list.children {
            let Node::ListItem(item) = child else {
                continue;
            };
            let marker = if list.ordered {
                let marker = format!("{number}. ");
                number = number.saturating_add(1);
                marker
            } else {
                "• ".to_string()
            };
            let marker = match item.checked {
                Some(true) => format!("{marker}[x] "),
                Some(false) => format!("{marker}[ ] "),
                None => marker,
            };
            self.start_line(prefix, Some(marker));
            for (index, node) in item.children.iter().enumerate() {
                match node {
                    Node::Paragraph(paragraph) if index == 0 => {
                        self.inlines(&paragraph.children, Style::default(), &nested);
                        self.flush();
                    }
                    other => self.block(other, &nested),
                }
            }
            self.flush();
        }
    }

    fn table(&mut self, table: &mdast::Table, prefix: &str) {
        for (row_ix, row) in table.children.iter().enumerate() {
            let Node::TableRow(row) = row else {
                continue;
            };
            self.start_line(prefix, None);
            let style = if row_ix == 0 {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            for (cell_ix, cell) in row.children.iter().enumerate() {
                if cell_ix > 0 {
                    self.current
                        .push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
                }
                if let Node::TableCell(cell) = cell {
                    self.inlines(&cell.children, style, prefix);
                }
            }
            self.flush();
        }
    }

    fn code(&mut self, language: Option<&str>, code: &str, prefix: &str) {
        for row in highlight::highlight_to_tokens(language, code) {
            self.start_line(&format!("{prefix}  "), None);
            for span in row {
                self.current
                    .push(Span::styled(span.text, code_style(span.token)));
            }
            self.flush();
        }
    }
}

fn link_style(style: Style) -> Style {
    style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED)
}
