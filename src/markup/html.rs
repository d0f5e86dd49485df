use std::fmt::Write as _;

use markdown::mdast::{self, Node};

use super::{
    Document, References, emoji, is_literal_url,
    highlight::{self, CLASS_PREFIX},
    sanitize::{SafeHtml, escape_attribute, escape_text, sanitize},
};

/// Render a comment body to sanitized HTML.
///
/// Bare URLs become links, emoji shortcodes become glyphs and fenced code is highlighted by its
/// declared language. Raw HTML in the source is shown as text. The output only depends on `text`.
pub fn render_to_markup(text: &str) -> SafeHtml {
    let document = Document::parse(text);
    let mut writer = HtmlWriter {
        references: &document.references,
        out: String::with_capacity(text.len() * 2),
        literal_text: false,
    };
    writer.blocks(&document.root.children);
    sanitize(writer.out.trim_end())
}

struct HtmlWriter<'a> {
    references: &'a References,
    out: String,
    /// Set while writing the text of a link that shows its own URL.
    literal_text: bool,
}

impl HtmlWriter<'_> {
    fn blocks(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.block(node);
        }
    }

    fn block(&mut self, node: &Node) {
        match node {
            Node::Paragraph(paragraph) => {
                self.element("p", &paragraph.children);
                self.out.push('\n');
            }
            Node::Heading(heading) => {
                let tag = format!("h{}", heading.depth.clamp(1, 6));
                self.element(&tag, &heading.children);
                self.out.push('\n');
            }
            Node::Blockquote(blockquote) => {
                self.out.push_str("<blockquote>\n");
                self.blocks(&blockquote.children);
                self.out.push_str("</blockquote>\n");
            }
            Node::List(list) => self.list(list),
            Node::Code(code) => self.code_block(code.lang.as_deref(), &code.value),
            Node::ThematicBreak(_) => self.out.push_str("<hr>\n"),
            Node::Html(html) => {
                self.out.push_str("<p>");
                escape_text(&html.value, &mut self.out);
                self.out.push_str("</p>\n");
            }
            Node::Table(table) => self.table(table),
            Node::Definition(_) => {}
            Node::FootnoteDefinition(definition) => {
                let _ = write!(self.out, "<div class=\"footnote\"><sup>");
                escape_text(&definition.identifier, &mut self.out);
                self.out.push_str("</sup>\n");
                self.blocks(&definition.children);
                self.out.push_str("</div>\n");
            }
            Node::Math(math) => self.code_block(None, &math.value),
            other => {
                self.out.push_str("<p>");
                self.inline(other);
                self.out.push_str("</p>\n");
            }
        }
    }

    fn element(&mut self, tag: &str, children: &[Node]) {
        let _ = write!(self.out, "<{tag}>");
        self.inlines(children);
        let _ = write!(self.out, "</{tag}>");
    }

    fn inlines(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.inline(node);
        }
    }

    fn inline(&mut self, node: &Node) {
        match node {
            Node::Text(text) if self.literal_text => escape_text(&text.value, &mut self.out),
            Node::Text(text) => {
                escape_text(&emoji::substitute_shortcodes(&text.value), &mut self.out);
            }
            Node::Strong(strong) => self.element("strong", &strong.children),
            Node::Emphasis(emphasis) => self.element("em", &emphasis.children),
            Node::Delete(delete) => self.element("del", &delete.children),
            Node::InlineCode(code) => {
                self.out.push_str("<code>");
                escape_text(&code.value, &mut self.out);
                self.out.push_str("</code>");
            }
            Node::InlineMath(math) => {
                self.out.push_str("<code>");
                escape_text(&math.value, &mut self.out);
                self.out.push_str("</code>");
            }
            Node::Break(_) => self.out.push_str("<br>\n"),
            Node::Link(link) => self.link(&link.url, link.title.as_deref(), &link.children),
            Node::LinkReference(reference) => {
                match self.references.resolve(&reference.identifier) {
                    Some(definition) => {
                        let (url, title) = (definition.url.clone(), definition.title.clone());
                        self.link(&url, title.as_deref(), &reference.children);
                    }
                    None => self.inlines(&reference.children),
                }
            }
            Node::Image(image) => self.image(&image.url, &image.alt, image.title.as_deref()),
            Node::ImageReference(reference) => {
                match self.references.resolve(&reference.identifier) {
                    Some(definition) => {
                        let (url, title) = (definition.url.clone(), definition.title.clone());
                        self.image(&url, &reference.alt, title.as_deref());
                    }
                    None => escape_text(&reference.alt, &mut self.out),
                }
            }
            Node::Html(html) => escape_text(&html.value, &mut self.out),
            Node::FootnoteReference(reference) => {
                self.out.push_str("<sup>");
                escape_text(&reference.identifier, &mut self.out);
                self.out.push_str("</sup>");
            }
            other => match other.children() {
                Some(children) => self.inlines(children),
                None => escape_text(&other.to_string(), &mut self.out),
            },
        }
    }

    fn link(&mut self, url: &str, title: Option<&str>, children: &[Node]) {
        self.out.push_str("<a href=\"");
        escape_attribute(url, &mut self.out);
        self.out.push('"');
        if let Some(title) = title {
            self.out.push_str(" title=\"");
            escape_attribute(title, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');
        let literal_text = self.literal_text;
        self.literal_text = is_literal_url(url, children);
        self.inlines(children);
        self.literal_text = literal_text;
        self.out.push_str("</a>");
    }

    fn image(&mut self, url: &str, alt: &str, title: Option<&str>) {
        self.out.push_str("<img src=\"");
        escape_attribute(url, &mut self.out);
        self.out.push_str("\" alt=\"");
        escape_attribute(alt, &mut self.out);
        self.out.push('"');
        if let Some(title) = title {
            self.out.push_str(" title=\"");
            escape_attribute(title, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');
    }

    fn list(&mut self, list: &mdast::List) {
        match (list.ordered, list.start) {
            (true, Some(start)) if start != 1 => {
                let _ = writeln!(self.out, "<ol start=\"{start}\">");
            }
            (true, _) => self.out.push_str("<ol>\n"),
            (false, _) => self.out.push_str("<ul>\n"),
        }
        for child in &list.children {
            let Node::ListItem(item) = child else {
                self.block(child);
                continue;
            };
            self.out.push_str("<li>");
            match item.checked {
                Some(true) => self.out.push_str("[x] "),
                Some(false) => self.out.push_str("[ ] "),
                None => {}
            }
            for node in &item.children {
                match node {
                    // Tight lists render their paragraphs without <p>.
                    Node::Paragraph(paragraph) if !list.spread => {
                        self.inlines(&paragraph.children)
                    }
                    other => self.block(other),
                }
            }
            self.out.push_str("</li>\n");
        }
        self.out
            .push_str(if list.ordered { "</ol>\n" } else { "</ul>\n" });
    }

    fn table(&mut self, table: &mdast::Table) {
        self.out.push_str("<table>\n");
        for (row_ix, row) in table.children.iter().enumerate() {
            let Node::TableRow(row) = row else {
                continue;
            };
            let cell_tag = if row_ix == 0 { "th" } else { "td" };
            if row_ix == 0 {
                self.out.push_str("<thead>\n");
            } else if row_ix == 1 {
                self.out.push_str("<tbody>\n");
            }
            self.out.push_str("<tr>");
            for cell in &row.children {
                if let Node::TableCell(cell) = cell {
                    self.element(cell_tag, &cell.children);
                }
            }
            self.out.push_str("</tr>\n");
            if row_ix == 0 {
                self.out.push_str("</thead>\n");
            }
        }
        if table.children.len() > 1 {
            self.out.push_str("</tbody>\n");
        }
        self.out.push_str("</table>\n");
    }

    fn code_block(&mut self, language: Option<&str>, code: &str) {
        let language = language.map(str::trim).filter(|language| !language.is_empty());
        match highlight::highlight_to_html(language, code) {
            Some(highlighted) => {
                let _ = write!(self.out, "<pre class=\"{CLASS_PREFIX}code\"><code class=\"");
                escape_attribute(&format!("language-{}", language.unwrap_or_default()), &mut self.out);
                self.out.push_str("\">");
                self.out.push_str(&highlighted);
                self.out.push_str("</code></pre>\n");
            }
            None => {
                self.out.push_str("<pre><code>");
                escape_text(code, &mut self.out);
                self.out.push_str("</code></pre>\n");
            }
        }
    }
}
