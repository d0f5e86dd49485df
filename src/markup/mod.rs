//! Comment body rendering.
//!
//! A comment's markdown source is parsed once into an mdast tree (GFM, so bare URLs already
//! arrive as links) and then written out by one of two sinks: [`render_to_markup`] for HTML
//! hosts and [`render_to_lines`] for the terminal. Both sinks substitute emoji shortcodes in
//! text and highlight fenced code by its declared language. The HTML sink always finishes with
//! an explicit sanitization pass.

use std::collections::HashMap;

use markdown::{
    ParseOptions,
    mdast::{self, Node},
};

pub mod emoji;
pub mod highlight;
pub mod html;
pub mod sanitize;
pub mod terminal;

pub use html::render_to_markup;
pub use sanitize::SafeHtml;
pub use terminal::render_to_lines;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkDefinition {
    url: String,
    title: Option<String>,
}

#[derive(Debug, Default)]
struct References {
    links: HashMap<String, LinkDefinition>,
}

impl References {
    fn from_root(root: &mdast::Root) -> Self {
        let mut links = HashMap::new();
        collect_definitions(&root.children, &mut links);
        Self { links }
    }

    fn resolve(&self, identifier: &str) -> Option<&LinkDefinition> {
        self.links.get(identifier)
    }
}

fn collect_definitions(nodes: &[Node], links: &mut HashMap<String, LinkDefinition>) {
    for node in nodes {
        if let Node::Definition(definition) = node {
            links
                .entry(definition.identifier.clone())
                .or_insert_with(|| LinkDefinition {
                    url: definition.url.clone(),
                    title: definition.title.clone(),
                });
        }
        if let Some(children) = node.children() {
            collect_definitions(children, links);
        }
    }
}

/// Whether a link's text is its own URL, as for autolinks. Such text is shown verbatim.
fn is_literal_url(url: &str, children: &[Node]) -> bool {
    let [Node::Text(text)] = children else {
        return false;
    };
    let text = text.value.as_str();
    url == text
        || ["mailto:", "http://"]
            .iter()
            .any(|scheme| url.strip_prefix(scheme) == Some(text))
}

/// A parsed comment body.
struct Document {
    root: mdast::Root,
    references: References,
}

impl Document {
    fn parse(text: &str) -> Self {
        let root = match markdown::to_mdast(text, &ParseOptions::gfm()) {
            Ok(Node::Root(root)) => root,
            Ok(other) => mdast::Root {
                children: vec![other],
                position: None,
            },
            Err(error) => {
                log::warn!(target: crate::logging::COMMENT_TARGET, "Markdown parse failed, rendering as text: {error}");
                mdast::Root {
                    children: vec![Node::Paragraph(mdast::Paragraph {
                        children: vec![Node::Text(mdast::Text {
                            value: text.to_string(),
                            position: None,
                        })],
                        position: None,
                    })],
                    position: None,
                }
            }
        };
        let references = References::from_root(&root);
        Self { root, references }
    }
}
