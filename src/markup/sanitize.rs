use std::collections::HashSet;
use std::fmt;

/// HTML that has been through the comment sanitizer.
///
/// Only this module can construct it, so holding one means the markup is safe to attach to a
/// document as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafeHtml(String);

impl SafeHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitizer() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tag_attributes("span", &["class"])
        .add_tag_attributes("code", &["class"])
        .add_tag_attributes("pre", &["class"])
        .url_schemes(HashSet::from(["http", "https", "mailto"]))
        .link_rel(Some("noopener noreferrer"));
    builder
}

/// Strip everything outside the comment markup allow-list.
pub fn sanitize(html: &str) -> SafeHtml {
    SafeHtml(sanitizer().clean(html).to_string())
}

/// Escape text for an HTML text node.
pub fn escape_text(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

/// Escape text for a double-quoted HTML attribute value.
pub fn escape_attribute(input: &str, out: &mut String) {
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_scripts_and_handlers() {
        let html = sanitize("<p onclick=\"steal()\">hi</p><script>alert(1)</script>");
        assert_eq!(html.as_str(), "<p>hi</p>");
    }

    #[test]
    fn test_sanitize_drops_javascript_urls() {
        let html = sanitize("<a href=\"javascript:alert(1)\">x</a>");
        assert!(!html.as_str().contains("javascript"));
        assert!(html.as_str().contains(">x</a>"));
    }

    #[test]
    fn test_sanitize_keeps_highlight_classes() {
        let html = sanitize("<pre><code><span class=\"hl-keyword\">fn</span></code></pre>");
        assert!(html.as_str().contains("class=\"hl-keyword\""));
    }

    #[test]
    fn test_escape_helpers() {
        let mut text = String::new();
        escape_text("a < b & \"c\"", &mut text);
        assert_eq!(text, "a &lt; b &amp; \"c\"");

        let mut attribute = String::new();
        escape_attribute("x\" onload='y'", &mut attribute);
        assert_eq!(attribute, "x&quot; onload=&#x27;y&#x27;");
    }
}
