use std::sync::OnceLock;

use syntect::easy::ScopeRegionIterator;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Prefix of every class emitted into highlighted HTML.
pub const CLASS_PREFIX: &str = "hl-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeToken {
    Plain,
    Keyword,
    String,
    Number,
    Comment,
    Function,
    TypeName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSpan {
    pub text: String,
    pub token: CodeToken,
}

impl CodeSpan {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            token: CodeToken::Plain,
        }
    }
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

/// Look up the syntax for a fence's declared language.
pub fn syntax_for_language(language: Option<&str>) -> Option<&'static SyntaxReference> {
    let syntax_set = syntax_set();
    let hint = language?.trim();
    if hint.is_empty() {
        return None;
    }

    let lower = hint.to_ascii_lowercase();
    if let Some(syntax) = syntax_set.find_syntax_by_token(lower.as_str()) {
        return Some(syntax);
    }
    if let Some(syntax) = syntax_set.find_syntax_by_extension(lower.as_str()) {
        return Some(syntax);
    }
    language_tokens_for_hint(lower.as_str())?
        .iter()
        .find_map(|token| syntax_set.find_syntax_by_token(token))
}

fn language_tokens_for_hint(hint: &str) -> Option<&'static [&'static str]> {
    match hint {
        "jsx" | "javascript" | "node" => Some(&["js", "javascript"]),
        "ts" | "tsx" | "typescript" => Some(&["ts", "typescript", "js"]),
        "json" | "jsonc" => Some(&["json", "js"]),
        "yml" | "yaml" => Some(&["yaml", "yml"]),
        "shell" | "zsh" | "console" => Some(&["bash", "sh"]),
        "c++" | "cxx" | "hxx" => Some(&["cpp", "c"]),
        "kotlin" | "kt" | "kts" => Some(&["kotlin", "java"]),
        "objc" | "objective-c" => Some(&["m", "objc"]),
        _ => None,
    }
}

/// Highlight `code` into classed HTML spans, or `None` when the language is unknown.
///
/// The returned markup is already escaped.
pub fn highlight_to_html(language: Option<&str>, code: &str) -> Option<String> {
    let syntax = syntax_for_language(language)?;
    let mut generator = ClassedHTMLGenerator::new_with_class_style(
        syntax,
        syntax_set(),
        ClassStyle::SpacedPrefixed {
            prefix: CLASS_PREFIX,
        },
    );
    for line in LinesWithEndings::from(code) {
        if let Err(error) = generator.parse_html_for_line_which_includes_newline(line) {
            log::warn!(target: crate::logging::COMMENT_TARGET, "Highlighting failed, falling back to plain code: {error}");
            return None;
        }
    }
    Some(generator.finalize())
}

/// Highlight `code` into per-line token spans for the terminal.
///
/// Unknown languages yield a single plain span per line. Always returns at least one line.
pub fn highlight_to_tokens(language: Option<&str>, code: &str) -> Vec<Vec<CodeSpan>> {
    let mut rows = match syntax_for_language(language) {
        Some(syntax) => {
            let mut parse_state = ParseState::new(syntax);
            let mut scope_stack = ScopeStack::new();
            LinesWithEndings::from(code)
                .map(|line| highlight_line(line, &mut parse_state, &mut scope_stack))
                .collect::<Vec<_>>()
        }
        None => code.lines().map(|line| vec![CodeSpan::plain(line)]).collect(),
    };

    if rows.is_empty() {
        rows.push(vec![CodeSpan::plain("")]);
    }
    rows
}

fn highlight_line(
    line: &str,
    parse_state: &mut ParseState,
    scope_stack: &mut ScopeStack,
) -> Vec<CodeSpan> {
    let visible = line.trim_end_matches(['\n', '\r']);
    let Ok(ops) = parse_state.parse_line(line, syntax_set()) else {
        return vec![CodeSpan::plain(visible)];
    };

    let mut spans: Vec<CodeSpan> = Vec::new();
    let mut consumed = 0usize;
    for (region, op) in ScopeRegionIterator::new(&ops, line) {
        let token = if scope_stack.apply(op).is_ok() {
            token_from_scope_stack(scope_stack)
        } else {
            CodeToken::Plain
        };
        let remaining = visible.len().saturating_sub(consumed);
        let text = &region[..region.len().min(remaining)];
        consumed += region.len();
        if text.is_empty() {
            continue;
        }
        match spans.last_mut() {
            Some(last) if last.token == token => last.text.push_str(text),
            _ => spans.push(CodeSpan {
                text: text.to_string(),
                token,
            }),
        }
    }

    if spans.is_empty() {
        spans.push(CodeSpan::plain(""));
    }
    spans
}

fn token_from_scope_stack(scope_stack: &ScopeStack) -> CodeToken {
    for scope in scope_stack.as_slice().iter().rev() {
        let name = scope.build_string();
        if name.starts_with("comment") {
            return CodeToken::Comment;
        }
        if name.starts_with("string") {
            return CodeToken::String;
        }
        if name.starts_with("constant.numeric") {
            return CodeToken::Number;
        }
        if name.starts_with("entity.name.function") || name.starts_with("support.function") {
            return CodeToken::Function;
        }
        if name.starts_with("entity.name.type")
            || name.starts_with("support.type")
            || name.starts_with("storage.type")
        {
            return CodeToken::TypeName;
        }
        if name.starts_with("keyword") || name.starts_with("storage.modifier") {
            return CodeToken::Keyword;
        }
    }
    CodeToken::Plain
}
