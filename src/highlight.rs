//! Syntax highlighting for fenced code blocks.
//!
//! Code blocks are highlighted at render time with [syntect] using one named
//! style for the whole site, set by `code_style` in `site.toml`. The output
//! carries inline styles, so themes need no extra stylesheet:
//!
//! ````text
//! ```rust                    <pre style="background-color:#ffffff;">
//! fn main() {}          →    <span style="color:#a71d5d;">fn</span> ...
//! ```                        </pre>
//! ````
//!
//! The fence's info string picks the grammar by token (`rust`, `rs`, `py`,
//! `toml`, ...). Unknown or missing languages fall back to plain text so the
//! block still gets the style's colors.
//!
//! Syntax and style sets are loaded once per process.

use maud::html;
use pulldown_cmark::{CodeBlockKind, Event, Tag, TagEnd};
use std::sync::OnceLock;
use syntect::highlighting::{Theme as CodeTheme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use thiserror::Error;

/// Style used when `site.toml` does not name one.
pub const DEFAULT_CODE_STYLE: &str = "InspiredGitHub";

#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("unknown code style {name:?} (available: {available})")]
    UnknownStyle { name: String, available: String },
}

fn syntaxes() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn styles() -> &'static ThemeSet {
    static STYLES: OnceLock<ThemeSet> = OnceLock::new();
    STYLES.get_or_init(ThemeSet::load_defaults)
}

/// Names of every bundled code style, sorted.
pub fn style_names() -> Vec<&'static str> {
    styles().themes.keys().map(String::as_str).collect()
}

/// A code style resolved by name, ready to render blocks.
#[derive(Debug, Clone, Copy)]
pub struct Highlighter {
    style: &'static CodeTheme,
}

impl Highlighter {
    pub fn new(name: &str) -> Result<Highlighter, HighlightError> {
        match styles().themes.get(name) {
            Some(style) => Ok(Highlighter { style }),
            None => Err(HighlightError::UnknownStyle {
                name: name.to_string(),
                available: style_names().join(", "),
            }),
        }
    }

    /// Highlight `code` as `lang`, returning a complete `<pre>` block.
    pub fn highlight(&self, code: &str, lang: &str) -> String {
        let syntaxes = syntaxes();
        let syntax = syntaxes
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| syntaxes.find_syntax_plain_text());
        match highlighted_html_for_string(code, syntaxes, syntax, self.style) {
            Ok(out) => out,
            Err(e) => {
                log::warn!("cannot highlight {lang:?} block: {e}");
                html! { pre { code { (code) } } }.into_string()
            }
        }
    }

    /// Replace every code block in `events` with its highlighted HTML.
    pub fn code_blocks<'a>(&self, events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::new();
        // (language, accumulated code) while inside a block
        let mut block: Option<(String, String)> = None;

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().unwrap_or("").to_string()
                        }
                        CodeBlockKind::Indented => String::new(),
                    };
                    block = Some((lang, String::new()));
                }
                Event::Text(text) => match block.as_mut() {
                    Some((_, code)) => code.push_str(&text),
                    None => out.push(Event::Text(text)),
                },
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = block.take() {
                        out.push(Event::Html(self.highlight(&code, &lang).into()));
                    }
                }
                other => out.push(other),
            }
        }
        out
    }
}
