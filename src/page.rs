//! Markdown page parsing and link resolution.
//!
//! A page is one Markdown file, optionally opening with a YAML metadata block
//! (see [`crate::frontmatter`]):
//!
//! ```text
//! ---
//! url: /custom-b          # URL override, honored in dynamic link mode only
//! published: 2024-01-01   # explicit timing (RFC 3339 or bare date)
//! updated: 2024-02-01
//! ---
//! # B                     # first level-1 heading becomes the page title
//! ```
//!
//! ## Timing policy
//!
//! Timing is all-or-nothing. When the metadata names neither `published` nor
//! `updated`, the page is left untimed and the area builder asks git. When
//! only one is given it stands in for both, and git is not consulted.
//!
//! ## Link modes
//!
//! | Mode | `posts/a.md` | override `url: /x` |
//! |------|--------------|--------------------|
//! | [`LinkMode::Static`] | `/posts/a.html` | ignored (warning) |
//! | [`LinkMode::Dynamic`] | `/posts/a` | `/x` |
//!
//! Static links must map one-to-one onto files a plain web server can find,
//! so an override cannot be honored there; the path-derived link wins and a
//! warning is logged.

use crate::frontmatter;
use crate::highlight::Highlighter;
use crate::timing::{self, Timing};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html as md_html};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("cannot read {path}: {source}")]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: metadata block opened with `---` is never closed")]
    UnclosedMetadata { path: PathBuf },
    #[error("{path}: invalid metadata: {message}")]
    MetadataParse { path: PathBuf, message: String },
    #[error("{path} is not inside {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// How URLs are derived for generated pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// `.html` paths that map one-to-one onto generated files.
    #[default]
    Static,
    /// Extensionless paths; URL overrides are honored.
    Dynamic,
}

impl LinkMode {
    /// Extension (without dot) of path-derived page URLs.
    pub fn extension(self) -> &'static str {
        match self {
            LinkMode::Static => "html",
            LinkMode::Dynamic => "",
        }
    }
}

/// Recognized frontmatter keys. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Metadata {
    url: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

impl Metadata {
    fn parse(raw: &str) -> Result<Metadata, String> {
        if raw.trim().is_empty() {
            return Ok(Metadata::default());
        }
        serde_yaml_ng::from_str(raw).map_err(|e| e.to_string())
    }

    fn timing(&self) -> Result<Option<Timing>, String> {
        let parse = |field: &str, raw: &Option<String>| {
            raw.as_deref()
                .map(|r| timing::parse_timestamp(r).map_err(|e| format!("{field}: {e}")))
                .transpose()
        };
        let published = parse("published", &self.published)?;
        let updated = parse("updated", &self.updated)?;
        Ok(match (published, updated) {
            (None, None) => None,
            (Some(p), None) => Some(Timing {
                published: p,
                updated: p,
            }),
            (None, Some(u)) => Some(Timing {
                published: u,
                updated: u,
            }),
            (Some(p), Some(u)) => Some(Timing {
                published: p,
                updated: u,
            }),
        })
    }
}

/// One parsed Markdown source.
#[derive(Debug, Clone, Default)]
pub struct Page {
    title: String,
    url: Option<String>,
    timing: Option<Timing>,
    content: String,
}

impl Page {
    /// Read and parse the Markdown file at `path`.
    pub fn parse(path: &Path) -> Result<Page, PageError> {
        let source = fs::read_to_string(path).map_err(|source| PageError::UnreadableSource {
            path: path.to_path_buf(),
            source,
        })?;
        Page::parse_str(path, &source)
    }

    /// Parse already-loaded source text. `path` is only used for error context.
    pub fn parse_str(path: &Path, source: &str) -> Result<Page, PageError> {
        let components = frontmatter::split(source).map_err(|_| PageError::UnclosedMetadata {
            path: path.to_path_buf(),
        })?;
        let invalid = |message: String| PageError::MetadataParse {
            path: path.to_path_buf(),
            message,
        };
        let metadata = Metadata::parse(&components.metadata).map_err(invalid)?;
        let timing = metadata.timing().map_err(invalid)?;

        Ok(Page {
            title: extract_title(&components.content),
            url: metadata.url.filter(|u| !u.trim().is_empty()),
            timing,
            content: components.content,
        })
    }

    /// A contentless page, used when an area has no index file.
    pub fn placeholder(title: impl Into<String>) -> Page {
        Page {
            title: title.into(),
            ..Page::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url_override(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn timing(&self) -> Option<&Timing> {
        self.timing.as_ref()
    }

    pub fn set_timing(&mut self, timing: Option<Timing>) {
        self.timing = timing;
    }

    /// Markdown body with the metadata block removed.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Published date for themes, or `""` when untimed.
    pub fn date(&self) -> String {
        timing::format_date(self.timing.as_ref())
    }

    /// Render the Markdown body to HTML, highlighting code blocks when a
    /// highlighter is given.
    pub fn render_html(&self, code: Option<&Highlighter>) -> String {
        let parser = Parser::new_ext(&self.content, markdown_options());
        let mut out = String::with_capacity(self.content.len() * 2);
        match code {
            Some(highlighter) => {
                md_html::push_html(&mut out, highlighter.code_blocks(parser).into_iter())
            }
            None => md_html::push_html(&mut out, parser),
        }
        out
    }

    /// Whether an override exists that `mode` will not honor.
    pub fn ignores_override(&self, mode: LinkMode) -> bool {
        self.url.is_some() && mode == LinkMode::Static
    }

    /// URL for this page, whose source lives at `path` under `root`.
    pub fn link(&self, path: &Path, root: &Path, mode: LinkMode) -> Result<String, PageError> {
        if let Some(url) = self.honored_override(path, mode) {
            return Ok(url);
        }
        let rel = relative(path, root)?.with_extension(mode.extension());
        Ok(format!("/{}", slash_path(&rel)))
    }

    /// URL for this page acting as the index of the area at `dir`.
    ///
    /// Dynamic links point at the directory itself (`/`, `/posts`); static
    /// links point at its `index.html`.
    pub fn index_link(&self, dir: &Path, root: &Path, mode: LinkMode) -> Result<String, PageError> {
        if let Some(url) = self.honored_override(dir, mode) {
            return Ok(url);
        }
        let rel = slash_path(&relative(dir, root)?);
        Ok(match (mode, rel.is_empty()) {
            (LinkMode::Dynamic, true) => "/".to_string(),
            (LinkMode::Dynamic, false) => format!("/{rel}"),
            (LinkMode::Static, true) => "/index.html".to_string(),
            (LinkMode::Static, false) => format!("/{rel}/index.html"),
        })
    }

    fn honored_override(&self, path: &Path, mode: LinkMode) -> Option<String> {
        let url = self.url.as_ref()?;
        if mode == LinkMode::Dynamic {
            return Some(url.clone());
        }
        log::warn!(
            "{}: custom url {url:?} ignored in static link mode",
            path.display()
        );
        None
    }
}

/// Markdown extensions enabled for both title extraction and rendering.
fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS
}

/// Literal text of the first level-1 heading, trimmed. Empty if none.
fn extract_title(content: &str) -> String {
    let mut in_title = false;
    let mut title = String::new();
    for event in Parser::new_ext(content, markdown_options()) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => in_title = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => return title.trim().to_string(),
            Event::Text(text) | Event::Code(text) if in_title => title.push_str(&text),
            Event::SoftBreak | Event::HardBreak if in_title => title.push(' '),
            _ => {}
        }
    }
    String::new()
}

fn relative<'a>(path: &'a Path, root: &Path) -> Result<&'a Path, PageError> {
    path.strip_prefix(root).map_err(|_| PageError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    })
}

/// Join path components with `/` regardless of platform.
pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
