//! Theme loading and rendering.
//!
//! A theme is a directory of [Tera](https://keats.github.io/tera/) templates.
//! Every `*.html` file at its top level is registered under its file name:
//!
//! ```text
//! theme/
//! ├── default.html      # required: ordinary pages
//! ├── index.html        # required: Area index pages
//! ├── subscribe.html    # optional: custom pages refer to these by name
//! └── message.html
//! ```
//!
//! Templates may `{% extends %}` or `{% include %}` each other; they are
//! registered as one batch so inheritance resolves regardless of file order.
//!
//! ## Template context
//!
//! | Variable     | `default.html` | `index.html` |
//! |--------------|----------------|--------------|
//! | `title`      | page title     | index title  |
//! | `content`    | rendered HTML  | rendered HTML|
//! | `site_title` | root index title | root index title |
//! | `date`       | `Jan 02, 2006` or `""` | n/a |
//! | `posts`      | n/a            | `[{title, category, link, date}]` |
//! | `head`/`foot`| config fragments | config fragments |
//!
//! `.html` templates are autoescaped, so `content`, `head` and `foot` must
//! be written `{{ content | safe }}`.

use crate::types::ThemePost;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use thiserror::Error;
use walkdir::WalkDir;

pub const DEFAULT_TEMPLATE: &str = "default.html";
pub const INDEX_TEMPLATE: &str = "index.html";

#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("cannot read theme {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse theme {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("theme {path} has no template named {name}")]
    MissingTemplate { path: PathBuf, name: String },
    #[error("template {template} failed: {message}")]
    Execution { template: String, message: String },
}

/// Context for `default.html`.
#[derive(Debug, Serialize)]
pub struct DefaultData<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub site_title: &'a str,
    pub date: &'a str,
    pub head: &'a str,
    pub foot: &'a str,
}

/// Context for `index.html`.
#[derive(Debug, Serialize)]
pub struct IndexData<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub site_title: &'a str,
    pub posts: &'a [ThemePost],
    pub head: &'a str,
    pub foot: &'a str,
}

/// A loaded theme, ready to render.
pub struct Theme {
    dir: PathBuf,
    tera: Tera,
}

impl Theme {
    /// Parse every template in `dir`.
    ///
    /// Fails if a template does not parse or if `default.html` or
    /// `index.html` is missing.
    pub fn load(dir: &Path) -> Result<Theme, ThemeError> {
        let io_err = |source: std::io::Error| ThemeError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut templates = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| io_err(e.into()))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !entry.file_type().is_file() || !name.ends_with(".html") {
                continue;
            }
            let source = fs::read_to_string(entry.path()).map_err(io_err)?;
            templates.push((name, source));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::Parse {
                path: dir.to_path_buf(),
                message: describe(&e),
            })?;

        let theme = Theme {
            dir: dir.to_path_buf(),
            tera,
        };
        for required in [DEFAULT_TEMPLATE, INDEX_TEMPLATE] {
            if !theme.has_template(required) {
                return Err(theme.missing(required));
            }
        }
        Ok(theme)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn render_default(&self, data: &DefaultData<'_>) -> Result<String, ThemeError> {
        self.render_serialized(DEFAULT_TEMPLATE, data)
    }

    pub fn render_index(&self, data: &IndexData<'_>) -> Result<String, ThemeError> {
        self.render_serialized(INDEX_TEMPLATE, data)
    }

    /// Render a named template with flat string data, for custom pages.
    pub fn render_custom(
        &self,
        template: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<String, ThemeError> {
        if !self.has_template(template) {
            return Err(self.missing(template));
        }
        self.render_serialized(template, data)
    }

    fn render_serialized<T: Serialize>(&self, template: &str, data: &T) -> Result<String, ThemeError> {
        let failed = |e: tera::Error| ThemeError::Execution {
            template: template.to_string(),
            message: describe(&e),
        };
        let context = Context::from_serialize(data).map_err(failed)?;
        self.tera.render(template, &context).map_err(failed)
    }

    fn missing(&self, name: &str) -> ThemeError {
        ThemeError::MissingTemplate {
            path: self.dir.clone(),
            name: name.to_string(),
        }
    }
}

/// Tera keeps the useful detail in the source chain; flatten it.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
