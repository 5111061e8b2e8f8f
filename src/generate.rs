//! Site generation: binds every page to a URL and writes it to disk.
//!
//! Takes the site tree from [`crate::area`], renders each page through the
//! theme, and returns a [`Bindings`] map from URL to the generated file.
//!
//! ## Output layout
//!
//! Output paths mirror the source tree in both link modes. Every page is
//! written as `.html` and an Area's index as `index.html` inside its
//! directory, so a page file can never block a directory of the same name:
//!
//! ```text
//! content/               dist/                  URL (static)        URL (dynamic)
//! ├── index.md       →   ├── index.html         /index.html         /
//! ├── about.md       →   ├── about.html         /about.html         /about
//! └── posts/             └── posts/
//!     ├── index.md   →       ├── index.html     /posts/index.html   /posts
//!     └── a.md       →       └── a.html         /posts/a.html       /posts/a
//! ```
//!
//! URLs come from [`Page::link`] and [`Page::index_link`]. In dynamic mode
//! they resolve through the [`Bindings`] map, so a page with a `url:`
//! override is bound at its override while its file stays at the
//! source-derived path.
//!
//! ## Posts
//!
//! Every non-index page is a post. An Area's index lists all posts in that
//! Area and below, newest first (see [`Post::chronological`]).
//!
//! ## Custom pages
//!
//! Custom pages are rendered from a named theme template and bound after
//! the source pages. Binding any URL twice is a [`GenerateError::UrlCollision`]
//! and two URLs landing on the same file is a
//! [`GenerateError::OutputCollision`]. Both are checked before the file is
//! written, so nothing is ever overwritten silently.
//!
//! ## Code blocks
//!
//! Fenced code is highlighted with the style named by
//! [`GenerateOptions::code_style`] (see [`crate::highlight`]). An empty
//! style leaves code blocks as plain `<pre><code>`.

use crate::area::{self, Area, AreaError, SourcePage};
use crate::config::{self, ConfigError};
use crate::highlight::{HighlightError, Highlighter};
use crate::page::{LinkMode, Page, PageError, slash_path};
use crate::theme::{DefaultData, IndexData, Theme, ThemeError};
use crate::types::{CustomPage, Post, ThemePost};
use chrono::{DateTime, FixedOffset};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Highlight(#[from] HighlightError),
    #[error("url {url} is bound twice: by {first} and by {second}")]
    UrlCollision {
        url: String,
        first: String,
        second: String,
    },
    #[error("output file {path} is claimed twice: by {first} and by {second}")]
    OutputCollision {
        path: PathBuf,
        first: String,
        second: String,
    },
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure of a full source-to-site build.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Area(#[from] AreaError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

// ============================================================================
// Site files
// ============================================================================

/// A generated file backed by a Markdown source.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFile {
    pub path: PathBuf,
    pub source: PathBuf,
    pub is_post: bool,
    pub title: String,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A generated file rendered from a custom page template.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomFile {
    pub path: PathBuf,
    pub template: String,
}

/// Anything reachable by URL in a generated site.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteFile {
    Page(PageFile),
    Custom(CustomFile),
}

impl SiteFile {
    /// Location of the generated file on disk.
    pub fn path(&self) -> &Path {
        match self {
            SiteFile::Page(f) => &f.path,
            SiteFile::Custom(f) => &f.path,
        }
    }

    pub fn is_post(&self) -> bool {
        matches!(self, SiteFile::Page(f) if f.is_post)
    }

    pub fn post_title(&self) -> &str {
        match self {
            SiteFile::Page(f) => &f.title,
            SiteFile::Custom(_) => "",
        }
    }

    /// Publication time, when the file is a timed page.
    pub fn post_time(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            SiteFile::Page(f) => f.time,
            SiteFile::Custom(_) => None,
        }
    }

    /// Human-readable origin, used in collision errors.
    fn origin(&self) -> String {
        match self {
            SiteFile::Page(f) => f.source.display().to_string(),
            SiteFile::Custom(f) => format!("custom page ({})", f.template),
        }
    }
}

/// URL → generated file.
pub type Bindings = BTreeMap<String, SiteFile>;

// ============================================================================
// Generation
// ============================================================================

/// Settings for one generation pass.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Directory generated files are written under.
    pub target: PathBuf,
    /// Theme directory, loaded once per pass.
    pub theme: PathBuf,
    pub head: String,
    pub foot: String,
    pub mode: LinkMode,
    /// Code highlighting style; empty disables highlighting.
    pub code_style: String,
}

/// Render `tree` into `options.target` and bind every page to its URL.
pub fn generate(
    tree: &Area,
    options: &GenerateOptions,
    custom_pages: &BTreeMap<String, CustomPage>,
) -> Result<Bindings, GenerateError> {
    let theme = Theme::load(&options.theme)?;
    let highlighter = match options.code_style.as_str() {
        "" => None,
        style => Some(Highlighter::new(style)?),
    };
    let mut generator = Generator {
        root: &tree.dir,
        site_title: tree.index.title(),
        options,
        theme,
        highlighter,
        bindings: Bindings::new(),
        claimed: HashMap::new(),
    };

    generator.area(tree)?;
    for (url, page) in custom_pages {
        generator.custom(url, page)?;
    }

    log::info!(
        "generated {} files into {}",
        generator.bindings.len(),
        options.target.display()
    );
    Ok(generator.bindings)
}

/// Load the site config from `source`, build its tree and generate it.
///
/// `custom_pages` are merged with the ones declared in `site.toml`; the same
/// URL declared in both places is a collision.
pub fn generate_site(
    source: &Path,
    theme: &Path,
    target: &Path,
    mode: LinkMode,
    custom_pages: &BTreeMap<String, CustomPage>,
) -> Result<Bindings, BuildError> {
    let config = config::load_config(source)?;
    let tree = area::build(source, &config)?;

    let mut pages = config.custom_pages();
    for (url, page) in custom_pages {
        match pages.entry(url.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(page.clone());
            }
            Entry::Occupied(existing) => {
                return Err(GenerateError::UrlCollision {
                    url: url.clone(),
                    first: format!("{} custom page ({})", config::CONFIG_FILE, existing.get().template),
                    second: format!("custom page ({})", page.template),
                }
                .into());
            }
        }
    }

    let options = GenerateOptions {
        target: target.to_path_buf(),
        theme: theme.to_path_buf(),
        code_style: config.code_style().to_string(),
        head: config.head,
        foot: config.foot,
        mode,
    };
    Ok(generate(&tree, &options, &pages)?)
}

struct Generator<'a> {
    root: &'a Path,
    site_title: &'a str,
    options: &'a GenerateOptions,
    theme: Theme,
    highlighter: Option<Highlighter>,
    bindings: Bindings,
    /// Output path → URL bound to it.
    claimed: HashMap<PathBuf, String>,
}

impl Generator<'_> {
    /// Generate an Area's pages, its nested Areas, then its index.
    /// Returns every post in the subtree.
    fn area(&mut self, area: &Area) -> Result<Vec<Post>, GenerateError> {
        let mut posts = Vec::new();
        for source in &area.pages {
            posts.push(self.page(&area.name, source)?);
        }
        for child in &area.areas {
            posts.extend(self.area(child)?);
        }
        self.index(area, &posts)?;
        Ok(posts)
    }

    fn page(&mut self, category: &str, source: &SourcePage) -> Result<Post, GenerateError> {
        let mode = self.options.mode;
        let page = &source.page;
        let url = page.link(&source.path, self.root, mode)?;
        let rel = source
            .path
            .strip_prefix(self.root)
            .map_err(|_| PageError::OutsideRoot {
                path: source.path.clone(),
                root: self.root.to_path_buf(),
            })?;
        let path = self.options.target.join(rel.with_extension(HTML));

        let html = self.theme.render_default(&DefaultData {
            title: page.title(),
            content: &page.render_html(self.highlighter.as_ref()),
            site_title: self.site_title,
            date: &page.date(),
            head: &self.options.head,
            foot: &self.options.foot,
        })?;

        self.bind(
            &url,
            SiteFile::Page(PageFile {
                path,
                source: source.path.clone(),
                is_post: true,
                title: page.title().to_string(),
                time: page.timing().map(|t| t.published),
            }),
            &html,
        )?;

        Ok(Post {
            title: page.title().to_string(),
            category: category.to_string(),
            link: url,
            timing: page.timing().copied(),
        })
    }

    fn index(&mut self, area: &Area, posts: &[Post]) -> Result<(), GenerateError> {
        let mode = self.options.mode;
        let page: &Page = &area.index;
        let url = page.index_link(&area.dir, self.root, mode)?;
        let rel = area.dir.strip_prefix(self.root).unwrap_or(Path::new(""));
        let path = self.options.target.join(rel).join(INDEX_HTML);

        let mut sorted = posts.to_vec();
        sorted.sort_by(Post::chronological);
        let theme_posts: Vec<ThemePost> = sorted.iter().map(Post::to_theme).collect();

        let html = self.theme.render_index(&IndexData {
            title: page.title(),
            content: &page.render_html(self.highlighter.as_ref()),
            site_title: self.site_title,
            posts: &theme_posts,
            head: &self.options.head,
            foot: &self.options.foot,
        })?;

        self.bind(
            &url,
            SiteFile::Page(PageFile {
                path,
                source: area.dir.join(area::INDEX_FILE),
                is_post: false,
                title: page.title().to_string(),
                time: page.timing().map(|t| t.published),
            }),
            &html,
        )
    }

    fn custom(&mut self, url: &str, page: &CustomPage) -> Result<(), GenerateError> {
        let html = self.theme.render_custom(&page.template, &page.data)?;
        let path = custom_output_path(&self.options.target, url);
        self.bind(
            url,
            SiteFile::Custom(CustomFile {
                path,
                template: page.template.clone(),
            }),
            &html,
        )
    }

    /// Claim `url` and the file's output path, then write `html` to it.
    fn bind(&mut self, url: &str, file: SiteFile, html: &str) -> Result<(), GenerateError> {
        if let Some(existing) = self.bindings.get(url) {
            return Err(GenerateError::UrlCollision {
                url: url.to_string(),
                first: existing.origin(),
                second: file.origin(),
            });
        }
        if let Some(other) = self.claimed.get(file.path()) {
            let first = match self.bindings.get(other) {
                Some(existing) => format!("{other} ({})", existing.origin()),
                None => other.clone(),
            };
            return Err(GenerateError::OutputCollision {
                path: file.path().to_path_buf(),
                first,
                second: format!("{url} ({})", file.origin()),
            });
        }

        write_file(file.path(), html)?;
        log::debug!("{url} -> {}", file.path().display());
        self.claimed.insert(file.path().to_path_buf(), url.to_string());
        self.bindings.insert(url.to_string(), file);
        Ok(())
    }
}

const HTML: &str = "html";
const INDEX_HTML: &str = "index.html";

/// Output path for a custom page bound at `url`.
///
/// `/subscribe` becomes `subscribe.html`, a URL ending in `/` gets an
/// `index.html`, and an explicit extension (`/feed.xml`) is kept.
fn custom_output_path(target: &Path, url: &str) -> PathBuf {
    let rel = url.trim_start_matches('/');
    if rel.is_empty() || rel.ends_with('/') {
        return target.join(rel).join(INDEX_HTML);
    }
    let rel = PathBuf::from(rel);
    match rel.extension() {
        Some(_) => target.join(rel),
        None => target.join(rel.with_extension(HTML)),
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), GenerateError> {
    let io_err = |source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

/// Target-relative, `/`-separated form of a generated path, for display.
pub fn display_path(file: &SiteFile, target: &Path) -> String {
    file.path()
        .strip_prefix(target)
        .map(slash_path)
        .unwrap_or_else(|_| file.path().display().to_string())
}
