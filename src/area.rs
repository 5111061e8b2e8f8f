//! Site tree construction.
//!
//! Walks a content directory and builds a tree of [`Area`]s, one per
//! directory. Each entry is classified by name and type:
//!
//! ```text
//! content/
//! ├── index.md          # root Area's index page (its title is the site title)
//! ├── about.md          # page
//! ├── site.toml         # config, never content
//! ├── .git/             # hidden, skipped
//! ├── logo.png          # not Markdown, skipped
//! └── posts/            # nested Area, category "posts"
//!     ├── index.md
//!     └── a.md
//! ```
//!
//! ## Rules
//!
//! - Entries are visited in file-name order, so the tree is deterministic.
//! - Hidden entries (leading `.`) are skipped. This covers `.git`, `.hg`
//!   and `.svn`.
//! - Names listed in the site config `ignore` list are skipped.
//! - Every Area has exactly one index page. Without an `index.md` an empty
//!   one titled after the directory is put in its place.
//! - Symlinked directories are followed. A link back to a directory that is
//!   already being walked is a [`AreaError::Cycle`].
//!
//! ## Timing
//!
//! Pages whose metadata names no timestamps are timed from git. The enclosing
//! repository is discovered once per build; content outside any repository
//! stays untimed.

use crate::config::{CONFIG_FILE, SiteConfig};
use crate::page::{Page, PageError};
use crate::timing::{History, TimingError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File name that marks an Area's index page.
pub const INDEX_FILE: &str = "index.md";

const MARKDOWN_EXTENSION: &str = "md";

#[derive(Error, Debug)]
pub enum AreaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot list directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Timing(#[from] TimingError),
    #[error("symlink cycle: {0} links back to a directory being walked")]
    Cycle(PathBuf),
}

/// A parsed page together with the source file it came from.
#[derive(Debug, Clone)]
pub struct SourcePage {
    pub path: PathBuf,
    pub page: Page,
}

/// One directory of the site tree.
#[derive(Debug, Clone)]
pub struct Area {
    /// Directory name, used as the category of its pages. `""` for the root.
    pub name: String,
    pub dir: PathBuf,
    pub index: Page,
    pub pages: Vec<SourcePage>,
    pub areas: Vec<Area>,
}

/// Build the site tree rooted at `root`.
pub fn build(root: &Path, config: &SiteConfig) -> Result<Area, AreaError> {
    let history = History::discover(root)?;
    if history.is_none() {
        log::debug!(
            "{} is not in a git repository; pages without dates stay untimed",
            root.display()
        );
    }
    let mut builder = Builder {
        config,
        history,
        walking: Vec::new(),
    };
    builder.area(root, String::new())
}

struct Builder<'a> {
    config: &'a SiteConfig,
    history: Option<History>,
    /// Canonical paths of the directories currently on the walk stack.
    walking: Vec<PathBuf>,
}

impl Builder<'_> {
    fn area(&mut self, dir: &Path, name: String) -> Result<Area, AreaError> {
        let canonical = dir.canonicalize()?;
        if self.walking.contains(&canonical) {
            return Err(AreaError::Cycle(dir.to_path_buf()));
        }
        self.walking.push(canonical);

        let mut index = None;
        let mut pages = Vec::new();
        let mut areas = Vec::new();

        for entry in collect_entries(dir, self.config)? {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();

            if entry.file_type().is_dir() {
                areas.push(self.area(path, file_name)?);
            } else if file_name == INDEX_FILE {
                index = Some(self.page(path)?);
            } else if is_markdown(path) {
                pages.push(SourcePage {
                    path: path.to_path_buf(),
                    page: self.page(path)?,
                });
            } else {
                log::debug!("skipping non-Markdown file {}", path.display());
            }
        }

        self.walking.pop();

        let index = index.unwrap_or_else(|| {
            log::debug!("{} has no {INDEX_FILE}; using an empty index", dir.display());
            Page::placeholder(name.clone())
        });

        Ok(Area {
            name,
            dir: dir.to_path_buf(),
            index,
            pages,
            areas,
        })
    }

    fn page(&self, path: &Path) -> Result<Page, AreaError> {
        let mut page = Page::parse(path)?;
        if page.timing().is_some() {
            return Ok(page);
        }
        if let Some(history) = &self.history {
            page.set_timing(history.resolve(path)?);
        }
        Ok(page)
    }
}

/// Immediate children of `dir` that take part in the site, sorted by name.
fn collect_entries(dir: &Path, config: &SiteConfig) -> Result<Vec<walkdir::DirEntry>, AreaError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            if e.loop_ancestor().is_some() {
                AreaError::Cycle(e.path().unwrap_or(dir).to_path_buf())
            } else {
                AreaError::Walk(e)
            }
        })?;
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name == CONFIG_FILE || config.ignores(&name) {
            log::debug!("ignoring {}", entry.path().display());
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
        .unwrap_or(false)
}
