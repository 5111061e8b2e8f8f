//! Shared test utilities for the marksite test suite.
//!
//! Provides fixture writers for content trees and themes, git helpers that
//! commit with fixed dates, a log recorder, and lookup helpers for site-tree
//! and binding data.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = TempDir::new().unwrap();
//! let theme = TempDir::new().unwrap();
//! write_theme(theme.path());
//! init_repo(source.path());
//! commit_file(source.path(), "posts/a.md", "# A", "2024-01-01T00:00:00+00:00");
//!
//! let bindings = generate_site(source.path(), theme.path(), target, LinkMode::Dynamic, &BTreeMap::new())?;
//! assert!(read_binding(&bindings, "/posts/a").contains("<h1>A</h1>"));
//! ```

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::{Mutex, Once};

use crate::area::Area;
use crate::generate::{Bindings, SiteFile};

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
}

/// A small theme exposing every context variable.
///
/// Index entries render on one line each as
/// `<li data-category="…"><a href="…">title</a> date</li>`.
pub fn write_theme(dir: &Path) {
    write_file(
        dir,
        "default.html",
        r#"<!DOCTYPE html>
<html>
<head><title>{{ title }} | {{ site_title }}</title>{{ head | safe }}</head>
<body>
<article>{{ content | safe }}</article>
<time>{{ date }}</time>
<footer>{{ foot | safe }}</footer>
</body>
</html>
"#,
    );
    write_file(
        dir,
        "index.html",
        r#"<!DOCTYPE html>
<html>
<head><title>{{ title }} | {{ site_title }}</title>{{ head | safe }}</head>
<body>
{{ content | safe }}
<ul>
{% for post in posts %}<li data-category="{{ post.category }}"><a href="{{ post.link | safe }}">{{ post.title }}</a> {{ post.date }}</li>
{% endfor %}</ul>
<footer>{{ foot | safe }}</footer>
</body>
</html>
"#,
    );
    write_file(
        dir,
        "subscribe.html",
        r#"<form method="post" action="{{ FormAction | safe }}"><input type="email" name="email"></form>"#,
    );
    write_file(dir, "message.html", "<h1>{{ Title }}</h1><p>{{ Message }}</p>");
}

// =========================================================================
// Git
// =========================================================================

/// `git init` in `dir`.
pub fn init_repo(dir: &Path) {
    git(dir, None, &["init", "-q"]);
}

/// Write `rel` and commit it with author and committer `date` (ISO 8601).
pub fn commit_file(dir: &Path, rel: &str, content: &str, date: &str) {
    write_file(dir, rel, content);
    git(dir, Some(date), &["add", rel]);
    git(dir, Some(date), &["commit", "-q", "-m", &format!("update {rel}")]);
}

/// `git rm` `rel` and commit the deletion at `date`.
pub fn remove_file(dir: &Path, rel: &str, date: &str) {
    git(dir, Some(date), &["rm", "-q", rel]);
    git(dir, Some(date), &["commit", "-q", "-m", &format!("remove {rel}")]);
}

fn git(dir: &Path, date: Option<&str>, args: &[&str]) {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir)
        .args([
            "-c",
            "user.name=Test Author",
            "-c",
            "user.email=author@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .env("GIT_CONFIG_NOSYSTEM", "1");
    if let Some(date) = date {
        cmd.env("GIT_AUTHOR_DATE", date).env("GIT_COMMITTER_DATE", date);
    }
    let status = cmd.status().expect("git must be installed to run history tests");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

// =========================================================================
// Logging
// =========================================================================

static RECORDS: Mutex<Vec<(log::Level, String)>> = Mutex::new(Vec::new());

struct Recorder;

impl log::Log for Recorder {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        RECORDS
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static RECORDER: Recorder = Recorder;

/// Route `log` records into an in-memory list for the rest of the process.
///
/// Tests run in parallel and share the list, so assertions should filter on
/// something unique to the test (a temp path, a file name).
pub fn record_logs() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        log::set_logger(&RECORDER).unwrap();
        log::set_max_level(log::LevelFilter::Trace);
    });
}

/// Messages logged at `level` that contain `needle`.
pub fn logged(level: log::Level, needle: &str) -> Vec<String> {
    RECORDS
        .lock()
        .unwrap()
        .iter()
        .filter(|(l, msg)| *l == level && msg.contains(needle))
        .map(|(_, msg)| msg.clone())
        .collect()
}

// =========================================================================
// Lookups
// =========================================================================

/// Titles of an Area's own pages, in tree order.
pub fn page_titles(area: &Area) -> Vec<&str> {
    area.pages.iter().map(|p| p.page.title()).collect()
}

/// Binding for `url`, panicking with the bound URLs if absent.
pub fn find_binding<'a>(bindings: &'a Bindings, url: &str) -> &'a SiteFile {
    bindings.get(url).unwrap_or_else(|| {
        let urls: Vec<&str> = bindings.keys().map(String::as_str).collect();
        panic!("url {url:?} not bound; have {urls:?}")
    })
}

/// Contents of the file bound at `url`.
pub fn read_binding(bindings: &Bindings, url: &str) -> String {
    fs::read_to_string(find_binding(bindings, url).path()).unwrap()
}
