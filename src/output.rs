//! CLI output formatting for builds.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Each bound URL is
//! listed under its role (post, page, custom page) with its title and the
//! generated file, and the URL and date shown as indented context lines:
//!
//! ```text
//! Posts
//! 001 Hello World → posts/hello.html
//!     URL: /posts/hello.html
//!     Published: Jan 01, 2024
//!
//! Pages
//! 001 Home → index.html
//!     URL: /index.html
//!
//! Custom pages
//! 001 /subscribe → subscribe.html
//!     Template: subscribe.html
//!
//! Generated 1 post, 1 page, 1 custom page
//! ```
//!
//! Posts are listed newest first; pages and custom pages by URL.
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! [`bindings_json`] renders the same map as the `bindings.json` manifest
//! written next to a built site.

use crate::generate::{Bindings, SiteFile, display_path};
use crate::timing::DATE_FORMAT;
use serde::Serialize;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `"1 post"`, `"2 posts"`.
fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Title for display; untitled pages show their URL in parens.
fn display_title(title: &str, url: &str) -> String {
    if title.is_empty() {
        format!("({url})")
    } else {
        title.to_string()
    }
}

// ============================================================================
// Bindings
// ============================================================================

/// Format the result of a build.
pub fn format_bindings(bindings: &Bindings, target: &Path) -> Vec<String> {
    let mut posts = Vec::new();
    let mut pages = Vec::new();
    let mut custom = Vec::new();
    for (url, file) in bindings {
        match file {
            SiteFile::Custom(_) => custom.push((url, file)),
            SiteFile::Page(_) if file.is_post() => posts.push((url, file)),
            SiteFile::Page(_) => pages.push((url, file)),
        }
    }
    // newest first, untimed last; BTreeMap order breaks ties
    posts.sort_by(|(_, a), (_, b)| b.post_time().cmp(&a.post_time()));

    let mut lines = Vec::new();
    push_section(&mut lines, "Posts", &posts, target);
    push_section(&mut lines, "Pages", &pages, target);
    push_section(&mut lines, "Custom pages", &custom, target);

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Generated {}, {}, {}",
        plural(posts.len(), "post"),
        plural(pages.len(), "page"),
        plural(custom.len(), "custom page")
    ));
    lines
}

fn push_section(
    lines: &mut Vec<String>,
    heading: &str,
    entries: &[(&String, &SiteFile)],
    target: &Path,
) {
    if entries.is_empty() {
        return;
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(heading.to_string());
    for (i, (url, file)) in entries.iter().enumerate() {
        lines.extend(format_entry(i + 1, url, file, target));
    }
}

fn format_entry(index: usize, url: &str, file: &SiteFile, target: &Path) -> Vec<String> {
    let path = display_path(file, target);
    match file {
        SiteFile::Page(_) => {
            let mut lines = vec![
                format!(
                    "{} {} → {}",
                    format_index(index),
                    display_title(file.post_title(), url),
                    path
                ),
                format!("{}URL: {}", indent(1), url),
            ];
            if let Some(time) = file.post_time() {
                lines.push(format!("{}Published: {}", indent(1), time.format(DATE_FORMAT)));
            }
            lines
        }
        SiteFile::Custom(custom) => vec![
            format!("{} {} → {}", format_index(index), url, path),
            format!("{}Template: {}", indent(1), custom.template),
        ],
    }
}

/// Print build output to stdout.
pub fn print_bindings(bindings: &Bindings, target: &Path) {
    for line in format_bindings(bindings, target) {
        println!("{}", line);
    }
}

// ============================================================================
// bindings.json
// ============================================================================

/// One row of `bindings.json`.
#[derive(Debug, Serialize, PartialEq)]
struct BindingRecord<'a> {
    url: &'a str,
    path: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<String>,
}

/// Serialize the bindings as pretty JSON, paths relative to `target`.
pub fn bindings_json(bindings: &Bindings, target: &Path) -> Result<String, serde_json::Error> {
    let records: Vec<BindingRecord<'_>> = bindings
        .iter()
        .map(|(url, file)| BindingRecord {
            url,
            path: display_path(file, target),
            kind: match file {
                SiteFile::Custom(_) => "custom",
                SiteFile::Page(_) if file.is_post() => "post",
                SiteFile::Page(_) => "page",
            },
            title: file.post_title(),
            published: file.post_time().map(|t| t.to_rfc3339()),
        })
        .collect();
    serde_json::to_string_pretty(&records)
}
