//! # marksite
//!
//! A static site generator for Markdown blogs. Your filesystem is the data
//! source: directories become categories, Markdown files become posts, and
//! every directory's `index.md` lists the posts beneath it, newest first.
//!
//! # Architecture: One Pass Per Build
//!
//! ```text
//! 1. Area      content/  →  site tree     (filesystem + git → pages, categories)
//! 2. Generate  site tree →  dist/         (theme render + URL bindings)
//! 3. Serve     bindings  →  HTTP          (once at startup, or per request)
//! ```
//!
//! A build is a pure function of the content tree, its git history and the
//! theme. Nothing persists between builds, which is what lets the live
//! server simply rebuild everything on every request.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`frontmatter`] | Splits the `---` metadata block from Markdown content |
//! | [`page`] | Parses one source file: title, URL override, timing, link modes |
//! | [`highlight`] | Syntax highlighting for fenced code blocks |
//! | [`timing`] | Explicit timestamps and git-derived publish/update times |
//! | [`area`] | Walks the content directory into a tree of Areas |
//! | [`theme`] | Loads a Tera theme directory and renders pages |
//! | [`generate`] | Renders the tree, writes files, and binds each one to a unique URL |
//! | [`serve`] | Static and live-reload handlers behind a tiny_http worker pool |
//! | [`config`] | `site.toml` loading and validation, server settings |
//! | [`types`] | Shared types: posts and custom pages |
//! | [`output`] | CLI output formatting and the `bindings.json` manifest |
//!
//! # Design Decisions
//!
//! ## Two Link Modes
//!
//! Static links (`/posts/a.html`) map one-to-one onto generated files, so
//! the output can be dropped on any file server. Dynamic links (`/posts/a`)
//! need a server that knows the bindings, and in exchange honor per-page
//! `url:` overrides. A page asking for an override in static mode gets a
//! warning and its path-derived link.
//!
//! ## Git As The Clock
//!
//! Pages that don't declare `published`/`updated` are dated from the commits
//! that touched them: first commit is the publish date, last is the update.
//! Declaring either field opts the page out of git entirely.
//!
//! ## Themes At Runtime
//!
//! Page templates are [Tera](https://keats.github.io/tera/) files loaded from
//! a theme directory on every build, so theme edits show up under live
//! reload without recompiling. The one page the server renders itself (the
//! build error page) is written with [Maud](https://maud.lambda.xyz/).
//!
//! ## URL Uniqueness
//!
//! Every URL is bound exactly once and every output file is written exactly
//! once. Two pages claiming the same URL, or a custom page landing on a
//! content page's URL or file, fails the build rather than silently dropping
//! one of them.

pub mod area;
pub mod config;
pub mod frontmatter;
pub mod generate;
pub mod highlight;
pub mod output;
pub mod page;
pub mod serve;
pub mod theme;
pub mod timing;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
