//! HTTP serving of a generated site.
//!
//! Two [`Handler`]s answer URL lookups against a site's bindings:
//!
//! - [`StaticHandler`] builds once at startup and answers from an immutable
//!   map. The generated files live in a temporary directory owned by the
//!   handler.
//! - [`LiveHandler`] rebuilds the whole site for every request, so edits to
//!   content or theme show up on the next reload. A failed build answers
//!   with a 500 error page and the server keeps going.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────┐
//!  Ctrl+C ──────▶│ tiny_http    │◀── connections
//!  (unblock)     │ Server       │
//!                └──────┬───────┘
//!          recv()       │      recv()
//!        ┌──────────────┼──────────────┐
//!        ▼              ▼              ▼
//!    worker 1       worker 2  ...  worker N
//!        └───── Handler::handle(url) ──┘
//! ```
//!
//! ## URL lookup
//!
//! The query string and fragment are dropped, then the path is tried as is,
//! without its trailing `/` (so `/posts/` reaches the dynamic `/posts`), and
//! finally as `<path>/index.html` so `/` and `/posts/` reach static-mode
//! indices.

use crate::config::{self, ConfigError, ServeConfig};
use crate::generate::{self, Bindings, BuildError, SiteFile};
use crate::page::LinkMode;
use maud::{DOCTYPE, Markup, html};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot listen on {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },
    #[error("cannot install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

// ============================================================================
// Handlers
// ============================================================================

/// Outcome of a URL lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Found {
        body: Vec<u8>,
        content_type: &'static str,
    },
    NotFound,
    /// The site could not be built or the artifact could not be read.
    Error(String),
}

impl Reply {
    pub fn status(&self) -> u16 {
        match self {
            Reply::Found { .. } => 200,
            Reply::NotFound => 404,
            Reply::Error(_) => 500,
        }
    }
}

/// Answers requests for one site.
pub trait Handler: Send + Sync {
    fn handle(&self, url: &str) -> Reply;
}

/// Serves a site built once at construction.
pub struct StaticHandler {
    bindings: Bindings,
    // Generated files are deleted when the handler is dropped
    _target: TempDir,
}

impl StaticHandler {
    pub fn new(source: &Path, theme: &Path, mode: LinkMode) -> Result<StaticHandler, ServeError> {
        let target = TempDir::new()?;
        let bindings =
            generate::generate_site(source, theme, target.path(), mode, &BTreeMap::new())?;
        log::info!("built {} urls from {}", bindings.len(), source.display());
        Ok(StaticHandler {
            bindings,
            _target: target,
        })
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

impl Handler for StaticHandler {
    fn handle(&self, url: &str) -> Reply {
        match lookup(&self.bindings, url) {
            Some(file) => read_artifact(file),
            None => Reply::NotFound,
        }
    }
}

/// Rebuilds the site on every request.
pub struct LiveHandler {
    source: PathBuf,
    theme: PathBuf,
    mode: LinkMode,
}

impl LiveHandler {
    pub fn new(source: &Path, theme: &Path, mode: LinkMode) -> LiveHandler {
        LiveHandler {
            source: source.to_path_buf(),
            theme: theme.to_path_buf(),
            mode,
        }
    }

    fn build_and_read(&self, url: &str) -> Result<Reply, ServeError> {
        let target = TempDir::new()?;
        let bindings = generate::generate_site(
            &self.source,
            &self.theme,
            target.path(),
            self.mode,
            &BTreeMap::new(),
        )?;
        // Read before `target` goes out of scope and removes the files
        Ok(match lookup(&bindings, url) {
            Some(file) => read_artifact(file),
            None => Reply::NotFound,
        })
    }
}

impl Handler for LiveHandler {
    fn handle(&self, url: &str) -> Reply {
        log::debug!("rebuilding {} for {url}", self.source.display());
        match self.build_and_read(url) {
            Ok(reply) => reply,
            Err(err) => {
                log::error!("build failed for {url}: {err}");
                Reply::Error(err.to_string())
            }
        }
    }
}

/// Pick the handler for `config`: live rebuilds or a one-time build.
pub fn handler_for(
    source: &Path,
    theme: &Path,
    config: &ServeConfig,
) -> Result<Arc<dyn Handler>, ServeError> {
    if config.livereload {
        return Ok(Arc::new(LiveHandler::new(source, theme, config.link_mode)));
    }
    Ok(Arc::new(StaticHandler::new(source, theme, config.link_mode)?))
}

/// Find the binding for a request URL.
pub fn lookup<'a>(bindings: &'a Bindings, url: &str) -> Option<&'a SiteFile> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = if path.is_empty() { "/" } else { path };
    let trimmed = path.trim_end_matches('/');
    bindings
        .get(path)
        .or_else(|| bindings.get(trimmed).filter(|_| !trimmed.is_empty()))
        .or_else(|| bindings.get(&format!("{trimmed}/index.html")))
}

fn read_artifact(file: &SiteFile) -> Reply {
    match fs::read(file.path()) {
        Ok(body) => Reply::Found {
            body,
            content_type: guess_content_type(file.path()),
        },
        Err(err) => Reply::Error(format!("cannot read {}: {err}", file.path().display())),
    }
}

/// Guess MIME content type from file extension.
///
/// Files without an extension are served as HTML.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        None | Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Page shown when a live build fails.
pub fn error_page(message: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { "Build failed" }
            }
            body {
                h1 { "Build failed" }
                pre { (message) }
                p { "Fix the error and reload." }
            }
        }
    }
}

// ============================================================================
// Server loop
// ============================================================================

/// Listen on `config.interface:config.port` until Ctrl+C.
pub fn serve(handler: Arc<dyn Handler>, config: &ServeConfig) -> Result<(), ServeError> {
    config.validate()?;
    let interface: IpAddr = config
        .interface
        .parse()
        .map_err(|e: std::net::AddrParseError| ConfigError::Validation(e.to_string()))?;
    let addr = SocketAddr::new(interface, config.port);

    let server = Server::http(addr).map_err(|e| ServeError::Bind {
        addr,
        message: e.to_string(),
    })?;
    let server = Arc::new(server);
    let workers = config::effective_workers(config);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log::info!("shutting down...");
        for _ in 0..workers {
            server_for_signal.unblock();
        }
    })?;

    log::info!(
        "listening on http://{addr} ({} mode, {workers} workers)",
        if config.livereload { "live" } else { "static" }
    );
    run(server, handler, workers);
    Ok(())
}

/// Answer requests on `workers` threads until the server is unblocked
/// once per worker.
pub fn run(server: Arc<Server>, handler: Arc<dyn Handler>, workers: usize) {
    let threads: Vec<_> = (0..workers.max(1))
        .map(|_| {
            let server = Arc::clone(&server);
            let handler = Arc::clone(&handler);
            thread::spawn(move || {
                while let Ok(request) = server.recv() {
                    if let Err(err) = respond(request, handler.as_ref()) {
                        log::warn!("failed to send response: {err}");
                    }
                }
            })
        })
        .collect();

    for thread in threads {
        if thread.join().is_err() {
            log::error!("request worker panicked");
        }
    }
}

fn respond(request: Request, handler: &dyn Handler) -> io::Result<()> {
    let reply = handler.handle(request.url());
    log::debug!("{} {} -> {}", request.method(), request.url(), reply.status());

    let status = StatusCode(reply.status());
    let (body, content_type) = match reply {
        Reply::Found { body, content_type } => (body, content_type),
        Reply::NotFound => (b"404 Not Found".to_vec(), "text/plain; charset=utf-8"),
        Reply::Error(message) => (
            error_page(&message).into_string().into_bytes(),
            "text/html; charset=utf-8",
        ),
    };

    let mut response = Response::from_data(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        response = response.with_header(header);
    }
    request.respond(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{CustomFile, PageFile};
    use crate::test_helpers::{write_file, write_theme};

    fn body(reply: Reply) -> String {
        match reply {
            Reply::Found { body, .. } => String::from_utf8(body).unwrap(),
            other => panic!("expected a page, got {other:?}"),
        }
    }

    fn site() -> (TempDir, TempDir) {
        let source = TempDir::new().unwrap();
        let theme = TempDir::new().unwrap();
        write_theme(theme.path());
        write_file(source.path(), "index.md", "# Home");
        write_file(source.path(), "posts/a.md", "# A\n\nfirst draft");
        (source, theme)
    }

    fn page_binding(path: &str) -> SiteFile {
        SiteFile::Page(PageFile {
            path: PathBuf::from(path),
            source: PathBuf::from("src.md"),
            is_post: true,
            title: String::new(),
            time: None,
        })
    }

    #[test]
    fn lookup_exact_then_index_fallback() {
        let bindings = Bindings::from([
            ("/index.html".to_string(), page_binding("/t/index.html")),
            ("/posts/index.html".to_string(), page_binding("/t/posts/index.html")),
            ("/posts/a".to_string(), page_binding("/t/posts/a")),
        ]);

        assert_eq!(lookup(&bindings, "/posts/a").unwrap().path(), Path::new("/t/posts/a"));
        assert_eq!(lookup(&bindings, "/").unwrap().path(), Path::new("/t/index.html"));
        assert_eq!(lookup(&bindings, "").unwrap().path(), Path::new("/t/index.html"));
        assert_eq!(
            lookup(&bindings, "/posts/").unwrap().path(),
            Path::new("/t/posts/index.html")
        );
        assert_eq!(
            lookup(&bindings, "/posts").unwrap().path(),
            Path::new("/t/posts/index.html")
        );
        assert!(lookup(&bindings, "/missing").is_none());
    }

    #[test]
    fn lookup_trailing_slash_reaches_dynamic_index() {
        let bindings = Bindings::from([
            ("/".to_string(), page_binding("/t/index.html")),
            ("/posts".to_string(), page_binding("/t/posts/index.html")),
            ("/posts/a".to_string(), page_binding("/t/posts/a.html")),
        ]);

        assert_eq!(
            lookup(&bindings, "/posts/").unwrap().path(),
            Path::new("/t/posts/index.html")
        );
        assert_eq!(
            lookup(&bindings, "/posts/a/?x=1").unwrap().path(),
            Path::new("/t/posts/a.html")
        );
        assert_eq!(lookup(&bindings, "/").unwrap().path(), Path::new("/t/index.html"));
    }

    #[test]
    fn dynamic_handler_answers_with_and_without_trailing_slash() {
        let (source, theme) = site();
        let handler = StaticHandler::new(source.path(), theme.path(), LinkMode::Dynamic).unwrap();

        let bare = body(handler.handle("/posts"));
        assert!(bare.contains(">A<"));
        assert_eq!(body(handler.handle("/posts/")), bare);
    }

    #[test]
    fn lookup_ignores_query_and_fragment() {
        let bindings = Bindings::from([(
            "/thanks".to_string(),
            SiteFile::Custom(CustomFile {
                path: PathBuf::from("/t/thanks"),
                template: "message.html".into(),
            }),
        )]);
        assert!(lookup(&bindings, "/thanks?ref=mail").is_some());
        assert!(lookup(&bindings, "/thanks#top").is_some());
    }

    #[test]
    fn content_types() {
        assert_eq!(guess_content_type(Path::new("a/b")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("feed.xml")), "application/xml; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("x.bin")), "application/octet-stream");
    }

    #[test]
    fn static_handler_serves_static_mode_index_at_root() {
        let (source, theme) = site();
        let handler = StaticHandler::new(source.path(), theme.path(), LinkMode::Static).unwrap();

        assert!(body(handler.handle("/")).contains("<h1>Home</h1>"));
        assert!(body(handler.handle("/posts/a.html")).contains("first draft"));
        assert_eq!(handler.handle("/posts/a"), Reply::NotFound);
    }

    #[test]
    fn static_handler_keeps_first_build() {
        let (source, theme) = site();
        let handler = StaticHandler::new(source.path(), theme.path(), LinkMode::Dynamic).unwrap();

        write_file(source.path(), "posts/a.md", "# A\n\nsecond draft");
        assert!(body(handler.handle("/posts/a")).contains("first draft"));
    }

    #[test]
    fn static_handler_fails_on_broken_site() {
        let (source, theme) = site();
        write_file(source.path(), "broken.md", "---\nnever closed");
        assert!(StaticHandler::new(source.path(), theme.path(), LinkMode::Static).is_err());
    }

    #[test]
    fn live_handler_sees_edits() {
        let (source, theme) = site();
        let handler = LiveHandler::new(source.path(), theme.path(), LinkMode::Dynamic);

        assert!(body(handler.handle("/posts/a")).contains("first draft"));
        write_file(source.path(), "posts/a.md", "# A\n\nsecond draft");
        assert!(body(handler.handle("/posts/a")).contains("second draft"));
    }

    #[test]
    fn live_handler_reports_errors_and_recovers() {
        let (source, theme) = site();
        let handler = LiveHandler::new(source.path(), theme.path(), LinkMode::Dynamic);

        write_file(source.path(), "posts/a.md", "---\nurl: /a\n# never closed");
        let reply = handler.handle("/");
        assert_eq!(reply.status(), 500);
        assert!(matches!(&reply, Reply::Error(m) if m.contains("never closed")));

        write_file(source.path(), "posts/a.md", "# A\n\nfixed");
        assert!(body(handler.handle("/posts/a")).contains("fixed"));
    }

    #[test]
    fn live_handler_not_found() {
        let (source, theme) = site();
        let handler = LiveHandler::new(source.path(), theme.path(), LinkMode::Dynamic);
        assert_eq!(handler.handle("/nope"), Reply::NotFound);
    }

    #[test]
    fn handler_for_picks_mode() {
        let (source, theme) = site();
        let live = ServeConfig {
            livereload: true,
            ..ServeConfig::default()
        };
        // a live handler is created without building
        write_file(source.path(), "broken.md", "---\nnever closed");
        assert!(handler_for(source.path(), theme.path(), &live).is_ok());
        assert!(handler_for(source.path(), theme.path(), &ServeConfig::default()).is_err());
    }

    #[test]
    fn error_page_escapes_message() {
        let page = error_page("<script>bad</script>").into_string();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
