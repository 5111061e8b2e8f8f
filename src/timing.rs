//! Page timestamps: explicit metadata values or git-derived history.
//!
//! Every page carries an optional [`Timing`]: a `published` and an `updated`
//! instant. Authors can pin both in the frontmatter; when neither is given
//! the timestamps come from the git history of the source file:
//!
//! - **published**: the earliest author time among commits touching the file
//! - **updated**: the latest author time among those commits
//!
//! ## What counts as "touching"
//!
//! A commit touches a path when the blob recorded at that path differs from
//! the blob in every one of its parents. Root commits touch every path they
//! contain. Merges that simply carry one side's version through are skipped,
//! which matches what `git log -- <path>` reports with default history
//! simplification.
//!
//! The whole history is indexed once when a [`History`] is opened; lookups
//! afterwards never touch the object database.
//!
//! ## Untracked files
//!
//! A file with no touching commits (never committed, an unborn `HEAD`, or a
//! file outside the work tree) resolves to `None` and renders without a
//! date. A repository that exists but cannot be opened or walked is an error.

use crate::page::slash_path;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use gix::ObjectId;
use gix::traverse::tree::Recorder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Display format for dates handed to themes, e.g. `Jan 02, 2006`.
pub const DATE_FORMAT: &str = "%b %d, %Y";

#[derive(Error, Debug)]
pub enum TimingError {
    #[error("cannot open git repository at {path}: {message}")]
    VersionHistoryUnavailable { path: PathBuf, message: String },
    #[error("cannot read git history for {path}: {message}")]
    History { path: PathBuf, message: String },
}

/// Publication and last-update instants of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub published: DateTime<FixedOffset>,
    pub updated: DateTime<FixedOffset>,
}

impl Timing {
    /// Collapse a set of instants into `(min, max)`. `None` if empty.
    pub fn spanning<I>(times: I) -> Option<Timing>
    where
        I: IntoIterator<Item = DateTime<FixedOffset>>,
    {
        times.into_iter().fold(None, |acc, t| match acc {
            None => Some(Timing {
                published: t,
                updated: t,
            }),
            Some(Timing { published, updated }) => Some(Timing {
                published: published.min(t),
                updated: updated.max(t),
            }),
        })
    }

    /// The published date formatted for themes.
    pub fn date(&self) -> String {
        self.published.format(DATE_FORMAT).to_string()
    }
}

/// Format an optional timing for themes; untimed pages get an empty string.
pub fn format_date(timing: Option<&Timing>) -> String {
    timing.map(Timing::date).unwrap_or_default()
}

/// Parse a metadata timestamp.
///
/// Accepts RFC 3339 (`2024-01-01T10:00:00+02:00`) or a bare calendar date
/// (`2024-01-01`, taken as midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Ok(t),
        Err(rfc_err) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => {
                let midnight = date.and_time(NaiveTime::default());
                Ok(Utc.from_utc_datetime(&midnight).fixed_offset())
            }
            Err(_) => Err(rfc_err),
        },
    }
}

// ============================================================================
// Git history
// ============================================================================

/// Blob id of every file in one commit's tree, keyed by `/`-separated path.
type Blobs = HashMap<String, ObjectId>;

/// Per-file history of a repository, read once when it is opened.
///
/// Opening walks every commit reachable from `HEAD` a single time and
/// records, for each path, the span of author times of the commits that
/// touched it. [`History::resolve`] is then a map lookup, so a build costs
/// one history walk however many pages it has.
pub struct History {
    root: PathBuf,
    touched: HashMap<String, Timing>,
}

impl History {
    /// Find the repository enclosing `dir`, if any.
    ///
    /// Walks up from `dir` looking for a `.git` entry. Returns `Ok(None)` when
    /// the content is not under version control at all.
    pub fn discover(dir: &Path) -> Result<Option<History>, TimingError> {
        let dir = dir
            .canonicalize()
            .map_err(|e| unavailable(dir, e.to_string()))?;
        match dir.ancestors().find(|d| d.join(".git").exists()) {
            Some(root) => History::open(root).map(Some),
            None => Ok(None),
        }
    }

    /// Open the repository whose work tree is rooted at `root` and index its
    /// history.
    pub fn open(root: &Path) -> Result<History, TimingError> {
        let repo = gix::open(root).map_err(|e| unavailable(root, e.to_string()))?;
        let root = root
            .canonicalize()
            .map_err(|e| unavailable(root, e.to_string()))?;
        let touched = index_history(&repo).map_err(|message| TimingError::History {
            path: root.clone(),
            message,
        })?;
        log::debug!("indexed history of {} paths in {}", touched.len(), root.display());
        Ok(History { root, touched })
    }

    /// Work tree root of the repository.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Timing for `path` from the commits that touched it.
    pub fn resolve(&self, path: &Path) -> Result<Option<Timing>, TimingError> {
        let absolute = path.canonicalize().map_err(|e| TimingError::History {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let Ok(rel) = absolute.strip_prefix(&self.root) else {
            // Symlinked in from outside the work tree
            log::debug!("{} is outside {}", absolute.display(), self.root.display());
            return Ok(None);
        };
        Ok(self.touched.get(&slash_path(rel)).copied())
    }
}

/// Open the repository at `repo_dir` and resolve timing for `path`.
pub fn resolve(path: &Path, repo_dir: &Path) -> Result<Option<Timing>, TimingError> {
    History::open(repo_dir)?.resolve(path)
}

/// Walk every commit reachable from `HEAD` once, collecting the author-time
/// span of each path's touching commits.
fn index_history(repo: &gix::Repository) -> Result<HashMap<String, Timing>, String> {
    let head = repo.head().map_err(|e| e.to_string())?;
    let Some(tip) = head.id() else {
        // Unborn HEAD: nothing has been committed yet
        return Ok(HashMap::new());
    };

    let walk = repo
        .rev_walk([tip.detach()])
        .all()
        .map_err(|e| e.to_string())?;

    let mut trees = TreeCache::default();
    let mut times: HashMap<String, Vec<DateTime<FixedOffset>>> = HashMap::new();
    for info in walk {
        let info = info.map_err(|e| e.to_string())?;
        let commit = repo.find_commit(info.id).map_err(|e| e.to_string())?;
        let blobs = trees.blobs(&commit)?;
        let mut parents = Vec::new();
        for id in commit.parent_ids() {
            let parent = repo.find_commit(id.detach()).map_err(|e| e.to_string())?;
            parents.push(trees.blobs(&parent)?);
        }

        let changed = touched_paths(&blobs, &parents);
        if changed.is_empty() {
            continue;
        }
        let author = commit.author().map_err(|e| e.to_string())?;
        let time = author.time().map_err(|e| e.to_string())?;
        let when = to_datetime(time.seconds, time.offset)
            .ok_or_else(|| format!("commit {} has an out-of-range author time", info.id))?;
        for path in changed {
            times.entry(path).or_default().push(when);
        }
    }

    Ok(times
        .into_iter()
        .filter_map(|(path, t)| Timing::spanning(t).map(|timing| (path, timing)))
        .collect())
}

/// Paths whose blob in `blobs` differs from every parent's, including paths
/// deleted relative to all parents. A root commit touches everything in it.
fn touched_paths(blobs: &Blobs, parents: &[Rc<Blobs>]) -> Vec<String> {
    let differs = |path: &str, blob: Option<&ObjectId>| parents.iter().all(|p| p.get(path) != blob);

    let mut touched: Vec<String> = blobs
        .iter()
        .filter(|(path, blob)| differs(path, Some(*blob)))
        .map(|(path, _)| path.to_string())
        .collect();
    if let Some(first) = parents.first() {
        touched.extend(
            first
                .keys()
                .filter(|path| !blobs.contains_key(*path) && differs(path, None))
                .cloned(),
        );
    }
    touched
}

/// Flattened trees, shared between a commit and the children that list it
/// as a parent.
#[derive(Default)]
struct TreeCache {
    trees: HashMap<ObjectId, Rc<Blobs>>,
}

impl TreeCache {
    fn blobs(&mut self, commit: &gix::Commit<'_>) -> Result<Rc<Blobs>, String> {
        let tree = commit.tree().map_err(|e| e.to_string())?;
        if let Some(blobs) = self.trees.get(&tree.id) {
            return Ok(Rc::clone(blobs));
        }

        let mut recorder = Recorder::default();
        tree.traverse()
            .breadthfirst(&mut recorder)
            .map_err(|e| e.to_string())?;
        let blobs: Blobs = recorder
            .records
            .into_iter()
            .filter(|entry| !entry.mode.is_tree())
            .map(|entry| (entry.filepath.to_string(), entry.oid))
            .collect();

        let blobs = Rc::new(blobs);
        self.trees.insert(tree.id, Rc::clone(&blobs));
        Ok(blobs)
    }
}

fn to_datetime(seconds: i64, offset: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(offset)?;
    Some(DateTime::from_timestamp(seconds, 0)?.with_timezone(&offset))
}

fn unavailable(path: &Path, message: String) -> TimingError {
    TimingError::VersionHistoryUnavailable {
        path: path.to_path_buf(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{commit_file, init_repo, remove_file};
    use std::fs;
    use tempfile::TempDir;

    fn ts(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    #[test]
    fn spanning_picks_min_and_max() {
        let t = Timing::spanning([
            ts("2023-06-01T00:00:00Z"),
            ts("2021-01-01T00:00:00Z"),
            ts("2024-02-03T00:00:00Z"),
        ])
        .unwrap();
        assert_eq!(t.published, ts("2021-01-01T00:00:00Z"));
        assert_eq!(t.updated, ts("2024-02-03T00:00:00Z"));
    }

    #[test]
    fn spanning_empty_is_none() {
        assert_eq!(Timing::spanning(Vec::new()), None);
    }

    #[test]
    fn date_format_matches_themes() {
        let t = Timing::spanning([ts("2006-01-02T15:04:05Z")]).unwrap();
        assert_eq!(t.date(), "Jan 02, 2006");
        assert_eq!(format_date(Some(&t)), "Jan 02, 2006");
        assert_eq!(format_date(None), "");
    }

    #[test]
    fn parse_rfc3339_keeps_offset() {
        let t = parse_timestamp("2024-01-01T10:00:00+02:00").unwrap();
        assert_eq!(t.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn parse_bare_date_is_midnight_utc() {
        let t = parse_timestamp(" 2023-01-01 ").unwrap();
        assert_eq!(t, ts("2023-01-01T00:00:00Z"));
    }

    #[test]
    fn parse_garbage_is_error() {
        assert!(parse_timestamp("last tuesday").is_err());
    }

    #[test]
    fn single_commit_gives_equal_published_and_updated() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "post.md", "# Post", "2023-05-06T07:08:09+00:00");

        let timing = resolve(&tmp.path().join("post.md"), tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(timing.published, ts("2023-05-06T07:08:09Z"));
        assert_eq!(timing.published, timing.updated);
    }

    #[test]
    fn multiple_commits_span_history() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "post.md", "v1", "2022-01-01T00:00:00+00:00");
        commit_file(tmp.path(), "other.md", "x", "2022-06-01T00:00:00+00:00");
        commit_file(tmp.path(), "post.md", "v2", "2023-01-01T00:00:00+00:00");
        commit_file(tmp.path(), "other.md", "y", "2025-01-01T00:00:00+00:00");

        let history = History::open(tmp.path()).unwrap();
        let timing = history.resolve(&tmp.path().join("post.md")).unwrap().unwrap();
        assert_eq!(timing.published, ts("2022-01-01T00:00:00Z"));
        assert_eq!(timing.updated, ts("2023-01-01T00:00:00Z"));
    }

    #[test]
    fn nested_path_is_resolved_relative_to_work_tree() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(
            tmp.path(),
            "content/posts/a.md",
            "# A",
            "2024-03-04T05:06:07+00:00",
        );

        let history = History::discover(&tmp.path().join("content")).unwrap().unwrap();
        let timing = history
            .resolve(&tmp.path().join("content/posts/a.md"))
            .unwrap()
            .unwrap();
        assert_eq!(timing.published, ts("2024-03-04T05:06:07Z"));
    }

    #[test]
    fn history_is_indexed_once_at_open() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "a.md", "a", "2022-01-01T00:00:00+00:00");
        commit_file(tmp.path(), "b.md", "b", "2022-02-01T00:00:00+00:00");

        let history = History::open(tmp.path()).unwrap();
        commit_file(tmp.path(), "a.md", "a2", "2024-01-01T00:00:00+00:00");

        // commits made after opening belong to the next build
        let a = history.resolve(&tmp.path().join("a.md")).unwrap().unwrap();
        assert_eq!(a.updated, ts("2022-01-01T00:00:00Z"));
        let b = history.resolve(&tmp.path().join("b.md")).unwrap().unwrap();
        assert_eq!(b.published, ts("2022-02-01T00:00:00Z"));

        let fresh = History::open(tmp.path()).unwrap();
        let a = fresh.resolve(&tmp.path().join("a.md")).unwrap().unwrap();
        assert_eq!(a.updated, ts("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn deletion_and_readd_both_count() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "post.md", "v1", "2021-01-01T00:00:00+00:00");
        remove_file(tmp.path(), "post.md", "2022-01-01T00:00:00+00:00");
        commit_file(tmp.path(), "post.md", "v2", "2023-01-01T00:00:00+00:00");

        let timing = resolve(&tmp.path().join("post.md"), tmp.path())
            .unwrap()
            .unwrap();
        assert_eq!(timing.published, ts("2021-01-01T00:00:00Z"));
        assert_eq!(timing.updated, ts("2023-01-01T00:00:00Z"));
    }

    fn oid(digit: char) -> ObjectId {
        ObjectId::from_hex(digit.to_string().repeat(40).as_bytes()).unwrap()
    }

    fn blobs(entries: &[(&str, char)]) -> Blobs {
        entries
            .iter()
            .map(|(path, digit)| (path.to_string(), oid(*digit)))
            .collect()
    }

    fn sorted(mut paths: Vec<String>) -> Vec<String> {
        paths.sort();
        paths
    }

    #[test]
    fn root_commit_touches_everything() {
        let root = blobs(&[("a.md", '1'), ("posts/b.md", '2')]);
        assert_eq!(sorted(touched_paths(&root, &[])), vec!["a.md", "posts/b.md"]);
    }

    #[test]
    fn touched_paths_compare_against_parent() {
        let parent = Rc::new(blobs(&[("same.md", '1'), ("edit.md", '2'), ("gone.md", '3')]));
        let commit = blobs(&[("same.md", '1'), ("edit.md", '4'), ("new.md", '5')]);
        assert_eq!(
            sorted(touched_paths(&commit, &[parent])),
            vec!["edit.md", "gone.md", "new.md"]
        );
    }

    #[test]
    fn merge_carrying_one_side_touches_nothing() {
        let ours = Rc::new(blobs(&[("a.md", '1'), ("b.md", '2')]));
        let theirs = Rc::new(blobs(&[("a.md", '3'), ("b.md", '2')]));
        let merge = blobs(&[("a.md", '3'), ("b.md", '2')]);
        assert!(touched_paths(&merge, &[ours.clone(), theirs.clone()]).is_empty());

        // a resolution differing from both sides is a real change
        let resolved = blobs(&[("a.md", '4'), ("b.md", '2')]);
        assert_eq!(touched_paths(&resolved, &[ours, theirs]), vec!["a.md"]);
    }

    #[test]
    fn untracked_file_has_no_timing() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        commit_file(tmp.path(), "tracked.md", "t", "2024-01-01T00:00:00+00:00");
        fs::write(tmp.path().join("draft.md"), "# Draft").unwrap();

        let history = History::open(tmp.path()).unwrap();
        assert_eq!(history.resolve(&tmp.path().join("draft.md")).unwrap(), None);
    }

    #[test]
    fn unborn_head_has_no_timing() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        fs::write(tmp.path().join("post.md"), "# Post").unwrap();

        let history = History::open(tmp.path()).unwrap();
        assert_eq!(history.resolve(&tmp.path().join("post.md")).unwrap(), None);
    }

    #[test]
    fn missing_repository_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("post.md"), "# Post").unwrap();

        let err = resolve(&tmp.path().join("post.md"), &tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, TimingError::VersionHistoryUnavailable { .. }));
    }

    #[test]
    fn discover_outside_repository_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(History::discover(tmp.path()).unwrap().is_none());
    }
}
