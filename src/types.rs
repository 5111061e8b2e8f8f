//! Shared types passed between the area builder, the generator and themes.

use crate::timing::{self, Timing};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A page promoted into an area's chronological collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub title: String,
    /// Name of the area directory the page lives in (`""` at the root).
    pub category: String,
    pub link: String,
    pub timing: Option<Timing>,
}

impl Post {
    /// Newest first by `published`; untimed posts after all timed ones.
    /// Ties are broken by title, then link, so the order is total.
    pub fn chronological(a: &Post, b: &Post) -> Ordering {
        let by_time = match (&a.timing, &b.timing) {
            (Some(x), Some(y)) => y.published.cmp(&x.published),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.link.cmp(&b.link))
    }

    /// Theme-facing view of this post.
    pub fn to_theme(&self) -> ThemePost {
        ThemePost {
            title: self.title.clone(),
            category: self.category.clone(),
            link: self.link.clone(),
            date: timing::format_date(self.timing.as_ref()),
        }
    }
}

/// What index templates see for each post.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThemePost {
    pub title: String,
    pub category: String,
    pub link: String,
    pub date: String,
}

/// A page rendered from a named theme template without any source file.
///
/// Data keys are passed to the template verbatim, e.g. `{{ FormAction }}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomPage {
    pub template: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl CustomPage {
    pub fn new(template: impl Into<String>, data: BTreeMap<String, String>) -> Self {
        Self {
            template: template.into(),
            data,
        }
    }

    /// Newsletter sign-up form posting to `form_action`.
    pub fn subscriber(form_action: impl Into<String>) -> Self {
        Self::new(
            "subscribe.html",
            BTreeMap::from([("FormAction".to_string(), form_action.into())]),
        )
    }

    /// A one-off titled message, e.g. "Thanks for subscribing".
    pub fn message(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            "message.html",
            BTreeMap::from([
                ("Title".to_string(), title.into()),
                ("Message".to_string(), message.into()),
            ]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::parse_timestamp;

    fn post(title: &str, published: Option<&str>) -> Post {
        Post {
            title: title.to_string(),
            category: String::new(),
            link: format!("/{title}"),
            timing: published.map(|p| {
                let t = parse_timestamp(p).unwrap();
                Timing {
                    published: t,
                    updated: t,
                }
            }),
        }
    }

    fn sorted(mut posts: Vec<Post>) -> Vec<String> {
        posts.sort_by(Post::chronological);
        posts.into_iter().map(|p| p.title).collect()
    }

    #[test]
    fn newest_first() {
        let order = sorted(vec![
            post("old", Some("2023-01-01")),
            post("new", Some("2024-01-01")),
        ]);
        assert_eq!(order, vec!["new", "old"]);
    }

    #[test]
    fn untimed_after_timed_sorted_by_title() {
        let order = sorted(vec![
            post("zeta", None),
            post("dated", Some("2020-01-01")),
            post("alpha", None),
        ]);
        assert_eq!(order, vec!["dated", "alpha", "zeta"]);
    }

    #[test]
    fn equal_times_sorted_by_title() {
        let order = sorted(vec![
            post("b", Some("2022-02-02")),
            post("a", Some("2022-02-02")),
        ]);
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn theme_view_formats_date() {
        let p = post("x", Some("2024-01-01"));
        assert_eq!(p.to_theme().date, "Jan 01, 2024");
        assert_eq!(post("y", None).to_theme().date, "");
    }

    #[test]
    fn custom_page_constructors() {
        let sub = CustomPage::subscriber("https://example.com/join");
        assert_eq!(sub.template, "subscribe.html");
        assert_eq!(sub.data["FormAction"], "https://example.com/join");

        let msg = CustomPage::message("Thanks", "You are in.");
        assert_eq!(msg.template, "message.html");
        assert_eq!(msg.data["Title"], "Thanks");
        assert_eq!(msg.data["Message"], "You are in.");
    }
}
