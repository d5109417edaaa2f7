//! The unit of work: one post from the source.
//!
//! Identity is the post id.  Two `Item`s with the same id are the same post
//! even if one was fetched later with a different `processed` flag, which is
//! what lets the stream adapter test window membership against freshly
//! streamed copies.

const REDDIT_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Clone)]
pub struct Item {
    /// Base-36 post id, e.g. `1abcde`.
    pub id: String,

    /// Site-relative path, e.g. `/r/PodcastSharing/comments/1abcde/...`.
    pub permalink: String,

    pub title: String,

    /// The link the post points at.  Cross-posts carry a relative
    /// `/r/...` reference instead of an absolute URL.
    pub url: String,

    pub flair: Option<String>,

    pub author: String,

    /// The source's own "already handled" marker (the saved flag).
    pub processed: bool,
}

impl Item {
    pub fn full_url(&self) -> String {
        full_url(&self.permalink)
    }

    pub fn short_url(&self) -> String {
        format!("https://redd.it/{}", self.id)
    }

    /// Reddit's fullname for a link post.
    pub fn fullname(&self) -> String {
        format!("t3_{}", self.id)
    }
}

/// Absolute URL for a site-relative path.
pub fn full_url(path: &str) -> String {
    format!("{REDDIT_BASE}{path}")
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}
