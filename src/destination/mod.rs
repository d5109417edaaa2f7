//! Destination abstraction layer.
//!
//! [`Destination`] is everything the post pipeline needs from the service it
//! republishes to.  [`bluesky::BlueskyClient`] is the real implementation.

mod bluesky;

pub use bluesky::{post_url, BlueskyClient};

use serde::{Deserialize, Serialize};

use crate::compose::ComposedPost;
use crate::error::Fault;

/// Link-card metadata for a URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkPreview {
    pub title: String,
    pub description: String,
    /// Thumbnail URL, absent when the page has none.
    pub image: Option<String>,
}

/// Opaque reference to an uploaded blob, passed back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub serde_json::Value);

/// External link card attached to a post.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEmbed {
    pub uri: String,
    pub title: String,
    pub description: String,
    pub thumb: Option<BlobRef>,
}

/// Identifier of a created post as returned by the destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedRecord {
    pub uri: String,
    pub cid: String,
}

/// The service posts are republished to.
///
/// Like [`crate::source::Source`], every method is one network call that the
/// caller wraps in the retry policy.
pub trait Destination {
    fn login(&mut self, handle: &str, password: &str) -> Result<(), Fault>;

    /// Handle of the logged-in account.
    fn handle(&self) -> &str;

    /// Link-card metadata for `url`; `None` when the preview service could
    /// not extract anything.
    fn link_preview(&mut self, url: &str) -> Result<Option<LinkPreview>, Fault>;

    /// Plain GET; `None` for a non-200 answer.
    fn download(&mut self, url: &str) -> Result<Option<Vec<u8>>, Fault>;

    fn upload_blob(&mut self, bytes: &[u8]) -> Result<BlobRef, Fault>;

    fn publish(&mut self, post: &ComposedPost, embed: &ExternalEmbed) -> Result<PublishedRecord, Fault>;
}
