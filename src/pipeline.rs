//! Republishes one item: link preview, thumbnail, text, post, mark.
//!
//! Every network call is wrapped in the retry policy on its own, so a
//! fault while publishing never re-runs the preview or the upload.  A fault
//! after the post went out but before the item is marked on the source
//! means the item is republished on the next run.

use crate::compose::compose_post;
use crate::config::PostConfig;
use crate::destination::{post_url, BlobRef, Destination, ExternalEmbed};
use crate::error::RunError;
use crate::retry::Retry;
use crate::source::{full_url, Item, Source};
use crate::status::Status;
use crate::thumbnail::{Thumbnailer, MAX_IMAGE_SIZE, THUMBNAIL_BOX};

/// Where the item ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub url: String,
}

pub struct Pipeline {
    destination: Box<dyn Destination>,
    thumbnailer: Box<dyn Thumbnailer>,
    post: PostConfig,
}

impl Pipeline {
    pub fn new(destination: Box<dyn Destination>, thumbnailer: Box<dyn Thumbnailer>, post: PostConfig) -> Self {
        Self {
            destination,
            thumbnailer,
            post,
        }
    }

    pub fn login(
        &mut self,
        retry: &Retry,
        status: &mut Status,
        handle: &str,
        password: &str,
    ) -> Result<(), RunError> {
        let destination = &mut self.destination;
        retry.call(status, || destination.login(handle, password))?;
        tracing::info!(handle = self.destination.handle(), "logged in to Bluesky");
        Ok(())
    }

    pub fn process(
        &mut self,
        retry: &Retry,
        status: &mut Status,
        item: &Item,
        source: &mut dyn Source,
    ) -> Result<PublishResult, RunError> {
        let target = resolve_url(&item.url);
        tracing::info!(id = %item.id, %target, "processing");

        status.set_sub_status("extracting metadata");
        let destination = &mut self.destination;
        let preview = retry.call(status, || destination.link_preview(&target))?;
        let (title, description, image) = match preview {
            Some(p) => (
                if p.title.is_empty() { target.clone() } else { p.title },
                p.description,
                p.image,
            ),
            None => (target.clone(), String::new(), None),
        };

        let thumb = match image {
            Some(image_url) => self.thumbnail(retry, status, &image_url)?,
            None => None,
        };

        status.set_sub_status("constructing post text");
        let post = compose_post(item, &self.post);
        tracing::debug!(text = %post.text, tags = post.tags.len(), "composed post");

        let embed = ExternalEmbed {
            uri: target,
            title,
            description,
            thumb,
        };

        status.set_sub_status("posting to Bluesky");
        let destination = &mut self.destination;
        let record = retry.call(status, || destination.publish(&post, &embed))?;
        let url = post_url(self.destination.handle(), &record.uri);
        status.log_event(&format!("{} -> {url}", item.short_url()), false);

        status.set_sub_status("saving post to Reddit");
        retry.call(status, || source.mark_processed(item))?;

        Ok(PublishResult { url })
    }

    /// Download, shrink if oversized, upload.  `None` when there is nothing
    /// usable to attach.
    fn thumbnail(
        &mut self,
        retry: &Retry,
        status: &mut Status,
        image_url: &str,
    ) -> Result<Option<BlobRef>, RunError> {
        status.set_sub_status("downloading thumbnail");
        let destination = &mut self.destination;
        let Some(mut bytes) = retry.call(status, || destination.download(image_url))? else {
            tracing::warn!(%image_url, "thumbnail download failed, posting without it");
            return Ok(None);
        };

        if bytes.len() > MAX_IMAGE_SIZE {
            status.set_sub_status("reducing thumbnail size");
            match self.thumbnailer.shrink(&bytes, THUMBNAIL_BOX) {
                Ok(smaller) => {
                    tracing::debug!(before = bytes.len(), after = smaller.len(), "thumbnail shrunk");
                    bytes = smaller;
                }
                Err(fault) => {
                    tracing::warn!(%image_url, "{fault}, posting without a thumbnail");
                    return Ok(None);
                }
            }
        }

        status.set_sub_status("uploading blob");
        let destination = &mut self.destination;
        let blob = retry.call(status, || destination.upload_blob(&bytes))?;
        Ok(Some(blob))
    }
}

/// Cross-posts point at a site-relative `/r/...` path.
pub fn resolve_url(url: &str) -> String {
    if url.starts_with("/r/") {
        full_url(url)
    } else {
        url.to_string()
    }
}
