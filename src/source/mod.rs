//! Source abstraction layer.
//!
//! This module defines the [`Source`] trait and the [`Item`] type.  The only
//! implementation is [`reddit::RedditSource`]; tests drive the stream adapter
//! and the pipeline through hand-written fakes instead.
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `lemmy.rs`).
//! 2. Implement [`Source`] for your client, converting every failure into a
//!    [`Fault`] so the retry policy can classify it.
//! 3. Make [`Source::poll`] return [`StreamEvent::Idle`] when nothing new
//!    turned up instead of blocking or failing.

mod item;
mod reddit;
mod seen;

pub use item::{full_url, Item};
pub use reddit::RedditSource;
pub use seen::LiveStream;

#[cfg(test)]
pub(crate) use item::tests::make_item;

use crate::error::Fault;

/// One result of polling the live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Item(Item),
    /// Nothing new arrived within the poll.
    Idle,
}

/// The content source the bot reads from.
///
/// Every method performs network I/O and is called through the retry
/// policy, so implementations should fail fast with a precise [`Fault`]
/// rather than retrying internally.
pub trait Source {
    /// The `limit` most recent items, newest first.
    fn fetch_recent(&mut self, limit: usize) -> Result<Vec<Item>, Fault>;

    /// Next live item, or [`StreamEvent::Idle`] when there is nothing new.
    fn poll(&mut self) -> Result<StreamEvent, Fault>;

    /// Set the item's processed marker on the source.
    fn mark_processed(&mut self, item: &Item) -> Result<(), Fault>;
}
