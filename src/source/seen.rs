//! Live-stream bookkeeping that does not touch the network.
//!
//! [`SeenIds`] remembers which ids were already handed out.  [`LiveStream`]
//! buffers the unseen part of each listing and hands it out one item per
//! poll, refetching only once the buffer runs dry.

use std::collections::{HashSet, VecDeque};

use super::{Item, StreamEvent};

/// Ids already handed out by the live stream, oldest evicted first.
#[derive(Debug)]
pub struct SeenIds {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl SeenIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    /// Record `id`; returns `false` if it was already there.
    pub fn insert(&mut self, id: &str) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }

    /// Given a newest-first listing, return the not-yet-seen items
    /// oldest-first and remember them.
    pub fn take_unseen(&mut self, newest_first: Vec<Item>) -> Vec<Item> {
        newest_first
            .into_iter()
            .rev()
            .filter(|item| self.insert(&item.id))
            .collect()
    }
}

/// Pending items of the live stream plus the ids already queued.
#[derive(Debug)]
pub struct LiveStream {
    seen: SeenIds,
    pending: VecDeque<Item>,
}

impl LiveStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: SeenIds::new(capacity),
            pending: VecDeque::new(),
        }
    }

    /// Hand out the next buffered item.  With an empty buffer, `fetch` is
    /// called for a newest-first listing; if it holds nothing unseen the
    /// answer is [`StreamEvent::Idle`].
    ///
    /// A failed fetch leaves the buffer and the seen ids untouched.
    pub fn next<E>(
        &mut self,
        fetch: impl FnOnce() -> Result<Vec<Item>, E>,
    ) -> Result<StreamEvent, E> {
        if self.pending.is_empty() {
            let listing = fetch()?;
            self.pending.extend(self.seen.take_unseen(listing));
        }
        Ok(match self.pending.pop_front() {
            Some(item) => StreamEvent::Item(item),
            None => StreamEvent::Idle,
        })
    }
}
