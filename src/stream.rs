//! Turns the source's snapshot and live stream into the sequence of items
//! worth republishing.
//!
//! At startup [`ItemStream::start`] captures the [`RecentWindow`] (the 100
//! newest items) and fixes the [`CatchupSet`] from it.  Both are read-only
//! afterwards.  [`ItemStream::next_item`] then polls the live stream until
//! an item passes the skip policy:
//!
//! 1. in the window but not in the catch-up set: too old, skipped silently;
//! 2. title does not match the configured pattern;
//! 3. already marked processed on the source.

use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;

use crate::error::RunError;
use crate::retry::Retry;
use crate::source::{Item, Source, StreamEvent};
use crate::status::Status;

/// Size of the startup snapshot.
pub const RECENT_LIMIT: usize = 100;
const IDLE_TEMPLATE: &str = "Waiting for {} before checking for new posts";
const IDLE_TICK: Duration = Duration::from_secs(60);

pub const INVALID_TITLE: &str = "title doesn't conform to formatting rule";
pub const ALREADY_SHARED: &str = "already shared";

/// Ids of the newest items at startup, newest first.
#[derive(Debug, Clone, Default)]
pub struct RecentWindow {
    ids: Vec<String>,
    members: HashSet<String>,
}

impl RecentWindow {
    pub fn new(items: &[Item]) -> Self {
        let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let members = ids.iter().cloned().collect();
        Self { ids, members }
    }

    pub fn contains(&self, item: &Item) -> bool {
        self.members.contains(&item.id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// The first `limit` entries.
    pub fn catchup(&self, limit: usize) -> CatchupSet {
        CatchupSet {
            members: self.ids.iter().take(limit).cloned().collect(),
        }
    }
}

/// The part of the window that is still republished at startup.
#[derive(Debug, Clone, Default)]
pub struct CatchupSet {
    members: HashSet<String>,
}

impl CatchupSet {
    pub fn contains(&self, item: &Item) -> bool {
        self.members.contains(&item.id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Process,
    /// Skip, with the reason shown to the operator.  `None` skips silently.
    Skip(Option<&'static str>),
}

/// The skip policy, in order.
pub fn verdict(item: &Item, window: &RecentWindow, catchup: &CatchupSet, pattern: &Regex) -> Verdict {
    if window.contains(item) && !catchup.contains(item) {
        Verdict::Skip(None)
    } else if !pattern.is_match(&item.title) {
        Verdict::Skip(Some(INVALID_TITLE))
    } else if item.processed {
        Verdict::Skip(Some(ALREADY_SHARED))
    } else {
        Verdict::Process
    }
}

pub struct ItemStream {
    source: Box<dyn Source>,
    window: RecentWindow,
    catchup: CatchupSet,
    title_pattern: Regex,
    check_every: Duration,
}

impl ItemStream {
    /// Capture the recent window through `retry` and fix the catch-up set.
    pub fn start(
        mut source: Box<dyn Source>,
        retry: &Retry,
        status: &mut Status,
        catchup_limit: usize,
        title_pattern: Regex,
        check_every: Duration,
    ) -> Result<Self, RunError> {
        let recent = retry.call(status, || source.fetch_recent(RECENT_LIMIT))?;
        let window = RecentWindow::new(&recent);
        let catchup = window.catchup(catchup_limit);
        tracing::info!(
            window = window.len(),
            catchup = catchup.len(),
            "captured recent posts"
        );
        Ok(Self {
            source,
            window,
            catchup,
            title_pattern,
            check_every,
        })
    }

    pub fn source_mut(&mut self) -> &mut dyn Source {
        self.source.as_mut()
    }

    /// Block until the next item to process.
    ///
    /// Returns only on an item, a fault the retry policy gives up on, or
    /// cancellation.
    pub fn next_item(&mut self, retry: &Retry, status: &mut Status) -> Result<Item, RunError> {
        loop {
            retry.waiter().check_cancelled()?;

            let source = &mut self.source;
            let item = match retry.call(status, || source.poll())? {
                StreamEvent::Idle => {
                    retry
                        .waiter()
                        .wait(status, self.check_every, IDLE_TEMPLATE, IDLE_TICK)?;
                    status.set_status("Checking for new posts", "");
                    continue;
                }
                StreamEvent::Item(item) => item,
            };

            match verdict(&item, &self.window, &self.catchup, &self.title_pattern) {
                Verdict::Process => return Ok(item),
                Verdict::Skip(reason) => {
                    tracing::debug!(
                        id = %item.id,
                        in_window = self.window.contains(&item),
                        in_catchup = self.catchup.contains(&item),
                        processed = item.processed,
                        reason = reason.unwrap_or("too old"),
                        "skipped"
                    );
                    if let Some(reason) = reason {
                        status.log_event(&format!("{} -> Skipped ({reason})", item.short_url()), false);
                    }
                }
            }
        }
    }
}
