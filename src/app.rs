//! The run loop.
//!
//! [`App::run`] logs in, captures the recent window, then hands every item
//! the stream emits to the pipeline, one at a time, until the operator
//! interrupts or a fault the retry policy gives up on surfaces.
//! [`App::report`] turns that ending into console output and an exit code.

use std::time::Duration;

use regex::Regex;

use crate::config::{BlueskyConfig, Config, ConfigError};
use crate::error::RunError;
use crate::pipeline::Pipeline;
use crate::retry::Retry;
use crate::source::Source;
use crate::status::Status;
use crate::stream::ItemStream;
use crate::taxonomy::Category;

const GENERIC_FAILURE: &str = "Something went wrong!, check log file for details";

pub struct App {
    retry: Retry,
    pipeline: Pipeline,
    bluesky: BlueskyConfig,
    catchup_limit: usize,
    title_pattern: Regex,
    check_every: Duration,
}

impl App {
    pub fn new(config: &Config, retry: Retry, pipeline: Pipeline) -> Result<Self, ConfigError> {
        Ok(Self {
            retry,
            pipeline,
            bluesky: config.bluesky.clone(),
            catchup_limit: config.catchup_limit(),
            title_pattern: config.title_pattern()?,
            check_every: config.check_every(),
        })
    }

    /// Runs until cancelled or a non-retryable fault.  Never returns `Ok`.
    pub fn run(&mut self, source: Box<dyn Source>, status: &mut Status) -> Result<(), RunError> {
        status.set_status("Logging in to Bluesky", "");
        self.pipeline
            .login(&self.retry, status, &self.bluesky.handle, &self.bluesky.password)?;

        status.set_status("Fetching Reddit posts", "");
        let mut stream = ItemStream::start(
            source,
            &self.retry,
            status,
            self.catchup_limit,
            self.title_pattern.clone(),
            self.check_every,
        )?;

        loop {
            status.set_status("Checking for new posts", "");
            let item = stream.next_item(&self.retry, status)?;

            status.set_status(&format!("Processing post {}", item.short_url()), "");
            let result = self
                .pipeline
                .process(&self.retry, status, &item, stream.source_mut())?;
            tracing::info!(id = %item.id, url = %result.url, "published");
        }
    }

    /// Report how the run ended and close the status display.  Returns the
    /// process exit code.
    pub fn report(&self, outcome: Result<(), RunError>, status: &mut Status) -> i32 {
        let code = match outcome {
            Ok(()) => 0,
            Err(RunError::Cancelled) => {
                status.log_event("Stopped by user", false);
                0
            }
            Err(RunError::Fault(fault)) => {
                tracing::error!("run failed: {fault:?}");
                let classification = self.retry.classify(&fault);
                let message = match classification.category {
                    Category::PermanentAuth
                    | Category::PermanentNotFound
                    | Category::PermanentAccessDenied => classification.description,
                    _ => GENERIC_FAILURE.to_string(),
                };
                status.log_event(&message, true);
                1
            }
        };
        status.log_event("Exiting", false);
        status.finish();
        code
    }
}
