//! Uniform retry policy for every outbound network call.
//!
//! [`Retry::call`] invokes an operation until it succeeds or fails with a
//! fault the predicate refuses to retry.  There is no attempt cap: a
//! transient fault is waited out with exponential backoff for as long as it
//! keeps happening, and only a permanent fault or an operator interrupt
//! ends the loop.
//!
//! The operation is re-invoked as-is, so callers must only wrap operations
//! that are safe to repeat.

use std::time::Duration;

use crate::error::{Fault, RunError};
use crate::status::Status;
use crate::taxonomy::{self, Category, Classification};
use crate::wait::{humanize, Waiter};

const RESUME_TEMPLATE: &str = "Waiting for {} before attempting to resume";
const TICK: Duration = Duration::from_secs(1);

/// `min(max, multiplier × 2^(attempt-1))`, attempts counted from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub multiplier: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(multiplier: Duration, max: Duration) -> Self {
        Self { multiplier, max }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.multiplier
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }
}

/// Book-keeping for one wrapped call.
#[derive(Debug)]
struct RetryState {
    attempt: u32,
    upcoming_sleep: Duration,
    last: Option<Classification>,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 1,
            upcoming_sleep: Duration::ZERO,
            last: None,
        }
    }
}

pub struct Retry {
    backoff: Backoff,
    waiter: Waiter,
    subreddit: String,
}

impl Retry {
    /// `subreddit` only words the descriptions of subreddit access faults.
    pub fn new(backoff: Backoff, waiter: Waiter, subreddit: impl Into<String>) -> Self {
        Self {
            backoff,
            waiter,
            subreddit: subreddit.into(),
        }
    }

    pub fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    pub fn classify(&self, fault: &Fault) -> Classification {
        taxonomy::classify(fault, &self.subreddit)
    }

    /// Call `op`, retrying the transient categories.
    pub fn call<T, F>(&self, status: &mut Status, op: F) -> Result<T, RunError>
    where
        F: FnMut() -> Result<T, Fault>,
    {
        self.call_with(status, op, Category::is_retryable)
    }

    /// Call `op`, retrying every fault whose category passes `is_retryable`.
    pub fn call_with<T, F, P>(
        &self,
        status: &mut Status,
        mut op: F,
        is_retryable: P,
    ) -> Result<T, RunError>
    where
        F: FnMut() -> Result<T, Fault>,
        P: Fn(Category) -> bool,
    {
        let mut state = RetryState::new();
        loop {
            let fault = match op() {
                Ok(value) => {
                    if state.attempt > 1 {
                        status.log_event("Successfully resumed", false);
                    }
                    return Ok(value);
                }
                Err(fault) => fault,
            };

            tracing::error!(attempt = state.attempt, "{fault:?}: {fault}");
            let classification = self.classify(&fault);
            if !is_retryable(classification.category) {
                return Err(RunError::Fault(fault));
            }

            state.upcoming_sleep = self.backoff.delay(state.attempt);
            status.log_event(
                &format!(
                    "{}, retrying after {}",
                    classification.description,
                    humanize(state.upcoming_sleep)
                ),
                true,
            );
            state.last = Some(classification);

            self.waiter
                .wait(status, state.upcoming_sleep, RESUME_TEMPLATE, TICK)?;
            status.restore();

            tracing::debug!(
                attempt = state.attempt,
                last = ?state.last.as_ref().map(|c| c.category),
                "retrying"
            );
            state.attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DestinationFault, SourceFault, TransportFault};
    use crate::shutdown::Shutdown;
    use crate::status::tests::recording_status;
    use crate::wait::tests::FakeSleep;
    use std::cell::Cell;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn retry_with(sleep: FakeSleep, shutdown: Shutdown) -> Retry {
        Retry::new(Backoff::default(), Waiter::new(Box::new(sleep), shutdown), "PodcastSharing")
    }

    /// An operation that fails `n` times with `fault`, then returns its call count.
    fn flaky(n: u32, fault: Fault) -> (impl FnMut() -> Result<u32, Fault>, std::rc::Rc<Cell<u32>>) {
        let calls = std::rc::Rc::new(Cell::new(0));
        let counter = calls.clone();
        let op = move || {
            counter.set(counter.get() + 1);
            if counter.get() <= n {
                Err(fault.clone())
            } else {
                Ok(counter.get())
            }
        };
        (op, calls)
    }

    #[test]
    fn backoff_schedule() {
        let backoff = Backoff::new(secs(5), secs(300));
        let delays: Vec<u64> = (1..=10).map(|k| backoff.delay(k).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 300, 300, 300, 300]);
    }

    #[test]
    fn backoff_does_not_overflow() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), secs(5));
        assert_eq!(backoff.delay(64), secs(300));
        assert_eq!(backoff.delay(u32::MAX), secs(300));
    }

    #[test]
    fn retryable_faults_never_escape() {
        for n in [0u32, 1, 5, 50] {
            let sleep = FakeSleep::default();
            let retry = retry_with(sleep.clone(), Shutdown::new());
            let (mut status, log) = recording_status();
            let (op, calls) = flaky(n, TransportFault::ReadTimeout("slow".into()).into());

            let value = retry.call(&mut status, op).unwrap();

            assert_eq!(value, n + 1);
            assert_eq!(calls.get(), n + 1);
            let expected: Duration = (1..=n).map(|k| Backoff::default().delay(k)).sum();
            assert_eq!(sleep.total(), expected, "n = {n}");

            let log = log.borrow();
            assert_eq!(log.errors().len(), n as usize);
            let resumed = log.messages().iter().filter(|m| *m == "Successfully resumed").count();
            assert_eq!(resumed, usize::from(n > 0));
        }
    }

    #[test]
    fn each_transient_category_is_retried() {
        let faults: Vec<Fault> = vec![
            TransportFault::Connection("refused".into()).into(),
            SourceFault::Request(TransportFault::ConnectTimeout("t".into())).into(),
            SourceFault::TooManyRequests.into(),
            SourceFault::BadJson.into(),
            DestinationFault::InvokeTimeout.into(),
            DestinationFault::Status(503, String::new()).into(),
        ];
        for fault in faults {
            let retry = retry_with(FakeSleep::default(), Shutdown::new());
            let (mut status, _) = recording_status();
            let (op, calls) = flaky(1, fault);
            assert!(retry.call(&mut status, op).is_ok());
            assert_eq!(calls.get(), 2);
        }
    }

    #[test]
    fn permanent_faults_propagate_without_sleeping() {
        let faults: Vec<Fault> = vec![
            SourceFault::OAuth("invalid_grant".into()).into(),
            SourceFault::Response(401).into(),
            SourceFault::NotFound.into(),
            SourceFault::Redirect.into(),
            SourceFault::Forbidden.into(),
            SourceFault::Request(TransportFault::Other("bad header".into())).into(),
            DestinationFault::Unauthorized("nope".into()).into(),
        ];
        for fault in faults {
            let sleep = FakeSleep::default();
            let retry = retry_with(sleep.clone(), Shutdown::new());
            let (mut status, log) = recording_status();
            let (op, calls) = flaky(1, fault.clone());

            let err = retry.call(&mut status, op).unwrap_err();

            assert!(matches!(err, RunError::Fault(ref f) if *f == fault));
            assert_eq!(calls.get(), 1);
            assert!(sleep.slept.borrow().is_empty());
            assert!(log.borrow().events.is_empty());
        }
    }

    #[test]
    fn custom_predicate_decides() {
        let retry = retry_with(FakeSleep::default(), Shutdown::new());
        let (mut status, _) = recording_status();
        let (op, calls) = flaky(1, TransportFault::Connection("x".into()).into());

        let result = retry.call_with(&mut status, op, |_| false);

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retry_event_names_the_fault_and_the_wait() {
        let retry = retry_with(FakeSleep::default(), Shutdown::new());
        let (mut status, log) = recording_status();
        let (op, _) = flaky(2, TransportFault::Connection("x".into()).into());

        retry.call(&mut status, op).unwrap();

        let log = log.borrow();
        assert_eq!(
            log.errors(),
            vec![
                "Network connection is unavailable, retrying after 5 seconds",
                "Network connection is unavailable, retrying after 10 seconds",
            ]
        );
    }

    #[test]
    fn status_is_restored_after_waiting() {
        let retry = retry_with(FakeSleep::default(), Shutdown::new());
        let (mut status, log) = recording_status();
        status.set_status("Processing post", "posting to Bluesky");
        let (op, _) = flaky(1, DestinationFault::InvokeTimeout.into());

        retry.call(&mut status, op).unwrap();

        let log = log.borrow();
        assert!(log.rendered.iter().any(|l| l.contains("before attempting to resume")));
        assert_eq!(
            log.rendered.last().map(String::as_str),
            Some(">> Processing post : posting to Bluesky ...")
        );
    }

    #[test]
    fn cancellation_during_backoff_is_not_a_fault() {
        let shutdown = Shutdown::new();
        let sleep = FakeSleep {
            cancel_after: Some((7, shutdown.clone())),
            ..FakeSleep::default()
        };
        let retry = retry_with(sleep, shutdown);
        let (mut status, _) = recording_status();
        let (op, calls) = flaky(u32::MAX, TransportFault::Connection("x".into()).into());

        let err = retry.call(&mut status, op).unwrap_err();

        assert!(matches!(err, RunError::Cancelled));
        assert_eq!(calls.get(), 2);
    }
}
