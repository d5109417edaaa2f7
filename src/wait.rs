//! Cooperative, interruptible waiting.
//!
//! All suspension in the bot goes through [`Waiter::wait`]: it sleeps in
//! small ticks, shows the remaining time on the status display after each
//! tick, and checks for an operator interrupt before every tick.

use std::thread;
use std::time::Duration;

use crate::error::RunError;
use crate::shutdown::Shutdown;
use crate::status::Status;

/// The sleeping primitive, so tests can observe waits without waiting.
pub trait Sleep {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

pub struct Waiter {
    sleeper: Box<dyn Sleep>,
    shutdown: Shutdown,
}

impl Waiter {
    pub fn new(sleeper: Box<dyn Sleep>, shutdown: Shutdown) -> Self {
        Self { sleeper, shutdown }
    }

    /// Fail with [`RunError::Cancelled`] if an interrupt arrived.
    pub fn check_cancelled(&self) -> Result<(), RunError> {
        if self.shutdown.is_requested() {
            Err(RunError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `total` in `tick` steps.  `template` is shown as a transient
    /// status with its `{}` replaced by the humanized remaining time.
    pub fn wait(
        &self,
        status: &mut Status,
        total: Duration,
        template: &str,
        tick: Duration,
    ) -> Result<(), RunError> {
        let tick = if tick.is_zero() { Duration::from_secs(1) } else { tick };
        let mut remaining = total;
        while !remaining.is_zero() {
            self.check_cancelled()?;
            status.show_transient(&template.replacen("{}", &humanize(remaining), 1));
            self.sleeper.sleep(remaining.min(tick));
            remaining = remaining.saturating_sub(tick);
        }
        self.check_cancelled()
    }
}

/// `1 hour, 2 minutes and 5 seconds` style rendering, whole seconds only.
pub fn humanize(duration: Duration) -> String {
    let secs = duration.as_secs();
    let parts: Vec<String> = [
        (secs / 86_400, "day"),
        ((secs % 86_400) / 3_600, "hour"),
        ((secs % 3_600) / 60, "minute"),
        (secs % 60, "second"),
    ]
    .into_iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, unit)| if n == 1 { format!("1 {unit}") } else { format!("{n} {unit}s") })
    .collect();

    match parts.as_slice() {
        [] => "0 seconds".to_string(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::status::tests::recording_status;
    use std::cell::RefCell;
    use std::rc::Rc;

    impl Waiter {
        pub fn shutdown(&self) -> &Shutdown {
            &self.shutdown
        }
    }

    /// Records requested sleeps; optionally requests shutdown after `n`.
    #[derive(Clone, Default)]
    pub struct FakeSleep {
        pub slept: Rc<RefCell<Vec<Duration>>>,
        pub cancel_after: Option<(usize, Shutdown)>,
    }

    impl FakeSleep {
        pub fn total(&self) -> Duration {
            self.slept.borrow().iter().sum()
        }
    }

    impl Sleep for FakeSleep {
        fn sleep(&self, duration: Duration) {
            let mut slept = self.slept.borrow_mut();
            slept.push(duration);
            if let Some((n, shutdown)) = &self.cancel_after {
                if slept.len() >= *n {
                    shutdown.request();
                }
            }
        }
    }

    pub fn fake_waiter() -> (Waiter, FakeSleep) {
        let sleep = FakeSleep::default();
        (Waiter::new(Box::new(sleep.clone()), Shutdown::new()), sleep)
    }

    #[test]
    fn humanize_durations() {
        assert_eq!(humanize(Duration::ZERO), "0 seconds");
        assert_eq!(humanize(Duration::from_secs(1)), "1 second");
        assert_eq!(humanize(Duration::from_secs(5)), "5 seconds");
        assert_eq!(humanize(Duration::from_secs(300)), "5 minutes");
        assert_eq!(humanize(Duration::from_secs(61)), "1 minute and 1 second");
        assert_eq!(humanize(Duration::from_secs(3_725)), "1 hour, 2 minutes and 5 seconds");
        assert_eq!(humanize(Duration::from_millis(2_900)), "2 seconds");
    }

    #[test]
    fn wait_counts_down_in_ticks() {
        let (waiter, sleep) = fake_waiter();
        let (mut status, log) = recording_status();

        waiter
            .wait(
                &mut status,
                Duration::from_secs(3),
                "Waiting for {} before attempting to resume",
                Duration::from_secs(1),
            )
            .unwrap();

        assert_eq!(sleep.slept.borrow().len(), 3);
        assert_eq!(sleep.total(), Duration::from_secs(3));
        let log = log.borrow();
        let rendered = &log.rendered;
        assert_eq!(rendered[0], ">> Waiting for 3 seconds before attempting to resume ...");
        assert_eq!(rendered[2], ">> Waiting for 1 second before attempting to resume ...");
    }

    #[test]
    fn last_tick_is_shortened() {
        let (waiter, sleep) = fake_waiter();
        let (mut status, _) = recording_status();

        waiter
            .wait(&mut status, Duration::from_secs(150), "{}", Duration::from_secs(60))
            .unwrap();

        assert_eq!(
            *sleep.slept.borrow(),
            vec![Duration::from_secs(60), Duration::from_secs(60), Duration::from_secs(30)]
        );
    }

    #[test]
    fn zero_wait_does_not_sleep() {
        let (waiter, sleep) = fake_waiter();
        let (mut status, _) = recording_status();
        waiter.wait(&mut status, Duration::ZERO, "{}", Duration::from_secs(1)).unwrap();
        assert!(sleep.slept.borrow().is_empty());
    }

    #[test]
    fn cancellation_is_checked_between_ticks() {
        let shutdown = Shutdown::new();
        let sleep = FakeSleep {
            cancel_after: Some((2, shutdown.clone())),
            ..FakeSleep::default()
        };
        let waiter = Waiter::new(Box::new(sleep.clone()), shutdown);
        let (mut status, _) = recording_status();

        let result = waiter.wait(&mut status, Duration::from_secs(60), "{}", Duration::from_secs(1));

        assert!(matches!(result, Err(RunError::Cancelled)));
        assert_eq!(sleep.slept.borrow().len(), 2);
    }
}
