//! Retry with capped exponential backoff and jitter.
//!
//! Every call the pipeline makes to PostgreSQL, Redis or OpenSearch goes
//! through [`RetryPolicy::retry`]. The caller decides which failures are
//! worth retrying by passing a classification predicate; everything else is
//! returned on the first failure.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

/// How long to wait between attempts and when to give up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the un-jittered delay.
    pub max_delay: Duration,
    /// Growth factor applied to the delay after every attempt.
    pub factor: u32,
    /// Total attempts allowed, including the first. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            factor: 2,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay schedule seeded from system entropy.
    pub fn schedule(&self) -> BackoffSchedule<StdRng> {
        self.schedule_with_rng(StdRng::from_entropy())
    }

    /// Delay schedule drawing jitter from `rng`.
    pub fn schedule_with_rng<R: Rng>(&self, rng: R) -> BackoffSchedule<R> {
        BackoffSchedule {
            next_base: self.initial_delay.min(self.max_delay),
            max_delay: self.max_delay,
            factor: self.factor.max(1),
            rng,
        }
    }

    /// Run `op` until it succeeds, fails with an error `is_transient`
    /// rejects, or the attempt limit is reached.
    ///
    /// Sleeps between attempts follow [`BackoffSchedule`]. Each retry is
    /// logged at `warn` with the operation name and the error.
    pub async fn retry<T, E, Op, Fut, C>(
        &self,
        operation: &str,
        is_transient: C,
        mut op: Op,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: fmt::Display,
    {
        let mut schedule = self.schedule();
        let mut attempt: u32 = 1;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_transient(&err) {
                return Err(err);
            }
            if self.max_attempts.is_some_and(|max| attempt >= max) {
                warn!(operation, attempt, error = %err, "Giving up after transient failures");
                return Err(err);
            }

            let delay = schedule.next_delay();
            warn!(
                operation,
                attempt,
                delay_ms = delay.sleep.as_millis() as u64,
                error = %err,
                "Transient failure, retrying"
            );
            tokio::time::sleep(delay.sleep).await;
            attempt = attempt.saturating_add(1);
        }
    }
}

/// One step of a [`BackoffSchedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffDelay {
    /// The capped exponential delay.
    pub base: Duration,
    /// `base` plus uniform jitter in `[0, base]`; what is actually slept.
    pub sleep: Duration,
}

/// Endless sequence of retry delays.
///
/// The base delay starts at the policy's initial delay, is multiplied by the
/// factor after every step and never exceeds the maximum. The slept duration
/// adds a uniformly random extra of up to one base delay.
#[derive(Debug)]
pub struct BackoffSchedule<R> {
    next_base: Duration,
    max_delay: Duration,
    factor: u32,
    rng: R,
}

impl<R: Rng> BackoffSchedule<R> {
    pub fn next_delay(&mut self) -> BackoffDelay {
        let base = self.next_base;
        self.next_base = base.saturating_mul(self.factor).min(self.max_delay);

        let base_nanos = u64::try_from(base.as_nanos()).unwrap_or(u64::MAX);
        let jitter = Duration::from_nanos(self.rng.gen_range(0..=base_nanos));

        BackoffDelay {
            base,
            sleep: base.saturating_add(jitter),
        }
    }
}

impl<R: Rng> Iterator for BackoffSchedule<R> {
    type Item = BackoffDelay;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_delay())
    }
}
