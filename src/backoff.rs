//! Exponential backoff policies.
//!
//! A [`BackoffPolicy`] is an immutable set of parameters; calling
//! [`BackoffPolicy::backoff`] yields a fresh [`Backoff`] that tracks how many
//! waits were handed out and how long they added up to.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::write::RetryConfiguration;

/// Initial wait used when no retry configuration overrides it
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(5);

const DEFAULT_EXPONENT: f64 = 1.5;
const DEFAULT_RANDOMIZATION: f64 = 0.5;
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Parameters of an exponential backoff
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    initial_backoff: Duration,
    exponent: f64,
    randomization: f64,
    max_backoff: Duration,
    max_retries: Option<usize>,
    max_cumulative_backoff: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            exponent: DEFAULT_EXPONENT,
            randomization: DEFAULT_RANDOMIZATION,
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_retries: None,
            max_cumulative_backoff: None,
        }
    }
}

impl BackoffPolicy {
    /// Policy for retrying a failed call.
    ///
    /// Without a configuration no retry is made at all.
    pub fn retry(config: Option<&RetryConfiguration>) -> Self {
        match config {
            Some(config) => Self::default()
                .with_max_retries(config.max_attempts() - 1)
                .with_initial_backoff(config.initial_duration())
                .with_max_cumulative_backoff(config.max_duration()),
            None => Self::default().with_max_retries(0),
        }
    }

    /// Policy for resubmitting unprocessed items. Never gives up on its own.
    pub fn resume(config: Option<&RetryConfiguration>) -> Self {
        let policy = Self::default();
        match config {
            Some(config) => policy.with_initial_backoff(config.initial_duration()),
            None => policy,
        }
    }

    /// Wait before the first retry
    pub fn with_initial_backoff(self, initial_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            ..self
        }
    }

    /// Growth factor applied per retry
    pub fn with_exponent(self, exponent: f64) -> Self {
        Self { exponent, ..self }
    }

    /// Fraction of each wait that is randomized, `0.0` disables jitter
    pub fn with_randomization(self, randomization: f64) -> Self {
        Self {
            randomization: randomization.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Upper bound of a single wait
    pub fn with_max_backoff(self, max_backoff: Duration) -> Self {
        Self {
            max_backoff,
            ..self
        }
    }

    /// Number of waits handed out before the backoff is exhausted
    pub fn with_max_retries(self, max_retries: usize) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..self
        }
    }

    /// Total waiting time after which the backoff is exhausted
    pub fn with_max_cumulative_backoff(self, max_cumulative_backoff: Duration) -> Self {
        Self {
            max_cumulative_backoff: Some(max_cumulative_backoff),
            ..self
        }
    }

    /// Initial wait
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Retry ceiling, `None` when unbounded
    pub fn max_retries(&self) -> Option<usize> {
        self.max_retries
    }

    /// Cumulative wait ceiling, `None` when unbounded
    pub fn max_cumulative_backoff(&self) -> Option<Duration> {
        self.max_cumulative_backoff
    }

    /// Start a new backoff sequence
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            retries: 0,
            cumulative: Duration::ZERO,
        }
    }
}

/// State of one backoff sequence
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    retries: usize,
    cumulative: Duration,
}

impl Backoff {
    /// The next wait, or `None` once the policy is exhausted
    pub fn next_backoff(&mut self) -> Option<Duration> {
        let policy = &self.policy;

        if policy.max_retries.is_some_and(|max| self.retries >= max) {
            return None;
        }
        if policy
            .max_cumulative_backoff
            .is_some_and(|max| self.cumulative >= max)
        {
            return None;
        }

        let retries = self.retries.min(i32::MAX as usize) as i32;
        let exponential = policy.initial_backoff.as_secs_f64() * policy.exponent.powi(retries);
        let capped = exponential.min(policy.max_backoff.as_secs_f64());

        let randomized = if policy.randomization > 0.0 {
            let spread = capped * policy.randomization;
            let range = (capped - spread)..=(capped + spread);
            rand::thread_rng().gen_range(range)
        } else {
            capped
        };

        let mut wait = Duration::from_secs_f64(randomized.max(0.0));
        if let Some(max) = policy.max_cumulative_backoff {
            wait = wait.min(max.saturating_sub(self.cumulative));
        }

        self.retries += 1;
        self.cumulative += wait;
        Some(wait)
    }

    /// Sleep for the next wait. Returns `false` without sleeping when exhausted.
    pub async fn next(&mut self) -> bool {
        match self.next_backoff() {
            Some(wait) => {
                sleep(wait).await;
                true
            }
            None => false,
        }
    }

    /// Number of waits handed out so far
    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Sum of the waits handed out so far
    pub fn cumulative(&self) -> Duration {
        self.cumulative
    }
}
