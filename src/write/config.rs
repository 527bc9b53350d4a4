use std::{fmt, sync::Arc, time::Duration};

use crate::Error;
use crate::backoff::DEFAULT_INITIAL_BACKOFF;

/// Predicate deciding whether a failed batch write call may be retried
pub type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Retry behavior for batch write calls
///
/// A failed call is retried until `max_attempts` or `max_duration` is
/// exceeded, whichever comes first, as long as the retry predicate accepts
/// the error. `initial_duration` is also the first wait of the resume loop
/// that resubmits unprocessed items.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use dynamo_io::write::RetryConfiguration;
///
/// let config = RetryConfiguration::builder()
///     .max_attempts(4)
///     .max_duration(Duration::from_secs(60))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.max_attempts(), 4);
/// ```
#[derive(Clone)]
pub struct RetryConfiguration {
    max_attempts: usize,
    max_duration: Duration,
    initial_duration: Duration,
    retry_predicate: RetryPredicate,
}

impl RetryConfiguration {
    /// Start building a retry configuration
    pub fn builder() -> RetryConfigurationBuilder {
        RetryConfigurationBuilder::default()
    }

    /// Maximum number of attempts, the first one included
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Maximum cumulative time spent waiting between attempts
    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// First wait of both the retry and the resume backoff
    pub fn initial_duration(&self) -> Duration {
        self.initial_duration
    }

    /// Whether the retry predicate accepts this error
    pub fn can_retry(&self, error: &Error) -> bool {
        (self.retry_predicate)(error)
    }
}

impl fmt::Debug for RetryConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfiguration")
            .field("max_attempts", &self.max_attempts)
            .field("max_duration", &self.max_duration)
            .field("initial_duration", &self.initial_duration)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RetryConfiguration`]
#[derive(Default)]
pub struct RetryConfigurationBuilder {
    max_attempts: Option<usize>,
    max_duration: Option<Duration>,
    initial_duration: Option<Duration>,
    retry_predicate: Option<RetryPredicate>,
}

impl fmt::Debug for RetryConfigurationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfigurationBuilder")
            .field("max_attempts", &self.max_attempts)
            .field("max_duration", &self.max_duration)
            .field("initial_duration", &self.initial_duration)
            .finish_non_exhaustive()
    }
}

impl RetryConfigurationBuilder {
    /// Maximum number of attempts, must be greater than 0
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Maximum cumulative backoff, must be greater than 0
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// First wait between attempts, defaults to 5 seconds
    pub fn initial_duration(mut self, initial_duration: Duration) -> Self {
        self.initial_duration = Some(initial_duration);
        self
    }

    /// Override which errors are retried
    ///
    /// Defaults to [`Error::is_dynamodb_error`].
    pub fn retry_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<RetryConfiguration, Error> {
        let max_attempts = self
            .max_attempts
            .filter(|attempts| *attempts > 0)
            .ok_or_else(|| Error::config("maxAttempts should be greater than 0"))?;

        let max_duration = self
            .max_duration
            .filter(|duration| !duration.is_zero())
            .ok_or_else(|| Error::config("maxDuration should be greater than 0"))?;

        let initial_duration = self.initial_duration.unwrap_or(DEFAULT_INITIAL_BACKOFF);
        if initial_duration.is_zero() {
            return Err(Error::config("initialDuration should be greater than 0"));
        }

        let retry_predicate: RetryPredicate = match self.retry_predicate {
            Some(predicate) => predicate,
            None => Arc::new(Error::is_dynamodb_error),
        };

        Ok(RetryConfiguration {
            max_attempts,
            max_duration,
            initial_duration,
            retry_predicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::error::BuildError;

    #[test]
    fn test_defaults() {
        let config = RetryConfiguration::builder()
            .max_attempts(3)
            .max_duration(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.max_duration(), Duration::from_secs(30));
        assert_eq!(config.initial_duration(), Duration::from_secs(5));
        assert!(config.can_retry(&Error::Client("unavailable".into())));
        assert!(!config.can_retry(&Error::config("nope")));
    }

    #[test]
    fn test_default_predicate_skips_request_builder_errors() {
        let config = RetryConfiguration::builder()
            .max_attempts(3)
            .max_duration(Duration::from_secs(30))
            .build()
            .unwrap();

        let err = Error::BuildError(BuildError::other("missing table name"));
        assert!(!config.can_retry(&err));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = RetryConfiguration::builder()
            .max_attempts(0)
            .max_duration(Duration::from_secs(30))
            .build()
            .unwrap_err();

        assert!(err.is_config_error());
        assert!(err.to_string().contains("maxAttempts"));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = RetryConfiguration::builder()
            .max_attempts(3)
            .max_duration(Duration::ZERO)
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("maxDuration"));
    }

    #[test]
    fn test_missing_duration_rejected() {
        let err = RetryConfiguration::builder()
            .max_attempts(3)
            .build()
            .unwrap_err();

        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_initial_duration_rejected() {
        let err = RetryConfiguration::builder()
            .max_attempts(3)
            .max_duration(Duration::from_secs(1))
            .initial_duration(Duration::ZERO)
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("initialDuration"));
    }

    #[test]
    fn test_custom_predicate() {
        let config = RetryConfiguration::builder()
            .max_attempts(2)
            .max_duration(Duration::from_secs(1))
            .retry_predicate(|e| matches!(e, Error::Client(m) if m.contains("503")))
            .build()
            .unwrap();

        let unavailable = Error::Client("503 Service Unavailable".into());
        assert!(config.can_retry(&unavailable));
        assert!(!config.can_retry(&Error::Client("400 Bad Request".into())));
    }
}
