use metrics::{Counter, counter};
use std::{collections::HashMap, fmt};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::Error;
use crate::backoff::BackoffPolicy;
use crate::client::StoreClient;
use crate::write::{DedupIdentity, RetryConfiguration, TableWrite, WriteOperation};

/// Maximum number of operations in one `BatchWriteItem` call
pub const BATCH_SIZE: usize = 25;

/// Counter incremented on every terminal write failure
pub const WRITE_FAILURES: &str = "dynamodb_write_failures";

/// Write operations grouped by destination table
pub type WritesPerTable = HashMap<String, Vec<WriteOperation>>;

/// Number of operations across all tables
pub fn operation_count(writes: &WritesPerTable) -> usize {
    writes.values().map(Vec::len).sum()
}

/// Pending writes keyed by dedup identity; a later write replaces an earlier
/// one with the same identity
#[derive(Clone, Debug, Default)]
pub struct Batch {
    entries: Vec<(DedupIdentity, TableWrite)>,
}

impl Batch {
    /// Insert `write`, replacing any pending write with the same identity
    pub fn insert(&mut self, identity: DedupIdentity, write: TableWrite) {
        match self.entries.iter_mut().find(|(id, _)| *id == identity) {
            Some(entry) => entry.1 = write,
            None => self.entries.push((identity, write)),
        }
    }

    /// Number of distinct identities pending
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every pending write
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Pending writes grouped by table
    pub fn writes_per_table(&self) -> WritesPerTable {
        group_by_table(self.entries.iter().map(|(_, write)| write.clone()))
    }

    /// Take every pending write grouped by table, leaving the batch empty
    pub fn drain_per_table(&mut self) -> WritesPerTable {
        group_by_table(self.entries.drain(..).map(|(_, write)| write))
    }
}

fn group_by_table(writes: impl Iterator<Item = TableWrite>) -> WritesPerTable {
    let mut per_table = WritesPerTable::new();
    for write in writes {
        per_table
            .entry(write.table)
            .or_default()
            .push(write.operation);
    }
    per_table
}

/// Accumulates writes of one unit of work and flushes them in batches of
/// [`BATCH_SIZE`]
///
/// Each flush runs two loops. The retry loop resends a call that raised an
/// error, within the limits of the [`RetryConfiguration`]; without one every
/// error is terminal. The resume loop resubmits items the store reported as
/// unprocessed and never gives up unless a bounded resume policy is set with
/// [`WriteBatcher::with_resume_backoff`].
///
/// Call [`WriteBatcher::flush`] when the unit ends, otherwise the pending
/// writes are lost.
pub struct WriteBatcher<'a, C>
where
    C: StoreClient + ?Sized,
{
    client: &'a C,
    batch: Batch,
    deduplicate_keys: Vec<String>,
    retry_configuration: Option<RetryConfiguration>,
    retry_backoff: BackoffPolicy,
    resume_backoff: BackoffPolicy,
    write_failures: Counter,
}

impl<C> fmt::Debug for WriteBatcher<'_, C>
where
    C: StoreClient + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBatcher")
            .field("batch", &self.batch)
            .field("deduplicate_keys", &self.deduplicate_keys)
            .field("retry_configuration", &self.retry_configuration)
            .field("retry_backoff", &self.retry_backoff)
            .field("resume_backoff", &self.resume_backoff)
            .finish_non_exhaustive()
    }
}

impl<'a, C> WriteBatcher<'a, C>
where
    C: StoreClient + ?Sized,
{
    /// Batcher writing through `client`
    pub fn new(
        client: &'a C,
        retry_configuration: Option<RetryConfiguration>,
        deduplicate_keys: Vec<String>,
    ) -> Self {
        Self {
            client,
            batch: Batch::default(),
            deduplicate_keys,
            retry_backoff: BackoffPolicy::retry(retry_configuration.as_ref()),
            resume_backoff: BackoffPolicy::resume(retry_configuration.as_ref()),
            retry_configuration,
            write_failures: counter!(WRITE_FAILURES),
        }
    }

    /// Replace the policy used to resubmit unprocessed items
    pub fn with_resume_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.resume_backoff = policy;
        self
    }

    /// Replace the policy used to retry failed calls
    pub fn with_retry_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.retry_backoff = policy;
        self
    }

    /// Report terminal failures to `counter` instead of the global recorder
    pub fn with_failure_counter(mut self, counter: Counter) -> Self {
        self.write_failures = counter;
        self
    }

    /// Number of writes waiting for the next flush
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Queue a write, flushing once a full batch is pending
    pub async fn add(&mut self, write: TableWrite) -> Result<(), Error> {
        let identity = DedupIdentity::of(&write, &self.deduplicate_keys);
        self.batch.insert(identity, write);

        if self.batch.len() >= BATCH_SIZE {
            self.flush().await?;
        }

        Ok(())
    }

    /// Write every pending operation
    ///
    /// The batch is empty afterwards whether or not the flush succeeded.
    pub async fn flush(&mut self) -> Result<(), Error> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let mut writes = self.batch.drain_per_table();
        let mut resume = self.resume_backoff.backoff();

        loop {
            writes = self.write_with_retries(writes).await?;
            if writes.is_empty() {
                return Ok(());
            }

            match resume.next_backoff() {
                Some(wait) => {
                    debug!(
                        unprocessed = operation_count(&writes),
                        wait_ms = wait.as_millis() as u64,
                        "Resuming unprocessed items"
                    );
                    sleep(wait).await;
                }
                None => break,
            }
        }

        let remaining = operation_count(&writes);
        self.write_failures.increment(1);
        error!(
            remaining,
            unprocessed = ?writes,
            "Error writing remaining unprocessed items to DynamoDB"
        );
        Err(Error::UnprocessedItems { remaining })
    }

    /// One batch write call, retried on errors the configuration allows
    ///
    /// Returns the items the store left unprocessed; tables with nothing left
    /// are dropped.
    async fn write_with_retries(&self, writes: WritesPerTable) -> Result<WritesPerTable, Error> {
        let mut backoff = self.retry_backoff.backoff();
        let mut attempt = 0;

        let last_error = loop {
            attempt += 1;

            let error = match self.client.batch_write(writes.clone()).await {
                Ok(mut unprocessed) => {
                    unprocessed.retain(|_, operations| !operations.is_empty());
                    return Ok(unprocessed);
                }
                Err(error) => error,
            };

            if !self.can_retry(&error) {
                break error;
            }

            match backoff.next_backoff() {
                Some(wait) => {
                    debug!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %error,
                        "Retrying batch write"
                    );
                    sleep(wait).await;
                }
                None => break error,
            }
        };

        self.write_failures.increment(1);
        warn!(
            attempts = attempt,
            items = ?writes,
            error = %last_error,
            "Error writing items to DynamoDB"
        );

        let retried = self.can_retry(&last_error);
        let source = Box::new(last_error);
        if retried {
            Err(Error::RetriesExhausted {
                attempts: attempt,
                source,
            })
        } else {
            Err(Error::NoRetry { source })
        }
    }

    fn can_retry(&self, error: &Error) -> bool {
        self.retry_configuration
            .as_ref()
            .is_some_and(|config| config.can_retry(error))
    }
}
