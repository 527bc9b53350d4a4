//! Deduplicating batch writes.
//!
//! A [`Write`] turns each bundle of records into one unit of work: the unit
//! opens its own client, maps every record to a [`TableWrite`], feeds it to a
//! [`WriteBatcher`] and flushes what is left when the bundle ends.

mod batcher;
mod config;
mod dedup;

use serde::Serialize;
use serde_dynamo::to_item;
use std::{fmt, sync::Arc};

use crate::Error;
use crate::client::{ClientProvider, StoreClient};
use crate::distribute::WorkDistributor;

pub use batcher::{BATCH_SIZE, Batch, WRITE_FAILURES, WriteBatcher, WritesPerTable, operation_count};
pub use config::{RetryConfiguration, RetryConfigurationBuilder, RetryPredicate};
pub use dedup::{DedupIdentity, Item, TableWrite, WriteOperation, extract_dedup_key};

/// Transform from a record to the write it produces
pub type WriteRequestMapper<T> = Arc<dyn Fn(&T) -> Result<TableWrite, Error> + Send + Sync>;

/// Mapper putting any serializable record into `table`
pub fn put_mapper<T>(table: impl Into<String>) -> WriteRequestMapper<T>
where
    T: Serialize + 'static,
{
    let table = table.into();
    Arc::new(move |record: &T| -> Result<TableWrite, Error> {
        Ok(TableWrite::put(table.clone(), to_item(record)?))
    })
}

/// Validated configuration of a batch write
///
/// # Example
///
/// ```rust,no_run
/// use dynamo_io::client::DynamoDbClientProvider;
/// use dynamo_io::distribute::ConcurrentDistributor;
/// use dynamo_io::write::{RetryConfiguration, Write, put_mapper};
/// use serde::Serialize;
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// # async fn example(bundles: Vec<Vec<User>>) -> Result<(), dynamo_io::Error> {
/// let write = Write::builder()
///     .client_provider(DynamoDbClientProvider::Environment)
///     .write_request_mapper(put_mapper::<User>("users"))
///     .retry_configuration(
///         RetryConfiguration::builder()
///             .max_attempts(5)
///             .max_duration(Duration::from_secs(60))
///             .build()?,
///     )
///     .deduplicate_keys(["id"])
///     .build()?;
///
/// let written = write.write_all(bundles, &ConcurrentDistributor::default()).await?;
/// println!("wrote {written} records");
/// # Ok(())
/// # }
/// ```
pub struct Write<P, T> {
    client_provider: P,
    write_request_mapper: WriteRequestMapper<T>,
    retry_configuration: Option<RetryConfiguration>,
    deduplicate_keys: Vec<String>,
}

impl<P, T> fmt::Debug for Write<P, T>
where
    P: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Write")
            .field("client_provider", &self.client_provider)
            .field("retry_configuration", &self.retry_configuration)
            .field("deduplicate_keys", &self.deduplicate_keys)
            .finish_non_exhaustive()
    }
}

impl<P, T> Write<P, T> {
    /// Start building a write
    pub fn builder() -> WriteBuilder<P, T> {
        WriteBuilder::default()
    }

    /// Retry configuration, `None` when every failed call is terminal
    pub fn retry_configuration(&self) -> Option<&RetryConfiguration> {
        self.retry_configuration.as_ref()
    }

    /// Attribute names under which duplicate writes collapse
    pub fn deduplicate_keys(&self) -> &[String] {
        &self.deduplicate_keys
    }
}

impl<P, T> Write<P, T>
where
    P: ClientProvider,
{
    /// Write one bundle of records on a client of its own
    ///
    /// Returns the number of records accepted. The client is closed once the
    /// final flush has run or the bundle has failed.
    pub async fn write_bundle<I>(&self, records: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let client = self.client_provider.open().await?;
        let result = self.write_records(&client, records).await;
        client.close();
        result
    }

    async fn write_records<I>(&self, client: &P::Client, records: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = T>,
    {
        let mut batcher = WriteBatcher::new(
            client,
            self.retry_configuration.clone(),
            self.deduplicate_keys.clone(),
        );

        let mut accepted = 0;
        for record in records {
            batcher.add((self.write_request_mapper)(&record)?).await?;
            accepted += 1;
        }
        batcher.flush().await?;

        Ok(accepted)
    }

    /// Write every bundle as an independent unit through `distributor`
    ///
    /// Returns the total number of records accepted.
    pub async fn write_all<I, D>(&self, bundles: Vec<I>, distributor: &D) -> Result<usize, Error>
    where
        I: IntoIterator<Item = T>,
        D: WorkDistributor,
    {
        let counts = distributor
            .run(bundles, move |bundle| self.write_bundle(bundle))
            .await?;

        Ok(counts.into_iter().sum())
    }
}

/// Builder for [`Write`]
pub struct WriteBuilder<P, T> {
    client_provider: Option<P>,
    write_request_mapper: Option<WriteRequestMapper<T>>,
    retry_configuration: Option<RetryConfiguration>,
    deduplicate_keys: Vec<String>,
}

impl<P, T> Default for WriteBuilder<P, T> {
    fn default() -> Self {
        Self {
            client_provider: None,
            write_request_mapper: None,
            retry_configuration: None,
            deduplicate_keys: Vec::new(),
        }
    }
}

impl<P, T> fmt::Debug for WriteBuilder<P, T>
where
    P: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBuilder")
            .field("client_provider", &self.client_provider)
            .field("retry_configuration", &self.retry_configuration)
            .field("deduplicate_keys", &self.deduplicate_keys)
            .finish_non_exhaustive()
    }
}

impl<P, T> WriteBuilder<P, T> {
    /// Provider opening one client per bundle
    pub fn client_provider(mut self, provider: P) -> Self {
        self.client_provider = Some(provider);
        self
    }

    /// Transform from a record to its write
    pub fn write_request_mapper(mut self, mapper: WriteRequestMapper<T>) -> Self {
        self.write_request_mapper = Some(mapper);
        self
    }

    /// Transform from a record to its write, from a closure
    pub fn write_request_fn<F>(self, f: F) -> Self
    where
        F: Fn(&T) -> Result<TableWrite, Error> + Send + Sync + 'static,
    {
        self.write_request_mapper(Arc::new(f))
    }

    /// Retry failed calls; without it every failed call is terminal
    pub fn retry_configuration(mut self, config: RetryConfiguration) -> Self {
        self.retry_configuration = Some(config);
        self
    }

    /// Attribute names under which duplicate writes collapse
    ///
    /// Without keys only writes with identical attributes collapse.
    pub fn deduplicate_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deduplicate_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and build the write
    pub fn build(self) -> Result<Write<P, T>, Error> {
        let client_provider = self
            .client_provider
            .ok_or_else(|| Error::config("client_provider is required"))?;
        let write_request_mapper = self
            .write_request_mapper
            .ok_or_else(|| Error::config("write_request_mapper is required"))?;

        Ok(Write {
            client_provider,
            write_request_mapper,
            retry_configuration: self.retry_configuration,
            deduplicate_keys: self.deduplicate_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::AttributeValue;

    #[derive(Serialize)]
    struct User {
        id: String,
        age: u32,
    }

    #[test]
    fn test_put_mapper_serializes_record() {
        let mapper = put_mapper::<User>("users");
        let write = mapper(&User {
            id: "u1".into(),
            age: 42,
        })
        .unwrap();

        assert_eq!(write.table, "users");
        let WriteOperation::Put(item) = write.operation else {
            panic!("expected a put");
        };
        assert_eq!(item["id"], AttributeValue::S("u1".into()));
        assert_eq!(item["age"], AttributeValue::N("42".into()));
    }

    #[test]
    fn test_builder_requires_provider_and_mapper() {
        let err = Write::<(), User>::builder()
            .write_request_mapper(put_mapper("users"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("client_provider"));

        let err = Write::<(), User>::builder()
            .client_provider(())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("write_request_mapper"));
    }

    #[test]
    fn test_builder_defaults() {
        let write = Write::<(), User>::builder()
            .client_provider(())
            .write_request_mapper(put_mapper("users"))
            .deduplicate_keys(["id"])
            .build()
            .unwrap();

        assert!(write.retry_configuration().is_none());
        assert_eq!(write.deduplicate_keys(), ["id".to_string()]);
    }
}
