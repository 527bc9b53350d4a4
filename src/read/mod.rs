//! Parallel segmented scans.
//!
//! A [`Read`] splits one [`ScanRequest`] into a [`ScanUnit`] per segment,
//! shuffles the units so they spread evenly over the available workers, and
//! paginates each unit to completion on its own client.

mod pages;
mod segments;

use serde::de::DeserializeOwned;
use std::{fmt, sync::Arc};

use crate::Error;
use crate::client::{ClientProvider, StoreClient};
use crate::distribute::{WorkDistributor, redistribute};
use crate::write::Item;

pub use pages::{PageMapper, ScanPage, items, paginate, read_segment, typed};
pub use segments::{ScanRequest, ScanUnit, split, validate};

/// Function producing the scan parameters
pub type ScanRequestFn = Arc<dyn Fn() -> ScanRequest + Send + Sync>;

/// Validated configuration of a segmented scan
///
/// # Example
///
/// ```rust,no_run
/// use dynamo_io::client::DynamoDbClientProvider;
/// use dynamo_io::distribute::ConcurrentDistributor;
/// use dynamo_io::read::{Read, ScanRequest};
///
/// # async fn example() -> Result<(), dynamo_io::Error> {
/// let read = Read::builder()
///     .client_provider(DynamoDbClientProvider::Environment)
///     .scan_request_fn(|| ScanRequest::new("users").with_total_segments(8))
///     .items()
///     .build()?;
///
/// let pages = read.execute(&ConcurrentDistributor::default()).await?;
/// println!("read {} pages", pages.len());
/// # Ok(())
/// # }
/// ```
pub struct Read<P, O> {
    client_provider: P,
    scan_request_fn: ScanRequestFn,
    scan_response_mapper: PageMapper<O>,
}

impl<P, O> fmt::Debug for Read<P, O>
where
    P: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Read")
            .field("client_provider", &self.client_provider)
            .finish_non_exhaustive()
    }
}

impl<P> Read<P, ()> {
    /// Start building a read; pick the output with one of the mapper setters
    pub fn builder() -> ReadBuilder<P, ()> {
        ReadBuilder::default()
    }
}

impl<P, O> Read<P, O>
where
    P: ClientProvider,
{
    /// Split the scan into shuffled per-segment units
    pub fn units(&self) -> Result<Vec<ScanUnit>, Error> {
        Ok(redistribute(split((self.scan_request_fn)())?))
    }

    /// Read one unit on a client of its own
    ///
    /// The client is closed once the segment is exhausted or has failed.
    pub async fn read_unit(&self, unit: ScanUnit) -> Result<Vec<O>, Error> {
        let client = self.client_provider.open().await?;
        let result = read_segment(&client, unit, &self.scan_response_mapper).await;
        client.close();
        result
    }

    /// Read every segment through `distributor`; outputs of a segment stay in
    /// page order, segments come back in completion order
    pub async fn execute<D>(&self, distributor: &D) -> Result<Vec<O>, Error>
    where
        D: WorkDistributor,
    {
        let units = self.units()?;
        let outputs = distributor
            .run(units, move |unit| self.read_unit(unit))
            .await?;

        Ok(outputs.into_iter().flatten().collect())
    }
}

/// Builder for [`Read`]
pub struct ReadBuilder<P, O> {
    client_provider: Option<P>,
    scan_request_fn: Option<ScanRequestFn>,
    scan_response_mapper: Option<PageMapper<O>>,
}

impl<P, O> Default for ReadBuilder<P, O> {
    fn default() -> Self {
        Self {
            client_provider: None,
            scan_request_fn: None,
            scan_response_mapper: None,
        }
    }
}

impl<P, O> fmt::Debug for ReadBuilder<P, O>
where
    P: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadBuilder")
            .field("client_provider", &self.client_provider)
            .finish_non_exhaustive()
    }
}

impl<P, O> ReadBuilder<P, O> {
    /// Provider opening one client per segment
    pub fn client_provider(mut self, provider: P) -> Self {
        self.client_provider = Some(provider);
        self
    }

    /// Function producing the scan parameters, including the segment count
    pub fn scan_request_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> ScanRequest + Send + Sync + 'static,
    {
        self.scan_request_fn = Some(Arc::new(f));
        self
    }

    /// Transform applied to every page
    pub fn scan_response_mapper<T, F>(self, f: F) -> ReadBuilder<P, T>
    where
        F: Fn(ScanPage) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.with_mapper(Arc::new(f))
    }

    /// Emit the raw items of every page
    pub fn items(self) -> ReadBuilder<P, Vec<Item>> {
        self.with_mapper(items())
    }

    /// Emit the items of every page deserialized into `T`
    pub fn typed<T>(self) -> ReadBuilder<P, Vec<T>>
    where
        T: DeserializeOwned + 'static,
    {
        self.with_mapper(typed())
    }

    fn with_mapper<T>(self, mapper: PageMapper<T>) -> ReadBuilder<P, T> {
        ReadBuilder {
            client_provider: self.client_provider,
            scan_request_fn: self.scan_request_fn,
            scan_response_mapper: Some(mapper),
        }
    }

    /// Validate and build the read
    pub fn build(self) -> Result<Read<P, O>, Error> {
        let scan_request_fn = self
            .scan_request_fn
            .ok_or_else(|| Error::config("scan_request_fn is required"))?;
        let client_provider = self
            .client_provider
            .ok_or_else(|| Error::config("client_provider is required"))?;
        let scan_response_mapper = self
            .scan_response_mapper
            .ok_or_else(|| Error::config("scan_response_mapper is required"))?;

        let _ = validate(&scan_request_fn())?;

        Ok(Read {
            client_provider,
            scan_request_fn,
            scan_response_mapper,
        })
    }
}
