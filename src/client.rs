//! The minimal store surface the reader and the writer need, and the ways to
//! obtain it.
//!
//! [`StoreClient`] is implemented by [`DynamoDbStore`] over the AWS SDK and by
//! test doubles. A [`ClientProvider`] opens one client per unit of work; the
//! unit closes it when it ends, whatever the outcome.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::operation::scan::ScanOutput;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::Error;
use crate::read::{ScanPage, ScanUnit};
use crate::write::{WriteOperation, WritesPerTable};

/// Operations required from the underlying key-value store
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Fetch one page of the unit's segment, starting at its continuation token
    ///
    /// Must be safe to call repeatedly with the same token.
    async fn scan(&self, unit: &ScanUnit) -> Result<ScanPage, Error>;

    /// Submit write operations grouped by table
    ///
    /// Returns the operations the store did not apply, grouped the same way.
    /// Unprocessed items are not an error; connection or throttling failures
    /// are.
    async fn batch_write(&self, writes: WritesPerTable) -> Result<WritesPerTable, Error>;

    /// Release the client. Called exactly once when the owning unit ends.
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// Opens a store client for a unit of work
#[async_trait]
pub trait ClientProvider: Send + Sync {
    /// Client type handed out by this provider
    type Client: StoreClient;

    /// Open a client owned by the calling unit
    async fn open(&self) -> Result<Self::Client, Error>;
}

/// [`StoreClient`] backed by `aws_sdk_dynamodb`
#[derive(Clone, Debug)]
pub struct DynamoDbStore {
    client: DynamoDbClient,
}

impl DynamoDbStore {
    /// Wrap an SDK client
    pub fn new(client: DynamoDbClient) -> Self {
        Self { client }
    }

    /// The wrapped SDK client
    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }
}

#[async_trait]
impl StoreClient for DynamoDbStore {
    async fn scan(&self, unit: &ScanUnit) -> Result<ScanPage, Error> {
        let request = unit.request();

        let output = self
            .client
            .scan()
            .table_name(request.table_name())
            .set_index_name(request.index_name().map(str::to_string))
            .segment(unit.segment())
            .set_total_segments(request.total_segments())
            .set_filter_expression(request.filter_expression().map(str::to_string))
            .set_projection_expression(request.projection_expression().map(str::to_string))
            .set_expression_attribute_names(request.expression_attribute_names().cloned())
            .set_expression_attribute_values(request.expression_attribute_values().cloned())
            .set_limit(request.limit())
            .set_consistent_read(request.consistent_read())
            .set_exclusive_start_key(unit.exclusive_start_key().cloned())
            .send()
            .await?;

        Ok(ScanPage::from(output))
    }

    async fn batch_write(&self, writes: WritesPerTable) -> Result<WritesPerTable, Error> {
        if writes.is_empty() {
            return Ok(WritesPerTable::new());
        }

        let mut request_items = HashMap::with_capacity(writes.len());
        for (table, operations) in writes {
            let requests = operations
                .into_iter()
                .map(WriteOperation::into_write_request)
                .collect::<Result<Vec<_>, _>>()?;
            let _ = request_items.insert(table, requests);
        }

        let output = self
            .client
            .batch_write_item()
            .set_request_items(Some(request_items))
            .send()
            .await?;

        let unprocessed = output
            .unprocessed_items
            .unwrap_or_default()
            .into_iter()
            .map(|(table, requests)| {
                let operations: Vec<WriteOperation> = requests
                    .into_iter()
                    .filter_map(WriteOperation::from_write_request)
                    .collect();
                (table, operations)
            })
            .filter(|(_, operations)| !operations.is_empty())
            .collect();

        Ok(unprocessed)
    }

    fn close(self) {
        debug!("closing DynamoDB client");
    }
}

impl From<ScanOutput> for ScanPage {
    fn from(output: ScanOutput) -> Self {
        Self {
            items: output.items.unwrap_or_default(),
            count: output.count,
            scanned_count: output.scanned_count,
            last_evaluated_key: output.last_evaluated_key,
        }
    }
}

/// Ways of constructing the SDK client used by [`DynamoDbStore`]
#[derive(Clone, Debug)]
pub enum DynamoDbClientProvider {
    /// Load configuration from the environment with sensible defaults
    ///
    /// It configures:
    /// - Adaptive retry mode with 3 max attempts
    /// - Exponential backoff starting at 1 second
    /// - Connect timeout: 3 seconds
    /// - Read timeout: 20 seconds
    /// - Operation timeout: 60 seconds
    /// - LocalStack support via AWS_PROFILE=localstack
    Environment,
    /// Static credentials in a region, optionally against a custom endpoint
    Credentials {
        /// Access key credentials
        credentials: Credentials,
        /// AWS region name
        region: String,
        /// Endpoint override, e.g. a local DynamoDB
        endpoint: Option<String>,
    },
    /// A fully loaded SDK configuration
    Config(SdkConfig),
    /// A pre-built SDK client
    Client(DynamoDbClient),
}

impl DynamoDbClientProvider {
    /// Static credentials in `region`
    pub fn with_credentials(credentials: Credentials, region: impl Into<String>) -> Self {
        DynamoDbClientProvider::Credentials {
            credentials,
            region: region.into(),
            endpoint: None,
        }
    }

    /// Static credentials in `region` against `endpoint`
    pub fn with_endpoint(
        credentials: Credentials,
        region: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        DynamoDbClientProvider::Credentials {
            credentials,
            region: region.into(),
            endpoint: Some(endpoint.into()),
        }
    }

    /// Build the SDK client described by this provider
    pub async fn sdk_client(&self) -> DynamoDbClient {
        match self {
            DynamoDbClientProvider::Environment => {
                DynamoDbClient::new(&aws_config_defaults().await)
            }
            DynamoDbClientProvider::Credentials {
                credentials,
                region,
                endpoint,
            } => {
                let mut loader = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(region.clone()))
                    .credentials_provider(credentials.clone());

                if let Some(endpoint) = endpoint {
                    loader = loader.endpoint_url(endpoint);
                }

                DynamoDbClient::new(&loader.load().await)
            }
            DynamoDbClientProvider::Config(config) => DynamoDbClient::new(config),
            DynamoDbClientProvider::Client(client) => client.clone(),
        }
    }
}

#[async_trait]
impl ClientProvider for DynamoDbClientProvider {
    type Client = DynamoDbStore;

    async fn open(&self) -> Result<DynamoDbStore, Error> {
        Ok(DynamoDbStore::new(self.sdk_client().await))
    }
}

async fn aws_config_defaults() -> SdkConfig {
    use aws_config::retry::RetryConfig;
    use aws_config::timeout::TimeoutConfig;

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(3))
        .read_timeout(Duration::from_secs(20))
        .operation_timeout(Duration::from_secs(60))
        .build();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(
            RetryConfig::adaptive()
                .with_max_attempts(3)
                .with_initial_backoff(Duration::from_secs(1)),
        )
        .timeout_config(timeout_config);

    // Support LocalStack via AWS_PROFILE=localstack
    if std::env::var("AWS_PROFILE").unwrap_or_default() == "localstack" {
        loader = loader.endpoint_url("http://127.0.0.1:4566");
    }

    loader.load().await
}
