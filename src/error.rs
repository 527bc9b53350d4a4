use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use serde_dynamo::Error as SerdeDynamoError;
use std::error::Error as StdError;
use std::fmt;

type DynamoScanError = SdkError<ScanError, Response>;
type DynamoCreateTableError = SdkError<CreateTableError, Response>;
type DynamoBatchWriteItemError = SdkError<BatchWriteItemError, Response>;

/// DynamoDB read/write error
#[derive(Debug)]
pub enum Error {
    /// Serde DynamoDB serialization/deserialization error
    SerdeDynamo(SerdeDynamoError),
    /// DynamoDB request builder error
    BuildError(BuildError),
    /// DynamoDB Scan operation error
    DynamoScanError(DynamoScanError),
    /// DynamoDB CreateTable operation error
    DynamoCreateTableError(DynamoCreateTableError),
    /// DynamoDB BatchWriteItem operation error
    DynamoBatchWriteItemError(DynamoBatchWriteItemError),
    /// Failure reported by a store client that is not backed by the SDK
    Client(String),
    /// Invalid or incomplete configuration, raised before any work starts
    Config(String),
    /// A batch write failed and no retry was attempted
    NoRetry {
        /// The error of the only attempt
        source: Box<Error>,
    },
    /// A batch write kept failing until the retry policy gave up
    RetriesExhausted {
        /// Number of attempts made, including the first one
        attempts: usize,
        /// The error of the last attempt
        source: Box<Error>,
    },
    /// Unprocessed items remained after the resume policy gave up
    UnprocessedItems {
        /// Number of write operations left unprocessed
        remaining: usize,
    },
}

impl Error {
    /// Build a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Check if the error is a serialization/deserialization error
    ///
    /// Returns `true` for DynamoDB serialization errors.
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::SerdeDynamo(_))
    }

    /// Check if the error was raised by the store or by talking to it
    ///
    /// Returns `true` for SDK operation errors and failures reported by custom
    /// store clients. Request builder errors are raised before anything is
    /// sent and are not included. This is the default retry predicate of
    /// [`RetryConfiguration`](crate::write::RetryConfiguration).
    pub fn is_dynamodb_error(&self) -> bool {
        matches!(
            self,
            Error::DynamoScanError(_)
                | Error::DynamoCreateTableError(_)
                | Error::DynamoBatchWriteItemError(_)
                | Error::Client(_)
        )
    }

    /// Check if the error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Check if the error is a terminal batch write failure
    ///
    /// Terminal failures are the ones counted by the write failure metric:
    /// non-retryable errors, exhausted retries and leftover unprocessed items.
    pub fn is_terminal_write_failure(&self) -> bool {
        matches!(
            self,
            Error::NoRetry { .. } | Error::RetriesExhausted { .. } | Error::UnprocessedItems { .. }
        )
    }
}

macro_rules! impl_from_error {
    ($name:ident, $variant:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$variant(e)
            }
        }
    };
    ($name:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$name(e)
            }
        }
    };
}

impl_from_error!(SerdeDynamoError, SerdeDynamo);
impl_from_error!(BuildError);
impl_from_error!(DynamoScanError);
impl_from_error!(DynamoCreateTableError);
impl_from_error!(DynamoBatchWriteItemError);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerdeDynamo(e) => write!(f, "DynamoDB serialization error: {}", e),
            Error::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
            Error::DynamoScanError(e) => {
                write!(f, "DynamoDB Scan operation failed: {}", e)
            }
            Error::DynamoCreateTableError(e) => {
                write!(f, "DynamoDB CreateTable operation failed: {}", e)
            }
            Error::DynamoBatchWriteItemError(e) => {
                write!(f, "DynamoDB BatchWriteItem operation failed: {}", e)
            }
            Error::Client(message) => write!(f, "DynamoDB client error: {}", message),
            Error::Config(message) => write!(f, "Invalid configuration: {}", message),
            Error::NoRetry { .. } => {
                write!(f, "Error writing to DynamoDB. No attempt made to retry")
            }
            Error::RetriesExhausted { attempts, .. } => write!(
                f,
                "Error writing to DynamoDB after {} attempt(s). No more attempts allowed",
                attempts
            ),
            Error::UnprocessedItems { remaining } => write!(
                f,
                "Error writing to DynamoDB. {} unprocessed item(s) remaining",
                remaining
            ),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::SerdeDynamo(e) => Some(e),
            Error::BuildError(e) => Some(e),
            Error::DynamoScanError(e) => Some(e),
            Error::DynamoCreateTableError(e) => Some(e),
            Error::DynamoBatchWriteItemError(e) => Some(e),
            Error::NoRetry { source } | Error::RetriesExhausted { source, .. } => {
                Some(source.as_ref())
            }
            Error::Client(_) | Error::Config(_) | Error::UnprocessedItems { .. } => None,
        }
    }
}
