//! # DynamoDB I/O for parallel pipelines
//!
//! Moves records between a parallel processing pipeline and DynamoDB:
//! - Batch writes of at most 25 operations with per-key deduplication
//! - Retries of failed calls within a bounded attempt and time budget
//! - Resubmission of unprocessed items with exponential backoff
//! - Segmented parallel scans, one independently paginated unit per segment
//!
//! ## Features
//!
//! - **Unit-scoped clients**: every unit of work opens and closes its own client
//! - **Pluggable store**: [`client::StoreClient`] is a small async trait with an
//!   `aws-sdk-dynamodb` implementation and room for test doubles
//! - **Typed records**: `serde` mappers for both directions via `serde_dynamo`
//! - **Observable failures**: `tracing` events and a `metrics` counter for every
//!   terminal write failure
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynamo_io::Error;
//! use dynamo_io::client::DynamoDbClientProvider;
//! use dynamo_io::distribute::ConcurrentDistributor;
//! use dynamo_io::read::{Read, ScanRequest};
//! use dynamo_io::write::{Write, put_mapper};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct User {
//!     user_id: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let distributor = ConcurrentDistributor::new(4);
//!
//!     let read = Read::builder()
//!         .client_provider(DynamoDbClientProvider::Environment)
//!         .scan_request_fn(|| ScanRequest::new("users").with_total_segments(4))
//!         .typed::<User>()
//!         .build()?;
//!     let users: Vec<User> = read.execute(&distributor).await?.into_iter().flatten().collect();
//!
//!     let write = Write::builder()
//!         .client_provider(DynamoDbClientProvider::Environment)
//!         .write_request_mapper(put_mapper::<User>("users_copy"))
//!         .deduplicate_keys(["user_id"])
//!         .build()?;
//!     let _ = write.write_all(vec![users], &distributor).await?;
//!
//!     Ok(())
//! }
//! ```
#![deny(
    warnings,
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    deprecated,
    unknown_lints,
    unreachable_code,
    unused_mut
)]

mod error;
pub use error::Error;

/// Exponential backoff policies
pub mod backoff;

/// Store client facade and providers
pub mod client;

/// Work distribution across units
pub mod distribute;

/// Segmented parallel scans
pub mod read;

/// Deduplicating batch writes
pub mod write;

/// Table setup utilities for testing
pub mod setup;

// Re-export the configuration types taken by client providers
pub use aws_config::{BehaviorVersion, Region, SdkConfig};
pub use aws_credential_types::Credentials;
