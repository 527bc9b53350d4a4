/// Common test fixtures and data structures
///
/// Item and page builders plus a serde record used across the test files.
use aws_sdk_dynamodb::types::AttributeValue;
use dynamo_io::read::ScanPage;
use dynamo_io::write::{Item, RetryConfiguration, TableWrite, WriteOperation, WritesPerTable};
use metrics::Counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

/// Record moved through the pipeline
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct TestRecord {
    pub id: String,
    pub version: u32,
    pub name: String,
}

impl TestRecord {
    pub fn new(id: &str, version: u32, name: &str) -> Self {
        Self {
            id: id.to_string(),
            version,
            name: name.to_string(),
        }
    }
}

pub fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

/// Item with string attributes
pub fn item(pairs: &[(&str, &str)]) -> Item {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), s(value)))
        .collect()
}

pub fn put(table: &str, pairs: &[(&str, &str)]) -> TableWrite {
    TableWrite::put(table, item(pairs))
}

pub fn delete(table: &str, pairs: &[(&str, &str)]) -> TableWrite {
    TableWrite::delete(table, item(pairs))
}

/// Page of items keyed by `id`, continued at `token` when given
pub fn page(ids: &[&str], token: Option<&str>) -> ScanPage {
    ScanPage {
        items: ids.iter().map(|id| item(&[("id", id)])).collect(),
        count: ids.len() as i32,
        scanned_count: ids.len() as i32,
        last_evaluated_key: token.map(|token| item(&[("id", token)])),
    }
}

/// Retry configuration with a short initial wait
pub fn retry_config(max_attempts: usize) -> RetryConfiguration {
    RetryConfiguration::builder()
        .max_attempts(max_attempts)
        .max_duration(Duration::from_secs(600))
        .initial_duration(Duration::from_millis(100))
        .build()
        .unwrap()
}

/// Failure counter backed by a value the test can read
pub fn failure_counter() -> (Arc<AtomicU64>, Counter) {
    let value = Arc::new(AtomicU64::new(0));
    (value.clone(), Counter::from_arc(value))
}

/// Writes of `table` in a batch write payload
pub fn operations<'a>(writes: &'a WritesPerTable, table: &str) -> &'a [WriteOperation] {
    writes.get(table).map(Vec::as_slice).unwrap_or_default()
}
