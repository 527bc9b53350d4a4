use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, PutRequest, WriteRequest};
use std::collections::HashMap;

use crate::Error;

/// Attribute map of a DynamoDB item or key
pub type Item = HashMap<String, AttributeValue>;

/// A single write against a DynamoDB table
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOperation {
    /// Insert or replace the item
    Put(Item),
    /// Delete the item with this key
    Delete(Item),
}

impl WriteOperation {
    /// Item attributes for a put, key attributes for a delete
    pub fn attributes(&self) -> &Item {
        match self {
            WriteOperation::Put(item) => item,
            WriteOperation::Delete(key) => key,
        }
    }

    /// Convert into the SDK request type
    pub fn into_write_request(self) -> Result<WriteRequest, Error> {
        let request = match self {
            WriteOperation::Put(item) => WriteRequest::builder()
                .set_put_request(Some(PutRequest::builder().set_item(Some(item)).build()?))
                .build(),
            WriteOperation::Delete(key) => WriteRequest::builder()
                .set_delete_request(Some(DeleteRequest::builder().set_key(Some(key)).build()?))
                .build(),
        };

        Ok(request)
    }

    /// Convert back from the SDK request type, e.g. for unprocessed items
    ///
    /// Returns `None` for a request carrying neither a put nor a delete.
    pub fn from_write_request(request: WriteRequest) -> Option<Self> {
        if let Some(put_request) = request.put_request {
            return Some(WriteOperation::Put(put_request.item));
        }

        request
            .delete_request
            .map(|delete_request| WriteOperation::Delete(delete_request.key))
    }
}

/// A write operation bound to its destination table
#[derive(Clone, Debug, PartialEq)]
pub struct TableWrite {
    /// Destination table name
    pub table: String,
    /// The write itself
    pub operation: WriteOperation,
}

impl TableWrite {
    /// Put `item` into `table`
    pub fn put(table: impl Into<String>, item: Item) -> Self {
        Self {
            table: table.into(),
            operation: WriteOperation::Put(item),
        }
    }

    /// Delete the item identified by `key` from `table`
    pub fn delete(table: impl Into<String>, key: Item) -> Self {
        Self {
            table: table.into(),
            operation: WriteOperation::Delete(key),
        }
    }
}

/// Identity under which duplicate writes collapse
///
/// Two writes are duplicates iff they target the same table and their
/// projected keys are equal.
#[derive(Clone, Debug, PartialEq)]
pub struct DedupIdentity {
    /// Destination table name
    pub table: String,
    /// Projection of the write's attributes onto the declared keys
    pub key: Item,
}

impl DedupIdentity {
    /// Identity of `write` for the declared dedup keys
    pub fn of(write: &TableWrite, deduplicate_keys: &[String]) -> Self {
        Self {
            table: write.table.clone(),
            key: extract_dedup_key(&write.operation, deduplicate_keys),
        }
    }
}

/// Project a write operation onto the declared dedup key names
///
/// With no declared keys the full attribute map is the identity. Declared
/// names missing from the attributes are left out without error.
pub fn extract_dedup_key(operation: &WriteOperation, deduplicate_keys: &[String]) -> Item {
    let attributes = operation.attributes();

    if attributes.is_empty() || deduplicate_keys.is_empty() {
        return attributes.clone();
    }

    attributes
        .iter()
        .filter(|(name, _)| deduplicate_keys.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
