/// Test helpers and fixtures for integration tests
///
/// Provides a scripted in-memory store, a provider handing out clients over
/// it, and the fixtures shared by the test files.
#[allow(dead_code)]
pub mod fixtures;

pub use dynamo_io::Error;
pub use dynamo_io::client::{ClientProvider, StoreClient};
pub use dynamo_io::read::{ScanPage, ScanUnit};
pub use fixtures::*;

#[allow(unused_imports)]
pub use dynamo_io::write::{Item, TableWrite, WriteOperation, WritesPerTable};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reply to one batch write call
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub enum WriteReply {
    /// Every operation applied
    Processed,
    /// Every operation left unprocessed
    NothingProcessed,
    /// The given operations left unprocessed, the rest applied
    Unprocessed(WritesPerTable),
    /// The call failed
    Fail(String),
}

/// In-memory store answering scans and batch writes from a script
///
/// Scans pop the next page scripted for the unit's segment. Batch writes pop
/// the next scripted reply, then apply everything once the script runs out.
#[derive(Debug, Default)]
pub struct MockStore {
    pages: Mutex<HashMap<i32, VecDeque<Result<ScanPage, String>>>>,
    write_replies: Mutex<VecDeque<WriteReply>>,
    scans: Mutex<Vec<(i32, Option<Item>)>>,
    write_calls: Mutex<Vec<WritesPerTable>>,
    applied: Mutex<Vec<TableWrite>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_open: Mutex<bool>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the pages of `segment`, in order
    pub fn with_pages(self: Arc<Self>, segment: i32, pages: Vec<ScanPage>) -> Arc<Self> {
        let _ = self
            .pages
            .lock()
            .unwrap()
            .insert(segment, pages.into_iter().map(Ok).collect());
        self
    }

    /// Make the next scan of `segment` fail after its scripted pages
    pub fn with_scan_failure(self: Arc<Self>, segment: i32, message: &str) -> Arc<Self> {
        self.pages
            .lock()
            .unwrap()
            .entry(segment)
            .or_default()
            .push_back(Err(message.to_string()));
        self
    }

    /// Script the replies of the next batch write calls, in order
    pub fn with_write_replies(self: Arc<Self>, replies: Vec<WriteReply>) -> Arc<Self> {
        self.write_replies.lock().unwrap().extend(replies);
        self
    }

    /// Make every `open` fail
    pub fn failing_open(self: Arc<Self>) -> Arc<Self> {
        *self.fail_open.lock().unwrap() = true;
        self
    }

    /// Client over this store
    pub fn client(self: &Arc<Self>) -> MockClient {
        let _ = self.opened.fetch_add(1, Ordering::SeqCst);
        MockClient {
            store: Arc::clone(self),
        }
    }

    /// Provider handing out clients over this store
    pub fn provider(self: &Arc<Self>) -> MockProvider {
        MockProvider {
            store: Arc::clone(self),
        }
    }

    /// `(segment, token)` of every scan call, in call order
    pub fn scans(&self) -> Vec<(i32, Option<Item>)> {
        self.scans.lock().unwrap().clone()
    }

    /// Payload of every batch write call, in call order
    pub fn write_calls(&self) -> Vec<WritesPerTable> {
        self.write_calls.lock().unwrap().clone()
    }

    /// Every write the store applied
    pub fn applied(&self) -> Vec<TableWrite> {
        self.applied.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn apply(&self, writes: &WritesPerTable, unprocessed: &WritesPerTable) {
        let mut applied = self.applied.lock().unwrap();
        for (table, operations) in writes {
            let skipped = unprocessed.get(table);
            for operation in operations {
                if skipped.is_some_and(|skipped| skipped.contains(operation)) {
                    continue;
                }
                applied.push(TableWrite {
                    table: table.clone(),
                    operation: operation.clone(),
                });
            }
        }
    }
}

/// Client over a [`MockStore`], counting when it is closed
#[derive(Debug)]
pub struct MockClient {
    store: Arc<MockStore>,
}

#[async_trait]
impl StoreClient for MockClient {
    async fn scan(&self, unit: &ScanUnit) -> Result<ScanPage, Error> {
        self.store
            .scans
            .lock()
            .unwrap()
            .push((unit.segment(), unit.exclusive_start_key().cloned()));

        let next = self
            .store
            .pages
            .lock()
            .unwrap()
            .get_mut(&unit.segment())
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(page)) => Ok(page),
            Some(Err(message)) => Err(Error::Client(message)),
            None => Err(Error::Client(format!(
                "no page scripted for segment {}",
                unit.segment()
            ))),
        }
    }

    async fn batch_write(&self, writes: WritesPerTable) -> Result<WritesPerTable, Error> {
        self.store.write_calls.lock().unwrap().push(writes.clone());

        let reply = self
            .store
            .write_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(WriteReply::Processed);

        let unprocessed = match reply {
            WriteReply::Processed => WritesPerTable::new(),
            WriteReply::NothingProcessed => writes.clone(),
            WriteReply::Unprocessed(unprocessed) => unprocessed,
            WriteReply::Fail(message) => return Err(Error::Client(message)),
        };

        self.store.apply(&writes, &unprocessed);
        Ok(unprocessed)
    }

    fn close(self) {
        let _ = self.store.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Provider opening [`MockClient`]s over one shared [`MockStore`]
#[derive(Clone, Debug)]
pub struct MockProvider {
    store: Arc<MockStore>,
}

#[async_trait]
impl ClientProvider for MockProvider {
    type Client = MockClient;

    async fn open(&self) -> Result<MockClient, Error> {
        if *self.store.fail_open.lock().unwrap() {
            return Err(Error::Client("connection refused".into()));
        }
        Ok(self.store.client())
    }
}

/// Generate a unique test prefix for isolation
///
/// Returns a timestamp-based prefix to avoid test data conflicts
#[allow(dead_code)]
pub fn unique_test_prefix(name: &str) -> String {
    format!(
        "{}_{}_",
        name,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis()
    )
}
