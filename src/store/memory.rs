//! In-process document store.
//!
//! Used by tests and by the binary when no NATS server is configured. Writes
//! are fanned out to every live feed of the written key before `set` returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use super::document::{
    document_key, DocumentFeed, DocumentStore, DocumentStoreError, Version, VersionPrecondition, VersionedDocument,
};
use crate::domain::UserId;

#[derive(Default)]
struct MemoryEntry {
    document: Option<VersionedDocument>,
    feeds: Vec<mpsc::UnboundedSender<VersionedDocument>>,
}

/// In-memory storage for testing and local development.
#[derive(Default)]
pub struct MemoryDocumentStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    failing_writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `set` fail as if the backend were down.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Number of live feeds on a key; closed feeds are pruned on the next write.
    pub async fn subscriber_count(&self, collection: &str, user: &UserId) -> usize {
        let entries = self.entries.read().await;
        entries
            .get(&document_key(collection, user))
            .map_or(0, |e| e.feeds.iter().filter(|f| !f.is_closed()).count())
    }

    /// Drop every live feed on a key, as if the backend had lost the watch.
    pub async fn close_feeds(&self, collection: &str, user: &UserId) {
        if let Some(entry) = self.entries.write().await.get_mut(&document_key(collection, user)) {
            entry.feeds.clear();
        }
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, user: &UserId) -> Result<Option<VersionedDocument>, DocumentStoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&document_key(collection, user)).and_then(|e| e.document.clone()))
    }

    async fn set(
        &self,
        collection: &str,
        user: &UserId,
        payload: serde_json::Value,
        precondition: VersionPrecondition,
    ) -> Result<Version, DocumentStoreError> {
        if self.take_injected_failure() {
            return Err(DocumentStoreError::Unavailable("injected write failure".into()));
        }
        let mut entries = self.entries.write().await;
        let entry = entries.entry(document_key(collection, user)).or_default();
        let current = entry.document.as_ref().map(|d| d.version);
        precondition.check(current)?;

        let document = VersionedDocument { version: current.map_or(1, |v| v + 1), payload };
        entry.feeds.retain(|feed| feed.send(document.clone()).is_ok());
        let version = document.version;
        entry.document = Some(document);
        Ok(version)
    }

    async fn subscribe(&self, collection: &str, user: &UserId) -> Result<DocumentFeed, DocumentStoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut entries = self.entries.write().await;
        entries.entry(document_key(collection, user)).or_default().feeds.push(tx);
        Ok(rx)
    }
}
