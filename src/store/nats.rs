//! NATS JetStream key-value backed document store.
//!
//! One bucket holds every collection; each document lives under the key
//! `{collection}.{user}` and KV revisions double as document versions, which
//! gives compare-and-swap writes (`update`, with revision 0 for creation) and push notifications
//! (`watch`) without any extra bookkeeping.

use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::document::{
    document_key, DocumentFeed, DocumentStore, DocumentStoreError, Version, VersionPrecondition, VersionedDocument,
};
use crate::domain::UserId;

pub struct NatsDocumentStore {
    kv: kv::Store,
}

impl NatsDocumentStore {
    /// Connect and open (or create) the bucket.
    pub async fn connect(url: &str, bucket: &str) -> Result<Self, DocumentStoreError> {
        let client = async_nats::connect(url).await.map_err(unavailable)?;
        let context = jetstream::new(client);
        let kv = match context.get_key_value(bucket).await {
            Ok(kv) => kv,
            Err(_) => context
                .create_key_value(kv::Config { bucket: bucket.to_string(), history: 1, ..Default::default() })
                .await
                .map_err(unavailable)?,
        };
        tracing::info!(url, bucket, "connected to NATS key-value document store");
        Ok(Self { kv })
    }

    async fn current_revision(&self, key: &str) -> Result<Option<Version>, DocumentStoreError> {
        let entry = self.kv.entry(key).await.map_err(unavailable)?;
        Ok(entry.filter(|e| matches!(e.operation, kv::Operation::Put)).map(|e| e.revision))
    }

    /// A failed conditional write is either a lost race or a real outage;
    /// re-reading the revision tells the two apart.
    async fn explain_rejected_write(
        &self,
        key: &str,
        precondition: VersionPrecondition,
        cause: String,
    ) -> DocumentStoreError {
        match self.current_revision(key).await {
            Ok(current) => match precondition.check(current) {
                Err(conflict) => conflict,
                Ok(()) => DocumentStoreError::Unavailable(cause),
            },
            Err(_) => DocumentStoreError::Unavailable(cause),
        }
    }
}

fn unavailable(err: impl std::fmt::Display) -> DocumentStoreError {
    DocumentStoreError::Unavailable(err.to_string())
}

/// KV operation that enforces a precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KvWrite {
    Put,
    /// Write only at this revision; revision 0 means the key must not exist yet.
    Update(u64),
}

fn kv_write(precondition: VersionPrecondition) -> KvWrite {
    match precondition {
        VersionPrecondition::Any => KvWrite::Put,
        VersionPrecondition::Absent => KvWrite::Update(0),
        VersionPrecondition::Exact(revision) => KvWrite::Update(revision),
    }
}

fn decode(entry: &kv::Entry) -> Result<Option<VersionedDocument>, DocumentStoreError> {
    if !matches!(entry.operation, kv::Operation::Put) {
        return Ok(None);
    }
    let payload = serde_json::from_slice(&entry.value)?;
    Ok(Some(VersionedDocument { version: entry.revision, payload }))
}

#[async_trait]
impl DocumentStore for NatsDocumentStore {
    #[tracing::instrument(skip(self), fields(user = %user))]
    async fn get(&self, collection: &str, user: &UserId) -> Result<Option<VersionedDocument>, DocumentStoreError> {
        match self.kv.entry(document_key(collection, user)).await.map_err(unavailable)? {
            Some(entry) => decode(&entry),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, payload), fields(user = %user))]
    async fn set(
        &self,
        collection: &str,
        user: &UserId,
        payload: serde_json::Value,
        precondition: VersionPrecondition,
    ) -> Result<Version, DocumentStoreError> {
        let key = document_key(collection, user);
        let bytes: Vec<u8> = serde_json::to_vec(&payload)?;
        let written = match kv_write(precondition) {
            KvWrite::Put => self.kv.put(&key, bytes.into()).await.map_err(|e| e.to_string()),
            KvWrite::Update(revision) => self.kv.update(&key, bytes.into(), revision).await.map_err(|e| e.to_string()),
        };
        match written {
            Ok(version) => Ok(version),
            Err(cause) if precondition == VersionPrecondition::Any => Err(DocumentStoreError::Unavailable(cause)),
            Err(cause) => Err(self.explain_rejected_write(&key, precondition, cause).await),
        }
    }

    async fn subscribe(&self, collection: &str, user: &UserId) -> Result<DocumentFeed, DocumentStoreError> {
        let key = document_key(collection, user);
        let kv = self.kv.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let mut watch = match kv.watch(&key).await {
                Ok(watch) => {
                    let _ = ready_tx.send(Ok(()));
                    watch
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(unavailable(err)));
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    next = watch.next() => match next {
                        Some(Ok(entry)) => match decode(&entry) {
                            Ok(Some(document)) => {
                                if tx.send(document).is_err() { break; }
                            }
                            Ok(None) => {}
                            Err(err) => tracing::warn!(key = %key, error = %err, "skipping undecodable document"),
                        },
                        Some(Err(err)) => {
                            tracing::warn!(key = %key, error = %err, "document watch failed");
                            break;
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!(key = %key, "document watch ended");
        });

        ready_rx.await.map_err(unavailable)??;
        Ok(rx)
    }
}
