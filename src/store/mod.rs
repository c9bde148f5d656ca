//! Scoped stores.
//!
//! A [`ScopedStore`] owns the in-memory projection of one user's document in
//! one collection. Mutations derive the next whole document from the current
//! projection and write it to the [`DocumentStore`]; the projection itself only
//! changes when the backend pushes the committed document back through the
//! subscription started by [`ScopedStore::init`], or when [`ScopedStore::clear`]
//! resets it.

pub mod addresses;
pub mod cart;
pub mod document;
pub mod memory;
pub mod nats;
pub mod orders;
pub mod wishlist;

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use addresses::AddressBookStore;
pub use cart::{CartStore, CartSummary};
pub use document::{DocumentStore, DocumentStoreError, Version, VersionPrecondition, VersionedDocument};
pub use memory::MemoryDocumentStore;
pub use nats::NatsDocumentStore;
pub use orders::OrderHistoryStore;
pub use wishlist::WishlistStore;

use crate::domain::{AddressBookDocument, CartDocument, OrderHistoryDocument, UserId, WishlistDocument};
use crate::{Result, StoreError};

/// A remote collection and the document type stored in it.
pub trait Collection: Send + Sync + 'static {
    const NAME: &'static str;
    type Document: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static;
}

pub struct Carts;
pub struct Wishlists;
pub struct Addresses;
pub struct Orders;

impl Collection for Carts {
    const NAME: &'static str = "carts";
    type Document = CartDocument;
}

impl Collection for Wishlists {
    const NAME: &'static str = "wishlists";
    type Document = WishlistDocument;
}

impl Collection for Addresses {
    const NAME: &'static str = "addresses";
    type Document = AddressBookDocument;
}

impl Collection for Orders {
    const NAME: &'static str = "orders";
    type Document = OrderHistoryDocument;
}

/// How mutations guard against concurrent writers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WritePolicy {
    /// Write only if the document is still at the version the change was derived from.
    #[default]
    CompareAndSwap,
    /// Replace unconditionally; a concurrent write can be silently lost.
    LastWriteWins,
}

#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub write_policy: WritePolicy,
    /// Upper bound on waiting for a committed write to come back through the feed.
    pub echo_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { write_policy: WritePolicy::default(), echo_timeout: Duration::from_secs(2) }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No user bound.
    #[default]
    Idle,
    /// Bound to a user, first document not yet received or feed lost.
    Loading,
    Ready,
}

/// The in-memory view of one remote document.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection<D> {
    pub owner: Option<UserId>,
    pub version: Option<Version>,
    pub status: SyncStatus,
    pub document: D,
}

impl<D: Default> Default for Projection<D> {
    fn default() -> Self {
        Self { owner: None, version: None, status: SyncStatus::Idle, document: D::default() }
    }
}

impl<D: Default> Projection<D> {
    fn loading(owner: UserId) -> Self {
        Self { owner: Some(owner), status: SyncStatus::Loading, ..Self::default() }
    }
}

/// Live subscription started by [`ScopedStore::init`].
///
/// Dropping the handle also cancels the subscription, so a forgotten handle
/// cannot keep writing a former user's documents into the projection.
#[must_use = "dropping a Subscription cancels live updates"]
#[derive(Debug)]
pub struct Subscription {
    collection: &'static str,
    user: UserId,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn collection(&self) -> &'static str { self.collection }
    pub fn user(&self) -> &UserId { &self.user }
    pub fn is_active(&self) -> bool { !self.task.is_finished() }

    /// Stop receiving remote changes. Consumes the handle, so it runs once.
    pub fn unsubscribe(self) {
        tracing::debug!(collection = self.collection, user = %self.user, "unsubscribing");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct ScopedStore<C: Collection> {
    backend: Arc<dyn DocumentStore>,
    options: StoreOptions,
    state: Arc<watch::Sender<Projection<C::Document>>>,
    _collection: PhantomData<C>,
}

impl<C: Collection> ScopedStore<C> {
    pub fn new(backend: Arc<dyn DocumentStore>, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(Projection::default());
        Self { backend, options, state: Arc::new(state), _collection: PhantomData }
    }

    /// Bind to `user`, load (or lazily create) the document and follow its changes.
    #[tracing::instrument(skip(self), fields(collection = C::NAME, user = %user))]
    pub async fn init(&self, user: &UserId) -> Result<Subscription> {
        self.state.send_replace(Projection::loading(user.clone()));
        match self.start(user).await {
            Ok(subscription) => Ok(subscription),
            Err(err) => {
                tracing::warn!(error = %err, "store init failed");
                self.state.send_if_modified(|p| {
                    let ours = p.owner.as_ref() == Some(user);
                    if ours { *p = Projection::default(); }
                    ours
                });
                Err(err)
            }
        }
    }

    async fn start(&self, user: &UserId) -> Result<Subscription> {
        // Subscribe before reading so no commit between the two is missed.
        let mut feed = self.backend.subscribe(C::NAME, user).await?;
        let initial = match self.backend.get(C::NAME, user).await? {
            Some(document) => document,
            None => self.create_empty(user).await?,
        };
        apply::<C>(&self.state, user, initial)?;

        let state = Arc::clone(&self.state);
        let owner = user.clone();
        let task = tokio::spawn(async move {
            while let Some(document) = feed.recv().await {
                let version = document.version;
                match apply::<C>(&state, &owner, document) {
                    Ok(true) => tracing::trace!(collection = C::NAME, user = %owner, version, "projection updated"),
                    Ok(false) => {}
                    Err(err) => tracing::warn!(collection = C::NAME, user = %owner, version, error = %err, "ignoring malformed document"),
                }
            }
            // Without a feed the projection can no longer catch up, so stop accepting writes.
            let stale = state.send_if_modified(|p| {
                let ours = p.owner.as_ref() == Some(&owner) && p.status == SyncStatus::Ready;
                if ours { p.status = SyncStatus::Loading; }
                ours
            });
            if stale {
                tracing::warn!(collection = C::NAME, user = %owner, "document feed closed");
            }
        });
        tracing::debug!("store initialised");
        Ok(Subscription { collection: C::NAME, user: user.clone(), task })
    }

    async fn create_empty(&self, user: &UserId) -> Result<VersionedDocument> {
        let payload = serde_json::to_value(C::Document::default())?;
        match self.backend.set(C::NAME, user, payload.clone(), VersionPrecondition::Absent).await {
            Ok(version) => {
                tracing::info!(collection = C::NAME, user = %user, "created empty document");
                Ok(VersionedDocument { version, payload })
            }
            // Another client created it first.
            Err(DocumentStoreError::VersionConflict { .. }) => self
                .backend
                .get(C::NAME, user)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("{} document for {user}", C::NAME))),
            Err(err) => Err(err.into()),
        }
    }

    /// Local reset on sign-out. The remote document is left alone.
    pub fn clear(&self) {
        self.state.send_replace(Projection::default());
    }

    pub fn snapshot(&self) -> Projection<C::Document> { self.state.borrow().clone() }
    pub fn document(&self) -> C::Document { self.state.borrow().document.clone() }
    pub fn owner(&self) -> Option<UserId> { self.state.borrow().owner.clone() }
    pub fn status(&self) -> SyncStatus { self.state.borrow().status }

    /// Receiver that observes every projection change.
    pub fn watch(&self) -> watch::Receiver<Projection<C::Document>> { self.state.subscribe() }

    /// Read the current document without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&C::Document) -> R) -> R { f(&self.state.borrow().document) }

    /// Derive the next whole document from the current projection and write it.
    ///
    /// Returns once the write is committed and, within `echo_timeout`, the
    /// projection has caught up with it. A failed write leaves the projection
    /// untouched.
    pub(crate) async fn commit<T>(
        &self,
        user: &UserId,
        derive: impl FnOnce(&C::Document) -> Result<(C::Document, T)>,
    ) -> Result<T> {
        let (base_version, next, output) = {
            let projection = self.state.borrow();
            ensure_bound(&projection, user)?;
            let (next, output) = derive(&projection.document)?;
            (projection.version, next, output)
        };
        let payload = serde_json::to_value(&next)?;
        let precondition = match self.options.write_policy {
            WritePolicy::CompareAndSwap => base_version.map_or(VersionPrecondition::Absent, VersionPrecondition::Exact),
            WritePolicy::LastWriteWins => VersionPrecondition::Any,
        };
        let version = match self.backend.set(C::NAME, user, payload, precondition).await {
            Ok(version) => version,
            Err(err) => {
                tracing::warn!(collection = C::NAME, user = %user, error = %err, "document write failed");
                return Err(err.into());
            }
        };
        tracing::debug!(collection = C::NAME, user = %user, version, "document written");
        self.await_echo(user, version).await;
        Ok(output)
    }

    /// Checks the store is bound and loaded for `user`.
    pub(crate) fn ensure_owner(&self, user: &UserId) -> Result<()> {
        ensure_bound(&self.state.borrow(), user)
    }

    async fn await_echo(&self, user: &UserId, version: Version) {
        let mut rx = self.state.subscribe();
        let caught_up = rx.wait_for(|p| p.owner.as_ref() != Some(user) || p.version.is_some_and(|v| v >= version));
        let timed_out = tokio::time::timeout(self.options.echo_timeout, caught_up).await.is_err();
        if timed_out {
            tracing::warn!(collection = C::NAME, user = %user, version, "write committed but not yet observed");
        }
    }
}

fn ensure_bound<D>(projection: &Projection<D>, user: &UserId) -> Result<()> {
    match &projection.owner {
        Some(owner) if owner != user => {
            Err(StoreError::UserMismatch { bound: owner.clone(), requested: user.clone() })
        }
        Some(_) if projection.status == SyncStatus::Ready => Ok(()),
        _ => Err(StoreError::NotInitialized),
    }
}

/// Replace the projection with `incoming` if it is for the bound user and newer.
fn apply<C: Collection>(
    state: &watch::Sender<Projection<C::Document>>,
    owner: &UserId,
    incoming: VersionedDocument,
) -> std::result::Result<bool, serde_json::Error> {
    let document: C::Document = serde_json::from_value(incoming.payload)?;
    Ok(state.send_if_modified(|p| {
        if p.owner.as_ref() != Some(owner) || p.version.is_some_and(|v| v >= incoming.version) {
            return false;
        }
        p.version = Some(incoming.version);
        p.status = SyncStatus::Ready;
        p.document = document;
        true
    }))
}
