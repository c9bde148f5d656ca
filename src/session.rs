//! Session boundary.
//!
//! The auth collaborator hands us a user id on sign-in and takes it away on
//! sign-out. A [`Session`] owns its own four stores and their subscriptions;
//! [`SessionRegistry`] keeps one session per signed-in user so concurrent
//! shoppers on a shared server never share a projection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell, RwLock};

use crate::domain::{TaxLookup, UserId};
use crate::store::{
    AddressBookStore, CartStore, DocumentStore, OrderHistoryStore, StoreOptions, Subscription, WishlistStore,
};
use crate::Result;

/// What every session is built from.
#[derive(Clone)]
pub struct SessionDeps {
    pub backend: Arc<dyn DocumentStore>,
    pub catalog: Arc<dyn TaxLookup>,
    pub options: StoreOptions,
}

struct Binding {
    user: UserId,
    subscriptions: Vec<Subscription>,
}

pub struct Session {
    pub cart: CartStore,
    pub wishlist: WishlistStore,
    pub addresses: AddressBookStore,
    pub orders: OrderHistoryStore,
    binding: Mutex<Option<Binding>>,
}

impl Session {
    pub fn new(deps: &SessionDeps) -> Self {
        Self {
            cart: CartStore::new(deps.backend.clone(), deps.options.clone(), deps.catalog.clone()),
            wishlist: WishlistStore::new(deps.backend.clone(), deps.options.clone()),
            addresses: AddressBookStore::new(deps.backend.clone(), deps.options.clone()),
            orders: OrderHistoryStore::new(deps.backend.clone(), deps.options.clone()),
            binding: Mutex::new(None),
        }
    }

    /// The signed-in user, if any.
    pub async fn user(&self) -> Option<UserId> {
        self.binding.lock().await.as_ref().map(|b| b.user.clone())
    }

    /// React to a user id becoming available: bind all four stores to it.
    ///
    /// Signing in as the already bound user is a no-op; signing in as someone
    /// else signs the previous user out first. If any store fails to start,
    /// every store is cleared again and the error is returned.
    #[tracing::instrument(skip(self), fields(user = %user))]
    pub async fn sign_in(&self, user: &UserId) -> Result<()> {
        let mut binding = self.binding.lock().await;
        if let Some(current) = binding.as_ref() {
            if &current.user == user {
                return Ok(());
            }
        }
        if let Some(previous) = binding.take() {
            self.tear_down(previous);
        }

        match self.init_all(user).await {
            Ok(subscriptions) => {
                *binding = Some(Binding { user: user.clone(), subscriptions });
                tracing::info!("session started");
                Ok(())
            }
            Err(err) => {
                self.clear_all();
                Err(err)
            }
        }
    }

    async fn init_all(&self, user: &UserId) -> Result<Vec<Subscription>> {
        // Dropping the vector on an early return cancels whatever already started.
        let mut subscriptions = Vec::with_capacity(4);
        subscriptions.push(self.cart.init(user).await?);
        subscriptions.push(self.wishlist.init(user).await?);
        subscriptions.push(self.addresses.init(user).await?);
        subscriptions.push(self.orders.init(user).await?);
        Ok(subscriptions)
    }

    /// React to the user id being revoked: unsubscribe and clear every store.
    pub async fn sign_out(&self) {
        if let Some(previous) = self.binding.lock().await.take() {
            self.tear_down(previous);
        }
    }

    fn tear_down(&self, binding: Binding) {
        for subscription in binding.subscriptions {
            subscription.unsubscribe();
        }
        self.clear_all();
        tracing::info!(user = %binding.user, "session ended");
    }

    fn clear_all(&self) {
        self.cart.clear();
        self.wishlist.clear();
        self.addresses.clear();
        self.orders.clear();
    }
}

type Slot = Arc<OnceCell<Arc<Session>>>;

/// Live sessions keyed by user id.
///
/// Each user gets a slot that is filled once their sign-in completes. The map
/// lock is only held to find or insert a slot, so a slow sign-in for one user
/// never blocks lookups or sign-ins for anyone else.
pub struct SessionRegistry {
    deps: SessionDeps,
    sessions: RwLock<HashMap<UserId, Slot>>,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self { deps, sessions: RwLock::new(HashMap::new()) }
    }

    /// Existing session for `user`, or a freshly signed-in one.
    ///
    /// Concurrent opens for the same user share one sign-in.
    pub async fn open(&self, user: &UserId) -> Result<Arc<Session>> {
        let slot = self.slot(user).await;
        let opened = slot
            .get_or_try_init(|| async {
                let session = Arc::new(Session::new(&self.deps));
                session.sign_in(user).await?;
                Ok::<_, crate::StoreError>(session)
            })
            .await
            .cloned();

        if opened.is_err() {
            let mut sessions = self.sessions.write().await;
            if sessions.get(user).is_some_and(|current| Arc::ptr_eq(current, &slot) && !slot.initialized()) {
                sessions.remove(user);
            }
        }
        opened
    }

    async fn slot(&self, user: &UserId) -> Slot {
        if let Some(slot) = self.sessions.read().await.get(user) {
            return slot.clone();
        }
        self.sessions.write().await.entry(user.clone()).or_default().clone()
    }

    pub async fn get(&self, user: &UserId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(user).and_then(|slot| slot.get().cloned())
    }

    /// Sign out and forget the session. Returns whether one existed.
    pub async fn close(&self, user: &UserId) -> bool {
        let removed = self.sessions.write().await.remove(user);
        match removed.as_ref().and_then(|slot| slot.get()) {
            Some(session) => {
                session.sign_out().await;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
