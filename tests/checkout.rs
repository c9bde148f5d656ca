mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use storefront_sync::checkout::{
    checkout, CheckoutError, FakeGateway, PaymentChoice, PaymentError, PaymentGateway, PaymentReceipt,
};
use storefront_sync::domain::{CartDocument, OrderStatus, PaymentMethod, UserId};
use storefront_sync::session::{Session, SessionDeps};
use storefront_sync::store::document::DocumentFeed;
use storefront_sync::store::{
    DocumentStore, DocumentStoreError, MemoryDocumentStore, Projection, StoreOptions, Version, VersionPrecondition,
    VersionedDocument,
};
use tokio::sync::watch;

use common::{address, catalog, deps, item, signed_in, user};

async fn ready_to_buy(backend: &Arc<MemoryDocumentStore>) -> (Session, UserId, String) {
    let (session, me) = signed_in(backend, "9000000001").await;
    session.cart.add(&me, item("p1", 100, 2)).await.unwrap();
    session.cart.add(&me, item("p2", 250, 1)).await.unwrap();
    let home = session.addresses.save(&me, address("Home", true)).await.unwrap();
    (session, me, home.id)
}

#[tokio::test]
async fn test_cash_on_delivery_places_order_and_empties_cart() {
    let backend = Arc::new(MemoryDocumentStore::new());
    let (session, me, home) = ready_to_buy(&backend).await;
    let gateway = FakeGateway::approving();

    let order = checkout(&session, &me, &home, PaymentChoice::CashOnDelivery, &gateway).await.unwrap();

    assert_eq!(order.total, Decimal::from(525));
    assert_eq!(order.payment, PaymentMethod::CashOnDelivery);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_items(), 3);
    assert_eq!(gateway.charges(), 0);
    assert!(session.cart.items().is_empty());
    assert_eq!(session.orders.list(), vec![order]);
    assert!(session.orders.has_new_order());
}

#[tokio::test]
async fn test_online_payment_records_receipt() {
    let backend = Arc::new(MemoryDocumentStore::new());
    let (session, me, home) = ready_to_buy(&backend).await;
    let gateway = FakeGateway::approving();

    let order = checkout(&session, &me, &home, PaymentChoice::Online, &gateway).await.unwrap();
    assert!(matches!(&order.payment, PaymentMethod::Online { reference } if reference.starts_with("pay_")));
    assert_eq!(gateway.charges(), 1);
}

#[tokio::test]
async fn test_declined_payment_changes_nothing() {
    let backend = Arc::new(MemoryDocumentStore::new());
    let (session, me, home) = ready_to_buy(&backend).await;
    let gateway = FakeGateway::declining();

    let err = checkout(&session, &me, &home, PaymentChoice::Online, &gateway).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Payment(PaymentError::Declined(_))));
    assert_eq!(session.cart.items().len(), 2);
    assert!(session.orders.list().is_empty());
    assert!(!session.orders.has_new_order());

    gateway.set_declining(false);
    checkout(&session, &me, &home, PaymentChoice::Online, &gateway).await.unwrap();
    assert_eq!(session.orders.list().len(), 1);
}

#[tokio::test]
async fn test_checkout_preconditions() {
    let backend = Arc::new(MemoryDocumentStore::new());
    let (session, me) = signed_in(&backend, "9000000001").await;
    let gateway = FakeGateway::approving();
    let home = session.addresses.save(&me, address("Home", true)).await.unwrap();

    let err = checkout(&session, &me, &home.id, PaymentChoice::CashOnDelivery, &gateway).await.unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    session.cart.add(&me, item("p1", 100, 1)).await.unwrap();
    let err = checkout(&session, &me, "nowhere", PaymentChoice::CashOnDelivery, &gateway).await.unwrap_err();
    assert!(matches!(err, CheckoutError::UnknownAddress(id) if id == "nowhere"));

    let err = checkout(&session, &user("9000000002"), &home.id, PaymentChoice::CashOnDelivery, &gateway)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Store(_)));
    assert!(session.orders.list().is_empty());
}

/// Backend whose cart writes can be switched off.
struct FlakyCarts {
    inner: MemoryDocumentStore,
    fail_carts: AtomicBool,
}

#[async_trait]
impl DocumentStore for FlakyCarts {
    async fn get(&self, collection: &str, user: &UserId) -> Result<Option<VersionedDocument>, DocumentStoreError> {
        self.inner.get(collection, user).await
    }

    async fn set(
        &self,
        collection: &str,
        user: &UserId,
        payload: serde_json::Value,
        precondition: VersionPrecondition,
    ) -> Result<Version, DocumentStoreError> {
        if collection == "carts" && self.fail_carts.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Unavailable("carts offline".into()));
        }
        self.inner.set(collection, user, payload, precondition).await
    }

    async fn subscribe(&self, collection: &str, user: &UserId) -> Result<DocumentFeed, DocumentStoreError> {
        self.inner.subscribe(collection, user).await
    }
}

#[tokio::test]
async fn test_order_survives_cart_clear_failure() {
    let backend = Arc::new(FlakyCarts { inner: MemoryDocumentStore::new(), fail_carts: AtomicBool::new(false) });
    let session = Session::new(&SessionDeps {
        backend: backend.clone(),
        catalog: Arc::new(catalog()),
        options: StoreOptions::default(),
    });
    let me = user("9000000001");
    session.sign_in(&me).await.unwrap();
    session.cart.add(&me, item("p1", 100, 1)).await.unwrap();
    let home = session.addresses.save(&me, address("Home", true)).await.unwrap();

    backend.fail_carts.store(true, Ordering::SeqCst);
    let err = checkout(&session, &me, &home.id, PaymentChoice::CashOnDelivery, &FakeGateway::approving())
        .await
        .unwrap_err();
    let order = match err {
        CheckoutError::CartNotCleared { order, .. } => order,
        other => panic!("expected CartNotCleared, got {other:?}"),
    };
    assert_eq!(session.orders.list()[0].id, order.id);
    assert_eq!(session.cart.items().len(), 1);

    backend.fail_carts.store(false, Ordering::SeqCst);
    session.cart.empty(&me).await.unwrap();
    assert!(session.cart.items().is_empty());
}

/// Gateway that lets a second device edit the cart while the charge is in flight.
struct BusyShopper {
    laptop: Session,
    user: UserId,
    phone_cart: watch::Receiver<Projection<CartDocument>>,
}

#[async_trait]
impl PaymentGateway for BusyShopper {
    async fn charge(&self, _user: &UserId, _total: Decimal) -> Result<PaymentReceipt, PaymentError> {
        self.laptop.cart.add(&self.user, item("p9", 40, 1)).await.expect("laptop add");
        self.laptop.cart.set_qty(&self.user, &"p1".into(), 3).await.expect("laptop qty");
        self.phone_cart
            .clone()
            .wait_for(|p| p.document.items.len() == 3 && p.document.items[0].qty.value() == 3)
            .await
            .expect("phone sees laptop edits");
        Ok(PaymentReceipt { reference: "pay_busy".into() })
    }
}

#[tokio::test]
async fn test_lines_added_during_payment_stay_in_cart() {
    let backend = Arc::new(MemoryDocumentStore::new());
    let (phone, me, home) = ready_to_buy(&backend).await;
    let laptop = Session::new(&deps(&backend));
    laptop.sign_in(&me).await.unwrap();
    let gateway = BusyShopper { laptop, user: me.clone(), phone_cart: phone.cart.scoped().watch() };

    let order = checkout(&phone, &me, &home, PaymentChoice::Online, &gateway).await.unwrap();
    assert_eq!(order.total_items(), 3);
    assert_eq!(order.total, Decimal::from(525));

    let left: Vec<_> = phone.cart.items().into_iter().map(|i| (i.id.as_str().to_string(), i.qty.value())).collect();
    assert_eq!(left, vec![("p1".to_string(), 1), ("p9".to_string(), 1)]);
    let remote = backend.get("carts", &me).await.unwrap().unwrap();
    assert_eq!(remote.payload["items"].as_array().unwrap().len(), 2);
}
