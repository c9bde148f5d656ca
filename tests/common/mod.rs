#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use storefront_sync::domain::{Address, AddressDraft, CartItem, Quantity, StaticCatalog, UserId};
use storefront_sync::session::{Session, SessionDeps};
use storefront_sync::store::{MemoryDocumentStore, StoreOptions};

pub fn user(id: &str) -> UserId {
    UserId::parse(id).expect("valid user id")
}

pub fn item(id: &str, price: i64, qty: i64) -> CartItem {
    CartItem {
        id: id.into(),
        name: format!("Product {id}"),
        image: format!("https://cdn.example.test/{id}.jpg"),
        price: Decimal::from(price),
        qty: Quantity::clamped(qty),
    }
}

pub fn address(name: &str, default: bool) -> Address {
    AddressDraft {
        id: None,
        full_name: name.into(),
        phone: "9876543210".into(),
        pincode: "560001".into(),
        line1: "12 MG Road".into(),
        line2: None,
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        landmark: None,
        is_default: default,
    }
    .into_address()
    .expect("valid address")
}

pub fn catalog() -> StaticCatalog {
    StaticCatalog::new().with_tax("p1", Decimal::from(5))
}

pub fn deps(backend: &Arc<MemoryDocumentStore>) -> SessionDeps {
    SessionDeps { backend: backend.clone(), catalog: Arc::new(catalog()), options: StoreOptions::default() }
}

pub async fn signed_in(backend: &Arc<MemoryDocumentStore>, id: &str) -> (Session, UserId) {
    let session = Session::new(&deps(backend));
    let user = user(id);
    session.sign_in(&user).await.expect("sign in");
    (session, user)
}
