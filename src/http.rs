//! JSON API over the session stores for the presentation layer.
//!
//! The auth collaborator is expected to sit in front of this router and pass
//! the authenticated user id in the `x-user-id` header.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::checkout::{checkout, CheckoutError, PaymentChoice, PaymentError, PaymentGateway};
use crate::domain::{Address, AddressDraft, CartItem, Order, ProductId, Totals, UserId};
use crate::session::{Session, SessionRegistry};
use crate::store::CartSummary;
use crate::StoreError;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub gateway: Arc<dyn PaymentGateway>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront-sync"})) }))
        .route("/api/v1/session", post(open_session).delete(close_session))
        .route("/api/v1/cart", get(get_cart))
        .route("/api/v1/cart/items", post(add_to_cart))
        .route("/api/v1/cart/items/:id", put(set_quantity).delete(remove_from_cart))
        .route("/api/v1/wishlist", get(get_wishlist))
        .route("/api/v1/wishlist/ack", post(ack_wishlist))
        .route("/api/v1/wishlist/:id/toggle", post(toggle_wishlist))
        .route("/api/v1/addresses", get(list_addresses).post(save_address))
        .route("/api/v1/addresses/:id", delete(remove_address))
        .route("/api/v1/addresses/:id/default", put(set_default_address))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/ack", post(ack_orders))
        .route("/api/v1/checkout", post(place_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Extractors & errors
// =============================================================================

/// User id supplied by the auth layer.
pub struct CurrentUser(pub UserId);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "missing user id"))?;
        UserId::parse(raw).map(CurrentUser).map_err(|e| ApiError::new(StatusCode::UNAUTHORIZED, e.to_string()))
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::new(store_status(&err), err.to_string())
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        let status = match &err {
            CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
            CheckoutError::UnknownAddress(_) => StatusCode::NOT_FOUND,
            CheckoutError::Payment(PaymentError::Declined(_)) => StatusCode::PAYMENT_REQUIRED,
            CheckoutError::Payment(PaymentError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
            CheckoutError::Store(inner) => store_status(inner),
            CheckoutError::CartNotCleared { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotInitialized => StatusCode::UNAUTHORIZED,
        StoreError::UserMismatch { .. } => StatusCode::FORBIDDEN,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::Conflict { .. } => StatusCode::CONFLICT,
        StoreError::Remote(_) => StatusCode::BAD_GATEWAY,
        StoreError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        StoreError::Pricing(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

async fn session_for(state: &AppState, user: &UserId) -> Result<Arc<Session>, ApiError> {
    state
        .registry
        .get(user)
        .await
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "no active session; POST /api/v1/session first"))
}

// =============================================================================
// Session
// =============================================================================

async fn open_session(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<(StatusCode, Json<CartView>), ApiError> {
    let session = s.registry.open(&user).await?;
    Ok((StatusCode::CREATED, Json(CartView::from(session.cart.summary()?))))
}

async fn close_session(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> StatusCode {
    if s.registry.close(&user).await { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    #[serde(flatten)]
    pub summary: CartSummary,
    /// `totals` rounded for display.
    pub display: Totals,
}

impl From<CartSummary> for CartView {
    fn from(summary: CartSummary) -> Self {
        let display = summary.totals.rounded();
        Self { summary, display }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest { pub qty: i64 }

async fn get_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<CartView>, ApiError> {
    let session = session_for(&s, &user).await?;
    Ok(Json(session.cart.summary()?.into()))
}

async fn add_to_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser, Json(item): Json<CartItem>) -> Result<Json<CartView>, ApiError> {
    let session = session_for(&s, &user).await?;
    session.cart.add(&user, item).await?;
    Ok(Json(session.cart.summary()?.into()))
}

async fn set_quantity(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<String>, Json(r): Json<SetQuantityRequest>) -> Result<Json<CartView>, ApiError> {
    let session = session_for(&s, &user).await?;
    session.cart.set_qty(&user, &ProductId::new(id), r.qty).await?;
    Ok(Json(session.cart.summary()?.into()))
}

async fn remove_from_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<String>) -> Result<Json<CartView>, ApiError> {
    let session = session_for(&s, &user).await?;
    session.cart.remove(&user, &ProductId::new(id)).await?;
    Ok(Json(session.cart.summary()?.into()))
}

// =============================================================================
// Wishlist
// =============================================================================

async fn get_wishlist(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<serde_json::Value>, ApiError> {
    let session = session_for(&s, &user).await?;
    Ok(Json(json!({ "productIds": session.wishlist.product_ids(), "hasNewItem": session.wishlist.has_new_item() })))
}

async fn toggle_wishlist(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    let session = session_for(&s, &user).await?;
    let id = ProductId::new(id);
    let wished = session.wishlist.toggle(&user, &id).await?;
    Ok(Json(json!({ "productId": id, "wished": wished })))
}

async fn ack_wishlist(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<StatusCode, ApiError> {
    session_for(&s, &user).await?.wishlist.acknowledge_new_item();
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Addresses
// =============================================================================

async fn list_addresses(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<Vec<Address>>, ApiError> {
    Ok(Json(session_for(&s, &user).await?.addresses.list()))
}

async fn save_address(State(s): State<AppState>, CurrentUser(user): CurrentUser, Json(draft): Json<AddressDraft>) -> Result<(StatusCode, Json<Address>), ApiError> {
    let address = draft.into_address().map_err(StoreError::from)?;
    let session = session_for(&s, &user).await?;
    let saved = session.addresses.save(&user, address).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn set_default_address(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    session_for(&s, &user).await?.addresses.set_default(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_address(State(s): State<AppState>, CurrentUser(user): CurrentUser, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    session_for(&s, &user).await?.addresses.remove(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders & checkout
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub address_id: String,
    pub payment: PaymentChoice,
}

async fn list_orders(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<serde_json::Value>, ApiError> {
    let session = session_for(&s, &user).await?;
    Ok(Json(json!({ "orders": session.orders.list(), "hasNewOrder": session.orders.has_new_order() })))
}

async fn ack_orders(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<StatusCode, ApiError> {
    session_for(&s, &user).await?.orders.clear_new_order_status(&user)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn place_order(State(s): State<AppState>, CurrentUser(user): CurrentUser, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<Order>), ApiError> {
    let session = session_for(&s, &user).await?;
    let order = checkout(&session, &user, &r.address_id, r.payment, s.gateway.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
