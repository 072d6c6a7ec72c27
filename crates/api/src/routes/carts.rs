//! Cart endpoints, keyed by user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::ServiceError;
use common::AggregateId;
use document_store::DocumentStore;
use domain::{Address, Aggregate, Cart, CartError, DomainError, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::orders::OrderResponse;
use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct ExtendRequest {
    pub days: u32,
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: Address,
    /// Defaults to the shipping address.
    pub billing_address: Option<Address>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub id: AggregateId,
    pub user_id: UserId,
    pub items: Vec<CartItemResponse>,
    pub total: Money,
    pub total_quantity: u32,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

impl TryFrom<&Cart> for CartResponse {
    type Error = ApiError;

    fn try_from(cart: &Cart) -> Result<Self, Self::Error> {
        let items = cart
            .items()
            .iter()
            .map(|item| -> Result<CartItemResponse, ApiError> {
                Ok(CartItemResponse {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price().map_err(ServiceError::from)?,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(Self {
            id: cart.id(),
            user_id: cart.user_id(),
            items,
            total: cart.total().map_err(ServiceError::from)?,
            total_quantity: cart.total_quantity(),
            expires_at: cart.expires_at(),
            is_expired: cart.is_expired(),
        })
    }
}

#[derive(Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub message: Option<String>,
}

// -- Handlers --

/// GET /carts/{user_id}
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(parse_id(&user_id, "user")?).await?;
    Ok(Json(CartResponse::try_from(&cart)?))
}

/// DELETE /carts/{user_id}: removes every line.
pub async fn clear<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.clear(parse_id(&user_id, "user")?).await?;
    Ok(Json(CartResponse::try_from(&cart)?))
}

/// POST /carts/{user_id}/items
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .add_item(parse_id(&user_id, "user")?, req.product_id, req.quantity)
        .await?;
    Ok(Json(CartResponse::try_from(&cart)?))
}

/// PUT /carts/{user_id}/items/{product_id}: zero removes the line.
pub async fn update_item<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, product_id)): Path<(String, String)>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .update_item_quantity(
            parse_id(&user_id, "user")?,
            parse_id(&product_id, "product")?,
            req.quantity,
        )
        .await?;
    Ok(Json(CartResponse::try_from(&cart)?))
}

/// DELETE /carts/{user_id}/items/{product_id}
pub async fn remove_item<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .remove_item(parse_id(&user_id, "user")?, parse_id(&product_id, "product")?)
        .await?;
    Ok(Json(CartResponse::try_from(&cart)?))
}

/// POST /carts/{user_id}/validate
///
/// Stock problems are reported in the body; nothing is reserved.
pub async fn validate<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<ValidationResponse>, ApiError> {
    match state.carts.validate_stock(parse_id(&user_id, "user")?).await {
        Ok(()) => Ok(Json(ValidationResponse {
            valid: true,
            message: None,
        })),
        Err(ServiceError::Domain(DomainError::Cart(
            err @ (CartError::InsufficientStock { .. }
            | CartError::ProductInactive { .. }
            | CartError::ProductNotFound { .. }),
        ))) => Ok(Json(ValidationResponse {
            valid: false,
            message: Some(err.to_string()),
        })),
        Err(err) => Err(err.into()),
    }
}

/// POST /carts/{user_id}/extend
pub async fn extend<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(req): Json<ExtendRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .extend_expiration(parse_id(&user_id, "user")?, req.days)
        .await?;
    Ok(Json(CartResponse::try_from(&cart)?))
}

/// POST /carts/{user_id}/checkout: places an order from the cart.
#[tracing::instrument(skip(state, req))]
pub async fn checkout<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let billing = req
        .billing_address
        .unwrap_or_else(|| req.shipping_address.clone());
    let order = state
        .carts
        .checkout(parse_id(&user_id, "user")?, req.shipping_address, billing)
        .await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::try_from(&order)?)))
}
