//! Order lifecycle and payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::{
    CreateOrderRequest, PaymentIntentOutcome, PaymentOutcome, RefundOutcome, ServiceError,
};
use common::AggregateId;
use document_store::DocumentStore;
use domain::{
    Address, Aggregate, Money, Order, OrderStatus, PaymentStatus, ProductId, UserId,
};
use notifications::OrderActivity;
use serde::{Deserialize, Serialize};

use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub user_id: String,
}

#[derive(Deserialize, Default)]
pub struct CancelOrderRequest {
    /// Omitted for administrative cancellations.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ProcessPaymentRequest {
    pub payment_method: String,
}

#[derive(Deserialize, Default)]
pub struct RefundRequest {
    /// Defaults to the order total.
    #[serde(default)]
    pub amount: Option<Money>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: AggregateId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: Money,
    pub total_quantity: u32,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

impl TryFrom<&Order> for OrderResponse {
    type Error = ApiError;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        let items = order
            .items()
            .iter()
            .map(|item| -> Result<OrderItemResponse, ApiError> {
                Ok(OrderItemResponse {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price().map_err(ServiceError::from)?,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(Self {
            id: order.id(),
            order_number: order.order_number().to_string(),
            user_id: order.user_id(),
            status: order.status(),
            payment_status: order.payment_status(),
            payment_id: order.payment_id().map(String::from),
            items,
            total_amount: order.total_amount(),
            total_quantity: order.total_quantity(),
            shipping_address: order.shipping_address().clone(),
            billing_address: order.billing_address().clone(),
            cancellation_reason: order.cancellation_reason().map(String::from),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            confirmed_at: order.confirmed_at(),
            shipped_at: order.shipped_at(),
            delivered_at: order.delivered_at(),
            cancelled_at: order.cancelled_at(),
            refunded_at: order.refunded_at(),
        })
    }
}

// -- Handlers --

/// POST /orders: places an order and reduces stock.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn create<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.ordering.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::try_from(&order)?)))
}

/// GET /orders?user_id=...: a user's orders, newest first.
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .ordering
        .list_orders_for_user(parse_id(&query.user_id, "user")?)
        .await?;
    let responses = orders
        .iter()
        .map(OrderResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(responses))
}

/// GET /orders/{id}
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.ordering.get_order(parse_id(&id, "order")?).await?;
    Ok(Json(OrderResponse::try_from(&order)?))
}

/// GET /orders/{id}/activity: status timeline from the activity view.
#[tracing::instrument(skip(state))]
pub async fn activity<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderActivity>, ApiError> {
    let order_id: AggregateId = parse_id(&id, "order")?;

    // Pick up anything committed without being dispatched.
    state
        .dispatcher
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state
        .activity
        .get(order_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No activity for order {id}")))
}

/// POST /orders/{id}/cancel: cancels and restores stock.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .ordering
        .cancel_order(parse_id(&id, "order")?, req.user_id, req.reason)
        .await?;
    Ok(Json(OrderResponse::try_from(&order)?))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_status<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let target: OrderStatus = req.status.parse().map_err(ApiError::BadRequest)?;
    let order = state
        .ordering
        .update_order_status(parse_id(&id, "order")?, target, req.reason)
        .await?;
    Ok(Json(OrderResponse::try_from(&order)?))
}

/// POST /orders/{id}/payment-intent
///
/// Gateway failures are reported in the body with `is_success: false`.
pub async fn payment_intent<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentIntentOutcome>, ApiError> {
    let outcome = state
        .ordering
        .create_payment_intent(parse_id(&id, "order")?)
        .await?;
    Ok(Json(outcome))
}

/// POST /orders/{id}/payment
///
/// A declined charge is a successful request; the order records the failure.
#[tracing::instrument(skip(state, req))]
pub async fn pay<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<Json<PaymentOutcome>, ApiError> {
    let outcome = state
        .ordering
        .process_payment(parse_id(&id, "order")?, req.payment_method)
        .await?;
    Ok(Json(outcome))
}

/// POST /orders/{id}/refund
#[tracing::instrument(skip(state, req))]
pub async fn refund<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<RefundOutcome>, ApiError> {
    let outcome = state
        .ordering
        .refund_payment(parse_id(&id, "order")?, req.amount)
        .await?;
    Ok(Json(outcome))
}
