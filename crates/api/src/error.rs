//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::ServiceError;
use domain::{CartError, DomainError, MoneyError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Application service error.
    Service(ServiceError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Service(err) => (service_status(&err), err.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }
        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string()).increment(1);

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn service_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::UserNotFound(_)
        | ServiceError::ProductNotFound(_)
        | ServiceError::OrderNotFound(_)
        | ServiceError::CartNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        ServiceError::AlreadyPaid { .. }
        | ServiceError::RefundIneligible { .. }
        | ServiceError::UnsupportedTransition { .. }
        | ServiceError::AlreadyExists(_)
        | ServiceError::Conflict { .. } => StatusCode::CONFLICT,
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Domain(err) => domain_status(err),
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Order(order_err) => match order_err {
            OrderError::InvalidStateTransition { .. }
            | OrderError::InvalidPaymentTransition { .. }
            | OrderError::PaymentNotCompleted { .. } => StatusCode::CONFLICT,
            OrderError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
            OrderError::InvalidQuantity { .. }
            | OrderError::NoItems
            | OrderError::EmptyPaymentId
            | OrderError::Money(_) => StatusCode::BAD_REQUEST,
        },
        DomainError::Cart(CartError::ItemNotFound { .. } | CartError::ProductNotFound { .. }) => {
            StatusCode::NOT_FOUND
        }
        DomainError::Product(_)
        | DomainError::Cart(_)
        | DomainError::Address(_)
        | DomainError::Sku(_)
        | DomainError::OrderNumber(_) => StatusCode::BAD_REQUEST,
        DomainError::Money(MoneyError::Overflow) => StatusCode::INTERNAL_SERVER_ERROR,
        DomainError::Money(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Store(store_err) if store_err.is_retryable() => StatusCode::CONFLICT,
        DomainError::Store(_)
        | DomainError::AlreadyPersisted { .. }
        | DomainError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}
