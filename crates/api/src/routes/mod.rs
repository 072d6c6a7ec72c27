//! HTTP handlers, grouped by resource.

pub mod alerts;
pub mod carts;
pub mod ops;
pub mod orders;
pub mod products;
pub mod users;

use std::str::FromStr;
use std::sync::Arc;

use checkout::{
    CartService, CatalogService, InMemoryPaymentGateway, InMemoryUserDirectory, OrderingService,
};
use document_store::DocumentStore;
use domain::Currency;
use notifications::{Dispatcher, LowStockMonitor, OrderActivityView};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore + 'static> {
    pub users: InMemoryUserDirectory,
    pub payments: InMemoryPaymentGateway,
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub ordering: Arc<OrderingService<S>>,
    pub dispatcher: Arc<Dispatcher<S>>,
    pub low_stock: LowStockMonitor,
    pub activity: OrderActivityView,
    /// Currency for prices submitted without one.
    pub default_currency: Currency,
}

/// Parses a path identifier, answering 400 on malformed input.
pub(crate) fn parse_id<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} id: {e}")))
}
