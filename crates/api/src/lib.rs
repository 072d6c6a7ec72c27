//! HTTP API server for the order lifecycle engine.
//!
//! Provides REST endpoints for users, the catalog, carts, orders, payments
//! and low-stock alerts, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{
    CartService, CatalogService, InMemoryPaymentGateway, InMemoryUserDirectory, Notifier,
    OrderingService, RetryPolicy,
};
use document_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::{Dispatcher, LowStockMonitor, OrderActivityView};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health::<S>))
        .route(
            "/users",
            post(routes::users::create::<S>).get(routes::users::list::<S>),
        )
        .route(
            "/products",
            post(routes::products::create::<S>).get(routes::products::list::<S>),
        )
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/products/{id}/stock",
            put(routes::products::set_stock::<S>).post(routes::products::restock::<S>),
        )
        .route("/products/{id}/price", put(routes::products::change_price::<S>))
        .route("/products/{id}/activate", post(routes::products::activate::<S>))
        .route(
            "/products/{id}/deactivate",
            post(routes::products::deactivate::<S>),
        )
        .route(
            "/carts/{user_id}",
            get(routes::carts::get::<S>).delete(routes::carts::clear::<S>),
        )
        .route("/carts/{user_id}/items", post(routes::carts::add_item::<S>))
        .route(
            "/carts/{user_id}/items/{product_id}",
            put(routes::carts::update_item::<S>).delete(routes::carts::remove_item::<S>),
        )
        .route("/carts/{user_id}/validate", post(routes::carts::validate::<S>))
        .route("/carts/{user_id}/extend", post(routes::carts::extend::<S>))
        .route("/carts/{user_id}/checkout", post(routes::carts::checkout::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/activity", get(routes::orders::activity::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route(
            "/orders/{id}/payment-intent",
            post(routes::orders::payment_intent::<S>),
        )
        .route("/orders/{id}/payment", post(routes::orders::pay::<S>))
        .route("/orders/{id}/refund", post(routes::orders::refund::<S>))
        .route("/alerts/low-stock", get(routes::alerts::low_stock::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the services, the dispatcher and its subscribers over `store`.
///
/// Users and payments use the in-memory collaborators.
pub fn create_state<S: DocumentStore + 'static>(store: Arc<S>, config: &Config) -> Arc<AppState<S>> {
    let users = InMemoryUserDirectory::new();
    let payments = InMemoryPaymentGateway::new();
    let retry = RetryPolicy::with_max_attempts(config.retry_max_attempts);

    let low_stock = LowStockMonitor::with_threshold(config.low_stock_threshold);
    let activity = OrderActivityView::new();
    let mut dispatcher = Dispatcher::new(Arc::clone(&store));
    dispatcher.register(Box::new(low_stock.clone()));
    dispatcher.register(Box::new(activity.clone()));
    let dispatcher = Arc::new(dispatcher);
    let notifier = Notifier::new(Arc::clone(&dispatcher));

    let ordering = Arc::new(
        OrderingService::new(
            Arc::clone(&store),
            Arc::new(users.clone()),
            Arc::new(payments.clone()),
        )
        .with_retry_policy(retry)
        .with_notifier(notifier.clone()),
    );
    let carts = CartService::new(
        Arc::clone(&store),
        Arc::new(users.clone()),
        Arc::clone(&ordering),
    )
    .with_expiration_days(config.cart_expiration_days)
    .with_retry_policy(retry)
    .with_notifier(notifier.clone());
    let catalog = CatalogService::new(store)
        .with_retry_policy(retry)
        .with_notifier(notifier);

    Arc::new(AppState {
        users,
        payments,
        catalog,
        carts,
        ordering,
        dispatcher,
        low_stock,
        activity,
        default_currency: config.default_currency,
    })
}
