//! Application services for the order lifecycle.
//!
//! Each use case loads the entities it needs, applies guarded mutations and
//! commits everything through one unit of work. Commits that lose a race
//! are retried from a fresh read according to a [`RetryPolicy`].
//!
//! The services are:
//! 1. [`CatalogService`]: products, prices and stock levels
//! 2. [`CartService`]: per-user carts and checkout
//! 3. [`OrderingService`]: order placement, cancellation, status changes and payments
//!
//! Users and payments are external collaborators behind the
//! [`UserDirectory`] and [`PaymentGateway`] traits.

pub mod cart;
pub mod catalog;
pub mod error;
pub mod notifier;
pub mod ordering;
pub mod retry;
pub mod services;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use error::{Result, ServiceError};
pub use notifier::Notifier;
pub use ordering::{CreateOrderRequest, OrderLineRequest, OrderingService};
pub use retry::RetryPolicy;
pub use services::{
    ChargeStatus, GatewayError, InMemoryPaymentGateway, InMemoryUserDirectory, PaymentGateway,
    PaymentIntentOutcome, PaymentOutcome, PaymentRequest, RefundOutcome, User, UserDirectory,
};
