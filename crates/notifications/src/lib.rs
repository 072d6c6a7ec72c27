//! Post-commit notification delivery.
//!
//! Committed change sets leave their notifications in the store outbox.
//! A [`Dispatcher`] hands them to every registered [`Subscriber`], either
//! live right after a commit or by catching up from the outbox.
//!
//! Two subscribers ship with the crate:
//! - [`LowStockMonitor`] raises alerts when a product's stock drops to a threshold
//! - [`OrderActivityView`] keeps a status timeline per order

pub mod dispatcher;
pub mod error;
pub mod subscriber;
pub mod views;

pub use dispatcher::Dispatcher;
pub use error::{NotificationError, Result};
pub use subscriber::{Subscriber, SubscriberPosition};
pub use views::{
    ActivityEntry, DEFAULT_LOW_STOCK_THRESHOLD, LowStockAlert, LowStockMonitor, OrderActivity,
    OrderActivityView, StockLevel,
};
