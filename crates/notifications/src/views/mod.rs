//! Subscribers that maintain query-side views.

pub mod low_stock;
pub mod order_activity;

pub use low_stock::{DEFAULT_LOW_STOCK_THRESHOLD, LowStockAlert, LowStockMonitor, StockLevel};
pub use order_activity::{ActivityEntry, OrderActivity, OrderActivityView};
