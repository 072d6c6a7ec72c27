//! Low-stock reporting from the notification views.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use document_store::DocumentStore;
use notifications::{LowStockAlert, StockLevel};
use serde::Serialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct LowStockResponse {
    pub threshold: u32,
    /// Active products currently at or below the threshold.
    pub products: Vec<StockLevel>,
    /// Every alert raised so far, oldest first.
    pub alerts: Vec<LowStockAlert>,
}

/// GET /alerts/low-stock
pub async fn low_stock<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<LowStockResponse>, ApiError> {
    state
        .dispatcher
        .run_catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(LowStockResponse {
        threshold: state.low_stock.threshold(),
        products: state.low_stock.low_stock_products().await,
        alerts: state.low_stock.alerts().await,
    }))
}
