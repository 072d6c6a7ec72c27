//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::ServiceError;
use document_store::DocumentStore;
use domain::{Currency, Money, NewProduct, Product, ProductDetails, ProductId, Sku};
use serde::{Deserialize, Serialize};

use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name_en: String,
    #[serde(default)]
    pub name_ar: String,
    #[serde(default)]
    pub description_en: String,
    #[serde(default)]
    pub description_ar: String,
    /// Decimal amount as a string, e.g. `"12.500"`.
    pub price: String,
    pub currency: Option<String>,
    pub stock_quantity: u32,
}

#[derive(Deserialize)]
pub struct StockRequest {
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct PriceRequest {
    pub price: String,
    pub currency: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub sku: String,
    pub name_en: String,
    pub name_ar: String,
    pub description_en: String,
    pub price: Money,
    pub stock_quantity: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        let details = product.details();
        Self {
            id: product.product_id(),
            sku: product.sku().to_string(),
            name_en: details.name_en.clone(),
            name_ar: details.name_ar.clone(),
            description_en: details.description_en.clone(),
            price: product.price(),
            stock_quantity: product.stock_quantity(),
            is_active: product.is_active(),
            created_at: product.created_at(),
            updated_at: product.updated_at(),
        }
    }
}

// -- Handlers --

/// POST /products
#[tracing::instrument(skip(state, req), fields(sku = %req.sku))]
pub async fn create<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let sku = Sku::new(&req.sku).map_err(ServiceError::from)?;
    let price = parse_price(&req.price, req.currency.as_deref(), state.default_currency)?;

    let product = state
        .catalog
        .create_product(NewProduct {
            sku,
            details: ProductDetails {
                name_en: req.name_en,
                name_ar: req.name_ar,
                description_en: req.description_en,
                description_ar: req.description_ar,
                ..Default::default()
            },
            price,
            stock_quantity: req.stock_quantity,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}

/// GET /products
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.catalog.list_products().await?;
    Ok(Json(products.iter().map(ProductResponse::from).collect()))
}

/// GET /products/{id}
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.get_product(parse_id(&id, "product")?).await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// PUT /products/{id}/stock: sets the absolute stock level.
#[tracing::instrument(skip(state, req))]
pub async fn set_stock<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<StockRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .catalog
        .set_stock(parse_id(&id, "product")?, req.quantity)
        .await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// POST /products/{id}/stock: adds delivered units.
#[tracing::instrument(skip(state, req))]
pub async fn restock<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<StockRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .catalog
        .restock(parse_id(&id, "product")?, req.quantity)
        .await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// PUT /products/{id}/price
pub async fn change_price<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<PriceRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let price = parse_price(&req.price, req.currency.as_deref(), state.default_currency)?;
    let product = state
        .catalog
        .change_price(parse_id(&id, "product")?, price)
        .await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// POST /products/{id}/activate
pub async fn activate<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.activate(parse_id(&id, "product")?).await?;
    Ok(Json(ProductResponse::from(&product)))
}

/// POST /products/{id}/deactivate
pub async fn deactivate<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.deactivate(parse_id(&id, "product")?).await?;
    Ok(Json(ProductResponse::from(&product)))
}

fn parse_price(amount: &str, currency: Option<&str>, default: Currency) -> Result<Money, ApiError> {
    let currency = match currency {
        Some(code) => Currency::new(code).map_err(ServiceError::from)?,
        None => default,
    };
    let amount = amount
        .trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid price {amount:?}: {e}")))?;
    Ok(Money::new(amount, currency).map_err(ServiceError::from)?)
}
