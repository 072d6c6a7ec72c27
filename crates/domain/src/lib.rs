//! Domain layer for the order lifecycle engine.
//!
//! This crate provides:
//! - Money, Address and typed identifiers
//! - Product entity with guarded stock operations
//! - Cart entity with expiration and advisory stock validation
//! - Order aggregate with its status and payment state machines
//! - Order number formatting and generation
//! - Typed repositories and the unit of work that commits them atomically

pub mod address;
pub mod aggregate;
pub mod cart;
pub mod error;
pub mod ids;
pub mod money;
pub mod order;
pub mod product;
pub mod repository;
pub mod unit_of_work;

pub use address::{Address, AddressError};
pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{Cart, CartError, CartEvent, CartItem, DEFAULT_CART_EXPIRATION_DAYS};
pub use error::DomainError;
pub use ids::{ProductId, Sku, SkuError, UserId};
pub use money::{Currency, Money, MoneyError};
pub use order::{
    Order, OrderError, OrderEvent, OrderItem, OrderNumber, OrderNumberError, OrderNumberPrefix,
    OrderStatus, PaymentStatus,
};
pub use product::{NewProduct, Product, ProductDetails, ProductError, ProductEvent};
pub use repository::{CartRepository, OrderRepository, ProductRepository, Repository};
pub use unit_of_work::UnitOfWork;

pub use common::AggregateId;
pub use document_store::{EventEnvelope, Version};
