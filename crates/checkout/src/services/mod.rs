//! External collaborator traits and in-memory implementations.

pub mod payment;
pub mod users;

pub use payment::{
    ChargeStatus, GatewayError, InMemoryPaymentGateway, PaymentGateway, PaymentIntentOutcome,
    PaymentOutcome, PaymentRequest, RefundOutcome,
};
pub use users::{InMemoryUserDirectory, User, UserDirectory};
