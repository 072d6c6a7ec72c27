//! Payment collaborator trait and in-memory implementation.
//!
//! Declines and refusals are ordinary outcomes carried in the returned
//! value. `Err` is reserved for the gateway itself being unreachable or
//! broken; callers turn it into a failed outcome as well.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{Money, OrderNumber, UserId};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by the payment gateway transport.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Payment gateway error: {0}")]
    Other(String),
}

/// A charge for one order.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub amount: Money,
    /// Opaque token identifying the payment method (card, wallet, ...).
    pub payment_method: String,
    /// Charges sharing a key are captured at most once; a repeat returns the
    /// earlier capture.
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Succeeded,
    Declined,
    Failed,
}

/// Result of a charge attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOutcome {
    pub is_success: bool,
    pub payment_id: Option<String>,
    pub status: ChargeStatus,
    pub error_message: Option<String>,
}

impl PaymentOutcome {
    pub fn succeeded(payment_id: impl Into<String>) -> Self {
        Self {
            is_success: true,
            payment_id: Some(payment_id.into()),
            status: ChargeStatus::Succeeded,
            error_message: None,
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            payment_id: None,
            status: ChargeStatus::Declined,
            error_message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            payment_id: None,
            status: ChargeStatus::Failed,
            error_message: Some(message.into()),
        }
    }
}

/// Result of a refund attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundOutcome {
    pub is_success: bool,
    pub refund_id: Option<String>,
    pub refunded_amount: Option<Money>,
    pub error_message: Option<String>,
}

impl RefundOutcome {
    pub fn succeeded(refund_id: impl Into<String>, amount: Money) -> Self {
        Self {
            is_success: true,
            refund_id: Some(refund_id.into()),
            refunded_amount: Some(amount),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            refund_id: None,
            refunded_amount: None,
            error_message: Some(message.into()),
        }
    }
}

/// Result of creating a client-side payment intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentIntentOutcome {
    pub is_success: bool,
    pub intent_id: Option<String>,
    pub client_secret: Option<String>,
    pub error_message: Option<String>,
}

impl PaymentIntentOutcome {
    pub fn succeeded(intent_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            is_success: true,
            intent_id: Some(intent_id.into()),
            client_secret: Some(client_secret.into()),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            intent_id: None,
            client_secret: None,
            error_message: Some(message.into()),
        }
    }
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Prepares a payment the client completes, tagged with `metadata` for
    /// reconciliation.
    async fn create_payment_intent(
        &self,
        amount: Money,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntentOutcome, GatewayError>;

    /// Charges an order.
    async fn process_payment(&self, request: PaymentRequest)
    -> Result<PaymentOutcome, GatewayError>;

    /// Refunds part or all of a captured payment.
    async fn process_refund(
        &self,
        payment_id: &str,
        amount: Money,
    ) -> Result<RefundOutcome, GatewayError>;
}

/// A payment captured by the in-memory gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPayment {
    pub payment_id: String,
    pub order_id: AggregateId,
    pub amount: Money,
    pub refunded: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRefund {
    pub refund_id: String,
    pub payment_id: String,
    pub amount: Money,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    payments: HashMap<String, RecordedPayment>,
    /// Idempotency key to the payment captured under it.
    captures: HashMap<String, String>,
    refunds: Vec<RecordedRefund>,
    intents: Vec<(String, Money, HashMap<String, String>)>,
    next_id: u32,
    decline_payments: Option<String>,
    decline_refunds: Option<String>,
    unavailable: bool,
}

impl InMemoryGatewayState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory payment gateway for tests and the standalone server.
///
/// Approves everything unless told to decline or to act unavailable.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge with `reason` until [`approve_payments`](Self::approve_payments).
    pub async fn decline_payments(&self, reason: impl Into<String>) {
        self.state.write().await.decline_payments = Some(reason.into());
    }

    pub async fn approve_payments(&self) {
        self.state.write().await.decline_payments = None;
    }

    /// Declines every refund with `reason`.
    pub async fn decline_refunds(&self, reason: impl Into<String>) {
        self.state.write().await.decline_refunds = Some(reason.into());
    }

    /// Makes every call fail as if the gateway could not be reached.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    pub async fn payment(&self, payment_id: &str) -> Option<RecordedPayment> {
        self.state.read().await.payments.get(payment_id).cloned()
    }

    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    pub async fn refunds(&self) -> Vec<RecordedRefund> {
        self.state.read().await.refunds.clone()
    }

    pub async fn intent_count(&self) -> usize {
        self.state.read().await.intents.len()
    }

    /// Metadata attached to the most recent payment intent.
    pub async fn last_intent_metadata(&self) -> Option<HashMap<String, String>> {
        self.state
            .read()
            .await
            .intents
            .last()
            .map(|(_, _, metadata)| metadata.clone())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        metadata: HashMap<String, String>,
    ) -> Result<PaymentIntentOutcome, GatewayError> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        if !amount.is_positive() {
            return Ok(PaymentIntentOutcome::failed("Amount must be greater than zero"));
        }

        let intent_id = format!("pi_{:06}", state.next_id());
        let client_secret = format!("{intent_id}_secret_{}", uuid::Uuid::new_v4().simple());
        state.intents.push((intent_id.clone(), amount, metadata));

        Ok(PaymentIntentOutcome::succeeded(intent_id, client_secret))
    }

    async fn process_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentOutcome, GatewayError> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        if let Some(payment_id) = state.captures.get(&request.idempotency_key) {
            return Ok(PaymentOutcome::succeeded(payment_id.clone()));
        }
        if let Some(reason) = &state.decline_payments {
            return Ok(PaymentOutcome::declined(reason.clone()));
        }
        if request.payment_method.trim().is_empty() {
            return Ok(PaymentOutcome::declined("Missing payment method"));
        }

        let payment_id = format!("ch_{:06}", state.next_id());
        state.payments.insert(
            payment_id.clone(),
            RecordedPayment {
                payment_id: payment_id.clone(),
                order_id: request.order_id,
                amount: request.amount,
                refunded: Money::zero(request.amount.currency()),
            },
        );
        state
            .captures
            .insert(request.idempotency_key, payment_id.clone());

        Ok(PaymentOutcome::succeeded(payment_id))
    }

    async fn process_refund(
        &self,
        payment_id: &str,
        amount: Money,
    ) -> Result<RefundOutcome, GatewayError> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        if let Some(reason) = &state.decline_refunds {
            return Ok(RefundOutcome::failed(reason.clone()));
        }

        let Some(payment) = state.payments.get(payment_id) else {
            return Ok(RefundOutcome::failed(format!("No such payment: {payment_id}")));
        };
        let refunded = match payment.refunded.checked_add(amount) {
            Ok(total) => total,
            Err(err) => return Ok(RefundOutcome::failed(err.to_string())),
        };
        if refunded.amount() > payment.amount.amount() {
            return Ok(RefundOutcome::failed("Refund exceeds the captured amount"));
        }

        let refund_id = format!("re_{:06}", state.next_id());
        if let Some(payment) = state.payments.get_mut(payment_id) {
            payment.refunded = refunded;
        }
        state.refunds.push(RecordedRefund {
            refund_id: refund_id.clone(),
            payment_id: payment_id.to_string(),
            amount,
        });

        Ok(RefundOutcome::succeeded(refund_id, amount))
    }
}
