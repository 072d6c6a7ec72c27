//! Order placement, cancellation, status changes and payments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Utc};
use common::AggregateId;
use document_store::{DocumentStore, EventEnvelope};
use domain::{
    Address, Aggregate, Money, Order, OrderError, OrderNumberPrefix, OrderRepository, OrderStatus,
    PaymentStatus, Product, ProductError, ProductId, ProductRepository, UnitOfWork, UserId,
};
use serde::Deserialize;

use crate::error::{Result, ServiceError};
use crate::notifier::Notifier;
use crate::retry::RetryPolicy;
use crate::services::{
    PaymentGateway, PaymentIntentOutcome, PaymentOutcome, PaymentRequest, RefundOutcome,
    UserDirectory,
};

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Input for [`OrderingService::create_order`].
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: Address,
    pub billing_address: Address,
}

/// Service for the order use cases.
///
/// Every mutating method commits exactly once on success and not at all on
/// failure. Stock reductions and restorations are committed together with
/// the order they belong to.
pub struct OrderingService<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    orders: OrderRepository<S>,
    products: ProductRepository<S>,
    users: Arc<dyn UserDirectory>,
    payments: Arc<dyn PaymentGateway>,
    retry: RetryPolicy,
    notifier: Notifier<S>,
    prefix: OrderNumberPrefix,
}

impl<S: DocumentStore + ?Sized> OrderingService<S> {
    /// Creates a new ordering service.
    pub fn new(
        store: Arc<S>,
        users: Arc<dyn UserDirectory>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders: OrderRepository::new(Arc::clone(&store)),
            products: ProductRepository::new(Arc::clone(&store)),
            store,
            users,
            payments,
            retry: RetryPolicy::default(),
            notifier: Notifier::disabled(),
            prefix: OrderNumberPrefix::Order,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier<S>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Gets an order.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Order> {
        self.orders
            .find(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))
    }

    /// Gets every order of a user, newest first.
    pub async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// Places an order and takes its units out of stock in one commit.
    ///
    /// Lines are priced at the current catalog price. If any line cannot be
    /// served the whole order is rejected and no stock moves.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, lines = request.items.len()))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let started = Instant::now();

        if request.items.is_empty() {
            return Err(ServiceError::Validation(
                "an order needs at least one item".to_string(),
            ));
        }
        request.shipping_address.validate()?;
        request.billing_address.validate()?;

        self.users
            .get_by_id(request.user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(request.user_id))?;

        let year = Utc::now().year();
        let this = self;
        let request = &request;
        let (order, events) = self
            .retry
            .run("create_order", move |_| async move {
                this.try_create_order(request, year).await
            })
            .await?;

        self.notifier.publish(&events).await;

        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("create_order_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id(),
            order_number = %order.order_number(),
            total = %order.total_amount(),
            "order created"
        );

        Ok(order)
    }

    async fn try_create_order(
        &self,
        request: &CreateOrderRequest,
        year: i32,
    ) -> Result<(Order, Vec<EventEnvelope>)> {
        let mut products: HashMap<ProductId, Product> = HashMap::new();
        for line in &request.items {
            if !products.contains_key(&line.product_id) {
                let product = self
                    .products
                    .find_product(line.product_id)
                    .await?
                    .ok_or(ServiceError::ProductNotFound(line.product_id))?;
                products.insert(line.product_id, product);
            }
            let product = &products[&line.product_id];
            if !product.has_sufficient_stock(line.quantity) {
                return Err(ProductError::InsufficientStock {
                    product_id: line.product_id,
                    available: product.stock_quantity(),
                    requested: line.quantity,
                }
                .into());
            }
        }

        let currency = products[&request.items[0].product_id].price().currency();
        let number = self.orders.next_order_number(self.prefix, year).await?;
        let mut order = Order::create(
            number,
            request.user_id,
            currency,
            request.shipping_address.clone(),
            request.billing_address.clone(),
        );

        for line in &request.items {
            let product = &products[&line.product_id];
            order.add_item(line.product_id, product.name(), line.quantity, product.price())?;
        }

        // Repeated lines for one product reduce the same instance, so their
        // sum is checked against stock.
        for line in &request.items {
            if let Some(product) = products.get_mut(&line.product_id) {
                product.reduce_stock(line.quantity)?;
            }
        }

        let mut uow = UnitOfWork::new(Arc::clone(&self.store));
        for product in products.values_mut() {
            uow.update(product)?;
        }
        uow.add(&mut order)?;
        let events = uow.commit().await?;

        Ok((order, events))
    }

    /// Cancels an order and puts its units back in stock.
    ///
    /// `acting_user` is `None` for administrative cancellations; otherwise it
    /// must own the order. Lines whose product no longer exists are skipped.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        order_id: AggregateId,
        acting_user: Option<UserId>,
        reason: Option<String>,
    ) -> Result<Order> {
        let reason = reason.unwrap_or_else(|| match acting_user {
            Some(_) => "Cancelled by customer".to_string(),
            None => "Cancelled by administrator".to_string(),
        });

        let this = self;
        let reason = reason.as_str();
        let (order, events) = self
            .retry
            .run("cancel_order", move |_| async move {
                let mut order = this.get_order(order_id).await?;
                if let Some(user_id) = acting_user
                    && user_id != order.user_id()
                {
                    return Err(ServiceError::Unauthorized { user_id, order_id });
                }

                order.cancel(reason)?;
                let mut products = this.restorable_products(&order).await?;

                let mut uow = UnitOfWork::new(Arc::clone(&this.store));
                uow.update(&mut order)?;
                for product in &mut products {
                    uow.update(product)?;
                }
                let events = uow.commit().await?;
                Ok((order, events))
            })
            .await?;

        self.notifier.publish(&events).await;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_number = %order.order_number(), "order cancelled");
        Ok(order)
    }

    /// Loads the products of an order and puts each line's units back.
    ///
    /// Products that were removed from the catalog are skipped.
    async fn restorable_products(&self, order: &Order) -> Result<Vec<Product>> {
        let mut products = Vec::with_capacity(order.item_count());
        for item in order.items() {
            match self.products.find_product(item.product_id).await? {
                Some(mut product) => {
                    product.restore_stock(item.quantity)?;
                    products.push(product);
                }
                None => {
                    tracing::warn!(
                        order_number = %order.order_number(),
                        product_id = %item.product_id,
                        quantity = item.quantity,
                        "product no longer exists, skipping stock restoration"
                    );
                }
            }
        }
        Ok(products)
    }

    /// Moves an order to `target` through the matching guarded transition.
    ///
    /// Cancellation goes through [`cancel_order`](Self::cancel_order) so
    /// stock is restored.
    #[tracing::instrument(skip(self, reason))]
    pub async fn update_order_status(
        &self,
        order_id: AggregateId,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<Order> {
        let order = match target {
            OrderStatus::Cancelled => self.cancel_order(order_id, None, reason).await?,
            OrderStatus::Refunded => self.close_as_refunded(order_id).await?,
            OrderStatus::Pending => {
                return Err(ServiceError::UnsupportedTransition { target });
            }
            OrderStatus::Confirmed
            | OrderStatus::Processing
            | OrderStatus::Shipped
            | OrderStatus::Delivered => self.advance(order_id, target).await?,
        };

        metrics::counter!("order_status_transitions_total", "to" => target.as_str())
            .increment(1);
        Ok(order)
    }

    async fn advance(&self, order_id: AggregateId, target: OrderStatus) -> Result<Order> {
        let this = self;
        let (order, events) = self
            .retry
            .run("update_order_status", move |_| async move {
                let mut order = this.get_order(order_id).await?;
                match target {
                    OrderStatus::Confirmed => order.confirm()?,
                    OrderStatus::Processing => order.start_processing()?,
                    OrderStatus::Shipped => order.ship()?,
                    OrderStatus::Delivered => order.deliver()?,
                    _ => return Err(ServiceError::UnsupportedTransition { target }),
                }

                let mut uow = UnitOfWork::new(Arc::clone(&this.store));
                uow.update(&mut order)?;
                let events = uow.commit().await?;
                Ok((order, events))
            })
            .await?;

        self.notifier.publish(&events).await;
        tracing::info!(order_number = %order.order_number(), status = %order.status(), "order status changed");
        Ok(order)
    }

    /// Closes a paid order as refunded, restoring stock for goods that never
    /// left the warehouse.
    async fn close_as_refunded(&self, order_id: AggregateId) -> Result<Order> {
        let this = self;
        let (order, events) = self
            .retry
            .run("refund_order", move |_| async move {
                let mut order = this.get_order(order_id).await?;
                let restock = order.can_be_cancelled();
                order.process_refund()?;

                let mut products = if restock {
                    this.restorable_products(&order).await?
                } else {
                    Vec::new()
                };

                let mut uow = UnitOfWork::new(Arc::clone(&this.store));
                uow.update(&mut order)?;
                for product in &mut products {
                    uow.update(product)?;
                }
                let events = uow.commit().await?;
                Ok((order, events))
            })
            .await?;

        self.notifier.publish(&events).await;
        Ok(order)
    }

    /// Asks the gateway for a payment intent covering the order total.
    #[tracing::instrument(skip(self))]
    pub async fn create_payment_intent(&self, order_id: AggregateId) -> Result<PaymentIntentOutcome> {
        let order = self.get_order(order_id).await?;
        ensure_unpaid(&order)?;

        let metadata = HashMap::from([
            ("order_id".to_string(), order.id().to_string()),
            ("order_number".to_string(), order.order_number().to_string()),
            ("user_id".to_string(), order.user_id().to_string()),
        ]);

        let outcome = match self
            .payments
            .create_payment_intent(order.total_amount(), metadata)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, "payment intent could not be created");
                PaymentIntentOutcome::failed(err.to_string())
            }
        };
        Ok(outcome)
    }

    /// Charges the order through the gateway and records the result.
    ///
    /// A decline is not an error: the order is marked as failed, persisted
    /// and the outcome returned. A successful charge also confirms a pending
    /// order.
    ///
    /// The order id is the gateway idempotency key, so racing calls share one
    /// capture. The call that records second gets `AlreadyPaid` with the
    /// recorded payment id; a capture that cannot be recorded is refunded.
    #[tracing::instrument(skip(self, payment_method))]
    pub async fn process_payment(
        &self,
        order_id: AggregateId,
        payment_method: String,
    ) -> Result<PaymentOutcome> {
        let order = self.get_order(order_id).await?;
        ensure_payable(&order)?;

        let amount = order.total_amount();
        let request = PaymentRequest {
            order_id,
            order_number: order.order_number(),
            user_id: order.user_id(),
            amount,
            payment_method,
            idempotency_key: order_id.to_string(),
        };
        let outcome = match self.payments.process_payment(request).await {
            Ok(outcome) => outcome,
            Err(err) => PaymentOutcome::failed(err.to_string()),
        };
        let payment_id = outcome
            .payment_id
            .clone()
            .filter(|id| outcome.is_success && !id.trim().is_empty());

        let this = self;
        let outcome_ref = &outcome;
        let payment_ref = &payment_id;
        let recorded = self
            .retry
            .run("record_payment", move |_| async move {
                let mut order = this.get_order(order_id).await?;
                ensure_payable(&order)?;
                match payment_ref {
                    Some(payment_id) => {
                        order.mark_payment_completed(payment_id.as_str())?;
                        if order.status().can_confirm() && order.has_items() {
                            order.confirm()?;
                        }
                    }
                    None => {
                        let reason = outcome_ref
                            .error_message
                            .clone()
                            .or_else(|| Some("payment was not completed".to_string()));
                        order.mark_payment_failed(reason)?;
                    }
                }

                let mut uow = UnitOfWork::new(Arc::clone(&this.store));
                uow.update(&mut order)?;
                let events = uow.commit().await?;
                Ok((order, events))
            })
            .await;

        let (order, events) = match recorded {
            Ok(recorded) => recorded,
            Err(err) => {
                if let Some(captured) = &payment_id {
                    let same_capture = matches!(
                        &err,
                        ServiceError::AlreadyPaid { payment_id } if payment_id == captured
                    );
                    if !same_capture {
                        self.release_capture(&order, captured, amount).await;
                    }
                }
                return Err(err);
            }
        };

        self.notifier.publish(&events).await;

        if payment_id.is_some() {
            metrics::counter!("payments_total", "outcome" => "succeeded").increment(1);
            tracing::info!(
                order_number = %order.order_number(),
                payment_status = %order.payment_status(),
                "payment captured"
            );
            Ok(outcome)
        } else {
            metrics::counter!("payments_total", "outcome" => "failed").increment(1);
            tracing::warn!(
                order_number = %order.order_number(),
                error = outcome.error_message.as_deref().unwrap_or_default(),
                "payment declined"
            );
            Ok(PaymentOutcome {
                is_success: false,
                ..outcome
            })
        }
    }

    /// Refunds a capture the order could not record.
    async fn release_capture(&self, order: &Order, payment_id: &str, amount: Money) {
        match self.payments.process_refund(payment_id, amount).await {
            Ok(refund) if refund.is_success => {
                metrics::counter!("payments_total", "outcome" => "released").increment(1);
                tracing::warn!(
                    order_number = %order.order_number(),
                    payment_id,
                    "unrecorded capture refunded"
                );
            }
            Ok(refund) => tracing::error!(
                order_number = %order.order_number(),
                payment_id,
                error = refund.error_message.as_deref().unwrap_or_default(),
                "unrecorded capture could not be refunded"
            ),
            Err(err) => tracing::error!(
                order_number = %order.order_number(),
                payment_id,
                error = %err,
                "unrecorded capture could not be refunded"
            ),
        }
    }

    /// Refunds a paid order through the gateway and closes it as refunded.
    ///
    /// `amount` defaults to the order total. A refused refund leaves the
    /// order untouched.
    #[tracing::instrument(skip(self))]
    pub async fn refund_payment(
        &self,
        order_id: AggregateId,
        amount: Option<Money>,
    ) -> Result<RefundOutcome> {
        let order = self.get_order(order_id).await?;
        if order.payment_status() != PaymentStatus::Completed {
            return Err(ServiceError::RefundIneligible {
                status: order.payment_status(),
            });
        }
        let payment_id = order
            .payment_id()
            .ok_or(ServiceError::RefundIneligible {
                status: order.payment_status(),
            })?
            .to_string();

        let amount = amount.unwrap_or(order.total_amount());
        if amount.currency() != order.currency() {
            return Err(ServiceError::Validation(format!(
                "refund currency {} does not match order currency {}",
                amount.currency(),
                order.currency()
            )));
        }
        if !amount.is_positive() {
            return Err(ServiceError::Validation(
                "refund amount must be greater than zero".to_string(),
            ));
        }
        if amount.checked_cmp(&order.total_amount())? == std::cmp::Ordering::Greater {
            return Err(ServiceError::Validation(format!(
                "refund amount {amount} exceeds order total {}",
                order.total_amount()
            )));
        }

        let outcome = match self.payments.process_refund(&payment_id, amount).await {
            Ok(outcome) => outcome,
            Err(err) => RefundOutcome::failed(err.to_string()),
        };
        if !outcome.is_success {
            metrics::counter!("refunds_total", "outcome" => "failed").increment(1);
            tracing::warn!(
                order_number = %order.order_number(),
                error = outcome.error_message.as_deref().unwrap_or_default(),
                "refund refused"
            );
            return Ok(outcome);
        }

        self.close_as_refunded(order_id).await?;
        metrics::counter!("refunds_total", "outcome" => "succeeded").increment(1);
        tracing::info!(order_number = %order.order_number(), amount = %amount, "payment refunded");
        Ok(outcome)
    }
}

fn ensure_unpaid(order: &Order) -> Result<()> {
    if order.payment_status() == PaymentStatus::Completed {
        return Err(ServiceError::AlreadyPaid {
            payment_id: order.payment_id().unwrap_or_default().to_string(),
        });
    }
    Ok(())
}

fn ensure_payable(order: &Order) -> Result<()> {
    ensure_unpaid(order)?;
    if order.status().is_terminal() {
        return Err(OrderError::InvalidStateTransition {
            current_state: order.status(),
            action: "process payment",
        }
        .into());
    }
    Ok(())
}
