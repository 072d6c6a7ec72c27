//! Shopping cart use cases and checkout.

use std::sync::Arc;

use document_store::DocumentStore;
use domain::{
    Address, Aggregate, Cart, CartError, CartRepository, DEFAULT_CART_EXPIRATION_DAYS, Order,
    Product, ProductId, ProductRepository, UnitOfWork, UserId,
};

use crate::error::{Result, ServiceError};
use crate::notifier::Notifier;
use crate::ordering::{CreateOrderRequest, OrderLineRequest, OrderingService};
use crate::retry::RetryPolicy;
use crate::services::UserDirectory;

/// Service for per-user carts.
///
/// A user has at most one cart. It is created on the first added item with
/// the currency of that item's price.
pub struct CartService<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    carts: CartRepository<S>,
    products: ProductRepository<S>,
    users: Arc<dyn UserDirectory>,
    ordering: Arc<OrderingService<S>>,
    expiration_days: u32,
    retry: RetryPolicy,
    notifier: Notifier<S>,
}

impl<S: DocumentStore + ?Sized> CartService<S> {
    pub fn new(
        store: Arc<S>,
        users: Arc<dyn UserDirectory>,
        ordering: Arc<OrderingService<S>>,
    ) -> Self {
        Self {
            carts: CartRepository::new(Arc::clone(&store)),
            products: ProductRepository::new(Arc::clone(&store)),
            store,
            users,
            ordering,
            expiration_days: DEFAULT_CART_EXPIRATION_DAYS,
            retry: RetryPolicy::default(),
            notifier: Notifier::disabled(),
        }
    }

    /// Lifetime of newly created carts.
    pub fn with_expiration_days(mut self, days: u32) -> Self {
        self.expiration_days = days.max(1);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier<S>) -> Self {
        self.notifier = notifier;
        self
    }

    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        self.carts
            .find_by_user(user_id)
            .await?
            .ok_or(ServiceError::CartNotFound(user_id))
    }

    /// Adds units of a product at its current price, creating the cart if
    /// the user has none yet.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        let this = self;
        let (cart, events) = self
            .retry
            .run("cart_add_item", move |_| async move {
                let product = this.active_product(product_id).await?;
                let existing = this.carts.find_by_user(user_id).await?;
                let is_new = existing.is_none();
                let mut cart = existing.unwrap_or_else(|| {
                    Cart::create_expiring_in(
                        user_id,
                        product.price().currency(),
                        this.expiration_days,
                    )
                });

                cart.add_item(product_id, quantity, product.price())?;

                let mut uow = UnitOfWork::new(Arc::clone(&this.store));
                if is_new {
                    uow.add(&mut cart)?;
                } else {
                    uow.update(&mut cart)?;
                }
                // A cart created concurrently for the same user fails the
                // unique key and is picked up by the next attempt.
                let events = uow.commit().await?;
                Ok((cart, events))
            })
            .await?;

        self.notifier.publish(&events).await;
        tracing::debug!(items = cart.item_count(), "item added to cart");
        Ok(cart)
    }

    /// Sets the quantity of a line. Zero removes it.
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart> {
        self.mutate("cart_update_quantity", user_id, &|cart: &mut Cart| {
            cart.update_item_quantity(product_id, quantity)
        })
        .await
    }

    pub async fn remove_item(&self, user_id: UserId, product_id: ProductId) -> Result<Cart> {
        self.mutate("cart_remove_item", user_id, &|cart: &mut Cart| {
            cart.remove_item(product_id)
        })
        .await
    }

    pub async fn clear(&self, user_id: UserId) -> Result<Cart> {
        self.mutate("cart_clear", user_id, &|cart: &mut Cart| cart.clear())
            .await
    }

    /// Moves the expiration `days` from now.
    pub async fn extend_expiration(&self, user_id: UserId, days: u32) -> Result<Cart> {
        self.mutate("cart_extend_expiration", user_id, &|cart: &mut Cart| {
            cart.extend_expiration(days)
        })
        .await
    }

    /// Checks the cart against current stock without reserving anything.
    pub async fn validate_stock(&self, user_id: UserId) -> Result<()> {
        let cart = self.get_cart(user_id).await?;
        let products = self.cart_products(&cart).await?;
        cart.validate_stock(&products)?;
        Ok(())
    }

    /// Turns the cart into an order and empties it.
    ///
    /// The order is placed through [`OrderingService::create_order`], so
    /// stock is checked again at commit time. The cart is only cleared once
    /// the order exists.
    #[tracing::instrument(skip(self, shipping_address, billing_address), fields(user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        shipping_address: Address,
        billing_address: Address,
    ) -> Result<Order> {
        let cart = self.get_cart(user_id).await?;
        if cart.is_empty() {
            return Err(ServiceError::Validation("cart is empty".to_string()));
        }
        if cart.is_expired() {
            return Err(CartError::Expired {
                expired_at: cart.expires_at(),
            }
            .into());
        }

        let products = self.cart_products(&cart).await?;
        cart.validate_stock(&products)?;

        let request = CreateOrderRequest {
            user_id,
            items: cart
                .items()
                .iter()
                .map(|item| OrderLineRequest {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            shipping_address,
            billing_address,
        };
        let order = self.ordering.create_order(request).await?;

        if let Err(err) = self.clear(user_id).await {
            tracing::warn!(
                error = %err,
                order_id = %order.id(),
                "order placed but cart could not be cleared"
            );
        }

        metrics::counter!("cart_checkouts_total").increment(1);
        Ok(order)
    }

    async fn active_product(&self, product_id: ProductId) -> Result<Product> {
        let product = self
            .products
            .find_product(product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound(product_id))?;
        if !product.is_active() {
            return Err(CartError::ProductInactive { product_id }.into());
        }
        Ok(product)
    }

    async fn cart_products(&self, cart: &Cart) -> Result<Vec<Product>> {
        let mut products = Vec::with_capacity(cart.item_count());
        for item in cart.items() {
            if let Some(product) = self.products.find_product(item.product_id).await? {
                products.push(product);
            }
        }
        Ok(products)
    }

    async fn mutate<F>(&self, operation: &'static str, user_id: UserId, change: &F) -> Result<Cart>
    where
        F: Fn(&mut Cart) -> std::result::Result<(), CartError> + Sync,
    {
        let this = self;
        let (cart, events) = self
            .retry
            .run(operation, move |_| async move {
                let mut cart = this.get_cart(user_id).await?;
                change(&mut cart)?;

                let mut uow = UnitOfWork::new(Arc::clone(&this.store));
                uow.update_if_changed(&mut cart)?;
                let events = uow.commit().await?;
                Ok((cart, events))
            })
            .await?;

        self.notifier.publish(&events).await;
        Ok(cart)
    }
}
