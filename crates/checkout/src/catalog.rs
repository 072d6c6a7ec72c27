//! Product catalog use cases.

use std::sync::Arc;

use document_store::{DocumentStore, StoreError};
use domain::{
    DomainError, Money, NewProduct, Product, ProductDetails, ProductId, ProductRepository,
    UnitOfWork,
};

use crate::error::{Result, ServiceError};
use crate::notifier::Notifier;
use crate::retry::RetryPolicy;

/// Service for managing products and their stock.
pub struct CatalogService<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    products: ProductRepository<S>,
    retry: RetryPolicy,
    notifier: Notifier<S>,
}

impl<S: DocumentStore + ?Sized> CatalogService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            products: ProductRepository::new(Arc::clone(&store)),
            store,
            retry: RetryPolicy::default(),
            notifier: Notifier::disabled(),
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

    /// Adds a product to the catalog. SKUs are unique.
    #[tracing::instrument(skip(self, new), fields(sku = %new.sku))]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product> {
        let sku = new.sku.clone();
        let mut product = Product::create(new)?;

        let mut uow = UnitOfWork::new(Arc::clone(&self.store));
        uow.add(&mut product)?;
        let events = match uow.commit().await {
            Ok(events) => events,
            Err(DomainError::Store(StoreError::UniqueViolation { .. })) => {
                return Err(ServiceError::AlreadyExists(format!("Product with SKU {sku}")));
            }
            Err(err) => return Err(err.into()),
        };

        self.notifier.publish(&events).await;
        tracing::info!(product_id = %product.product_id(), "product created");
        Ok(product)
    }

    pub async fn get_product(&self, product_id: ProductId) -> Result<Product> {
        self.products
            .find_product(product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound(product_id))
    }

    /// All products ordered by SKU.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let mut products = self.products.list().await?;
        products.sort_by(|a, b| a.sku().cmp(b.sku()));
        Ok(products)
    }

    /// Sets stock to an absolute value.
    pub async fn set_stock(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        self.mutate("set_stock", product_id, &|product: &mut Product| {
            product.update_stock(quantity);
            Ok(())
        })
        .await
    }

    /// Adds units to stock, e.g. after a delivery from a supplier.
    pub async fn restock(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        self.mutate("restock", product_id, &|product: &mut Product| {
            product.restore_stock(quantity)?;
            Ok(())
        })
        .await
    }

    pub async fn change_price(&self, product_id: ProductId, price: Money) -> Result<Product> {
        self.mutate("change_price", product_id, &|product: &mut Product| {
            product.change_price(price);
            Ok(())
        })
        .await
    }

    pub async fn update_details(
        &self,
        product_id: ProductId,
        details: ProductDetails,
    ) -> Result<Product> {
        self.mutate("update_details", product_id, &|product: &mut Product| {
            product.update_details(details.clone())?;
            Ok(())
        })
        .await
    }

    pub async fn activate(&self, product_id: ProductId) -> Result<Product> {
        self.mutate("activate_product", product_id, &|product: &mut Product| {
            product.activate();
            Ok(())
        })
        .await
    }

    pub async fn deactivate(&self, product_id: ProductId) -> Result<Product> {
        self.mutate("deactivate_product", product_id, &|product: &mut Product| {
            product.deactivate();
            Ok(())
        })
        .await
    }

    /// Loads, changes and commits one product, retrying on conflicts.
    /// A change that records nothing commits nothing.
    async fn mutate<F>(&self, operation: &'static str, product_id: ProductId, change: &F) -> Result<Product>
    where
        F: Fn(&mut Product) -> Result<()> + Sync,
    {
        let this = self;
        let (product, events) = self
            .retry
            .run(operation, move |_| async move {
                let mut product = this.get_product(product_id).await?;
                change(&mut product)?;

                let mut uow = UnitOfWork::new(Arc::clone(&this.store));
                uow.update_if_changed(&mut product)?;
                let events = uow.commit().await?;
                Ok((product, events))
            })
            .await?;

        self.notifier.publish(&events).await;
        tracing::debug!(operation, product_id = %product_id, "product updated");
        Ok(product)
    }
}
