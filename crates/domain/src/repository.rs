//! Typed repositories over the document store.

use std::marker::PhantomData;
use std::sync::Arc;

use common::AggregateId;
use document_store::{Document, DocumentStore};

use crate::{
    aggregate::Aggregate,
    cart::Cart,
    error::DomainError,
    ids::{ProductId, UserId},
    order::{Order, OrderNumber, OrderNumberPrefix},
    product::Product,
};

/// Loads entities of one type from a document store.
///
/// Writes go through a [`UnitOfWork`](crate::UnitOfWork) so several entities
/// can be committed together.
pub struct Repository<S: ?Sized, A> {
    store: Arc<S>,
    _aggregate: PhantomData<fn() -> A>,
}

pub type OrderRepository<S> = Repository<S, Order>;
pub type ProductRepository<S> = Repository<S, Product>;
pub type CartRepository<S> = Repository<S, Cart>;

impl<S: ?Sized, A> Clone for Repository<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _aggregate: PhantomData,
        }
    }
}

impl<S, A> Repository<S, A>
where
    S: DocumentStore + ?Sized,
    A: Aggregate,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _aggregate: PhantomData,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Loads an entity, or `None` if it does not exist.
    pub async fn find(&self, id: AggregateId) -> Result<Option<A>, DomainError> {
        self.store
            .get(A::aggregate_type(), id)
            .await?
            .map(load)
            .transpose()
    }

    /// Loads an entity, failing with `NotFound` if it does not exist.
    pub async fn get(&self, id: AggregateId) -> Result<A, DomainError> {
        self.find(id).await?.ok_or_else(|| DomainError::NotFound {
            aggregate_type: A::aggregate_type(),
            id: id.to_string(),
        })
    }

    /// Loads every entity of this type.
    pub async fn list(&self) -> Result<Vec<A>, DomainError> {
        self.store
            .list(A::aggregate_type())
            .await?
            .into_iter()
            .map(load)
            .collect()
    }

    /// Loads the entity holding a unique business key.
    pub async fn find_by_unique_key(&self, key: &str) -> Result<Option<A>, DomainError> {
        self.store
            .find_by_unique_key(A::aggregate_type(), key)
            .await?
            .map(load)
            .transpose()
    }
}

impl<S: DocumentStore + ?Sized> Repository<S, Order> {
    pub async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, DomainError> {
        self.find_by_unique_key(&number.to_string()).await
    }

    pub async fn order_number_exists(&self, number: &OrderNumber) -> Result<bool, DomainError> {
        Ok(self
            .store
            .find_by_unique_key(Order::aggregate_type(), &number.to_string())
            .await?
            .is_some())
    }

    /// Computes the next number after the highest one issued this year.
    ///
    /// Two callers can compute the same number. The unique key on the order
    /// document rejects the second commit, which must then retry.
    pub async fn next_order_number(
        &self,
        prefix: OrderNumberPrefix,
        year: i32,
    ) -> Result<OrderNumber, DomainError> {
        let key_prefix = OrderNumber::year_prefix(prefix, year);
        let highest = self
            .store
            .max_unique_key_with_prefix(Order::aggregate_type(), &key_prefix)
            .await?
            .map(|key| key.parse::<OrderNumber>())
            .transpose()?;

        Ok(OrderNumber::next_after(prefix, year, highest.as_ref())?)
    }

    /// Loads every order placed by a user, newest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, DomainError> {
        let mut orders: Vec<Order> = self
            .list()
            .await?
            .into_iter()
            .filter(|order| order.user_id() == user_id)
            .collect();
        orders.sort_by_key(|order| std::cmp::Reverse(order.created_at()));
        Ok(orders)
    }
}

impl<S: DocumentStore + ?Sized> Repository<S, Product> {
    pub async fn find_product(&self, id: ProductId) -> Result<Option<Product>, DomainError> {
        self.find(id.into()).await
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        self.get(id.into()).await
    }
}

impl<S: DocumentStore + ?Sized> Repository<S, Cart> {
    pub async fn find_by_user(&self, user_id: UserId) -> Result<Option<Cart>, DomainError> {
        self.find_by_unique_key(&user_id.to_string()).await
    }
}

fn load<A: Aggregate>(document: Document) -> Result<A, DomainError> {
    let version = document.version;
    let mut aggregate: A = document.into_state()?;
    aggregate.set_version(version);
    Ok(aggregate)
}
