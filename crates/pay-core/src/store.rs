//! # Order Store
//!
//! Persistence seam for orders. The store is the ground truth; the only
//! concurrency primitive the engine relies on is that each call below is a
//! single atomic operation keyed by order number.

use crate::error::{PaymentError, PaymentResult};
use crate::order::{Order, OrderNumber, PaymentUpdate, Transition};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Result of an atomic payment update
#[derive(Debug, Clone)]
pub struct AppliedUpdate {
    /// Order state after the update
    pub order: Order,
    pub transition: Transition,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order. Fails if the order number is taken.
    async fn insert(&self, order: Order) -> PaymentResult<Order>;

    /// Look an order up by number
    async fn find(&self, order_number: OrderNumber) -> PaymentResult<Option<Order>>;

    /// Record the gateway preference id (see [`Order::attach_preference`]).
    ///
    /// Returns `None` when the order does not exist.
    async fn attach_preference(
        &self,
        order_number: OrderNumber,
        preference_id: &str,
    ) -> PaymentResult<Option<Order>>;

    /// Apply gateway facts atomically (see [`Order::apply_payment_update`]).
    ///
    /// Returns `None` when the order does not exist; nothing is written then.
    async fn apply_payment_update(
        &self,
        order_number: OrderNumber,
        update: &PaymentUpdate,
    ) -> PaymentResult<Option<AppliedUpdate>>;
}

/// Type alias for a shared order store
pub type BoxedOrderStore = Arc<dyn OrderStore>;

/// Process-local store, used in development and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderNumber, Order>>>,
    writes: Arc<AtomicU64>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful mutations so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> PaymentResult<Order> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_number) {
            return Err(PaymentError::Persistence(format!(
                "order {} already exists",
                order.order_number
            )));
        }
        orders.insert(order.order_number, order.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(order)
    }

    async fn find(&self, order_number: OrderNumber) -> PaymentResult<Option<Order>> {
        Ok(self.orders.read().await.get(&order_number).cloned())
    }

    async fn attach_preference(
        &self,
        order_number: OrderNumber,
        preference_id: &str,
    ) -> PaymentResult<Option<Order>> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&order_number) else {
            return Ok(None);
        };
        if order.attach_preference(preference_id) {
            self.writes.fetch_add(1, Ordering::SeqCst);
        } else {
            debug!(%order_number, "preference not attached, payment already final");
        }
        Ok(Some(order.clone()))
    }

    async fn apply_payment_update(
        &self,
        order_number: OrderNumber,
        update: &PaymentUpdate,
    ) -> PaymentResult<Option<AppliedUpdate>> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.get_mut(&order_number) else {
            return Ok(None);
        };
        let transition = order.apply_payment_update(update);
        if transition == Transition::Applied {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Some(AppliedUpdate {
            order: order.clone(),
            transition,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::order::{PaymentStatus, OrderStatus};
    use crate::payment::PaymentDetails;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryOrderStore::new();
        let order = Order::new(OrderNumber::new(1001), Currency::ARS);

        store.insert(order.clone()).await.unwrap();
        assert_eq!(store.find(OrderNumber::new(1001)).await.unwrap(), Some(order.clone()));
        assert_eq!(store.find(OrderNumber::new(1002)).await.unwrap(), None);

        let duplicate = store.insert(order).await;
        assert!(matches!(duplicate, Err(PaymentError::Persistence(_))));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_order_writes_nothing() {
        let store = InMemoryOrderStore::new();
        let update = PaymentDetails::new("pay_1", "approved", Some("9999".into())).to_update();

        let result = store
            .apply_payment_update(OrderNumber::new(9999), &update)
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.is_empty().await);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_apply_payment_update() {
        let store = InMemoryOrderStore::new();
        store
            .insert(Order::new(OrderNumber::new(1001), Currency::ARS))
            .await
            .unwrap();
        store
            .attach_preference(OrderNumber::new(1001), "pref_1")
            .await
            .unwrap();

        let update = PaymentDetails::new("pay_1", "approved", Some("1001".into())).to_update();
        let applied = store
            .apply_payment_update(OrderNumber::new(1001), &update)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(applied.transition, Transition::Applied);
        assert_eq!(applied.order.payment_status, PaymentStatus::Approved);
        assert_eq!(applied.order.status, OrderStatus::Confirmed);
        assert_eq!(store.write_count(), 3);
    }
}
