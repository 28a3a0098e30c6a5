//! # Payment Markers
//!
//! Client-side bookkeeping around a redirect to the gateway:
//! - the pending-payment marker names the one order awaiting a return page
//! - the cart-cleared marker keeps a revisited success page from clearing
//!   the cart twice

use crate::storage::LocalStore;
use pay_core::OrderNumber;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const PENDING_PAYMENT_KEY: &str = "pending_payment_order";
pub const CART_CLEARED_TTL: Duration = Duration::from_secs(60 * 60);

fn cart_cleared_key(order_number: OrderNumber) -> String {
    format!("cart_cleared_{}", order_number)
}

#[derive(Clone)]
pub struct PaymentMarkers {
    store: Arc<dyn LocalStore>,
}

impl PaymentMarkers {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub fn set_pending(&self, order_number: OrderNumber) {
        self.store
            .set(PENDING_PAYMENT_KEY, &order_number.to_string(), None);
    }

    /// Order awaiting a return page, if any. Unparseable values read as none.
    pub fn pending(&self) -> Option<OrderNumber> {
        self.store
            .get(PENDING_PAYMENT_KEY)
            .and_then(|v| v.parse().ok())
    }

    pub fn has_pending(&self) -> bool {
        self.pending().is_some()
    }

    pub fn clear_pending(&self) {
        self.store.remove(PENDING_PAYMENT_KEY);
    }

    /// Record that the cart was cleared for this order.
    ///
    /// Returns true only the first time within [`CART_CLEARED_TTL`].
    pub fn mark_cart_cleared(&self, order_number: OrderNumber) -> bool {
        let key = cart_cleared_key(order_number);
        if self.store.get(&key).is_some() {
            debug!(%order_number, "cart already cleared for order");
            return false;
        }
        self.store.set(&key, "true", Some(CART_CLEARED_TTL));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLocalStore;

    fn markers() -> PaymentMarkers {
        PaymentMarkers::new(Arc::new(MemoryLocalStore::new()))
    }

    #[test]
    fn test_pending_marker() {
        let markers = markers();
        assert!(!markers.has_pending());

        markers.set_pending(OrderNumber::new(5001));
        assert_eq!(markers.pending(), Some(OrderNumber::new(5001)));

        markers.clear_pending();
        assert_eq!(markers.pending(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cart_cleared_once_per_ttl() {
        let markers = markers();
        let order = OrderNumber::new(5001);

        assert!(markers.mark_cart_cleared(order));
        assert!(!markers.mark_cart_cleared(order));
        assert!(markers.mark_cart_cleared(OrderNumber::new(5002)));

        tokio::time::advance(CART_CLEARED_TTL).await;
        assert!(markers.mark_cart_cleared(order));
    }
}
