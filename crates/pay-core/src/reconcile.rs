//! # Order Reconciler
//!
//! The single authority that writes gateway payment facts onto orders.
//! Webhook deliveries, gateway retries and server-side reconcile requests all
//! come through here, so every call must be idempotent.

use crate::error::{PaymentError, PaymentResult};
use crate::order::{Order, Transition};
use crate::payment::PaymentDetails;
use crate::store::BoxedOrderStore;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// How long to wait for an order that is not there yet.
///
/// A payment can be notified before the order insert is visible, so a miss is
/// retried a few times before it becomes `OrderNotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total lookups, including the first one
    pub attempts: u32,
    /// Wait before the second lookup; doubles after each miss
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Single lookup, no waiting
    pub fn none() -> Self {
        Self {
            attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// Result of a successful reconcile
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub order: Order,
    pub outcome: Transition,
}

/// Applies [`PaymentDetails`] onto the matching order
#[derive(Clone)]
pub struct Reconciler {
    store: BoxedOrderStore,
    retry: RetryPolicy,
}

impl Reconciler {
    pub fn new(store: BoxedOrderStore) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Builder: set the not-found retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &BoxedOrderStore {
        &self.store
    }

    /// Reconcile one payment.
    ///
    /// Errors:
    /// - `MissingReference` when the external reference is absent or not an order number
    /// - `OrderNotFound` when no order matches after the retry window
    /// - `Persistence` when the store fails
    #[instrument(skip(self, details), fields(payment_id = %details.id, gateway_status = %details.status))]
    pub async fn reconcile(&self, details: &PaymentDetails) -> PaymentResult<Reconciliation> {
        let order_number =
            details
                .order_number()
                .ok_or_else(|| PaymentError::MissingReference {
                    payment_id: details.id.clone(),
                })?;

        let update = details.to_update();
        let attempts = self.retry.attempts.max(1);
        let mut backoff = self.retry.initial_backoff;

        for attempt in 1..=attempts {
            let applied = self
                .store
                .apply_payment_update(order_number, &update)
                .await
                .map_err(|e| match e {
                    PaymentError::Persistence(msg) => PaymentError::Persistence(msg),
                    other => PaymentError::Persistence(other.to_string()),
                })?;

            if let Some(applied) = applied {
                match applied.transition {
                    Transition::Applied => info!(
                        %order_number,
                        payment_status = %applied.order.payment_status,
                        order_status = applied.order.status.as_str(),
                        "Order reconciled"
                    ),
                    Transition::Unchanged => {
                        debug!(%order_number, "Order already reconciled, nothing to do")
                    }
                    Transition::Stale => warn!(
                        %order_number,
                        current = %applied.order.payment_status,
                        reported = %update.payment_status,
                        "Ignoring stale or superseded payment update"
                    ),
                }
                return Ok(Reconciliation {
                    order: applied.order,
                    outcome: applied.transition,
                });
            }

            if attempt < attempts {
                debug!(%order_number, attempt, ?backoff, "Order not visible yet, retrying");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
        }

        warn!(%order_number, "No order matches payment reference");
        Err(PaymentError::OrderNotFound {
            order_number: order_number.to_string(),
        })
    }
}
