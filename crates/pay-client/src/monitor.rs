//! # Order Monitor
//!
//! Polls an order until its payment settles, then reports once.

use crate::api::BoxedStorefrontApi;
use pay_core::{OrderNumber, OrderStatusView, PaymentStatus};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a monitored order ended up
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    Success(OrderStatusView),
    Failure(OrderStatusView),
    /// Cancelled at the gateway, or the monitor was stopped
    Cancelled,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Hard ceiling on the whole watch
    pub timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

pub struct OrderMonitor {
    api: BoxedStorefrontApi,
    config: MonitorConfig,
}

impl OrderMonitor {
    pub fn new(api: BoxedStorefrontApi) -> Self {
        Self {
            api,
            config: MonitorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Start watching `order_number`.
    ///
    /// `on_finish` runs exactly once. Stopping or dropping the handle reports
    /// [`MonitorOutcome::Cancelled`].
    pub fn start<F>(&self, order_number: OrderNumber, on_finish: F) -> MonitorHandle
    where
        F: FnOnce(MonitorOutcome) + Send + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let api = self.api.clone();
        let config = self.config;

        let task = tokio::spawn(async move {
            let outcome = watch(api, order_number, config, stop_rx).await;
            info!(%order_number, ?outcome, "Order monitor finished");
            on_finish(outcome);
        });

        MonitorHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

async fn watch(
    api: BoxedStorefrontApi,
    order_number: OrderNumber,
    config: MonitorConfig,
    mut stop: oneshot::Receiver<()>,
) -> MonitorOutcome {
    let deadline = tokio::time::sleep(config.timeout);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(config.interval);

    loop {
        tokio::select! {
            biased;

            // Resolves on an explicit stop and when the sender is dropped
            _ = &mut stop => return MonitorOutcome::Cancelled,
            _ = &mut deadline => {
                warn!(%order_number, "Gave up waiting for payment");
                return MonitorOutcome::Timeout;
            }
            _ = ticker.tick() => {
                match api.order_status(order_number).await {
                    Ok(Some(view)) => match view.payment_status {
                        PaymentStatus::Approved => return MonitorOutcome::Success(view),
                        PaymentStatus::Rejected | PaymentStatus::Refunded => {
                            return MonitorOutcome::Failure(view)
                        }
                        PaymentStatus::Cancelled => return MonitorOutcome::Cancelled,
                        status => debug!(%order_number, %status, "Payment not settled yet"),
                    },
                    Ok(None) => debug!(%order_number, "Order not visible yet"),
                    Err(e) => warn!(%order_number, "Order lookup failed: {}", e),
                }
            }
        }
    }
}

/// Running monitor. Dropping it cancels the watch.
pub struct MonitorHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Cancel the watch and wait for the callback to run
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.join().await;
    }

    /// Wait for the watch to end on its own
    pub async fn finished(mut self) {
        self.join().await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    async fn join(&mut self) {
        if let Err(e) = (&mut self.task).await {
            warn!("Order monitor task failed: {}", e);
        }
    }
}
