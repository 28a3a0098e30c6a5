//! # Popup Channel
//!
//! When checkout runs in a popup, the return page reports back to the opener
//! window and closes itself. Messages are origin-checked on both ends:
//! a port posts with a target origin, and a listener only accepts messages
//! sent from and addressed to its own origin.

use crate::flow::{ReturnPage, ReturnParams};
use pay_core::OrderNumber;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const POPUP_CLOSE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
    Pending,
}

impl From<ReturnPage> for OutcomeStatus {
    fn from(page: ReturnPage) -> Self {
        match page {
            ReturnPage::Success => OutcomeStatus::Success,
            ReturnPage::Failure => OutcomeStatus::Failure,
            ReturnPage::Pending => OutcomeStatus::Pending,
        }
    }
}

/// Payment result as reported to the opener window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub status: OutcomeStatus,
    #[serde(rename = "numeroOrden")]
    pub order_number: OrderNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,
}

impl PaymentOutcome {
    /// Outcome for a popup return page
    pub fn from_return(page: ReturnPage, order_number: OrderNumber, params: &ReturnParams) -> Self {
        let mut outcome = Self {
            status: page.into(),
            order_number,
            payment_id: None,
            external_reference: None,
            error: None,
            payment_type: None,
        };

        match page {
            ReturnPage::Success => {
                outcome.payment_id = params.payment_id.clone();
                outcome.external_reference = params.external_reference.clone();
            }
            ReturnPage::Failure => outcome.error = Some("Payment rejected".to_string()),
            ReturnPage::Pending => outcome.payment_type = params.payment_type.clone(),
        }
        outcome
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WindowMessage {
    #[serde(rename = "PAYMENT_RESULT")]
    PaymentResult(PaymentOutcome),
}

#[derive(Debug)]
struct Envelope {
    source_origin: String,
    target_origin: String,
    message: WindowMessage,
}

/// Connect a window at `origin` to its opener
pub fn window_channel(origin: impl Into<String>) -> (WindowPort, WindowListener) {
    let origin = origin.into();
    let (tx, rx) = mpsc::unbounded_channel();
    (
        WindowPort {
            origin: origin.clone(),
            tx,
        },
        WindowListener { origin, rx },
    )
}

/// Sending side, bound to the origin of the window that posts
#[derive(Debug, Clone)]
pub struct WindowPort {
    origin: String,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl WindowPort {
    /// The same opener, seen from a window at another origin
    pub fn with_origin(&self, origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            tx: self.tx.clone(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Post `message` to the opener. False when the opener is gone.
    pub fn post(&self, message: WindowMessage, target_origin: &str) -> bool {
        self.tx
            .send(Envelope {
                source_origin: self.origin.clone(),
                target_origin: target_origin.to_string(),
                message,
            })
            .is_ok()
    }
}

/// Receiving side in the opener window
#[derive(Debug)]
pub struct WindowListener {
    origin: String,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl WindowListener {
    /// Next accepted message; `None` once every port is dropped
    pub async fn recv(&mut self) -> Option<WindowMessage> {
        while let Some(envelope) = self.rx.recv().await {
            if envelope.source_origin != self.origin {
                warn!(source = %envelope.source_origin, "Dropping message from foreign origin");
                continue;
            }
            if envelope.target_origin != "*" && envelope.target_origin != self.origin {
                debug!(addressed_to = %envelope.target_origin, "Dropping message for another origin");
                continue;
            }
            return Some(envelope.message);
        }
        None
    }
}

/// Return-page side of a popup checkout
pub struct PopupBridge {
    port: WindowPort,
    close_delay: Duration,
}

impl PopupBridge {
    pub fn new(port: WindowPort) -> Self {
        Self {
            port,
            close_delay: POPUP_CLOSE_DELAY,
        }
    }

    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Post the outcome to the opener, then close after the delay.
    ///
    /// Returns whether the opener received it.
    pub async fn report<F: FnOnce()>(&self, outcome: PaymentOutcome, close: F) -> bool {
        let delivered = self
            .port
            .post(WindowMessage::PaymentResult(outcome), self.port.origin());
        if !delivered {
            warn!("Opener window is gone");
        }

        tokio::time::sleep(self.close_delay).await;
        close();
        delivered
    }
}
