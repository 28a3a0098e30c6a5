//! # PostgREST Order Store
//!
//! `OrderStore` over Supabase's REST interface. Updates are compare-and-set:
//! the PATCH is filtered on the payment columns that were read, so a write
//! that raced with another one matches no row and is retried from a fresh read.

use crate::config::SupabaseConfig;
use crate::row::{payment_status_to_db, OrderRow, PaymentColumns, PreferenceColumns};
use async_trait::async_trait;
use pay_core::{
    AppliedUpdate, Currency, Order, OrderNumber, OrderStore, PaymentError, PaymentResult,
    PaymentUpdate, Transition,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, instrument, warn};

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Orders persisted in the Supabase `pedidos` table
pub struct SupabaseOrderStore {
    config: SupabaseConfig,
    client: Client,
    currency: Currency,
}

impl SupabaseOrderStore {
    pub fn new(config: SupabaseConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            currency: Currency::default(),
        })
    }

    /// Builder: currency amounts are stored in
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.service_key)
            .header("Authorization", format!("Bearer {}", self.config.service_key))
    }

    async fn rows(&self, response: Response) -> PaymentResult<Vec<OrderRow>> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(PaymentError::Persistence(format!(
                "PostgREST returned {}: {}",
                status, text
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| PaymentError::Persistence(format!("Unexpected row shape: {}", e)))
    }

    fn first_order(&self, rows: Vec<OrderRow>) -> PaymentResult<Option<Order>> {
        rows.into_iter()
            .next()
            .map(|row| row.into_order(self.currency))
            .transpose()
    }

    /// PATCH the row only if its payment columns still hold what `read` saw
    async fn patch_if_unchanged<B: Serialize>(
        &self,
        read: &Order,
        body: &B,
    ) -> PaymentResult<Option<Order>> {
        let payment_filter = match read.payment_id.as_deref() {
            Some(id) => format!("eq.{}", id),
            None => "is.null".to_string(),
        };

        let response = self
            .authorized(self.client.patch(self.config.table_url()))
            .header("Prefer", "return=representation")
            .query(&[
                ("numero_orden", format!("eq.{}", read.order_number)),
                (
                    "estado_pago",
                    format!("eq.{}", payment_status_to_db(read.payment_status)),
                ),
                ("mp_payment_id", payment_filter),
            ])
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let rows = self.rows(response).await?;
        self.first_order(rows)
    }
}

#[async_trait]
impl OrderStore for SupabaseOrderStore {
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    async fn insert(&self, order: Order) -> PaymentResult<Order> {
        let response = self
            .authorized(self.client.post(self.config.table_url()))
            .header("Prefer", "return=representation")
            .json(&OrderRow::from(&order))
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(PaymentError::Persistence(format!(
                "order {} already exists",
                order.order_number
            )));
        }

        let rows = self.rows(response).await?;
        debug!("Inserted order row");
        Ok(self.first_order(rows)?.unwrap_or(order))
    }

    #[instrument(skip(self))]
    async fn find(&self, order_number: OrderNumber) -> PaymentResult<Option<Order>> {
        let response = self
            .authorized(self.client.get(self.config.table_url()))
            .query(&[
                ("numero_orden", format!("eq.{}", order_number)),
                ("select", "*".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let rows = self.rows(response).await?;
        self.first_order(rows)
    }

    #[instrument(skip(self))]
    async fn attach_preference(
        &self,
        order_number: OrderNumber,
        preference_id: &str,
    ) -> PaymentResult<Option<Order>> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(read) = self.find(order_number).await? else {
                return Ok(None);
            };

            let mut next = read.clone();
            if !next.attach_preference(preference_id) {
                debug!("preference not attached, payment already final");
                return Ok(Some(read));
            }

            if let Some(written) = self
                .patch_if_unchanged(&read, &PreferenceColumns::from(&next))
                .await?
            {
                return Ok(Some(written));
            }
            warn!(attempt, "Concurrent write on order, retrying");
        }

        Err(PaymentError::Persistence(format!(
            "order {} kept changing while attaching preference",
            order_number
        )))
    }

    #[instrument(skip(self, update), fields(payment_id = %update.payment_id))]
    async fn apply_payment_update(
        &self,
        order_number: OrderNumber,
        update: &PaymentUpdate,
    ) -> PaymentResult<Option<AppliedUpdate>> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let Some(read) = self.find(order_number).await? else {
                return Ok(None);
            };

            let mut next = read.clone();
            let transition = next.apply_payment_update(update);
            if transition != Transition::Applied {
                return Ok(Some(AppliedUpdate {
                    order: read,
                    transition,
                }));
            }

            if let Some(written) = self
                .patch_if_unchanged(&read, &PaymentColumns::from(&next))
                .await?
            {
                return Ok(Some(AppliedUpdate {
                    order: written,
                    transition,
                }));
            }
            warn!(attempt, "Concurrent write on order, retrying");
        }

        Err(PaymentError::Persistence(format!(
            "order {} kept changing while applying payment",
            order_number
        )))
    }
}
