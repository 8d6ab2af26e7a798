//! Order collaborator interface.
//!
//! The payment core touches orders through exactly two operations: look up
//! the amount and description owed on an order, and mark an order paid
//! after a durable `Success` transition. Order internals stay opaque.

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderSummary {
    /// Major-currency amount owed on the order.
    pub amount: i64,
    pub description: String,
}

#[async_trait]
pub trait OrderService: Send + Sync {
    async fn order_summary(&self, order_id: &str)
        -> Result<Option<OrderSummary>, anyhow::Error>;

    async fn mark_order_paid(&self, order_id: &str) -> Result<(), anyhow::Error>;
}

/// HTTP client against the order service.
#[derive(Clone)]
pub struct HttpOrderService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderService {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl OrderService for HttpOrderService {
    async fn order_summary(
        &self,
        order_id: &str,
    ) -> Result<Option<OrderSummary>, anyhow::Error> {
        let url = format!("{}/orders/{}/summary", self.base_url, order_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("order service returned {} for order {}", status, order_id);
        }

        Ok(Some(response.json().await?))
    }

    async fn mark_order_paid(&self, order_id: &str) -> Result<(), anyhow::Error> {
        let url = format!("{}/orders/{}/paid", self.base_url, order_id);
        let response = self.client.post(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                order_id = %order_id,
                status = %status,
                body = %body,
                "order service rejected paid notification"
            );
            anyhow::bail!("order service returned {} marking order {} paid", status, order_id);
        }

        tracing::info!(order_id = %order_id, "order marked paid");
        Ok(())
    }
}
