pub mod dto;
pub mod signature;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;

use crate::config::RazorpayConfig;
use crate::error::AppError;

/// Smallest amount, in minor units, the gateway accepts for an order.
pub const MIN_CHARGE: i64 = 100;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<dto::GatewayOrder, AppError>;
}

pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<dto::GatewayOrder, AppError> {
        let url = format!("{}/orders", self.config.api_base.trim_end_matches('/'));

        let body = dto::CreateOrderBody {
            amount,
            currency,
            receipt,
            notes: serde_json::json!({ "receipt": receipt }),
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("Razorpay API error {}: {}", status, body)));
        }

        let order = response
            .json::<dto::GatewayOrder>()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse Razorpay response: {}", e)))?;

        tracing::info!("gateway order {} created for receipt {}", order.id, receipt);
        Ok(order)
    }
}

/// In-process gateway that hands out sequential `order_mock_N` ids.
#[derive(Default)]
pub struct MockPaymentGateway {
    issued: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders_created(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        _receipt: &str,
    ) -> Result<dto::GatewayOrder, AppError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(dto::GatewayOrder {
            id: format!("order_mock_{}", n),
            amount,
            currency: currency.to_string(),
            status: Some("created".to_string()),
        })
    }
}
