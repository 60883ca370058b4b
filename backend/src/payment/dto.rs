use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct CreateOrderBody<'a> {
    pub amount: i64,
    pub currency: &'a str,
    pub receipt: &'a str,
    pub notes: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<Entity<PaymentEntity>>,
    #[serde(default)]
    pub order: Option<Entity<OrderEntity>>,
}

#[derive(Debug, Deserialize)]
pub struct Entity<T> {
    pub entity: T,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderEntity {
    pub id: String,
}

impl WebhookEvent {
    /// Gateway order id the event refers to, from the order or the payment entity.
    pub fn gateway_order_id(&self) -> Option<&str> {
        self.payload
            .order
            .as_ref()
            .map(|o| o.entity.id.as_str())
            .or_else(|| {
                self.payload
                    .payment
                    .as_ref()
                    .and_then(|p| p.entity.order_id.as_deref())
            })
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.payload.payment.as_ref().map(|p| p.entity.id.as_str())
    }
}
