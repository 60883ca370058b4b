use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{courses, orders};
use crate::error::AppError;
use crate::models::{
    CheckoutResponse, CreateOrderRequest, Order, OrderKind, OrderStatus, VerifyPaymentRequest,
};
use crate::payment::{MIN_CHARGE, PaymentGateway, dto, signature};
use crate::services::promo::{self, Pricing};
use crate::services::subscription::subscription_window;

pub struct PaymentService {
    db: SqlitePool,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<Config>,
}

/// What a webhook delivery led to. The HTTP response is the same either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Fulfilled(String),
    MarkedFailed(String),
    AlreadyProcessed(String),
    Ignored(String),
    Rejected(String),
}

impl PaymentService {
    pub fn new(db: SqlitePool, gateway: Arc<dyn PaymentGateway>, config: Arc<Config>) -> Self {
        Self {
            db,
            gateway,
            config,
        }
    }

    /// Price of what `req` asks to buy, before any promo code.
    async fn list_price(
        &self,
        user_id: &str,
        req: &CreateOrderRequest,
    ) -> Result<(OrderKind, i64), AppError> {
        let Some(course_id) = req.course_id.as_deref() else {
            return Ok((OrderKind::Subscription, self.config.subscription_price));
        };

        let course = courses::find_course_by_id(&self.db, course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course"))?;
        if course.is_free {
            return Err(AppError::BadRequest(
                "Free courses cannot be purchased".to_string(),
            ));
        }
        if course.price <= 0 {
            return Err(AppError::BadRequest("Course has no price set".to_string()));
        }

        let purchased = orders::purchased_course_ids(&self.db, user_id).await?;
        if purchased.iter().any(|id| id == course_id) {
            return Err(AppError::Conflict("Course already purchased".to_string()));
        }

        Ok((OrderKind::Course, course.price))
    }

    /// Pricing preview for a promo code, without creating anything.
    pub async fn quote(
        &self,
        user_id: &str,
        req: &CreateOrderRequest,
    ) -> Result<Pricing, AppError> {
        let (_, amount) = self.list_price(user_id, req).await?;
        promo::price_with_code(&self.db, amount, req.promo_code.as_deref()).await
    }

    pub async fn checkout(
        &self,
        user_id: &str,
        req: CreateOrderRequest,
    ) -> Result<CheckoutResponse, AppError> {
        let (kind, amount) = self.list_price(user_id, &req).await?;
        let mut pricing = promo::price_with_code(&self.db, amount, req.promo_code.as_deref()).await?;

        // Amounts the gateway cannot charge are waived.
        let waived = pricing.amount < MIN_CHARGE;
        if waived {
            pricing.discount = pricing.original_amount;
            pricing.amount = 0;
        }

        let order_id = orders::new_order_id();
        let new_order = orders::NewOrder {
            user_id: user_id.to_string(),
            kind,
            course_id: req.course_id.clone(),
            amount: pricing.amount,
            original_amount: pricing.original_amount,
            discount: pricing.discount,
            promo_code: pricing.promo_code.clone(),
        };

        let order = if waived {
            let order = orders::insert_order(&self.db, order_id, new_order, None).await?;
            info!("order {} fully discounted, fulfilling without gateway", order.id);
            self.fulfil(&order, None).await?
        } else {
            let gateway_order = self
                .gateway
                .create_order(pricing.amount, &self.config.currency, &order_id)
                .await?;
            let order =
                orders::insert_order(&self.db, order_id, new_order, Some(gateway_order.id)).await?;
            info!(
                "order {} created for user {} ({:?}, amount {})",
                order.id, user_id, order.kind, order.amount
            );
            order
        };

        Ok(CheckoutResponse {
            order_id: order.id,
            gateway_order_id: order.gateway_order_id,
            amount: order.amount,
            original_amount: order.original_amount,
            discount: order.discount,
            currency: self.config.currency.clone(),
            key_id: self.config.razorpay.key_id.clone(),
            status: order.status,
        })
    }

    /// Checkout callback from the client after the gateway collected payment.
    pub async fn verify(&self, user_id: &str, req: VerifyPaymentRequest) -> Result<Order, AppError> {
        let order = orders::find_order_by_gateway_id(&self.db, &req.gateway_order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Order"))?;

        let valid = signature::verify_payment(
            &self.config.razorpay.key_secret,
            &req.gateway_order_id,
            &req.gateway_payment_id,
            &req.signature,
        );
        if !valid {
            warn!("payment signature mismatch for order {}", order.id);
            orders::mark_order_failed(&self.db, &order.id).await?;
            return Err(AppError::BadRequest("Invalid payment signature".to_string()));
        }

        if order.status == OrderStatus::Paid {
            return Ok(order);
        }

        self.fulfil(&order, Some(&req.gateway_payment_id)).await
    }

    /// Marks the order paid and grants what it bought, atomically.
    /// A second call for the same order is a no-op returning the stored row.
    pub async fn fulfil(&self, order: &Order, payment_id: Option<&str>) -> Result<Order, AppError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let claimed = sqlx::query(
            "UPDATE orders SET status = 'paid', gateway_payment_id = ?1, paid_at = ?2, updated_at = ?2 \
             WHERE id = ?3 AND status != 'paid'",
        )
        .bind(payment_id)
        .bind(now)
        .bind(&order.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return self.reload(&order.id).await;
        }

        match order.kind {
            OrderKind::Subscription => {
                let current: Option<(bool, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> =
                    sqlx::query_as(
                        "SELECT subscription_active, subscription_start_date, subscription_end_date \
                         FROM users WHERE id = ?",
                    )
                    .bind(&order.user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                let (active, current_start, current_end) =
                    current.ok_or_else(|| AppError::not_found("User"))?;

                let running_end = current_end.filter(|end| active && *end > now);
                let (start, end) = subscription_window(running_end, now);
                let user_start = match running_end {
                    Some(_) => current_start.unwrap_or(start),
                    None => start,
                };

                sqlx::query(
                    "UPDATE orders SET subscription_start_date = ?1, subscription_end_date = ?2 WHERE id = ?3",
                )
                .bind(start)
                .bind(end)
                .bind(&order.id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    UPDATE users
                    SET subscription_active = 1,
                        subscription_start_date = ?1,
                        subscription_end_date = ?2,
                        updated_at = ?3
                    WHERE id = ?4
                    "#,
                )
                .bind(user_start)
                .bind(end)
                .bind(now)
                .bind(&order.user_id)
                .execute(&mut *tx)
                .await?;

                info!("subscription for user {} active until {}", order.user_id, end);
            }
            OrderKind::Course => {
                let course_id = order
                    .course_id
                    .as_deref()
                    .ok_or_else(|| AppError::internal(format!("course order {} has no course", order.id)))?;

                let course_exists: Option<(String,)> = sqlx::query_as("SELECT id FROM courses WHERE id = ?")
                    .bind(course_id)
                    .fetch_optional(&mut *tx)
                    .await?;

                // The captured payment is still recorded when the course was deleted after checkout.
                if course_exists.is_none() {
                    warn!(
                        "course {} for order {} no longer exists; recording payment without enrollment",
                        course_id, order.id
                    );
                } else {
                    sqlx::query(
                        r#"
                        INSERT INTO enrollments (id, user_id, course_id, status, created_at)
                        VALUES (?1, ?2, ?3, 'active', ?4)
                        ON CONFLICT (user_id, course_id) DO UPDATE SET status = 'active'
                        "#,
                    )
                    .bind(uuid::Uuid::new_v4().to_string())
                    .bind(&order.user_id)
                    .bind(course_id)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;

                    info!("user {} enrolled in purchased course {}", order.user_id, course_id);
                }
            }
        }

        if let Some(code) = &order.promo_code {
            sqlx::query("UPDATE promo_codes SET used_count = used_count + 1 WHERE code = ?")
                .bind(code)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!("order {} paid", order.id);

        self.reload(&order.id).await
    }

    async fn reload(&self, order_id: &str) -> Result<Order, AppError> {
        orders::find_order_by_id(&self.db, order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))
    }

    /// Processes a gateway webhook delivery. Callers acknowledge the
    /// delivery regardless of the result.
    pub async fn handle_webhook(
        &self,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, AppError> {
        let Some(sig) = signature_header else {
            return Ok(WebhookOutcome::Rejected("missing signature".to_string()));
        };
        if !signature::verify_webhook(&self.config.razorpay.webhook_secret, body, sig) {
            return Ok(WebhookOutcome::Rejected("signature mismatch".to_string()));
        }

        let event: dto::WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("unparsable webhook body: {}", e)))?;

        let Some(gateway_order_id) = event.gateway_order_id() else {
            return Ok(WebhookOutcome::Ignored(format!("{} without order", event.event)));
        };

        let Some(order) = orders::find_order_by_gateway_id(&self.db, gateway_order_id).await? else {
            return Ok(WebhookOutcome::Ignored(format!("unknown order {}", gateway_order_id)));
        };

        match event.event.as_str() {
            "payment.captured" | "order.paid" => {
                if order.status == OrderStatus::Paid {
                    return Ok(WebhookOutcome::AlreadyProcessed(order.id));
                }
                let paid = self.fulfil(&order, event.payment_id()).await?;
                Ok(WebhookOutcome::Fulfilled(paid.id))
            }
            "payment.failed" => {
                if orders::mark_order_failed(&self.db, &order.id).await? {
                    Ok(WebhookOutcome::MarkedFailed(order.id))
                } else {
                    Ok(WebhookOutcome::AlreadyProcessed(order.id))
                }
            }
            other => Ok(WebhookOutcome::Ignored(format!("event {}", other))),
        }
    }
}
