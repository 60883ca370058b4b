use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use tracing::{error, info, warn};

use super::{ApiJson, ApiResponse, acknowledged};
use crate::auth::StudentAuth;
use crate::db::orders;
use crate::error::AppError;
use crate::models::{
    CheckoutResponse, CreateOrderRequest, Order, ValidatePromoRequest, VerifyPaymentRequest,
};
use crate::services::promo::Pricing;
use crate::services::{PaymentService, WebhookOutcome};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

fn payment_service(state: &AppState) -> PaymentService {
    PaymentService::new(state.db.clone(), state.gateway.clone(), state.config.clone())
}

pub async fn validate_promo(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
    ApiJson(req): ApiJson<ValidatePromoRequest>,
) -> Result<ApiResponse<Pricing>, AppError> {
    let quote = payment_service(&state)
        .quote(
            &claims.sub,
            &CreateOrderRequest {
                course_id: req.course_id,
                promo_code: Some(req.code),
            },
        )
        .await?;
    Ok(ApiResponse::with_message(quote, "Promo code applied"))
}

pub async fn create_order(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let checkout = payment_service(&state).checkout(&claims.sub, req).await?;
    Ok((StatusCode::CREATED, ApiResponse::<CheckoutResponse>::ok(checkout)))
}

pub async fn my_orders(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
) -> Result<ApiResponse<Vec<Order>>, AppError> {
    Ok(ApiResponse::ok(
        orders::fetch_orders_for_user(&state.db, &claims.sub).await?,
    ))
}

pub async fn verify(
    State(state): State<AppState>,
    StudentAuth(claims): StudentAuth,
    ApiJson(req): ApiJson<VerifyPaymentRequest>,
) -> Result<ApiResponse<Order>, AppError> {
    let order = payment_service(&state).verify(&claims.sub, req).await?;
    Ok(ApiResponse::with_message(order, "Payment verified"))
}

/// Always acknowledges, so the gateway does not retry deliveries we reject.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResponse<()> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    match payment_service(&state).handle_webhook(signature, &body).await {
        Ok(WebhookOutcome::Rejected(reason)) => warn!("webhook rejected: {}", reason),
        Ok(WebhookOutcome::Ignored(reason)) => info!("webhook ignored: {}", reason),
        Ok(outcome) => info!("webhook processed: {:?}", outcome),
        Err(e) => error!("webhook processing failed: {}", e),
    }

    acknowledged("Webhook received")
}
