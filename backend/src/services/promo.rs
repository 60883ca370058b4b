use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::promo_codes;
use crate::error::AppError;
use crate::models::{NewPromoCodeRequest, PromoCode, UpdatePromoCodeRequest};

/// Price breakdown for a checkout, in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pricing {
    pub original_amount: i64,
    pub discount: i64,
    pub amount: i64,
    pub promo_code: Option<String>,
    pub discount_percent: Option<i64>,
}

impl Pricing {
    pub fn full(amount: i64) -> Self {
        Self {
            original_amount: amount,
            discount: 0,
            amount,
            promo_code: None,
            discount_percent: None,
        }
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Returns `(discount, final_amount)`; the discount is rounded down.
pub fn apply_discount(amount: i64, percent: i64) -> (i64, i64) {
    let percent = percent.clamp(0, 100);
    let discount = amount * percent / 100;
    (discount, amount - discount)
}

pub fn check_usable(promo: &PromoCode, now: DateTime<Utc>) -> Result<(), AppError> {
    if !promo.is_active {
        return Err(AppError::BadRequest("Promo code is inactive".to_string()));
    }
    if promo.expires_at.is_some_and(|exp| exp <= now) {
        return Err(AppError::BadRequest("Promo code has expired".to_string()));
    }
    if promo.max_uses.is_some_and(|max| promo.used_count >= max) {
        return Err(AppError::BadRequest(
            "Promo code usage limit reached".to_string(),
        ));
    }
    Ok(())
}

pub fn price(amount: i64, promo: Option<&PromoCode>) -> Pricing {
    match promo {
        Some(p) => {
            let (discount, final_amount) = apply_discount(amount, p.discount_percent);
            Pricing {
                original_amount: amount,
                discount,
                amount: final_amount,
                promo_code: Some(p.code.clone()),
                discount_percent: Some(p.discount_percent),
            }
        }
        None => Pricing::full(amount),
    }
}

/// Looks up and checks `code` (if any) and prices `amount` with it.
pub async fn price_with_code(
    db: &SqlitePool,
    amount: i64,
    code: Option<&str>,
) -> Result<Pricing, AppError> {
    let Some(code) = code.map(normalize_code).filter(|c| !c.is_empty()) else {
        return Ok(Pricing::full(amount));
    };

    let promo = promo_codes::find_promo_by_code(db, &code)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid promo code".to_string()))?;

    if let Err(e) = check_usable(&promo, Utc::now()) {
        warn!("promo code {} rejected: {}", code, e);
        return Err(e);
    }

    Ok(price(amount, Some(&promo)))
}

fn check_percent(percent: i64) -> Result<(), AppError> {
    if !(1..=100).contains(&percent) {
        return Err(AppError::BadRequest(
            "discount_percent must be between 1 and 100".to_string(),
        ));
    }
    Ok(())
}

fn check_max_uses(max_uses: Option<i64>) -> Result<(), AppError> {
    if max_uses.is_some_and(|m| m < 1) {
        return Err(AppError::BadRequest("max_uses must be at least 1".to_string()));
    }
    Ok(())
}

pub async fn create_promo_code(
    db: &SqlitePool,
    mut req: NewPromoCodeRequest,
) -> Result<PromoCode, AppError> {
    req.code = normalize_code(&req.code);
    if req.code.is_empty() {
        return Err(AppError::BadRequest("code is required".to_string()));
    }
    check_percent(req.discount_percent)?;
    check_max_uses(req.max_uses)?;

    if promo_codes::find_promo_by_code(db, &req.code).await?.is_some() {
        return Err(AppError::Conflict(format!("Promo code {} already exists", req.code)));
    }

    Ok(promo_codes::insert_promo_code(db, req).await?)
}

pub async fn update_promo_code(
    db: &SqlitePool,
    id: &str,
    req: UpdatePromoCodeRequest,
) -> Result<PromoCode, AppError> {
    if let Some(percent) = req.discount_percent {
        check_percent(percent)?;
    }
    check_max_uses(req.max_uses)?;

    promo_codes::update_promo_code(db, id, req)
        .await?
        .ok_or_else(|| AppError::not_found("Promo code"))
}
