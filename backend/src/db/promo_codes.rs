use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{NewPromoCodeRequest, PromoCode, UpdatePromoCodeRequest};

const PROMO_COLUMNS: &str =
    "id, code, discount_percent, max_uses, used_count, expires_at, is_active, created_at";

pub async fn fetch_promo_codes(db: &SqlitePool) -> Result<Vec<PromoCode>, sqlx::Error> {
    sqlx::query_as::<_, PromoCode>(&format!(
        "SELECT {PROMO_COLUMNS} FROM promo_codes ORDER BY created_at DESC"
    ))
    .fetch_all(db)
    .await
}

pub async fn find_promo_by_code(
    db: &SqlitePool,
    code: &str,
) -> Result<Option<PromoCode>, sqlx::Error> {
    sqlx::query_as::<_, PromoCode>(&format!("SELECT {PROMO_COLUMNS} FROM promo_codes WHERE code = ?"))
        .bind(code)
        .fetch_optional(db)
        .await
}

pub async fn find_promo_by_id(db: &SqlitePool, id: &str) -> Result<Option<PromoCode>, sqlx::Error> {
    sqlx::query_as::<_, PromoCode>(&format!("SELECT {PROMO_COLUMNS} FROM promo_codes WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// `req.code` is stored as given; callers normalise it first.
pub async fn insert_promo_code(
    db: &SqlitePool,
    req: NewPromoCodeRequest,
) -> Result<PromoCode, sqlx::Error> {
    let promo = PromoCode {
        id: Uuid::new_v4().to_string(),
        code: req.code,
        discount_percent: req.discount_percent,
        max_uses: req.max_uses,
        used_count: 0,
        expires_at: req.expires_at,
        is_active: req.is_active,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO promo_codes
            (id, code, discount_percent, max_uses, used_count, expires_at, is_active, created_at)
        VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)
        "#,
    )
    .bind(&promo.id)
    .bind(&promo.code)
    .bind(promo.discount_percent)
    .bind(promo.max_uses)
    .bind(promo.expires_at)
    .bind(promo.is_active)
    .bind(promo.created_at)
    .execute(db)
    .await?;

    Ok(promo)
}

pub async fn update_promo_code(
    db: &SqlitePool,
    id: &str,
    req: UpdatePromoCodeRequest,
) -> Result<Option<PromoCode>, sqlx::Error> {
    let mut current = match find_promo_by_id(db, id).await? {
        Some(p) => p,
        None => return Ok(None),
    };

    if let Some(percent) = req.discount_percent {
        current.discount_percent = percent;
    }
    if let Some(max_uses) = req.max_uses {
        current.max_uses = Some(max_uses);
    }
    if let Some(expires_at) = req.expires_at {
        current.expires_at = Some(expires_at);
    }
    if let Some(is_active) = req.is_active {
        current.is_active = is_active;
    }

    sqlx::query(
        r#"
        UPDATE promo_codes
        SET discount_percent = ?1,
            max_uses = ?2,
            expires_at = ?3,
            is_active = ?4
        WHERE id = ?5
        "#,
    )
    .bind(current.discount_percent)
    .bind(current.max_uses)
    .bind(current.expires_at)
    .bind(current.is_active)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn delete_promo_code(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM promo_codes WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}
