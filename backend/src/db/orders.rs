use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Order, OrderKind, OrderStatus};

const ORDER_COLUMNS: &str = "id, user_id, kind, course_id, amount, original_amount, discount, \
     promo_code, status, gateway_order_id, gateway_payment_id, paid_at, subscription_start_date, \
     subscription_end_date, created_at, updated_at";

pub struct NewOrder {
    pub user_id: String,
    pub kind: OrderKind,
    pub course_id: Option<String>,
    pub amount: i64,
    pub original_amount: i64,
    pub discount: i64,
    pub promo_code: Option<String>,
}

/// Local order id, generated before the gateway order so it can serve as the receipt.
pub fn new_order_id() -> String {
    Uuid::new_v4().to_string()
}

pub async fn insert_order(
    db: &SqlitePool,
    id: String,
    new: NewOrder,
    gateway_order_id: Option<String>,
) -> Result<Order, sqlx::Error> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO orders
            (id, user_id, kind, course_id, amount, original_amount, discount, promo_code,
            status, gateway_order_id, gateway_payment_id, paid_at, subscription_start_date,
            subscription_end_date, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'created', ?9, NULL, NULL, NULL, NULL, ?10, ?10)
        "#,
    )
    .bind(&id)
    .bind(&new.user_id)
    .bind(new.kind)
    .bind(&new.course_id)
    .bind(new.amount)
    .bind(new.original_amount)
    .bind(new.discount)
    .bind(&new.promo_code)
    .bind(&gateway_order_id)
    .bind(now)
    .execute(db)
    .await?;

    Ok(Order {
        id,
        user_id: new.user_id,
        kind: new.kind,
        course_id: new.course_id,
        amount: new.amount,
        original_amount: new.original_amount,
        discount: new.discount,
        promo_code: new.promo_code,
        status: OrderStatus::Created,
        gateway_order_id,
        gateway_payment_id: None,
        paid_at: None,
        subscription_start_date: None,
        subscription_end_date: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_order_by_id(db: &SqlitePool, id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_order_by_gateway_id(
    db: &SqlitePool,
    gateway_order_id: &str,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE gateway_order_id = ?"
    ))
    .bind(gateway_order_id)
    .fetch_optional(db)
    .await
}

pub async fn fetch_orders_for_user(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn fetch_orders(
    db: &SqlitePool,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as::<_, Order>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE status = ? ORDER BY created_at DESC"
            ))
            .bind(status)
            .fetch_all(db)
            .await
        }
        None => {
            sqlx::query_as::<_, Order>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
            ))
            .fetch_all(db)
            .await
        }
    }
}

/// Most recent paid subscription order, by end date.
pub async fn latest_paid_subscription(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Option<Order>, sqlx::Error> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE user_id = ? AND kind = 'subscription' AND status = 'paid' \
         AND subscription_end_date IS NOT NULL"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(orders
        .into_iter()
        .max_by_key(|o| o.subscription_end_date))
}

/// Course ids the user has bought outright.
pub async fn purchased_course_ids(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT DISTINCT course_id FROM orders \
         WHERE user_id = ? AND kind = 'course' AND status = 'paid' AND course_id IS NOT NULL",
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}

/// Marks a not-yet-paid order as failed. Paid orders are never downgraded.
pub async fn mark_order_failed(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'failed', updated_at = ?1 WHERE id = ?2 AND status != 'paid'",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Fails `created` orders older than `cutoff`; returns how many changed.
pub async fn fail_stale_orders(
    db: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let stale: Vec<Order> = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE status = 'created'"
    ))
    .fetch_all(db)
    .await?;

    let mut failed = 0;
    for order in stale.into_iter().filter(|o| o.created_at < cutoff) {
        if mark_order_failed(db, &order.id).await? {
            failed += 1;
        }
    }

    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect_in_memory, users};
    use chrono::Duration;

    async fn seed_user(pool: &SqlitePool) -> String {
        users::insert_user(
            pool,
            users::NewUser {
                email: "buyer@example.com".to_string(),
                password_hash: "hash".to_string(),
                name: "Buyer".to_string(),
                phone: None,
                class: None,
            },
        )
        .await
        .expect("Failed to insert user")
        .id
    }

    fn subscription_order(user_id: &str) -> NewOrder {
        NewOrder {
            user_id: user_id.to_string(),
            kind: OrderKind::Subscription,
            course_id: None,
            amount: 79920,
            original_amount: 99900,
            discount: 19980,
            promo_code: Some("SAVE20".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_order() {
        let pool = connect_in_memory().await.expect("db");
        let user_id = seed_user(&pool).await;

        let order = insert_order(
            &pool,
            new_order_id(),
            subscription_order(&user_id),
            Some("order_abc".to_string()),
        )
        .await
        .expect("insert");
        assert_eq!(order.status, OrderStatus::Created);

        let by_gateway = find_order_by_gateway_id(&pool, "order_abc")
            .await
            .expect("q")
            .expect("order missing");
        assert_eq!(by_gateway.id, order.id);
        assert_eq!(by_gateway.kind, OrderKind::Subscription);
        assert_eq!(by_gateway.discount, 19980);

        let mine = fetch_orders_for_user(&pool, &user_id).await.expect("fetch");
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_failed_never_downgrades_paid() {
        let pool = connect_in_memory().await.expect("db");
        let user_id = seed_user(&pool).await;
        let order = insert_order(&pool, new_order_id(), subscription_order(&user_id), None)
            .await
            .expect("insert");

        sqlx::query("UPDATE orders SET status = 'paid' WHERE id = ?")
            .bind(&order.id)
            .execute(&pool)
            .await
            .expect("update");

        assert!(!mark_order_failed(&pool, &order.id).await.expect("mark"));
        let reloaded = find_order_by_id(&pool, &order.id).await.expect("q").expect("order");
        assert_eq!(reloaded.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_fail_stale_orders() {
        let pool = connect_in_memory().await.expect("db");
        let user_id = seed_user(&pool).await;
        insert_order(&pool, new_order_id(), subscription_order(&user_id), None)
            .await
            .expect("insert");

        let none = fail_stale_orders(&pool, Utc::now() - Duration::hours(24))
            .await
            .expect("sweep");
        assert_eq!(none, 0);

        let all = fail_stale_orders(&pool, Utc::now() + Duration::seconds(1))
            .await
            .expect("sweep");
        assert_eq!(all, 1);
        let failed = fetch_orders(&pool, Some(OrderStatus::Failed)).await.expect("fetch");
        assert_eq!(failed.len(), 1);
    }
}
