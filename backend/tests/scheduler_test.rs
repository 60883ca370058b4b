use chrono::{Duration, Utc};
use edustream::db::orders::{self, NewOrder};
use edustream::db::{connect_in_memory, users};
use edustream::models::{OrderKind, OrderStatus};
use edustream::services::{ExpiryScheduler, SweepStats};
use sqlx::SqlitePool;

async fn seed_user(pool: &SqlitePool, email: &str) -> String {
    users::insert_user(
        pool,
        users::NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            name: "Sweep".to_string(),
            phone: None,
            class: None,
        },
    )
    .await
    .expect("Failed to insert user")
    .id
}

async fn seed_order(pool: &SqlitePool, user_id: &str) -> String {
    orders::insert_order(
        pool,
        orders::new_order_id(),
        NewOrder {
            user_id: user_id.to_string(),
            kind: OrderKind::Subscription,
            course_id: None,
            amount: 99900,
            original_amount: 99900,
            discount: 0,
            promo_code: None,
        },
        Some(format!("order_{}", user_id)),
    )
    .await
    .expect("Failed to insert order")
    .id
}

#[tokio::test]
async fn test_sweep_with_nothing_to_do() {
    let pool = connect_in_memory().await.expect("Failed to create database");
    let scheduler = ExpiryScheduler::new(pool, 10);

    let stats = scheduler.sweep(Utc::now()).await.expect("sweep");
    assert_eq!(stats, SweepStats::default());
}

#[tokio::test]
async fn test_sweep_expires_subscriptions_and_stale_orders() {
    let pool = connect_in_memory().await.expect("Failed to create database");
    let now = Utc::now();

    let lapsed = seed_user(&pool, "lapsed@example.com").await;
    let current = seed_user(&pool, "current@example.com").await;
    users::set_subscription(&pool, &lapsed, true, Some(now - Duration::days(366)), Some(now - Duration::days(1)))
        .await
        .expect("set");
    users::set_subscription(&pool, &current, true, Some(now), Some(now + Duration::days(200)))
        .await
        .expect("set");

    let order_id = seed_order(&pool, &current).await;

    let scheduler = ExpiryScheduler::new(pool.clone(), 10);

    // Order is fresh at `now`.
    let stats = scheduler.sweep(now).await.expect("sweep");
    assert_eq!(stats.subscriptions_expired, 1);
    assert_eq!(stats.orders_failed, 0);

    let later = now + Duration::hours(25);
    let stats = scheduler.sweep(later).await.expect("sweep");
    assert_eq!(stats.subscriptions_expired, 0);
    assert_eq!(stats.orders_failed, 1);

    let lapsed_user = users::find_user_by_id(&pool, &lapsed).await.expect("q").expect("user");
    assert!(!lapsed_user.subscription_active);
    let current_user = users::find_user_by_id(&pool, &current).await.expect("q").expect("user");
    assert!(current_user.subscription_active);

    let order = orders::find_order_by_id(&pool, &order_id).await.expect("q").expect("order");
    assert_eq!(order.status, OrderStatus::Failed);
}

#[tokio::test]
async fn test_scheduler_loop_can_be_cancelled() {
    let pool = connect_in_memory().await.expect("Failed to create database");
    let scheduler = ExpiryScheduler::new(pool, 1);

    let handle = tokio::spawn(scheduler.start());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handle.abort();

    assert!(handle.await.unwrap_err().is_cancelled());
}
