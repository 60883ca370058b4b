use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: i64,
    pub orders: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformTotals {
    pub students: i64,
    pub active_subscribers: i64,
    pub students_in_trial: i64,
    pub courses: i64,
    pub topics: i64,
    pub paid_orders: i64,
    pub total_revenue: i64,
}

async fn count(db: &SqlitePool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(sql).fetch_one(db).await
}

/// `trial_cutoff` is the signup instant before which the trial has ended.
pub async fn platform_totals(
    db: &SqlitePool,
    now: DateTime<Utc>,
    trial_cutoff: DateTime<Utc>,
) -> Result<PlatformTotals, sqlx::Error> {
    let students = count(db, "SELECT COUNT(*) FROM users").await?;
    let courses = count(db, "SELECT COUNT(*) FROM courses").await?;
    let topics = count(db, "SELECT COUNT(*) FROM topics").await?;
    let paid_orders = count(db, "SELECT COUNT(*) FROM orders WHERE status = 'paid'").await?;
    let total_revenue = count(
        db,
        "SELECT COALESCE(SUM(amount), 0) FROM orders WHERE status = 'paid'",
    )
    .await?;

    let windows: Vec<(bool, Option<DateTime<Utc>>, DateTime<Utc>)> = sqlx::query_as(
        "SELECT subscription_active, subscription_end_date, created_at FROM users",
    )
    .fetch_all(db)
    .await?;

    let mut active_subscribers = 0;
    let mut students_in_trial = 0;
    for (active, end, created_at) in windows {
        if active && end.is_some_and(|end| end > now) {
            active_subscribers += 1;
        } else if created_at > trial_cutoff {
            students_in_trial += 1;
        }
    }

    Ok(PlatformTotals {
        students,
        active_subscribers,
        students_in_trial,
        courses,
        topics,
        paid_orders,
        total_revenue,
    })
}

/// Paid revenue grouped by payment month, newest first, at most `months` rows.
pub async fn monthly_revenue(
    db: &SqlitePool,
    months: i64,
) -> Result<Vec<MonthlyRevenue>, sqlx::Error> {
    sqlx::query_as::<_, MonthlyRevenue>(
        r#"
        SELECT
            substr(paid_at, 1, 7) AS month,
            SUM(amount) AS revenue,
            COUNT(*) AS orders
        FROM orders
        WHERE status = 'paid' AND paid_at IS NOT NULL
        GROUP BY month
        ORDER BY month DESC
        LIMIT ?
        "#,
    )
    .bind(months)
    .fetch_all(db)
    .await
}
