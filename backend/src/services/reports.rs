use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::stats::{self, MonthlyRevenue, PlatformTotals};
use crate::db::{orders, users};
use crate::error::AppError;
use crate::models::{Order, OrderStatus};
use crate::services::subscription::{self, SubscriptionState, TRIAL_DAYS};

/// Months of revenue history shown on the dashboard.
pub const REVENUE_MONTHS: i64 = 12;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub totals: PlatformTotals,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentOverview {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub class: Option<String>,
    pub status: SubscriptionState,
    pub trial_days_remaining: i64,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub subscription_days_remaining: i64,
    pub created_at: DateTime<Utc>,
}

pub async fn dashboard(db: &SqlitePool, now: DateTime<Utc>) -> Result<DashboardStats, AppError> {
    let totals = stats::platform_totals(db, now, now - Duration::days(TRIAL_DAYS)).await?;
    let monthly_revenue = stats::monthly_revenue(db, REVENUE_MONTHS).await?;

    Ok(DashboardStats {
        totals,
        monthly_revenue,
    })
}

/// Status is derived from the stored fields only; listing does not repair rows.
pub async fn students(db: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<StudentOverview>, AppError> {
    let users = users::fetch_users(db).await?;

    Ok(users
        .into_iter()
        .map(|user| {
            let status = subscription::evaluate_user(&user, now);
            StudentOverview {
                id: user.id,
                email: user.email,
                name: user.name,
                phone: user.phone,
                class: user.class,
                status: status.state,
                trial_days_remaining: status.trial_days_remaining,
                subscription_end_date: status.subscription_end_date,
                subscription_days_remaining: status.subscription_days_remaining,
                created_at: user.created_at,
            }
        })
        .collect())
}

pub async fn list_orders(db: &SqlitePool, status: Option<OrderStatus>) -> Result<Vec<Order>, AppError> {
    Ok(orders::fetch_orders(db, status).await?)
}
