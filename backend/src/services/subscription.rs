use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::{orders, users};
use crate::error::AppError;
use crate::models::User;

pub const TRIAL_DAYS: i64 = 7;
pub const SUBSCRIPTION_MONTHS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Trial,
    Active,
    Expired,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    pub state: SubscriptionState,
    pub is_trial_active: bool,
    pub trial_end_date: DateTime<Utc>,
    pub trial_days_remaining: i64,
    pub subscription_active: bool,
    pub subscription_start_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub subscription_days_remaining: i64,
}

impl SubscriptionStatus {
    pub fn has_paid_access(&self) -> bool {
        self.subscription_active
    }

    /// Mirrors the resolved subscription fields onto `user`.
    pub fn apply_to(&self, user: &mut User) {
        user.subscription_active = self.subscription_active;
        user.subscription_start_date = self.subscription_start_date;
        user.subscription_end_date = self.subscription_end_date;
    }
}

pub fn trial_end(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(TRIAL_DAYS)
}

/// Whole days left until `end`, rounded up; zero once `end` is reached.
pub fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    if end <= now {
        return 0;
    }
    let secs = (end - now).num_seconds();
    (secs + 86_399) / 86_400
}

/// Pure status derivation from the stored user fields.
pub fn evaluate(
    created_at: DateTime<Utc>,
    active: bool,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SubscriptionStatus {
    let trial_end_date = trial_end(created_at);
    let is_trial_active = now < trial_end_date;
    let paid = active && end.is_some_and(|e| e > now);

    let state = if paid {
        SubscriptionState::Active
    } else if is_trial_active {
        SubscriptionState::Trial
    } else {
        SubscriptionState::Expired
    };

    SubscriptionStatus {
        state,
        is_trial_active,
        trial_end_date,
        trial_days_remaining: days_remaining(trial_end_date, now),
        subscription_active: paid,
        subscription_start_date: start,
        subscription_end_date: end,
        subscription_days_remaining: end.filter(|_| paid).map_or(0, |e| days_remaining(e, now)),
    }
}

pub fn evaluate_user(user: &User, now: DateTime<Utc>) -> SubscriptionStatus {
    evaluate(
        user.created_at,
        user.subscription_active,
        user.subscription_start_date,
        user.subscription_end_date,
        now,
    )
}

/// Window granted by a new subscription purchase. A still-running
/// subscription is extended from its end instead of from `now`.
pub fn subscription_window(
    current_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = current_end.filter(|end| *end > now).unwrap_or(now);
    let end = start
        .checked_add_months(Months::new(SUBSCRIPTION_MONTHS))
        .unwrap_or(start + Duration::days(365));
    (start, end)
}

pub async fn resolve(db: &SqlitePool, user_id: &str) -> Result<SubscriptionStatus, AppError> {
    let user = users::find_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    resolve_for_user(db, &user, Utc::now()).await
}

/// Resolves the status and repairs the user row when it disagrees with the
/// paid subscription orders.
pub async fn resolve_for_user(
    db: &SqlitePool,
    user: &User,
    now: DateTime<Utc>,
) -> Result<SubscriptionStatus, AppError> {
    let status = evaluate_user(user, now);
    if status.subscription_active {
        return Ok(status);
    }

    if let Some(order) = orders::latest_paid_subscription(db, &user.id).await? {
        if let Some(end) = order.subscription_end_date.filter(|end| *end > now) {
            info!("restoring subscription for user {} from order {}", user.id, order.id);
            users::set_subscription(db, &user.id, true, order.subscription_start_date, Some(end))
                .await?;
            return Ok(evaluate(
                user.created_at,
                true,
                order.subscription_start_date,
                Some(end),
                now,
            ));
        }
    }

    if user.subscription_active {
        info!("subscription for user {} has lapsed", user.id);
        users::set_subscription(
            db,
            &user.id,
            false,
            user.subscription_start_date,
            user.subscription_end_date,
        )
        .await?;
    }

    Ok(status)
}
