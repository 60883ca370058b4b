use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::{orders, users};
use crate::error::AppError;

/// Checkout orders still `created` after this long are abandoned.
pub const STALE_ORDER_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub subscriptions_expired: usize,
    pub orders_failed: u64,
}

/// Periodic subscription expiry sweep
pub struct ExpiryScheduler {
    db: SqlitePool,
    interval: Duration,
}

impl ExpiryScheduler {
    pub fn new(db: SqlitePool, interval_secs: u64) -> Self {
        Self {
            db,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Runs the sweep forever; failures are logged and the loop keeps going.
    pub async fn start(self) {
        info!("Starting expiry scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            match self.sweep(Utc::now()).await {
                Ok(stats) if stats != SweepStats::default() => {
                    info!(
                        "Expiry sweep completed - {} subscriptions expired, {} stale orders failed",
                        stats.subscriptions_expired, stats.orders_failed
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Expiry sweep failed: {:?}", e);
                }
            }
        }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepStats, AppError> {
        let expired = users::deactivate_expired(&self.db, now).await?;
        for user_id in &expired {
            info!("subscription for user {} expired", user_id);
        }

        let cutoff = now - chrono::Duration::hours(STALE_ORDER_HOURS);
        let orders_failed = orders::fail_stale_orders(&self.db, cutoff).await?;

        Ok(SweepStats {
            subscriptions_expired: expired.len(),
            orders_failed,
        })
    }
}
