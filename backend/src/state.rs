use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::payment::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub gateway: Arc<dyn PaymentGateway>,
    /// Shared client for proxying video bytes from the object store.
    pub http: reqwest::Client,
}
