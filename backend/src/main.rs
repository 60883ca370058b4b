use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edustream::api::router;
use edustream::config::Config;
use edustream::db;
use edustream::payment::RazorpayClient;
use edustream::services::{ExpiryScheduler, accounts};
use edustream::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "edustream=debug,tower_http=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::connect(&config.database_url).await?;

    match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => {
            accounts::bootstrap_admin(&pool, email, password).await?;
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("ADMIN_EMAIL and ADMIN_PASSWORD must both be set to bootstrap an admin");
        }
        (None, None) => {}
    }

    let gateway = Arc::new(RazorpayClient::new(config.razorpay.clone())?);
    let http = reqwest::Client::builder().build()?;

    let state = AppState {
        db: pool.clone(),
        config: config.clone(),
        gateway,
        http,
    };

    let scheduler = ExpiryScheduler::new(pool.clone(), config.expiry_sweep_interval_secs);
    tokio::spawn(async move {
        scheduler.start().await;
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
