use anyhow::Context;
use skyhold_api::{app, worker, AppState, AuthConfig};
use skyhold_core::catalog::CatalogService;
use skyhold_core::identity::IdentityService;
use skyhold_core::repository::{BookingRepository, PaymentRepository};
use skyhold_order::{ExpirySweeper, MockPaymentAdapter, OrderAssembler, PaymentReconciler};
use skyhold_store::app_config::Config;
use skyhold_store::{DbClient, PgBookingRepository, PgCatalog, PgIdentity, PgPaymentRepository, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyhold_api=debug,skyhold_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Skyhold API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?,
        )),
        None => {
            tracing::info!("No Redis configured, rate limiting disabled");
            None
        }
    };

    let bookings: Arc<dyn BookingRepository> = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let payments: Arc<dyn PaymentRepository> = Arc::new(PgPaymentRepository::new(db.pool.clone()));
    let catalog: Arc<dyn CatalogService> = Arc::new(PgCatalog::new(db.pool.clone()));
    let identity: Arc<dyn IdentityService> = Arc::new(PgIdentity::new(db.pool.clone()));

    let assembler = OrderAssembler::new(bookings.clone(), catalog.clone(), identity.clone())
        .with_hold(chrono::Duration::minutes(config.booking.hold_minutes))
        .with_code_attempts(config.booking.code_retry_attempts);

    let reconciler = PaymentReconciler::new(
        bookings.clone(),
        payments,
        identity,
        Arc::new(MockPaymentAdapter::new()),
        config.payment.webhook_token.clone(),
        config.payment.currency.clone(),
    );

    // Expiry sweep
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Arc::new(ExpirySweeper::new(bookings.clone()));
    let sweep_worker = tokio::spawn(worker::start_expiry_worker(
        sweeper,
        Duration::from_secs(config.booking.sweep_interval_seconds),
        shutdown_rx,
    ));

    let app_state = AppState {
        assembler: Arc::new(assembler),
        reconciler: Arc::new(reconciler),
        bookings,
        catalog,
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    sweep_worker.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
