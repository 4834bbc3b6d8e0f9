//! Restaurant order and stock service - backend server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use restaurant_ops::{
    config::{Config, StorageBackend},
    create_app,
    services::TracingNotifier,
    store::{MemoryRateLimitStore, MemoryStore, PgRateLimitStore, PgStore, RateLimitStore, Store},
    AppState,
};

/// How often expired rate limit hits are swept
const RATE_LIMIT_SWEEP: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "orders_server=debug,restaurant_ops=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting restaurant order service");
    tracing::info!("Environment: {}", config.environment);

    let window = config.rate_limit.window();
    let (store, rate_limits): (Arc<dyn Store>, Arc<dyn RateLimitStore>) =
        match config.storage.backend {
            StorageBackend::Postgres => {
                tracing::info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(config.database.max_connections)
                    .min_connections(config.database.min_connections)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(&config.database.url)
                    .await?;
                tracing::info!("Database connection established");

                // Run migrations in development
                if config.is_development() {
                    tracing::info!("Running database migrations...");
                    sqlx::migrate!("./migrations").run(&db_pool).await?;
                    tracing::info!("Migrations completed");
                }

                let limits = PgRateLimitStore::new(db_pool.clone());
                let sweeper = limits.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP);
                    loop {
                        interval.tick().await;
                        if let Err(err) = sweeper.cleanup(window, Utc::now()).await {
                            tracing::warn!(error = %err, "Rate limit sweep failed");
                        }
                    }
                });

                (Arc::new(PgStore::new(db_pool)), Arc::new(limits))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");

                let limits = MemoryRateLimitStore::new();
                let sweeper = limits.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP);
                    loop {
                        interval.tick().await;
                        sweeper.cleanup(window, Utc::now()).await;
                    }
                });

                (Arc::new(MemoryStore::new()), Arc::new(limits))
            }
        };

    // Create application state
    let state = AppState {
        store,
        rate_limits,
        notifier: Arc::new(TracingNotifier),
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
