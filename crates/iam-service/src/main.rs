//! IAM controller
//!
//! Entry point for the Parley identity service.

use iam_service::config::Config;
use iam_service::observability::metrics::init_metrics_recorder;
use iam_service::repositories::{
    MemorySessionStore, MemoryUserStore, PgSessionStore, PgUserStore, SessionStore, UserStore,
};
use iam_service::routes::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iam_service=debug,iam_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IAM controller");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        issuer = %config.jwt_issuer,
        persistent = config.database_url.is_some(),
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        std::io::Error::other(e)
    })?;

    let (users, sessions): (Arc<dyn UserStore>, Arc<dyn SessionStore>) =
        match &config.database_url {
            Some(url) => {
                info!("Connecting to database...");
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(5)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to database: {}", e);
                        e
                    })?;

                sqlx::migrate!("../../migrations")
                    .run(&pool)
                    .await
                    .map_err(|e| {
                        error!("Failed to run migrations: {}", e);
                        e
                    })?;
                info!("Database connection established");

                let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
                let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool));
                (users, sessions)
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory stores; data will not survive a restart");
                let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
                let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
                (users, sessions)
            }
        };

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(config, users, sessions).map_err(|e| {
        error!("Failed to initialize identity core: {}", e);
        e
    })?);

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("IAM controller listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("IAM controller shutdown complete");
    Ok(())
}

/// Returns when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
