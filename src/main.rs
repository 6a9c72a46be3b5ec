use std::sync::Arc;
use tokio::net::TcpListener;
use webdiary::{create_pool, create_redis_client, create_router, logging, run_migrations, storage, AppState, Config};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let _guard = logging::init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;
    tracing::info!("Database ready");

    let redis = match config.redis_url.as_deref() {
        Some(url) => match create_redis_client(url).await {
            Ok(manager) => {
                tracing::info!("Redis connected, share cache enabled");
                Some(manager)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, share cache disabled");
                None
            }
        },
        None => None,
    };

    let storage = storage::from_config(&config.storage);
    let address = config.server_address.clone();

    let state = Arc::new(AppState {
        db,
        redis,
        config,
        storage,
    });
    let app = create_router(state);

    let listener = TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
