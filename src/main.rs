use std::net::SocketAddr;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use vocab_backend_rust::config::Config;
use vocab_backend_rust::db::{migrate, DatabaseProxy};
use vocab_backend_rust::state::AppState;
use vocab_backend_rust::{logging, routes, seed};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    let _log_guard = logging::init_tracing(&config);

    let db_proxy = match DatabaseProxy::from_env().await {
        Ok(proxy) => {
            if let Err(err) = migrate::run_migrations(proxy.pool()).await {
                tracing::error!(error = %err, "database migration failed");
            } else {
                seed::seed_sample_words(&proxy).await;
                seed::seed_test_users(&proxy).await;
            }
            Some(proxy)
        }
        Err(err) => {
            tracing::warn!(error = %err, "database proxy not initialized");
            None
        }
    };

    let state = AppState::new(db_proxy);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr();
    tracing::info!(%addr, "vocab backend listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
