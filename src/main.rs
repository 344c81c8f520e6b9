use payflow_backend::api::{build_router, mpesa::MpesaState, AppState};
use payflow_backend::config::AppConfig;
use payflow_backend::correlation::build_store;
use payflow_backend::health::HealthChecker;
use payflow_backend::logging::init_tracing_with;
use payflow_backend::payments::provider::PaymentGateway;
use payflow_backend::payments::providers::PayflowGateway;
use payflow_backend::workers::outcome_expiry::OutcomeExpiryWorker;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing_with(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting PayFlow backend service"
    );

    info!(
        host = %config.server.host,
        port = config.server.port,
        store = ?config.store.backend,
        outcome_ttl_secs = config.store.outcome_ttl_secs,
        "Server configuration loaded"
    );

    info!("🗄️  Initializing correlation store...");
    let store = build_store(&config.store).await.map_err(|e| {
        error!("❌ Failed to initialize correlation store: {}", e);
        e
    })?;
    info!(backend = store.backend(), "✅ Correlation store initialized");

    // Missing credentials degrade the service instead of stopping it
    let gateway: Option<Arc<dyn PaymentGateway>> = match PayflowGateway::from_env() {
        Ok(gateway) => {
            info!(config = ?gateway.config(), "✅ PayFlow gateway configured");
            Some(Arc::new(gateway))
        }
        Err(e) => {
            warn!(error = %e, "⚠️  PayFlow gateway not configured, STK push will return 500");
            None
        }
    };

    let health_checker = HealthChecker::new(store.clone(), gateway.is_some());

    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let expiry_worker = OutcomeExpiryWorker::new(
        store.clone(),
        Duration::from_secs(config.store.sweep_interval_secs),
    );
    let expiry_handle = tokio::spawn(expiry_worker.run(worker_shutdown_rx));

    info!("🛣️  Setting up application routes...");
    let app = build_router(AppState {
        mpesa: MpesaState::new(store, gateway),
        health_checker,
    });
    info!("✅ Routes configured");

    let addr: SocketAddr = config.server.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║            🚀 PAYFLOW BACKEND SERVER IS RUNNING 🚀           ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  🌐 Server Address:  http://{}", addr);
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  📡 AVAILABLE ENDPOINTS:                                     ║");
    println!("║  POST /api/mpesa/stk-push        - Initiate STK push         ║");
    println!("║  POST /api/mpesa/callback        - PayFlow callback          ║");
    println!("║  GET  /api/mpesa/status          - Payment status            ║");
    println!("║  GET  /health                    - Health check              ║");
    println!("║  GET  /health/ready              - Readiness probe           ║");
    println!("║  GET  /health/live               - Liveness probe            ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Err(e) = tokio::time::timeout(Duration::from_secs(5), expiry_handle).await {
        error!(error = %e, "Timed out waiting for expiry worker shutdown");
    }

    info!("👋 Server shutdown complete");

    Ok(())
}
