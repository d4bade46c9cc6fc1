//! Order-matching gateway binary.
//!
//! Loads the session configuration (first argument, default
//! `./config/ordermatch.cfg`), starts the FIX acceptor and the operational
//! HTTP surface, and shuts down on SIGINT/SIGTERM.

use log::info;
use ordermatch::api::{create_router, AppState};
use ordermatch::audit::StdoutAuditSink;
use ordermatch::config::{GatewayConfig, DEFAULT_CONFIG_PATH};
use ordermatch::fix::{run_fix_acceptor, SessionAdapter};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("startup failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = GatewayConfig::load(&cfg_path).map_err(|e| e.to_string())?;
    info!(
        "loaded {} session(s) from {cfg_path}",
        config.sessions.len()
    );

    let fix_listener = std::net::TcpListener::bind(("0.0.0.0", config.accept_port))
        .map_err(|e| e.to_string())?;
    info!(
        "FIX acceptor listening on {}",
        fix_listener.local_addr().map_err(|e| e.to_string())?
    );

    let adapter = Arc::new(SessionAdapter::new(config, Arc::new(StdoutAuditSink)));
    let engine = adapter.engine();
    std::thread::spawn({
        let adapter = Arc::clone(&adapter);
        move || run_fix_acceptor(fix_listener, adapter)
    });

    let http_port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let app = create_router(AppState { engine });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", http_port))
        .await
        .map_err(|e| e.to_string())?;
    info!("HTTP surface on http://0.0.0.0:{http_port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| e.to_string())?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
