//! Wanderbot - Entry Point
//!
//! Runs the agent and the dashboard side by side until Ctrl+C / SIGTERM.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use wanderbot::supervisor::supervise;
use wanderbot::{Agent, Config, DashboardConfig, DashboardServer, Hub, OfflineWorld};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Wanderbot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let dashboard_config = DashboardConfig::from_env();

    let hub = Hub::with_defaults();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    warn!("No protocol client linked - running against the offline world");
    let connector = Arc::new(OfflineWorld::with_defaults());

    let agent = Agent::new(config, connector, hub.clone());
    let agent_task = tokio::spawn(agent.run(shutdown_rx.clone()));

    let dashboard = DashboardServer::new(dashboard_config, hub.clone());
    let dashboard_task = tokio::spawn(dashboard.run(shutdown_rx));

    supervise(&hub, agent_task, dashboard_task, shutdown_tx, shutdown_signal()).await;
    Ok(())
}

fn print_help() {
    println!("Wanderbot v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: wanderbot [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help, -h     Show this help");
    println!();
    println!("Environment variables:");
    println!("  MC_HOST               World server host (default: localhost)");
    println!("  MC_PORT               World server port (default: 25565)");
    println!("  MC_USERNAME           Account name (default: Wanderer)");
    println!("  MC_PASSWORD           Account password (optional)");
    println!("  MC_VERSION            Protocol version (default: 1.20.1)");
    println!("  RECONNECT_DELAY       Backoff step in ms (default: 5000)");
    println!("  MAX_RECONNECT_DELAY   Backoff ceiling in ms (default: 60000)");
    println!("  ACTION_INTERVAL_MIN   Shortest gap between actions in ms (default: 5000)");
    println!("  ACTION_INTERVAL_MAX   Longest gap between actions in ms (default: 15000)");
    println!("  CHAT_PROBABILITY      Chance a chat action speaks (default: 0.08)");
    println!("  MOVEMENT_RADIUS       Wander radius in blocks (default: 20)");
    println!("  PORT, DASHBOARD_PORT  Dashboard port (default: 3000)");
    println!("  DASHBOARD_BIND_ADDR   Dashboard bind address (default: 127.0.0.1)");
    println!("  LOG_FORMAT            'json' for JSON log lines");
}

/// Resolves on Ctrl+C or SIGTERM. A handler that fails to install is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
