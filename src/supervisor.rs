//! Process Supervisor
//!
//! Watches the agent and dashboard tasks alongside the shutdown signal.
//! A task that fails is reported to the hub as soon as it happens; a dead
//! agent also flips the published status to disconnected so the dashboard
//! never shows a stale "connected".

use crate::observer::{emit, EventSink, Hub, LogLevel, StatusUpdate};
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Run until `signal` resolves, then stop both tasks and wait for them.
pub async fn supervise<S>(
    hub: &Hub,
    mut agent: JoinHandle<()>,
    mut dashboard: JoinHandle<anyhow::Result<()>>,
    shutdown: watch::Sender<bool>,
    signal: S,
) where
    S: Future<Output = ()>,
{
    let mut agent_running = true;
    let mut dashboard_running = true;
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = &mut signal => break,
            result = &mut agent, if agent_running => {
                agent_running = false;
                agent_stopped(hub, result);
            }
            result = &mut dashboard, if dashboard_running => {
                dashboard_running = false;
                dashboard_stopped(hub, result);
            }
        }
    }

    emit(hub, LogLevel::Info, "Server", "Shutting down...");
    let _ = shutdown.send(true);

    if agent_running {
        match agent.await {
            Ok(()) => {}
            Err(e) => emit(hub, LogLevel::Error, "Error", format!("Agent task failed: {}", e)),
        }
    }
    if dashboard_running {
        if let Err(message) = dashboard_failure(dashboard.await) {
            emit(hub, LogLevel::Error, "Error", message);
        }
    }

    info!("Shutdown complete");
}

fn agent_stopped(hub: &Hub, result: Result<(), tokio::task::JoinError>) {
    let message = match result {
        Ok(()) => "Agent stopped unexpectedly".to_string(),
        Err(e) => format!("Agent task failed: {}", e),
    };
    emit(hub, LogLevel::Error, "Error", message);

    let attempts = hub.snapshot().status.reconnect_attempts;
    hub.status_changed(StatusUpdate {
        reconnecting: false,
        ..StatusUpdate::disconnected(attempts)
    });
}

fn dashboard_stopped(hub: &Hub, result: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match dashboard_failure(result) {
        Err(message) => emit(hub, LogLevel::Error, "Error", message),
        Ok(()) => emit(hub, LogLevel::Warn, "Server", "Dashboard stopped"),
    }
}

fn dashboard_failure(result: Result<anyhow::Result<()>, tokio::task::JoinError>) -> Result<(), String> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("Dashboard error: {}", e)),
        Err(e) => Err(format!("Dashboard task failed: {}", e)),
    }
}
