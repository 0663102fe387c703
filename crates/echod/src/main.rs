//! echod — Echo anonymous-chat matchmaking daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use echo_core::config::{AnalysisConfig, BackupConfig, EchoConfig};
use echo_services::{
    HttpAnalysisClient, Moderation, RedisBackup, SessionBackup, SessionCoordinator,
    SessionRegistry, TextAnalyzer,
};

async fn build_backup(config: &BackupConfig) -> SessionBackup {
    if !config.enabled {
        tracing::info!("backup disabled, state is in-memory only");
        return SessionBackup::disabled();
    }
    match RedisBackup::connect(&config.redis_url).await {
        Ok(store) => {
            tracing::info!(url = %config.redis_url, "backup store connected");
            SessionBackup::new(Arc::new(store), config)
        }
        Err(e) => {
            tracing::warn!(url = %config.redis_url, error = %e, "backup store unavailable, continuing without it");
            SessionBackup::disabled()
        }
    }
}

fn build_analyzer(config: &AnalysisConfig) -> Result<Option<Arc<dyn TextAnalyzer>>> {
    if !config.enabled {
        return Ok(None);
    }
    let client = HttpAnalysisClient::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
        .context("failed to build analysis client")?;
    tracing::info!(endpoint = %client.endpoint(), "text analysis enabled");
    let analyzer: Arc<dyn TextAnalyzer> = Arc::new(client);
    Ok(Some(analyzer))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = EchoConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = EchoConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        EchoConfig::default()
    });
    tracing::info!(
        port = config.server.port,
        backup = config.backup.enabled,
        analysis = config.analysis.enabled,
        moderation = config.analysis.moderate_messages,
        "echod starting"
    );

    let backup = build_backup(&config.backup).await;
    let analyzer = build_analyzer(&config.analysis)?;

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let registry = SessionRegistry::new();
    let mut coordinator = SessionCoordinator::new(registry.clone(), backup);
    if let (Some(analyzer), true) = (&analyzer, config.analysis.moderate_messages) {
        coordinator = coordinator.with_moderation(Moderation {
            analyzer: analyzer.clone(),
            flag_threshold: config.analysis.flag_threshold,
        });
    }
    let (handle, coordinator_task) = coordinator.spawn(shutdown_tx.subscribe());

    let snapshot_printer = {
        let handle = handle.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let Ok(status) = handle.status().await else {
                    break;
                };
                tracing::info!(
                    connections = status.connections,
                    waiting_anonymous = status.waiting_anonymous,
                    waiting_profiled = status.waiting_profiled,
                    sessions = status.sessions,
                    pending_reconnects = status.pending_reconnects,
                    "coordinator snapshot"
                );
                for s in registry.list() {
                    tracing::debug!(
                        session_id = %s.session_id,
                        messages = s.message_count,
                        age_secs = s.duration_ms() / 1000,
                        "  session"
                    );
                }
            }
        })
    };

    let api_task = {
        let state = echo_api::ApiState::new(registry.clone(), handle.clone(), analyzer);
        let server = config.server.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = echo_api::serve(state, server, shutdown).await {
                tracing::error!(error = %e, "API server error");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()    => tracing::info!("shutting down"),
        r = coordinator_task      => tracing::error!("coordinator exited: {:?}", r),
        r = api_task              => tracing::error!("API server exited: {:?}", r),
        r = snapshot_printer      => tracing::error!("snapshot printer exited: {:?}", r),
    }

    Ok(())
}
