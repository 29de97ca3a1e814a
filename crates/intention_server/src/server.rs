use std::sync::Arc;

use anyhow::Context;
use intention_engine::{JobRegistry, Orchestrator, ResponsesAnalyzer};
use intention_logging::{intention_info, intention_warn};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::http::{router, AppState};

/// Run the HTTP server until Ctrl-C.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let settings = config.analysis_settings();
    if settings.api_key.is_none() {
        intention_warn!("OPENAI_API_SECRET is not set; generation jobs will fail");
    }
    if !settings.allow_web {
        intention_warn!("OPENAI_ALLOW_WEB is not enabled; generation jobs will fail");
    }
    let analyzer = ResponsesAnalyzer::new(settings).context("building analysis client")?;

    let registry = JobRegistry::new(config.retention_policy());
    let cancel = CancellationToken::new();
    let sweeper = registry.spawn_sweeper(cancel.clone());
    let orchestrator = Orchestrator::new(registry, Arc::new(analyzer));
    let app = router(AppState::new(orchestrator, config.heartbeat_interval()));

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    intention_info!("Server listening on port {}", listener.local_addr()?.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    cancel.cancel();
    let _ = sweeper.await;
    intention_info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        intention_warn!("Could not listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}
