use anyhow::Context;
use confidential_predictor::api::{router, AppState};
use confidential_predictor::Config;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("configuration")?;
    let state = Arc::new(AppState::from_config(&config));

    // Bring the confidential-compute client up front so the first request
    // does not pay for initialization. Operations re-initialize lazily if
    // this fails.
    match state.confidential.initialize().await {
        Ok(summary) => {
            tracing::info!(backend = summary.backend, chain_id = %summary.chain_id, "confidential compute initialized");
        }
        Err(err) => {
            tracing::warn!(error = %err, "confidential compute initialization failed");
        }
    }

    // Startup gate: a critical vendor being down means we refuse to serve.
    tracing::info!("performing startup health checks");
    let report = state.health.check_all().await;
    if let Some(critical) = report.first_critical_failure() {
        tracing::error!(
            service = %critical.service,
            code = ?critical.code,
            error = ?critical.error,
            "startup failed - service unavailable"
        );
        std::process::exit(1);
    }
    for probe in report.services.values().filter(|p| !p.success) {
        tracing::warn!(service = %probe.service, error = ?probe.error, "non-critical service unavailable, continuing");
    }

    let app = router(state);
    tracing::info!(bind = %config.bind, "prediction gateway starting");
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
