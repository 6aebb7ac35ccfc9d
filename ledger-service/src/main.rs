use ledger_service::config::LedgerConfig;
use ledger_service::services::metrics::init_metrics;
use ledger_service::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::load()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );
    init_metrics();

    tracing::info!(
        environment = ?config.environment,
        backend = ?config.database.backend,
        "Starting ledger-service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
