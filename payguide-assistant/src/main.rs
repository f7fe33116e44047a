use dotenvy::dotenv;
use payguide_assistant::config::PayGuideConfig;
use payguide_assistant::services::metrics::init_metrics;
use payguide_assistant::startup::Application;
use service_core::config::optional_env;
use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let log_level = optional_env("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
    let otlp_endpoint = optional_env("OTLP_ENDPOINT");
    init_tracing("payguide-assistant", &log_level, otlp_endpoint.as_deref());

    let config = PayGuideConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_metrics();

    let application = Application::build(config).await?;
    application.run_with_shutdown(shutdown_signal()).await?;

    Ok(())
}
