//! Points ledger server binary

use anyhow::Context;
use points_ledger::{config::LogFormat, Config, PointsLedger};
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match std::env::var("POINTS_CONFIG") {
        Ok(path) => {
            let mut config = Config::from_file(&path)
                .with_context(|| format!("loading config from {}", path))?;
            config.apply_env()?;
            config
        }
        Err(_) => Config::from_env()?,
    };

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!("Starting points ledger server");

    let metrics_listener = tokio::net::TcpListener::bind(&config.metrics_listen_addr)
        .await
        .with_context(|| format!("binding metrics exporter to {}", config.metrics_listen_addr))?;

    let (ledger, _governance) = PointsLedger::open(config)?;

    let metrics = ledger.metrics().clone();
    let exporter = tokio::spawn(async move {
        if let Err(e) = metrics.serve(metrics_listener).await {
            tracing::error!("Metrics exporter stopped: {}", e);
        }
    });

    // Forward committed events to the log (activity feed stand-in)
    let mut events = ledger.event_stream();
    let feed = tokio::spawn(async move {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => tracing::info!(target: "points_ledger::feed", "{}", line),
                    Err(e) => tracing::error!("Failed to encode event: {}", e),
                },
                Err(e) => tracing::warn!("Activity feed lagged: {}", e),
            }
        }
    });

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down points ledger server");
    let final_state = ledger.shutdown().await?;
    feed.abort();
    exporter.abort();

    tracing::info!(
        total_supply = final_state.get_total_supply(),
        accounts = final_state.balances().len(),
        "Final ledger state"
    );
    Ok(())
}
