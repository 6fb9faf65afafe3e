use anyhow::{
    Context,
    Result,
};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sliver_sync_server::Config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    // Initialize a tracing subscriber
    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(config.log_level.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()
        .context("failed to install prometheus exporter")?;
    tracing::info!(metrics_addr = %config.metrics_addr, "Serving metrics");

    let server = config.build().await?;
    let cancellation_token = CancellationToken::new();
    let mut server_future = Box::pin(server.run(cancellation_token.clone()));

    tokio::select! {
        result = &mut server_future => {
            handle_server_result(result);
        },
        signal = shutdown_signal() => {
            if let Err(e) = signal {
                // Without a signal handler the server runs until it fails.
                tracing::warn!("Error setting up signal handler: {}", e);
            } else {
                tracing::info!("Shutdown signal received, initiating graceful shutdown");
                cancellation_token.cancel();
            }
            handle_server_result(server_future.await);
        }
    }

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C)
async fn shutdown_signal() -> Result<()> {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
            res = signal::ctrl_c() => {
                res.context("failed to listen for Ctrl-C")?;
                tracing::info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    }

    Ok(())
}

/// Handle the result of the server
fn handle_server_result(result: Result<()>) {
    match result {
        Ok(()) => tracing::info!("Server shutdown gracefully"),
        Err(e) => {
            tracing::error!("Server encountered an error: {}", e);
        }
    }
}
