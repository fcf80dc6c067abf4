use anyhow::Result;
use hearsay_core::config::{AppConfig, LoadOptions};
use hearsay_server::{bootstrap, sweeper};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use hearsay_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    // Logging depends on the loaded config, so load it first.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let sweeper = sweeper::spawn(app.runtime.clone(), app.config.dialogue.sweep_interval());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        routes = "/slack/events,/health",
        "hearsay-server listening"
    );

    axum::serve(listener, app.router()).with_graceful_shutdown(wait_for_shutdown()).await?;
    sweeper.abort();

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_sessions = app.runtime.active_sessions(),
        "hearsay-server stopping"
    );
    Ok(())
}

async fn wait_for_shutdown() {
    shutdown_on(tokio::signal::ctrl_c()).await;
}

/// Resolves when `signal` fires. A signal that cannot be installed never resolves, so
/// the server keeps running instead of stopping right after start.
async fn shutdown_on<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(error) = signal.await {
        tracing::warn!(
            event_name = "system.server.signal_failed",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for ctrl-c; stop the process another way"
        );
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::shutdown_on;

    #[tokio::test(start_paused = true)]
    async fn failed_signal_install_keeps_the_server_running() {
        let failed = async { Err(io::Error::new(io::ErrorKind::Other, "no signal handler")) };

        let outcome = tokio::time::timeout(Duration::from_secs(3600), shutdown_on(failed)).await;

        assert!(outcome.is_err(), "shutdown resolved after a failed signal install");
    }

    #[tokio::test]
    async fn delivered_signal_shuts_down() {
        tokio::time::timeout(Duration::from_secs(1), shutdown_on(async { Ok(()) }))
            .await
            .expect("shutdown resolves");
    }
}
