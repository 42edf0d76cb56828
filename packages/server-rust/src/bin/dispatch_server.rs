//! `dispatch-server`: HTTP front end for the dispatch engine.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use dispatch_server::network::{NetworkConfig, NetworkModule};
use dispatch_server::service::{DispatchConfig, DispatchService};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    /// Human-readable lines.
    #[default]
    Fmt,
    /// One JSON object per event.
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "dispatch-server")]
#[command(about = "Assigns tasks to the nearest available skilled worker")]
#[command(version)]
struct Cli {
    #[arg(long, env = "DISPATCH_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Concurrent assignment consumers.
    #[arg(long, env = "DISPATCH_WORKERS", default_value_t = 5)]
    workers: usize,

    #[arg(long, env = "DISPATCH_QUEUE_CAPACITY", default_value_t = 100)]
    queue_capacity: usize,

    /// Per-assignment deadline in milliseconds.
    #[arg(long, env = "DISPATCH_TASK_TIMEOUT_MS", default_value_t = 30_000)]
    task_timeout_ms: u64,

    /// Upper bound on the shutdown drain in milliseconds.
    #[arg(long, env = "DISPATCH_DRAIN_TIMEOUT_MS", default_value_t = 5_000)]
    drain_timeout_ms: u64,

    #[arg(long, env = "DISPATCH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Fmt)]
    log_format: LogFormat,
}

impl Cli {
    fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            worker_count: self.workers,
            queue_capacity: self.queue_capacity,
            task_timeout: Duration::from_millis(self.task_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            ..NetworkConfig::default()
        }
    }
}

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Fmt => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let dispatch_config = cli.dispatch_config();
    info!(
        workers = dispatch_config.worker_count,
        queue_capacity = dispatch_config.queue_capacity,
        task_timeout_ms = cli.task_timeout_ms,
        drain_timeout_ms = cli.drain_timeout_ms,
        "starting dispatch server"
    );

    let service = Arc::new(DispatchService::new(&dispatch_config));
    let mut network = NetworkModule::new(cli.network_config(), service);
    network.start().await?;
    network.serve(shutdown_signal()).await?;

    info!("dispatch server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_config_defaults() {
        let cli = Cli::parse_from(["dispatch-server"]);
        let config = cli.dispatch_config();
        let defaults = DispatchConfig::default();
        assert_eq!(config.worker_count, defaults.worker_count);
        assert_eq!(config.queue_capacity, defaults.queue_capacity);
        assert_eq!(config.task_timeout, defaults.task_timeout);
        assert_eq!(config.drain_timeout, defaults.drain_timeout);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::parse_from([
            "dispatch-server",
            "--port",
            "9000",
            "--workers",
            "3",
            "--drain-timeout-ms",
            "250",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.network_config().port, 9000);
        assert_eq!(cli.dispatch_config().worker_count, 3);
        assert_eq!(cli.dispatch_config().drain_timeout, Duration::from_millis(250));
        assert!(matches!(cli.log_format, LogFormat::Json));
    }
}
