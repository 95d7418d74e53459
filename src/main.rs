use crate::logging::{LogWriter, LoggingOptions};
use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;

mod common;
mod config;
mod extractors;
mod logging;
mod middlewares;
mod models;
mod routes;
mod server;
mod services;
mod state;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = config::load()?;
    let (mut logs, logs_handle) = LogWriter::new();
    let file_dir = if config.logs.enable_file_logging {
        let dir = config
            .logs
            .parse_dir(&config)?
            .context("Error: 'logs.storage_path' is required when file logging is enabled")?;
        Some(dir)
    } else {
        None
    };
    logging::registry_logs(
        &mut logs,
        LoggingOptions {
            level: config.logs.level,
            file_dir,
        },
    )?;
    tracing::debug!("configuration root: {}", config.root_dir().display());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Error: Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    let result = server::run_until_done(
        server::ServerArgs {
            logs: Arc::new(logs),
            config: &config,
        },
        listener,
    )
    .await;
    if let Ok(Err(err)) = logs_handle.await {
        eprintln!("log writer failed: {err:?}");
    }
    result
}
