use crate::config::Config;
use crate::logging::LogWriter;
use crate::{routes, state};
use anyhow::Context;
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

pub struct ServerArgs<'a> {
    pub logs: Arc<LogWriter>,
    pub config: &'a Config,
}

static MIGRATOR: Migrator = sqlx::migrate!();

pub async fn connect_database(path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(dir) = path.parent().filter(|it| !it.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory: {}", dir.display()))?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePool::connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to SQLite database: {}", path.display()))?;
    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to apply database migrations")?;
    Ok(pool)
}

/// A migrated in-memory database. A single connection, since every sqlite
/// memory connection is its own database.
#[cfg(test)]
pub(crate) async fn connect_memory_database() -> anyhow::Result<SqlitePool> {
    use std::str::FromStr;
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

pub async fn run_until_done(args: ServerArgs<'_>, bind: TcpListener) -> anyhow::Result<()> {
    let mut join_set: JoinSet<anyhow::Result<()>> = JoinSet::new();
    let shutdown_signal = CancellationToken::new();
    let database_path = args.config.database.parse_path(args.config);
    let pool = connect_database(&database_path).await?;
    tracing::info!("database ready at {}", database_path.display());
    let state = state::AppState::build(pool.clone(), args.config)?;
    let public_dir = args.config.resolve(&args.config.server.public_dir);
    // axum serve
    {
        let shutdown_signal = shutdown_signal.clone();
        let routes = routes::build(&public_dir).with_state(state);
        join_set.spawn(async move {
            axum::serve(
                bind,
                routes.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                shutdown_signal.cancelled().await;
            })
            .await?;
            Ok(())
        });
    }
    // ctrl+c
    {
        let shutdown_signal = shutdown_signal.clone();
        join_set.spawn(async move {
            let _ = signal::ctrl_c().await;
            tracing::debug!("Received ctrl+c, start terminating");
            shutdown_signal.cancel();
            Ok(())
        });
    }
    // SIGTERM stops the server, USR1 reopens log files after rotation
    #[cfg(target_os = "linux")]
    {
        let shutdown_signal = shutdown_signal.clone();
        let logs = args.logs.clone();
        join_set.spawn(async move {
            let mut usr1 = signal::unix::signal(signal::unix::SignalKind::user_defined1())?;
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            loop {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::debug!("Received SIGTERM signal, start terminating");
                        shutdown_signal.cancel();
                        return Ok(());
                    }
                    _ = usr1.recv() => {
                        tracing::debug!("Received USR1 signal, start reopening log files");
                        match logs.reopen() {
                            Ok(_) => tracing::info!("Log files reopened"),
                            Err(err) => eprintln!("Failed to reopen log files: {err:?}"),
                        }
                    }
                }
            }
        });
    }
    let mut outcome = Ok(());
    while let Some(r) = join_set.join_next().await {
        if shutdown_signal.is_cancelled() {
            join_set.shutdown().await;
            break;
        }
        match r {
            Ok(Ok(_)) => (),
            Ok(Err(e)) => {
                outcome = Err(e);
                break;
            }
            Err(e) => {
                outcome = Err(anyhow::format_err!("Internal error in spawn: {e}"));
                break;
            }
        }
    }
    pool.close().await;
    tracing::info!("server stopped");
    args.logs.shutdown();
    outcome
}
