use crate::logging::format::Formatter;
pub use log_writer::LogWriter;
use std::path::PathBuf;
use tracing::{Level, Metadata};
use tracing_subscriber::Layer;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

mod format;
mod log_writer;

const CRATE_PREFIX: &str = "vitalink::";

pub struct LoggingOptions {
    pub level: Level,
    /// `Some` when events should go to `<dir>/vitalink.log` instead of stdout
    pub file_dir: Option<PathBuf>,
}

fn is_crate_event(metadata: &Metadata<'_>, level: &Level) -> bool {
    metadata
        .module_path()
        .map(|it| it.starts_with(CRATE_PREFIX) && metadata.level() <= level)
        .unwrap_or(false)
}

/// Installs the global subscriber. Crate events honour `level`; the request
/// spans emitted by `tower_http` are kept at the same level so trace ids show
/// up; everything else from dependencies is limited to warnings.
pub fn registry_logs(writer: &mut LogWriter, options: LoggingOptions) -> anyhow::Result<()> {
    let LoggingOptions { level, file_dir } = options;
    let mut layers = Vec::new();
    match file_dir {
        Some(dir) => {
            let file = writer.create_file_writer(dir.join("vitalink.log"))?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(Formatter::new(false))
                .with_writer(file)
                .with_filter(filter::filter_fn(move |metadata| {
                    is_crate_event(metadata, &level)
                }));
            layers.push(file_layer.boxed());
        }
        None => {
            let stdio_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(Formatter::new(true))
                .with_filter(filter::filter_fn(move |metadata| {
                    is_crate_event(metadata, &level)
                }));
            layers.push(stdio_layer.boxed());
        }
    }
    // main.rs and dependencies
    {
        let general_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .event_format(Formatter::new(true))
            .with_filter(filter::filter_fn(move |metadata| {
                match metadata.module_path() {
                    Some("vitalink") => true,
                    Some(path) if path.starts_with(CRATE_PREFIX) => false,
                    Some(path) if path.starts_with("tower_http") => metadata.level() <= &level,
                    _ => metadata.level() <= &Level::WARN,
                }
            }));
        layers.push(general_layer.boxed());
    }
    tracing_subscriber::registry()
        .with(layers)
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;
    Ok(())
}
