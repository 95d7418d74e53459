use anyhow::{Context, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};

mod authorize_config;
mod database_config;
mod ingest_config;
mod logs_config;
mod server_config;

pub use authorize_config::AuthorizeConfig;
pub use database_config::DatabaseConfig;
pub use ingest_config::IngestConfig;
pub use logs_config::LogsConfig;
pub use server_config::ServerConfig;

/// Environment variable that overrides `ingest.api_key`.
pub const DEVICE_API_KEY_ENV: &str = "DEVICE_API_KEY";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub esp32_status_url: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logs: LogsConfig,
    pub authorize: AuthorizeConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Directory relative paths are resolved against, the config file's parent.
    #[serde(skip)]
    root: PathBuf,
}

impl Config {
    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    pub(crate) fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn from_toml(content: &str, root: PathBuf) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content).with_context(|| {
            "Error: Failed to parse configuration file.\n\
            Please check the file syntax is valid TOML syntax"
        })?;
        config.root = root;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(DEVICE_API_KEY_ENV).filter(|it| !it.trim().is_empty()) {
            self.ingest.api_key = Some(key.trim().to_string());
        }
    }
}

fn parse_config_path() -> anyhow::Result<PathBuf> {
    let mut args = std::env::args();
    args.next();
    while let Some(arg) = args.next() {
        if arg == "-c" || arg == "--config" {
            return match args.next() {
                Some(path) => Ok(PathBuf::from(path)),
                None => Err(anyhow!("Error: Please specify path string for -c argument.")),
            };
        }
    }
    Err(anyhow!(
        "Error: Please specify configuration file argument. Usage: -c <config_file>"
    ))
}

pub fn load() -> anyhow::Result<Config> {
    let path = parse_config_path()?;
    if !path.is_file() {
        return Err(anyhow!(
            "Error: Configuration file not found or invalid.\n\
        Please make sure that the configuration file exists and is a valid TOML file.\n\
        Expected file path: {:?}",
            path
        ));
    }
    let content = std::fs::read_to_string(&path).with_context(|| {
        "Error: Failed to read configuration file.\n\
        Please check the file path and file permissions, and make sure the file is valid accessible"
    })?;
    let root = path
        .canonicalize()
        .ok()
        .and_then(|it| it.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    Config::from_toml(&content, root)
}
