use crate::config::Config;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

impl DatabaseConfig {
    pub fn parse_path(&self, config: &Config) -> PathBuf {
        config.resolve(&self.path)
    }
}
