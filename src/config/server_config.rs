use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// static dashboard directory
    #[serde(default = "default_public_dir")]
    pub public_dir: String,
    /// external base url used for share links, e.g. `https://monitor.example.org`
    pub public_url: Option<String>,
}

fn default_public_dir() -> String {
    "public".to_string()
}
