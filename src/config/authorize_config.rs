use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct AuthorizeConfig {
    pub secret: String,
    /// token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl: i64,
}

fn default_token_ttl() -> i64 {
    24 * 60 * 60
}
