use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tenancy: TenancyConfig,
    pub session: SessionConfig,
    /// Third-party OAuth2 providers keyed by the name used in
    /// `/api/auth/thirdparty/:provider`.
    #[serde(default)]
    pub oauth2_providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenancyConfig {
    /// Names of the strategies allowed to identify a tenant.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
    #[serde(default)]
    pub precedence: Precedence,
    /// Datasource names to provision, e.g. `db`, `db.abc`.
    #[serde(default = "default_datasources")]
    pub datasources: Vec<String>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            precedence: Precedence::default(),
            datasources: default_datasources(),
        }
    }
}

/// Order in which configured strategies are tried.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Strategies named later in the list are tried first.
    #[default]
    LastConfiguredFirst,
    /// Strategies are tried in list order.
    FirstConfiguredFirst,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_domain: String,
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub authorization_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    #[serde(default)]
    pub scope: String,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_strategies() -> Vec<String> {
    vec!["header".to_string()]
}

fn default_datasources() -> Vec<String> {
    vec!["db".to_string()]
}

fn default_cookie_name() -> String {
    "session".to_string()
}

fn default_max_age() -> u64 {
    86400
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}
