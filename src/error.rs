use thiserror::Error;

pub type Result<T> = std::result::Result<T, TenancyError>;

#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("Tenancy strategy '{strategy}' failed: {message}")]
    Strategy { strategy: String, message: String },

    #[error("No datasource for tenant: {0}")]
    DataSourceNotFound(String),
}

impl TenancyError {
    pub fn strategy(strategy: &str, message: impl Into<String>) -> Self {
        Self::Strategy {
            strategy: strategy.to_string(),
            message: message.into(),
        }
    }
}
