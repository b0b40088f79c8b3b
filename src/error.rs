use crate::camera::RegistryError;
use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::incident_log::LogError;
use crate::metrics::MetricsError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("camera registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
    #[error("incident log error: {0}")]
    Log(#[from] LogError),
    #[error("camera {0} has no image url")]
    MissingImageUrl(String),
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl AppError {
    /// Whether the failure must abort the whole run rather than a single camera.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Registry(_))
    }
}
