use connectors::error::CatalogError;
use engine_config::error::ConfigError;
use engine_processing::error::LoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Shutdown requested")]
    ShutdownRequested,
}

impl CliError {
    pub fn is_shutdown(&self) -> bool {
        match self {
            CliError::ShutdownRequested => true,
            CliError::Load(err) => err.is_cancellation(),
            _ => false,
        }
    }
}
