use thiserror::Error;

/// Result type for swarm construction and configuration.
pub type SwarmResult<T> = Result<T, SwarmError>;

/// Errors raised while building a swarm. Nothing fails once a tick is running.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// A configuration value that cannot produce a valid simulation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SwarmError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SwarmError::InvalidConfig(msg.into())
    }
}
