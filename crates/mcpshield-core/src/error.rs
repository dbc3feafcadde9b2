//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid YAML
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No orchestrator runtime configured
    #[error("kubernetes runtime configuration is required")]
    MissingRuntime,

    /// Server name violates the `[a-z0-9-]+` grammar
    #[error("invalid server name {name:?}: must match [a-z0-9-]+")]
    InvalidServerName {
        /// The offending name
        name: String,
    },

    /// Two upstream entries share a name
    #[error("duplicate server name {name:?}")]
    DuplicateServerName {
        /// The repeated name
        name: String,
    },
}
