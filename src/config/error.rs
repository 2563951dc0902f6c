//! Configuration error types and handling

/// Error types for configuration loading and validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO-related errors (file access, permissions, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation errors
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// An environment override carried a value of the wrong shape
    #[error("Invalid value for {name}: {message}")]
    InvalidOverride { name: String, message: String },

    /// Path resolution errors
    #[error("Path resolution error: {0}")]
    PathResolution(String),
}

impl ConfigError {
    /// Create a validation error with context
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an override error for the named variable
    pub fn invalid_override<N: Into<String>, S: Into<String>>(name: N, msg: S) -> Self {
        Self::InvalidOverride {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a path resolution error with context
    pub fn path_resolution<S: Into<String>>(msg: S) -> Self {
        Self::PathResolution(msg.into())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
