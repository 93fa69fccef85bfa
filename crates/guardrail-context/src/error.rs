//! Error types for the context classifier
//!
//! Classification itself never fails: unreadable inputs degrade to "signal
//! not fired" and the verdict falls back to production. The only fallible
//! surface is loading configuration.

/// Errors while loading classifier configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML document could not be parsed into a config
    #[error("invalid classifier config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A pattern list contains an empty entry, which would match every name
    #[error("empty pattern in '{field}'")]
    EmptyPattern {
        /// Name of the offending config field
        field: &'static str,
    },
}

impl ConfigError {
    /// Create empty pattern error for field
    #[inline]
    #[must_use]
    pub fn empty_pattern(field: &'static str) -> Self {
        Self::EmptyPattern { field }
    }
}

/// Result type alias for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;
