//! Configuration error types.

use thiserror::Error;

/// Errors that can occur while loading or compiling settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("Failed to read config: {0}")]
    Read(String),

    /// Configuration file is not valid JSON/JSONC or does not match the schema.
    #[error("Invalid config: {0}")]
    Parse(String),

    /// A glob pattern could not be compiled.
    #[error("Invalid glob pattern: {0}")]
    Glob(String),
}

impl ConfigError {
    /// Creates a read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates a glob error.
    pub fn glob(message: impl Into<String>) -> Self {
        Self::Glob(message.into())
    }
}
