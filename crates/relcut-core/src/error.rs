//! Configuration error types.
//!
//! Errors raised while running a release live next to the stage that raises
//! them; see [`crate::release::ReleaseError`].

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Publishing is enabled but the target repository could not be determined.
    #[error("cannot determine {missing} for publishing; set publish.{missing} or use a GitHub remote URL")]
    PublishTarget {
        /// Which key is missing (`owner` or `repo`).
        missing: &'static str,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
