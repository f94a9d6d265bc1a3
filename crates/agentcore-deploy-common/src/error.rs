//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected KEY=value, got {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("missing required configuration: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("{key} must be an E.164 phone number (+ followed by 2 to 15 digits), got {value:?}")]
    InvalidPhone { key: String, value: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
