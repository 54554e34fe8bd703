//! # Error Types
//!
//! Custom error types for DroneDrop using `thiserror`.

use thiserror::Error;

/// Main error type for DroneDrop
#[derive(Debug, Error)]
pub enum DroneDropError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state or request encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serial port errors (actuator link)
    #[error("Serial error: {0}")]
    Serial(String),

    /// A platform command was issued without an established connection
    #[error("platform is not connected")]
    NotConnected,

    /// Platform connect/disconnect reported one or more failures
    #[error("connection failed: {}", .0.join("; "))]
    Connection(Vec<String>),

    /// Disconnect kept failing after the retry budget was spent
    #[error("disconnect still failing after {attempts} attempts: {}", .errors.join("; "))]
    DisconnectTimeout {
        attempts: u32,
        errors: Vec<String>,
    },

    /// Flight commands are refused while commander mode is disabled
    #[error("commander mode is disabled")]
    Standalone,

    /// Remote parameters had an unexpected shape
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No handler is registered under this name
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl DroneDropError {
    /// Individual failure messages carried by connection errors.
    ///
    /// Empty for every other kind.
    pub fn connection_errors(&self) -> &[String] {
        match self {
            DroneDropError::Connection(errors) => errors,
            DroneDropError::DisconnectTimeout { errors, .. } => errors,
            _ => &[],
        }
    }
}

/// Result type alias for DroneDrop
pub type Result<T> = std::result::Result<T, DroneDropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display_joins_messages() {
        let err = DroneDropError::Connection(vec!["no route".into(), "refused".into()]);
        assert_eq!(err.to_string(), "connection failed: no route; refused");
        assert_eq!(err.connection_errors().len(), 2);
    }

    #[test]
    fn test_other_errors_carry_no_connection_list() {
        let err = DroneDropError::BadRequest("name must be a string".into());
        assert!(err.connection_errors().is_empty());
    }
}
