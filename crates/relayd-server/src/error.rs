//! Error types for the relay daemon.

/// Errors that can occur in the daemon
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// GPIO line setup or write failure
    #[error("GPIO error: {0}")]
    Gpio(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_io() {
        let err = ServerError::Io(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "port taken",
        ));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("port taken"));
    }

    #[test]
    fn test_display_config() {
        let err = ServerError::Config("relay.slots must be at least 1".to_string());
        assert!(err.to_string().starts_with("Config error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: ServerError = json_err.into();
        assert!(matches!(err, ServerError::Json(_)));
    }
}
