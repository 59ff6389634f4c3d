use thiserror::Error;

/// Top-level error type for the USSD gateway.
///
/// Subsystem crates define their own error types where they need a richer
/// taxonomy and convert into `UssdError` at crate boundaries so that `?`
/// works from storage all the way up to the binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UssdError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for UssdError {
    fn from(err: toml::de::Error) -> Self {
        UssdError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for UssdError {
    fn from(err: toml::ser::Error) -> Self {
        UssdError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for UssdError {
    fn from(err: serde_json::Error) -> Self {
        UssdError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for gateway operations.
pub type Result<T> = std::result::Result<T, UssdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UssdError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(UssdError, &str)> = vec![
            (
                UssdError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                UssdError::Gateway("bad dialect".to_string()),
                "Gateway error: bad dialect",
            ),
            (
                UssdError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: UssdError = io_err.into();
        assert!(matches!(err, UssdError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let ussd_err: UssdError = err.unwrap_err().into();
        assert!(matches!(ussd_err, UssdError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let ussd_err: UssdError = err.unwrap_err().into();
        assert!(matches!(ussd_err, UssdError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
