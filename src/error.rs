use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {}: {message}", file.display())]
    Parse { file: PathBuf, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No supported web framework detected")]
    FrameworkNotDetected,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Malformed combinator expression: {0}")]
    Combinator(#[from] CombinatorError),
}

/// Failures of the combinator expression parser.
///
/// These never abort a run; the driver turns them into diagnostics attached to
/// the offending type alias.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombinatorError {
    #[error("unbalanced parentheses at offset {position}")]
    UnbalancedParens { position: usize },

    #[error("operator `{operator}` is missing an operand")]
    DanglingOperator { operator: String },

    #[error("empty expression")]
    EmptyExpression,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinator_error_display() {
        let err = Error::from(CombinatorError::UnbalancedParens { position: 7 });
        assert_eq!(
            err.to_string(),
            "Malformed combinator expression: unbalanced parentheses at offset 7"
        );
    }

    #[test]
    fn test_serialization_error_from_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(err);
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error: JSON: "));
    }

    #[test]
    fn test_parse_error_display() {
        let err = Error::Parse {
            file: PathBuf::from("src/main.rs"),
            message: "expected `;`".to_string(),
        };
        assert_eq!(err.to_string(), "Parse error in src/main.rs: expected `;`");
    }
}
