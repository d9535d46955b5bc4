//! Core error types for Stratus.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Duration text could not be understood
    InvalidDuration {
        /// The rejected input
        input: String,
    },

    /// Expression is not a `{% ... %}` JSONata expression
    InvalidExpression {
        /// The rejected input
        input: String,
    },

    /// Parse error
    Parse {
        /// Error message
        message: String,
    },

    /// Validation error
    Validation {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDuration { input } => {
                write!(
                    f,
                    "Invalid duration \"{}\": expected \"<number> <second|minute|hour|day>[s]\"",
                    input
                )
            }
            Self::InvalidExpression { input } => {
                write!(
                    f,
                    "Invalid expression \"{}\": JSONata expressions must be wrapped in {{% %}}",
                    input
                )
            }
            Self::Parse { message } => write!(f, "Parse error: {}", message),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidDuration {
            input: "soon".to_string(),
        };
        let s = format!("{}", err);
        assert!(s.contains("\"soon\""));

        let err = CoreError::Validation {
            field: "timeout".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Validation failed for timeout: must be positive"
        );
    }

    #[test]
    fn test_invalid_expression_display() {
        let err = CoreError::InvalidExpression {
            input: "$states.input".to_string(),
        };
        let s = format!("{}", err);
        assert!(s.contains("$states.input"));
        assert!(s.contains("{% %}"));
    }

    #[test]
    fn test_from_serde_json() {
        let err: CoreError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, CoreError::Parse { .. }));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::Parse {
            message: "x".to_string(),
        };
        let err2 = CoreError::Parse {
            message: "x".to_string(),
        };
        assert_eq!(err1, err2);
    }
}
