//! Verification error taxonomy.

/// An expected-vs-actual mismatch raised by a failing check.
///
/// Terminates the current test case; the host runner marks it failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}\nExpected: {expected}\n     but: was {actual}")]
pub struct VerificationFailure {
    /// Human-readable message supplied by the caller.
    pub message: String,

    /// Rendering of the actual value.
    pub actual: String,

    /// Rendering of the expected value or condition.
    pub expected: String,
}

impl VerificationFailure {
    pub fn new(
        message: impl Into<String>,
        actual: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            actual: actual.into(),
            expected: expected.into(),
        }
    }
}

/// Malformed check input, e.g. an unparsable path or a value of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationUsageError {
    #[error("invalid path expression '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("value at '{path}' is {found}, expected {expected}")]
    IncompatibleValue {
        path: String,
        expected: String,
        found: String,
    },
}

/// Errors produced by verification checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("verification failed: {0}")]
    Failure(#[from] VerificationFailure),

    #[error("verification usage error: {0}")]
    Usage(#[from] VerificationUsageError),
}

impl VerificationError {
    /// The mismatch, when this is a failure rather than a usage error.
    pub fn as_failure(&self) -> Option<&VerificationFailure> {
        match self {
            VerificationError::Failure(f) => Some(f),
            VerificationError::Usage(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, VerificationError::Failure(_))
    }
}

/// Result type for verification checks.
pub type Result<T> = std::result::Result<T, VerificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_embeds_message_expected_and_actual() {
        let err = VerificationFailure::new("Board name should match", "\"X\"", "\"Y\"");
        let msg = err.to_string();
        assert!(msg.starts_with("Board name should match"));
        assert!(msg.contains("Expected: \"Y\""));
        assert!(msg.contains("but: was \"X\""));
    }

    #[test]
    fn test_usage_error_display() {
        let err = VerificationUsageError::InvalidPath {
            path: "a..b".to_string(),
            reason: "empty field name".to_string(),
        };
        assert!(err.to_string().contains("invalid path expression 'a..b'"));
    }

    #[test]
    fn test_error_classification() {
        let failure: VerificationError = VerificationFailure::new("m", "1", "2").into();
        assert!(failure.is_failure());
        assert_eq!(failure.as_failure().map(|f| f.actual.as_str()), Some("1"));

        let usage: VerificationError = VerificationUsageError::IncompatibleValue {
            path: "labels".to_string(),
            expected: "an array".to_string(),
            found: "a string".to_string(),
        }
        .into();
        assert!(!usage.is_failure());
        assert!(usage.as_failure().is_none());
    }
}
