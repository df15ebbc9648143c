use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Illegal state transition (e.g. completing a task that is not running)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Failure reported by the acquisition service
    #[error("Acquisition error ({code}): {message}")]
    Acquisition { code: String, message: String },

    /// Failure delivering a notification
    #[error("Notification error: {0}")]
    Notification(String),

    /// External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Money arithmetic that left the representable decimal range
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Check if error is an input validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }

    /// Overflow while computing `what`
    pub fn overflow(what: &str) -> Self {
        AppError::Overflow(format!("{} overflowed", what))
    }

    /// Errors worth retrying on a later scheduler cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Acquisition { .. } | AppError::ExternalService(_) | AppError::Notification(_)
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Acquisition {
                code: "timeout".to_string(),
                message: err.to_string(),
            }
        } else {
            AppError::ExternalService(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AppError::NotFound("task".into()).is_not_found());
        assert!(AppError::Validation("bad".into()).is_validation());
        assert!(AppError::Acquisition {
            code: "captcha".into(),
            message: "blocked by captcha".into(),
        }
        .is_transient());
        assert!(!AppError::Validation("bad".into()).is_transient());
    }

    #[test]
    fn test_overflow_is_not_transient() {
        let err = AppError::overflow("roi");
        assert_eq!(err.to_string(), "Arithmetic overflow: roi overflowed");
        assert!(!err.is_transient());
    }
}
