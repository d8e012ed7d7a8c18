//! Error taxonomy for the workflow stages and handlers
//!
//! Every variant except [`WorkflowError::NotFound`] is fatal to the stage or
//! invocation that raised it. `NotFound` is only recovered from by the
//! endpoint upsert handler, which turns a missing endpoint into a create.

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors raised by the workflow stages, handlers and control plane
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Bad or unsupported parameter
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inputs whose shapes cannot be reconciled
    #[error("Data shape error: {0}")]
    DataShape(String),

    /// Failure reported by a managed-platform call
    #[error("{operation} failed: {message}")]
    UpstreamService { operation: String, message: String },

    /// Resource absent on the control plane
    #[error("Could not find {kind} \"{name}\"")]
    NotFound { kind: String, name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkflowError {
    pub fn configuration(message: impl Into<String>) -> Self {
        WorkflowError::Configuration(message.into())
    }

    pub fn data_shape(message: impl Into<String>) -> Self {
        WorkflowError::DataShape(message.into())
    }

    pub fn upstream(operation: impl Into<String>, message: impl Into<String>) -> Self {
        WorkflowError::UpstreamService {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        WorkflowError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// True for the one expected, recoverable condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkflowError::NotFound { .. })
    }

    /// True when the caller supplied something invalid, as opposed to a
    /// failure somewhere downstream
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WorkflowError::Configuration(_) | WorkflowError::DataShape(_)
        )
    }

    /// Short, stable name of the variant for error payloads and logs
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Configuration(_) => "ConfigurationError",
            WorkflowError::DataShape(_) => "DataShapeError",
            WorkflowError::UpstreamService { .. } => "UpstreamServiceError",
            WorkflowError::NotFound { .. } => "NotFoundError",
            WorkflowError::Io(_) => "IoError",
            WorkflowError::Csv(_) => "CsvError",
            WorkflowError::Json(_) => "JsonError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_message() {
        let error = WorkflowError::configuration("invalid endpoint type");
        assert_eq!(
            error.to_string(),
            "Configuration error: invalid endpoint type"
        );
        assert_eq!(error.kind(), "ConfigurationError");
        assert!(error.is_client_error());
    }

    #[test]
    fn test_upstream_error_message() {
        let error = WorkflowError::upstream("CreateEndpointConfig", "throttled");
        assert_eq!(error.to_string(), "CreateEndpointConfig failed: throttled");
        assert!(!error.is_not_found());
        assert!(!error.is_client_error());
    }

    #[test]
    fn test_not_found_is_recoverable() {
        let error = WorkflowError::not_found("endpoint", "AutoML-Endpoint");
        assert!(error.is_not_found());
        assert_eq!(
            error.to_string(),
            "Could not find endpoint \"AutoML-Endpoint\""
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: WorkflowError = io.into();
        assert_eq!(error.kind(), "IoError");
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error + Send + Sync + 'static>() {}
        assert_std_error::<WorkflowError>();
    }
}
