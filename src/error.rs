use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cfgedit
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("IO error: {source}")]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    #[error("Configuration file not found: {}", .path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Publishing is not enabled")]
    PublishDisabled,

    #[error("Publish failed: {message}")]
    PublishFailed { message: String },

    #[error("{0}")]
    Other(String),
}

impl EditorError {
    /// Create a new IO error with path context
    pub fn io_error(err: std::io::Error, path: Option<impl Into<PathBuf>>) -> Self {
        Self::Io {
            source: err,
            path: path.map(|p| p.into()),
        }
    }

    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    pub fn publish_failed(message: impl Into<String>) -> Self {
        Self::PublishFailed {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// HTTP status code reported to API callers
    pub fn status_code(&self) -> u16 {
        match self {
            EditorError::InvalidArgument { .. } | EditorError::ParseError { .. } => 400,
            EditorError::ConfigNotFound { .. } => 404,
            EditorError::PayloadTooLarge { .. } => 413,
            EditorError::PublishDisabled => 503,
            EditorError::Io { .. }
            | EditorError::PublishFailed { .. }
            | EditorError::Other(_) => 500,
        }
    }

    /// Short machine-readable tag for the error kind
    pub fn error_type(&self) -> &'static str {
        match self {
            EditorError::Io { .. } => "io_error",
            EditorError::ConfigNotFound { .. } => "config_not_found",
            EditorError::InvalidArgument { .. } => "invalid_argument",
            EditorError::ParseError { .. } => "parse_error",
            EditorError::PayloadTooLarge { .. } => "payload_too_large",
            EditorError::PublishDisabled => "publish_disabled",
            EditorError::PublishFailed { .. } => "publish_failed",
            EditorError::Other(_) => "other_error",
        }
    }

    /// JSON body for API error responses
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            EditorError::Io {
                source,
                path: Some(path),
            } => json!({
                "error": format!("IO error: {} (path: {})", source, path.display()),
                "error_type": self.error_type(),
            }),
            EditorError::ConfigNotFound { .. } => json!({
                "error": "Configuration file not found on the server.",
                "error_type": self.error_type(),
            }),
            EditorError::PublishFailed { message } => json!({
                "error": format!(
                    "Git command failed. Make sure your repository is clean and correctly configured. Error: {}",
                    message
                ),
                "error_type": self.error_type(),
            }),
            _ => json!({
                "error": self.to_string(),
                "error_type": self.error_type(),
            }),
        }
    }
}

impl From<std::io::Error> for EditorError {
    fn from(error: std::io::Error) -> Self {
        EditorError::io_error(error, None::<PathBuf>)
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(error: serde_json::Error) -> Self {
        EditorError::parse_error(error.to_string())
    }
}

impl From<serde_yaml::Error> for EditorError {
    fn from(error: serde_yaml::Error) -> Self {
        EditorError::parse_error(error.to_string())
    }
}

impl From<toml::de::Error> for EditorError {
    fn from(error: toml::de::Error) -> Self {
        EditorError::parse_error(error.to_string())
    }
}

impl From<toml::ser::Error> for EditorError {
    fn from(error: toml::ser::Error) -> Self {
        EditorError::parse_error(error.to_string())
    }
}

/// Result type alias using EditorError
pub type EditorResult<T> = Result<T, EditorError>;

/// Contextual error mapping function
pub fn map_io_err<P: Into<PathBuf>>(path: P) -> impl FnOnce(std::io::Error) -> EditorError {
    let path = path.into();
    move |err| EditorError::io_error(err, Some(path))
}
