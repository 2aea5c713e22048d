use serde::{Deserialize, Serialize};
use std::fmt;

/// Application-wide error types with categories for better error handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// No API credential is stored
    MissingApiKey,

    /// No model id is configured
    MissingModel,

    /// Neither usable text nor an image survived content resolution
    NoContent,

    /// A generation is already in flight
    Busy,

    /// Screenshot capture failed or is unsupported
    Capture(String),

    /// System OCR failed or is unsupported
    Ocr(String),

    /// Clipboard read/write failed
    Clipboard(String),

    /// Keystroke insertion failed
    Insert(String),

    /// Settings/history/credential storage errors
    Storage(String),

    /// Completion API errors (non-2xx body text or transport failure)
    Api(String),

    /// Completion text was not a JSON array
    ParseFailed,

    /// Every candidate was dropped during normalization
    NoCandidates,

    /// Generic errors that don't fit other categories
    Other(String),
}

/// Coarse grouping used to pick how an error is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    Capability,
    Transport,
    Contract,
    Other,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::MissingApiKey => write!(f, "No API key configured"),
            AppError::MissingModel => write!(f, "No model selected"),
            AppError::NoContent => write!(f, "No text or image to process"),
            AppError::Busy => write!(f, "A generation is already running"),
            AppError::Capture(msg) => write!(f, "Capture Error: {}", msg),
            AppError::Ocr(msg) => write!(f, "OCR Error: {}", msg),
            AppError::Clipboard(msg) => write!(f, "Clipboard Error: {}", msg),
            AppError::Insert(msg) => write!(f, "Insert Error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage Error: {}", msg),
            AppError::Api(msg) => write!(f, "API Error: {}", msg),
            AppError::ParseFailed => write!(f, "Completion was not a JSON array"),
            AppError::NoCandidates => write!(f, "No usable reply candidates"),
            AppError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Returns a user-friendly title for the error
    pub fn title(&self) -> &str {
        match self {
            AppError::MissingApiKey => "API Key Missing",
            AppError::MissingModel => "Model Missing",
            AppError::NoContent => "Nothing To Process",
            AppError::Busy => "Already Running",
            AppError::Capture(_) => "Capture Failed",
            AppError::Ocr(_) => "OCR Failed",
            AppError::Clipboard(_) => "Clipboard Problem",
            AppError::Insert(_) => "Insert Failed",
            AppError::Storage(_) => "Storage Error",
            AppError::Api(_) => "Request Failed",
            AppError::ParseFailed => "Response Not Usable",
            AppError::NoCandidates => "No Candidates",
            AppError::Other(_) => "Error",
        }
    }

    /// Returns the error message text
    pub fn message(&self) -> &str {
        match self {
            AppError::MissingApiKey => "No API key configured",
            AppError::MissingModel => "No model selected",
            AppError::NoContent => "No text or image to process",
            AppError::Busy => "A generation is already running",
            AppError::ParseFailed => "Completion was not a JSON array",
            AppError::NoCandidates => "No usable reply candidates",
            AppError::Capture(msg)
            | AppError::Ocr(msg)
            | AppError::Clipboard(msg)
            | AppError::Insert(msg)
            | AppError::Storage(msg)
            | AppError::Api(msg)
            | AppError::Other(msg) => msg,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::MissingApiKey
            | AppError::MissingModel
            | AppError::NoContent
            | AppError::Busy => ErrorKind::Precondition,
            AppError::Capture(_)
            | AppError::Ocr(_)
            | AppError::Clipboard(_)
            | AppError::Insert(_)
            | AppError::Storage(_) => ErrorKind::Capability,
            AppError::Api(_) => ErrorKind::Transport,
            AppError::ParseFailed | AppError::NoCandidates => ErrorKind::Contract,
            AppError::Other(_) => ErrorKind::Other,
        }
    }
}

/// Convert from String to AppError::Other
impl From<String> for AppError {
    fn from(error: String) -> Self {
        AppError::Other(error)
    }
}

/// Convert from &str to AppError::Other
impl From<&str> for AppError {
    fn from(error: &str) -> Self {
        AppError::Other(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::Api("server said no".to_string());
        assert_eq!(err.to_string(), "API Error: server said no");
    }

    #[test]
    fn test_error_title() {
        assert_eq!(AppError::ParseFailed.title(), "Response Not Usable");
        assert_eq!(AppError::MissingApiKey.title(), "API Key Missing");
    }

    #[test]
    fn test_kind_grouping() {
        assert_eq!(AppError::MissingModel.kind(), ErrorKind::Precondition);
        assert_eq!(AppError::Ocr("x".to_string()).kind(), ErrorKind::Capability);
        assert_eq!(AppError::Api("x".to_string()).kind(), ErrorKind::Transport);
        assert_eq!(AppError::NoCandidates.kind(), ErrorKind::Contract);
    }

    #[test]
    fn test_from_string() {
        let err: AppError = "test error".into();
        assert!(matches!(err, AppError::Other(_)));
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let json = serde_json::to_string(&AppError::Storage("disk full".to_string())).unwrap();
        assert!(json.contains("\"type\":\"Storage\""));
        assert!(json.contains("\"message\":\"disk full\""));
    }
}
