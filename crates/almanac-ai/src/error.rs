//! Error types for almanac-ai

use thiserror::Error;

/// Result type alias using almanac-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when calling the generative model API
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (status: {status})")]
    Api { status: String, message: String },

    /// No API key was configured
    #[error("missing API credential")]
    MissingCredential,

    /// Authentication failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Requested model does not exist or cannot serve this request
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// The call did not finish within the configured deadline
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Request was aborted
    #[error("request aborted")]
    Aborted,

    /// Unexpected response format
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create an API error from status and message
    pub fn api(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status: status.into(),
            message: message.into(),
        }
    }

    /// Check if this error means the requested model cannot serve the call
    pub fn is_model_unavailable(&self) -> bool {
        match self {
            Error::ModelNotFound(_) => true,
            Error::Api { status, message } => {
                let st = status.to_lowercase();
                let msg = message.to_lowercase();
                st.contains("not_found")
                    || st == "404"
                    || msg.contains("not found")
                    || msg.contains("is not supported for generatecontent")
                    || msg.contains("has been deprecated")
            }
            _ => false,
        }
    }

    /// Check if this error is an authentication failure
    pub fn is_auth(&self) -> bool {
        match self {
            Error::MissingCredential | Error::Auth(_) => true,
            Error::Api { status, message } => {
                let st = status.to_lowercase();
                let msg = message.to_lowercase();
                st.contains("unauthenticated")
                    || st.contains("permission_denied")
                    || msg.contains("api key not valid")
                    || msg.contains("api key expired")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- is_model_unavailable ---

    #[test]
    fn test_unavailable_typed_variant() {
        assert!(Error::ModelNotFound("gemini-1.5-flash".into()).is_model_unavailable());
    }

    #[test]
    fn test_unavailable_api_not_found_status() {
        let e = Error::api("NOT_FOUND", "Requested entity was not found.");
        assert!(e.is_model_unavailable());
    }

    #[test]
    fn test_unavailable_api_numeric_status() {
        let e = Error::api("404", "no such model");
        assert!(e.is_model_unavailable());
    }

    #[test]
    fn test_unavailable_api_unsupported_method() {
        let e = Error::api(
            "INVALID_ARGUMENT",
            "models/gemini-1.0-ultra is not supported for generateContent",
        );
        assert!(e.is_model_unavailable());
    }

    #[test]
    fn test_unavailable_api_deprecated() {
        let e = Error::api("FAILED_PRECONDITION", "This model has been deprecated.");
        assert!(e.is_model_unavailable());
    }

    #[test]
    fn test_not_unavailable_auth_error() {
        let e = Error::api("UNAUTHENTICATED", "API key not valid. Please pass a valid API key.");
        assert!(!e.is_model_unavailable());
    }

    #[test]
    fn test_not_unavailable_other_variants() {
        assert!(!Error::MissingCredential.is_model_unavailable());
        assert!(!Error::Aborted.is_model_unavailable());
        assert!(!Error::Timeout { seconds: 120 }.is_model_unavailable());
        assert!(!Error::Sse("connection reset".into()).is_model_unavailable());
    }

    // --- is_auth ---

    #[test]
    fn test_auth_typed_variants() {
        assert!(Error::MissingCredential.is_auth());
        assert!(Error::Auth("bad key".into()).is_auth());
    }

    #[test]
    fn test_auth_api_unauthenticated() {
        let e = Error::api("UNAUTHENTICATED", "Request had invalid authentication credentials.");
        assert!(e.is_auth());
    }

    #[test]
    fn test_auth_api_invalid_key_message() {
        let e = Error::api("INVALID_ARGUMENT", "API key not valid. Please pass a valid API key.");
        assert!(e.is_auth());
    }

    #[test]
    fn test_not_auth_model_not_found() {
        assert!(!Error::ModelNotFound("x".into()).is_auth());
        assert!(!Error::api("NOT_FOUND", "Requested entity was not found.").is_auth());
    }
}
