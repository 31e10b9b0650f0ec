//! Error types for almanac-chat

use thiserror::Error;

/// Result type alias using almanac-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing a turn
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the model client layer
    #[error(transparent)]
    Ai(#[from] almanac_ai::Error),

    /// Every model in the chain was tried and the last one failed too
    #[error("no model produced a reply (tried {}): {source}", tried.join(", "))]
    Exhausted {
        tried: Vec<String>,
        #[source]
        source: almanac_ai::Error,
    },
}

impl Error {
    /// Check if this error means no credential was configured
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Error::Ai(almanac_ai::Error::MissingCredential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_detection() {
        assert!(Error::from(almanac_ai::Error::MissingCredential).is_missing_credential());
        assert!(!Error::from(almanac_ai::Error::Aborted).is_missing_credential());
    }

    #[test]
    fn test_exhausted_display_lists_models() {
        let err = Error::Exhausted {
            tried: vec!["gemini-1.5-flash".into(), "gemini-1.5-pro".into()],
            source: almanac_ai::Error::ModelNotFound("gemini-1.5-pro".into()),
        };
        let text = err.to_string();
        assert!(text.contains("gemini-1.5-flash, gemini-1.5-pro"));
    }
}
