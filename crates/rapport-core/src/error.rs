// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Rapport conversation core.

use thiserror::Error;

/// The primary error type used across all Rapport adapter traits and core operations.
#[derive(Debug, Error)]
pub enum RapportError {
    /// Configuration errors (invalid values, missing credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generation service errors (API failure, empty or malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Generated output did not have the expected shape.
    #[error("could not parse {what} from generated output")]
    Parse { what: String, raw: String },

    /// A unit of work found the world in a state it cannot proceed from
    /// (missing profile, empty display name, unknown conversation).
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RapportError {
    /// Shorthand for a storage error carrying only a message.
    pub fn storage(message: impl Into<String>) -> Self {
        RapportError::Storage {
            source: message.into().into(),
        }
    }

    /// Returns true for failures of the external generation call.
    ///
    /// These abort the current turn without touching relationship state.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            RapportError::Provider { .. } | RapportError::Timeout { .. } | RapportError::Parse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn generation_failures_are_classified() {
        let provider = RapportError::Provider {
            message: "503".into(),
            source: None,
        };
        let timeout = RapportError::Timeout {
            duration: Duration::from_secs(30),
        };
        let parse = RapportError::Parse {
            what: "reply".into(),
            raw: String::new(),
        };
        assert!(provider.is_generation_failure());
        assert!(timeout.is_generation_failure());
        assert!(parse.is_generation_failure());

        assert!(!RapportError::storage("disk full").is_generation_failure());
        assert!(!RapportError::Invariant("no profile".into()).is_generation_failure());
    }

    #[test]
    fn storage_shorthand_keeps_message() {
        let err = RapportError::storage("storage not initialized");
        assert_eq!(err.to_string(), "storage error: storage not initialized");
    }
}
