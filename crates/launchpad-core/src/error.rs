//! Error types for the Launchpad workspace.

use thiserror::Error;

/// A shared error type for the entire Launchpad workspace.
///
/// Repository and coordinator methods resolve with these variants; call sites
/// facing the user convert them into non-fatal notices.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LaunchpadError {
    /// No user identity is available. Fatal to any write operation.
    #[error("Not authenticated: sign in to continue")]
    NotAuthenticated,

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// An operation needed an active session but none is focused.
    #[error("No active session")]
    NoActiveSession,

    /// A view wrote to a session that is no longer the focused one.
    #[error("Session '{0}' is no longer focused")]
    SessionNotFocused(String),

    /// Remote read or write was rejected or could not be delivered.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The remote row moved since the local copy was last read.
    #[error("Conflict on {entity_type} '{id}': expected version {expected}, found {actual}")]
    Conflict {
        entity_type: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Insert collided with a uniqueness constraint.
    #[error("Unique constraint violated: {entity_type} {key}")]
    UniqueViolation {
        entity_type: &'static str,
        key: String,
    },

    /// A custom agent named a component key that is not registered.
    #[error("No plugin registered for component '{0}'")]
    PluginNotRegistered(String),

    /// The external completion service failed.
    #[error("Completion error: {0}")]
    Completion(String),

    /// Caller supplied input that cannot be processed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LaunchpadError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Creates a SessionNotFocused error
    pub fn not_focused(session_id: impl Into<String>) -> Self {
        Self::SessionNotFocused(session_id.into())
    }

    /// Creates a Completion error
    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, Self::NotAuthenticated)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_not_focused(&self) -> bool {
        matches!(self, Self::SessionNotFocused(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Returns true when a retry against fresh remote data may succeed.
    ///
    /// Stale-cache conditions (`NotFound`, `Conflict`) and transport failures
    /// qualify; authentication and input errors do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Conflict { .. } | Self::NotFound { .. }
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for LaunchpadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for LaunchpadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for LaunchpadError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for LaunchpadError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, LaunchpadError>`.
pub type Result<T> = std::result::Result<T, LaunchpadError>;
