// crates/hopchain-core/src/error.rs

use thiserror::Error;

/// Workspace-wide error type for the Hopchain ledger.
///
/// Hash and prev-hash mismatches have no variant: a tampered chain is
/// reported as data in a verification report.
#[derive(Debug, Error)]
pub enum HopchainError {
    /// A session, hop, packet, or template referenced by id does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input: empty routing condition, missing packet fields,
    /// stale signature write, and similar caller mistakes.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The chain tail moved between read and conditional write.
    #[error("Concurrent append conflict on session {session_id} after {attempts} attempt(s)")]
    ConcurrentAppendConflict { session_id: String, attempts: u32 },

    /// The digest primitive is missing or failed.
    #[error("Crypto unavailable: {0}")]
    CryptoUnavailable(String),

    /// Repository failure (lock poisoning, backend I/O).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The language-model collaborator failed.
    #[error("Invocation error: {0}")]
    Invocation(String),
}

impl HopchainError {
    /// Whether the caller may retry the operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, HopchainError::ConcurrentAppendConflict { .. })
    }
}

impl From<serde_json::Error> for HopchainError {
    fn from(e: serde_json::Error) -> Self {
        HopchainError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_are_transient() {
        let conflict = HopchainError::ConcurrentAppendConflict {
            session_id: "s1".to_string(),
            attempts: 3,
        };
        assert!(conflict.is_transient());
        assert!(!HopchainError::NotFound("x".to_string()).is_transient());
        assert!(!HopchainError::CryptoUnavailable("x".to_string()).is_transient());
    }

    #[test]
    fn test_serde_json_error_maps_to_serialization() {
        let err: HopchainError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, HopchainError::Serialization(_)));
    }
}
