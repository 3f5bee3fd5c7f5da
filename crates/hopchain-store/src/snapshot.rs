// crates/hopchain-store/src/snapshot.rs
//
// Serializable copy of a MemoryRepository, stored as a single JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use hopchain_core::audit::AuditEntry;
use hopchain_core::error::HopchainError;
use hopchain_core::hop::Hop;
use hopchain_core::packet::Packet;
use hopchain_core::routing::RoutingRule;
use hopchain_core::session::Session;
use hopchain_core::template::Template;

/// Every record of a repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositorySnapshot {
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// Hops of all sessions, ordered by (session_id, hop_index).
    #[serde(default)]
    pub hops: Vec<Hop>,
    #[serde(default)]
    pub packets: Vec<Packet>,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
    #[serde(default)]
    pub templates: Vec<Template>,
    /// Audit entries, oldest first.
    #[serde(default)]
    pub audit_log: Vec<AuditEntry>,
}

impl RepositorySnapshot {
    /// Load a snapshot from a JSON file. A missing file yields an empty snapshot.
    pub fn load(path: &Path) -> Result<Self, HopchainError> {
        if !path.exists() {
            tracing::debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            HopchainError::Storage(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;
        let snapshot: RepositorySnapshot = serde_json::from_str(&contents)?;
        tracing::debug!(
            "Loaded snapshot {} ({} sessions, {} hops)",
            path.display(),
            snapshot.sessions.len(),
            snapshot.hops.len()
        );
        Ok(snapshot)
    }

    /// Write the snapshot as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), HopchainError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    HopchainError::Storage(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| {
            HopchainError::Storage(format!("Failed to write snapshot {}: {}", path.display(), e))
        })
    }
}
