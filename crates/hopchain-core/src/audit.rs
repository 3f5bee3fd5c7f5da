// crates/hopchain-core/src/audit.rs
//
// Append-only activity trail for packet lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to a packet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    PacketCreated,
    PacketSigned,
    PacketShared,
    PacketImported,
    PacketExecuted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PacketCreated => "packet_created",
            AuditAction::PacketSigned => "packet_signed",
            AuditAction::PacketShared => "packet_shared",
            AuditAction::PacketImported => "packet_imported",
            AuditAction::PacketExecuted => "packet_executed",
        }
    }
}

/// One audit log record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub packet_id: Uuid,
    pub action: AuditAction,
    /// Who performed the action.
    pub actor: String,
    /// Action-specific context, e.g. a signature prefix or import source.
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(packet_id: Uuid, action: AuditAction, actor: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            packet_id,
            action,
            actor: actor.into(),
            details: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}
