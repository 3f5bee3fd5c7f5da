// crates/hopchain-core/src/traits.rs
//
// Seams to the external collaborators: the entity repository and the
// language-model invocation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::error::HopchainError;
use crate::hop::{ChainTail, Hop};
use crate::packet::{Packet, PacketStatus};
use crate::routing::RoutingRule;
use crate::session::{Session, SessionStatus, SessionTotals};
use crate::template::Template;

/// Persistent Session records.
///
/// Implemented by hopchain-store (in-memory backend).
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session. Fails with `Validation` if the id exists.
    async fn create_session(&self, session: &Session) -> Result<(), HopchainError>;

    /// Retrieve a session by id.
    async fn get_session(&self, id: &Uuid) -> Result<Option<Session>, HopchainError>;

    /// Update status, model, prompt, output and error fields.
    ///
    /// Totals are owned by [`HopStore::commit_hop`]; implementations keep the
    /// stored totals and ignore `session.totals`.
    async fn update_session(&self, session: &Session) -> Result<(), HopchainError>;

    /// List all sessions, oldest first.
    async fn list_sessions(&self) -> Result<Vec<Session>, HopchainError>;

    /// List sessions in the given status.
    async fn filter_sessions(&self, status: SessionStatus) -> Result<Vec<Session>, HopchainError>;
}

/// Snapshot of a session's chain head: tail and totals read together.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState {
    pub tail: Option<ChainTail>,
    pub totals: SessionTotals,
}

/// Append-only hop storage with a conditional write.
#[async_trait]
pub trait HopStore: Send + Sync {
    /// Current tail and totals of a session. `NotFound` if the session is unknown.
    async fn chain_state(&self, session_id: &Uuid) -> Result<ChainState, HopchainError>;

    /// Atomically: check that the session's tail still equals `expected_tail`,
    /// insert `hop`, and replace the session totals with `totals`.
    ///
    /// Returns `ConcurrentAppendConflict` if the tail moved.
    async fn commit_hop(
        &self,
        expected_tail: Option<&ChainTail>,
        hop: &Hop,
        totals: &SessionTotals,
    ) -> Result<(), HopchainError>;

    /// All hops of a session ordered by `hop_index`.
    async fn list_hops(&self, session_id: &Uuid) -> Result<Vec<Hop>, HopchainError>;

    /// A single hop by position.
    async fn get_hop(&self, session_id: &Uuid, hop_index: u64) -> Result<Option<Hop>, HopchainError>;
}

/// Persistent Packet records.
#[async_trait]
pub trait PacketStore: Send + Sync {
    async fn create_packet(&self, packet: &Packet) -> Result<(), HopchainError>;

    async fn get_packet(&self, id: &Uuid) -> Result<Option<Packet>, HopchainError>;

    /// Overwrite a packet.
    ///
    /// Must reject (`Validation`) a write that changes the semantic fields of
    /// a signed packet while keeping its stored signature.
    async fn update_packet(&self, packet: &Packet) -> Result<(), HopchainError>;

    async fn list_packets(&self) -> Result<Vec<Packet>, HopchainError>;

    async fn filter_packets(&self, status: PacketStatus) -> Result<Vec<Packet>, HopchainError>;
}

/// The ordered routing rule list.
#[async_trait]
pub trait RoutingRuleStore: Send + Sync {
    /// Rules in evaluation order.
    async fn list_rules(&self) -> Result<Vec<RoutingRule>, HopchainError>;

    /// Replace the whole rule list after validating every rule.
    async fn replace_rules(&self, rules: &[RoutingRule]) -> Result<(), HopchainError>;
}

/// Template reference data.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn create_template(&self, template: &Template) -> Result<(), HopchainError>;

    async fn get_template(&self, id: &str) -> Result<Option<Template>, HopchainError>;

    async fn list_templates(&self) -> Result<Vec<Template>, HopchainError>;

    async fn filter_templates(&self, category: &str) -> Result<Vec<Template>, HopchainError>;

    /// Increment a template's reuse counter. Returns the new count.
    async fn record_template_use(&self, id: &str) -> Result<u64, HopchainError>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), HopchainError>;

    /// Entries oldest first, optionally only those for one packet.
    async fn list_audit(&self, packet_id: Option<&Uuid>) -> Result<Vec<AuditEntry>, HopchainError>;
}

/// Token usage reported by a model provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Result of a model invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// `None` when the provider did not report usage.
    pub usage: Option<Usage>,
}

/// Opaque language-model collaborator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run `prompt` on `model` and return its text and usage.
    async fn invoke(&self, model: &str, prompt: &str) -> Result<Completion, HopchainError>;
}
