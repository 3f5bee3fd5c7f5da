// crates/hopchain-store/src/memory.rs
//
// In-memory repository implementing every hopchain-core store trait.
//
// Sessions and hops live behind one lock so that `commit_hop` can check the
// chain tail, insert the hop, and replace the session totals as a single
// critical section. Packets, rules, templates and the audit log have their
// own locks.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use hopchain_core::audit::AuditEntry;
use hopchain_core::error::HopchainError;
use hopchain_core::hop::{ChainTail, Hop};
use hopchain_core::packet::{Packet, PacketStatus};
use hopchain_core::routing::RoutingRule;
use hopchain_core::session::{Session, SessionStatus, SessionTotals};
use hopchain_core::template::Template;
use hopchain_core::traits::{
    AuditLogStore, ChainState, HopStore, PacketStore, RoutingRuleStore, SessionStore,
    TemplateStore,
};

use crate::snapshot::RepositorySnapshot;

/// Sessions plus their hop chains.
#[derive(Debug, Default)]
struct Ledger {
    sessions: HashMap<Uuid, Session>,
    hops: HashMap<Uuid, Vec<Hop>>,
}

/// Thread-safe in-memory entity repository.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    ledger: RwLock<Ledger>,
    packets: RwLock<HashMap<Uuid, Packet>>,
    rules: RwLock<Vec<RoutingRule>>,
    templates: RwLock<Vec<Template>>,
    audit_log: RwLock<Vec<AuditEntry>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> HopchainError {
    HopchainError::Storage(format!("RwLock poisoned: {}", e))
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently stored.
    pub fn session_count(&self) -> Result<usize, HopchainError> {
        Ok(self.ledger.read().map_err(poisoned)?.sessions.len())
    }

    /// Replace a stored hop verbatim, bypassing the append path.
    ///
    /// Models direct tampering with the backing store; used by audit tests
    /// and tooling that imports foreign ledgers.
    pub fn overwrite_hop(&self, hop: &Hop) -> Result<(), HopchainError> {
        let mut ledger = self.ledger.write().map_err(poisoned)?;
        let chain = ledger
            .hops
            .get_mut(&hop.session_id)
            .ok_or_else(|| HopchainError::NotFound(format!("session {}", hop.session_id)))?;
        match chain.iter().position(|h| h.hop_index == hop.hop_index) {
            Some(pos) => chain[pos] = hop.clone(),
            None => {
                chain.push(hop.clone());
                chain.sort_by_key(|h| h.hop_index);
            }
        }
        Ok(())
    }

    /// Copy the whole repository into a serializable snapshot.
    pub fn snapshot(&self) -> Result<RepositorySnapshot, HopchainError> {
        let ledger = self.ledger.read().map_err(poisoned)?;
        let mut sessions: Vec<Session> = ledger.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.id);
        let mut hops: Vec<Hop> = ledger.hops.values().flatten().cloned().collect();
        hops.sort_by(|a, b| (a.session_id, a.hop_index).cmp(&(b.session_id, b.hop_index)));

        let mut packets: Vec<Packet> = self.packets.read().map_err(poisoned)?.values().cloned().collect();
        packets.sort_by_key(|p| p.id);

        Ok(RepositorySnapshot {
            sessions,
            hops,
            packets,
            rules: self.rules.read().map_err(poisoned)?.clone(),
            templates: self.templates.read().map_err(poisoned)?.clone(),
            audit_log: self.audit_log.read().map_err(poisoned)?.clone(),
        })
    }

    /// Rebuild a repository from a snapshot. Hops are stored as found,
    /// without re-linking, so a tampered snapshot stays tampered.
    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Result<Self, HopchainError> {
        let repo = Self::new();
        {
            let mut ledger = repo.ledger.write().map_err(poisoned)?;
            for session in snapshot.sessions {
                ledger.hops.entry(session.id).or_default();
                ledger.sessions.insert(session.id, session);
            }
            for hop in snapshot.hops {
                let chain = ledger.hops.get_mut(&hop.session_id).ok_or_else(|| {
                    HopchainError::Validation(format!(
                        "snapshot hop {} references unknown session {}",
                        hop.hop_index, hop.session_id
                    ))
                })?;
                chain.push(hop);
            }
            for chain in ledger.hops.values_mut() {
                chain.sort_by_key(|h| h.hop_index);
            }
        }
        {
            let mut packets = repo.packets.write().map_err(poisoned)?;
            for packet in snapshot.packets {
                packets.insert(packet.id, packet);
            }
        }
        *repo.rules.write().map_err(poisoned)? = snapshot.rules;
        *repo.templates.write().map_err(poisoned)? = snapshot.templates;
        *repo.audit_log.write().map_err(poisoned)? = snapshot.audit_log;
        Ok(repo)
    }
}

#[async_trait]
impl SessionStore for MemoryRepository {
    async fn create_session(&self, session: &Session) -> Result<(), HopchainError> {
        let mut ledger = self.ledger.write().map_err(poisoned)?;
        if ledger.sessions.contains_key(&session.id) {
            return Err(HopchainError::Validation(format!(
                "session {} already exists",
                session.id
            )));
        }
        ledger.hops.insert(session.id, Vec::new());
        ledger.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &Uuid) -> Result<Option<Session>, HopchainError> {
        let ledger = self.ledger.read().map_err(poisoned)?;
        Ok(ledger.sessions.get(id).cloned())
    }

    async fn update_session(&self, session: &Session) -> Result<(), HopchainError> {
        let mut ledger = self.ledger.write().map_err(poisoned)?;
        let stored = ledger
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| HopchainError::NotFound(format!("session {}", session.id)))?;
        let totals = std::mem::take(&mut stored.totals);
        *stored = session.clone();
        stored.totals = totals;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, HopchainError> {
        let ledger = self.ledger.read().map_err(poisoned)?;
        let mut sessions: Vec<Session> = ledger.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| (s.created_at, s.id));
        Ok(sessions)
    }

    async fn filter_sessions(&self, status: SessionStatus) -> Result<Vec<Session>, HopchainError> {
        let mut sessions = self.list_sessions().await?;
        sessions.retain(|s| s.status == status);
        Ok(sessions)
    }
}

#[async_trait]
impl HopStore for MemoryRepository {
    async fn chain_state(&self, session_id: &Uuid) -> Result<ChainState, HopchainError> {
        let ledger = self.ledger.read().map_err(poisoned)?;
        let session = ledger
            .sessions
            .get(session_id)
            .ok_or_else(|| HopchainError::NotFound(format!("session {}", session_id)))?;
        let tail = ledger
            .hops
            .get(session_id)
            .and_then(|chain| chain.last())
            .map(Hop::tail);
        Ok(ChainState {
            tail,
            totals: session.totals.clone(),
        })
    }

    async fn commit_hop(
        &self,
        expected_tail: Option<&ChainTail>,
        hop: &Hop,
        totals: &SessionTotals,
    ) -> Result<(), HopchainError> {
        let mut ledger = self.ledger.write().map_err(poisoned)?;
        if !ledger.sessions.contains_key(&hop.session_id) {
            return Err(HopchainError::NotFound(format!("session {}", hop.session_id)));
        }

        let chain = ledger.hops.entry(hop.session_id).or_default();
        let current_tail = chain.last().map(Hop::tail);
        if current_tail.as_ref() != expected_tail {
            return Err(HopchainError::ConcurrentAppendConflict {
                session_id: hop.session_id.to_string(),
                attempts: 1,
            });
        }

        let next_index = current_tail.map(|t| t.hop_index + 1).unwrap_or(0);
        if hop.hop_index != next_index {
            return Err(HopchainError::Validation(format!(
                "hop index {} does not follow tail (expected {})",
                hop.hop_index, next_index
            )));
        }

        chain.push(hop.clone());
        if let Some(session) = ledger.sessions.get_mut(&hop.session_id) {
            session.totals = totals.clone();
        }
        Ok(())
    }

    async fn list_hops(&self, session_id: &Uuid) -> Result<Vec<Hop>, HopchainError> {
        let ledger = self.ledger.read().map_err(poisoned)?;
        if !ledger.sessions.contains_key(session_id) {
            return Err(HopchainError::NotFound(format!("session {}", session_id)));
        }
        let mut hops = ledger.hops.get(session_id).cloned().unwrap_or_default();
        hops.sort_by_key(|h| h.hop_index);
        Ok(hops)
    }

    async fn get_hop(&self, session_id: &Uuid, hop_index: u64) -> Result<Option<Hop>, HopchainError> {
        let ledger = self.ledger.read().map_err(poisoned)?;
        Ok(ledger
            .hops
            .get(session_id)
            .and_then(|chain| chain.iter().find(|h| h.hop_index == hop_index))
            .cloned())
    }
}

#[async_trait]
impl PacketStore for MemoryRepository {
    async fn create_packet(&self, packet: &Packet) -> Result<(), HopchainError> {
        let mut packets = self.packets.write().map_err(poisoned)?;
        if packets.contains_key(&packet.id) {
            return Err(HopchainError::Validation(format!(
                "packet {} already exists",
                packet.id
            )));
        }
        packets.insert(packet.id, packet.clone());
        Ok(())
    }

    async fn get_packet(&self, id: &Uuid) -> Result<Option<Packet>, HopchainError> {
        Ok(self.packets.read().map_err(poisoned)?.get(id).cloned())
    }

    async fn update_packet(&self, packet: &Packet) -> Result<(), HopchainError> {
        let mut packets = self.packets.write().map_err(poisoned)?;
        let stored = packets
            .get_mut(&packet.id)
            .ok_or_else(|| HopchainError::NotFound(format!("packet {}", packet.id)))?;

        let keeps_old_signature =
            stored.signature().is_some() && stored.signature() == packet.signature();
        if keeps_old_signature && !stored.same_content(packet) {
            return Err(HopchainError::Validation(format!(
                "packet {} is signed; re-sign or clear the signature before changing its content",
                packet.id
            )));
        }

        *stored = packet.clone();
        Ok(())
    }

    async fn list_packets(&self) -> Result<Vec<Packet>, HopchainError> {
        let mut packets: Vec<Packet> = self.packets.read().map_err(poisoned)?.values().cloned().collect();
        packets.sort_by_key(|p| p.id);
        Ok(packets)
    }

    async fn filter_packets(&self, status: PacketStatus) -> Result<Vec<Packet>, HopchainError> {
        let mut packets = self.list_packets().await?;
        packets.retain(|p| p.status() == status);
        Ok(packets)
    }
}

#[async_trait]
impl RoutingRuleStore for MemoryRepository {
    async fn list_rules(&self) -> Result<Vec<RoutingRule>, HopchainError> {
        Ok(self.rules.read().map_err(poisoned)?.clone())
    }

    async fn replace_rules(&self, rules: &[RoutingRule]) -> Result<(), HopchainError> {
        for rule in rules {
            rule.validate()?;
        }
        *self.rules.write().map_err(poisoned)? = rules.to_vec();
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for MemoryRepository {
    async fn create_template(&self, template: &Template) -> Result<(), HopchainError> {
        let mut templates = self.templates.write().map_err(poisoned)?;
        if templates.iter().any(|t| t.id == template.id) {
            return Err(HopchainError::Validation(format!(
                "template {} already exists",
                template.id
            )));
        }
        templates.push(template.clone());
        Ok(())
    }

    async fn get_template(&self, id: &str) -> Result<Option<Template>, HopchainError> {
        let templates = self.templates.read().map_err(poisoned)?;
        Ok(templates.iter().find(|t| t.id == id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<Template>, HopchainError> {
        Ok(self.templates.read().map_err(poisoned)?.clone())
    }

    async fn filter_templates(&self, category: &str) -> Result<Vec<Template>, HopchainError> {
        let templates = self.templates.read().map_err(poisoned)?;
        Ok(templates
            .iter()
            .filter(|t| t.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect())
    }

    async fn record_template_use(&self, id: &str) -> Result<u64, HopchainError> {
        let mut templates = self.templates.write().map_err(poisoned)?;
        let template = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| HopchainError::NotFound(format!("template {}", id)))?;
        template.reuse_count += 1;
        Ok(template.reuse_count)
    }
}

#[async_trait]
impl AuditLogStore for MemoryRepository {
    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), HopchainError> {
        self.audit_log.write().map_err(poisoned)?.push(entry.clone());
        Ok(())
    }

    async fn list_audit(&self, packet_id: Option<&Uuid>) -> Result<Vec<AuditEntry>, HopchainError> {
        let log = self.audit_log.read().map_err(poisoned)?;
        Ok(log
            .iter()
            .filter(|e| packet_id.map_or(true, |id| e.packet_id == *id))
            .cloned()
            .collect())
    }
}
