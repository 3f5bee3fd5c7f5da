// crates/hopchain-core/src/lib.rs
//
// hopchain-core: Core types, traits, and digest primitives for the Hopchain
// audit ledger.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the data model (sessions, hops, packets, routing rules,
// templates, audit entries), the error type, the injected digest capability,
// the canonical JSON encoding, response redaction, and the trait interfaces
// to the entity repository and the language-model collaborator.

pub mod audit;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod hop;
pub mod packet;
pub mod redact;
pub mod routing;
pub mod scoring;
pub mod session;
pub mod template;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use hopchain_core::Hop;`

// Hop types
pub use hop::{ChainTail, Hop, HopType, NewHop, TokenMethod};

// Session types
pub use session::{PricingModel, Session, SessionStatus, SessionTotals};

// Packet types
pub use packet::{Packet, PacketLogic, PacketStatus, SignableContent};

// Audit types
pub use audit::{AuditAction, AuditEntry};

// Routing and template types
pub use routing::{RoutingRule, RuleCondition};
pub use template::Template;

// Scoring
pub use scoring::{estimate_tokens, score_compiled_hop, score_hop, HopScore, ScoreBreakdown};

// Crypto
pub use crypto::{CryptoProvider, Sha256Provider, GENESIS_HASH};

// Error type
pub use error::HopchainError;

// Traits
pub use traits::{
    AuditLogStore, ChainState, Completion, HopStore, LanguageModel, PacketStore, RoutingRuleStore,
    SessionStore, TemplateStore, Usage,
};
