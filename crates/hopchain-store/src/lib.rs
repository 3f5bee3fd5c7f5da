// crates/hopchain-store/src/lib.rs
//
// hopchain-store: Reference storage layer for the Hopchain audit ledger.
//
// Provides a thread-safe in-memory repository implementing the session, hop,
// packet, routing-rule and template store traits from hopchain-core, plus
// JSON snapshots so the CLI can keep a repository between invocations.

pub mod memory;
pub mod snapshot;

// Re-export key types for ergonomic access from downstream crates.
pub use memory::MemoryRepository;
pub use snapshot::RepositorySnapshot;
