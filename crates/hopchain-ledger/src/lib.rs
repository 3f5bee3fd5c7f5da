// crates/hopchain-ledger/src/lib.rs
//
// hopchain-ledger: Writing side of the Hopchain audit ledger.
//
// ChainBuilder appends hash-linked hops with an optimistic, bounded-retry
// conditional write. CommandRunner drives one command through the
// interpret -> route -> execute -> finalize hops. The replay check
// re-evaluates recorded routing decisions against the current rules.

pub mod builder;
pub mod replay;
pub mod runner;

// Re-export key types for ergonomic access from downstream crates.
pub use builder::{ChainBuilder, DEFAULT_MAX_APPEND_RETRIES};
pub use replay::{check_routing_replay, ReplayEntry, ReplayReport};
pub use runner::{normalize_prompt, CommandRunner, RunOutcome};
