// crates/hopchain-verify/src/lib.rs
//
// hopchain-verify: Integrity checks for the Hopchain audit ledger.
//
// ChainVerifier recomputes a session's hop chain and reports every broken
// link. PacketSigner / PacketVerifier compute and check content-integrity
// hashes over a packet's semantic fields, and PacketShare wraps a packet for
// transfer between repositories.

pub mod chain;
pub mod packet;
pub mod share;

// Re-export key types for ergonomic access from downstream crates.
pub use chain::{ChainVerifier, HopFailure, HopResult, VerificationReport};
pub use packet::{PacketSigner, PacketVerification, PacketVerifier};
pub use share::PacketShare;
