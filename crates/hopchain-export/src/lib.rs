// crates/hopchain-export/src/lib.rs
//
// hopchain-export: Session export documents for the Hopchain audit ledger.
//
// An export bundles a session, its full hop ledger, a chain verification
// report and derived compliance flags, signed with a digest over a frozen
// canonical encoding so any holder can re-verify it offline.

pub mod document;
pub mod exporter;

// Re-export key types for ergonomic access from downstream crates.
pub use document::{
    ComplianceFlags, ExportDocument, ExportMetadata, ReverifyReport, EXPORT_FORMAT_VERSION,
    SIGNATURE_SCOPE,
};
pub use exporter::SessionExporter;
