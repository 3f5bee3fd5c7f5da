// crates/hopchain-export/src/document.rs
//
// The export document and its signature.
//
// `document_signature` is the hex digest of the canonical JSON of
// {session, hop_ledger, chain_verification, compliance}. Export metadata and
// the signature itself are outside the signed scope.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hopchain_core::canonical::canonical_digest_hex;
use hopchain_core::crypto::CryptoProvider;
use hopchain_core::error::HopchainError;
use hopchain_core::hop::Hop;
use hopchain_core::session::Session;
use hopchain_verify::{ChainVerifier, VerificationReport};

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Top-level fields covered by `document_signature`, in canonical order.
pub const SIGNATURE_SCOPE: [&str; 4] = ["chain_verification", "compliance", "hop_ledger", "session"];

/// Hops a session needs for its audit trail to count as complete.
pub const MIN_COMPLETE_HOPS: u64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub exporter: String,
    pub format_version: String,
    /// Name of the byte encoding the signature was computed over.
    pub canonical_encoding: String,
    pub signature_scope: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceFlags {
    pub tamper_evident: bool,
    pub audit_trail_complete: bool,
    pub timestamps_present: bool,
    pub hashes_verified: bool,
}

impl ComplianceFlags {
    pub fn derive(hops: &[Hop], report: &VerificationReport) -> Self {
        Self {
            tamper_evident: report.is_valid,
            audit_trail_complete: report.hop_count >= MIN_COMPLETE_HOPS,
            timestamps_present: hops.iter().all(|h| h.timestamp.is_some()),
            hashes_verified: report.is_valid,
        }
    }
}

/// Borrowed view of the signed part of a document.
#[derive(Serialize)]
struct SignedScope<'a> {
    session: &'a Session,
    hop_ledger: &'a [Hop],
    chain_verification: &'a VerificationReport,
    compliance: &'a ComplianceFlags,
}

pub(crate) fn compute_signature(
    crypto: &dyn CryptoProvider,
    session: &Session,
    hop_ledger: &[Hop],
    chain_verification: &VerificationReport,
    compliance: &ComplianceFlags,
) -> Result<String, HopchainError> {
    canonical_digest_hex(
        crypto,
        &SignedScope {
            session,
            hop_ledger,
            chain_verification,
            compliance,
        },
    )
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportDocument {
    pub export_metadata: ExportMetadata,
    pub session: Session,
    pub hop_ledger: Vec<Hop>,
    pub chain_verification: VerificationReport,
    pub compliance: ComplianceFlags,
    pub document_signature: String,
}

/// Outcome of re-verifying an export document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReverifyReport {
    /// The recomputed signature equals `document_signature`.
    pub signature_valid: bool,
    pub computed_signature: String,
    /// Chain verification recomputed from `hop_ledger`.
    pub chain_valid: bool,
    /// The recomputed report equals the embedded `chain_verification`.
    pub chain_report_matches: bool,
}

impl ReverifyReport {
    /// The document is authentic and its chain is intact.
    pub fn is_valid(&self) -> bool {
        self.signature_valid && self.chain_valid && self.chain_report_matches
    }
}

impl ExportDocument {
    pub fn to_json(&self) -> Result<String, HopchainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, HopchainError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Recompute the signature and the chain verification from the
    /// document's own contents, without any repository access.
    pub fn reverify(&self, crypto: Arc<dyn CryptoProvider>) -> Result<ReverifyReport, HopchainError> {
        let computed_signature = compute_signature(
            crypto.as_ref(),
            &self.session,
            &self.hop_ledger,
            &self.chain_verification,
            &self.compliance,
        )?;
        let recomputed = ChainVerifier::new(crypto).verify(&self.hop_ledger)?;

        let report = ReverifyReport {
            signature_valid: computed_signature == self.document_signature,
            computed_signature,
            chain_valid: recomputed.is_valid,
            chain_report_matches: recomputed == self.chain_verification,
        };
        if !report.is_valid() {
            tracing::warn!(
                "Export of session {} failed re-verification (signature {}, chain {}, report {})",
                self.session.id,
                report.signature_valid,
                report.chain_valid,
                report.chain_report_matches
            );
        }
        Ok(report)
    }
}
