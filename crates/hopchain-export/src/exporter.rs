// crates/hopchain-export/src/exporter.rs
//
// SessionExporter: loads a session and its hops, verifies the chain, and
// assembles a signed ExportDocument.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use hopchain_core::canonical::CANONICAL_ENCODING;
use hopchain_core::crypto::CryptoProvider;
use hopchain_core::error::HopchainError;
use hopchain_core::traits::{HopStore, SessionStore};
use hopchain_verify::ChainVerifier;

use crate::document::{
    compute_signature, ComplianceFlags, ExportDocument, ExportMetadata, EXPORT_FORMAT_VERSION,
    SIGNATURE_SCOPE,
};

pub const DEFAULT_EXPORTER: &str = "hopchain";

pub struct SessionExporter {
    sessions: Arc<dyn SessionStore>,
    hops: Arc<dyn HopStore>,
    crypto: Arc<dyn CryptoProvider>,
    exporter: String,
    format_version: String,
}

impl SessionExporter {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        hops: Arc<dyn HopStore>,
        crypto: Arc<dyn CryptoProvider>,
    ) -> Self {
        Self {
            sessions,
            hops,
            crypto,
            exporter: DEFAULT_EXPORTER.to_string(),
            format_version: EXPORT_FORMAT_VERSION.to_string(),
        }
    }

    /// Identity recorded in the export metadata.
    pub fn with_exporter(mut self, exporter: impl Into<String>) -> Self {
        self.exporter = exporter.into();
        self
    }

    pub fn with_format_version(mut self, format_version: impl Into<String>) -> Self {
        self.format_version = format_version.into();
        self
    }

    /// Export a session. `NotFound` if it does not exist.
    ///
    /// A broken chain still exports; the report and compliance flags say so.
    pub async fn export(&self, session_id: &Uuid) -> Result<ExportDocument, HopchainError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or_else(|| HopchainError::NotFound(format!("session {}", session_id)))?;
        let hop_ledger = self.hops.list_hops(session_id).await?;

        let chain_verification = ChainVerifier::new(self.crypto.clone()).verify(&hop_ledger)?;
        let compliance = ComplianceFlags::derive(&hop_ledger, &chain_verification);

        let document_signature = compute_signature(
            self.crypto.as_ref(),
            &session,
            &hop_ledger,
            &chain_verification,
            &compliance,
        )?;

        tracing::info!(
            "Exported session {} ({} hops, chain valid: {})",
            session_id,
            hop_ledger.len(),
            chain_verification.is_valid
        );

        Ok(ExportDocument {
            export_metadata: ExportMetadata {
                exported_at: Utc::now(),
                exporter: self.exporter.clone(),
                format_version: self.format_version.clone(),
                canonical_encoding: CANONICAL_ENCODING.to_string(),
                signature_scope: SIGNATURE_SCOPE.iter().map(|s| s.to_string()).collect(),
            },
            session,
            hop_ledger,
            chain_verification,
            compliance,
            document_signature,
        })
    }
}
