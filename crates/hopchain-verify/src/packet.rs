// crates/hopchain-verify/src/packet.rs
//
// Content-integrity signatures for packets.
//
// A signature is the hex digest of the canonical JSON of the packet's four
// semantic fields {name, version, logic, parameter_schema}. It is not keyed:
// it detects modification, it does not prove authorship.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use hopchain_core::canonical::canonical_digest_hex;
use hopchain_core::crypto::CryptoProvider;
use hopchain_core::error::HopchainError;
use hopchain_core::packet::{Packet, PacketStatus};

pub const MSG_VALID: &str = "signature valid";
pub const MSG_NOT_SIGNED: &str = "packet is not signed";
pub const MSG_MISMATCH: &str = "signature mismatch — packet may have been modified";

/// Digest of a packet's current semantic fields.
pub fn content_signature(
    crypto: &dyn CryptoProvider,
    packet: &Packet,
) -> Result<String, HopchainError> {
    canonical_digest_hex(crypto, &packet.signable_content())
}

/// Signs packets on behalf of one identity.
pub struct PacketSigner {
    crypto: Arc<dyn CryptoProvider>,
    identity: String,
}

impl PacketSigner {
    pub fn new(crypto: Arc<dyn CryptoProvider>, identity: impl Into<String>) -> Self {
        Self {
            crypto,
            identity: identity.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Compute the signature, record it on the packet, and mark it signed.
    ///
    /// Fails with `Validation` for an empty name, version 0, or an archived
    /// packet.
    pub fn sign(&self, packet: &mut Packet) -> Result<String, HopchainError> {
        if packet.name().trim().is_empty() {
            return Err(HopchainError::Validation(
                "packet name must not be empty".to_string(),
            ));
        }
        if packet.version() == 0 {
            return Err(HopchainError::Validation(
                "packet version must be at least 1".to_string(),
            ));
        }
        if packet.status() == PacketStatus::Archived {
            return Err(HopchainError::Validation(format!(
                "packet {} is archived and cannot be signed",
                packet.id
            )));
        }

        let signature = content_signature(self.crypto.as_ref(), packet)?;
        packet.apply_signature(signature.clone(), self.identity.clone(), Utc::now());
        tracing::info!(
            "Signed packet {} ({} v{}) as {}",
            packet.id,
            packet.name(),
            packet.version(),
            self.identity
        );
        Ok(signature)
    }
}

/// Outcome of a signature check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacketVerification {
    pub valid: bool,
    pub message: String,
    /// Digest of the packet's current content.
    pub expected: String,
    /// Stored signature, if any.
    pub actual: Option<String>,
}

/// Recomputes packet signatures from current field values.
pub struct PacketVerifier {
    crypto: Arc<dyn CryptoProvider>,
}

impl PacketVerifier {
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    pub fn verify(&self, packet: &Packet) -> Result<PacketVerification, HopchainError> {
        let expected = content_signature(self.crypto.as_ref(), packet)?;
        let actual = packet.signature().map(str::to_string);

        let (valid, message) = match &actual {
            None => (false, MSG_NOT_SIGNED),
            Some(sig) if *sig == expected => (true, MSG_VALID),
            Some(_) => (false, MSG_MISMATCH),
        };
        if actual.is_some() && !valid {
            tracing::warn!("Packet {} failed signature verification", packet.id);
        }

        Ok(PacketVerification {
            valid,
            message: message.to_string(),
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopchain_core::crypto::Sha256Provider;
    use hopchain_core::packet::PacketLogic;
    use serde_json::json;

    fn crypto() -> Arc<dyn CryptoProvider> {
        Arc::new(Sha256Provider::new())
    }

    fn packet() -> Packet {
        Packet::new(
            "lead-capture",
            1,
            PacketLogic {
                system_prompt: "You capture leads.".to_string(),
                template: "Capture {{source}}".to_string(),
                output_format: "json".to_string(),
            },
            json!({"source": {"type": "string"}}),
        )
    }

    #[test]
    fn test_sign_then_verify() {
        let mut p = packet();
        let sig = PacketSigner::new(crypto(), "alice").sign(&mut p).unwrap();
        assert_eq!(sig.len(), 64);
        assert_eq!(p.status(), PacketStatus::Signed);
        assert_eq!(p.signed_by(), Some("alice"));
        assert!(p.signed_at().is_some());

        let result = PacketVerifier::new(crypto()).verify(&p).unwrap();
        assert!(result.valid);
        assert_eq!(result.message, MSG_VALID);
        assert_eq!(result.actual.as_deref(), Some(sig.as_str()));
    }

    #[test]
    fn test_signature_ignores_non_semantic_fields() {
        let mut a = packet();
        let mut b = packet();
        b.tags.push("sales".to_string());
        b.execution_count = 7;
        let signer = PacketSigner::new(crypto(), "alice");
        assert_eq!(signer.sign(&mut a).unwrap(), signer.sign(&mut b).unwrap());
    }

    #[test]
    fn test_unsigned_packet_is_not_valid() {
        let result = PacketVerifier::new(crypto()).verify(&packet()).unwrap();
        assert!(!result.valid);
        assert_eq!(result.message, MSG_NOT_SIGNED);
        assert_eq!(result.actual, None);
    }

    #[test]
    fn test_edit_through_setter_drops_signature() {
        let mut p = packet();
        PacketSigner::new(crypto(), "alice").sign(&mut p).unwrap();
        p.set_version(2);
        assert_eq!(p.status(), PacketStatus::Draft);
        let result = PacketVerifier::new(crypto()).verify(&p).unwrap();
        assert!(!result.valid);
        assert_eq!(result.message, MSG_NOT_SIGNED);
    }

    #[test]
    fn test_stale_signature_is_mismatch() {
        let mut p = packet();
        PacketSigner::new(crypto(), "alice").sign(&mut p).unwrap();

        // Edit the serialized form, as a tampered record would arrive.
        let mut value = serde_json::to_value(&p).unwrap();
        value["logic"]["template"] = json!("Exfiltrate {{source}}");
        let tampered: Packet = serde_json::from_value(value).unwrap();

        let result = PacketVerifier::new(crypto()).verify(&tampered).unwrap();
        assert!(!result.valid);
        assert_eq!(result.message, MSG_MISMATCH);
        assert_ne!(result.actual.as_deref(), Some(result.expected.as_str()));
    }

    #[test]
    fn test_sign_rejects_invalid_packets() {
        let signer = PacketSigner::new(crypto(), "alice");

        let mut unnamed = packet();
        unnamed.set_name("  ");
        assert!(matches!(signer.sign(&mut unnamed), Err(HopchainError::Validation(_))));

        let mut zero = packet();
        zero.set_version(0);
        assert!(matches!(signer.sign(&mut zero), Err(HopchainError::Validation(_))));

        let mut archived = packet();
        archived.archive();
        assert!(matches!(signer.sign(&mut archived), Err(HopchainError::Validation(_))));
    }
}
