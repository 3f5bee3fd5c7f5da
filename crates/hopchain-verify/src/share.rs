// crates/hopchain-verify/src/share.rs
//
// PacketShare: portable JSON envelope for moving a packet between
// repositories. Importing re-verifies the carried signature.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hopchain_core::error::HopchainError;
use hopchain_core::packet::{Packet, PacketStatus};

use crate::packet::PacketVerifier;

pub const SHARE_KIND: &str = "command_packet";
pub const SHARE_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacketShare {
    pub kind: String,
    pub version: String,
    pub packet: Packet,
    pub exported_at: DateTime<Utc>,
}

impl PacketShare {
    /// Wrap a packet for sharing.
    pub fn new(packet: &Packet) -> Self {
        Self {
            kind: SHARE_KIND.to_string(),
            version: SHARE_VERSION.to_string(),
            packet: packet.clone(),
            exported_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, HopchainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, HopchainError> {
        let share: PacketShare = serde_json::from_str(json)?;
        if share.kind != SHARE_KIND {
            return Err(HopchainError::Validation(format!(
                "unsupported share kind '{}'",
                share.kind
            )));
        }
        if share.version != SHARE_VERSION {
            return Err(HopchainError::Validation(format!(
                "unsupported share version '{}'",
                share.version
            )));
        }
        Ok(share)
    }

    /// Turn the shared packet into a fresh local packet.
    ///
    /// The result gets a new id and a zero execution count. A signed packet
    /// must still verify and stays signed; an unsigned one arrives as a draft.
    pub fn import(&self, verifier: &PacketVerifier) -> Result<Packet, HopchainError> {
        let mut packet = self.packet.clone();

        if packet.is_signed() {
            let check = verifier.verify(&packet)?;
            if !check.valid {
                tracing::warn!("Rejected shared packet {}: {}", self.packet.id, check.message);
                return Err(HopchainError::Validation(format!(
                    "shared packet {} rejected: {}",
                    self.packet.id, check.message
                )));
            }
        } else if packet.status() == PacketStatus::Signed {
            packet.clear_signature();
        }

        packet.id = Uuid::now_v7();
        packet.execution_count = 0;
        tracing::info!(
            "Imported shared packet {} as {} ({:?})",
            self.packet.id,
            packet.id,
            packet.status()
        );
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use hopchain_core::crypto::{CryptoProvider, Sha256Provider};
    use hopchain_core::packet::PacketLogic;
    use serde_json::json;

    use crate::packet::PacketSigner;

    fn crypto() -> Arc<dyn CryptoProvider> {
        Arc::new(Sha256Provider::new())
    }

    fn signed_packet() -> Packet {
        let mut packet = Packet::new(
            "data-sync",
            3,
            PacketLogic {
                system_prompt: "Sync records.".to_string(),
                template: "Sync {{from}} to {{to}}".to_string(),
                output_format: "markdown".to_string(),
            },
            json!({"from": "string", "to": "string"}),
        );
        packet.execution_count = 12;
        PacketSigner::new(crypto(), "alice").sign(&mut packet).unwrap();
        packet
    }

    #[test]
    fn test_intact_share_imports_signed() {
        let original = signed_packet();
        let json = PacketShare::new(&original).to_json().unwrap();

        let imported = PacketShare::from_json(&json)
            .unwrap()
            .import(&PacketVerifier::new(crypto()))
            .unwrap();
        assert_ne!(imported.id, original.id);
        assert_eq!(imported.execution_count, 0);
        assert_eq!(imported.status(), PacketStatus::Signed);
        assert!(imported.same_content(&original));
        assert!(PacketVerifier::new(crypto()).verify(&imported).unwrap().valid);
    }

    #[test]
    fn test_tampered_share_is_rejected() {
        let json = PacketShare::new(&signed_packet()).to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["packet"]["version"] = json!(4);

        let share = PacketShare::from_json(&value.to_string()).unwrap();
        let err = share.import(&PacketVerifier::new(crypto())).unwrap_err();
        assert!(matches!(err, HopchainError::Validation(_)));
    }

    #[test]
    fn test_unsigned_share_imports_as_draft() {
        let mut packet = signed_packet();
        packet.clear_signature();
        let imported = PacketShare::new(&packet)
            .import(&PacketVerifier::new(crypto()))
            .unwrap();
        assert_eq!(imported.status(), PacketStatus::Draft);
        assert!(!imported.is_signed());
    }

    #[test]
    fn test_signed_status_without_signature_imports_as_draft() {
        let mut value = serde_json::to_value(PacketShare::new(&signed_packet())).unwrap();
        value["packet"]["status"] = json!("signed");
        value["packet"]["signature"] = serde_json::Value::Null;

        let share = PacketShare::from_json(&value.to_string()).unwrap();
        assert_eq!(share.packet.status(), PacketStatus::Signed);
        assert!(!share.packet.is_signed());

        let imported = share.import(&PacketVerifier::new(crypto())).unwrap();
        assert_eq!(imported.status(), PacketStatus::Draft);
        assert!(!imported.is_signed());
        assert_eq!(imported.execution_count, 0);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let mut value = serde_json::to_value(PacketShare::new(&signed_packet())).unwrap();
        value["kind"] = json!("workflow");
        let err = PacketShare::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, HopchainError::Validation(_)));
    }
}
