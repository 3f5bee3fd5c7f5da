// crates/hopchain-verify/src/chain.rs
//
// ChainVerifier: recomputes a hop chain from genesis and reports, per hop,
// every way it disagrees with the stored hashes.
//
// Mismatches are report data, never errors. The only error a verification
// can return is a failure of the injected digest primitive.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hopchain_core::crypto::{link_hash, CryptoProvider, GENESIS_HASH};
use hopchain_core::error::HopchainError;
use hopchain_core::hop::Hop;
use hopchain_core::traits::HopStore;

/// One defect found at a hop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HopFailure {
    /// One or more indices are missing before this hop.
    Gap { expected: u64, found: u64 },
    /// The hop's index is lower than the next expected one (duplicate or reordered).
    OutOfOrder { expected: u64, found: u64 },
    /// `prev_hash` is not the recomputed hash of the previous hop.
    PrevHashMismatch,
    /// `sha256_hash` is not `digest(expected_prev || content)`.
    HashMismatch,
}

/// Verification outcome for a single hop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HopResult {
    pub hop_index: u64,
    pub expected_index: u64,
    pub expected_prev_hash: String,
    pub actual_prev_hash: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub failures: Vec<HopFailure>,
}

impl HopResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn has(&self, failure: &HopFailure) -> bool {
        self.failures.contains(failure)
    }
}

/// Result of verifying a whole chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationReport {
    /// True iff every hop result is clean. An empty chain is valid.
    pub is_valid: bool,
    pub hop_count: u64,
    pub failing_hops: u64,
    /// Recomputed hash of the last hop; `None` for an empty chain.
    pub computed_chain_hash: Option<String>,
    pub results: Vec<HopResult>,
}

impl VerificationReport {
    /// Indices of hops with at least one failure, in chain order.
    pub fn failing_indices(&self) -> Vec<u64> {
        self.results
            .iter()
            .filter(|r| !r.is_clean())
            .map(|r| r.hop_index)
            .collect()
    }
}

/// Walks a hop chain and recomputes every link.
///
/// Never short-circuits: a content edit at index k reports `HashMismatch` at
/// k, and both `PrevHashMismatch` and `HashMismatch` at every later index,
/// because each expected hash is chained from the recomputed predecessor.
pub struct ChainVerifier {
    crypto: Arc<dyn CryptoProvider>,
}

impl ChainVerifier {
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    /// Verify `hops`, which must be ordered by `hop_index` as a repository
    /// returns them.
    pub fn verify(&self, hops: &[Hop]) -> Result<VerificationReport, HopchainError> {
        let mut results = Vec::with_capacity(hops.len());
        let mut expected_prev = GENESIS_HASH.to_string();
        let mut expected_index: u64 = 0;

        for hop in hops {
            let mut failures = Vec::new();

            if hop.hop_index > expected_index {
                failures.push(HopFailure::Gap {
                    expected: expected_index,
                    found: hop.hop_index,
                });
            } else if hop.hop_index < expected_index {
                failures.push(HopFailure::OutOfOrder {
                    expected: expected_index,
                    found: hop.hop_index,
                });
            }

            if hop.prev_hash != expected_prev {
                failures.push(HopFailure::PrevHashMismatch);
            }

            let expected_hash = link_hash(self.crypto.as_ref(), &expected_prev, &hop.content)?;
            if hop.sha256_hash != expected_hash {
                failures.push(HopFailure::HashMismatch);
            }

            results.push(HopResult {
                hop_index: hop.hop_index,
                expected_index,
                expected_prev_hash: expected_prev,
                actual_prev_hash: hop.prev_hash.clone(),
                expected_hash: expected_hash.clone(),
                actual_hash: hop.sha256_hash.clone(),
                failures,
            });

            expected_prev = expected_hash;
            expected_index = expected_index.max(hop.hop_index + 1);
        }

        let failing_hops = results.iter().filter(|r| !r.is_clean()).count() as u64;
        let report = VerificationReport {
            is_valid: failing_hops == 0,
            hop_count: hops.len() as u64,
            failing_hops,
            computed_chain_hash: results.last().map(|r| r.expected_hash.clone()),
            results,
        };

        if !report.is_valid {
            tracing::warn!(
                "Hop chain failed verification: {} of {} hops broken (first at index {:?})",
                report.failing_hops,
                report.hop_count,
                report.failing_indices().first()
            );
        }

        Ok(report)
    }

    /// Load a session's hops from `store` and verify them.
    pub async fn verify_session(
        &self,
        store: &dyn HopStore,
        session_id: &Uuid,
    ) -> Result<VerificationReport, HopchainError> {
        let hops = store.list_hops(session_id).await?;
        tracing::debug!("Verifying session {} ({} hops)", session_id, hops.len());
        self.verify(&hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopchain_core::crypto::Sha256Provider;
    use hopchain_core::hop::{HopType, TokenMethod};
    use hopchain_core::scoring::ScoreBreakdown;

    fn verifier() -> ChainVerifier {
        ChainVerifier::new(Arc::new(Sha256Provider::new()))
    }

    fn build_chain(contents: &[&str]) -> Vec<Hop> {
        let crypto = Sha256Provider::new();
        let session_id = Uuid::now_v7();
        let mut prev = GENESIS_HASH.to_string();
        let mut hops = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            let hash = link_hash(&crypto, &prev, content).unwrap();
            hops.push(Hop {
                session_id,
                hop_index: i as u64,
                hop_type: HopType::Execute,
                content: content.to_string(),
                tokens_in: 0,
                tokens_out: 0,
                token_method: TokenMethod::Estimated,
                latency_ms: 0,
                score: 100,
                score_breakdown: ScoreBreakdown::default(),
                timestamp: None,
                sha256_hash: hash.clone(),
                prev_hash: prev,
            });
            prev = hash;
        }
        hops
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let report = verifier().verify(&[]).unwrap();
        assert!(report.is_valid);
        assert_eq!(report.hop_count, 0);
        assert_eq!(report.computed_chain_hash, None);
    }

    #[test]
    fn test_intact_chain_is_valid() {
        let hops = build_chain(&["interpret", "route", "execute", "finalize"]);
        let report = verifier().verify(&hops).unwrap();
        assert!(report.is_valid);
        assert_eq!(report.hop_count, 4);
        assert_eq!(report.failing_hops, 0);
        assert_eq!(report.computed_chain_hash.as_deref(), Some(hops[3].sha256_hash.as_str()));
        assert_eq!(report.results[0].expected_prev_hash, GENESIS_HASH);
    }

    #[test]
    fn test_content_edit_cascades() {
        let mut hops = build_chain(&["a", "b", "c", "d"]);
        hops[1].content = "tampered".to_string();

        let report = verifier().verify(&hops).unwrap();
        assert!(!report.is_valid);
        assert!(report.results[0].is_clean());
        assert_eq!(report.results[1].failures, vec![HopFailure::HashMismatch]);
        for result in &report.results[2..] {
            assert!(result.has(&HopFailure::PrevHashMismatch));
            assert!(result.has(&HopFailure::HashMismatch));
        }
        assert_eq!(report.failing_indices(), vec![1, 2, 3]);
    }

    #[test]
    fn test_prev_hash_edit_reported_alone() {
        let mut hops = build_chain(&["a", "b"]);
        hops[0].prev_hash = "f".repeat(64);

        let report = verifier().verify(&hops).unwrap();
        assert_eq!(report.results[0].failures, vec![HopFailure::PrevHashMismatch]);
        assert!(report.results[1].is_clean());
    }

    #[test]
    fn test_missing_index_is_gap() {
        let mut hops = build_chain(&["a", "b", "c"]);
        hops.remove(1);

        let report = verifier().verify(&hops).unwrap();
        assert!(!report.is_valid);
        assert!(report.results[1].has(&HopFailure::Gap { expected: 1, found: 2 }));
        assert!(report.results[1].has(&HopFailure::PrevHashMismatch));
    }

    #[test]
    fn test_duplicate_index_is_out_of_order() {
        let mut hops = build_chain(&["a", "b"]);
        let duplicate = hops[1].clone();
        hops.push(duplicate);

        let report = verifier().verify(&hops).unwrap();
        assert!(report.results[2].has(&HopFailure::OutOfOrder { expected: 2, found: 1 }));
    }

    #[tokio::test]
    async fn test_verify_session_reads_from_store() {
        use hopchain_core::session::{Session, SessionTotals};
        use hopchain_core::traits::SessionStore;
        use hopchain_store::MemoryRepository;

        let repo = MemoryRepository::new();
        let session = Session::new("prompt", "fast");
        repo.create_session(&session).await.unwrap();

        let mut totals = SessionTotals::default();
        let mut tail = None;
        for mut hop in build_chain(&["a", "b", "c"]) {
            hop.session_id = session.id;
            repo.commit_hop(tail.as_ref(), &hop, &totals).await.unwrap();
            totals.hop_count += 1;
            totals.chain_hash = Some(hop.sha256_hash.clone());
            tail = Some(hop.tail());
        }

        let report = verifier().verify_session(&repo, &session.id).await.unwrap();
        assert!(report.is_valid);
        assert_eq!(report.hop_count, 3);
    }

    struct UnavailableCrypto;

    impl CryptoProvider for UnavailableCrypto {
        fn digest(&self, _data: &[u8]) -> Result<[u8; 32], HopchainError> {
            Err(HopchainError::CryptoUnavailable("no sha256".to_string()))
        }
    }

    #[test]
    fn test_missing_digest_is_an_error() {
        let hops = build_chain(&["a"]);
        let err = ChainVerifier::new(Arc::new(UnavailableCrypto))
            .verify(&hops)
            .unwrap_err();
        assert!(matches!(err, HopchainError::CryptoUnavailable(_)));
        assert!(ChainVerifier::new(Arc::new(UnavailableCrypto)).verify(&[]).unwrap().is_valid);
    }

    #[test]
    fn test_failure_serializes_with_kind_tag() {
        let json = serde_json::to_value(HopFailure::Gap { expected: 1, found: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "gap", "expected": 1, "found": 3}));
        let json = serde_json::to_value(HopFailure::HashMismatch).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "hash_mismatch"}));
    }
}
