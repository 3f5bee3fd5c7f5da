// crates/hopchain-ledger/src/builder.rs
//
// ChainBuilder: appends a hop to a session's chain.
//
// Append is optimistic: read the chain state (tail + totals), build the
// candidate hop and the new totals, then commit only if the tail is still
// the one that was read. A moved tail is retried a bounded number of times.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use hopchain_core::crypto::{link_hash, CryptoProvider, GENESIS_HASH};
use hopchain_core::error::HopchainError;
use hopchain_core::hop::{Hop, NewHop};
use hopchain_core::session::PricingModel;
use hopchain_core::traits::{ChainState, HopStore};

/// Conflicting commits tolerated before an append gives up.
pub const DEFAULT_MAX_APPEND_RETRIES: u32 = 5;

pub struct ChainBuilder {
    hops: Arc<dyn HopStore>,
    crypto: Arc<dyn CryptoProvider>,
    pricing: PricingModel,
    max_retries: u32,
}

impl ChainBuilder {
    pub fn new(hops: Arc<dyn HopStore>, crypto: Arc<dyn CryptoProvider>) -> Self {
        Self {
            hops,
            crypto,
            pricing: PricingModel::default(),
            max_retries: DEFAULT_MAX_APPEND_RETRIES,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingModel) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn crypto(&self) -> &Arc<dyn CryptoProvider> {
        &self.crypto
    }

    pub fn pricing(&self) -> &PricingModel {
        &self.pricing
    }

    /// Append `new_hop` to the chain of `session_id` and return the stored hop.
    ///
    /// # Errors
    /// - `NotFound` if the session does not exist.
    /// - `ConcurrentAppendConflict` if the tail kept moving for
    ///   `max_retries + 1` attempts.
    /// - Any storage or digest error, unretried.
    pub async fn append(&self, session_id: &Uuid, new_hop: NewHop) -> Result<Hop, HopchainError> {
        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            let state = self.hops.chain_state(session_id).await?;
            let hop = self.build_hop(session_id, &state, &new_hop)?;
            let totals = state.totals.with_hop(&hop, &self.pricing);

            match self.hops.commit_hop(state.tail.as_ref(), &hop, &totals).await {
                Ok(()) => {
                    tracing::debug!(
                        "Appended {} hop {} to session {} ({})",
                        hop.hop_type.as_str(),
                        hop.hop_index,
                        session_id,
                        hop.sha256_hash
                    );
                    return Ok(hop);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "Append conflict on session {} (attempt {}/{})",
                        session_id,
                        attempt,
                        attempts
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(HopchainError::ConcurrentAppendConflict {
            session_id: session_id.to_string(),
            attempts,
        })
    }

    fn build_hop(
        &self,
        session_id: &Uuid,
        state: &ChainState,
        new_hop: &NewHop,
    ) -> Result<Hop, HopchainError> {
        let (hop_index, prev_hash) = match &state.tail {
            Some(tail) => (tail.hop_index + 1, tail.sha256_hash.clone()),
            None => (0, GENESIS_HASH.to_string()),
        };
        let sha256_hash = link_hash(self.crypto.as_ref(), &prev_hash, &new_hop.content)?;

        Ok(Hop {
            session_id: *session_id,
            hop_index,
            hop_type: new_hop.hop_type,
            content: new_hop.content.clone(),
            tokens_in: new_hop.tokens_in,
            tokens_out: new_hop.tokens_out,
            token_method: new_hop.token_method,
            latency_ms: new_hop.latency_ms,
            score: new_hop.score,
            score_breakdown: new_hop.score_breakdown,
            timestamp: Some(Utc::now()),
            sha256_hash,
            prev_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use hopchain_core::crypto::Sha256Provider;
    use hopchain_core::hop::{ChainTail, HopType, TokenMethod};
    use hopchain_core::session::{Session, SessionTotals};
    use hopchain_core::traits::SessionStore;
    use hopchain_store::MemoryRepository;
    use hopchain_verify::ChainVerifier;

    fn crypto() -> Arc<dyn CryptoProvider> {
        Arc::new(Sha256Provider::new())
    }

    async fn setup() -> (Arc<MemoryRepository>, Uuid) {
        let repo = Arc::new(MemoryRepository::new());
        let session = Session::new("prompt", "fast");
        repo.create_session(&session).await.unwrap();
        (repo, session.id)
    }

    #[tokio::test]
    async fn test_first_hop_links_to_genesis() {
        let (repo, id) = setup().await;
        let builder = ChainBuilder::new(repo.clone(), crypto());

        let hop = builder.append(&id, NewHop::new(HopType::Interpret, "hello")).await.unwrap();
        assert_eq!(hop.hop_index, 0);
        assert_eq!(hop.prev_hash, GENESIS_HASH);
        assert_eq!(
            hop.sha256_hash,
            link_hash(&Sha256Provider::new(), GENESIS_HASH, "hello").unwrap()
        );
        assert!(hop.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_appends_link_and_accumulate_totals() {
        let (repo, id) = setup().await;
        let pricing = PricingModel {
            cost_per_1k_input: 1.0,
            cost_per_1k_output: 2.0,
            context_window: 1000,
        };
        let builder = ChainBuilder::new(repo.clone(), crypto()).with_pricing(pricing);

        let first = builder
            .append(
                &id,
                NewHop::new(HopType::Execute, "a")
                    .tokens(100, 50, TokenMethod::Exact)
                    .latency_ms(10)
                    .score(90),
            )
            .await
            .unwrap();
        let second = builder
            .append(
                &id,
                NewHop::new(HopType::Finalize, "b")
                    .tokens(200, 150, TokenMethod::Exact)
                    .latency_ms(5)
                    .score(70),
            )
            .await
            .unwrap();
        assert_eq!(second.hop_index, 1);
        assert_eq!(second.prev_hash, first.sha256_hash);

        let session = repo.get_session(&id).await.unwrap().unwrap();
        let totals = &session.totals;
        assert_eq!(totals.prompt_tokens, 300);
        assert_eq!(totals.completion_tokens, 200);
        assert_eq!(totals.total_tokens, 500);
        assert_eq!(totals.total_latency_ms, 15);
        assert_eq!(totals.session_score, 80);
        assert_eq!(totals.hop_count, 2);
        assert!((totals.cost_estimate - 0.7).abs() < 1e-9);
        assert!((totals.context_window_used - 30.0).abs() < 1e-9);
        assert_eq!(totals.chain_hash.as_deref(), Some(second.sha256_hash.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let repo = Arc::new(MemoryRepository::new());
        let builder = ChainBuilder::new(repo, crypto());
        let err = builder
            .append(&Uuid::now_v7(), NewHop::new(HopType::Execute, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, HopchainError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_form_valid_chain() {
        const WRITERS: u32 = 16;
        let (repo, id) = setup().await;
        // Each lost commit means another writer won, so WRITERS - 1 retries always suffice.
        let builder = Arc::new(ChainBuilder::new(repo.clone(), crypto()).with_max_retries(WRITERS));

        let mut handles = Vec::new();
        for i in 0..WRITERS {
            let builder = builder.clone();
            handles.push(tokio::spawn(async move {
                builder
                    .append(&id, NewHop::new(HopType::Transform, format!("step {}", i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let hops = repo.list_hops(&id).await.unwrap();
        let indices: Vec<u64> = hops.iter().map(|h| h.hop_index).collect();
        assert_eq!(indices, (0..u64::from(WRITERS)).collect::<Vec<_>>());
        assert!(ChainVerifier::new(crypto()).verify(&hops).unwrap().is_valid);
        let session = repo.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.totals.hop_count, u64::from(WRITERS));
    }

    /// Store whose tail always moves between read and commit.
    struct AlwaysConflicting {
        commits: AtomicU32,
    }

    #[async_trait]
    impl HopStore for AlwaysConflicting {
        async fn chain_state(&self, _session_id: &Uuid) -> Result<ChainState, HopchainError> {
            Ok(ChainState {
                tail: None,
                totals: SessionTotals::default(),
            })
        }

        async fn commit_hop(
            &self,
            _expected_tail: Option<&ChainTail>,
            hop: &Hop,
            _totals: &SessionTotals,
        ) -> Result<(), HopchainError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Err(HopchainError::ConcurrentAppendConflict {
                session_id: hop.session_id.to_string(),
                attempts: 1,
            })
        }

        async fn list_hops(&self, _session_id: &Uuid) -> Result<Vec<Hop>, HopchainError> {
            Ok(Vec::new())
        }

        async fn get_hop(&self, _session_id: &Uuid, _hop_index: u64) -> Result<Option<Hop>, HopchainError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_conflict_surfaces_after_bounded_retries() {
        let store = Arc::new(AlwaysConflicting {
            commits: AtomicU32::new(0),
        });
        let builder = ChainBuilder::new(store.clone(), crypto()).with_max_retries(2);

        let err = builder
            .append(&Uuid::now_v7(), NewHop::new(HopType::Execute, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, HopchainError::ConcurrentAppendConflict { attempts: 3, .. }));
        assert_eq!(store.commits.load(Ordering::SeqCst), 3);
    }
}
