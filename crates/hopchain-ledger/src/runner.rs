// crates/hopchain-ledger/src/runner.rs
//
// CommandRunner: executes one prompt end to end and records every step as
// a hop: interpret (compiled prompt), route (routing decision), execute
// (redacted model output), finalize (final output).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use hopchain_core::error::HopchainError;
use hopchain_core::hop::{Hop, HopType, NewHop, TokenMethod};
use hopchain_core::packet::Packet;
use hopchain_core::redact::redact_response;
use hopchain_core::scoring::{estimate_tokens, score_compiled_hop, score_hop};
use hopchain_core::session::{Session, SessionStatus};
use hopchain_core::traits::{LanguageModel, PacketStore, SessionStore};
use hopchain_routing::compiler::{
    CompileOptions, PromptCompiler, DEFAULT_MAX_TOKENS, MAX_PROMPT_LENGTH,
};
use hopchain_routing::rules::{prompt_length, RequestFeatures, RoutingDecision, RoutingRuleEngine};

use crate::builder::ChainBuilder;

/// Trim and collapse every whitespace run to a single space.
pub fn normalize_prompt(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The session as stored after the run, totals included.
    pub session: Session,
    pub hops: Vec<Hop>,
    pub decision: RoutingDecision,
}

pub struct CommandRunner {
    sessions: Arc<dyn SessionStore>,
    builder: ChainBuilder,
    model: Arc<dyn LanguageModel>,
    engine: RoutingRuleEngine,
    compiler: PromptCompiler,
    max_tokens: u64,
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

impl CommandRunner {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        builder: ChainBuilder,
        model: Arc<dyn LanguageModel>,
        engine: RoutingRuleEngine,
    ) -> Result<Self, HopchainError> {
        Ok(Self {
            sessions,
            builder,
            model,
            engine,
            compiler: PromptCompiler::new()?,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Completion budget ceiling written into compiled prompts.
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn engine(&self) -> &RoutingRuleEngine {
        &self.engine
    }

    /// Run `raw_prompt` and record it as a new session.
    ///
    /// Empty and over-long prompts are rejected with `Validation` before a
    /// session exists. Once the session is created, any failure marks it
    /// `error` with the message; hops recorded before the failure are kept.
    /// A failed model invocation is returned as `Invocation`.
    pub async fn run(&self, raw_prompt: &str) -> Result<RunOutcome, HopchainError> {
        let raw_length = prompt_length(raw_prompt);
        if raw_length > MAX_PROMPT_LENGTH {
            return Err(HopchainError::Validation(format!(
                "prompt exceeds maximum length ({} > {})",
                raw_length, MAX_PROMPT_LENGTH
            )));
        }
        let normalized = normalize_prompt(raw_prompt);
        if normalized.is_empty() {
            return Err(HopchainError::Validation("prompt is empty".to_string()));
        }
        let options = CompileOptions {
            context_window: self.builder.pricing().context_window,
            max_tokens: self.max_tokens,
            target_models: vec![self.engine.default_model().to_string()],
        };
        // A prompt the compiler rejects leaves no session behind.
        let mut compiled = self.compiler.compile(&normalized, &options)?;
        compiled.intent.raw_prompt_hash =
            Some(self.builder.crypto().digest_hex(raw_prompt.as_bytes())?);

        let mut session = Session::new(raw_prompt, self.engine.default_model());
        self.sessions.create_session(&session).await?;
        tracing::info!("Started session {}", session.id);

        match self.record(&mut session, &normalized, compiled.to_json()?).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("Session {} failed: {}", session.id, message);
                session.status = SessionStatus::Error;
                session.error_message = Some(message);
                if let Err(update) = self.sessions.update_session(&session).await {
                    tracing::warn!(
                        "Could not mark session {} as failed: {}",
                        session.id,
                        update
                    );
                }
                Err(e)
            }
        }
    }

    /// Execute a stored packet with `params` and count the execution.
    ///
    /// The execution count is only incremented when the run succeeds.
    pub async fn run_packet(
        &self,
        packets: &dyn PacketStore,
        packet_id: &Uuid,
        params: &BTreeMap<String, String>,
    ) -> Result<(RunOutcome, Packet), HopchainError> {
        let mut packet = packets
            .get_packet(packet_id)
            .await?
            .ok_or_else(|| HopchainError::NotFound(format!("packet {}", packet_id)))?;
        let prompt = packet.render_prompt(params)?;

        let outcome = self.run(&prompt).await?;

        packet.record_execution();
        packets.update_packet(&packet).await?;
        tracing::info!(
            "Executed packet {} v{} as session {} ({} executions)",
            packet.name(),
            packet.version(),
            outcome.session.id,
            packet.execution_count
        );
        Ok((outcome, packet))
    }

    async fn record(
        &self,
        session: &mut Session,
        normalized: &str,
        compiled_json: String,
    ) -> Result<RunOutcome, HopchainError> {
        let window = self.builder.pricing().context_window;

        session.status = SessionStatus::Compiling;
        self.sessions.update_session(session).await?;

        let mut hops = Vec::with_capacity(4);

        let score = score_compiled_hop(&compiled_json, 0, 0, 0, window);
        hops.push(
            self.builder
                .append(&session.id, NewHop::new(HopType::Interpret, compiled_json).scored(score))
                .await?,
        );

        let started = Instant::now();
        let decision = self.engine.route(&RequestFeatures::from_prompt(normalized));
        let latency = elapsed_ms(started);
        hops.push(
            self.builder
                .append(
                    &session.id,
                    NewHop::new(HopType::Route, decision.to_json()?)
                        .latency_ms(latency)
                        .scored(score_hop(0, 0, latency, window)),
                )
                .await?,
        );
        tracing::debug!(
            "Session {} routed to {} (rule {:?})",
            session.id,
            decision.model,
            decision.matched_rule
        );

        session.model_name = decision.model.clone();
        session.status = SessionStatus::Running;
        self.sessions.update_session(session).await?;

        let started = Instant::now();
        let completion = self
            .model
            .invoke(&decision.model, normalized)
            .await
            .map_err(|e| match e {
                HopchainError::Invocation(_) => e,
                other => HopchainError::Invocation(other.to_string()),
            })?;
        let latency = elapsed_ms(started);

        let (tokens_in, tokens_out, method) = match completion.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens, TokenMethod::Exact),
            None => (
                estimate_tokens(normalized),
                estimate_tokens(&completion.text),
                TokenMethod::Estimated,
            ),
        };
        let response = redact_response(&completion.text);
        hops.push(
            self.builder
                .append(
                    &session.id,
                    NewHop::new(HopType::Execute, response.clone())
                        .tokens(tokens_in, tokens_out, method)
                        .latency_ms(latency)
                        .scored(score_hop(tokens_in, tokens_out, latency, window)),
                )
                .await?,
        );

        let final_output = response.trim().to_string();
        hops.push(
            self.builder
                .append(
                    &session.id,
                    NewHop::new(HopType::Finalize, final_output.clone())
                        .scored(score_hop(0, 0, 0, window)),
                )
                .await?,
        );

        session.status = SessionStatus::Success;
        session.final_output = Some(final_output);
        self.sessions.update_session(session).await?;

        let stored = self
            .sessions
            .get_session(&session.id)
            .await?
            .ok_or_else(|| HopchainError::NotFound(format!("session {}", session.id)))?;
        tracing::info!(
            "Session {} completed: {} hops, score {}, {} tokens",
            stored.id,
            stored.totals.hop_count,
            stored.totals.session_score,
            stored.totals.total_tokens
        );

        Ok(RunOutcome {
            session: stored,
            hops,
            decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use hopchain_core::crypto::{CryptoProvider, Sha256Provider};
    use hopchain_core::hop::ChainTail;
    use hopchain_core::packet::PacketLogic;
    use hopchain_core::redact::REDACTED;
    use hopchain_core::routing::RoutingRule;
    use hopchain_core::session::SessionTotals;
    use hopchain_core::traits::{ChainState, Completion, HopStore, Usage};
    use hopchain_routing::compiler::{CompiledPrompt, IntentKind};
    use hopchain_store::MemoryRepository;
    use hopchain_verify::{ChainVerifier, PacketSigner, PacketVerifier};

    struct EchoModel {
        usage: Option<Usage>,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn invoke(&self, model: &str, prompt: &str) -> Result<Completion, HopchainError> {
            Ok(Completion {
                text: format!("  [{}] {}  ", model, prompt),
                usage: self.usage,
            })
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn invoke(&self, _model: &str, _prompt: &str) -> Result<Completion, HopchainError> {
            Err(HopchainError::Invocation("provider returned 503".to_string()))
        }
    }

    /// Answers with a JSON body that leaks a credential.
    struct LeakyModel;

    #[async_trait]
    impl LanguageModel for LeakyModel {
        async fn invoke(&self, _model: &str, _prompt: &str) -> Result<Completion, HopchainError> {
            Ok(Completion {
                text: r#"{"answer": "done", "api_key": "sk-live-123"}"#.to_string(),
                usage: None,
            })
        }
    }

    /// Hop store whose writes always fail.
    struct BrokenDisk {
        inner: Arc<MemoryRepository>,
    }

    #[async_trait]
    impl HopStore for BrokenDisk {
        async fn chain_state(&self, session_id: &Uuid) -> Result<ChainState, HopchainError> {
            self.inner.chain_state(session_id).await
        }

        async fn commit_hop(
            &self,
            _expected_tail: Option<&ChainTail>,
            _hop: &Hop,
            _totals: &SessionTotals,
        ) -> Result<(), HopchainError> {
            Err(HopchainError::Storage("disk full".to_string()))
        }

        async fn list_hops(&self, session_id: &Uuid) -> Result<Vec<Hop>, HopchainError> {
            self.inner.list_hops(session_id).await
        }

        async fn get_hop(&self, session_id: &Uuid, hop_index: u64) -> Result<Option<Hop>, HopchainError> {
            self.inner.get_hop(session_id, hop_index).await
        }
    }

    fn crypto() -> Arc<dyn CryptoProvider> {
        Arc::new(Sha256Provider::new())
    }

    fn engine() -> RoutingRuleEngine {
        RoutingRuleEngine::new(
            vec![
                RoutingRule::shorter_than(100, "fast"),
                RoutingRule::at_least(100, "smart"),
            ],
            "smart",
        )
        .unwrap()
    }

    fn runner(repo: &Arc<MemoryRepository>, model: Arc<dyn LanguageModel>) -> CommandRunner {
        CommandRunner::new(
            repo.clone(),
            ChainBuilder::new(repo.clone(), crypto()),
            model,
            engine(),
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_prompt() {
        assert_eq!(normalize_prompt("  sync \n\t data  "), "sync data");
        assert_eq!(normalize_prompt(""), "");
    }

    #[tokio::test]
    async fn test_run_records_four_hops() {
        let repo = Arc::new(MemoryRepository::new());
        let usage = Usage {
            prompt_tokens: 12,
            completion_tokens: 30,
        };
        let raw = "  Summarize   the report ";
        let outcome = runner(&repo, Arc::new(EchoModel { usage: Some(usage) }))
            .run(raw)
            .await
            .unwrap();

        let types: Vec<HopType> = outcome.hops.iter().map(|h| h.hop_type).collect();
        assert_eq!(
            types,
            vec![HopType::Interpret, HopType::Route, HopType::Execute, HopType::Finalize]
        );

        let compiled = CompiledPrompt::from_json(&outcome.hops[0].content).unwrap();
        assert_eq!(compiled.prompt, "Summarize the report");
        assert_eq!(compiled.intent.kind, IntentKind::Summarization);
        assert_eq!(
            compiled.intent.raw_prompt_hash,
            Some(crypto().digest_hex(raw.as_bytes()).unwrap())
        );
        assert_eq!(compiled.target_models, vec!["smart".to_string()]);
        assert_eq!(outcome.hops[0].score_breakdown.parse_validity, 20);
        assert_eq!(outcome.hops[0].tokens_in, 0);

        assert_eq!(outcome.decision.model, "fast");
        assert_eq!(
            RoutingDecision::from_json(&outcome.hops[1].content).unwrap(),
            outcome.decision
        );
        assert_eq!(outcome.hops[2].token_method, TokenMethod::Exact);
        assert_eq!(outcome.hops[3].content, "[fast] Summarize the report");

        let session = &outcome.session;
        assert_eq!(session.status, SessionStatus::Success);
        assert_eq!(session.model_name, "fast");
        assert_eq!(session.final_output.as_deref(), Some("[fast] Summarize the report"));
        assert_eq!(session.totals.prompt_tokens, 12);
        assert_eq!(session.totals.completion_tokens, 30);
        assert_eq!(session.totals.hop_count, 4);
        assert_eq!(
            session.totals.chain_hash.as_deref(),
            Some(outcome.hops[3].sha256_hash.as_str())
        );

        let stored = repo.list_hops(&session.id).await.unwrap();
        assert_eq!(stored, outcome.hops);
        assert!(ChainVerifier::new(crypto()).verify(&stored).unwrap().is_valid);
    }

    #[tokio::test]
    async fn test_missing_usage_is_estimated() {
        let repo = Arc::new(MemoryRepository::new());
        let outcome = runner(&repo, Arc::new(EchoModel { usage: None }))
            .run("abcdefgh")
            .await
            .unwrap();
        let execute = &outcome.hops[2];
        assert_eq!(execute.token_method, TokenMethod::Estimated);
        assert_eq!(execute.tokens_in, 2);
        assert_eq!(execute.tokens_out, estimate_tokens(&execute.content));
    }

    #[tokio::test]
    async fn test_failed_invocation_marks_session_error() {
        let repo = Arc::new(MemoryRepository::new());
        let err = runner(&repo, Arc::new(FailingModel)).run("hello").await.unwrap_err();
        assert!(matches!(err, HopchainError::Invocation(_)));

        let errored = repo.filter_sessions(SessionStatus::Error).await.unwrap();
        assert_eq!(errored.len(), 1);
        assert!(errored[0]
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("503"));
        assert_eq!(errored[0].totals.hop_count, 2);
    }

    #[tokio::test]
    async fn test_storage_failure_marks_session_error() {
        let repo = Arc::new(MemoryRepository::new());
        let broken = Arc::new(BrokenDisk { inner: repo.clone() });
        let runner = CommandRunner::new(
            repo.clone(),
            ChainBuilder::new(broken, crypto()),
            Arc::new(EchoModel { usage: None }),
            engine(),
        )
        .unwrap();

        let err = runner.run("hello").await.unwrap_err();
        assert!(matches!(err, HopchainError::Storage(_)));

        let sessions = repo.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, SessionStatus::Error);
        assert!(sessions[0]
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("disk full"));
    }

    #[tokio::test]
    async fn test_rejected_prompts_create_no_session() {
        let repo = Arc::new(MemoryRepository::new());
        let runner = runner(&repo, Arc::new(EchoModel { usage: None }));

        let empty = runner.run(" \n\t ").await.unwrap_err();
        assert!(matches!(empty, HopchainError::Validation(_)));

        let long = runner.run(&"a".repeat(MAX_PROMPT_LENGTH + 1)).await.unwrap_err();
        assert!(matches!(long, HopchainError::Validation(_)));

        // The limit applies to the prompt as submitted, before normalization.
        let padded = format!("short{}", " ".repeat(MAX_PROMPT_LENGTH));
        assert!(matches!(
            runner.run(&padded).await,
            Err(HopchainError::Validation(_))
        ));

        assert_eq!(repo.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_response_credentials_are_redacted() {
        let repo = Arc::new(MemoryRepository::new());
        let outcome = runner(&repo, Arc::new(LeakyModel)).run("finish up").await.unwrap();

        let execute = &outcome.hops[2];
        assert!(!execute.content.contains("sk-live-123"));
        assert!(execute.content.contains(REDACTED));
        assert!(execute.content.contains("done"));
        assert!(!outcome
            .session
            .final_output
            .as_deref()
            .unwrap_or_default()
            .contains("sk-live-123"));
    }

    #[tokio::test]
    async fn test_run_packet_counts_executions() {
        let repo = Arc::new(MemoryRepository::new());
        let mut packet = Packet::new(
            "status-report",
            1,
            PacketLogic {
                system_prompt: "Be brief.".to_string(),
                template: "Report status for {{team}}".to_string(),
                output_format: "text".to_string(),
            },
            Default::default(),
        );
        PacketSigner::new(crypto(), "ops").sign(&mut packet).unwrap();
        repo.create_packet(&packet).await.unwrap();

        let runner = runner(&repo, Arc::new(EchoModel { usage: None }));
        let params = BTreeMap::from([("team".to_string(), "infra".to_string())]);
        let (outcome, updated) = runner.run_packet(repo.as_ref(), &packet.id, &params).await.unwrap();
        assert!(outcome.hops[3].content.contains("Report status for infra"));
        assert_eq!(updated.execution_count, 1);

        runner.run_packet(repo.as_ref(), &packet.id, &params).await.unwrap();
        let stored = repo.get_packet(&packet.id).await.unwrap().unwrap();
        assert_eq!(stored.execution_count, 2);
        // Counting executions does not disturb the signature.
        assert!(PacketVerifier::new(crypto()).verify(&stored).unwrap().valid);

        let missing = runner
            .run_packet(repo.as_ref(), &Uuid::now_v7(), &params)
            .await
            .unwrap_err();
        assert!(matches!(missing, HopchainError::NotFound(_)));
    }
}
