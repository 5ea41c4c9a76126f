//! The turn orchestrator.
//!
//! One user message moves through:
//!
//! 1. **Sanitize** card, account and security-code numbers
//! 2. **Screen input**; a block short-circuits before any generation
//! 3. **Assemble context** (documents and economic data, concurrently)
//! 4. **Generate**, streaming fragments to the sink while accumulating them
//! 5. **Screen output**; a block retracts everything already streamed
//! 6. **Commit** the exchange to the conversation
//!
//! Only step 6 mutates the conversation, so blocked, failed and cancelled
//! turns leave history untouched.

use crate::context::ContextAssembler;
use crate::prompt::SystemPrompt;
use crate::sink::{SinkClosed, TurnSink};
use crate::stream_event::{BlockStage, GENERATION_FAILED_CODE, TurnEvent};
use finanbot_config::AppConfig;
use finanbot_core::error::ProviderError;
use finanbot_core::message::{Conversation, Message};
use finanbot_core::provider::{Provider, ProviderRequest, Usage};
use finanbot_security::{
    AuditEvent, AuditLogger, BlockedResponses, ContentFilter, FilterError, TracingSink, sanitize,
    validate_financial_context,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Stages of a turn, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Sanitizing,
    ScreeningInput,
    AssemblingContext,
    Generating,
    ScreeningOutput,
    Committing,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Released to the user and committed.
    Completed {
        response: String,
        usage: Option<Usage>,
    },
    /// Stopped by screening; `notice` is what the user was shown.
    Blocked { stage: BlockStage, notice: String },
    /// Generation failed or timed out.
    Failed { reason: String },
    /// The sink went away mid-turn.
    Cancelled,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    fn terminal_event(&self, session_id: &str) -> Option<TurnEvent> {
        let session_id = session_id.to_string();
        match self {
            Self::Completed { usage, .. } => Some(TurnEvent::Completed {
                session_id,
                usage: usage.clone(),
            }),
            Self::Blocked { stage, .. } => Some(TurnEvent::Blocked {
                session_id,
                stage: *stage,
            }),
            Self::Failed { .. } => Some(TurnEvent::Failed {
                session_id,
                message: GENERATION_FAILED_CODE.into(),
            }),
            Self::Cancelled => None,
        }
    }
}

/// Text accumulated while streaming.
#[derive(Debug, Default)]
struct Generation {
    text: String,
    fragments: usize,
    usage: Option<Usage>,
}

enum GenerationError {
    Provider(ProviderError),
    Cancelled,
}

impl From<SinkClosed> for GenerationError {
    fn from(_: SinkClosed) -> Self {
        Self::Cancelled
    }
}

pub struct TurnOrchestrator {
    provider: Arc<dyn Provider>,
    model: String,
    assembler: ContextAssembler,
    filter: Arc<ContentFilter>,
    audit: Arc<AuditLogger>,
    responses: BlockedResponses,
    prompt: SystemPrompt,
    temperature: f32,
    max_tokens: Option<u32>,
    generation_timeout: Duration,
    require_financial_topic: bool,
}

impl TurnOrchestrator {
    /// Built-in rules, persona and random disclaimers.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, assembler: ContextAssembler) -> Self {
        Self {
            provider,
            model: model.into(),
            assembler,
            filter: Arc::new(ContentFilter::default()),
            audit: Arc::new(AuditLogger::with_sinks(vec![Box::new(TracingSink)])),
            responses: BlockedResponses::default(),
            prompt: SystemPrompt::default(),
            temperature: 0.0,
            max_tokens: None,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            require_financial_topic: false,
        }
    }

    /// Apply the `[safety]`, `[identity]` and generation settings.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        assembler: ContextAssembler,
    ) -> Result<Self, FilterError> {
        let filter = ContentFilter::from_config(&config.safety)?;
        let audit = AuditLogger::with_sinks(vec![Box::new(TracingSink)])
            .with_excerpt_chars(config.safety.excerpt_chars);

        Ok(Self::new(provider, model, assembler)
            .with_filter(Arc::new(filter))
            .with_audit(Arc::new(audit))
            .with_prompt(SystemPrompt::new(
                config.identity.system_prompt_override.as_deref(),
            ))
            .with_temperature(config.default_temperature)
            .with_max_tokens(Some(config.default_max_tokens))
            .with_generation_timeout(Duration::from_secs(config.generation_timeout_secs))
            .with_topic_check(config.safety.require_financial_topic))
    }

    pub fn with_filter(mut self, filter: Arc<ContentFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_responses(mut self, responses: BlockedResponses) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_topic_check(mut self, enabled: bool) -> Self {
        self.require_financial_topic = enabled;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    fn enter(&self, session_id: &str, state: TurnState) {
        debug!(session_id, ?state, "Turn state");
    }

    /// Run one turn. The sink always receives exactly one terminal event
    /// unless it closes first.
    pub async fn run_turn(
        &self,
        session_id: &str,
        conversation: &mut Conversation,
        raw: &str,
        sink: &mut dyn TurnSink,
    ) -> TurnOutcome {
        info!(session_id, chars = raw.chars().count(), "Processing turn");

        self.enter(session_id, TurnState::Sanitizing);
        let clean = sanitize(raw);

        self.enter(session_id, TurnState::ScreeningInput);
        let screening = self.filter.screen_input(&clean);
        if screening.blocked {
            self.audit
                .log(AuditEvent::input_blocked(&screening), session_id, raw);
            let notice = self.responses.input_blocked();
            let outcome = self.block(sink, BlockStage::Input, notice, false).await;
            return self.finish(session_id, sink, outcome).await;
        }

        if self.require_financial_topic {
            let check = validate_financial_context(&clean);
            if !check.valid {
                let reason = check.reason.unwrap_or_default();
                self.audit
                    .log(AuditEvent::OffTopic { reason }, session_id, raw);
                let notice = self.responses.off_topic();
                let outcome = self.block(sink, BlockStage::OffTopic, notice, false).await;
                return self.finish(session_id, sink, outcome).await;
            }
        }

        self.enter(session_id, TurnState::AssemblingContext);
        let bundle = self.assembler.assemble(&clean, &conversation.messages).await;

        self.enter(session_id, TurnState::Generating);
        let mut messages = Vec::with_capacity(bundle.history.len() + 2);
        messages.push(Message::system(self.prompt.render(&bundle.context_text())));
        messages.extend(bundle.history);
        messages.push(Message::user(clean.clone()));

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        };

        let mut generation = Generation::default();
        let result = tokio::time::timeout(
            self.generation_timeout,
            self.generate(request, sink, &mut generation),
        )
        .await;

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(GenerationError::Cancelled)) => {
                info!(session_id, "Client went away during generation");
                return TurnOutcome::Cancelled;
            }
            Ok(Err(GenerationError::Provider(e))) => Some(e.to_string()),
            Err(_) => Some(format!(
                "generation timed out after {}s",
                self.generation_timeout.as_secs()
            )),
        };

        if let Some(reason) = failure {
            warn!(session_id, reason = %reason, fragments = generation.fragments, "Generation failed");
            let outcome = self.fail(sink, reason, generation.fragments > 0).await;
            return self.finish(session_id, sink, outcome).await;
        }

        self.enter(session_id, TurnState::ScreeningOutput);
        let screening = self.filter.screen_output(&generation.text);
        if screening.blocked {
            self.audit
                .log(AuditEvent::output_blocked(&screening), session_id, raw);
            let notice = self.responses.output_blocked();
            let outcome = self
                .block(sink, BlockStage::Output, notice, generation.fragments > 0)
                .await;
            return self.finish(session_id, sink, outcome).await;
        }

        // The exchange is committed only once the client has the terminal marker.
        let outcome = TurnOutcome::Completed {
            response: generation.text,
            usage: generation.usage,
        };
        let outcome = self.finish(session_id, sink, outcome).await;
        if let TurnOutcome::Completed { response, .. } = &outcome {
            self.enter(session_id, TurnState::Committing);
            conversation.commit_turn(clean, response.clone());
            info!(
                session_id,
                response_chars = response.chars().count(),
                turns = conversation.turn_count(),
                "Turn completed"
            );
        }
        outcome
    }

    async fn generate(
        &self,
        request: ProviderRequest,
        sink: &mut dyn TurnSink,
        generation: &mut Generation,
    ) -> Result<(), GenerationError> {
        let mut rx = self
            .provider
            .stream(request)
            .await
            .map_err(GenerationError::Provider)?;

        let mut finished = false;
        while let Some(item) = rx.recv().await {
            let chunk = item.map_err(GenerationError::Provider)?;

            if let Some(text) = chunk.content.as_deref().filter(|t| !t.is_empty()) {
                generation.text.push_str(text);
                generation.fragments += 1;
                sink.emit(text).await?;
            }
            if chunk.usage.is_some() {
                generation.usage = chunk.usage;
            }
            if chunk.done {
                finished = true;
                break;
            }
        }

        if !finished {
            return Err(GenerationError::Provider(ProviderError::StreamInterrupted(
                "stream closed before the final chunk".into(),
            )));
        }
        Ok(())
    }

    async fn block(
        &self,
        sink: &mut dyn TurnSink,
        stage: BlockStage,
        notice: String,
        retract: bool,
    ) -> TurnOutcome {
        info!(?stage, "Turn blocked");
        if Self::replace_with_notice(sink, &notice, retract).await.is_err() {
            return TurnOutcome::Cancelled;
        }
        TurnOutcome::Blocked { stage, notice }
    }

    async fn fail(&self, sink: &mut dyn TurnSink, reason: String, retract: bool) -> TurnOutcome {
        let notice = self.responses.generation_failed();
        if Self::replace_with_notice(sink, &notice, retract).await.is_err() {
            return TurnOutcome::Cancelled;
        }
        TurnOutcome::Failed { reason }
    }

    async fn replace_with_notice(
        sink: &mut dyn TurnSink,
        notice: &str,
        retract: bool,
    ) -> Result<(), SinkClosed> {
        if retract {
            sink.retract().await?;
        }
        sink.notice(notice).await
    }

    async fn finish(&self, session_id: &str, sink: &mut dyn TurnSink, outcome: TurnOutcome) -> TurnOutcome {
        let Some(event) = outcome.terminal_event(session_id) else {
            return outcome;
        };
        match sink.finish(event).await {
            Ok(()) => outcome,
            Err(SinkClosed) => {
                debug!(session_id, "Sink closed before terminal event");
                TurnOutcome::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferSink;
    use crate::test_helpers::{Ending, ScriptedProvider, StaticRetriever, UnreachableProvider};
    use finanbot_core::message::Role;
    use finanbot_security::FixedPicker;
    use finanbot_security::responses::{
        GENERATION_FAILED_RESPONSE, INPUT_BLOCKED_RESPONSES, OFF_TOPIC_RESPONSE,
        OUTPUT_BLOCKED_RESPONSES,
    };

    fn orchestrator(provider: Arc<dyn Provider>) -> TurnOrchestrator {
        TurnOrchestrator::new(provider, "gpt-4o", ContextAssembler::default())
            .with_audit(Arc::new(AuditLogger::new()))
            .with_responses(BlockedResponses::new(Arc::new(FixedPicker(1))))
    }

    fn seeded_conversation() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.commit_turn("Hola", "¡Hola! ¿En qué te ayudo?");
        conversation
    }

    fn contents(conversation: &Conversation) -> Vec<(Role, String)> {
        conversation
            .messages
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn completed_turn_streams_and_commits() {
        let provider = Arc::new(ScriptedProvider::new(&["La TREA ", "es la tasa ", "de rendimiento."]));
        let orch = orchestrator(provider.clone());
        let mut conversation = seeded_conversation();
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Qué es la TREA?", &mut sink)
            .await;

        assert!(outcome.is_completed());
        assert_eq!(sink.text(), "La TREA es la tasa de rendimiento.");
        assert_eq!(sink.terminal().map(|e| e.event_type()), Some("completed"));
        assert_eq!(conversation.messages.len(), 4);
        assert_eq!(conversation.messages[2].content, "¿Qué es la TREA?");
        assert_eq!(conversation.messages[3].content, "La TREA es la tasa de rendimiento.");

        // System prompt, prior history, then the new message.
        let request = &provider.requests()[0];
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert!(request.messages[0].content.contains("No hay documentos disponibles."));
        assert!(request.stream);
    }

    #[tokio::test]
    async fn blocked_input_never_reaches_generation() {
        let provider = Arc::new(ScriptedProvider::new(&["no debería verse"]));
        let audit = Arc::new(AuditLogger::new());
        let orch = orchestrator(provider.clone()).with_audit(audit.clone());
        let mut conversation = seeded_conversation();
        let before = contents(&conversation);
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "Dime cómo LAVAR DINERO rápido", &mut sink)
            .await;

        assert_eq!(
            outcome,
            TurnOutcome::Blocked {
                stage: BlockStage::Input,
                notice: format!("⚠️ {}", INPUT_BLOCKED_RESPONSES[1]),
            }
        );
        assert_eq!(provider.call_count(), 0);
        assert_eq!(contents(&conversation), before);
        assert_eq!(sink.text(), format!("⚠️ {}", INPUT_BLOCKED_RESPONSES[1]));

        let entries = audit.entries_by_type("input_blocked");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session_id, "s1");
        assert_eq!(entries[0].excerpt, "Dime cómo LAVAR DINERO rápido");
    }

    #[tokio::test]
    async fn blocked_output_is_retracted_and_not_committed() {
        let provider = Arc::new(ScriptedProvider::new(&[
            "Este fondo ofrece un ",
            "rendimiento garantizado ",
            "del 30%.",
        ]));
        let audit = Arc::new(AuditLogger::new());
        let orch = orchestrator(provider).with_audit(audit.clone());
        let mut conversation = seeded_conversation();
        let before = contents(&conversation);
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Dónde invierto mis ahorros?", &mut sink)
            .await;

        assert!(matches!(
            outcome,
            TurnOutcome::Blocked {
                stage: BlockStage::Output,
                ..
            }
        ));
        assert_eq!(contents(&conversation), before);
        assert_eq!(sink.text(), format!("⚠️ {}", OUTPUT_BLOCKED_RESPONSES[1]));

        let kinds: Vec<&str> = sink.events().iter().map(|e| e.event_type()).collect();
        assert_eq!(
            kinds,
            vec!["fragment", "fragment", "fragment", "retract", "notice", "blocked"]
        );
        assert_eq!(audit.entries_by_type("output_blocked").len(), 1);
    }

    #[tokio::test]
    async fn sanitized_text_is_sent_and_committed() {
        let provider = Arc::new(ScriptedProvider::new(&["Nunca compartas esos datos."]));
        let orch = orchestrator(provider.clone());
        let mut conversation = Conversation::new();
        let mut sink = BufferSink::new();

        orch.run_turn(
            "s1",
            &mut conversation,
            "mi tarjeta es 4111 1111 1111 1111",
            &mut sink,
        )
        .await;

        let requests = provider.requests();
        let sent = &requests[0].messages.last().unwrap().content;
        assert_eq!(sent, "mi tarjeta es [TARJETA-OCULTA]");
        assert_eq!(conversation.messages[0].content, "mi tarjeta es [TARJETA-OCULTA]");
    }

    #[tokio::test]
    async fn provider_failure_emits_notice_without_commit() {
        let orch = orchestrator(Arc::new(UnreachableProvider));
        let mut conversation = seeded_conversation();
        let before = contents(&conversation);
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Qué es la CTS?", &mut sink)
            .await;

        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert_eq!(contents(&conversation), before);
        assert_eq!(sink.text(), format!("⚠️ {GENERATION_FAILED_RESPONSE}"));
        // Nothing was streamed, so nothing to retract.
        assert!(!sink.events().iter().any(|e| *e == TurnEvent::Retract));
    }

    #[tokio::test]
    async fn mid_stream_failure_retracts_partial_text() {
        let provider = Arc::new(ScriptedProvider::ending_with(
            &["La CTS es "],
            Ending::Error(ProviderError::StreamInterrupted("reset".into())),
        ));
        let orch = orchestrator(provider);
        let mut conversation = Conversation::new();
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Qué es la CTS?", &mut sink)
            .await;

        assert!(matches!(outcome, TurnOutcome::Failed { .. }));
        assert!(conversation.is_empty());
        let kinds: Vec<&str> = sink.events().iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, vec!["fragment", "retract", "notice", "failed"]);
    }

    #[tokio::test]
    async fn stream_closed_without_final_chunk_fails_without_commit() {
        let provider = Arc::new(ScriptedProvider::ending_with(&["La CTS es un benef"], Ending::Closed));
        let orch = orchestrator(provider);
        let mut conversation = seeded_conversation();
        let before = contents(&conversation);
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Qué es la CTS?", &mut sink)
            .await;

        match outcome {
            TurnOutcome::Failed { reason } => assert!(reason.contains("Stream interrupted")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(contents(&conversation), before);
        assert_eq!(sink.text(), format!("⚠️ {GENERATION_FAILED_RESPONSE}"));
        let kinds: Vec<&str> = sink.events().iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, vec!["fragment", "retract", "notice", "failed"]);
    }

    #[tokio::test]
    async fn failed_event_hides_provider_details() {
        let upstream = r#"{"error":"upstream org-XYZ quota key sk-123"}"#;
        let provider = Arc::new(ScriptedProvider::ending_with(
            &[],
            Ending::Error(ProviderError::ApiError {
                status_code: 500,
                message: upstream.into(),
            }),
        ));
        let orch = orchestrator(provider);
        let mut conversation = Conversation::new();
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Qué es la CTS?", &mut sink)
            .await;

        // The reason is kept for logs and callers.
        match &outcome {
            TurnOutcome::Failed { reason } => assert!(reason.contains("org-XYZ")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(
            sink.terminal(),
            Some(&TurnEvent::Failed {
                session_id: "s1".into(),
                message: GENERATION_FAILED_CODE.into(),
            })
        );
        assert!(!sink.text().contains("org-XYZ"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_generation_times_out() {
        let provider = Arc::new(ScriptedProvider::ending_with(&["Un momento"], Ending::Stall));
        let orch = orchestrator(provider).with_generation_timeout(Duration::from_secs(5));
        let mut conversation = Conversation::new();
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Qué es un fondo mutuo?", &mut sink)
            .await;

        match outcome {
            TurnOutcome::Failed { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(conversation.is_empty());
        assert_eq!(sink.text(), format!("⚠️ {GENERATION_FAILED_RESPONSE}"));
    }

    #[tokio::test]
    async fn disconnect_mid_stream_cancels_without_commit() {
        let provider = Arc::new(ScriptedProvider::new(&["uno ", "dos ", "tres"]));
        let orch = orchestrator(provider);
        let mut conversation = Conversation::new();
        let mut sink = BufferSink::disconnect_after(1);

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Qué es la TCEA?", &mut sink)
            .await;

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn disconnect_before_terminal_event_skips_commit() {
        let provider = Arc::new(ScriptedProvider::new(&["Respuesta completa."]));
        let orch = orchestrator(provider);
        let mut conversation = Conversation::new();
        // The fragment is delivered, the terminal marker is not.
        let mut sink = BufferSink::disconnect_after(1);

        let outcome = orch
            .run_turn("s1", &mut conversation, "Hola", &mut sink)
            .await;

        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn topic_check_is_off_by_default() {
        let provider = Arc::new(ScriptedProvider::new(&["Ganó el equipo local."]));
        let orch = orchestrator(provider.clone());
        let mut conversation = Conversation::new();
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Quién ganó el partido de fútbol ayer?", &mut sink)
            .await;
        assert!(outcome.is_completed());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn topic_check_redirects_off_topic_messages() {
        let provider = Arc::new(ScriptedProvider::new(&["no debería verse"]));
        let audit = Arc::new(AuditLogger::new());
        let orch = orchestrator(provider.clone())
            .with_audit(audit.clone())
            .with_topic_check(true);
        let mut conversation = Conversation::new();
        let mut sink = BufferSink::new();

        let outcome = orch
            .run_turn("s1", &mut conversation, "¿Quién ganó el partido de fútbol ayer?", &mut sink)
            .await;

        assert!(matches!(
            outcome,
            TurnOutcome::Blocked {
                stage: BlockStage::OffTopic,
                ..
            }
        ));
        assert_eq!(sink.text(), OFF_TOPIC_RESPONSE);
        assert_eq!(provider.call_count(), 0);
        assert!(conversation.is_empty());
        assert_eq!(audit.entries_by_type("off_topic").len(), 1);

        // Short follow-ups still pass.
        let outcome = orch
            .run_turn("s1", &mut conversation, "gracias", &mut BufferSink::new())
            .await;
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn retrieved_passages_reach_the_system_prompt() {
        let provider = Arc::new(ScriptedProvider::new(&["ok"]));
        let assembler = ContextAssembler::new(Some(Arc::new(StaticRetriever::two_passages())), None);
        let orch = TurnOrchestrator::new(provider.clone(), "gpt-4o", assembler)
            .with_audit(Arc::new(AuditLogger::new()));

        orch.run_turn("s1", &mut Conversation::new(), "ahorros sin comisiones", &mut BufferSink::new())
            .await;

        let system = &provider.requests()[0].messages[0].content;
        assert!(system.contains("--- Documento 1 ---\nFuente: ahorros.txt (Página 1)"));
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = AppConfig::default();
        config.default_temperature = 0.3;
        config.generation_timeout_secs = 30;
        config.safety.require_financial_topic = true;
        config.identity.system_prompt_override = Some("Breve: {context}".into());

        let orch = TurnOrchestrator::from_config(
            &config,
            Arc::new(UnreachableProvider),
            "gpt-4o-mini",
            ContextAssembler::default(),
        )
        .unwrap();

        assert_eq!(orch.model(), "gpt-4o-mini");
        assert_eq!(orch.temperature, 0.3);
        assert_eq!(orch.max_tokens, Some(2048));
        assert_eq!(orch.generation_timeout, Duration::from_secs(30));
        assert!(orch.require_financial_topic);
        assert_eq!(orch.prompt.render("X"), "Breve: X");
    }

    #[test]
    fn from_config_rejects_bad_pattern() {
        let mut config = AppConfig::default();
        config.safety.input = Some(finanbot_config::RuleSetConfig {
            keywords: vec![],
            patterns: vec!["(".into()],
        });
        let result = TurnOrchestrator::from_config(
            &config,
            Arc::new(UnreachableProvider),
            "gpt-4o",
            ContextAssembler::default(),
        );
        assert!(result.is_err());
    }
}
