//! Advisor service: sessions plus the orchestrator, exposed as event streams.
//!
//! Front-ends (HTTP gateway, terminal) call [`AdvisorService::submit_turn`]
//! and forward the resulting [`TurnEvent`]s. Dropping the stream cancels the
//! turn without committing it.

use crate::orchestrator::{TurnOrchestrator, TurnOutcome};
use crate::session::{Session, SessionManager};
use crate::sink::{ChannelSink, TurnSink};
use crate::stream_event::TurnEvent;
use finanbot_core::error::Error;
use finanbot_core::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Events buffered per turn before the producer waits on the client.
const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AdvisorService {
    orchestrator: Arc<TurnOrchestrator>,
    sessions: Arc<SessionManager>,
}

impl AdvisorService {
    pub fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: Arc::new(SessionManager::new()),
        }
    }

    /// Evict sessions left idle for longer than `ttl`.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.sessions = Arc::new(SessionManager::with_idle_ttl(ttl));
        self
    }

    pub fn orchestrator(&self) -> &Arc<TurnOrchestrator> {
        &self.orchestrator
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub async fn start_session(&self) -> Arc<Session> {
        self.sessions.start_session().await
    }

    pub async fn end_session(&self, session_id: &str) -> bool {
        self.sessions.end_session(session_id).await
    }

    pub async fn history(&self, session_id: &str) -> Option<Vec<Message>> {
        self.sessions.history(session_id).await
    }

    /// Run one turn in the background and stream its events.
    ///
    /// The session lock is taken before this returns and held for the whole
    /// turn, so submissions on one session run in the order they were made,
    /// each starting only after the previous one reached a terminal event.
    pub async fn submit_turn(&self, session: Arc<Session>, message: String) -> ReceiverStream<TurnEvent> {
        let (mut sink, rx) = ChannelSink::channel(EVENT_BUFFER);
        let orchestrator = self.orchestrator.clone();
        let mut conversation = session.lock_owned().await;

        tokio::spawn(async move {
            let session_id = session.id.as_str();
            let outcome = orchestrator
                .run_turn(session_id, &mut conversation, &message, &mut sink)
                .await;
            session.touch();
            if outcome == TurnOutcome::Cancelled {
                debug!(session_id, "Turn cancelled by client");
            }
        });

        ReceiverStream::new(rx)
    }

    /// [`submit_turn`](Self::submit_turn) by session id.
    pub async fn submit_turn_by_id(
        &self,
        session_id: &str,
        message: String,
    ) -> Result<ReceiverStream<TurnEvent>, Error> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        Ok(self.submit_turn(session, message).await)
    }

    /// Run a turn inline against any sink (used by the terminal front-end).
    pub async fn run_turn_with(
        &self,
        session: &Session,
        message: &str,
        sink: &mut dyn TurnSink,
    ) -> TurnOutcome {
        let mut conversation = session.lock_owned().await;
        let outcome = self
            .orchestrator
            .run_turn(session.id.as_str(), &mut conversation, message, sink)
            .await;
        session.touch();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextAssembler;
    use crate::sink::BufferSink;
    use crate::test_helpers::ScriptedProvider;
    use finanbot_security::AuditLogger;
    use tokio_stream::StreamExt;

    fn service(fragments: &[&str]) -> AdvisorService {
        let orchestrator = TurnOrchestrator::new(
            Arc::new(ScriptedProvider::new(fragments)),
            "gpt-4o",
            ContextAssembler::default(),
        )
        .with_audit(Arc::new(AuditLogger::new()));
        AdvisorService::new(Arc::new(orchestrator))
    }

    #[tokio::test]
    async fn streamed_turn_ends_with_completed_and_commits() {
        let service = service(&["Hola, ", "¿en qué te ayudo?"]);
        let session = service.start_session().await;
        let id = session.id.as_str().to_string();

        let events: Vec<TurnEvent> = service
            .submit_turn(session, "Hola".into())
            .await
            .collect()
            .await;

        let kinds: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, vec!["fragment", "fragment", "completed"]);

        let history = service.history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Hola, ¿en qué te ayudo?");
    }

    #[tokio::test]
    async fn queued_turns_run_in_submission_order() {
        let service = service(&["ok"]);
        let session = service.start_session().await;
        let id = session.id.as_str().to_string();

        // Stand-in for a turn in flight.
        let in_flight = session.lock_owned().await;

        let mut queued = Vec::new();
        for message in ["uno", "dos", "tres"] {
            let service = service.clone();
            let session = session.clone();
            queued.push(tokio::spawn(async move {
                service.submit_turn(session, message.into()).await
            }));
            // Let the task reach the lock queue before the next one starts.
            tokio::task::yield_now().await;
        }
        drop(in_flight);

        for handle in queued {
            let _: Vec<_> = handle.await.unwrap().collect().await;
        }

        let history = service.history(&id).await.unwrap();
        let asked: Vec<&str> = history.iter().step_by(2).map(|m| m.content.as_str()).collect();
        assert_eq!(asked, vec!["uno", "dos", "tres"]);
        assert!(history.iter().skip(1).step_by(2).all(|m| m.content == "ok"));
    }

    #[tokio::test]
    async fn sequential_submissions_keep_order() {
        let service = service(&["ok"]);
        let session = service.start_session().await;
        let id = session.id.as_str().to_string();

        let first = service.submit_turn(session.clone(), "uno".into()).await;
        let second_events = tokio::spawn({
            let service = service.clone();
            async move {
                let stream = service.submit_turn(session, "dos".into()).await;
                stream.collect::<Vec<_>>().await
            }
        });
        let first_events: Vec<_> = first.collect().await;
        let second_events = second_events.await.unwrap();

        assert!(matches!(first_events.last(), Some(TurnEvent::Completed { .. })));
        assert!(matches!(second_events.last(), Some(TurnEvent::Completed { .. })));
        let history = service.history(&id).await.unwrap();
        assert_eq!(history[0].content, "uno");
        assert_eq!(history[2].content, "dos");
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let service = service(&["ok"]);
        let result = service.submit_turn_by_id("missing", "Hola".into()).await;
        assert!(matches!(result, Err(Error::SessionNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn inline_turn_uses_given_sink() {
        let service = service(&["Respuesta"]);
        let session = service.start_session().await;
        let mut sink = BufferSink::new();

        let outcome = service.run_turn_with(&session, "Hola", &mut sink).await;
        assert!(outcome.is_completed());
        assert_eq!(sink.text(), "Respuesta");
    }

    #[tokio::test]
    async fn ended_session_has_no_history() {
        let service = service(&["ok"]);
        let session = service.start_session().await;
        let id = session.id.as_str().to_string();
        assert!(service.end_session(&id).await);
        assert!(service.history(&id).await.is_none());
    }
}
