//! Where a turn's output goes.
//!
//! The orchestrator streams fragments as they arrive and may later need to
//! take them back (output screening, generation failure). A [`TurnSink`]
//! receives those instructions; transports decide how to render them.

use crate::stream_event::TurnEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// The receiving side is gone (client disconnected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("turn sink closed")]
pub struct SinkClosed;

#[async_trait]
pub trait TurnSink: Send {
    /// Show a fragment of the response.
    async fn emit(&mut self, fragment: &str) -> Result<(), SinkClosed>;

    /// Discard every fragment emitted so far.
    async fn retract(&mut self) -> Result<(), SinkClosed>;

    /// Show a notice in place of the response.
    async fn notice(&mut self, text: &str) -> Result<(), SinkClosed>;

    /// Deliver the terminal event. Called exactly once per turn.
    async fn finish(&mut self, terminal: TurnEvent) -> Result<(), SinkClosed>;
}

/// Forwards every instruction as a [`TurnEvent`] over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TurnEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TurnEvent>) -> Self {
        Self { tx }
    }

    /// A sink plus the receiver its events arrive on.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<TurnEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    async fn send(&self, event: TurnEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }
}

#[async_trait]
impl TurnSink for ChannelSink {
    async fn emit(&mut self, fragment: &str) -> Result<(), SinkClosed> {
        self.send(TurnEvent::Fragment {
            content: fragment.to_string(),
        })
        .await
    }

    async fn retract(&mut self) -> Result<(), SinkClosed> {
        self.send(TurnEvent::Retract).await
    }

    async fn notice(&mut self, text: &str) -> Result<(), SinkClosed> {
        self.send(TurnEvent::Notice {
            content: text.to_string(),
        })
        .await
    }

    async fn finish(&mut self, terminal: TurnEvent) -> Result<(), SinkClosed> {
        self.send(terminal).await
    }
}

/// Keeps the currently visible text, replacing it on retract or notice.
/// Used by the terminal and by tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    visible: String,
    events: Vec<TurnEvent>,
    disconnect_after: Option<usize>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a client that goes away after `events` instructions.
    pub fn disconnect_after(events: usize) -> Self {
        Self {
            disconnect_after: Some(events),
            ..Self::default()
        }
    }

    /// What the user would currently see.
    pub fn text(&self) -> &str {
        &self.visible
    }

    pub fn events(&self) -> &[TurnEvent] {
        &self.events
    }

    pub fn terminal(&self) -> Option<&TurnEvent> {
        self.events.last().filter(|e| e.is_terminal())
    }

    fn record(&mut self, event: TurnEvent) -> Result<(), SinkClosed> {
        if self
            .disconnect_after
            .is_some_and(|limit| self.events.len() >= limit)
        {
            return Err(SinkClosed);
        }
        self.events.push(event);
        Ok(())
    }
}

#[async_trait]
impl TurnSink for BufferSink {
    async fn emit(&mut self, fragment: &str) -> Result<(), SinkClosed> {
        self.record(TurnEvent::Fragment {
            content: fragment.to_string(),
        })?;
        self.visible.push_str(fragment);
        Ok(())
    }

    async fn retract(&mut self) -> Result<(), SinkClosed> {
        self.record(TurnEvent::Retract)?;
        self.visible.clear();
        Ok(())
    }

    async fn notice(&mut self, text: &str) -> Result<(), SinkClosed> {
        self.record(TurnEvent::Notice {
            content: text.to_string(),
        })?;
        self.visible = text.to_string();
        Ok(())
    }

    async fn finish(&mut self, terminal: TurnEvent) -> Result<(), SinkClosed> {
        self.record(terminal)
    }
}
