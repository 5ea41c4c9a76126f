//! Turn orchestration for FinanBot.
//!
//! A turn moves a single user message through a fixed pipeline:
//!
//! 1. **Sanitize** payment data out of the message
//! 2. **Screen** it against the input rules
//! 3. **Assemble context** from product documents and BCRP indicators
//! 4. **Generate** a streamed answer through the configured provider
//! 5. **Screen** the full answer against the output rules
//! 6. **Commit** the exchange to the session history
//!
//! Front-ends receive the turn as a sequence of [`TurnEvent`]s through a
//! [`TurnSink`]; blocked or failed turns never touch history.

pub mod context;
pub mod orchestrator;
pub mod prompt;
pub mod service;
pub mod session;
pub mod sink;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use context::{ContextAssembler, ContextBundle, format_passages};
pub use orchestrator::{TurnOrchestrator, TurnOutcome, TurnState};
pub use prompt::{RETRIEVAL_ACTIVE_MESSAGE, SystemPrompt, WELCOME_MESSAGE, retrieval_status};
pub use service::AdvisorService;
pub use session::{Session, SessionManager};
pub use sink::{BufferSink, ChannelSink, SinkClosed, TurnSink};
pub use stream_event::{BlockStage, GENERATION_FAILED_CODE, TurnEvent};
