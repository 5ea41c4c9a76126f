//! # FinanBot Core
//!
//! Domain types, traits, and error definitions for the FinanBot advisory
//! assistant. This crate has no framework dependencies: it defines the
//! model that the other crates implement against.
//!
//! The two external collaborators of a turn are expressed as traits here:
//! - [`Provider`] for language generation (streaming and embeddings)
//! - [`DocumentRetriever`] for product-document passages
//!
//! Implementations live in `finanbot-providers` and `finanbot-retrieval`,
//! and tests substitute hand-written mocks.

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, RetrievalError};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, StreamChunk,
    Usage,
};
pub use retrieval::{DocumentRetriever, Passage};
