//! Document retrieval trait.
//!
//! The advisor grounds its answers in passages taken from product
//! documents. Whatever builds and searches that corpus implements
//! [`DocumentRetriever`]; the assistant treats "no retriever configured" as
//! `Option::None`, never as an error.

use crate::error::RetrievalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A passage returned by document search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// The passage text.
    pub text: String,

    /// Source document label (usually the file name).
    pub source: String,

    /// 1-based page label within the source.
    pub page: usize,

    /// Relevance score assigned by the search.
    #[serde(default)]
    pub score: f32,
}

#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Return at most `k` passages for `query`, best first.
    async fn retrieve(&self, query: &str) -> std::result::Result<Vec<Passage>, RetrievalError>;

    /// The `k` used for each search.
    fn top_k(&self) -> usize;
}
