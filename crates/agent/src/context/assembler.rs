//! Context assembly: documents and economic data for one turn.
//!
//! Both resolvers run concurrently. Neither can fail the turn: a missing or
//! failing retriever yields a placeholder, a missing or failing economic
//! resolver yields an empty section.

use finanbot_core::message::Message;
use finanbot_core::retrieval::{DocumentRetriever, Passage};
use finanbot_economy::EconomicResolver;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shown when no document index is available.
pub const NO_DOCUMENTS: &str = "No hay documentos disponibles.";

/// Shown when the index has nothing relevant for the query.
pub const NO_RELEVANT_DOCUMENTS: &str = "No se encontró información relevante en los documentos.";

// ── Types ─────────────────────────────────────────────────────────────────

/// Everything the prompt needs for one turn. Rebuilt every turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle {
    pub document_text: String,
    /// Empty when the query has no economic intent.
    pub economic_text: String,
    pub history: Vec<Message>,
}

impl ContextBundle {
    /// Non-empty sections, documents first, separated by a blank line.
    pub fn context_text(&self) -> String {
        [self.document_text.as_str(), self.economic_text.as_str()]
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ContextAssembler {
    retriever: Option<Arc<dyn DocumentRetriever>>,
    economic: Option<Arc<EconomicResolver>>,
}

impl ContextAssembler {
    pub fn new(
        retriever: Option<Arc<dyn DocumentRetriever>>,
        economic: Option<Arc<EconomicResolver>>,
    ) -> Self {
        Self {
            retriever,
            economic,
        }
    }

    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    pub fn has_economic_data(&self) -> bool {
        self.economic.is_some()
    }

    pub async fn assemble(&self, query: &str, history: &[Message]) -> ContextBundle {
        let (document_text, economic_text) =
            tokio::join!(self.document_context(query), self.economic_context(query));

        debug!(
            document_chars = document_text.len(),
            economic_chars = economic_text.len(),
            history = history.len(),
            "Context assembled"
        );

        ContextBundle {
            document_text,
            economic_text,
            history: history.to_vec(),
        }
    }

    async fn document_context(&self, query: &str) -> String {
        let Some(retriever) = &self.retriever else {
            return NO_DOCUMENTS.to_string();
        };

        match retriever.retrieve(query).await {
            Ok(passages) => format_passages(&passages),
            Err(e) => {
                warn!(error = %e, "Document retrieval failed");
                NO_DOCUMENTS.to_string()
            }
        }
    }

    async fn economic_context(&self, query: &str) -> String {
        match &self.economic {
            Some(resolver) => resolver.resolve(query).await,
            None => String::new(),
        }
    }
}

/// Numbered passage blocks with source and page.
pub fn format_passages(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return NO_RELEVANT_DOCUMENTS.to_string();
    }

    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "--- Documento {} ---\nFuente: {} (Página {})\nContenido:\n{}\n",
                i + 1,
                p.source,
                p.page,
                p.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
