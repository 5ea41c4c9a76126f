//! Document retrieval for FinanBot.
//!
//! Product documents are split into overlapping chunks, optionally embedded
//! through the configured provider, persisted as a JSON index, and searched
//! by cosine similarity (or keyword overlap when no embeddings exist).

pub mod chunker;
pub mod index;
pub mod loader;
pub mod vector;

pub use chunker::TextSplitter;
pub use index::{Chunk, DocumentIndex, IndexSettings, IndexStats, open_index};
pub use loader::{LoadedPage, load_documents};
pub use vector::{cosine_similarity, keyword_score};
