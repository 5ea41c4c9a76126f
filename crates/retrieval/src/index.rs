//! Persistent document index.
//!
//! Chunks live in memory behind an `RwLock` and are written to a single JSON
//! file after every rebuild. An existing file is loaded instead of
//! re-ingesting, as long as it was built with the same chunking and
//! embedding settings.

use crate::chunker::TextSplitter;
use crate::loader::load_documents;
use crate::vector::{cosine_similarity, keyword_score, query_terms, top_indices};
use async_trait::async_trait;
use finanbot_config::RetrievalConfig;
use finanbot_core::{DocumentRetriever, EmbeddingRequest, Passage, Provider, RetrievalError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Inputs per embedding request.
const EMBED_BATCH: usize = 64;

/// `embedding_model` value that disables embeddings.
const NO_EMBEDDINGS: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub documents_dir: PathBuf,
    pub index_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl IndexSettings {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            documents_dir: config.documents_dir.clone(),
            index_path: config.index_path.clone(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.top_k.max(1),
        }
    }
}

/// One indexed piece of a document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub page: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// On-disk layout.
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    chunk_size: usize,
    chunk_overlap: usize,
    #[serde(default)]
    embedding_model: Option<String>,
    chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub sources: Vec<String>,
    pub top_k: usize,
    pub embedded: bool,
    pub documents_dir: PathBuf,
}

pub struct DocumentIndex {
    settings: IndexSettings,
    embedder: Option<Arc<dyn Provider>>,
    embedding_model: Option<String>,
    chunks: Arc<RwLock<Vec<Chunk>>>,
}

impl DocumentIndex {
    /// An empty index. Embeddings are used only when both a provider and a
    /// model are given.
    pub fn new(
        settings: IndexSettings,
        embedder: Option<Arc<dyn Provider>>,
        embedding_model: Option<String>,
    ) -> Self {
        let (embedder, embedding_model) = match (embedder, embedding_model) {
            (Some(p), Some(m)) => (Some(p), Some(m)),
            _ => (None, None),
        };
        Self {
            settings,
            embedder,
            embedding_model,
            chunks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn from_config(config: &RetrievalConfig, embedder: Option<Arc<dyn Provider>>) -> Self {
        let model = Some(config.embedding_model.trim())
            .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case(NO_EMBEDDINGS))
            .map(String::from);
        Self::new(IndexSettings::from_config(config), embedder, model)
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Load the persisted index when compatible, otherwise build it from the
    /// documents directory. Returns the number of chunks.
    pub async fn open_or_build(&self) -> Result<usize, RetrievalError> {
        match self.load_persisted()? {
            Some(chunks) => {
                let count = chunks.len();
                *self.chunks.write().await = chunks;
                info!(
                    path = %self.settings.index_path.display(),
                    chunks = count,
                    "Document index loaded"
                );
                Ok(count)
            }
            None => self.reload().await,
        }
    }

    /// Rebuild from scratch and persist. Returns the number of chunks.
    pub async fn reload(&self) -> Result<usize, RetrievalError> {
        let pages = load_documents(&self.settings.documents_dir)?;
        let splitter = TextSplitter::new(self.settings.chunk_size, self.settings.chunk_overlap);

        let mut chunks: Vec<Chunk> = pages
            .iter()
            .flat_map(|page| {
                splitter.split(&page.text).into_iter().map(|text| Chunk {
                    text,
                    source: page.source.clone(),
                    page: page.page,
                    embedding: None,
                })
            })
            .collect();

        let embedded = self.embed_chunks(&mut chunks).await;
        let count = chunks.len();
        *self.chunks.write().await = chunks;
        self.persist(embedded).await?;

        info!(
            dir = %self.settings.documents_dir.display(),
            pages = pages.len(),
            chunks = count,
            embedded,
            "Document index rebuilt"
        );
        Ok(count)
    }

    pub async fn stats(&self) -> IndexStats {
        let chunks = self.chunks.read().await;
        let sources: BTreeSet<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
        IndexStats {
            total_chunks: chunks.len(),
            sources: sources.into_iter().map(String::from).collect(),
            top_k: self.settings.top_k,
            embedded: !chunks.is_empty() && chunks.iter().all(|c| c.embedding.is_some()),
            documents_dir: self.settings.documents_dir.clone(),
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Attach embeddings in batches. On any failure the whole index stays
    /// keyword-only.
    async fn embed_chunks(&self, chunks: &mut [Chunk]) -> bool {
        let (Some(provider), Some(model)) = (&self.embedder, &self.embedding_model) else {
            return false;
        };
        if chunks.is_empty() {
            return false;
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let request = EmbeddingRequest {
                model: model.clone(),
                inputs: batch.iter().map(|c| c.text.clone()).collect(),
            };
            match provider.embed(request).await {
                Ok(response) if response.embeddings.len() == batch.len() => {
                    vectors.extend(response.embeddings);
                }
                Ok(response) => {
                    warn!(
                        expected = batch.len(),
                        got = response.embeddings.len(),
                        "Embedding count mismatch, using keyword search"
                    );
                    return false;
                }
                Err(e) => {
                    warn!(error = %e, "Embedding failed, using keyword search");
                    return false;
                }
            }
        }

        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            chunk.embedding = Some(vector);
        }
        true
    }

    fn load_persisted(&self) -> Result<Option<Vec<Chunk>>, RetrievalError> {
        let path = &self.settings.index_path;
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };

        let file: IndexFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable index file");
                return Ok(None);
            }
        };

        let embedded = file.chunks.iter().any(|c| c.embedding.is_some());
        let model_matches = !embedded || file.embedding_model == self.embedding_model;
        if file.chunk_size != self.settings.chunk_size
            || file.chunk_overlap != self.settings.chunk_overlap
            || !model_matches
        {
            debug!(path = %path.display(), "Index settings changed, rebuilding");
            return Ok(None);
        }

        Ok(Some(file.chunks))
    }

    async fn persist(&self, embedded: bool) -> Result<(), RetrievalError> {
        let chunks = self.chunks.read().await;
        let file = IndexFile {
            chunk_size: self.settings.chunk_size,
            chunk_overlap: self.settings.chunk_overlap,
            embedding_model: if embedded { self.embedding_model.clone() } else { None },
            chunks: chunks.clone(),
        };

        let path = &self.settings.index_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RetrievalError::Storage(format!("Failed to create index directory: {e}"))
            })?;
        }

        let json = serde_json::to_string(&file)
            .map_err(|e| RetrievalError::Storage(format!("Failed to serialize index: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| RetrievalError::Storage(format!("Failed to write index file: {e}")))?;
        Ok(())
    }

    async fn query_embedding(&self, query: &str) -> Option<Vec<f32>> {
        let (provider, model) = (self.embedder.as_ref()?, self.embedding_model.as_ref()?);
        let request = EmbeddingRequest {
            model: model.clone(),
            inputs: vec![query.to_string()],
        };
        match provider.embed(request).await {
            Ok(response) => response.embeddings.into_iter().next(),
            Err(e) => {
                warn!(error = %e, "Query embedding failed, using keyword search");
                None
            }
        }
    }
}

fn to_passage(chunk: &Chunk, score: f32) -> Passage {
    Passage {
        text: chunk.text.clone(),
        source: chunk.source.clone(),
        page: chunk.page,
        score,
    }
}

#[async_trait]
impl DocumentRetriever for DocumentIndex {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RetrievalError> {
        let k = self.settings.top_k;
        let has_embeddings = self.chunks.read().await.iter().any(|c| c.embedding.is_some());

        let query_vector = if has_embeddings {
            self.query_embedding(query).await
        } else {
            None
        };

        let chunks = self.chunks.read().await;
        let passages: Vec<Passage> = match query_vector {
            Some(vector) => {
                let scores: Vec<f32> = chunks
                    .iter()
                    .map(|c| c.embedding.as_deref().map_or(f32::MIN, |e| cosine_similarity(e, &vector)))
                    .collect();
                top_indices(&scores, k)
                    .into_iter()
                    .filter(|&i| chunks[i].embedding.is_some())
                    .map(|i| to_passage(&chunks[i], scores[i]))
                    .collect()
            }
            None => {
                let terms = query_terms(query);
                let scores: Vec<f32> = chunks.iter().map(|c| keyword_score(&c.text, &terms)).collect();
                top_indices(&scores, k)
                    .into_iter()
                    .filter(|&i| scores[i] > 0.0)
                    .map(|i| to_passage(&chunks[i], scores[i]))
                    .collect()
            }
        };

        debug!(query_len = query.len(), passages = passages.len(), "Document search");
        Ok(passages)
    }

    fn top_k(&self) -> usize {
        self.settings.top_k
    }
}

/// Open the configured index.
///
/// `None` when retrieval is disabled, the documents directory did not exist
/// (it is created for next time), or it holds no usable documents.
pub async fn open_index(
    config: &RetrievalConfig,
    embedder: Option<Arc<dyn Provider>>,
) -> Result<Option<Arc<DocumentIndex>>, RetrievalError> {
    if !config.enabled {
        debug!("Document retrieval disabled");
        return Ok(None);
    }

    if !ensure_documents_dir(&config.documents_dir)? {
        return Ok(None);
    }

    let index = DocumentIndex::from_config(config, embedder);
    if index.open_or_build().await? == 0 {
        warn!(dir = %config.documents_dir.display(), "No documents found for retrieval");
        return Ok(None);
    }
    Ok(Some(Arc::new(index)))
}

/// Returns `false` when the directory had to be created.
fn ensure_documents_dir(dir: &Path) -> Result<bool, RetrievalError> {
    if dir.is_dir() {
        return Ok(true);
    }
    std::fs::create_dir_all(dir).map_err(|e| RetrievalError::Ingestion {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;
    info!(dir = %dir.display(), "Created documents directory");
    Ok(false)
}
