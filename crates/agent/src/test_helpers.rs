//! Shared test doubles for orchestrator and assembler tests.

use async_trait::async_trait;
use finanbot_core::error::{ProviderError, RetrievalError};
use finanbot_core::message::Message;
use finanbot_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use finanbot_core::retrieval::{DocumentRetriever, Passage};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// How a scripted stream ends.
#[derive(Debug, Clone)]
pub enum Ending {
    Done,
    Error(ProviderError),
    /// Drop the sender without a final `done` chunk.
    Closed,
    /// Keep the stream open without sending anything else.
    Stall,
}

/// Streams a fixed list of fragments and records every request.
pub struct ScriptedProvider {
    fragments: Vec<String>,
    ending: Ending,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(fragments: &[&str]) -> Self {
        Self::ending_with(fragments, Ending::Done)
    }

    pub fn ending_with(fragments: &[&str], ending: Ending) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ending,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        Ok(ProviderResponse {
            message: Message::assistant(self.fragments.concat()),
            usage: None,
            model: "scripted".into(),
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let (tx, rx) = mpsc::channel(self.fragments.len() + 2);
        let fragments = self.fragments.clone();
        let ending = self.ending.clone();

        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(Ok(StreamChunk::text(fragment))).await.is_err() {
                    return;
                }
            }
            match ending {
                Ending::Done => {
                    let _ = tx
                        .send(Ok(StreamChunk {
                            content: None,
                            done: true,
                            usage: Some(Usage {
                                prompt_tokens: 10,
                                completion_tokens: 5,
                                total_tokens: 15,
                            }),
                        }))
                        .await;
                }
                Ending::Error(e) => {
                    let _ = tx.send(Err(e)).await;
                }
                Ending::Closed => drop(tx),
                Ending::Stall => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop(tx);
                }
            }
        });

        Ok(rx)
    }
}

/// Fails before any fragment is produced.
pub struct UnreachableProvider;

#[async_trait]
impl Provider for UnreachableProvider {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// Returns the same passages for every query.
pub struct StaticRetriever {
    passages: Vec<Passage>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }

    pub fn two_passages() -> Self {
        Self::new(vec![
            Passage {
                text: "Cuenta sin comisiones.".into(),
                source: "ahorros.txt".into(),
                page: 1,
                score: 0.9,
            },
            Passage {
                text: "TREA de 3.5%.".into(),
                source: "ahorros.txt".into(),
                page: 3,
                score: 0.7,
            },
        ])
    }
}

#[async_trait]
impl DocumentRetriever for StaticRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Vec<Passage>, RetrievalError> {
        Ok(self.passages.clone())
    }

    fn top_k(&self) -> usize {
        4
    }
}

pub struct FailingRetriever;

#[async_trait]
impl DocumentRetriever for FailingRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Vec<Passage>, RetrievalError> {
        Err(RetrievalError::QueryFailed("index unavailable".into()))
    }

    fn top_k(&self) -> usize {
        4
    }
}
