//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions` and `/embeddings`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Embeddings for the document index
//! - Health checks

use async_trait::async_trait;
use finanbot_core::error::ProviderError;
use finanbot_core::message::{Message, Role};
use finanbot_core::provider::*;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::with_timeout(name, base_url, api_key, DEFAULT_HTTP_TIMEOUT_SECS)
    }

    /// Like [`new`](Self::new) with an explicit HTTP timeout.
    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn chat_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
        accept_sse: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/{path}", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if accept_sse {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        check_status(response).await
    }
}

/// Map non-success statuses to provider errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    match status {
        200 => Ok(response),
        429 => {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            Err(ProviderError::RateLimited { retry_after_secs })
        }
        401 | 403 => Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        )),
        _ => {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            })
        }
    }
}

#[async_trait]
impl finanbot_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, "Sending completion request");
        let response = self
            .post("chat/completions", &Self::chat_body(&request, false), false)
            .await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage: api_response.usage.map(Usage::from),
            model: api_response.model,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let body = serde_json::json!({
            "model": request.model,
            "input": request.inputs,
            "encoding_format": "float",
        });

        debug!(
            provider = %self.name,
            model = %request.model,
            count = request.inputs.len(),
            "Sending embedding request"
        );

        let response = self.post("embeddings", &body, false).await?;
        let mut api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        // The API may return items out of order.
        api_resp.data.sort_by_key(|d| d.index);

        Ok(EmbeddingResponse {
            embeddings: api_resp.data.into_iter().map(|d| d.embedding).collect(),
            model: api_resp.model,
            usage: api_resp.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: 0,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        debug!(provider = %self.name, model = %request.model, "Sending streaming request");
        let response = self
            .post("chat/completions", &Self::chat_body(&request, true), true)
            .await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        tokio::spawn(forward_sse(response.bytes_stream(), tx, provider_name));

        Ok(rx)
    }
}

// --- SSE decoding ---

type ChunkSender = tokio::sync::mpsc::Sender<std::result::Result<StreamChunk, ProviderError>>;

/// Decode an SSE byte stream into chunks on `tx`. The stream must end with a
/// `done` chunk (`[DONE]` or the usage payload); anything else is reported as
/// an interruption.
async fn forward_sse<S, B, E>(mut byte_stream: S, tx: ChunkSender, provider_name: String)
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut decoder = SseDecoder::default();

    while let Some(chunk_result) = byte_stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
        };

        for event in decoder.push(bytes.as_ref()) {
            let chunk = match event {
                SseEvent::Done => StreamChunk::finished(),
                SseEvent::Data(data) => match parse_stream_data(&data) {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => continue,
                    Err(e) => {
                        trace!(
                            provider = %provider_name,
                            data = %data,
                            error = %e,
                            "Ignoring unparseable SSE chunk"
                        );
                        continue;
                    }
                },
            };

            let done = chunk.done;
            if tx.send(Ok(chunk)).await.is_err() {
                return; // receiver dropped
            }
            if done {
                return;
            }
        }
    }

    warn!(provider = %provider_name, "Stream closed before [DONE]");
    let _ = tx
        .send(Err(ProviderError::StreamInterrupted(
            "stream ended without [DONE]".into(),
        )))
        .await;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SseEvent {
    Data(String),
    Done,
}

/// Line-buffers raw bytes so multi-byte characters split across network
/// chunks are decoded intact.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            // Skip blank lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if data == "[DONE]" {
                    events.push(SseEvent::Done);
                } else if !data.is_empty() {
                    events.push(SseEvent::Data(data.to_string()));
                }
            }
        }

        events
    }
}

/// Turn one `data:` payload into a chunk. `Ok(None)` for payloads that carry
/// neither text nor usage.
fn parse_stream_data(data: &str) -> Result<Option<StreamChunk>, serde_json::Error> {
    let response: StreamResponse = serde_json::from_str(data)?;

    // With include_usage the final payload has no choices and carries usage.
    if let Some(usage) = response.usage {
        return Ok(Some(StreamChunk {
            content: None,
            done: true,
            usage: Some(usage.into()),
        }));
    }

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty());

    Ok(content.map(StreamChunk::text))
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
    model: String,
    usage: Option<EmbeddingApiUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use finanbot_core::Provider;

    #[test]
    fn constructors_set_name_and_url() {
        let provider = OpenAiCompatProvider::openai("sk-test").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url(), "https://api.openai.com/v1");

        let provider = OpenAiCompatProvider::new("local", "http://localhost:8000/v1/", "").unwrap();
        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            Message::system("Eres FinanBot"),
            Message::user("Hola"),
            Message::assistant("¿En qué te ayudo?"),
        ];
        let api = OpenAiCompatProvider::to_api_messages(&messages);
        let roles: Vec<_> = api.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(api[2].content.as_deref(), Some("¿En qué te ayudo?"));
    }

    #[test]
    fn chat_body_streaming_options() {
        let request = ProviderRequest {
            model: "gpt-4o".into(),
            messages: vec![Message::user("Hola")],
            temperature: 0.0,
            max_tokens: Some(512),
            stream: true,
        };
        let body = OpenAiCompatProvider::chat_body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 512);

        let body = OpenAiCompatProvider::chat_body(&request, false);
        assert!(body.get("stream_options").is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn decoder_handles_split_lines_and_comments() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b": keep-alive\n\ndata: {\"a\"").is_empty());
        let events = decoder.push(b":1}\r\n\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"a\":1}".into()), SseEvent::Done]
        );
    }

    #[test]
    fn decoder_keeps_multibyte_chars_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"préstamo\"}}]}\n".as_bytes();
        // Split inside the two-byte "é".
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&line[..split]).is_empty());
        let events = decoder.push(&line[split..]);
        let SseEvent::Data(data) = &events[0] else {
            panic!("expected data event");
        };
        let chunk = parse_stream_data(data).unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("préstamo"));
    }

    #[test]
    fn parse_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hola"},"finish_reason":null}]}"#;
        let chunk = parse_stream_data(data).unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("Hola"));
        assert!(!chunk.done);
    }

    #[test]
    fn parse_empty_and_finish_deltas() {
        assert!(parse_stream_data(r#"{"choices":[{"delta":{},"finish_reason":null}]}"#)
            .unwrap()
            .is_none());
        assert!(parse_stream_data(r#"{"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn parse_usage_chunk_is_final() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let chunk = parse_stream_data(data).unwrap().unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.usage.unwrap().total_tokens, 15);
    }

    async fn collect_forwarded(
        parts: Vec<std::result::Result<&'static [u8], std::io::Error>>,
    ) -> Vec<std::result::Result<StreamChunk, ProviderError>> {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        forward_sse(futures::stream::iter(parts), tx, "test".into()).await;
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn forward_stops_at_done_marker() {
        let items = collect_forwarded(vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"La CTS\"}}]}\n\n".as_slice()),
            Ok(b"data: [DONE]\n\n".as_slice()),
        ])
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().content.as_deref(), Some("La CTS"));
        assert!(items[1].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn forward_reports_stream_closed_without_done() {
        let items = collect_forwarded(vec![Ok(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"La CTS es un benef\"}}]}\n\n".as_slice(),
        )])
        .await;

        assert_eq!(items.len(), 2);
        assert!(!items[0].as_ref().unwrap().done);
        assert!(matches!(items[1], Err(ProviderError::StreamInterrupted(_))));
        assert!(items.iter().all(|i| !i.as_ref().is_ok_and(|c| c.done)));
    }

    #[tokio::test]
    async fn forward_reports_transport_error() {
        let items = collect_forwarded(vec![Err(std::io::Error::other("connection reset"))]).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            Err(ProviderError::StreamInterrupted(msg)) if msg.contains("connection reset")
        ));
    }

    #[test]
    fn parse_garbage_is_error() {
        assert!(parse_stream_data("not json").is_err());
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{
            "data": [
                {"embedding": [0.4, 0.5, 0.6], "index": 1},
                {"embedding": [0.1, 0.2, 0.3], "index": 0}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let mut parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        parsed.data.sort_by_key(|d| d.index);
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(parsed.model, "text-embedding-3-small");
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 8);
    }
}
