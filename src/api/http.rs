//! HTTP backend for the xgen workflow API
//!
//! Endpoints:
//! - `GET  /api/workflow/list`
//! - `POST /api/workflow/save`
//! - `GET  /api/workflow/load/{name}`
//! - `DELETE /api/workflow/delete/{name}`
//! - `POST /api/workflow/execute/based_id`
//! - `POST /api/workflow/execute/based_id/stream` (SSE)
//!
//! Error bodies carry a `detail` field which is surfaced verbatim; bodies
//! without one fall back to the HTTP status.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Ack, ChunkStream, ExecuteRequest, StreamEvent, WorkflowService};
use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::validate::strip_json_ext;

/// Buffered channel size for streamed chunks
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Production backend over reqwest
pub struct HttpWorkflowService {
    client: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

impl HttpWorkflowService {
    /// Build from a validated base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| FlowError::config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            api_key: None,
        })
    }

    /// Build from loaded configuration (env already merged)
    pub fn from_config(config: &FlowConfig) -> Result<Self> {
        let mut service = Self::new(&config.base_url()?)?;
        service.api_key = config.api_key().map(str::to_string);
        Ok(service)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Endpoint URL from path segments (each segment percent-encoded)
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FlowError::config("Base URL cannot carry path segments".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Map non-2xx responses to `FlowError::Api` with the backend's
    /// `detail` message when present.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = match response.json::<ErrorBody>().await {
            Ok(body) if !body.detail.is_empty() => body.detail,
            _ => format!("HTTP error! status: {}", status.as_u16()),
        };
        Err(FlowError::Api {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl WorkflowService for HttpWorkflowService {
    async fn list_workflows(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["api", "workflow", "list"])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        let body: ListResponse = Self::check(response).await?.json().await?;
        Ok(body.workflows)
    }

    async fn save_workflow(&self, name: &str, content: Value) -> Result<Ack> {
        let url = self.endpoint(&["api", "workflow", "save"])?;
        tracing::debug!(workflow_name = name, "saving workflow");
        let response = self
            .authorize(self.client.post(url))
            .json(&SaveRequest {
                workflow_name: name,
                content,
            })
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn load_workflow(&self, name: &str) -> Result<Value> {
        let clean = strip_json_ext(name);
        let url = self.endpoint(&["api", "workflow", "load", clean])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn delete_workflow(&self, name: &str) -> Result<Ack> {
        let clean = strip_json_ext(name);
        let url = self.endpoint(&["api", "workflow", "delete", clean])?;
        let response = self.authorize(self.client.delete(url)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn execute_by_id(&self, request: ExecuteRequest) -> Result<Value> {
        let url = self.endpoint(&["api", "workflow", "execute", "based_id"])?;
        tracing::debug!(
            workflow_name = %request.workflow_name,
            workflow_id = %request.workflow_id,
            "dispatching buffered execution"
        );
        let response = self
            .authorize(self.client.post(url))
            .json(&request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn execute_by_id_stream(
        &self,
        request: ExecuteRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        let url = self.endpoint(&["api", "workflow", "execute", "based_id", "stream"])?;
        tracing::debug!(
            workflow_name = %request.workflow_name,
            workflow_id = %request.workflow_id,
            interaction_id = %request.interaction_id,
            "dispatching streaming execution"
        );
        let response = self
            .authorize(self.client.post(url))
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = SseBuffer::new();
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = tx.send(Err(FlowError::Canceled)).await;
                        return;
                    }
                    chunk = bytes.next() => chunk,
                };
                match chunk {
                    Some(Ok(data)) => {
                        for frame in buffer.push(&data) {
                            for event in parse_frame(&frame) {
                                let done = matches!(&event, Ok(StreamEvent::End) | Err(_));
                                if tx.send(event).await.is_err() || done {
                                    return;
                                }
                            }
                        }
                    }
                    Some(Err(err)) => {
                        let _ = tx.send(Err(FlowError::Network(err))).await;
                        return;
                    }
                    // Transport closed without an explicit end frame
                    None => {
                        let _ = tx.send(Ok(StreamEvent::End)).await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Serialize)]
struct SaveRequest<'a> {
    workflow_name: &'a str,
    content: Value,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    workflows: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: String,
}

#[derive(Deserialize)]
struct SsePayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    detail: String,
}

// ============================================================================
// SSE FRAMING
// ============================================================================

/// Carry buffer for SSE frames.
///
/// Chunks arrive at arbitrary byte boundaries; frames are only complete at
/// a `\n\n` separator, so the trailing partial frame stays buffered.
struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append raw bytes and drain all complete frames
    fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);
        let mut frames = Vec::new();
        while let Some(idx) = find_frame_end(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..idx + 2).take(idx).collect();
            frames.push(String::from_utf8_lossy(&frame).into_owned());
        }
        frames
    }
}

fn find_frame_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/// Decode the `data:` lines of one frame into stream events.
///
/// Unparseable payloads are logged and skipped, matching the backend
/// contract that a malformed frame must not kill the stream.
fn parse_frame(frame: &str) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();
    for line in frame.lines() {
        let Some(payload) = line.strip_prefix("data: ") else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() {
            continue;
        }
        match serde_json::from_str::<SsePayload>(payload) {
            Ok(parsed) => match parsed.kind.as_str() {
                "data" => {
                    let content = match parsed.content {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    events.push(Ok(StreamEvent::Chunk(content)));
                }
                "end" => {
                    events.push(Ok(StreamEvent::End));
                    return events;
                }
                "error" => {
                    events.push(Err(FlowError::stream(parsed.detail)));
                    return events;
                }
                other => {
                    tracing::warn!(kind = other, "unknown stream event type, skipping");
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, payload, "failed to parse stream frame, skipping");
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_buffer_handles_split_frames() {
        let mut buffer = SseBuffer::new();
        assert!(buffer.push(b"data: {\"type\":\"da").is_empty());
        let frames = buffer.push(b"ta\",\"content\":\"Hi\"}\n\n");
        assert_eq!(frames, vec!["data: {\"type\":\"data\",\"content\":\"Hi\"}"]);
    }

    #[test]
    fn sse_buffer_drains_multiple_frames() {
        let mut buffer = SseBuffer::new();
        let frames = buffer.push(b"data: a\n\ndata: b\n\ndata: partial");
        assert_eq!(frames, vec!["data: a", "data: b"]);
        let frames = buffer.push(b"\n\n");
        assert_eq!(frames, vec!["data: partial"]);
    }

    #[test]
    fn parse_frame_data_chunk() {
        let events = parse_frame(r#"data: {"type":"data","content":"Hello"}"#);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Chunk("Hello".to_string())
        );
    }

    #[test]
    fn parse_frame_end() {
        let events = parse_frame(r#"data: {"type":"end"}"#);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::End);
    }

    #[test]
    fn parse_frame_error_carries_detail() {
        let events = parse_frame(r#"data: {"type":"error","detail":"node llm0 failed"}"#);
        assert_eq!(events.len(), 1);
        let err = events[0].as_ref().unwrap_err();
        assert!(err.to_string().contains("node llm0 failed"));
    }

    #[test]
    fn parse_frame_skips_garbage() {
        assert!(parse_frame("data: {not json}").is_empty());
        assert!(parse_frame(": comment line").is_empty());
        assert!(parse_frame("").is_empty());
    }

    #[test]
    fn parse_frame_non_string_content_stringified() {
        let events = parse_frame(r#"data: {"type":"data","content":{"k":1}}"#);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Chunk("{\"k\":1}".to_string())
        );
    }

    #[test]
    fn endpoint_encodes_segments() {
        let service = HttpWorkflowService::new("http://localhost:8000").unwrap();
        let url = service
            .endpoint(&["api", "workflow", "load", "My Flow"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/workflow/load/My%20Flow"
        );
    }
}
