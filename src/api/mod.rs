//! Backend service abstraction
//!
//! The coordinators talk to the xgen backend through [`WorkflowService`],
//! never to HTTP directly. Two implementations:
//!
//! - [`HttpWorkflowService`] - production, reqwest against the REST API
//! - [`MockWorkflowService`] - tests, scripted responses and call recording
//!
//! Streaming executions are exposed as an async sequence of
//! [`StreamEvent`]s rather than callbacks, with a cancellation token to
//! abort consumption between chunks.

mod http;
mod mock;

pub use http::HttpWorkflowService;
pub use mock::MockWorkflowService;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Correlation token used when the caller does not supply one
pub const DEFAULT_INTERACTION_ID: &str = "default";

/// Request body for id-based execution (buffered and streaming)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteRequest {
    pub workflow_name: String,
    pub workflow_id: String,
    pub input_data: String,
    pub interaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_collections: Option<Vec<String>>,
}

impl ExecuteRequest {
    pub fn new(workflow_name: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            workflow_id: workflow_id.into(),
            input_data: String::new(),
            interaction_id: DEFAULT_INTERACTION_ID.to_string(),
            selected_collections: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input_data = input.into();
        self
    }

    pub fn with_interaction_id(mut self, id: impl Into<String>) -> Self {
        self.interaction_id = id.into();
        self
    }

    pub fn with_collections(mut self, collections: Vec<String>) -> Self {
        self.selected_collections = if collections.is_empty() {
            None
        } else {
            Some(collections)
        };
        self
    }
}

/// Acknowledgement for persist/delete calls
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {
    /// Optional human-readable message from the backend
    #[serde(default)]
    pub message: Option<String>,
}

/// One event on a streaming execution channel
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental output; append to the accumulating buffer
    Chunk(String),
    /// End-of-stream signal; exactly one per successful execution
    End,
}

/// Async sequence of streamed events
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Operations the xgen backend exposes for workflows.
///
/// All methods map 1:1 onto backend endpoints; the coordinators own the
/// orchestration (validation, id derivation, overwrite gating, dispatch).
#[async_trait]
pub trait WorkflowService: Send + Sync {
    /// Stored workflow filenames (e.g. `"My Flow.json"`)
    async fn list_workflows(&self) -> Result<Vec<String>>;

    /// Persist a workflow payload under `name`
    async fn save_workflow(&self, name: &str, content: Value) -> Result<Ack>;

    /// Load a stored workflow; `name` may carry the `.json` extension
    async fn load_workflow(&self, name: &str) -> Result<Value>;

    /// Delete a stored workflow
    async fn delete_workflow(&self, name: &str) -> Result<Ack>;

    /// Buffered execution: one request, one final output
    async fn execute_by_id(&self, request: ExecuteRequest) -> Result<Value>;

    /// Streaming execution: chunked output until an `End` event.
    /// Cancelling the token stops consumption between chunks.
    async fn execute_by_id_stream(
        &self,
        request: ExecuteRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream>;
}
