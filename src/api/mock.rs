//! Mock backend for tests
//!
//! Scripted responses plus call recording, so coordinator tests can assert
//! on exactly which backend operations ran and with what payloads.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Ack, ChunkStream, ExecuteRequest, StreamEvent, WorkflowService};
use crate::error::{FlowError, Result};
use crate::validate::{strip_json_ext, workflow_filename};

/// In-memory [`WorkflowService`] with scripted responses.
///
/// Saves land in an in-memory map, streaming executions drain scripted
/// event queues, and every call is recorded for assertions. Interior
/// mutability keeps the trait's `&self` signatures.
#[derive(Default)]
pub struct MockWorkflowService {
    workflows: Mutex<Vec<String>>,
    saved: Mutex<Vec<(String, Value)>>,
    executed: Mutex<Vec<ExecuteRequest>>,
    streamed: Mutex<Vec<ExecuteRequest>>,
    execute_response: Mutex<Value>,
    stream_scripts: Mutex<VecDeque<Vec<Result<StreamEvent>>>>,
    list_failure: Mutex<Option<String>>,
    save_failure: Mutex<Option<String>>,
    execute_failure: Mutex<Option<String>>,
}

impl MockWorkflowService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stored workflow listing (filenames with `.json`)
    pub fn with_workflows(self, names: &[&str]) -> Self {
        *self.workflows.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Response body for buffered executions (defaults to `null`)
    pub fn respond_to_execute(self, response: Value) -> Self {
        *self.execute_response.lock().unwrap() = response;
        self
    }

    /// Queue one streaming execution's events. Scripts are consumed in
    /// FIFO order; an unscripted stream yields a bare `End`.
    pub fn queue_stream(&self, events: Vec<Result<StreamEvent>>) {
        self.stream_scripts.lock().unwrap().push_back(events);
    }

    /// Convenience: a stream of chunks followed by a clean end
    pub fn queue_chunks(&self, chunks: &[&str]) {
        let mut events: Vec<Result<StreamEvent>> = chunks
            .iter()
            .map(|c| Ok(StreamEvent::Chunk(c.to_string())))
            .collect();
        events.push(Ok(StreamEvent::End));
        self.queue_stream(events);
    }

    /// Make `list_workflows` fail with the given detail
    pub fn fail_list_with(&self, detail: &str) {
        *self.list_failure.lock().unwrap() = Some(detail.to_string());
    }

    /// Make `save_workflow` fail with the given detail
    pub fn fail_save_with(&self, detail: &str) {
        *self.save_failure.lock().unwrap() = Some(detail.to_string());
    }

    /// Make both execute variants fail with the given detail
    pub fn fail_execute_with(&self, detail: &str) {
        *self.execute_failure.lock().unwrap() = Some(detail.to_string());
    }

    // ── Recorded-call accessors ─────────────────────────────────────────

    pub fn save_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn saved_payloads(&self) -> Vec<(String, Value)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn execute_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }

    pub fn stream_count(&self) -> usize {
        self.streamed.lock().unwrap().len()
    }

    pub fn last_executed(&self) -> Option<ExecuteRequest> {
        self.executed.lock().unwrap().last().cloned()
    }

    pub fn last_streamed(&self) -> Option<ExecuteRequest> {
        self.streamed.lock().unwrap().last().cloned()
    }

    fn failure(slot: &Mutex<Option<String>>) -> Option<FlowError> {
        slot.lock().unwrap().as_ref().map(|detail| FlowError::Api {
            status: 500,
            detail: detail.clone(),
        })
    }
}

#[async_trait]
impl WorkflowService for MockWorkflowService {
    async fn list_workflows(&self) -> Result<Vec<String>> {
        if let Some(err) = Self::failure(&self.list_failure) {
            return Err(err);
        }
        Ok(self.workflows.lock().unwrap().clone())
    }

    async fn save_workflow(&self, name: &str, content: Value) -> Result<Ack> {
        if let Some(err) = Self::failure(&self.save_failure) {
            return Err(err);
        }
        self.saved
            .lock()
            .unwrap()
            .push((name.to_string(), content));
        let filename = workflow_filename(name);
        let mut workflows = self.workflows.lock().unwrap();
        if !workflows.contains(&filename) {
            workflows.push(filename);
        }
        Ok(Ack {
            message: Some(format!("Workflow '{}' saved", name)),
        })
    }

    async fn load_workflow(&self, name: &str) -> Result<Value> {
        let clean = strip_json_ext(name);
        let saved = self.saved.lock().unwrap();
        saved
            .iter()
            .rev()
            .find(|(n, _)| n.as_str() == clean)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| FlowError::Api {
                status: 404,
                detail: format!("Workflow '{}' not found", clean),
            })
    }

    async fn delete_workflow(&self, name: &str) -> Result<Ack> {
        let filename = workflow_filename(strip_json_ext(name));
        let mut workflows = self.workflows.lock().unwrap();
        let before = workflows.len();
        workflows.retain(|w| *w != filename);
        if workflows.len() == before {
            return Err(FlowError::Api {
                status: 404,
                detail: format!("Workflow '{}' not found", name),
            });
        }
        Ok(Ack::default())
    }

    async fn execute_by_id(&self, request: ExecuteRequest) -> Result<Value> {
        if let Some(err) = Self::failure(&self.execute_failure) {
            return Err(err);
        }
        self.executed.lock().unwrap().push(request);
        Ok(self.execute_response.lock().unwrap().clone())
    }

    async fn execute_by_id_stream(
        &self,
        request: ExecuteRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream> {
        if let Some(err) = Self::failure(&self.execute_failure) {
            return Err(err);
        }
        self.streamed.lock().unwrap().push(request);
        let events = self
            .stream_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Ok(StreamEvent::End)]);

        // Deliver scripted events until the token is cancelled; a cancel
        // between chunks surfaces as a single terminal Canceled error.
        let stream = stream::unfold(
            (events.into_iter(), cancel, false),
            |(mut events, cancel, done)| async move {
                if done {
                    return None;
                }
                if cancel.is_cancelled() {
                    return Some((Err(FlowError::Canceled), (events, cancel, true)));
                }
                let event = events.next()?;
                let terminal = matches!(&event, Ok(StreamEvent::End) | Err(_));
                Some((event, (events, cancel, terminal)))
            },
        );
        Ok(Box::pin(stream))
    }
}
